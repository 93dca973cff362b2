//! Activation engine: decides whether a preference is live at a given instant.
//!
//! Everything here is a pure function of a [`Preference`] and a reference
//! time, safe to call from any number of threads. Persisting the result of
//! [`turn_on_at`] and [`turn_off_at`] is the store's job.

use crate::{Preference, PreferenceValue, Timestamp};
use serde::{Deserialize, Serialize};

/// Why a preference is, or is not, active at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ActivationState {
    /// `enabled` is false.
    Disabled,
    /// `available` is false and the testing override was not given.
    Unavailable,
    /// The window has not opened yet.
    Pending { begins_at: Timestamp },
    /// The window has closed.
    Expired { ended_at: Timestamp },
    Active,
}

impl ActivationState {
    pub fn is_active(&self) -> bool {
        matches!(self, ActivationState::Active)
    }
}

/// How `turn_off_at` treats the `enabled` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOffMode {
    /// Leave `enabled` as it is; only the end of the window moves.
    #[default]
    PreserveEnabled,
    /// Also set `enabled = true`, so the end time alone governs the outcome.
    ForceEnabled,
}

/// Evaluate the gates in order: enabled, available, window start, window end.
///
/// `testing` bypasses the availability gate only. Window boundaries are
/// inclusive.
pub fn activation_state(record: &Preference, now: Timestamp, testing: bool) -> ActivationState {
    if !record.enabled {
        return ActivationState::Disabled;
    }
    if !record.available && !testing {
        return ActivationState::Unavailable;
    }
    if let Some(begins_at) = record.begin_at {
        if begins_at > now {
            return ActivationState::Pending { begins_at };
        }
    }
    if let Some(ended_at) = record.end_at {
        if ended_at < now {
            return ActivationState::Expired { ended_at };
        }
    }
    ActivationState::Active
}

pub fn is_enabled(record: &Preference, now: Timestamp, testing: bool) -> bool {
    activation_state(record, now, testing).is_active()
}

/// The stored value when the preference is active, `None` otherwise.
///
/// This is the read path for gating behavior. A stored `false` or `Null`
/// comes back as `Some(..)`, distinct from an inactive preference.
pub fn get_value(record: &Preference, now: Timestamp, testing: bool) -> Option<PreferenceValue> {
    is_enabled(record, now, testing).then(|| record.value.clone())
}

/// Open the window at `time`, closing it at `finish_at` (or never).
/// Leaves `available` alone.
pub fn turn_on_at(record: &mut Preference, time: Timestamp, finish_at: Option<Timestamp>) {
    record.begin_at = Some(time);
    record.end_at = finish_at;
    record.enabled = true;
}

/// Close the window at `time`. Leaves `available` alone.
pub fn turn_off_at(record: &mut Preference, time: Timestamp, mode: TurnOffMode) {
    record.end_at = Some(time);
    if mode == TurnOffMode::ForceEnabled {
        record.enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn live() -> Preference {
        Preference::new("Site Name")
            .with_value("Best Ever Website")
            .with_flags(true, true)
    }

    #[test]
    fn test_enabled_with_no_window() {
        assert!(is_enabled(&live(), now(), false));
    }

    #[test]
    fn test_not_enabled_when_unavailable() {
        let pref = live().with_flags(true, false);
        assert_eq!(activation_state(&pref, now(), false), ActivationState::Unavailable);
    }

    #[test]
    fn test_testing_bypasses_availability_only() {
        let pref = live().with_flags(true, false);
        assert!(is_enabled(&pref, now(), true));

        let pref = live().with_flags(false, false);
        assert!(!is_enabled(&pref, now(), true));
    }

    #[test]
    fn test_disabled_wins_over_everything() {
        let pref = live()
            .with_flags(false, true)
            .with_window(Some(now() - Duration::days(1)), Some(now() + Duration::days(1)));
        assert_eq!(activation_state(&pref, now(), true), ActivationState::Disabled);
    }

    #[test]
    fn test_within_window() {
        let pref = live().with_window(Some(now() - Duration::days(1)), Some(now() + Duration::days(1)));
        assert!(is_enabled(&pref, now(), false));
    }

    #[test]
    fn test_before_begin() {
        let begins_at = now() + Duration::days(1);
        let pref = live().with_window(Some(begins_at), None);
        assert_eq!(
            activation_state(&pref, now(), false),
            ActivationState::Pending { begins_at }
        );
    }

    #[test]
    fn test_after_end() {
        let ended_at = now() - Duration::days(1);
        let pref = live().with_window(None, Some(ended_at));
        assert_eq!(
            activation_state(&pref, now(), false),
            ActivationState::Expired { ended_at }
        );
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let pref = live().with_window(Some(now()), Some(now()));
        assert!(is_enabled(&pref, now(), false));
        assert!(!is_enabled(&pref, now() + Duration::nanoseconds(1), false));
        assert!(!is_enabled(&pref, now() - Duration::nanoseconds(1), false));
    }

    #[test]
    fn test_inverted_window_is_never_active() {
        let pref = live().with_window(Some(now() + Duration::hours(1)), Some(now() - Duration::hours(1)));
        assert!(!is_enabled(&pref, now(), false));
        assert!(!is_enabled(&pref, now() + Duration::hours(2), false));
        assert!(!is_enabled(&pref, now() - Duration::hours(2), false));
    }

    #[test]
    fn test_get_value_tags_absence() {
        let pref = live().with_value(false);
        assert_eq!(get_value(&pref, now(), false), Some(PreferenceValue::Bool(false)));

        let pref = live().with_value(PreferenceValue::Null);
        assert_eq!(get_value(&pref, now(), false), Some(PreferenceValue::Null));

        let pref = live().with_value(false).with_flags(false, true);
        assert_eq!(get_value(&pref, now(), false), None);
    }

    #[test]
    fn test_turn_on_at_resets_window() {
        let mut pref = live().with_window(None, Some(now() - Duration::days(1)));
        assert!(!is_enabled(&pref, now(), false));

        turn_on_at(&mut pref, now(), None);
        assert_eq!(pref.begin_at, Some(now()));
        assert_eq!(pref.end_at, None);
        assert!(is_enabled(&pref, now(), false));
    }

    #[test]
    fn test_turn_on_at_with_finish() {
        let mut pref = live().with_flags(false, true);
        let finish = now() + Duration::hours(2);
        turn_on_at(&mut pref, now(), Some(finish));

        assert!(pref.enabled);
        assert!(is_enabled(&pref, now() + Duration::hours(1), false));
        assert!(!is_enabled(&pref, now() + Duration::hours(3), false));
    }

    #[test]
    fn test_turn_on_at_keeps_available() {
        let mut pref = live().with_flags(false, false);
        turn_on_at(&mut pref, now(), None);
        assert!(pref.enabled);
        assert!(!pref.available);
    }

    #[test]
    fn test_turn_off_at_now_disables() {
        let mut pref = live().with_window(Some(now() - Duration::days(1)), None);
        assert!(is_enabled(&pref, now(), false));

        turn_off_at(&mut pref, now(), TurnOffMode::PreserveEnabled);
        // Inclusive end: still live at the exact instant, off right after.
        assert!(is_enabled(&pref, now(), false));
        assert!(!is_enabled(&pref, now() + Duration::milliseconds(1), false));
    }

    #[test]
    fn test_turn_off_at_past_disables_immediately() {
        let mut pref = live();
        turn_off_at(&mut pref, now() - Duration::days(1), TurnOffMode::PreserveEnabled);
        assert!(!is_enabled(&pref, now(), false));
    }

    #[test]
    fn test_turn_off_modes() {
        let mut pref = live().with_flags(false, true);
        turn_off_at(&mut pref, now() + Duration::days(1), TurnOffMode::PreserveEnabled);
        assert!(!pref.enabled);
        assert!(!is_enabled(&pref, now(), false));

        turn_off_at(&mut pref, now() + Duration::days(1), TurnOffMode::ForceEnabled);
        assert!(pref.enabled);
        assert!(is_enabled(&pref, now(), false));
        assert!(pref.available);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn at(offset_secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    fn arb_window() -> impl Strategy<Value = (Option<i64>, Option<i64>)> {
        (
            proptest::option::of(-10_000i64..10_000),
            proptest::option::of(-10_000i64..10_000),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// A disabled preference is never active.
        #[test]
        fn prop_disabled_is_never_active(
            available in any::<bool>(),
            testing in any::<bool>(),
            window in arb_window(),
            now in -20_000i64..20_000,
        ) {
            let pref = Preference::new("p")
                .with_flags(false, available)
                .with_window(window.0.map(at), window.1.map(at));
            prop_assert!(!is_enabled(&pref, at(now), testing));
        }

        /// Unavailable blocks unless testing, in which case availability is ignored.
        #[test]
        fn prop_testing_ignores_availability(
            window in arb_window(),
            now in -20_000i64..20_000,
        ) {
            let unavailable = Preference::new("p")
                .with_flags(true, false)
                .with_window(window.0.map(at), window.1.map(at));
            let available = unavailable.clone().with_flags(true, true);

            prop_assert!(!is_enabled(&unavailable, at(now), false));
            prop_assert_eq!(
                is_enabled(&unavailable, at(now), true),
                is_enabled(&available, at(now), false)
            );
        }

        /// With no window, an enabled and available preference is always active.
        #[test]
        fn prop_no_window_always_active(now in any::<i32>()) {
            let pref = Preference::new("p").with_flags(true, true);
            prop_assert!(is_enabled(&pref, at(now as i64), false));
        }

        /// Activity matches the inclusive window definition.
        #[test]
        fn prop_window_is_inclusive(
            window in arb_window(),
            now in -20_000i64..20_000,
        ) {
            let pref = Preference::new("p")
                .with_flags(true, true)
                .with_window(window.0.map(at), window.1.map(at));
            let expected = window.0.map_or(true, |b| b <= now) && window.1.map_or(true, |e| e >= now);
            prop_assert_eq!(is_enabled(&pref, at(now), false), expected);
        }

        /// get_value returns the stored value exactly when active.
        #[test]
        fn prop_get_value_matches_is_enabled(
            enabled in any::<bool>(),
            available in any::<bool>(),
            testing in any::<bool>(),
            value in prop_oneof![
                Just(PreferenceValue::Null),
                any::<bool>().prop_map(PreferenceValue::Bool),
                any::<i64>().prop_map(PreferenceValue::Integer),
                "[a-z]{0,8}".prop_map(PreferenceValue::Text),
            ],
        ) {
            let pref = Preference::new("p")
                .with_flags(enabled, available)
                .with_value(value.clone());
            let now = at(0);
            match get_value(&pref, now, testing) {
                Some(v) => {
                    prop_assert!(is_enabled(&pref, now, testing));
                    prop_assert_eq!(v, value);
                }
                None => prop_assert!(!is_enabled(&pref, now, testing)),
            }
        }
    }
}
