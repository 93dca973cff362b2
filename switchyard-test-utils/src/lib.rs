//! Switchyard Test Utilities
//!
//! Centralized test infrastructure for the Switchyard workspace:
//! - Proptest generators for preferences, values and activation windows
//! - The canonical fixture set, anchored to a fixed reference time
//! - A store pre-seeded with the fixtures
//! - Custom assertions and tracing setup for tests

use std::sync::{Arc, Once};

pub use switchyard_core::{
    ActivationState, Clock, FixedClock, ManualClock, NewPreference, Preference, PreferenceId,
    PreferenceValue, StorageError, SwitchyardConfig, SwitchyardError, SwitchyardResult,
    Timestamp, ValidationError, ValueClass, ValueClassPolicy,
};
pub use switchyard_storage::{
    InMemoryCacheBackend, InMemoryPreferenceRepository, PreferenceRepository, PreferenceStore,
};

use chrono::Utc;
use uuid::Uuid;

/// Store type used throughout the workspace tests.
pub type TestStore = PreferenceStore<InMemoryPreferenceRepository, InMemoryCacheBackend>;

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a fmt subscriber for test output, once per process.
///
/// Honors `RUST_LOG`; defaults to `switchyard=debug`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("switchyard=debug"));

        // Another harness may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Switchyard types.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// Generate a random PreferenceId.
    pub fn arb_preference_id() -> impl Strategy<Value = PreferenceId> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a Timestamp between 2020 and 2030, whole seconds.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a non-blank preference name.
    pub fn arb_preference_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,30}"
    }

    /// Generate a finite float: ordinary magnitudes, subnormals, both zeros
    /// and the extremes of the range.
    pub fn arb_finite_float() -> impl Strategy<Value = f64> {
        use proptest::num::f64 as float;
        prop_oneof![
            4 => -1.0e9f64..1.0e9f64,
            2 => float::NORMAL | float::SUBNORMAL | float::ZERO,
            1 => prop::sample::select(vec![
                -0.0,
                f64::MAX,
                f64::MIN,
                f64::MIN_POSITIVE,
                f64::EPSILON,
                f64::from_bits(1),
                1.0e16,
            ]),
        ]
    }

    /// Generate a NaN or an infinity, which no write accepts.
    pub fn arb_non_finite_float() -> impl Strategy<Value = f64> {
        prop::sample::select(vec![f64::INFINITY, f64::NEG_INFINITY, f64::NAN])
    }

    /// Generate a value from one of the default whitelisted classes.
    pub fn arb_scalar_value() -> impl Strategy<Value = PreferenceValue> {
        prop_oneof![
            Just(PreferenceValue::Null),
            any::<bool>().prop_map(PreferenceValue::Bool),
            any::<i64>().prop_map(PreferenceValue::Integer),
            arb_finite_float().prop_map(PreferenceValue::Float),
            "[a-zA-Z0-9 ]{0,40}".prop_map(PreferenceValue::Text),
        ]
    }

    /// Generate any value, including nested lists and maps.
    pub fn arb_preference_value() -> impl Strategy<Value = PreferenceValue> {
        arb_scalar_value().prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(PreferenceValue::List),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                    .prop_map(|map: BTreeMap<String, PreferenceValue>| PreferenceValue::Map(map)),
            ]
        })
    }

    /// Generate a value class.
    pub fn arb_value_class() -> impl Strategy<Value = ValueClass> {
        prop::sample::select(ValueClass::ALL.to_vec())
    }

    /// Generate an activation window. Either end may be open, and the end
    /// may come before the start.
    pub fn arb_window() -> impl Strategy<Value = (Option<Timestamp>, Option<Timestamp>)> {
        (
            prop::option::of(arb_timestamp()),
            prop::option::of(arb_timestamp()),
        )
    }

    /// Generate a Preference whose value passes the default whitelist.
    pub fn arb_preference() -> impl Strategy<Value = Preference> {
        (
            arb_preference_id(),
            arb_preference_name(),
            arb_scalar_value(),
            prop::option::of("[a-zA-Z0-9 ]{1,80}"),
            arb_window(),
            any::<bool>(),
            any::<bool>(),
            arb_timestamp(),
        )
            .prop_map(
                |(
                    preference_id,
                    name,
                    value,
                    description,
                    (begin_at, end_at),
                    enabled,
                    available,
                    created_at,
                )| {
                    Preference {
                        preference_id,
                        name,
                        value,
                        description,
                        begin_at,
                        end_at,
                        enabled,
                        available,
                        updated_by: None,
                        created_at,
                        updated_at: created_at,
                    }
                },
            )
    }

    /// Generate creation input whose value passes the default whitelist.
    pub fn arb_new_preference() -> impl Strategy<Value = NewPreference> {
        (
            arb_preference_name(),
            any::<bool>(),
            any::<bool>(),
            arb_scalar_value(),
        )
            .prop_map(|(name, enabled, available, value)| {
                NewPreference::new(name)
                    .enabled(enabled)
                    .available(available)
                    .value(value)
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! The canonical preference set. Windows are placed relative to
    //! [`reference_time`], so results are stable under a [`FixedClock`] at
    //! that instant.

    use super::*;
    use chrono::{Duration, TimeZone};

    /// The instant every fixture window is anchored to.
    pub fn reference_time() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn yesterday() -> Timestamp {
        reference_time() - Duration::days(1)
    }

    fn tomorrow() -> Timestamp {
        reference_time() + Duration::days(1)
    }

    fn fixture(name: &str) -> Preference {
        let mut pref = Preference::new(name);
        pref.created_at = reference_time() - Duration::days(30);
        pref.updated_at = pref.created_at;
        pref
    }

    /// Enabled and available, but the window opens tomorrow.
    pub fn antler_size_maximum() -> Preference {
        fixture("Antler Size Maximum")
            .with_value(12)
            .with_flags(true, true)
            .with_window(Some(tomorrow()), None)
    }

    /// Enabled, not yet released.
    pub fn beta_dashboard() -> Preference {
        fixture("Beta Dashboard")
            .with_value(true)
            .with_flags(true, false)
            .with_description("New dashboard, visible to testers only")
    }

    /// Open from yesterday until tomorrow.
    pub fn maintenance_window() -> Preference {
        fixture("Maintenance Window")
            .with_value("02:00-04:00")
            .with_flags(true, true)
            .with_window(Some(yesterday()), Some(tomorrow()))
    }

    /// Available but switched off.
    pub fn max_chipmunk_size() -> Preference {
        fixture("Max Chipmunk Size").with_value(3).with_flags(false, true)
    }

    /// Live with an integer value.
    pub fn max_photo_size() -> Preference {
        fixture("Max Photo Size")
            .with_value(5)
            .with_flags(true, true)
            .with_description("Maximum upload size in megabytes")
    }

    /// Window closed yesterday.
    pub fn min_shoe_size() -> Preference {
        fixture("Min Shoe Size")
            .with_value(7.5)
            .with_flags(true, true)
            .with_window(None, Some(yesterday()))
    }

    /// Window opened yesterday, no end.
    pub fn preferred_shape_of_cheese() -> Preference {
        fixture("Preferred shape of cheese")
            .with_value("wedge")
            .with_flags(true, true)
            .with_window(Some(yesterday()), None)
    }

    pub fn site_name() -> Preference {
        fixture("Site Name")
            .with_value("Best Ever Website")
            .with_flags(true, true)
    }

    pub fn users_can_login() -> Preference {
        fixture("Users Can Login").with_value(true).with_flags(true, true)
    }

    /// Neither enabled nor available, null value.
    pub fn welcome_message() -> Preference {
        fixture("Welcome Message")
    }

    pub fn zebra_color() -> Preference {
        fixture("Zebra Color")
            .with_value("black and white")
            .with_flags(true, true)
    }

    /// Every fixture, in name order.
    pub fn all() -> Vec<Preference> {
        vec![
            antler_size_maximum(),
            beta_dashboard(),
            maintenance_window(),
            max_chipmunk_size(),
            max_photo_size(),
            min_shoe_size(),
            preferred_shape_of_cheese(),
            site_name(),
            users_can_login(),
            welcome_message(),
            zebra_color(),
        ]
    }

    /// Names of every fixture, ascending.
    pub fn names() -> Vec<String> {
        all().into_iter().map(|p| p.name).collect()
    }
}

// ============================================================================
// SEEDED STORE
// ============================================================================

/// A store holding every fixture, with the clock fixed at
/// [`fixtures::reference_time`] and the default configuration.
pub async fn seeded_store() -> SwitchyardResult<TestStore> {
    seeded_store_with(
        Arc::new(FixedClock(fixtures::reference_time())),
        SwitchyardConfig::default(),
    )
    .await
}

/// A store holding every fixture, with a caller-chosen clock and config.
pub async fn seeded_store_with(
    clock: Arc<dyn Clock>,
    config: SwitchyardConfig,
) -> SwitchyardResult<TestStore> {
    let repo = InMemoryPreferenceRepository::new();
    for pref in fixtures::all() {
        repo.insert(&pref).await?;
    }
    PreferenceStore::new(
        Arc::new(repo),
        Arc::new(InMemoryCacheBackend::new()),
        ValueClassPolicy::new(),
        clock,
        config,
    )
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Switchyard-specific results.

    use super::*;

    /// Assert that a SwitchyardResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &SwitchyardResult<T>) {
        match result {
            Err(SwitchyardError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a SwitchyardResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &SwitchyardResult<T>) {
        match result {
            Err(SwitchyardError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a write was rejected by the value class policy.
    #[track_caller]
    pub fn assert_value_class_rejected<T: std::fmt::Debug>(
        result: &SwitchyardResult<T>,
        expected: ValueClass,
    ) {
        match result {
            Err(SwitchyardError::Validation(ValidationError::ValueClassNotAllowed { class }))
                if *class == expected => {}
            other => panic!("Expected {} to be rejected, got: {:?}", expected, other),
        }
    }

    /// Assert that names are strictly ascending (sorted, no duplicates).
    #[track_caller]
    pub fn assert_strictly_ascending(names: &[String]) {
        for pair in names.windows(2) {
            assert!(
                pair[0] < pair[1],
                "Names out of order: {:?} before {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    /// Assert that a preference is live at `now`.
    #[track_caller]
    pub fn assert_active(record: &Preference, now: Timestamp, testing: bool) {
        let state = switchyard_core::activation_state(record, now, testing);
        assert!(
            state.is_active(),
            "Expected {:?} to be active, got {:?}",
            record.name,
            state
        );
    }

    /// Assert that a preference is not live at `now`.
    #[track_caller]
    pub fn assert_inactive(record: &Preference, now: Timestamp, testing: bool) {
        let state = switchyard_core::activation_state(record, now, testing);
        assert!(
            !state.is_active(),
            "Expected {:?} to be inactive, got {:?}",
            record.name,
            state
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
