//! Value class whitelist applied on every preference write.

use crate::{PreferenceValue, ValidationError, ValueClass};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// The set of value classes a preference value may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedValueClasses {
    classes: BTreeSet<ValueClass>,
}

impl AllowedValueClasses {
    /// Text, numeric, true, false and null.
    pub fn defaults() -> Self {
        Self::only([
            ValueClass::Text,
            ValueClass::Numeric,
            ValueClass::True,
            ValueClass::False,
            ValueClass::Null,
        ])
    }

    pub fn only(classes: impl IntoIterator<Item = ValueClass>) -> Self {
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn allow(&mut self, class: ValueClass) -> &mut Self {
        self.classes.insert(class);
        self
    }

    pub fn deny(&mut self, class: ValueClass) -> &mut Self {
        self.classes.remove(&class);
        self
    }

    /// Replace the whole whitelist.
    pub fn replace(&mut self, classes: impl IntoIterator<Item = ValueClass>) -> &mut Self {
        self.classes = classes.into_iter().collect();
        self
    }

    pub fn contains(&self, class: ValueClass) -> bool {
        self.classes.contains(&class)
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueClass> + '_ {
        self.classes.iter().copied()
    }
}

impl Default for AllowedValueClasses {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Shared handle to the value class whitelist.
///
/// Clones share the same whitelist, so a `configure` call through any handle
/// is observed by every subsequent validation through every other handle.
/// There is no versioning and no rollback.
#[derive(Debug, Clone, Default)]
pub struct ValueClassPolicy {
    inner: Arc<RwLock<AllowedValueClasses>>,
}

impl ValueClassPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classes(classes: AllowedValueClasses) -> Self {
        Self {
            inner: Arc::new(RwLock::new(classes)),
        }
    }

    /// Apply a caller-supplied mutation to the whitelist.
    ///
    /// ```
    /// use switchyard_core::{ValueClass, ValueClassPolicy};
    ///
    /// let policy = ValueClassPolicy::new();
    /// policy.configure(|classes| {
    ///     classes.replace([ValueClass::Map]);
    /// });
    /// assert!(!policy.is_allowed(&"text".into()));
    /// ```
    pub fn configure<F>(&self, mutate: F)
    where
        F: FnOnce(&mut AllowedValueClasses),
    {
        // A poisoned lock still holds a whole whitelist; keep using it.
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        mutate(&mut guard);
    }

    /// Restore the default whitelist.
    pub fn reset(&self) {
        self.configure(|classes| *classes = AllowedValueClasses::defaults());
    }

    pub fn is_allowed(&self, value: &PreferenceValue) -> bool {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.contains(value.class())
    }

    /// Check a value about to be written: its class must be whitelisted and
    /// every float in it must be finite.
    pub fn validate(&self, value: &PreferenceValue) -> Result<(), ValidationError> {
        if !self.is_allowed(value) {
            return Err(ValidationError::ValueClassNotAllowed {
                class: value.class(),
            });
        }
        match value.non_finite() {
            Some(f) => Err(ValidationError::NonFiniteNumber {
                value: f.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Snapshot of the classes currently allowed.
    pub fn allowed(&self) -> Vec<ValueClass> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_defaults_accept_scalars_and_null() {
        let policy = ValueClassPolicy::new();
        assert!(policy.is_allowed(&"string".into()));
        assert!(policy.is_allowed(&12345.into()));
        assert!(policy.is_allowed(&9.8765.into()));
        assert!(policy.is_allowed(&true.into()));
        assert!(policy.is_allowed(&false.into()));
        assert!(policy.is_allowed(&PreferenceValue::Null));
    }

    #[test]
    fn test_defaults_reject_map_and_list() {
        let policy = ValueClassPolicy::new();
        assert!(!policy.is_allowed(&PreferenceValue::Map(BTreeMap::new())));
        assert_eq!(
            policy.validate(&PreferenceValue::List(vec![])),
            Err(ValidationError::ValueClassNotAllowed {
                class: ValueClass::List
            })
        );
    }

    #[test]
    fn test_configure_is_seen_by_clones() {
        let policy = ValueClassPolicy::new();
        let other = policy.clone();
        let map = PreferenceValue::Map(BTreeMap::new());

        policy.configure(|classes| {
            classes.replace([ValueClass::Map]);
        });
        assert!(other.is_allowed(&map));
        assert!(!other.is_allowed(&"string".into()));

        other.reset();
        assert!(!policy.is_allowed(&map));
        assert!(policy.is_allowed(&"string".into()));
    }

    #[test]
    fn test_validate_rejects_non_finite_floats() {
        let policy = ValueClassPolicy::new();
        for (value, shown) in [
            (f64::INFINITY, "inf"),
            (f64::NEG_INFINITY, "-inf"),
            (f64::NAN, "NaN"),
        ] {
            assert_eq!(
                policy.validate(&value.into()),
                Err(ValidationError::NonFiniteNumber {
                    value: shown.to_string()
                })
            );
        }

        assert_eq!(policy.validate(&(-0.0f64).into()), Ok(()));
        assert_eq!(policy.validate(&f64::MAX.into()), Ok(()));
        assert_eq!(policy.validate(&f64::MIN_POSITIVE.into()), Ok(()));
    }

    #[test]
    fn test_validate_finds_nested_non_finite_floats() {
        let policy = ValueClassPolicy::new();
        policy.configure(|classes| {
            classes.allow(ValueClass::List).allow(ValueClass::Map);
        });

        let nested = PreferenceValue::Map(BTreeMap::from([(
            "ratios".to_string(),
            PreferenceValue::List(vec![1.5.into(), f64::NAN.into()]),
        )]));
        assert!(matches!(
            policy.validate(&nested),
            Err(ValidationError::NonFiniteNumber { .. })
        ));
    }

    #[test]
    fn test_class_is_checked_before_finiteness() {
        let policy = ValueClassPolicy::new();
        policy.configure(|classes| {
            classes.deny(ValueClass::Numeric);
        });
        assert_eq!(
            policy.validate(&f64::NAN.into()),
            Err(ValidationError::ValueClassNotAllowed {
                class: ValueClass::Numeric
            })
        );
    }

    #[test]
    fn test_allow_and_deny() {
        let policy = ValueClassPolicy::new();
        policy.configure(|classes| {
            classes.allow(ValueClass::List).deny(ValueClass::Null);
        });
        assert!(policy.is_allowed(&PreferenceValue::List(vec![])));
        assert!(!policy.is_allowed(&PreferenceValue::Null));
        assert!(policy.allowed().contains(&ValueClass::List));
    }
}
