//! The preference record.

use crate::{new_preference_id, PreferenceId, PreferenceValue, Timestamp, ValidationError};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One named preference and its flag and time-window state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub preference_id: PreferenceId,
    pub name: String,
    #[serde(default)]
    pub value: PreferenceValue,
    pub description: Option<String>,
    pub begin_at: Option<Timestamp>,
    pub end_at: Option<Timestamp>,
    /// Administrative on/off switch.
    #[serde(default)]
    pub enabled: bool,
    /// Release switch owned by access control. Never written by the
    /// activation engine.
    #[serde(default)]
    pub available: bool,
    pub updated_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Preference {
    /// A disabled, unavailable preference with a null value.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            preference_id: new_preference_id(),
            name: name.into(),
            value: PreferenceValue::Null,
            description: None,
            begin_at: None,
            end_at: None,
            enabled: false,
            available: false,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_value(mut self, value: impl Into<PreferenceValue>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_flags(mut self, enabled: bool, available: bool) -> Self {
        self.enabled = enabled;
        self.available = available;
        self
    }

    pub fn with_window(mut self, begin_at: Option<Timestamp>, end_at: Option<Timestamp>) -> Self {
        self.begin_at = begin_at;
        self.end_at = end_at;
        self
    }
}

/// Fields for creating a preference.
///
/// `find_or_create` ignores everything but `name` when the preference
/// already exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPreference {
    pub name: String,
    pub enabled: bool,
    pub available: bool,
    pub value: PreferenceValue,
    pub description: Option<String>,
    pub updated_by: Option<String>,
}

impl NewPreference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn value(mut self, value: impl Into<PreferenceValue>) -> Self {
        self.value = value.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn updated_by(mut self, updated_by: impl Into<String>) -> Self {
        self.updated_by = Some(updated_by.into());
        self
    }

    /// Build the record to insert, stamped with `now`.
    pub fn into_preference(self, now: Timestamp) -> Preference {
        Preference {
            preference_id: new_preference_id(),
            name: self.name,
            value: self.value,
            description: self.description,
            begin_at: None,
            end_at: None,
            enabled: self.enabled,
            available: self.available,
            updated_by: self.updated_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Reject blank names. Whitespace-only counts as blank.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::BlankName);
    }
    Ok(())
}
