//! Switchyard Core - Preference Types and Activation Engine
//!
//! Pure data structures and pure functions. No I/O; persistence and caching
//! live in switchyard-storage.

pub mod activation;
pub mod clock;
pub mod config;
pub mod error;
pub mod policy;
pub mod preference;
pub mod value;

pub use activation::{
    activation_state, get_value, is_enabled, turn_off_at, turn_on_at, ActivationState,
    TurnOffMode,
};
pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use config::{CacheSettings, StoreSettings, SwitchyardConfig};
pub use error::{ConfigError, StorageError, SwitchyardError, SwitchyardResult, ValidationError};
pub use policy::{AllowedValueClasses, ValueClassPolicy};
pub use preference::{validate_name, NewPreference, Preference};
pub use value::{PreferenceValue, ValueClass};

use chrono::{DateTime, Utc};
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Preference identifier using UUIDv7 for timestamp-sortable IDs.
pub type PreferenceId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 PreferenceId (timestamp-sortable).
pub fn new_preference_id() -> PreferenceId {
    Uuid::now_v7()
}
