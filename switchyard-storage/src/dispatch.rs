//! Operations addressed by preference name.
//!
//! A name that does not resolve to a stored preference behaves like a
//! disabled one: no value, not enabled, nothing applied. It is never an
//! error.

use serde::{Deserialize, Serialize};
use switchyard_core::{Preference, PreferenceValue, SwitchyardResult, Timestamp};
use tracing::debug;

use crate::cache::CacheBackend;
use crate::store::PreferenceStore;
use crate::PreferenceRepository;

/// The closed set of operations that can be run against a name.
///
/// A transition without `at` takes effect at the store's current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PreferenceOp {
    GetValue { testing: bool },
    IsEnabled { testing: bool },
    TurnOnAt {
        #[serde(default)]
        at: Option<Timestamp>,
        #[serde(default)]
        finish_at: Option<Timestamp>,
    },
    TurnOffAt {
        #[serde(default)]
        at: Option<Timestamp>,
    },
}

/// Result of a [`PreferenceOp`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "result", rename_all = "snake_case")]
pub enum OpOutcome {
    /// `GetValue`: `None` when the preference is missing or not live.
    Value(Option<PreferenceValue>),
    /// `IsEnabled`: `false` when the preference is missing.
    Enabled(bool),
    /// `TurnOnAt` / `TurnOffAt`: `false` when the preference is missing.
    Applied(bool),
}

impl<R, C> PreferenceStore<R, C>
where
    R: PreferenceRepository,
    C: CacheBackend,
{
    /// Load `name` uncached and run `op` against it.
    ///
    /// Repository failures still propagate; only a missing name is folded
    /// into the outcome.
    pub async fn dispatch(&self, name: &str, op: PreferenceOp) -> SwitchyardResult<OpOutcome> {
        let outcome = match op {
            PreferenceOp::GetValue { testing } => OpOutcome::Value(self.value(name, testing).await?),
            PreferenceOp::IsEnabled { testing } => {
                OpOutcome::Enabled(self.enabled(name, testing).await?)
            }
            PreferenceOp::TurnOnAt { at, finish_at } => {
                OpOutcome::Applied(self.turn_on_at_by_name(name, at, finish_at).await?)
            }
            PreferenceOp::TurnOffAt { at } => {
                OpOutcome::Applied(self.turn_off_at_by_name(name, at).await?)
            }
        };
        Ok(outcome)
    }

    /// Value of `name` if it exists and is live now.
    pub async fn value(&self, name: &str, testing: bool) -> SwitchyardResult<Option<PreferenceValue>> {
        let record = self.load_target(name, "get_value").await?;
        Ok(record.and_then(|record| self.get_value(&record, testing)))
    }

    /// Whether `name` exists and is live now.
    pub async fn enabled(&self, name: &str, testing: bool) -> SwitchyardResult<bool> {
        let record = self.load_target(name, "is_enabled").await?;
        Ok(record.is_some_and(|record| self.is_enabled(&record, testing)))
    }

    /// Turn `name` on at `at`, or now. Returns whether the preference existed.
    pub async fn turn_on_at_by_name(
        &self,
        name: &str,
        at: Option<Timestamp>,
        finish_at: Option<Timestamp>,
    ) -> SwitchyardResult<bool> {
        let Some(mut record) = self.load_target(name, "turn_on_at").await? else {
            return Ok(false);
        };
        let at = at.unwrap_or_else(|| self.now());
        self.turn_on_at(&mut record, at, finish_at).await?;
        Ok(true)
    }

    /// Turn `name` off at `at`, or now. Returns whether the preference existed.
    pub async fn turn_off_at_by_name(
        &self,
        name: &str,
        at: Option<Timestamp>,
    ) -> SwitchyardResult<bool> {
        let Some(mut record) = self.load_target(name, "turn_off_at").await? else {
            return Ok(false);
        };
        let at = at.unwrap_or_else(|| self.now());
        self.turn_off_at(&mut record, at).await?;
        Ok(true)
    }

    async fn load_target(&self, name: &str, op: &'static str) -> SwitchyardResult<Option<Preference>> {
        let record = self.find_by_name(name).await?;
        if record.is_none() {
            debug!(name = %name, op, "operation on missing preference");
        }
        Ok(record)
    }
}
