//! Preference store: repository, cache, value policy and clock behind one
//! facade.

use std::collections::BTreeSet;
use std::sync::Arc;

use switchyard_core::{
    activation, validate_name, ActivationState, Clock, NewPreference, Preference,
    PreferenceValue, StorageError, SwitchyardConfig, SwitchyardResult, SystemClock, Timestamp,
    ValidationError, ValueClassPolicy,
};
use tracing::{debug, info, warn};

use crate::cache::{CacheBackend, CacheRead, ReadThroughCache};
use crate::PreferenceRepository;

/// Facade over preference persistence.
///
/// Reads that feed display or bulk checks (`all_names`, `find_by_names`) go
/// through the read-through cache and return snapshots. Anything that is
/// about to be mutated must be loaded with [`find_by_name`](Self::find_by_name),
/// which always reads the repository.
pub struct PreferenceStore<R, C>
where
    R: PreferenceRepository,
    C: CacheBackend,
{
    repo: Arc<R>,
    cache: ReadThroughCache<C>,
    policy: ValueClassPolicy,
    clock: Arc<dyn Clock>,
    config: SwitchyardConfig,
}

impl<R, C> Clone for PreferenceStore<R, C>
where
    R: PreferenceRepository,
    C: CacheBackend,
{
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            cache: self.cache.clone(),
            policy: self.policy.clone(),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<R, C> PreferenceStore<R, C>
where
    R: PreferenceRepository,
    C: CacheBackend,
{
    /// Create a store. Fails if `config` does not validate.
    pub fn new(
        repo: Arc<R>,
        cache_backend: Arc<C>,
        policy: ValueClassPolicy,
        clock: Arc<dyn Clock>,
        config: SwitchyardConfig,
    ) -> SwitchyardResult<Self> {
        config.validate()?;
        let cache = ReadThroughCache::new(cache_backend, config.cache.clone());
        Ok(Self {
            repo,
            cache,
            policy,
            clock,
            config,
        })
    }

    /// Create a store with the default policy, the system clock and the
    /// default configuration.
    pub fn with_defaults(repo: Arc<R>, cache_backend: Arc<C>) -> SwitchyardResult<Self> {
        Self::new(
            repo,
            cache_backend,
            ValueClassPolicy::new(),
            Arc::new(SystemClock),
            SwitchyardConfig::default(),
        )
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn cache(&self) -> &ReadThroughCache<C> {
        &self.cache
    }

    /// The value class policy. Configuring it through this handle affects
    /// every later write.
    pub fn policy(&self) -> &ValueClassPolicy {
        &self.policy
    }

    pub fn config(&self) -> &SwitchyardConfig {
        &self.config
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Uncached lookup by exact name.
    pub async fn find_by_name(&self, name: &str) -> SwitchyardResult<Option<Preference>> {
        self.repo.get_by_name(name).await
    }

    /// Cached bulk lookup. Unknown names are dropped; the result is ordered
    /// by name ascending.
    pub async fn find_by_names<I, S>(&self, names: I) -> SwitchyardResult<Vec<Preference>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.find_by_names_read(names).await?.into_value())
    }

    /// [`find_by_names`](Self::find_by_names) with cache metadata.
    pub async fn find_by_names_read<I, S>(
        &self,
        names: I,
    ) -> SwitchyardResult<CacheRead<Vec<Preference>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Ok(CacheRead::from_repository(Vec::new(), chrono::Utc::now()));
        }

        let key = self.cache.key_by_names(&names);
        self.cache
            .fetch_or_compute(&key, || self.repo.list_by_names(&names))
            .await
    }

    /// Cached listing of every preference name, ascending.
    pub async fn all_names(&self) -> SwitchyardResult<Vec<String>> {
        Ok(self.all_names_read().await?.into_value())
    }

    /// [`all_names`](Self::all_names) with cache metadata.
    pub async fn all_names_read(&self) -> SwitchyardResult<CacheRead<Vec<String>>> {
        let key = self.cache.key_all_names();
        self.cache
            .fetch_or_compute(&key, || self.repo.list_names())
            .await
    }

    /// Preferences released for general use. Uncached.
    pub async fn list_available(&self) -> SwitchyardResult<Vec<Preference>> {
        let all = self.repo.list_all().await?;
        Ok(all.into_iter().filter(|p| p.available).collect())
    }

    /// Preferences not yet released. Uncached.
    pub async fn list_unavailable(&self) -> SwitchyardResult<Vec<Preference>> {
        let all = self.repo.list_all().await?;
        Ok(all.into_iter().filter(|p| !p.available).collect())
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Validate and insert a new preference.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::BlankName`] for an empty or whitespace-only name
    /// - [`ValidationError::DuplicateName`] when the name is already stored
    /// - [`ValidationError::ValueClassNotAllowed`] when the policy rejects
    ///   the value
    /// - [`StorageError::DuplicateName`] when a concurrent creator inserted
    ///   the name between the check and the insert
    pub async fn create(&self, new: NewPreference) -> SwitchyardResult<Preference> {
        validate_name(&new.name)?;
        self.check_value(&new.name, &new.value)?;

        if self.repo.get_by_name(&new.name).await?.is_some() {
            return Err(ValidationError::DuplicateName { name: new.name }.into());
        }

        let preference = new.into_preference(self.now());
        self.repo.insert(&preference).await?;
        self.cache.invalidate(&self.cache.key_all_names()).await?;

        info!(
            name = %preference.name,
            preference_id = %preference.preference_id,
            enabled = preference.enabled,
            available = preference.available,
            "preference created"
        );
        Ok(preference)
    }

    /// Return the stored preference named `new.name`, creating it from `new`
    /// if there is none. The other fields of `new` are ignored when the
    /// preference exists.
    ///
    /// Losing a creation race to a concurrent caller is not an error: the
    /// name is read again, up to `store.find_or_create_attempts` times.
    pub async fn find_or_create(&self, new: NewPreference) -> SwitchyardResult<Preference> {
        let attempts = self.config.store.find_or_create_attempts;

        for attempt in 1..=attempts {
            if let Some(existing) = self.repo.get_by_name(&new.name).await? {
                return Ok(existing);
            }

            match self.create(new.clone()).await {
                Ok(created) => return Ok(created),
                Err(e) if e.is_duplicate_name() => {
                    warn!(name = %new.name, attempt, "lost creation race, re-reading");
                }
                Err(e) => return Err(e),
            }
        }

        self.repo
            .get_by_name(&new.name)
            .await?
            .ok_or_else(|| StorageError::DuplicateName { name: new.name }.into())
    }

    /// Validate and persist `record`, stamping `updated_at`.
    ///
    /// Concurrent saves of the same record overwrite each other. A rename is
    /// checked for uniqueness and refreshes the cached name listing; other
    /// field changes leave bulk cache entries as they are.
    pub async fn save(&self, record: &mut Preference) -> SwitchyardResult<()> {
        validate_name(&record.name)?;
        self.check_value(&record.name, &record.value)?;

        let holder = self.repo.get_by_name(&record.name).await?;
        if let Some(holder) = &holder {
            if holder.preference_id != record.preference_id {
                return Err(ValidationError::DuplicateName {
                    name: record.name.clone(),
                }
                .into());
            }
        }

        let mut staged = record.clone();
        staged.updated_at = self.now();
        self.repo.update(&staged).await?;
        *record = staged;

        // Nothing held this name before, so the update was a rename.
        if holder.is_none() {
            self.cache.invalidate(&self.cache.key_all_names()).await?;
            info!(name = %record.name, preference_id = %record.preference_id, "preference renamed");
        } else {
            debug!(name = %record.name, "preference saved");
        }
        Ok(())
    }

    fn check_value(&self, name: &str, value: &PreferenceValue) -> SwitchyardResult<()> {
        self.policy.validate(value).map_err(|e| {
            warn!(name = %name, class = %value.class(), error = %e, "value rejected");
            e.into()
        })
    }

    // ========================================================================
    // ACTIVATION
    // ========================================================================

    /// Whether `record` is live now.
    pub fn is_enabled(&self, record: &Preference, testing: bool) -> bool {
        activation::is_enabled(record, self.now(), testing)
    }

    /// The value of `record` if it is live now.
    pub fn get_value(&self, record: &Preference, testing: bool) -> Option<PreferenceValue> {
        activation::get_value(record, self.now(), testing)
    }

    /// Why `record` is or is not live now.
    pub fn activation_state(&self, record: &Preference, testing: bool) -> ActivationState {
        activation::activation_state(record, self.now(), testing)
    }

    /// Open the window of `record` at `time` and persist it. `record` is
    /// left untouched if the save fails.
    pub async fn turn_on_at(
        &self,
        record: &mut Preference,
        time: Timestamp,
        finish_at: Option<Timestamp>,
    ) -> SwitchyardResult<()> {
        let mut staged = record.clone();
        activation::turn_on_at(&mut staged, time, finish_at);
        self.save(&mut staged).await?;
        *record = staged;
        info!(
            name = %record.name,
            begin_at = %time,
            end_at = ?finish_at,
            "preference turned on"
        );
        Ok(())
    }

    /// Close the window of `record` at `time` and persist it. `record` is
    /// left untouched if the save fails.
    pub async fn turn_off_at(&self, record: &mut Preference, time: Timestamp) -> SwitchyardResult<()> {
        let mode = self.config.store.turn_off_mode;
        let mut staged = record.clone();
        activation::turn_off_at(&mut staged, time, mode);
        self.save(&mut staged).await?;
        *record = staged;
        info!(
            name = %record.name,
            end_at = %time,
            mode = ?mode,
            "preference turned off"
        );
        Ok(())
    }
}
