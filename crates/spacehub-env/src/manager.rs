//! EnvConfigManager: create, update, delete and list space environments.

use std::sync::Arc;

use spacehub_events::{EnvChangedEvent, Event, EventPublisher};
use spacehub_lifecycle::{Action, PermissionChecker, SpaceAppLifecycle};
use spacehub_state::{Identity, Space, SpaceSecret, SpaceVariable, StateStore, epoch_secs};
use spacehub_vault::SecureConfigStore;
use tracing::{debug, error, info, warn};

use crate::config::EnvConfig;
use crate::entry::{EnvEntry, EnvRecord, EnvUpdate, NewEnvEntry, SecretDigester};
use crate::error::{EnvError, EnvResult};
use crate::validate::Validator;

pub struct EnvConfigManager {
    store: StateStore,
    vault: Arc<dyn SecureConfigStore>,
    publisher: Arc<dyn EventPublisher>,
    permissions: Arc<dyn PermissionChecker>,
    lifecycle: Arc<SpaceAppLifecycle>,
    config: EnvConfig,
    validator: Validator,
    digester: SecretDigester,
}

impl EnvConfigManager {
    pub fn new(
        store: StateStore,
        vault: Arc<dyn SecureConfigStore>,
        publisher: Arc<dyn EventPublisher>,
        permissions: Arc<dyn PermissionChecker>,
        lifecycle: Arc<SpaceAppLifecycle>,
        mut config: EnvConfig,
    ) -> EnvResult<Self> {
        config.set_default();
        let validator = Validator::new(&config)?;
        let digester = if config.secret_digest_key.is_empty() {
            warn!("no secret_digest_key configured, secret digests use a per-process key");
            SecretDigester::new(&rand::random::<[u8; 32]>())?
        } else {
            SecretDigester::new(config.secret_digest_key.as_bytes())?
        };
        Ok(Self {
            store,
            vault,
            publisher,
            permissions,
            lifecycle,
            config,
            validator,
            digester,
        })
    }

    // ── Secrets ───────────────────────────────────────────────────

    pub async fn create_secret(
        &self,
        user: &str,
        space_id: Identity,
        entry: NewEnvEntry,
    ) -> EnvResult<SpaceSecret> {
        self.create(user, space_id, entry, self.config.max_count_space_secret)
            .await
    }

    pub async fn update_secret(
        &self,
        user: &str,
        space_id: Identity,
        secret_id: Identity,
        update: EnvUpdate,
    ) -> EnvResult<SpaceSecret> {
        self.update(user, space_id, secret_id, update).await
    }

    pub async fn delete_secret(
        &self,
        user: &str,
        space_id: Identity,
        secret_id: Identity,
    ) -> EnvResult<()> {
        self.delete::<SpaceSecret>(user, space_id, secret_id).await
    }

    // ── Variables ─────────────────────────────────────────────────

    pub async fn create_variable(
        &self,
        user: &str,
        space_id: Identity,
        entry: NewEnvEntry,
    ) -> EnvResult<SpaceVariable> {
        self.create(user, space_id, entry, self.config.max_count_space_variable)
            .await
    }

    pub async fn update_variable(
        &self,
        user: &str,
        space_id: Identity,
        variable_id: Identity,
        update: EnvUpdate,
    ) -> EnvResult<SpaceVariable> {
        self.update(user, space_id, variable_id, update).await
    }

    pub async fn delete_variable(
        &self,
        user: &str,
        space_id: Identity,
        variable_id: Identity,
    ) -> EnvResult<()> {
        self.delete::<SpaceVariable>(user, space_id, variable_id).await
    }

    // ── Listing ───────────────────────────────────────────────────

    /// Secrets (without values) then variables (with values), each by name.
    pub fn list(&self, user: &str, space_id: Identity) -> EnvResult<Vec<EnvEntry>> {
        self.authorize(user, space_id, Action::Read)?;

        let mut entries: Vec<EnvEntry> = self
            .store
            .list_in_space::<SpaceSecret>(space_id)?
            .iter()
            .map(EnvRecord::to_entry)
            .chain(
                self.store
                    .list_in_space::<SpaceVariable>(space_id)?
                    .iter()
                    .map(EnvRecord::to_entry),
            )
            .collect();
        entries.sort_by(|a, b| (a.kind, &a.name).cmp(&(b.kind, &b.name)));
        Ok(entries)
    }

    // ── Pipelines ─────────────────────────────────────────────────

    async fn create<T: EnvRecord>(
        &self,
        user: &str,
        space_id: Identity,
        entry: NewEnvEntry,
        max: usize,
    ) -> EnvResult<T> {
        self.validator.name(&entry.name)?;
        self.validator.value(&entry.value)?;
        self.validator.desc(entry.desc.as_deref())?;

        self.authorize(user, space_id, Action::Create)?;

        if self.store.find_named::<T>(space_id, &entry.name)?.is_some() {
            return Err(EnvError::Duplicate(format!(
                "{} {} in space {space_id}",
                T::ENV_KIND,
                entry.name
            )));
        }
        let count = self.store.count_in_space::<T>(space_id)?;
        if count >= max {
            warn!(space_id, kind = %T::ENV_KIND, count, max, "environment entry limit reached");
            return Err(EnvError::LimitExceeded { kind: T::KIND, max });
        }

        let path = T::ENV_KIND.vault_path(space_id);
        self.vault.put(&path, &entry.name, &entry.value).await?;

        let mut record = T::build(space_id, &entry, epoch_secs(), &self.digester);
        if let Err(e) = self.store.insert_named(&mut record, max) {
            // The vault value stays behind; the next write of this name replaces it.
            error!(space_id, kind = %T::ENV_KIND, name = %entry.name, error = %e, "environment row insert failed");
            return Err(e.into());
        }
        info!(space_id, %user, kind = %T::ENV_KIND, name = %entry.name, "environment entry created");

        self.announce(user, space_id).await?;
        Ok(record)
    }

    async fn update<T: EnvRecord>(
        &self,
        user: &str,
        space_id: Identity,
        entry_id: Identity,
        update: EnvUpdate,
    ) -> EnvResult<T> {
        if let Some(value) = &update.value {
            self.validator.value(value)?;
        }
        self.validator.desc(update.desc.as_deref())?;

        self.store.get::<Space>(space_id)?;
        let mut record = self.entry_in_space::<T>(space_id, entry_id)?;
        self.authorize(user, space_id, Action::Update)?;

        let value = update.value.filter(|v| !record.value_matches(v, &self.digester));
        let desc = update.desc.filter(|d| record.desc() != Some(d.as_str()));
        if value.is_none() && desc.is_none() {
            debug!(space_id, kind = %T::ENV_KIND, id = entry_id, "environment update is a no-op");
            return Ok(record);
        }

        if let Some(value) = &value {
            let path = T::ENV_KIND.vault_path(space_id);
            self.vault.put(&path, record.name(), value).await?;
            record.set_value(value, &self.digester);
        }
        if desc.is_some() {
            record.set_desc(desc);
        }
        record.set_updated_at(epoch_secs());
        self.store.save(&mut record)?;
        info!(space_id, %user, kind = %T::ENV_KIND, name = %record.name(), "environment entry updated");

        self.announce(user, space_id).await?;
        Ok(record)
    }

    async fn delete<T: EnvRecord>(
        &self,
        user: &str,
        space_id: Identity,
        entry_id: Identity,
    ) -> EnvResult<()> {
        self.store.get::<Space>(space_id)?;
        let record = self.entry_in_space::<T>(space_id, entry_id)?;
        self.authorize(user, space_id, Action::Delete)?;

        let path = T::ENV_KIND.vault_path(space_id);
        self.vault.delete(&path, record.name()).await?;

        if !self.store.remove::<T>(entry_id)? {
            return Err(EnvError::NotFound(format!("{} {entry_id}", T::ENV_KIND)));
        }
        info!(space_id, %user, kind = %T::ENV_KIND, name = %record.name(), "environment entry deleted");

        self.announce(user, space_id).await
    }

    // ── Helpers ───────────────────────────────────────────────────

    fn authorize(&self, user: &str, space_id: Identity, action: Action) -> EnvResult<Space> {
        let space = self.store.get::<Space>(space_id)?;
        if !self.permissions.check(user, &space, action) {
            warn!(space_id, %user, ?action, "permission denied");
            return Err(EnvError::NotFound(format!("space {space_id}")));
        }
        Ok(space)
    }

    fn entry_in_space<T: EnvRecord>(&self, space_id: Identity, entry_id: Identity) -> EnvResult<T> {
        let record = self.store.get::<T>(entry_id)?;
        if record.space_id() != space_id {
            return Err(EnvError::NotFound(format!("{} {entry_id}", T::ENV_KIND)));
        }
        Ok(record)
    }

    /// Steps 6 and 7. The restart is attempted even when the publish failed;
    /// the first failure is returned.
    async fn announce(&self, user: &str, space_id: Identity) -> EnvResult<()> {
        let published = self
            .publisher
            .publish(&Event::SpaceEnvChanged(EnvChangedEvent {
                space_id,
                changed_by: user.to_string(),
            }))
            .await;
        let restarted = self.lifecycle.set_app_restarting(space_id);

        if let Err(e) = published {
            error!(space_id, error = %e, "failed to publish environment change");
            return Err(e.into());
        }
        match restarted {
            Ok(flagged) => {
                debug!(space_id, flagged, "environment change applied");
                Ok(())
            }
            Err(e) => {
                error!(space_id, error = %e, "failed to flag app for restart");
                Err(e.into())
            }
        }
    }
}
