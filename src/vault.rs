//! The vault service object.
//!
//! A [`Vault`] owns the collaborators every operation needs: the storage
//! backend, the striped lock table and the transparency log publisher.
//! Operations are implemented as `impl Vault` blocks next to the logic they
//! drive (`key`, `subkey`, `revoke`, `certify`, `sign`, `verify`, `decrypt`).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pgp::composed::SignedSecretKey;

use crate::codec;
use crate::config::VaultConfig;
use crate::error::{Error, Result};
use crate::internal::fingerprint_to_hex;
use crate::keystore::{KeyRecord, MemoryStorage, NameIndex, Storage};
use crate::locks::LockTable;
use crate::transparency::{TransparencyLogPublisher, UnconfiguredPublisher};

pub struct Vault {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) locks: LockTable,
    index_lock: Mutex<()>,
    pub(crate) publisher: Arc<dyn TransparencyLogPublisher>,
    pub(crate) config: VaultConfig,
}

impl Vault {
    /// Build a vault with the default configuration.
    pub fn new(storage: Arc<dyn Storage>, publisher: Arc<dyn TransparencyLogPublisher>) -> Self {
        let config = VaultConfig::default();
        Self {
            storage,
            locks: LockTable::new(config.lock_stripes),
            index_lock: Mutex::new(()),
            publisher,
            config,
        }
    }

    /// Build a vault with explicit tunables.
    pub fn with_config(
        storage: Arc<dyn Storage>,
        publisher: Arc<dyn TransparencyLogPublisher>,
        config: VaultConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            locks: LockTable::new(config.lock_stripes),
            index_lock: Mutex::new(()),
            publisher,
            config,
        })
    }

    /// Memory-backed vault that refuses transparency log publication.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(UnconfiguredPublisher))
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub(crate) fn load_record(&self, name: &str) -> Result<Option<KeyRecord>> {
        KeyRecord::load(self.storage.as_ref(), name)
    }

    /// Record and decoded entity; a missing name is an error.
    pub(crate) fn load_entity(&self, name: &str) -> Result<(KeyRecord, SignedSecretKey)> {
        let record = self
            .load_record(name)?
            .ok_or_else(|| Error::KeyNotFound(name.to_string()))?;
        let entity = codec::decode(&record.serialized_key)?;
        Ok((record, entity))
    }

    /// Encode and persist a mutated entity, keeping the record's other fields.
    pub(crate) fn store_entity(
        &self,
        name: &str,
        mut record: KeyRecord,
        entity: &mut SignedSecretKey,
    ) -> Result<()> {
        record.serialized_key = codec::encode(entity)?;
        record.save(self.storage.as_ref(), name)?;
        log::debug!("stored entity {} under {}", fingerprint_to_hex(&entity.primary_key), name);
        Ok(())
    }

    fn index_guard(&self) -> MutexGuard<'_, ()> {
        self.index_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn index_bind(&self, fingerprint: &str, name: &str) -> Result<()> {
        let _guard = self.index_guard();
        let mut index = NameIndex::load(self.storage.as_ref())?;
        index.bind(fingerprint, name);
        index.save(self.storage.as_ref())
    }

    pub(crate) fn index_unbind(&self, name: &str) -> Result<()> {
        let _guard = self.index_guard();
        let mut index = NameIndex::load(self.storage.as_ref())?;
        index.unbind_name(name);
        index.save(self.storage.as_ref())
    }

    pub(crate) fn index_lookup(&self, fingerprint: &str) -> Result<Option<String>> {
        let _guard = self.index_guard();
        let index = NameIndex::load(self.storage.as_ref())?;
        Ok(index.lookup(fingerprint).map(str::to_string))
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("lock_stripes", &self.locks.len())
            .field("config", &self.config)
            .finish()
    }
}
