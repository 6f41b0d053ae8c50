//! Key record persistence.
//!
//! The vault sees storage as a flat byte-addressable key/value space. Two
//! kinds of entries live in it:
//!
//! - `key/<name>`: a JSON [`KeyRecord`] holding the serialized private entity,
//!   its exportability flag and an optional transparency log address
//! - `keyIDToNameMap`: a JSON object mapping primary key fingerprints to names
//!
//! # Backends
//!
//! - [`MemoryStorage`]: process-local, for tests and ephemeral vaults
//! - [`SqliteStorage`]: SQLite file or in-memory database (`keystore` feature)
//!
//! ```
//! use gpgvault::{MemoryStorage, Storage};
//!
//! let storage = MemoryStorage::new();
//! storage.put("key/demo", b"{}").unwrap();
//! assert_eq!(storage.list("key/").unwrap(), vec!["demo".to_string()]);
//! ```

mod memory;
mod record;
#[cfg(feature = "keystore")]
mod schema;
#[cfg(feature = "keystore")]
mod store;

pub use memory::MemoryStorage;
pub use record::{KeyRecord, NameIndex, INDEX_ENTRY, KEY_PREFIX};
#[cfg(feature = "keystore")]
pub use store::SqliteStorage;

use crate::error::Result;

/// Byte-addressable key/value store backing a vault.
///
/// Each `put` must replace the whole value atomically.
pub trait Storage: Send + Sync {
    /// Fetch a value, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a value and report whether one was present.
    ///
    /// Absent keys are not an error.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Keys under `prefix`, with the prefix stripped.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}
