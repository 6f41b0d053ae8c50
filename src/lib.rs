//! # gpgvault
//!
//! A named-key OpenPGP vault built on [rpgp](https://docs.rs/pgp).
//!
//! Private keys live inside the vault under caller chosen names and never
//! need to leave it. Callers manage their lifecycle and use them through a
//! [`Vault`]:
//!
//! - **Key Store**: generate or import, read, list, delete, export and look up keys by fingerprint
//! - **Subkeys**: add, inspect, export and remove RSA signing subkeys
//! - **Revocation**: revoke master keys and subkeys with a reason
//! - **Certification**: certify one stored key's identities with another
//! - **Signing/Verification**: detached signatures over base64 payloads
//! - **Decryption**: decrypt messages and show their session keys
//! - **Transparency Log**: publish signatures to a Rekor log per key
//!
//! ## Quick Start
//!
//! ```no_run
//! use gpgvault::*;
//!
//! let vault = Vault::in_memory();
//! vault
//!     .create_key("alice", &CreateKeyRequest::generate("Alice", "alice@example.com", ""))
//!     .unwrap();
//!
//! let signed = vault.sign("alice", &SignRequest::new("aGVsbG8=")).unwrap();
//! let valid = vault
//!     .verify("alice", &VerifyRequest::new("aGVsbG8=", &signed.signature))
//!     .unwrap();
//! assert!(valid);
//! ```
//!
//! ## Features
//!
//! - `keystore` (default): SQLite-backed storage (requires `rusqlite`)
//! - `network`: Rekor transparency log client (requires `reqwest`)
//!
//! ## Concurrency
//!
//! Every operation on a name holds that name's stripe of a [`LockTable`]:
//! exclusively when it writes the record, shared when it only reads it.

mod error;
mod types;
mod config;
mod internal;

mod codec;
mod locks;
mod vault;
mod key;
mod subkey;
mod revoke;
mod certify;
mod sign;
mod verify;
mod decrypt;
mod transparency;

pub mod keystore;

// Re-export error types
pub use error::{Error, ErrorKind, Result};

// Re-export all public types
pub use types::{
    Capability,
    CreateKeyRequest,
    CreateSubkeyRequest,
    DecryptRequest,
    Encoding,
    ExportedKey,
    FingerprintMatch,
    KeyGenParams,
    KeyInfo,
    KeySource,
    RevocationReason,
    SignRequest,
    SignResponse,
    SignatureHash,
    SubkeyInfo,
    SubkeyType,
    VerifyRequest,
};

pub use config::{
    VaultConfig,
    DEFAULT_KEY_BITS,
    DEFAULT_LOCK_STRIPES,
    DEFAULT_SUBKEY_BITS,
    DEFAULT_SUBKEY_EXPIRY_SECS,
    MIN_SUBKEY_BITS,
};

pub use locks::{LockTable, PairGuard, StripeGuard};
pub use vault::Vault;

pub use keystore::{KeyRecord, MemoryStorage, NameIndex, Storage};
#[cfg(feature = "keystore")]
pub use keystore::SqliteStorage;

// Re-export transparency log types
pub use transparency::{
    CreatedEntry,
    LogEntry,
    RekordEntry,
    TransparencyLogPublisher,
    UnconfiguredPublisher,
};
#[cfg(feature = "network")]
pub use transparency::RekorPublisher;
