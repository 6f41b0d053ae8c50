//! Error types for the gpgvault library.
//!
//! Every fallible operation returns [`Result`]. Callers that need to react
//! to a class of failure rather than a specific message can use
//! [`Error::kind`].

use thiserror::Error;

/// The main error type for gpgvault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller supplied an invalid parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Hash algorithm or encoding name not supported
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Unsupported input or output format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Key material could not be parsed
    #[error("Key parsing failed: {0}")]
    Parse(String),

    /// Base64 payload could not be decoded
    #[error("Base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Named key was not found
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Subkey selector did not resolve
    #[error("Subkey not found: {0}")]
    SubkeyNotFound(String),

    /// No signing subkey with the requested id
    #[error("No signing subkey matches {0}")]
    NoSigningSubkey(String),

    /// Export requested on a key created as non-exportable
    #[error("Key is not exportable: {0}")]
    NotExportable(String),

    /// Cryptographic operation failed
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    /// Decryption failed or a required signature was missing
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Transparency log submission failed
    #[error("Transparency log error: {0}")]
    TransparencyLog(String),

    /// Network error (network feature)
    #[error("Network error: {0}")]
    Network(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored record could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error (keystore feature)
    #[cfg(feature = "keystore")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// rpgp OpenPGP error
    #[error("OpenPGP error: {0}")]
    OpenPgp(#[from] pgp::errors::Error),

    /// Generic error from anyhow
    #[error("Error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Broad classes of failure, mirroring how callers are expected to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was malformed; nothing was changed.
    Validation,
    /// A name, subkey or fingerprint did not resolve.
    NotFound,
    /// The request was well formed but refused by policy.
    Policy,
    /// A cryptographic step failed.
    Crypto,
    /// The transparency log rejected or could not receive the entry.
    Publisher,
    /// The storage backend failed.
    Storage,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_)
            | Error::UnsupportedAlgorithm(_)
            | Error::UnsupportedFormat(_)
            | Error::Parse(_)
            | Error::Base64(_) => ErrorKind::Validation,
            Error::KeyNotFound(_) | Error::SubkeyNotFound(_) | Error::NoSigningSubkey(_) => {
                ErrorKind::NotFound
            }
            Error::NotExportable(_) => ErrorKind::Policy,
            Error::Crypto(_) | Error::Decryption(_) | Error::OpenPgp(_) | Error::Generic(_) => {
                ErrorKind::Crypto
            }
            Error::TransparencyLog(_) | Error::Network(_) => ErrorKind::Publisher,
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_) => ErrorKind::Storage,
            #[cfg(feature = "keystore")]
            Error::Database(_) => ErrorKind::Storage,
        }
    }
}

/// A specialized Result type for gpgvault operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Crypto(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Crypto(s.to_string())
    }
}
