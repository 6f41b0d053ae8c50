//! Transparency log publication.
//!
//! Signing with a key that has a transparency log address submits the
//! artifact, the signature and the signer's public key as a Rekor `rekord`
//! entry. The vault only depends on the [`TransparencyLogPublisher`] trait;
//! [`RekorPublisher`] (feature `network`) is the HTTP implementation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[cfg(feature = "network")]
use crate::config::VaultConfig;
use crate::error::{Error, Result};

/// Locator of a published entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Entry UUID as reported by the log
    pub uuid: String,
    /// Absolute URL of the entry
    pub address: String,
}

/// What a log server returns for an accepted entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEntry {
    /// `ETag` response header
    pub etag: String,
    /// `Location` response header, relative to the server
    pub location: String,
}

impl LogEntry {
    pub fn from_created(server_url: &str, created: &CreatedEntry) -> Self {
        Self {
            uuid: created.etag.trim_matches('"').to_string(),
            address: format!("{}{}", server_url.trim_end_matches('/'), created.location),
        }
    }
}

/// A proposed `rekord` v0.0.1 entry with a PGP signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RekordEntry {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub spec: RekordSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RekordSpec {
    pub signature: RekordSignature,
    pub data: RekordData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RekordSignature {
    pub format: String,
    /// Base64 signature bytes
    pub content: String,
    #[serde(rename = "publicKey")]
    pub public_key: RekordContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RekordContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RekordData {
    /// Base64 artifact bytes
    pub content: String,
}

impl RekordEntry {
    /// Build an entry; every part must be non-empty.
    pub fn new(artifact: &[u8], signature: &[u8], public_key: &[u8]) -> Result<Self> {
        for (part, bytes) in [("artifact", artifact), ("signature", signature), ("public key", public_key)] {
            if bytes.is_empty() {
                return Err(Error::TransparencyLog(format!("refusing to upload an empty {}", part)));
            }
        }

        Ok(Self {
            api_version: "0.0.1".to_string(),
            kind: "rekord".to_string(),
            spec: RekordSpec {
                signature: RekordSignature {
                    format: "pgp".to_string(),
                    content: STANDARD.encode(signature),
                    public_key: RekordContent {
                        content: STANDARD.encode(public_key),
                    },
                },
                data: RekordData {
                    content: STANDARD.encode(artifact),
                },
            },
        })
    }
}

/// Submits entries to a transparency log.
///
/// Implementations keep no state between calls that the vault relies on.
pub trait TransparencyLogPublisher: Send + Sync {
    fn create_log_entry(&self, server_url: &str, entry: &RekordEntry) -> Result<CreatedEntry>;
}

/// Publisher for vaults without transparency log support; always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredPublisher;

impl TransparencyLogPublisher for UnconfiguredPublisher {
    fn create_log_entry(&self, server_url: &str, _entry: &RekordEntry) -> Result<CreatedEntry> {
        Err(Error::TransparencyLog(format!(
            "no transparency log publisher configured for {}",
            server_url
        )))
    }
}

/// Rekor HTTP client.
#[cfg(feature = "network")]
#[derive(Debug, Clone)]
pub struct RekorPublisher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "network")]
impl RekorPublisher {
    /// Client using the vault's `publisher_timeout_secs`.
    pub fn from_config(config: &VaultConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.publisher_timeout_secs)
    }

    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "network")]
impl TransparencyLogPublisher for RekorPublisher {
    fn create_log_entry(&self, server_url: &str, entry: &RekordEntry) -> Result<CreatedEntry> {
        let url = format!("{}/api/v1/log/entries", server_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(entry)
            .send()
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            let body = response.text().unwrap_or_default();
            return Err(Error::TransparencyLog(format!(
                "{} answered {}: {}",
                url, status, body
            )));
        }

        let header = |name: reqwest::header::HeaderName| -> Result<String> {
            response
                .headers()
                .get(&name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| Error::TransparencyLog(format!("response lacks a {} header", name)))
        };

        Ok(CreatedEntry {
            etag: header(reqwest::header::ETAG)?,
            location: header(reqwest::header::LOCATION)?,
        })
    }
}
