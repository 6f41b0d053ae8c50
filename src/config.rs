//! Vault tunables.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_LOCK_STRIPES: usize = 256;
pub const DEFAULT_KEY_BITS: usize = 2048;
pub const DEFAULT_SUBKEY_BITS: usize = 4096;
pub const DEFAULT_SUBKEY_EXPIRY_SECS: u64 = 365 * 24 * 3600;
/// Subkeys below this size are refused.
pub const MIN_SUBKEY_BITS: usize = 2048;

/// Runtime configuration of a [`crate::Vault`].
///
/// Loading it from a file is left to the embedding application; every
/// field has a default so a partial document deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Number of lock stripes shared by all key names
    pub lock_stripes: usize,
    /// Size of generated master keys when the request names none
    pub default_key_bits: usize,
    /// Sizes accepted for generated master keys
    pub allowed_key_bits: Vec<usize>,
    pub default_subkey_bits: usize,
    /// Lifetime of new subkeys, 0 for no expiry
    pub default_subkey_expiry_secs: u64,
    /// Timeout for transparency log submissions
    pub publisher_timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            lock_stripes: DEFAULT_LOCK_STRIPES,
            default_key_bits: DEFAULT_KEY_BITS,
            allowed_key_bits: vec![2048, 3072, 4096],
            default_subkey_bits: DEFAULT_SUBKEY_BITS,
            default_subkey_expiry_secs: DEFAULT_SUBKEY_EXPIRY_SECS,
            publisher_timeout_secs: 30,
        }
    }
}

impl VaultConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lock_stripes == 0 {
            return Err(Error::InvalidInput("lock_stripes must be positive".to_string()));
        }
        if self.allowed_key_bits.is_empty() {
            return Err(Error::InvalidInput("allowed_key_bits is empty".to_string()));
        }
        if !self.allowed_key_bits.contains(&self.default_key_bits) {
            return Err(Error::InvalidInput(format!(
                "default_key_bits {} is not an allowed size",
                self.default_key_bits
            )));
        }
        if self.publisher_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "publisher_timeout_secs must be positive".to_string(),
            ));
        }
        if self.default_subkey_bits < MIN_SUBKEY_BITS {
            return Err(Error::InvalidInput(format!(
                "default_subkey_bits must be at least {}",
                MIN_SUBKEY_BITS
            )));
        }
        Ok(())
    }
}
