//! Public type definitions for the gpgvault library.
//!
//! Requests arrive as these typed structs; string-typed fields (hash names,
//! encodings, capabilities) are parsed with `FromStr` at the boundary so the
//! core never sees an unvalidated name.

use std::fmt;
use std::str::FromStr;

use pgp::crypto::hash::HashAlgorithm;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::transparency::LogEntry;

/// Hash algorithm used for detached signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureHash {
    #[serde(rename = "sha2-224")]
    Sha224,
    #[default]
    #[serde(rename = "sha2-256")]
    Sha256,
    #[serde(rename = "sha2-384")]
    Sha384,
    #[serde(rename = "sha2-512")]
    Sha512,
}

impl FromStr for SignatureHash {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sha2-224" => Ok(SignatureHash::Sha224),
            "sha2-256" => Ok(SignatureHash::Sha256),
            "sha2-384" => Ok(SignatureHash::Sha384),
            "sha2-512" => Ok(SignatureHash::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for SignatureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignatureHash::Sha224 => "sha2-224",
            SignatureHash::Sha256 => "sha2-256",
            SignatureHash::Sha384 => "sha2-384",
            SignatureHash::Sha512 => "sha2-512",
        };
        f.write_str(name)
    }
}

impl From<SignatureHash> for HashAlgorithm {
    fn from(hash: SignatureHash) -> Self {
        match hash {
            SignatureHash::Sha224 => HashAlgorithm::Sha224,
            SignatureHash::Sha256 => HashAlgorithm::Sha256,
            SignatureHash::Sha384 => HashAlgorithm::Sha384,
            SignatureHash::Sha512 => HashAlgorithm::Sha512,
        }
    }
}

/// Wire encoding for signatures and ciphertexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// Binary OpenPGP packets, base64 encoded
    #[default]
    #[serde(rename = "base64")]
    Base64,
    /// ASCII armor
    #[serde(rename = "ascii-armor")]
    AsciiArmor,
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "base64" => Ok(Encoding::Base64),
            "ascii-armor" => Ok(Encoding::AsciiArmor),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Subkey algorithm. Only RSA subkeys can be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubkeyType {
    #[default]
    #[serde(rename = "rsa")]
    Rsa,
}

impl FromStr for SubkeyType {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rsa" => Ok(SubkeyType::Rsa),
            _ => Err(Error::InvalidInput(format!("unsupported subkey type: {}", s))),
        }
    }
}

impl fmt::Display for SubkeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("rsa")
    }
}

/// What a subkey may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Sign,
    Encrypt,
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sign" => Ok(Capability::Sign),
            "encrypt" => Ok(Capability::Encrypt),
            _ => Err(Error::InvalidInput(format!("unknown capability: {}", s))),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Sign => f.write_str("sign"),
            Capability::Encrypt => f.write_str("encrypt"),
        }
    }
}

/// Identity fields and size for a freshly generated key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyGenParams {
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub comment: String,
    /// RSA modulus size; the configured default when absent
    #[serde(default)]
    pub key_bits: Option<usize>,
}

/// Where the entity of a new key comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    Generate(KeyGenParams),
    /// An armored (or binary) private key taken verbatim
    Import(String),
}

/// Parameters of `Vault::create_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKeyRequest {
    pub source: KeySource,
    #[serde(default)]
    pub exportable: bool,
    #[serde(default)]
    pub transparency_log_address: Option<String>,
}

impl CreateKeyRequest {
    /// Generate a key for the given identity.
    pub fn generate(real_name: &str, email: &str, comment: &str) -> Self {
        Self {
            source: KeySource::Generate(KeyGenParams {
                real_name: real_name.to_string(),
                email: email.to_string(),
                comment: comment.to_string(),
                key_bits: None,
            }),
            exportable: false,
            transparency_log_address: None,
        }
    }

    /// Import an existing private key.
    pub fn import(armored_key: &str) -> Self {
        Self {
            source: KeySource::Import(armored_key.to_string()),
            exportable: false,
            transparency_log_address: None,
        }
    }

    pub fn key_bits(mut self, bits: usize) -> Self {
        if let KeySource::Generate(params) = &mut self.source {
            params.key_bits = Some(bits);
        }
        self
    }

    pub fn exportable(mut self, exportable: bool) -> Self {
        self.exportable = exportable;
        self
    }

    pub fn transparency_log_address(mut self, address: &str) -> Self {
        self.transparency_log_address = Some(address.to_string());
        self
    }
}

/// Public view of a stored key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub fingerprint: String,
    /// Armored public key, revocations included
    pub public_key: String,
    pub exportable: bool,
    pub transparency_log_address: Option<String>,
}

/// Result of a fingerprint lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintMatch {
    pub fingerprint: String,
    pub name: String,
    pub public_key: String,
    pub exportable: bool,
}

/// An exported private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedKey {
    pub name: String,
    pub key: String,
}

/// Parameters of `Vault::create_subkey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSubkeyRequest {
    #[serde(default)]
    pub key_type: SubkeyType,
    pub capabilities: Vec<Capability>,
    pub key_bits: usize,
    /// Lifetime in seconds, 0 for none
    pub expires: u64,
}

impl Default for CreateSubkeyRequest {
    fn default() -> Self {
        Self {
            key_type: SubkeyType::Rsa,
            capabilities: vec![Capability::Sign],
            key_bits: crate::config::DEFAULT_SUBKEY_BITS,
            expires: crate::config::DEFAULT_SUBKEY_EXPIRY_SECS,
        }
    }
}

/// Properties of one subkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubkeyInfo {
    pub key_type: SubkeyType,
    pub capabilities: Vec<Capability>,
    pub key_bits: usize,
    /// Lifetime in seconds from creation, 0 for none
    pub expires: u64,
}

/// RFC 4880 revocation reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationReason {
    pub code: u8,
    pub text: String,
}

impl RevocationReason {
    pub fn new(code: u8, text: &str) -> Self {
        Self {
            code,
            text: text.to_string(),
        }
    }
}

/// Parameters of `Vault::sign`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignRequest {
    /// Base64 encoded payload
    pub input: String,
    #[serde(default)]
    pub algorithm: SignatureHash,
    #[serde(default)]
    pub format: Encoding,
    /// Hex key ID or fingerprint of a signing subkey
    #[serde(default)]
    pub key_id: Option<String>,
    /// Signature lifetime in seconds, 0 for none
    #[serde(default)]
    pub expires: u64,
}

impl SignRequest {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
            ..Default::default()
        }
    }

    pub fn algorithm(mut self, algorithm: SignatureHash) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn format(mut self, format: Encoding) -> Self {
        self.format = format;
        self
    }

    pub fn key_id(mut self, key_id: &str) -> Self {
        self.key_id = Some(key_id.to_string());
        self
    }

    pub fn expires(mut self, secs: u64) -> Self {
        self.expires = secs;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    pub signature: String,
    pub log_entry: Option<LogEntry>,
}

/// Parameters of `Vault::verify`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Base64 encoded payload
    pub input: String,
    pub signature: String,
    #[serde(default)]
    pub format: Encoding,
    /// When set, the signature must use this hash algorithm
    #[serde(default)]
    pub algorithm: Option<SignatureHash>,
    /// Extra armored public key whose keys are also accepted
    #[serde(default)]
    pub signer_key: Option<String>,
}

impl VerifyRequest {
    pub fn new(input: &str, signature: &str) -> Self {
        Self {
            input: input.to_string(),
            signature: signature.to_string(),
            ..Default::default()
        }
    }

    pub fn format(mut self, format: Encoding) -> Self {
        self.format = format;
        self
    }

    pub fn algorithm(mut self, algorithm: SignatureHash) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn signer_key(mut self, armored: &str) -> Self {
        self.signer_key = Some(armored.to_string());
        self
    }
}

/// Parameters of `Vault::decrypt` and `Vault::show_session_key`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub ciphertext: String,
    #[serde(default)]
    pub format: Encoding,
    /// Armored public key that must have signed the message
    #[serde(default)]
    pub signer_key: Option<String>,
}

impl DecryptRequest {
    pub fn new(ciphertext: &str) -> Self {
        Self {
            ciphertext: ciphertext.to_string(),
            ..Default::default()
        }
    }

    pub fn format(mut self, format: Encoding) -> Self {
        self.format = format;
        self
    }

    pub fn signer_key(mut self, armored: &str) -> Self {
        self.signer_key = Some(armored.to_string());
        self
    }
}
