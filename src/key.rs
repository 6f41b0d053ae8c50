//! Key generation and the named key lifecycle.
//!
//! Create (generate or import), read, list, delete, export, fingerprint
//! lookup and per-key configuration.

use pgp::composed::{EncryptionCaps, KeyType, SecretKeyParamsBuilder, SignedSecretKey, SubkeyParamsBuilder};
use rand::thread_rng;

use crate::codec;
use crate::error::{Error, Result};
use crate::internal::{fingerprint_to_hex, parse_secret_key};
use crate::keystore::{KeyRecord, KEY_PREFIX};
use crate::types::{CreateKeyRequest, ExportedKey, FingerprintMatch, KeyInfo, KeySource};
use crate::vault::Vault;

/// Characters that would break the composed `Name (Comment) <email>` label.
const IDENTITY_BREAKERS: [char; 5] = ['(', ')', '<', '>', '\0'];

/// Compose an identity label; empty parts and their separators are omitted.
pub(crate) fn compose_identity(real_name: &str, comment: &str, email: &str) -> Result<String> {
    for (field, value) in [("real_name", real_name), ("comment", comment), ("email", email)] {
        if value.contains(IDENTITY_BREAKERS) {
            return Err(Error::InvalidInput(format!(
                "{} contains an invalid character",
                field
            )));
        }
    }

    let mut uid = real_name.to_string();
    if !comment.is_empty() {
        if !uid.is_empty() {
            uid.push(' ');
        }
        uid.push('(');
        uid.push_str(comment);
        uid.push(')');
    }
    if !email.is_empty() {
        if !uid.is_empty() {
            uid.push(' ');
        }
        uid.push('<');
        uid.push_str(email);
        uid.push('>');
    }

    if uid.is_empty() {
        return Err(Error::InvalidInput(
            "at least one of real_name, comment or email is required".to_string(),
        ));
    }
    Ok(uid)
}

/// Generate an RSA entity: certify+sign primary plus one encryption subkey.
pub(crate) fn generate_entity(
    real_name: &str,
    email: &str,
    comment: &str,
    bits: usize,
) -> Result<SignedSecretKey> {
    let user_id = compose_identity(real_name, comment, email)?;
    let bits = u32::try_from(bits)
        .map_err(|_| Error::InvalidInput(format!("key size {} is out of range", bits)))?;

    let mut rng = thread_rng();

    let mut enc_builder = SubkeyParamsBuilder::default();
    enc_builder
        .key_type(KeyType::Rsa(bits))
        .can_encrypt(EncryptionCaps::All)
        .can_sign(false)
        .can_authenticate(false);
    let encryption_subkey = enc_builder.build().map_err(|e| Error::Crypto(e.to_string()))?;

    let mut key_params = SecretKeyParamsBuilder::default();
    key_params
        .key_type(KeyType::Rsa(bits))
        .can_certify(true)
        .can_sign(true)
        .can_encrypt(EncryptionCaps::None)
        .primary_user_id(user_id)
        .subkeys(vec![encryption_subkey]);

    let secret_key_params = key_params.build().map_err(|e| Error::Crypto(e.to_string()))?;
    secret_key_params
        .generate(&mut rng)
        .map_err(|e| Error::Crypto(e.to_string()))
}

/// Names follow the `\w([\w.-]*\w)?` shape used for storage paths.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let valid = match (name.chars().next(), name.chars().last()) {
        (Some(first), Some(last)) => {
            word(first) && word(last) && name.chars().all(|c| word(c) || c == '-' || c == '.')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid key name: {:?}", name)))
    }
}

impl Vault {
    /// Create or replace the key stored under `name`.
    ///
    /// An existing record with the same name is overwritten.
    ///
    /// ```no_run
    /// use gpgvault::{CreateKeyRequest, Vault};
    ///
    /// let vault = Vault::in_memory();
    /// vault
    ///     .create_key("release", &CreateKeyRequest::generate("Release Bot", "bot@example.com", ""))
    ///     .unwrap();
    /// let info = vault.read_key("release").unwrap().unwrap();
    /// println!("{}", info.fingerprint);
    /// ```
    pub fn create_key(&self, name: &str, request: &CreateKeyRequest) -> Result<()> {
        validate_name(name)?;

        let mut entity = match &request.source {
            KeySource::Generate(params) => {
                let bits = params.key_bits.unwrap_or(self.config.default_key_bits);
                if !self.config.allowed_key_bits.contains(&bits) {
                    return Err(Error::InvalidInput(format!(
                        "unsupported key size {}, expected one of {:?}",
                        bits, self.config.allowed_key_bits
                    )));
                }
                // Validate identity text before spending time on key generation.
                compose_identity(&params.real_name, &params.comment, &params.email)?;
                generate_entity(&params.real_name, &params.email, &params.comment, bits)?
            }
            KeySource::Import(armored) => parse_secret_key(armored.as_bytes())?,
        };
        let fingerprint = fingerprint_to_hex(&entity.primary_key);

        let record = KeyRecord {
            serialized_key: Vec::new(),
            exportable: request.exportable,
            transparency_log_address: request.transparency_log_address.clone().unwrap_or_default(),
        };

        {
            let _guard = self.locks.exclusive(name);
            let previous = self.load_record(name)?;
            if previous.is_some() {
                log::warn!("replacing existing key {}", name);
            }
            self.index_bind(&fingerprint, name)?;
            if let Err(err) = self.store_entity(name, record, &mut entity) {
                self.restore_binding(name, previous.as_ref());
                return Err(err);
            }
        }

        log::info!("created key {} ({})", name, fingerprint);
        Ok(())
    }

    /// Public view of a key, `None` when absent.
    pub fn read_key(&self, name: &str) -> Result<Option<KeyInfo>> {
        let _guard = self.locks.shared(name);
        let Some(record) = self.load_record(name)? else {
            return Ok(None);
        };
        let entity = codec::decode(&record.serialized_key)?;

        Ok(Some(KeyInfo {
            fingerprint: fingerprint_to_hex(&entity.primary_key),
            public_key: codec::public_armored(&entity)?,
            exportable: record.exportable,
            transparency_log_address: record.log_address().map(str::to_string),
        }))
    }

    /// All key names, sorted.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let mut names = self.storage.list(KEY_PREFIX)?;
        names.sort();
        Ok(names)
    }

    /// Remove a key; deleting an absent name succeeds.
    pub fn delete_key(&self, name: &str) -> Result<()> {
        let _guard = self.locks.exclusive(name);
        let removed = self.storage.delete(&KeyRecord::storage_key(name))?;
        self.index_unbind(name)?;
        if removed {
            log::info!("deleted key {}", name);
        } else {
            log::debug!("delete of absent key {}", name);
        }
        Ok(())
    }

    /// Armored private key when the key was created exportable.
    pub fn export_key(&self, name: &str) -> Result<Option<ExportedKey>> {
        let _guard = self.locks.shared(name);
        let Some(record) = self.load_record(name)? else {
            return Ok(None);
        };
        if !record.exportable {
            return Err(Error::NotExportable(name.to_string()));
        }
        let entity = codec::decode(&record.serialized_key)?;

        Ok(Some(ExportedKey {
            name: name.to_string(),
            key: codec::private_armored(&entity)?,
        }))
    }

    /// Resolve a primary key fingerprint (any hex case) to its key.
    pub fn read_key_by_fingerprint(&self, fingerprint: &str) -> Result<Option<FingerprintMatch>> {
        let Some(name) = self.index_lookup(fingerprint)? else {
            return Ok(None);
        };

        let _guard = self.locks.shared(&name);
        let Some(record) = self.load_record(&name)? else {
            return Ok(None);
        };
        let entity = codec::decode(&record.serialized_key)?;
        let stored = fingerprint_to_hex(&entity.primary_key);
        // The name may have been re-created between the index lookup and the lock.
        if !stored.eq_ignore_ascii_case(fingerprint) {
            return Ok(None);
        }

        Ok(Some(FingerprintMatch {
            fingerprint: stored,
            name,
            public_key: codec::public_armored(&entity)?,
            exportable: record.exportable,
        }))
    }

    /// Set the transparency log address; an empty string turns publication off.
    pub fn set_key_config(&self, name: &str, transparency_log_address: &str) -> Result<()> {
        let _guard = self.locks.exclusive(name);
        let mut record = self
            .load_record(name)?
            .ok_or_else(|| Error::KeyNotFound(name.to_string()))?;
        record.transparency_log_address = transparency_log_address.to_string();
        record.save(self.storage.as_ref(), name)?;
        log::info!("updated configuration of key {}", name);
        Ok(())
    }

    /// Point the index back at `previous` after a failed write under `name`.
    fn restore_binding(&self, name: &str, previous: Option<&KeyRecord>) {
        let restored = match previous.map(|record| codec::decode(&record.serialized_key)) {
            Some(Ok(entity)) => self.index_bind(&fingerprint_to_hex(&entity.primary_key), name),
            _ => self.index_unbind(name),
        };
        if let Err(err) = restored {
            log::warn!("could not restore index entry of {}: {}", name, err);
        }
    }
}
