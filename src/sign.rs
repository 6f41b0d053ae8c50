//! Detached signatures over caller payloads.
//!
//! The payload arrives base64 encoded and the signature is computed over the
//! decoded bytes. Keys with a transparency log address additionally publish
//! every signature; a failed publication fails the call.

use std::io::Cursor;

use pgp::composed::{DetachedSignature, SignedSecretKey};
use pgp::crypto::hash::HashAlgorithm;
use pgp::packet::{SignatureConfig, SignatureType, Subpacket, SubpacketData};
use pgp::ser::Serialize;
use pgp::types::{Duration as PgpDuration, KeyDetails, KeyVersion, SigningKey, Timestamp};
use rand::thread_rng;

use crate::codec;
use crate::error::{Error, Result};
use crate::internal::{decode_base64, encode_base64, keyid_to_hex, subkey_flags, unprotected};
use crate::keystore::KeyRecord;
use crate::subkey::resolve_subkey;
use crate::transparency::{LogEntry, RekordEntry};
use crate::types::{Encoding, SignRequest, SignResponse};
use crate::vault::Vault;

/// Build a detached binary signature over `data` with `key`.
fn sign_detached<K>(key: &K, data: &[u8], hash_alg: HashAlgorithm, expires: u64) -> Result<DetachedSignature>
where
    K: SigningKey + KeyDetails,
{
    let mut rng = thread_rng();

    let mut config = match key.version() {
        KeyVersion::V6 => SignatureConfig::v6(&mut rng, SignatureType::Binary, key.algorithm(), hash_alg)?,
        _ => SignatureConfig::v4(SignatureType::Binary, key.algorithm(), hash_alg),
    };

    config.hashed_subpackets = vec![
        Subpacket::regular(SubpacketData::SignatureCreationTime(Timestamp::now()))?,
        Subpacket::regular(SubpacketData::IssuerFingerprint(key.fingerprint()))?,
    ];
    if expires > 0 {
        let lifetime = u32::try_from(expires)
            .map_err(|_| Error::InvalidInput(format!("expires {} is out of range", expires)))?;
        config.hashed_subpackets.push(Subpacket::regular(
            SubpacketData::SignatureExpirationTime(PgpDuration::from_secs(lifetime)),
        )?);
    }
    if key.version() <= KeyVersion::V4 {
        config.unhashed_subpackets = vec![Subpacket::regular(SubpacketData::IssuerKeyId(
            key.legacy_key_id(),
        ))?];
    }

    let signature = config.sign(key, &unprotected(), Cursor::new(data))?;
    Ok(DetachedSignature::new(signature))
}

/// Sign with the primary key, or with the signing subkey `key_id`.
fn sign_with_entity(entity: &SignedSecretKey, request: &SignRequest, data: &[u8]) -> Result<DetachedSignature> {
    let hash_alg = HashAlgorithm::from(request.algorithm);

    match request.key_id.as_deref().filter(|id| !id.trim().is_empty()) {
        None => sign_detached(&entity.primary_key, data, hash_alg, request.expires),
        Some(key_id) => {
            let index = resolve_subkey(entity, key_id).map_err(|e| match e {
                Error::SubkeyNotFound(_) => Error::NoSigningSubkey(key_id.to_string()),
                other => other,
            })?;
            let subkey = &entity.secret_subkeys[index];
            if !subkey_flags(&subkey.signatures).sign() {
                return Err(Error::NoSigningSubkey(key_id.to_string()));
            }
            log::debug!("signing with subkey {}", keyid_to_hex(&subkey.key));
            sign_detached(&subkey.key, data, hash_alg, request.expires)
        }
    }
}

fn encode_signature(signature: &DetachedSignature, format: Encoding) -> Result<String> {
    match format {
        Encoding::AsciiArmor => signature
            .to_armored_string(None.into())
            .map_err(|e| Error::Crypto(e.to_string())),
        Encoding::Base64 => Ok(encode_base64(&signature.to_bytes()?)),
    }
}

impl Vault {
    /// Detached signature over the base64 payload in `request`.
    pub fn sign(&self, name: &str, request: &SignRequest) -> Result<SignResponse> {
        let data = decode_base64("input", &request.input)?;

        let (record, signature, public_key) = {
            let _guard = self.locks.shared(name);
            let (record, entity) = self.load_entity(name)?;
            let signature = sign_with_entity(&entity, request, &data)?;
            let public_key = match record.log_address() {
                Some(_) => Some(codec::public_armored(&entity)?),
                None => None,
            };
            (record, signature, public_key)
        };

        let log_entry = match public_key {
            Some(public_key) => Some(self.publish(name, &record, &data, &signature, &public_key)?),
            None => None,
        };

        Ok(SignResponse {
            signature: encode_signature(&signature, request.format)?,
            log_entry,
        })
    }

    fn publish(
        &self,
        name: &str,
        record: &KeyRecord,
        artifact: &[u8],
        signature: &DetachedSignature,
        public_key: &str,
    ) -> Result<LogEntry> {
        let server_url = record
            .log_address()
            .ok_or_else(|| Error::TransparencyLog(format!("key {} has no log address", name)))?;

        let entry = RekordEntry::new(artifact, &signature.to_bytes()?, public_key.as_bytes())?;
        let created = self
            .publisher
            .create_log_entry(server_url, &entry)
            .inspect_err(|e| log::warn!("publishing signature of {} to {} failed: {}", name, server_url, e))?;

        let log_entry = LogEntry::from_created(server_url, &created);
        log::info!("published signature of {} as {}", name, log_entry.address);
        Ok(log_entry)
    }
}
