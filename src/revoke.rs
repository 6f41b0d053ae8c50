//! Key and subkey revocation.

use pgp::composed::SignedSecretKey;
use pgp::packet::{
    RevocationCode, Signature, SignatureConfig, SignatureType, Subpacket, SubpacketData,
};
use pgp::types::{KeyDetails, KeyVersion, Timestamp};
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::internal::{fingerprint_to_hex, unprotected};
use crate::subkey::resolve_subkey;
use crate::types::RevocationReason;
use crate::vault::Vault;

/// Reason codes defined by RFC 4880 section 5.2.3.23.
const REASON_CODES: [u8; 5] = [0, 1, 2, 3, 32];

fn validate_reason(reason: &RevocationReason) -> Result<()> {
    if !REASON_CODES.contains(&reason.code) {
        return Err(Error::InvalidInput(format!(
            "unknown revocation reason code {}",
            reason.code
        )));
    }
    if reason.text.trim().is_empty() {
        return Err(Error::InvalidInput("revocation reason text is required".to_string()));
    }
    Ok(())
}

fn revocation_config(
    entity: &SignedSecretKey,
    typ: SignatureType,
    reason: &RevocationReason,
) -> Result<SignatureConfig> {
    let mut rng = thread_rng();
    let primary = &entity.primary_key;

    let mut config = SignatureConfig::from_key(&mut rng, primary, typ)?;
    config.hashed_subpackets = vec![
        Subpacket::regular(SubpacketData::SignatureCreationTime(Timestamp::now()))?,
        Subpacket::regular(SubpacketData::IssuerFingerprint(primary.fingerprint()))?,
        Subpacket::regular(SubpacketData::RevocationReason(
            RevocationCode::from(reason.code),
            reason.text.clone().into_bytes().into(),
        ))?,
    ];
    if primary.version() <= KeyVersion::V4 {
        config.unhashed_subpackets = vec![Subpacket::regular(SubpacketData::IssuerKeyId(
            primary.legacy_key_id(),
        ))?];
    }
    Ok(config)
}

/// Revocation signature over the primary key.
pub(crate) fn revoke_primary(entity: &mut SignedSecretKey, reason: &RevocationReason) -> Result<()> {
    let config = revocation_config(entity, SignatureType::KeyRevocation, reason)?;
    let primary = &entity.primary_key;
    let sig: Signature = config.sign_key(primary, &unprotected(), &primary.public_key())?;
    entity.details.revocation_signatures.push(sig);
    Ok(())
}

/// Revocation signature over the subkey at `index`.
pub(crate) fn revoke_subkey_at(
    entity: &mut SignedSecretKey,
    index: usize,
    reason: &RevocationReason,
) -> Result<()> {
    let config = revocation_config(entity, SignatureType::SubkeyRevocation, reason)?;
    let primary = &entity.primary_key;
    let subkey_public = entity.secret_subkeys[index].key.public_key();
    let sig = config.sign_subkey_binding(primary, &primary.public_key(), &unprotected(), &subkey_public)?;
    entity.secret_subkeys[index].signatures.push(sig);
    Ok(())
}

impl Vault {
    /// Revoke the master key. Revocations are appended, never removed.
    pub fn revoke_key(&self, name: &str, reason: &RevocationReason) -> Result<()> {
        validate_reason(reason)?;

        let _guard = self.locks.exclusive(name);
        let (record, mut entity) = self.load_entity(name)?;
        revoke_primary(&mut entity, reason)?;
        self.store_entity(name, record, &mut entity)?;

        log::info!(
            "revoked key {} ({}) with reason {}",
            name,
            fingerprint_to_hex(&entity.primary_key),
            reason.code
        );
        Ok(())
    }

    /// Revoke one subkey; it stays in the entity, marked revoked.
    pub fn revoke_subkey(&self, name: &str, subkey_id: &str, reason: &RevocationReason) -> Result<()> {
        validate_reason(reason)?;

        let _guard = self.locks.exclusive(name);
        let (record, mut entity) = self.load_entity(name)?;
        let index = resolve_subkey(&entity, subkey_id)?;
        revoke_subkey_at(&mut entity, index, reason)?;
        self.store_entity(name, record, &mut entity)?;

        log::info!("revoked subkey {} of {} with reason {}", subkey_id, name, reason.code);
        Ok(())
    }
}
