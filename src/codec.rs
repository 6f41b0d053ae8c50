//! Entity codec.
//!
//! A stored entity round-trips through three encodings:
//!
//! - **storage**: binary private key carrying every signature, including
//!   third-party certifications and revocations; subkey bindings are
//!   re-certified with the primary key before every write
//! - **public**: armored public key with revocations
//! - **single subkey**: armored public key reduced to one subkey

use std::io::Cursor;

use pgp::composed::{Deserializable, SignedPublicKey, SignedSecretKey};
use pgp::packet::{
    PublicKey, SecretKey, SecretSubkey, Signature, SignatureConfig, SignatureType, Subpacket,
    SubpacketData,
};
use pgp::ser::Serialize;
use pgp::types::{KeyDetails, KeyVersion, Timestamp};

use crate::error::{Error, Result};
use crate::internal::{
    binding_signature, fingerprint_to_hex, public_key_to_armored, secret_key_to_armored,
    secret_key_to_bytes, subkey_flags, unprotected,
};

/// Decode the storage form.
pub(crate) fn decode(bytes: &[u8]) -> Result<SignedSecretKey> {
    SignedSecretKey::from_bytes(Cursor::new(bytes))
        .map_err(|e| Error::Storage(format!("stored entity is corrupt: {}", e)))
}

/// Re-certify subkey bindings, then produce the storage form.
pub(crate) fn encode(entity: &mut SignedSecretKey) -> Result<Vec<u8>> {
    recertify_subkeys(entity)?;
    secret_key_to_bytes(entity)
}

/// Armored public key with primary revocations and all identity signatures.
pub(crate) fn public_armored(entity: &SignedSecretKey) -> Result<String> {
    public_key_to_armored(&entity.to_public_key())
}

/// Armored private key, one entity only.
pub(crate) fn private_armored(entity: &SignedSecretKey) -> Result<String> {
    secret_key_to_armored(entity)
}

/// Armored public key holding only the subkey with this fingerprint.
pub(crate) fn single_subkey_armored(
    entity: &SignedSecretKey,
    subkey_fingerprint: &str,
) -> Result<String> {
    let public = entity.to_public_key();
    let subkey = public
        .public_subkeys
        .iter()
        .find(|subkey| fingerprint_to_hex(&subkey.key) == subkey_fingerprint)
        .cloned()
        .ok_or_else(|| Error::SubkeyNotFound(subkey_fingerprint.to_string()))?;

    let reduced = SignedPublicKey {
        primary_key: public.primary_key.clone(),
        details: public.details.clone(),
        public_subkeys: vec![subkey],
    };
    public_key_to_armored(&reduced)
}

/// Re-sign every subkey binding with the primary key.
///
/// Hashed subpackets are kept as they are, so flags, creation time and
/// lifetime survive. Signing subkeys whose secret half is present get a
/// fresh embedded back-signature. Only v4 primaries are re-certified.
pub(crate) fn recertify_subkeys(entity: &mut SignedSecretKey) -> Result<()> {
    if entity.primary_key.version() != KeyVersion::V4 {
        return Ok(());
    }

    let primary = entity.primary_key.clone();
    let primary_public = primary.public_key();

    for subkey in entity.secret_subkeys.iter_mut() {
        let subkey_public = subkey.key.public_key();
        let rebound = rebind(&primary, &subkey_public, Some(&subkey.key), &subkey.signatures)?;
        replace_binding(&mut subkey.signatures, rebound);
    }
    for subkey in entity.public_subkeys.iter_mut() {
        let rebound = rebind(&primary, &subkey.key, None, &subkey.signatures)?;
        replace_binding(&mut subkey.signatures, rebound);
    }

    log::debug!(
        "re-certified {} subkey binding(s) of {}",
        entity.secret_subkeys.len() + entity.public_subkeys.len(),
        fingerprint_to_hex(&primary_public)
    );
    Ok(())
}

fn replace_binding(signatures: &mut [Signature], rebound: Option<Signature>) {
    let Some(rebound) = rebound else {
        return;
    };
    if let Some(slot) = signatures
        .iter_mut()
        .rev()
        .find(|sig| sig.typ() == Some(SignatureType::SubkeyBinding))
    {
        *slot = rebound;
    }
}

fn rebind<K>(
    primary: &SecretKey,
    subkey: &K,
    subkey_secret: Option<&SecretSubkey>,
    signatures: &[Signature],
) -> Result<Option<Signature>>
where
    K: KeyDetails + Serialize,
{
    let Some(existing) = binding_signature(signatures) else {
        return Ok(None);
    };
    let Some(existing_config) = existing.config() else {
        return Ok(None);
    };

    let back_sign = subkey_flags(signatures).sign();
    let mut hashed = Vec::new();
    for subpacket in existing_config.hashed_subpackets() {
        match (&subpacket.data, subkey_secret) {
            (SubpacketData::EmbeddedSignature(_), Some(secret)) if back_sign => {
                let backsig = primary_key_binding(&primary.public_key(), secret)?;
                hashed.push(Subpacket::regular(SubpacketData::EmbeddedSignature(Box::new(
                    backsig,
                )))?);
            }
            _ => hashed.push(subpacket.clone()),
        }
    }

    let mut config = SignatureConfig::v4(
        SignatureType::SubkeyBinding,
        primary.algorithm(),
        existing_config.hash_alg,
    );
    config.hashed_subpackets = hashed;
    config.unhashed_subpackets = existing_config.unhashed_subpackets().cloned().collect();

    let sig = config.sign_subkey_binding(primary, &primary.public_key(), &unprotected(), subkey)?;
    Ok(Some(sig))
}

/// Embedded signature by a signing subkey over its primary key.
pub(crate) fn primary_key_binding(primary: &PublicKey, subkey: &SecretSubkey) -> Result<Signature> {
    let mut config = SignatureConfig::v4(
        SignatureType::KeyBinding,
        subkey.algorithm(),
        pgp::crypto::hash::HashAlgorithm::Sha256,
    );
    config.hashed_subpackets = vec![
        Subpacket::regular(SubpacketData::SignatureCreationTime(Timestamp::now()))?,
        Subpacket::regular(SubpacketData::IssuerFingerprint(subkey.fingerprint()))?,
    ];
    config.unhashed_subpackets = vec![Subpacket::regular(SubpacketData::IssuerKeyId(
        subkey.legacy_key_id(),
    ))?];

    let sig = config.sign_primary_key_binding(subkey, &subkey.public_key(), &unprotected(), primary)?;
    Ok(sig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b"not an entity"), Err(Error::Storage(_))));
    }

    #[test]
    fn test_storage_round_trip_keeps_binding_valid() {
        let mut entity = crate::key::generate_entity("Codec", "codec@example.com", "", 2048).unwrap();
        let fingerprint = fingerprint_to_hex(&entity.primary_key);

        let bytes = encode(&mut entity).unwrap();
        let mut decoded = decode(&bytes).unwrap();
        assert_eq!(fingerprint_to_hex(&decoded.primary_key), fingerprint);
        assert_eq!(decoded.secret_subkeys.len(), 1);

        // A second pass must still produce a verifiable binding.
        let bytes = encode(&mut decoded).unwrap();
        let decoded = decode(&bytes).unwrap();
        decoded.to_public_key().verify_bindings().unwrap();
    }

    #[test]
    fn test_public_form_has_no_secret_material() {
        let entity = crate::key::generate_entity("Codec", "", "", 2048).unwrap();
        let armored = public_armored(&entity).unwrap();
        assert!(armored.contains("BEGIN PGP PUBLIC KEY BLOCK"));
        assert!(SignedSecretKey::from_armor_single(Cursor::new(armored.as_bytes())).is_err());
    }
}
