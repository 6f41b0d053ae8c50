//! Key validity policy.
//!
//! rpgp verifies signatures but leaves expiry and revocation to the caller,
//! so verification decisions live here.

use pgp::composed::SignedKeyDetails;
use pgp::packet::{KeyFlags, Signature, SignatureType, SubpacketData};
use pgp::types::KeyDetails;

/// A lifetime of 0 never expires. Expiry is exclusive of the boundary second.
pub(crate) fn is_expired(created_secs: u64, validity_secs: u64, now: u64) -> bool {
    validity_secs != 0 && now > created_secs.saturating_add(validity_secs)
}

/// The most recent binding signature of a subkey.
pub(crate) fn binding_signature(signatures: &[Signature]) -> Option<&Signature> {
    signatures
        .iter()
        .rev()
        .find(|sig| sig.typ() == Some(SignatureType::SubkeyBinding))
}

/// Check if a subkey carries a revocation.
pub(crate) fn is_subkey_revoked(signatures: &[Signature]) -> bool {
    signatures
        .iter()
        .any(|sig| sig.typ() == Some(SignatureType::SubkeyRevocation))
}

/// Subkey lifetime in seconds from its binding signature, 0 when unbounded.
pub(crate) fn subkey_lifetime(signatures: &[Signature]) -> u64 {
    binding_signature(signatures)
        .and_then(|sig| sig.key_expiration_time())
        .map(|validity| validity.as_secs() as u64)
        .unwrap_or(0)
}

/// Capability flags recorded on the binding signature.
pub(crate) fn subkey_flags(signatures: &[Signature]) -> KeyFlags {
    binding_signature(signatures)
        .map(|sig| sig.key_flags())
        .unwrap_or_default()
}

/// A subkey is usable when it is neither revoked nor past its lifetime.
pub(crate) fn is_subkey_valid(key: &impl KeyDetails, signatures: &[Signature], now: u64) -> bool {
    if is_subkey_revoked(signatures) {
        return false;
    }
    let created = key.created_at().as_secs() as u64;
    !is_expired(created, subkey_lifetime(signatures), now)
}

pub(crate) fn is_primary_revoked(details: &SignedKeyDetails) -> bool {
    details
        .revocation_signatures
        .iter()
        .any(|sig| sig.typ() == Some(SignatureType::KeyRevocation))
}

/// Creation time and lifetime of a signature, both in seconds.
fn signature_window(sig: &Signature) -> (Option<u64>, u64) {
    let mut created = None;
    let mut lifetime = 0;
    if let Some(config) = sig.config() {
        for subpacket in config.hashed_subpackets() {
            match &subpacket.data {
                SubpacketData::SignatureCreationTime(ts) => created = Some(ts.as_secs() as u64),
                SubpacketData::SignatureExpirationTime(d) => lifetime = d.as_secs() as u64,
                _ => {}
            }
        }
    }
    (created, lifetime)
}

pub(crate) fn is_signature_expired(sig: &Signature, now: u64) -> bool {
    match signature_window(sig) {
        (Some(created), lifetime) => is_expired(created, lifetime, now),
        (None, _) => false,
    }
}

/// Reason code and text carried by a revocation signature.
pub(crate) fn revocation_reason(sig: &Signature) -> Option<(u8, String)> {
    let config = sig.config()?;
    config.hashed_subpackets().find_map(|subpacket| match &subpacket.data {
        SubpacketData::RevocationReason(code, text) => {
            Some((u8::from(*code), String::from_utf8_lossy(text).into_owned()))
        }
        _ => None,
    })
}
