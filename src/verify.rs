//! Detached signature verification.
//!
//! Verification answers with a flag. Malformed signatures, foreign signers,
//! expired or revoked keys all resolve to `false`; only a malformed payload
//! or a missing key is an error.

use std::io::Cursor;

use pgp::composed::{Deserializable, DetachedSignature, SignedPublicKey};
use pgp::crypto::hash::HashAlgorithm;

use crate::error::Result;
use crate::internal::{
    decode_base64, is_primary_revoked, is_signature_expired, is_subkey_valid, keyid_to_hex,
    now_secs, parse_public_key,
};
use crate::types::{Encoding, VerifyRequest};
use crate::vault::Vault;

/// Parse a detached signature in the given encoding, `None` when malformed.
pub(crate) fn parse_signature(signature: &str, format: Encoding) -> Option<DetachedSignature> {
    match format {
        Encoding::AsciiArmor => DetachedSignature::from_armor_single(Cursor::new(signature.as_bytes()))
            .map(|(sig, _headers)| sig)
            .ok(),
        Encoding::Base64 => {
            let bytes = decode_base64("signature", signature).ok()?;
            DetachedSignature::from_bytes(Cursor::new(bytes)).ok()
        }
    }
}

/// Check `sig` against the usable keys of `signer`.
fn verify_with_public(signer: &SignedPublicKey, sig: &DetachedSignature, data: &[u8], now: u64) -> bool {
    if is_primary_revoked(&signer.details) {
        log::debug!("key {} is revoked", keyid_to_hex(&signer.primary_key));
        return false;
    }
    if sig.verify(&signer.primary_key, data).is_ok() {
        return true;
    }

    signer.public_subkeys.iter().any(|subkey| {
        if sig.verify(&subkey.key, data).is_err() {
            return false;
        }
        let valid = is_subkey_valid(&subkey.key, &subkey.signatures, now);
        if !valid {
            log::debug!("subkey {} is revoked or expired", keyid_to_hex(&subkey.key));
        }
        valid
    })
}

fn hash_matches(sig: &DetachedSignature, expected: HashAlgorithm) -> bool {
    sig.signature
        .config()
        .map(|config| config.hash_alg == expected)
        .unwrap_or(false)
}

impl Vault {
    /// Whether `request.signature` is a valid signature over the payload
    /// by the key `name` (or by `request.signer_key`).
    pub fn verify(&self, name: &str, request: &VerifyRequest) -> Result<bool> {
        let data = decode_base64("input", &request.input)?;

        let Some(sig) = parse_signature(&request.signature, request.format) else {
            log::debug!("signature for {} does not parse as {:?}", name, request.format);
            return Ok(false);
        };

        if let Some(algorithm) = request.algorithm {
            if !hash_matches(&sig, algorithm.into()) {
                log::debug!("signature for {} does not use {}", name, algorithm);
                return Ok(false);
            }
        }

        let now = now_secs();
        if is_signature_expired(&sig.signature, now) {
            log::debug!("signature for {} has expired", name);
            return Ok(false);
        }

        let valid = {
            let _guard = self.locks.shared(name);
            let (_, entity) = self.load_entity(name)?;
            verify_with_public(&entity.to_public_key(), &sig, &data, now)
        };
        if valid {
            return Ok(true);
        }

        let valid = match request.signer_key.as_deref() {
            Some(armored) => {
                let signer = parse_public_key(armored.as_bytes())?;
                verify_with_public(&signer, &sig, &data, now)
            }
            None => false,
        };
        log::debug!("signature for {} valid: {}", name, valid);
        Ok(valid)
    }
}
