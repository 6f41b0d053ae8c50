//! Decryption with stored keys.
//!
//! Messages may be addressed to the primary key or any subkey of the named
//! entity. A caller supplied signer key turns signature checking on: the
//! plaintext is only released when that key signed the message.

use std::io::Cursor;

use pgp::composed::{Esk, Message, PlainSessionKey, SignedPublicKey, SignedSecretKey};
use pgp::types::{EskType, PkeskVersion};

use crate::error::{Error, Result};
use crate::internal::{decode_base64, encode_base64, keyid_to_hex, parse_public_key, unprotected};
use crate::types::{DecryptRequest, Encoding};
use crate::vault::Vault;

const SESSION_KEY_FAILURE: &str = "unable to decrypt session key";

/// Raw ciphertext bytes as transported in the request.
fn ciphertext_bytes(request: &DecryptRequest) -> Result<Vec<u8>> {
    match request.format {
        Encoding::Base64 => decode_base64("ciphertext", &request.ciphertext),
        Encoding::AsciiArmor => Ok(request.ciphertext.as_bytes().to_vec()),
    }
}

fn parse_message(bytes: &[u8], format: Encoding) -> Result<Message<'_>> {
    match format {
        Encoding::AsciiArmor => Message::from_armor(Cursor::new(bytes))
            .map(|(message, _headers)| message)
            .map_err(|e| Error::Parse(e.to_string())),
        Encoding::Base64 => Message::from_bytes(bytes).map_err(|e| Error::Parse(e.to_string())),
    }
}

/// Whether the already read `message` carries a signature by `signer`.
fn signed_by(message: &Message<'_>, signer: &SignedPublicKey) -> bool {
    if message.verify(&signer.primary_key).is_ok() {
        return true;
    }
    signer
        .public_subkeys
        .iter()
        .any(|subkey| message.verify(&subkey.key).is_ok())
}

/// Decrypt `bytes` with `entity`, checking the signature when `signer` is set.
fn decrypt_message(
    entity: &SignedSecretKey,
    bytes: &[u8],
    format: Encoding,
    signer: Option<&SignedPublicKey>,
) -> Result<Vec<u8>> {
    let message = parse_message(bytes, format)?;

    let decrypted = message
        .decrypt(&unprotected(), entity)
        .map_err(|e| Error::Decryption(e.to_string()))?;

    let mut message = if decrypted.is_compressed() {
        decrypted
            .decompress()
            .map_err(|e| Error::Decryption(e.to_string()))?
    } else {
        decrypted
    };

    let plaintext = message
        .as_data_vec()
        .map_err(|e| Error::Decryption(e.to_string()))?;

    if let Some(signer) = signer {
        if !signed_by(&message, signer) {
            return Err(Error::Decryption(format!(
                "message is not signed by {}",
                keyid_to_hex(&signer.primary_key)
            )));
        }
    }
    Ok(plaintext)
}

/// Render a session key as `<algorithm id>:<HEX key>`.
fn format_session_key(session_key: &PlainSessionKey) -> Result<String> {
    match session_key {
        PlainSessionKey::V3_4 { sym_alg, key } => Ok(format!(
            "{}:{}",
            u8::from(*sym_alg),
            hex::encode_upper(key.as_ref())
        )),
        _ => Err(Error::Decryption(SESSION_KEY_FAILURE.to_string())),
    }
}

/// Find a session key packet addressed to `entity` and decrypt it.
fn extract_session_key(entity: &SignedSecretKey, bytes: &[u8], format: Encoding) -> Result<PlainSessionKey> {
    let message = parse_message(bytes, format)?;
    let esk_packets = match &message {
        Message::Encrypted { esk, .. } => esk,
        _ => return Err(Error::Decryption("message is not encrypted".to_string())),
    };

    let password = unprotected();
    for esk in esk_packets {
        let Esk::PublicKeyEncryptedSessionKey(pkesk) = esk else {
            continue;
        };
        let esk_type = match pkesk.version() {
            PkeskVersion::V3 => EskType::V3_4,
            PkeskVersion::V6 => EskType::V6,
            _ => continue,
        };
        let Ok(values) = pkesk.values() else {
            continue;
        };

        let primary = &entity.primary_key;
        if pkesk.match_identity(primary) {
            let attempt = primary.unlock(&password, |pub_params, plain| {
                plain.decrypt(pub_params, values, esk_type, primary)
            });
            if let Ok(Ok(session_key)) = attempt {
                return Ok(session_key);
            }
        }

        for subkey in &entity.secret_subkeys {
            let key = &subkey.key;
            if !pkesk.match_identity(key) {
                continue;
            }
            let attempt = key.unlock(&password, |pub_params, plain| {
                plain.decrypt(pub_params, values, esk_type, key)
            });
            match attempt {
                Ok(Ok(session_key)) => return Ok(session_key),
                Ok(Err(e)) | Err(e) => {
                    log::debug!("subkey {} did not open the session key: {}", keyid_to_hex(key), e)
                }
            }
        }
    }

    Err(Error::Decryption(SESSION_KEY_FAILURE.to_string()))
}

impl Vault {
    /// Decrypt a message and return the plaintext base64 encoded.
    pub fn decrypt(&self, name: &str, request: &DecryptRequest) -> Result<String> {
        let bytes = ciphertext_bytes(request)?;
        let signer = match request.signer_key.as_deref() {
            Some(armored) => Some(parse_public_key(armored.as_bytes())?),
            None => None,
        };

        let plaintext = {
            let _guard = self.locks.shared(name);
            let (_, entity) = self.load_entity(name)?;
            decrypt_message(&entity, &bytes, request.format, signer.as_ref())?
        };

        log::debug!("decrypted message with {}", name);
        Ok(encode_base64(&plaintext))
    }

    /// Session key of a message addressed to `name`, as `<algorithm>:<HEX key>`.
    pub fn show_session_key(&self, name: &str, request: &DecryptRequest) -> Result<String> {
        let bytes = ciphertext_bytes(request)?;
        if let Some(armored) = request.signer_key.as_deref() {
            parse_public_key(armored.as_bytes())?;
        }

        let session_key = {
            let _guard = self.locks.shared(name);
            let (_, entity) = self.load_entity(name)?;
            extract_session_key(&entity, &bytes, request.format)?
        };
        format_session_key(&session_key)
    }
}
