//! Subkey management.
//!
//! Subkeys are addressed by hex: a 16 digit key ID or a full fingerprint.
//! New subkeys are RSA signing keys of at least 2048 bits, bound to the
//! primary with key flags, an optional lifetime and an embedded
//! back-signature.

use pgp::composed::{
    EncryptionCaps, KeyType, SecretKeyParamsBuilder, SignedSecretKey, SignedSecretSubKey, SubkeyParamsBuilder,
};
use pgp::packet::{KeyFlags, SignatureConfig, SignatureType, Subpacket, SubpacketData};
use pgp::types::{Duration as PgpDuration, KeyDetails, Timestamp};
use rand::thread_rng;

use crate::codec;
use crate::config::MIN_SUBKEY_BITS;
use crate::error::{Error, Result};
use crate::internal::{
    fingerprint_to_hex, keyid_to_hex, rsa_bit_size, subkey_flags, subkey_lifetime, unprotected,
};
use crate::types::{Capability, CreateSubkeyRequest, SubkeyInfo, SubkeyType};
use crate::vault::Vault;

/// A parsed subkey address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubkeySelector {
    KeyId(String),
    Fingerprint(String),
}

impl SubkeySelector {
    pub(crate) fn parse(selector: &str) -> Result<Self> {
        let normalized = selector.trim().replace(' ', "").to_uppercase();
        if hex::decode(&normalized).is_err() {
            return Err(Error::InvalidInput(format!(
                "could not hex decode subkey id {:?}",
                selector
            )));
        }
        match normalized.len() {
            16 => Ok(SubkeySelector::KeyId(normalized)),
            40 | 64 => Ok(SubkeySelector::Fingerprint(normalized)),
            _ => Err(Error::InvalidInput(format!(
                "subkey id {:?} is neither a key ID nor a fingerprint",
                selector
            ))),
        }
    }

    pub(crate) fn matches(&self, key: &impl KeyDetails) -> bool {
        match self {
            SubkeySelector::KeyId(id) => keyid_to_hex(key) == *id,
            SubkeySelector::Fingerprint(fp) => fingerprint_to_hex(key) == *fp,
        }
    }
}

/// Index of the single secret subkey matching `selector`.
pub(crate) fn resolve_subkey(entity: &SignedSecretKey, selector_text: &str) -> Result<usize> {
    let selector = SubkeySelector::parse(selector_text)?;

    if selector.matches(&entity.primary_key) {
        return Err(Error::SubkeyNotFound(format!(
            "{} is the primary key, not a subkey",
            selector_text
        )));
    }

    let matches: Vec<usize> = entity
        .secret_subkeys
        .iter()
        .enumerate()
        .filter(|(_, subkey)| selector.matches(&subkey.key))
        .map(|(index, _)| index)
        .collect();

    match matches.as_slice() {
        [index] => Ok(*index),
        [] => Err(Error::SubkeyNotFound(selector_text.to_string())),
        _ => Err(Error::SubkeyNotFound(format!(
            "{} matches {} subkeys",
            selector_text,
            matches.len()
        ))),
    }
}

fn validate_request(request: &CreateSubkeyRequest) -> Result<()> {
    if request.key_bits < MIN_SUBKEY_BITS {
        return Err(Error::InvalidInput(format!(
            "asymmetric subkeys < {} bits are unsafe",
            MIN_SUBKEY_BITS
        )));
    }
    if request.key_type != SubkeyType::Rsa {
        return Err(Error::InvalidInput(format!(
            "unsupported subkey type {}",
            request.key_type
        )));
    }
    if request.capabilities != [Capability::Sign] {
        return Err(Error::InvalidInput(
            "only subkeys with exactly the sign capability are supported".to_string(),
        ));
    }
    u32::try_from(request.expires)
        .map_err(|_| Error::InvalidInput(format!("expires {} is out of range", request.expires)))?;
    Ok(())
}

/// Generate RSA key material for a new subkey.
///
/// rpgp generates subkeys only together with a primary, so the material is
/// produced under a throwaway Ed25519 primary and re-bound to ours.
fn generate_subkey_material(bits: u32) -> Result<SignedSecretSubKey> {
    let mut rng = thread_rng();

    let mut sign_builder = SubkeyParamsBuilder::default();
    sign_builder
        .key_type(KeyType::Rsa(bits))
        .can_encrypt(EncryptionCaps::None)
        .can_sign(true)
        .can_authenticate(false);
    let subkey_params = sign_builder.build().map_err(|e| Error::Crypto(e.to_string()))?;

    let mut key_params = SecretKeyParamsBuilder::default();
    key_params
        .key_type(KeyType::Ed25519Legacy)
        .can_certify(true)
        .can_sign(false)
        .primary_user_id("subkey carrier".to_string())
        .subkeys(vec![subkey_params]);
    let carrier = key_params
        .build()
        .map_err(|e| Error::Crypto(e.to_string()))?
        .generate(&mut rng)
        .map_err(|e| Error::Crypto(e.to_string()))?;

    carrier
        .secret_subkeys
        .into_iter()
        .next()
        .ok_or_else(|| Error::Crypto("subkey generation produced no subkey".to_string()))
}

/// Bind freshly generated material to `entity` as a signing subkey.
fn bind_signing_subkey(
    entity: &mut SignedSecretKey,
    material: SignedSecretSubKey,
    expires: u64,
) -> Result<String> {
    let mut rng = thread_rng();
    let primary = &entity.primary_key;
    let subkey = material.key;

    let mut flags = KeyFlags::default();
    flags.set_sign(true);

    let backsig = codec::primary_key_binding(&primary.public_key(), &subkey)?;

    let mut hashed_subpackets = vec![
        Subpacket::regular(SubpacketData::SignatureCreationTime(Timestamp::now()))?,
        Subpacket::regular(SubpacketData::IssuerFingerprint(primary.fingerprint()))?,
        Subpacket::regular(SubpacketData::KeyFlags(flags))?,
    ];
    if expires > 0 {
        let lifetime = u32::try_from(expires)
            .map_err(|_| Error::InvalidInput(format!("expires {} is out of range", expires)))?;
        hashed_subpackets.push(Subpacket::regular(SubpacketData::KeyExpirationTime(
            PgpDuration::from_secs(lifetime),
        ))?);
    }
    hashed_subpackets.push(Subpacket::regular(SubpacketData::EmbeddedSignature(Box::new(
        backsig,
    )))?);

    let mut config = SignatureConfig::from_key(&mut rng, primary, SignatureType::SubkeyBinding)?;
    config.hashed_subpackets = hashed_subpackets;
    config.unhashed_subpackets = vec![Subpacket::regular(SubpacketData::IssuerKeyId(
        primary.legacy_key_id(),
    ))?];

    let binding =
        config.sign_subkey_binding(primary, &primary.public_key(), &unprotected(), &subkey.public_key())?;

    let key_id = keyid_to_hex(&subkey);
    entity.secret_subkeys.push(SignedSecretSubKey {
        key: subkey,
        signatures: vec![binding],
    });
    Ok(key_id)
}

impl Vault {
    /// Subkey request carrying this vault's configured size and lifetime.
    pub fn subkey_request(&self) -> CreateSubkeyRequest {
        CreateSubkeyRequest {
            key_bits: self.config.default_subkey_bits,
            expires: self.config.default_subkey_expiry_secs,
            ..Default::default()
        }
    }

    /// Add a signing subkey and return its key ID.
    pub fn create_subkey(&self, name: &str, request: &CreateSubkeyRequest) -> Result<String> {
        validate_request(request)?;
        let bits = u32::try_from(request.key_bits)
            .map_err(|_| Error::InvalidInput(format!("key size {} is out of range", request.key_bits)))?;

        if self.load_record(name)?.is_none() {
            return Err(Error::KeyNotFound(name.to_string()));
        }
        // Generation is slow, keep it outside the stripe.
        let material = generate_subkey_material(bits)?;

        let _guard = self.locks.exclusive(name);
        let (record, mut entity) = self.load_entity(name)?;
        let key_id = bind_signing_subkey(&mut entity, material, request.expires)?;
        self.store_entity(name, record, &mut entity)?;

        log::info!("created subkey {} under {}", key_id, name);
        Ok(key_id)
    }

    /// Key IDs of all subkeys.
    pub fn list_subkeys(&self, name: &str) -> Result<Vec<String>> {
        let _guard = self.locks.shared(name);
        let (_, entity) = self.load_entity(name)?;

        let mut ids: Vec<String> = entity
            .secret_subkeys
            .iter()
            .map(|subkey| keyid_to_hex(&subkey.key))
            .collect();
        ids.extend(
            entity
                .public_subkeys
                .iter()
                .map(|subkey| keyid_to_hex(&subkey.key)),
        );
        Ok(ids)
    }

    pub fn read_subkey(&self, name: &str, subkey_id: &str) -> Result<SubkeyInfo> {
        let _guard = self.locks.shared(name);
        let (_, entity) = self.load_entity(name)?;
        let subkey = &entity.secret_subkeys[resolve_subkey(&entity, subkey_id)?];

        let flags = subkey_flags(&subkey.signatures);
        let mut capabilities = Vec::new();
        if flags.sign() {
            capabilities.push(Capability::Sign);
        }
        if flags.encrypt_comms() || flags.encrypt_storage() {
            capabilities.push(Capability::Encrypt);
        }

        Ok(SubkeyInfo {
            key_type: SubkeyType::Rsa,
            capabilities,
            key_bits: rsa_bit_size(&subkey.key),
            expires: subkey_lifetime(&subkey.signatures),
        })
    }

    pub fn delete_subkey(&self, name: &str, subkey_id: &str) -> Result<()> {
        let _guard = self.locks.exclusive(name);
        let (record, mut entity) = self.load_entity(name)?;

        let index = resolve_subkey(&entity, subkey_id)?;
        let removed = entity.secret_subkeys.remove(index);
        self.store_entity(name, record, &mut entity)?;

        log::info!("deleted subkey {} from {}", keyid_to_hex(&removed.key), name);
        Ok(())
    }

    /// Armored public key carrying only the selected subkey.
    pub fn export_subkey(&self, name: &str, subkey_id: &str) -> Result<String> {
        let _guard = self.locks.shared(name);
        let (_, entity) = self.load_entity(name)?;
        let subkey = &entity.secret_subkeys[resolve_subkey(&entity, subkey_id)?];
        codec::single_subkey_armored(&entity, &fingerprint_to_hex(&subkey.key))
    }
}
