//! Vault integration tests.
//!
//! Keys are generated with RSA 2048 unless a test is about larger sizes;
//! those are ignored by default because RSA 4096 generation is slow.

use std::io::{BufReader, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pgp::armor::Dearmor;
use pgp::composed::{Deserializable, MessageBuilder, SignedPublicKey, SignedSecretKey};
use pgp::crypto::hash::HashAlgorithm;
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::packet::{SignatureType, SubpacketData};
use pgp::types::{KeyDetails, Password, PublicParams};
use rand::thread_rng;
use rsa::traits::PublicKeyParts;

use gpgvault::keystore::INDEX_ENTRY;
use gpgvault::{
    CreateKeyRequest, CreateSubkeyRequest, DecryptRequest, Encoding, Error, ErrorKind,
    MemoryStorage, NameIndex, RevocationReason, SignRequest, SignatureHash, Storage,
    UnconfiguredPublisher, Vault, VerifyRequest,
};

fn b64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

fn vault_with_key(name: &str) -> Vault {
    let vault = Vault::in_memory();
    vault
        .create_key(name, &CreateKeyRequest::generate(name, "", "").exportable(true))
        .unwrap();
    vault
}

fn public_key(vault: &Vault, name: &str) -> SignedPublicKey {
    let info = vault.read_key(name).unwrap().unwrap();
    let (key, _headers) = SignedPublicKey::from_armor_single(Cursor::new(info.public_key.as_bytes())).unwrap();
    key
}

fn secret_key(vault: &Vault, name: &str) -> SignedSecretKey {
    let exported = vault.export_key(name).unwrap().unwrap();
    let (key, _headers) = SignedSecretKey::from_armor_single(Cursor::new(exported.key.as_bytes())).unwrap();
    key
}

fn bit_length(key: &impl KeyDetails) -> usize {
    match key.public_params() {
        PublicParams::RSA(params) => params.key.size() * 8,
        _ => 0,
    }
}

fn small_subkey(expires: u64) -> CreateSubkeyRequest {
    CreateSubkeyRequest {
        key_bits: 2048,
        expires,
        ..Default::default()
    }
}

fn scenario(bits: usize) {
    let vault = Vault::in_memory();
    vault
        .create_key(
            "test",
            &CreateKeyRequest::generate("test", "test@example.com", "").key_bits(bits).exportable(true),
        )
        .unwrap();
    vault.create_key("test2", &CreateKeyRequest::generate("test2", "", "")).unwrap();
    vault.create_key("test3", &CreateKeyRequest::generate("test3", "", "")).unwrap();

    let info = vault.read_key("test").unwrap().unwrap();
    let public = public_key(&vault, "test");
    assert_eq!(info.fingerprint, hex::encode_upper(public.primary_key.fingerprint().as_bytes()));
    assert_eq!(bit_length(&public.primary_key), bits);

    vault.delete_key("test").unwrap();
    assert_eq!(vault.list_keys().unwrap(), vec!["test2".to_string(), "test3".to_string()]);
    assert!(vault.read_key("test").unwrap().is_none());
}

#[test]
#[ignore = "RSA4k key generation is slow"]
fn test_key_lifecycle_scenario_rsa4k() {
    scenario(4096);
}

#[test]
fn test_key_lifecycle_scenario() {
    scenario(2048);
}

#[test]
fn test_generated_identity_round_trip() {
    let vault = Vault::in_memory();
    vault
        .create_key("alice", &CreateKeyRequest::generate("Alice", "alice@example.com", "work"))
        .unwrap();

    let public = public_key(&vault, "alice");
    assert_eq!(public.details.users.len(), 1);
    assert_eq!(public.details.users[0].id.id(), b"Alice (work) <alice@example.com>");
    assert_eq!(bit_length(&public.primary_key), 2048);
    assert_eq!(public.public_subkeys.len(), 1);
}

#[test]
fn test_create_key_validation() {
    let vault = Vault::in_memory();

    let err = vault
        .create_key("bad", &CreateKeyRequest::generate("<Mallory>", "", ""))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = vault
        .create_key("bad", &CreateKeyRequest::generate("Bits", "", "").key_bits(1024))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = vault
        .create_key("bad", &CreateKeyRequest::import("not a key"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(vault.list_keys().unwrap().is_empty());
}

#[test]
fn test_import_exported_key() {
    let source = vault_with_key("origin");
    let exported = source.export_key("origin").unwrap().unwrap();
    let fingerprint = source.read_key("origin").unwrap().unwrap().fingerprint;

    let vault = Vault::in_memory();
    vault.create_key("copy", &CreateKeyRequest::import(&exported.key)).unwrap();
    let info = vault.read_key("copy").unwrap().unwrap();
    assert_eq!(info.fingerprint, fingerprint);
    assert!(!info.exportable);

    // The public half alone is not a vault key.
    let public = source.read_key("origin").unwrap().unwrap().public_key;
    assert!(vault.create_key("public", &CreateKeyRequest::import(&public)).is_err());
}

#[test]
fn test_sign_verify_all_algorithms_and_formats() {
    let vault = vault_with_key("signer");
    let input = b64(b"release artifact");
    let other_input = b64(b"another artifact");

    for algorithm in [
        SignatureHash::Sha224,
        SignatureHash::Sha256,
        SignatureHash::Sha384,
        SignatureHash::Sha512,
    ] {
        for format in [Encoding::Base64, Encoding::AsciiArmor] {
            let response = vault
                .sign("signer", &SignRequest::new(&input).algorithm(algorithm).format(format))
                .unwrap();
            assert!(response.log_entry.is_none());

            let request = VerifyRequest::new(&input, &response.signature)
                .format(format)
                .algorithm(algorithm);
            assert!(vault.verify("signer", &request).unwrap(), "{} {:?}", algorithm, format);

            let tampered = VerifyRequest::new(&other_input, &response.signature).format(format);
            assert!(!vault.verify("signer", &tampered).unwrap());
        }
    }
}

#[test]
fn test_verify_rejections() {
    let vault = vault_with_key("signer");
    let input = b64(b"payload");
    let signature = vault
        .sign("signer", &SignRequest::new(&input).algorithm(SignatureHash::Sha256))
        .unwrap()
        .signature;

    // Wrong hash, wrong format and garbage all verify as false.
    let wrong_hash = VerifyRequest::new(&input, &signature).algorithm(SignatureHash::Sha512);
    assert!(!vault.verify("signer", &wrong_hash).unwrap());
    let wrong_format = VerifyRequest::new(&input, &signature).format(Encoding::AsciiArmor);
    assert!(!vault.verify("signer", &wrong_format).unwrap());
    assert!(!vault.verify("signer", &VerifyRequest::new(&input, "AAAA")).unwrap());

    // Another key's signature is not ours.
    vault.create_key("other", &CreateKeyRequest::generate("other", "", "")).unwrap();
    assert!(!vault.verify("other", &VerifyRequest::new(&input, &signature)).unwrap());

    // Unless the caller names the signer explicitly.
    let armored = vault.read_key("signer").unwrap().unwrap().public_key;
    let cross = VerifyRequest::new(&input, &signature).signer_key(&armored);
    assert!(vault.verify("other", &cross).unwrap());

    // Malformed payloads and unknown keys are errors.
    assert!(matches!(
        vault.verify("signer", &VerifyRequest::new("!!", &signature)),
        Err(Error::Base64(_))
    ));
    assert!(matches!(
        vault.verify("missing", &VerifyRequest::new(&input, &signature)),
        Err(Error::KeyNotFound(_))
    ));
}

#[test]
fn test_sign_rejects_bad_input() {
    let vault = vault_with_key("signer");
    let err = vault.sign("signer", &SignRequest::new("not base64!")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = vault.sign("missing", &SignRequest::new(&b64(b"x"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!("sha1".parse::<SignatureHash>().is_err());
    assert!("pem".parse::<Encoding>().is_err());
}

#[test]
fn test_expiring_signature() {
    let vault = vault_with_key("signer");
    let input = b64(b"short lived");
    let signature = vault
        .sign("signer", &SignRequest::new(&input).expires(1))
        .unwrap()
        .signature;

    assert!(vault.verify("signer", &VerifyRequest::new(&input, &signature)).unwrap());
    thread::sleep(Duration::from_secs(3));
    assert!(!vault.verify("signer", &VerifyRequest::new(&input, &signature)).unwrap());
}

#[test]
fn test_subkey_lifecycle() {
    let vault = vault_with_key("owner");
    let before = vault.list_subkeys("owner").unwrap();
    assert_eq!(before.len(), 1);

    let key_id = vault.create_subkey("owner", &small_subkey(0)).unwrap();
    let listed = vault.list_subkeys("owner").unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&key_id));

    let info = vault.read_subkey("owner", &key_id.to_lowercase()).unwrap();
    assert_eq!(info.key_bits, 2048);
    assert_eq!(info.expires, 0);
    assert_eq!(info.capabilities, vec![gpgvault::Capability::Sign]);

    let input = b64(b"signed by subkey");
    let signature = vault
        .sign("owner", &SignRequest::new(&input).key_id(&key_id))
        .unwrap()
        .signature;
    assert!(vault.verify("owner", &VerifyRequest::new(&input, &signature)).unwrap());

    let exported = vault.export_subkey("owner", &key_id).unwrap();
    let (single, _) = SignedPublicKey::from_armor_single(Cursor::new(exported.as_bytes())).unwrap();
    assert_eq!(single.public_subkeys.len(), 1);
    assert_eq!(
        hex::encode_upper(single.public_subkeys[0].key.legacy_key_id().as_ref()),
        key_id
    );

    vault.delete_subkey("owner", &key_id).unwrap();
    assert_eq!(vault.list_subkeys("owner").unwrap(), before);
    assert!(matches!(
        vault.read_subkey("owner", &key_id),
        Err(Error::SubkeyNotFound(_))
    ));
    assert!(matches!(
        vault.sign("owner", &SignRequest::new(&input).key_id(&key_id)),
        Err(Error::NoSigningSubkey(_))
    ));

    // The master key still signs, and the old subkey signature no longer verifies.
    let master = vault.sign("owner", &SignRequest::new(&input)).unwrap().signature;
    assert!(vault.verify("owner", &VerifyRequest::new(&input, &master)).unwrap());
    assert!(!vault.verify("owner", &VerifyRequest::new(&input, &signature)).unwrap());
}

#[test]
fn test_subkey_request_validation() {
    let vault = vault_with_key("owner");

    let small = CreateSubkeyRequest {
        key_bits: 1024,
        ..Default::default()
    };
    let err = vault.create_subkey("owner", &small).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let encrypt = CreateSubkeyRequest {
        key_bits: 2048,
        capabilities: vec![gpgvault::Capability::Encrypt],
        ..Default::default()
    };
    assert!(vault.create_subkey("owner", &encrypt).is_err());

    assert!(matches!(
        vault.read_subkey("owner", "xyz"),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        vault.create_subkey("missing", &small_subkey(0)),
        Err(Error::KeyNotFound(_))
    ));
}

#[test]
fn test_subkey_expiry() {
    let vault = vault_with_key("owner");
    // Lifetime counts from key generation, so leave room for slow RSA generation.
    let key_id = vault.create_subkey("owner", &small_subkey(30)).unwrap();
    assert_eq!(vault.read_subkey("owner", &key_id).unwrap().expires, 30);

    let input = b64(b"expiring subkey");
    let signature = vault
        .sign("owner", &SignRequest::new(&input).key_id(&key_id))
        .unwrap()
        .signature;
    assert!(vault.verify("owner", &VerifyRequest::new(&input, &signature)).unwrap());

    thread::sleep(Duration::from_secs(32));
    assert!(!vault.verify("owner", &VerifyRequest::new(&input, &signature)).unwrap());
}

#[test]
fn test_revocation() {
    let vault = vault_with_key("owner");
    let input = b64(b"before revocation");
    let signature = vault.sign("owner", &SignRequest::new(&input)).unwrap().signature;

    let key_id = vault.create_subkey("owner", &small_subkey(0)).unwrap();
    vault
        .revoke_subkey("owner", &key_id, &RevocationReason::new(3, "rotated out"))
        .unwrap();

    let entity = secret_key(&vault, "owner");
    let subkey = entity
        .secret_subkeys
        .iter()
        .find(|subkey| hex::encode_upper(subkey.key.legacy_key_id().as_ref()) == key_id)
        .unwrap();
    let revocation = subkey
        .signatures
        .iter()
        .find(|sig| sig.typ() == Some(SignatureType::SubkeyRevocation))
        .unwrap();
    let reason = revocation
        .config()
        .unwrap()
        .hashed_subpackets()
        .find_map(|subpacket| match &subpacket.data {
            SubpacketData::RevocationReason(code, text) => Some((u8::from(*code), text.to_vec())),
            _ => None,
        })
        .unwrap();
    assert_eq!(reason, (3, b"rotated out".to_vec()));

    vault
        .revoke_key("owner", &RevocationReason::new(1, "superseded"))
        .unwrap();
    let entity = secret_key(&vault, "owner");
    assert_eq!(entity.details.revocation_signatures.len(), 1);

    // Revocation is visible to readers of the public key.
    assert_eq!(public_key(&vault, "owner").details.revocation_signatures.len(), 1);

    // Revoked keys still sign, but their signatures no longer verify.
    assert!(!vault.verify("owner", &VerifyRequest::new(&input, &signature)).unwrap());
    let after = vault.sign("owner", &SignRequest::new(&input)).unwrap().signature;
    assert!(!vault.verify("owner", &VerifyRequest::new(&input, &after)).unwrap());
}

#[test]
fn test_revocation_reason_required() {
    let vault = vault_with_key("owner");
    let err = vault
        .revoke_key("owner", &RevocationReason::new(1, ""))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(vault
        .revoke_key("owner", &RevocationReason::new(99, "unknown code"))
        .is_err());
    assert!(secret_key(&vault, "owner").details.revocation_signatures.is_empty());
}

#[test]
fn test_export_gating() {
    let vault = Vault::in_memory();
    vault.create_key("locked", &CreateKeyRequest::generate("locked", "", "")).unwrap();
    vault
        .create_key("open", &CreateKeyRequest::generate("open", "", "").exportable(true))
        .unwrap();

    let err = vault.export_key("locked").unwrap_err();
    assert!(matches!(err, Error::NotExportable(_)));
    assert_eq!(err.kind(), ErrorKind::Policy);

    let exported = vault.export_key("open").unwrap().unwrap();
    assert_eq!(exported.name, "open");
    assert_eq!(exported.key.matches("BEGIN PGP PRIVATE KEY BLOCK").count(), 1);
    let (keys, _) = SignedSecretKey::from_armor_many(Cursor::new(exported.key.as_bytes())).unwrap();
    assert_eq!(keys.count(), 1);

    assert!(vault.export_key("missing").unwrap().is_none());
}

#[test]
fn test_read_key_by_fingerprint() {
    let vault = vault_with_key("alpha");
    let fingerprint = vault.read_key("alpha").unwrap().unwrap().fingerprint;

    let found = vault
        .read_key_by_fingerprint(&fingerprint.to_lowercase())
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "alpha");
    assert_eq!(found.fingerprint, fingerprint);
    assert!(found.exportable);

    // Replacing the key under the same name drops the old fingerprint.
    vault.create_key("alpha", &CreateKeyRequest::generate("alpha", "", "")).unwrap();
    assert!(vault.read_key_by_fingerprint(&fingerprint).unwrap().is_none());
    let replaced = vault.read_key("alpha").unwrap().unwrap().fingerprint;
    assert_eq!(
        vault.read_key_by_fingerprint(&replaced).unwrap().unwrap().name,
        "alpha"
    );

    vault.delete_key("alpha").unwrap();
    assert!(vault.read_key_by_fingerprint(&replaced).unwrap().is_none());
}

#[test]
fn test_read_key_by_fingerprint_lowercase_index() {
    let vault = vault_with_key("a");
    let fingerprint = vault.read_key("a").unwrap().unwrap().fingerprint;

    // Index entries written with lowercase hex digits.
    let index = format!(r#"{{"{}":"a"}}"#, fingerprint.to_lowercase());
    vault.storage().put(INDEX_ENTRY, index.as_bytes()).unwrap();

    for query in [fingerprint.to_lowercase(), fingerprint.clone()] {
        let found = vault.read_key_by_fingerprint(&query).unwrap().unwrap();
        assert_eq!(found.name, "a");
        assert_eq!(found.fingerprint, fingerprint);
    }
}

#[test]
fn test_read_key_by_fingerprint_stale_index() {
    let vault = vault_with_key("alpha");
    let original = vault.read_key("alpha").unwrap().unwrap().fingerprint;
    let snapshot = vault.storage().get(INDEX_ENTRY).unwrap().unwrap();

    // The name now holds a different key while the index still names the old one.
    vault.create_key("alpha", &CreateKeyRequest::generate("alpha", "", "")).unwrap();
    vault.storage().put(INDEX_ENTRY, &snapshot).unwrap();

    assert!(vault.read_key_by_fingerprint(&original).unwrap().is_none());
}

/// Memory storage whose key record writes can be switched off.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    reject_records: AtomicBool,
}

impl Storage for FlakyStorage {
    fn get(&self, key: &str) -> gpgvault::Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> gpgvault::Result<()> {
        if key.starts_with("key/") && self.reject_records.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("write of {} refused", key)));
        }
        self.inner.put(key, value)
    }

    fn delete(&self, key: &str) -> gpgvault::Result<bool> {
        self.inner.delete(key)
    }

    fn list(&self, prefix: &str) -> gpgvault::Result<Vec<String>> {
        self.inner.list(prefix)
    }
}

#[test]
fn test_failed_create_keeps_index_consistent() {
    let source = vault_with_key("origin");
    let exported = source.export_key("origin").unwrap().unwrap();
    let imported = source.read_key("origin").unwrap().unwrap().fingerprint;

    let storage = Arc::new(FlakyStorage::default());
    let vault = Vault::new(storage.clone(), Arc::new(UnconfiguredPublisher));
    vault.create_key("alpha", &CreateKeyRequest::generate("alpha", "", "")).unwrap();
    let existing = vault.read_key("alpha").unwrap().unwrap().fingerprint;

    storage.reject_records.store(true, Ordering::SeqCst);
    let err = vault
        .create_key("alpha", &CreateKeyRequest::import(&exported.key))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    let err = vault
        .create_key("beta", &CreateKeyRequest::import(&exported.key))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    storage.reject_records.store(false, Ordering::SeqCst);

    assert!(vault.read_key_by_fingerprint(&imported).unwrap().is_none());
    assert_eq!(
        vault.read_key_by_fingerprint(&existing).unwrap().unwrap().name,
        "alpha"
    );
    assert_eq!(NameIndex::load(vault.storage()).unwrap().len(), 1);
    assert_eq!(vault.list_keys().unwrap(), vec!["alpha".to_string()]);
}

#[test]
fn test_set_key_config() {
    let vault = vault_with_key("alpha");
    assert!(vault.read_key("alpha").unwrap().unwrap().transparency_log_address.is_none());

    vault.set_key_config("alpha", "https://rekor.example").unwrap();
    assert_eq!(
        vault.read_key("alpha").unwrap().unwrap().transparency_log_address.as_deref(),
        Some("https://rekor.example")
    );

    vault.set_key_config("alpha", "").unwrap();
    assert!(vault.read_key("alpha").unwrap().unwrap().transparency_log_address.is_none());

    assert!(matches!(
        vault.set_key_config("missing", "https://rekor.example"),
        Err(Error::KeyNotFound(_))
    ));
}

#[test]
fn test_sign_key() {
    let vault = Vault::in_memory();
    vault
        .create_key("alice", &CreateKeyRequest::generate("Alice", "alice@example.com", ""))
        .unwrap();
    vault
        .create_key("bob", &CreateKeyRequest::generate("Bob", "bob@example.com", ""))
        .unwrap();

    let alice_before = public_key(&vault, "alice");
    let bob_before = public_key(&vault, "bob");
    vault.sign_key("alice", "bob").unwrap();

    let bob_after = public_key(&vault, "bob");
    assert_eq!(
        bob_after.details.users[0].signatures.len(),
        bob_before.details.users[0].signatures.len() + 1
    );
    let certifications = bob_after.details.users[0]
        .signatures
        .iter()
        .filter(|sig| sig.typ() == Some(SignatureType::CertGeneric))
        .count();
    assert_eq!(certifications, 1);

    let alice_after = public_key(&vault, "alice");
    assert_eq!(
        alice_after.details.users[0].signatures.len(),
        alice_before.details.users[0].signatures.len()
    );

    assert!(matches!(vault.sign_key("alice", "carol"), Err(Error::KeyNotFound(_))));
    assert!(matches!(vault.sign_key("carol", "bob"), Err(Error::KeyNotFound(_))));
}

fn encrypt_for(vault: &Vault, name: &str, plaintext: &[u8], signer: Option<&SignedSecretKey>) -> String {
    let mut rng = thread_rng();
    let recipient = public_key(vault, name);

    let mut builder = MessageBuilder::from_bytes("", plaintext.to_vec())
        .seipd_v1(&mut rng, SymmetricKeyAlgorithm::AES256);
    if let Some(signer) = signer {
        builder.sign(&signer.primary_key, Password::from(""), HashAlgorithm::Sha256);
    }
    builder
        .encrypt_to_key(&mut rng, &recipient.public_subkeys[0])
        .unwrap();
    builder.to_armored_string(&mut rng, None.into()).unwrap()
}

#[test]
fn test_decrypt() {
    let vault = vault_with_key("reader");
    let armored = encrypt_for(&vault, "reader", b"for your eyes only", None);

    let plaintext = vault
        .decrypt("reader", &DecryptRequest::new(&armored).format(Encoding::AsciiArmor))
        .unwrap();
    assert_eq!(plaintext, b64(b"for your eyes only"));

    // Same message, transported as base64 binary.
    let mut bytes = Vec::new();
    BufReader::new(Dearmor::new(Cursor::new(armored.as_bytes())))
        .read_to_end(&mut bytes)
        .unwrap();
    let plaintext = vault.decrypt("reader", &DecryptRequest::new(&b64(&bytes))).unwrap();
    assert_eq!(plaintext, b64(b"for your eyes only"));

    vault.create_key("stranger", &CreateKeyRequest::generate("stranger", "", "")).unwrap();
    let err = vault
        .decrypt("stranger", &DecryptRequest::new(&armored).format(Encoding::AsciiArmor))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Crypto);
}

#[test]
fn test_decrypt_with_required_signer() {
    let vault = vault_with_key("reader");
    vault
        .create_key("writer", &CreateKeyRequest::generate("writer", "", "").exportable(true))
        .unwrap();
    let writer = secret_key(&vault, "writer");
    let writer_public = vault.read_key("writer").unwrap().unwrap().public_key;
    let reader_public = vault.read_key("reader").unwrap().unwrap().public_key;

    let signed = encrypt_for(&vault, "reader", b"signed and sealed", Some(&writer));
    let request = DecryptRequest::new(&signed)
        .format(Encoding::AsciiArmor)
        .signer_key(&writer_public);
    assert_eq!(vault.decrypt("reader", &request).unwrap(), b64(b"signed and sealed"));

    // Wrong signer.
    let request = DecryptRequest::new(&signed)
        .format(Encoding::AsciiArmor)
        .signer_key(&reader_public);
    assert!(matches!(vault.decrypt("reader", &request), Err(Error::Decryption(_))));

    // Unsigned message with a required signer.
    let unsigned = encrypt_for(&vault, "reader", b"anonymous", None);
    let request = DecryptRequest::new(&unsigned)
        .format(Encoding::AsciiArmor)
        .signer_key(&writer_public);
    assert!(matches!(vault.decrypt("reader", &request), Err(Error::Decryption(_))));
}

#[test]
fn test_show_session_key() {
    let vault = vault_with_key("reader");
    let armored = encrypt_for(&vault, "reader", b"session", None);

    let session_key = vault
        .show_session_key("reader", &DecryptRequest::new(&armored).format(Encoding::AsciiArmor))
        .unwrap();
    let (algorithm, key) = session_key.split_once(':').unwrap();
    assert_eq!(algorithm, u8::from(SymmetricKeyAlgorithm::AES256).to_string());
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));

    vault.create_key("stranger", &CreateKeyRequest::generate("stranger", "", "")).unwrap();
    let err = vault
        .show_session_key("stranger", &DecryptRequest::new(&armored).format(Encoding::AsciiArmor))
        .unwrap_err();
    assert!(err.to_string().contains("unable to decrypt session key"));
}

#[test]
fn test_concurrent_revocations_are_not_lost() {
    let vault = Arc::new(vault_with_key("shared"));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let vault = Arc::clone(&vault);
            thread::spawn(move || {
                vault
                    .revoke_key("shared", &RevocationReason::new(0, &format!("revocation {}", i)))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(secret_key(&vault, "shared").details.revocation_signatures.len(), 4);
}

#[test]
#[ignore = "RSA4k key generation is slow"]
fn test_subkey_generation_does_not_block_readers() {
    let vault = Arc::new(vault_with_key("busy"));

    let creator = {
        let vault = Arc::clone(&vault);
        thread::spawn(move || vault.create_subkey("busy", &vault.subkey_request()).unwrap())
    };
    thread::sleep(Duration::from_millis(200));

    // A reader gets through while the 4096-bit subkey is still being generated.
    assert!(vault.read_key("busy").unwrap().is_some());
    assert!(!creator.is_finished());

    let key_id = creator.join().unwrap();
    assert_eq!(vault.list_subkeys("busy").unwrap().len(), 2);
    assert_eq!(vault.read_subkey("busy", &key_id).unwrap().key_bits, 4096);
}
