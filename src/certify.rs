//! Third-party certification of identities.

use pgp::composed::SignedSecretKey;
use pgp::packet::SignatureType;
use pgp::types::SignedUser;
use rand::thread_rng;

use crate::error::Result;
use crate::internal::{fingerprint_to_hex, unprotected};
use crate::vault::Vault;

/// Certify every identity of `target` with the primary key of `certifier`.
pub(crate) fn certify_identities(
    certifier: &SignedSecretKey,
    target: &mut SignedSecretKey,
) -> Result<usize> {
    let mut rng = thread_rng();
    let password = unprotected();
    let target_public = target.primary_key.public_key();

    let mut new_users: Vec<SignedUser> = Vec::with_capacity(target.details.users.len());
    for signed_user in &target.details.users {
        let certified_user = signed_user.id.sign_third_party(
            &mut rng,
            &certifier.primary_key,
            &password,
            &target_public,
            SignatureType::CertGeneric,
        )?;

        let mut combined_sigs = signed_user.signatures.clone();
        combined_sigs.extend(certified_user.signatures);
        new_users.push(SignedUser::new(signed_user.id.clone(), combined_sigs));
    }

    let count = new_users.len();
    target.details.users = new_users;
    Ok(count)
}

impl Vault {
    /// Certify all identities of `signed_name` with the key `signer_name`.
    ///
    /// Only the signed key is rewritten.
    pub fn sign_key(&self, signer_name: &str, signed_name: &str) -> Result<()> {
        let _guard = self.locks.exclusive_and_shared(signed_name, signer_name);

        let (_, signer) = self.load_entity(signer_name)?;
        let (record, mut signed) = self.load_entity(signed_name)?;

        let count = certify_identities(&signer, &mut signed)?;
        self.store_entity(signed_name, record, &mut signed)?;

        log::info!(
            "{} ({}) certified {} identit{} of {}",
            signer_name,
            fingerprint_to_hex(&signer.primary_key),
            count,
            if count == 1 { "y" } else { "ies" },
            signed_name
        );
        Ok(())
    }
}
