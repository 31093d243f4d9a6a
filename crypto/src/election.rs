use crate::constants::group;
use crate::group::{ElementModP, ElementModQ};
use crate::key_ceremony::ElectionJointKey;
use crate::manifest::Manifest;
use log::debug;
use serde::{Deserialize, Serialize};

/// The public values every ballot and proof of one election is bound to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextElectionContext {
    pub number_of_guardians: usize,
    pub quorum: usize,
    pub elgamal_public_key: ElementModP,
    pub commitment_hash: ElementModQ,
    pub manifest_hash: ElementModQ,
    /// H(P, Q, g, n, k, manifest hash)
    pub crypto_base_hash: ElementModQ,
    /// H(base hash, commitment hash)
    pub crypto_extended_base_hash: ElementModQ,
}

pub fn make_ciphertext_election_context(
    number_of_guardians: usize,
    quorum: usize,
    elgamal_public_key: &ElementModP,
    commitment_hash: &ElementModQ,
    manifest_hash: &ElementModQ,
) -> CiphertextElectionContext {
    let ctx = group();
    let p = ElementModP::from_reduced(ctx.p().clone());
    let q = ElementModP::from_reduced(ctx.q().clone());
    let g = ElementModP::generator();

    let crypto_base_hash = hash_elems!(
        "base",
        &p,
        &q,
        &g,
        number_of_guardians,
        quorum,
        manifest_hash
    );
    let crypto_extended_base_hash = hash_elems!(&crypto_base_hash, commitment_hash);

    CiphertextElectionContext {
        number_of_guardians,
        quorum,
        elgamal_public_key: elgamal_public_key.clone(),
        commitment_hash: commitment_hash.clone(),
        manifest_hash: manifest_hash.clone(),
        crypto_base_hash,
        crypto_extended_base_hash,
    }
}

/// Collects what a [`CiphertextElectionContext`] needs.
#[derive(Clone, Debug)]
pub struct ElectionBuilder {
    pub number_of_guardians: usize,
    pub quorum: usize,
    pub manifest: Manifest,
    election_key: Option<ElementModP>,
    commitment_hash: Option<ElementModQ>,
}

impl ElectionBuilder {
    pub fn new(number_of_guardians: usize, quorum: usize, manifest: Manifest) -> Self {
        ElectionBuilder {
            number_of_guardians,
            quorum,
            manifest,
            election_key: None,
            commitment_hash: None,
        }
    }

    pub fn set_public_key(mut self, election_key: &ElementModP) -> Self {
        self.election_key = Some(election_key.clone());
        self
    }

    pub fn set_commitment_hash(mut self, commitment_hash: &ElementModQ) -> Self {
        self.commitment_hash = Some(commitment_hash.clone());
        self
    }

    /// Takes both the key and the commitment hash from the ceremony result.
    pub fn set_joint_key(self, joint_key: &ElectionJointKey) -> Self {
        self.set_public_key(&joint_key.joint_public_key)
            .set_commitment_hash(&joint_key.commitment_hash)
    }

    /// `None` until a public key is set, or if the manifest is malformed.
    pub fn build(&self) -> Option<CiphertextElectionContext> {
        if !self.manifest.is_valid() {
            debug!("manifest {} is not valid", self.manifest.election_scope_id);
            return None;
        }
        let election_key = self.election_key.as_ref()?;
        let commitment_hash = self.commitment_hash.clone().unwrap_or_else(ElementModQ::zero);
        Some(make_ciphertext_election_context(
            self.number_of_guardians,
            self.quorum,
            election_key,
            &commitment_hash,
            &self.manifest.crypto_hash(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::Helper;

    #[test]
    fn it_should_build_only_with_a_key() {
        let keypair = Helper::setup_md_system();
        let builder = ElectionBuilder::new(3, 2, Helper::fake_manifest());
        assert!(builder.build().is_none());

        let context = builder.set_public_key(&keypair.public_key).build().unwrap();
        assert_eq!(context.elgamal_public_key, keypair.public_key);
        assert_eq!(context.manifest_hash, Helper::fake_manifest().crypto_hash());
        assert_eq!(
            context.crypto_extended_base_hash,
            hash_elems!(&context.crypto_base_hash, &ElementModQ::zero())
        );
    }

    #[test]
    fn it_should_bind_the_extended_hash_to_the_commitments() {
        let keypair = Helper::setup_md_system();
        let manifest_hash = Helper::fake_manifest().crypto_hash();
        let first = make_ciphertext_election_context(3, 2, &keypair.public_key, &ElementModQ::one(), &manifest_hash);
        let second = make_ciphertext_election_context(3, 2, &keypair.public_key, &ElementModQ::two(), &manifest_hash);

        assert_eq!(first.crypto_base_hash, second.crypto_base_hash);
        assert_ne!(first.crypto_extended_base_hash, second.crypto_extended_base_hash);

        let other_quorum = make_ciphertext_election_context(3, 3, &keypair.public_key, &ElementModQ::one(), &manifest_hash);
        assert_ne!(first.crypto_base_hash, other_quorum.crypto_base_hash);
    }
}
