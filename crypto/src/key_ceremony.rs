//! Artifacts and pure functions of the distributed key generation.
//!
//! Every guardian generates a polynomial of degree `quorum - 1`. It
//! publishes the coefficient commitments and sends every other guardian an
//! encrypted coordinate of its polynomial (its partial key backup). Any
//! `quorum` coordinates of a missing guardian's polynomial are enough to
//! stand in for it during decryption.

use crate::auxiliary::{AuxiliaryKeyPair, AuxiliaryPublicKey, AuxiliaryScheme};
use crate::encryption::{ElGamal, ElGamalKeyPair};
use crate::error::AuxiliaryError;
use crate::group::{ElementModP, ElementModQ};
use crate::hash::HashItem;
use crate::polynomial::{compute_polynomial_coordinate, verify_polynomial_coordinate, ElectionPolynomial};
use crate::proofs::SchnorrProof;
use log::warn;
use serde::{Deserialize, Serialize};

/// Number of guardians and how many of them are needed to decrypt.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct CeremonyDetails {
    pub number_of_guardians: usize,
    pub quorum: usize,
}

impl CeremonyDetails {
    /// Returns the details if 1 <= quorum <= number_of_guardians.
    pub fn new(number_of_guardians: usize, quorum: usize) -> Option<Self> {
        if quorum == 0 || quorum > number_of_guardians {
            return None;
        }
        Some(CeremonyDetails {
            number_of_guardians,
            quorum,
        })
    }
}

/// A guardian's election key pair and the polynomial it was taken from. Never serialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectionKeyPair {
    pub key_pair: ElGamalKeyPair,
    pub proof: SchnorrProof,
    pub polynomial: ElectionPolynomial,
}

/// The public half of an [`ElectionKeyPair`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionPublicKey {
    pub owner_id: String,
    pub sequence_order: u64,
    pub key: ElementModP,
    pub proof: SchnorrProof,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

impl ElectionPublicKey {
    /// Checks the key proof, the coefficient proofs and that the key is the first commitment.
    pub fn is_valid(&self) -> bool {
        self.proof.public_key == self.key
            && self.proof.verify()
            && self.coefficient_commitments.first() == Some(&self.key)
            && self.coefficient_commitments.len() == self.coefficient_proofs.len()
            && self
                .coefficient_commitments
                .iter()
                .zip(&self.coefficient_proofs)
                .all(|(commitment, proof)| &proof.public_key == commitment && proof.verify())
    }
}

/// Everything a guardian announces to the others.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PublicKeySet {
    pub election: ElectionPublicKey,
    pub auxiliary: AuxiliaryPublicKey,
}

impl PublicKeySet {
    pub fn owner_id(&self) -> &str {
        &self.election.owner_id
    }

    pub fn sequence_order(&self) -> u64 {
        self.election.sequence_order
    }

    pub fn is_valid(&self) -> bool {
        self.election.is_valid()
            && self.auxiliary.owner_id == self.election.owner_id
            && self.auxiliary.sequence_order == self.election.sequence_order
    }
}

/// The coordinate P_owner(designated_sequence_order), encrypted to the designated guardian.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionPartialKeyBackup {
    pub owner_id: String,
    pub designated_id: String,
    pub designated_sequence_order: u64,
    pub encrypted_value: Vec<u8>,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// The outcome of checking a backup or a challenge.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionPartialKeyVerification {
    pub owner_id: String,
    pub designated_id: String,
    pub verifier_id: String,
    pub verified: bool,
}

/// The owner's public answer to a disputed backup: the coordinate in the clear.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionPartialKeyChallenge {
    pub owner_id: String,
    pub designated_id: String,
    pub designated_sequence_order: u64,
    pub value: ElementModQ,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

/// The joint election key K = prod K_i together with a hash of all commitments.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElectionJointKey {
    pub joint_public_key: ElementModP,
    pub commitment_hash: ElementModQ,
}

/// Progress of a guardian (or of the whole ceremony) through the key ceremony.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CeremonyState {
    KeysGenerated,
    AuxiliaryKeysExchanged,
    ElectionKeysExchanged,
    BackupsGenerated,
    BackupsExchanged,
    BackupsVerified,
    JointKeyPublished,
}

/// The facts a [`CeremonyState`] transition depends on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CeremonyProgress {
    pub auxiliary_keys_received: bool,
    pub election_keys_received: bool,
    pub backups_generated: bool,
    pub backups_received: bool,
    pub backups_verified: bool,
    pub joint_key_published: bool,
}

impl CeremonyState {
    /// Returns the following state if its precondition holds, `self` otherwise.
    pub fn next(self, progress: &CeremonyProgress) -> CeremonyState {
        use CeremonyState::*;
        match self {
            KeysGenerated if progress.auxiliary_keys_received => AuxiliaryKeysExchanged,
            AuxiliaryKeysExchanged if progress.election_keys_received => ElectionKeysExchanged,
            ElectionKeysExchanged if progress.backups_generated => BackupsGenerated,
            BackupsGenerated if progress.backups_received => BackupsExchanged,
            BackupsExchanged if progress.backups_verified => BackupsVerified,
            BackupsVerified if progress.joint_key_published => JointKeyPublished,
            state => state,
        }
    }

    /// Applies [`CeremonyState::next`] until nothing changes.
    pub fn advance(self, progress: &CeremonyProgress) -> CeremonyState {
        let mut state = self;
        loop {
            let next = state.next(progress);
            if next == state {
                return state;
            }
            state = next;
        }
    }
}

/// Generates a guardian's election key pair from a polynomial with `quorum` coefficients.
pub fn generate_election_key_pair(quorum: usize, seed: Option<&ElementModQ>) -> Option<ElectionKeyPair> {
    let polynomial = ElectionPolynomial::generate(quorum, seed);
    let first = polynomial.coefficients.first()?;
    let key_pair = ElGamalKeyPair {
        secret_key: first.value.clone(),
        public_key: first.commitment.clone(),
    };
    let proof = first.proof.clone();
    Some(ElectionKeyPair {
        key_pair,
        proof,
        polynomial,
    })
}

/// Publishes the public half of a key pair.
pub fn share_election_public_key(
    owner_id: &str,
    sequence_order: u64,
    key_pair: &ElectionKeyPair,
) -> ElectionPublicKey {
    ElectionPublicKey {
        owner_id: owner_id.to_string(),
        sequence_order,
        key: key_pair.key_pair.public_key.clone(),
        proof: key_pair.proof.clone(),
        coefficient_commitments: key_pair.polynomial.commitments(),
        coefficient_proofs: key_pair.polynomial.proofs(),
    }
}

/// Encrypts P_owner(designated) to the designated guardian's auxiliary key.
pub fn generate_election_partial_key_backup(
    owner_id: &str,
    polynomial: &ElectionPolynomial,
    auxiliary_public_key: &AuxiliaryPublicKey,
    scheme: &dyn AuxiliaryScheme,
) -> Result<ElectionPartialKeyBackup, AuxiliaryError> {
    let value = compute_polynomial_coordinate(auxiliary_public_key.sequence_order, polynomial);
    let encrypted_value = scheme.encrypt(value.to_hex().as_bytes(), &auxiliary_public_key.key)?;
    Ok(ElectionPartialKeyBackup {
        owner_id: owner_id.to_string(),
        designated_id: auxiliary_public_key.owner_id.clone(),
        designated_sequence_order: auxiliary_public_key.sequence_order,
        encrypted_value,
        coefficient_commitments: polynomial.commitments(),
        coefficient_proofs: polynomial.proofs(),
    })
}

/// Decrypts the coordinate carried by a backup.
pub fn decrypt_backup_value(
    backup: &ElectionPartialKeyBackup,
    auxiliary_keys: &AuxiliaryKeyPair,
    scheme: &dyn AuxiliaryScheme,
) -> Result<ElementModQ, AuxiliaryError> {
    let plaintext = scheme.decrypt(&backup.encrypted_value, auxiliary_keys)?;
    let hex = String::from_utf8(plaintext).map_err(|_| AuxiliaryError::MalformedMessage)?;
    ElementModQ::from_hex(&hex).map_err(|_| AuxiliaryError::MalformedMessage)
}

fn coefficients_are_proven(commitments: &[ElementModP], proofs: &[SchnorrProof]) -> bool {
    !commitments.is_empty()
        && commitments.len() == proofs.len()
        && commitments
            .iter()
            .zip(proofs)
            .all(|(commitment, proof)| &proof.public_key == commitment && proof.verify())
}

/// Decrypts a received backup and checks it against the owner's commitments.
pub fn verify_election_partial_key_backup(
    verifier_id: &str,
    backup: &ElectionPartialKeyBackup,
    auxiliary_keys: &AuxiliaryKeyPair,
    scheme: &dyn AuxiliaryScheme,
) -> ElectionPartialKeyVerification {
    let verified = match decrypt_backup_value(backup, auxiliary_keys, scheme) {
        Ok(value) => {
            coefficients_are_proven(&backup.coefficient_commitments, &backup.coefficient_proofs)
                && verify_polynomial_coordinate(
                    &value,
                    backup.designated_sequence_order,
                    &backup.coefficient_commitments,
                )
        }
        Err(err) => {
            warn!(
                "backup from {} to {} could not be read: {}",
                backup.owner_id, backup.designated_id, err
            );
            false
        }
    };

    ElectionPartialKeyVerification {
        owner_id: backup.owner_id.clone(),
        designated_id: backup.designated_id.clone(),
        verifier_id: verifier_id.to_string(),
        verified,
    }
}

/// Reveals the coordinate of a disputed backup.
pub fn generate_election_partial_key_challenge(
    backup: &ElectionPartialKeyBackup,
    polynomial: &ElectionPolynomial,
) -> ElectionPartialKeyChallenge {
    ElectionPartialKeyChallenge {
        owner_id: backup.owner_id.clone(),
        designated_id: backup.designated_id.clone(),
        designated_sequence_order: backup.designated_sequence_order,
        value: compute_polynomial_coordinate(backup.designated_sequence_order, polynomial),
        coefficient_commitments: polynomial.commitments(),
        coefficient_proofs: polynomial.proofs(),
    }
}

/// Checks a revealed coordinate against the owner's commitments.
pub fn verify_election_partial_key_challenge(
    verifier_id: &str,
    challenge: &ElectionPartialKeyChallenge,
) -> ElectionPartialKeyVerification {
    let verified = coefficients_are_proven(&challenge.coefficient_commitments, &challenge.coefficient_proofs)
        && verify_polynomial_coordinate(
            &challenge.value,
            challenge.designated_sequence_order,
            &challenge.coefficient_commitments,
        );

    ElectionPartialKeyVerification {
        owner_id: challenge.owner_id.clone(),
        designated_id: challenge.designated_id.clone(),
        verifier_id: verifier_id.to_string(),
        verified,
    }
}

/// Combines the guardians' public keys into the joint election key.
///
/// The commitment hash covers all coefficient commitments ordered by sequence order.
pub fn combine_election_public_keys<'a, I>(keys: I) -> ElectionJointKey
where
    I: IntoIterator<Item = &'a ElectionPublicKey>,
{
    let mut keys: Vec<&ElectionPublicKey> = keys.into_iter().collect();
    keys.sort_by_key(|key| key.sequence_order);

    let joint_public_key = ElGamal::combine_public_keys(keys.iter().map(|key| &key.key));
    let commitments: Vec<HashItem<'_>> = keys
        .iter()
        .flat_map(|key| key.coefficient_commitments.iter().map(HashItem::P))
        .collect();
    let commitment_hash = hash_elems!(commitments);

    ElectionJointKey {
        joint_public_key,
        commitment_hash,
    }
}
