//! Partial decryptions published by guardians.

use crate::ballot::CiphertextBallot;
use crate::encryption::ElGamalCiphertext;
use crate::group::{ElementModP, ElementModQ};
use crate::proofs::ChaumPedersenProof;
use crate::tally::CiphertextTally;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The share of a missing guardian computed by one available guardian from its backup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextCompensatedDecryptionSelection {
    pub object_id: String,
    pub guardian_id: String,
    pub missing_guardian_id: String,
    /// A^P_missing(i)
    pub share: ElementModP,
    /// g^P_missing(i)
    pub recovery_key: ElementModP,
    pub proof: ChaumPedersenProof,
}

impl CiphertextCompensatedDecryptionSelection {
    pub fn is_valid(&self, message: &ElGamalCiphertext, extended_base_hash: &ElementModQ) -> bool {
        self.proof
            .verify(message, &self.recovery_key, &self.share, extended_base_hash)
    }
}

/// How a share is proven: directly, or through the compensated parts it was reconstructed from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ProofOrRecovery {
    Proof(ChaumPedersenProof),
    Recovery(BTreeMap<String, CiphertextCompensatedDecryptionSelection>),
}

/// One guardian's share M_i of one selection.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextDecryptionSelection {
    pub object_id: String,
    pub guardian_id: String,
    pub share: ElementModP,
    pub proof_or_recovery: ProofOrRecovery,
}

impl CiphertextDecryptionSelection {
    /// Verifies the direct proof against `public_key`, or every recovery part against its recovery key.
    pub fn is_valid(
        &self,
        message: &ElGamalCiphertext,
        public_key: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        match &self.proof_or_recovery {
            ProofOrRecovery::Proof(proof) => proof.verify(message, public_key, &self.share, extended_base_hash),
            ProofOrRecovery::Recovery(parts) => {
                let valid = !parts.is_empty()
                    && parts.values().all(|part| {
                        part.object_id == self.object_id
                            && part.missing_guardian_id == self.guardian_id
                            && part.is_valid(message, extended_base_hash)
                    });
                if !valid {
                    debug!(
                        "recovered share of {} for {} is invalid",
                        self.guardian_id, self.object_id
                    );
                }
                valid
            }
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextDecryptionContest {
    pub object_id: String,
    pub guardian_id: String,
    pub description_hash: ElementModQ,
    pub selections: BTreeMap<String, CiphertextDecryptionSelection>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextCompensatedDecryptionContest {
    pub object_id: String,
    pub guardian_id: String,
    pub missing_guardian_id: String,
    pub description_hash: ElementModQ,
    pub selections: BTreeMap<String, CiphertextCompensatedDecryptionSelection>,
}

/// A guardian's shares of every selection of a tally or ballot.
///
/// For a reconstructed share `guardian_id` and `public_key` are those of the
/// missing guardian.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DecryptionShare {
    pub object_id: String,
    pub guardian_id: String,
    pub public_key: ElementModP,
    pub contests: BTreeMap<String, CiphertextDecryptionContest>,
}

impl DecryptionShare {
    pub fn selection(&self, contest_id: &str, selection_id: &str) -> Option<&CiphertextDecryptionSelection> {
        self.contests.get(contest_id)?.selections.get(selection_id)
    }
}

/// The shares an available guardian computed for a missing one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CompensatedDecryptionShare {
    pub object_id: String,
    pub guardian_id: String,
    /// Sequence order of `guardian_id`, the point its backup was evaluated at.
    pub sequence_order: u64,
    pub missing_guardian_id: String,
    /// Weight of this guardian's part within the available set.
    pub lagrange_coefficient: ElementModQ,
    pub contests: BTreeMap<String, CiphertextCompensatedDecryptionContest>,
}

/// A selection ciphertext to decrypt.
#[derive(Clone, Debug)]
pub struct TargetSelection<'a> {
    pub object_id: &'a str,
    pub description_hash: &'a ElementModQ,
    pub ciphertext: &'a ElGamalCiphertext,
}

#[derive(Clone, Debug)]
pub struct TargetContest<'a> {
    pub object_id: &'a str,
    pub description_hash: &'a ElementModQ,
    pub selections: Vec<TargetSelection<'a>>,
}

/// The ciphertexts of a tally or of a ballot, in a uniform shape.
#[derive(Clone, Debug)]
pub struct DecryptionTarget<'a> {
    pub object_id: &'a str,
    pub contests: Vec<TargetContest<'a>>,
}

impl<'a> DecryptionTarget<'a> {
    /// Every (contest id, selection) pair.
    pub fn selections(&self) -> impl Iterator<Item = (&'a str, &TargetSelection<'a>)> + '_ {
        self.contests
            .iter()
            .flat_map(|contest| contest.selections.iter().map(move |s| (contest.object_id, s)))
    }
}

impl<'a> From<&'a CiphertextTally> for DecryptionTarget<'a> {
    fn from(tally: &'a CiphertextTally) -> Self {
        DecryptionTarget {
            object_id: &tally.object_id,
            contests: tally
                .contests
                .values()
                .map(|contest| TargetContest {
                    object_id: &contest.object_id,
                    description_hash: &contest.description_hash,
                    selections: contest
                        .selections
                        .values()
                        .map(|selection| TargetSelection {
                            object_id: &selection.object_id,
                            description_hash: &selection.description_hash,
                            ciphertext: &selection.ciphertext,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl<'a> From<&'a CiphertextBallot> for DecryptionTarget<'a> {
    fn from(ballot: &'a CiphertextBallot) -> Self {
        DecryptionTarget {
            object_id: &ballot.object_id,
            contests: ballot
                .contests
                .iter()
                .map(|contest| TargetContest {
                    object_id: &contest.object_id,
                    description_hash: &contest.description_hash,
                    selections: contest
                        .ballot_selections
                        .iter()
                        .map(|selection| TargetSelection {
                            object_id: &selection.object_id,
                            description_hash: &selection.description_hash,
                            ciphertext: &selection.ciphertext,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
