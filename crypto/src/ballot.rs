//! Plaintext and encrypted ballots.

use crate::ballot_code::get_ballot_code;
use crate::encryption::{ElGamal, ElGamalCiphertext};
use crate::error::BallotError;
use crate::group::{ElementModP, ElementModQ};
use crate::manifest::{ContestDescription, Manifest};
use crate::proofs::{DisjunctiveChaumPedersenProof, RangeChaumPedersenProof};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextBallotSelection {
    pub object_id: String,
    pub vote: u64,
}

impl PlaintextBallotSelection {
    pub fn new(object_id: &str, vote: u64) -> Self {
        PlaintextBallotSelection {
            object_id: object_id.to_string(),
            vote,
        }
    }
}

/// The selections a voter made in one contest. Unmarked selections may be left out.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextBallotContest {
    pub object_id: String,
    pub ballot_selections: Vec<PlaintextBallotSelection>,
}

impl PlaintextBallotContest {
    pub fn new(object_id: &str, ballot_selections: Vec<PlaintextBallotSelection>) -> Self {
        PlaintextBallotContest {
            object_id: object_id.to_string(),
            ballot_selections,
        }
    }

    /// The vote for a selection, zero if it is not on the ballot.
    pub fn vote_for(&self, selection_id: &str) -> u64 {
        self.ballot_selections
            .iter()
            .find(|s| s.object_id == selection_id)
            .map_or(0, |s| s.vote)
    }

    /// Checks the contest against its description.
    ///
    /// Every failure is reported as its own [`BallotError`]; null and under
    /// votes are still well formed ballots and are accepted by the encryption.
    pub fn validate(&self, description: &ContestDescription) -> Result<(), BallotError> {
        if self.object_id != description.object_id {
            return Err(BallotError::UnknownContest(self.object_id.clone()));
        }
        let mut votes = 0u64;
        let mut seen = BTreeSet::new();
        for selection in &self.ballot_selections {
            if description.selection(&selection.object_id).is_none() {
                return Err(BallotError::UnknownSelection {
                    contest: self.object_id.clone(),
                    selection: selection.object_id.clone(),
                });
            }
            if !seen.insert(selection.object_id.as_str()) {
                return Err(BallotError::DuplicateSelection {
                    contest: self.object_id.clone(),
                    selection: selection.object_id.clone(),
                });
            }
            if selection.vote > 1 {
                return Err(BallotError::InvalidSelectionValue {
                    selection: selection.object_id.clone(),
                    value: selection.vote,
                });
            }
            votes += selection.vote;
        }

        let allowed = description.votes_allowed;
        if votes > allowed {
            Err(BallotError::OverVote {
                contest: self.object_id.clone(),
                votes,
                allowed,
            })
        } else if votes == 0 {
            Err(BallotError::NullVote {
                contest: self.object_id.clone(),
            })
        } else if votes < allowed {
            Err(BallotError::UnderVote {
                contest: self.object_id.clone(),
                votes,
                allowed,
            })
        } else {
            Ok(())
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextBallot {
    pub object_id: String,
    pub contests: Vec<PlaintextBallotContest>,
}

impl PlaintextBallot {
    pub fn new(object_id: &str, contests: Vec<PlaintextBallotContest>) -> Self {
        PlaintextBallot {
            object_id: object_id.to_string(),
            contests,
        }
    }

    pub fn contest(&self, contest_id: &str) -> Option<&PlaintextBallotContest> {
        self.contests.iter().find(|c| c.object_id == contest_id)
    }

    /// Validates every contest on the ballot, returning the first failure.
    pub fn validate(&self, manifest: &Manifest) -> Result<(), BallotError> {
        for contest in &self.contests {
            let description = manifest
                .contest(&contest.object_id)
                .ok_or_else(|| BallotError::UnknownContest(contest.object_id.clone()))?;
            contest.validate(description)?;
        }
        Ok(())
    }
}

/// An encrypted selection with its proof of encrypting 0 or 1.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextBallotSelection {
    pub object_id: String,
    pub sequence_order: u64,
    pub description_hash: ElementModQ,
    pub ciphertext: ElGamalCiphertext,
    pub crypto_hash: ElementModQ,
    pub proof: DisjunctiveChaumPedersenProof,
    /// Known only to the encrypting device.
    #[serde(skip)]
    pub nonce: Option<ElementModQ>,
}

pub fn selection_crypto_hash(
    object_id: &str,
    description_hash: &ElementModQ,
    ciphertext: &ElGamalCiphertext,
) -> ElementModQ {
    hash_elems!(object_id, description_hash, &ciphertext.crypto_hash())
}

impl CiphertextBallotSelection {
    pub fn is_valid_encryption(
        &self,
        description_hash: &ElementModQ,
        public_key: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        if &self.description_hash != description_hash {
            debug!("selection {}: description hash mismatch", self.object_id);
            return false;
        }
        if self.crypto_hash != selection_crypto_hash(&self.object_id, description_hash, &self.ciphertext) {
            debug!("selection {}: crypto hash mismatch", self.object_id);
            return false;
        }
        self.proof.verify(&self.ciphertext, public_key, extended_base_hash)
    }
}

/// An encrypted contest. The range proof shows the selections add up to at most `votes_allowed`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextBallotContest {
    pub object_id: String,
    pub sequence_order: u64,
    pub description_hash: ElementModQ,
    pub ballot_selections: Vec<CiphertextBallotSelection>,
    pub ciphertext_accumulation: ElGamalCiphertext,
    pub crypto_hash: ElementModQ,
    pub proof: RangeChaumPedersenProof,
    pub votes_allowed: u64,
    #[serde(skip)]
    pub nonce: Option<ElementModQ>,
}

pub fn contest_crypto_hash(
    object_id: &str,
    description_hash: &ElementModQ,
    selections: &[CiphertextBallotSelection],
) -> ElementModQ {
    let hashes: Vec<ElementModQ> = selections.iter().map(|s| s.crypto_hash.clone()).collect();
    hash_elems!(object_id, description_hash, &hashes)
}

impl CiphertextBallotContest {
    pub fn selection(&self, selection_id: &str) -> Option<&CiphertextBallotSelection> {
        self.ballot_selections.iter().find(|s| s.object_id == selection_id)
    }

    /// Checks the accumulation, the crypto hash, the range proof and every selection.
    ///
    /// Selection description hashes are only checked for consistency here;
    /// use [`CiphertextBallotContest::matches_description`] to check them
    /// against a manifest.
    pub fn is_valid_encryption(
        &self,
        description_hash: &ElementModQ,
        public_key: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        if &self.description_hash != description_hash {
            debug!("contest {}: description hash mismatch", self.object_id);
            return false;
        }
        if self.crypto_hash != contest_crypto_hash(&self.object_id, description_hash, &self.ballot_selections) {
            debug!("contest {}: crypto hash mismatch", self.object_id);
            return false;
        }
        let accumulation = ElGamal::add(self.ballot_selections.iter().map(|s| &s.ciphertext));
        if accumulation != self.ciphertext_accumulation {
            debug!("contest {}: accumulation mismatch", self.object_id);
            return false;
        }
        self.proof.limit == self.votes_allowed
            && self.proof.verify(&accumulation, public_key, extended_base_hash, self.votes_allowed)
            && self.ballot_selections.iter().all(|selection| {
                selection.is_valid_encryption(&selection.description_hash, public_key, extended_base_hash)
            })
    }

    /// Same contest, same selections and the same vote limit as `description`.
    pub fn matches_description(&self, description: &ContestDescription) -> bool {
        self.object_id == description.object_id
            && self.description_hash == description.crypto_hash()
            && self.votes_allowed == description.votes_allowed
            && self.ballot_selections.len() == description.selections.len()
            && self.ballot_selections.iter().all(|selection| {
                description
                    .selection(&selection.object_id)
                    .map_or(false, |d| d.crypto_hash() == selection.description_hash)
            })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextBallot {
    pub object_id: String,
    pub manifest_hash: ElementModQ,
    /// The previous code in the device's chain.
    pub code_seed: ElementModQ,
    pub contests: Vec<CiphertextBallotContest>,
    /// The tracking code handed to the voter.
    pub code: ElementModQ,
    pub timestamp: u64,
    pub crypto_hash: ElementModQ,
    #[serde(skip)]
    pub nonce: Option<ElementModQ>,
}

pub fn ballot_crypto_hash(
    object_id: &str,
    manifest_hash: &ElementModQ,
    contests: &[CiphertextBallotContest],
) -> ElementModQ {
    let hashes: Vec<ElementModQ> = contests.iter().map(|c| c.crypto_hash.clone()).collect();
    hash_elems!(object_id, manifest_hash, &hashes)
}

impl CiphertextBallot {
    pub fn contest(&self, contest_id: &str) -> Option<&CiphertextBallotContest> {
        self.contests.iter().find(|c| c.object_id == contest_id)
    }

    pub fn is_valid_encryption(
        &self,
        manifest_hash: &ElementModQ,
        public_key: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        if &self.manifest_hash != manifest_hash {
            debug!("ballot {}: manifest hash mismatch", self.object_id);
            return false;
        }
        if self.crypto_hash != ballot_crypto_hash(&self.object_id, manifest_hash, &self.contests) {
            debug!("ballot {}: crypto hash mismatch", self.object_id);
            return false;
        }
        if self.code != get_ballot_code(&self.code_seed, self.timestamp, &self.crypto_hash) {
            debug!("ballot {}: tracking code mismatch", self.object_id);
            return false;
        }
        self.contests
            .iter()
            .all(|contest| contest.is_valid_encryption(&contest.description_hash, public_key, extended_base_hash))
    }

    /// Every contest of the manifest is present and matches its description.
    pub fn matches_manifest(&self, manifest: &Manifest) -> bool {
        self.contests.len() == manifest.contests.len()
            && self.contests.iter().all(|contest| {
                manifest
                    .contest(&contest.object_id)
                    .map_or(false, |description| contest.matches_description(description))
            })
    }

    /// Hands the ballot to the ballot box; the nonces never leave the device.
    pub fn submit(mut self, state: BallotBoxState) -> SubmittedBallot {
        self.nonce = None;
        for contest in &mut self.contests {
            contest.nonce = None;
            for selection in &mut contest.ballot_selections {
                selection.nonce = None;
            }
        }
        SubmittedBallot { ballot: self, state }
    }

    pub fn cast(self) -> SubmittedBallot {
        self.submit(BallotBoxState::Cast)
    }

    pub fn spoil(self) -> SubmittedBallot {
        self.submit(BallotBoxState::Spoiled)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BallotBoxState {
    /// Counted in the tally.
    Cast,
    /// Excluded from the tally and decrypted on its own.
    Spoiled,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SubmittedBallot {
    pub ballot: CiphertextBallot,
    pub state: BallotBoxState,
}

impl SubmittedBallot {
    pub fn object_id(&self) -> &str {
        &self.ballot.object_id
    }
}
