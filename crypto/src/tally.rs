//! Homomorphic accumulation of cast ballots.

use crate::ballot::{BallotBoxState, SubmittedBallot};
use crate::decryption_share::CiphertextDecryptionSelection;
use crate::encryption::{ElGamal, ElGamalCiphertext};
use crate::group::{ElementModP, ElementModQ};
use crate::manifest::Manifest;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextTallySelection {
    pub object_id: String,
    pub sequence_order: u64,
    pub description_hash: ElementModQ,
    /// Product of the selection ciphertexts of every cast ballot.
    pub ciphertext: ElGamalCiphertext,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextTallyContest {
    pub object_id: String,
    pub sequence_order: u64,
    pub description_hash: ElementModQ,
    pub selections: BTreeMap<String, CiphertextTallySelection>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CiphertextTally {
    pub object_id: String,
    pub manifest_hash: ElementModQ,
    pub contests: BTreeMap<String, CiphertextTallyContest>,
    pub cast_ballot_ids: BTreeSet<String>,
    pub spoiled_ballot_ids: BTreeSet<String>,
}

impl CiphertextTally {
    /// An empty tally with the encryption of zero for every selection of the manifest.
    pub fn new(object_id: &str, manifest: &Manifest) -> Self {
        let contests = manifest
            .contests
            .iter()
            .map(|contest| {
                let selections = contest
                    .selections
                    .iter()
                    .map(|selection| {
                        let tally_selection = CiphertextTallySelection {
                            object_id: selection.object_id.clone(),
                            sequence_order: selection.sequence_order,
                            description_hash: selection.crypto_hash(),
                            ciphertext: ElGamalCiphertext::identity(),
                        };
                        (selection.object_id.clone(), tally_selection)
                    })
                    .collect();
                let tally_contest = CiphertextTallyContest {
                    object_id: contest.object_id.clone(),
                    sequence_order: contest.sequence_order,
                    description_hash: contest.crypto_hash(),
                    selections,
                };
                (contest.object_id.clone(), tally_contest)
            })
            .collect();

        CiphertextTally {
            object_id: object_id.to_string(),
            manifest_hash: manifest.crypto_hash(),
            contests,
            cast_ballot_ids: BTreeSet::new(),
            spoiled_ballot_ids: BTreeSet::new(),
        }
    }

    pub fn cast(&self) -> usize {
        self.cast_ballot_ids.len()
    }

    pub fn spoiled(&self) -> usize {
        self.spoiled_ballot_ids.len()
    }

    pub fn contains(&self, ballot_id: &str) -> bool {
        self.cast_ballot_ids.contains(ballot_id) || self.spoiled_ballot_ids.contains(ballot_id)
    }

    /// Adds a cast ballot to the tally or records a spoiled one.
    ///
    /// Returns false for a ballot seen before or one that does not fit the
    /// tally's manifest; the tally is unchanged in that case.
    pub fn append(&mut self, submitted: &SubmittedBallot) -> bool {
        let ballot = &submitted.ballot;
        if self.contains(&ballot.object_id) {
            warn!("tally {}: ballot {} already counted", self.object_id, ballot.object_id);
            return false;
        }
        if ballot.manifest_hash != self.manifest_hash {
            warn!("tally {}: ballot {} is for another manifest", self.object_id, ballot.object_id);
            return false;
        }

        match submitted.state {
            BallotBoxState::Spoiled => {
                self.spoiled_ballot_ids.insert(ballot.object_id.clone());
            }
            BallotBoxState::Cast => {
                let fits = ballot.contests.iter().all(|contest| {
                    self.contests.get(&contest.object_id).map_or(false, |tally_contest| {
                        contest
                            .ballot_selections
                            .iter()
                            .all(|s| tally_contest.selections.contains_key(&s.object_id))
                    })
                });
                if !fits {
                    warn!("tally {}: ballot {} does not fit the manifest", self.object_id, ballot.object_id);
                    return false;
                }

                for contest in &ballot.contests {
                    if let Some(tally_contest) = self.contests.get_mut(&contest.object_id) {
                        for selection in &contest.ballot_selections {
                            if let Some(tally_selection) = tally_contest.selections.get_mut(&selection.object_id) {
                                tally_selection.ciphertext =
                                    ElGamal::add([&tally_selection.ciphertext, &selection.ciphertext]);
                            }
                        }
                    }
                }
                self.cast_ballot_ids.insert(ballot.object_id.clone());
            }
        }
        debug!("tally {}: appended ballot {}", self.object_id, ballot.object_id);
        true
    }
}

/// Builds the tally of `ballots`, skipping duplicates.
pub fn tally_ballots<'a, I>(object_id: &str, ballots: I, manifest: &Manifest) -> CiphertextTally
where
    I: IntoIterator<Item = &'a SubmittedBallot>,
{
    let mut tally = CiphertextTally::new(object_id, manifest);
    for ballot in ballots {
        tally.append(ballot);
    }
    tally
}

/// A decrypted count with the shares it was recovered from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextTallySelection {
    pub object_id: String,
    pub tally: u64,
    /// g^tally
    pub value: ElementModP,
    pub message: ElGamalCiphertext,
    pub shares: Vec<CiphertextDecryptionSelection>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextTallyContest {
    pub object_id: String,
    pub selections: BTreeMap<String, PlaintextTallySelection>,
}

/// The decryption of a tally, or of a single spoiled ballot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlaintextTally {
    pub object_id: String,
    pub contests: BTreeMap<String, PlaintextTallyContest>,
}

impl PlaintextTally {
    /// The count of a selection, if it was decrypted.
    pub fn count(&self, contest_id: &str, selection_id: &str) -> Option<u64> {
        self.contests
            .get(contest_id)?
            .selections
            .get(selection_id)
            .map(|selection| selection.tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballot::{PlaintextBallot, PlaintextBallotContest, PlaintextBallotSelection};
    use crate::election::ElectionBuilder;
    use crate::encrypt::encrypt_ballot;
    use crate::helper::Helper;

    #[test]
    fn it_should_accumulate_cast_ballots_only() {
        let keypair = Helper::setup_md_system();
        let manifest = Helper::fake_manifest();
        let context = ElectionBuilder::new(1, 1, manifest.clone())
            .set_public_key(&keypair.public_key)
            .build()
            .unwrap();

        let vote = |id: &str, mayor: &str| {
            let plaintext = PlaintextBallot::new(
                id,
                vec![PlaintextBallotContest::new(
                    "mayor",
                    vec![PlaintextBallotSelection::new(mayor, 1)],
                )],
            );
            encrypt_ballot(&plaintext, &manifest, &context, &ElementModQ::one(), None, None).unwrap()
        };
        let ballots = vec![
            vote("b1", "mayor-alice").cast(),
            vote("b2", "mayor-alice").cast(),
            vote("b3", "mayor-bob").cast(),
            vote("b4", "mayor-bob").spoil(),
        ];

        let mut tally = tally_ballots("tally", &ballots, &manifest);
        assert_eq!(tally.cast(), 3);
        assert_eq!(tally.spoiled(), 1);
        assert!(!tally.append(&ballots[0]));

        let mayor = &tally.contests["mayor"];
        let decrypt = |id: &str| mayor.selections[id].ciphertext.decrypt(&keypair.secret_key).unwrap();
        assert_eq!(decrypt("mayor-alice"), 2);
        assert_eq!(decrypt("mayor-bob"), 1);
        assert_eq!(
            tally.contests["council"].selections["council-carol"]
                .ciphertext
                .decrypt(&keypair.secret_key),
            Ok(0)
        );
    }

    #[test]
    fn it_should_start_from_zero() {
        Helper::setup_test_group();
        let tally = CiphertextTally::new("tally", &Helper::fake_manifest());
        assert_eq!(tally.contests.len(), 2);
        assert_eq!(tally.contests["council"].selections.len(), 3);
        assert!(tally
            .contests
            .values()
            .flat_map(|c| c.selections.values())
            .all(|s| s.ciphertext == ElGamalCiphertext::identity()));
    }
}
