use crate::ballot::{BallotBoxState, CiphertextBallot, SubmittedBallot};
use crate::election::CiphertextElectionContext;
use crate::manifest::Manifest;
use log::warn;
use std::collections::BTreeMap;

/// Accepts each verified ballot once, as cast or spoiled.
#[derive(Debug)]
pub struct BallotBox<'a> {
    manifest: &'a Manifest,
    context: &'a CiphertextElectionContext,
    ballots: BTreeMap<String, SubmittedBallot>,
}

impl<'a> BallotBox<'a> {
    pub fn new(manifest: &'a Manifest, context: &'a CiphertextElectionContext) -> Self {
        BallotBox {
            manifest,
            context,
            ballots: BTreeMap::new(),
        }
    }

    pub fn cast(&mut self, ballot: CiphertextBallot) -> Option<&SubmittedBallot> {
        self.accept_ballot(ballot, BallotBoxState::Cast)
    }

    pub fn spoil(&mut self, ballot: CiphertextBallot) -> Option<&SubmittedBallot> {
        self.accept_ballot(ballot, BallotBoxState::Spoiled)
    }

    /// Returns `None` for a ballot already in the box or one that fails verification.
    pub fn accept_ballot(&mut self, ballot: CiphertextBallot, state: BallotBoxState) -> Option<&SubmittedBallot> {
        if self.ballots.contains_key(&ballot.object_id) {
            warn!("ballot {} was already submitted", ballot.object_id);
            return None;
        }
        let valid = ballot.matches_manifest(self.manifest)
            && ballot.is_valid_encryption(
                &self.context.manifest_hash,
                &self.context.elgamal_public_key,
                &self.context.crypto_extended_base_hash,
            );
        if !valid {
            warn!("ballot {} failed verification", ballot.object_id);
            return None;
        }

        let object_id = ballot.object_id.clone();
        self.ballots.insert(object_id.clone(), ballot.submit(state));
        self.ballots.get(&object_id)
    }

    pub fn get(&self, ballot_id: &str) -> Option<&SubmittedBallot> {
        self.ballots.get(ballot_id)
    }

    pub fn ballots(&self) -> impl Iterator<Item = &SubmittedBallot> {
        self.ballots.values()
    }

    pub fn cast_ballots(&self) -> impl Iterator<Item = &SubmittedBallot> {
        self.with_state(BallotBoxState::Cast)
    }

    pub fn spoiled_ballots(&self) -> impl Iterator<Item = &SubmittedBallot> {
        self.with_state(BallotBoxState::Spoiled)
    }

    fn with_state(&self, state: BallotBoxState) -> impl Iterator<Item = &SubmittedBallot> {
        self.ballots.values().filter(move |ballot| ballot.state == state)
    }

    pub fn len(&self) -> usize {
        self.ballots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ballots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballot::{PlaintextBallot, PlaintextBallotContest, PlaintextBallotSelection};
    use crate::election::ElectionBuilder;
    use crate::encrypt::encrypt_ballot;
    use crate::group::ElementModQ;
    use crate::helper::Helper;

    #[test]
    fn it_should_accept_each_ballot_once() {
        let keypair = Helper::setup_md_system();
        let manifest = Helper::fake_manifest();
        let context = ElectionBuilder::new(1, 1, manifest.clone())
            .set_public_key(&keypair.public_key)
            .build()
            .unwrap();
        let plaintext = PlaintextBallot::new(
            "ballot-1",
            vec![PlaintextBallotContest::new(
                "mayor",
                vec![PlaintextBallotSelection::new("mayor-bob", 1)],
            )],
        );
        let encrypted = encrypt_ballot(&plaintext, &manifest, &context, &ElementModQ::one(), None, None).unwrap();

        let mut ballot_box = BallotBox::new(&manifest, &context);
        let submitted = ballot_box.cast(encrypted.clone()).unwrap();
        assert_eq!(submitted.state, BallotBoxState::Cast);
        assert!(submitted.ballot.nonce.is_none());
        assert!(ballot_box.spoil(encrypted).is_none());
        assert_eq!(ballot_box.cast_ballots().count(), 1);
        assert_eq!(ballot_box.spoiled_ballots().count(), 0);
    }

    #[test]
    fn it_should_refuse_a_ballot_for_another_election() {
        let keypair = Helper::setup_md_system();
        let manifest = Helper::fake_manifest();
        let context = ElectionBuilder::new(1, 1, manifest.clone())
            .set_public_key(&keypair.public_key)
            .build()
            .unwrap();
        let other = ElectionBuilder::new(3, 2, manifest.clone())
            .set_public_key(&keypair.public_key)
            .build()
            .unwrap();
        let plaintext = PlaintextBallot::new("ballot-1", vec![]);
        let encrypted = encrypt_ballot(&plaintext, &manifest, &other, &ElementModQ::one(), None, None).unwrap();

        let mut ballot_box = BallotBox::new(&manifest, &context);
        assert!(ballot_box.spoil(encrypted).is_none());
        assert!(ballot_box.is_empty());
    }
}
