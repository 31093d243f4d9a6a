//! The contest structure ballots are encrypted against.
//!
//! Content is trusted as given; only the structural checks the encryption
//! needs are made.

use crate::group::ElementModQ;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SelectionDescription {
    pub object_id: String,
    pub sequence_order: u64,
    pub candidate_id: String,
}

impl SelectionDescription {
    pub fn crypto_hash(&self) -> ElementModQ {
        hash_elems!(&self.object_id, self.sequence_order, &self.candidate_id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContestDescription {
    pub object_id: String,
    pub sequence_order: u64,
    /// Number of selections a voter may mark in this contest.
    pub votes_allowed: u64,
    pub selections: Vec<SelectionDescription>,
}

impl ContestDescription {
    pub fn crypto_hash(&self) -> ElementModQ {
        let selection_hashes: Vec<ElementModQ> = self.selections.iter().map(|s| s.crypto_hash()).collect();
        hash_elems!(
            &self.object_id,
            self.sequence_order,
            self.votes_allowed,
            &selection_hashes
        )
    }

    pub fn selection(&self, selection_id: &str) -> Option<&SelectionDescription> {
        self.selections.iter().find(|s| s.object_id == selection_id)
    }

    /// Unique selection ids and sequence orders, and at least one vote allowed.
    pub fn is_valid(&self) -> bool {
        let ids: BTreeSet<&str> = self.selections.iter().map(|s| s.object_id.as_str()).collect();
        let orders: BTreeSet<u64> = self.selections.iter().map(|s| s.sequence_order).collect();
        self.votes_allowed >= 1
            && !self.selections.is_empty()
            && ids.len() == self.selections.len()
            && orders.len() == self.selections.len()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    pub election_scope_id: String,
    pub contests: Vec<ContestDescription>,
}

impl Manifest {
    pub fn crypto_hash(&self) -> ElementModQ {
        let contests: Vec<ElementModQ> = self.contests.iter().map(|c| c.crypto_hash()).collect();
        hash_elems!(&self.election_scope_id, &contests)
    }

    pub fn contest(&self, contest_id: &str) -> Option<&ContestDescription> {
        self.contests.iter().find(|c| c.object_id == contest_id)
    }

    pub fn is_valid(&self) -> bool {
        let ids: BTreeSet<&str> = self.contests.iter().map(|c| c.object_id.as_str()).collect();
        let orders: BTreeSet<u64> = self.contests.iter().map(|c| c.sequence_order).collect();
        ids.len() == self.contests.len()
            && orders.len() == self.contests.len()
            && self.contests.iter().all(ContestDescription::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::Helper;

    #[test]
    fn it_should_hash_deterministically() {
        Helper::setup_test_group();
        let manifest = Helper::fake_manifest();
        assert_eq!(manifest.crypto_hash(), Helper::fake_manifest().crypto_hash());

        let mut changed = Helper::fake_manifest();
        changed.contests[1].votes_allowed = 3;
        assert_ne!(manifest.crypto_hash(), changed.crypto_hash());
    }

    #[test]
    fn it_should_look_up_contests_and_selections() {
        let manifest = Helper::fake_manifest();
        let council = manifest.contest("council").unwrap();
        assert_eq!(council.votes_allowed, 2);
        assert_eq!(council.selection("council-dave").unwrap().candidate_id, "dave");
        assert!(manifest.contest("sheriff").is_none());
        assert!(council.selection("mayor-alice").is_none());
    }

    #[test]
    fn it_should_reject_duplicate_ids() {
        let mut manifest = Helper::fake_manifest();
        assert!(manifest.is_valid());
        manifest.contests[1].selections[1].object_id = "council-carol".to_string();
        assert!(!manifest.is_valid());

        let mut manifest = Helper::fake_manifest();
        manifest.contests[1].sequence_order = 0;
        assert!(!manifest.is_valid());
    }
}
