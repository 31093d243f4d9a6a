use crate::constants::{use_constants, GroupContext, PrimeOption};
use crate::encryption::ElGamalKeyPair;
use crate::group::ElementModQ;
use crate::manifest::{ContestDescription, Manifest, SelectionDescription};
use crate::pow_radix::PowRadixStyle;
use std::sync::Arc;

/// Setup shortcuts shared by the unit tests, integration tests and benches.
pub struct Helper;

impl Helper {
    /// Activates the 32-bit test group.
    pub fn setup_test_group() -> Arc<GroupContext> {
        init_test_logger();
        use_constants(PrimeOption::MediumTest, PowRadixStyle::LowMemoryUse)
    }

    /// Activates the 32-bit test group and returns a fixed key pair.
    pub fn setup_md_system() -> ElGamalKeyPair {
        Self::setup_test_group();
        let secret = ElementModQ::from_u64(1_234_567).ok();
        secret
            .as_ref()
            .and_then(ElGamalKeyPair::from_secret)
            .unwrap_or_else(ElGamalKeyPair::random)
    }

    /// A manifest with one single-choice contest and one two-of-three contest.
    pub fn fake_manifest() -> Manifest {
        Manifest {
            election_scope_id: "fake-election".to_string(),
            contests: vec![
                Self::fake_contest("mayor", 0, 1, &["alice", "bob"]),
                Self::fake_contest("council", 1, 2, &["carol", "dave", "erin"]),
            ],
        }
    }

    pub fn fake_contest(
        object_id: &str,
        sequence_order: u64,
        votes_allowed: u64,
        candidates: &[&str],
    ) -> ContestDescription {
        ContestDescription {
            object_id: object_id.to_string(),
            sequence_order,
            votes_allowed,
            selections: candidates
                .iter()
                .enumerate()
                .map(|(i, candidate)| SelectionDescription {
                    object_id: format!("{}-{}", object_id, candidate),
                    sequence_order: i as u64,
                    candidate_id: candidate.to_string(),
                })
                .collect(),
        }
    }
}

fn init_test_logger() {
    #[cfg(test)]
    let _ = env_logger::builder().is_test(true).try_init();
}
