//! Bookkeeping for the key ceremony as seen from a coordinator.
//!
//! The mediator relays announcements and backups between guardians. It
//! never holds secret material; backups stay encrypted to their designated
//! guardian.

use crate::guardian::Guardian;
use crate::key_ceremony::{
    combine_election_public_keys, CeremonyDetails, CeremonyProgress, CeremonyState, ElectionJointKey,
    ElectionPartialKeyBackup, ElectionPartialKeyChallenge, ElectionPartialKeyVerification, PublicKeySet,
    verify_election_partial_key_challenge,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The backup sent by `owner_id` to `designated_id`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GuardianPair {
    pub owner_id: String,
    pub designated_id: String,
}

impl GuardianPair {
    pub fn new(owner_id: &str, designated_id: &str) -> Self {
        GuardianPair {
            owner_id: owner_id.to_string(),
            designated_id: designated_id.to_string(),
        }
    }
}

/// Where the backup of one [`GuardianPair`] stands.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackupVerificationState {
    Pending,
    Verified,
    Challenged,
    ChallengeResolved,
    Failed,
}

impl BackupVerificationState {
    /// Applies the designated guardian's verdict. Only a pending pair moves.
    pub fn on_verification(self, verified: bool) -> Self {
        match (self, verified) {
            (BackupVerificationState::Pending, true) => BackupVerificationState::Verified,
            (BackupVerificationState::Pending, false) => BackupVerificationState::Challenged,
            (state, _) => state,
        }
    }

    /// Applies the public check of a revealed coordinate. Only a challenged pair moves.
    pub fn on_challenge_result(self, verified: bool) -> Self {
        match (self, verified) {
            (BackupVerificationState::Challenged, true) => BackupVerificationState::ChallengeResolved,
            (BackupVerificationState::Challenged, false) => BackupVerificationState::Failed,
            (state, _) => state,
        }
    }

    pub fn is_settled_ok(self) -> bool {
        matches!(
            self,
            BackupVerificationState::Verified | BackupVerificationState::ChallengeResolved
        )
    }
}

#[derive(Debug)]
pub struct KeyCeremonyMediator {
    pub id: String,
    ceremony_details: CeremonyDetails,
    announcements: BTreeMap<String, PublicKeySet>,
    backups: BTreeMap<GuardianPair, ElectionPartialKeyBackup>,
    verifications: BTreeMap<GuardianPair, ElectionPartialKeyVerification>,
    challenges: BTreeMap<GuardianPair, ElectionPartialKeyChallenge>,
    pair_states: BTreeMap<GuardianPair, BackupVerificationState>,
    joint_key: Option<ElectionJointKey>,
}

impl KeyCeremonyMediator {
    pub fn new(id: &str, ceremony_details: CeremonyDetails) -> Self {
        KeyCeremonyMediator {
            id: id.to_string(),
            ceremony_details,
            announcements: BTreeMap::new(),
            backups: BTreeMap::new(),
            verifications: BTreeMap::new(),
            challenges: BTreeMap::new(),
            pair_states: BTreeMap::new(),
            joint_key: None,
        }
    }

    pub fn ceremony_details(&self) -> CeremonyDetails {
        self.ceremony_details
    }

    /// Records a guardian's public keys. Invalid proofs and duplicate sequence orders are refused.
    pub fn announce(&mut self, public_keys: PublicKeySet) -> bool {
        if !public_keys.is_valid() {
            warn!("mediator {}: invalid public keys from {}", self.id, public_keys.owner_id());
            return false;
        }
        let sequence_order = public_keys.sequence_order();
        if sequence_order == 0 || sequence_order > self.ceremony_details.number_of_guardians as u64 {
            warn!(
                "mediator {}: {} announced sequence order {}",
                self.id,
                public_keys.owner_id(),
                sequence_order
            );
            return false;
        }
        let taken = self
            .announcements
            .values()
            .any(|set| set.sequence_order() == sequence_order && set.owner_id() != public_keys.owner_id());
        if taken {
            warn!("mediator {}: sequence order {} is already taken", self.id, sequence_order);
            return false;
        }
        debug!("mediator {}: {} announced", self.id, public_keys.owner_id());
        self.announcements
            .insert(public_keys.owner_id().to_string(), public_keys);
        true
    }

    pub fn all_guardians_announced(&self) -> bool {
        self.announcements.len() == self.ceremony_details.number_of_guardians
    }

    /// The announcements of every guardian other than `requesting_id`, once all have announced.
    pub fn share_announced(&self, requesting_id: &str) -> Option<Vec<PublicKeySet>> {
        if !self.all_guardians_announced() {
            return None;
        }
        Some(
            self.announcements
                .values()
                .filter(|set| set.owner_id() != requesting_id)
                .cloned()
                .collect(),
        )
    }

    /// Records backups for relay. Backups between unannounced guardians are refused.
    pub fn receive_backups(&mut self, backups: Vec<ElectionPartialKeyBackup>) -> bool {
        let mut accepted = true;
        for backup in backups {
            if !self.announcements.contains_key(&backup.owner_id)
                || !self.announcements.contains_key(&backup.designated_id)
                || backup.owner_id == backup.designated_id
            {
                warn!(
                    "mediator {}: refused backup from {} to {}",
                    self.id, backup.owner_id, backup.designated_id
                );
                accepted = false;
                continue;
            }
            let pair = GuardianPair::new(&backup.owner_id, &backup.designated_id);
            self.pair_states.insert(pair.clone(), BackupVerificationState::Pending);
            self.verifications.remove(&pair);
            self.challenges.remove(&pair);
            self.backups.insert(pair, backup);
        }
        accepted
    }

    fn expected_pairs(&self) -> usize {
        let n = self.ceremony_details.number_of_guardians;
        n * n.saturating_sub(1)
    }

    pub fn all_backups_available(&self) -> bool {
        self.all_guardians_announced() && self.backups.len() == self.expected_pairs()
    }

    /// The backups designated to `designated_id`, once every backup arrived.
    pub fn share_backups(&self, designated_id: &str) -> Option<Vec<ElectionPartialKeyBackup>> {
        if !self.all_backups_available() {
            return None;
        }
        Some(
            self.backups
                .iter()
                .filter(|(pair, _)| pair.designated_id == designated_id)
                .map(|(_, backup)| backup.clone())
                .collect(),
        )
    }

    pub fn receive_backup_verifications(&mut self, verifications: Vec<ElectionPartialKeyVerification>) {
        for verification in verifications {
            let pair = GuardianPair::new(&verification.owner_id, &verification.designated_id);
            let state = match self.pair_states.get(&pair) {
                Some(state) => *state,
                None => {
                    warn!(
                        "mediator {}: verification for unknown backup {} -> {}",
                        self.id, pair.owner_id, pair.designated_id
                    );
                    continue;
                }
            };
            if verification.verifier_id != pair.designated_id {
                warn!(
                    "mediator {}: {} cannot vouch for the backup of {}",
                    self.id, verification.verifier_id, pair.designated_id
                );
                continue;
            }
            if !verification.verified {
                warn!(
                    "mediator {}: {} rejected the backup from {}",
                    self.id, pair.designated_id, pair.owner_id
                );
            }
            self.pair_states
                .insert(pair.clone(), state.on_verification(verification.verified));
            self.verifications.insert(pair, verification);
        }
    }

    /// Pairs whose designated guardian could not verify its backup and which await a challenge.
    pub fn failed_verifications(&self) -> Vec<GuardianPair> {
        self.pair_states
            .iter()
            .filter(|(_, state)| **state == BackupVerificationState::Challenged)
            .map(|(pair, _)| pair.clone())
            .collect()
    }

    pub fn receive_backup_challenges(&mut self, challenges: Vec<ElectionPartialKeyChallenge>) {
        for challenge in challenges {
            let pair = GuardianPair::new(&challenge.owner_id, &challenge.designated_id);
            if self.pair_states.get(&pair) == Some(&BackupVerificationState::Challenged) {
                self.challenges.insert(pair, challenge);
            } else {
                debug!(
                    "mediator {}: ignored unsolicited challenge {} -> {}",
                    self.id, pair.owner_id, pair.designated_id
                );
            }
        }
    }

    /// Publicly checks every received challenge and settles its pair.
    ///
    /// A challenge must carry the commitments its owner announced.
    pub fn verify_challenges(&mut self) -> Vec<ElectionPartialKeyVerification> {
        let results: Vec<ElectionPartialKeyVerification> = self
            .challenges
            .values()
            .map(|challenge| {
                let announced = self.announcements.get(&challenge.owner_id).map_or(false, |set| {
                    set.election.coefficient_commitments == challenge.coefficient_commitments
                });
                if announced {
                    verify_election_partial_key_challenge(&self.id, challenge)
                } else {
                    ElectionPartialKeyVerification {
                        owner_id: challenge.owner_id.clone(),
                        designated_id: challenge.designated_id.clone(),
                        verifier_id: self.id.clone(),
                        verified: false,
                    }
                }
            })
            .collect();

        for verification in &results {
            let pair = GuardianPair::new(&verification.owner_id, &verification.designated_id);
            if let Some(state) = self.pair_states.get_mut(&pair) {
                *state = state.on_challenge_result(verification.verified);
                if !verification.verified {
                    warn!(
                        "mediator {}: {} failed to resolve the challenge by {}",
                        self.id, pair.owner_id, pair.designated_id
                    );
                }
            }
            self.verifications.insert(pair, verification.clone());
        }
        self.challenges.clear();
        results
    }

    /// Challenges waiting for [`KeyCeremonyMediator::verify_challenges`].
    pub fn challenges(&self) -> Vec<ElectionPartialKeyChallenge> {
        self.challenges.values().cloned().collect()
    }

    pub fn pair_state(&self, pair: &GuardianPair) -> Option<BackupVerificationState> {
        self.pair_states.get(pair).copied()
    }

    /// The verifications of the backups owned by `owner_id`.
    pub fn verifications_for_owner(&self, owner_id: &str) -> Vec<ElectionPartialKeyVerification> {
        self.verifications
            .iter()
            .filter(|(pair, _)| pair.owner_id == owner_id)
            .map(|(_, verification)| verification.clone())
            .collect()
    }

    pub fn all_backups_verified(&self) -> bool {
        self.all_backups_available() && self.pair_states.values().all(|state| state.is_settled_ok())
    }

    pub fn state(&self) -> CeremonyState {
        let progress = CeremonyProgress {
            auxiliary_keys_received: self.all_guardians_announced(),
            election_keys_received: self.all_guardians_announced(),
            backups_generated: self.all_backups_available(),
            backups_received: self.all_backups_available(),
            backups_verified: self.all_backups_verified(),
            joint_key_published: self.joint_key.is_some(),
        };
        CeremonyState::KeysGenerated.advance(&progress)
    }

    /// Combines the announced keys once every pair is settled.
    pub fn publish_joint_key(&mut self) -> Option<ElectionJointKey> {
        if !self.all_backups_verified() {
            debug!("mediator {}: ceremony is in state {:?}", self.id, self.state());
            return None;
        }
        let joint_key = combine_election_public_keys(self.announcements.values().map(|set| &set.election));
        info!("mediator {}: joint key published", self.id);
        self.joint_key = Some(joint_key.clone());
        Some(joint_key)
    }

    /// Forgets everything but the ceremony details.
    pub fn reset(&mut self, ceremony_details: CeremonyDetails) {
        *self = KeyCeremonyMediator::new(&self.id, ceremony_details);
    }
}

/// Runs every round of the ceremony between `guardians` through `mediator`.
///
/// Returns `None` if any round cannot complete, for example when a guardian
/// is missing or a disputed backup is not resolved.
pub fn orchestrate_key_ceremony(
    guardians: &mut [Guardian],
    mediator: &mut KeyCeremonyMediator,
) -> Option<ElectionJointKey> {
    // round 1: announce
    for guardian in guardians.iter() {
        if !mediator.announce(guardian.share_public_keys()) {
            return None;
        }
    }
    for guardian in guardians.iter_mut() {
        for set in mediator.share_announced(&guardian.id)? {
            if !guardian.save_guardian_public_keys(&set) {
                return None;
            }
        }
    }

    // round 2: backups
    let generated = guardians
        .par_iter_mut()
        .map(Guardian::generate_partial_key_backups)
        .collect::<Vec<bool>>();
    if generated.contains(&false) {
        return None;
    }
    for guardian in guardians.iter() {
        if !mediator.receive_backups(guardian.share_election_partial_key_backups()) {
            return None;
        }
    }
    for guardian in guardians.iter_mut() {
        for backup in mediator.share_backups(&guardian.id)? {
            guardian.save_election_partial_key_backup(backup);
        }
    }

    // round 3: verification
    let verifications: Vec<ElectionPartialKeyVerification> = guardians
        .par_iter()
        .flat_map_iter(|guardian| {
            mediator
                .announcements
                .keys()
                .filter(|owner_id| *owner_id != &guardian.id)
                .filter_map(|owner_id| guardian.verify_partial_key_backup(owner_id))
                .collect::<Vec<_>>()
        })
        .collect();
    mediator.receive_backup_verifications(verifications);

    // round 4: challenges for failed verifications
    let failed = mediator.failed_verifications();
    if !failed.is_empty() {
        let challenges: Vec<ElectionPartialKeyChallenge> = failed
            .iter()
            .filter_map(|pair| {
                guardians
                    .iter()
                    .find(|guardian| guardian.id == pair.owner_id)
                    .and_then(|owner| owner.publish_backup_challenge(&pair.designated_id))
            })
            .collect();
        mediator.receive_backup_challenges(challenges.clone());
        mediator.verify_challenges();

        for challenge in &challenges {
            if let Some(designated) = guardians.iter_mut().find(|g| g.id == challenge.designated_id) {
                designated.accept_challenge_resolution(challenge);
            }
        }
    }

    for guardian in guardians.iter_mut() {
        for verification in mediator.verifications_for_owner(&guardian.id) {
            guardian.save_election_partial_key_verification(ElectionPartialKeyVerification {
                verified: mediator
                    .pair_state(&GuardianPair::new(&verification.owner_id, &verification.designated_id))
                    .map_or(false, BackupVerificationState::is_settled_ok),
                ..verification
            });
        }
    }

    // round 5: joint key
    let joint_key = mediator.publish_joint_key()?;
    for guardian in guardians.iter_mut() {
        if guardian.publish_joint_key().as_ref() != Some(&joint_key) {
            warn!("guardian {} disagrees on the joint key", guardian.id);
            return None;
        }
    }
    Some(joint_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::ElementModQ;
    use crate::helper::Helper;
    use crate::polynomial::ElectionPolynomial;

    fn guardians(details: CeremonyDetails) -> Vec<Guardian> {
        (1..=details.number_of_guardians)
            .map(|i| Guardian::new(&format!("guardian-{}", i), i as u64, details).unwrap())
            .collect()
    }

    #[test]
    fn it_should_move_pair_states_only_forward() {
        use BackupVerificationState::*;
        assert_eq!(Pending.on_verification(true), Verified);
        assert_eq!(Pending.on_verification(false), Challenged);
        assert_eq!(Verified.on_verification(false), Verified);
        assert_eq!(Challenged.on_challenge_result(true), ChallengeResolved);
        assert_eq!(Challenged.on_challenge_result(false), Failed);
        assert_eq!(Pending.on_challenge_result(true), Pending);
        assert!(ChallengeResolved.is_settled_ok());
        assert!(!Failed.is_settled_ok());
    }

    #[test]
    fn it_should_run_a_full_ceremony() {
        Helper::setup_test_group();
        let details = CeremonyDetails::new(3, 2).unwrap();
        let mut guardians = guardians(details);
        let mut mediator = KeyCeremonyMediator::new("mediator", details);

        let joint = orchestrate_key_ceremony(&mut guardians, &mut mediator).unwrap();
        assert_eq!(mediator.state(), CeremonyState::JointKeyPublished);
        for guardian in &guardians {
            assert_eq!(guardian.state(), CeremonyState::JointKeyPublished);
        }
        let keys = guardians.iter().map(|g| g.share_election_public_key().key);
        let product = keys.fold(crate::group::ElementModP::one(), |acc, key| {
            crate::group::mult_p(&[&acc, &key])
        });
        assert_eq!(joint.joint_public_key, product);
    }

    #[test]
    fn it_should_not_publish_without_every_guardian() {
        Helper::setup_test_group();
        let details = CeremonyDetails::new(3, 2).unwrap();
        let mut guardians = guardians(details);
        guardians.pop();
        let mut mediator = KeyCeremonyMediator::new("mediator", details);

        assert!(orchestrate_key_ceremony(&mut guardians, &mut mediator).is_none());
        assert!(mediator.publish_joint_key().is_none());
        assert_eq!(mediator.state(), CeremonyState::KeysGenerated);
    }

    #[test]
    fn it_should_refuse_duplicate_sequence_orders() {
        Helper::setup_test_group();
        let details = CeremonyDetails::new(2, 2).unwrap();
        let first = Guardian::new("first", 1, details).unwrap();
        let impostor = Guardian::new("impostor", 1, details).unwrap();
        let mut mediator = KeyCeremonyMediator::new("mediator", details);

        assert!(mediator.announce(first.share_public_keys()));
        assert!(!mediator.announce(impostor.share_public_keys()));
        assert!(mediator.share_announced("first").is_none());
    }

    #[test]
    fn it_should_resolve_a_disputed_backup() {
        Helper::setup_test_group();
        let details = CeremonyDetails::new(2, 2).unwrap();
        let mut guardians = guardians(details);
        let mut mediator = KeyCeremonyMediator::new("mediator", details);

        for guardian in &guardians {
            assert!(mediator.announce(guardian.share_public_keys()));
        }
        let pair = GuardianPair::new("guardian-1", "guardian-2");
        for guardian in guardians.iter_mut() {
            for set in mediator.share_announced(&guardian.id).unwrap() {
                guardian.save_guardian_public_keys(&set);
            }
            guardian.generate_partial_key_backups();
            mediator.receive_backups(guardian.share_election_partial_key_backups());
        }
        assert!(mediator.all_backups_available());

        mediator.receive_backup_verifications(vec![ElectionPartialKeyVerification {
            owner_id: pair.owner_id.clone(),
            designated_id: pair.designated_id.clone(),
            verifier_id: pair.designated_id.clone(),
            verified: false,
        }]);
        assert_eq!(mediator.failed_verifications(), vec![pair.clone()]);
        assert!(mediator.publish_joint_key().is_none());

        let challenge = guardians[0].publish_backup_challenge("guardian-2").unwrap();
        mediator.receive_backup_challenges(vec![challenge]);
        let results = mediator.verify_challenges();
        assert!(results[0].verified);
        assert_eq!(mediator.pair_state(&pair), Some(BackupVerificationState::ChallengeResolved));

        mediator.receive_backup_verifications(vec![ElectionPartialKeyVerification {
            owner_id: "guardian-2".to_string(),
            designated_id: "guardian-1".to_string(),
            verifier_id: "guardian-1".to_string(),
            verified: true,
        }]);
        assert!(mediator.publish_joint_key().is_some());
    }

    #[test]
    fn it_should_fail_a_forged_challenge() {
        Helper::setup_test_group();
        let details = CeremonyDetails::new(2, 2).unwrap();
        let mut guardians = guardians(details);
        let mut mediator = KeyCeremonyMediator::new("mediator", details);
        for guardian in &guardians {
            mediator.announce(guardian.share_public_keys());
        }
        for guardian in guardians.iter_mut() {
            for set in mediator.share_announced(&guardian.id).unwrap() {
                guardian.save_guardian_public_keys(&set);
            }
            guardian.generate_partial_key_backups();
            mediator.receive_backups(guardian.share_election_partial_key_backups());
        }
        mediator.receive_backup_verifications(vec![ElectionPartialKeyVerification {
            owner_id: "guardian-1".to_string(),
            designated_id: "guardian-2".to_string(),
            verifier_id: "guardian-2".to_string(),
            verified: false,
        }]);

        let mut challenge = guardians[0].publish_backup_challenge("guardian-2").unwrap();
        challenge.value = ElementModQ::from_u64(7).unwrap();
        mediator.receive_backup_challenges(vec![challenge]);
        mediator.verify_challenges();

        let pair = GuardianPair::new("guardian-1", "guardian-2");
        assert_eq!(mediator.pair_state(&pair), Some(BackupVerificationState::Failed));
        assert!(mediator.publish_joint_key().is_none());

        mediator.reset(details);
        assert_eq!(mediator.state(), CeremonyState::KeysGenerated);
    }

    #[test]
    fn it_should_fail_a_challenge_under_unannounced_commitments() {
        Helper::setup_test_group();
        let details = CeremonyDetails::new(2, 2).unwrap();
        let mut guardians = guardians(details);
        let mut mediator = KeyCeremonyMediator::new("mediator", details);
        for guardian in &guardians {
            mediator.announce(guardian.share_public_keys());
        }
        for guardian in guardians.iter_mut() {
            for set in mediator.share_announced(&guardian.id).unwrap() {
                guardian.save_guardian_public_keys(&set);
            }
            guardian.generate_partial_key_backups();
            mediator.receive_backups(guardian.share_election_partial_key_backups());
        }
        mediator.receive_backup_verifications(vec![ElectionPartialKeyVerification {
            owner_id: "guardian-1".to_string(),
            designated_id: "guardian-2".to_string(),
            verifier_id: "guardian-2".to_string(),
            verified: false,
        }]);

        // self-consistent, but for a polynomial guardian-1 never announced
        let other = ElectionPolynomial::generate(2, None);
        let mut challenge = guardians[0].publish_backup_challenge("guardian-2").unwrap();
        challenge.value = other.compute_coordinate(challenge.designated_sequence_order);
        challenge.coefficient_commitments = other.commitments();
        challenge.coefficient_proofs = other.proofs();
        assert!(verify_election_partial_key_challenge("anyone", &challenge).verified);

        mediator.receive_backup_challenges(vec![challenge]);
        let results = mediator.verify_challenges();
        assert_eq!(results.len(), 1);
        assert!(!results[0].verified);
        let pair = GuardianPair::new("guardian-1", "guardian-2");
        assert_eq!(mediator.pair_state(&pair), Some(BackupVerificationState::Failed));
    }
}
