use crate::auxiliary::{AuxiliaryKeyPair, AuxiliaryPublicKey, AuxiliaryScheme, HashedElGamalAes};
use crate::encryption::ElGamalCiphertext;
use crate::group::{rand_q, ElementModP, ElementModQ};
use crate::key_ceremony::{
    combine_election_public_keys, decrypt_backup_value, generate_election_key_pair,
    generate_election_partial_key_backup, generate_election_partial_key_challenge,
    share_election_public_key, verify_election_partial_key_backup,
    verify_election_partial_key_challenge, CeremonyDetails, CeremonyProgress, CeremonyState,
    ElectionJointKey, ElectionKeyPair, ElectionPartialKeyBackup, ElectionPartialKeyChallenge,
    ElectionPartialKeyVerification, ElectionPublicKey, PublicKeySet,
};
use crate::polynomial::commitment_product;
use crate::proofs::ChaumPedersenProof;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A trustee holding one share of the election secret.
///
/// The guardian keeps its own public keys in the same maps as the keys it
/// receives, so "all received" means one entry per guardian including itself.
pub struct Guardian {
    pub id: String,
    pub sequence_order: u64,
    ceremony_details: CeremonyDetails,
    auxiliary_keys: AuxiliaryKeyPair,
    election_keys: ElectionKeyPair,
    scheme: Arc<dyn AuxiliaryScheme>,

    backups_to_share: BTreeMap<String, ElectionPartialKeyBackup>,
    guardian_auxiliary_public_keys: BTreeMap<String, AuxiliaryPublicKey>,
    guardian_election_public_keys: BTreeMap<String, ElectionPublicKey>,
    guardian_election_partial_key_backups: BTreeMap<String, ElectionPartialKeyBackup>,
    guardian_election_partial_key_verifications: BTreeMap<String, ElectionPartialKeyVerification>,
    joint_key: Option<ElectionJointKey>,
    state: CeremonyState,
}

impl fmt::Debug for Guardian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guardian")
            .field("id", &self.id)
            .field("sequence_order", &self.sequence_order)
            .field("state", &self.state)
            .finish()
    }
}

impl Guardian {
    /// Creates a guardian with fresh keys and the default auxiliary scheme.
    ///
    /// Returns `None` unless `1 <= sequence_order <= number_of_guardians`
    /// and the ceremony details are consistent.
    pub fn new(id: &str, sequence_order: u64, ceremony_details: CeremonyDetails) -> Option<Self> {
        Self::with_scheme(id, sequence_order, ceremony_details, Arc::new(HashedElGamalAes))
    }

    pub fn with_scheme(
        id: &str,
        sequence_order: u64,
        ceremony_details: CeremonyDetails,
        scheme: Arc<dyn AuxiliaryScheme>,
    ) -> Option<Self> {
        Self::build(id, sequence_order, ceremony_details, scheme, None)
    }

    /// Creates a guardian whose election keys are derived from `seed`.
    pub fn from_seed(
        id: &str,
        sequence_order: u64,
        ceremony_details: CeremonyDetails,
        seed: &ElementModQ,
    ) -> Option<Self> {
        Self::build(id, sequence_order, ceremony_details, Arc::new(HashedElGamalAes), Some(seed))
    }

    fn build(
        id: &str,
        sequence_order: u64,
        ceremony_details: CeremonyDetails,
        scheme: Arc<dyn AuxiliaryScheme>,
        seed: Option<&ElementModQ>,
    ) -> Option<Self> {
        let details = CeremonyDetails::new(ceremony_details.number_of_guardians, ceremony_details.quorum)?;
        if sequence_order == 0 || sequence_order > details.number_of_guardians as u64 {
            warn!("guardian {} has invalid sequence order {}", id, sequence_order);
            return None;
        }

        let election_keys = generate_election_key_pair(details.quorum, seed)?;
        let auxiliary_keys = scheme.generate_keypair();

        let mut guardian = Guardian {
            id: id.to_string(),
            sequence_order,
            ceremony_details: details,
            auxiliary_keys,
            election_keys,
            scheme,
            backups_to_share: BTreeMap::new(),
            guardian_auxiliary_public_keys: BTreeMap::new(),
            guardian_election_public_keys: BTreeMap::new(),
            guardian_election_partial_key_backups: BTreeMap::new(),
            guardian_election_partial_key_verifications: BTreeMap::new(),
            joint_key: None,
            state: CeremonyState::KeysGenerated,
        };
        let own = guardian.share_public_keys();
        guardian.save_guardian_public_keys(&own);
        debug!("guardian {} created", guardian.id);
        Some(guardian)
    }

    pub fn ceremony_details(&self) -> CeremonyDetails {
        self.ceremony_details
    }

    pub fn state(&self) -> CeremonyState {
        self.state
    }

    pub fn share_auxiliary_public_key(&self) -> AuxiliaryPublicKey {
        AuxiliaryPublicKey {
            owner_id: self.id.clone(),
            sequence_order: self.sequence_order,
            key: self.auxiliary_keys.public_key.clone(),
        }
    }

    pub fn share_election_public_key(&self) -> ElectionPublicKey {
        share_election_public_key(&self.id, self.sequence_order, &self.election_keys)
    }

    pub fn share_public_keys(&self) -> PublicKeySet {
        PublicKeySet {
            election: self.share_election_public_key(),
            auxiliary: self.share_auxiliary_public_key(),
        }
    }

    /// Stores another guardian's public keys after checking their proofs.
    pub fn save_guardian_public_keys(&mut self, public_keys: &PublicKeySet) -> bool {
        if !public_keys.is_valid() {
            warn!(
                "guardian {} rejected invalid public keys of {}",
                self.id,
                public_keys.owner_id()
            );
            return false;
        }
        let owner_id = public_keys.owner_id().to_string();
        self.guardian_auxiliary_public_keys
            .insert(owner_id.clone(), public_keys.auxiliary.clone());
        self.guardian_election_public_keys
            .insert(owner_id, public_keys.election.clone());
        self.refresh_state();
        true
    }

    pub fn all_auxiliary_public_keys_received(&self) -> bool {
        self.guardian_auxiliary_public_keys.len() == self.ceremony_details.number_of_guardians
    }

    pub fn all_election_public_keys_received(&self) -> bool {
        self.guardian_election_public_keys.len() == self.ceremony_details.number_of_guardians
    }

    pub fn all_public_keys_received(&self) -> bool {
        self.all_auxiliary_public_keys_received() && self.all_election_public_keys_received()
    }

    pub fn guardian_election_public_keys(&self) -> &BTreeMap<String, ElectionPublicKey> {
        &self.guardian_election_public_keys
    }

    pub fn election_public_key_of(&self, guardian_id: &str) -> Option<&ElectionPublicKey> {
        self.guardian_election_public_keys.get(guardian_id)
    }

    /// Encrypts one coordinate of the polynomial to every other guardian.
    pub fn generate_partial_key_backups(&mut self) -> bool {
        if !self.all_auxiliary_public_keys_received() {
            debug!("guardian {} cannot create backups before all keys arrived", self.id);
            return false;
        }

        let mut backups = BTreeMap::new();
        for (designated_id, auxiliary_key) in &self.guardian_auxiliary_public_keys {
            if designated_id == &self.id {
                continue;
            }
            match generate_election_partial_key_backup(
                &self.id,
                &self.election_keys.polynomial,
                auxiliary_key,
                self.scheme.as_ref(),
            ) {
                Ok(backup) => {
                    backups.insert(designated_id.clone(), backup);
                }
                Err(err) => {
                    warn!("guardian {} failed to back up to {}: {}", self.id, designated_id, err);
                    return false;
                }
            }
        }
        self.backups_to_share = backups;
        self.refresh_state();
        true
    }

    pub fn share_election_partial_key_backup(&self, designated_id: &str) -> Option<ElectionPartialKeyBackup> {
        self.backups_to_share.get(designated_id).cloned()
    }

    pub fn share_election_partial_key_backups(&self) -> Vec<ElectionPartialKeyBackup> {
        self.backups_to_share.values().cloned().collect()
    }

    /// Stores a backup designated to this guardian.
    pub fn save_election_partial_key_backup(&mut self, backup: ElectionPartialKeyBackup) -> bool {
        if backup.designated_id != self.id || backup.designated_sequence_order != self.sequence_order {
            warn!(
                "guardian {} refused a backup designated to {}",
                self.id, backup.designated_id
            );
            return false;
        }
        self.guardian_election_partial_key_backups
            .insert(backup.owner_id.clone(), backup);
        self.refresh_state();
        true
    }

    pub fn all_election_partial_key_backups_received(&self) -> bool {
        self.guardian_election_partial_key_backups.len() + 1 == self.ceremony_details.number_of_guardians
    }

    /// Checks the backup received from `owner_id`.
    ///
    /// The backup's commitments must also be the ones `owner_id` announced.
    pub fn verify_partial_key_backup(&self, owner_id: &str) -> Option<ElectionPartialKeyVerification> {
        let backup = self.guardian_election_partial_key_backups.get(owner_id)?;
        let announced = self
            .guardian_election_public_keys
            .get(owner_id)
            .map_or(false, |key| key.coefficient_commitments == backup.coefficient_commitments);
        if !announced {
            warn!(
                "guardian {}: backup from {} does not match its announced commitments",
                self.id, owner_id
            );
            return Some(ElectionPartialKeyVerification {
                owner_id: backup.owner_id.clone(),
                designated_id: backup.designated_id.clone(),
                verifier_id: self.id.clone(),
                verified: false,
            });
        }
        Some(verify_election_partial_key_backup(
            &self.id,
            backup,
            &self.auxiliary_keys,
            self.scheme.as_ref(),
        ))
    }

    /// Reveals the coordinate sent to `designated_id` in answer to a dispute.
    pub fn publish_backup_challenge(&self, designated_id: &str) -> Option<ElectionPartialKeyChallenge> {
        let backup = self.backups_to_share.get(designated_id)?;
        Some(generate_election_partial_key_challenge(
            backup,
            &self.election_keys.polynomial,
        ))
    }

    pub fn verify_backup_challenge(&self, challenge: &ElectionPartialKeyChallenge) -> ElectionPartialKeyVerification {
        let mut verification = verify_election_partial_key_challenge(&self.id, challenge);
        verification.verified &= self
            .guardian_election_public_keys
            .get(&challenge.owner_id)
            .map_or(false, |key| key.coefficient_commitments == challenge.coefficient_commitments);
        verification
    }

    /// Replaces a disputed backup with the value revealed by a valid challenge.
    pub fn accept_challenge_resolution(&mut self, challenge: &ElectionPartialKeyChallenge) -> bool {
        if challenge.designated_id != self.id || !self.verify_backup_challenge(challenge).verified {
            return false;
        }
        let encrypted_value = match self
            .scheme
            .encrypt(challenge.value.to_hex().as_bytes(), &self.auxiliary_keys.public_key)
        {
            Ok(encrypted_value) => encrypted_value,
            Err(err) => {
                warn!("guardian {} could not store resolved backup: {}", self.id, err);
                return false;
            }
        };
        let backup = ElectionPartialKeyBackup {
            owner_id: challenge.owner_id.clone(),
            designated_id: challenge.designated_id.clone(),
            designated_sequence_order: challenge.designated_sequence_order,
            encrypted_value,
            coefficient_commitments: challenge.coefficient_commitments.clone(),
            coefficient_proofs: challenge.coefficient_proofs.clone(),
        };
        self.save_election_partial_key_backup(backup)
    }

    /// Stores the verdict on one of this guardian's own backups.
    pub fn save_election_partial_key_verification(&mut self, verification: ElectionPartialKeyVerification) -> bool {
        if verification.owner_id != self.id {
            return false;
        }
        self.guardian_election_partial_key_verifications
            .insert(verification.designated_id.clone(), verification);
        self.refresh_state();
        true
    }

    pub fn all_election_partial_key_backups_verified(&self) -> bool {
        let expected = self.ceremony_details.number_of_guardians - 1;
        self.guardian_election_partial_key_verifications.len() == expected
            && self
                .guardian_election_partial_key_verifications
                .values()
                .all(|verification| verification.verified)
    }

    /// Combines all guardians' election public keys, once every one of them
    /// arrived and every backup of this guardian was verified.
    pub fn publish_joint_key(&mut self) -> Option<ElectionJointKey> {
        if !self.all_election_public_keys_received() {
            debug!("guardian {} is missing election public keys", self.id);
            return None;
        }
        if !self.all_election_partial_key_backups_verified() {
            debug!("guardian {} has unverified backups", self.id);
            return None;
        }
        let joint_key = combine_election_public_keys(self.guardian_election_public_keys.values());
        self.joint_key = Some(joint_key.clone());
        self.refresh_state();
        info!("guardian {} published the joint key", self.id);
        Some(joint_key)
    }

    /// Computes the partial decryption M_i = A^s_i with its proof.
    pub fn partially_decrypt(
        &self,
        ciphertext: &ElGamalCiphertext,
        extended_base_hash: &ElementModQ,
        seed: Option<&ElementModQ>,
    ) -> (ElementModP, ChaumPedersenProof) {
        let secret = &self.election_keys.key_pair.secret_key;
        let share = ciphertext.partial_decrypt(secret);
        let seed = seed.cloned().unwrap_or_else(rand_q);
        let proof = ChaumPedersenProof::generate(ciphertext, secret, &share, &seed, extended_base_hash);
        (share, proof)
    }

    /// Computes the share of the missing guardian from its backup coordinate P_missing(i).
    ///
    /// The proof verifies against [`Guardian::recovery_public_key_for`].
    pub fn compensated_decrypt(
        &self,
        missing_guardian_id: &str,
        ciphertext: &ElGamalCiphertext,
        extended_base_hash: &ElementModQ,
        seed: Option<&ElementModQ>,
    ) -> Option<(ElementModP, ChaumPedersenProof)> {
        let backup = self.guardian_election_partial_key_backups.get(missing_guardian_id)?;
        let coordinate = match decrypt_backup_value(backup, &self.auxiliary_keys, self.scheme.as_ref()) {
            Ok(coordinate) => coordinate,
            Err(err) => {
                warn!(
                    "guardian {} cannot read the backup of {}: {}",
                    self.id, missing_guardian_id, err
                );
                return None;
            }
        };

        let share = ciphertext.partial_decrypt(&coordinate);
        let seed = seed.cloned().unwrap_or_else(rand_q);
        let proof = ChaumPedersenProof::generate(ciphertext, &coordinate, &share, &seed, extended_base_hash);
        Some((share, proof))
    }

    /// g^P_missing(i), computed from the missing guardian's public commitments.
    pub fn recovery_public_key_for(&self, missing_guardian_id: &str) -> Option<ElementModP> {
        let backup = self.guardian_election_partial_key_backups.get(missing_guardian_id)?;
        Some(commitment_product(
            self.sequence_order,
            &backup.coefficient_commitments,
        ))
    }

    fn progress(&self) -> CeremonyProgress {
        CeremonyProgress {
            auxiliary_keys_received: self.all_auxiliary_public_keys_received(),
            election_keys_received: self.all_election_public_keys_received(),
            backups_generated: self.backups_to_share.len() + 1 == self.ceremony_details.number_of_guardians,
            backups_received: self.all_election_partial_key_backups_received(),
            backups_verified: self.all_election_partial_key_backups_verified(),
            joint_key_published: self.joint_key.is_some(),
        }
    }

    fn refresh_state(&mut self) {
        let next = self.state.advance(&self.progress());
        if next != self.state {
            info!("guardian {}: {:?} -> {:?}", self.id, self.state, next);
            self.state = next;
        }
    }
}
