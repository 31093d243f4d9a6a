use crate::ballot::{BallotBoxState, CiphertextBallot, SubmittedBallot};
use crate::decrypt_with_shares::decrypt_target_with_keys;
use crate::decryption::{
    compute_compensated_decryption_share_for_target, compute_decryption_share_for_target,
    compute_lagrange_coefficients_for_guardians, reconstruct_decryption_share_for_target,
};
use crate::decryption_share::{CompensatedDecryptionShare, DecryptionShare, DecryptionTarget};
use crate::election::CiphertextElectionContext;
use crate::group::ElementModP;
use crate::guardian::Guardian;
use crate::key_ceremony::ElectionPublicKey;
use crate::tally::{CiphertextTally, PlaintextTally};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecryptionState {
    AwaitingQuorum,
    Ready,
    Decrypted,
}

/// Collects guardian shares for one tally and its spoiled ballots.
///
/// Announced guardians are borrowed for the whole session. Guardians whose
/// keys the announced guardians hold, but who never announce, are
/// compensated for once the quorum is reached.
#[derive(Debug)]
pub struct DecryptionMediator<'a> {
    pub id: String,
    context: &'a CiphertextElectionContext,
    tally: &'a CiphertextTally,
    spoiled_ballots: Vec<&'a CiphertextBallot>,
    available_guardians: BTreeMap<String, &'a Guardian>,
    tally_shares: BTreeMap<String, DecryptionShare>,
    ballot_shares: BTreeMap<String, BTreeMap<String, DecryptionShare>>,
    plaintext_tally: Option<PlaintextTally>,
    plaintext_ballots: Option<BTreeMap<String, PlaintextTally>>,
}

impl<'a> DecryptionMediator<'a> {
    /// Only ballots in the spoiled state are decrypted individually.
    pub fn new(
        id: &str,
        context: &'a CiphertextElectionContext,
        tally: &'a CiphertextTally,
        submitted_ballots: &'a [SubmittedBallot],
    ) -> Self {
        let spoiled_ballots = submitted_ballots
            .iter()
            .filter(|submitted| submitted.state == BallotBoxState::Spoiled)
            .map(|submitted| &submitted.ballot)
            .collect();
        DecryptionMediator {
            id: id.to_string(),
            context,
            tally,
            spoiled_ballots,
            available_guardians: BTreeMap::new(),
            tally_shares: BTreeMap::new(),
            ballot_shares: BTreeMap::new(),
            plaintext_tally: None,
            plaintext_ballots: None,
        }
    }

    pub fn state(&self) -> DecryptionState {
        if self.plaintext_tally.is_some() {
            DecryptionState::Decrypted
        } else if self.available_guardians.len() >= self.context.quorum {
            DecryptionState::Ready
        } else {
            DecryptionState::AwaitingQuorum
        }
    }

    /// Marks the guardian available and computes its shares of the tally and the spoiled ballots.
    ///
    /// Announcing the same guardian again returns the stored share.
    pub fn announce(&mut self, guardian: &'a Guardian) -> Option<DecryptionShare> {
        if let Some(share) = self.tally_shares.get(&guardian.id) {
            debug!("mediator {}: {} announced again", self.id, guardian.id);
            return Some(share.clone());
        }
        if self.state() == DecryptionState::Decrypted {
            warn!("mediator {}: {} announced after decryption", self.id, guardian.id);
            return None;
        }
        if guardian.ceremony_details().number_of_guardians != self.context.number_of_guardians {
            warn!("mediator {}: {} belongs to another ceremony", self.id, guardian.id);
            return None;
        }

        let tally_share =
            compute_decryption_share_for_target(guardian, &DecryptionTarget::from(self.tally), self.context, None);
        let context = self.context;
        let ballot_shares: Vec<(String, DecryptionShare)> = self
            .spoiled_ballots
            .par_iter()
            .map(|ballot| {
                let share = compute_decryption_share_for_target(guardian, &DecryptionTarget::from(*ballot), context, None);
                (ballot.object_id.clone(), share)
            })
            .collect();
        for (ballot_id, share) in ballot_shares {
            self.ballot_shares
                .entry(ballot_id)
                .or_default()
                .insert(guardian.id.clone(), share);
        }

        info!("mediator {}: guardian {} announced", self.id, guardian.id);
        self.tally_shares.insert(guardian.id.clone(), tally_share.clone());
        self.available_guardians.insert(guardian.id.clone(), guardian);
        Some(tally_share)
    }

    pub fn announced_guardians(&self) -> Vec<&str> {
        self.available_guardians.keys().map(String::as_str).collect()
    }

    /// Election public keys of the guardians known to the announced ones but not announced themselves.
    pub fn missing_guardians(&self) -> BTreeMap<String, ElectionPublicKey> {
        let mut missing = BTreeMap::new();
        for guardian in self.available_guardians.values() {
            for (id, key) in guardian.guardian_election_public_keys() {
                if !self.available_guardians.contains_key(id) {
                    missing.entry(id.clone()).or_insert_with(|| key.clone());
                }
            }
        }
        missing
    }

    /// Election public keys of every guardian as recorded during the ceremony.
    ///
    /// A guardian's key comes from its peers' records when they hold one and
    /// from the guardian itself otherwise.
    pub fn registered_keys(&self) -> BTreeMap<String, ElementModP> {
        let mut keys = BTreeMap::new();
        for (holder_id, guardian) in &self.available_guardians {
            for (id, key) in guardian.guardian_election_public_keys() {
                if id != holder_id {
                    keys.entry(id.clone()).or_insert_with(|| key.key.clone());
                }
            }
        }
        for (id, guardian) in &self.available_guardians {
            keys.entry(id.clone())
                .or_insert_with(|| guardian.share_election_public_key().key);
        }
        keys
    }

    /// The decrypted tally, once a quorum announced. Computed once.
    pub fn get_plaintext_tally(&mut self) -> Option<PlaintextTally> {
        if let Some(plaintext) = &self.plaintext_tally {
            return Some(plaintext.clone());
        }
        if self.state() == DecryptionState::AwaitingQuorum {
            debug!(
                "mediator {}: {} of {} guardians announced",
                self.id,
                self.available_guardians.len(),
                self.context.quorum
            );
            return None;
        }

        let target = DecryptionTarget::from(self.tally);
        let plaintext = self.decrypt(&target, &self.tally_shares)?;
        self.plaintext_tally = Some(plaintext.clone());
        info!("mediator {}: tally {} decrypted", self.id, self.tally.object_id);
        Some(plaintext)
    }

    /// The decrypted spoiled ballots by ballot id, once a quorum announced. Computed once.
    pub fn get_plaintext_ballots(&mut self) -> Option<BTreeMap<String, PlaintextTally>> {
        if let Some(plaintexts) = &self.plaintext_ballots {
            return Some(plaintexts.clone());
        }
        if self.state() == DecryptionState::AwaitingQuorum {
            return None;
        }

        let empty = BTreeMap::new();
        let mut plaintexts = BTreeMap::new();
        for ballot in &self.spoiled_ballots {
            let shares = self.ballot_shares.get(&ballot.object_id).unwrap_or(&empty);
            match self.decrypt(&DecryptionTarget::from(*ballot), shares) {
                Some(plaintext) => {
                    plaintexts.insert(ballot.object_id.clone(), plaintext);
                }
                None => warn!("mediator {}: ballot {} could not be decrypted", self.id, ballot.object_id),
            }
        }
        self.plaintext_ballots = Some(plaintexts.clone());
        Some(plaintexts)
    }

    /// Completes the direct shares with reconstructed shares of the missing guardians and decrypts.
    fn decrypt(
        &self,
        target: &DecryptionTarget<'_>,
        direct_shares: &BTreeMap<String, DecryptionShare>,
    ) -> Option<PlaintextTally> {
        let missing = self.missing_guardians();
        if self.available_guardians.len() + missing.len() != self.context.number_of_guardians {
            warn!(
                "mediator {}: {} announced and {} missing of {} guardians",
                self.id,
                self.available_guardians.len(),
                missing.len(),
                self.context.number_of_guardians
            );
            return None;
        }

        let mut shares = direct_shares.clone();
        if !missing.is_empty() {
            let available_keys: Vec<ElectionPublicKey> = self
                .available_guardians
                .values()
                .map(|guardian| guardian.share_election_public_key())
                .collect();
            let key_refs: Vec<&ElectionPublicKey> = available_keys.iter().collect();
            let lagrange = match compute_lagrange_coefficients_for_guardians(&key_refs) {
                Ok(lagrange) => lagrange,
                Err(err) => {
                    warn!("mediator {}: {}", self.id, err);
                    return None;
                }
            };

            for (missing_id, missing_key) in &missing {
                let compensated = self
                    .available_guardians
                    .values()
                    .collect::<Vec<_>>()
                    .par_iter()
                    .map(|guardian| {
                        let coefficient = lagrange.get(&guardian.id)?;
                        compute_compensated_decryption_share_for_target(
                            guardian,
                            missing_id,
                            coefficient,
                            target,
                            self.context,
                            None,
                        )
                        .map(|share| (guardian.id.clone(), share))
                    })
                    .collect::<Option<BTreeMap<String, CompensatedDecryptionShare>>>()?;

                let reconstructed =
                    reconstruct_decryption_share_for_target(missing_key, target, &compensated, self.context);
                shares.insert(missing_id.clone(), reconstructed);
            }
        }

        decrypt_target_with_keys(target, &shares, &self.registered_keys(), self.context)
    }
}
