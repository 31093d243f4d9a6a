use crate::ballot::CiphertextBallot;
use crate::constants::group;
use crate::decryption_share::{CiphertextDecryptionSelection, DecryptionShare, DecryptionTarget, TargetSelection};
use crate::election::CiphertextElectionContext;
use crate::encryption::ElGamal;
use crate::group::{ElementModP, ElementModQ};
use crate::tally::{CiphertextTally, PlaintextTally, PlaintextTallyContest, PlaintextTallySelection};
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Decrypts one selection from the shares of every guardian.
///
/// Each share is checked against its guardian's public key first. Returns
/// `None` if a share is invalid or the count is beyond the discrete log
/// bound.
pub fn decrypt_selection_with_decryption_shares(
    selection: &TargetSelection<'_>,
    shares: &[(&ElementModP, &CiphertextDecryptionSelection)],
    extended_base_hash: &ElementModQ,
) -> Option<PlaintextTallySelection> {
    for (public_key, share) in shares {
        if !share.is_valid(selection.ciphertext, public_key, extended_base_hash) {
            warn!(
                "share of {} for selection {} is invalid",
                share.guardian_id, selection.object_id
            );
            return None;
        }
    }

    let value = match ElGamal::combine_partial_decryptions(selection.ciphertext, shares.iter().map(|(_, s)| &s.share)) {
        Ok(value) => value,
        Err(err) => {
            warn!("selection {}: {}", selection.object_id, err);
            return None;
        }
    };
    let tally = match group().discrete_log().discrete_log(&value) {
        Ok(tally) => tally,
        Err(err) => {
            warn!("selection {}: {}", selection.object_id, err);
            return None;
        }
    };
    debug!("selection {} decrypted to {}", selection.object_id, tally);

    Some(PlaintextTallySelection {
        object_id: selection.object_id.to_string(),
        tally,
        value,
        message: selection.ciphertext.clone(),
        shares: shares.iter().map(|(_, share)| (*share).clone()).collect(),
    })
}

/// Decrypts `target` from one share per guardian, direct or reconstructed.
///
/// Each share is checked against the key it declares. Use
/// [`decrypt_target_with_keys`] when the guardians' registered keys are known.
pub fn decrypt_target(
    target: &DecryptionTarget<'_>,
    shares: &BTreeMap<String, DecryptionShare>,
    context: &CiphertextElectionContext,
) -> Option<PlaintextTally> {
    let declared: BTreeMap<String, ElementModP> = shares
        .iter()
        .map(|(guardian_id, share)| (guardian_id.clone(), share.public_key.clone()))
        .collect();
    decrypt_target_with_keys(target, shares, &declared, context)
}

/// Decrypts `target`, checking the share of each guardian against `public_keys[guardian_id]`.
///
/// Returns `None` unless there is a share for every guardian of the
/// election and a key for every share. Selections that cannot be decrypted
/// are left out of the result.
pub fn decrypt_target_with_keys(
    target: &DecryptionTarget<'_>,
    shares: &BTreeMap<String, DecryptionShare>,
    public_keys: &BTreeMap<String, ElementModP>,
    context: &CiphertextElectionContext,
) -> Option<PlaintextTally> {
    if shares.len() != context.number_of_guardians {
        debug!(
            "{}: {} of {} shares available",
            target.object_id,
            shares.len(),
            context.number_of_guardians
        );
        return None;
    }
    let mut keyed = Vec::with_capacity(shares.len());
    for (guardian_id, share) in shares {
        match public_keys.get(guardian_id) {
            Some(key) => keyed.push((key, share)),
            None => {
                warn!("{}: no registered key for {}", target.object_id, guardian_id);
                return None;
            }
        }
    }

    let contests = target
        .contests
        .iter()
        .map(|contest| {
            let selections = contest
                .selections
                .par_iter()
                .filter_map(|selection| {
                    let selection_shares = keyed
                        .iter()
                        .map(|(key, share)| {
                            share
                                .selection(contest.object_id, selection.object_id)
                                .map(|s| (*key, s))
                        })
                        .collect::<Option<Vec<_>>>();
                    let selection_shares = match selection_shares {
                        Some(selection_shares) => selection_shares,
                        None => {
                            warn!("selection {} is missing shares", selection.object_id);
                            return None;
                        }
                    };
                    decrypt_selection_with_decryption_shares(
                        selection,
                        &selection_shares,
                        &context.crypto_extended_base_hash,
                    )
                    .map(|plaintext| (selection.object_id.to_string(), plaintext))
                })
                .collect::<BTreeMap<_, _>>();
            let plaintext = PlaintextTallyContest {
                object_id: contest.object_id.to_string(),
                selections,
            };
            (contest.object_id.to_string(), plaintext)
        })
        .collect();

    Some(PlaintextTally {
        object_id: target.object_id.to_string(),
        contests,
    })
}

pub fn decrypt_tally(
    tally: &CiphertextTally,
    shares: &BTreeMap<String, DecryptionShare>,
    context: &CiphertextElectionContext,
) -> Option<PlaintextTally> {
    decrypt_target(&DecryptionTarget::from(tally), shares, context)
}

pub fn decrypt_ballot(
    ballot: &CiphertextBallot,
    shares: &BTreeMap<String, DecryptionShare>,
    context: &CiphertextElectionContext,
) -> Option<PlaintextTally> {
    decrypt_target(&DecryptionTarget::from(ballot), shares, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decryption::compute_decryption_share;
    use crate::election::ElectionBuilder;
    use crate::group::rand_q_no_zero;
    use crate::guardian::Guardian;
    use crate::helper::Helper;
    use crate::key_ceremony::CeremonyDetails;
    use crate::key_ceremony_mediator::{orchestrate_key_ceremony, KeyCeremonyMediator};

    fn setup(n: usize) -> (Vec<Guardian>, CiphertextElectionContext, CiphertextTally) {
        let details = CeremonyDetails::new(n, n).unwrap();
        let mut guardians: Vec<Guardian> = (1..=n)
            .map(|i| Guardian::new(&format!("guardian-{}", i), i as u64, details).unwrap())
            .collect();
        let joint_key =
            orchestrate_key_ceremony(&mut guardians, &mut KeyCeremonyMediator::new("mediator", details)).unwrap();
        let context = ElectionBuilder::new(n, n, Helper::fake_manifest())
            .set_joint_key(&joint_key)
            .build()
            .unwrap();

        let mut tally = CiphertextTally::new("tally", &Helper::fake_manifest());
        for (selection, votes) in [("council-carol", 3u64), ("council-erin", 5)] {
            if let Some(s) = tally.contests.get_mut("council").and_then(|c| c.selections.get_mut(selection)) {
                s.ciphertext = ElGamal::encrypt(votes, &rand_q_no_zero(), &context.elgamal_public_key).unwrap();
            }
        }
        (guardians, context, tally)
    }

    #[test]
    fn it_should_decrypt_with_every_share() {
        Helper::setup_test_group();
        let (guardians, context, tally) = setup(2);
        let shares: BTreeMap<String, DecryptionShare> = guardians
            .iter()
            .map(|g| (g.id.clone(), compute_decryption_share(g, &tally, &context, None)))
            .collect();

        let plaintext = decrypt_tally(&tally, &shares, &context).unwrap();
        assert_eq!(plaintext.count("council", "council-carol"), Some(3));
        assert_eq!(plaintext.count("council", "council-erin"), Some(5));
        assert_eq!(plaintext.count("council", "council-dave"), Some(0));
        assert_eq!(plaintext.count("mayor", "mayor-alice"), Some(0));
        assert_eq!(plaintext.contests["council"].selections["council-carol"].shares.len(), 2);
    }

    #[test]
    fn it_should_need_a_share_per_guardian() {
        Helper::setup_test_group();
        let (guardians, context, tally) = setup(2);
        let mut shares = BTreeMap::new();
        shares.insert(
            guardians[0].id.clone(),
            compute_decryption_share(&guardians[0], &tally, &context, None),
        );
        assert!(decrypt_tally(&tally, &shares, &context).is_none());
    }

    #[test]
    fn it_should_check_shares_against_registered_keys() {
        Helper::setup_test_group();
        let (guardians, context, tally) = setup(2);
        let registered: BTreeMap<String, ElementModP> = guardians
            .iter()
            .map(|g| (g.id.clone(), g.share_election_public_key().key))
            .collect();

        // a well formed share under a key outside the ceremony
        let impostor = Guardian::new("guardian-2", 2, CeremonyDetails::new(2, 2).unwrap()).unwrap();
        let mut shares = BTreeMap::new();
        shares.insert(
            guardians[0].id.clone(),
            compute_decryption_share(&guardians[0], &tally, &context, None),
        );
        shares.insert(
            impostor.id.clone(),
            compute_decryption_share(&impostor, &tally, &context, None),
        );

        let target = DecryptionTarget::from(&tally);
        let plaintext = decrypt_target_with_keys(&target, &shares, &registered, &context).unwrap();
        assert!(plaintext.contests.values().all(|contest| contest.selections.is_empty()));

        let mut unknown = registered.clone();
        unknown.remove("guardian-2");
        assert!(decrypt_target_with_keys(&target, &shares, &unknown, &context).is_none());

        let honest: BTreeMap<String, DecryptionShare> = guardians
            .iter()
            .map(|g| (g.id.clone(), compute_decryption_share(g, &tally, &context, None)))
            .collect();
        let plaintext = decrypt_target_with_keys(&target, &honest, &registered, &context).unwrap();
        assert_eq!(plaintext.count("council", "council-erin"), Some(5));
    }

    #[test]
    fn it_should_isolate_an_invalid_share() {
        Helper::setup_test_group();
        let (guardians, context, tally) = setup(2);
        let mut shares: BTreeMap<String, DecryptionShare> = guardians
            .iter()
            .map(|g| (g.id.clone(), compute_decryption_share(g, &tally, &context, None)))
            .collect();
        if let Some(selection) = shares
            .get_mut("guardian-2")
            .and_then(|s| s.contests.get_mut("council"))
            .and_then(|c| c.selections.get_mut("council-erin"))
        {
            selection.share = ElementModP::one();
        }

        let plaintext = decrypt_tally(&tally, &shares, &context).unwrap();
        assert_eq!(plaintext.count("council", "council-erin"), None);
        assert_eq!(plaintext.count("council", "council-carol"), Some(3));
    }
}
