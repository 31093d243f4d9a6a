//! Computing and reconstructing decryption shares.
//!
//! A missing guardian j is stood in for by the available guardians i, each
//! computing A^P_j(i) from its backup. Weighted with the Lagrange
//! coefficients of the available set these parts combine to A^s_j without
//! s_j ever being reconstructed.

use crate::ballot::CiphertextBallot;
use crate::decryption_share::{
    CiphertextCompensatedDecryptionContest, CiphertextCompensatedDecryptionSelection,
    CiphertextDecryptionContest, CiphertextDecryptionSelection, CompensatedDecryptionShare,
    DecryptionShare, DecryptionTarget, ProofOrRecovery, TargetSelection,
};
use crate::election::CiphertextElectionContext;
use crate::error::PolynomialError;
use crate::group::{mult_p, pow_p, ElementModP, ElementModQ};
use crate::guardian::Guardian;
use crate::key_ceremony::ElectionPublicKey;
use crate::polynomial::{commitment_product, compute_lagrange_coefficient};
use crate::tally::CiphertextTally;
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// A distinct proof seed per selection, so no commitment nonce is used twice.
fn selection_seed(
    seed: Option<&ElementModQ>,
    guardian_id: &str,
    contest_id: &str,
    selection: &TargetSelection<'_>,
) -> Option<ElementModQ> {
    seed.map(|seed| hash_elems!(seed, guardian_id, contest_id, selection.object_id))
}

/// Computes `guardian`'s share of every selection of `target`.
pub fn compute_decryption_share_for_target(
    guardian: &Guardian,
    target: &DecryptionTarget<'_>,
    context: &CiphertextElectionContext,
    seed: Option<&ElementModQ>,
) -> DecryptionShare {
    let contests = target
        .contests
        .par_iter()
        .map(|contest| {
            let selections = contest
                .selections
                .par_iter()
                .map(|selection| {
                    let seed = selection_seed(seed, &guardian.id, contest.object_id, selection);
                    let (share, proof) = guardian.partially_decrypt(
                        selection.ciphertext,
                        &context.crypto_extended_base_hash,
                        seed.as_ref(),
                    );
                    let decryption = CiphertextDecryptionSelection {
                        object_id: selection.object_id.to_string(),
                        guardian_id: guardian.id.clone(),
                        share,
                        proof_or_recovery: ProofOrRecovery::Proof(proof),
                    };
                    (selection.object_id.to_string(), decryption)
                })
                .collect::<BTreeMap<_, _>>();
            let decryption = CiphertextDecryptionContest {
                object_id: contest.object_id.to_string(),
                guardian_id: guardian.id.clone(),
                description_hash: contest.description_hash.clone(),
                selections,
            };
            (contest.object_id.to_string(), decryption)
        })
        .collect();

    debug!("guardian {} decrypted {}", guardian.id, target.object_id);
    DecryptionShare {
        object_id: target.object_id.to_string(),
        guardian_id: guardian.id.clone(),
        public_key: guardian.share_election_public_key().key,
        contests,
    }
}

pub fn compute_decryption_share(
    guardian: &Guardian,
    tally: &CiphertextTally,
    context: &CiphertextElectionContext,
    seed: Option<&ElementModQ>,
) -> DecryptionShare {
    compute_decryption_share_for_target(guardian, &DecryptionTarget::from(tally), context, seed)
}

pub fn compute_decryption_share_for_ballot(
    guardian: &Guardian,
    ballot: &CiphertextBallot,
    context: &CiphertextElectionContext,
    seed: Option<&ElementModQ>,
) -> DecryptionShare {
    compute_decryption_share_for_target(guardian, &DecryptionTarget::from(ballot), context, seed)
}

/// Computes `guardian`'s parts of the missing guardian's share.
///
/// Returns `None` if the guardian holds no backup of the missing guardian.
pub fn compute_compensated_decryption_share_for_target(
    guardian: &Guardian,
    missing_guardian_id: &str,
    lagrange_coefficient: &ElementModQ,
    target: &DecryptionTarget<'_>,
    context: &CiphertextElectionContext,
    seed: Option<&ElementModQ>,
) -> Option<CompensatedDecryptionShare> {
    let recovery_key = match guardian.recovery_public_key_for(missing_guardian_id) {
        Some(key) => key,
        None => {
            warn!(
                "guardian {} holds no backup of {}",
                guardian.id, missing_guardian_id
            );
            return None;
        }
    };

    let contests = target
        .contests
        .par_iter()
        .map(|contest| {
            let selections = contest
                .selections
                .par_iter()
                .map(|selection| {
                    let seed = selection_seed(seed, &guardian.id, contest.object_id, selection)
                        .map(|seed| hash_elems!(&seed, missing_guardian_id));
                    let (share, proof) = guardian.compensated_decrypt(
                        missing_guardian_id,
                        selection.ciphertext,
                        &context.crypto_extended_base_hash,
                        seed.as_ref(),
                    )?;
                    let part = CiphertextCompensatedDecryptionSelection {
                        object_id: selection.object_id.to_string(),
                        guardian_id: guardian.id.clone(),
                        missing_guardian_id: missing_guardian_id.to_string(),
                        share,
                        recovery_key: recovery_key.clone(),
                        proof,
                    };
                    Some((selection.object_id.to_string(), part))
                })
                .collect::<Option<BTreeMap<_, _>>>()?;
            let part = CiphertextCompensatedDecryptionContest {
                object_id: contest.object_id.to_string(),
                guardian_id: guardian.id.clone(),
                missing_guardian_id: missing_guardian_id.to_string(),
                description_hash: contest.description_hash.clone(),
                selections,
            };
            Some((contest.object_id.to_string(), part))
        })
        .collect::<Option<BTreeMap<_, _>>>()?;

    debug!(
        "guardian {} compensated for {} on {}",
        guardian.id, missing_guardian_id, target.object_id
    );
    Some(CompensatedDecryptionShare {
        object_id: target.object_id.to_string(),
        guardian_id: guardian.id.clone(),
        sequence_order: guardian.sequence_order,
        missing_guardian_id: missing_guardian_id.to_string(),
        lagrange_coefficient: lagrange_coefficient.clone(),
        contests,
    })
}

pub fn compute_compensated_decryption_share(
    guardian: &Guardian,
    missing_guardian_id: &str,
    lagrange_coefficient: &ElementModQ,
    tally: &CiphertextTally,
    context: &CiphertextElectionContext,
    seed: Option<&ElementModQ>,
) -> Option<CompensatedDecryptionShare> {
    compute_compensated_decryption_share_for_target(
        guardian,
        missing_guardian_id,
        lagrange_coefficient,
        &DecryptionTarget::from(tally),
        context,
        seed,
    )
}

pub fn compute_compensated_decryption_share_for_ballot(
    guardian: &Guardian,
    missing_guardian_id: &str,
    lagrange_coefficient: &ElementModQ,
    ballot: &CiphertextBallot,
    context: &CiphertextElectionContext,
    seed: Option<&ElementModQ>,
) -> Option<CompensatedDecryptionShare> {
    compute_compensated_decryption_share_for_target(
        guardian,
        missing_guardian_id,
        lagrange_coefficient,
        &DecryptionTarget::from(ballot),
        context,
        seed,
    )
}

/// λ_i for every available guardian, keyed by guardian id.
pub fn compute_lagrange_coefficients_for_guardians(
    available_guardians: &[&ElectionPublicKey],
) -> Result<BTreeMap<String, ElementModQ>, PolynomialError> {
    let degrees: Vec<u64> = available_guardians.iter().map(|key| key.sequence_order).collect();
    available_guardians
        .iter()
        .map(|key| {
            compute_lagrange_coefficient(key.sequence_order, &degrees)
                .map(|coefficient| (key.owner_id.clone(), coefficient))
        })
        .collect()
}

/// g^P_missing(sequence_order): the key a compensated part made at `sequence_order` verifies against.
pub fn compute_recovery_public_key(missing_guardian_key: &ElectionPublicKey, sequence_order: u64) -> ElementModP {
    commitment_product(sequence_order, &missing_guardian_key.coefficient_commitments)
}

/// Combines compensated shares into the missing guardian's share: M_j = prod M_ij^λ_i.
///
/// Parts whose proof or recovery key does not check out are dropped along
/// with their selection, so the result may contain fewer selections than
/// `target`.
pub fn reconstruct_decryption_share_for_target(
    missing_guardian_key: &ElectionPublicKey,
    target: &DecryptionTarget<'_>,
    shares: &BTreeMap<String, CompensatedDecryptionShare>,
    context: &CiphertextElectionContext,
) -> DecryptionShare {
    let missing_id = &missing_guardian_key.owner_id;
    let relevant: Vec<&CompensatedDecryptionShare> = shares
        .values()
        .filter(|share| &share.missing_guardian_id == missing_id && share.object_id == target.object_id)
        .collect();
    let recovery_keys: BTreeMap<&str, ElementModP> = relevant
        .iter()
        .map(|share| {
            (
                share.guardian_id.as_str(),
                compute_recovery_public_key(missing_guardian_key, share.sequence_order),
            )
        })
        .collect();

    let contests = target
        .contests
        .iter()
        .map(|contest| {
            let selections = contest
                .selections
                .par_iter()
                .filter_map(|selection| {
                    let mut parts = BTreeMap::new();
                    let mut weighted = Vec::with_capacity(relevant.len());
                    for share in &relevant {
                        let part = share
                            .contests
                            .get(contest.object_id)
                            .and_then(|c| c.selections.get(selection.object_id));
                        let part = match part {
                            Some(part) => part,
                            None => {
                                warn!(
                                    "{} sent no part for {} of {}",
                                    share.guardian_id, selection.object_id, missing_id
                                );
                                return None;
                            }
                        };
                        let expected_key = recovery_keys.get(share.guardian_id.as_str());
                        if expected_key != Some(&part.recovery_key)
                            || !part.is_valid(selection.ciphertext, &context.crypto_extended_base_hash)
                        {
                            warn!(
                                "invalid compensated part from {} for {} of {}",
                                share.guardian_id, selection.object_id, missing_id
                            );
                            return None;
                        }
                        weighted.push(pow_p(&part.share, &share.lagrange_coefficient));
                        parts.insert(share.guardian_id.clone(), part.clone());
                    }
                    let refs: Vec<&ElementModP> = weighted.iter().collect();
                    let decryption = CiphertextDecryptionSelection {
                        object_id: selection.object_id.to_string(),
                        guardian_id: missing_id.clone(),
                        share: mult_p(&refs),
                        proof_or_recovery: ProofOrRecovery::Recovery(parts),
                    };
                    Some((selection.object_id.to_string(), decryption))
                })
                .collect::<BTreeMap<_, _>>();
            let decryption = CiphertextDecryptionContest {
                object_id: contest.object_id.to_string(),
                guardian_id: missing_id.clone(),
                description_hash: contest.description_hash.clone(),
                selections,
            };
            (contest.object_id.to_string(), decryption)
        })
        .collect();

    DecryptionShare {
        object_id: target.object_id.to_string(),
        guardian_id: missing_id.clone(),
        public_key: missing_guardian_key.key.clone(),
        contests,
    }
}

pub fn reconstruct_decryption_share(
    missing_guardian_key: &ElectionPublicKey,
    tally: &CiphertextTally,
    shares: &BTreeMap<String, CompensatedDecryptionShare>,
    context: &CiphertextElectionContext,
) -> DecryptionShare {
    reconstruct_decryption_share_for_target(missing_guardian_key, &DecryptionTarget::from(tally), shares, context)
}

pub fn reconstruct_decryption_share_for_ballot(
    missing_guardian_key: &ElectionPublicKey,
    ballot: &CiphertextBallot,
    shares: &BTreeMap<String, CompensatedDecryptionShare>,
    context: &CiphertextElectionContext,
) -> DecryptionShare {
    reconstruct_decryption_share_for_target(missing_guardian_key, &DecryptionTarget::from(ballot), shares, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::ElGamal;
    use crate::group::{rand_q_no_zero, ElementModQ};
    use crate::helper::Helper;
    use crate::key_ceremony::CeremonyDetails;
    use crate::key_ceremony_mediator::{orchestrate_key_ceremony, KeyCeremonyMediator};
    use crate::election::ElectionBuilder;
    use crate::tally::CiphertextTally;

    fn ceremony(n: usize, k: usize) -> (Vec<Guardian>, CiphertextElectionContext) {
        let details = CeremonyDetails::new(n, k).unwrap();
        let mut guardians: Vec<Guardian> = (1..=n)
            .map(|i| Guardian::new(&format!("guardian-{}", i), i as u64, details).unwrap())
            .collect();
        let mut mediator = KeyCeremonyMediator::new("mediator", details);
        let joint_key = orchestrate_key_ceremony(&mut guardians, &mut mediator).unwrap();
        let context = ElectionBuilder::new(n, k, Helper::fake_manifest())
            .set_joint_key(&joint_key)
            .build()
            .unwrap();
        (guardians, context)
    }

    fn tally_of(votes: u64, context: &CiphertextElectionContext) -> CiphertextTally {
        let mut tally = CiphertextTally::new("tally", &Helper::fake_manifest());
        let selection = tally
            .contests
            .get_mut("mayor")
            .and_then(|c| c.selections.get_mut("mayor-alice"))
            .unwrap();
        selection.ciphertext = ElGamal::encrypt(votes, &rand_q_no_zero(), &context.elgamal_public_key).unwrap();
        tally
    }

    #[test]
    fn it_should_compute_lagrange_coefficients_for_guardians() {
        Helper::setup_test_group();
        let (guardians, _) = ceremony(3, 2);
        let keys: Vec<ElectionPublicKey> = guardians.iter().map(Guardian::share_election_public_key).collect();
        let available = [&keys[0], &keys[2]];

        let coefficients = compute_lagrange_coefficients_for_guardians(&available).unwrap();
        assert_eq!(coefficients.len(), 2);
        // λ_1 over {1, 3} = 3 / (3 - 1), λ_1 * 2 = 3
        let doubled = crate::group::mult_q(&[&coefficients["guardian-1"], &ElementModQ::two()]);
        assert_eq!(doubled, ElementModQ::from_u64(3).unwrap());
    }

    #[test]
    fn it_should_reconstruct_a_missing_share() {
        Helper::setup_test_group();
        let (guardians, context) = ceremony(3, 2);
        let tally = tally_of(4, &context);
        let missing = &guardians[1];
        let missing_key = missing.share_election_public_key();
        let available_keys = [
            guardians[0].share_election_public_key(),
            guardians[2].share_election_public_key(),
        ];
        let lagrange =
            compute_lagrange_coefficients_for_guardians(&available_keys.iter().collect::<Vec<_>>()).unwrap();

        let shares: BTreeMap<String, CompensatedDecryptionShare> = [&guardians[0], &guardians[2]]
            .iter()
            .map(|guardian| {
                let share = compute_compensated_decryption_share(
                    guardian,
                    &missing.id,
                    &lagrange[&guardian.id],
                    &tally,
                    &context,
                    None,
                )
                .unwrap();
                (guardian.id.clone(), share)
            })
            .collect();

        let reconstructed = reconstruct_decryption_share(&missing_key, &tally, &shares, &context);
        let direct = compute_decryption_share(missing, &tally, &context, None);
        for (contest_id, contest) in &direct.contests {
            for (selection_id, selection) in &contest.selections {
                let recovered = reconstructed.selection(contest_id, selection_id).unwrap();
                assert_eq!(recovered.share, selection.share);
                let ciphertext = &tally.contests[contest_id].selections[selection_id].ciphertext;
                assert!(recovered.is_valid(ciphertext, &missing_key.key, &context.crypto_extended_base_hash));
            }
        }
    }

    #[test]
    fn it_should_drop_selections_with_forged_parts() {
        Helper::setup_test_group();
        let (guardians, context) = ceremony(3, 2);
        let tally = tally_of(1, &context);
        let missing = &guardians[2];
        let keys = [guardians[0].share_election_public_key(), guardians[1].share_election_public_key()];
        let lagrange = compute_lagrange_coefficients_for_guardians(&keys.iter().collect::<Vec<_>>()).unwrap();

        let mut shares = BTreeMap::new();
        for guardian in &guardians[..2] {
            let share = compute_compensated_decryption_share(
                guardian,
                &missing.id,
                &lagrange[&guardian.id],
                &tally,
                &context,
                None,
            )
            .unwrap();
            shares.insert(guardian.id.clone(), share);
        }
        if let Some(part) = shares
            .get_mut("guardian-1")
            .and_then(|s| s.contests.get_mut("mayor"))
            .and_then(|c| c.selections.get_mut("mayor-alice"))
        {
            part.share = ElementModP::one();
        }

        let reconstructed = reconstruct_decryption_share(&missing.share_election_public_key(), &tally, &shares, &context);
        assert!(reconstructed.selection("mayor", "mayor-alice").is_none());
        assert!(reconstructed.selection("mayor", "mayor-bob").is_some());
    }

    #[test]
    fn it_should_use_distinct_nonces_for_seeded_shares() {
        Helper::setup_test_group();
        let (guardians, context) = ceremony(1, 1);
        let tally = tally_of(2, &context);
        let seed = ElementModQ::from_u64(5).unwrap();

        let share = compute_decryption_share(&guardians[0], &tally, &context, Some(&seed));
        assert_eq!(share, compute_decryption_share(&guardians[0], &tally, &context, Some(&seed)));

        let commitments: Vec<ElementModP> = share
            .contests
            .values()
            .flat_map(|c| c.selections.values())
            .filter_map(|s| match &s.proof_or_recovery {
                ProofOrRecovery::Proof(proof) => Some(proof.pad.clone()),
                ProofOrRecovery::Recovery(_) => None,
            })
            .collect();
        let unique: std::collections::BTreeSet<&ElementModP> = commitments.iter().collect();
        assert_eq!(unique.len(), commitments.len());
    }
}
