//! Local decryption of a ballot by the device that encrypted it, or by a
//! holder of the full election secret.

use crate::ballot::{
    CiphertextBallot, CiphertextBallotContest, CiphertextBallotSelection, PlaintextBallot, PlaintextBallotContest,
    PlaintextBallotSelection,
};
use crate::election::CiphertextElectionContext;
use crate::encrypt::{ballot_nonce_seed, contest_nonce, selection_nonce};
use crate::error::BallotError;
use crate::group::ElementModQ;
use crate::manifest::{ContestDescription, Manifest, SelectionDescription};

fn decrypt_contest<F>(
    contest: &CiphertextBallotContest,
    description: &ContestDescription,
    mut decrypt: F,
) -> Result<PlaintextBallotContest, BallotError>
where
    F: FnMut(&CiphertextBallotSelection, &SelectionDescription) -> Result<u64, BallotError>,
{
    let selections = contest
        .ballot_selections
        .iter()
        .map(|selection| {
            let selection_description = description.selection(&selection.object_id).ok_or_else(|| {
                BallotError::UnknownSelection {
                    contest: contest.object_id.clone(),
                    selection: selection.object_id.clone(),
                }
            })?;
            let vote = decrypt(selection, selection_description)?;
            Ok(PlaintextBallotSelection::new(&selection.object_id, vote))
        })
        .collect::<Result<Vec<_>, BallotError>>()?;
    Ok(PlaintextBallotContest::new(&contest.object_id, selections))
}

fn descriptions<'a>(
    ballot: &'a CiphertextBallot,
    manifest: &'a Manifest,
) -> Result<Vec<(&'a CiphertextBallotContest, &'a ContestDescription)>, BallotError> {
    if !ballot.matches_manifest(manifest) {
        return Err(BallotError::StyleMismatch {
            ballot: ballot.object_id.clone(),
        });
    }
    ballot
        .contests
        .iter()
        .map(|contest| {
            manifest
                .contest(&contest.object_id)
                .map(|description| (contest, description))
                .ok_or_else(|| BallotError::UnknownContest(contest.object_id.clone()))
        })
        .collect()
}

/// Recomputes every selection nonce from the master nonce and decrypts with it.
///
/// `nonce` overrides the nonce carried by the ballot.
pub fn decrypt_ballot_with_nonce(
    ballot: &CiphertextBallot,
    manifest: &Manifest,
    context: &CiphertextElectionContext,
    nonce: Option<&ElementModQ>,
) -> Result<PlaintextBallot, BallotError> {
    let master_nonce = nonce
        .or(ballot.nonce.as_ref())
        .ok_or_else(|| BallotError::MissingNonce(ballot.object_id.clone()))?;
    let seed = ballot_nonce_seed(&context.manifest_hash, &ballot.object_id, master_nonce);

    let contests = descriptions(ballot, manifest)?
        .into_iter()
        .map(|(contest, description)| {
            let contest_nonce = contest_nonce(description, &seed);
            decrypt_contest(contest, description, |selection, selection_description| {
                let nonce = selection_nonce(selection_description, &contest_nonce);
                selection
                    .ciphertext
                    .decrypt_known_nonce(&context.elgamal_public_key, &nonce)
                    .map_err(BallotError::from)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PlaintextBallot::new(&ballot.object_id, contests))
}

/// Decrypts with the election secret key. Only meaningful for a single key holder.
pub fn decrypt_ballot_with_secret(
    ballot: &CiphertextBallot,
    manifest: &Manifest,
    secret_key: &ElementModQ,
) -> Result<PlaintextBallot, BallotError> {
    let contests = descriptions(ballot, manifest)?
        .into_iter()
        .map(|(contest, description)| {
            decrypt_contest(contest, description, |selection, _| {
                selection.ciphertext.decrypt(secret_key).map_err(BallotError::from)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PlaintextBallot::new(&ballot.object_id, contests))
}
