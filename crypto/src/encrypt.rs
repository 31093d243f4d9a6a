//! Ballot encryption.
//!
//! All nonces of a ballot derive from one master nonce:
//!
//! - ballot seed    = H(manifest hash, ballot id, master nonce)
//! - contest nonce  = Nonces(contest hash, ballot seed)[contest sequence order]
//! - selection nonce = Nonces(selection hash, contest nonce)[selection sequence order]
//!
//! so the device can later recompute every nonce from the master nonce
//! alone.

use crate::ballot::{
    ballot_crypto_hash, contest_crypto_hash, selection_crypto_hash, CiphertextBallot,
    CiphertextBallotContest, CiphertextBallotSelection, PlaintextBallot, PlaintextBallotContest,
};
use crate::ballot_code::{get_ballot_code, get_hash_for_device};
use crate::election::CiphertextElectionContext;
use crate::encryption::ElGamal;
use crate::error::BallotError;
use crate::group::{add_q, rand_q, ElementModP, ElementModQ};
use crate::hash::HashItem;
use crate::manifest::{ContestDescription, Manifest, SelectionDescription};
use crate::nonces::Nonces;
use crate::proofs::{DisjunctiveChaumPedersenProof, RangeChaumPedersenProof};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// The device a ballot is encrypted on. Its hash starts the tracking code chain.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EncryptionDevice {
    pub device_id: u64,
    pub session_id: u64,
    pub launch_code: u64,
    pub location: String,
}

impl EncryptionDevice {
    pub fn new(device_id: u64, session_id: u64, launch_code: u64, location: &str) -> Self {
        EncryptionDevice {
            device_id,
            session_id,
            launch_code,
            location: location.to_string(),
        }
    }

    pub fn get_hash(&self) -> ElementModQ {
        get_hash_for_device(self.device_id, self.session_id, self.launch_code, &self.location)
    }
}

/// Encrypts ballot after ballot on one device, chaining their tracking codes.
#[derive(Debug)]
pub struct EncryptionMediator<'a> {
    manifest: &'a Manifest,
    context: &'a CiphertextElectionContext,
    encryption_seed: ElementModQ,
}

impl<'a> EncryptionMediator<'a> {
    pub fn new(manifest: &'a Manifest, context: &'a CiphertextElectionContext, device: &EncryptionDevice) -> Self {
        EncryptionMediator {
            manifest,
            context,
            encryption_seed: device.get_hash(),
        }
    }

    /// Encrypts the ballot and makes its code the seed of the next one.
    pub fn encrypt(&mut self, ballot: &PlaintextBallot) -> Result<CiphertextBallot, BallotError> {
        debug!("encrypting ballot {}", ballot.object_id);
        let encrypted = encrypt_ballot(ballot, self.manifest, self.context, &self.encryption_seed, None, None)?;
        self.encryption_seed = encrypted.code.clone();
        Ok(encrypted)
    }
}

pub(crate) fn ballot_nonce_seed(manifest_hash: &ElementModQ, ballot_id: &str, master_nonce: &ElementModQ) -> ElementModQ {
    hash_elems!(manifest_hash, ballot_id, master_nonce)
}

pub(crate) fn contest_nonce(description: &ContestDescription, ballot_nonce_seed: &ElementModQ) -> ElementModQ {
    Nonces::with_headers(&description.crypto_hash(), &[HashItem::Q(ballot_nonce_seed)]).get(description.sequence_order)
}

pub(crate) fn selection_nonce(description: &SelectionDescription, contest_nonce: &ElementModQ) -> ElementModQ {
    Nonces::with_headers(&description.crypto_hash(), &[HashItem::Q(contest_nonce)]).get(description.sequence_order)
}

/// Encrypts one vote (0 or 1) with its disjunctive proof.
pub fn encrypt_selection(
    description: &SelectionDescription,
    vote: u64,
    public_key: &ElementModP,
    extended_base_hash: &ElementModQ,
    contest_nonce: &ElementModQ,
) -> Result<CiphertextBallotSelection, BallotError> {
    let description_hash = description.crypto_hash();
    let nonce = selection_nonce(description, contest_nonce);
    let ciphertext = ElGamal::encrypt(vote, &nonce, public_key)?;

    let proof_seed = Nonces::with_headers(&nonce, &[HashItem::Str("disjunctive-proof")]).get(0);
    let proof = DisjunctiveChaumPedersenProof::generate(
        &ciphertext,
        &nonce,
        public_key,
        extended_base_hash,
        &proof_seed,
        vote,
    )
    .ok_or_else(|| BallotError::InvalidSelectionValue {
        selection: description.object_id.clone(),
        value: vote,
    })?;

    Ok(CiphertextBallotSelection {
        object_id: description.object_id.clone(),
        sequence_order: description.sequence_order,
        crypto_hash: selection_crypto_hash(&description.object_id, &description_hash, &ciphertext),
        description_hash,
        ciphertext,
        proof,
        nonce: Some(nonce),
    })
}

/// Encrypts every selection of the contest in manifest order, unmarked ones as 0.
///
/// Over votes and invalid values are rejected. Null and under votes are
/// encrypted as cast.
pub fn encrypt_contest(
    contest: &PlaintextBallotContest,
    description: &ContestDescription,
    public_key: &ElementModP,
    extended_base_hash: &ElementModQ,
    ballot_nonce_seed: &ElementModQ,
) -> Result<CiphertextBallotContest, BallotError> {
    match contest.validate(description) {
        Ok(()) => {}
        Err(err @ BallotError::NullVote { .. }) | Err(err @ BallotError::UnderVote { .. }) => {
            debug!("{}", err);
        }
        Err(err) => return Err(err),
    }

    let description_hash = description.crypto_hash();
    let nonce = contest_nonce(description, ballot_nonce_seed);

    let selections = description
        .selections
        .iter()
        .map(|selection| {
            encrypt_selection(
                selection,
                contest.vote_for(&selection.object_id),
                public_key,
                extended_base_hash,
                &nonce,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let accumulation = ElGamal::add(selections.iter().map(|s| &s.ciphertext));
    let selection_nonces: Vec<&ElementModQ> = selections.iter().filter_map(|s| s.nonce.as_ref()).collect();
    let aggregate_nonce = add_q(&selection_nonces);
    let votes: u64 = description
        .selections
        .iter()
        .map(|s| contest.vote_for(&s.object_id))
        .sum();

    let proof_seed = Nonces::with_headers(&nonce, &[HashItem::Str("range-proof")]).get(0);
    let proof = RangeChaumPedersenProof::generate(
        &accumulation,
        &aggregate_nonce,
        public_key,
        extended_base_hash,
        &proof_seed,
        votes,
        description.votes_allowed,
    )
    .ok_or_else(|| BallotError::OverVote {
        contest: description.object_id.clone(),
        votes,
        allowed: description.votes_allowed,
    })?;

    Ok(CiphertextBallotContest {
        object_id: description.object_id.clone(),
        sequence_order: description.sequence_order,
        crypto_hash: contest_crypto_hash(&description.object_id, &description_hash, &selections),
        description_hash,
        ballot_selections: selections,
        ciphertext_accumulation: accumulation,
        proof,
        votes_allowed: description.votes_allowed,
        nonce: Some(nonce),
    })
}

/// Encrypts a ballot against every contest of the manifest.
///
/// Contests missing from the ballot are encrypted as null votes. With a
/// `nonce` the encryption is deterministic; without one a fresh master
/// nonce is drawn. `timestamp` defaults to the current unix time.
pub fn encrypt_ballot(
    ballot: &PlaintextBallot,
    manifest: &Manifest,
    context: &CiphertextElectionContext,
    code_seed: &ElementModQ,
    nonce: Option<&ElementModQ>,
    timestamp: Option<u64>,
) -> Result<CiphertextBallot, BallotError> {
    if let Some(unknown) = ballot.contests.iter().find(|c| manifest.contest(&c.object_id).is_none()) {
        return Err(BallotError::UnknownContest(unknown.object_id.clone()));
    }

    let master_nonce = nonce.cloned().unwrap_or_else(rand_q);
    let nonce_seed = ballot_nonce_seed(&context.manifest_hash, &ballot.object_id, &master_nonce);

    let contests = manifest
        .contests
        .par_iter()
        .map(|description| {
            let empty = PlaintextBallotContest::new(&description.object_id, Vec::new());
            let contest = ballot.contest(&description.object_id).unwrap_or(&empty);
            encrypt_contest(
                contest,
                description,
                &context.elgamal_public_key,
                &context.crypto_extended_base_hash,
                &nonce_seed,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let timestamp = timestamp.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    });
    let crypto_hash = ballot_crypto_hash(&ballot.object_id, &context.manifest_hash, &contests);
    let code = get_ballot_code(code_seed, timestamp, &crypto_hash);
    info!("encrypted ballot {}", ballot.object_id);

    Ok(CiphertextBallot {
        object_id: ballot.object_id.clone(),
        manifest_hash: context.manifest_hash.clone(),
        code_seed: code_seed.clone(),
        contests,
        code,
        timestamp,
        crypto_hash,
        nonce: Some(master_nonce),
    })
}
