//! Non-interactive zero-knowledge proofs made with Fiat-Shamir over [`crate::hash`].
//!
//! - [`schnorr`]: knowledge of a secret key
//! - [`chaum_pedersen`]: correctness of a partial decryption
//! - [`disjunctive`]: a selection encrypts 0 or 1
//! - [`range`]: a contest accumulation encrypts a value in `0..=limit`

pub mod chaum_pedersen;
pub mod disjunctive;
pub mod range;
pub mod schnorr;

pub use chaum_pedersen::ChaumPedersenProof;
pub use disjunctive::DisjunctiveChaumPedersenProof;
pub use range::{RangeChaumPedersenProof, RangeProofBranch};
pub use schnorr::SchnorrProof;
