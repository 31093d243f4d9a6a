//! This library provides a threshold ElGamal engine for end-to-end
//! verifiable elections: key ceremony, ballot encryption with proofs,
//! homomorphic tallying and quorum decryption.

#[allow(clippy::many_single_char_names)]
#[macro_use]
pub mod hash;

pub mod constants;
pub mod error;
pub mod group;
pub mod pow_radix;
pub mod discrete_log;
pub mod random;
pub mod nonces;

#[allow(clippy::many_single_char_names)]
pub mod encryption;

#[allow(clippy::many_single_char_names)]
pub mod proofs;

pub mod polynomial;
pub mod auxiliary;
pub mod key_ceremony;
pub mod guardian;
pub mod key_ceremony_mediator;

pub mod manifest;
pub mod election;
pub mod ballot_code;
pub mod ballot;
pub mod encrypt;
pub mod ballot_box;
pub mod tally;

pub mod decryption_share;
pub mod decryption;
pub mod decrypt_with_shares;
pub mod decrypt_with_secrets;
pub mod decryption_mediator;

pub mod helper;
