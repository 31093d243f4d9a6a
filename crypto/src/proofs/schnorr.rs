use crate::encryption::ElGamalKeyPair;
use crate::group::{a_plus_bc_q, g_pow_p, mult_p, pow_p, ElementModP, ElementModQ};
use serde::{Deserialize, Serialize};

/// A non-interactive proof of knowledge of the secret key behind `public_key`.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct SchnorrProof {
    pub public_key: ElementModP,
    pub commitment: ElementModP,
    pub challenge: ElementModQ,
    pub response: ElementModQ,
}

impl SchnorrProof {
    /// Generates the proof for a key pair.
    ///
    /// Step by Step:
    /// 1. commit h = g^u
    /// 2. compute the challenge c = H(K, h)
    /// 3. compute the response v = u + c * s mod q
    ///
    /// ## Arguments
    ///
    /// * `keypair` - the key pair (s, K = g^s)
    /// * `nonce`   - the commitment nonce u, must be fresh
    pub fn generate(keypair: &ElGamalKeyPair, nonce: &ElementModQ) -> Self {
        let public_key = keypair.public_key.clone();
        let commitment = g_pow_p(nonce);
        let challenge = Self::challenge(&public_key, &commitment);
        let response = a_plus_bc_q(nonce, &challenge, &keypair.secret_key);

        SchnorrProof {
            public_key,
            commitment,
            challenge,
            response,
        }
    }

    /// Verifies the proof.
    ///
    /// Step by Step:
    /// 1. check that K and h are in the subgroup
    /// 2. recompute the challenge c
    /// 3. verify that g^v == h * K^c
    pub fn verify(&self) -> bool {
        let valid_public_key = self.public_key.is_valid_residue();
        let valid_commitment = self.commitment.is_valid_residue();
        let in_bounds = self.challenge.is_in_bounds() && self.response.is_in_bounds();
        if !(valid_public_key && valid_commitment && in_bounds) {
            return false;
        }

        let valid_challenge = Self::challenge(&self.public_key, &self.commitment) == self.challenge;

        // g^v == h * K^c
        let left = g_pow_p(&self.response);
        let right = mult_p(&[&self.commitment, &pow_p(&self.public_key, &self.challenge)]);

        valid_challenge && left == right
    }

    fn challenge(public_key: &ElementModP, commitment: &ElementModP) -> ElementModQ {
        hash_elems!("schnorr", public_key, commitment)
    }
}
