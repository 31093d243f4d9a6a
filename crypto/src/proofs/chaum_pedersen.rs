use crate::encryption::ElGamalCiphertext;
use crate::group::{a_plus_bc_q, g_pow_p, mult_p, pow_p, ElementModP, ElementModQ};
use crate::hash::HashItem;
use crate::nonces::Nonces;
use log::debug;
use serde::{Deserialize, Serialize};

/// Proof that a partial decryption M = A^s was made with the secret behind K = g^s.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct ChaumPedersenProof {
    /// a = g^u
    pub pad: ElementModP,
    /// b = A^u
    pub data: ElementModP,
    pub challenge: ElementModQ,
    pub response: ElementModQ,
}

impl ChaumPedersenProof {
    /// Generates a proof that `m` is the partial decryption of `message` under secret `s`.
    ///
    /// Step by Step:
    /// 1. derive the commitment nonce u from the seed
    /// 2. commit (a, b) = (g^u, A^u)
    /// 3. compute the challenge c = H(header, K, A, B, a, b, M)
    /// 4. compute the response v = u + c * s mod q
    ///
    /// ## Arguments
    ///
    /// * `message`     - the ciphertext (A, B)
    /// * `s`           - the secret (or secret share)
    /// * `m`           - the partial decryption A^s
    /// * `seed`        - seed of the commitment nonce
    /// * `hash_header` - binds the proof to an election, usually the extended base hash
    pub fn generate(
        message: &ElGamalCiphertext,
        s: &ElementModQ,
        m: &ElementModP,
        seed: &ElementModQ,
        hash_header: &ElementModQ,
    ) -> Self {
        let u = Nonces::with_headers(seed, &[HashItem::Str("constant-chaum-pedersen-proof")]).get(0);
        let k = g_pow_p(s);

        // a = g^u, b = A^u
        let pad = g_pow_p(&u);
        let data = pow_p(&message.pad, &u);

        let challenge = Self::challenge(hash_header, &k, message, &pad, &data, m);
        let response = a_plus_bc_q(&u, &challenge, s);

        ChaumPedersenProof {
            pad,
            data,
            challenge,
            response,
        }
    }

    /// Verifies the proof for ciphertext (A, B), public key K and partial decryption M.
    ///
    /// Step by Step:
    /// 1. check that all elements are in their groups
    /// 2. recompute the challenge c
    /// 3. verify that g^v == a * K^c
    /// 4. verify that A^v == b * M^c
    pub fn verify(
        &self,
        message: &ElGamalCiphertext,
        k: &ElementModP,
        m: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        let in_bounds = message.pad.is_valid_residue()
            && k.is_valid_residue()
            && m.is_valid_residue()
            && self.pad.is_valid_residue()
            && self.data.is_valid_residue()
            && self.challenge.is_in_bounds()
            && self.response.is_in_bounds();
        if !in_bounds {
            debug!("chaum pedersen proof has elements out of bounds");
            return false;
        }

        let challenge = Self::challenge(extended_base_hash, k, message, &self.pad, &self.data, m);
        let valid_challenge = challenge == self.challenge;

        // g^v == a * K^c
        let consistent_gv = g_pow_p(&self.response)
            == mult_p(&[&self.pad, &pow_p(k, &self.challenge)]);

        // A^v == b * M^c
        let consistent_av = pow_p(&message.pad, &self.response)
            == mult_p(&[&self.data, &pow_p(m, &self.challenge)]);

        if !(valid_challenge && consistent_gv && consistent_av) {
            debug!(
                "invalid chaum pedersen proof: challenge={} gv={} av={}",
                valid_challenge, consistent_gv, consistent_av
            );
            return false;
        }
        true
    }

    pub(crate) fn challenge(
        hash_header: &ElementModQ,
        k: &ElementModP,
        message: &ElGamalCiphertext,
        a: &ElementModP,
        b: &ElementModP,
        m: &ElementModP,
    ) -> ElementModQ {
        hash_elems!("chaum_pedersen", hash_header, k, &message.pad, &message.data, a, b, m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::ElGamal;
    use crate::group::{rand_q, rand_q_no_zero};
    use crate::helper::Helper;

    #[test]
    fn it_should_verify_a_decryption_proof() {
        let keypair = Helper::setup_md_system();
        let header = rand_q();
        let cipher = ElGamal::encrypt(5, &rand_q_no_zero(), &keypair.public_key).unwrap();
        let m = cipher.partial_decrypt(&keypair.secret_key);

        let proof = ChaumPedersenProof::generate(&cipher, &keypair.secret_key, &m, &rand_q(), &header);
        assert!(proof.verify(&cipher, &keypair.public_key, &m, &header));
    }

    #[test]
    fn it_should_reject_a_wrong_partial_decryption() {
        let keypair = Helper::setup_md_system();
        let header = rand_q();
        let cipher = ElGamal::encrypt(5, &rand_q_no_zero(), &keypair.public_key).unwrap();
        let m = cipher.partial_decrypt(&keypair.secret_key);
        let proof = ChaumPedersenProof::generate(&cipher, &keypair.secret_key, &m, &rand_q(), &header);

        let wrong = mult_p(&[&m, &g_pow_p(&ElementModQ::one())]);
        assert!(!proof.verify(&cipher, &keypair.public_key, &wrong, &header));
    }

    #[test]
    fn it_should_bind_the_header() {
        let keypair = Helper::setup_md_system();
        let cipher = ElGamal::encrypt(1, &rand_q_no_zero(), &keypair.public_key).unwrap();
        let m = cipher.partial_decrypt(&keypair.secret_key);
        let header = ElementModQ::from_u64(1).unwrap();
        let proof = ChaumPedersenProof::generate(&cipher, &keypair.secret_key, &m, &rand_q(), &header);

        assert!(!proof.verify(&cipher, &keypair.public_key, &m, &ElementModQ::from_u64(2).unwrap()));
    }

    #[test]
    fn it_should_be_deterministic_in_the_seed() {
        let keypair = Helper::setup_md_system();
        let cipher = ElGamal::encrypt(1, &rand_q_no_zero(), &keypair.public_key).unwrap();
        let m = cipher.partial_decrypt(&keypair.secret_key);
        let (seed, header) = (rand_q(), rand_q());

        let first = ChaumPedersenProof::generate(&cipher, &keypair.secret_key, &m, &seed, &header);
        let second = ChaumPedersenProof::generate(&cipher, &keypair.secret_key, &m, &seed, &header);
        assert_eq!(first, second);
    }
}
