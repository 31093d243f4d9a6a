use crate::encryption::ElGamalCiphertext;
use crate::group::{
    a_minus_b_q, a_plus_bc_q, add_q, g_pow_p, mult_p, negate_q, pow_p, ElementModP, ElementModQ,
};
use crate::hash::HashItem;
use crate::nonces::Nonces;
use log::debug;
use serde::{Deserialize, Serialize};

/// Proof that a ciphertext (α, β) encrypts either 0 or 1 under K.
///
/// The branch for the actual plaintext is proven honestly, the other one is
/// simulated from random challenge and response values.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct DisjunctiveChaumPedersenProof {
    pub proof_zero_pad: ElementModP,
    pub proof_zero_data: ElementModP,
    pub proof_one_pad: ElementModP,
    pub proof_one_data: ElementModP,
    pub proof_zero_challenge: ElementModQ,
    pub proof_one_challenge: ElementModQ,
    pub challenge: ElementModQ,
    pub proof_zero_response: ElementModQ,
    pub proof_one_response: ElementModQ,
}

impl DisjunctiveChaumPedersenProof {
    /// Generates the proof for the real plaintext, 0 or 1. Returns `None` for any other plaintext.
    ///
    /// ## Arguments
    ///
    /// * `message`   - the ciphertext (α, β)
    /// * `r`         - the encryption nonce
    /// * `k`         - the public key
    /// * `q`         - the extended base hash
    /// * `seed`      - seed for the three proof nonces
    /// * `plaintext` - the encrypted value
    pub fn generate(
        message: &ElGamalCiphertext,
        r: &ElementModQ,
        k: &ElementModP,
        q: &ElementModQ,
        seed: &ElementModQ,
        plaintext: u64,
    ) -> Option<Self> {
        match plaintext {
            0 => Some(Self::generate_zero(message, r, k, q, seed)),
            1 => Some(Self::generate_one(message, r, k, q, seed)),
            _ => None,
        }
    }

    /// Proves that the ciphertext encrypts 0: β = K^r.
    pub fn generate_zero(
        message: &ElGamalCiphertext,
        r: &ElementModQ,
        k: &ElementModP,
        q: &ElementModQ,
        seed: &ElementModQ,
    ) -> Self {
        let (alpha, beta) = (&message.pad, &message.data);
        let nonces = Self::nonces(seed);
        let (c1, v1, u0) = (nonces.get(0), nonces.get(1), nonces.get(2));

        // real branch: (a0, b0) = (g^u0, K^u0)
        let a0 = g_pow_p(&u0);
        let b0 = pow_p(k, &u0);

        // simulated branch: a1 = g^v1 * α^-c1, b1 = K^v1 * g^c1 * β^-c1
        let minus_c1 = negate_q(&c1);
        let a1 = mult_p(&[&g_pow_p(&v1), &pow_p(alpha, &minus_c1)]);
        let b1 = mult_p(&[&pow_p(k, &v1), &g_pow_p(&c1), &pow_p(beta, &minus_c1)]);

        let c = Self::challenge(q, message, &a0, &b0, &a1, &b1);
        let c0 = a_minus_b_q(&c, &c1);
        let v0 = a_plus_bc_q(&u0, &c0, r);

        DisjunctiveChaumPedersenProof {
            proof_zero_pad: a0,
            proof_zero_data: b0,
            proof_one_pad: a1,
            proof_one_data: b1,
            proof_zero_challenge: c0,
            proof_one_challenge: c1,
            challenge: c,
            proof_zero_response: v0,
            proof_one_response: v1,
        }
    }

    /// Proves that the ciphertext encrypts 1: β = g * K^r.
    pub fn generate_one(
        message: &ElGamalCiphertext,
        r: &ElementModQ,
        k: &ElementModP,
        q: &ElementModQ,
        seed: &ElementModQ,
    ) -> Self {
        let (alpha, beta) = (&message.pad, &message.data);
        let nonces = Self::nonces(seed);
        let (c0, v0, u1) = (nonces.get(0), nonces.get(1), nonces.get(2));

        // simulated branch: a0 = g^v0 * α^-c0, b0 = K^v0 * β^-c0
        let minus_c0 = negate_q(&c0);
        let a0 = mult_p(&[&g_pow_p(&v0), &pow_p(alpha, &minus_c0)]);
        let b0 = mult_p(&[&pow_p(k, &v0), &pow_p(beta, &minus_c0)]);

        // real branch: (a1, b1) = (g^u1, K^u1)
        let a1 = g_pow_p(&u1);
        let b1 = pow_p(k, &u1);

        let c = Self::challenge(q, message, &a0, &b0, &a1, &b1);
        let c1 = a_minus_b_q(&c, &c0);
        let v1 = a_plus_bc_q(&u1, &c1, r);

        DisjunctiveChaumPedersenProof {
            proof_zero_pad: a0,
            proof_zero_data: b0,
            proof_one_pad: a1,
            proof_one_data: b1,
            proof_zero_challenge: c0,
            proof_one_challenge: c1,
            challenge: c,
            proof_zero_response: v0,
            proof_one_response: v1,
        }
    }

    /// Verifies the proof.
    ///
    /// Step by Step:
    /// 1. check that all elements are in their groups
    /// 2. recompute the challenge and check c = c0 + c1
    /// 3. verify g^v0 == a0 * α^c0 and g^v1 == a1 * α^c1
    /// 4. verify K^v0 == b0 * β^c0 and g^c1 * K^v1 == b1 * β^c1
    pub fn verify(&self, message: &ElGamalCiphertext, k: &ElementModP, q: &ElementModQ) -> bool {
        let (alpha, beta) = (&message.pad, &message.data);
        let (a0, b0) = (&self.proof_zero_pad, &self.proof_zero_data);
        let (a1, b1) = (&self.proof_one_pad, &self.proof_one_data);
        let (c0, c1) = (&self.proof_zero_challenge, &self.proof_one_challenge);
        let (v0, v1) = (&self.proof_zero_response, &self.proof_one_response);

        let in_bounds = [alpha, beta, a0, b0, a1, b1, k]
            .iter()
            .all(|e| e.is_valid_residue())
            && [c0, c1, v0, v1, &self.challenge]
                .iter()
                .all(|e| e.is_in_bounds());
        if !in_bounds {
            debug!("disjunctive proof has elements out of bounds");
            return false;
        }

        let c = Self::challenge(q, message, a0, b0, a1, b1);
        let consistent_c = add_q(&[c0, c1]) == c && c == self.challenge;
        let consistent_gv0 = g_pow_p(v0) == mult_p(&[a0, &pow_p(alpha, c0)]);
        let consistent_gv1 = g_pow_p(v1) == mult_p(&[a1, &pow_p(alpha, c1)]);
        let consistent_kv0 = pow_p(k, v0) == mult_p(&[b0, &pow_p(beta, c0)]);
        let consistent_gc1kv1 =
            mult_p(&[&g_pow_p(c1), &pow_p(k, v1)]) == mult_p(&[b1, &pow_p(beta, c1)]);

        let success = consistent_c
            && consistent_gv0
            && consistent_gv1
            && consistent_kv0
            && consistent_gc1kv1;
        if !success {
            debug!(
                "invalid disjunctive proof: c={} gv0={} gv1={} kv0={} gc1kv1={}",
                consistent_c, consistent_gv0, consistent_gv1, consistent_kv0, consistent_gc1kv1
            );
        }
        success
    }

    fn nonces(seed: &ElementModQ) -> Nonces {
        Nonces::with_headers(seed, &[HashItem::Str("disjoint-chaum-pedersen-proof")])
    }

    pub(crate) fn challenge(
        q: &ElementModQ,
        message: &ElGamalCiphertext,
        a0: &ElementModP,
        b0: &ElementModP,
        a1: &ElementModP,
        b1: &ElementModP,
    ) -> ElementModQ {
        hash_elems!("disjunctive", q, &message.pad, &message.data, a0, b0, a1, b1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::ElGamal;
    use crate::group::{g_pow_p, rand_q, rand_q_no_zero};
    use crate::helper::Helper;
    use crate::proofs::ChaumPedersenProof;

    #[test]
    fn it_should_separate_challenges_from_decryption_proofs() {
        Helper::setup_test_group();
        let header = rand_q();
        let x: Vec<ElementModP> = (0..6).map(|_| g_pow_p(&rand_q())).collect();

        // both transcripts carry the same items in the same order
        let decryption = ChaumPedersenProof::challenge(
            &header,
            &x[0],
            &ElGamalCiphertext { pad: x[1].clone(), data: x[2].clone() },
            &x[3],
            &x[4],
            &x[5],
        );
        let disjunctive = DisjunctiveChaumPedersenProof::challenge(
            &header,
            &ElGamalCiphertext { pad: x[0].clone(), data: x[1].clone() },
            &x[2],
            &x[3],
            &x[4],
            &x[5],
        );
        assert_ne!(decryption, disjunctive);
    }

    #[test]
    fn it_should_prove_zero_and_one() {
        let keypair = Helper::setup_md_system();
        let pk = &keypair.public_key;
        let q = rand_q();

        for plaintext in [0u64, 1] {
            let r = rand_q_no_zero();
            let cipher = ElGamal::encrypt(plaintext, &r, pk).unwrap();
            let proof =
                DisjunctiveChaumPedersenProof::generate(&cipher, &r, pk, &q, &rand_q(), plaintext)
                    .unwrap();
            assert!(proof.verify(&cipher, pk, &q));
        }
    }

    #[test]
    fn it_should_not_prove_a_lie() {
        let keypair = Helper::setup_md_system();
        let pk = &keypair.public_key;
        let q = rand_q();

        // claim zero for an encryption of one and vice versa
        let r = rand_q_no_zero();
        let one = ElGamal::encrypt(1, &r, pk).unwrap();
        let lie = DisjunctiveChaumPedersenProof::generate_zero(&one, &r, pk, &q, &rand_q());
        assert!(!lie.verify(&one, pk, &q));

        let zero = ElGamal::encrypt(0, &r, pk).unwrap();
        let lie = DisjunctiveChaumPedersenProof::generate_one(&zero, &r, pk, &q, &rand_q());
        assert!(!lie.verify(&zero, pk, &q));

        // two is neither
        let two = ElGamal::encrypt(2, &r, pk).unwrap();
        assert!(DisjunctiveChaumPedersenProof::generate(&two, &r, pk, &q, &rand_q(), 2).is_none());
        let lie = DisjunctiveChaumPedersenProof::generate_one(&two, &r, pk, &q, &rand_q());
        assert!(!lie.verify(&two, pk, &q));
    }

    #[test]
    fn it_should_reject_a_proof_for_another_ciphertext() {
        let keypair = Helper::setup_md_system();
        let pk = &keypair.public_key;
        let q = rand_q();

        let r = rand_q_no_zero();
        let cipher = ElGamal::encrypt(1, &r, pk).unwrap();
        let proof = DisjunctiveChaumPedersenProof::generate_one(&cipher, &r, pk, &q, &rand_q());
        let other = ElGamal::encrypt(1, &rand_q_no_zero(), pk).unwrap();
        assert!(!proof.verify(&other, pk, &q));
    }
}
