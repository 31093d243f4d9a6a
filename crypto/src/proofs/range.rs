use crate::encryption::ElGamalCiphertext;
use crate::group::{
    a_minus_b_q, a_plus_bc_q, add_q, g_pow_p, mult_p, negate_q, pow_p, ElementModP, ElementModQ,
};
use crate::hash::HashItem;
use crate::nonces::Nonces;
use log::debug;
use serde::{Deserialize, Serialize};

/// One branch of a range proof: the statement "(α, β / g^j) is an encryption of zero".
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct RangeProofBranch {
    pub pad: ElementModP,
    pub data: ElementModP,
    pub challenge: ElementModQ,
    pub response: ElementModQ,
}

/// Proof that a ciphertext encrypts some value in `0..=limit`.
///
/// Used for contest accumulations, where the limit is the number of votes
/// a voter may cast in the contest.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct RangeChaumPedersenProof {
    pub branches: Vec<RangeProofBranch>,
    pub challenge: ElementModQ,
    pub limit: u64,
}

impl RangeChaumPedersenProof {
    /// Generates the proof, or `None` if `plaintext > limit`.
    ///
    /// ## Arguments
    ///
    /// * `message`   - the ciphertext (α, β)
    /// * `r`         - the (aggregate) encryption nonce
    /// * `k`         - the public key
    /// * `q`         - the extended base hash
    /// * `seed`      - seed for the branch nonces
    /// * `plaintext` - the encrypted value
    /// * `limit`     - the largest admissible value
    pub fn generate(
        message: &ElGamalCiphertext,
        r: &ElementModQ,
        k: &ElementModP,
        q: &ElementModQ,
        seed: &ElementModQ,
        plaintext: u64,
        limit: u64,
    ) -> Option<Self> {
        if plaintext > limit {
            return None;
        }
        let alpha = &message.pad;
        let nonces = Nonces::with_headers(seed, &[HashItem::Str("range-chaum-pedersen-proof")]);
        let u = nonces.get(2 * plaintext + 1);

        let mut pads = Vec::with_capacity(limit as usize + 1);
        let mut datas = Vec::with_capacity(limit as usize + 1);
        let mut simulated = Vec::with_capacity(limit as usize + 1);
        for j in 0..=limit {
            if j == plaintext {
                // real branch: (a, b) = (g^u, K^u)
                pads.push(g_pow_p(&u));
                datas.push(pow_p(k, &u));
                simulated.push(None);
            } else {
                // simulated branch: a = g^v * α^-c, b = K^v * (β / g^j)^-c
                let (c, v) = (nonces.get(2 * j), nonces.get(2 * j + 1));
                let minus_c = negate_q(&c);
                let shifted = Self::shifted_data(message, j)?;
                pads.push(mult_p(&[&g_pow_p(&v), &pow_p(alpha, &minus_c)]));
                datas.push(mult_p(&[&pow_p(k, &v), &pow_p(&shifted, &minus_c)]));
                simulated.push(Some((c, v)));
            }
        }

        let challenge = Self::challenge(q, message, limit, &pads, &datas);
        let simulated_sum = simulated
            .iter()
            .flatten()
            .fold(ElementModQ::zero(), |acc, (c, _)| add_q(&[&acc, c]));
        let real_challenge = a_minus_b_q(&challenge, &simulated_sum);
        let real_response = a_plus_bc_q(&u, &real_challenge, r);

        let branches = pads
            .into_iter()
            .zip(datas)
            .zip(simulated)
            .map(|((pad, data), simulation)| {
                let (challenge, response) = simulation
                    .unwrap_or_else(|| (real_challenge.clone(), real_response.clone()));
                RangeProofBranch {
                    pad,
                    data,
                    challenge,
                    response,
                }
            })
            .collect();

        Some(RangeChaumPedersenProof {
            branches,
            challenge,
            limit,
        })
    }

    /// Verifies the proof against the ciphertext and the expected limit.
    ///
    /// Step by Step:
    /// 1. check the number of branches and that all elements are in their groups
    /// 2. recompute the challenge and check c = sum c_j
    /// 3. verify g^v_j == a_j * α^c_j for every branch
    /// 4. verify K^v_j == b_j * (β / g^j)^c_j for every branch
    pub fn verify(
        &self,
        message: &ElGamalCiphertext,
        k: &ElementModP,
        q: &ElementModQ,
        limit: u64,
    ) -> bool {
        if self.limit != limit || self.branches.len() as u64 != limit + 1 {
            debug!(
                "range proof has {} branches, expected {}",
                self.branches.len(),
                limit + 1
            );
            return false;
        }
        let in_bounds = message.is_valid_residue()
            && k.is_valid_residue()
            && self.challenge.is_in_bounds()
            && self.branches.iter().all(|branch| {
                branch.pad.is_valid_residue()
                    && branch.data.is_valid_residue()
                    && branch.challenge.is_in_bounds()
                    && branch.response.is_in_bounds()
            });
        if !in_bounds {
            debug!("range proof has elements out of bounds");
            return false;
        }

        let pads: Vec<ElementModP> = self.branches.iter().map(|b| b.pad.clone()).collect();
        let datas: Vec<ElementModP> = self.branches.iter().map(|b| b.data.clone()).collect();
        let challenge = Self::challenge(q, message, limit, &pads, &datas);
        let challenge_sum = self
            .branches
            .iter()
            .fold(ElementModQ::zero(), |acc, b| add_q(&[&acc, &b.challenge]));
        if challenge != self.challenge || challenge_sum != challenge {
            debug!("range proof challenge mismatch");
            return false;
        }

        self.branches.iter().enumerate().all(|(j, branch)| {
            let shifted = match Self::shifted_data(message, j as u64) {
                Some(shifted) => shifted,
                None => return false,
            };
            let consistent_gv = g_pow_p(&branch.response)
                == mult_p(&[&branch.pad, &pow_p(&message.pad, &branch.challenge)]);
            let consistent_kv = pow_p(k, &branch.response)
                == mult_p(&[&branch.data, &pow_p(&shifted, &branch.challenge)]);
            if !(consistent_gv && consistent_kv) {
                debug!(
                    "range proof branch {} invalid: gv={} kv={}",
                    j, consistent_gv, consistent_kv
                );
            }
            consistent_gv && consistent_kv
        })
    }

    /// β / g^j
    fn shifted_data(message: &ElGamalCiphertext, j: u64) -> Option<ElementModP> {
        let exponent = ElementModQ::from_u64(j).ok()?;
        Some(mult_p(&[&message.data, &g_pow_p(&negate_q(&exponent))]))
    }

    fn challenge(
        q: &ElementModQ,
        message: &ElGamalCiphertext,
        limit: u64,
        pads: &[ElementModP],
        datas: &[ElementModP],
    ) -> ElementModQ {
        hash_elems!("range", q, &message.pad, &message.data, limit, pads, datas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::ElGamal;
    use crate::group::{rand_q, rand_q_no_zero};
    use crate::helper::Helper;

    #[test]
    fn it_should_prove_every_value_in_range() {
        let keypair = Helper::setup_md_system();
        let pk = &keypair.public_key;
        let q = rand_q();

        for plaintext in 0..=3u64 {
            let r = rand_q_no_zero();
            let cipher = ElGamal::encrypt(plaintext, &r, pk).unwrap();
            let proof =
                RangeChaumPedersenProof::generate(&cipher, &r, pk, &q, &rand_q(), plaintext, 3)
                    .unwrap();
            assert!(proof.verify(&cipher, pk, &q, 3), "failed for {}", plaintext);
        }
    }

    #[test]
    fn it_should_refuse_values_above_the_limit() {
        let keypair = Helper::setup_md_system();
        let pk = &keypair.public_key;
        let r = rand_q_no_zero();
        let cipher = ElGamal::encrypt(3, &r, pk).unwrap();
        assert!(RangeChaumPedersenProof::generate(&cipher, &r, pk, &rand_q(), &rand_q(), 3, 2).is_none());
    }

    #[test]
    fn it_should_not_verify_a_false_claim() {
        let keypair = Helper::setup_md_system();
        let pk = &keypair.public_key;
        let q = rand_q();
        let r = rand_q_no_zero();

        // claim 1 for an encryption of 3 with limit 2
        let cipher = ElGamal::encrypt(3, &r, pk).unwrap();
        let proof = RangeChaumPedersenProof::generate(&cipher, &r, pk, &q, &rand_q(), 1, 2).unwrap();
        assert!(!proof.verify(&cipher, pk, &q, 2));
    }

    #[test]
    fn it_should_reject_a_different_limit() {
        let keypair = Helper::setup_md_system();
        let pk = &keypair.public_key;
        let q = rand_q();
        let r = rand_q_no_zero();

        let cipher = ElGamal::encrypt(1, &r, pk).unwrap();
        let proof = RangeChaumPedersenProof::generate(&cipher, &r, pk, &q, &rand_q(), 1, 2).unwrap();
        assert!(proof.verify(&cipher, pk, &q, 2));
        assert!(!proof.verify(&cipher, pk, &q, 1));
        assert!(!proof.verify(&cipher, pk, &q, 3));
    }
}
