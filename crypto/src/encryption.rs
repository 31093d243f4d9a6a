use crate::constants::group;
use crate::error::{DiscreteLogError, ElGamalError, GroupError};
use crate::group::{
    div_p, g_pow_p, mult_p, pow_p, rand_range_q, ElementModP, ElementModQ,
};
use serde::{Deserialize, Serialize};

/// An ElGamal key pair: public_key = g^secret_key mod p
///
/// Secret keys are never serialized.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ElGamalKeyPair {
    pub secret_key: ElementModQ,
    pub public_key: ElementModP,
}

impl ElGamalKeyPair {
    /// Returns the key pair for a secret, or `None` for secrets below 2.
    pub fn from_secret(secret_key: &ElementModQ) -> Option<Self> {
        if secret_key < &ElementModQ::two() {
            return None;
        }
        Some(ElGamalKeyPair {
            secret_key: secret_key.clone(),
            public_key: g_pow_p(secret_key),
        })
    }

    /// Returns a fresh key pair with a secret drawn from [2, Q).
    pub fn random() -> Self {
        let secret_key = rand_range_q(&ElementModQ::two());
        ElGamalKeyPair {
            public_key: g_pow_p(&secret_key),
            secret_key,
        }
    }
}

/// An exponential ElGamal ciphertext (pad, data) = (g^r, g^m * K^r)
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ElGamalCiphertext {
    pub pad: ElementModP,
    pub data: ElementModP,
}

impl ElGamalCiphertext {
    /// The encryption of zero with nonce zero, the neutral element of [`ElGamal::add`].
    pub fn identity() -> Self {
        ElGamalCiphertext {
            pad: ElementModP::one(),
            data: ElementModP::one(),
        }
    }

    /// Returns the plaintext given the blinding product K^r = pad^s.
    ///
    /// - g^m = data / product
    /// - m = log_g g^m
    pub fn decrypt_known_product(&self, product: &ElementModP) -> Result<u64, DiscreteLogError> {
        let ctx = group();
        let max = ctx.discrete_log().max_exponent();
        let encoded = div_p(&self.data, product)
            .map_err(|_| DiscreteLogError::ExponentNotFound { max })?;
        ctx.discrete_log().discrete_log(&encoded)
    }

    /// Returns the plaintext using the secret key: product = pad^s
    pub fn decrypt(&self, secret_key: &ElementModQ) -> Result<u64, DiscreteLogError> {
        self.decrypt_known_product(&pow_p(&self.pad, secret_key))
    }

    /// Returns the plaintext using the encryption nonce: product = K^r
    pub fn decrypt_known_nonce(
        &self,
        public_key: &ElementModP,
        nonce: &ElementModQ,
    ) -> Result<u64, DiscreteLogError> {
        self.decrypt_known_product(&pow_p(public_key, nonce))
    }

    /// Returns the partial decryption pad^secret.
    pub fn partial_decrypt(&self, secret: &ElementModQ) -> ElementModP {
        pow_p(&self.pad, secret)
    }

    pub fn crypto_hash(&self) -> ElementModQ {
        hash_elems!(&self.pad, &self.data)
    }

    pub fn is_valid_residue(&self) -> bool {
        self.pad.is_valid_residue() && self.data.is_valid_residue()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct ElGamal;

impl ElGamal {
    /// Returns an ElGamal Encryption of a message
    /// - (pad, data) = (g^r, g^m * K^r)
    ///
    /// ## Arguments
    ///
    /// * `m`  - The message, must be smaller than Q
    /// * `r`  - The non-zero nonce used to encrypt the message
    /// * `public_key` - The public key K used to encrypt the message
    pub fn encrypt(
        m: u64,
        r: &ElementModQ,
        public_key: &ElementModP,
    ) -> Result<ElGamalCiphertext, ElGamalError> {
        if r.is_zero() {
            return Err(ElGamalError::ZeroNonce);
        }
        let message = ElementModQ::from_u64(m)?;

        // pad = g^r
        let pad = g_pow_p(r);

        // data = g^m * K^r
        let encoded = g_pow_p(&message);
        let blinding = pow_p(public_key, r);
        let data = mult_p(&[&encoded, &blinding]);

        Ok(ElGamalCiphertext { pad, data })
    }

    /// Homomorphically adds ElGamal encryptions.
    /// Returns the encryption of the sum of the plaintexts.
    ///
    /// - (prod pad_i, prod data_i)
    pub fn add<'a, I>(ciphertexts: I) -> ElGamalCiphertext
    where
        I: IntoIterator<Item = &'a ElGamalCiphertext>,
    {
        ciphertexts
            .into_iter()
            .fold(ElGamalCiphertext::identity(), |acc, c| ElGamalCiphertext {
                pad: mult_p(&[&acc.pad, &c.pad]),
                data: mult_p(&[&acc.data, &c.data]),
            })
    }

    /// Combines public keys into K = prod K_i.
    pub fn combine_public_keys<'a, I>(keys: I) -> ElementModP
    where
        I: IntoIterator<Item = &'a ElementModP>,
    {
        keys.into_iter()
            .fold(ElementModP::one(), |acc, key| mult_p(&[&acc, key]))
    }

    /// Returns the partial decryption M_i = pad^s_i of a ciphertext.
    pub fn partial_decrypt(ciphertext: &ElGamalCiphertext, secret_share: &ElementModQ) -> ElementModP {
        ciphertext.partial_decrypt(secret_share)
    }

    /// Returns the encoded plaintext g^m once all partial decryptions are combined.
    pub fn combine_partial_decryptions<'a, I>(
        ciphertext: &ElGamalCiphertext,
        partials: I,
    ) -> Result<ElementModP, GroupError>
    where
        I: IntoIterator<Item = &'a ElementModP>,
    {
        let product = Self::combine_public_keys(partials);
        div_p(&ciphertext.data, &product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{rand_q_no_zero, ElementModQ};
    use crate::helper::Helper;

    #[test]
    fn it_should_reject_small_secrets() {
        Helper::setup_test_group();
        assert!(ElGamalKeyPair::from_secret(&ElementModQ::zero()).is_none());
        assert!(ElGamalKeyPair::from_secret(&ElementModQ::one()).is_none());
        assert!(ElGamalKeyPair::from_secret(&ElementModQ::two()).is_some());
    }

    #[test]
    fn it_should_encrypt_and_decrypt() {
        let keypair = Helper::setup_md_system();

        for m in [0u64, 1, 2, 55] {
            let r = rand_q_no_zero();
            let cipher = ElGamal::encrypt(m, &r, &keypair.public_key).unwrap();
            assert_eq!(cipher.decrypt(&keypair.secret_key), Ok(m));
            assert_eq!(cipher.decrypt_known_nonce(&keypair.public_key, &r), Ok(m));
        }
    }

    #[test]
    fn it_should_refuse_a_zero_nonce() {
        let keypair = Helper::setup_md_system();
        let result = ElGamal::encrypt(1, &ElementModQ::zero(), &keypair.public_key);
        assert_eq!(result, Err(ElGamalError::ZeroNonce));
    }

    #[test]
    fn it_should_add_homomorphically() {
        let keypair = Helper::setup_md_system();
        let pk = &keypair.public_key;

        let ciphers = [
            ElGamal::encrypt(3, &rand_q_no_zero(), pk).unwrap(),
            ElGamal::encrypt(4, &rand_q_no_zero(), pk).unwrap(),
            ElGamal::encrypt(0, &rand_q_no_zero(), pk).unwrap(),
        ];
        let sum = ElGamal::add(&ciphers);
        assert_eq!(sum.decrypt(&keypair.secret_key), Ok(7));

        let empty: Vec<ElGamalCiphertext> = Vec::new();
        assert_eq!(ElGamal::add(&empty), ElGamalCiphertext::identity());
    }

    #[test]
    fn it_should_decrypt_with_a_joint_key() {
        Helper::setup_test_group();
        let first = ElGamalKeyPair::random();
        let second = ElGamalKeyPair::random();
        let joint = ElGamal::combine_public_keys([&first.public_key, &second.public_key]);

        let cipher = ElGamal::encrypt(9, &rand_q_no_zero(), &joint).unwrap();
        let partials = [
            ElGamal::partial_decrypt(&cipher, &first.secret_key),
            ElGamal::partial_decrypt(&cipher, &second.secret_key),
        ];
        let encoded = ElGamal::combine_partial_decryptions(&cipher, &partials).unwrap();
        assert_eq!(encoded, g_pow_p(&ElementModQ::from_u64(9).unwrap()));
    }

    #[test]
    fn it_should_hash_ciphertexts() {
        let keypair = Helper::setup_md_system();
        let cipher = ElGamal::encrypt(1, &rand_q_no_zero(), &keypair.public_key).unwrap();
        assert_eq!(cipher.crypto_hash(), cipher.clone().crypto_hash());
        assert_ne!(cipher.crypto_hash(), ElGamalCiphertext::identity().crypto_hash());
    }
}
