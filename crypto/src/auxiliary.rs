//! Pluggable encryption of partial key backups between guardians.
//!
//! The default scheme is an integrated encryption scheme over the election
//! group: an ephemeral Diffie-Hellman exchange in Z_p^*, HKDF-SHA256 key
//! derivation and AES-256-GCM.

use crate::constants::group;
use crate::error::AuxiliaryError;
use crate::group::{g_pow_p, pow_p, rand_range_q, ElementModP, ElementModQ};
use crate::random::Random;
use aes_gcm::aead::{generic_array::GenericArray, Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use hkdf::Hkdf;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

const AES_IV_LENGTH: usize = 12;
const KDF_INFO: &[u8] = b"election-partial-key-backup";

type AesKey = [u8; 32];

/// A guardian's published auxiliary key.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct AuxiliaryPublicKey {
    pub owner_id: String,
    pub sequence_order: u64,
    pub key: Vec<u8>,
}

/// An auxiliary key pair in the encoding of its scheme. Never serialized.
#[derive(Clone, Eq, PartialEq)]
pub struct AuxiliaryKeyPair {
    pub secret_key: Vec<u8>,
    pub public_key: Vec<u8>,
}

impl fmt::Debug for AuxiliaryKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuxiliaryKeyPair")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Encryption used to deliver partial key backups to their designated guardian.
pub trait AuxiliaryScheme: Send + Sync {
    fn generate_keypair(&self) -> AuxiliaryKeyPair;

    /// Encrypts `message` so that only the holder of the secret behind `public_key` can read it.
    fn encrypt(&self, message: &[u8], public_key: &[u8]) -> Result<Vec<u8>, AuxiliaryError>;

    fn decrypt(&self, message: &[u8], keypair: &AuxiliaryKeyPair) -> Result<Vec<u8>, AuxiliaryError>;
}

/// Hashed ElGamal with AES-256-GCM.
///
/// A ciphertext is `ephemeral public key || iv || aes-gcm output`, where the
/// ephemeral key is written big endian, left padded to the byte length of P.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashedElGamalAes;

impl AuxiliaryScheme for HashedElGamalAes {
    fn generate_keypair(&self) -> AuxiliaryKeyPair {
        let secret = rand_range_q(&ElementModQ::two());
        let public = g_pow_p(&secret);
        AuxiliaryKeyPair {
            secret_key: secret.value().to_bytes_be(),
            public_key: encode_p(&public),
        }
    }

    fn encrypt(&self, message: &[u8], public_key: &[u8]) -> Result<Vec<u8>, AuxiliaryError> {
        let receiver = decode_p(public_key)?;
        let ephemeral_secret = rand_range_q(&ElementModQ::two());
        let ephemeral_public = g_pow_p(&ephemeral_secret);

        let shared = pow_p(&receiver, &ephemeral_secret);
        let aes_key = derive_key(&ephemeral_public, &shared)?;
        let encrypted = aes_encrypt(&aes_key, message)?;

        let ephemeral = encode_p(&ephemeral_public);
        let mut cipher_text = Vec::with_capacity(ephemeral.len() + encrypted.len());
        cipher_text.extend(ephemeral);
        cipher_text.extend(encrypted);
        Ok(cipher_text)
    }

    fn decrypt(&self, message: &[u8], keypair: &AuxiliaryKeyPair) -> Result<Vec<u8>, AuxiliaryError> {
        let width = p_width();
        if message.len() < width + AES_IV_LENGTH {
            return Err(AuxiliaryError::MalformedMessage);
        }
        let ephemeral_public = decode_p(&message[..width])?;
        let secret = ElementModQ::new(BigUint::from_bytes_be(&keypair.secret_key))
            .map_err(|_| AuxiliaryError::MalformedKey)?;

        let shared = pow_p(&ephemeral_public, &secret);
        let aes_key = derive_key(&ephemeral_public, &shared)?;
        aes_decrypt(&aes_key, &message[width..])
    }
}

fn p_width() -> usize {
    ((group().p().bits() + 7) / 8) as usize
}

fn encode_p(element: &ElementModP) -> Vec<u8> {
    let bytes = element.value().to_bytes_be();
    let mut encoded = vec![0u8; p_width().saturating_sub(bytes.len())];
    encoded.extend(bytes);
    encoded
}

fn decode_p(bytes: &[u8]) -> Result<ElementModP, AuxiliaryError> {
    if bytes.len() != p_width() {
        return Err(AuxiliaryError::MalformedKey);
    }
    let element = ElementModP::new(BigUint::from_bytes_be(bytes)).map_err(|_| AuxiliaryError::MalformedKey)?;
    if !element.is_valid_residue() {
        return Err(AuxiliaryError::MalformedKey);
    }
    Ok(element)
}

fn derive_key(ephemeral_public: &ElementModP, shared: &ElementModP) -> Result<AesKey, AuxiliaryError> {
    let mut master = encode_p(ephemeral_public);
    master.extend(encode_p(shared));

    let h = Hkdf::<Sha256>::new(None, &master);
    let mut out = [0u8; 32];
    h.expand(KDF_INFO, &mut out)
        .map_err(|_| AuxiliaryError::EncryptionFailed)?;
    Ok(out)
}

fn aes_encrypt(key: &AesKey, message: &[u8]) -> Result<Vec<u8>, AuxiliaryError> {
    let aead = Aes256Gcm::new_from_slice(key).map_err(|_| AuxiliaryError::EncryptionFailed)?;
    let iv = Random::bytes::<AES_IV_LENGTH>();

    let ciphertext = aead
        .encrypt(GenericArray::from_slice(&iv), message)
        .map_err(|_| AuxiliaryError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(AES_IV_LENGTH + ciphertext.len());
    output.extend(iv);
    output.extend(ciphertext);
    Ok(output)
}

fn aes_decrypt(key: &AesKey, ciphertext: &[u8]) -> Result<Vec<u8>, AuxiliaryError> {
    let aead = Aes256Gcm::new_from_slice(key).map_err(|_| AuxiliaryError::DecryptionFailed)?;
    let (iv, encrypted) = ciphertext.split_at(AES_IV_LENGTH);
    aead.decrypt(GenericArray::from_slice(iv), encrypted)
        .map_err(|_| AuxiliaryError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::Helper;

    #[test]
    fn it_should_round_trip_a_message() {
        Helper::setup_test_group();
        let scheme = HashedElGamalAes;
        let keypair = scheme.generate_keypair();

        let encrypted = scheme.encrypt(b"coordinate", &keypair.public_key).unwrap();
        assert_ne!(&encrypted[..], b"coordinate");
        assert_eq!(scheme.decrypt(&encrypted, &keypair).unwrap(), b"coordinate".to_vec());
    }

    #[test]
    fn it_should_not_decrypt_with_another_key() {
        Helper::setup_test_group();
        let scheme = HashedElGamalAes;
        let receiver = scheme.generate_keypair();
        let eavesdropper = scheme.generate_keypair();

        let encrypted = scheme.encrypt(b"coordinate", &receiver.public_key).unwrap();
        assert_eq!(
            scheme.decrypt(&encrypted, &eavesdropper),
            Err(AuxiliaryError::DecryptionFailed)
        );
    }

    #[test]
    fn it_should_detect_tampering() {
        Helper::setup_test_group();
        let scheme = HashedElGamalAes;
        let keypair = scheme.generate_keypair();

        let mut encrypted = scheme.encrypt(b"coordinate", &keypair.public_key).unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x01;
        assert!(scheme.decrypt(&encrypted, &keypair).is_err());
        assert_eq!(scheme.decrypt(&[0u8; 3], &keypair), Err(AuxiliaryError::MalformedMessage));
    }

    #[test]
    fn it_should_reject_malformed_public_keys() {
        Helper::setup_test_group();
        let scheme = HashedElGamalAes;
        assert_eq!(scheme.encrypt(b"x", &[1, 2, 3]), Err(AuxiliaryError::MalformedKey));
    }
}
