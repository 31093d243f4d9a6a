use crate::group::ElementModQ;
use blake2::{Blake2b512, Digest};
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Random;

impl Random {
    /// Returns `N` bytes from the operating system backed generator.
    pub fn bytes<const N: usize>() -> [u8; N] {
        let mut bytes = [0u8; N];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// A deterministic generator keyed by a field element.
    ///
    /// Equal seeds yield equal streams, which makes seeded key generation
    /// reproducible.
    pub fn seeded(seed: &ElementModQ) -> ChaCha20Rng {
        let digest = Blake2b512::new()
            .chain_update(b"seeded-rng")
            .chain_update(seed.to_hex())
            .finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest[..32]);
        ChaCha20Rng::from_seed(key)
    }

    /// Miller-Rabin Primality Test
    ///
    /// https://en.wikipedia.org/wiki/Miller-Rabin_primality_test
    pub fn is_prime(num: &BigUint, certainty: u32) -> bool {
        let one = BigUint::one();
        let two = BigUint::from(2u32);
        let three = BigUint::from(3u32);

        if *num == two || *num == three {
            return true;
        }
        if *num < two || (num % &two).is_zero() {
            return false;
        }

        let num_less_one = num - &one;

        // write n - 1 = 2^s * d
        let mut d = num_less_one.clone();
        let mut s = 0u64;
        while (&d % &two).is_zero() {
            d /= &two;
            s += 1;
        }

        let mut rng = rand::thread_rng();
        'witness: for _ in 0..certainty {
            let a = rng.gen_biguint_range(&two, &num_less_one);
            let mut x = a.modpow(&d, num);
            if x == one || x == num_less_one {
                continue;
            }
            for _ in 1..s {
                x = x.modpow(&two, num);
                if x == num_less_one {
                    continue 'witness;
                }
            }
            return false;
        }
        true
    }
}
