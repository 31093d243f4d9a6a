use crate::constants::group;
use crate::error::DiscreteLogError;
use crate::group::{ElementModP, ModuloOperations};
use log::trace;
use num_bigint::BigUint;
use num_traits::One;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Recovers small exponents `m` from `g^m mod P`.
///
/// The table of already visited powers is shared between threads: hits
/// only take a read lock, misses extend the table under the write lock
/// starting from the largest exponent computed so far.
#[derive(Debug)]
pub struct DiscreteLog {
    base: BigUint,
    modulus: BigUint,
    max_exponent: u64,
    state: RwLock<DiscreteLogState>,
}

#[derive(Debug)]
struct DiscreteLogState {
    cache: HashMap<BigUint, u64>,
    last_element: BigUint,
    last_exponent: u64,
}

impl DiscreteLog {
    /// A cache for the generator of the active group.
    pub fn new(max_exponent: u64) -> Self {
        let ctx = group();
        Self::with_base(ctx.g(), ctx.p(), max_exponent)
    }

    pub fn with_base(base: &BigUint, modulus: &BigUint, max_exponent: u64) -> Self {
        let mut cache = HashMap::new();
        cache.insert(BigUint::one(), 0);
        DiscreteLog {
            base: base.clone(),
            modulus: modulus.clone(),
            max_exponent,
            state: RwLock::new(DiscreteLogState {
                cache,
                last_element: BigUint::one(),
                last_exponent: 0,
            }),
        }
    }

    pub fn max_exponent(&self) -> u64 {
        self.max_exponent
    }

    /// Returns the exponent if it has already been computed.
    pub fn cached(&self, element: &ElementModP) -> Option<u64> {
        self.state.read().cache.get(element.value()).copied()
    }

    /// Number of cached powers.
    pub fn len(&self) -> usize {
        self.state.read().cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `m` such that `base^m = element`, searching no further than
    /// the configured bound.
    pub fn discrete_log(&self, element: &ElementModP) -> Result<u64, DiscreteLogError> {
        if let Some(exponent) = self.cached(element) {
            return Ok(exponent);
        }

        let mut guard = self.state.write();
        let state = &mut *guard;
        // another writer may have found it meanwhile
        if let Some(&exponent) = state.cache.get(element.value()) {
            return Ok(exponent);
        }

        let target = element.value();
        while state.last_exponent < self.max_exponent {
            let next = state.last_element.modmul(&self.base, &self.modulus);
            state.last_exponent += 1;
            state.cache.insert(next.clone(), state.last_exponent);
            state.last_element = next;

            if &state.last_element == target {
                trace!("discrete log found at {}", state.last_exponent);
                return Ok(state.last_exponent);
            }
        }
        Err(DiscreteLogError::ExponentNotFound {
            max: self.max_exponent,
        })
    }
}
