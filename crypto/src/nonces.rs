use crate::group::ElementModQ;
use crate::hash::{hash_items, HashItem};

/// An indexable, deterministic sequence of nonces derived from a seed.
///
/// `nonces.get(i) = H(seed', i)` where `seed'` is the seed, or the seed
/// hashed together with the headers when headers are given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nonces {
    seed: ElementModQ,
}

impl Nonces {
    pub fn new(seed: &ElementModQ) -> Self {
        Nonces { seed: seed.clone() }
    }

    pub fn with_headers(seed: &ElementModQ, headers: &[HashItem<'_>]) -> Self {
        if headers.is_empty() {
            return Self::new(seed);
        }
        let mut items = Vec::with_capacity(headers.len() + 1);
        items.push(HashItem::Q(seed));
        items.extend_from_slice(headers);
        Nonces {
            seed: hash_items(&items),
        }
    }

    pub fn get(&self, index: u64) -> ElementModQ {
        hash_elems!(&self.seed, index)
    }

    /// The nonce at `index`, further bound to `header`.
    pub fn get_with_header(&self, index: u64, header: &str) -> ElementModQ {
        hash_elems!(&self.seed, index, header)
    }

    /// The first `count` nonces.
    pub fn take(&self, count: usize) -> Vec<ElementModQ> {
        (0..count as u64).map(|i| self.get(i)).collect()
    }
}
