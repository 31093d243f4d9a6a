//! Domain hashing of group elements, strings and integers into Z_q.
//!
//! Every item is rendered as text (elements as upper-case hex, integers in
//! decimal) and fed to Blake2b-512 separated by `|`. Nested sequences are
//! hashed first and contribute the hex of their own digest, so the result is
//! unambiguous with respect to item boundaries.

use crate::group::{ElementModP, ElementModQ};
use blake2::{Blake2b512, Digest};
use num_bigint::BigUint;

/// A single input to [`hash_items`].
#[derive(Clone, Debug)]
pub enum HashItem<'a> {
    P(&'a ElementModP),
    Q(&'a ElementModQ),
    Str(&'a str),
    Int(u64),
    Seq(Vec<HashItem<'a>>),
    Null,
}

impl<'a> HashItem<'a> {
    fn render(&self) -> String {
        match self {
            HashItem::P(p) => p.to_hex(),
            HashItem::Q(q) => q.to_hex(),
            HashItem::Str(s) => s.to_string(),
            HashItem::Int(i) => i.to_string(),
            HashItem::Seq(items) if items.is_empty() => "null".to_string(),
            HashItem::Seq(items) => hash_items(items).to_hex(),
            HashItem::Null => "null".to_string(),
        }
    }
}

impl<'a> From<&'a ElementModP> for HashItem<'a> {
    fn from(p: &'a ElementModP) -> Self {
        HashItem::P(p)
    }
}

impl<'a> From<&'a ElementModQ> for HashItem<'a> {
    fn from(q: &'a ElementModQ) -> Self {
        HashItem::Q(q)
    }
}

impl<'a> From<&'a str> for HashItem<'a> {
    fn from(s: &'a str) -> Self {
        HashItem::Str(s)
    }
}

impl<'a> From<&'a String> for HashItem<'a> {
    fn from(s: &'a String) -> Self {
        HashItem::Str(s.as_str())
    }
}

impl<'a> From<u64> for HashItem<'a> {
    fn from(i: u64) -> Self {
        HashItem::Int(i)
    }
}

impl<'a> From<usize> for HashItem<'a> {
    fn from(i: usize) -> Self {
        HashItem::Int(i as u64)
    }
}

impl<'a> From<&'a [ElementModP]> for HashItem<'a> {
    fn from(elems: &'a [ElementModP]) -> Self {
        HashItem::Seq(elems.iter().map(HashItem::P).collect())
    }
}

impl<'a> From<&'a Vec<ElementModP>> for HashItem<'a> {
    fn from(elems: &'a Vec<ElementModP>) -> Self {
        HashItem::from(elems.as_slice())
    }
}

impl<'a> From<&'a [ElementModQ]> for HashItem<'a> {
    fn from(elems: &'a [ElementModQ]) -> Self {
        HashItem::Seq(elems.iter().map(HashItem::Q).collect())
    }
}

impl<'a> From<&'a Vec<ElementModQ>> for HashItem<'a> {
    fn from(elems: &'a Vec<ElementModQ>) -> Self {
        HashItem::from(elems.as_slice())
    }
}

impl<'a> From<Vec<HashItem<'a>>> for HashItem<'a> {
    fn from(items: Vec<HashItem<'a>>) -> Self {
        HashItem::Seq(items)
    }
}

impl<'a, T> From<Option<T>> for HashItem<'a>
where
    T: Into<HashItem<'a>>,
{
    fn from(item: Option<T>) -> Self {
        item.map_or(HashItem::Null, Into::into)
    }
}

/// Hashes the items into an element of Z_q.
pub fn hash_items(items: &[HashItem<'_>]) -> ElementModQ {
    let hasher = items
        .iter()
        .fold(Blake2b512::new().chain_update("|"), |hasher, item| {
            hasher.chain_update(item.render()).chain_update("|")
        });
    ElementModQ::reduce(BigUint::from_bytes_be(&hasher.finalize()))
}

/// Hashes any mix of group elements, strings and integers into Z_q.
///
/// ```ignore
/// let c = hash_elems!(&header, &pad, &data, "tag", 7u64);
/// ```
#[macro_export]
macro_rules! hash_elems {
    ($($item:expr),* $(,)?) => {
        $crate::hash::hash_items(&[$($crate::hash::HashItem::from($item)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::ElementModQ;
    use crate::helper::Helper;

    #[test]
    fn it_should_hash_deterministically() {
        Helper::setup_test_group();
        let a = ElementModQ::from_u64(1).unwrap();
        let b = ElementModQ::from_u64(2).unwrap();

        assert_eq!(hash_elems!(&a, &b), hash_elems!(&a, &b));
        assert_ne!(hash_elems!(&a, &b), hash_elems!(&b, &a));
        assert!(hash_elems!(&a, "tag", 3u64).is_in_bounds());
    }

    #[test]
    fn it_should_separate_item_boundaries() {
        Helper::setup_test_group();
        assert_ne!(hash_elems!("ab", "c"), hash_elems!("a", "bc"));
        assert_ne!(hash_elems!(12u64), hash_elems!(1u64, 2u64));
    }

    #[test]
    fn it_should_treat_empty_and_missing_alike() {
        Helper::setup_test_group();
        let empty: Vec<ElementModQ> = Vec::new();
        let missing: Option<&ElementModQ> = None;
        assert_eq!(hash_elems!(&empty), hash_elems!(missing));
    }

    #[test]
    fn it_should_hash_nested_sequences() {
        Helper::setup_test_group();
        let elems = vec![ElementModQ::one(), ElementModQ::two()];
        let nested = hash_elems!(&elems);
        let inner = hash_elems!(&elems[0], &elems[1]);
        assert_eq!(nested, hash_elems!(inner.to_hex().as_str()));
    }
}
