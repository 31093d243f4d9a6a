use crate::constants::group;
use crate::error::GroupError;
use std::ops::{Add, Mul, Sub};
use num_bigint::{BigInt, BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::Rng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub trait ModuloOperations {
    /// Calculates the modular multiplicative of a BigUint: result = self * rhs % modulus.
    fn modmul(&self, rhs: &Self, modulus: &Self) -> Self;

    /// Calculates the modular division of two BigUints: result = self / divisor % modulus.
    fn moddiv(&self, divisor: &Self, modulus: &Self) -> Option<BigUint>;

    /// Calculates the modular addition of two BigUints: result = (self + other) % modulus.
    fn modadd(&self, other: &Self, modulus: &Self) -> Self;

    /// Calculates the modular subtraction of two BigUints: result = ((self + modulus) - other) % modulus.
    fn modsub(&self, other: &Self, modulus: &Self) -> Self;

    /// Calculates the modular multiplicative inverse x of an integer a such that ax ≡ 1 (mod m).
    fn invmod(&self, modulus: &Self) -> Option<BigUint>;
}

impl ModuloOperations for BigUint {
    fn modmul(&self, multiplier: &Self, modulus: &Self) -> Self {
        assert!(
            !modulus.is_zero(),
            "attempt to calculate with zero modulus!"
        );
        self.mul(multiplier) % modulus
    }

    fn moddiv(&self, divisor: &Self, modulus: &Self) -> Option<BigUint> {
        assert!(
            !modulus.is_zero(),
            "attempt to calculate with zero modulus!"
        );
        assert!(
            divisor < modulus,
            "modulus must be greater than the divisor!"
        );
        assert!(self < modulus, "modulus must be greater than the dividend!");
        divisor
            .invmod(modulus)
            .map(|inverse| self.mul(&inverse) % modulus)
    }

    fn modadd(&self, other: &Self, modulus: &Self) -> Self {
        assert!(
            !modulus.is_zero(),
            "attempt to calculate with zero modulus!"
        );
        self.add(other) % modulus
    }

    fn modsub(&self, other: &Self, modulus: &Self) -> Self {
        assert!(
            !modulus.is_zero(),
            "attempt to calculate with zero modulus!"
        );
        // shift by the whole modulus so the difference never underflows
        (self % modulus).add(modulus).sub(other % modulus) % modulus
    }

    fn invmod(&self, modulus: &Self) -> Option<BigUint> {
        assert!(
            !modulus.is_zero(),
            "attempt to calculate with zero modulus!"
        );
        assert!(
            self < modulus,
            "modulus must be greater or equal to the number!"
        );
        let a = BigInt::from(self.clone());
        let m = BigInt::from(modulus.clone());

        let (g, x) = extended_gcd(&a, &m);
        if g != BigInt::one() {
            None
        } else {
            (((x % &m) + &m) % &m).to_biguint()
        }
    }
}

/// Returns (gcd(a, b), x) such that a*x ≡ gcd(a, b) (mod b).
fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }
    (old_r, old_s)
}

/// An element of the exponent field Z_q.
///
/// Values are always in `[0, Q)` for the group that was active when they
/// were built. Construction from outside the crate is range checked and
/// never reduces silently.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementModQ(BigUint);

/// An element of Z_p^*. Values are in `[0, P)`; subgroup membership is
/// checked separately with [`ElementModP::is_valid_residue`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementModP(BigUint);

impl ElementModQ {
    /// Returns the element if `value < Q`.
    pub fn new(value: BigUint) -> Result<Self, GroupError> {
        if &value < group().q() {
            Ok(ElementModQ(value))
        } else {
            Err(GroupError::OutOfBounds {
                value: format!("{:X}", value),
                modulus: "Q",
            })
        }
    }

    /// Returns the element if `0 < value < Q`.
    pub fn new_no_zero(value: BigUint) -> Result<Self, GroupError> {
        if value.is_zero() {
            return Err(GroupError::ZeroElement);
        }
        Self::new(value)
    }

    pub fn from_u64(value: u64) -> Result<Self, GroupError> {
        Self::new(BigUint::from(value))
    }

    pub fn from_hex(hex: &str) -> Result<Self, GroupError> {
        Self::new(parse_hex(hex)?)
    }

    /// Reduces an arbitrary integer mod Q. Only used for values that are
    /// reduced by construction, such as hash digests.
    pub(crate) fn reduce(value: BigUint) -> Self {
        ElementModQ(value % group().q())
    }

    pub fn zero() -> Self {
        ElementModQ(BigUint::zero())
    }

    pub fn one() -> Self {
        ElementModQ(BigUint::one())
    }

    pub fn two() -> Self {
        ElementModQ(BigUint::from(2u32))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_in_bounds(&self) -> bool {
        &self.0 < group().q()
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("{:X}", self.0)
    }
}

impl ElementModP {
    /// Returns the element if `value < P`.
    pub fn new(value: BigUint) -> Result<Self, GroupError> {
        if &value < group().p() {
            Ok(ElementModP(value))
        } else {
            Err(GroupError::OutOfBounds {
                value: format!("{:X}", value),
                modulus: "P",
            })
        }
    }

    /// Returns the element if `0 < value < P`.
    pub fn new_no_zero(value: BigUint) -> Result<Self, GroupError> {
        if value.is_zero() {
            return Err(GroupError::ZeroElement);
        }
        Self::new(value)
    }

    pub fn from_u64(value: u64) -> Result<Self, GroupError> {
        Self::new(BigUint::from(value))
    }

    pub fn from_hex(hex: &str) -> Result<Self, GroupError> {
        Self::new(parse_hex(hex)?)
    }

    pub(crate) fn from_reduced(value: BigUint) -> Self {
        ElementModP(value)
    }

    pub fn one() -> Self {
        ElementModP(BigUint::one())
    }

    /// Returns the group generator g.
    pub fn generator() -> Self {
        ElementModP(group().g().clone())
    }

    pub fn is_in_bounds(&self) -> bool {
        &self.0 < group().p()
    }

    /// Checks that the element lies in the order-Q subgroup: `0 < x < P` and `x^Q = 1`.
    pub fn is_valid_residue(&self) -> bool {
        let ctx = group();
        !self.0.is_zero() && &self.0 < ctx.p() && self.0.modpow(ctx.q(), ctx.p()).is_one()
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("{:X}", self.0)
    }
}

fn parse_hex(hex: &str) -> Result<BigUint, GroupError> {
    let digits = hex.trim_start_matches("0x").trim_start_matches("0X");
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| GroupError::MalformedHex(hex.to_string()))
}

macro_rules! element_formatting {
    ($element:ident) => {
        impl fmt::Debug for $element {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:X})", stringify!($element), self.0)
            }
        }

        impl fmt::Display for $element {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:X}", self.0)
            }
        }

        impl Serialize for $element {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $element {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let hex = String::deserialize(deserializer)?;
                $element::from_hex(&hex).map_err(de::Error::custom)
            }
        }
    };
}

element_formatting!(ElementModQ);
element_formatting!(ElementModP);

/// Returns the sum of all elements mod Q.
pub fn add_q(elems: &[&ElementModQ]) -> ElementModQ {
    let ctx = group();
    let q = ctx.q();
    let sum = elems
        .iter()
        .fold(BigUint::zero(), |acc, elem| acc.modadd(&elem.0, q));
    ElementModQ(sum)
}

/// Returns (a - b) mod Q.
pub fn a_minus_b_q(a: &ElementModQ, b: &ElementModQ) -> ElementModQ {
    ElementModQ(a.0.modsub(&b.0, group().q()))
}

/// Returns (a + b * c) mod Q.
pub fn a_plus_bc_q(a: &ElementModQ, b: &ElementModQ, c: &ElementModQ) -> ElementModQ {
    let ctx = group();
    let q = ctx.q();
    ElementModQ(b.0.modmul(&c.0, q).modadd(&a.0, q))
}

/// Returns (Q - a) mod Q.
pub fn negate_q(a: &ElementModQ) -> ElementModQ {
    ElementModQ(BigUint::zero().modsub(&a.0, group().q()))
}

/// Returns the product of all elements mod Q.
pub fn mult_q(elems: &[&ElementModQ]) -> ElementModQ {
    let ctx = group();
    let q = ctx.q();
    let product = elems
        .iter()
        .fold(BigUint::one(), |acc, elem| acc.modmul(&elem.0, q));
    ElementModQ(product)
}

/// Returns a / b mod Q.
pub fn div_q(a: &ElementModQ, b: &ElementModQ) -> Result<ElementModQ, GroupError> {
    a.0.moddiv(&b.0, group().q())
        .map(ElementModQ)
        .ok_or_else(|| GroupError::NoInverse(b.to_hex()))
}

/// Returns base^exponent mod Q.
pub fn pow_q(base: &ElementModQ, exponent: &BigUint) -> ElementModQ {
    ElementModQ(base.0.modpow(exponent, group().q()))
}

/// Returns the product of all elements mod P.
pub fn mult_p(elems: &[&ElementModP]) -> ElementModP {
    let ctx = group();
    let p = ctx.p();
    let product = elems
        .iter()
        .fold(BigUint::one(), |acc, elem| acc.modmul(&elem.0, p));
    ElementModP(product)
}

/// Returns a / b mod P.
pub fn div_p(a: &ElementModP, b: &ElementModP) -> Result<ElementModP, GroupError> {
    a.0.moddiv(&b.0, group().p())
        .map(ElementModP)
        .ok_or_else(|| GroupError::NoInverse(b.to_hex()))
}

/// Returns a^-1 mod P.
pub fn mult_inv_p(a: &ElementModP) -> Result<ElementModP, GroupError> {
    a.0.invmod(group().p())
        .map(ElementModP)
        .ok_or_else(|| GroupError::NoInverse(a.to_hex()))
}

/// Returns base^exponent mod P.
pub fn pow_p(base: &ElementModP, exponent: &ElementModQ) -> ElementModP {
    ElementModP(base.0.modpow(&exponent.0, group().p()))
}

/// Returns g^exponent mod P using the fixed-base table of the active group.
pub fn g_pow_p(exponent: &ElementModQ) -> ElementModP {
    ElementModP(group().g_pow(&exponent.0))
}

/// Returns a uniformly random element of [0, Q).
pub fn rand_q() -> ElementModQ {
    rand_q_with(&mut rand::thread_rng())
}

/// Returns a uniformly random element of [0, Q) drawn from `rng`.
pub fn rand_q_with<R: Rng + ?Sized>(rng: &mut R) -> ElementModQ {
    ElementModQ(rng.gen_biguint_below(group().q()))
}

/// Returns a uniformly random element of (0, Q).
pub fn rand_q_no_zero() -> ElementModQ {
    rand_range_q(&ElementModQ::one())
}

/// Returns a uniformly random element of [start, Q).
pub fn rand_range_q(start: &ElementModQ) -> ElementModQ {
    rand_range_q_with(&mut rand::thread_rng(), start)
}

/// Returns a uniformly random element of [start, Q) drawn from `rng`.
pub fn rand_range_q_with<R: Rng + ?Sized>(rng: &mut R, start: &ElementModQ) -> ElementModQ {
    ElementModQ(rng.gen_biguint_range(&start.0, group().q()))
}
