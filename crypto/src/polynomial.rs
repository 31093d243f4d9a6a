use crate::encryption::ElGamalKeyPair;
use crate::error::PolynomialError;
use crate::group::{
    a_minus_b_q, a_plus_bc_q, div_q, g_pow_p, mult_p, mult_q, pow_p, rand_q_with,
    rand_range_q_with, ElementModP, ElementModQ,
};
use crate::proofs::SchnorrProof;
use crate::random::Random;
use num_bigint::BigUint;
use rand::Rng;
use std::collections::BTreeSet;

/// A polynomial coefficient a_i with its commitment K_i = g^a_i and a proof of knowledge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coefficient {
    pub value: ElementModQ,
    pub commitment: ElementModP,
    pub proof: SchnorrProof,
}

/// The secret sharing polynomial P(x) = sum a_i x^i of one guardian.
///
/// The constant term a_0 is the guardian's election secret key. Never
/// serialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectionPolynomial {
    pub coefficients: Vec<Coefficient>,
}

impl ElectionPolynomial {
    /// Generates a polynomial with `number_of_coefficients` random coefficients.
    ///
    /// With a seed the polynomial is a deterministic function of it.
    pub fn generate(number_of_coefficients: usize, seed: Option<&ElementModQ>) -> Self {
        match seed {
            Some(seed) => Self::generate_with(&mut Random::seeded(seed), number_of_coefficients),
            None => Self::generate_with(&mut rand::thread_rng(), number_of_coefficients),
        }
    }

    fn generate_with<R: Rng>(rng: &mut R, number_of_coefficients: usize) -> Self {
        let two = ElementModQ::two();
        let coefficients = (0..number_of_coefficients)
            .map(|_| {
                let value = rand_range_q_with(rng, &two);
                let keypair = ElGamalKeyPair {
                    public_key: g_pow_p(&value),
                    secret_key: value,
                };
                let proof = SchnorrProof::generate(&keypair, &rand_q_with(rng));
                Coefficient {
                    value: keypair.secret_key,
                    commitment: keypair.public_key,
                    proof,
                }
            })
            .collect();
        ElectionPolynomial { coefficients }
    }

    /// The constant term a_0.
    pub fn secret(&self) -> Option<&ElementModQ> {
        self.coefficients.first().map(|c| &c.value)
    }

    pub fn commitments(&self) -> Vec<ElementModP> {
        self.coefficients.iter().map(|c| c.commitment.clone()).collect()
    }

    pub fn proofs(&self) -> Vec<SchnorrProof> {
        self.coefficients.iter().map(|c| c.proof.clone()).collect()
    }

    /// Evaluates P(x) mod q.
    pub fn compute_coordinate(&self, exponent_modifier: u64) -> ElementModQ {
        compute_polynomial_coordinate(exponent_modifier, self)
    }
}

/// Evaluates the polynomial at `exponent_modifier` with Horner's rule.
pub fn compute_polynomial_coordinate(exponent_modifier: u64, polynomial: &ElectionPolynomial) -> ElementModQ {
    let x = ElementModQ::reduce(BigUint::from(exponent_modifier));
    polynomial
        .coefficients
        .iter()
        .rev()
        .fold(ElementModQ::zero(), |acc, coefficient| {
            a_plus_bc_q(&coefficient.value, &acc, &x)
        })
}

/// Checks a coordinate against the commitments: g^P(x) == prod K_i^(x^i).
pub fn verify_polynomial_coordinate(
    coordinate: &ElementModQ,
    exponent_modifier: u64,
    commitments: &[ElementModP],
) -> bool {
    g_pow_p(coordinate) == commitment_product(exponent_modifier, commitments)
}

/// prod K_i^(x^i), the public image g^P(x) of a coordinate.
pub(crate) fn commitment_product(exponent_modifier: u64, commitments: &[ElementModP]) -> ElementModP {
    let x = ElementModQ::reduce(BigUint::from(exponent_modifier));
    let mut x_pow_i = ElementModQ::one();
    let mut product = ElementModP::one();
    for commitment in commitments {
        product = mult_p(&[&product, &pow_p(commitment, &x_pow_i)]);
        x_pow_i = mult_q(&[&x_pow_i, &x]);
    }
    product
}

/// Computes the Lagrange coefficient λ_i = prod j / (j - i) over the other degrees.
///
/// ## Arguments
///
/// * `coordinate` - the coordinate i the coefficient belongs to
/// * `degrees`    - the coordinates of all participants, `coordinate` itself is skipped
pub fn compute_lagrange_coefficient(coordinate: u64, degrees: &[u64]) -> Result<ElementModQ, PolynomialError> {
    if coordinate == 0 {
        return Err(PolynomialError::ZeroCoordinate);
    }
    let mut seen = BTreeSet::new();
    let i = ElementModQ::reduce(BigUint::from(coordinate));
    let mut numerator = ElementModQ::one();
    let mut denominator = ElementModQ::one();

    for &degree in degrees.iter().filter(|&&degree| degree != coordinate) {
        if degree == 0 {
            return Err(PolynomialError::ZeroCoordinate);
        }
        if !seen.insert(degree) {
            return Err(PolynomialError::DuplicateCoordinate(degree));
        }
        let j = ElementModQ::reduce(BigUint::from(degree));
        numerator = mult_q(&[&numerator, &j]);
        denominator = mult_q(&[&denominator, &a_minus_b_q(&j, &i)]);
    }
    div_q(&numerator, &denominator).map_err(|_| PolynomialError::DuplicateCoordinate(coordinate))
}

/// Recovers P(0) from at least `quorum` coordinates (x, P(x)).
pub fn reconstruct_constant_term(
    coordinates: &[(u64, ElementModQ)],
    quorum: usize,
) -> Result<ElementModQ, PolynomialError> {
    if coordinates.len() < quorum {
        return Err(PolynomialError::InsufficientCoordinates {
            needed: quorum,
            found: coordinates.len(),
        });
    }
    let degrees: Vec<u64> = coordinates.iter().map(|(x, _)| *x).collect();
    let mut unique = BTreeSet::new();
    for &x in &degrees {
        if !unique.insert(x) {
            return Err(PolynomialError::DuplicateCoordinate(x));
        }
    }

    coordinates
        .iter()
        .try_fold(ElementModQ::zero(), |acc, (x, value)| {
            let lagrange = compute_lagrange_coefficient(*x, &degrees)?;
            Ok(a_plus_bc_q(&acc, &lagrange, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::add_q;
    use crate::helper::Helper;

    #[test]
    fn it_should_generate_a_polynomial_with_valid_proofs() {
        Helper::setup_test_group();
        let polynomial = ElectionPolynomial::generate(3, None);

        assert_eq!(polynomial.coefficients.len(), 3);
        for coefficient in &polynomial.coefficients {
            assert_eq!(coefficient.commitment, g_pow_p(&coefficient.value));
            assert!(coefficient.proof.verify());
        }
    }

    #[test]
    fn it_should_generate_deterministically_from_a_seed() {
        Helper::setup_test_group();
        let seed = ElementModQ::from_u64(99).unwrap();
        assert_eq!(
            ElectionPolynomial::generate(2, Some(&seed)),
            ElectionPolynomial::generate(2, Some(&seed))
        );
    }

    #[test]
    fn it_should_compute_and_verify_coordinates() {
        Helper::setup_test_group();
        let polynomial = ElectionPolynomial::generate(3, None);
        let commitments = polynomial.commitments();

        for x in 1..=5u64 {
            let coordinate = polynomial.compute_coordinate(x);
            assert!(verify_polynomial_coordinate(&coordinate, x, &commitments));
            let wrong = add_q(&[&coordinate, &ElementModQ::one()]);
            assert!(!verify_polynomial_coordinate(&wrong, x, &commitments));
        }
        // P(0) = a_0
        assert_eq!(Some(&polynomial.compute_coordinate(0)), polynomial.secret());
    }

    #[test]
    fn it_should_compute_lagrange_coefficients() {
        Helper::setup_test_group();
        // For {1, 2}: λ_1 = 2 / (2 - 1) = 2, λ_2 = 1 / (1 - 2) = -1
        let degrees = [1u64, 2];
        assert_eq!(compute_lagrange_coefficient(1, &degrees), Ok(ElementModQ::two()));
        let minus_one = a_minus_b_q(&ElementModQ::zero(), &ElementModQ::one());
        assert_eq!(compute_lagrange_coefficient(2, &degrees), Ok(minus_one));

        assert_eq!(
            compute_lagrange_coefficient(1, &[2, 3, 3]),
            Err(PolynomialError::DuplicateCoordinate(3))
        );
        assert_eq!(compute_lagrange_coefficient(0, &[1]), Err(PolynomialError::ZeroCoordinate));
    }

    #[test]
    fn it_should_reconstruct_the_secret_from_any_quorum() {
        Helper::setup_test_group();
        let polynomial = ElectionPolynomial::generate(3, None);
        let secret = polynomial.secret().unwrap().clone();

        for subset in [[1u64, 2, 3], [2, 4, 5], [1, 3, 5]] {
            let coordinates: Vec<(u64, ElementModQ)> = subset
                .iter()
                .map(|&x| (x, polynomial.compute_coordinate(x)))
                .collect();
            assert_eq!(reconstruct_constant_term(&coordinates, 3), Ok(secret.clone()));
        }
    }

    #[test]
    fn it_should_not_reconstruct_below_quorum() {
        Helper::setup_test_group();
        let polynomial = ElectionPolynomial::generate(3, None);
        let coordinates = vec![(1, polynomial.compute_coordinate(1)), (2, polynomial.compute_coordinate(2))];

        assert_eq!(
            reconstruct_constant_term(&coordinates, 3),
            Err(PolynomialError::InsufficientCoordinates { needed: 3, found: 2 })
        );
        // two points of a quadratic interpolate to the wrong constant
        let guess = reconstruct_constant_term(&coordinates, 2).unwrap();
        assert_ne!(Some(&guess), polynomial.secret());
    }
}
