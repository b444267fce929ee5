//! Degree-T polynomials over ℤ_q, and the Lagrange machinery used both by
//! [`crate::vss`] verification and by [`crate::assembly`] reconstruction.

use rand_core::{CryptoRng, RngCore};

use crate::bigmod::{Field, Scalar};
use crate::error::DomainError;

/// `f(x) = a_0 + a_1 x + ... + a_T x^T`, coefficients independently random
/// in ℤ_q except `a_0`, which is the dealer's individual secret.
#[derive(Clone)]
pub struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    /// Samples a fresh degree-`threshold` polynomial with uniformly random
    /// coefficients.
    pub fn random<R: RngCore + CryptoRng>(field: &Field, threshold: usize, rng: &mut R) -> Self {
        let coefficients = (0..=threshold).map(|_| field.random_scalar(rng)).collect();
        Polynomial { coefficients }
    }

    pub fn from_coefficients(coefficients: Vec<Scalar>) -> Self {
        Polynomial { coefficients }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[Scalar] {
        &self.coefficients
    }

    /// The dealer's individual secret, `f(0) = a_0`.
    pub fn at_zero(&self) -> Scalar {
        self.coefficients[0].clone()
    }

    /// Evaluates `f(x)` at `x` via Horner's method, reducing mod q at every step.
    pub fn evaluate(&self, field: &Field, x: &Scalar) -> Scalar {
        let mut acc = Scalar::zero();
        for coeff in self.coefficients.iter().rev() {
            let stepped = field.scalar((&acc * x).inner().clone());
            acc = field.scalar((&stepped + coeff).inner().clone());
        }
        acc
    }
}

/// Computes the powers `j^0, j^1, ..., j^degree` by repeated multiplication
/// (the "Horner-style accumulation" the spec calls for in `verify_share`, so
/// the exponentiations below it can reuse them instead of recomputing `j^k`
/// from scratch for every `k`).
pub fn powers_of(field: &Field, j: &Scalar, degree: usize) -> Vec<Scalar> {
    let mut powers = Vec::with_capacity(degree + 1);
    let mut acc = field.scalar_from_u64(1);
    for _ in 0..=degree {
        powers.push(acc.clone());
        acc = field.scalar((&acc * j).inner().clone());
    }
    powers
}

/// Lagrange coefficient `λ_k = ∏_{k' ≠ k} k' / (k' - k) mod q`, evaluated at
/// `x = 0`, for interpolating a secret from points `indices`.
pub fn lagrange_coefficient_at_zero(
    field: &Field,
    indices: &[u64],
    k: u64,
) -> Result<Scalar, DomainError> {
    let mut numerator = field.scalar_from_u64(1);
    let mut denominator = field.scalar_from_u64(1);
    for &k_prime in indices {
        if k_prime == k {
            continue;
        }
        numerator = field.scalar((&numerator * &field.scalar_from_u64(k_prime)).inner().clone());
        let diff = sub_mod(field, &field.scalar_from_u64(k_prime), &field.scalar_from_u64(k));
        denominator = field.scalar((&denominator * &diff).inner().clone());
    }
    let inv_denominator = field.inverse_scalar(&denominator)?;
    Ok(field.scalar((&numerator * &inv_denominator).inner().clone()))
}

fn sub_mod(field: &Field, a: &Scalar, b: &Scalar) -> Scalar {
    // a - b mod q, computed via the field's own modulus by adding q until non-negative.
    let q = field.q();
    let a_big = a.inner();
    let b_big = b.inner();
    if a_big >= b_big {
        field.scalar(a_big - b_big)
    } else {
        field.scalar(q + a_big - b_big)
    }
}

/// Reconstructs `f(0)` from at least `threshold + 1` revealed shares via
/// Lagrange interpolation, per spec §4.3 phase 11.
pub fn interpolate_at_zero(
    field: &Field,
    shares: &[(u64, Scalar)],
) -> Result<Scalar, DomainError> {
    let indices: Vec<u64> = shares.iter().map(|(idx, _)| *idx).collect();
    let mut acc = Scalar::zero();
    for (idx, share) in shares {
        let lambda = lagrange_coefficient_at_zero(field, &indices, *idx)?;
        let term = field.scalar((&lambda * share).inner().clone());
        acc = field.scalar((&acc + &term).inner().clone());
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn field() -> Field {
        Field::new(BigUint::from(23u32), BigUint::from(11u32)).unwrap()
    }

    #[test]
    fn evaluate_matches_direct_computation() {
        let f = field();
        // f(x) = 2 + 3x + x^2
        let poly = Polynomial::from_coefficients(vec![
            f.scalar_from_u64(2),
            f.scalar_from_u64(3),
            f.scalar_from_u64(1),
        ]);
        let got = poly.evaluate(&f, &f.scalar_from_u64(4));
        // 2 + 12 + 16 = 30 mod 11 = 8
        assert_eq!(got, f.scalar_from_u64(8));
    }

    #[test]
    fn lagrange_reconstructs_secret() {
        let f = field();
        let mut rng = ChaCha20Rng::from_seed([7u8; 32]);
        let poly = Polynomial::random(&f, 2, &mut rng);
        let secret = poly.at_zero();

        let shares: Vec<(u64, _)> = (1..=4)
            .map(|i| (i, poly.evaluate(&f, &f.scalar_from_u64(i))))
            .collect();
        // Any 3 of the 4 shares (threshold + 1 = 3) must reconstruct the secret.
        let reconstructed = interpolate_at_zero(&f, &shares[0..3]).unwrap();
        assert_eq!(reconstructed, secret);
        let reconstructed2 = interpolate_at_zero(&f, &shares[1..4]).unwrap();
        assert_eq!(reconstructed2, secret);
    }
}
