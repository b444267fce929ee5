//! C1 — arithmetic in a large prime field ℤ_p and its order-q subgroup.
//!
//! This is kept deliberately separate from the elliptic-curve type used by
//! [`crate::kx`]: Pedersen's commitments live in a multiplicative subgroup of
//! ℤ_p*, the ephemeral key exchange lives on a Ristretto group. Sharing one
//! type for both would hide that distinction and make the VSS soundness
//! argument depend on a group it wasn't written for.

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand_core::{CryptoRng, RngCore};
use std::fmt;
use std::ops::{Add, Mul};

use crate::error::DomainError;

/// The prime-order subgroup of `ℤ_p*` that Pedersen commitments live in.
///
/// `p` is a large prime, `q` divides `p - 1`, and `generator`/`h` both have
/// order `q`. `h`'s discrete log base `generator` must be unknown to every
/// participant (trusted setup assumption, see spec §6 Configuration).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    p: BigUint,
    q: BigUint,
}

impl Field {
    /// Builds a field descriptor, checking `q | (p - 1)`.
    pub fn new(p: BigUint, q: BigUint) -> Result<Self, DomainError> {
        let one = BigUint::one();
        if !(&p - &one).is_multiple_of(&q) {
            return Err(DomainError::NotInSubgroup);
        }
        Ok(Field { p, q })
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    /// Confirms `elem` has order dividing `q`, i.e. `elem^q == 1 (mod p)`.
    pub fn has_order_q(&self, elem: &GroupElement) -> bool {
        elem.0.modpow(&self.q, &self.p).is_one()
    }

    pub fn element(&self, value: BigUint) -> GroupElement {
        GroupElement(value.mod_floor(&self.p))
    }

    pub fn scalar(&self, value: BigUint) -> Scalar {
        Scalar(value.mod_floor(&self.q))
    }

    /// Samples a uniformly random scalar in `[0, q)`.
    pub fn random_scalar<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Scalar {
        Scalar(rng.gen_biguint_below(&self.q))
    }

    pub fn scalar_from_u64(&self, value: u64) -> Scalar {
        Scalar(BigUint::from(value).mod_floor(&self.q))
    }

    pub fn scalar_from_bytes_mod_q(&self, bytes: &[u8]) -> Scalar {
        Scalar(BigUint::from_bytes_be(bytes).mod_floor(&self.q))
    }

    /// `base^exp mod p`.
    pub fn pow(&self, base: &GroupElement, exp: &Scalar) -> GroupElement {
        GroupElement(base.0.modpow(&exp.0, &self.p))
    }

    /// Multiplies group elements in ℤ_p*.
    pub fn mul(&self, a: &GroupElement, b: &GroupElement) -> GroupElement {
        GroupElement((&a.0 * &b.0).mod_floor(&self.p))
    }

    pub fn identity(&self) -> GroupElement {
        GroupElement(BigUint::one())
    }

    /// Modular inverse of `a` in ℤ_q, via the extended Euclidean algorithm.
    /// Fails with [`DomainError::OutOfField`] if `a` is zero.
    pub fn inverse_scalar(&self, a: &Scalar) -> Result<Scalar, DomainError> {
        if a.0.is_zero() {
            return Err(DomainError::OutOfField);
        }
        let (gcd, x) = extended_gcd(a.0.clone(), self.q.clone());
        if !gcd.is_one() {
            return Err(DomainError::OutOfField);
        }
        Ok(Scalar(x.mod_floor(&self.q)))
    }
}

/// An element of the order-q subgroup of ℤ_p*.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GroupElement(BigUint);

impl GroupElement {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn from_bytes(field: &Field, bytes: &[u8]) -> Result<Self, DomainError> {
        let value = BigUint::from_bytes_be(bytes);
        if value >= field.p {
            return Err(DomainError::InvalidEncoding);
        }
        let elem = GroupElement(value);
        if !field.has_order_q(&elem) {
            return Err(DomainError::NotInSubgroup);
        }
        Ok(elem)
    }
}

impl fmt::Display for GroupElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An element of ℤ_q, i.e. a polynomial coefficient or evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Scalar(BigUint);

impl Scalar {
    pub fn zero() -> Self {
        Scalar(BigUint::zero())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn inner(&self) -> &BigUint {
        &self.0
    }
}

impl Add<&Scalar> for &Scalar {
    type Output = Scalar;
    fn add(self, rhs: &Scalar) -> Scalar {
        // Reduction is the caller's responsibility when the modulus matters;
        // `Field` methods always reduce afterwards.
        Scalar(&self.0 + &rhs.0)
    }
}

impl Mul<&Scalar> for &Scalar {
    type Output = Scalar;
    fn mul(self, rhs: &Scalar) -> Scalar {
        Scalar(&self.0 * &rhs.0)
    }
}

/// Extended Euclidean algorithm returning `(gcd, x)` with `a*x ≡ gcd (mod b)`.
fn extended_gcd(a: BigUint, b: BigUint) -> (BigUint, num_bigint::BigInt) {
    use num_bigint::BigInt;
    let (mut old_r, mut r) = (BigInt::from(a), BigInt::from(b));
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    while !r.is_zero() {
        let quotient = &old_r / &r;
        let new_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, new_r);
        let new_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, new_s);
    }
    let gcd = old_r.to_biguint().unwrap_or_else(BigUint::zero);
    (gcd, old_s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_field() -> Field {
        // p = 23 (safe prime, (p-1)/2 = 11 is prime), q = 11.
        Field::new(BigUint::from(23u32), BigUint::from(11u32)).unwrap()
    }

    #[test]
    fn pow_and_mul_roundtrip() {
        let f = small_field();
        let g = f.element(BigUint::from(4u32)); // order 11 element mod 23
        assert!(f.has_order_q(&g));
        let a = f.scalar_from_u64(3);
        let b = f.scalar_from_u64(5);
        let ga = f.pow(&g, &a);
        let gb = f.pow(&g, &b);
        let sum_exp = f.scalar_from_u64(8);
        let expected = f.pow(&g, &sum_exp);
        assert_eq!(f.mul(&ga, &gb), expected);
    }

    #[test]
    fn inverse_scalar_is_multiplicative_identity() {
        let f = small_field();
        let a = f.scalar_from_u64(4);
        let inv = f.inverse_scalar(&a).unwrap();
        let prod = (&a * &inv).0.mod_floor(f.q());
        assert_eq!(prod, BigUint::one());
    }

    #[test]
    fn inverse_of_zero_fails() {
        let f = small_field();
        assert!(f.inverse_scalar(&Scalar::zero()).is_err());
    }
}
