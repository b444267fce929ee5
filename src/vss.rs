//! C4 — Pedersen verifiable secret sharing.
//!
//! `commit`/`evaluate`/`verify_share` as specified in spec §4.1. Operates
//! entirely over [`crate::bigmod`]; the curve group used by [`crate::kx`]
//! never appears here.

use crate::bigmod::{Field, GroupElement, Scalar};
use crate::error::DomainError;
use crate::polynomial::powers_of;

/// The pair of generators `(g, h)` of the order-q subgroup, with `h`'s
/// discrete log base `g` assumed unknown to every participant.
#[derive(Clone)]
pub struct CommitmentKey {
    pub g: GroupElement,
    pub h: GroupElement,
}

/// `C_k = g^{a_k} · h^{b_k} mod p` for `k = 0..=threshold`.
pub type CommitmentVector = Vec<GroupElement>;

impl CommitmentKey {
    /// Commits to a coefficient pair `(coefA, coefB)` of matching length.
    /// Fails with [`DomainError::CommitmentLengthMismatch`] if the two
    /// coefficient vectors disagree in length.
    pub fn commit(
        &self,
        field: &Field,
        coef_a: &[Scalar],
        coef_b: &[Scalar],
    ) -> Result<CommitmentVector, DomainError> {
        if coef_a.len() != coef_b.len() {
            return Err(DomainError::CommitmentLengthMismatch {
                expected: coef_a.len(),
                actual: coef_b.len(),
            });
        }
        Ok(coef_a
            .iter()
            .zip(coef_b.iter())
            .map(|(a, b)| {
                let ga = field.pow(&self.g, a);
                let hb = field.pow(&self.h, b);
                field.mul(&ga, &hb)
            })
            .collect())
    }

    /// Checks `g^s · h^t ≡ ∏_k C_k^{j^k} (mod p)`.
    ///
    /// Runs in time linear in the commitment degree: the powers `j^0..j^T`
    /// are computed once via Horner-style repeated multiplication and reused
    /// across every exponentiation.
    pub fn verify_share(
        &self,
        field: &Field,
        j: u64,
        s: &Scalar,
        t: &Scalar,
        commitments: &CommitmentVector,
    ) -> bool {
        let degree = commitments.len().saturating_sub(1);
        let j_scalar = field.scalar_from_u64(j);
        let powers = powers_of(field, &j_scalar, degree);

        let lhs = field.mul(&field.pow(&self.g, s), &field.pow(&self.h, t));

        let rhs = commitments
            .iter()
            .zip(powers.iter())
            .fold(field.identity(), |acc, (c_k, power)| {
                field.mul(&acc, &field.pow(c_k, power))
            });

        lhs == rhs
    }
}

/// Checks `g^s ≡ ∏_k A_k^{j^k} (mod p)`, the phase-8 "dual" of
/// [`CommitmentKey::verify_share`] over the public key share points
/// `A_{i,0..T} = g^{a_{i,k}}` instead of the hiding Pedersen commitments.
pub fn verify_point_share(
    field: &Field,
    g: &GroupElement,
    j: u64,
    s: &Scalar,
    points: &[GroupElement],
) -> bool {
    let degree = points.len().saturating_sub(1);
    let j_scalar = field.scalar_from_u64(j);
    let powers = powers_of(field, &j_scalar, degree);

    let lhs = field.pow(g, s);
    let rhs = points
        .iter()
        .zip(powers.iter())
        .fold(field.identity(), |acc, (a_k, power)| {
            field.mul(&acc, &field.pow(a_k, power))
        });
    lhs == rhs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polynomial::Polynomial;
    use num_bigint::BigUint;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn field() -> Field {
        Field::new(BigUint::from(23u32), BigUint::from(11u32)).unwrap()
    }

    fn ck(field: &Field) -> CommitmentKey {
        // g = 4 (order 11), h = 2 (order 11) mod 23, with unknown relative dlog
        // for test purposes only.
        CommitmentKey {
            g: field.element(BigUint::from(4u32)),
            h: field.element(BigUint::from(2u32)),
        }
    }

    #[test]
    fn honest_share_verifies() {
        let f = field();
        let ck = ck(&f);
        let mut rng = ChaCha20Rng::from_seed([1u8; 32]);
        let pa = Polynomial::random(&f, 2, &mut rng);
        let pb = Polynomial::random(&f, 2, &mut rng);
        let commitments = ck.commit(&f, pa.coefficients(), pb.coefficients()).unwrap();

        for j in 1..=4u64 {
            let s = pa.evaluate(&f, &f.scalar_from_u64(j));
            let t = pb.evaluate(&f, &f.scalar_from_u64(j));
            assert!(ck.verify_share(&f, j, &s, &t, &commitments));
        }
    }

    #[test]
    fn tampered_share_fails() {
        let f = field();
        let ck = ck(&f);
        let mut rng = ChaCha20Rng::from_seed([2u8; 32]);
        let pa = Polynomial::random(&f, 2, &mut rng);
        let pb = Polynomial::random(&f, 2, &mut rng);
        let commitments = ck.commit(&f, pa.coefficients(), pb.coefficients()).unwrap();

        let s = pa.evaluate(&f, &f.scalar_from_u64(1));
        let mut t = pb.evaluate(&f, &f.scalar_from_u64(1));
        t = f.scalar((&t + &f.scalar_from_u64(1)).inner().clone());
        assert!(!ck.verify_share(&f, 1, &s, &t, &commitments));
    }

    #[test]
    fn point_share_check_accepts_honest_points_and_rejects_tampering() {
        let f = field();
        let mut rng = ChaCha20Rng::from_seed([3u8; 32]);
        let pa = Polynomial::random(&f, 2, &mut rng);
        let points: Vec<GroupElement> = pa
            .coefficients()
            .iter()
            .map(|a| f.pow(&f.element(BigUint::from(4u32)), a))
            .collect();
        let g = f.element(BigUint::from(4u32));

        let s = pa.evaluate(&f, &f.scalar_from_u64(2));
        assert!(verify_point_share(&f, &g, 2, &s, &points));

        let bad_s = f.scalar((&s + &f.scalar_from_u64(1)).inner().clone());
        assert!(!verify_point_share(&f, &g, 2, &bad_s, &points));
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let f = field();
        let ck = ck(&f);
        let coef_a = vec![f.scalar_from_u64(1), f.scalar_from_u64(2)];
        let coef_b = vec![f.scalar_from_u64(1)];
        assert!(ck.commit(&f, &coef_a, &coef_b).is_err());
    }
}
