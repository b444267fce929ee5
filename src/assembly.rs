//! C9 — combines qualified members' share points into the group public
//! key and packages per-peer private output (spec §4.3 phases 11-12).

use std::collections::BTreeMap;

use crate::bigmod::{Field, GroupElement, Scalar};
use crate::error::DomainError;
use crate::group::MemberIndex;
use crate::polynomial::interpolate_at_zero;

/// One qualified member's public key share point, in the form the
/// companion threshold-signing protocol consumes (spec §6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyShare {
    pub index: MemberIndex,
    pub value: GroupElement,
}

/// Final output of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DkgOutput {
    pub group_public_key: GroupElement,
    pub final_share: Scalar,
    pub qualified_members: Vec<MemberIndex>,
    pub member_index: MemberIndex,
    /// Every final qualified member's public key share point — the form a
    /// downstream threshold-signing or threshold-decryption primitive
    /// consumes to verify a partial signature/decryption share (spec §6).
    pub public_key_shares: Vec<PublicKeyShare>,
}

/// Packages a combined point map (qualified-direct or reconstructed, same
/// shape `combine_group_public_key` consumes) as the public output type.
pub fn public_key_shares(points: &BTreeMap<MemberIndex, GroupElement>) -> Vec<PublicKeyShare> {
    points
        .iter()
        .map(|(index, value)| PublicKeyShare { index: *index, value: value.clone() })
        .collect()
}

/// Phase 11: reconstructs `(z_m, y_m)` for one disqualified member `m` from
/// at least `threshold + 1` revealed shares, via Lagrange interpolation.
pub fn reconstruct(
    field: &Field,
    generator: &GroupElement,
    revealed_shares: &[(u64, Scalar)],
    recovery_threshold: usize,
) -> Result<(Scalar, GroupElement), DomainError> {
    if revealed_shares.len() < recovery_threshold {
        return Err(DomainError::OutOfField);
    }
    let z_m = interpolate_at_zero(field, &revealed_shares[..recovery_threshold])?;
    let y_m = field.pow(generator, &z_m);
    Ok((z_m, y_m))
}

/// Phase 12: `Y = (∏_{i ∈ Q'} A_{i,0}) · (∏_{m reconstructed} y_m) mod p`,
/// per spec §9(c) (reconstructed contributions are *added*, i.e. multiplied
/// into the product, matching the standard GJKR combination).
pub fn combine_group_public_key(
    field: &Field,
    qualified_zero_points: &BTreeMap<MemberIndex, GroupElement>,
    reconstructed_public_keys: &BTreeMap<MemberIndex, GroupElement>,
) -> GroupElement {
    let mut y = field.identity();
    for point in qualified_zero_points.values() {
        y = field.mul(&y, point);
    }
    for point in reconstructed_public_keys.values() {
        y = field.mul(&y, point);
    }
    y
}

/// Member `i`'s final private share: `x_i = ∑_{j ∈ Q} s_ji mod q`, the sum
/// of every qualified peer's (and the member's own) share sent to `i`.
pub fn final_share(field: &Field, received_shares: &[Scalar]) -> Scalar {
    received_shares
        .iter()
        .fold(Scalar::zero(), |acc, s| field.scalar((&acc + s).inner().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn field() -> Field {
        Field::new(BigUint::from(23u32), BigUint::from(11u32)).unwrap()
    }

    #[test]
    fn reconstruct_recovers_known_secret_and_matches_public_key() {
        let f = field();
        let g = f.element(BigUint::from(4u32));
        // f(x) = 6 + 2x + x^2, f(0) = 6.
        let coeffs = vec![f.scalar_from_u64(6), f.scalar_from_u64(2), f.scalar_from_u64(1)];
        let poly = crate::polynomial::Polynomial::from_coefficients(coeffs);
        let shares: Vec<(u64, Scalar)> = (1..=4)
            .map(|i| (i, poly.evaluate(&f, &f.scalar_from_u64(i))))
            .collect();

        let (z, y) = reconstruct(&f, &g, &shares, 3).unwrap();
        assert_eq!(z, f.scalar_from_u64(6));
        assert_eq!(y, f.pow(&g, &f.scalar_from_u64(6)));
    }

    #[test]
    fn reconstruct_rejects_too_few_shares() {
        let f = field();
        let g = f.element(BigUint::from(4u32));
        let shares = vec![(1u64, f.scalar_from_u64(1)), (2u64, f.scalar_from_u64(2))];
        assert!(reconstruct(&f, &g, &shares, 3).is_err());
    }

    #[test]
    fn combine_multiplies_qualified_and_reconstructed_points() {
        let f = field();
        let g = f.element(BigUint::from(4u32));
        let mut qualified = BTreeMap::new();
        qualified.insert(MemberIndex::new(1).unwrap(), f.pow(&g, &f.scalar_from_u64(3)));
        qualified.insert(MemberIndex::new(2).unwrap(), f.pow(&g, &f.scalar_from_u64(5)));
        let mut reconstructed = BTreeMap::new();
        reconstructed.insert(MemberIndex::new(3).unwrap(), f.pow(&g, &f.scalar_from_u64(2)));

        let y = combine_group_public_key(&f, &qualified, &reconstructed);
        assert_eq!(y, f.pow(&g, &f.scalar_from_u64(10)));
    }
}
