//! Immutable per-run configuration: [`PublicParameters`] (spec §3) and the
//! startup validation spec §6 requires (`q | p-1`, `g`/`h` both of order `q`).

use num_bigint::BigUint;

use crate::bigmod::Field;
use crate::error::DomainError;
use crate::vss::CommitmentKey;

/// Immutable parameters shared by every member of one run.
#[derive(Clone)]
pub struct PublicParameters {
    pub field: Field,
    pub commitment_key: CommitmentKey,
    /// `N`: group size.
    pub group_size: usize,
    /// `T`: dishonest threshold. Honest threshold is `N - T`, recovery
    /// threshold is `T + 1`.
    pub dishonest_threshold: usize,
    /// Per-phase timeout, expressed in chain blocks.
    pub phase_deadline_blocks: u64,
}

impl PublicParameters {
    /// Validates the algebraic and cardinality invariants from spec §6:
    /// `2T + 1 <= N`, `q | p - 1`, and both generators have order `q`.
    pub fn new(
        p: BigUint,
        q: BigUint,
        g: BigUint,
        h: BigUint,
        group_size: usize,
        dishonest_threshold: usize,
        phase_deadline_blocks: u64,
    ) -> Result<Self, DomainError> {
        if group_size < 3 {
            return Err(DomainError::OutOfField);
        }
        if 2 * dishonest_threshold + 1 > group_size {
            return Err(DomainError::OutOfField);
        }
        let field = Field::new(p, q)?;
        let g = field.element(g);
        let h = field.element(h);
        if !field.has_order_q(&g) || !field.has_order_q(&h) {
            return Err(DomainError::NotInSubgroup);
        }
        Ok(PublicParameters {
            field,
            commitment_key: CommitmentKey { g, h },
            group_size,
            dishonest_threshold,
            phase_deadline_blocks,
        })
    }

    /// `T + 1`: the number of shares needed to reconstruct a disqualified
    /// member's secret, and the minimum size of `Q` at phase 6 entry.
    pub fn recovery_threshold(&self) -> usize {
        self.dishonest_threshold + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_generator_outside_subgroup() {
        // p = 23, q = 11; 3 has order 22 (a generator of the whole group,
        // not the order-11 subgroup), so it must be rejected.
        let params = PublicParameters::new(
            BigUint::from(23u32),
            BigUint::from(11u32),
            BigUint::from(3u32),
            BigUint::from(4u32),
            5,
            2,
            10,
        );
        assert!(params.is_err());
    }

    #[test]
    fn rejects_threshold_violating_2t_plus_1() {
        let params = PublicParameters::new(
            BigUint::from(23u32),
            BigUint::from(11u32),
            BigUint::from(4u32),
            BigUint::from(2u32),
            5,
            3, // 2*3+1 = 7 > 5
            10,
        );
        assert!(params.is_err());
    }

    #[test]
    fn accepts_valid_parameters() {
        let params = PublicParameters::new(
            BigUint::from(23u32),
            BigUint::from(11u32),
            BigUint::from(4u32),
            BigUint::from(2u32),
            5,
            2,
            10,
        );
        assert!(params.is_ok());
        assert_eq!(params.unwrap().recovery_threshold(), 3);
    }
}
