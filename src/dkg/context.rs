//! `MemberContext` — one member's entire view of one run, plus a `Phase`
//! tag. Per spec §9's design note this replaces the teacher's layered,
//! embedded typestate structs (`MemberState1` containing the seed for
//! `MemberState2`, and so on): there is exactly one value, and phase
//! transitions are methods on it. No cycle, no virtual dispatch.

use std::collections::BTreeMap;

use zeroize::Zeroize;

use crate::aead::Sealed;
use crate::bigmod::{GroupElement, Scalar};
use crate::clock::{CancellationToken, PhaseClock};
use crate::error::ProtocolError;
use crate::group::{DisqualificationLedger, GroupId, MemberIndex, Roster, RunId};
use crate::kx::{EphemeralPublicKey, EphemeralSecretKey, SymmetricKey};
use crate::params::PublicParameters;
use crate::polynomial::Polynomial;
use crate::vss::CommitmentVector;

/// The twelve protocol phases plus the two terminals (spec §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    EphemeralKeyGen,
    SymmetricKeyDerive,
    Commit,
    CommitmentVerify,
    SharesJustify,
    Qualify,
    PublicKeyShare,
    PublicKeyShareVerify,
    PointsJustify,
    DisqualifiedShareReveal,
    Reconstruct,
    Combine,
    Done,
    Aborted,
}

impl Phase {
    /// 1-indexed tag used on the wire and by the phase clock/bus, matching
    /// spec §4.3's numbering. `Done`/`Aborted` carry no wire tag.
    pub fn tag(self) -> Option<u8> {
        use Phase::*;
        match self {
            EphemeralKeyGen => Some(1),
            SymmetricKeyDerive => Some(2),
            Commit => Some(3),
            CommitmentVerify => Some(4),
            SharesJustify => Some(5),
            Qualify => Some(6),
            PublicKeyShare => Some(7),
            PublicKeyShareVerify => Some(8),
            PointsJustify => Some(9),
            DisqualifiedShareReveal => Some(10),
            Reconstruct => Some(11),
            Combine => Some(12),
            Done | Aborted => None,
        }
    }
}

/// A share pair received from (or, for `i == j`, evaluated by) one peer,
/// together with whether it passed `verify_share`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedShare {
    pub s: Scalar,
    pub t: Scalar,
    pub valid: bool,
}

/// Secret material scoped to one run: ephemeral private keys, derived
/// symmetric keys, and this member's own polynomial coefficients. Zeroized
/// on both the `Done` and `Aborted` paths (spec §5 "Shared resources").
#[derive(Default)]
pub struct SecretMaterial {
    pub ephemeral_secrets: BTreeMap<MemberIndex, EphemeralSecretKey>,
    pub symmetric_keys: BTreeMap<MemberIndex, SymmetricKey>,
    pub poly_a: Option<Polynomial>,
    pub poly_b: Option<Polynomial>,
}

impl SecretMaterial {
    /// Test-only inspector for spec §8 property 7: true iff every secret
    /// buffer has already been zeroized.
    #[cfg(test)]
    pub fn all_zeroized(&self) -> bool {
        self.ephemeral_secrets.is_empty()
            && self.symmetric_keys.is_empty()
            && self.poly_a.is_none()
            && self.poly_b.is_none()
    }

    pub fn clear(&mut self) {
        // EphemeralSecretKey/SymmetricKey zeroize on Drop; clearing the
        // maps drops every entry. Polynomial coefficients are `bigmod::Scalar`
        // values without a Zeroize impl of their own (arbitrary-precision,
        // heap-backed), so we scrub their backing bytes best-effort before
        // dropping the polynomials themselves.
        self.ephemeral_secrets.clear();
        self.symmetric_keys.clear();
        if let Some(poly) = self.poly_a.take() {
            scrub_polynomial(poly);
        }
        if let Some(poly) = self.poly_b.take() {
            scrub_polynomial(poly);
        }
    }
}

fn scrub_polynomial(poly: Polynomial) {
    for coeff in poly.coefficients() {
        let mut bytes = coeff.to_bytes();
        bytes.zeroize();
    }
}

/// One member's complete state for one run.
pub struct MemberContext {
    pub params: PublicParameters,
    pub run_id: RunId,
    pub roster: Roster,
    pub my_index: MemberIndex,
    pub phase_clock: PhaseClock,
    pub cancellation: CancellationToken,
    pub phase: Phase,

    pub secrets: SecretMaterial,

    // Public state, accumulated phase by phase.
    pub ephemeral_public_keys: BTreeMap<MemberIndex, EphemeralPublicKey>,
    /// Our own ephemeral public key halves, keyed by the peer they were sent
    /// to — kept so a phase-5/9 justification can be cross-checked by the
    /// accuser against what was actually broadcast to it in phase 1.
    pub my_ephemeral_public_keys: BTreeMap<MemberIndex, EphemeralPublicKey>,
    pub commitments: BTreeMap<MemberIndex, CommitmentVector>,
    pub received_shares: BTreeMap<MemberIndex, ReceivedShare>,
    pub own_encrypted_shares: BTreeMap<MemberIndex, Sealed>,
    /// Ciphertexts addressed to us in phase 3, awaiting phase-4 decryption.
    pub pending_encrypted_shares: BTreeMap<MemberIndex, Sealed>,
    pub ledger: DisqualificationLedger,
    /// Accusations raised in phase 4, awaiting phase-5 adjudication.
    pub pending_accusations_phase5: Vec<(MemberIndex, MemberIndex)>,
    /// Accusations raised in phase 8, awaiting phase-9 adjudication.
    pub pending_accusations_phase9: Vec<(MemberIndex, MemberIndex)>,
    pub resolved_accusations_phase5: std::collections::BTreeSet<(MemberIndex, MemberIndex)>,
    pub resolved_accusations_phase9: std::collections::BTreeSet<(MemberIndex, MemberIndex)>,
    pub public_share_points: BTreeMap<MemberIndex, Vec<GroupElement>>,
    pub revealed_shares: BTreeMap<MemberIndex, Vec<(u64, Scalar)>>,
    pub reconstructed_public_keys: BTreeMap<MemberIndex, GroupElement>,
    pub qualified_at_phase6: std::collections::BTreeSet<MemberIndex>,
    /// Every final member's public key share point, qualified-direct or
    /// reconstructed — the union phase 12 combines into the group key.
    pub final_public_key_shares: BTreeMap<MemberIndex, GroupElement>,
    pub final_public_key: Option<GroupElement>,
    pub final_share: Option<Scalar>,
}

impl MemberContext {
    /// Builds one member's initial context. Rejects `my_index` if it isn't
    /// in `roster` (spec §6 "Run identity" assumes every participant is a
    /// roster member before a run starts); the roster's cardinality is
    /// checked against `params.group_size` the same way the teacher's
    /// `Environment::init` asserts its own committee-size invariants.
    pub fn new(
        params: PublicParameters,
        group_id: GroupId,
        run_nonce: u64,
        roster: Roster,
        my_index: MemberIndex,
        start_block: u64,
    ) -> Result<Self, ProtocolError> {
        assert_eq!(
            roster.size(),
            params.group_size,
            "roster size does not match the declared group size"
        );
        if !roster.contains(my_index) {
            return Err(ProtocolError::UnknownMember(my_index));
        }
        let phase_clock = PhaseClock::new(start_block, params.phase_deadline_blocks);
        Ok(MemberContext {
            params,
            run_id: RunId { group_id, run_nonce },
            roster,
            my_index,
            phase_clock,
            cancellation: CancellationToken::new(),
            phase: Phase::EphemeralKeyGen,
            secrets: SecretMaterial::default(),
            ephemeral_public_keys: BTreeMap::new(),
            my_ephemeral_public_keys: BTreeMap::new(),
            commitments: BTreeMap::new(),
            received_shares: BTreeMap::new(),
            own_encrypted_shares: BTreeMap::new(),
            pending_encrypted_shares: BTreeMap::new(),
            ledger: DisqualificationLedger::default(),
            pending_accusations_phase5: Vec::new(),
            pending_accusations_phase9: Vec::new(),
            resolved_accusations_phase5: Default::default(),
            resolved_accusations_phase9: Default::default(),
            public_share_points: BTreeMap::new(),
            revealed_shares: BTreeMap::new(),
            reconstructed_public_keys: BTreeMap::new(),
            qualified_at_phase6: Default::default(),
            final_public_key_shares: BTreeMap::new(),
            final_public_key: None,
            final_share: None,
        })
    }

    /// This member's own secret share pair, available only once phase 3 has
    /// run and evaluated this member's own polynomials at its own index.
    pub fn own_share(&self) -> Result<&ReceivedShare, ProtocolError> {
        self.received_shares
            .get(&self.my_index)
            .ok_or(ProtocolError::ShareNotYetKnown(self.my_index))
    }

    /// Every peer index except our own, in roster order.
    pub fn peers(&self) -> Vec<MemberIndex> {
        self.roster
            .indices()
            .filter(|idx| *idx != self.my_index)
            .collect()
    }

    /// Erases secret material and transitions to a terminal phase. Called
    /// on both the `Done` and `Aborted` paths (spec §5).
    pub fn terminate(&mut self, terminal: Phase) {
        debug_assert!(matches!(terminal, Phase::Done | Phase::Aborted));
        self.secrets.clear();
        self.phase = terminal;
    }
}
