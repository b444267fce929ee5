//! Error taxonomy for the DKG engine.
//!
//! Split along the line the protocol itself draws: [`DomainError`] and
//! [`ProtocolError`] indicate a local bug and always abort the run;
//! [`PeerMisbehavior`] is never thrown upward, it is recorded on the
//! accusation/disqualification ledger and resolved by the state machine;
//! [`RunOutcome`] and [`ExternalFailure`] are terminal run results.

use crate::group::MemberIndex;
use thiserror::Error;

/// Inputs out of the algebraic domain ℤ_q / the order-q subgroup. Always a bug.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DomainError {
    #[error("coefficient or exponent is not reduced modulo q")]
    OutOfField,
    #[error("group element is not a member of the order-q subgroup")]
    NotInSubgroup,
    #[error("byte representation does not decode to a valid group element or scalar")]
    InvalidEncoding,
    #[error("commitment vector has {actual} entries, expected {expected}")]
    CommitmentLengthMismatch { expected: usize, actual: usize },
}

/// A local invariant was violated. Always a bug, never a Byzantine signal.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ProtocolError {
    #[error("member index {0} is not part of the roster")]
    UnknownMember(MemberIndex),
    #[error("own share for member {0} was requested before phase 3 completed")]
    ShareNotYetKnown(MemberIndex),
}

/// The kind of Byzantine behavior recorded against a peer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MisbehaviorKind {
    /// Member did not broadcast its phase-1 ephemeral key in time.
    SilentPhase1,
    /// Member's phase-1 key arrived but its phase-3 commitment never did.
    SilentPhase3,
    /// Member's encrypted share failed to decrypt or failed `verify_share`.
    BadShare,
    /// Member filed an accusation that its own justified share disproved.
    FalseAccusation,
    /// Member was accused and did not justify by the phase-5 deadline.
    FailedJustification,
    /// Member's phase-7 public share points are inconsistent with its shares.
    BadSharePoint,
    /// Member did not respond to a points-justification accusation (phase 9).
    FailedPointsJustification,
}

/// Byzantine behavior observed in a peer. Recorded on the ledger; resolved
/// locally by the state machine and never propagated as a `Result::Err`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PeerMisbehavior {
    pub kind: MisbehaviorKind,
    pub index: MemberIndex,
}

/// Terminal outcome of a run that is not itself a bug.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RunOutcome {
    #[error("only {qualified} of the required {required} members remained qualified")]
    InsufficientQualifiedMembers { qualified: usize, required: usize },
    #[error("run was cancelled")]
    Cancelled,
    #[error("phase {phase:?} deadline elapsed before enough progress was made")]
    Timeout { phase: crate::dkg::context::Phase },
}

/// The chain adapter or broadcast channel supplied by the host failed.
#[derive(Debug, Error)]
#[error("external dependency failure: {cause}")]
pub struct ExternalFailure {
    pub cause: String,
}

/// Top-level error returned by fallible engine operations.
#[derive(Debug, Error)]
pub enum DkgError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("run terminated: {0}")]
    Terminated(#[from] RunOutcome),
    #[error(transparent)]
    External(#[from] ExternalFailure),
}
