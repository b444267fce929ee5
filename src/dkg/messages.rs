//! Wire envelopes exchanged in each phase of the protocol (spec §4.3, §4.4).

use serde::{Deserialize, Serialize};

use crate::aead::Sealed;
use crate::bigmod::{GroupElement, Scalar};
use crate::error::MisbehaviorKind;
use crate::group::MemberIndex;
use crate::kx::EphemeralPublicKey;
use crate::vss::CommitmentVector;

/// 1-indexed phase tag carried on every envelope, used by the bus to drop
/// anything outside the current-or-previous phase (spec §4.4 grace window).
pub type PhaseTag = u8;

/// A single VSS share pair, always kept alongside the commitment vector it
/// is checked against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePair {
    pub s: Scalar,
    pub t: Scalar,
}

/// Phase 1: broadcast of one ephemeral public key, addressed to `to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralKeyMsg {
    pub to: MemberIndex,
    pub public_key: EphemeralPublicKey,
}

/// Phase 3: the dealer's commitment vector plus one encrypted share packet
/// per recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMsg {
    pub commitments: CommitmentVector,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedShareMsg {
    pub to: MemberIndex,
    pub sealed: Sealed,
}

/// Phase 4 / phase 8: a public accusation naming the accused member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccusationMsg {
    pub accused: MemberIndex,
}

/// Phase 5 / phase 9: the accused's plaintext justification of the shares
/// it sent a specific accuser. Every honest member adjudicates the same way,
/// by checking this plaintext against the accused's already-broadcast
/// commitment vector or public share points — not by recomputing the
/// pairwise key, which only the accuser and the accused ever held. The
/// `ephemeral_public_key` is the accuser's own phase-1 key handed back for
/// the accuser's bookkeeping; bystanders have no use for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JustificationMsg {
    pub accuser: MemberIndex,
    pub share: SharePair,
    pub ephemeral_public_key: EphemeralPublicKey,
}

/// Phase 7: one qualified member's public key share points `A_{i,0..T}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicShareMsg {
    pub points: Vec<GroupElement>,
}

/// Phase 10: revelation of a disqualified member `m`'s share held by a
/// still-qualified member, broadcast so every honest member can reconstruct
/// `m`'s individual secret in phase 11.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRevealMsg {
    pub disqualified: MemberIndex,
    pub share: SharePair,
}

/// Every payload shape the bus ever carries, tagged by which phase produced
/// it. The bus itself is agnostic to the variant; it only reads `sender`
/// and `phase` off the envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseMessage {
    EphemeralKey(EphemeralKeyMsg),
    Commit(CommitMsg),
    EncryptedShare(EncryptedShareMsg),
    Accusation(AccusationMsg),
    Justification(JustificationMsg),
    PublicShare(PublicShareMsg),
    PointAccusation(AccusationMsg),
    PointJustification(JustificationMsg),
    ShareReveal(ShareRevealMsg),
}

/// Misbehavior evidence attached to a disqualification report handed back
/// to the caller for on-chain slashing (spec §7 propagation).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisqualificationReportEntry {
    pub index: MemberIndex,
    pub reason: MisbehaviorKind,
}
