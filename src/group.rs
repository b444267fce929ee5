//! C5 — membership roster, operator-index mapping, disqualification ledger.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::MisbehaviorKind;
use crate::kx::EphemeralPublicKey;

/// A positive, roster-assigned member index, `1..=N`. Used as the evaluation
/// point `j` for every member's secret-sharing polynomials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct MemberIndex(u64);

impl MemberIndex {
    pub fn new(index: u64) -> Option<Self> {
        if index == 0 {
            None
        } else {
            Some(MemberIndex(index))
        }
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MemberIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of the group channel this run binds to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct GroupId(pub Vec<u8>);

/// Tags one run of the protocol, per spec §6 "Run identity". Two runs with
/// the same tag are the same run as far as the bus and the state machine
/// are concerned; a second `start` on an already-seen `RunId` is refused
/// (spec §8 property 6).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunId {
    pub group_id: GroupId,
    pub run_nonce: u64,
}

/// The bootstrap roster: every member's index and long-lived communication
/// identity (its static public key, used only to authenticate broadcast
/// envelopes — not to be confused with the per-pair ephemeral keys of
/// phase 1).
#[derive(Clone)]
pub struct Roster {
    members: BTreeMap<MemberIndex, EphemeralPublicKey>,
}

impl Roster {
    pub fn new(members: BTreeMap<MemberIndex, EphemeralPublicKey>) -> Self {
        Roster { members }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn indices(&self) -> impl Iterator<Item = MemberIndex> + '_ {
        self.members.keys().copied()
    }

    pub fn contains(&self, index: MemberIndex) -> bool {
        self.members.contains_key(&index)
    }
}

/// The phase at which a member was excluded, for the on-chain slashing
/// report and for resolving spec §9(b)'s ambiguous-behavior note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DisqualificationPhase {
    Phase2,
    Phase3,
    Phase5,
    Phase9,
}

/// One entry of the append-only disqualification ledger.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Disqualification {
    pub index: MemberIndex,
    pub phase: DisqualificationPhase,
    pub reason: MisbehaviorKind,
}

/// Monotonically growing record of who was excluded and why. Frozen for
/// readers once its owning phase closes (spec §5 shared-resources note);
/// the mutation methods are only ever called by the state machine's own
/// phase-handling code.
#[derive(Clone, Default)]
pub struct DisqualificationLedger {
    entries: Vec<Disqualification>,
    disqualified: BTreeSet<MemberIndex>,
}

impl DisqualificationLedger {
    pub fn record(&mut self, index: MemberIndex, phase: DisqualificationPhase, reason: MisbehaviorKind) {
        if self.disqualified.insert(index) {
            self.entries.push(Disqualification { index, phase, reason });
        }
    }

    pub fn is_disqualified(&self, index: MemberIndex) -> bool {
        self.disqualified.contains(&index)
    }

    pub fn entries(&self) -> &[Disqualification] {
        &self.entries
    }

    pub fn disqualified_set(&self) -> &BTreeSet<MemberIndex> {
        &self.disqualified
    }

    /// The qualified set `Q`: roster minus everyone disqualified so far.
    pub fn qualified(&self, roster: &Roster) -> BTreeSet<MemberIndex> {
        roster
            .indices()
            .filter(|i| !self.disqualified.contains(i))
            .collect()
    }
}
