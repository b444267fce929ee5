//! C7 — broadcast and point-to-point channels bound to one group/run;
//! message framing, dedup, and phase filtering (spec §4.4).

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use crate::dkg::messages::{PhaseMessage, PhaseTag};
use crate::error::ExternalFailure;
use crate::group::{MemberIndex, RunId};

/// One message in flight: who sent it, under which run and phase, and its
/// payload. Authentication of `sender` against the transport's own identity
/// proof happens below this layer — spec §6 requires forged senders to be
/// dropped before delivery, which is the host network provider's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub run_id: RunId,
    pub sender: MemberIndex,
    pub phase: PhaseTag,
    pub payload: PhaseMessage,
}

/// External collaborator (spec §6): the broadcast channel bound to a group.
/// A production implementation wraps the host's gossip/broadcast transport;
/// [`InMemoryBus`] below is the in-process mock used by this crate's own
/// tests.
pub trait BroadcastChannel {
    fn send(&self, envelope: Envelope) -> Result<(), ExternalFailure>;

    /// Drains every envelope received since the last call.
    fn poll(&self) -> Vec<Envelope>;
}

/// Accumulates envelopes for one member's view of one run, applying the
/// framing rules spec §4.4 requires: drop anything outside the current-or-
/// previous phase. A sender may legitimately emit several distinct messages
/// within one phase (phase 1's per-peer ephemeral key, phase 3's per-peer
/// encrypted share, phase 4/8's multiple accusations, ...), so this keeps
/// every distinct payload from a sender and only collapses exact repeats —
/// spec §9(a)'s idempotent-first-wins rule is enforced by the state machine
/// itself over the logical sub-key (e.g. accuser+accused), not here.
#[derive(Default)]
pub struct PhaseInbox {
    accepted: std::collections::BTreeMap<(PhaseTag, MemberIndex), Vec<PhaseMessage>>,
}

impl PhaseInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds in a batch of freshly polled envelopes for one run, keeping
    /// only those in `{current_phase - 1, current_phase}` and dropping exact
    /// retransmissions of a payload already accepted from that sender.
    pub fn ingest(&mut self, current_phase: PhaseTag, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            let in_window = envelope.phase == current_phase
                || (current_phase > 0 && envelope.phase == current_phase - 1);
            if !in_window {
                continue;
            }
            let slot = self
                .accepted
                .entry((envelope.phase, envelope.sender))
                .or_default();
            if !slot.contains(&envelope.payload) {
                slot.push(envelope.payload);
            }
        }
    }

    /// Every payload accepted for exactly `phase`, in sender order; a sender
    /// with several messages in the phase appears once per message.
    pub fn for_phase(&self, phase: PhaseTag) -> Vec<(MemberIndex, &PhaseMessage)> {
        self.accepted
            .range((phase, MemberIndex::new(1).unwrap())..=(phase, MemberIndex::new(u64::MAX).unwrap()))
            .flat_map(|((_, sender), payloads)| payloads.iter().map(move |p| (*sender, p)))
            .collect()
    }
}

/// In-process broadcast mock: each member holds one endpoint, linked to
/// every other endpoint of the same network. A `send` fans the envelope out
/// to every endpoint's own inbox (including the sender's); `poll` only ever
/// drains the calling endpoint's inbox, so every member sees every message
/// exactly once per `poll`. Rejects any further `send` once a run has been
/// marked closed, per spec §6 "two runs with the same tag from the same
/// sender MUST be rejected".
#[derive(Clone)]
pub struct InMemoryBus {
    inbox: Arc<Mutex<VecDeque<Envelope>>>,
    peers: Arc<Vec<Arc<Mutex<VecDeque<Envelope>>>>>,
    closed_runs: Arc<Mutex<HashSet<RunId>>>,
}

impl InMemoryBus {
    /// A single-endpoint network — enough for this module's own unit tests.
    /// Integration tests spin up a whole group via [`InMemoryBus::network`].
    pub fn new() -> Self {
        Self::network(1).remove(0)
    }

    /// Builds `member_count` linked endpoints of one shared broadcast
    /// network.
    pub fn network(member_count: usize) -> Vec<InMemoryBus> {
        let inboxes: Vec<Arc<Mutex<VecDeque<Envelope>>>> = (0..member_count)
            .map(|_| Arc::new(Mutex::new(VecDeque::new())))
            .collect();
        let peers = Arc::new(inboxes.clone());
        let closed_runs = Arc::new(Mutex::new(HashSet::new()));
        inboxes
            .into_iter()
            .map(|inbox| InMemoryBus {
                inbox,
                peers: peers.clone(),
                closed_runs: closed_runs.clone(),
            })
            .collect()
    }

    /// Marks a run closed; any further `send` under that `RunId` is refused.
    pub fn close_run(&self, run_id: &RunId) {
        self.closed_runs.lock().unwrap().insert(run_id.clone());
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        InMemoryBus::new()
    }
}

impl BroadcastChannel for InMemoryBus {
    fn send(&self, envelope: Envelope) -> Result<(), ExternalFailure> {
        if self.closed_runs.lock().unwrap().contains(&envelope.run_id) {
            return Err(ExternalFailure {
                cause: format!("run {:?} already closed", envelope.run_id),
            });
        }
        for peer_inbox in self.peers.iter() {
            peer_inbox.lock().unwrap().push_back(envelope.clone());
        }
        Ok(())
    }

    fn poll(&self) -> Vec<Envelope> {
        self.inbox.lock().unwrap().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dkg::messages::AccusationMsg;
    use crate::group::GroupId;

    fn run_id() -> RunId {
        RunId {
            group_id: GroupId(b"g1".to_vec()),
            run_nonce: 1,
        }
    }

    fn envelope(sender: u64, phase: PhaseTag) -> Envelope {
        Envelope {
            run_id: run_id(),
            sender: MemberIndex::new(sender).unwrap(),
            phase,
            payload: PhaseMessage::Accusation(AccusationMsg {
                accused: MemberIndex::new(99).unwrap(),
            }),
        }
    }

    #[test]
    fn inbox_drops_messages_outside_the_grace_window() {
        let mut inbox = PhaseInbox::new();
        inbox.ingest(5, vec![envelope(1, 5), envelope(2, 4), envelope(3, 2)]);
        assert_eq!(inbox.for_phase(5).len(), 1);
        assert_eq!(inbox.for_phase(4).len(), 1);
        assert_eq!(inbox.for_phase(2).len(), 0);
    }

    #[test]
    fn inbox_collapses_exact_retransmissions() {
        let mut inbox = PhaseInbox::new();
        inbox.ingest(3, vec![envelope(1, 3)]);
        inbox.ingest(3, vec![envelope(1, 3)]); // duplicate, same sender/phase/payload
        assert_eq!(inbox.for_phase(3).len(), 1);
    }

    #[test]
    fn inbox_keeps_distinct_messages_from_the_same_sender() {
        let mut inbox = PhaseInbox::new();
        let mut second = envelope(1, 3);
        second.payload = PhaseMessage::Accusation(AccusationMsg {
            accused: MemberIndex::new(2).unwrap(),
        });
        inbox.ingest(3, vec![envelope(1, 3), second]);
        assert_eq!(inbox.for_phase(3).len(), 2);
    }

    #[test]
    fn bus_rejects_sends_on_a_closed_run() {
        let bus = InMemoryBus::new();
        bus.close_run(&run_id());
        assert!(bus.send(envelope(1, 1)).is_err());
    }

    #[test]
    fn bus_delivers_everything_sent() {
        let bus = InMemoryBus::new();
        bus.send(envelope(1, 1)).unwrap();
        bus.send(envelope(2, 1)).unwrap();
        assert_eq!(bus.poll().len(), 2);
        assert_eq!(bus.poll().len(), 0);
    }

    #[test]
    fn network_fans_every_send_out_to_every_endpoint() {
        let endpoints = InMemoryBus::network(3);
        endpoints[0].send(envelope(1, 1)).unwrap();
        for endpoint in &endpoints {
            assert_eq!(endpoint.poll().len(), 1);
        }
    }

    #[test]
    fn network_close_run_is_shared_across_endpoints() {
        let endpoints = InMemoryBus::network(2);
        endpoints[0].close_run(&run_id());
        assert!(endpoints[1].send(envelope(1, 1)).is_err());
    }
}
