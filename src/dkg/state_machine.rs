//! C8 — the orchestrator. Drives one member through the twelve phases of
//! spec §4.3: sending this phase's outgoing messages, waiting on the phase
//! barrier, then processing whatever the inbox collected.
//!
//! Multi-member simulation (as in this crate's own tests) calls
//! [`DkgStateMachine::send_phase`], [`DkgStateMachine::collect_phase`], and
//! [`DkgStateMachine::process_phase`] across every member before advancing
//! the shared clock, so that no member ever reads a later phase's messages
//! before its own barrier has passed. [`DkgStateMachine::run`] is the
//! single-member convenience that chains all three per phase.

use rand_core::{CryptoRng, RngCore};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::aead::{self, Sealed};
use crate::assembly::{self, DkgOutput};
use crate::bigmod::Scalar;
use crate::bus::{BroadcastChannel, Envelope, PhaseInbox};
use crate::clock::ChainAdapter;
use crate::dkg::context::{MemberContext, Phase, ReceivedShare};
use crate::dkg::messages::{
    AccusationMsg, CommitMsg, EncryptedShareMsg, EphemeralKeyMsg, JustificationMsg, PhaseMessage,
    PublicShareMsg, SharePair, ShareRevealMsg,
};
use crate::error::{DkgError, MisbehaviorKind, PeerMisbehavior, RunOutcome};
use crate::group::DisqualificationPhase;
use crate::kx::EphemeralSecretKey;

/// Encodes a share pair as `len(s) || s-bytes || t-bytes` ahead of AEAD
/// sealing. Both scalars are already reduced mod q, so their encodings
/// never collide with the length prefix.
fn encode_share_pair(pair: &SharePair) -> Vec<u8> {
    let s_bytes = pair.s.to_bytes();
    let t_bytes = pair.t.to_bytes();
    let mut out = Vec::with_capacity(1 + s_bytes.len() + t_bytes.len());
    out.push(s_bytes.len() as u8);
    out.extend_from_slice(&s_bytes);
    out.extend_from_slice(&t_bytes);
    out
}

fn decode_share_pair(field: &crate::bigmod::Field, bytes: &[u8]) -> Option<SharePair> {
    let len = *bytes.first()? as usize;
    let s_bytes = bytes.get(1..1 + len)?;
    let t_bytes = bytes.get(1 + len..)?;
    Some(SharePair {
        s: field.scalar_from_bytes_mod_q(s_bytes),
        t: field.scalar_from_bytes_mod_q(t_bytes),
    })
}

pub struct DkgStateMachine<'a, A: ChainAdapter, B: BroadcastChannel> {
    pub ctx: MemberContext,
    adapter: &'a A,
    bus: &'a B,
    inbox: PhaseInbox,
    misbehavior: Vec<PeerMisbehavior>,
}

impl<'a, A: ChainAdapter, B: BroadcastChannel> DkgStateMachine<'a, A, B> {
    pub fn new(ctx: MemberContext, adapter: &'a A, bus: &'a B) -> Self {
        DkgStateMachine {
            ctx,
            adapter,
            bus,
            inbox: PhaseInbox::new(),
            misbehavior: Vec::new(),
        }
    }

    /// Every `PeerMisbehavior` this member has locally observed and acted on.
    pub fn misbehavior(&self) -> &[PeerMisbehavior] {
        &self.misbehavior
    }

    fn send(&self, payload: PhaseMessage) -> Result<(), DkgError> {
        let phase_tag = self
            .ctx
            .phase
            .tag()
            .expect("send_phase is only called while in a tagged phase");
        self.bus
            .send(Envelope {
                run_id: self.ctx.run_id.clone(),
                sender: self.ctx.my_index,
                phase: phase_tag,
                payload,
            })
            .map_err(DkgError::from)
    }

    /// Emits this phase's outgoing messages (if any).
    pub fn send_phase<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<(), DkgError> {
        debug!(member = self.ctx.my_index.get(), phase = ?self.ctx.phase, "sending phase messages");
        match self.ctx.phase {
            Phase::EphemeralKeyGen => self.send_phase1(rng),
            Phase::SymmetricKeyDerive => Ok(()),
            Phase::Commit => self.send_phase3(rng),
            Phase::CommitmentVerify => self.send_phase4(),
            Phase::SharesJustify => self.send_phase5(),
            Phase::Qualify => Ok(()),
            Phase::PublicKeyShare => self.send_phase7(),
            Phase::PublicKeyShareVerify => self.send_phase8(),
            Phase::PointsJustify => self.send_phase9(),
            Phase::DisqualifiedShareReveal => self.send_phase10(),
            Phase::Reconstruct | Phase::Combine | Phase::Done | Phase::Aborted => Ok(()),
        }
    }

    /// Waits for this phase's deadline, then drains the bus into the inbox.
    pub fn collect_phase(&mut self) -> Result<(), DkgError> {
        if let Some(tag) = self.ctx.phase.tag() {
            self.ctx
                .phase_clock
                .barrier(tag as u64, self.adapter, &self.ctx.cancellation)?;
            let envelopes: Vec<Envelope> = self
                .bus
                .poll()
                .into_iter()
                .filter(|e| e.run_id == self.ctx.run_id)
                .collect();
            self.inbox.ingest(tag, envelopes);
        }
        Ok(())
    }

    /// Processes whatever the inbox collected for this phase and transitions
    /// `self.ctx.phase` to the next one.
    pub fn process_phase(&mut self) -> Result<(), DkgError> {
        info!(
            target: "dkg.phase",
            run = ?self.ctx.run_id,
            member = self.ctx.my_index.get(),
            phase = ?self.ctx.phase,
            "processing phase"
        );
        match self.ctx.phase {
            Phase::EphemeralKeyGen => self.process_phase1(),
            Phase::SymmetricKeyDerive => self.process_phase2(),
            Phase::Commit => self.process_phase3(),
            Phase::CommitmentVerify => self.process_phase4(),
            Phase::SharesJustify => self.process_phase5(),
            Phase::Qualify => self.process_phase6(),
            Phase::PublicKeyShare => self.process_phase7(),
            Phase::PublicKeyShareVerify => self.process_phase8(),
            Phase::PointsJustify => self.process_phase9(),
            Phase::DisqualifiedShareReveal => self.process_phase10(),
            Phase::Reconstruct => self.process_phase11(),
            Phase::Combine => self.process_phase12(),
            Phase::Done | Phase::Aborted => Ok(()),
        }
    }

    fn step<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<(), DkgError> {
        self.send_phase(rng)?;
        self.collect_phase()?;
        self.process_phase()
    }

    /// Runs every remaining phase to completion. Intended for single-member
    /// use against a bus already populated by every other member's own
    /// `send_phase`/`collect_phase` calls for the same window.
    pub fn run<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<DkgOutput, DkgError> {
        loop {
            match self.ctx.phase {
                Phase::Done => return self.finish(),
                Phase::Aborted => {
                    return Err(DkgError::Terminated(RunOutcome::Cancelled));
                }
                _ => self.step(rng)?,
            }
        }
    }

    /// Packages the final output. Valid once `self.ctx.phase == Phase::Done`;
    /// a multi-member simulation that steps every machine by hand (rather
    /// than through [`DkgStateMachine::run`]) calls this directly once every
    /// machine has reached the terminal phase.
    pub fn finish(&self) -> Result<DkgOutput, DkgError> {
        Ok(DkgOutput {
            group_public_key: self
                .ctx
                .final_public_key
                .clone()
                .expect("phase 12 always sets final_public_key before Done"),
            final_share: self
                .ctx
                .final_share
                .clone()
                .expect("phase 12 always sets final_share before Done"),
            qualified_members: self.ctx.qualified_at_phase6.iter().copied().collect(),
            member_index: self.ctx.my_index,
            public_key_shares: assembly::public_key_shares(&self.ctx.final_public_key_shares),
        })
    }

    // --- Phase 1: EphemeralKeyGen -----------------------------------------

    fn send_phase1<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<(), DkgError> {
        for peer in self.ctx.peers() {
            let (sk, pk) = EphemeralSecretKey::generate(rng);
            self.ctx.my_ephemeral_public_keys.insert(peer, pk.clone());
            self.ctx.secrets.ephemeral_secrets.insert(peer, sk);
            self.send(PhaseMessage::EphemeralKey(EphemeralKeyMsg {
                to: peer,
                public_key: pk,
            }))?;
        }
        Ok(())
    }

    fn process_phase1(&mut self) -> Result<(), DkgError> {
        for (sender, payload) in self.inbox.for_phase(1) {
            if let PhaseMessage::EphemeralKey(msg) = payload {
                if msg.to == self.ctx.my_index {
                    self.ctx.ephemeral_public_keys.insert(sender, msg.public_key.clone());
                }
            }
        }
        self.ctx.phase = Phase::SymmetricKeyDerive;
        Ok(())
    }

    // --- Phase 2: SymmetricKeyDerive (local only, no wire messages) -------

    fn process_phase2(&mut self) -> Result<(), DkgError> {
        let group_id = self.ctx.run_id.group_id.0.clone();
        let run_nonce = self.ctx.run_id.run_nonce;
        let my_index = self.ctx.my_index;

        for peer in self.ctx.peers() {
            if self.ctx.ledger.is_disqualified(peer) {
                continue;
            }
            let peer_public = match self.ctx.ephemeral_public_keys.get(&peer) {
                Some(pk) => pk.clone(),
                None => {
                    self.ctx
                        .ledger
                        .record(peer, DisqualificationPhase::Phase2, MisbehaviorKind::SilentPhase1);
                    warn!(member = peer.get(), "disqualified: no phase-1 ephemeral key received");
                    continue;
                }
            };
            let key = self
                .ctx
                .secrets
                .ephemeral_secrets
                .get(&peer)
                .expect("a secret was generated for every peer in phase 1")
                .derive_symmetric_key(&peer_public, &group_id, run_nonce, my_index, peer)?;
            self.ctx.secrets.symmetric_keys.insert(peer, key);
        }
        self.ctx.phase = Phase::Commit;
        Ok(())
    }

    // --- Phase 3: Commit ---------------------------------------------------

    fn send_phase3<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<(), DkgError> {
        let field = self.ctx.params.field.clone();
        let threshold = self.ctx.params.dishonest_threshold;
        let poly_a = crate::polynomial::Polynomial::random(&field, threshold, rng);
        let poly_b = crate::polynomial::Polynomial::random(&field, threshold, rng);
        let commitments = self
            .ctx
            .params
            .commitment_key
            .commit(&field, poly_a.coefficients(), poly_b.coefficients())?;
        self.send(PhaseMessage::Commit(CommitMsg {
            commitments: commitments.clone(),
        }))?;

        let my_index = self.ctx.my_index;
        let own_s = poly_a.evaluate(&field, &field.scalar_from_u64(my_index.get()));
        let own_t = poly_b.evaluate(&field, &field.scalar_from_u64(my_index.get()));
        self.ctx
            .received_shares
            .insert(my_index, ReceivedShare { s: own_s, t: own_t, valid: true });

        for peer in self.ctx.peers() {
            let key = match self.ctx.secrets.symmetric_keys.get(&peer) {
                Some(key) => key.clone(),
                None => continue, // already disqualified in phase 2
            };
            let s = poly_a.evaluate(&field, &field.scalar_from_u64(peer.get()));
            let t = poly_b.evaluate(&field, &field.scalar_from_u64(peer.get()));
            let pair = SharePair { s, t };
            let sealed = aead::seal(&key, my_index, 3, &encode_share_pair(&pair));
            self.ctx.own_encrypted_shares.insert(peer, sealed.clone());
            self.send(PhaseMessage::EncryptedShare(EncryptedShareMsg { to: peer, sealed }))?;
        }

        self.ctx.secrets.poly_a = Some(poly_a);
        self.ctx.secrets.poly_b = Some(poly_b);
        Ok(())
    }

    fn process_phase3(&mut self) -> Result<(), DkgError> {
        for (sender, payload) in self.inbox.for_phase(3) {
            match payload {
                PhaseMessage::Commit(msg) => {
                    self.ctx.commitments.insert(sender, msg.commitments.clone());
                }
                PhaseMessage::EncryptedShare(msg) if msg.to == self.ctx.my_index => {
                    self.ctx.pending_encrypted_shares.insert(sender, msg.sealed.clone());
                }
                _ => {}
            }
        }
        self.ctx.phase = Phase::CommitmentVerify;
        Ok(())
    }

    // --- Phase 4: CommitmentVerify ------------------------------------------

    fn send_phase4(&mut self) -> Result<(), DkgError> {
        for peer in self.ctx.peers() {
            if self.ctx.ledger.is_disqualified(peer) {
                continue;
            }
            if !self.ctx.commitments.contains_key(&peer) {
                self.ctx
                    .ledger
                    .record(peer, DisqualificationPhase::Phase3, MisbehaviorKind::SilentPhase3);
                warn!(member = peer.get(), "disqualified: no phase-3 commitment received");
            }
        }

        let field = self.ctx.params.field.clone();
        let commitment_key = self.ctx.params.commitment_key.clone();
        let my_index = self.ctx.my_index;
        let commitments = self.ctx.commitments.clone();
        let pending: Vec<(crate::group::MemberIndex, Sealed)> = self
            .ctx
            .pending_encrypted_shares
            .iter()
            .map(|(sender, sealed)| (*sender, sealed.clone()))
            .collect();
        let keys = self.ctx.secrets.symmetric_keys.clone();

        // Bounded parallel fan-out over per-sender decrypt+verify, per the
        // concurrency model for phases 4 and 8: independent per-sender work,
        // no shared mutable state touched inside the closure.
        let results: Vec<(crate::group::MemberIndex, Option<SharePair>)> = pending
            .par_iter()
            .map(|(sender, sealed)| {
                let pair = keys
                    .get(sender)
                    .and_then(|key| aead::open(key, sealed).ok())
                    .and_then(|bytes| decode_share_pair(&field, &bytes));
                (*sender, pair)
            })
            .collect();

        for (sender, maybe_pair) in results {
            if self.ctx.ledger.is_disqualified(sender) {
                continue;
            }
            let commitments_j = match commitments.get(&sender) {
                Some(c) => c,
                None => continue, // just disqualified above for silence
            };
            match maybe_pair {
                Some(pair) => {
                    let valid =
                        commitment_key.verify_share(&field, my_index.get(), &pair.s, &pair.t, commitments_j);
                    self.ctx
                        .received_shares
                        .insert(sender, ReceivedShare { s: pair.s, t: pair.t, valid });
                    if !valid {
                        self.send(PhaseMessage::Accusation(AccusationMsg { accused: sender }))?;
                    }
                }
                None => {
                    self.ctx
                        .received_shares
                        .insert(sender, ReceivedShare { s: Scalar::zero(), t: Scalar::zero(), valid: false });
                    self.send(PhaseMessage::Accusation(AccusationMsg { accused: sender }))?;
                }
            }
        }
        Ok(())
    }

    fn process_phase4(&mut self) -> Result<(), DkgError> {
        for (sender, payload) in self.inbox.for_phase(4) {
            if let PhaseMessage::Accusation(msg) = payload {
                self.ctx.pending_accusations_phase5.push((sender, msg.accused));
            }
        }
        self.ctx.phase = Phase::SharesJustify;
        Ok(())
    }

    // --- Phase 5: SharesJustify ---------------------------------------------

    fn send_phase5(&mut self) -> Result<(), DkgError> {
        let field = self.ctx.params.field.clone();
        let my_index = self.ctx.my_index;
        let accusers: Vec<_> = self
            .ctx
            .pending_accusations_phase5
            .iter()
            .filter(|(_, accused)| *accused == my_index)
            .map(|(accuser, _)| *accuser)
            .collect();
        let poly_a = self.ctx.secrets.poly_a.clone();
        let poly_b = self.ctx.secrets.poly_b.clone();
        let (Some(poly_a), Some(poly_b)) = (poly_a, poly_b) else {
            return Ok(());
        };
        for accuser in accusers {
            if self.ctx.ledger.is_disqualified(my_index) {
                break;
            }
            let s = poly_a.evaluate(&field, &field.scalar_from_u64(accuser.get()));
            let t = poly_b.evaluate(&field, &field.scalar_from_u64(accuser.get()));
            let ephemeral_public_key = self
                .ctx
                .my_ephemeral_public_keys
                .get(&accuser)
                .cloned()
                .expect("every peer was sent an ephemeral key in phase 1");
            self.send(PhaseMessage::Justification(JustificationMsg {
                accuser,
                share: SharePair { s, t },
                ephemeral_public_key,
            }))?;
        }
        Ok(())
    }

    fn process_phase5(&mut self) -> Result<(), DkgError> {
        let field = self.ctx.params.field.clone();
        let commitment_key = self.ctx.params.commitment_key.clone();
        let my_index = self.ctx.my_index;

        for (sender, payload) in self.inbox.for_phase(5) {
            let PhaseMessage::Justification(msg) = payload else { continue };
            let key = (sender, msg.accuser);
            if self.ctx.resolved_accusations_phase5.contains(&key) {
                continue;
            }
            let valid = self
                .ctx
                .commitments
                .get(&sender)
                .map(|c| commitment_key.verify_share(&field, msg.accuser.get(), &msg.share.s, &msg.share.t, c))
                .unwrap_or(false);
            if valid {
                self.ctx
                    .ledger
                    .record(msg.accuser, DisqualificationPhase::Phase5, MisbehaviorKind::FalseAccusation);
                self.misbehavior.push(PeerMisbehavior { kind: MisbehaviorKind::FalseAccusation, index: msg.accuser });
                warn!(accuser = msg.accuser.get(), accused = sender.get(), "phase-5 justification verified: false accusation");
                if msg.accuser == my_index {
                    self.ctx.received_shares.insert(
                        sender,
                        ReceivedShare { s: msg.share.s.clone(), t: msg.share.t.clone(), valid: true },
                    );
                }
            } else {
                self.ctx
                    .ledger
                    .record(sender, DisqualificationPhase::Phase5, MisbehaviorKind::BadShare);
                self.misbehavior.push(PeerMisbehavior { kind: MisbehaviorKind::BadShare, index: sender });
                warn!(dealer = sender.get(), accuser = msg.accuser.get(), "phase-5 justification failed to verify: bad share");
            }
            self.ctx.resolved_accusations_phase5.insert(key);
        }

        for (accuser, accused) in std::mem::take(&mut self.ctx.pending_accusations_phase5) {
            if self.ctx.ledger.is_disqualified(accused) {
                continue;
            }
            if !self.ctx.resolved_accusations_phase5.contains(&(accused, accuser)) {
                self.ctx
                    .ledger
                    .record(accused, DisqualificationPhase::Phase5, MisbehaviorKind::FailedJustification);
                self.misbehavior
                    .push(PeerMisbehavior { kind: MisbehaviorKind::FailedJustification, index: accused });
                warn!(member = accused.get(), "disqualified: never justified a phase-4 accusation");
            }
        }
        self.ctx.phase = Phase::Qualify;
        Ok(())
    }

    // --- Phase 6: Qualify ----------------------------------------------------

    fn process_phase6(&mut self) -> Result<(), DkgError> {
        let qualified = self.ctx.ledger.qualified(&self.ctx.roster);
        if qualified.len() < self.ctx.params.recovery_threshold() {
            let outcome = RunOutcome::InsufficientQualifiedMembers {
                qualified: qualified.len(),
                required: self.ctx.params.recovery_threshold(),
            };
            warn!(
                member = self.ctx.my_index.get(),
                qualified = qualified.len(),
                required = self.ctx.params.recovery_threshold(),
                "aborting run: not enough members remained qualified"
            );
            self.ctx.terminate(Phase::Aborted);
            return Err(DkgError::Terminated(outcome));
        }
        self.ctx.qualified_at_phase6 = qualified;
        self.ctx.phase = Phase::PublicKeyShare;
        Ok(())
    }

    // --- Phase 7: PublicKeyShare ---------------------------------------------

    fn send_phase7(&mut self) -> Result<(), DkgError> {
        // A member disqualified before phase 6 (e.g. `SilentPhase3`) never
        // set `poly_a`; nothing to broadcast on its behalf.
        let poly_a = self.ctx.secrets.poly_a.clone();
        let Some(poly_a) = poly_a else { return Ok(()) };
        let field = self.ctx.params.field.clone();
        let g = self.ctx.params.commitment_key.g.clone();
        let points: Vec<_> = poly_a.coefficients().iter().map(|a| field.pow(&g, a)).collect();
        self.ctx.public_share_points.insert(self.ctx.my_index, points.clone());
        self.send(PhaseMessage::PublicShare(PublicShareMsg { points }))
    }

    fn process_phase7(&mut self) -> Result<(), DkgError> {
        for (sender, payload) in self.inbox.for_phase(7) {
            if let PhaseMessage::PublicShare(msg) = payload {
                if self.ctx.qualified_at_phase6.contains(&sender) {
                    self.ctx.public_share_points.insert(sender, msg.points.clone());
                }
            }
        }
        self.ctx.phase = Phase::PublicKeyShareVerify;
        Ok(())
    }

    // --- Phase 8: PublicKeyShareVerify ---------------------------------------

    fn send_phase8(&mut self) -> Result<(), DkgError> {
        let field = self.ctx.params.field.clone();
        let g = self.ctx.params.commitment_key.g.clone();
        let my_index = self.ctx.my_index;
        let qualified: Vec<_> = self
            .ctx
            .qualified_at_phase6
            .iter()
            .copied()
            .filter(|j| *j != my_index)
            .collect();

        for peer in qualified {
            if self.ctx.ledger.is_disqualified(peer) {
                continue;
            }
            let share = match self.ctx.received_shares.get(&peer) {
                Some(rs) if rs.valid => rs.clone(),
                _ => continue,
            };
            let verified = self
                .ctx
                .public_share_points
                .get(&peer)
                .map(|points| crate::vss::verify_point_share(&field, &g, my_index.get(), &share.s, points))
                .unwrap_or(false);
            if !verified {
                self.send(PhaseMessage::PointAccusation(AccusationMsg { accused: peer }))?;
            }
        }
        Ok(())
    }

    fn process_phase8(&mut self) -> Result<(), DkgError> {
        for (sender, payload) in self.inbox.for_phase(8) {
            if let PhaseMessage::PointAccusation(msg) = payload {
                self.ctx.pending_accusations_phase9.push((sender, msg.accused));
            }
        }
        self.ctx.phase = Phase::PointsJustify;
        Ok(())
    }

    // --- Phase 9: PointsJustify -----------------------------------------------

    fn send_phase9(&mut self) -> Result<(), DkgError> {
        let field = self.ctx.params.field.clone();
        let my_index = self.ctx.my_index;
        let accusers: Vec<_> = self
            .ctx
            .pending_accusations_phase9
            .iter()
            .filter(|(_, accused)| *accused == my_index)
            .map(|(accuser, _)| *accuser)
            .collect();
        let poly_a = self.ctx.secrets.poly_a.clone();
        let Some(poly_a) = poly_a else { return Ok(()) };

        for accuser in accusers {
            if self.ctx.ledger.is_disqualified(my_index) {
                break;
            }
            let s = poly_a.evaluate(&field, &field.scalar_from_u64(accuser.get()));
            let ephemeral_public_key = self
                .ctx
                .my_ephemeral_public_keys
                .get(&accuser)
                .cloned()
                .expect("every peer was sent an ephemeral key in phase 1");
            self.send(PhaseMessage::PointJustification(JustificationMsg {
                accuser,
                share: SharePair { s, t: Scalar::zero() }, // point shares carry no hiding term
                ephemeral_public_key,
            }))?;
        }
        Ok(())
    }

    fn process_phase9(&mut self) -> Result<(), DkgError> {
        let field = self.ctx.params.field.clone();
        let g = self.ctx.params.commitment_key.g.clone();

        for (sender, payload) in self.inbox.for_phase(9) {
            let PhaseMessage::PointJustification(msg) = payload else { continue };
            let key = (sender, msg.accuser);
            if self.ctx.resolved_accusations_phase9.contains(&key) {
                continue;
            }
            let valid = self
                .ctx
                .public_share_points
                .get(&sender)
                .map(|points| crate::vss::verify_point_share(&field, &g, msg.accuser.get(), &msg.share.s, points))
                .unwrap_or(false);
            if valid {
                self.ctx
                    .ledger
                    .record(msg.accuser, DisqualificationPhase::Phase9, MisbehaviorKind::FalseAccusation);
                self.misbehavior.push(PeerMisbehavior { kind: MisbehaviorKind::FalseAccusation, index: msg.accuser });
                warn!(accuser = msg.accuser.get(), accused = sender.get(), "phase-9 justification verified: false accusation");
            } else {
                self.ctx
                    .ledger
                    .record(sender, DisqualificationPhase::Phase9, MisbehaviorKind::BadSharePoint);
                self.misbehavior.push(PeerMisbehavior { kind: MisbehaviorKind::BadSharePoint, index: sender });
                warn!(dealer = sender.get(), accuser = msg.accuser.get(), "phase-9 justification failed to verify: bad share point");
            }
            self.ctx.resolved_accusations_phase9.insert(key);
        }

        for (accuser, accused) in std::mem::take(&mut self.ctx.pending_accusations_phase9) {
            if self.ctx.ledger.is_disqualified(accused) {
                continue;
            }
            if !self.ctx.resolved_accusations_phase9.contains(&(accused, accuser)) {
                self.ctx.ledger.record(
                    accused,
                    DisqualificationPhase::Phase9,
                    MisbehaviorKind::FailedPointsJustification,
                );
                self.misbehavior
                    .push(PeerMisbehavior { kind: MisbehaviorKind::FailedPointsJustification, index: accused });
                warn!(member = accused.get(), "disqualified: never justified a phase-8 point accusation");
            }
        }
        self.ctx.phase = Phase::DisqualifiedShareReveal;
        Ok(())
    }

    // --- Phase 10: DisqualifiedShareReveal ------------------------------------

    fn send_phase10(&mut self) -> Result<(), DkgError> {
        let my_index = self.ctx.my_index;
        if self.ctx.ledger.is_disqualified(my_index) {
            return Ok(());
        }
        let late_disqualified: Vec<_> = self
            .ctx
            .qualified_at_phase6
            .iter()
            .copied()
            .filter(|m| self.ctx.ledger.is_disqualified(*m))
            .collect();

        for disqualified in late_disqualified {
            if let Some(rs) = self.ctx.received_shares.get(&disqualified) {
                if rs.valid {
                    self.send(PhaseMessage::ShareReveal(ShareRevealMsg {
                        disqualified,
                        share: SharePair { s: rs.s.clone(), t: rs.t.clone() },
                    }))?;
                }
            }
        }
        Ok(())
    }

    fn process_phase10(&mut self) -> Result<(), DkgError> {
        for (sender, payload) in self.inbox.for_phase(10) {
            if let PhaseMessage::ShareReveal(msg) = payload {
                self.ctx
                    .revealed_shares
                    .entry(msg.disqualified)
                    .or_default()
                    .push((sender.get(), msg.share.s.clone()));
            }
        }
        self.ctx.phase = Phase::Reconstruct;
        Ok(())
    }

    // --- Phase 11: Reconstruct (local only) -----------------------------------

    fn process_phase11(&mut self) -> Result<(), DkgError> {
        let field = self.ctx.params.field.clone();
        let g = self.ctx.params.commitment_key.g.clone();
        let recovery_threshold = self.ctx.params.recovery_threshold();

        let pending: Vec<_> = self.ctx.revealed_shares.clone().into_iter().collect();
        for (member, mut shares) in pending {
            shares.sort_by_key(|(idx, _)| *idx);
            shares.dedup_by_key(|(idx, _)| *idx);
            if shares.len() < recovery_threshold {
                continue;
            }
            if let Ok((_z, y)) = assembly::reconstruct(&field, &g, &shares, recovery_threshold) {
                self.ctx.reconstructed_public_keys.insert(member, y);
            }
        }
        self.ctx.phase = Phase::Combine;
        Ok(())
    }

    // --- Phase 12: Combine (local only) ---------------------------------------

    fn process_phase12(&mut self) -> Result<(), DkgError> {
        let field = self.ctx.params.field.clone();

        let qualified_zero_points: std::collections::BTreeMap<_, _> = self
            .ctx
            .qualified_at_phase6
            .iter()
            .filter(|i| !self.ctx.reconstructed_public_keys.contains_key(i))
            .filter_map(|i| self.ctx.public_share_points.get(i).map(|points| (*i, points[0].clone())))
            .collect();

        let group_public_key =
            assembly::combine_group_public_key(&field, &qualified_zero_points, &self.ctx.reconstructed_public_keys);

        let mut final_public_key_shares = qualified_zero_points;
        final_public_key_shares.extend(self.ctx.reconstructed_public_keys.clone());
        self.ctx.final_public_key_shares = final_public_key_shares;

        let shares: Vec<Scalar> = self
            .ctx
            .qualified_at_phase6
            .iter()
            .filter_map(|j| self.ctx.received_shares.get(j).map(|rs| rs.s.clone()))
            .collect();
        let final_share = assembly::final_share(&field, &shares);

        self.ctx.final_public_key = Some(group_public_key);
        self.ctx.final_share = Some(final_share);
        info!(
            member = self.ctx.my_index.get(),
            qualified = self.ctx.qualified_at_phase6.len(),
            reconstructed = self.ctx.reconstructed_public_keys.len(),
            "run complete"
        );
        self.ctx.terminate(Phase::Done);
        Ok(())
    }
}
