//! Shared harness for the integration tests: a toy algebraic setup (the same
//! small safe prime used throughout this crate's own unit tests), a roster
//! builder, and a block clock the test drives by hand.
//!
//! The DKG's twelve phases are barrier-synchronized: every member must emit
//! its phase-N messages before any member reads phase-N's inbox. A single
//! member's [`dkg_core::DkgStateMachine::run`] can't model that across
//! several members, so this harness steps every machine through
//! `send_phase`/`collect_phase`/`process_phase` in lockstep, advancing a
//! shared clock between phases.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use num_bigint::BigUint;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use dkg_core::{
    ChainAdapter, DkgStateMachine, GroupId, MemberContext, MemberIndex, PublicParameters, Roster,
    RunId,
};
use dkg_core::bus::InMemoryBus;
use dkg_core::kx::EphemeralSecretKey;

/// A manually-advanced block clock, shared by every member's adapter
/// reference so the test fully controls when each phase's barrier opens.
#[derive(Clone, Default)]
pub struct TestClock(Arc<AtomicU64>);

impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_to(&self, height: u64) {
        self.0.fetch_max(height, Ordering::SeqCst);
    }
}

impl ChainAdapter for TestClock {
    fn current_block(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn wait_for_block(&self, height: u64) -> Result<(), dkg_core::error::ExternalFailure> {
        while self.current_block() < height {
            std::thread::yield_now();
        }
        Ok(())
    }
}

/// `p = 23`, `q = 11`, `g = 4`, `h = 2` — the same toy safe-prime subgroup
/// used by every unit test in `src/bigmod.rs`/`src/vss.rs`. Evaluation
/// points `1..=N` (N <= 9) all stay well under q, so no reduction collides.
pub fn small_params(group_size: usize, dishonest_threshold: usize, phase_deadline_blocks: u64) -> PublicParameters {
    PublicParameters::new(
        BigUint::from(23u32),
        BigUint::from(11u32),
        BigUint::from(4u32),
        BigUint::from(2u32),
        group_size,
        dishonest_threshold,
        phase_deadline_blocks,
    )
    .expect("small_params is a known-valid fixture")
}

/// A roster of `n` members. The roster's long-lived communication keys
/// (distinct from the per-run ephemeral keys of phase 1) aren't exercised by
/// anything in this test suite, so dummy keypairs are enough.
pub fn roster(n: u64) -> Roster {
    let mut rng = ChaCha20Rng::from_seed([0xAB; 32]);
    let mut members = BTreeMap::new();
    for i in 1..=n {
        let (_sk, pk) = EphemeralSecretKey::generate(&mut rng);
        members.insert(MemberIndex::new(i).unwrap(), pk);
    }
    Roster::new(members)
}

/// Builds `n` linked in-memory broadcast endpoints and one `MemberContext`
/// per member, all bound to the same run.
pub fn new_group(
    params: &PublicParameters,
    n: u64,
    run_nonce: u64,
) -> (Vec<MemberContext>, Vec<InMemoryBus>) {
    let roster = roster(n);
    let contexts = (1..=n)
        .map(|i| {
            MemberContext::new(
                params.clone(),
                GroupId(b"test-group".to_vec()),
                run_nonce,
                roster.clone(),
                MemberIndex::new(i).unwrap(),
                0,
            )
            .expect("roster was built to contain every index 1..=n")
        })
        .collect();
    let buses = InMemoryBus::network(n as usize);
    (contexts, buses)
}

pub fn run_id(run_nonce: u64) -> RunId {
    RunId {
        group_id: GroupId(b"test-group".to_vec()),
        run_nonce,
    }
}

pub fn rng() -> ChaCha20Rng {
    ChaCha20Rng::from_seed([0x42; 32])
}

/// Drives every machine through phase `phase_number`: every machine's
/// `send_phase`, skipping indices in `silent`, then every machine's
/// `collect_phase`, then every machine's `process_phase`. Returns each
/// machine's `process_phase` result (an abort is an `Err`, never a panic).
pub fn step_phase<'a, A: ChainAdapter, B: dkg_core::bus::BroadcastChannel>(
    machines: &mut [DkgStateMachine<'a, A, B>],
    clock: &TestClock,
    phase_deadline_blocks: u64,
    phase_number: u64,
    silent: &[usize],
    rng: &mut ChaCha20Rng,
) -> Vec<Result<(), dkg_core::DkgError>> {
    clock.advance_to(phase_number * phase_deadline_blocks);

    for (idx, machine) in machines.iter_mut().enumerate() {
        if silent.contains(&idx) {
            continue;
        }
        let _ = machine.send_phase(rng);
    }
    for machine in machines.iter_mut() {
        let _ = machine.collect_phase();
    }
    machines.iter_mut().map(|m| m.process_phase()).collect()
}

/// Runs all twelve phases, consulting `silence(phase_number)` for the set of
/// machine indices (0-based) that skip their `send_phase` call that phase —
/// e.g. a member that refuses to justify in phase 5.
pub fn run_all_phases<'a, A, B>(
    machines: &mut [DkgStateMachine<'a, A, B>],
    clock: &TestClock,
    phase_deadline_blocks: u64,
    silence: impl Fn(u64) -> Vec<usize>,
) -> Vec<Result<(), dkg_core::DkgError>>
where
    A: ChainAdapter,
    B: dkg_core::bus::BroadcastChannel,
{
    let mut rng = self::rng();
    let mut last = Vec::new();
    for phase_number in 1..=12u64 {
        let silent = silence(phase_number);
        last = step_phase(machines, clock, phase_deadline_blocks, phase_number, &silent, &mut rng);
    }
    last
}
