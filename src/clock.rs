//! C6 — block-height deadlines and the phase-boundary barrier.
//!
//! The DKG core never reads a wall clock: every phase boundary is expressed
//! in chain blocks (spec §5 "Timeout policy"), and it is a hard rule that a
//! member MUST NOT advance early even once every expected message has
//! arrived, so that a fast majority cannot desynchronize from slower honest
//! peers.

use crate::error::ExternalFailure;

/// External collaborator (spec §6): a monotonic block-height source. Its
/// implementation (reading a real chain, or a deterministic test stub) is
/// entirely the host's responsibility.
pub trait ChainAdapter {
    /// Current block height. Must be monotonically non-decreasing.
    fn current_block(&self) -> u64;

    /// Blocks (synchronously, from the caller's perspective) until
    /// `current_block() >= height`, or returns an error if the underlying
    /// adapter failed.
    fn wait_for_block(&self, height: u64) -> Result<(), ExternalFailure>;
}

/// Cooperative cancellation for the two suspension points named in spec §5:
/// waiting on the clock and waiting on the bus. Checked, never polled in a
/// busy loop — the host is expected to wake callers promptly.
#[derive(Clone, Default)]
pub struct CancellationToken(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Computes each phase's absolute deadline from the run's start block and
/// the per-phase budget, and drives the phase-boundary barrier.
#[derive(Clone, Copy)]
pub struct PhaseClock {
    start_block: u64,
    phase_deadline_blocks: u64,
}

/// The twelve protocol phases, in order, each consuming one deadline slot.
pub const PHASE_COUNT: u64 = 12;

impl PhaseClock {
    pub fn new(start_block: u64, phase_deadline_blocks: u64) -> Self {
        PhaseClock {
            start_block,
            phase_deadline_blocks,
        }
    }

    /// Absolute deadline block for phase `phase_number` (1-indexed).
    pub fn deadline_for_phase(&self, phase_number: u64) -> u64 {
        debug_assert!(phase_number >= 1 && phase_number <= PHASE_COUNT);
        self.start_block + phase_number * self.phase_deadline_blocks
    }

    /// Blocks until `phase_number`'s deadline is reached, or returns
    /// `Cancelled` if `token` fires first. This is the barrier: inbound
    /// messages for phase `phase_number + 1` must not be processed before
    /// this returns.
    pub fn barrier<A: ChainAdapter>(
        &self,
        phase_number: u64,
        adapter: &A,
        token: &CancellationToken,
    ) -> Result<(), crate::error::RunOutcome> {
        if token.is_cancelled() {
            return Err(crate::error::RunOutcome::Cancelled);
        }
        let deadline = self.deadline_for_phase(phase_number);
        adapter
            .wait_for_block(deadline)
            .map_err(|_| crate::error::RunOutcome::Cancelled)?;
        if token.is_cancelled() {
            return Err(crate::error::RunOutcome::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// A manually-advanced block clock for tests, matching the teacher's
    /// preference for deterministic in-process mocks over real I/O.
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

        fn wait_for_block(&self, height: u64) -> Result<(), ExternalFailure> {
            // Tests drive time explicitly; by the time a phase barrier is
            // invoked the clock has already been advanced past its deadline.
            while self.current_block() < height {
                std::thread::yield_now();
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::TestClock;
    use super::*;

    #[test]
    fn deadlines_are_cumulative() {
        let clock = PhaseClock::new(100, 5);
        assert_eq!(clock.deadline_for_phase(1), 105);
        assert_eq!(clock.deadline_for_phase(2), 110);
        assert_eq!(clock.deadline_for_phase(12), 160);
    }

    #[test]
    fn barrier_respects_cancellation() {
        let clock = PhaseClock::new(0, 1);
        let adapter = TestClock::new();
        let token = CancellationToken::new();
        token.cancel();
        let result = clock.barrier(1, &adapter, &token);
        assert!(matches!(result, Err(crate::error::RunOutcome::Cancelled)));
    }

    #[test]
    fn barrier_waits_for_deadline() {
        let clock = PhaseClock::new(0, 3);
        let adapter = TestClock::new();
        let token = CancellationToken::new();
        adapter.advance_to(3);
        assert!(clock.barrier(1, &adapter, &token).is_ok());
    }
}
