//! Distributed key generation engine for a threshold random-beacon client.
//!
//! Implements the Pedersen/GJKR-style verifiable-secret-sharing DKG: twelve
//! barrier-synchronized phases ([`dkg::context::Phase`]) driven by a block
//! height ([`clock::PhaseClock`]), with accusation/justification handling
//! for both the VSS shares (phases 4-5) and the public key share points
//! (phases 8-9), and Lagrange reconstruction of disqualified members'
//! individual keys (phase 11).

pub mod aead;
pub mod assembly;
pub mod bigmod;
pub mod bus;
pub mod clock;
pub mod dkg;
pub mod error;
pub mod group;
pub mod kx;
pub mod params;
pub mod polynomial;
pub mod vss;

pub use assembly::{DkgOutput, PublicKeyShare};
pub use clock::{CancellationToken, ChainAdapter, PhaseClock};
pub use dkg::context::{MemberContext, Phase};
pub use dkg::state_machine::DkgStateMachine;
pub use error::DkgError;
pub use group::{GroupId, MemberIndex, Roster, RunId};
pub use params::PublicParameters;
