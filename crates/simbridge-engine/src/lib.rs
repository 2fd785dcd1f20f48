//! Discrete-event simulation engine for the simbridge daemon.
//!
//! The engine simulates cluster-like compute services executing standard
//! jobs over virtual time. It exposes exactly the primitives the
//! simulation controller needs:
//!
//! - **Platform instantiation** from an XML description ([`Platform`])
//! - **A simulated clock** readable from any thread ([`SimClock`])
//! - **"Sleep until X"** and **"wait for next event"** primitives
//!   ([`Simulation::sleep`], [`Simulation::poll_event`],
//!   [`Simulation::advance_to_next_event`])
//! - **Factories** for tasks, jobs, and compute services
//!
//! # Threading
//!
//! A [`Simulation`] is owned by exactly one thread and is not `Sync`.
//! The clock and platform are shared read-only handles; everything that
//! mutates simulation state goes through the owning thread.

pub mod clock;
pub mod error;
pub mod event;
pub mod job;
pub mod platform;
pub mod simulation;

pub use clock::SimClock;
pub use error::EngineError;
pub use event::{EngineEvent, JobOutcome};
pub use job::{StandardJob, TaskSpec};
pub use platform::Platform;
pub use simulation::{ComputeServiceSpec, EngineConfig, Simulation, Workflow};
