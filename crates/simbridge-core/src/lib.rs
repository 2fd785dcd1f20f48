//! Simulation controller for the simbridge daemon.
//!
//! This crate is the bridge between two asynchronous worlds: a
//! single-threaded discrete-event simulation that must run uninterrupted
//! on its own thread as the sole mutator of simulation state, and the
//! multi-threaded HTTP surface that accepts client requests at arbitrary
//! real-time instants.
//!
//! # Architecture
//!
//! All simulation mutations are serialized onto the simulator thread
//! through thread-safe [`CommandQueue`]s. HTTP-side callers hold a
//! [`ControllerHandle`]; the simulator thread runs the
//! [`SimulationController`] main loop, which drains the queues each pass,
//! advances simulated time toward the client-driven horizon, and pushes
//! terminal job events onto the event queue for delivery.
//!
//! [`CommandQueue`]: queue::CommandQueue
//! [`ControllerHandle`]: controller::ControllerHandle
//! [`SimulationController`]: controller::SimulationController

pub mod controller;
pub mod error;
pub mod events;
pub mod launch;
pub mod queue;

pub use controller::{ControllerHandle, ServiceSpec, SimulationController, TaskRequest};
pub use error::{ControllerError, InitError};
pub use events::EventRecord;
pub use launch::{launch, LaunchSpec, RunningSimulation};
pub use queue::CommandQueue;
