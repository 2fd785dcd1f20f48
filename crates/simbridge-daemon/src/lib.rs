//! HTTP surface of the simbridge daemon.
//!
//! Two servers live in this crate:
//!
//! - The **supervisor** ([`supervisor`]) listens on the daemon's public
//!   port and serves exactly one endpoint, `POST /api/startSimulation`.
//!   For each request it allocates a free port, spawns a dedicated
//!   session process, and relays the session's init report back to the
//!   client.
//! - The **session server** ([`session`]) runs inside each session
//!   process, bound to the allocated port, and maps the REST surface
//!   onto the simulation controller. Its lifetime is one client session.
//!
//! All responses are JSON. Session responses carry
//! `wrench_api_request_success` and, on failure, `failure_cause`
//! (see [`api`]).

pub mod api;
pub mod session;
pub mod supervisor;

pub use session::{session_router, SessionState};
pub use supervisor::{supervisor_router, SupervisorConfig, SupervisorState};
