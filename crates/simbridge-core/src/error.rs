//! Error types for the controller and the launch sequence.

use simbridge_engine::EngineError;

/// Errors returned by controller operations invoked from HTTP threads.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The requested service type is not supported.
    #[error("Unknown service type '{service_type}' - cannot create it")]
    UnknownServiceType {
        /// The offending type tag.
        service_type: String,
    },

    /// A head host that is not part of the platform.
    #[error("unknown head host '{hostname}'")]
    UnknownHeadHost {
        /// The offending hostname.
        hostname: String,
    },

    /// A job name that does not resolve in the job registry.
    #[error("unknown job '{name}'")]
    UnknownJob {
        /// The offending job name.
        name: String,
    },

    /// A compute service name that does not resolve in the service registry.
    #[error("unknown compute service '{name}'")]
    UnknownComputeService {
        /// The offending service name.
        name: String,
    },

    /// A request field failed validation.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument.
        reason: String,
    },
}

/// Typed errors from the simulation launch sequence.
///
/// Each maps to one step of the launch: platform load, controller-host
/// check, controller creation, simulator-thread start.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The platform XML was rejected by the engine.
    #[error("{0}")]
    Platform(#[from] EngineError),

    /// The controller host is absent from the loaded platform.
    #[error("The platform does not contain a controller host with name {hostname}")]
    MissingControllerHost {
        /// The requested controller hostname.
        hostname: String,
    },

    /// The simulator thread could not be spawned.
    #[error("cannot start simulation thread: {0}")]
    Thread(#[from] std::io::Error),
}
