//! Error types for the simulation engine.

/// Errors raised by engine primitives.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The platform description could not be parsed.
    #[error("invalid platform description: {reason}")]
    InvalidPlatform {
        /// Explanation of what is wrong with the description.
        reason: String,
    },

    /// A hostname does not exist in the loaded platform.
    #[error("host '{hostname}' does not exist in the platform")]
    UnknownHost {
        /// The offending hostname.
        hostname: String,
    },

    /// A compute service name did not resolve to a started service.
    #[error("compute service '{name}' is not started")]
    UnknownService {
        /// The offending service name.
        name: String,
    },

    /// A service with this name has already been started.
    #[error("compute service '{name}' is already started")]
    DuplicateService {
        /// The duplicated service name.
        name: String,
    },
}
