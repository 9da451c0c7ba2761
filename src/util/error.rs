//! Error types for the transport library.

use thiserror::Error;

/// Main error type for scene construction and photon transport.
#[derive(Error, Debug)]
pub enum Error {
    /// Two solids overlap without one fully containing the other
    #[error("Solids '{first}' and '{second}' partially overlap")]
    PartialOverlap { first: String, second: String },

    /// Stacking two cuboids whose faces do not match
    #[error("Cannot stack '{other}' on surface '{surface}' of '{on}': mismatched cross-section")]
    MismatchedStack {
        on: String,
        other: String,
        surface: String,
    },

    /// Surface label not present in a collection
    #[error("Surface not found: {0}")]
    SurfaceNotFound(String),

    /// A surface whose polygons disagree on their environment
    #[error("Surface '{0}' does not have a single inside environment")]
    AmbiguousEnvironment(String),

    /// Material coefficients out of range
    #[error("Invalid material: {0}")]
    InvalidMaterial(String),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation the scene model does not support
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Stepping a photon that is no longer alive
    #[error("Photon is dead and cannot be stepped")]
    DeadPhoton,

    /// Propagation attempted without an intersection finder
    #[error("No intersection finder bound for propagation")]
    MissingIntersectionFinder,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;
