//! Error types for media-dl
//!
//! This module provides error handling for the library:
//! - Domain-specific variants (Engine, History, Config)
//! - A crate-wide `Result` alias
//! - Conversions from std/serde errors via `#[from]`

use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// This is the primary error type used throughout the library. Each variant
/// carries enough context to produce a human-readable failure message for the
/// task outcome it ends up in.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// Extraction engine failure (network, extraction, or transcode error)
    ///
    /// The engine adapter does not retry internally; the task runner decides
    /// whether another attempt is made.
    #[error("engine error: {0}")]
    Engine(String),

    /// The extraction engine binary could not be located
    #[error("engine binary not found: {0}")]
    EngineNotFound(String),

    /// History store failure
    ///
    /// History writes are recorded best-effort; the orchestrator logs and
    /// swallows this so a bookkeeping failure never fails the download it is
    /// recording.
    #[error("history error: {0}")]
    History(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}
