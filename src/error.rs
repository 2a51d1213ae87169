//! Error types for lightrun
//!
//! All modules use `LightrunResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lightrun operations
pub type LightrunResult<T> = Result<T, LightrunError>;

/// Exit code for every failure that keeps the child from running
///
/// Kept apart from 126/127, which a child or the shell fallback reports for
/// programs it could not execute or find.
pub const EXIT_SETUP_FAILURE: i32 = 125;

/// Exit code when the run was interrupted by a signal
pub const EXIT_CANCELLED: i32 = 130;

/// All errors that can occur in lightrun
#[derive(Error, Debug)]
pub enum LightrunError {
    // Project model errors
    #[error("No package.json found in {0} or any parent directory")]
    WorkspaceNotFound(PathBuf),

    #[error("Invalid manifest at {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Failed to enumerate binaries for {directory}: {reason}")]
    Enumeration { directory: PathBuf, reason: String },

    // Resolution errors
    #[error("Could not start shell fallback for `{command}`")]
    ResolutionFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Interpreter not found: {name}")]
    InterpreterNotFound { name: String },

    // Environment setup errors
    #[error("Failed to prepare execution environment: {context}")]
    EnvironmentSetup {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Child process errors
    #[error("Failed to spawn {program}")]
    ChildSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for {program}")]
    ChildWait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Interrupted")]
    Cancelled,

    // Cache errors
    #[error("Timed out after {secs}s waiting for cache lock {path}")]
    CacheLock { path: PathBuf, secs: u64 },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LightrunError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an environment setup error
    pub fn setup(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::EnvironmentSetup {
            context: context.into(),
            source,
        }
    }

    /// Create a spawn error
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::ChildSpawn {
            program: program.into(),
            source,
        }
    }

    /// Exit code reported by the CLI when this error ends the invocation
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => EXIT_CANCELLED,
            _ => EXIT_SETUP_FAILURE,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::WorkspaceNotFound(_) => Some("Run lightrun from inside a package directory"),
            Self::InterpreterNotFound { .. } => {
                Some("Install Node.js or set runtime.interpreter in the config file")
            }
            Self::CacheLock { .. } => {
                Some("Another lightrun process may be stuck; run: lightrun cache clear")
            }
            Self::EnvironmentSetup { .. } => Some("Check free disk space in the temp directory"),
            _ => None,
        }
    }
}
