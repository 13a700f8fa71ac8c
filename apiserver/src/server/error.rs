use snafu::Snafu;
use std::io;

use crate::{exec, session};

// Dispatcher and controller errors live together so the HTTP response code
// for every failure a request can hit is defined in one place.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum Error {
    // Session guard errors
    #[snafu(display("Not found authorization token"))]
    MissingToken,

    #[snafu(display("{}", source))]
    Session { source: session::Error },

    #[snafu(display("'{}' does not own the pending commit confirmation", token))]
    NotPendingOwner { token: String },

    // Pipeline errors
    #[snafu(display("Not found active candidate config"))]
    NoCandidate,

    #[snafu(display("Failed to {}: {}", op, source))]
    Config {
        op: String,
        source: confmgr::Error,
    },

    #[snafu(display("Failed to validate config against its schema: {}", source))]
    Schema { source: confmgr::Error },

    #[snafu(display("Failed to apply patch to config: {}", source))]
    Patch { source: confmgr::Error },

    #[snafu(display("Failed to render config into the target format: {}", source))]
    Render { source: birdconf::Error },

    #[snafu(display("Failed to save target config: {}", source))]
    TargetWrite { source: confstore::Error },

    #[snafu(display("Failed to save running config: {}", source))]
    RunningWrite { source: confstore::Error },

    #[snafu(display("External executor failed: {}", source))]
    External { source: exec::Error },

    #[snafu(display("Input '{}' cannot be empty", input))]
    EmptyInput { input: String },

    #[snafu(display("'{}' is not a valid timeout in seconds", input))]
    BadTimeout { input: String },

    #[snafu(display("Another thread poisoned a state lock by panicking"))]
    LockPoisoned,

    // Startup errors
    #[snafu(display("Failed to load schema: {}", source))]
    SchemaLoad { source: confstore::Error },

    #[snafu(display("Unable to serialize schema document: {}", source))]
    SchemaSerialize { source: serde_json::Error },

    #[snafu(display("Executor setup failed: {}", source))]
    ExecutorSetup { source: exec::Error },

    // Server lifecycle errors
    #[snafu(display("Unable to bind to {}: {}", address, source))]
    BindAddress { address: String, source: io::Error },

    #[snafu(display("Unable to start server: {}", source))]
    ServerStart { source: io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Response code for a missing Authorization header.
pub const STATUS_TOKEN_REQUIRED: u16 = 499;
/// Response code for a token that is not leased or not active.
pub const STATUS_TOKEN_INVALID: u16 = 498;

impl Error {
    /// HTTP response code for this failure.
    pub fn response_code(&self) -> u16 {
        use Error::*;
        match self {
            MissingToken => STATUS_TOKEN_REQUIRED,
            Session { source } => match source {
                session::Error::DuplicateToken { .. } => 409,
                session::Error::ActiveConflict { .. } => 409,
                session::Error::InvalidToken { .. } => STATUS_TOKEN_INVALID,
                session::Error::NotActive { .. } => STATUS_TOKEN_INVALID,
                session::Error::TimerAlreadyArmed { .. } => 500,
                session::Error::LockPoisoned => 500,
            },
            NotPendingOwner { .. } => 409,
            NoCandidate
            | Config { .. }
            | Schema { .. }
            | Patch { .. }
            | Render { .. }
            | TargetWrite { .. }
            | RunningWrite { .. }
            | External { .. }
            | EmptyInput { .. }
            | BadTimeout { .. }
            | LockPoisoned
            | SchemaLoad { .. }
            | SchemaSerialize { .. }
            | ExecutorSetup { .. }
            | BindAddress { .. }
            | ServerStart { .. } => 500,
        }
    }
}
