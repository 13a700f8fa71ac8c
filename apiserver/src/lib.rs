/*!
# Background

This is the configuration-management API server for the routing daemon.  It
holds the canonical, schema-validated configuration document and lets clients
mutate a private candidate copy through JSON Patch, preview diffs, and commit
— optionally under a confirmation timeout that automatically rolls the daemon
back when no confirm arrives.

The `server` module owns the HTTP surface and drives the pipeline: patch the
candidate, validate it against the schema, render it to the daemon's
configuration language, persist the rendered file atomically, and have the
daemon check or load it.  The `session` module is the transaction
coordinator: leased tokens, the single active session, inactivity expiry, and
per-token one-shot timers.  The `exec` module wraps the daemon's control
binary, and `logring` keeps the most recent error messages for the log
endpoint.
*/

#[macro_use]
extern crate log;

pub mod exec;
pub mod logring;
pub mod server;
pub mod session;

pub use server::{serve, ServerSettings};

/// A session that makes no request for this long is expired by the reaper.
pub const SESSION_TIMEOUT_SECS: u64 = 360;

/// A candidate left untouched after an update for this long is discarded.
pub const CANDIDATE_IDLE_TIMEOUT_SECS: u64 = 180;

/// Confirmation window used when a commit-timeout request names no duration.
pub const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 60;

/// Capacity of the error-log ring buffer.
pub const LOG_RING_CAPACITY: usize = 64;
