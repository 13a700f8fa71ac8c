//! The controller drives the configuration pipeline on behalf of the request
//! handlers: candidate cloning and patching, schema validation, rendering,
//! atomic persistence, and the external daemon invocations.
//!
//! Locking discipline: every operation that touches the candidate takes the
//! candidate lock first, which serialises candidate operations against each
//! other; the pending-confirm lock is only ever taken while holding the
//! candidate lock.  External daemon invocations are serialised by their own
//! process-wide lock.

use snafu::{ensure, OptionExt, ResultExt};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::exec::BirdExecutor;
use crate::server::error::{self, Result};
use confmgr::{ConfigManager, SchemaValidator};
use confstore::{FileStore, JsonFileStore};

pub(crate) struct ConfigState {
    running: RwLock<ConfigManager>,
    running_store: JsonFileStore,
    candidate: Mutex<Option<ConfigManager>>,
    pending_confirm: Mutex<Option<String>>,
    validator: SchemaValidator,
    target_store: FileStore,
    executor: BirdExecutor,
    exec_lock: Mutex<()>,
}

impl ConfigState {
    pub(crate) fn new(
        running: ConfigManager,
        running_store: JsonFileStore,
        validator: SchemaValidator,
        target_store: FileStore,
        executor: BirdExecutor,
    ) -> Self {
        Self {
            running: RwLock::new(running),
            running_store,
            candidate: Mutex::new(None),
            pending_confirm: Mutex::new(None),
            validator,
            target_store,
            executor,
            exec_lock: Mutex::new(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().ok().context(error::LockPoisonedSnafu)
}

fn read_running(state: &ConfigState) -> Result<RwLockReadGuard<'_, ConfigManager>> {
    state.running.read().ok().context(error::LockPoisonedSnafu)
}

fn write_running(state: &ConfigState) -> Result<RwLockWriteGuard<'_, ConfigManager>> {
    state.running.write().ok().context(error::LockPoisonedSnafu)
}

/// Serializes the running document.
pub(crate) fn get_running(state: &ConfigState) -> Result<Vec<u8>> {
    let running = read_running(state)?;
    running.serialize().context(error::ConfigSnafu {
        op: "serialize running config",
    })
}

/// Validates the given document against the schema, then returns the patch
/// that transforms the running document into it.
pub(crate) fn diff_running(state: &ConfigState, other: &[u8]) -> Result<Vec<u8>> {
    state.validator.validate(other).context(error::SchemaSnafu)?;
    let running = read_running(state)?;
    running.diff(other).context(error::ConfigSnafu {
        op: "diff running config",
    })
}

/// Applies a patch to the candidate, cloning the running document into a
/// fresh candidate first if this session has none yet, then validates,
/// renders, persists, and externally checks the result.
pub(crate) fn update_candidate(state: &ConfigState, patch: &[u8]) -> Result<()> {
    let mut candidate = lock(&state.candidate)?;
    if candidate.is_none() {
        debug!("Cloning running config into a fresh candidate");
        let running = read_running(state)?;
        *candidate = Some(running.clone());
    }
    let manager = candidate.as_mut().context(error::NoCandidateSnafu)?;

    // A failed patch leaves the candidate document unchanged, and retained.
    manager.apply_patch(patch).context(error::PatchSnafu)?;

    if let Err(e) = check_candidate(state, manager) {
        *candidate = None;
        return Err(e);
    }
    Ok(())
}

/// The validate → render → persist → external-check tail of an update.  If a
/// stage past the target write fails, the target file is restored to the
/// running document's rendering.
fn check_candidate(state: &ConfigState, manager: &ConfigManager) -> Result<()> {
    let serialized = manager.serialize().context(error::ConfigSnafu {
        op: "serialize candidate config",
    })?;
    state
        .validator
        .validate(&serialized)
        .context(error::SchemaSnafu)?;

    let document = manager.document().context(error::ConfigSnafu {
        op: "read candidate config",
    })?;
    let rendered = birdconf::render(document).context(error::RenderSnafu)?;

    let applied = (|| {
        state
            .target_store
            .save(rendered.as_bytes())
            .context(error::TargetWriteSnafu)?;
        let _guard = lock(&state.exec_lock)?;
        state.executor.validate().context(error::ExternalSnafu)
    })();
    if applied.is_err() {
        restore_target(state);
    }
    applied
}

/// Serializes the candidate document.
pub(crate) fn get_candidate(state: &ConfigState) -> Result<Vec<u8>> {
    let candidate = lock(&state.candidate)?;
    let manager = candidate.as_ref().context(error::NoCandidateSnafu)?;
    manager.serialize().context(error::ConfigSnafu {
        op: "serialize candidate config",
    })
}

/// Applies the candidate to the external daemon and promotes it to running.
pub(crate) fn commit(state: &ConfigState) -> Result<()> {
    let mut candidate = lock(&state.candidate)?;
    ensure!(candidate.is_some(), error::NoCandidateSnafu);

    // The target file already holds the candidate rendering from the last
    // update; ask the daemon to load it.
    let loaded = {
        let _guard = lock(&state.exec_lock)?;
        state.executor.load().context(error::ExternalSnafu)
    };
    if let Err(e) = loaded {
        restore_target(state);
        *candidate = None;
        return Err(e);
    }

    let manager = candidate.as_ref().context(error::NoCandidateSnafu)?;
    // The daemon now runs the candidate; a failure to persist or re-load
    // keeps the candidate so the client can retry the promotion.
    promote(state, manager)?;

    *candidate = None;
    *lock(&state.pending_confirm)? = None;
    info!("Committed candidate config to running");
    Ok(())
}

/// Applies the candidate to the external daemon and records the pending
/// confirmation owned by `token`.  Promotion is deferred to commit-confirm.
pub(crate) fn start_confirm_window(state: &ConfigState, token: &str) -> Result<()> {
    let mut candidate = lock(&state.candidate)?;
    ensure!(candidate.is_some(), error::NoCandidateSnafu);

    let loaded = {
        let _guard = lock(&state.exec_lock)?;
        state.executor.load().context(error::ExternalSnafu)
    };
    if let Err(e) = loaded {
        restore_target(state);
        rollback_daemon(state);
        *candidate = None;
        return Err(e);
    }

    *lock(&state.pending_confirm)? = Some(token.to_string());
    info!(
        "Candidate config applied, awaiting confirmation from '{}'",
        token
    );
    Ok(())
}

/// Promotes the candidate to running and closes the confirmation window.
pub(crate) fn commit_confirm(state: &ConfigState, token: &str) -> Result<()> {
    let mut candidate = lock(&state.candidate)?;
    let mut pending = lock(&state.pending_confirm)?;
    ensure!(
        pending.as_deref() == Some(token),
        error::NotPendingOwnerSnafu { token }
    );

    let manager = candidate.as_ref().context(error::NoCandidateSnafu)?;
    // On failure both the pending window and the candidate survive, so the
    // window timeout can still roll the daemon back.
    promote(state, manager)?;

    *candidate = None;
    *pending = None;
    info!("Commit confirmed by '{}'", token);
    Ok(())
}

/// Brings the daemon back to the running configuration without touching the
/// candidate, and closes the confirmation window.
pub(crate) fn commit_cancel(state: &ConfigState, token: &str) -> Result<()> {
    let _candidate = lock(&state.candidate)?;
    let mut pending = lock(&state.pending_confirm)?;
    ensure!(
        pending.as_deref() == Some(token),
        error::NotPendingOwnerSnafu { token }
    );

    // On failure the window stays open so its timeout retries the rollback.
    try_restore_target(state)?;
    {
        let _guard = lock(&state.exec_lock)?;
        state.executor.rollback().context(error::ExternalSnafu)?;
    }

    *pending = None;
    info!("Commit cancelled by '{}', daemon returned to running config", token);
    Ok(())
}

/// The confirmation window elapsed without a confirm.  Returns false when
/// the window was already closed by a confirm, cancel, or candidate delete.
pub(crate) fn expire_confirm_window(state: &ConfigState, token: &str) -> Result<bool> {
    let mut candidate = lock(&state.candidate)?;
    let mut pending = lock(&state.pending_confirm)?;
    if pending.as_deref() != Some(token) {
        return Ok(false);
    }

    warn!(
        "Commit confirmation window for '{}' elapsed, rolling back",
        token
    );
    *pending = None;
    *candidate = None;
    try_restore_target(state)?;
    let _guard = lock(&state.exec_lock)?;
    state.executor.rollback().context(error::ExternalSnafu)?;
    Ok(true)
}

/// Discards the candidate and converges the target file and the daemon back
/// onto the running configuration.  A no-op when there is nothing to discard.
pub(crate) fn delete_candidate(state: &ConfigState) -> Result<()> {
    let mut candidate = lock(&state.candidate)?;
    let mut pending = lock(&state.pending_confirm)?;
    if candidate.is_none() && pending.is_none() {
        return Ok(());
    }

    let had_pending = pending.is_some();
    *candidate = None;
    *pending = None;

    try_restore_target(state)?;
    let _guard = lock(&state.exec_lock)?;
    if had_pending {
        // The daemon is running the unconfirmed candidate; undo it.
        state.executor.rollback().context(error::ExternalSnafu)?;
    } else {
        state.executor.load().context(error::ExternalSnafu)?;
    }
    info!("Discarded candidate config");
    Ok(())
}

/// Rewrites the target file with the running document's rendering.
fn try_restore_target(state: &ConfigState) -> Result<()> {
    let running = read_running(state)?;
    let document = running.document().context(error::ConfigSnafu {
        op: "read running config",
    })?;
    let rendered = birdconf::render(document).context(error::RenderSnafu)?;
    state
        .target_store
        .save(rendered.as_bytes())
        .context(error::TargetWriteSnafu)
}

fn restore_target(state: &ConfigState) {
    if let Err(e) = try_restore_target(state) {
        error!("Failed to restore target config to running: {}", e);
    }
}

fn rollback_daemon(state: &ConfigState) {
    let result = (|| -> Result<()> {
        let _guard = lock(&state.exec_lock)?;
        state.executor.rollback().context(error::ExternalSnafu)
    })();
    if let Err(e) = result {
        error!("Failed to roll the daemon back to running: {}", e);
    }
}

/// Persists the given manager's document as the running configuration and
/// re-loads the running manager from disk.
fn promote(state: &ConfigState, manager: &ConfigManager) -> Result<()> {
    let document = manager.document().context(error::ConfigSnafu {
        op: "read candidate config",
    })?;
    state
        .running_store
        .save(document)
        .context(error::RunningWriteSnafu)?;

    let mut running = write_running(state)?;
    running.load().context(error::ConfigSnafu {
        op: "re-load running config",
    })
}
