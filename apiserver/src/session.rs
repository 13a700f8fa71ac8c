//! The session coordinator.
//!
//! Clients lease opaque tokens; at most one token is "active" at any moment,
//! and only the active session may hold a candidate document.  A background
//! reaper expires tokens that have been idle past the session timeout and
//! fires per-token one-shot timers.  Expiration callbacks and timer callbacks
//! always run with no coordinator lock held, so a callback may call back into
//! the coordinator.

use snafu::{ensure, OptionExt, Snafu};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Cadence of the reaper thread.
pub const REAPER_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Session token '{}' is already registered", token))]
    DuplicateToken { token: String },

    #[snafu(display("Not found session token '{}'", token))]
    InvalidToken { token: String },

    #[snafu(display("There is already an active session '{}'", active))]
    ActiveConflict { active: String },

    #[snafu(display("'{}' is not the active session token", token))]
    NotActive { token: String },

    #[snafu(display("A timer is already armed for session token '{}'", token))]
    TimerAlreadyArmed { token: String },

    #[snafu(display("Another thread poisoned a session lock by panicking"))]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, Error>;

type Callback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct SessionDetails {
    created_at: Instant,
    last_request_at: Instant,
}

struct OneShotTimer {
    started_at: Instant,
    delay: Duration,
    cancelled: bool,
    callback: Callback,
}

pub struct SessionManager {
    session_timeout: Duration,
    tokens: Mutex<HashMap<String, SessionDetails>>,
    active: Mutex<Option<String>>,
    expiration_callbacks: Mutex<HashMap<String, Callback>>,
    timers: Mutex<HashMap<String, OneShotTimer>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().ok().context(LockPoisonedSnafu)
}

impl SessionManager {
    /// Creates the coordinator and starts its reaper thread.  The reaper
    /// holds only a weak handle, so it stops once the coordinator is dropped.
    pub fn new(session_timeout: Duration) -> Arc<Self> {
        let manager = Arc::new(Self {
            session_timeout,
            tokens: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            expiration_callbacks: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
        });

        let weak: Weak<Self> = Arc::downgrade(&manager);
        thread::spawn(move || loop {
            thread::sleep(REAPER_INTERVAL);
            match weak.upgrade() {
                Some(manager) => manager.tick(Instant::now()),
                None => {
                    trace!("Session coordinator dropped, stopping reaper");
                    break;
                }
            }
        });

        manager
    }

    pub fn register(&self, token: &str) -> Result<()> {
        let mut tokens = lock(&self.tokens)?;
        ensure!(
            !tokens.contains_key(token),
            DuplicateTokenSnafu { token }
        );

        let now = Instant::now();
        tokens.insert(
            token.to_string(),
            SessionDetails {
                created_at: now,
                last_request_at: now,
            },
        );
        info!("Registered new session token '{}'", token);
        Ok(())
    }

    /// Confirms the token is leased and refreshes its inactivity clock.
    pub fn check(&self, token: &str) -> Result<()> {
        let mut tokens = lock(&self.tokens)?;
        let details = tokens
            .get_mut(token)
            .context(InvalidTokenSnafu { token })?;
        details.last_request_at = Instant::now();
        Ok(())
    }

    /// Makes the token the active session.  Re-activating the already-active
    /// token is fine; any other active session is a conflict.
    pub fn set_active(&self, token: &str) -> Result<()> {
        self.check(token)?;

        let mut active = lock(&self.active)?;
        if let Some(current) = active.as_deref() {
            ensure!(current == token, ActiveConflictSnafu { active: current });
        }
        *active = Some(token.to_string());
        Ok(())
    }

    pub fn check_active(&self, token: &str) -> Result<()> {
        self.check(token)?;

        let active = lock(&self.active)?;
        ensure!(active.as_deref() == Some(token), NotActiveSnafu { token });
        Ok(())
    }

    pub fn active_token(&self) -> Option<String> {
        match self.active.lock() {
            Ok(active) => active.clone(),
            Err(_) => {
                error!("Session active-token lock poisoned");
                None
            }
        }
    }

    /// Drops the token lease; clears the active slot if it held this token.
    pub fn remove(&self, token: &str) {
        if let Ok(mut tokens) = self.tokens.lock() {
            if tokens.remove(token).is_some() {
                info!("Removed session token '{}'", token);
            }
        }
        if let Ok(mut active) = self.active.lock() {
            if active.as_deref() == Some(token) {
                info!("Removed active session token '{}'", token);
                *active = None;
            }
        }
    }

    /// Registers a callback invoked with each token the reaper expires.
    pub fn register_expiration_callback<F>(&self, id: &str, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.expiration_callbacks.lock() {
            callbacks.insert(id.to_string(), Arc::new(callback));
        }
    }

    /// Arms the token's one-shot timer.  Arming while a timer is armed fails
    /// unless the previous one was cancelled.
    pub fn arm_once<F>(&self, token: &str, delay: Duration, callback: F) -> Result<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        {
            let tokens = lock(&self.tokens)?;
            ensure!(tokens.contains_key(token), InvalidTokenSnafu { token });
        }

        let mut timers = lock(&self.timers)?;
        if let Some(existing) = timers.get(token) {
            ensure!(existing.cancelled, TimerAlreadyArmedSnafu { token });
        }
        timers.insert(
            token.to_string(),
            OneShotTimer {
                started_at: Instant::now(),
                delay,
                cancelled: false,
                callback: Arc::new(callback),
            },
        );
        trace!("Armed one-shot timer for '{}' in {:?}", token, delay);
        Ok(())
    }

    pub fn cancel_once(&self, token: &str) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some(timer) = timers.get_mut(token) {
                timer.cancelled = true;
                trace!("Cancelled one-shot timer for '{}'", token);
            }
        }
    }

    /// One reaper pass: expire idle sessions, then sweep one-shot timers.
    /// Factored out of the reaper thread so tests can drive it with a
    /// synthetic clock.
    fn tick(&self, now: Instant) {
        let expired: Vec<String> = match self.tokens.lock() {
            Ok(tokens) => tokens
                .iter()
                .filter(|(_, details)| {
                    now.saturating_duration_since(details.last_request_at) > self.session_timeout
                })
                .map(|(token, _)| token.clone())
                .collect(),
            Err(_) => {
                error!("Session token lock poisoned, skipping reaper pass");
                return;
            }
        };

        for token in &expired {
            info!("Session token '{}' expired", token);
            let callbacks: Vec<Callback> = match self.expiration_callbacks.lock() {
                Ok(callbacks) => callbacks.values().cloned().collect(),
                Err(_) => Vec::new(),
            };
            for callback in callbacks {
                callback(token);
            }

            self.remove(token);
        }

        let mut fired: Vec<(String, Callback)> = Vec::new();
        if let Ok(mut timers) = self.timers.lock() {
            let done: Vec<String> = timers
                .iter()
                .filter(|(_, timer)| {
                    timer.cancelled
                        || now.saturating_duration_since(timer.started_at) > timer.delay
                })
                .map(|(token, _)| token.clone())
                .collect();
            for token in done {
                if let Some(timer) = timers.remove(&token) {
                    if !timer.cancelled {
                        fired.push((token, timer.callback));
                    }
                }
            }
        }

        for (token, callback) in fired {
            trace!("One-shot timer for '{}' fired", token);
            callback(&token);
        }
    }

    #[cfg(test)]
    fn created_at(&self, token: &str) -> Option<Instant> {
        self.tokens
            .lock()
            .ok()
            .and_then(|tokens| tokens.get(token).map(|d| d.created_at))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> Arc<SessionManager> {
        SessionManager::new(Duration::from_secs(360))
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let sessions = manager();
        sessions.register("tok1").unwrap();
        let err = sessions.register("tok1").unwrap_err();
        assert!(matches!(err, Error::DuplicateToken { .. }));
    }

    #[test]
    fn check_refreshes_and_rejects_unknown() {
        let sessions = manager();
        sessions.register("tok1").unwrap();
        sessions.check("tok1").unwrap();
        assert!(matches!(
            sessions.check("ghost").unwrap_err(),
            Error::InvalidToken { .. }
        ));
        assert!(sessions.created_at("tok1").is_some());
    }

    #[test]
    fn only_one_session_may_be_active() {
        let sessions = manager();
        sessions.register("tok1").unwrap();
        sessions.register("tok2").unwrap();

        sessions.set_active("tok1").unwrap();
        // Re-activation of the same token is fine.
        sessions.set_active("tok1").unwrap();
        assert!(matches!(
            sessions.set_active("tok2").unwrap_err(),
            Error::ActiveConflict { .. }
        ));

        sessions.check_active("tok1").unwrap();
        assert!(matches!(
            sessions.check_active("tok2").unwrap_err(),
            Error::NotActive { .. }
        ));
    }

    #[test]
    fn remove_clears_active() {
        let sessions = manager();
        sessions.register("tok1").unwrap();
        sessions.set_active("tok1").unwrap();

        sessions.remove("tok1");
        assert_eq!(sessions.active_token(), None);
        sessions.check("tok1").unwrap_err();
    }

    #[test]
    fn idle_session_expires_within_one_tick() {
        let sessions = SessionManager::new(Duration::ZERO);
        sessions.register("tok1").unwrap();
        sessions.set_active("tok1").unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let seen = fired.clone();
        sessions.register_expiration_callback("test", move |token| {
            assert_eq!(token, "tok1");
            seen.fetch_add(1, Ordering::SeqCst);
        });

        sessions.tick(Instant::now() + Duration::from_secs(1));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(sessions.active_token(), None);
        sessions.check("tok1").unwrap_err();
    }

    #[test]
    fn one_shot_timer_fires_once_and_can_be_rearmed() {
        let sessions = manager();
        sessions.register("tok1").unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let seen = fired.clone();
        sessions
            .arm_once("tok1", Duration::ZERO, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        sessions.tick(Instant::now() + Duration::from_secs(1));
        sessions.tick(Instant::now() + Duration::from_secs(2));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // The fired timer is gone, so arming again succeeds.
        sessions.arm_once("tok1", Duration::ZERO, |_| {}).unwrap();
    }

    #[test]
    fn arming_over_a_live_timer_fails() {
        let sessions = manager();
        sessions.register("tok1").unwrap();

        sessions
            .arm_once("tok1", Duration::from_secs(600), |_| {})
            .unwrap();
        assert!(matches!(
            sessions.arm_once("tok1", Duration::ZERO, |_| {}).unwrap_err(),
            Error::TimerAlreadyArmed { .. }
        ));

        // A cancelled timer may be replaced without waiting for the sweep.
        sessions.cancel_once("tok1");
        sessions.arm_once("tok1", Duration::ZERO, |_| {}).unwrap();
    }

    #[test]
    fn cancelled_timer_does_not_fire() {
        let sessions = manager();
        sessions.register("tok1").unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let seen = fired.clone();
        sessions
            .arm_once("tok1", Duration::ZERO, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        sessions.cancel_once("tok1");

        sessions.tick(Instant::now() + Duration::from_secs(1));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn arming_requires_a_leased_token() {
        let sessions = manager();
        sessions.arm_once("ghost", Duration::ZERO, |_| {}).unwrap_err();
    }
}
