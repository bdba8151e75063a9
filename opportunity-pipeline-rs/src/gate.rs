//! Caller-side request supersession
//!
//! A `RequestGate` tracks the single request a caller currently cares about
//! (the "latest wins" rule of an interactive screen). Starting a new request
//! or pressing stop cancels the previous one. Results are applied to caller
//! state through `RequestTicket::deliver`, which checks currency and runs the
//! update under the same lock, so a superseded result can never land.

use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct GateState {
    generation: u64,
    token: CancellationToken,
}

/// Tracks the current request of one caller
#[derive(Debug, Clone)]
pub struct RequestGate {
    state: Arc<Mutex<GateState>>,
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestGate {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState {
                generation: 0,
                token: CancellationToken::new(),
            })),
        }
    }

    /// Start a new request, cancelling whichever one was current
    pub fn begin(&self) -> RequestTicket {
        let mut state = lock(&self.state);
        state.token.cancel();
        state.generation += 1;
        state.token = CancellationToken::new();

        debug!("Request generation {} started", state.generation);

        RequestTicket {
            generation: state.generation,
            token: state.token.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Stop the current request; its result will be discarded
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        state.token.cancel();
        state.generation += 1;
        debug!("Request cancelled, generation now {}", state.generation);
    }

    pub fn generation(&self) -> u64 {
        lock(&self.state).generation
    }
}

/// Handle for one started request
#[derive(Debug, Clone)]
pub struct RequestTicket {
    generation: u64,
    token: CancellationToken,
    state: Arc<Mutex<GateState>>,
}

impl RequestTicket {
    /// Token to pass to `Orchestrator::run_cancellable`
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this ticket still belongs to the current request
    pub fn is_current(&self) -> bool {
        let state = lock(&self.state);
        self.is_current_locked(&state)
    }

    /// Apply `value` through `apply` only if this request is still current.
    ///
    /// Returns whether the value was applied. The check and the update happen
    /// under one lock acquisition.
    pub fn deliver<T, F>(&self, value: T, apply: F) -> bool
    where
        F: FnOnce(T),
    {
        let state = lock(&self.state);
        if !self.is_current_locked(&state) {
            debug!("Discarding result of superseded generation {}", self.generation);
            return false;
        }
        apply(value);
        true
    }

    fn is_current_locked(&self, state: &GateState) -> bool {
        state.generation == self.generation && !self.token.is_cancelled()
    }
}

fn lock(state: &Mutex<GateState>) -> MutexGuard<'_, GateState> {
    // the state stays consistent even if an `apply` closure panicked
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
