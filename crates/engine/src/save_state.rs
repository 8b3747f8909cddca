use tracing::debug;

use crate::config::{BoardConfig, OverlapPolicy};
use crate::error::EngineError;
use crate::timer::{Timeout, TimeoutSlot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    Success,
    Error,
}

impl SaveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Saving => "saving",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Issued by [`SaveStateMachine::begin`]; hand it back to `resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CommitTicket(u64);

/// Per-row commit lifecycle: idle -> saving -> success/error -> idle.
///
/// Success and error fall back to idle through a timeout held in a
/// [`TimeoutSlot`]. Starting a new commit cancels that timeout, and so does
/// disposal. When commits overlap, only the most recently issued ticket moves
/// the state; older resolutions are dropped.
#[derive(Debug)]
pub struct SaveStateMachine {
    state: SaveState,
    reset: TimeoutSlot,
    issued: u64,
    in_flight: usize,
    success_reset_ms: u64,
    error_reset_ms: u64,
    overlap: OverlapPolicy,
    disposed: bool,
}

impl SaveStateMachine {
    pub fn new(config: &BoardConfig) -> Self {
        Self {
            state: SaveState::Idle,
            reset: TimeoutSlot::new(),
            issued: 0,
            in_flight: 0,
            success_reset_ms: config.success_reset_ms,
            error_reset_ms: config.error_reset_ms,
            overlap: config.overlap,
            disposed: false,
        }
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn pending_reset(&self) -> Option<Timeout> {
        self.reset.armed()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn begin(&mut self) -> Result<CommitTicket, EngineError> {
        if self.disposed {
            return Err(EngineError::RowDisposed("save state".into()));
        }
        if self.state == SaveState::Saving && self.overlap == OverlapPolicy::Reject {
            return Err(EngineError::CommitInFlight(format!("ticket {}", self.issued)));
        }

        self.reset.cancel();
        self.issued += 1;
        self.in_flight += 1;
        self.state = SaveState::Saving;
        Ok(CommitTicket(self.issued))
    }

    /// Record the outcome of a commit. Returns whether it changed the state.
    pub fn resolve(&mut self, ticket: CommitTicket, ok: bool, now: u64) -> bool {
        if self.disposed {
            debug!(ticket = ticket.0, "resolution after disposal ignored");
            return false;
        }
        self.in_flight = self.in_flight.saturating_sub(1);
        if ticket.0 != self.issued {
            debug!(ticket = ticket.0, latest = self.issued, ok, "stale commit resolution ignored");
            return false;
        }

        let delay = if ok {
            self.state = SaveState::Success;
            self.success_reset_ms
        } else {
            self.state = SaveState::Error;
            self.error_reset_ms
        };
        self.reset.arm(now, delay);
        true
    }

    /// Advance time. Returns true when a pending reset moved the state to idle.
    pub fn tick(&mut self, now: u64) -> bool {
        if self.disposed {
            return false;
        }
        if self.reset.fire(now).is_some() {
            self.state = SaveState::Idle;
            return true;
        }
        false
    }

    pub fn dispose(&mut self) {
        self.reset.cancel();
        self.disposed = true;
    }
}
