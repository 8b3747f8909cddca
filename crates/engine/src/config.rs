use std::str::FromStr;

use crate::error::EngineError;

/// What happens to a field's draft when its authoritative value changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReseedPolicy {
    /// Always overwrite the draft, even mid-edit.
    #[default]
    Always,
    /// Keep a focused, modified draft and flag it as drifted.
    PreserveFocused,
}

impl FromStr for ReseedPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "preserve_focused" => Ok(Self::PreserveFocused),
            other => Err(EngineError::Validation(format!("unknown reseed policy: {other}"))),
        }
    }
}

/// What a row does with a commit issued while another one is still saving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Send it; only the newest commit's result drives the save state.
    #[default]
    LatestWins,
    /// Refuse it with [`crate::EngineError::CommitInFlight`].
    Reject,
}

impl FromStr for OverlapPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest_wins" => Ok(Self::LatestWins),
            "reject" => Ok(Self::Reject),
            other => Err(EngineError::Validation(format!("unknown overlap policy: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub success_reset_ms: u64,
    pub error_reset_ms: u64,
    pub reseed: ReseedPolicy,
    pub overlap: OverlapPolicy,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            success_reset_ms: 1500,
            error_reset_ms: 2000,
            reseed: ReseedPolicy::default(),
            overlap: OverlapPolicy::default(),
        }
    }
}
