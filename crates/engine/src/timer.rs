/// Identifies one armed timeout; a fired or cancelled token is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    token: TimeoutToken,
    fires_at: u64,
}

impl Timeout {
    pub fn token(&self) -> TimeoutToken {
        self.token
    }

    pub fn fires_at(&self) -> u64 {
        self.fires_at
    }

    pub fn is_due(&self, now: u64) -> bool {
        now >= self.fires_at
    }
}

/// Holds at most one pending timeout. Arming replaces whatever was armed.
#[derive(Debug, Default)]
pub struct TimeoutSlot {
    issued: u64,
    armed: Option<Timeout>,
}

impl TimeoutSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: u64, delay_ms: u64) -> TimeoutToken {
        self.issued += 1;
        let token = TimeoutToken(self.issued);
        self.armed = Some(Timeout {
            token,
            fires_at: now.saturating_add(delay_ms),
        });
        token
    }

    pub fn cancel(&mut self) -> Option<TimeoutToken> {
        self.armed.take().map(|t| t.token)
    }

    pub fn armed(&self) -> Option<Timeout> {
        self.armed
    }

    /// Disarm and return the token if the timeout is due at `now`.
    pub fn fire(&mut self, now: u64) -> Option<TimeoutToken> {
        match self.armed {
            Some(t) if t.is_due(now) => {
                self.armed = None;
                Some(t.token)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_at_deadline() {
        let mut slot = TimeoutSlot::new();
        let token = slot.arm(100, 50);
        assert_eq!(slot.fire(149), None);
        assert_eq!(slot.fire(150), Some(token));
        assert_eq!(slot.fire(500), None);
    }

    #[test]
    fn rearming_replaces_previous_token() {
        let mut slot = TimeoutSlot::new();
        let first = slot.arm(0, 10);
        let second = slot.arm(5, 10);
        assert_ne!(first, second);
        assert_eq!(slot.fire(10), None);
        assert_eq!(slot.fire(15), Some(second));
    }

    #[test]
    fn cancelled_timeout_never_fires() {
        let mut slot = TimeoutSlot::new();
        let token = slot.arm(0, 10);
        assert_eq!(slot.cancel(), Some(token));
        assert_eq!(slot.fire(1_000), None);
    }
}
