//! Virtual-keyboard visibility heuristic
//!
//! Hosts provide no reliable synchronous query for whether the on-screen
//! keyboard is up. This tracker records what was last *requested* plus a
//! timestamp of the last hide; a hidden keyboard is still reported as likely
//! visible for a short decay window while the host animates it away.
//! Callers must tolerate false positives for up to [`HIDE_DECAY`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long after a hide request the keyboard is still assumed on screen
pub const HIDE_DECAY: Duration = Duration::from_millis(2000);

/// Process-wide bookkeeping of virtual-keyboard visibility requests
#[derive(Debug, Default)]
pub struct KeyboardVisibility {
    inner: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    requested: bool,
    last_hide: Option<Instant>,
}

impl KeyboardVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a show/hide request issued to the host
    pub fn set_requested(&self, visible: bool) {
        tracing::trace!("virtual keyboard requested visible={visible}");
        let mut state = self.inner.lock().unwrap();
        if state.requested && !visible {
            state.last_hide = Some(Instant::now());
        }
        state.requested = visible;
    }

    /// Last requested state, without the decay heuristic
    pub fn requested(&self) -> bool {
        self.inner.lock().unwrap().requested
    }

    /// Best-effort estimate of whether the keyboard is on screen
    pub fn is_likely_visible(&self) -> bool {
        self.is_likely_visible_at(Instant::now())
    }

    /// Heuristic evaluated against a caller-supplied clock
    pub fn is_likely_visible_at(&self, now: Instant) -> bool {
        let state = self.inner.lock().unwrap();
        if state.requested {
            return true;
        }
        match state.last_hide {
            Some(hidden) => now.saturating_duration_since(hidden) < HIDE_DECAY,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_hidden() {
        let kb = KeyboardVisibility::new();
        assert!(!kb.is_likely_visible());
    }

    #[test]
    fn test_visible_while_requested() {
        let kb = KeyboardVisibility::new();
        kb.set_requested(true);
        assert!(kb.requested());
        assert!(kb.is_likely_visible());
    }

    #[test]
    fn test_decay_window_after_hide() {
        let kb = KeyboardVisibility::new();
        kb.set_requested(true);
        kb.set_requested(false);

        let now = Instant::now();
        assert!(kb.is_likely_visible_at(now));
        assert!(kb.is_likely_visible_at(now + Duration::from_millis(1999)));
        assert!(!kb.is_likely_visible_at(now + HIDE_DECAY + Duration::from_millis(1)));
    }

    #[test]
    fn test_hide_without_prior_show_has_no_decay() {
        let kb = KeyboardVisibility::new();
        kb.set_requested(false);
        assert!(!kb.is_likely_visible());
    }
}
