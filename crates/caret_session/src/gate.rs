//! Completion barrier for synchronous edit sessions
//!
//! A synchronous `edit` call must not return before the session reaches
//! idle. The gate carries the final text across that hand-off: the
//! completion path opens it on the logic thread, the blocked caller observes
//! it through the scheduler's pump (or [`CompletionGate::wait`] on platforms
//! that can park the calling thread safely).

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Re-check interval for waiters that park on the condvar
const WAIT_RECHECK: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    text: Option<String>,
}

/// One-shot barrier carrying the session's final text
#[derive(Debug, Default)]
pub struct CompletionGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl CompletionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate, releasing every waiter
    ///
    /// Opening twice keeps the first text; completion is one-shot.
    pub fn open(&self, text: &str) {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            state.open = true;
            state.text = Some(text.to_string());
        }
        self.cond.notify_all();
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    /// Take the final text, leaving the gate open
    pub fn take_text(&self) -> Option<String> {
        self.state.lock().unwrap().text.take()
    }

    /// Park until the gate opens, re-checking on a bounded interval
    ///
    /// Only for threads that are safe to block; the logic thread pumps its
    /// scheduler instead so coordinator callbacks keep draining.
    pub fn wait(&self) -> String {
        let mut state = self.state.lock().unwrap();
        while !state.open {
            let (next, _) = self.cond.wait_timeout(state, WAIT_RECHECK).unwrap();
            state = next;
        }
        state.text.clone().unwrap_or_default()
    }
}
