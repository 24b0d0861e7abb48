//! Focus-chain hand-off
//!
//! When a session ends on the IME "next" action, editing hands off to the
//! field the snapshot recorded as the next-focus-down target. The hand-off
//! runs only after the previous session reaches idle, so two native widgets
//! never coexist.

use std::sync::Arc;

use caret_core::model::SharedEditable;

use crate::coordinator::EditCoordinator;
use crate::session::{Completion, EditMode, EditOptions};

/// Start editing `next` if it is still an editable, enabled field
///
/// Runs on the logic thread, after the previous session reached idle. A
/// target that became non-editable or disabled in the meantime is skipped
/// silently; the chain simply ends. The new session edits the target's
/// current text and reports through the coordinator-level completion
/// listener.
pub(crate) fn dispatch_next(
    coordinator: &Arc<EditCoordinator>,
    next: SharedEditable,
    mode: EditMode,
) {
    let eligible = {
        let guard = next.lock().unwrap();
        guard.is_editable() && guard.is_enabled()
    };
    if !eligible {
        tracing::debug!("next-focus target no longer editable, ending chain");
        return;
    }
    coordinator.begin_edit(next, EditOptions::new(), mode, Completion::Detached);
}
