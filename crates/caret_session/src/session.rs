//! Edit-session records and request options

use std::sync::Arc;

use caret_core::change_log::ChangeLog;
use caret_core::input::{InputConstraint, KeyCode};
use caret_core::model::{ModelId, SharedEditable};
use caret_core::snapshot::EditSnapshot;
use caret_platform::widget::WidgetId;

use crate::gate::CompletionGate;

/// How a requesting call relates to the session's lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditMode {
    /// The requesting call blocks until the session reaches idle
    Sync,
    /// The requesting call returns immediately; the native widget stays
    /// live (possibly hidden) while the application keeps running
    Async,
}

/// Why the last session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EndReason {
    /// Programmatic close, supersede, or construction failure
    #[default]
    Undefined,
    /// The user triggered the keyboard's semantic action key
    ImeAction,
    /// A pointer landed outside the edited field
    TouchOutside,
    /// A system key (back/menu) was pressed
    SystemKey,
}

/// Session phase; idle is represented by the absence of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Widget construction is marshaling to the host UI thread
    Requesting,
    /// The native widget owns the keystroke stream
    Visible,
    /// The widget is off-screen; keystrokes buffer into the change log
    Hidden,
    /// Tear-down is in progress
    Completing,
}

/// Per-request options
///
/// Unset fields default from the model when the session starts.
#[derive(Debug, Default)]
pub struct EditOptions {
    /// Text to edit instead of the model's current text
    pub initial_text: Option<String>,
    /// Max length override in chars (0 = unlimited)
    pub max_length: Option<usize>,
    /// Input constraint override
    pub constraint: Option<InputConstraint>,
}

impl EditOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit this text instead of the model's current text
    pub fn initial_text(mut self, text: impl Into<String>) -> Self {
        self.initial_text = Some(text.into());
        self
    }

    /// Override the maximum text length
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Override the input constraint
    pub fn constraint(mut self, constraint: InputConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

/// How a session reports its final text
pub(crate) enum Completion {
    /// Synchronous request: open the barrier
    Gate(Arc<CompletionGate>),
    /// Asynchronous request: invoke on the logic thread
    Callback(Box<dyn FnOnce(String) + Send>),
    /// No per-request carrier (focus-chained sessions); only the
    /// coordinator-level completion listener observes the result
    Detached,
}

/// A queued edit request waiting for the active session to drain
pub(crate) struct PendingEdit {
    pub model: SharedEditable,
    pub options: EditOptions,
    pub mode: EditMode,
    pub completion: Completion,
}

/// The single live edit session
///
/// At most one exists process-wide; it is created when a request leaves
/// idle and destroyed when the completion path takes it back out.
pub(crate) struct EditSession {
    pub model: SharedEditable,
    pub model_id: ModelId,
    pub snapshot: EditSnapshot,
    pub phase: Phase,
    pub mode: EditMode,
    /// Present only while the native widget is constructed
    pub widget: Option<WidgetId>,
    /// Last known native selection
    pub selection: (usize, usize),
    pub end_reason: EndReason,
    pub initial_text: String,
    /// Last text written back to the model; the widget's initialization
    /// write is recognized by matching against this
    pub known_model_text: String,
    /// Set once the widget's text first converges with the model's,
    /// separating the framework's own initialization write from user input
    pub started: bool,
    /// Open only while the widget is hidden or resynchronizing
    pub change_log: Option<Arc<ChangeLog>>,
    /// Currently held key, for auto-repeat suppression
    pub pressed_key: Option<KeyCode>,
    /// An end request arrived while construction was still in flight
    pub end_requested: bool,
    /// Placement last pushed to the widget
    pub last_placement: (i32, i32, u32, u32),
    pub completion: Option<Completion>,
}

impl EditSession {
    pub fn new(
        model: SharedEditable,
        model_id: ModelId,
        snapshot: EditSnapshot,
        mode: EditMode,
        initial_text: String,
        completion: Completion,
    ) -> Self {
        let last_placement = (snapshot.x, snapshot.y, snapshot.width, snapshot.height);
        Self {
            model,
            model_id,
            snapshot,
            phase: Phase::Requesting,
            mode,
            widget: None,
            selection: (0, 0),
            end_reason: EndReason::Undefined,
            known_model_text: initial_text.clone(),
            initial_text,
            started: false,
            change_log: None,
            pressed_key: None,
            end_requested: false,
            last_placement,
            completion: Some(completion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_options_builder() {
        let options = EditOptions::new()
            .initial_text("seed")
            .max_length(12)
            .constraint(InputConstraint::Email);
        assert_eq!(options.initial_text.as_deref(), Some("seed"));
        assert_eq!(options.max_length, Some(12));
        assert_eq!(options.constraint, Some(InputConstraint::Email));
    }

    #[test]
    fn test_unset_options_default_from_model_later() {
        let options = EditOptions::new();
        assert!(options.initial_text.is_none());
        assert!(options.max_length.is_none());
        assert!(options.constraint.is_none());
    }
}
