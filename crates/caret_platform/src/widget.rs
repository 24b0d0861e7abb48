//! Native text-widget backend seam
//!
//! A [`WidgetBackend`] owns the lifecycle of the host platform's real
//! text-input control. Every method is host-UI-thread-only by contract; the
//! session coordinator is responsible for marshaling calls there. Backends
//! report user input upward through the [`WidgetEventSink`] handed to
//! [`WidgetBackend::create`], also on the host UI thread.

use std::sync::Arc;

use caret_core::input::{ActionHint, KeyCode};
use caret_core::snapshot::EditSnapshot;

use crate::error::Result;

/// Unique identifier for a live native widget
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WidgetId(pub u64);

impl WidgetId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Generator for unique widget IDs
#[derive(Debug, Default)]
pub struct WidgetIdGenerator {
    next: u64,
}

impl WidgetIdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next(&mut self) -> WidgetId {
        let id = WidgetId(self.next);
        self.next += 1;
        id
    }
}

/// Events a native widget reports upward
#[derive(Clone, Debug)]
pub enum WidgetEvent {
    /// The widget's buffered text changed
    ///
    /// `text` is the full content after the change; `at`/`removed`/
    /// `inserted` describe the changed span in chars. Programmatic
    /// `set_text` calls report here too, exactly like the host platform's
    /// change observers do.
    TextChanged {
        text: String,
        at: usize,
        removed: usize,
        inserted: usize,
    },
    /// The user triggered the keyboard's semantic action key
    EditorAction(ActionHint),
    /// Low-level key press
    KeyDown { key: KeyCode },
    /// Low-level key release
    KeyUp { key: KeyCode },
}

/// Callback receiving widget events on the host UI thread
pub type WidgetEventSink = Arc<dyn Fn(WidgetId, WidgetEvent) + Send + Sync>;

/// Lifecycle and access contract for the native text-input widget
///
/// All methods must be invoked on the host UI thread only. Read accessors
/// degrade to neutral values for unknown handles rather than failing; a
/// stale handle means the session is already tearing down.
pub trait WidgetBackend: Send + Sync {
    /// Construct a native widget from a snapshot
    ///
    /// Applies font, color, padding, alignment, the single-line flag, the
    /// constraint-specific keyboard layout, the max-length filter, and the
    /// password obscuring transform. Construction requests focus, which
    /// triggers the host's input-method machinery.
    fn create(&self, snapshot: &EditSnapshot, sink: WidgetEventSink) -> Result<WidgetId>;

    /// Detach and destroy the widget
    fn destroy(&self, id: WidgetId);

    /// Replace the widget's buffered text
    fn set_text(&self, id: WidgetId, text: &str);

    /// Current buffered text (empty for unknown handles)
    fn text(&self, id: WidgetId) -> String;

    /// Set the selection range in chars, clamped to the text bounds
    fn set_selection(&self, id: WidgetId, start: usize, end: usize);

    /// Current selection range
    fn selection(&self, id: WidgetId) -> (usize, usize);

    /// Re-position the widget over the lightweight field
    fn set_position(&self, id: WidgetId, x: i32, y: i32, width: u32, height: u32);

    /// Move the widget off-screen (or back)
    ///
    /// A hidden widget must keep keyboard focus so keystrokes keep flowing;
    /// making it invisible to the windowing system would sever the input
    /// connection.
    fn set_widget_hidden(&self, id: WidgetId, hidden: bool);

    /// Request the virtual keyboard to show or hide
    fn show_keyboard(&self, show: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widget_id_generator_is_sequential() {
        let mut gen = WidgetIdGenerator::new();
        assert_eq!(gen.next(), WidgetId(1));
        assert_eq!(gen.next(), WidgetId(2));
    }
}
