//! In-memory widget backend
//!
//! Behaves like a real platform backend — constraint character filtering,
//! max-length enforcement, password display masking, change events for
//! programmatic writes — without a host toolkit. Drives the cross-thread
//! test suites and doubles as a reference for platform backend authors.
//!
//! Synthetic-input helpers (`type_str`, `key_down`, `editor_action`, ...)
//! play the role of the user; like the trait methods they are meant to be
//! called on whatever thread stands in for the host UI thread.

use std::sync::{Arc, Mutex};

use caret_core::input::{ActionHint, KeyCode};
use caret_core::model::ModelId;
use caret_core::snapshot::EditSnapshot;
use rustc_hash::FxHashMap;

use crate::error::{PlatformError, Result};
use crate::widget::{WidgetBackend, WidgetEvent, WidgetEventSink, WidgetId, WidgetIdGenerator};

const MASK_CHAR: char = '\u{25CF}';

struct HeadlessWidget {
    snapshot: EditSnapshot,
    text: Vec<char>,
    selection: (usize, usize),
    position: (i32, i32, u32, u32),
    hidden: bool,
    focused: bool,
    sink: WidgetEventSink,
}

#[derive(Default)]
struct HeadlessState {
    widgets: FxHashMap<WidgetId, HeadlessWidget>,
    ids: WidgetIdGenerator,
    keyboard_visible: bool,
    created: usize,
    max_live: usize,
    fail_next_create: bool,
}

/// Widget backend holding every widget in memory
#[derive(Default)]
pub struct HeadlessBackend {
    state: Mutex<HeadlessState>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create` call fail, once
    pub fn set_fail_next_create(&self) {
        self.state.lock().unwrap().fail_next_create = true;
    }

    /// Number of widgets currently alive
    pub fn live_widgets(&self) -> usize {
        self.state.lock().unwrap().widgets.len()
    }

    /// High-water mark of concurrently alive widgets
    pub fn max_live_widgets(&self) -> usize {
        self.state.lock().unwrap().max_live
    }

    /// Total widgets ever constructed
    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().created
    }

    /// Last requested keyboard visibility
    pub fn keyboard_visible(&self) -> bool {
        self.state.lock().unwrap().keyboard_visible
    }

    /// The live widget editing `model`, if any
    pub fn widget_for_model(&self, model: ModelId) -> Option<WidgetId> {
        let state = self.state.lock().unwrap();
        state
            .widgets
            .iter()
            .find(|(_, w)| w.snapshot.model == model)
            .map(|(id, _)| *id)
    }

    /// Snapshot the widget was constructed from
    pub fn snapshot(&self, id: WidgetId) -> Option<EditSnapshot> {
        self.state
            .lock()
            .unwrap()
            .widgets
            .get(&id)
            .map(|w| w.snapshot.clone())
    }

    /// What the user sees: the text, obscured for password fields
    pub fn display_text(&self, id: WidgetId) -> String {
        let state = self.state.lock().unwrap();
        match state.widgets.get(&id) {
            Some(w) if w.snapshot.constraint.is_masked() => {
                std::iter::repeat(MASK_CHAR).take(w.text.len()).collect()
            }
            Some(w) => w.text.iter().collect(),
            None => String::new(),
        }
    }

    /// Whether the widget is currently moved off-screen
    pub fn is_hidden(&self, id: WidgetId) -> bool {
        self.state
            .lock()
            .unwrap()
            .widgets
            .get(&id)
            .map(|w| w.hidden)
            .unwrap_or(false)
    }

    /// Current placement of the widget
    pub fn position(&self, id: WidgetId) -> Option<(i32, i32, u32, u32)> {
        self.state
            .lock()
            .unwrap()
            .widgets
            .get(&id)
            .map(|w| w.position)
    }

    /// Type a string as individual keystrokes
    ///
    /// Applies the constraint's character filter and the max-length filter,
    /// replaces any active selection, and reports each mutation through the
    /// sink exactly like a platform change observer.
    pub fn type_str(&self, id: WidgetId, input: &str) {
        let (sink, events) = {
            let mut state = self.state.lock().unwrap();
            let Some(widget) = state.widgets.get_mut(&id) else {
                tracing::warn!(?id, "type_str on unknown widget");
                return;
            };

            let mut events = Vec::new();
            for c in input.chars() {
                if !widget.snapshot.constraint.allows_char(c) {
                    continue;
                }
                let (start, end) = widget.selection;
                if end > start {
                    widget.text.drain(start..end);
                    widget.selection = (start, start);
                    events.push(WidgetEvent::TextChanged {
                        text: widget.text.iter().collect(),
                        at: start,
                        removed: end - start,
                        inserted: 0,
                    });
                }
                let max = widget.snapshot.max_length;
                if max > 0 && widget.text.len() >= max {
                    continue;
                }
                let at = widget.selection.0;
                widget.text.insert(at, c);
                widget.selection = (at + 1, at + 1);
                events.push(WidgetEvent::TextChanged {
                    text: widget.text.iter().collect(),
                    at,
                    removed: 0,
                    inserted: 1,
                });
            }
            (widget.sink.clone(), events)
        };
        // Sink callbacks re-enter the backend; never call them under the lock.
        for event in events {
            sink(id, event);
        }
    }

    /// Delete the selection, or the char before the cursor
    pub fn backspace(&self, id: WidgetId) {
        let emitted = {
            let mut state = self.state.lock().unwrap();
            let Some(widget) = state.widgets.get_mut(&id) else {
                return;
            };
            let (start, end) = widget.selection;
            let (at, removed) = if end > start {
                (start, end - start)
            } else if start > 0 {
                (start - 1, 1)
            } else {
                return;
            };
            widget.text.drain(at..at + removed);
            widget.selection = (at, at);
            let event = WidgetEvent::TextChanged {
                text: widget.text.iter().collect(),
                at,
                removed,
                inserted: 0,
            };
            (widget.sink.clone(), event)
        };
        (emitted.0)(id, emitted.1);
    }

    /// Press a low-level key
    pub fn key_down(&self, id: WidgetId, key: KeyCode) {
        if let Some(sink) = self.sink_for(id) {
            sink(id, WidgetEvent::KeyDown { key });
        }
    }

    /// Release a low-level key
    pub fn key_up(&self, id: WidgetId, key: KeyCode) {
        if let Some(sink) = self.sink_for(id) {
            sink(id, WidgetEvent::KeyUp { key });
        }
    }

    /// Trigger the keyboard's semantic action key
    pub fn editor_action(&self, id: WidgetId, action: ActionHint) {
        if let Some(sink) = self.sink_for(id) {
            sink(id, WidgetEvent::EditorAction(action));
        }
    }

    fn sink_for(&self, id: WidgetId) -> Option<WidgetEventSink> {
        self.state
            .lock()
            .unwrap()
            .widgets
            .get(&id)
            .map(|w| w.sink.clone())
    }
}

impl WidgetBackend for HeadlessBackend {
    fn create(&self, snapshot: &EditSnapshot, sink: WidgetEventSink) -> Result<WidgetId> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_create {
            state.fail_next_create = false;
            return Err(PlatformError::WidgetCreation(
                "headless backend instructed to fail".into(),
            ));
        }

        let id = state.ids.next();
        state.widgets.insert(
            id,
            HeadlessWidget {
                snapshot: snapshot.clone(),
                text: Vec::new(),
                selection: (0, 0),
                position: (snapshot.x, snapshot.y, snapshot.width, snapshot.height),
                hidden: false,
                focused: true,
                sink,
            },
        );
        state.created += 1;
        state.max_live = state.max_live.max(state.widgets.len());
        tracing::debug!(?id, model = ?snapshot.model, "headless widget created");
        Ok(id)
    }

    fn destroy(&self, id: WidgetId) {
        if self.state.lock().unwrap().widgets.remove(&id).is_none() {
            tracing::warn!(?id, "destroy on unknown widget");
        }
    }

    fn set_text(&self, id: WidgetId, text: &str) {
        let emitted = {
            let mut state = self.state.lock().unwrap();
            let Some(widget) = state.widgets.get_mut(&id) else {
                tracing::warn!(?id, "set_text on unknown widget");
                return;
            };
            let removed = widget.text.len();
            widget.text = text.chars().collect();
            let len = widget.text.len();
            widget.selection = (widget.selection.0.min(len), widget.selection.1.min(len));
            let event = WidgetEvent::TextChanged {
                text: text.to_string(),
                at: 0,
                removed,
                inserted: len,
            };
            (widget.sink.clone(), event)
        };
        (emitted.0)(id, emitted.1);
    }

    fn text(&self, id: WidgetId) -> String {
        let state = self.state.lock().unwrap();
        match state.widgets.get(&id) {
            Some(w) => w.text.iter().collect(),
            None => {
                tracing::warn!(?id, "text read from unknown widget");
                String::new()
            }
        }
    }

    fn set_selection(&self, id: WidgetId, start: usize, end: usize) {
        let mut state = self.state.lock().unwrap();
        if let Some(widget) = state.widgets.get_mut(&id) {
            let len = widget.text.len();
            widget.selection = (start.min(len), end.min(len));
        }
    }

    fn selection(&self, id: WidgetId) -> (usize, usize) {
        self.state
            .lock()
            .unwrap()
            .widgets
            .get(&id)
            .map(|w| w.selection)
            .unwrap_or((0, 0))
    }

    fn set_position(&self, id: WidgetId, x: i32, y: i32, width: u32, height: u32) {
        let mut state = self.state.lock().unwrap();
        if let Some(widget) = state.widgets.get_mut(&id) {
            widget.position = (x, y, width, height);
        }
    }

    fn set_widget_hidden(&self, id: WidgetId, hidden: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(widget) = state.widgets.get_mut(&id) {
            widget.hidden = hidden;
            // Focus stays with the widget either way; that is the point of
            // hiding by moving off-screen.
            widget.focused = true;
        }
    }

    fn show_keyboard(&self, show: bool) {
        self.state.lock().unwrap().keyboard_visible = show;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caret_core::input::InputConstraint;
    use caret_core::model::ModelId;

    fn snapshot(constraint: InputConstraint, max_length: usize) -> EditSnapshot {
        EditSnapshot {
            model: ModelId(1),
            x: 0,
            y: 0,
            width: 100,
            height: 20,
            padding: Default::default(),
            vertical_align: Default::default(),
            font: Default::default(),
            foreground: Default::default(),
            single_line: true,
            rtl: false,
            hint: None,
            max_length,
            constraint,
            action: Default::default(),
            next_focus: None,
        }
    }

    fn collecting_sink() -> (WidgetEventSink, Arc<Mutex<Vec<WidgetEvent>>>) {
        let events: Arc<Mutex<Vec<WidgetEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&events);
        let sink: WidgetEventSink = Arc::new(move |_, event| inner.lock().unwrap().push(event));
        (sink, events)
    }

    #[test]
    fn test_constraint_filters_typed_chars() {
        let backend = HeadlessBackend::new();
        let (sink, _) = collecting_sink();
        let id = backend
            .create(&snapshot(InputConstraint::Numeric, 0), sink)
            .unwrap();

        backend.type_str(id, "1a2b3");
        assert_eq!(backend.text(id), "123");
    }

    #[test]
    fn test_max_length_filter() {
        let backend = HeadlessBackend::new();
        let (sink, _) = collecting_sink();
        let id = backend
            .create(&snapshot(InputConstraint::Plain, 3), sink)
            .unwrap();

        backend.type_str(id, "abcdef");
        assert_eq!(backend.text(id), "abc");
    }

    #[test]
    fn test_password_display_is_masked() {
        let backend = HeadlessBackend::new();
        let (sink, _) = collecting_sink();
        let id = backend
            .create(&snapshot(InputConstraint::Password, 0), sink)
            .unwrap();

        backend.type_str(id, "hunter2");
        assert_eq!(backend.text(id), "hunter2");
        assert_eq!(backend.display_text(id), "\u{25CF}".repeat(7));
    }

    #[test]
    fn test_typing_replaces_selection() {
        let backend = HeadlessBackend::new();
        let (sink, events) = collecting_sink();
        let id = backend
            .create(&snapshot(InputConstraint::Plain, 0), sink)
            .unwrap();

        backend.type_str(id, "abcd");
        backend.set_selection(id, 1, 3);
        backend.type_str(id, "x");
        assert_eq!(backend.text(id), "axd");

        // Replacement reports the removal before the insertion.
        let all = events.lock().unwrap();
        let tail: Vec<_> = all.iter().rev().take(2).collect();
        assert!(matches!(
            tail[1],
            WidgetEvent::TextChanged { removed: 2, inserted: 0, at: 1, .. }
        ));
        assert!(matches!(
            tail[0],
            WidgetEvent::TextChanged { removed: 0, inserted: 1, at: 1, .. }
        ));
    }

    #[test]
    fn test_fail_next_create_fails_once() {
        let backend = HeadlessBackend::new();
        backend.set_fail_next_create();
        let (sink, _) = collecting_sink();
        assert!(backend
            .create(&snapshot(InputConstraint::Plain, 0), sink.clone())
            .is_err());
        assert!(backend.create(&snapshot(InputConstraint::Plain, 0), sink).is_ok());
    }

    #[test]
    fn test_max_live_high_water_mark() {
        let backend = HeadlessBackend::new();
        let (sink, _) = collecting_sink();
        let a = backend
            .create(&snapshot(InputConstraint::Plain, 0), sink.clone())
            .unwrap();
        backend.destroy(a);
        let b = backend
            .create(&snapshot(InputConstraint::Plain, 0), sink)
            .unwrap();
        backend.destroy(b);

        assert_eq!(backend.created_count(), 2);
        assert_eq!(backend.max_live_widgets(), 1);
        assert_eq!(backend.live_widgets(), 0);
    }
}
