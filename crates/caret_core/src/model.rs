//! Editable-model and rendering-collaborator seams
//!
//! The logic thread owns every text model. The coordinator only ever touches
//! a model from tasks running on that thread; the `Arc<Mutex<..>>` wrapper
//! exists so references can be captured into cross-thread tasks, not so that
//! the host UI thread may mutate models directly.

use std::sync::{Arc, Mutex};

use crate::input::{ActionHint, InputConstraint, KeyCode};
use crate::snapshot::{Color, FontSpec, Padding, VerticalAlign};

/// Unique identifier for an editable text model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelId(pub u64);

impl ModelId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Generator for unique model IDs
#[derive(Debug, Default)]
pub struct ModelIdGenerator {
    next: u64,
}

impl ModelIdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next(&mut self) -> ModelId {
        let id = ModelId(self.next);
        self.next += 1;
        id
    }
}

/// Shared handle to an editable model
pub type SharedEditable = Arc<Mutex<dyn EditableText>>;

/// An editable text model owned by the logic thread
///
/// Applications implement this on their text component. All methods are
/// invoked on the logic thread only; implementations never need their own
/// locking beyond the shared wrapper.
pub trait EditableText: Send {
    /// Stable identity of this model
    fn id(&self) -> ModelId;

    /// Current text content
    fn text(&self) -> String;

    /// Replace the text content
    fn set_text(&mut self, text: &str);

    /// Cursor position in chars
    fn cursor(&self) -> usize;

    /// Move the cursor
    fn set_cursor(&mut self, pos: usize);

    /// Whether the field currently accepts editing
    fn is_editable(&self) -> bool {
        true
    }

    /// Whether the field is enabled
    fn is_enabled(&self) -> bool {
        true
    }

    /// Single-line fields get a single-line native widget
    fn is_single_line(&self) -> bool {
        true
    }

    /// Right-to-left text direction
    fn is_rtl(&self) -> bool {
        false
    }

    /// Placeholder hint shown while empty
    fn hint(&self) -> Option<String> {
        None
    }

    /// Font the native widget should render with
    fn font(&self) -> FontSpec {
        FontSpec::default()
    }

    /// Foreground text color
    fn foreground(&self) -> Color {
        Color::default()
    }

    /// Per-edge padding of the field
    fn padding(&self) -> Padding {
        Padding::default()
    }

    /// Vertical alignment of text within the field
    fn vertical_align(&self) -> VerticalAlign {
        VerticalAlign::default()
    }

    /// Maximum text length in chars (0 = unlimited)
    fn max_length(&self) -> usize {
        0
    }

    /// Input constraint kind for this field
    fn constraint(&self) -> InputConstraint {
        InputConstraint::Plain
    }

    /// IME action key shown on the virtual keyboard
    fn action_hint(&self) -> ActionHint {
        ActionHint::Done
    }

    /// The field focused when the user taps the IME "next" action
    fn next_focus_down(&self) -> Option<SharedEditable> {
        None
    }

    /// Logical (non-text) key forwarded from the native widget
    fn key_event(&mut self, _key: KeyCode) {}
}

/// Rendering/layout collaborator
///
/// Everything the synchronizer needs from the excluded rendering subsystem:
/// geometry to place the native widget over the lightweight field, repaints
/// when the widget is hidden or shown, and focus bookkeeping.
pub trait Surface: Send + Sync {
    /// Absolute position of the model's field on screen
    fn absolute_position(&self, id: ModelId) -> (i32, i32);

    /// Size of the model's field
    fn size(&self, id: ModelId) -> (u32, u32);

    /// Scroll offset of the field's content
    fn scroll_offset(&self, id: ModelId) -> (i32, i32) {
        let _ = id;
        (0, 0)
    }

    /// Repaint the lightweight representation of the field
    fn repaint(&self, id: ModelId);

    /// Move logical focus to the field
    fn request_focus(&self, id: ModelId);

    /// Whether the point lands on some editable, enabled field
    ///
    /// Backs the keep-keyboard-open decision when a touch outside the edited
    /// field ends a synchronous session.
    fn editable_at(&self, _x: i32, _y: i32) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_generator_is_sequential() {
        let mut gen = ModelIdGenerator::new();
        assert_eq!(gen.next(), ModelId(1));
        assert_eq!(gen.next(), ModelId(2));
        assert_ne!(gen.next(), ModelId(2));
    }
}
