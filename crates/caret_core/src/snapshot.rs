//! Immutable edit-session snapshots
//!
//! The native widget is constructed on the host UI thread, which must never
//! reach back into the logic-thread-owned model. `EditSnapshot` is the
//! one-shot copy of everything widget construction needs, captured on the
//! logic thread when a session starts. Once built it is never mutated; if
//! the model changes, the session ends and a new snapshot is captured.

use crate::input::{ActionHint, InputConstraint};
use crate::model::{EditableText, ModelId, SharedEditable, Surface};

/// RGBA color, components in 0.0..=1.0
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Font reference for the native widget
#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    /// Font family name
    pub family: String,
    /// Size in physical pixels
    pub size_px: f32,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: String::from("sans-serif"),
            size_px: 14.0,
        }
    }
}

/// Per-edge padding in physical pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Padding {
    pub top: f32,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Padding {
    pub const fn uniform(value: f32) -> Self {
        Self {
            top: value,
            left: value,
            right: value,
            bottom: value,
        }
    }
}

/// Vertical alignment of text within the field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerticalAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

/// Immutable copy of the model properties needed to construct and place the
/// native widget
///
/// Safe to hand to the host UI thread. The `model` field is identity only;
/// `next_focus` is an opaque reference resolved back on the logic thread
/// when the focus chain runs.
#[derive(Clone)]
pub struct EditSnapshot {
    /// Identity of the owning model
    pub model: ModelId,
    /// Absolute x, scroll offset included
    pub x: i32,
    /// Absolute y, scroll offset included
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub padding: Padding,
    pub vertical_align: VerticalAlign,
    pub font: FontSpec,
    pub foreground: Color,
    pub single_line: bool,
    pub rtl: bool,
    /// Placeholder hint shown while empty
    pub hint: Option<String>,
    /// Maximum text length in chars (0 = unlimited)
    pub max_length: usize,
    pub constraint: InputConstraint,
    /// IME action key for the virtual keyboard
    pub action: ActionHint,
    /// Field focused on the IME "next" action
    pub next_focus: Option<SharedEditable>,
}

impl EditSnapshot {
    /// Capture a snapshot of `model` using `surface` for geometry
    ///
    /// Must be called on the logic thread.
    pub fn capture(model: &dyn EditableText, surface: &dyn Surface) -> Self {
        let id = model.id();
        let (ax, ay) = surface.absolute_position(id);
        let (sx, sy) = surface.scroll_offset(id);
        let (width, height) = surface.size(id);

        Self {
            model: id,
            x: ax + sx,
            y: ay + sy,
            width,
            height,
            padding: model.padding(),
            vertical_align: model.vertical_align(),
            font: model.font(),
            foreground: model.foreground(),
            single_line: model.is_single_line(),
            rtl: model.is_rtl(),
            hint: model.hint(),
            max_length: model.max_length(),
            constraint: model.constraint(),
            action: model.action_hint(),
            next_focus: model.next_focus_down(),
        }
    }

    /// Whether a point lies within the snapshot's bounds
    ///
    /// Points exactly on the boundary count as inside.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && x <= self.x + self.width as i32
            && y <= self.y + self.height as i32
    }
}

impl std::fmt::Debug for EditSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSnapshot")
            .field("model", &self.model)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("constraint", &self.constraint)
            .field("action", &self.action)
            .field("has_next_focus", &self.next_focus.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModel;

    impl EditableText for FixedModel {
        fn id(&self) -> ModelId {
            ModelId(7)
        }
        fn text(&self) -> String {
            String::from("hello")
        }
        fn set_text(&mut self, _text: &str) {}
        fn cursor(&self) -> usize {
            0
        }
        fn set_cursor(&mut self, _pos: usize) {}
        fn is_rtl(&self) -> bool {
            true
        }
        fn max_length(&self) -> usize {
            32
        }
    }

    struct FixedSurface;

    impl Surface for FixedSurface {
        fn absolute_position(&self, _id: ModelId) -> (i32, i32) {
            (10, 20)
        }
        fn size(&self, _id: ModelId) -> (u32, u32) {
            (100, 40)
        }
        fn scroll_offset(&self, _id: ModelId) -> (i32, i32) {
            (0, -5)
        }
        fn repaint(&self, _id: ModelId) {}
        fn request_focus(&self, _id: ModelId) {}
    }

    #[test]
    fn test_capture_folds_scroll_into_position() {
        let snap = EditSnapshot::capture(&FixedModel, &FixedSurface);
        assert_eq!(snap.model, ModelId(7));
        assert_eq!((snap.x, snap.y), (10, 15));
        assert_eq!((snap.width, snap.height), (100, 40));
        assert!(snap.rtl);
        assert_eq!(snap.max_length, 32);
    }

    #[test]
    fn test_contains_includes_boundary() {
        let mut snap = EditSnapshot::capture(&FixedModel, &FixedSurface);
        snap.x = 0;
        snap.y = 0;
        assert!(snap.contains(0, 0));
        assert!(snap.contains(100, 40));
        assert!(!snap.contains(101, 40));
        assert!(!snap.contains(-1, 0));
    }
}
