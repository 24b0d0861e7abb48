//! Caret Core
//!
//! Foundational types for the Caret text-editing synchronizer:
//!
//! - **Model seams**: the `EditableText` trait the logic thread owns, and
//!   the `Surface` trait the rendering/layout collaborator implements
//! - **Snapshots**: the immutable per-session copy handed to the host UI
//!   thread so widget construction never touches the live model
//! - **Change log**: buffered keystrokes with clamped replay, for the window
//!   in which the native widget's content cannot be trusted
//! - **Keyboard heuristics**: best-effort virtual-keyboard visibility
//!
//! Nothing in this crate spawns threads or talks to a platform; it is pure
//! vocabulary shared by `caret_platform` and `caret_session`.

pub mod change_log;
pub mod input;
pub mod keyboard;
pub mod model;
pub mod snapshot;

pub use change_log::{replay, ChangeLog, TextChange};
pub use input::{ActionHint, InputConstraint, KeyCode, KeyboardLayout};
pub use keyboard::{KeyboardVisibility, HIDE_DECAY};
pub use model::{EditableText, ModelId, ModelIdGenerator, SharedEditable, Surface};
pub use snapshot::{Color, EditSnapshot, FontSpec, Padding, VerticalAlign};
