//! Caret Session Coordination
//!
//! The synchronization core of Caret: a platform-independent text model
//! owned by a single-threaded logic scheduler appears natively editable —
//! blinking caret, IME, virtual keyboard — although the real keystroke
//! widget lives on the host UI thread. This crate guarantees:
//!
//! - at most one live edit session process-wide, with defined hand-off when
//!   requests overlap (reopen, queue-and-supersede)
//! - a blocking mode whose requesting call pumps the logic scheduler until
//!   editing finishes, and an async mode delivering a callback
//! - lossless keystrokes across widget hide/show/resynchronization, via the
//!   buffered change log
//! - keyboard visibility bookkeeping and focus chaining to the next field
//!
//! See `caret_core` for the model/snapshot vocabulary and `caret_platform`
//! for dispatchers and widget backends.

pub mod coordinator;
mod focus;
pub mod gate;
pub mod session;


pub use coordinator::EditCoordinator;
pub use gate::CompletionGate;
pub use session::{EditMode, EditOptions, EndReason};
