//! Caret Platform Layer
//!
//! The execution-context and native-widget seams of the Caret text-editing
//! synchronizer:
//!
//! - **Dispatchers**: fire-and-forget task posting between the logic thread
//!   and the host UI thread, plus a single-threaded scheduler whose own
//!   thread can wait for a condition without starving its queue
//! - **Widget backend**: the lifecycle contract for the host platform's
//!   real text-input control
//! - **Headless backend**: a faithful in-memory implementation for tests
//!   and as a reference for backend authors

pub mod dispatcher;
pub mod error;
pub mod headless;
pub mod widget;

pub use dispatcher::{BlockingDispatcher, Dispatcher, SingleThreadScheduler, Task};
pub use error::{PlatformError, Result};
pub use headless::HeadlessBackend;
pub use widget::{WidgetBackend, WidgetEvent, WidgetEventSink, WidgetId, WidgetIdGenerator};
