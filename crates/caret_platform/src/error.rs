//! Platform error types

use thiserror::Error;

/// Platform-related errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Failed to construct the native text widget
    #[error("widget construction failed: {0}")]
    WidgetCreation(String),

    /// Operation addressed a widget handle that no longer exists
    #[error("unknown widget handle")]
    UnknownWidget,

    /// Failed to spawn a scheduler thread
    #[error("failed to spawn scheduler thread: {0}")]
    SchedulerSpawn(String),

    /// Generic platform error
    #[error("platform error: {0}")]
    Other(String),
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;
