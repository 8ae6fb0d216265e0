//! Error types for the directory watcher.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur in the directory watcher.
///
/// Only errors raised while starting a watch are returned to the caller.
/// Once the loop is running, the same kinds of failure (a rebuild that cannot
/// walk the tree, a subscription that fails to close) are logged and the loop
/// keeps going.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The watch set was empty.
    #[error("no directories to watch")]
    EmptyRoots,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// A root exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Walking a root for subdirectories failed.
    #[error("failed scanning {root} for directories: {source}")]
    Walk {
        /// Root whose walk failed.
        root: String,
        #[source]
        source: walkdir::Error,
    },

    /// Subscribing a single directory failed.
    #[error("failed to watch {path}: {source}")]
    Subscribe {
        /// Directory that could not be watched.
        path: String,
        #[source]
        source: notify::Error,
    },

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
