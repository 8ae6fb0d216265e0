//! Configuration types for directory watching.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Dispatch;

use crate::error::{Result, WatcherError};

/// Default debounce window in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Longest accepted debounce window (one day).
pub const MAX_DEBOUNCE_MS: u64 = 24 * 60 * 60 * 1000;

/// Configuration for one watch session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Root directories. Every directory below them is watched.
    pub roots: Vec<PathBuf>,

    /// Quiet period, in milliseconds, that ends a burst of events.
    pub debounce_ms: u64,

    /// Whether to descend into symlinked directories.
    pub follow_symlinks: bool,

    /// Where the loop's diagnostics go. `None` uses whatever subscriber is
    /// current when the watch starts.
    #[serde(skip)]
    pub logger: Option<Dispatch>,
}

impl WatchConfig {
    /// Create a config for the given roots with the default debounce.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add a root directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Set the debounce window, rounded up to whole milliseconds.
    ///
    /// A window too large for `debounce_ms` saturates and is then rejected by
    /// [`WatchConfig::validate`].
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms =
            u64::try_from(debounce.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
        self
    }

    /// Descend into symlinked directories.
    pub fn follow_symlinks(mut self) -> Self {
        self.follow_symlinks = true;
        self
    }

    /// Route the loop's diagnostics to `logger` instead of the current
    /// default subscriber.
    pub fn with_logger(mut self, logger: impl Into<Dispatch>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    /// The debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Check that the config can start a watch.
    pub fn validate(&self) -> Result<()> {
        if self.roots.is_empty() {
            return Err(WatcherError::EmptyRoots);
        }
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(WatcherError::Config(format!(
                "debounce of {}ms exceeds the maximum of {MAX_DEBOUNCE_MS}ms",
                self.debounce_ms
            )));
        }
        Ok(())
    }

    /// The injected logger, or the subscriber current on this thread.
    pub(crate) fn dispatch(&self) -> Dispatch {
        match &self.logger {
            Some(logger) => logger.clone(),
            None => tracing::dispatcher::get_default(Dispatch::clone),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            follow_symlinks: false,
            logger: None,
        }
    }
}
