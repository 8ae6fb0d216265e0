//! # Directory Watcher
//!
//! This crate watches a set of directory trees and tells the caller when
//! activity under them has settled.
//!
//! ## Features
//!
//! - **Recursive Watching**: Every directory under every root is subscribed
//! - **Debouncing**: A burst of raw events becomes a single notification
//! - **Self-healing**: The subscription is rebuilt after each burst so newly
//!   created subdirectories are picked up
//! - **Clean Cancellation**: Halting is immediate, idempotent and never blocks
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EventSource ──► WatchLoop ──► Notifications ──► attach()       │
//! │       │              │                              │           │
//! │       ▼              ▼                              ▼           │
//! │  subscribe_tree   HaltHandle                    caller action   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use rewatch_directory_watcher::{WatchConfig, attach, watch};
//!
//! let config = WatchConfig::new(["src"]).with_debounce(Duration::from_millis(300));
//! let (notifications, halt) = watch(config)?;
//!
//! attach(notifications, halt, || {
//!     println!("something changed");
//!     false
//! })
//! .await;
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod reactor;
pub mod subscription;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use config::WatchConfig;
pub use error::{Result, WatcherError};
pub use event::{RawEvent, RawEventKind};
pub use reactor::attach;
pub use subscription::{
    EventSource, NotifySource, NotifySubscription, Subscription, subscribe_tree, walk_directories,
};
pub use watcher::{HaltHandle, Notification, Notifications, WatchLoop, watch, watch_with_callback};
