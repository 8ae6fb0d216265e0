//! Raw-event subscriptions and the recursive subscription helper.

use std::fmt;
use std::path::{Path, PathBuf};
use std::task::{Context, Poll, Waker};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{Dispatch, debug, warn};
use walkdir::WalkDir;

use crate::config::WatchConfig;
use crate::error::{Result, WatcherError};
use crate::event::RawEvent;

/// A live, aggregate subscription to raw events for a set of directories.
pub trait Subscription: Send + 'static {
    /// Start receiving events for `dir`. Only the directory itself is
    /// watched, not its descendants.
    fn subscribe(&mut self, dir: &Path) -> Result<()>;

    /// Poll for the next raw event. `Ready(None)` means the stream ended.
    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<RawEvent>>;

    /// Take the next event if one is already queued, without waiting.
    fn try_next_event(&mut self) -> Option<RawEvent> {
        match self.poll_event(&mut Context::from_waker(Waker::noop())) {
            Poll::Ready(event) => event,
            Poll::Pending => None,
        }
    }

    /// Release the underlying resources. Calling it twice is harmless.
    fn close(&mut self) -> Result<()>;
}

/// Produces fresh, empty subscriptions.
pub trait EventSource: Send + 'static {
    /// The subscription type this source opens.
    type Subscription: Subscription;

    /// Open an empty subscription.
    fn open(&self) -> Result<Self::Subscription>;
}

/// Event source backed by the platform's recommended `notify` watcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifySource;

impl NotifySource {
    /// Create a new notify-backed source.
    pub fn new() -> Self {
        Self
    }
}

impl EventSource for NotifySource {
    type Subscription = NotifySubscription;

    fn open(&self) -> Result<NotifySubscription> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        // The callback runs on notify's own thread.
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);

        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let event = RawEvent::from(event);
                    if event.kind.is_change() {
                        // The receiver is gone once the subscription is closed.
                        let _ = event_tx.send(event);
                    }
                }
                Err(e) => {
                    tracing::dispatcher::with_default(&dispatch, || warn!("watch error: {e}"));
                }
            },
        )?;

        Ok(NotifySubscription {
            watcher: Some(watcher),
            events: event_rx,
            watched: 0,
        })
    }
}

/// A subscription backed by one `notify` watcher.
pub struct NotifySubscription {
    /// Internal notify watcher. `None` once closed.
    watcher: Option<RecommendedWatcher>,

    /// Events forwarded from the notify callback.
    events: mpsc::UnboundedReceiver<RawEvent>,

    /// Number of directories subscribed.
    watched: usize,
}

impl NotifySubscription {
    /// Number of directories this subscription covers.
    pub fn watched(&self) -> usize {
        self.watched
    }
}

impl fmt::Debug for NotifySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifySubscription")
            .field("open", &self.watcher.is_some())
            .field("watched", &self.watched)
            .finish()
    }
}

impl Subscription for NotifySubscription {
    fn subscribe(&mut self, dir: &Path) -> Result<()> {
        let Some(watcher) = self.watcher.as_mut() else {
            return Err(WatcherError::Io(std::io::Error::other(
                "subscription already closed",
            )));
        };

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::Subscribe {
                path: dir.display().to_string(),
                source,
            })?;
        self.watched += 1;
        Ok(())
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<RawEvent>> {
        self.events.poll_recv(cx)
    }

    fn try_next_event(&mut self) -> Option<RawEvent> {
        self.events.try_recv().ok()
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the watcher removes every OS watch it holds.
        if self.watcher.take().is_some() {
            self.events.close();
        }
        Ok(())
    }
}

/// Enumerate `root` and every directory below it.
pub fn walk_directories(root: &Path, follow_symlinks: bool) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(WatcherError::DirectoryNotFound(root.display().to_string()));
    }
    if !root.is_dir() {
        return Err(WatcherError::NotADirectory(root.display().to_string()));
    }

    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = entry.map_err(|source| WatcherError::Walk {
            root: root.display().to_string(),
            source,
        })?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }

    Ok(dirs)
}

/// Open a subscription covering every directory under every configured root.
///
/// The walk happens before anything is subscribed, so the walk itself never
/// shows up as activity on the new subscription. On failure the partially
/// built subscription is closed before the error is returned.
pub fn subscribe_tree<S: EventSource>(source: &S, config: &WatchConfig) -> Result<S::Subscription> {
    config.validate()?;

    let mut subscription = source.open()?;
    match subscribe_roots(&mut subscription, config) {
        Ok(count) => {
            debug!(count, roots = ?config.roots, "found directories to watch");
            Ok(subscription)
        }
        Err(e) => {
            if let Err(close_err) = subscription.close() {
                warn!("failed to close partial subscription: {close_err}");
            }
            Err(e)
        }
    }
}

fn subscribe_roots<T: Subscription>(subscription: &mut T, config: &WatchConfig) -> Result<usize> {
    let mut dirs = Vec::new();
    for root in &config.roots {
        dirs.extend(walk_directories(root, config.follow_symlinks)?);
    }

    for dir in &dirs {
        subscription.subscribe(dir)?;
    }

    Ok(dirs.len())
}
