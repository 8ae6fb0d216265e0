//! The debounced, self-healing watch loop.

use std::future::poll_fn;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument, debug, info, info_span, trace, warn};

use crate::config::WatchConfig;
use crate::error::Result;
use crate::event::RawEvent;
use crate::subscription::{EventSource, NotifySource, Subscription, subscribe_tree};

/// A settled burst of filesystem activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification;

/// Where the loop is between iterations. `Halted` is leaving the loop.
#[derive(Debug, Clone, Copy)]
enum State {
    /// No burst in progress.
    Idle,

    /// A burst is in progress and settles at `deadline` unless another event
    /// arrives first.
    Debouncing { deadline: Instant },
}

/// What woke the loop up.
enum Step {
    Event(RawEvent),
    Settled,
    Halt,
    SourceEnded,
}

/// Handle used to stop a running watch loop.
///
/// Halting is one-shot and never blocks: it can be requested any number of
/// times, from any task, before or after the loop has exited. Dropping every
/// handle does not stop the loop.
#[derive(Debug, Clone, Default)]
pub struct HaltHandle {
    /// Cancelled by the caller.
    halt: CancellationToken,

    /// Cancelled by the loop once it has exited and closed its subscription.
    stopped: CancellationToken,
}

impl HaltHandle {
    /// Request that the loop stop.
    pub fn halt(&self) {
        self.halt.cancel();
    }

    /// Whether a halt has been requested.
    pub fn is_halted(&self) -> bool {
        self.halt.is_cancelled()
    }

    /// Whether the loop has exited.
    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// Wait until the loop has exited and released its subscription.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await;
    }
}

/// Stream of notifications produced by [`WatchLoop::spawn_notifications`].
///
/// At most one notification is buffered. A burst that settles while one is
/// still unread is folded into it.
#[derive(Debug)]
pub struct Notifications {
    rx: mpsc::Receiver<Notification>,
    halt: CancellationToken,
}

impl Notifications {
    /// Receive the next notification.
    ///
    /// Returns `None` once the loop has exited, and immediately after a halt
    /// has been requested, even if a notification was still buffered.
    pub async fn recv(&mut self) -> Option<Notification> {
        tokio::select! {
            biased;
            _ = self.halt.cancelled() => None,
            notification = self.rx.recv() => notification,
        }
    }
}

/// A watch over a set of directory trees, ready to be spawned.
///
/// Creating the loop performs the initial recursive subscription, so every
/// start-up error surfaces from [`WatchLoop::new`] before any task exists.
pub struct WatchLoop<S: EventSource> {
    source: S,
    config: WatchConfig,
    subscription: S::Subscription,
    dispatch: Dispatch,
}

impl<S: EventSource> WatchLoop<S> {
    /// Validate `config` and subscribe every directory under its roots.
    pub fn new(source: S, config: WatchConfig) -> Result<Self> {
        let dispatch = config.dispatch();
        let subscription =
            tracing::dispatcher::with_default(&dispatch, || subscribe_tree(&source, &config))?;

        Ok(Self {
            source,
            config,
            subscription,
            dispatch,
        })
    }

    /// Run the loop on a new tokio task, calling `on_changed` once per
    /// settled burst. Returning `false` from `on_changed` stops the loop.
    ///
    /// `on_changed` runs on the loop's task. While it runs, no events are
    /// processed and a halt request is not observed, so it should return
    /// quickly and hand longer work off elsewhere.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<F>(self, on_changed: F) -> HaltHandle
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = HaltHandle::default();
        let dispatch = self.dispatch.clone();
        let span = tracing::dispatcher::with_default(&dispatch, || {
            info_span!("watch", roots = ?self.config.roots)
        });

        tokio::spawn(
            self.run(handle.clone(), on_changed)
                .instrument(span)
                .with_subscriber(dispatch),
        );

        handle
    }

    /// Run the loop on a new tokio task, delivering notifications through a
    /// stream. Dropping the stream stops the loop.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn_notifications(self) -> (Notifications, HaltHandle) {
        let (tx, rx) = mpsc::channel(1);

        let halt = self.spawn(move || match tx.try_send(Notification) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("previous notification unread, coalescing");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!("notification stream dropped");
                false
            }
        });

        let notifications = Notifications {
            rx,
            halt: halt.halt.clone(),
        };
        (notifications, halt)
    }

    async fn run<F>(mut self, handle: HaltHandle, mut on_changed: F)
    where
        F: FnMut() -> bool,
    {
        let debounce = self.config.debounce();
        let mut state = State::Idle;

        loop {
            let deadline = match state {
                State::Idle => None,
                State::Debouncing { deadline } => Some(deadline),
            };

            let step = tokio::select! {
                biased;
                _ = handle.halt.cancelled() => Step::Halt,
                event = poll_fn(|cx| self.subscription.poll_event(cx)) => match event {
                    Some(event) => Step::Event(event),
                    None => Step::SourceEnded,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    Step::Settled
                }
            };

            match step {
                Step::Halt => {
                    debug!("halt requested");
                    break;
                }
                Step::SourceEnded => {
                    warn!("event stream ended, stopping watcher");
                    break;
                }
                Step::Event(event) => {
                    if matches!(state, State::Idle) {
                        debug!(duration = ?debounce, "event received, debouncing");
                    }
                    trace!(kind = ?event.kind, paths = ?event.paths, "raw event");
                    state = State::Debouncing {
                        deadline: Instant::now() + debounce,
                    };
                }
                Step::Settled => {
                    state = State::Idle;
                    if !on_changed() {
                        debug!("change handler asked to stop");
                        break;
                    }
                    if handle.is_halted() {
                        debug!("halt requested during change handler");
                        break;
                    }
                    if self.rebuild() {
                        debug!(duration = ?debounce, "changes arrived during change handler, debouncing");
                        state = State::Debouncing {
                            deadline: Instant::now() + debounce,
                        };
                    }
                }
            }
        }

        if let Err(e) = self.subscription.close() {
            info!("error while closing subscription: {e}");
        }
        // Closes the notification stream, if there is one.
        drop(on_changed);
        debug!("watcher stopped");
        handle.stopped.cancel();
    }

    /// Replace the subscription with one covering the current tree.
    ///
    /// The old subscription is closed only after the new one is fully set up.
    /// If that fails the old one stays in place and keeps its queued events.
    ///
    /// Returns `true` if the old subscription had events waiting, which means
    /// a new burst started while the change handler or the walk ran.
    fn rebuild(&mut self) -> bool {
        match subscribe_tree(&self.source, &self.config) {
            Ok(fresh) => {
                let mut previous = std::mem::replace(&mut self.subscription, fresh);
                let pending = drain_ready(&mut previous);
                if let Err(e) = previous.close() {
                    info!("error while closing previous subscription: {e}");
                }
                debug!(pending, "rebuilt subscription");
                pending > 0
            }
            Err(e) => {
                warn!("failed to rebuild subscription, keeping the previous one: {e}");
                false
            }
        }
    }
}

/// Take every event already queued on `subscription` without waiting.
fn drain_ready<T: Subscription>(subscription: &mut T) -> usize {
    let mut drained = 0;
    while let Some(event) = subscription.try_next_event() {
        trace!(kind = ?event.kind, paths = ?event.paths, "raw event");
        drained += 1;
    }
    drained
}

/// Watch `config.roots` with the notify backend and deliver notifications
/// through a stream.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn watch(config: WatchConfig) -> Result<(Notifications, HaltHandle)> {
    Ok(WatchLoop::new(NotifySource::new(), config)?.spawn_notifications())
}

/// Watch `config.roots` with the notify backend and call `on_changed` after
/// every settled burst. Returning `false` stops the watch.
///
/// See [`WatchLoop::spawn`] for the constraints on `on_changed`.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn watch_with_callback<F>(config: WatchConfig, on_changed: F) -> Result<HaltHandle>
where
    F: FnMut() -> bool + Send + 'static,
{
    Ok(WatchLoop::new(NotifySource::new(), config)?.spawn(on_changed))
}
