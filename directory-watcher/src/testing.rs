//! In-memory event source for driving the watch loop in tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::mpsc;

use crate::error::{Result, WatcherError};
use crate::event::{RawEvent, RawEventKind};
use crate::subscription::{EventSource, Subscription};

#[derive(Default)]
struct FakeState {
    next_id: usize,
    live: Vec<(usize, mpsc::UnboundedSender<RawEvent>)>,
    opened: usize,
    closed: usize,
    subscribed: Vec<PathBuf>,
    fail_open: bool,
    fail_close: bool,
}

/// Event source whose events are injected by the test.
#[derive(Clone, Default)]
pub(crate) struct FakeSource {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSource {
    /// Deliver one raw event to every live subscription.
    pub(crate) fn emit(&self) {
        let state = self.state.lock().unwrap();
        for (_, tx) in &state.live {
            let _ = tx.send(RawEvent::new(RawEventKind::Modified, "fake"));
        }
    }

    /// End the event stream of every live subscription.
    pub(crate) fn end_streams(&self) {
        let mut state = self.state.lock().unwrap();
        state.live.clear();
    }

    /// Make subsequent `open` calls fail.
    pub(crate) fn fail_opens(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    /// Make subsequent `close` calls report an error.
    pub(crate) fn fail_closes(&self, fail: bool) {
        self.state.lock().unwrap().fail_close = fail;
    }

    pub(crate) fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub(crate) fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    pub(crate) fn live(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    /// Every directory ever subscribed, across all subscriptions.
    pub(crate) fn subscribed(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().subscribed.clone()
    }
}

impl EventSource for FakeSource {
    type Subscription = FakeSubscription;

    fn open(&self) -> Result<FakeSubscription> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(WatcherError::Io(std::io::Error::other("open refused")));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = state.next_id;
        state.next_id += 1;
        state.opened += 1;
        state.live.push((id, tx));

        Ok(FakeSubscription {
            id,
            events: rx,
            state: Arc::clone(&self.state),
            closed: false,
        })
    }
}

pub(crate) struct FakeSubscription {
    id: usize,
    events: mpsc::UnboundedReceiver<RawEvent>,
    state: Arc<Mutex<FakeState>>,
    closed: bool,
}

impl Subscription for FakeSubscription {
    fn subscribe(&mut self, dir: &Path) -> Result<()> {
        self.state.lock().unwrap().subscribed.push(dir.to_path_buf());
        Ok(())
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<RawEvent>> {
        self.events.poll_recv(cx)
    }

    fn try_next_event(&mut self) -> Option<RawEvent> {
        self.events.try_recv().ok()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut state = self.state.lock().unwrap();
        let id = self.id;
        state.live.retain(|(live_id, _)| *live_id != id);
        state.closed += 1;
        if state.fail_close {
            return Err(WatcherError::Io(std::io::Error::other("close refused")));
        }
        Ok(())
    }
}
