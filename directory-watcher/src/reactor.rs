//! Runs a caller action for every notification.

use tracing::debug;

use crate::watcher::{HaltHandle, Notifications};

/// Invoke `action` for every notification until the stream closes.
///
/// If `action` returns `true`, a halt is requested on `halt`; the stream then
/// closes and this function returns.
pub async fn attach<F>(mut notifications: Notifications, halt: HaltHandle, mut action: F)
where
    F: FnMut() -> bool,
{
    while notifications.recv().await.is_some() {
        if action() {
            debug!("action requested halt");
            halt.halt();
        }
    }
}
