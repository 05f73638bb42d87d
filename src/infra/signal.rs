//! Broadcast signals shared by all entity tasks
//!
//! Pause and shutdown are both `watch<bool>` channels: a waiter subscribes
//! once and is woken as soon as the flag flips, so no task ever polls a flag
//! on a timer. The helpers below only hold the watch read guard for the
//! duration of the predicate, never across an await.

use std::sync::Arc;
use tokio::sync::watch;

/// Per-entity pause flag
///
/// Cloning shares the same flag. `pause`/`resume` are idempotent and report
/// whether the flag actually changed.
#[derive(Debug, Clone)]
pub struct PauseSwitch {
    tx: Arc<watch::Sender<bool>>,
}

impl PauseSwitch {
    pub fn new(paused: bool) -> Self {
        let (tx, _rx) = watch::channel(paused);
        Self { tx: Arc::new(tx) }
    }

    pub fn pause(&self) -> bool {
        self.set(true)
    }

    pub fn resume(&self) -> bool {
        self.set(false)
    }

    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    fn set(&self, paused: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == paused {
                false
            } else {
                *current = paused;
                true
            }
        })
    }
}

/// Resolves once the pause flag is clear. Returns false if the switch is gone.
pub async fn resumed(pause: &mut watch::Receiver<bool>) -> bool {
    pause.wait_for(|paused| !*paused).await.is_ok()
}

/// Resolves once the pause flag is set. Returns false if the switch is gone.
pub async fn paused(pause: &mut watch::Receiver<bool>) -> bool {
    pause.wait_for(|paused| *paused).await.is_ok()
}

/// Resolves once shutdown was requested, or the shutdown sender was dropped
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Suspend while paused. Returns false if shutdown arrived first.
pub async fn until_resumed(
    pause: &mut watch::Receiver<bool>,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown_requested(shutdown) => false,
        ok = resumed(pause) => ok,
    }
}
