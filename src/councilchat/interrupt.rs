//! User interrupts.
//!
//! An [`InterruptHandle`] is shared between a [`GroupChat`](crate::GroupChat)
//! and whoever wants to stop the current speaker. The turn runner only listens
//! while a persona is speaking; an interrupt raised between turns of a run is
//! kept and applied to the next turn. Whatever is still pending when a run
//! ends is discarded.

use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Default)]
struct InterruptState {
    pending: AtomicBool,
    notify: Notify,
}

/// Cloneable handle used to interrupt a running group chat.
#[derive(Clone, Default)]
pub struct InterruptHandle {
    state: Arc<InterruptState>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt the current (or next) speaking turn.
    pub fn interrupt(&self) {
        self.state.pending.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    /// Whether an interrupt is waiting to be consumed.
    pub fn is_pending(&self) -> bool {
        self.state.pending.load(Ordering::SeqCst)
    }

    /// Drop a pending interrupt.
    pub fn reset(&self) {
        self.state.pending.store(false, Ordering::SeqCst);
    }

    /// Resolves once an interrupt is pending, and consumes it.
    pub async fn interrupted(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state.pending.swap(false, Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Forward every Ctrl-C received by the process to this handle.
    ///
    /// Must be called from within a tokio runtime. Abort the returned task to
    /// stop listening.
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, interrupting the current speaker");
                handle.interrupt();
            }
        })
    }
}
