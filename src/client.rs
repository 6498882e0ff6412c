//! A single connected member: identity, mailbox, and the bits of state mutated outside the hub's
//! lock.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::Notify;

use crate::color::Color;

/// State mutated only by tasks belonging to this connection (the pty-req/window-change handler
/// and whichever task applies a `/silence`). Kept behind a plain mutex rather than atomics for
/// clarity; the critical sections are a handful of instructions and never held across an `.await`.
struct SelfState {
    silence_until: Option<Instant>,
    term_size: (u16, u16),
}

/// Shared handle to one connected client.
///
/// The hub stores `Arc<ClientHandle>` values in its membership map; the owning session task holds
/// a clone of the same `Arc`. `name` is logically owned by the hub (only `Hub::add`/`rename`
/// mutate it, under the hub's lock) but lives here so reads don't need to go back through the hub.
pub struct ClientHandle {
    pub fingerprint: String,
    pub color: Color,
    /// An identifier for the peer's client, derived from the auth method and key fingerprint by
    /// the transport. Sanitized on demand by `command::sanitize_client_version`, not at storage
    /// time.
    pub client_version: String,
    name: RwLock<String>,
    mailbox_tx: mpsc::Sender<String>,
    state: Mutex<SelfState>,
    kill: Notify,
}

impl ClientHandle {
    pub fn new(
        fingerprint: String,
        client_version: String,
        mailbox_capacity: usize,
    ) -> (std::sync::Arc<ClientHandle>, mpsc::Receiver<String>) {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(mailbox_capacity);
        let handle = ClientHandle {
            fingerprint,
            color: Color::random(),
            client_version,
            name: RwLock::new(String::new()),
            mailbox_tx,
            state: Mutex::new(SelfState {
                silence_until: None,
                term_size: (80, 24),
            }),
            kill: Notify::new(),
        };
        (std::sync::Arc::new(handle), mailbox_rx)
    }

    pub fn name(&self) -> String {
        self.name.read().unwrap().clone()
    }

    /// Only called by the hub, under its lock.
    pub(crate) fn set_name(&self, new: &str) {
        *self.name.write().unwrap() = new.to_owned();
    }

    pub fn colored_name(&self) -> String {
        self.color.paint(&self.name())
    }

    /// Pushes a line into the mailbox. Never blocks: if the mailbox is full, the message is
    /// dropped (drop-newest-on-full, see the concurrency design).
    pub fn enqueue(&self, line: impl Into<String>) {
        let _ = self.mailbox_tx.try_send(line.into());
    }

    pub fn silence(&self, duration: Duration) {
        self.state.lock().silence_until = Some(Instant::now() + duration);
    }

    pub fn is_silenced(&self) -> bool {
        match self.state.lock().silence_until {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }

    pub fn resize(&self, width: u16, height: u16) {
        self.state.lock().term_size = (width, height);
    }

    pub fn term_size(&self) -> (u16, u16) {
        self.state.lock().term_size
    }

    /// Requests that this connection be torn down (used by `/ban`). The session task observes
    /// this via `killed()` and closes the underlying channel.
    pub fn kill(&self) {
        self.kill.notify_one();
    }

    pub async fn killed(&self) {
        self.kill.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_a_time_fence() {
        let (handle, _rx) = ClientHandle::new("fp".to_owned(), "SSH-2.0-test".to_owned(), 10);
        assert!(!handle.is_silenced());
        handle.silence(Duration::from_millis(20));
        assert!(handle.is_silenced());
        std::thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_silenced());
    }

    #[test]
    fn enqueue_drops_newest_when_full() {
        let (handle, mut rx) = ClientHandle::new("fp".to_owned(), "SSH-2.0-test".to_owned(), 2);
        handle.enqueue("a");
        handle.enqueue("b");
        handle.enqueue("c"); // dropped: mailbox full

        assert_eq!(rx.try_recv().unwrap(), "a");
        assert_eq!(rx.try_recv().unwrap(), "b");
        assert!(rx.try_recv().is_err());
    }
}
