//! Per-(sender, peer) typing timers with auto-expiry.
//!
//! A typing signal lives for a fixed window unless refreshed, stopped, or
//! the sender disconnects. Each pending expiry is an explicit cancellable
//! handle in a keyed map; a new signal for the same key replaces the old
//! timer rather than stacking a second one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

/// How long a typing signal stays alive without a refresh.
pub const TYPING_WINDOW: Duration = Duration::from_secs(3);

type TypingKey = (String, String);

/// Handle to a pending expiry, cancellable before it fires.
struct TypingTimer {
    id: u64,
    handle: JoinHandle<()>,
}

impl TypingTimer {
    fn cancel(&self) {
        self.handle.abort();
    }
}

pub struct TypingCoordinator {
    window: Duration,
    timers: Arc<DashMap<TypingKey, TypingTimer>>,
    next_id: AtomicU64,
}

impl TypingCoordinator {
    pub fn new() -> Self {
        Self::with_window(TYPING_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            timers: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// (Re)start the timer for (sender, peer). Any previous timer for the
    /// key is cancelled first; `on_expire` runs only if the window
    /// elapses without a refresh, a stop, or a disconnect.
    pub fn begin(&self, sender_id: &str, peer_id: &str, on_expire: impl FnOnce() + Send + 'static) {
        let key: TypingKey = (sender_id.to_string(), peer_id.to_string());
        if let Some((_, previous)) = self.timers.remove(&key) {
            previous.cancel();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);
        let task_key = key.clone();
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // Only fire if this timer is still the one registered for the
            // key; a replacement may have raced in.
            if timers.remove_if(&task_key, |_, timer| timer.id == id).is_some() {
                on_expire();
            }
        });

        self.timers.insert(key, TypingTimer { id, handle });
    }

    /// Cancel the pending timer for (sender, peer). Returns whether one
    /// existed.
    pub fn stop(&self, sender_id: &str, peer_id: &str) -> bool {
        let key: TypingKey = (sender_id.to_string(), peer_id.to_string());
        match self.timers.remove(&key) {
            Some((_, timer)) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop every timer whose sender matches, without firing expiry
    /// callbacks. Called on disconnect; the presence-offline broadcast
    /// supersedes any stop-typing signal.
    pub fn clear_for_sender(&self, sender_id: &str) {
        self.timers.retain(|key, timer| {
            if key.0 == sender_id {
                timer.cancel();
                false
            } else {
                true
            }
        });
    }

    /// Number of pending timers (test observability).
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl Default for TypingCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const WINDOW: Duration = Duration::from_millis(40);

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let make = {
            let count = Arc::clone(&count);
            move || {
                let count = Arc::clone(&count);
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            }
        };
        (count, make)
    }

    #[tokio::test]
    async fn timer_fires_once_after_window() {
        let typing = TypingCoordinator::with_window(WINDOW);
        let (count, expire) = counter();

        typing.begin("usr_a", "usr_b", expire());
        assert_eq!(typing.pending(), 1);

        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(typing.pending(), 0);
    }

    #[tokio::test]
    async fn refresh_replaces_timer_so_only_latest_fires() {
        let typing = TypingCoordinator::with_window(WINDOW);
        let (count, expire) = counter();

        typing.begin("usr_a", "usr_b", expire());
        tokio::time::sleep(WINDOW / 2).await;
        typing.begin("usr_a", "usr_b", expire());

        // Past the first timer's deadline but not the second's.
        tokio::time::sleep(WINDOW * 3 / 4).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(WINDOW).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_cancels_pending_expiry() {
        let typing = TypingCoordinator::with_window(WINDOW);
        let (count, expire) = counter();

        typing.begin("usr_a", "usr_b", expire());
        assert!(typing.stop("usr_a", "usr_b"));
        assert!(!typing.stop("usr_a", "usr_b"));

        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(typing.pending(), 0);
    }

    #[tokio::test]
    async fn clear_for_sender_drops_only_that_senders_timers() {
        let typing = TypingCoordinator::with_window(WINDOW);
        let (count, expire) = counter();

        typing.begin("usr_a", "usr_b", expire());
        typing.begin("usr_a", "usr_c", expire());
        typing.begin("usr_x", "usr_b", expire());

        typing.clear_for_sender("usr_a");
        assert_eq!(typing.pending(), 1);

        tokio::time::sleep(WINDOW * 3).await;
        // Only usr_x's timer fired.
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timers_for_distinct_peers_are_independent() {
        let typing = TypingCoordinator::with_window(WINDOW);
        let (count, expire) = counter();

        typing.begin("usr_a", "usr_b", expire());
        typing.begin("usr_a", "usr_c", expire());

        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
