//! Per-sender conversation sessions and the inactivity auto-close timers.
//!
//! Every inbound message re-arms its sender's timer via [`SessionRegistry::touch`].
//! When a timer fires the session is marked closed first and the idle notice is
//! delivered second, so a transport failure can never leave a session half-open.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;

/// How long a conversation may sit idle before it is auto-closed.
pub const INACTIVITY_WINDOW: Duration = Duration::from_millis(600_000);

/// Receives the one-shot notice after a session is closed for idleness.
#[async_trait]
pub trait IdleNotifier: Send + Sync {
    async fn notify_idle(&self, sender: &str) -> anyhow::Result<()>;
}

/// State tracked for one sender.
///
/// `epoch` increments on every touch/close so a timer task that lost the
/// race can recognize itself as stale and do nothing.
#[derive(Default)]
struct Session {
    closed: bool,
    epoch: u64,
    timer: Option<JoinHandle<()>>,
}

struct RegistryInner {
    sessions: DashMap<String, Session>,
    notifier: Arc<dyn IdleNotifier>,
    window: Duration,
}

/// Keyed store of per-sender sessions. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(notifier: Arc<dyn IdleNotifier>) -> Self {
        Self::with_window(notifier, INACTIVITY_WINDOW)
    }

    /// Same registry with a custom inactivity window.
    pub fn with_window(notifier: Arc<dyn IdleNotifier>, window: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                notifier,
                window,
            }),
        }
    }

    /// Record activity for `sender`: create the session if absent, cancel any
    /// pending timer and arm a fresh one for the full inactivity window.
    ///
    /// Touching does not clear the `closed` flag; reopening is a routing
    /// decision made by the dispatcher.
    pub fn touch(&self, sender: &str) {
        let mut session = self.inner.sessions.entry(sender.to_string()).or_default();
        session.epoch += 1;
        let epoch = session.epoch;
        if let Some(old) = session.timer.take() {
            old.abort();
        }
        let inner = Arc::clone(&self.inner);
        let owner = sender.to_string();
        session.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;
            expire(inner, owner, epoch).await;
        }));
    }

    /// Mark the session closed and cancel its timer, so the explicit closing
    /// reply is not followed by a duplicate inactivity notice.
    pub fn close(&self, sender: &str) {
        let mut session = self.inner.sessions.entry(sender.to_string()).or_default();
        session.closed = true;
        session.epoch += 1;
        if let Some(timer) = session.timer.take() {
            timer.abort();
        }
    }

    /// Clear the `closed` flag. No-op for unseen senders.
    pub fn reopen(&self, sender: &str) {
        if let Some(mut session) = self.inner.sessions.get_mut(sender) {
            session.closed = false;
        }
    }

    /// Unseen senders are treated as not closed.
    pub fn is_closed(&self, sender: &str) -> bool {
        self.inner
            .sessions
            .get(sender)
            .map(|session| session.closed)
            .unwrap_or(false)
    }

    /// Whether an inactivity timer is currently armed for `sender`.
    pub fn has_pending_timer(&self, sender: &str) -> bool {
        self.inner
            .sessions
            .get(sender)
            .map(|session| session.timer.is_some())
            .unwrap_or(false)
    }
}

/// Timer body. Marks the session closed and drops the handle before any
/// delivery attempt, then sends the idle notice. Stale epochs bail out, so
/// the notice goes out at most once per armed timer.
async fn expire(inner: Arc<RegistryInner>, sender: String, epoch: u64) {
    let live = match inner.sessions.get_mut(&sender) {
        Some(mut session) if session.epoch == epoch => {
            session.closed = true;
            session.timer = None;
            true
        }
        _ => false,
    };
    if !live {
        return;
    }

    tracing::info!(sender = %sender, "Closing idle conversation");
    if let Err(e) = inner.notifier.notify_idle(&sender).await {
        tracing::warn!(sender = %sender, error = %e, "Failed to deliver inactivity notice");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        notified: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn notified(&self) -> Vec<String> {
            self.notified.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdleNotifier for RecordingNotifier {
        async fn notify_idle(&self, sender: &str) -> anyhow::Result<()> {
            self.notified.lock().unwrap().push(sender.to_string());
            if self.fail {
                anyhow::bail!("transport refused the notice");
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_window_closes_and_notifies_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = SessionRegistry::new(notifier.clone());

        registry.touch("5511999990000@c.us");
        assert!(!registry.is_closed("5511999990000@c.us"));
        assert!(registry.has_pending_timer("5511999990000@c.us"));

        tokio::time::sleep(INACTIVITY_WINDOW + Duration::from_secs(1)).await;

        assert!(registry.is_closed("5511999990000@c.us"));
        assert!(!registry.has_pending_timer("5511999990000@c.us"));
        assert_eq!(notifier.notified(), ["5511999990000@c.us"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_restarts_the_window() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = SessionRegistry::new(notifier.clone());

        registry.touch("sender");
        tokio::time::sleep(Duration::from_secs(300)).await;
        registry.touch("sender");

        // 800s after the first touch but only 500s after the second
        tokio::time::sleep(Duration::from_secs(500)).await;
        assert!(!registry.is_closed("sender"));
        assert!(notifier.notified().is_empty());

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert!(registry.is_closed("sender"));
        assert_eq!(notifier.notified(), ["sender"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_the_timer() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = SessionRegistry::new(notifier.clone());

        registry.touch("sender");
        registry.close("sender");
        assert!(registry.is_closed("sender"));
        assert!(!registry.has_pending_timer("sender"));

        tokio::time::sleep(INACTIVITY_WINDOW * 2).await;
        assert!(notifier.notified().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_clears_closed() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = SessionRegistry::new(notifier);

        registry.close("sender");
        assert!(registry.is_closed("sender"));
        registry.reopen("sender");
        assert!(!registry.is_closed("sender"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_alone_does_not_reopen() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = SessionRegistry::new(notifier);

        registry.close("sender");
        registry.touch("sender");
        assert!(registry.is_closed("sender"));
        assert!(registry.has_pending_timer("sender"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_closes_even_when_notice_fails() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let registry = SessionRegistry::new(notifier.clone());

        registry.touch("sender");
        tokio::time::sleep(INACTIVITY_WINDOW + Duration::from_secs(1)).await;

        assert!(registry.is_closed("sender"));
        assert!(!registry.has_pending_timer("sender"));
        assert_eq!(notifier.notified(), ["sender"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_are_independent_per_sender() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = SessionRegistry::new(notifier.clone());

        registry.touch("alpha");
        tokio::time::sleep(Duration::from_secs(400)).await;
        registry.touch("beta");

        // alpha expires at t=600, beta not until t=1000
        tokio::time::sleep(Duration::from_secs(250)).await;
        assert!(registry.is_closed("alpha"));
        assert!(!registry.is_closed("beta"));

        tokio::time::sleep(Duration::from_secs(400)).await;
        assert!(registry.is_closed("beta"));
        assert_eq!(notifier.notified(), ["alpha", "beta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unseen_sender_defaults() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = SessionRegistry::new(notifier);

        assert!(!registry.is_closed("nobody"));
        assert!(!registry.has_pending_timer("nobody"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_window() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry =
            SessionRegistry::with_window(notifier.clone(), Duration::from_secs(5));

        registry.touch("sender");
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(registry.is_closed("sender"));
        assert_eq!(notifier.notified(), ["sender"]);
    }
}
