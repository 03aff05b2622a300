//! Routes one inbound message through the funnel and delivers the reply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::menu::{self, MenuRoute};
use crate::message::InboundMessage;
use crate::session::{IdleNotifier, SessionRegistry};
use crate::transport::Transport;

/// Pause between the typing signal and the reply itself.
pub const TYPING_DELAY: Duration = Duration::from_millis(1_500);

/// Applies the dispatch algorithm: reject groups, normalize, touch the
/// session, pick a route, pace, deliver.
pub struct Dispatcher {
    registry: SessionRegistry,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(registry: SessionRegistry, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Handle one inbound message end to end. Returns the route taken, or
    /// `None` when the message was rejected (group conversations get no
    /// reply, no state change, no timer refresh).
    ///
    /// Transport failures are logged and swallowed here; dispatch always
    /// runs to completion so session state stays consistent.
    pub async fn dispatch(&self, message: &InboundMessage) -> Option<MenuRoute> {
        if message.is_group || message.sender.ends_with("@g.us") {
            tracing::debug!(sender = %message.sender, "Ignoring group message");
            return None;
        }

        let text = menu::normalize(&message.body);
        self.registry.touch(&message.sender);

        let route = MenuRoute::for_text(&text);
        // Any route except an explicit close restarts the funnel cycle.
        if route != MenuRoute::Close {
            self.registry.reopen(&message.sender);
        }

        tracing::info!(sender = %message.sender, route = ?route, "Dispatching reply");

        self.pace_typing(&message.sender).await;
        self.deliver(&message.sender, route.reply_text()).await;

        if route == MenuRoute::Close {
            self.registry.close(&message.sender);
        }

        Some(route)
    }

    /// Best-effort typing presence followed by the pacing delay. The delay
    /// runs whether or not the presence signal went through.
    async fn pace_typing(&self, sender: &str) {
        if let Err(e) = self.transport.send_typing(sender).await {
            tracing::warn!(sender = %sender, error = %e, "Typing signal failed");
        }
        tokio::time::sleep(TYPING_DELAY).await;
    }

    async fn deliver(&self, sender: &str, body: &str) {
        if let Err(e) = self.transport.send_text(sender, body).await {
            tracing::error!(sender = %sender, error = %e, "Failed to send reply");
        }
    }
}

/// Bridges the registry's timeout callback onto the transport: when a
/// session is closed for idleness, the sender gets the inactivity notice.
pub struct IdleCloser {
    transport: Arc<dyn Transport>,
}

impl IdleCloser {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl IdleNotifier for IdleCloser {
    async fn notify_idle(&self, sender: &str) -> anyhow::Result<()> {
        self.transport
            .send_text(sender, menu::INACTIVITY_TEXT)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::INACTIVITY_WINDOW;
    use crate::transport::{TransportError, TransportResult};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        typing: Mutex<Vec<String>>,
        sent: Mutex<Vec<(String, String)>>,
        fail_typing: bool,
        fail_send: bool,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }

        fn typing(&self) -> Vec<String> {
            self.typing.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send_typing(&self, to: &str) -> TransportResult<()> {
            if self.fail_typing {
                return Err(TransportError::SendFailed("typing refused".to_string()));
            }
            self.typing.lock().unwrap().push(to.to_string());
            Ok(())
        }

        async fn send_text(&self, to: &str, body: &str) -> TransportResult<()> {
            if self.fail_send {
                return Err(TransportError::SendFailed("send refused".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok(())
        }

        async fn health_check(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    fn dispatcher_with(transport: Arc<RecordingTransport>) -> Dispatcher {
        let notifier = Arc::new(IdleCloser::new(transport.clone()));
        let registry = SessionRegistry::new(notifier);
        Dispatcher::new(registry, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_gets_the_menu() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher_with(transport.clone());

        let msg = InboundMessage::text("wamid.1", "5511999990000@c.us", "Oi");
        let route = dispatcher.dispatch(&msg).await;

        assert_eq!(route, Some(MenuRoute::Menu));
        assert_eq!(transport.typing(), ["5511999990000@c.us"]);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "5511999990000@c.us");
        assert!(sent[0].1.contains("1️⃣ Fazer pedido"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_funnel_walkthrough() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher_with(transport.clone());

        dispatcher
            .dispatch(&InboundMessage::text("wamid.1", "a@c.us", "Oi"))
            .await;
        dispatcher
            .dispatch(&InboundMessage::text("wamid.2", "a@c.us", "1"))
            .await;
        dispatcher
            .dispatch(&InboundMessage::text("wamid.3", "a@c.us", "0"))
            .await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent[0].1.contains("Escolha a opção"));
        assert!(sent[1].1.contains("Fazer seu pedido"));
        assert!(sent[2].1.contains("Atendimento encerrado"));
        assert!(dispatcher.registry().is_closed("a@c.us"));
        assert!(!dispatcher.registry().has_pending_timer("a@c.us"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_option_works_without_prior_menu() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher_with(transport.clone());

        let route = dispatcher
            .dispatch(&InboundMessage::text("wamid.1", "b@c.us", "1"))
            .await;

        assert_eq!(route, Some(MenuRoute::Ordering));
        assert!(transport.sent()[0].1.contains("rápido e fácil"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_messages_are_ignored() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher_with(transport.clone());

        let flagged = InboundMessage {
            is_group: true,
            ..InboundMessage::text("wamid.1", "team@c.us", "oi")
        };
        assert_eq!(dispatcher.dispatch(&flagged).await, None);

        let by_suffix = InboundMessage::text("wamid.2", "team@g.us", "oi");
        assert_eq!(dispatcher.dispatch(&by_suffix).await, None);

        assert!(transport.sent().is_empty());
        assert!(transport.typing().is_empty());
        assert!(!dispatcher.registry().has_pending_timer("team@c.us"));
        assert!(!dispatcher.registry().has_pending_timer("team@g.us"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_reopens_closed_session() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher_with(transport.clone());

        dispatcher
            .dispatch(&InboundMessage::text("wamid.1", "c@c.us", "0"))
            .await;
        assert!(dispatcher.registry().is_closed("c@c.us"));

        dispatcher
            .dispatch(&InboundMessage::text("wamid.2", "c@c.us", "menu"))
            .await;
        assert!(!dispatcher.registry().is_closed("c@c.us"));
        assert!(dispatcher.registry().has_pending_timer("c@c.us"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_happens_even_when_send_fails() {
        let transport = Arc::new(RecordingTransport {
            fail_send: true,
            ..Default::default()
        });
        let dispatcher = dispatcher_with(transport.clone());

        let route = dispatcher
            .dispatch(&InboundMessage::text("wamid.1", "d@c.us", "0"))
            .await;

        assert_eq!(route, Some(MenuRoute::Close));
        assert!(dispatcher.registry().is_closed("d@c.us"));
        assert!(!dispatcher.registry().has_pending_timer("d@c.us"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_failure_does_not_block_the_reply() {
        let transport = Arc::new(RecordingTransport {
            fail_typing: true,
            ..Default::default()
        });
        let dispatcher = dispatcher_with(transport.clone());

        dispatcher
            .dispatch(&InboundMessage::text("wamid.1", "e@c.us", "2"))
            .await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Sobre envio e entrega"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_text_gets_the_fallback() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher_with(transport.clone());

        let route = dispatcher
            .dispatch(&InboundMessage::text("wamid.1", "f@c.us", "quero saber de tudo"))
            .await;

        assert_eq!(route, Some(MenuRoute::Fallback));
        assert!(transport.sent()[0].1.contains("Não reconhecemos essa opção"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sender_receives_inactivity_notice() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher_with(transport.clone());

        dispatcher
            .dispatch(&InboundMessage::text("wamid.1", "g@c.us", "oi"))
            .await;
        tokio::time::sleep(INACTIVITY_WINDOW + Duration::from_secs(1)).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].1.contains("Você ficou inativo"));
        assert!(dispatcher.registry().is_closed("g@c.us"));
    }
}
