//! Client event bus
//!
//! Cross-module notifications (auth-state stores, session managers, stale-data
//! resubscribers) are delivered over an explicit broadcast channel owned by
//! the client, so listeners are statically discoverable instead of coupled
//! through ambient globals. Emission is lossy: having no listener is normal,
//! not an error.

use tokio::sync::broadcast;
use tracing::debug;

/// Notifications emitted by the dispatcher for external listeners.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A refresh cycle succeeded; listeners holding an in-memory token copy
    /// should update it.
    TokenRefreshed { access_token: String },
    /// A request completed 2xx; listeners that gave up on a previously-down
    /// backend can re-attempt stalled work.
    BackendOnline { url: String },
    /// A refresh cycle failed; credentials were cleared and the application
    /// must return to its login flow.
    SessionExpired,
}

/// Broadcast channel for [`ClientEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to client events. Each receiver sees every event emitted
    /// after its subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        debug!(?event, "client event");
        // A send error only means there are no subscribers right now.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(ClientEvent::TokenRefreshed {
            access_token: "at_new".into(),
        });

        match rx.recv().await.unwrap() {
            ClientEvent::TokenRefreshed { access_token } => assert_eq!(access_token, "at_new"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_a_no_op() {
        let bus = EventBus::default();
        bus.emit(ClientEvent::SessionExpired);
        // Nothing to assert beyond "did not panic"; a later subscriber only
        // sees events emitted after it subscribed.
        let mut rx = bus.subscribe();
        bus.emit(ClientEvent::BackendOnline {
            url: "/api/v1/dive-sites/".into(),
        });
        assert!(matches!(
            rx.recv().await.unwrap(),
            ClientEvent::BackendOnline { .. }
        ));
    }

    #[tokio::test]
    async fn all_subscribers_see_every_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(ClientEvent::SessionExpired);

        assert!(matches!(rx1.recv().await.unwrap(), ClientEvent::SessionExpired));
        assert!(matches!(rx2.recv().await.unwrap(), ClientEvent::SessionExpired));
    }
}
