//! Request dispatcher
//!
//! Applies one decoded request to the registry and routes the result
//! through the hub.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::hub::Hub;
use super::registry::Registry;
use crate::transport::{ConnectionId, Request, RequestKind};

/// What handling a request did
///
/// None of these are sent back to the peer; they exist so callers and tests
/// can tell a GET miss apart from a reply that never arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// GET hit; `delivered` is false if the requester vanished meanwhile
    Replied { delivered: bool },
    /// GET for a slot that does not exist
    Miss,
    /// POST stored and fanned out to `recipients` other connections
    Broadcast { created: bool, recipients: usize },
    /// Unrecognized request type
    Ignored { kind: String },
}

/// Routes requests against shared relay state
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    hub: Arc<Hub>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, hub: Arc<Hub>) -> Self {
        Self { registry, hub }
    }

    pub async fn dispatch(&self, sender: ConnectionId, request: Request) -> Outcome {
        match request.kind {
            RequestKind::Get => match self.registry.get_value(&request.name).await {
                Some(value) => {
                    let delivered = self.hub.respond_to(sender, value).await;
                    debug!(connection = %sender, slot = %request.name, delivered, "GET");
                    Outcome::Replied { delivered }
                }
                None => {
                    debug!(connection = %sender, slot = %request.name, "GET miss");
                    Outcome::Miss
                }
            },
            RequestKind::Post => {
                let data = Bytes::from(request.data.unwrap_or_default());
                let (value, created) = self.registry.set_value(&request.name, data).await;
                let recipients = self.hub.broadcast_from(sender, value).await;
                debug!(
                    connection = %sender,
                    slot = %request.name,
                    created,
                    recipients,
                    "POST"
                );
                Outcome::Broadcast {
                    created,
                    recipients,
                }
            }
            RequestKind::Unknown(kind) => {
                debug!(connection = %sender, kind = %kind, "Ignoring unknown request type");
                Outcome::Ignored { kind }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryChannel;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    struct Fixture {
        dispatcher: Dispatcher,
        registry: Arc<Registry>,
        hub: Arc<Hub>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(Registry::new());
        let hub = Arc::new(Hub::new());
        Fixture {
            dispatcher: Dispatcher::new(Arc::clone(&registry), Arc::clone(&hub)),
            registry,
            hub,
        }
    }

    async fn connect(hub: &Hub) -> (ConnectionId, MemoryChannel) {
        let (near, far) = MemoryChannel::pair();
        let id = Uuid::new_v4();
        hub.register(id, Arc::new(near)).await;
        (id, far)
    }

    #[tokio::test]
    async fn test_get_miss_sends_nothing() {
        let f = fixture();
        let (a, a_far) = connect(&f.hub).await;

        let outcome = f.dispatcher.dispatch(a, Request::get("default")).await;

        assert_eq!(outcome, Outcome::Miss);
        assert_eq!(a_far.try_receive().await, None);
    }

    #[tokio::test]
    async fn test_get_hit_replies_with_raw_value() {
        let f = fixture();
        f.registry.set_value("default", Bytes::from("hello")).await;
        let (a, a_far) = connect(&f.hub).await;
        let (_b, b_far) = connect(&f.hub).await;

        let outcome = f.dispatcher.dispatch(a, Request::get("default")).await;

        assert_eq!(outcome, Outcome::Replied { delivered: true });
        assert_eq!(a_far.try_receive().await, Some(Bytes::from("hello")));
        assert_eq!(b_far.try_receive().await, None);
    }

    #[tokio::test]
    async fn test_get_for_departed_requester() {
        let f = fixture();
        f.registry.set_value("default", Bytes::from("hello")).await;

        let outcome = f
            .dispatcher
            .dispatch(Uuid::new_v4(), Request::get("default"))
            .await;

        assert_eq!(outcome, Outcome::Replied { delivered: false });
    }

    #[tokio::test]
    async fn test_post_stores_and_broadcasts_to_others() {
        let f = fixture();
        let (a, a_far) = connect(&f.hub).await;
        let (_b, b_far) = connect(&f.hub).await;

        let outcome = f
            .dispatcher
            .dispatch(a, Request::post("default", "hello"))
            .await;

        assert_eq!(
            outcome,
            Outcome::Broadcast {
                created: true,
                recipients: 1
            }
        );
        assert_eq!(
            f.registry.get_value("default").await,
            Some(Bytes::from("hello"))
        );
        assert_eq!(b_far.try_receive().await, Some(Bytes::from("hello")));
        assert_eq!(a_far.try_receive().await, None);
    }

    #[tokio::test]
    async fn test_post_without_data_stores_empty_value() {
        let f = fixture();
        let (a, _a_far) = connect(&f.hub).await;
        let request = Request {
            kind: RequestKind::Post,
            name: "default".to_string(),
            data: None,
        };

        f.dispatcher.dispatch(a, request).await;

        assert_eq!(f.registry.get_value("default").await, Some(Bytes::new()));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_ignored() {
        let f = fixture();
        let (a, a_far) = connect(&f.hub).await;
        let (_b, b_far) = connect(&f.hub).await;
        let request = Request {
            kind: RequestKind::Unknown("DELETE".to_string()),
            name: "default".to_string(),
            data: Some("x".to_string()),
        };

        let outcome = f.dispatcher.dispatch(a, request).await;

        assert_eq!(
            outcome,
            Outcome::Ignored {
                kind: "DELETE".to_string()
            }
        );
        assert!(f.registry.is_empty().await);
        assert_eq!(a_far.try_receive().await, None);
        assert_eq!(b_far.try_receive().await, None);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let f = fixture();
        let (a, _a_far) = connect(&f.hub).await;
        let (b, _b_far) = connect(&f.hub).await;

        f.dispatcher.dispatch(a, Request::post("default", "A")).await;
        f.dispatcher.dispatch(b, Request::post("default", "B")).await;

        assert_eq!(f.registry.get_value("default").await, Some(Bytes::from("B")));
    }
}
