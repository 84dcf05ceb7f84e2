//! In-process message bus.
//!
//! One instance is created by the background context and handed to every
//! component that talks to other contexts. Subscribers receive every message
//! in send order; handlers additionally get a chance to answer requests.

use async_trait::async_trait;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use super::{Message, Reply};

const BUS_CAPACITY: usize = 1024;

/// Request/response participant on the bus.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Returns `None` when the message is not addressed to this handler.
    async fn handle(&self, message: &Message) -> Option<Reply>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub struct MessageBus {
    events: broadcast::Sender<Message>,
    handlers: RwLock<Vec<(HandlerId, Arc<dyn MessageHandler>)>>,
    next_id: AtomicU64,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            events,
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.events.subscribe()
    }

    pub fn register(&self, handler: Arc<dyn MessageHandler>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.push((id, handler));
        }
        id
    }

    pub fn unregister(&self, id: HandlerId) {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    /// Fire-and-forget broadcast. Nobody listening is not an error.
    pub fn publish(&self, message: Message) {
        debug!("fire: {}", message.topic());
        if self.events.send(message).is_err() {
            debug!("No subscriber is listening");
        }
    }

    /// Broadcasts `message`, then offers it to every registered handler in
    /// registration order. The first answer wins; later handlers still see
    /// the message.
    pub async fn send(&self, message: Message) -> Option<Reply> {
        self.publish(message.clone());

        let handlers: Vec<Arc<dyn MessageHandler>> = match self.handlers.read() {
            Ok(handlers) => handlers.iter().map(|(_, h)| h.clone()).collect(),
            Err(_) => return None,
        };

        let mut reply = None;
        for handler in handlers {
            if let Some(answer) = handler.handle(&message).await
                && reply.is_none()
            {
                reply = Some(answer);
            }
        }

        if reply.is_none() {
            debug!("No handler answered {}", message.topic());
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Progress;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = MessageBus::new();
        bus.publish(Message::CheckReposComplete);
    }

    #[tokio::test]
    async fn test_subscribers_see_messages_in_order() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe();

        bus.publish(Message::RepoCheckUpdated(Progress::default()));
        bus.publish(Message::CheckReposComplete);

        assert_eq!(
            rx.recv().await.unwrap(),
            Message::RepoCheckUpdated(Progress::default())
        );
        assert_eq!(rx.recv().await.unwrap(), Message::CheckReposComplete);
    }

    #[tokio::test]
    async fn test_send_returns_first_answer() {
        let bus = MessageBus::new();

        let mut silent = MockMessageHandler::new();
        silent.expect_handle().times(1).returning(|_| None);
        let mut popup = MockMessageHandler::new();
        popup
            .expect_handle()
            .times(1)
            .returning(|_| Some(Reply::PopupOpen(true)));
        let mut late = MockMessageHandler::new();
        late.expect_handle()
            .times(1)
            .returning(|_| Some(Reply::PopupOpen(false)));

        bus.register(Arc::new(silent));
        bus.register(Arc::new(popup));
        bus.register(Arc::new(late));

        assert_eq!(
            bus.send(Message::IsPopupOpen).await,
            Some(Reply::PopupOpen(true))
        );
    }

    #[tokio::test]
    async fn test_send_without_handlers() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe();

        assert_eq!(bus.send(Message::IsPopupOpen).await, None);
        assert_eq!(rx.recv().await.unwrap(), Message::IsPopupOpen);
    }

    #[tokio::test]
    async fn test_unregister() {
        let bus = MessageBus::new();
        let mut handler = MockMessageHandler::new();
        handler.expect_handle().never();

        let id = bus.register(Arc::new(handler));
        bus.unregister(id);

        assert_eq!(bus.send(Message::Authorize).await, None);
    }
}
