//! In-process change-notification bus.
//!
//! Every row-created event flows through a [`NotificationBus`]. The HTTP server
//! forwards it to SSE and WebSocket clients; local [`ProjectSync`] instances
//! subscribe to it directly.
//!
//! [`ProjectSync`]: crate::sync::ProjectSync

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio::sync::Mutex;

use crate::models::Notification;

const CHANNEL_CAPACITY: usize = 256;
const DEFAULT_HISTORY: usize = 200;

/// What a subscriber gets back from [`Subscription::recv`].
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Notification(Notification),
    /// The subscriber fell behind and this many notifications were dropped.
    Lagged(u64),
}

/// Receiving half, optionally filtered to one project.
pub struct Subscription {
    receiver: Receiver<Notification>,
    project_id: Option<i64>,
}

impl Subscription {
    /// Next matching delivery, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) => {
                    if self.matches(&notification) {
                        return Some(Delivery::Notification(notification));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    return Some(Delivery::Lagged(missed));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). Lag is skipped silently.
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.try_recv() {
                Ok(notification) => {
                    if self.matches(&notification) {
                        return Some(notification);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn project_id(&self) -> Option<i64> {
        self.project_id
    }

    fn matches(&self, notification: &Notification) -> bool {
        match self.project_id {
            Some(id) => notification.project_id() == id,
            None => true,
        }
    }
}

/// Publish/subscribe hub for [`Notification`]s.
#[derive(Clone)]
pub struct NotificationBus {
    sender: Sender<Notification>,
    history: Arc<Mutex<VecDeque<Notification>>>,
    max_history: usize,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::with_history_size(DEFAULT_HISTORY)
    }

    pub fn with_history_size(size: usize) -> Self {
        Self::with_capacity(CHANNEL_CAPACITY, size)
    }

    /// `capacity` bounds how far a subscriber may fall behind before it lags.
    pub fn with_capacity(capacity: usize, history: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            history: Arc::new(Mutex::new(VecDeque::new())),
            max_history: history,
        }
    }

    /// Publish to every current subscriber. Having none is not an error.
    pub async fn publish(&self, notification: Notification) {
        tracing::debug!(
            kind = notification.kind.as_str(),
            project_id = notification.project_id(),
            "publishing notification"
        );

        {
            let mut history = self.history.lock().await;
            history.push_back(notification.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        let _ = self.sender.send(notification);
    }

    /// Subscribe to every project.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            project_id: None,
        }
    }

    /// Subscribe to notifications addressed to one project.
    pub fn subscribe_project(&self, project_id: i64) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            project_id: Some(project_id),
        }
    }

    /// Most recent notifications, oldest first.
    pub async fn recent(&self, limit: usize) -> Vec<Notification> {
        let history = self.history.lock().await;
        let start = history.len().saturating_sub(limit);
        history.iter().skip(start).cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogEntry, Message, Sender as MessageSender};
    use chrono::Utc;

    fn message(project_id: i64, content: &str) -> Notification {
        Notification::message_created(Message {
            id: 1,
            project_id,
            content: content.into(),
            sender: MessageSender::User,
            metadata: None,
            created_at: Utc::now(),
        })
    }

    fn log(project_id: i64) -> Notification {
        Notification::log_created(LogEntry {
            id: 1,
            project_id,
            log_type: "execution".into(),
            title: "Run".into(),
            details: None,
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = NotificationBus::new();
        let mut sub = bus.subscribe();

        bus.publish(message(7, "hi")).await;

        let received = sub.try_recv().unwrap();
        assert_eq!(received.project_id(), 7);
    }

    #[tokio::test]
    async fn test_project_filter() {
        let bus = NotificationBus::new();
        let mut sub = bus.subscribe_project(7);

        bus.publish(message(8, "elsewhere")).await;
        bus.publish(log(7)).await;

        let received = sub.try_recv().unwrap();
        assert_eq!(received.kind.as_str(), "log_created");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lag_is_reported() {
        let bus = NotificationBus::new();
        let mut sub = bus.subscribe();

        for i in 0..(CHANNEL_CAPACITY + 10) {
            bus.publish(message(7, &i.to_string())).await;
        }

        assert_eq!(sub.recv().await, Some(Delivery::Lagged(10)));
    }

    #[tokio::test]
    async fn test_small_capacity_lags_early() {
        let bus = NotificationBus::with_capacity(2, 10);
        let mut sub = bus.subscribe_project(7);

        for i in 0..5 {
            bus.publish(message(7, &i.to_string())).await;
        }

        assert_eq!(sub.recv().await, Some(Delivery::Lagged(3)));
        assert_eq!(bus.recent(10).await.len(), 5);
    }

    #[tokio::test]
    async fn test_history_limit() {
        let bus = NotificationBus::with_history_size(3);
        for i in 0..5 {
            bus.publish(message(7, &i.to_string())).await;
        }

        let recent = bus.recent(10).await;
        assert_eq!(recent.len(), 3);
        match &recent[0].kind {
            crate::models::NotificationKind::MessageCreated { message } => {
                assert_eq!(message.content, "2")
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = NotificationBus::new();
        bus.publish(log(1)).await;
        assert_eq!(bus.subscriber_count(), 0);
    }
}
