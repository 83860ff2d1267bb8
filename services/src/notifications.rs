//! Order change notifications over pub/sub.
//!
//! Delivery is at-most-once: a listener that is not subscribed when a notification is
//! published never sees it, and nothing is replayed.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use opsorder_coordination::error::Result as CoordinationResult;
use opsorder_coordination::store::{CoordinationStore, MessageStream};
use opsorder_core::types::{HistoryEntry, Order, OrderId, OrderStatus, OrderType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A change to one order, as published on the notification channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderNotification {
    /// A new order was persisted in `pending`
    Created {
        /// Order id
        order_id: OrderId,
        /// Order type tag
        order_type: OrderType,
        /// Requester
        created_by: String,
        /// Creation time
        at: DateTime<Utc>,
    },
    /// An order moved between statuses
    StatusChanged {
        /// Order id
        order_id: OrderId,
        /// Order type tag
        order_type: OrderType,
        /// Status before
        from: OrderStatus,
        /// Status after
        to: OrderStatus,
        /// Executor of the transition
        actor: String,
        /// Reason given, if any
        reason: Option<String>,
        /// Transition time
        at: DateTime<Utc>,
    },
}

impl OrderNotification {
    /// Notification for a freshly created order
    #[must_use]
    pub fn created<P>(order: &Order<P>) -> Self {
        Self::Created {
            order_id: order.id,
            order_type: order.order_type.clone(),
            created_by: order.created_by.clone(),
            at: order.created_at,
        }
    }

    /// Notification for an applied transition
    #[must_use]
    pub fn status_changed<P>(order: &Order<P>, entry: &HistoryEntry) -> Self {
        Self::StatusChanged {
            order_id: order.id,
            order_type: order.order_type.clone(),
            from: entry.from,
            to: entry.to,
            actor: entry.actor.clone(),
            reason: entry.reason.clone(),
            at: entry.at,
        }
    }

    /// Order the notification is about
    #[must_use]
    pub const fn order_id(&self) -> OrderId {
        match self {
            Self::Created { order_id, .. } | Self::StatusChanged { order_id, .. } => *order_id,
        }
    }
}

/// Publishes [`OrderNotification`]s, never failing the caller.
#[derive(Clone)]
pub struct OrderNotifier {
    store: Arc<dyn CoordinationStore>,
    channel: String,
}

impl OrderNotifier {
    /// Publish on `channel` through `store`
    #[must_use]
    pub fn new(store: Arc<dyn CoordinationStore>, channel: impl Into<String>) -> Self {
        Self {
            store,
            channel: channel.into(),
        }
    }

    /// Channel notifications go to
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish a notification. Returns how many listeners received it; failures are
    /// logged and reported as zero.
    pub async fn publish(&self, notification: &OrderNotification) -> usize {
        let message = match serde_json::to_string(notification) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode order notification");
                return 0;
            },
        };

        match self.store.publish(&self.channel, &message).await {
            Ok(receivers) => {
                metrics::counter!("opsorder.notification.published").increment(1);
                tracing::debug!(
                    channel = %self.channel,
                    order_id = %notification.order_id(),
                    receivers,
                    "Published order notification"
                );
                receivers
            },
            Err(e) => {
                tracing::warn!(
                    channel = %self.channel,
                    order_id = %notification.order_id(),
                    error = %e,
                    "Order notification dropped"
                );
                0
            },
        }
    }
}

/// Subscribed listener decoding [`OrderNotification`]s.
pub struct NotificationListener {
    channel: String,
    messages: MessageStream,
}

impl NotificationListener {
    /// Subscribe to `channel`.
    ///
    /// # Errors
    ///
    /// Returns error if the subscription cannot be established.
    pub async fn subscribe(
        store: &dyn CoordinationStore,
        channel: &str,
    ) -> CoordinationResult<Self> {
        let messages = store.subscribe(channel).await?;
        tracing::info!(channel = %channel, "Listening for order notifications");
        Ok(Self {
            channel: channel.to_string(),
            messages,
        })
    }

    /// Next decodable notification; malformed messages are skipped.
    ///
    /// Returns `None` once the subscription closes.
    pub async fn recv(&mut self) -> Option<OrderNotification> {
        while let Some(message) = self.messages.next().await {
            match serde_json::from_str(&message) {
                Ok(notification) => return Some(notification),
                Err(e) => tracing::warn!(
                    channel = %self.channel,
                    error = %e,
                    "Skipping malformed order notification"
                ),
            }
        }
        None
    }
}
