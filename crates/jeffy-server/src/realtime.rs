//! In-process fan-out of order, delivery and driver events.
//!
//! Handlers publish after their database transaction commits. Delivery is
//! best effort: with no subscribers the event is dropped, and a subscriber
//! that falls more than the channel capacity behind skips ahead.

use chrono::{DateTime, Utc};
use jeffy_core::domain::{DeliveryStatus, OrderStatus};
use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// Which SSE feed an event belongs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Orders,
    Drivers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    OrderStatus {
        order_id: i64,
        order_number: String,
        status: OrderStatus,
        at: DateTime<Utc>,
    },
    DeliveryStatus {
        delivery_id: i64,
        order_id: i64,
        driver_id: i64,
        status: DeliveryStatus,
        at: DateTime<Utc>,
    },
    DriverLocation {
        driver_id: i64,
        latitude: f64,
        longitude: f64,
        heading: Option<f64>,
        recorded_at: DateTime<Utc>,
    },
}

impl RealtimeEvent {
    #[must_use]
    pub fn feed(&self) -> Feed {
        match self {
            Self::OrderStatus { .. } | Self::DeliveryStatus { .. } => Feed::Orders,
            Self::DriverLocation { .. } => Feed::Drivers,
        }
    }

    /// SSE `event:` name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderStatus { .. } => "order_status",
            Self::DeliveryStatus { .. } => "delivery_status",
            Self::DriverLocation { .. } => "driver_location",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: RealtimeEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = name, receivers, "realtime event published"),
            Err(_) => tracing::trace!(event = name, "realtime event dropped, no subscribers"),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(driver_id: i64) -> RealtimeEvent {
        RealtimeEvent::DriverLocation {
            driver_id,
            latitude: 53.8,
            longitude: -1.55,
            heading: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn events_route_to_their_feed() {
        assert_eq!(location(1).feed(), Feed::Drivers);
        let order = RealtimeEvent::OrderStatus {
            order_id: 1,
            order_number: "JF-1".to_string(),
            status: OrderStatus::Confirmed,
            at: Utc::now(),
        };
        assert_eq!(order.feed(), Feed::Orders);
        assert_eq!(order.name(), "order_status");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(location(7)).unwrap();
        assert_eq!(json["type"], "driver_location");
        assert_eq!(json["driver_id"], 7);
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::new(4);
        bus.publish(location(1));
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(location(3));
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, RealtimeEvent::DriverLocation { driver_id: 3, .. }));
    }
}
