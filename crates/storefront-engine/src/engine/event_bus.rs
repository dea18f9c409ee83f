//! Event bus for broadcasting storefront events between components.
//!
//! The engine publishes an event for every applied order transition and for
//! checkout sessions being opened. Subscribers receive events on a tokio
//! broadcast channel; slow subscribers may observe lag but never block
//! publishers.

use storefront_types::StorefrontEvent;
use tokio::sync::broadcast;

/// Broadcast channel for storefront events.
///
/// Cloning the bus is cheap and all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<StorefrontEvent>,
}

impl EventBus {
	/// Creates a new event bus with the given channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to events published on this bus.
	pub fn subscribe(&self) -> broadcast::Receiver<StorefrontEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns an error when no subscriber is listening; callers that do not
	/// care (fire-and-forget publishing) can ignore it with `.ok()`.
	pub fn publish(
		&self,
		event: StorefrontEvent,
	) -> Result<usize, broadcast::error::SendError<StorefrontEvent>> {
		self.sender.send(event)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use storefront_types::{OrderEvent, StorefrontEvent};

	#[tokio::test]
	async fn delivers_events_to_subscribers() {
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();

		bus.publish(StorefrontEvent::Order(OrderEvent::Created {
			order_id: "ord-1".to_string(),
			customer_id: "cust-1".to_string(),
		}))
		.unwrap();

		match rx.recv().await.unwrap() {
			StorefrontEvent::Order(OrderEvent::Created { order_id, .. }) => {
				assert_eq!(order_id, "ord-1");
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[tokio::test]
	async fn publish_without_subscribers_errors() {
		let bus = EventBus::new(4);
		let event = StorefrontEvent::Order(OrderEvent::Created {
			order_id: "ord-2".to_string(),
			customer_id: "cust-2".to_string(),
		});
		assert!(bus.publish(event).is_err());
	}

	#[tokio::test]
	async fn clones_share_the_channel() {
		let bus = EventBus::new(4);
		let clone = bus.clone();
		let mut rx = bus.subscribe();

		clone
			.publish(StorefrontEvent::Order(OrderEvent::Created {
				order_id: "ord-3".to_string(),
				customer_id: "cust-3".to_string(),
			}))
			.unwrap();

		assert!(rx.recv().await.is_ok());
	}
}
