//! Event types for inter-service communication.
//!
//! This module defines the event system used by the storefront for
//! asynchronous communication between components. Events flow through an
//! event bus allowing services to react to state changes in other parts
//! of the system.

use crate::TransitionEvent;
use serde::{Deserialize, Serialize};

/// Main event type encompassing all storefront events.
///
/// Events are categorized by the flow that produces them, allowing
/// consumers to filter and handle specific event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorefrontEvent {
	/// Events from order lifecycle processing.
	Order(OrderEvent),
	/// Events from the payment flow.
	Payment(PaymentEvent),
}

/// Events related to order lifecycle processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order has been created.
	Created {
		order_id: String,
		customer_id: String,
	},
	/// A lifecycle transition has been applied and persisted.
	TransitionApplied { event: TransitionEvent },
}

/// Events related to the payment flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentEvent {
	/// A checkout session has been opened with the gateway.
	CheckoutOpened {
		order_id: String,
		gateway_order_id: String,
	},
}
