//! Alert handler for the storefront engine.
//!
//! Consumes transition events off the bus and turns the two the admins
//! care about into feed alerts: requirements arriving and payments being
//! captured. Everything else passes through silently.

use std::sync::Arc;
use storefront_notify::{AdminAlert, AlertKind, NotificationService};
use storefront_store::StoreService;
use storefront_types::{
	truncate_id, DeveloperStatus, Order, OrderActionKind, PaymentStatus, StoreNamespace,
	TransitionEvent, User,
};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Errors that can occur while handling alerts.
#[derive(Debug, Error)]
pub enum AlertError {
	#[error("Store error: {0}")]
	Store(String),
	#[error("Notification error: {0}")]
	Notify(String),
}

/// Builds admin alerts out of order transition events.
pub struct AlertHandler {
	store: Arc<StoreService>,
	notify: Arc<NotificationService>,
}

impl AlertHandler {
	pub fn new(store: Arc<StoreService>, notify: Arc<NotificationService>) -> Self {
		Self { store, notify }
	}

	/// Reacts to an applied transition.
	///
	/// Only requirements submissions and payment captures produce alerts.
	/// The customer's display name is cosmetic; when the lookup fails the
	/// alert still goes out with the truncated id.
	#[instrument(skip_all, fields(order_id = %truncate_id(&event.order_id), action = %event.action))]
	pub async fn handle_transition(&self, event: TransitionEvent) -> Result<(), AlertError> {
		let Some(kind) = classify(&event) else {
			return Ok(());
		};

		let (order, _) = self
			.store
			.fetch::<Order>(StoreNamespace::Orders, &event.order_id)
			.await
			.map_err(|e| AlertError::Store(e.to_string()))?;

		let user_name = match self
			.store
			.fetch::<User>(StoreNamespace::Users, &order.customer_id)
			.await
		{
			Ok((user, _)) => user.name,
			Err(_) => truncate_id(&order.customer_id),
		};

		let template_name = order.item.display_name().to_string();
		let message = match kind {
			AlertKind::RequirementsUpdate => {
				format!("{} submitted requirements for {}", user_name, template_name)
			},
			AlertKind::PaymentReceived => {
				format!("Payment received from {} for {}", user_name, template_name)
			},
		};

		let alert = AdminAlert {
			id: Uuid::new_v4().to_string(),
			kind,
			message,
			user_name,
			template_name,
			order_id: event.order_id.clone(),
			timestamp: event.timestamp,
			read: false,
		};

		self.notify
			.push(alert)
			.await
			.map_err(|e| AlertError::Notify(e.to_string()))?;

		debug!(?kind, "Alert pushed to the admin feed");
		Ok(())
	}
}

/// Picks the alert kind for an event, or `None` when admins are not
/// interested in it.
fn classify(event: &TransitionEvent) -> Option<AlertKind> {
	match event.action {
		OrderActionKind::SubmitRequirements
			if event.new_status.developer == DeveloperStatus::RequirementsSubmitted =>
		{
			Some(AlertKind::RequirementsUpdate)
		},
		OrderActionKind::RecordPayment if event.new_status.payment == PaymentStatus::Paid => {
			Some(AlertKind::PaymentReceived)
		},
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal::Decimal;
	use std::collections::HashMap;
	use storefront_notify::implementations::feed::{FeedConfig, MemoryFeed};
	use storefront_notify::NotificationInterface;
	use storefront_store::implementations::memory::MemoryStore;
	use storefront_types::{
		Actor, DeliveryStatus, OrderItem, PriceBreakdown, StatusSnapshot,
	};

	struct Fixture {
		handler: AlertHandler,
		notify: Arc<NotificationService>,
		store: Arc<StoreService>,
	}

	fn fixture() -> Fixture {
		let store = Arc::new(StoreService::new(Box::new(MemoryStore::new())));
		let mut impls: HashMap<String, Arc<dyn NotificationInterface>> = HashMap::new();
		impls.insert(
			"feed".to_string(),
			Arc::new(MemoryFeed::new(FeedConfig { capacity: 10 })),
		);
		let notify =
			Arc::new(NotificationService::new(impls, "feed".to_string()).unwrap());
		let handler = AlertHandler::new(store.clone(), notify.clone());
		Fixture {
			handler,
			notify,
			store,
		}
	}

	async fn seed_order(store: &StoreService, id: &str, customer_id: &str) {
		let order = Order {
			id: id.to_string(),
			customer_id: customer_id.to_string(),
			assigned_admin: None,
			item: OrderItem::Template {
				template_id: "zay".to_string(),
				name: "Zay Ecommerce".to_string(),
			},
			requirements: Some("Two pages".to_string()),
			pricing: PriceBreakdown {
				base_price: Decimal::from(5000),
				customization_fee: Decimal::from(500),
				discount: Decimal::ZERO,
				total: Decimal::from(5500),
				coupon_code: None,
			},
			developer_status: DeveloperStatus::RequirementsSubmitted,
			payment_status: PaymentStatus::Pending,
			delivery_status: DeliveryStatus::Pending,
			delivery_artifact: None,
			payment: None,
			history: Vec::new(),
			created_at: 1,
			updated_at: 2,
		};
		store
			.create(StoreNamespace::Orders, id, &order)
			.await
			.unwrap();
	}

	fn snapshot(
		developer: DeveloperStatus,
		payment: PaymentStatus,
	) -> StatusSnapshot {
		StatusSnapshot {
			developer,
			payment,
			delivery: DeliveryStatus::Pending,
		}
	}

	fn submit_event(order_id: &str) -> TransitionEvent {
		TransitionEvent {
			order_id: order_id.to_string(),
			action: OrderActionKind::SubmitRequirements,
			previous_status: snapshot(DeveloperStatus::Pending, PaymentStatus::Pending),
			new_status: snapshot(
				DeveloperStatus::RequirementsSubmitted,
				PaymentStatus::Pending,
			),
			actor: Actor::Customer {
				id: "cust-1".to_string(),
			},
			timestamp: 2,
		}
	}

	fn payment_event(order_id: &str) -> TransitionEvent {
		TransitionEvent {
			order_id: order_id.to_string(),
			action: OrderActionKind::RecordPayment,
			previous_status: snapshot(DeveloperStatus::Accepted, PaymentStatus::Pending),
			new_status: snapshot(DeveloperStatus::Accepted, PaymentStatus::Paid),
			actor: Actor::Gateway,
			timestamp: 3,
		}
	}

	#[tokio::test]
	async fn requirements_submission_alerts_the_feed() {
		let fx = fixture();
		seed_order(&fx.store, "ord-1", "cust-1").await;

		fx.handler
			.handle_transition(submit_event("ord-1"))
			.await
			.unwrap();

		let alerts = fx.notify.list().await.unwrap();
		assert_eq!(alerts.len(), 1);
		assert_eq!(alerts[0].kind, AlertKind::RequirementsUpdate);
		assert_eq!(alerts[0].order_id, "ord-1");
		assert_eq!(alerts[0].template_name, "Zay Ecommerce");
		assert!(!alerts[0].read);
	}

	#[tokio::test]
	async fn payment_capture_alerts_the_feed() {
		let fx = fixture();
		seed_order(&fx.store, "ord-1", "cust-1").await;

		fx.handler
			.handle_transition(payment_event("ord-1"))
			.await
			.unwrap();

		let alerts = fx.notify.list().await.unwrap();
		assert_eq!(alerts.len(), 1);
		assert_eq!(alerts[0].kind, AlertKind::PaymentReceived);
		assert!(alerts[0]
			.message
			.starts_with("Payment received from"));
	}

	#[tokio::test]
	async fn uninteresting_transitions_are_ignored() {
		let fx = fixture();
		seed_order(&fx.store, "ord-1", "cust-1").await;

		let event = TransitionEvent {
			order_id: "ord-1".to_string(),
			action: OrderActionKind::Accept,
			previous_status: snapshot(
				DeveloperStatus::RequirementsSubmitted,
				PaymentStatus::Pending,
			),
			new_status: snapshot(DeveloperStatus::Accepted, PaymentStatus::Pending),
			actor: Actor::Admin {
				id: "admin-1".to_string(),
			},
			timestamp: 3,
		};
		fx.handler.handle_transition(event).await.unwrap();

		assert_eq!(fx.notify.list().await.unwrap().len(), 0);
		assert_eq!(fx.notify.unread_count().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn customer_name_resolves_when_the_record_exists() {
		let fx = fixture();
		seed_order(&fx.store, "ord-1", "cust-1").await;
		let user = User {
			id: "cust-1".to_string(),
			name: "Asha".to_string(),
			email: "asha@example.com".to_string(),
			role: storefront_types::UserRole::Customer,
			status: storefront_types::AccountStatus::Active,
			created_at: 1,
			updated_at: 1,
		};
		fx.store
			.create(StoreNamespace::Users, "cust-1", &user)
			.await
			.unwrap();

		fx.handler
			.handle_transition(submit_event("ord-1"))
			.await
			.unwrap();

		let alerts = fx.notify.list().await.unwrap();
		assert_eq!(alerts[0].user_name, "Asha");
		assert_eq!(
			alerts[0].message,
			"Asha submitted requirements for Zay Ecommerce"
		);
	}

	#[tokio::test]
	async fn missing_order_is_a_store_error() {
		let fx = fixture();
		let err = fx
			.handler
			.handle_transition(submit_event("ghost"))
			.await
			.unwrap_err();
		assert!(matches!(err, AlertError::Store(_)));
	}

	#[tokio::test]
	async fn alerts_list_newest_first() {
		let fx = fixture();
		seed_order(&fx.store, "ord-1", "cust-1").await;
		seed_order(&fx.store, "ord-2", "cust-1").await;

		fx.handler
			.handle_transition(submit_event("ord-1"))
			.await
			.unwrap();
		fx.handler
			.handle_transition(payment_event("ord-2"))
			.await
			.unwrap();

		let alerts = fx.notify.list().await.unwrap();
		assert_eq!(alerts.len(), 2);
		assert_eq!(alerts[0].order_id, "ord-2");
		assert_eq!(alerts[1].order_id, "ord-1");
	}
}
