//! Storage-backed order state machine.
//!
//! Wraps the pure transition rules with persistence and optimistic
//! concurrency. Every order mutation follows the same shape: fetch the
//! snapshot and its store revision, run the rules, then write back with a
//! compare-and-swap against the revision that was read. The store revision
//! is the order's public version; a stale caller loses the CAS and gets
//! `ConcurrentModification` instead of silently overwriting newer state.

use crate::state::rules::{self, TransitionError};
use std::sync::Arc;
use storefront_store::{StoreError, StoreService};
use storefront_types::{
	current_timestamp, truncate_id, Actor, Order, OrderAction, StoreNamespace, TransitionEvent,
};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from the persistence side of order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Store error: {0}")]
	Store(String),
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error(transparent)]
	Transition(#[from] TransitionError),
}

/// Result of a persisted transition.
#[derive(Debug)]
pub struct TransitionOutcome {
	/// The order as stored after the transition.
	pub order: Order,
	/// Store revision of the stored snapshot.
	pub version: u64,
	/// Event describing the transition; `None` for the duplicate-payment
	/// no-op, which leaves the stored order untouched.
	pub event: Option<TransitionEvent>,
}

/// Order state machine operating on the configured store backend.
pub struct OrderStateMachine {
	store: Arc<StoreService>,
}

impl OrderStateMachine {
	pub fn new(store: Arc<StoreService>) -> Self {
		Self { store }
	}

	/// Persists a freshly minted order. Fails if the id already exists.
	pub async fn create_order(&self, order: &Order) -> Result<u64, OrderStateError> {
		self.store
			.create(StoreNamespace::Orders, &order.id, order)
			.await
			.map_err(|e| map_store_error(&order.id, e))
	}

	/// Fetches an order together with its current store revision.
	pub async fn get_order(&self, order_id: &str) -> Result<(Order, u64), OrderStateError> {
		self.store
			.fetch::<Order>(StoreNamespace::Orders, order_id)
			.await
			.map_err(|e| map_store_error(order_id, e))
	}

	/// Lists every stored order with its revision.
	///
	/// Orders deleted between the id listing and the fetch are skipped.
	pub async fn list_orders(&self) -> Result<Vec<(Order, u64)>, OrderStateError> {
		let ids = self
			.store
			.list_ids(StoreNamespace::Orders)
			.await
			.map_err(|e| OrderStateError::Store(e.to_string()))?;

		let mut orders = Vec::with_capacity(ids.len());
		for id in ids {
			match self.store.fetch::<Order>(StoreNamespace::Orders, &id).await {
				Ok(entry) => orders.push(entry),
				Err(StoreError::NotFound) => continue,
				Err(e) => return Err(OrderStateError::Store(e.to_string())),
			}
		}
		Ok(orders)
	}

	/// Applies a lifecycle action to a stored order.
	///
	/// When `expected_version` is given it must match the revision read from
	/// the store, otherwise the caller is working from a stale snapshot and
	/// the transition is refused before the rules even run. The write itself
	/// is a CAS against the read revision, so two racing writers cannot both
	/// succeed regardless of the pre-check.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), action = %action.kind()))]
	pub async fn apply_transition(
		&self,
		order_id: &str,
		action: OrderAction,
		actor: &Actor,
		expected_version: Option<u64>,
	) -> Result<TransitionOutcome, OrderStateError> {
		let (order, revision) = self.get_order(order_id).await?;
		check_expected_version(expected_version, revision)?;

		let applied = rules::apply(order, action, actor, current_timestamp())?;

		// Duplicate payment confirmation: acknowledged without a write.
		let Some(event) = applied.event else {
			debug!("Transition was a no-op, nothing persisted");
			return Ok(TransitionOutcome {
				order: applied.order,
				version: revision,
				event: None,
			});
		};

		let version = self
			.store
			.put_if(StoreNamespace::Orders, order_id, &applied.order, revision)
			.await
			.map_err(|e| map_store_error(order_id, e))?;

		debug!(version, "Transition persisted");
		Ok(TransitionOutcome {
			order: applied.order,
			version,
			event: Some(event),
		})
	}

	/// Rewrites the requirements text of an order whose requirements are
	/// still editable. No lifecycle transition or history entry results.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn edit_requirements(
		&self,
		order_id: &str,
		actor: &Actor,
		text: String,
		expected_version: Option<u64>,
	) -> Result<(Order, u64), OrderStateError> {
		let (order, revision) = self.get_order(order_id).await?;
		check_expected_version(expected_version, revision)?;

		let updated = rules::edit_requirements(order, actor, text, current_timestamp())?;

		let version = self
			.store
			.put_if(StoreNamespace::Orders, order_id, &updated, revision)
			.await
			.map_err(|e| map_store_error(order_id, e))?;

		Ok((updated, version))
	}
}

fn check_expected_version(expected: Option<u64>, actual: u64) -> Result<(), OrderStateError> {
	match expected {
		Some(expected) if expected != actual => Err(OrderStateError::Transition(
			TransitionError::ConcurrentModification,
		)),
		_ => Ok(()),
	}
}

fn map_store_error(order_id: &str, err: StoreError) -> OrderStateError {
	match err {
		StoreError::NotFound => OrderStateError::NotFound(order_id.to_string()),
		StoreError::VersionConflict { .. } => {
			OrderStateError::Transition(TransitionError::ConcurrentModification)
		},
		other => OrderStateError::Store(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal::Decimal;
	use storefront_store::implementations::memory::MemoryStore;
	use storefront_types::{
		DeliveryStatus, DeveloperStatus, OrderItem, PaymentStatus, PriceBreakdown,
	};

	fn machine() -> OrderStateMachine {
		let store = Arc::new(StoreService::new(Box::new(MemoryStore::new())));
		OrderStateMachine::new(store)
	}

	fn test_order(id: &str) -> Order {
		Order {
			id: id.to_string(),
			customer_id: "cust-1".to_string(),
			assigned_admin: None,
			item: OrderItem::Template {
				template_id: "zay".to_string(),
				name: "Zay Ecommerce".to_string(),
			},
			requirements: None,
			pricing: PriceBreakdown {
				base_price: Decimal::from(5000),
				customization_fee: Decimal::from(500),
				discount: Decimal::ZERO,
				total: Decimal::from(5500),
				coupon_code: None,
			},
			developer_status: DeveloperStatus::Pending,
			payment_status: PaymentStatus::Pending,
			delivery_status: DeliveryStatus::Pending,
			delivery_artifact: None,
			payment: None,
			history: Vec::new(),
			created_at: 1_700_000_000,
			updated_at: 1_700_000_000,
		}
	}

	fn customer() -> Actor {
		Actor::Customer {
			id: "cust-1".to_string(),
		}
	}

	#[tokio::test]
	async fn create_and_fetch_round_trips() {
		let machine = machine();
		let order = test_order("ord-1");

		let version = machine.create_order(&order).await.unwrap();
		assert_eq!(version, 1);

		let (stored, fetched_version) = machine.get_order("ord-1").await.unwrap();
		assert_eq!(stored.id, "ord-1");
		assert_eq!(fetched_version, 1);
	}

	#[tokio::test]
	async fn duplicate_create_is_refused() {
		let machine = machine();
		let order = test_order("ord-1");
		machine.create_order(&order).await.unwrap();

		let err = machine.create_order(&order).await.unwrap_err();
		assert!(matches!(
			err,
			OrderStateError::Transition(TransitionError::ConcurrentModification)
		));
	}

	#[tokio::test]
	async fn missing_order_maps_to_not_found() {
		let machine = machine();
		let err = machine.get_order("nope").await.unwrap_err();
		assert!(matches!(err, OrderStateError::NotFound(id) if id == "nope"));
	}

	#[tokio::test]
	async fn transition_bumps_version_and_reports_event() {
		let machine = machine();
		machine.create_order(&test_order("ord-1")).await.unwrap();

		let outcome = machine
			.apply_transition(
				"ord-1",
				OrderAction::SubmitRequirements {
					text: "Dark theme please".to_string(),
				},
				&customer(),
				Some(1),
			)
			.await
			.unwrap();

		assert_eq!(outcome.version, 2);
		assert_eq!(
			outcome.order.developer_status,
			DeveloperStatus::RequirementsSubmitted
		);
		let event = outcome.event.expect("transition carries an event");
		assert_eq!(event.order_id, "ord-1");
	}

	#[tokio::test]
	async fn stale_expected_version_is_refused() {
		let machine = machine();
		machine.create_order(&test_order("ord-1")).await.unwrap();

		machine
			.apply_transition(
				"ord-1",
				OrderAction::SubmitRequirements {
					text: "First write".to_string(),
				},
				&customer(),
				Some(1),
			)
			.await
			.unwrap();

		// A second writer still holding version 1 must lose.
		let err = machine
			.edit_requirements("ord-1", &customer(), "Stale write".to_string(), Some(1))
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			OrderStateError::Transition(TransitionError::ConcurrentModification)
		));

		let (stored, version) = machine.get_order("ord-1").await.unwrap();
		assert_eq!(stored.requirements.as_deref(), Some("First write"));
		assert_eq!(version, 2);
	}

	#[tokio::test]
	async fn rule_refusals_pass_through_unwritten() {
		let machine = machine();
		machine.create_order(&test_order("ord-1")).await.unwrap();

		let err = machine
			.apply_transition("ord-1", OrderAction::Accept, &customer(), None)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			OrderStateError::Transition(TransitionError::InvalidActor { .. })
		));

		// Refused transitions must not consume a revision.
		let (_, version) = machine.get_order("ord-1").await.unwrap();
		assert_eq!(version, 1);
	}

	#[tokio::test]
	async fn duplicate_payment_confirmation_skips_the_write() {
		let machine = machine();
		let admin = Actor::Admin {
			id: "admin-1".to_string(),
		};
		machine.create_order(&test_order("ord-1")).await.unwrap();

		for action in [
			OrderAction::SubmitRequirements {
				text: "Requirements".to_string(),
			},
			OrderAction::Accept,
		] {
			let actor = match action {
				OrderAction::SubmitRequirements { .. } => customer(),
				_ => admin.clone(),
			};
			machine
				.apply_transition("ord-1", action, &actor, None)
				.await
				.unwrap();
		}

		let confirm = OrderAction::RecordPayment {
			receipt: storefront_types::PaymentReceipt {
				gateway_order_id: "rzp_order_1".to_string(),
				payment_id: "pay_1".to_string(),
				paid_at: 1_700_000_100,
			},
		};
		let first = machine
			.apply_transition("ord-1", confirm.clone(), &Actor::Gateway, None)
			.await
			.unwrap();
		assert!(first.event.is_some());
		assert_eq!(first.order.payment_status, PaymentStatus::Paid);

		let second = machine
			.apply_transition("ord-1", confirm, &Actor::Gateway, None)
			.await
			.unwrap();
		assert!(second.event.is_none());
		assert_eq!(second.version, first.version, "no-op must not bump the revision");
	}

	#[tokio::test]
	async fn list_orders_returns_every_stored_order() {
		let machine = machine();
		machine.create_order(&test_order("ord-1")).await.unwrap();
		machine.create_order(&test_order("ord-2")).await.unwrap();

		let orders = machine.list_orders().await.unwrap();
		assert_eq!(orders.len(), 2);
	}
}
