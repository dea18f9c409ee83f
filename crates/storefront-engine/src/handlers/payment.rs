//! Payment handler for the storefront engine.
//!
//! Opens gateway checkout sessions for orders whose payment is due and
//! turns verified gateway confirmations into `RecordPayment` transitions.
//! Sessions are kept in the store until they expire, so a confirmation
//! that is delivered more than once can still be verified and answered
//! idempotently.

use crate::engine::event_bus::EventBus;
use crate::state::rules::TransitionError;
use crate::state::{OrderStateError, OrderStateMachine, TransitionOutcome};
use std::sync::Arc;
use std::time::Duration;
use storefront_gateway::{CheckoutSession, GatewayService, PaymentConfirmation};
use storefront_store::{StoreError, StoreService};
use storefront_types::{
	current_timestamp, to_minor_units, truncate_id, Actor, OrderAction, OrderEvent, PaymentEvent,
	PaymentReceipt, StoreNamespace, StorefrontEvent, User,
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// How long an opened checkout session remains confirmable.
const CHECKOUT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Attempts at recording a verified confirmation before giving up to the
/// gateway's own retry schedule.
const MAX_CONFIRM_ATTEMPTS: u32 = 3;

/// Errors that can occur while handling payments.
#[derive(Debug, Error)]
pub enum PaymentError {
	#[error("Forbidden: {0}")]
	Forbidden(String),
	#[error("Invalid state: {0}")]
	InvalidState(String),
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Gateway error: {0}")]
	Gateway(String),
	#[error("Store error: {0}")]
	Store(String),
	#[error(transparent)]
	State(#[from] OrderStateError),
}

/// Everything the browser checkout widget needs to collect a payment.
#[derive(Debug, Clone)]
pub struct CheckoutDetails {
	pub gateway_order_id: String,
	pub key_id: String,
	pub amount: u64,
	pub currency: String,
	pub order_id: String,
}

/// Handles checkout sessions and payment confirmations.
pub struct PaymentHandler {
	store: Arc<StoreService>,
	gateway: Arc<GatewayService>,
	state_machine: Arc<OrderStateMachine>,
	event_bus: EventBus,
}

impl PaymentHandler {
	pub fn new(
		store: Arc<StoreService>,
		gateway: Arc<GatewayService>,
		state_machine: Arc<OrderStateMachine>,
		event_bus: EventBus,
	) -> Self {
		Self {
			store,
			gateway,
			state_machine,
			event_bus,
		}
	}

	/// Opens a checkout session for an order.
	///
	/// Only the order's customer may start checkout, and only while payment
	/// is due. The session is persisted with a TTL keyed by the gateway-side
	/// order id so the later confirmation can be tied back to the order.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn open_checkout(
		&self,
		order_id: &str,
		customer: &User,
	) -> Result<CheckoutDetails, PaymentError> {
		let (order, _) = self.state_machine.get_order(order_id).await?;

		if order.customer_id != customer.id {
			return Err(PaymentError::Forbidden(
				"Only the order's customer may start checkout".to_string(),
			));
		}
		if !order.payment_due() {
			return Err(PaymentError::InvalidState(
				"Payment is not due on this order".to_string(),
			));
		}

		let amount = to_minor_units(order.pricing.total).ok_or_else(|| {
			PaymentError::Validation(format!(
				"Order total {} cannot be converted to minor units",
				order.pricing.total
			))
		})?;

		let session = self
			.gateway
			.create_checkout(order_id, amount)
			.await
			.map_err(|e| PaymentError::Gateway(e.to_string()))?;

		self.store
			.create_with_ttl(
				StoreNamespace::CheckoutSessions,
				&session.gateway_order_id,
				&session,
				Some(CHECKOUT_SESSION_TTL),
			)
			.await
			.map_err(|e| PaymentError::Store(e.to_string()))?;

		debug!(gateway_order_id = %session.gateway_order_id, amount, "Checkout session opened");
		self.event_bus
			.publish(StorefrontEvent::Payment(PaymentEvent::CheckoutOpened {
				order_id: order.id.clone(),
				gateway_order_id: session.gateway_order_id.clone(),
			}))
			.ok();

		let key_id = self
			.gateway
			.key_id()
			.map_err(|e| PaymentError::Gateway(e.to_string()))?
			.to_string();

		Ok(CheckoutDetails {
			gateway_order_id: session.gateway_order_id,
			key_id,
			amount: session.amount,
			currency: session.currency,
			order_id: order.id,
		})
	}

	/// Records a signed payment confirmation from the gateway.
	///
	/// The confirmation must match a stored session and carry an authentic
	/// signature; anything else is a verification failure and the order is
	/// left untouched. The callback carries no version, so a lost CAS
	/// against a concurrent writer is retried here a few times before
	/// deferring to the gateway's retry schedule.
	#[instrument(skip_all, fields(gateway_order_id = %truncate_id(&confirmation.gateway_order_id)))]
	pub async fn confirm_payment(
		&self,
		confirmation: PaymentConfirmation,
	) -> Result<TransitionOutcome, PaymentError> {
		let session = match self
			.store
			.fetch::<CheckoutSession>(
				StoreNamespace::CheckoutSessions,
				&confirmation.gateway_order_id,
			)
			.await
		{
			Ok((session, _)) => session,
			Err(StoreError::NotFound) => {
				return Err(verification_failed(
					"No checkout session for this gateway order",
				));
			},
			Err(e) => return Err(PaymentError::Store(e.to_string())),
		};

		if self
			.gateway
			.verify_confirmation(&confirmation, &session)
			.is_err()
		{
			warn!(order_id = %truncate_id(&session.order_id), "Rejected confirmation with bad signature");
			return Err(verification_failed("Signature verification failed"));
		}

		let receipt = PaymentReceipt {
			gateway_order_id: confirmation.gateway_order_id,
			payment_id: confirmation.payment_id,
			paid_at: current_timestamp(),
		};

		let mut attempt = 0;
		loop {
			attempt += 1;
			let action = OrderAction::RecordPayment {
				receipt: receipt.clone(),
			};
			match self
				.state_machine
				.apply_transition(&session.order_id, action, &Actor::Gateway, None)
				.await
			{
				Ok(outcome) => {
					if let Some(event) = &outcome.event {
						self.event_bus
							.publish(StorefrontEvent::Order(OrderEvent::TransitionApplied {
								event: event.clone(),
							}))
							.ok();
					} else {
						debug!("Confirmation was a duplicate, order already paid");
					}
					return Ok(outcome);
				},
				Err(OrderStateError::Transition(TransitionError::ConcurrentModification))
					if attempt < MAX_CONFIRM_ATTEMPTS =>
				{
					warn!(attempt, "Payment write lost a concurrent update, retrying");
				},
				Err(e) => return Err(e.into()),
			}
		}
	}
}

fn verification_failed(reason: &str) -> PaymentError {
	PaymentError::State(OrderStateError::Transition(
		TransitionError::GatewayVerificationFailed(reason.to_string()),
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use rust_decimal::Decimal;
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicU64, Ordering};
	use storefront_gateway::{GatewayError, GatewayInterface};
	use storefront_store::implementations::memory::MemoryStore;
	use storefront_types::{
		AccountStatus, ConfigSchema, DeliveryStatus, DeveloperStatus, Order, OrderItem,
		PaymentStatus, PriceBreakdown, UserRole, ValidationError,
	};

	struct TestSchema;

	impl ConfigSchema for TestSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	/// Gateway double that mints sequential session ids and accepts only
	/// signatures of the form `sig:{gateway_order_id}:{payment_id}`.
	struct TestGateway {
		counter: AtomicU64,
	}

	impl TestGateway {
		fn new() -> Self {
			Self {
				counter: AtomicU64::new(0),
			}
		}
	}

	#[async_trait]
	impl GatewayInterface for TestGateway {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(TestSchema)
		}

		fn key_id(&self) -> &str {
			"rzp_test_key"
		}

		fn currency(&self) -> &str {
			"INR"
		}

		async fn create_checkout(
			&self,
			order_id: &str,
			amount: u64,
		) -> Result<CheckoutSession, GatewayError> {
			let n = self.counter.fetch_add(1, Ordering::SeqCst);
			Ok(CheckoutSession {
				gateway_order_id: format!("rzp_test_{}", n),
				order_id: order_id.to_string(),
				amount,
				currency: "INR".to_string(),
				created_at: 7,
			})
		}

		fn verify_confirmation(
			&self,
			confirmation: &PaymentConfirmation,
			session: &CheckoutSession,
		) -> Result<(), GatewayError> {
			let expected = format!(
				"sig:{}:{}",
				confirmation.gateway_order_id, confirmation.payment_id
			);
			if confirmation.gateway_order_id != session.gateway_order_id
				|| confirmation.signature != expected
			{
				return Err(GatewayError::VerificationFailed);
			}
			Ok(())
		}
	}

	struct Fixture {
		handler: PaymentHandler,
		state_machine: Arc<OrderStateMachine>,
	}

	fn fixture() -> Fixture {
		let store = Arc::new(StoreService::new(Box::new(MemoryStore::new())));
		let mut impls: HashMap<String, Arc<dyn GatewayInterface>> = HashMap::new();
		impls.insert("test".to_string(), Arc::new(TestGateway::new()));
		let gateway = Arc::new(GatewayService::new(impls, "test".to_string()).unwrap());
		let state_machine = Arc::new(OrderStateMachine::new(store.clone()));
		let handler = PaymentHandler::new(
			store,
			gateway,
			state_machine.clone(),
			EventBus::new(64),
		);
		Fixture {
			handler,
			state_machine,
		}
	}

	fn accepted_order(id: &str, customer_id: &str) -> Order {
		Order {
			id: id.to_string(),
			customer_id: customer_id.to_string(),
			assigned_admin: Some("admin-1".to_string()),
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
			developer_status: DeveloperStatus::Accepted,
			payment_status: PaymentStatus::Pending,
			delivery_status: DeliveryStatus::Pending,
			delivery_artifact: None,
			payment: None,
			history: Vec::new(),
			created_at: 1,
			updated_at: 1,
		}
	}

	fn customer(id: &str) -> User {
		User {
			id: id.to_string(),
			name: "Asha".to_string(),
			email: format!("{}@example.com", id),
			role: UserRole::Customer,
			status: AccountStatus::Active,
			created_at: 1,
			updated_at: 1,
		}
	}

	fn signed(details: &CheckoutDetails, payment_id: &str) -> PaymentConfirmation {
		PaymentConfirmation {
			gateway_order_id: details.gateway_order_id.clone(),
			payment_id: payment_id.to_string(),
			signature: format!("sig:{}:{}", details.gateway_order_id, payment_id),
		}
	}

	#[tokio::test]
	async fn checkout_converts_total_to_minor_units() {
		let fx = fixture();
		fx.state_machine
			.create_order(&accepted_order("ord-1", "cust-1"))
			.await
			.unwrap();

		let details = fx
			.handler
			.open_checkout("ord-1", &customer("cust-1"))
			.await
			.unwrap();

		assert_eq!(details.amount, 550_000);
		assert_eq!(details.currency, "INR");
		assert_eq!(details.key_id, "rzp_test_key");
		assert_eq!(details.order_id, "ord-1");
	}

	#[tokio::test]
	async fn checkout_requires_the_owner() {
		let fx = fixture();
		fx.state_machine
			.create_order(&accepted_order("ord-1", "cust-1"))
			.await
			.unwrap();

		let err = fx
			.handler
			.open_checkout("ord-1", &customer("cust-2"))
			.await
			.unwrap_err();
		assert!(matches!(err, PaymentError::Forbidden(_)));
	}

	#[tokio::test]
	async fn checkout_refused_before_acceptance() {
		let fx = fixture();
		let mut order = accepted_order("ord-1", "cust-1");
		order.developer_status = DeveloperStatus::Pending;
		order.assigned_admin = None;
		fx.state_machine.create_order(&order).await.unwrap();

		let err = fx
			.handler
			.open_checkout("ord-1", &customer("cust-1"))
			.await
			.unwrap_err();
		assert!(matches!(err, PaymentError::InvalidState(_)));
	}

	#[tokio::test]
	async fn verified_confirmation_marks_the_order_paid() {
		let fx = fixture();
		fx.state_machine
			.create_order(&accepted_order("ord-1", "cust-1"))
			.await
			.unwrap();
		let details = fx
			.handler
			.open_checkout("ord-1", &customer("cust-1"))
			.await
			.unwrap();

		let outcome = fx
			.handler
			.confirm_payment(signed(&details, "pay_1"))
			.await
			.unwrap();

		assert!(outcome.event.is_some());
		assert_eq!(outcome.order.payment_status, PaymentStatus::Paid);
		let receipt = outcome.order.payment.expect("receipt stored");
		assert_eq!(receipt.payment_id, "pay_1");
		assert_eq!(receipt.gateway_order_id, details.gateway_order_id);
	}

	#[tokio::test]
	async fn duplicate_confirmation_is_a_no_op() {
		let fx = fixture();
		fx.state_machine
			.create_order(&accepted_order("ord-1", "cust-1"))
			.await
			.unwrap();
		let details = fx
			.handler
			.open_checkout("ord-1", &customer("cust-1"))
			.await
			.unwrap();

		let first = fx
			.handler
			.confirm_payment(signed(&details, "pay_1"))
			.await
			.unwrap();
		let second = fx
			.handler
			.confirm_payment(signed(&details, "pay_1"))
			.await
			.unwrap();

		assert!(second.event.is_none());
		assert_eq!(second.version, first.version);
	}

	#[tokio::test]
	async fn tampered_signature_is_rejected() {
		let fx = fixture();
		fx.state_machine
			.create_order(&accepted_order("ord-1", "cust-1"))
			.await
			.unwrap();
		let details = fx
			.handler
			.open_checkout("ord-1", &customer("cust-1"))
			.await
			.unwrap();

		let mut confirmation = signed(&details, "pay_1");
		confirmation.signature = "sig:forged".to_string();

		let err = fx.handler.confirm_payment(confirmation).await.unwrap_err();
		assert!(matches!(
			err,
			PaymentError::State(OrderStateError::Transition(
				TransitionError::GatewayVerificationFailed(_)
			))
		));

		let (order, _) = fx.state_machine.get_order("ord-1").await.unwrap();
		assert_eq!(order.payment_status, PaymentStatus::Pending);
	}

	#[tokio::test]
	async fn unknown_session_is_rejected() {
		let fx = fixture();
		let confirmation = PaymentConfirmation {
			gateway_order_id: "rzp_unknown".to_string(),
			payment_id: "pay_1".to_string(),
			signature: "sig:rzp_unknown:pay_1".to_string(),
		};

		let err = fx.handler.confirm_payment(confirmation).await.unwrap_err();
		assert!(matches!(
			err,
			PaymentError::State(OrderStateError::Transition(
				TransitionError::GatewayVerificationFailed(_)
			))
		));
	}

	#[tokio::test]
	async fn different_payment_on_paid_order_is_refused() {
		let fx = fixture();
		fx.state_machine
			.create_order(&accepted_order("ord-1", "cust-1"))
			.await
			.unwrap();
		let details = fx
			.handler
			.open_checkout("ord-1", &customer("cust-1"))
			.await
			.unwrap();

		fx.handler
			.confirm_payment(signed(&details, "pay_1"))
			.await
			.unwrap();

		let err = fx
			.handler
			.confirm_payment(signed(&details, "pay_2"))
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			PaymentError::State(OrderStateError::Transition(
				TransitionError::AlreadyTerminal { .. }
			))
		));
	}
}
