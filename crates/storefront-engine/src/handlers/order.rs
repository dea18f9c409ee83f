//! Order handler for the storefront engine.
//!
//! Owns order creation (catalog validation, coupon redemption, pricing)
//! and fronts every lifecycle transition, publishing the resulting events
//! on the bus for the alert feed.

use crate::engine::event_bus::EventBus;
use crate::state::{OrderStateError, OrderStateMachine, TransitionOutcome};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use storefront_config::Config;
use storefront_pricing::PricingService;
use storefront_store::{StoreError, StoreService};
use storefront_types::{
	current_timestamp, truncate_id, Actor, CouponCheck, CouponDef, CouponRedemption, CustomSpec,
	DeliveryStatus, DeveloperStatus, Order, OrderAction, OrderEvent, OrderItem, PaymentStatus,
	PriceBreakdown, StoreNamespace, StorefrontEvent, User,
};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Errors that can occur while handling orders.
#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("{0}")]
	CouponRejected(&'static str),
	#[error("Store error: {0}")]
	Store(String),
	#[error("Pricing error: {0}")]
	Pricing(String),
	#[error(transparent)]
	State(#[from] OrderStateError),
}

/// Requested order item, before catalog validation.
///
/// Template orders carry only the id; the name and price are resolved
/// server-side from the catalog. Custom orders carry the full `CustomSpec`
/// and are priced by the requested delivery window.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderItemRequest {
	Template { template_id: String },
	Custom { spec: CustomSpec },
}

/// Request to place a new order.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
	pub item: OrderItemRequest,
	#[serde(default)]
	pub coupon_code: Option<String>,
}

/// Handles order placement, lifecycle transitions and queries.
pub struct OrderHandler {
	config: Config,
	store: Arc<StoreService>,
	pricing: Arc<PricingService>,
	state_machine: Arc<OrderStateMachine>,
	event_bus: EventBus,
}

impl OrderHandler {
	pub fn new(
		config: Config,
		store: Arc<StoreService>,
		pricing: Arc<PricingService>,
		state_machine: Arc<OrderStateMachine>,
		event_bus: EventBus,
	) -> Self {
		Self {
			config,
			store,
			pricing,
			state_machine,
			event_bus,
		}
	}

	/// Places a new order for a customer.
	///
	/// The item is validated against the catalog (or the delivery-window
	/// table for custom builds) and priced server-side; any submitted
	/// coupon is vetted and, for single-use codes, redeemed before the
	/// order is written. The redemption record is a create-only write, so
	/// two racing requests cannot both spend the same code.
	#[instrument(skip_all, fields(customer_id = %truncate_id(&customer.id)))]
	pub async fn create_order(
		&self,
		request: CreateOrderRequest,
		customer: &User,
	) -> Result<(Order, u64), OrderError> {
		let (item, base_price) = self.resolve_item(request.item)?;
		let order_id = Uuid::new_v4().to_string();

		let coupon = match request.coupon_code.as_deref() {
			Some(code) => match self.vet_coupon(code, &customer.id).await? {
				(_, Some(def)) => {
					if def.single_use {
						self.redeem_coupon(&def, &customer.id, &order_id).await?;
					}
					Some(def)
				},
				(check, None) => {
					return Err(OrderError::CouponRejected(
						check.rejection_message().unwrap_or("Invalid coupon code"),
					));
				},
			},
			None => None,
		};

		let pricing = self
			.pricing
			.quote(base_price, coupon.as_ref())
			.map_err(|e| OrderError::Pricing(e.to_string()))?;

		let now = current_timestamp();
		let order = Order {
			id: order_id,
			customer_id: customer.id.clone(),
			assigned_admin: None,
			item,
			requirements: None,
			pricing,
			developer_status: DeveloperStatus::Pending,
			payment_status: PaymentStatus::Pending,
			delivery_status: DeliveryStatus::Pending,
			delivery_artifact: None,
			payment: None,
			history: Vec::new(),
			created_at: now,
			updated_at: now,
		};

		let version = self.state_machine.create_order(&order).await?;
		debug!(order_id = %truncate_id(&order.id), total = %order.pricing.total, "Order placed");

		self.event_bus
			.publish(StorefrontEvent::Order(OrderEvent::Created {
				order_id: order.id.clone(),
				customer_id: order.customer_id.clone(),
			}))
			.ok();

		Ok((order, version))
	}

	/// Checks a coupon code for a user without redeeming it.
	pub async fn check_coupon(
		&self,
		code: &str,
		user_id: &str,
	) -> Result<CouponCheck, OrderError> {
		let (check, _) = self.vet_coupon(code, user_id).await?;
		Ok(check)
	}

	/// Applies a lifecycle action and publishes the transition event.
	pub async fn apply_action(
		&self,
		order_id: &str,
		action: OrderAction,
		actor: &Actor,
		expected_version: Option<u64>,
	) -> Result<TransitionOutcome, OrderError> {
		let outcome = self
			.state_machine
			.apply_transition(order_id, action, actor, expected_version)
			.await?;

		if let Some(event) = &outcome.event {
			self.event_bus
				.publish(StorefrontEvent::Order(OrderEvent::TransitionApplied {
					event: event.clone(),
				}))
				.ok();
		}

		Ok(outcome)
	}

	/// Submits requirements on a pending order, or rewrites them while they
	/// are still editable. Only the initial submission is a transition.
	pub async fn submit_or_edit_requirements(
		&self,
		order_id: &str,
		customer: &User,
		text: String,
		expected_version: Option<u64>,
	) -> Result<(Order, u64), OrderError> {
		let (order, _) = self.state_machine.get_order(order_id).await?;
		let actor = Actor::Customer {
			id: customer.id.clone(),
		};

		if order.developer_status == DeveloperStatus::Pending {
			let outcome = self
				.apply_action(
					order_id,
					OrderAction::SubmitRequirements { text },
					&actor,
					expected_version,
				)
				.await?;
			Ok((outcome.order, outcome.version))
		} else {
			let updated = self
				.state_machine
				.edit_requirements(order_id, &actor, text, expected_version)
				.await?;
			Ok(updated)
		}
	}

	/// Fetches an order with its version.
	pub async fn get_order(&self, order_id: &str) -> Result<(Order, u64), OrderError> {
		Ok(self.state_machine.get_order(order_id).await?)
	}

	/// Lists a customer's orders, newest first.
	pub async fn list_orders_for(
		&self,
		customer_id: &str,
	) -> Result<Vec<(Order, u64)>, OrderError> {
		let mut orders: Vec<(Order, u64)> = self
			.state_machine
			.list_orders()
			.await?
			.into_iter()
			.filter(|(order, _)| order.customer_id == customer_id)
			.collect();
		orders.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
		Ok(orders)
	}

	/// Lists every order, newest first.
	pub async fn list_all_orders(&self) -> Result<Vec<(Order, u64)>, OrderError> {
		let mut orders = self.state_machine.list_orders().await?;
		orders.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
		Ok(orders)
	}

	fn resolve_item(&self, request: OrderItemRequest) -> Result<(OrderItem, Decimal), OrderError> {
		match request {
			OrderItemRequest::Template { template_id } => {
				let template = self
					.config
					.catalog
					.templates
					.iter()
					.find(|template| template.id == template_id)
					.ok_or_else(|| {
						OrderError::Validation(format!("Unknown template id '{}'", template_id))
					})?;
				Ok((
					OrderItem::Template {
						template_id: template.id.clone(),
						name: template.name.clone(),
					},
					template.price,
				))
			},
			OrderItemRequest::Custom { spec } => {
				let base_price = self
					.config
					.orders
					.custom_windows
					.get(&spec.delivery_window)
					.copied()
					.ok_or_else(|| {
						OrderError::Validation(format!(
							"Unknown delivery window '{}'",
							spec.delivery_window
						))
					})?;
				Ok((OrderItem::Custom { spec }, base_price))
			},
		}
	}

	/// Looks up a coupon and checks redeemability for the user. Returns the
	/// definition only when the code is currently usable.
	async fn vet_coupon(
		&self,
		code: &str,
		user_id: &str,
	) -> Result<(CouponCheck, Option<CouponDef>), OrderError> {
		let Some(def) = self
			.pricing
			.find_coupon(code)
			.await
			.map_err(|e| OrderError::Pricing(e.to_string()))?
		else {
			return Ok((CouponCheck::InvalidCode, None));
		};

		if def.single_use {
			let record_id = CouponRedemption::record_id(&def.code, user_id);
			let redeemed = self
				.store
				.exists(StoreNamespace::CouponRedemptions, &record_id)
				.await
				.map_err(|e| OrderError::Store(e.to_string()))?;
			if redeemed {
				return Ok((CouponCheck::AlreadyRedeemed, None));
			}
		}

		let check = CouponCheck::Valid {
			discount: def.discount,
		};
		Ok((check, Some(def)))
	}

	/// Writes the redemption record for a single-use coupon. The write is
	/// create-only; losing it means another request redeemed the code first.
	async fn redeem_coupon(
		&self,
		coupon: &CouponDef,
		user_id: &str,
		order_id: &str,
	) -> Result<(), OrderError> {
		let record = CouponRedemption {
			code: coupon.code.to_uppercase(),
			user_id: user_id.to_string(),
			order_id: order_id.to_string(),
			redeemed_at: current_timestamp(),
		};
		let record_id = CouponRedemption::record_id(&coupon.code, user_id);

		match self
			.store
			.create(StoreNamespace::CouponRedemptions, &record_id, &record)
			.await
		{
			Ok(_) => Ok(()),
			Err(StoreError::VersionConflict { .. }) => Err(OrderError::CouponRejected(
				"Coupon already used on your account",
			)),
			Err(e) => Err(OrderError::Store(e.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::state::rules::TransitionError;
	use std::collections::HashMap;
	use storefront_config::builders::ConfigBuilder;
	use storefront_pricing::implementations::standard::{StandardPricing, StandardPricingConfig};
	use storefront_pricing::PricingInterface;
	use storefront_store::implementations::memory::MemoryStore;
	use storefront_types::{AccountStatus, UserRole};

	fn handler() -> OrderHandler {
		let config = ConfigBuilder::new().build();
		let store = Arc::new(StoreService::new(Box::new(MemoryStore::new())));
		let mut pricing_impls: HashMap<String, Arc<dyn PricingInterface>> = HashMap::new();
		pricing_impls.insert(
			"standard".to_string(),
			Arc::new(StandardPricing::new(StandardPricingConfig::default())),
		);
		let pricing =
			Arc::new(PricingService::new(pricing_impls, "standard".to_string()).unwrap());
		let state_machine = Arc::new(OrderStateMachine::new(store.clone()));
		OrderHandler::new(config, store, pricing, state_machine, EventBus::new(64))
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

	fn template_request(coupon: Option<&str>) -> CreateOrderRequest {
		CreateOrderRequest {
			item: OrderItemRequest::Template {
				template_id: "zay".to_string(),
			},
			coupon_code: coupon.map(str::to_string),
		}
	}

	#[tokio::test]
	async fn creates_template_order_with_catalog_pricing() {
		let handler = handler();
		let user = customer("cust-1");

		let (order, version) = handler
			.create_order(template_request(None), &user)
			.await
			.unwrap();

		assert_eq!(version, 1);
		assert_eq!(order.customer_id, "cust-1");
		assert_eq!(order.pricing.base_price, Decimal::from(5000));
		assert_eq!(order.pricing.total, Decimal::from(5500));
		assert_eq!(order.developer_status, DeveloperStatus::Pending);
		match &order.item {
			OrderItem::Template { name, .. } => assert_eq!(name, "Zay Ecommerce"),
			other => panic!("unexpected item: {:?}", other),
		}
	}

	#[tokio::test]
	async fn rejects_unknown_template() {
		let handler = handler();
		let request = CreateOrderRequest {
			item: OrderItemRequest::Template {
				template_id: "no-such-template".to_string(),
			},
			coupon_code: None,
		};

		let err = handler
			.create_order(request, &customer("cust-1"))
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::Validation(_)));
	}

	#[tokio::test]
	async fn prices_custom_orders_by_delivery_window() {
		let handler = handler();
		let request = CreateOrderRequest {
			item: OrderItemRequest::Custom {
				spec: CustomSpec {
					website_type: storefront_types::WebsiteType::Portfolio,
					business_category: storefront_types::BusinessCategory::Personal,
					delivery_window: "3-days".to_string(),
				},
			},
			coupon_code: None,
		};

		let (order, _) = handler
			.create_order(request, &customer("cust-1"))
			.await
			.unwrap();
		assert_eq!(order.pricing.base_price, Decimal::from(12000));
		assert_eq!(order.item.display_name(), "Custom Website");
	}

	#[tokio::test]
	async fn rejects_unknown_delivery_window() {
		let handler = handler();
		let request = CreateOrderRequest {
			item: OrderItemRequest::Custom {
				spec: CustomSpec {
					website_type: storefront_types::WebsiteType::Blog,
					business_category: storefront_types::BusinessCategory::Personal,
					delivery_window: "tomorrow".to_string(),
				},
			},
			coupon_code: None,
		};

		let err = handler
			.create_order(request, &customer("cust-1"))
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::Validation(_)));
	}

	#[tokio::test]
	async fn applies_multi_use_coupon_without_redemption_record() {
		let handler = handler();
		let user = customer("cust-1");

		let (order, _) = handler
			.create_order(template_request(Some("welcome10")), &user)
			.await
			.unwrap();

		// 10% off the 5000 base; fee untouched
		assert_eq!(order.pricing.discount, Decimal::from(500));
		assert_eq!(order.pricing.total, Decimal::from(5000));
		assert_eq!(order.pricing.coupon_code.as_deref(), Some("WELCOME10"));

		// Usable again immediately
		let check = handler.check_coupon("WELCOME10", &user.id).await.unwrap();
		assert!(matches!(check, CouponCheck::Valid { .. }));
	}

	#[tokio::test]
	async fn single_use_coupon_burns_on_first_order() {
		let handler = handler();
		let user = customer("cust-1");

		handler
			.create_order(template_request(Some("AS392212")), &user)
			.await
			.unwrap();

		let check = handler.check_coupon("AS392212", &user.id).await.unwrap();
		assert_eq!(check, CouponCheck::AlreadyRedeemed);

		let err = handler
			.create_order(template_request(Some("AS392212")), &user)
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::CouponRejected(_)));
	}

	#[tokio::test]
	async fn single_use_coupon_is_per_user() {
		let handler = handler();

		handler
			.create_order(template_request(Some("AS392212")), &customer("cust-1"))
			.await
			.unwrap();

		// A different account may still redeem the same code.
		let (order, _) = handler
			.create_order(template_request(Some("AS392212")), &customer("cust-2"))
			.await
			.unwrap();
		assert_eq!(order.pricing.coupon_code.as_deref(), Some("AS392212"));
	}

	#[tokio::test]
	async fn unknown_coupon_code_rejects_creation() {
		let handler = handler();

		let err = handler
			.create_order(template_request(Some("BOGUS")), &customer("cust-1"))
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::CouponRejected("Invalid coupon code")));

		let check = handler
			.check_coupon("BOGUS", "cust-1")
			.await
			.unwrap();
		assert_eq!(check, CouponCheck::InvalidCode);
	}

	#[tokio::test]
	async fn coupon_codes_match_case_insensitively() {
		let handler = handler();
		let (order, _) = handler
			.create_order(template_request(Some("wElCoMe10")), &customer("cust-1"))
			.await
			.unwrap();
		assert_eq!(order.pricing.coupon_code.as_deref(), Some("WELCOME10"));
	}

	#[tokio::test]
	async fn transition_events_reach_subscribers() {
		let handler = handler();
		let mut rx = handler.event_bus.subscribe();
		let user = customer("cust-1");

		let (order, version) = handler
			.create_order(template_request(None), &user)
			.await
			.unwrap();

		// Creation event first
		match rx.recv().await.unwrap() {
			StorefrontEvent::Order(OrderEvent::Created { order_id, .. }) => {
				assert_eq!(order_id, order.id);
			}
			other => panic!("unexpected event: {:?}", other),
		}

		let actor = Actor::Customer {
			id: user.id.clone(),
		};
		handler
			.apply_action(
				&order.id,
				OrderAction::SubmitRequirements {
					text: "Two pages, dark theme".to_string(),
				},
				&actor,
				Some(version),
			)
			.await
			.unwrap();

		match rx.recv().await.unwrap() {
			StorefrontEvent::Order(OrderEvent::TransitionApplied { event }) => {
				assert_eq!(event.order_id, order.id);
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[tokio::test]
	async fn requirements_submit_then_edit() {
		let handler = handler();
		let user = customer("cust-1");
		let (order, version) = handler
			.create_order(template_request(None), &user)
			.await
			.unwrap();

		// First write is the submission transition.
		let (after_submit, v2) = handler
			.submit_or_edit_requirements(&order.id, &user, "v1".to_string(), Some(version))
			.await
			.unwrap();
		assert_eq!(
			after_submit.developer_status,
			DeveloperStatus::RequirementsSubmitted
		);
		assert_eq!(after_submit.history.len(), 1);

		// Second write only rewrites the text.
		let (after_edit, v3) = handler
			.submit_or_edit_requirements(&order.id, &user, "v2".to_string(), Some(v2))
			.await
			.unwrap();
		assert_eq!(after_edit.requirements.as_deref(), Some("v2"));
		assert_eq!(after_edit.history.len(), 1);
		assert!(v3 > v2);
	}

	#[tokio::test]
	async fn requirements_edit_rejects_stale_version() {
		let handler = handler();
		let user = customer("cust-1");
		let (order, version) = handler
			.create_order(template_request(None), &user)
			.await
			.unwrap();

		handler
			.submit_or_edit_requirements(&order.id, &user, "v1".to_string(), Some(version))
			.await
			.unwrap();

		let err = handler
			.submit_or_edit_requirements(&order.id, &user, "stale".to_string(), Some(version))
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			OrderError::State(OrderStateError::Transition(
				TransitionError::ConcurrentModification
			))
		));
	}

	#[tokio::test]
	async fn listing_filters_by_customer_and_sorts_newest_first() {
		let handler = handler();
		handler
			.create_order(template_request(None), &customer("cust-1"))
			.await
			.unwrap();
		handler
			.create_order(template_request(None), &customer("cust-2"))
			.await
			.unwrap();
		handler
			.create_order(template_request(None), &customer("cust-1"))
			.await
			.unwrap();

		let mine = handler.list_orders_for("cust-1").await.unwrap();
		assert_eq!(mine.len(), 2);
		assert!(mine.iter().all(|(order, _)| order.customer_id == "cust-1"));

		let all = handler.list_all_orders().await.unwrap();
		assert_eq!(all.len(), 3);
		for pair in all.windows(2) {
			assert!(pair[0].0.created_at >= pair[1].0.created_at);
		}
	}
}
