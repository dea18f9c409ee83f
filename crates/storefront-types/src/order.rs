//! Order entity and lifecycle types.
//!
//! This module defines the order record stored by the backend together with
//! its three independent status axes, the transition actions actors may
//! request, and the records emitted when a transition is applied.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::truncate_id;

/// A customer's order for a website build.
///
/// Orders are created when a customer checks out a catalog template or
/// submits a custom build request. The record carries three independent
/// status axes which only ever move forward; every applied transition is
/// appended to `history`. Orders are never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// Identifier of the owning customer.
	pub customer_id: String,
	/// Identifier of the admin who accepted the order, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub assigned_admin: Option<String>,
	/// What was ordered: a catalog template or a custom build.
	pub item: OrderItem,
	/// Free-text project requirements, mutable until acceptance.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub requirements: Option<String>,
	/// Price breakdown fixed at creation time.
	pub pricing: PriceBreakdown,
	/// Progress of the build work.
	pub developer_status: DeveloperStatus,
	/// Whether payment has been captured.
	pub payment_status: PaymentStatus,
	/// Whether the finished site has been handed over.
	pub delivery_status: DeliveryStatus,
	/// Reference to the deliverable, attached from `in_progress` onwards.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery_artifact: Option<DeliveryArtifact>,
	/// Gateway receipt recorded when payment is captured.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub payment: Option<PaymentReceipt>,
	/// Applied transitions, oldest first.
	#[serde(default)]
	pub history: Vec<TransitionRecord>,
	/// Timestamp when this order was created.
	pub created_at: u64,
	/// Timestamp when this order was last updated.
	pub updated_at: u64,
}

impl Order {
	/// Snapshot of the three status axes.
	pub fn status(&self) -> StatusSnapshot {
		StatusSnapshot {
			developer: self.developer_status,
			payment: self.payment_status,
			delivery: self.delivery_status,
		}
	}

	/// Whether the owning customer may still edit the requirements text.
	pub fn requirements_editable(&self) -> bool {
		matches!(
			self.developer_status,
			DeveloperStatus::Pending | DeveloperStatus::RequirementsSubmitted
		)
	}

	/// Whether the customer should be offered payment.
	///
	/// Capture is gated on acceptance, so checkout opens once the order is
	/// accepted and closes when payment lands or the order is rejected.
	pub fn payment_due(&self) -> bool {
		self.payment_status == PaymentStatus::Pending
			&& matches!(
				self.developer_status,
				DeveloperStatus::Accepted | DeveloperStatus::InProgress | DeveloperStatus::Completed
			)
	}
}

/// The subject of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderItem {
	/// A template from the catalog.
	Template {
		/// Catalog identifier of the template.
		template_id: String,
		/// Template display name at order time.
		name: String,
	},
	/// A bespoke build described by the customer.
	Custom {
		/// Customer-provided specification.
		spec: CustomSpec,
	},
}

impl OrderItem {
	/// Human-readable name used in alerts and listings.
	pub fn display_name(&self) -> &str {
		match self {
			OrderItem::Template { name, .. } => name,
			OrderItem::Custom { .. } => "Custom Website",
		}
	}
}

/// Specification fields for a custom build request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomSpec {
	/// Kind of website requested.
	pub website_type: WebsiteType,
	/// Whether the site is for a business or for personal use.
	pub business_category: BusinessCategory,
	/// Requested delivery window; prices the order via configuration.
	pub delivery_window: String,
}

/// Website categories offered for custom builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebsiteType {
	Ecommerce,
	Portfolio,
	Blog,
	Corporate,
	Landing,
	Other,
}

/// Broad business category for a custom build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessCategory {
	Business,
	Personal,
}

/// Price breakdown for an order, in major units of the configured currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
	/// Base price of the template or custom build.
	pub base_price: Decimal,
	/// Flat surcharge for customization work.
	pub customization_fee: Decimal,
	/// Discount amount taken off the base price.
	pub discount: Decimal,
	/// Amount due: base + customization fee - discount.
	pub total: Decimal,
	/// Coupon code that produced the discount, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub coupon_code: Option<String>,
}

/// Reference to the deliverable handed to the customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryArtifact {
	/// Original file name of the packaged site.
	pub file_name: String,
	/// Download location for the packaged site.
	pub url: String,
	/// Timestamp when the artifact was attached.
	pub uploaded_at: u64,
}

/// Gateway receipt for a captured payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
	/// Gateway-side order identifier the payment was made against.
	pub gateway_order_id: String,
	/// Gateway-side payment identifier.
	pub payment_id: String,
	/// Timestamp when the confirmation was verified.
	pub paid_at: u64,
}

/// Progress of the build work on an order.
///
/// The axis only moves forward along `pending → requirements_submitted →
/// accepted → in_progress → completed`, with `rejected` as a terminal exit
/// from `requirements_submitted` or `accepted`. Unrecognized wire values
/// fail deserialization instead of defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeveloperStatus {
	/// Order created, requirements not yet submitted.
	Pending,
	/// Customer has submitted requirements; awaiting admin review.
	RequirementsSubmitted,
	/// An admin accepted the order.
	Accepted,
	/// Build work has started.
	InProgress,
	/// Build finished and the deliverable handed over.
	Completed,
	/// An admin rejected the order.
	Rejected,
}

impl DeveloperStatus {
	/// Returns true when no further transition on this axis is possible.
	pub fn is_terminal(&self) -> bool {
		matches!(self, DeveloperStatus::Completed | DeveloperStatus::Rejected)
	}
}

impl fmt::Display for DeveloperStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DeveloperStatus::Pending => write!(f, "pending"),
			DeveloperStatus::RequirementsSubmitted => write!(f, "requirements_submitted"),
			DeveloperStatus::Accepted => write!(f, "accepted"),
			DeveloperStatus::InProgress => write!(f, "in_progress"),
			DeveloperStatus::Completed => write!(f, "completed"),
			DeveloperStatus::Rejected => write!(f, "rejected"),
		}
	}
}

/// Whether payment for an order has been captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
	/// No payment captured yet.
	Pending,
	/// Payment captured; terminal, there is no refund state.
	Paid,
}

impl fmt::Display for PaymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PaymentStatus::Pending => write!(f, "pending"),
			PaymentStatus::Paid => write!(f, "paid"),
		}
	}
}

/// Whether the finished site has been handed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
	/// Nothing delivered yet.
	Pending,
	/// Deliverable handed over; terminal.
	Delivered,
	/// Order rejected before delivery; terminal.
	Cancelled,
}

impl DeliveryStatus {
	/// Returns true when no further transition on this axis is possible.
	pub fn is_terminal(&self) -> bool {
		matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
	}
}

impl fmt::Display for DeliveryStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DeliveryStatus::Pending => write!(f, "pending"),
			DeliveryStatus::Delivered => write!(f, "delivered"),
			DeliveryStatus::Cancelled => write!(f, "cancelled"),
		}
	}
}

/// Snapshot of all three status axes, carried by transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
	/// Build-work axis.
	pub developer: DeveloperStatus,
	/// Payment axis.
	pub payment: PaymentStatus,
	/// Hand-over axis.
	pub delivery: DeliveryStatus,
}

/// The identity requesting a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
	/// A customer acting on their own order.
	Customer {
		/// User id of the customer.
		id: String,
	},
	/// A storefront administrator.
	Admin {
		/// User id of the admin.
		id: String,
	},
	/// The payment gateway's verified confirmation callback.
	Gateway,
}

impl fmt::Display for Actor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Actor::Customer { id } => write!(f, "customer {}", truncate_id(id)),
			Actor::Admin { id } => write!(f, "admin {}", truncate_id(id)),
			Actor::Gateway => write!(f, "gateway"),
		}
	}
}

/// Role of a user-facing actor, used when listing available actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
	Customer,
	Admin,
}

/// A requested lifecycle transition together with its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OrderAction {
	/// Customer submits the project requirements.
	SubmitRequirements {
		/// Requirements text; must not be empty or whitespace.
		text: String,
	},
	/// Admin accepts the order for building.
	Accept,
	/// Admin rejects the order; terminal for the whole order.
	Reject,
	/// Admin starts the build.
	AdvanceInProgress,
	/// Admin finishes the build, optionally attaching the deliverable
	/// atomically with the call.
	Complete {
		#[serde(skip_serializing_if = "Option::is_none")]
		artifact: Option<DeliveryArtifact>,
	},
	/// A verified gateway confirmation captures payment.
	RecordPayment {
		/// Receipt assembled from the verified confirmation.
		receipt: PaymentReceipt,
	},
	/// Admin attaches or replaces the deliverable.
	UploadDelivery {
		/// The deliverable reference.
		artifact: DeliveryArtifact,
	},
}

impl OrderAction {
	/// The action's name without its payload.
	pub fn kind(&self) -> OrderActionKind {
		match self {
			OrderAction::SubmitRequirements { .. } => OrderActionKind::SubmitRequirements,
			OrderAction::Accept => OrderActionKind::Accept,
			OrderAction::Reject => OrderActionKind::Reject,
			OrderAction::AdvanceInProgress => OrderActionKind::AdvanceInProgress,
			OrderAction::Complete { .. } => OrderActionKind::Complete,
			OrderAction::RecordPayment { .. } => OrderActionKind::RecordPayment,
			OrderAction::UploadDelivery { .. } => OrderActionKind::UploadDelivery,
		}
	}
}

/// Names of the lifecycle actions, used for listings and history records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderActionKind {
	SubmitRequirements,
	Accept,
	Reject,
	AdvanceInProgress,
	Complete,
	RecordPayment,
	UploadDelivery,
}

impl fmt::Display for OrderActionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderActionKind::SubmitRequirements => write!(f, "submit_requirements"),
			OrderActionKind::Accept => write!(f, "accept"),
			OrderActionKind::Reject => write!(f, "reject"),
			OrderActionKind::AdvanceInProgress => write!(f, "advance_in_progress"),
			OrderActionKind::Complete => write!(f, "complete"),
			OrderActionKind::RecordPayment => write!(f, "record_payment"),
			OrderActionKind::UploadDelivery => write!(f, "upload_delivery"),
		}
	}
}

/// History entry for an applied transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
	/// Which action was applied.
	pub action: OrderActionKind,
	/// Who requested it.
	pub actor: Actor,
	/// When it was applied.
	pub at: u64,
}

/// Domain event emitted for every applied transition.
///
/// Consumed by the admin alert feed and any other observer interested in
/// lifecycle changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
	/// Order the transition was applied to.
	pub order_id: String,
	/// Action that was applied.
	pub action: OrderActionKind,
	/// All three axes before the transition.
	pub previous_status: StatusSnapshot,
	/// All three axes after the transition.
	pub new_status: StatusSnapshot,
	/// Who requested the transition.
	pub actor: Actor,
	/// When the transition was applied.
	pub timestamp: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_wire_names() {
		let status = serde_json::to_string(&DeveloperStatus::RequirementsSubmitted).unwrap();
		assert_eq!(status, "\"requirements_submitted\"");
		let status = serde_json::to_string(&DeliveryStatus::Cancelled).unwrap();
		assert_eq!(status, "\"cancelled\"");

		// Unknown values are a deserialization error, never a default.
		let result: Result<DeveloperStatus, _> = serde_json::from_str("\"unknown\"");
		assert!(result.is_err());
	}

	#[test]
	fn test_payment_due_gate() {
		let mut order = test_order();
		assert!(!order.payment_due());

		order.developer_status = DeveloperStatus::Accepted;
		assert!(order.payment_due());

		order.payment_status = PaymentStatus::Paid;
		assert!(!order.payment_due());
	}

	#[test]
	fn test_action_kinds() {
		let action = OrderAction::SubmitRequirements {
			text: "storefront for a bakery".to_string(),
		};
		assert_eq!(action.kind(), OrderActionKind::SubmitRequirements);
		assert_eq!(action.kind().to_string(), "submit_requirements");
	}

	fn test_order() -> Order {
		Order {
			id: "order-1".to_string(),
			customer_id: "user-1".to_string(),
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
			created_at: 0,
			updated_at: 0,
		}
	}
}
