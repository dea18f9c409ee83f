//! Pure transition rules for the order lifecycle.
//!
//! `apply` is a synchronous decision function: given an order snapshot, a
//! requested action and the actor attempting it, it either returns the
//! updated snapshot together with the event describing the transition, or
//! the exact rule that blocked the action. It performs no I/O; persistence
//! and notification belong to the caller.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use storefront_types::{
	Actor, ActorRole, DeliveryArtifact, DeliveryStatus, DeveloperStatus, Order, OrderAction,
	OrderActionKind, PaymentStatus, TransitionEvent, TransitionRecord,
};
use thiserror::Error;

/// Errors a requested transition can be refused with.
///
/// Every variant is an expected, recoverable condition reported back to the
/// caller, never a crash. The conflict and verification variants are raised
/// by the persistence and gateway seams rather than by `apply` itself.
#[derive(Debug, Error)]
pub enum TransitionError {
	#[error("Invalid actor for {action}: {reason}")]
	InvalidActor {
		action: OrderActionKind,
		reason: String,
	},
	#[error("Invalid state for {action}: {reason}")]
	InvalidState {
		action: OrderActionKind,
		reason: String,
	},
	#[error("Validation failed for {action}: {reason}")]
	ValidationFailed {
		action: OrderActionKind,
		reason: String,
	},
	#[error("{action} refused: {reason}")]
	AlreadyTerminal {
		action: OrderActionKind,
		reason: String,
	},
	#[error("Order was modified by another request, retry with a fresh read")]
	ConcurrentModification,
	#[error("Gateway verification failed: {0}")]
	GatewayVerificationFailed(String),
}

/// Outcome of a successful `apply` call.
///
/// `event` is `None` only for the idempotent no-op of a duplicate payment
/// confirmation; every state-changing transition carries one.
#[derive(Debug)]
pub struct Applied {
	/// The updated order snapshot.
	pub order: Order,
	/// Event describing the transition, for the notification feed.
	pub event: Option<TransitionEvent>,
}

// Static transition table for the developer axis - each state maps to
// the set of states it may advance to.
static DEVELOPER_TRANSITIONS: Lazy<HashMap<DeveloperStatus, HashSet<DeveloperStatus>>> =
	Lazy::new(|| {
		let mut m = HashMap::new();
		m.insert(
			DeveloperStatus::Pending,
			HashSet::from([DeveloperStatus::RequirementsSubmitted]),
		);
		m.insert(
			DeveloperStatus::RequirementsSubmitted,
			HashSet::from([DeveloperStatus::Accepted, DeveloperStatus::Rejected]),
		);
		m.insert(
			DeveloperStatus::Accepted,
			HashSet::from([DeveloperStatus::InProgress, DeveloperStatus::Rejected]),
		);
		m.insert(
			DeveloperStatus::InProgress,
			HashSet::from([DeveloperStatus::Completed]),
		);
		m.insert(DeveloperStatus::Rejected, HashSet::new()); // terminal
		m.insert(DeveloperStatus::Completed, HashSet::new()); // terminal
		m
	});

/// Applies a lifecycle action to an order snapshot.
///
/// Guards are evaluated in a fixed order: actor first, then whether the
/// targeted axis is already terminal, then the state precondition, then the
/// payload. `now` becomes the order's `updated_at` and the event timestamp.
pub fn apply(
	mut order: Order,
	action: OrderAction,
	actor: &Actor,
	now: u64,
) -> Result<Applied, TransitionError> {
	let kind = action.kind();
	check_actor(&order, kind, actor)?;

	let previous_status = order.status();

	match action {
		OrderAction::SubmitRequirements { text } => {
			check_developer_transition(&order, kind, DeveloperStatus::RequirementsSubmitted)?;
			if text.trim().is_empty() {
				return Err(TransitionError::ValidationFailed {
					action: kind,
					reason: "requirements text must not be empty".to_string(),
				});
			}
			order.requirements = Some(text);
			order.developer_status = DeveloperStatus::RequirementsSubmitted;
		},
		OrderAction::Accept => {
			check_developer_transition(&order, kind, DeveloperStatus::Accepted)?;
			order.developer_status = DeveloperStatus::Accepted;
			if let Actor::Admin { id } = actor {
				order.assigned_admin = Some(id.clone());
			}
		},
		OrderAction::Reject => {
			check_developer_transition(&order, kind, DeveloperStatus::Rejected)?;
			order.developer_status = DeveloperStatus::Rejected;
			// Rejection is the only path to a cancelled delivery.
			order.delivery_status = DeliveryStatus::Cancelled;
		},
		OrderAction::AdvanceInProgress => {
			check_developer_transition(&order, kind, DeveloperStatus::InProgress)?;
			order.developer_status = DeveloperStatus::InProgress;
		},
		OrderAction::Complete { artifact } => {
			check_developer_transition(&order, kind, DeveloperStatus::Completed)?;
			if artifact.is_none() && order.delivery_artifact.is_none() {
				return Err(TransitionError::ValidationFailed {
					action: kind,
					reason: "a delivery artifact must be attached before completion".to_string(),
				});
			}
			if let Some(artifact) = artifact {
				check_artifact(&artifact, kind)?;
				order.delivery_artifact = Some(artifact);
			}
			order.developer_status = DeveloperStatus::Completed;
			order.delivery_status = DeliveryStatus::Delivered;
		},
		OrderAction::RecordPayment { receipt } => {
			if order.payment_status == PaymentStatus::Paid {
				// The gateway delivers confirmations at least once; a
				// duplicate for the capture already recorded is a no-op.
				let duplicate = order.payment.as_ref().is_some_and(|existing| {
					existing.payment_id == receipt.payment_id
						&& existing.gateway_order_id == receipt.gateway_order_id
				});
				if duplicate {
					return Ok(Applied { order, event: None });
				}
				return Err(TransitionError::AlreadyTerminal {
					action: kind,
					reason: "payment has already been captured for this order".to_string(),
				});
			}
			if !order.payment_due() {
				return Err(TransitionError::InvalidState {
					action: kind,
					reason: format!(
						"payment can only be captured after acceptance, developer status is {}",
						order.developer_status
					),
				});
			}
			if receipt.gateway_order_id.is_empty() || receipt.payment_id.is_empty() {
				return Err(TransitionError::ValidationFailed {
					action: kind,
					reason: "payment receipt is missing gateway identifiers".to_string(),
				});
			}
			order.payment_status = PaymentStatus::Paid;
			order.payment = Some(receipt);
		},
		OrderAction::UploadDelivery { artifact } => {
			if order.delivery_status == DeliveryStatus::Cancelled {
				return Err(TransitionError::AlreadyTerminal {
					action: kind,
					reason: "delivery was cancelled, no artifact can be attached".to_string(),
				});
			}
			if !matches!(
				order.developer_status,
				DeveloperStatus::InProgress | DeveloperStatus::Completed
			) {
				return Err(TransitionError::InvalidState {
					action: kind,
					reason: format!(
						"artifacts can only be attached once work has started, developer status is {}",
						order.developer_status
					),
				});
			}
			check_artifact(&artifact, kind)?;
			order.delivery_artifact = Some(artifact);
		},
	}

	order.updated_at = now;
	order.history.push(TransitionRecord {
		action: kind,
		actor: actor.clone(),
		at: now,
	});

	let event = TransitionEvent {
		order_id: order.id.clone(),
		action: kind,
		previous_status,
		new_status: order.status(),
		actor: actor.clone(),
		timestamp: now,
	};

	Ok(Applied {
		order,
		event: Some(event),
	})
}

/// Rewrites the requirements text without a lifecycle transition.
///
/// Customers may refine their requirements while the order is still under
/// review; once an admin accepts, the text becomes read-only. No event is
/// produced and no history entry is recorded for an edit.
pub fn edit_requirements(
	mut order: Order,
	actor: &Actor,
	text: String,
	now: u64,
) -> Result<Order, TransitionError> {
	let kind = OrderActionKind::SubmitRequirements;
	check_actor(&order, kind, actor)?;
	if order.developer_status.is_terminal() {
		return Err(TransitionError::AlreadyTerminal {
			action: kind,
			reason: format!(
				"developer status {} permits no further changes",
				order.developer_status
			),
		});
	}
	if !order.requirements_editable() {
		return Err(TransitionError::InvalidState {
			action: kind,
			reason: "requirements are read-only once the order is accepted".to_string(),
		});
	}
	if text.trim().is_empty() {
		return Err(TransitionError::ValidationFailed {
			action: kind,
			reason: "requirements text must not be empty".to_string(),
		});
	}
	order.requirements = Some(text);
	order.updated_at = now;
	Ok(order)
}

/// Lists the actions an actor of the given role could request right now.
///
/// Mirrors the preconditions enforced by `apply`, so a caller rendering
/// affordances from this list never offers an action the engine refuses.
/// Payment is deliberately absent: it is recorded by the gateway callback,
/// not requested by a user, and is advertised via `Order::payment_due`.
pub fn available_actions(order: &Order, role: ActorRole) -> Vec<OrderActionKind> {
	match role {
		ActorRole::Customer => {
			if order.developer_status == DeveloperStatus::Pending {
				vec![OrderActionKind::SubmitRequirements]
			} else {
				Vec::new()
			}
		},
		ActorRole::Admin => match order.developer_status {
			DeveloperStatus::RequirementsSubmitted => {
				vec![OrderActionKind::Accept, OrderActionKind::Reject]
			},
			DeveloperStatus::Accepted => {
				vec![OrderActionKind::AdvanceInProgress, OrderActionKind::Reject]
			},
			DeveloperStatus::InProgress => {
				vec![OrderActionKind::Complete, OrderActionKind::UploadDelivery]
			},
			DeveloperStatus::Completed => vec![OrderActionKind::UploadDelivery],
			DeveloperStatus::Pending | DeveloperStatus::Rejected => Vec::new(),
		},
	}
}

/// Checks that the actor holds the authority the action requires.
fn check_actor(
	order: &Order,
	action: OrderActionKind,
	actor: &Actor,
) -> Result<(), TransitionError> {
	match action {
		OrderActionKind::SubmitRequirements => match actor {
			Actor::Customer { id } if *id == order.customer_id => Ok(()),
			Actor::Customer { .. } => Err(TransitionError::InvalidActor {
				action,
				reason: "only the owning customer may submit requirements".to_string(),
			}),
			_ => Err(TransitionError::InvalidActor {
				action,
				reason: "requirements are submitted by the owning customer".to_string(),
			}),
		},
		OrderActionKind::RecordPayment => match actor {
			Actor::Gateway => Ok(()),
			_ => Err(TransitionError::InvalidActor {
				action,
				reason: "payments are recorded by the verified gateway callback".to_string(),
			}),
		},
		_ => match actor {
			Actor::Admin { .. } => Ok(()),
			_ => Err(TransitionError::InvalidActor {
				action,
				reason: "admin role required".to_string(),
			}),
		},
	}
}

/// Checks a developer-axis step against the transition table.
///
/// A terminal current state reports `AlreadyTerminal`; a non-terminal state
/// the table does not allow to reach `to` reports `InvalidState`.
fn check_developer_transition(
	order: &Order,
	action: OrderActionKind,
	to: DeveloperStatus,
) -> Result<(), TransitionError> {
	let from = order.developer_status;
	if from.is_terminal() {
		return Err(TransitionError::AlreadyTerminal {
			action,
			reason: format!("developer status {} permits no further transitions", from),
		});
	}
	let allowed = DEVELOPER_TRANSITIONS
		.get(&from)
		.is_some_and(|set| set.contains(&to));
	if !allowed {
		return Err(TransitionError::InvalidState {
			action,
			reason: format!("developer status is {}, cannot move to {}", from, to),
		});
	}
	Ok(())
}

/// Checks that an artifact reference is presentable to the customer.
fn check_artifact(
	artifact: &DeliveryArtifact,
	action: OrderActionKind,
) -> Result<(), TransitionError> {
	if artifact.file_name.trim().is_empty() || artifact.url.trim().is_empty() {
		return Err(TransitionError::ValidationFailed {
			action,
			reason: "delivery artifact needs a file name and a url".to_string(),
		});
	}
	Ok(())
}
