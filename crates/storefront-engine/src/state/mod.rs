//! Order state management.
//!
//! `rules` holds the pure transition logic; `order` binds it to the store
//! with optimistic concurrency.

pub mod order;
pub mod rules;

pub use order::{OrderStateError, OrderStateMachine, TransitionOutcome};
pub use rules::{available_actions, TransitionError};
