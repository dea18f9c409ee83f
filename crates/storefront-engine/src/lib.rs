//! Core engine for the storefront backend.
//!
//! This crate provides the main orchestration logic for the storefront,
//! coordinating between the component services (store, gateway, pricing,
//! notifications) to run the complete order lifecycle. It includes the
//! order state machine, the business handlers the API layer calls into,
//! the event-driven alert pipeline and the builder used to assemble an
//! engine from configuration.

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod state;

pub use builder::{BuilderError, StorefrontBuilder, StorefrontFactories};
pub use engine::event_bus::EventBus;
pub use engine::{EngineError, StorefrontEngine};
pub use handlers::{
	AlertHandler, CheckoutDetails, CreateOrderRequest, OrderHandler, OrderItemRequest,
	PaymentHandler, RegisterUserRequest, UpdateUserRequest, UserHandler,
};
pub use state::{OrderStateError, OrderStateMachine, TransitionError, TransitionOutcome};
