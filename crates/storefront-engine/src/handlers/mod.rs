//! Event and request handlers for the storefront engine.
//!
//! Each handler owns one slice of the domain: orders (creation and
//! lifecycle), payments (checkout and confirmation), users (profiles and
//! actor resolution) and alerts (the admin feed fed from the event bus).

pub mod alert;
pub mod order;
pub mod payment;
pub mod user;

pub use alert::{AlertError, AlertHandler};
pub use order::{CreateOrderRequest, OrderError, OrderHandler, OrderItemRequest};
pub use payment::{CheckoutDetails, PaymentError, PaymentHandler};
pub use user::{RegisterUserRequest, UpdateUserRequest, UserError, UserHandler};
