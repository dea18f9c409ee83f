//! Core storefront engine implementation.
//!
//! The engine owns the configured services, the state machine and the
//! request handlers, and drives the event loop that fans applied
//! transitions into the admin alert feed.

pub mod event_bus;
pub mod lifecycle;

use crate::handlers::{AlertHandler, OrderHandler, PaymentHandler, UserHandler};
use crate::state::OrderStateMachine;
use event_bus::EventBus;
use std::sync::Arc;
use std::time::Duration;
use storefront_config::Config;
use storefront_gateway::GatewayService;
use storefront_notify::NotificationService;
use storefront_pricing::PricingService;
use storefront_store::StoreService;
use storefront_types::{OrderEvent, StorefrontEvent};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Errors from engine lifecycle operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// The storefront engine.
///
/// Cheap to clone; all services and handlers are shared behind `Arc`s and
/// every clone publishes into the same event bus.
#[derive(Clone)]
pub struct StorefrontEngine {
	pub(crate) config: Config,
	pub(crate) store: Arc<StoreService>,
	pub(crate) gateway: Arc<GatewayService>,
	pub(crate) pricing: Arc<PricingService>,
	pub(crate) notify: Arc<NotificationService>,
	pub(crate) event_bus: EventBus,
	pub(crate) state_machine: Arc<OrderStateMachine>,
	pub(crate) order_handler: Arc<OrderHandler>,
	pub(crate) payment_handler: Arc<PaymentHandler>,
	pub(crate) user_handler: Arc<UserHandler>,
	pub(crate) alert_handler: Arc<AlertHandler>,
}

impl std::fmt::Debug for StorefrontEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StorefrontEngine")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl StorefrontEngine {
	/// Wires the engine from already-built services. Use the builder to get
	/// here from configuration.
	pub(crate) fn new(
		config: Config,
		store: Arc<StoreService>,
		gateway: Arc<GatewayService>,
		pricing: Arc<PricingService>,
		notify: Arc<NotificationService>,
		event_bus: EventBus,
	) -> Self {
		let state_machine = Arc::new(OrderStateMachine::new(store.clone()));

		let order_handler = Arc::new(OrderHandler::new(
			config.clone(),
			store.clone(),
			pricing.clone(),
			state_machine.clone(),
			event_bus.clone(),
		));
		let payment_handler = Arc::new(PaymentHandler::new(
			store.clone(),
			gateway.clone(),
			state_machine.clone(),
			event_bus.clone(),
		));
		let user_handler = Arc::new(UserHandler::new(store.clone()));
		let alert_handler = Arc::new(AlertHandler::new(store.clone(), notify.clone()));

		Self {
			config,
			store,
			gateway,
			pricing,
			notify,
			event_bus,
			state_machine,
			order_handler,
			payment_handler,
			user_handler,
			alert_handler,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn store(&self) -> &StoreService {
		&self.store
	}

	pub fn gateway(&self) -> &GatewayService {
		&self.gateway
	}

	pub fn pricing(&self) -> &PricingService {
		&self.pricing
	}

	/// The admin alert feed.
	pub fn notify(&self) -> &NotificationService {
		&self.notify
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn state_machine(&self) -> &OrderStateMachine {
		&self.state_machine
	}

	pub fn orders(&self) -> &OrderHandler {
		&self.order_handler
	}

	pub fn payments(&self) -> &PaymentHandler {
		&self.payment_handler
	}

	pub fn users(&self) -> &UserHandler {
		&self.user_handler
	}

	/// Runs the engine until shutdown.
	///
	/// Subscribes to the event bus, fans transition events into the alert
	/// handler under a concurrency cap, and ticks the store cleanup on the
	/// configured interval. Returns after ctrl-c or once every bus sender
	/// is gone.
	pub async fn run(&self) -> Result<(), EngineError> {
		info!(storefront_id = %self.config.storefront.id, "Engine started");

		let mut event_rx = self.event_bus.subscribe();

		let cleanup_store = self.store.clone();
		let cleanup_seconds = self.config.store.cleanup_interval_seconds;
		let cleanup_task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(Duration::from_secs(cleanup_seconds));
			loop {
				ticker.tick().await;
				match cleanup_store.cleanup_expired().await {
					Ok(0) => {},
					Ok(removed) => info!(removed, "Cleaned up expired store entries"),
					Err(e) => warn!("Store cleanup failed: {}", e),
				}
			}
		});

		// TODO: make the handler concurrency limit configurable
		let semaphore = Arc::new(Semaphore::new(100));

		loop {
			tokio::select! {
				event = event_rx.recv() => {
					match event {
						Ok(event) => self.dispatch_event(event, &semaphore),
						Err(RecvError::Lagged(skipped)) => {
							warn!(skipped, "Event loop lagged behind the bus");
						},
						Err(RecvError::Closed) => break,
					}
				},
				_ = tokio::signal::ctrl_c() => {
					info!("Received shutdown signal");
					break;
				},
			}
		}

		cleanup_task.abort();
		info!("Engine stopped");
		Ok(())
	}

	fn dispatch_event(&self, event: StorefrontEvent, semaphore: &Arc<Semaphore>) {
		match event {
			StorefrontEvent::Order(OrderEvent::TransitionApplied { event }) => {
				let handler = self.alert_handler.clone();
				Self::spawn_handler(semaphore, async move {
					handler
						.handle_transition(event)
						.await
						.map_err(|e| e.to_string())
				});
			},
			// Creation and checkout-opened events carry no follow-up work.
			_ => {},
		}
	}

	/// Spawns a handler task gated by the shared semaphore, so a burst of
	/// events cannot run an unbounded number of handlers at once.
	fn spawn_handler<F>(semaphore: &Arc<Semaphore>, task: F)
	where
		F: std::future::Future<Output = Result<(), String>> + Send + 'static,
	{
		let semaphore = semaphore.clone();
		tokio::spawn(async move {
			let _permit = match semaphore.acquire_owned().await {
				Ok(permit) => permit,
				// Closed only when the engine is gone.
				Err(_) => return,
			};
			if let Err(e) = task.await {
				warn!("Event handler failed: {}", e);
			}
		});
	}
}
