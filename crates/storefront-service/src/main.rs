//! Main entry point for the storefront service.
//!
//! This binary provides a complete storefront backend that manages template
//! orders, payments, deliveries and the admin alert feed. It uses a modular
//! architecture with pluggable implementations for different components.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use storefront_config::Config;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the storefront service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the storefront service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the storefront engine with all implementations
/// 5. Runs the engine until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	// Create env filter with default from args
	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started storefront");

	// Load configuration
	let config = Config::from_file(args.config.to_str().unwrap()).await?;
	tracing::info!("Loaded configuration [{}]", config.storefront.id);

	// Build the engine from the registered implementations
	let engine = Arc::new(factory_registry::build_storefront_from_config(
		config.clone(),
	)?);
	engine.initialize().await?;

	// Check if API server should be started
	let api_enabled = config.api.as_ref().is_some_and(|api| api.enabled);

	if api_enabled {
		let api_config = config.api.as_ref().unwrap().clone();
		let api_engine = Arc::clone(&engine);

		// Run the engine loop and the API server concurrently
		tokio::select! {
			result = engine.run() => {
				tracing::info!("Engine finished");
				result?;
			}
			result = server::start_server(api_config, api_engine) => {
				tracing::info!("API server finished");
				result?;
			}
		}
	} else {
		// Run only the engine loop
		tracing::info!("Starting engine only");
		engine.run().await?;
	}

	engine.shutdown().await?;
	tracing::info!("Stopped storefront");
	Ok(())
}
