use anyhow::Result;
use fault_controller::{AppState, config, routes};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
	fault_core::telemetry::setup_logging();

	let cfg = config::Config::from_env()?;
	info!(
		port = cfg.port,
		proxies = ?cfg.proxy_list,
		retries = cfg.proxy_retry_count,
		otel = cfg.use_otel,
		"starting controller"
	);

	let state = AppState::new(&cfg)?;
	let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.port)).await?;
	info!(port = cfg.port, "controller listening");

	axum::serve(listener, routes::router(state))
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
			info!("shutting down");
		})
		.await?;
	Ok(())
}
