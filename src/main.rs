use anyhow::Result;
use faultmesh::{ProxyInputs, config, control, proxy};
use tokio::task::JoinSet;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
	fault_core::telemetry::setup_logging();

	let cfg = config::Config::from_env().await?;
	info!(
		host = %cfg.host,
		target = %cfg.target,
		destination = %cfg.destination,
		control = %cfg.control_addr,
		otel = cfg.use_otel,
		"starting proxy"
	);

	let inputs = ProxyInputs::new(cfg)?;

	let mut run_set = JoinSet::new();

	let proxy_inputs = inputs.clone();
	run_set.spawn(async move { proxy::serve(proxy_inputs).await });

	let control_inputs = inputs.clone();
	run_set.spawn(async move {
		let addr = control_inputs.cfg.control_addr.clone();
		let listener = tokio::net::TcpListener::bind(&addr).await?;
		info!(%addr, "control listening");
		axum::serve(listener, control::router(control_inputs))
			.await
			.map_err(anyhow::Error::from)
	});

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			info!("shutting down");
			run_set.shutdown().await;
		},
		Some(res) = run_set.join_next() => {
			res??;
		},
	}
	Ok(())
}
