use std::time::Duration;

use fault_core::env;

#[derive(Clone, Debug)]
pub struct Config {
	/// Listen port (`CONTROLLER_PORT`).
	pub port: u16,
	/// Control addresses of every proxy in the mesh (`PROXY_LIST`).
	pub proxy_list: Vec<String>,
	/// Attempts per proxy for faultload fan-out (`PROXY_RETRY_COUNT`).
	pub proxy_retry_count: u32,
	/// Per-attempt timeout and initial backoff (`PROXY_TIMEOUT`, ms).
	pub proxy_timeout: Duration,
	pub use_otel: bool,
}

impl Config {
	pub fn from_env() -> anyhow::Result<Config> {
		let proxy_list = env::parse::<String>("PROXY_LIST")?
			.unwrap_or_default()
			.split(',')
			.map(str::trim)
			.filter(|p| !p.is_empty())
			.map(str::to_string)
			.collect();
		Ok(Config {
			port: env::parse_default("CONTROLLER_PORT", 5000)?,
			proxy_list,
			proxy_retry_count: env::parse_default("PROXY_RETRY_COUNT", 3u32)?.max(1),
			proxy_timeout: Duration::from_millis(env::parse_default("PROXY_TIMEOUT", 100u64)?),
			use_otel: env::parse_default("USE_OTEL", false)?,
		})
	}
}
