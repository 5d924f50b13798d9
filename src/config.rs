use std::net::IpAddr;

use ::http::Uri;
use anyhow::Context;
use fault_core::{env, net};
use hickory_resolver::TokioAsyncResolver;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct Config {
	/// Listen address for intercepted traffic (`PROXY_HOST`).
	pub host: String,
	/// Upstream origin this sidecar fronts (`PROXY_TARGET`).
	pub target: Uri,
	/// Logical name of the upstream, used as the destination of every
	/// injection point this proxy produces.
	pub destination: String,
	/// Listen address for the faultload control API.
	pub control_addr: String,
	/// host:port of the controller.
	pub controller_host: String,
	pub grpc_path_prefix: String,
	pub use_otel: bool,
}

impl Config {
	pub async fn from_env() -> anyhow::Result<Config> {
		let host: String = env::parse("PROXY_HOST")?.context("PROXY_HOST is required")?;
		let target_raw: String = env::parse("PROXY_TARGET")?.context("PROXY_TARGET is required")?;
		let target: Uri = target_raw
			.parse()
			.with_context(|| format!("invalid PROXY_TARGET {target_raw}"))?;

		let destination = match env::parse::<String>("SERVICE_NAME")?
			.or(env::parse("OTEL_SERVICE_NAME")?)
		{
			Some(name) => name,
			None => resolve_destination(&target_raw).await,
		};

		let control_port = match env::parse::<u16>("CONTROL_PORT")? {
			Some(port) => port,
			None => {
				let (_, port) = net::split_host_port(&host);
				port.context("PROXY_HOST must include a port to derive CONTROL_PORT")? + 1
			},
		};

		Ok(Config {
			host,
			target,
			destination,
			control_addr: format!("0.0.0.0:{control_port}"),
			controller_host: env::parse("CONTROLLER_HOST")?.context("CONTROLLER_HOST is required")?,
			grpc_path_prefix: env::parse_default("GRPC_PATH_PREFIX", "/".to_string())?,
			use_otel: env::parse_default("USE_OTEL", false)?,
		})
	}
}

/// Derive the logical service name from the upstream address. Addresses that
/// are IPs are resolved back to a name first; the compose stack prefix and
/// instance suffix are then stripped.
async fn resolve_destination(target: &str) -> String {
	let stack_prefix = env::parse::<String>("STACK_PREFIX").unwrap_or_default();
	let addr = net::host_and_port_from_url(target);
	let (host, _) = net::split_host_port(addr);

	let fqdn = match host.parse::<IpAddr>() {
		Ok(ip) => match reverse_lookup(ip).await {
			Some(name) => name,
			None => {
				warn!(addr = %host, "failed to resolve upstream hostname, using address");
				return host;
			},
		},
		Err(_) => host,
	};
	net::service_name_from_fqdn(&fqdn, stack_prefix.as_deref())
}

async fn reverse_lookup(ip: IpAddr) -> Option<String> {
	let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
		Ok(resolver) => resolver,
		Err(e) => {
			warn!("failed to build resolver from system config: {e}");
			return None;
		},
	};
	match resolver.reverse_lookup(ip).await {
		Ok(names) => names.iter().next().map(|ptr| ptr.0.to_utf8()),
		Err(e) => {
			warn!(addr = %ip, "reverse lookup failed: {e}");
			None
		},
	}
}
