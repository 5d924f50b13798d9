use tracing_subscriber::EnvFilter;

/// Map a `LOG_LEVEL` value onto a tracing level. Unknown values fall back to
/// info.
pub fn parse_log_level(level: &str) -> tracing::Level {
	match level.to_ascii_lowercase().as_str() {
		"debug" => tracing::Level::DEBUG,
		"warn" | "warning" => tracing::Level::WARN,
		"error" => tracing::Level::ERROR,
		"trace" => tracing::Level::TRACE,
		_ => tracing::Level::INFO,
	}
}

/// Initialize the global subscriber from `LOG_LEVEL`, honoring any extra
/// `RUST_LOG` directives.
pub fn setup_logging() {
	let level = parse_log_level(&std::env::var("LOG_LEVEL").unwrap_or_default());
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
		.with_writer(std::io::stderr)
		.init();
}

pub mod testing {
	use std::sync::Once;

	static INIT: Once = Once::new();

	pub fn setup_test_logging() {
		INIT.call_once(|| {
			let _ = tracing_subscriber::fmt()
				.with_env_filter(
					super::EnvFilter::from_default_env()
						.add_directive(tracing::Level::DEBUG.into()),
				)
				.with_test_writer()
				.try_init();
		});
	}
}
