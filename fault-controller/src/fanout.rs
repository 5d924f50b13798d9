use std::time::Duration;

use anyhow::anyhow;
use fault_core::fault::Faultload;
use fault_core::report::UnregisterRequest;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Pushes faultload changes to every proxy in the mesh, with bounded retry
/// and doubling backoff per proxy. The per-attempt timeout and the initial
/// backoff both come from `PROXY_TIMEOUT`.
pub struct ProxyFanout {
	proxies: Vec<String>,
	retry_count: u32,
	base_backoff: Duration,
	client: reqwest::Client,
}

impl ProxyFanout {
	pub fn new(cfg: &Config) -> anyhow::Result<ProxyFanout> {
		let client = reqwest::Client::builder()
			.timeout(cfg.proxy_timeout)
			.build()?;
		Ok(ProxyFanout {
			proxies: cfg.proxy_list.clone(),
			retry_count: cfg.proxy_retry_count,
			base_backoff: cfg.proxy_timeout,
			client,
		})
	}

	pub async fn register_all(&self, faultload: &Faultload) -> anyhow::Result<()> {
		self.broadcast("/v1/faultload/register", faultload).await
	}

	pub async fn unregister_all(&self, request: &UnregisterRequest) -> anyhow::Result<()> {
		self.broadcast("/v1/faultload/unregister", request).await
	}

	async fn broadcast<T: Serialize + Sync>(&self, path: &str, body: &T) -> anyhow::Result<()> {
		let sends = self
			.proxies
			.iter()
			.map(|proxy| self.send_with_retry(proxy, path, body));
		let failures: Vec<String> = futures_util::future::join_all(sends)
			.await
			.into_iter()
			.filter_map(|res| res.err().map(|e| e.to_string()))
			.collect();
		if failures.is_empty() {
			Ok(())
		} else {
			Err(anyhow!(failures.join("; ")))
		}
	}

	async fn send_with_retry<T: Serialize + Sync>(
		&self,
		proxy: &str,
		path: &str,
		body: &T,
	) -> anyhow::Result<()> {
		let url = format!("http://{proxy}{path}");
		let mut backoff = self.base_backoff;
		let mut last_err = anyhow!("no attempts made");
		for attempt in 0..self.retry_count {
			if attempt > 0 {
				debug!(proxy, attempt, "retrying after {last_err}");
				tokio::time::sleep(backoff).await;
				backoff *= 2;
			}
			match self.client.post(&url).json(body).send().await {
				Ok(resp) if resp.status().is_success() => {
					info!(proxy, path, "updated proxy");
					return Ok(());
				},
				Ok(resp) => last_err = anyhow!("proxy {proxy} responded {}", resp.status()),
				Err(e) => last_err = anyhow!("failed to reach proxy {proxy}: {e}"),
			}
		}
		warn!(proxy, "giving up after {} attempts: {last_err}", self.retry_count);
		Err(last_err)
	}
}
