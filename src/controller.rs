use std::time::Duration;

use fault_core::report::{TraceReport, UidRequest, UidResponse};
use fault_core::uid::FaultUid;
use tracing::{debug, warn};

/// Client for the controller's proxy-facing endpoints. Both calls retry
/// exactly once; a total failure degrades the request instead of failing it.
#[derive(Clone)]
pub struct ControllerClient {
	base: String,
	client: reqwest::Client,
}

impl ControllerClient {
	pub fn new(controller_host: &str) -> anyhow::Result<ControllerClient> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(5))
			.pool_idle_timeout(Duration::from_secs(90))
			.build()?;
		Ok(ControllerClient {
			base: format!("http://{controller_host}"),
			client,
		})
	}

	/// Resolve the full fault uid for an intercepted call. Falls back to the
	/// empty stack when the controller cannot be reached, so the call itself
	/// still goes through.
	pub async fn get_uid(&self, request: &UidRequest) -> FaultUid {
		match self.attempt_get_uid(request).await {
			Some(uid) => uid,
			None => match self.attempt_get_uid(request).await {
				Some(uid) => uid,
				None => {
					warn!(
						trace_id = %request.trace_id,
						parent_span_id = %request.parent_span_id,
						"failed to get uid from controller after retry"
					);
					FaultUid::root()
				},
			},
		}
	}

	async fn attempt_get_uid(&self, request: &UidRequest) -> Option<FaultUid> {
		let url = format!("{}/v1/proxy/get-uid", self.base);
		let resp = match self.client.post(url).json(request).send().await {
			Ok(resp) => resp,
			Err(e) => {
				warn!("failed to reach controller for uid: {e}");
				return None;
			},
		};
		if !resp.status().is_success() {
			warn!(status = %resp.status(), "controller rejected uid request");
			return None;
		}
		match resp.json::<UidResponse>().await {
			Ok(body) => Some(body.uid),
			Err(e) => {
				warn!("failed to decode uid response: {e}");
				None
			},
		}
	}

	/// Send one trace report. Retries once; a dropped report is logged, never
	/// surfaced to the client.
	pub async fn report_span(&self, report: &TraceReport) -> bool {
		if self.attempt_report(report).await {
			return true;
		}
		self.attempt_report(report).await
	}

	async fn attempt_report(&self, report: &TraceReport) -> bool {
		let url = format!("{}/v1/proxy/report", self.base);
		match self.client.post(url).json(report).send().await {
			Ok(resp) if resp.status().is_success() => {
				debug!(span_id = %report.span_id, "reported span");
				true
			},
			Ok(resp) => {
				warn!(span_id = %report.span_id, status = %resp.status(), "failed to report span");
				false
			},
			Err(e) => {
				warn!(span_id = %report.span_id, "failed to reach controller to report span: {e}");
				false
			},
		}
	}
}
