use serde::{Deserialize, Serialize};

use crate::fault::Fault;
use crate::trace::{SpanId, TraceId};
use crate::uid::{FaultUid, PartialInjectionPoint};

/// What the proxy observed of the upstream response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
	pub status: u16,
	pub body: String,
	pub duration_ms: f64,
	pub overhead_duration_ms: f64,
}

/// One intercepted call, as reported to the controller. Upserted by
/// `(trace_id, span_id)`; a report without a response is a stub inserted at
/// uid resolution time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
	pub trace_id: TraceId,
	pub span_id: SpanId,
	pub uid: FaultUid,
	pub is_initial: bool,
	#[serde(default)]
	pub protocol: String,
	#[serde(default)]
	pub injected_fault: Option<Fault>,
	#[serde(default)]
	pub response: Option<ResponseData>,
	#[serde(default)]
	pub concurrent_to: Option<Vec<FaultUid>>,
}

/// Body of `POST /v1/proxy/get-uid`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UidRequest {
	pub trace_id: TraceId,
	pub span_id: SpanId,
	pub parent_span_id: SpanId,
	pub partial_point: PartialInjectionPoint,
	pub is_initial: bool,
	#[serde(default)]
	pub include_predecessors: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UidResponse {
	pub uid: FaultUid,
}

/// Body of `POST /v1/faultload/unregister`. A missing trace id clears the
/// global faults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnregisterRequest {
	#[serde(default)]
	pub trace_id: Option<TraceId>,
}

/// Body of `GET /v1/trace/{trace_id}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportsResponse {
	pub reports: Vec<TraceReport>,
}
