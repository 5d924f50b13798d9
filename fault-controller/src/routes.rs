use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use fault_core::fault::Faultload;
use fault_core::report::{
	ReportsResponse, TraceReport, UidRequest, UidResponse, UnregisterRequest,
};
use fault_core::trace::TraceId;
use fault_core::uid::{FaultUid, Predecessors, build_fault_uid};
use axum::http::StatusCode;
use tracing::{debug, error, info};

use crate::AppState;
use crate::store::ReportStore;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/v1/faultload/register", post(register_faultload))
		.route("/v1/faultload/unregister", post(unregister_faultload))
		.route("/v1/proxy/get-uid", post(get_fault_uid))
		.route("/v1/proxy/report", post(report_span))
		.route("/v1/trace/{trace_id}", get(get_reports_by_trace))
		.route("/v1/clear", get(clear_all))
		.with_state(state)
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
	#[error("trace id not registered")]
	TraceNotRegistered,
	#[error("failed to determine uid")]
	UidUnresolvable,
	#[error("failed to update one or more proxies: {0}")]
	ProxyFanout(anyhow::Error),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> axum::response::Response {
		let status = match &self {
			ApiError::TraceNotRegistered => StatusCode::NOT_FOUND,
			ApiError::UidUnresolvable => StatusCode::INTERNAL_SERVER_ERROR,
			ApiError::ProxyFanout(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		(status, self.to_string()).into_response()
	}
}

async fn register_faultload(
	State(state): State<AppState>,
	Json(faultload): Json<Faultload>,
) -> Result<&'static str, ApiError> {
	match &faultload.trace_id {
		Some(trace_id) => state
			.faults
			.register(trace_id.clone(), faultload.faults.clone()),
		None => state.faults.register_global(faultload.faults.clone()),
	}

	state
		.proxies
		.register_all(&faultload)
		.await
		.map_err(ApiError::ProxyFanout)?;

	info!(
		trace_id = faultload.trace_id.as_ref().map(tracing::field::display),
		size = faultload.faults.len(),
		"registered faultload"
	);
	Ok("OK")
}

async fn unregister_faultload(
	State(state): State<AppState>,
	Json(request): Json<UnregisterRequest>,
) -> Result<&'static str, ApiError> {
	match &request.trace_id {
		Some(trace_id) => {
			state.faults.remove(trace_id);
			state.counter.clear(trace_id);
		},
		None => state.faults.remove_global(),
	}

	state
		.proxies
		.unregister_all(&request)
		.await
		.map_err(ApiError::ProxyFanout)?;

	info!(
		trace_id = request.trace_id.as_ref().map(tracing::field::display),
		"unregistered faultload"
	);
	Ok("OK")
}

async fn get_fault_uid(
	State(state): State<AppState>,
	Json(request): Json<UidRequest>,
) -> Result<Json<UidResponse>, ApiError> {
	debug!(
		trace_id = %request.trace_id,
		parent_span_id = %request.parent_span_id,
		span_id = %request.span_id,
		is_initial = request.is_initial,
		"uid request"
	);

	let uid = determine_uid(&state, &request).ok_or(ApiError::UidUnresolvable)?;
	debug!(%uid, "determined uid");

	// Reserve the span so the proxy's final report upserts in place, and so
	// this call shows up as incomplete in sibling predecessor computations.
	state.reports.upsert(TraceReport {
		trace_id: request.trace_id,
		span_id: request.span_id,
		uid: uid.clone(),
		is_initial: request.is_initial,
		protocol: String::new(),
		injected_fault: None,
		response: None,
		concurrent_to: None,
	});

	Ok(Json(UidResponse { uid }))
}

fn determine_uid(state: &AppState, request: &UidRequest) -> Option<FaultUid> {
	if request.is_initial {
		let predecessors = request.include_predecessors.then(Predecessors::new);
		return Some(build_fault_uid(
			&FaultUid::any(),
			&request.partial_point,
			predecessors,
			0,
		));
	}

	let Some(parent) = state
		.reports
		.get_by_trace_and_span_id(&request.trace_id, &request.parent_span_id)
	else {
		error!(
			trace_id = %request.trace_id,
			parent_span_id = %request.parent_span_id,
			"parent report not found"
		);
		return None;
	};

	let predecessors = request.include_predecessors.then(|| {
		let mut completed = completed_predecessors(&state.reports, &parent);
		// the current call is not its own predecessor
		completed.remove(&request.partial_point);
		completed
	});

	let count = state.counter.get_count(
		&request.trace_id,
		&parent.uid,
		&request.partial_point,
		predecessors.as_ref(),
	);

	Some(build_fault_uid(
		&parent.uid,
		&request.partial_point,
		predecessors,
		count,
	))
}

/// Summarize the completed children of `parent` as highest-count-per-partial.
/// Incomplete reports (stubs without a response) are skipped, so the map only
/// grows as siblings finish.
fn completed_predecessors(reports: &ReportStore, parent: &TraceReport) -> Predecessors {
	let mut completed = Predecessors::new();
	for report in reports.get_by_trace_id(&parent.trace_id) {
		if report.span_id == parent.span_id || report.response.is_none() {
			continue;
		}
		if !report.uid.parent().matches(&parent.uid) {
			continue;
		}
		let Some(point) = report.uid.point() else {
			continue;
		};
		completed.observe(point.as_partial().to_string(), point.count);
	}
	completed
}

async fn report_span(
	State(state): State<AppState>,
	Json(report): Json<TraceReport>,
) -> Result<&'static str, ApiError> {
	if !state.faults.is_registered(&report.trace_id) {
		return Err(ApiError::TraceNotRegistered);
	}

	let existed = state.reports.upsert(report.clone());
	if existed {
		debug!(trace_id = %report.trace_id, span_id = %report.span_id, "updated reported span");
	} else {
		debug!(trace_id = %report.trace_id, span_id = %report.span_id, "added reported span");
	}
	Ok("OK")
}

async fn get_reports_by_trace(
	State(state): State<AppState>,
	Path(trace_id): Path<String>,
) -> Result<Json<ReportsResponse>, ApiError> {
	let trace_id = TraceId(trace_id);
	if !state.faults.is_registered(&trace_id) {
		return Err(ApiError::TraceNotRegistered);
	}
	Ok(Json(ReportsResponse {
		reports: state.reports.get_by_trace_id(&trace_id),
	}))
}

async fn clear_all(State(state): State<AppState>) {
	state.reports.clear();
	state.faults.clear();
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
