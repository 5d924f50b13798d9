use std::sync::Arc;
use std::time::{Duration, Instant};

use ::http::request::Parts;
use ::http::{HeaderValue, StatusCode};
use bytes::Bytes;
use fault_core::fault::{Fault, FaultMode};
use fault_core::ident;
use fault_core::report::{TraceReport, UidRequest};
use fault_core::trace::{SpanId, TraceParent, TraceState};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tracing::{debug, info, warn};

use super::capture::Captured;
use super::inject;
use crate::{Body, ProxyInputs, Request, Response};

pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const TRACESTATE_HEADER: &str = "tracestate";

const FIT_FLAG: &str = "fit";
const FIT_INITIAL_KEY: &str = "init";
const FIT_PARENT_KEY: &str = "fit-parent";
const FIT_MASK_PAYLOAD_FLAG: &str = "maskpyld";
const FIT_HASH_BODY_FLAG: &str = "hashbody";
const FIT_HEADER_LOG_FLAG: &str = "hdrlog";
const FIT_USE_PREDECESSORS_FLAG: &str = "usepred";

#[derive(Debug, Clone, Copy)]
struct Flags {
	is_target: bool,
	is_initial: bool,
	mask_payload: bool,
	hash_body: bool,
	log_headers: bool,
	use_predecessors: bool,
}

impl Flags {
	fn from_state(state: &TraceState) -> Flags {
		Flags {
			is_target: state.flag(FIT_FLAG),
			is_initial: state.flag(FIT_INITIAL_KEY),
			mask_payload: state.flag(FIT_MASK_PAYLOAD_FLAG),
			hash_body: state.flag(FIT_HASH_BODY_FLAG),
			log_headers: state.flag(FIT_HEADER_LOG_FLAG),
			use_predecessors: state.flag(FIT_USE_PREDECESSORS_FLAG),
		}
	}
}

fn millis(elapsed: Duration) -> f64 {
	elapsed.as_secs_f64() * 1000.0
}

fn header_string(req: &::http::Request<Incoming>, name: &str) -> Option<String> {
	req
		.headers()
		.get(name)
		.and_then(|v| v.to_str().ok())
		.map(str::to_string)
}

/// The per-request state machine. Requests without usable trace context, for
/// unregistered traces, or without the fit flag pass through untouched.
pub async fn handle(pi: Arc<ProxyInputs>, req: ::http::Request<Incoming>) -> Response {
	let full_start = Instant::now();

	let Some(parent_span) = header_string(&req, TRACEPARENT_HEADER)
		.as_deref()
		.and_then(TraceParent::parse)
	else {
		return passthrough(pi, req).await;
	};

	let trace_id = parent_span.trace_id.clone();
	let (faults, of_interest) = pi.faults.get(&trace_id);
	if !of_interest {
		debug!(%trace_id, "trace is not of interest");
		return passthrough(pi, req).await;
	}

	let state = TraceState::parse(&header_string(&req, TRACESTATE_HEADER).unwrap_or_default());
	let flags = Flags::from_state(&state);
	if !flags.is_target {
		return passthrough(pi, req).await;
	}

	instrumented(pi, req, full_start, parent_span, state, flags, faults).await
}

async fn instrumented(
	pi: Arc<ProxyInputs>,
	mut req: ::http::Request<Incoming>,
	full_start: Instant,
	parent_span: TraceParent,
	mut state: TraceState,
	flags: Flags,
	faults: Vec<Fault>,
) -> Response {
	let trace_id = parent_span.trace_id.clone();

	// Become the parent of everything downstream: fresh span id in the
	// traceparent, and our span as the causal parent in the tracestate. Only
	// the header values change; the received name casing is preserved by the
	// connection builders.
	let child_span = parent_span.with_child_span();
	let span_id = child_span.parent_id.clone();
	set_header_value(&mut req, TRACEPARENT_HEADER, &child_span.to_string());

	if flags.is_initial {
		state.delete(FIT_INITIAL_KEY);
	}
	let causal_parent = SpanId::from(state.get(FIT_PARENT_KEY).unwrap_or("0"));
	state.set(FIT_PARENT_KEY, &span_id.0);
	set_header_value(&mut req, TRACESTATE_HEADER, &state.to_string());

	debug!(%trace_id, %span_id, ?flags, "intercepted request");
	if flags.log_headers {
		info!(headers = ?req.headers(), "request headers");
	}

	let (parts, body) = req.into_parts();
	let body_bytes = match body.collect().await {
		Ok(collected) => collected.to_bytes(),
		Err(e) => {
			warn!("failed to read request body: {e}");
			Bytes::new()
		},
	};

	let is_grpc = ident::is_grpc(&parts);
	let protocol = if is_grpc { "gRPC" } else { "HTTP" };
	let partial = ident::partial_point_from_request(
		&parts,
		&body_bytes,
		&pi.cfg.destination,
		&pi.cfg.grpc_path_prefix,
		flags.mask_payload,
	);
	debug!(%partial, "partial point");

	let uid = pi
		.controller
		.get_uid(&UidRequest {
			trace_id: trace_id.clone(),
			span_id: span_id.clone(),
			parent_span_id: causal_parent,
			partial_point: partial,
			is_initial: flags.is_initial,
			include_predecessors: flags.use_predecessors,
		})
		.await;
	debug!(%uid, "resolved fault uid");

	pi.tracker.track(&trace_id, &span_id, &uid);

	let fault = faults.iter().find(|f| f.uid.matches(&uid)).cloned();
	let mut injected: Option<Fault> = None;
	let mut duration_ms = 0.0;

	let captured = match fault.as_ref().map(|f| f.mode.clone()) {
		Some(FaultMode::HttpError { status }) => {
			debug!(status, "injecting http error");
			injected = fault;
			inject::error_response(status, is_grpc)
		},
		Some(FaultMode::OmissionError { status }) => {
			// The upstream still runs for its side effects; its response is
			// discarded and replaced with the error.
			debug!(status, "injecting omission error");
			let (_, upstream_ms) = forward(&pi, parts, body_bytes).await;
			duration_ms = upstream_ms;
			injected = fault;
			inject::error_response(status, is_grpc)
		},
		Some(FaultMode::Delay { duration }) => {
			debug!(delay_ms = millis(duration), "injecting delay");
			tokio::time::sleep(duration).await;
			injected = fault;
			let (captured, upstream_ms) = forward(&pi, parts, body_bytes).await;
			duration_ms = upstream_ms;
			captured
		},
		None => {
			let (captured, upstream_ms) = forward(&pi, parts, body_bytes).await;
			duration_ms = upstream_ms;
			captured
		},
	};

	let concurrent = pi.tracker.get_tracked_and_clear(&trace_id, &span_id);
	let mut response_data = captured.response_data(flags.hash_body);
	response_data.duration_ms = duration_ms;
	response_data.overhead_duration_ms = millis(full_start.elapsed()) - duration_ms;

	let report = TraceReport {
		trace_id,
		span_id,
		uid,
		is_initial: flags.is_initial,
		protocol: protocol.to_string(),
		injected_fault: injected,
		response: Some(response_data),
		concurrent_to: Some(concurrent),
	};

	// The report lands before the response is released, so any sibling
	// computing its predecessors sees this call as completed.
	pi.controller.report_span(&report).await;

	captured.into_response()
}

/// Forward and fully capture the upstream response. Transport failures are
/// folded into a synthetic 502 so the pipeline still reports and responds.
async fn forward(pi: &ProxyInputs, parts: Parts, body: Bytes) -> (Captured, f64) {
	let req = Request::from_parts(parts, Body::from(body));
	let start = Instant::now();
	let resp = match pi.upstream.call(req).await {
		Ok(resp) => resp,
		Err(e) => {
			warn!("upstream call failed: {e}");
			return (bad_gateway(), millis(start.elapsed()));
		},
	};
	let (resp_parts, resp_body) = resp.into_parts();
	let collected = match resp_body.collect().await {
		Ok(collected) => collected,
		Err(e) => {
			warn!("failed to read upstream response: {e}");
			return (bad_gateway(), millis(start.elapsed()));
		},
	};
	let duration = millis(start.elapsed());
	let trailers = collected.trailers().cloned();
	(
		Captured {
			status: resp_parts.status,
			headers: resp_parts.headers,
			body: collected.to_bytes(),
			trailers,
		},
		duration,
	)
}

fn bad_gateway() -> Captured {
	let mut headers = ::http::HeaderMap::new();
	headers.insert(
		::http::header::CONTENT_TYPE,
		HeaderValue::from_static("text/plain; charset=utf-8"),
	);
	Captured {
		status: StatusCode::BAD_GATEWAY,
		headers,
		body: Bytes::from_static(b"upstream unavailable\n"),
		trailers: None,
	}
}

/// Forward without instrumentation, streaming the response straight through.
async fn passthrough(pi: Arc<ProxyInputs>, req: ::http::Request<Incoming>) -> Response {
	match pi.upstream.call(req.map(Body::new)).await {
		Ok(resp) => resp,
		Err(e) => {
			warn!("passthrough call failed: {e}");
			e.into_response()
		},
	}
}

fn set_header_value(req: &mut ::http::Request<Incoming>, name: &'static str, value: &str) {
	match HeaderValue::from_str(value) {
		Ok(value) => {
			req.headers_mut().insert(name, value);
		},
		Err(e) => warn!(header = name, "failed to encode header value: {e}"),
	}
}
