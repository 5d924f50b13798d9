use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use fault_core::fault::{Fault, Faultload};
use fault_core::report::UnregisterRequest;
use tracing::info;

use crate::ProxyInputs;

/// The faultload control API exposed next to the proxied port. The
/// controller fans (un)registrations out to this listener.
pub fn router(pi: Arc<ProxyInputs>) -> Router {
	Router::new()
		.route("/v1/faultload/register", post(register_faultload))
		.route("/v1/faultload/unregister", post(unregister_faultload))
		.with_state(pi)
}

async fn register_faultload(
	State(pi): State<Arc<ProxyInputs>>,
	Json(faultload): Json<Faultload>,
) -> &'static str {
	// Only keep faults this proxy could actually inject.
	let faults: Vec<Fault> = faultload
		.faults
		.into_iter()
		.filter(|f| targets_destination(f, &pi.cfg.destination))
		.collect();

	match faultload.trace_id {
		Some(trace_id) => {
			info!(%trace_id, size = faults.len(), "registered faultload");
			pi.faults.register(trace_id, faults);
		},
		None => {
			info!(size = faults.len(), "registered global faultload");
			pi.faults.register_global(faults);
		},
	}
	"OK"
}

async fn unregister_faultload(
	State(pi): State<Arc<ProxyInputs>>,
	Json(request): Json<UnregisterRequest>,
) -> &'static str {
	match request.trace_id {
		Some(trace_id) => {
			pi.faults.remove(&trace_id);
			pi.tracker.clear_tracked(&trace_id);
			info!(%trace_id, "unregistered faultload");
		},
		None => {
			pi.faults.remove_global();
			info!("unregistered global faultload");
		},
	}
	"OK"
}

fn targets_destination(fault: &Fault, destination: &str) -> bool {
	match fault.uid.point() {
		Some(point) => match point.destination.as_deref() {
			None | Some("*") => true,
			Some(dest) => dest == destination,
		},
		None => true,
	}
}
