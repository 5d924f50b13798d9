use std::collections::HashMap;

use fault_core::trace::{SpanId, TraceId};
use fault_core::uid::FaultUid;
use parking_lot::RwLock;

/// Tracks which calls of a trace are in flight at the same time, so each
/// report can carry the set of calls it overlapped with. The recorded set for
/// a call contains exactly those calls that were live when it started and had
/// not completed by the time it finished.
#[derive(Default)]
pub struct InFlightTracker {
	inner: RwLock<HashMap<TraceId, HashMap<SpanId, Entry>>>,
}

struct Entry {
	uid: FaultUid,
	concurrent: Vec<FaultUid>,
}

impl InFlightTracker {
	pub fn track(&self, trace_id: &TraceId, span_id: &SpanId, uid: &FaultUid) {
		let mut inner = self.inner.write();
		let live = inner.entry(trace_id.clone()).or_default();
		let snapshot: Vec<FaultUid> = live.values().map(|e| e.uid.clone()).collect();
		for entry in live.values_mut() {
			entry.concurrent.push(uid.clone());
		}
		live.insert(
			span_id.clone(),
			Entry {
				uid: uid.clone(),
				concurrent: snapshot,
			},
		);
	}

	pub fn get_tracked_and_clear(&self, trace_id: &TraceId, span_id: &SpanId) -> Vec<FaultUid> {
		let mut inner = self.inner.write();
		let Some(live) = inner.get_mut(trace_id) else {
			return Vec::new();
		};
		let concurrent = live
			.remove(span_id)
			.map(|e| e.concurrent)
			.unwrap_or_default();
		if live.is_empty() {
			inner.remove(trace_id);
		}
		concurrent
	}

	pub fn clear_tracked(&self, trace_id: &TraceId) {
		self.inner.write().remove(trace_id);
	}
}
