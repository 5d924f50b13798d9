use std::collections::HashMap;

use fault_core::trace::TraceId;
use fault_core::uid::{FaultUid, PartialInjectionPoint, Predecessors};
use parking_lot::Mutex;

/// Hands out a dense 0-based index per `(trace, parent, partial,
/// predecessors)` tuple, in arrival order within the trace.
#[derive(Default)]
pub struct InvocationCounter {
	inner: Mutex<HashMap<TraceId, HashMap<String, i64>>>,
}

fn invocation_key(
	parent: &FaultUid,
	partial: &PartialInjectionPoint,
	predecessors: Option<&Predecessors>,
) -> String {
	format!(
		"{parent}>{partial}{}",
		predecessors.map(Predecessors::to_string).unwrap_or_default()
	)
}

impl InvocationCounter {
	pub fn get_count(
		&self,
		trace_id: &TraceId,
		parent: &FaultUid,
		partial: &PartialInjectionPoint,
		predecessors: Option<&Predecessors>,
	) -> i64 {
		let key = invocation_key(parent, partial, predecessors);
		let mut inner = self.inner.lock();
		let counts = inner.entry(trace_id.clone()).or_default();
		match counts.get_mut(&key) {
			Some(count) => {
				*count += 1;
				*count
			},
			None => {
				counts.insert(key, 0);
				0
			},
		}
	}

	pub fn clear(&self, trace_id: &TraceId) {
		self.inner.lock().remove(trace_id);
	}
}
