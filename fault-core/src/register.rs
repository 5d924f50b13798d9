use std::collections::HashMap;

use parking_lot::RwLock;

use crate::fault::Fault;
use crate::trace::TraceId;

/// Faults registered at one scope (the controller, or a single proxy).
/// A trace is "of interest" between register and remove, even when the
/// registered fault list is empty.
#[derive(Default)]
pub struct FaultRegister {
	inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
	by_trace: HashMap<TraceId, Vec<Fault>>,
	global: Vec<Fault>,
}

impl FaultRegister {
	pub fn new() -> FaultRegister {
		FaultRegister::default()
	}

	pub fn register(&self, trace_id: TraceId, faults: Vec<Fault>) {
		self.inner.write().by_trace.insert(trace_id, faults);
	}

	pub fn remove(&self, trace_id: &TraceId) {
		self.inner.write().by_trace.remove(trace_id);
	}

	pub fn register_global(&self, faults: Vec<Fault>) {
		self.inner.write().global.extend(faults);
	}

	pub fn remove_global(&self) {
		self.inner.write().global.clear();
	}

	pub fn is_registered(&self, trace_id: &TraceId) -> bool {
		self.inner.read().by_trace.contains_key(trace_id)
	}

	/// Global faults followed by the trace-local ones, plus whether the trace
	/// itself is registered.
	pub fn get(&self, trace_id: &TraceId) -> (Vec<Fault>, bool) {
		let inner = self.inner.read();
		let local = inner.by_trace.get(trace_id);
		let mut faults = inner.global.clone();
		if let Some(local) = local {
			faults.extend(local.iter().cloned());
		}
		(faults, local.is_some())
	}

	pub fn clear(&self) {
		let mut inner = self.inner.write();
		inner.by_trace.clear();
		inner.global.clear();
	}
}
