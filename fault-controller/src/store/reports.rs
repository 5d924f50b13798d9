use std::collections::HashMap;

use fault_core::report::TraceReport;
use fault_core::trace::{SpanId, TraceId};
use parking_lot::RwLock;

/// All reports of the active traces, kept under three consistent indices:
/// the flat arrival-ordered list, per trace, and per (trace, span).
#[derive(Default)]
pub struct ReportStore {
	inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
	reports: Vec<TraceReport>,
	by_trace: HashMap<TraceId, Vec<TraceReport>>,
	by_trace_span: HashMap<TraceId, HashMap<SpanId, TraceReport>>,
}

impl ReportStore {
	/// Insert or replace the report for its `(trace, span)` key. Replacement
	/// keeps the original position in the ordered indices. Returns whether a
	/// prior report existed.
	pub fn upsert(&self, report: TraceReport) -> bool {
		let mut inner = self.inner.write();
		let existed = inner
			.by_trace_span
			.get(&report.trace_id)
			.is_some_and(|spans| spans.contains_key(&report.span_id));

		if existed {
			let slot = inner
				.reports
				.iter_mut()
				.find(|r| r.trace_id == report.trace_id && r.span_id == report.span_id);
			if let Some(slot) = slot {
				*slot = report.clone();
			}
			if let Some(per_trace) = inner.by_trace.get_mut(&report.trace_id) {
				if let Some(slot) = per_trace.iter_mut().find(|r| r.span_id == report.span_id) {
					*slot = report.clone();
				}
			}
		} else {
			inner.reports.push(report.clone());
			inner
				.by_trace
				.entry(report.trace_id.clone())
				.or_default()
				.push(report.clone());
		}

		inner
			.by_trace_span
			.entry(report.trace_id.clone())
			.or_default()
			.insert(report.span_id.clone(), report);
		existed
	}

	pub fn get_by_trace_id(&self, trace_id: &TraceId) -> Vec<TraceReport> {
		self
			.inner
			.read()
			.by_trace
			.get(trace_id)
			.cloned()
			.unwrap_or_default()
	}

	pub fn get_by_trace_and_span_id(
		&self,
		trace_id: &TraceId,
		span_id: &SpanId,
	) -> Option<TraceReport> {
		self
			.inner
			.read()
			.by_trace_span
			.get(trace_id)
			.and_then(|spans| spans.get(span_id))
			.cloned()
	}

	pub fn remove_by_trace_id(&self, trace_id: &TraceId) {
		let mut inner = self.inner.write();
		inner.by_trace.remove(trace_id);
		inner.by_trace_span.remove(trace_id);
		inner.reports.retain(|r| &r.trace_id != trace_id);
	}

	pub fn clear(&self) {
		let mut inner = self.inner.write();
		inner.reports.clear();
		inner.by_trace.clear();
		inner.by_trace_span.clear();
	}

	#[cfg(test)]
	fn assert_consistent(&self) {
		let inner = self.inner.read();
		let from_trace: usize = inner.by_trace.values().map(Vec::len).sum();
		let from_span: usize = inner.by_trace_span.values().map(HashMap::len).sum();
		assert_eq!(inner.reports.len(), from_trace);
		assert_eq!(inner.reports.len(), from_span);
		for report in &inner.reports {
			assert!(
				inner.by_trace_span[&report.trace_id].contains_key(&report.span_id),
				"missing span index entry"
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use fault_core::report::ResponseData;
	use fault_core::uid::{FaultUid, PartialInjectionPoint, build_fault_uid};

	use super::*;

	fn report(trace: &str, span: &str, status: u16) -> TraceReport {
		TraceReport {
			trace_id: TraceId::from(trace),
			span_id: SpanId::from(span),
			uid: build_fault_uid(
				&FaultUid::root(),
				&PartialInjectionPoint {
					destination: "api".to_string(),
					signature: "GET /x".to_string(),
					payload: None,
				},
				None,
				0,
			),
			is_initial: false,
			protocol: "HTTP".to_string(),
			injected_fault: None,
			response: Some(ResponseData {
				status,
				body: String::new(),
				duration_ms: 1.0,
				overhead_duration_ms: 0.5,
			}),
			concurrent_to: None,
		}
	}

	#[test]
	fn upsert_is_idempotent_and_reports_existence() {
		let store = ReportStore::default();
		let r = report("t1", "s1", 200);
		assert!(!store.upsert(r.clone()));
		assert!(store.upsert(r.clone()));
		assert_eq!(store.get_by_trace_id(&TraceId::from("t1")), vec![r]);
		store.assert_consistent();
	}

	#[test]
	fn upsert_replaces_in_place() {
		let store = ReportStore::default();
		store.upsert(report("t1", "s1", 200));
		store.upsert(report("t1", "s2", 200));
		// re-report the first span with a different status
		assert!(store.upsert(report("t1", "s1", 500)));

		let reports = store.get_by_trace_id(&TraceId::from("t1"));
		assert_eq!(reports.len(), 2);
		assert_eq!(reports[0].span_id, SpanId::from("s1"));
		assert_eq!(reports[0].response.as_ref().unwrap().status, 500);
		store.assert_consistent();
	}

	#[test]
	fn lookup_by_trace_and_span() {
		let store = ReportStore::default();
		store.upsert(report("t1", "s1", 200));
		assert!(store
			.get_by_trace_and_span_id(&TraceId::from("t1"), &SpanId::from("s1"))
			.is_some());
		assert!(store
			.get_by_trace_and_span_id(&TraceId::from("t1"), &SpanId::from("nope"))
			.is_none());
		assert!(store
			.get_by_trace_and_span_id(&TraceId::from("t2"), &SpanId::from("s1"))
			.is_none());
	}

	#[test]
	fn remove_by_trace_only_touches_that_trace() {
		let store = ReportStore::default();
		store.upsert(report("t1", "s1", 200));
		store.upsert(report("t1", "s2", 200));
		store.upsert(report("t2", "s1", 200));

		store.remove_by_trace_id(&TraceId::from("t1"));
		assert!(store.get_by_trace_id(&TraceId::from("t1")).is_empty());
		assert_eq!(store.get_by_trace_id(&TraceId::from("t2")).len(), 1);
		store.assert_consistent();
	}

	#[test]
	fn clear_empties_every_index() {
		let store = ReportStore::default();
		store.upsert(report("t1", "s1", 200));
		store.upsert(report("t2", "s1", 200));
		store.clear();
		assert!(store.get_by_trace_id(&TraceId::from("t1")).is_empty());
		store.assert_consistent();
	}
}
