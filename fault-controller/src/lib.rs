//! The faultmesh controller: authoritative per-run state (trace registry,
//! reports, invocation counts) plus the HTTP API used by the operator and
//! the proxies.

pub mod config;
pub mod fanout;
pub mod routes;
pub mod store;

use std::sync::Arc;

use fault_core::register::FaultRegister;

#[derive(Clone)]
pub struct AppState {
	pub reports: Arc<store::ReportStore>,
	pub counter: Arc<store::InvocationCounter>,
	pub faults: Arc<FaultRegister>,
	pub proxies: Arc<fanout::ProxyFanout>,
}

impl AppState {
	pub fn new(cfg: &config::Config) -> anyhow::Result<AppState> {
		Ok(AppState {
			reports: Arc::new(store::ReportStore::default()),
			counter: Arc::new(store::InvocationCounter::default()),
			faults: Arc::new(FaultRegister::new()),
			proxies: Arc::new(fanout::ProxyFanout::new(cfg)?),
		})
	}
}
