//! The faultmesh proxy sidecar: a reverse proxy inserted in front of one
//! upstream service that deterministically identifies every intercepted call,
//! injects registered faults, and reports each observed call to the
//! controller.

pub mod client;
pub mod config;
pub mod control;
pub mod controller;
pub mod proxy;
pub mod tracker;

use std::sync::Arc;

use fault_core::register::FaultRegister;

pub type Body = axum::body::Body;
pub type Request = ::http::Request<Body>;
pub type Response = ::http::Response<Body>;

/// Everything a request handler needs, constructed once at startup.
pub struct ProxyInputs {
	pub cfg: config::Config,
	pub faults: FaultRegister,
	pub tracker: tracker::InFlightTracker,
	pub controller: controller::ControllerClient,
	pub upstream: client::Upstream,
}

impl ProxyInputs {
	pub fn new(cfg: config::Config) -> anyhow::Result<Arc<ProxyInputs>> {
		let controller = controller::ControllerClient::new(&cfg.controller_host)?;
		let upstream = client::Upstream::new(cfg.target.clone())?;
		Ok(Arc::new(ProxyInputs {
			cfg,
			faults: FaultRegister::new(),
			tracker: tracker::InFlightTracker::default(),
			controller,
			upstream,
		}))
	}
}
