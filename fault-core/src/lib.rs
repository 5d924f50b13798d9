//! Shared domain model for the faultmesh proxy and controller: fault
//! identities and matching, faultloads, W3C trace context, trace reports,
//! and the HTTP/gRPC status mapping.

pub mod env;
pub mod fault;
pub mod grpc;
pub mod ident;
pub mod net;
pub mod register;
pub mod report;
pub mod telemetry;
pub mod trace;
pub mod uid;

pub use fault::{Fault, FaultMode, Faultload};
pub use report::{TraceReport, UidRequest, UidResponse};
pub use trace::{SpanId, TraceId};
pub use uid::{FaultUid, InjectionPoint, PartialInjectionPoint, Predecessors};
