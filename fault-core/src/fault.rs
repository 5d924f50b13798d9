use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::trace::TraceId;
use crate::uid::FaultUid;

/// What to do to a matched call. Unknown mode types and unparseable arguments
/// are rejected when a faultload is decoded, not at injection time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireMode", into = "WireMode")]
pub enum FaultMode {
	/// Respond with the given status without calling the upstream.
	HttpError { status: u16 },
	/// Call the upstream, discard its response, respond with the given status.
	OmissionError { status: u16 },
	/// Stall the call before forwarding it normally.
	Delay { duration: Duration },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WireMode {
	#[serde(rename = "type")]
	kind: String,
	args: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModeError {
	#[error("unknown fault mode: {0}")]
	UnknownMode(String),
	#[error("fault mode {0} is missing arguments")]
	MissingArgs(String),
	#[error("invalid argument for {mode}: {arg}")]
	InvalidArg { mode: String, arg: String },
}

impl TryFrom<WireMode> for FaultMode {
	type Error = ModeError;

	fn try_from(wire: WireMode) -> Result<FaultMode, ModeError> {
		let arg = wire
			.args
			.first()
			.ok_or_else(|| ModeError::MissingArgs(wire.kind.clone()))?;
		let invalid = || ModeError::InvalidArg {
			mode: wire.kind.clone(),
			arg: arg.to_string(),
		};
		match wire.kind.as_str() {
			"HTTP_ERROR" => Ok(FaultMode::HttpError {
				status: arg.parse::<u16>().map_err(|_| invalid())?,
			}),
			"OMISSION_ERROR" => Ok(FaultMode::OmissionError {
				status: arg.parse::<u16>().map_err(|_| invalid())?,
			}),
			"DELAY" => Ok(FaultMode::Delay {
				duration: Duration::from_millis(arg.parse::<u64>().map_err(|_| invalid())?),
			}),
			_ => Err(ModeError::UnknownMode(wire.kind)),
		}
	}
}

impl From<FaultMode> for WireMode {
	fn from(mode: FaultMode) -> WireMode {
		match mode {
			FaultMode::HttpError { status } => WireMode {
				kind: "HTTP_ERROR".to_string(),
				args: vec![status.to_string()],
			},
			FaultMode::OmissionError { status } => WireMode {
				kind: "OMISSION_ERROR".to_string(),
				args: vec![status.to_string()],
			},
			FaultMode::Delay { duration } => WireMode {
				kind: "DELAY".to_string(),
				args: vec![duration.as_millis().to_string()],
			},
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fault {
	pub uid: FaultUid,
	pub mode: FaultMode,
}

/// The set of faults to apply on a single trace for one test run. A
/// faultload without a trace id registers globally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Faultload {
	#[serde(default)]
	pub trace_id: Option<TraceId>,
	pub faults: Vec<Fault>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_http_error_mode() {
		let fault: Fault = serde_json::from_str(
			r#"{"uid":{"stack":[{"destination":"api","signature":"GET /x","payload":"*","count":0}]},
			    "mode":{"type":"HTTP_ERROR","args":["503"]}}"#,
		)
		.unwrap();
		assert_eq!(fault.mode, FaultMode::HttpError { status: 503 });
	}

	#[test]
	fn decodes_delay_mode() {
		let mode: FaultMode =
			serde_json::from_str(r#"{"type":"DELAY","args":["250"]}"#).unwrap();
		assert_eq!(
			mode,
			FaultMode::Delay {
				duration: Duration::from_millis(250)
			}
		);
	}

	#[test]
	fn rejects_unknown_mode() {
		let res: Result<FaultMode, _> =
			serde_json::from_str(r#"{"type":"PACKET_LOSS","args":["1"]}"#);
		assert!(res.is_err());
	}

	#[test]
	fn rejects_garbage_status() {
		let res: Result<FaultMode, _> =
			serde_json::from_str(r#"{"type":"HTTP_ERROR","args":["teapot"]}"#);
		assert!(res.is_err());
	}

	#[test]
	fn mode_roundtrips_through_wire_form() {
		let mode = FaultMode::OmissionError { status: 500 };
		let json = serde_json::to_string(&mode).unwrap();
		assert!(json.contains("OMISSION_ERROR"));
		let back: FaultMode = serde_json::from_str(&json).unwrap();
		assert_eq!(back, mode);
	}
}
