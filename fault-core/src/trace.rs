use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// W3C trace id, 32 lowercase hex characters. Compared for equality only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(pub String);

impl fmt::Display for TraceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TraceId {
	fn from(v: &str) -> TraceId {
		TraceId(v.to_string())
	}
}

/// W3C span id, 16 hex characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(pub String);

impl SpanId {
	/// A fresh random 8-byte span id, never all-zero.
	pub fn random() -> SpanId {
		let mut rng = rand::rng();
		let mut id: u64 = rng.random();
		while id == 0 {
			id = rng.random();
		}
		SpanId(format!("{id:016x}"))
	}
}

impl fmt::Display for SpanId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SpanId {
	fn from(v: &str) -> SpanId {
		SpanId(v.to_string())
	}
}

/// A parsed `traceparent` header, as defined by
/// https://www.w3.org/TR/trace-context/. The segments are kept as the raw
/// strings received so that version and flags are re-emitted byte-for-byte;
/// only the parent id is ever replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceParent {
	pub version: String,
	pub trace_id: TraceId,
	pub parent_id: SpanId,
	pub flags: String,
}

impl TraceParent {
	pub fn parse(value: &str) -> Option<TraceParent> {
		let parts: Vec<&str> = value.split('-').collect();
		if parts.len() != 4 {
			return None;
		}
		if parts[1].len() != 32 || parts[2].len() != 16 {
			return None;
		}
		Some(TraceParent {
			version: parts[0].to_string(),
			trace_id: TraceId(parts[1].to_string()),
			parent_id: SpanId(parts[2].to_string()),
			flags: parts[3].to_string(),
		})
	}

	/// The same traceparent with a freshly generated parent id.
	pub fn with_child_span(&self) -> TraceParent {
		TraceParent {
			version: self.version.clone(),
			trace_id: self.trace_id.clone(),
			parent_id: SpanId::random(),
			flags: self.flags.clone(),
		}
	}
}

impl fmt::Display for TraceParent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}-{}-{}-{}",
			self.version, self.trace_id, self.parent_id, self.flags
		)
	}
}

/// A parsed `tracestate` header. Entry order is preserved so the header can
/// be re-emitted with only the touched values changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceState {
	entries: Vec<(String, String)>,
}

impl TraceState {
	pub fn parse(value: &str) -> TraceState {
		let entries = value
			.split(',')
			.filter_map(|pair| {
				let (k, v) = pair.split_once('=')?;
				Some((k.trim().to_string(), v.to_string()))
			})
			.collect();
		TraceState { entries }
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self
			.entries
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	/// True when the flag key is present with the value "1".
	pub fn flag(&self, key: &str) -> bool {
		self.get(key) == Some("1")
	}

	pub fn set(&mut self, key: &str, value: &str) {
		match self.entries.iter_mut().find(|(k, _)| k == key) {
			Some(entry) => entry.1 = value.to_string(),
			None => self.entries.push((key.to_string(), value.to_string())),
		}
	}

	pub fn delete(&mut self, key: &str) {
		self.entries.retain(|(k, _)| k != key);
	}
}

impl fmt::Display for TraceState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let joined = self
			.entries
			.iter()
			.map(|(k, v)| format!("{k}={v}"))
			.collect::<Vec<_>>()
			.join(",");
		f.write_str(&joined)
	}
}
