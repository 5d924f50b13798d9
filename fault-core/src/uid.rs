use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The proxy-computable part of a call identity: which upstream is called,
/// with what request shape, and (optionally) a fingerprint of the payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialInjectionPoint {
	pub destination: String,
	pub signature: String,
	pub payload: Option<String>,
}

impl fmt::Display for PartialInjectionPoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}:{}{}",
			self.destination,
			self.signature,
			payload_suffix(self.payload.as_deref())
		)
	}
}

fn payload_suffix(payload: Option<&str>) -> String {
	match payload {
		Some(p) if !p.is_empty() && p != "*" => format!("({p})"),
		_ => String::new(),
	}
}

/// Completed sibling calls under the same parent, summarized as the highest
/// observed invocation count per partial-point string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predecessors(pub BTreeMap<String, i64>);

impl Predecessors {
	pub fn new() -> Predecessors {
		Predecessors(BTreeMap::new())
	}

	pub fn observe(&mut self, key: String, count: i64) {
		let entry = self.0.entry(key).or_insert(count);
		if *entry < count {
			*entry = count;
		}
	}

	pub fn remove(&mut self, point: &PartialInjectionPoint) {
		self.0.remove(&point.to_string());
	}

	fn matches(&self, other: &Predecessors) -> bool {
		if self.0.len() != other.0.len() {
			return false;
		}
		self.0.iter().all(|(k, v)| match other.0.get(k) {
			Some(v2) => count_matches(*v, *v2),
			None => false,
		})
	}
}

impl fmt::Display for Predecessors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.0.is_empty() {
			return Ok(());
		}
		// BTreeMap iteration is key-ordered, which keeps this form canonical.
		let body = self
			.0
			.iter()
			.map(|(k, v)| format!("{k}:{v}"))
			.collect::<Vec<_>>()
			.join(",");
		write!(f, "{{{body}}}")
	}
}

/// One element of a FaultUid stack. Absent fields and a negative count act as
/// wildcards in matching.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionPoint {
	#[serde(default)]
	pub destination: Option<String>,
	#[serde(default)]
	pub signature: Option<String>,
	#[serde(default)]
	pub payload: Option<String>,
	#[serde(default)]
	pub predecessors: Option<Predecessors>,
	#[serde(default)]
	pub count: i64,
}

fn field_is_wild(v: Option<&str>) -> bool {
	matches!(v, None | Some("*"))
}

fn field_matches(a: Option<&str>, b: Option<&str>) -> bool {
	if field_is_wild(a) || field_is_wild(b) {
		return true;
	}
	a == b
}

fn count_matches(a: i64, b: i64) -> bool {
	a == b || a < 0 || b < 0
}

impl InjectionPoint {
	pub fn as_partial(&self) -> PartialInjectionPoint {
		PartialInjectionPoint {
			destination: self.destination.clone().unwrap_or_else(|| "*".to_string()),
			signature: self.signature.clone().unwrap_or_else(|| "*".to_string()),
			payload: self.payload.clone(),
		}
	}

	/// A point with every field unspecified matches any other point.
	pub fn is_any(&self) -> bool {
		field_is_wild(self.destination.as_deref())
			&& field_is_wild(self.signature.as_deref())
			&& field_is_wild(self.payload.as_deref())
			&& self.predecessors.is_none()
			&& self.count < 0
	}

	pub fn matches(&self, other: &InjectionPoint) -> bool {
		field_matches(self.destination.as_deref(), other.destination.as_deref())
			&& field_matches(self.signature.as_deref(), other.signature.as_deref())
			&& field_matches(self.payload.as_deref(), other.payload.as_deref())
			&& match (&self.predecessors, &other.predecessors) {
				(None, _) | (_, None) => true,
				(Some(a), Some(b)) => a.matches(b),
			} && count_matches(self.count, other.count)
	}
}

impl fmt::Display for InjectionPoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let count = if self.count < 0 {
			"#∞".to_string()
		} else {
			format!("#{}", self.count)
		};
		write!(
			f,
			"{}:{}{}{}{}",
			self.destination.as_deref().unwrap_or("*"),
			self.signature.as_deref().unwrap_or("*"),
			payload_suffix(self.payload.as_deref()),
			self
				.predecessors
				.as_ref()
				.map(|p| p.to_string())
				.unwrap_or_default(),
			count
		)
	}
}

/// Ordered stack of injection points describing a call's path from the
/// top-level initiator down to itself. An absent stack is a full wildcard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultUid {
	#[serde(default)]
	pub stack: Option<Vec<InjectionPoint>>,
}

impl Default for FaultUid {
	fn default() -> Self {
		FaultUid { stack: None }
	}
}

impl FaultUid {
	/// Matches any call.
	pub fn any() -> FaultUid {
		FaultUid { stack: None }
	}

	/// The empty ancestry, used as the parent of initial calls and as the
	/// degraded identity when the controller is unreachable.
	pub fn root() -> FaultUid {
		FaultUid {
			stack: Some(Vec::new()),
		}
	}

	pub fn parent(&self) -> FaultUid {
		match &self.stack {
			Some(stack) if !stack.is_empty() => FaultUid {
				stack: Some(stack[..stack.len() - 1].to_vec()),
			},
			_ => FaultUid::any(),
		}
	}

	pub fn point(&self) -> Option<&InjectionPoint> {
		self.stack.as_ref().and_then(|s| s.last())
	}

	fn is_any(&self) -> bool {
		match &self.stack {
			None => true,
			Some(stack) => stack.len() == 1 && stack[0].is_any(),
		}
	}

	pub fn matches(&self, other: &FaultUid) -> bool {
		let (a, b) = match (&self.stack, &other.stack) {
			(None, _) | (_, None) => return true,
			(Some(a), Some(b)) => (a, b),
		};
		if self.is_any() || other.is_any() {
			return true;
		}
		if a.len() != b.len() {
			return false;
		}
		// A wildcard origin leaves only the call itself to compare.
		let any_origin = a.first().is_some_and(InjectionPoint::is_any)
			|| b.first().is_some_and(InjectionPoint::is_any);
		if any_origin {
			return match (a.last(), b.last()) {
				(Some(pa), Some(pb)) => pa.matches(pb),
				_ => true,
			};
		}
		a.iter().zip(b.iter()).all(|(pa, pb)| pa.matches(pb))
	}
}

impl fmt::Display for FaultUid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let Some(stack) = &self.stack else {
			return write!(f, "*");
		};
		let joined = stack
			.iter()
			.map(|p| p.to_string())
			.collect::<Vec<_>>()
			.join(">");
		write!(f, "{joined}")
	}
}

/// Extend a parent identity with one more injection point.
pub fn build_fault_uid(
	parent: &FaultUid,
	partial: &PartialInjectionPoint,
	predecessors: Option<Predecessors>,
	count: i64,
) -> FaultUid {
	let mut stack = parent.stack.clone().unwrap_or_default();
	stack.push(InjectionPoint {
		destination: Some(partial.destination.clone()),
		signature: Some(partial.signature.clone()),
		payload: partial.payload.clone(),
		predecessors,
		count,
	});
	FaultUid { stack: Some(stack) }
}

#[cfg(test)]
#[path = "uid_test.rs"]
mod tests;
