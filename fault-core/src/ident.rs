use std::collections::BTreeMap;

use http::request::Parts;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::uid::PartialInjectionPoint;

static ALL_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("static regex"));
static UUID_V4: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^[a-fA-F0-9]{8}-[a-fA-F0-9]{4}-4[a-fA-F0-9]{3}-[89aAbB][a-fA-F0-9]{3}-[a-fA-F0-9]{12}$")
		.expect("static regex")
});

pub const GRPC_CONTENT_TYPE: &str = "application/grpc";

pub fn is_grpc(parts: &Parts) -> bool {
	parts
		.headers
		.get(http::header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.map(|v| v == GRPC_CONTENT_TYPE)
		.unwrap_or(false)
}

/// Derive the proxy-computable part of the call identity. The body must have
/// been drained into `body` by the caller (and restored for the upstream).
pub fn partial_point_from_request(
	parts: &Parts,
	body: &[u8],
	destination: &str,
	grpc_path_prefix: &str,
	mask_payload: bool,
) -> PartialInjectionPoint {
	let signature = call_signature(parts, grpc_path_prefix);
	let payload = if mask_payload {
		None
	} else {
		Some(payload_hash(body, parts.uri.query()))
	};
	PartialInjectionPoint {
		destination: destination.to_string(),
		signature,
		payload,
	}
}

/// The protocol-normalized request shape: `METHOD path` for HTTP with
/// identifier-like segments collapsed, or the rpc path for gRPC.
pub fn call_signature(parts: &Parts, grpc_path_prefix: &str) -> String {
	let path = parts.uri.path();
	if is_grpc(parts) {
		// https://github.com/grpc/grpc/blob/master/doc/PROTOCOL-HTTP2.md
		path.strip_prefix(grpc_path_prefix).unwrap_or(path).to_string()
	} else {
		format!("{} {}", parts.method, normalize_path(path))
	}
}

fn normalize_path(path: &str) -> String {
	path
		.split('/')
		.map(|segment| {
			if ALL_DIGITS.is_match(segment) {
				"[id]"
			} else if UUID_V4.is_match(segment) {
				"[uuid]"
			} else {
				segment
			}
		})
		.collect::<Vec<_>>()
		.join("/")
}

/// Hex SHA-256 over the request body concatenated with a canonicalized form
/// of the query string. Keys are sorted ascending, per-key values sorted
/// ascending, rendered `k=v1v2…` with no separators, so the fingerprint is
/// stable across replays regardless of parameter order. Empty input hashes
/// to the empty string.
pub fn payload_hash(body: &[u8], query: Option<&str>) -> String {
	let mut payload = body.to_vec();

	if let Some(query) = query.filter(|q| !q.is_empty()) {
		let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
		for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
			grouped.entry(k.into_owned()).or_default().push(v.into_owned());
		}
		for (key, mut values) in grouped {
			values.sort();
			payload.extend_from_slice(key.as_bytes());
			payload.extend_from_slice(b"=");
			for value in values {
				payload.extend_from_slice(value.as_bytes());
			}
		}
	}

	if payload.is_empty() {
		return String::new();
	}

	hex::encode(Sha256::digest(&payload))
}
