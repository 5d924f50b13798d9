use std::convert::Infallible;

use ::http::{HeaderMap, StatusCode, header};
use bytes::Bytes;
use fault_core::grpc;
use fault_core::ident::GRPC_CONTENT_TYPE;
use fault_core::report::ResponseData;
use http_body::Frame;
use http_body_util::StreamBody;
use sha2::{Digest, Sha256};

use crate::{Body, Response};

/// A fully captured response: what will be reported to the controller and
/// then replayed to the client, trailers included.
pub struct Captured {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
	pub trailers: Option<HeaderMap>,
}

impl Captured {
	/// Fold the capture into report form. A non-zero gRPC status replaces the
	/// HTTP status (via the reverse map) and the body with the gRPC message.
	pub fn response_data(&self, hash_body: bool) -> ResponseData {
		let mut status = self.status.as_u16();
		let mut body;
		let is_grpc = self
			.header_str(&self.headers, header::CONTENT_TYPE.as_str())
			.map(|v| v == GRPC_CONTENT_TYPE)
			.unwrap_or(false);

		if is_grpc {
			body = String::new();
			if let Some(code) = self.grpc_status().filter(|&code| code != 0) {
				body = self.find_str("grpc-message").unwrap_or_default().to_string();
				status = grpc::to_http_status(code);
			}
		} else {
			body = String::from_utf8_lossy(&self.body).into_owned();
		}

		if hash_body && !body.is_empty() {
			body = hex::encode(Sha256::digest(body.as_bytes()));
		}

		ResponseData {
			status,
			body,
			duration_ms: 0.0,
			overhead_duration_ms: 0.0,
		}
	}

	/// The gRPC status code, from the response headers or trailers.
	pub fn grpc_status(&self) -> Option<u32> {
		self.find_str("grpc-status").and_then(|v| v.parse().ok())
	}

	fn find_str(&self, name: &str) -> Option<&str> {
		self
			.header_str(&self.headers, name)
			.or_else(|| self.trailers.as_ref().and_then(|t| self.header_str(t, name)))
	}

	fn header_str<'a>(&self, headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
		headers.get(name).and_then(|v| v.to_str().ok())
	}

	/// Replay the capture to the client, re-emitting any trailers.
	pub fn into_response(self) -> Response {
		let mut builder = ::http::Response::builder().status(self.status);
		if let Some(headers) = builder.headers_mut() {
			*headers = self.headers;
		}
		let mut frames: Vec<Result<Frame<Bytes>, Infallible>> = Vec::new();
		if !self.body.is_empty() {
			frames.push(Ok(Frame::data(self.body)));
		}
		if let Some(trailers) = self.trailers {
			frames.push(Ok(Frame::trailers(trailers)));
		}
		let body = Body::new(StreamBody::new(futures_util::stream::iter(frames)));
		builder
			.body(body)
			.unwrap_or_else(|_| ::http::Response::new(Body::empty()))
	}
}

#[cfg(test)]
mod tests {
	use ::http::HeaderValue;

	use super::*;

	fn grpc_captured(status: &str, message: &str, in_trailers: bool) -> Captured {
		let mut headers = HeaderMap::new();
		headers.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static(GRPC_CONTENT_TYPE),
		);
		let mut carrier = HeaderMap::new();
		carrier.insert("grpc-status", HeaderValue::from_str(status).unwrap());
		carrier.insert("grpc-message", HeaderValue::from_str(message).unwrap());
		if in_trailers {
			Captured {
				status: StatusCode::OK,
				headers,
				body: Bytes::new(),
				trailers: Some(carrier),
			}
		} else {
			headers.extend(carrier);
			Captured {
				status: StatusCode::OK,
				headers,
				body: Bytes::new(),
				trailers: None,
			}
		}
	}

	#[test]
	fn grpc_status_in_headers_maps_back_to_http() {
		let data = grpc_captured("14", "unavailable", false).response_data(false);
		assert_eq!(data.status, 503);
		assert_eq!(data.body, "unavailable");
	}

	#[test]
	fn grpc_status_in_trailers_is_found() {
		let data = grpc_captured("4", "deadline", true).response_data(false);
		assert_eq!(data.status, 504);
		assert_eq!(data.body, "deadline");
	}

	#[test]
	fn grpc_ok_keeps_http_status() {
		let data = grpc_captured("0", "", false).response_data(false);
		assert_eq!(data.status, 200);
		assert_eq!(data.body, "");
	}

	#[test]
	fn plain_body_is_reported_verbatim() {
		let captured = Captured {
			status: StatusCode::CREATED,
			headers: HeaderMap::new(),
			body: Bytes::from_static(b"hello"),
			trailers: None,
		};
		let data = captured.response_data(false);
		assert_eq!(data.status, 201);
		assert_eq!(data.body, "hello");
	}

	#[test]
	fn hashed_body_is_sha256_hex() {
		let captured = Captured {
			status: StatusCode::OK,
			headers: HeaderMap::new(),
			body: Bytes::from_static(b"hello"),
			trailers: None,
		};
		let data = captured.response_data(true);
		assert_eq!(
			data.body,
			"2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
		);
	}

	#[test]
	fn empty_body_is_not_hashed() {
		let captured = Captured {
			status: StatusCode::NO_CONTENT,
			headers: HeaderMap::new(),
			body: Bytes::new(),
			trailers: None,
		};
		assert_eq!(captured.response_data(true).body, "");
	}
}
