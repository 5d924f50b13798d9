use ::http::{HeaderMap, HeaderValue, StatusCode, header};
use bytes::Bytes;
use fault_core::grpc;
use fault_core::ident::GRPC_CONTENT_TYPE;

use super::capture::Captured;

const HTTP_FAULT_BODY: &str = "Injected fault: HTTP error\n";
const GRPC_FAULT_MESSAGE: &str = "Injected fault: GRPC HTTP error";

/// Synthesize the error response for an injected HTTP_ERROR or
/// OMISSION_ERROR. gRPC calls get a trailers-only style response: HTTP 200
/// with the mapped `grpc-status` and a `grpc-message`.
pub fn error_response(status: u16, is_grpc: bool) -> Captured {
	let mut headers = HeaderMap::new();
	if is_grpc {
		headers.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static(GRPC_CONTENT_TYPE),
		);
		headers.insert(
			"grpc-status",
			HeaderValue::from_str(&grpc::to_grpc_status(status).to_string())
				.unwrap_or(HeaderValue::from_static("2")),
		);
		headers.insert(
			"grpc-message",
			HeaderValue::from_static(GRPC_FAULT_MESSAGE),
		);
		Captured {
			status: StatusCode::OK,
			headers,
			body: Bytes::new(),
			trailers: None,
		}
	} else {
		headers.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static("text/plain; charset=utf-8"),
		);
		Captured {
			status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
			headers,
			body: Bytes::from_static(HTTP_FAULT_BODY.as_bytes()),
			trailers: None,
		}
	}
}
