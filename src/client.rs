use std::time::Duration;

use ::http::uri::{PathAndQuery, Scheme};
use ::http::{HeaderName, HeaderValue, Uri, Version, header};
use anyhow::Context;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tracing::trace;

use crate::proxy::ProxyError;
use crate::{Body, Request, Response};

type LegacyClient = hyper_util::client::legacy::Client<HttpConnector, Body>;

// Hop-by-hop headers, removed before forwarding (RFC 7230 §6.1).
static HOP_HEADERS: [HeaderName; 9] = [
	header::CONNECTION,
	HeaderName::from_static("proxy-connection"),
	HeaderName::from_static("keep-alive"),
	header::PROXY_AUTHENTICATE,
	header::PROXY_AUTHORIZATION,
	header::TE,
	header::TRAILER,
	header::TRANSFER_ENCODING,
	header::UPGRADE,
];

/// The upstream transports. The inbound protocol major version selects which
/// one a request is forwarded over: HTTP/1.1 connections reuse a pooled
/// HTTP/1.1 client, HTTP/2 requests use a prior-knowledge h2c client.
pub struct Upstream {
	target: Uri,
	h1: LegacyClient,
	h2: LegacyClient,
}

impl Upstream {
	pub fn new(target: Uri) -> anyhow::Result<Upstream> {
		target
			.authority()
			.context("PROXY_TARGET must include a host")?;
		let mut connector = HttpConnector::new();
		connector.set_nodelay(true);
		let h1 = hyper_util::client::legacy::Client::builder(TokioExecutor::new())
			.pool_timer(TokioTimer::new())
			.pool_idle_timeout(Duration::from_secs(90))
			.pool_max_idle_per_host(1000)
			// clients on the other side may be case-sensitive about header names
			.http1_preserve_header_case(true)
			.build(connector.clone());
		let h2 = hyper_util::client::legacy::Client::builder(TokioExecutor::new())
			.pool_timer(TokioTimer::new())
			.pool_idle_timeout(Duration::from_secs(90))
			.timer(TokioTimer::new())
			.http2_only(true)
			.build(connector);
		Ok(Upstream { target, h1, h2 })
	}

	pub async fn call(&self, mut req: Request) -> Result<Response, ProxyError> {
		let use_h2 = req.version() == Version::HTTP_2;
		prepare_headers(&mut req, use_h2);
		self.rewrite_uri(&mut req)?;

		trace!(uri = %req.uri(), version = ?req.version(), "forwarding request");
		let mut resp = if use_h2 {
			self.h2.request(req).await
		} else {
			*req.version_mut() = Version::HTTP_11;
			self.h1.request(req).await
		}
		.map_err(ProxyError::UpstreamCallFailed)?;

		// Stop downstream content sniffing when the upstream says nothing.
		if !use_h2 && !resp.headers().contains_key(header::CONTENT_TYPE) {
			resp.headers_mut().insert(
				header::CONTENT_TYPE,
				HeaderValue::from_static("application/octet-stream"),
			);
		}
		Ok(resp.map(Body::new))
	}

	fn rewrite_uri(&self, req: &mut Request) -> Result<(), ProxyError> {
		let mut parts = std::mem::take(req.uri_mut()).into_parts();
		parts.scheme = Some(Scheme::HTTP);
		parts.authority = self.target.authority().cloned();
		if parts.path_and_query.is_none() {
			parts.path_and_query = Some(PathAndQuery::from_static("/"));
		}
		*req.uri_mut() = Uri::from_parts(parts)
			.map_err(|e| ProxyError::Processing(anyhow::anyhow!("invalid upstream uri: {e}")))?;
		Ok(())
	}
}

fn prepare_headers(req: &mut Request, use_h2: bool) {
	let te_trailers = req
		.headers()
		.get(header::TE)
		.and_then(|v| v.to_str().ok())
		.map(|v| v.contains("trailers"))
		.unwrap_or(false);
	for h in HOP_HEADERS.iter() {
		req.headers_mut().remove(h);
	}
	// gRPC requires `te: trailers` on the HTTP/2 leg.
	if te_trailers && use_h2 {
		req
			.headers_mut()
			.insert(header::TE, HeaderValue::from_static("trailers"));
	}
}
