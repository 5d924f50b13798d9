mod capture;
mod inject;
mod pipeline;

use std::convert::Infallible;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::{Body, ProxyInputs, Response};

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
	#[error("upstream call failed: {0}")]
	UpstreamCallFailed(hyper_util::client::legacy::Error),
	#[error("processing failed: {0}")]
	Processing(anyhow::Error),
}

impl ProxyError {
	pub fn into_response(self) -> Response {
		let status = match self {
			ProxyError::UpstreamCallFailed(_) => ::http::StatusCode::BAD_GATEWAY,
			ProxyError::Processing(_) => ::http::StatusCode::INTERNAL_SERVER_ERROR,
		};
		::http::Response::builder()
			.status(status)
			.header(::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
			.body(Body::from(self.to_string()))
			.unwrap_or_else(|_| ::http::Response::new(Body::empty()))
	}
}

/// Accept loop for intercepted traffic. Serves HTTP/1.1 and HTTP/2 cleartext
/// on the same port; the connection builder keeps the original header name
/// casing so trace headers can be re-emitted verbatim.
pub async fn serve(pi: Arc<ProxyInputs>) -> anyhow::Result<()> {
	let listener = TcpListener::bind(&pi.cfg.host).await?;
	info!(addr = %pi.cfg.host, target = %pi.cfg.target, "proxy listening");
	serve_listener(listener, pi).await
}

pub async fn serve_listener(listener: TcpListener, pi: Arc<ProxyInputs>) -> anyhow::Result<()> {
	loop {
		let (stream, peer) = listener.accept().await?;
		let pi = pi.clone();
		tokio::spawn(async move {
			let mut builder = auto::Builder::new(TokioExecutor::new());
			builder.http1().preserve_header_case(true);
			let service = service_fn(move |req| {
				let pi = pi.clone();
				async move { Ok::<_, Infallible>(pipeline::handle(pi, req).await) }
			});
			if let Err(e) = builder
				.serve_connection(TokioIo::new(stream), service)
				.await
			{
				debug!(%peer, "connection closed: {e}");
			}
		});
	}
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
