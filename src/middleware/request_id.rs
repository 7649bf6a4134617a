//! Request-id middleware.
//!
//! Accepts an inbound id from a configurable header list or generates one,
//! exposes it to handlers via request extensions, stamps it on the response,
//! and logs request completion with the id attached.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::Request, http::HeaderValue, response::Response};
use tower::{Layer, Service};

/// Extension type carrying the id for the current request
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

fn generate_request_id(path: &str) -> String {
    let prefix = if path.contains("/chat") {
        "chat-"
    } else if path.contains("/api/mcp") {
        "mcp-"
    } else {
        "req-"
    };

    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let random_part: String = (0..24)
        .map(|_| CHARS[rand::random::<u32>() as usize % CHARS.len()] as char)
        .collect();

    format!("{}{}", prefix, random_part)
}

#[derive(Clone)]
pub struct RequestIdLayer {
    headers: Arc<Vec<String>>,
}

impl RequestIdLayer {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers: Arc::new(headers),
        }
    }

    pub fn default_headers() -> Vec<String> {
        vec![
            "x-request-id".to_string(),
            "x-correlation-id".to_string(),
            "x-trace-id".to_string(),
            "request-id".to_string(),
        ]
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdMiddleware {
            inner,
            headers: self.headers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequestIdMiddleware<S> {
    inner: S,
    headers: Arc<Vec<String>>,
}

impl<S> Service<Request> for RequestIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let request_id = self
            .headers
            .iter()
            .find_map(|name| req.headers().get(name))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
            .unwrap_or_else(|| generate_request_id(req.uri().path()));

        req.extensions_mut().insert(RequestId(request_id.clone()));

        let method = req.method().clone();
        let uri = req.uri().clone();
        let future = self.inner.call(req);

        Box::pin(async move {
            let started = Instant::now();
            let mut response = future.await?;
            let latency = started.elapsed();
            let status = response.status();

            response.headers_mut().insert(
                "x-request-id",
                HeaderValue::from_str(&request_id)
                    .unwrap_or_else(|_| HeaderValue::from_static("invalid-request-id")),
            );

            if status.is_server_error() {
                tracing::error!(
                    target: "mcp_inspector::http",
                    %method, %uri, request_id = %request_id, status = %status, ?latency,
                    "request failed with server error"
                );
            } else if status.is_client_error() {
                tracing::warn!(
                    target: "mcp_inspector::http",
                    %method, %uri, request_id = %request_id, status = %status, ?latency,
                    "request failed with client error"
                );
            } else {
                tracing::info!(
                    target: "mcp_inspector::http",
                    %method, %uri, request_id = %request_id, status = %status, ?latency,
                    "request completed"
                );
            }

            Ok(response)
        })
    }
}
