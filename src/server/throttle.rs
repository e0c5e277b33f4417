//! Per-client rate limiting middleware.
//!
//! Clients are identified by the peer IP address axum records when the server
//! is started with `into_make_service_with_connect_info::<SocketAddr>()`.
//! Without that information every request counts against the `"unknown"`
//! client.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::LimitError;
use crate::limit::RateLimiter;

/// Identity used when the peer address is not available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Middleware that rejects requests once the client's bucket is empty.
///
/// Use with `axum::middleware::from_fn_with_state`:
///
/// ```ignore
/// let router = Router::new()
///     .route("/upload", post(upload_handler))
///     .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
/// ```
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, LimitError> {
    let client = client_identity(&request);
    limiter.check(&client).await?;

    Ok(next.run(request).await)
}

/// The rate limiting identity of a request: its peer IP address.
pub fn client_identity(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
