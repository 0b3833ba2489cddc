//! Outbound request rewriting.
//!
//! # Responsibilities
//! - Point a caller's request at an assigned target
//! - Preserve method, path, query, version and headers
//!
//! # Design Decisions
//! - The caller's request is borrowed, never modified; a fresh request is built
//! - Headers are deep-copied and `Host` is set to the target authority

use axum::body::Body;
use axum::http::{
    header::{HeaderValue, HOST},
    uri::{PathAndQuery, Scheme},
    Request, Uri,
};

use crate::load_balancer::target::Target;

/// Build the request forwarded to `target`.
pub fn rewrite_request<B>(request: &Request<B>, target: &Target) -> Result<Request<Body>, axum::http::Error>
where
    B: Clone + Into<Body>,
{
    let authority = target.authority();
    let path_and_query = request
        .uri()
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    let uri = Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()?;
    let host = HeaderValue::from_str(&authority)?;

    let mut builder = Request::builder()
        .method(request.method().clone())
        .version(request.version())
        .uri(uri);

    if let Some(headers) = builder.headers_mut() {
        *headers = request.headers().clone();
        headers.insert(HOST, host);
    }

    builder.body(request.body().clone().into())
}
