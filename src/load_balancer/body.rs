//! Response body that releases its target.
//!
//! The target is released once the body reaches end-of-stream, fails, or is
//! dropped (closed) early. The assignment is held in an `Option` and taken on
//! the first of those events, so the release fires exactly once however they
//! interleave.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::{Body, Bytes};
use hyper::body::{Body as HttpBody, Frame, SizeHint};

use crate::load_balancer::pool::Assignment;
use crate::load_balancer::target::Target;

/// Body of a dispatched response.
#[derive(Debug)]
pub struct ReleaseBody {
    inner: Body,
    assignment: Option<Assignment>,
}

impl ReleaseBody {
    pub(crate) fn new(inner: Body, assignment: Assignment) -> Self {
        let assignment = if inner.is_end_stream() {
            drop(assignment);
            None
        } else {
            Some(assignment)
        };
        Self { inner, assignment }
    }

    /// Target serving this response, until it has been released.
    pub fn target(&self) -> Option<&Target> {
        self.assignment.as_ref().map(Assignment::target)
    }

    pub fn is_released(&self) -> bool {
        self.assignment.is_none()
    }

    /// Stop reading and release the target now. Same as dropping the body.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        drop(self.assignment.take());
    }
}

impl HttpBody for ReleaseBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let frame = ready!(Pin::new(&mut this.inner).poll_frame(cx));

        match &frame {
            None | Some(Err(_)) => this.release(),
            Some(Ok(_)) if this.inner.is_end_stream() => this.release(),
            Some(Ok(_)) => {}
        }

        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::http::client::{BoxError, Transport};
    use crate::load_balancer::pool::Pool;
    use crate::load_balancer::target::TargetKey;
    use axum::http::{Request, Response};
    use futures_util::future::BoxFuture;
    use futures_util::stream;
    use std::sync::Arc;

    /// Streams the response body in three chunks.
    struct ChunkedTransport;

    impl Transport for ChunkedTransport {
        fn send(&self, _request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, BoxError>> {
            Box::pin(async {
                let chunks = stream::iter(vec![
                    Ok::<_, std::io::Error>(Bytes::from_static(b"one ")),
                    Ok(Bytes::from_static(b"two ")),
                    Ok(Bytes::from_static(b"three")),
                ]);
                Ok(Response::new(Body::from_stream(chunks)))
            })
        }
    }

    struct EmptyTransport;

    impl Transport for EmptyTransport {
        fn send(&self, _request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, BoxError>> {
            Box::pin(async { Ok(Response::new(Body::empty())) })
        }
    }

    fn pool(transport: Arc<dyn Transport>) -> Pool {
        let pool = Pool::new(&PoolConfig::default(), transport);
        pool.refresh(vec![Target::new(TargetKey::new("one", "111"), "1.1.1.1", 80)]);
        pool
    }

    fn request() -> Request<Bytes> {
        Request::builder().uri("/").body(Bytes::new()).unwrap()
    }

    #[tokio::test]
    async fn test_release_on_drain() {
        let pool = pool(Arc::new(ChunkedTransport));
        let response = pool.dispatch(&request()).await.unwrap();
        let body = response.into_body();
        assert_eq!(body.target().unwrap().key.name, "one");

        let bytes = axum::body::to_bytes(Body::new(body), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"one two three");

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.busy, 0);
        assert_eq!(snapshot.stats.released, 1);
    }

    #[tokio::test]
    async fn test_release_on_close_before_drain() {
        let pool = pool(Arc::new(ChunkedTransport));
        let response = pool.dispatch(&request()).await.unwrap();
        let body = response.into_body();
        assert!(!body.is_released());
        assert_eq!(pool.snapshot().busy, 1);

        body.close();
        let snapshot = pool.snapshot();
        assert_eq!(snapshot.busy, 0);
        assert_eq!(snapshot.stats.released, 1);
    }

    #[tokio::test]
    async fn test_drain_then_close_releases_once() {
        let pool = pool(Arc::new(ChunkedTransport));
        let mut body = pool.dispatch(&request()).await.unwrap().into_body();

        while let Some(frame) = std::future::poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)).await {
            frame.unwrap();
        }
        assert!(body.is_released());
        assert_eq!(pool.stats().released, 1);

        body.close();
        assert_eq!(pool.stats().released, 1);
    }

    #[tokio::test]
    async fn test_empty_body_releases_immediately() {
        let pool = pool(Arc::new(EmptyTransport));
        let response = pool.dispatch(&request()).await.unwrap();
        assert!(response.body().is_released());
        assert_eq!(pool.snapshot().busy, 0);
    }
}
