//! Tower middleware that puts a [`Gate`] in front of any HTTP service.
//!
//! Blocked visitors get the gate's 403 response and never reach the inner
//! service. Everything else is forwarded untouched.

use crate::context::GateRequest;
use crate::gate::Gate;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{Request, Response};
use http_body_util::{Either, Full};
use std::task::{Context, Poll};
use tower::Layer;
use tower_service::Service;

/// Response body of a gated service: the gate's own body, or the inner one.
pub type GateBody<B> = Either<Full<Bytes>, B>;

/// Layer that wraps services in [`GateService`].
#[derive(Clone, Debug)]
pub struct GateLayer {
    gate: Gate,
}

impl GateLayer {
    pub fn new(gate: Gate) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for GateLayer {
    type Service = GateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Service produced by [`GateLayer`].
#[derive(Clone, Debug)]
pub struct GateService<S> {
    inner: S,
    gate: Gate,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for GateService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: 'static,
{
    type Response = Response<GateBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // The clone may not be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();

        Box::pin(async move {
            let gate_request = GateRequest::from_http(&request);
            let mut blocked = Response::new(Full::new(Bytes::new()));

            if let Some(body) = gate.handle(&gate_request, &mut blocked).await {
                *blocked.body_mut() = Full::new(Bytes::from_static(body.as_bytes()));
                return Ok(blocked.map(Either::Left));
            }

            let response = inner.call(request).await?;
            Ok(response.map(Either::Right))
        })
    }
}
