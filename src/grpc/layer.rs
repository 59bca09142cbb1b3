//! Tower middleware that runs the [`AuthGate`] in front of every gRPC call.
//!
//! The gate runs on the HTTP/2 request before any message is decoded, so it
//! covers unary and streaming calls alike and a rejected call never reaches
//! its handler. On success the [`CallContext`] travels in the request
//! extensions, where tonic exposes it to the handler for the whole call.
//!
//! Each decision runs in a `grpc.auth` span that records `rpc.method`,
//! `auth.outcome` and, once resolved, `enduser.id`.

use super::{Admission, AuthGate, CallContext};
use http::header::AUTHORIZATION;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tonic::{body::BoxBody, codegen::BoxFuture};
use tower::{Layer, Service};
use tracing::{field, info_span, Instrument};

const REJECTED: &str = "rejected";

#[derive(Clone)]
pub struct AuthLayer {
    gate: Arc<AuthGate>,
}

impl AuthLayer {
    #[must_use]
    pub fn new(gate: Arc<AuthGate>) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    gate: Arc<AuthGate>,
}

impl<S, B> Service<http::Request<B>> for AuthService<S>
where
    S: Service<http::Request<B>, Response = http::Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<B>) -> Self::Future {
        // take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();

        Box::pin(async move {
            let method = request.uri().path().to_string();
            let authorization = request.headers().get(AUTHORIZATION).cloned();
            let span = info_span!(
                "grpc.auth",
                rpc.method = %method,
                auth.outcome = field::Empty,
                enduser.id = field::Empty
            );

            let admission = gate
                .authorize(&method, authorization.as_ref())
                .instrument(span.clone())
                .await;

            match admission {
                Ok(admission) => {
                    span.record("auth.outcome", admission.outcome());
                    if let Admission::Authenticated(context) = admission {
                        span.record("enduser.id", context.username());
                        request.extensions_mut().insert::<CallContext>(context);
                    }
                    inner.call(request).await
                }
                Err(err) => {
                    span.record("auth.outcome", REJECTED);
                    Ok(tonic::Status::from(err).into_http())
                }
            }
        })
    }
}
