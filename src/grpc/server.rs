//! The `auth.TemporalAuth` gRPC service.
//!
//! Registered by hand on top of tonic's server plumbing: each method path is
//! matched, its request decoded with the prost codec and dispatched to the
//! [`AccountService`]. Protected handlers pull the [`CallContext`] the gate put
//! in the request extensions and pass it down explicitly.

use super::CallContext;
use super::messages::{
    update_req, Credentials, Empty, RecoverReq, RecoverType, RegisterReq, Token, UpdateReq, User,
};
use crate::account::{AccountService, AccountUpdate, RecoveryKind};
use crate::error::AuthError;
use std::{
    convert::Infallible,
    future::Future,
    sync::Arc,
    task::{Context, Poll},
};
use tonic::{
    body::BoxBody,
    codec::ProstCodec,
    codegen::{Body, BoxFuture, Service, StdError},
    server::{Grpc, NamedService, UnaryService},
    Status,
};

pub const SERVICE_NAME: &str = "auth.TemporalAuth";

/// Adapts an async closure to tonic's [`UnaryService`].
struct Unary<F>(F);

impl<Req, Res, F, Fut> UnaryService<Req> for Unary<F>
where
    F: FnMut(tonic::Request<Req>) -> Fut,
    Fut: Future<Output = Result<tonic::Response<Res>, Status>> + Send + 'static,
{
    type Response = Res;
    type Future = BoxFuture<tonic::Response<Res>, Status>;

    fn call(&mut self, request: tonic::Request<Req>) -> Self::Future {
        Box::pin((self.0)(request))
    }
}

fn unary<Req, Res, F, Fut, B>(
    request: http::Request<B>,
    handler: F,
) -> BoxFuture<http::Response<BoxBody>, Infallible>
where
    Req: prost::Message + Default + Send + 'static,
    Res: prost::Message + Send + 'static,
    F: FnMut(tonic::Request<Req>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<tonic::Response<Res>, Status>> + Send + 'static,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    Box::pin(async move {
        let mut grpc = Grpc::new(ProstCodec::<Res, Req>::default());
        Ok(grpc.unary(Unary(handler), request).await)
    })
}

fn call_context<T>(request: &tonic::Request<T>) -> Result<CallContext, Status> {
    request
        .extensions()
        .get::<CallContext>()
        .cloned()
        .ok_or_else(|| AuthError::not_found("could not find user associated with token").into())
}

#[derive(Clone)]
pub struct AccountServer {
    service: Arc<AccountService>,
}

impl AccountServer {
    #[must_use]
    pub fn new(service: Arc<AccountService>) -> Self {
        Self { service }
    }
}

impl NamedService for AccountServer {
    const NAME: &'static str = SERVICE_NAME;
}

impl<B> Service<http::Request<B>> for AccountServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        let service = self.service.clone();
        match request.uri().path() {
            "/auth.TemporalAuth/Register" => unary(request, move |req: tonic::Request<RegisterReq>| {
                let service = service.clone();
                async move {
                    let req = req.into_inner();
                    let credentials = req.credentials.unwrap_or_default();
                    let view = service
                        .register(
                            &req.email_address,
                            &credentials.username,
                            &credentials.password,
                        )
                        .await?;
                    Ok::<_, Status>(tonic::Response::new(User::from(view)))
                }
            }),
            "/auth.TemporalAuth/Login" => unary(request, move |req: tonic::Request<Credentials>| {
                let service = service.clone();
                async move {
                    let req = req.into_inner();
                    let token = service.login(&req.username, &req.password).await?;
                    Ok::<_, Status>(tonic::Response::new(Token::from(token)))
                }
            }),
            "/auth.TemporalAuth/Recover" => unary(request, move |req: tonic::Request<RecoverReq>| {
                let service = service.clone();
                async move {
                    let req = req.into_inner();
                    let kind = match RecoverType::try_from(req.r#type) {
                        Ok(RecoverType::Password) => RecoveryKind::Password,
                        Ok(RecoverType::Username) => RecoveryKind::Username,
                        Err(_) => {
                            return Err(AuthError::malformed(format!(
                                "unsupported recovery type {}",
                                req.r#type
                            ))
                            .into());
                        }
                    };
                    service.recover(&req.email_address, kind).await?;
                    Ok::<_, Status>(tonic::Response::new(Empty {}))
                }
            }),
            "/auth.TemporalAuth/Account" => unary(request, move |req: tonic::Request<Empty>| {
                let service = service.clone();
                async move {
                    let context = call_context(&req)?;
                    let view = service.account(&context).await?;
                    Ok::<_, Status>(tonic::Response::new(User::from(view)))
                }
            }),
            "/auth.TemporalAuth/Update" => unary(request, move |req: tonic::Request<UpdateReq>| {
                let service = service.clone();
                async move {
                    let context = call_context(&req)?;
                    let update = match req.into_inner().update {
                        Some(update_req::Update::PasswordChange(change)) => {
                            AccountUpdate::PasswordChange {
                                old_password: change.old_password,
                                new_password: change.new_password,
                            }
                        }
                        Some(update_req::Update::DataTierChange(_)) => AccountUpdate::TierChange,
                        None => {
                            return Err(AuthError::malformed("update type is not supported").into());
                        }
                    };
                    let view = service.update(&context, update).await?;
                    Ok::<_, Status>(tonic::Response::new(User::from(view)))
                }
            }),
            "/auth.TemporalAuth/Refresh" => unary(request, move |req: tonic::Request<Empty>| {
                let service = service.clone();
                async move {
                    let context = call_context(&req)?;
                    let token = service.refresh(&context)?;
                    Ok::<_, Status>(tonic::Response::new(Token::from(token)))
                }
            }),
            _ => Box::pin(async move {
                Ok(Status::unimplemented("unknown method").into_http())
            }),
        }
    }
}
