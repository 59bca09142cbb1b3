//! HTTP surface: verification links, health and the `OpenAPI` document.

use crate::challenge::ChallengeFlow;
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::options,
    Extension, Router,
};
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Build the application router with request ids, tracing and the shared
/// challenge flow wired in.
#[must_use]
pub fn router(challenge: Arc<ChallengeFlow>) -> Router {
    let (router, openapi) = openapi::api_router().split_for_parts();

    router
        .route("/health", options(handlers::health::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", openapi))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(challenge)),
        )
}

/// Serve the HTTP surface until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve<F>(port: u16, challenge: Arc<ChallengeFlow>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("HTTP listening on [::]:{}", port);

    axum::serve(listener, router(challenge).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::{memory::MemoryStore, publisher::LogPublisher, UserStore},
        token::{SigningAlgorithm, SigningConfig, TokenIssuer, TokenValidator},
    };
    use axum::{
        body::to_bytes,
        http::{Method, StatusCode},
    };
    use secrecy::SecretString;
    use serde_json::Value;
    use tower::ServiceExt;

    fn signing_config() -> Arc<SigningConfig> {
        Arc::new(SigningConfig::new(
            SecretString::from("http-surface-signing-key".to_string()),
            SigningAlgorithm::Hs256,
        ))
    }

    fn flow(users: Arc<MemoryStore>) -> Arc<ChallengeFlow> {
        let config = signing_config();
        Arc::new(ChallengeFlow::new(
            TokenIssuer::new(config.clone()),
            TokenValidator::new(config),
            users,
            Arc::new(LogPublisher),
            "auth.example.com",
        ))
    }

    async fn call(app: Router, uri: &str) -> anyhow::Result<(StatusCode, Value)> {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty())?)
            .await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body)?
        };
        Ok((status, json))
    }

    #[tokio::test]
    async fn request_id_is_generated_and_propagated() -> anyhow::Result<()> {
        let app = router(flow(Arc::new(MemoryStore::new())));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(Ulid::from_string(request_id).is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn caller_request_id_is_kept() -> anyhow::Result<()> {
        let app = router(flow(Arc::new(MemoryStore::new())));
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/health")
                    .header("x-request-id", "trace-me")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(
            response.headers().get("x-request-id"),
            Some(&HeaderValue::from_static("trace-me"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_without_parameters_is_bad_request() -> anyhow::Result<()> {
        let app = router(flow(Arc::new(MemoryStore::new())));
        let (status, body) = call(app, "/v3/verify").await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert_eq!(body["response"], "parameters user, token cannot be empty");
        Ok(())
    }

    #[tokio::test]
    async fn verify_garbage_token_is_unauthorized() -> anyhow::Result<()> {
        let app = router(flow(Arc::new(MemoryStore::new())));
        let (status, body) = call(app, "/v3/verify?user=alice&token=not-a-token").await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["response"], "invalid token");
        Ok(())
    }

    #[tokio::test]
    async fn verify_link_activates_account_once() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        store
            .new_user_account("alice", "hunter2", "alice@example.com")
            .await?;
        let flow = flow(store.clone());
        flow.issue("alice").await?;

        let user = store.find_by_username("alice").await?;
        let challenge = user
            .and_then(|user| user.verification_value)
            .unwrap_or_default();
        let token = TokenIssuer::new(signing_config()).sign_challenge_token("alice", &challenge)?;

        let uri = format!("/v3/verify?user=alice&token={token}");
        let (status, body) = call(router(flow.clone()), &uri).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 200);
        assert_eq!(body["response"], "user verified");

        let verified = store.find_by_username("alice").await?;
        assert!(verified.is_some_and(|user| user.account_enabled && user.email_enabled));

        let (status, _) = call(router(flow), &uri).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn openapi_document_is_served() -> anyhow::Result<()> {
        let app = router(flow(Arc::new(MemoryStore::new())));
        let (status, body) = call(app, "/openapi.json").await?;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"].get("/v3/verify").is_some());
        Ok(())
    }
}
