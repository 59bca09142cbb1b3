use super::CallContext;
use crate::error::AuthError;
use futures::Stream;
use pin_project_lite::pin_project;
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

pin_project! {
    /// Inbound message stream of an authenticated streaming call.
    ///
    /// Holds the inner stream and the context established when the stream
    /// was opened. Messages are forwarded unchanged; every one of them is
    /// observed under the same [`CallContext`].
    pub struct AuthenticatedStream<S> {
        #[pin]
        inner: S,
        context: Arc<CallContext>,
    }
}

impl<S> AuthenticatedStream<S> {
    #[must_use]
    pub fn new(inner: S, context: Arc<CallContext>) -> Self {
        Self { inner, context }
    }

    /// Wrap the body of a gated request.
    ///
    /// # Errors
    ///
    /// `NotFound` if the request was not authenticated by the gate.
    pub fn from_request(request: http::Request<S>) -> Result<Self, AuthError> {
        let (parts, body) = request.into_parts();
        let context = parts
            .extensions
            .get::<CallContext>()
            .cloned()
            .ok_or_else(|| AuthError::not_found("could not find user associated with token"))?;
        Ok(Self::new(body, Arc::new(context)))
    }

    /// Same as [`Self::from_request`] for a decoded tonic streaming request.
    ///
    /// # Errors
    ///
    /// `NotFound` if the request was not authenticated by the gate.
    pub fn from_tonic(request: tonic::Request<S>) -> Result<Self, AuthError> {
        let context = request
            .extensions()
            .get::<CallContext>()
            .cloned()
            .ok_or_else(|| AuthError::not_found("could not find user associated with token"))?;
        Ok(Self::new(request.into_inner(), Arc::new(context)))
    }

    #[must_use]
    pub fn context(&self) -> &CallContext {
        &self.context
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Stream> Stream for AuthenticatedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::grpc::{AuthGate, AuthLayer, ExemptionSet, ResolvedIdentity, DEFAULT_EXEMPT_METHODS};
    use crate::store::{MemoryStore, UserStore};
    use crate::token::{SessionClaims, SigningAlgorithm, SigningConfig, TokenIssuer, TokenValidator};
    use anyhow::Result;
    use futures::{stream, StreamExt};
    use secrecy::SecretString;
    use std::convert::Infallible;
    use tokio::sync::Mutex;
    use tonic::body::BoxBody;
    use tower::{service_fn, Layer, ServiceExt};

    type Messages = Pin<Box<dyn Stream<Item = u32> + Send>>;

    async fn context(store: &MemoryStore, username: &str) -> Result<CallContext> {
        let user = store
            .find_by_username(username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("missing {username}"))?;
        let claims = SessionClaims {
            id: username.to_string(),
            exp: i64::MAX,
            orig_iat: 0,
        };
        Ok(CallContext::new(claims, ResolvedIdentity::new(user)))
    }

    #[tokio::test]
    async fn forwards_messages_unchanged() -> Result<()> {
        let store = MemoryStore::new();
        store.new_user_account("alice", "pw", "a@example.org").await?;
        let context = Arc::new(context(&store, "alice").await?);

        let wrapped = AuthenticatedStream::new(stream::iter(1..=3), context.clone());
        assert_eq!(wrapped.size_hint(), (3, Some(3)));
        assert_eq!(wrapped.context(), context.as_ref());
        assert_eq!(wrapped.collect::<Vec<_>>().await, vec![1, 2, 3]);
        Ok(())
    }

    #[tokio::test]
    async fn tonic_request_without_context_is_rejected() {
        let request = tonic::Request::new(stream::iter(0..1));
        let err = AuthenticatedStream::from_tonic(request).err();
        assert_eq!(err.map(|err| err.kind()), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn tonic_request_with_context_is_wrapped() -> Result<()> {
        let store = MemoryStore::new();
        store.new_user_account("alice", "pw", "a@example.org").await?;
        let mut request = tonic::Request::new(stream::iter(0..2));
        request
            .extensions_mut()
            .insert(context(&store, "alice").await?);

        let wrapped = AuthenticatedStream::from_tonic(request)?;
        assert_eq!(wrapped.context().username(), "alice");
        Ok(())
    }

    #[tokio::test]
    async fn identity_is_constant_for_the_stream_lifetime() -> Result<()> {
        let config = Arc::new(SigningConfig::new(
            SecretString::from("stream-test-key".to_string()),
            SigningAlgorithm::Hs512,
        ));
        let store = Arc::new(MemoryStore::new());
        store.new_user_account("alice", "pw", "a@example.org").await?;
        let gate = AuthGate::new(
            TokenValidator::new(config.clone()),
            store.clone(),
            ExemptionSet::new(DEFAULT_EXEMPT_METHODS)?,
        );
        let token = TokenIssuer::new(config).sign_session_token("alice")?;

        let observed: Arc<Mutex<Vec<(u32, String)>>> = Arc::default();
        let sink = observed.clone();
        let handler = service_fn(move |request: http::Request<Messages>| {
            let sink = sink.clone();
            async move {
                if let Ok(mut messages) = AuthenticatedStream::from_request(request) {
                    while let Some(message) = messages.next().await {
                        let user = messages.context().identity().username().to_string();
                        sink.lock().await.push((message, user));
                    }
                }
                Ok::<_, Infallible>(http::Response::new(tonic::codegen::empty_body()))
            }
        });

        let body: Messages = Box::pin(stream::iter(0..50));
        let request = http::Request::builder()
            .uri("/auth.TemporalAuth/Watch")
            .header(http::header::AUTHORIZATION, format!("Bearer {}", token.token))
            .body(body)?;
        let response: http::Response<BoxBody> = AuthLayer::new(Arc::new(gate))
            .layer(handler)
            .oneshot(request)
            .await?;
        assert!(response.headers().get("grpc-status").is_none());

        let observed = observed.lock().await;
        assert_eq!(observed.len(), 50);
        for (index, (message, user)) in observed.iter().enumerate() {
            assert_eq!(usize::try_from(*message).ok(), Some(index));
            assert_eq!(user, "alice");
        }
        Ok(())
    }
}
