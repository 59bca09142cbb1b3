//! Error kinds returned to callers of the RPC and HTTP surfaces.
//!
//! Every failure is classified by [`ErrorKind`] and compared by discriminant.
//! The message is what the caller sees; internal detail is logged at the point
//! of failure and never copied into it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt::Display;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedRequest,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Internal,
    FailedPrecondition,
    AlreadyExists,
}

impl ErrorKind {
    #[must_use]
    pub const fn grpc_code(self) -> tonic::Code {
        match self {
            Self::MalformedRequest => tonic::Code::InvalidArgument,
            Self::Unauthenticated => tonic::Code::Unauthenticated,
            Self::PermissionDenied => tonic::Code::PermissionDenied,
            Self::NotFound => tonic::Code::NotFound,
            Self::Internal => tonic::Code::Internal,
            Self::FailedPrecondition => tonic::Code::FailedPrecondition,
            Self::AlreadyExists => tonic::Code::AlreadyExists,
        }
    }

    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::MalformedRequest => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
            Self::AlreadyExists => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    kind: ErrorKind,
    message: String,
}

impl AuthError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedRequest, message)
    }

    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FailedPrecondition, message)
    }

    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    /// Log `cause` with the user and operation, then return a generic internal error.
    #[must_use]
    pub fn internal(
        user: &str,
        operation: &'static str,
        cause: impl Display,
        message: &str,
    ) -> Self {
        error!(user, operation, error = %cause, "{message}");
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<AuthError> for tonic::Status {
    fn from(err: AuthError) -> Self {
        Self::new(err.kind.grpc_code(), err.message)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.kind.http_status();
        let body = Json(json!({
            "code": status.as_u16(),
            "response": self.message,
        }));
        (status, body).into_response()
    }
}
