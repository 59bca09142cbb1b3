//! Email verification link target.

use crate::{challenge::ChallengeFlow, error::AuthError};
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyParams {
    /// Username the link was issued for.
    #[serde(default)]
    user: String,
    /// Challenge token from the link.
    #[serde(default)]
    token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct VerifyResponse {
    code: u16,
    response: String,
}

/// Redeem the challenge token carried by a verification link.
#[utoipa::path(
    get,
    path = "/v3/verify",
    params(VerifyParams),
    responses(
        (status = 200, description = "User verified", body = VerifyResponse),
        (status = 400, description = "Missing parameters, mismatched user or stale challenge"),
        (status = 401, description = "Token failed validation"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Store failure")
    ),
    tag = "verify"
)]
pub async fn verify(
    challenge: Extension<Arc<ChallengeFlow>>,
    Query(params): Query<VerifyParams>,
) -> Result<impl IntoResponse, AuthError> {
    challenge.redeem(&params.user, &params.token).await?;

    Ok((
        StatusCode::OK,
        Json(VerifyResponse {
            code: StatusCode::OK.as_u16(),
            response: "user verified".to_string(),
        }),
    ))
}
