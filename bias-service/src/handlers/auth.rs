use crate::dtos::{AuthResponse, LoginRequest, MeResponse, SignupRequest};
use crate::middleware::AuthUser;
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .identity
        .sign_up(&req.username, &req.email, &req.password)
        .await?;
    let token = state.tokens.issue(&user)?;

    tracing::info!(user_id = %user.id, "User signed up");

    Ok(Json(AuthResponse { user, token }))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.identity.sign_in(&req.email, &req.password).await?;
    let token = state.tokens.issue(&user)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse { user, token }))
}

pub async fn me(AuthUser(claims): AuthUser) -> impl IntoResponse {
    Json(MeResponse {
        user: claims.identity(),
    })
}
