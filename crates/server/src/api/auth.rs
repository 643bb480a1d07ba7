use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::extract::Json;
use super::AppState;
use super::schemas::{
    ErrorResponse, LoginRequest, MeResponse, OkResponse, RefreshRequest, RegisterRequest,
};
use crate::auth::AuthSession;
use crate::auth::identity::AuthUser;
use crate::error::ServerError;

/// `POST /auth/register` -- create an account and receive a token pair.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    summary = "Register",
    request_body(content = RegisterRequest, description = "New account credentials"),
    responses(
        (status = 201, description = "Account created", body = AuthSession),
        (status = 400, description = "Invalid input or email already in use", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let session = state.auth.register(&body.email, &body.password).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /auth/login` -- authenticate with email/password and receive a token pair.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    summary = "Login",
    request_body(content = LoginRequest, description = "Login credentials"),
    responses(
        (status = 201, description = "Login successful", body = AuthSession),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let session = state.auth.login(&body.email, &body.password).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /auth/refresh` -- rotate the token pair.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    summary = "Refresh tokens",
    request_body(content = RefreshRequest, description = "The last issued refresh token"),
    responses(
        (status = 201, description = "New token pair", body = AuthSession),
        (status = 401, description = "Invalid refresh", body = ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let session = state.auth.refresh(&body.refresh_token).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /auth/logout` -- revoke the stored refresh token.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    summary = "Logout",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Logged out", body = OkResponse),
        (status = 401, description = "Invalid or missing token", body = ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ServerError> {
    state.auth.logout(&user).await?;
    Ok((StatusCode::CREATED, Json(OkResponse::ok())))
}

/// `GET /auth/me` -- the authenticated account.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    summary = "Current user",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The caller's account", body = MeResponse),
        (status = 401, description = "Invalid or missing token", body = ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>, ServerError> {
    Ok(Json(MeResponse {
        user: state.auth.me(&user).await?,
    }))
}
