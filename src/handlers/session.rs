//! Sign-in flows and the current user.
//!
//! Two ways to obtain a session: email and password (`/auth/register` then
//! `/auth/login`), or GitHub OAuth (`/auth/github` then the callback). Both
//! end in the same `SessionResponse`.

use axum::{extract::State, http::StatusCode, response::Redirect};
use serde::Deserialize;

use crate::{
    AppState,
    extract::{Json, Query},
    auth::{Identity, issue_token},
    error::{AppError, ErrorBody},
    models::{LoginRequest, NewUser, RegisterUserRequest, SessionResponse, User},
    password,
};

/// CallbackParams
///
/// Query string GitHub appends when redirecting back after sign-in.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct CallbackParams {
    /// Authorization code to exchange for an access token.
    pub code: String,
}

/// register_user
///
/// [Public Route] Creates a credentials user. The password is stored as an
/// argon2 hash; an email already in use answers 409.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid email or password", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    payload.validate().map_err(AppError::BadRequest)?;

    if state.repo.get_user_by_email(&payload.email).await?.is_some() {
        return Err(AppError::Conflict("email already registered".to_string()));
    }

    let password_hash = password::hash_password_blocking(payload.password).await.map_err(|e| {
        tracing::error!(error = %e, "password hashing failed");
        AppError::ServerError("failed to register user".to_string())
    })?;

    // A concurrent registration can still win the race to the unique index.
    let user = match state
        .repo
        .create_user(NewUser {
            email: payload.email,
            name: payload.name,
            image: None,
            password_hash: Some(password_hash),
        })
        .await
    {
        Ok(user) => user,
        Err(e) if e.is_unique_violation() => {
            return Err(AppError::Conflict("email already registered".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// login
///
/// [Public Route] Exchanges email and password for a session token. Unknown
/// emails, wrong passwords and GitHub-only accounts all answer 401.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Bad credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = state
        .repo
        .get_user_by_email(&payload.email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let Some(hash) = user.password_hash.clone() else {
        return Err(AppError::Unauthorized);
    };

    let valid = password::verify_password_blocking(payload.password, hash).await.map_err(|e| {
        tracing::error!(user_id = %user.id, error = %e, "stored password hash is unreadable");
        AppError::ServerError("failed to verify credentials".to_string())
    })?;
    if !valid {
        tracing::warn!(user_id = %user.id, "rejected password sign-in");
        return Err(AppError::Unauthorized);
    }

    let token = issue_token(&state.config, user.id)?;
    Ok(Json(SessionResponse { token, user }))
}

/// github_redirect
///
/// [Public Route] Sends the browser to GitHub's authorize page. Answers 404
/// when no GitHub app is configured.
#[utoipa::path(
    get,
    path = "/auth/github",
    responses(
        (status = 303, description = "Redirect to the provider"),
        (status = 404, description = "GitHub sign-in not configured", body = ErrorBody)
    )
)]
pub async fn github_redirect(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let provider = state.oauth.as_ref().ok_or(AppError::NotFound)?;
    Ok(Redirect::to(&provider.authorize_url()))
}

/// github_callback
///
/// [Public Route] Completes GitHub sign-in. The user is upserted by email,
/// refreshing name and image from the provider profile.
#[utoipa::path(
    get,
    path = "/auth/github/callback",
    params(CallbackParams),
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Provider refused the sign-in", body = ErrorBody),
        (status = 404, description = "GitHub sign-in not configured", body = ErrorBody)
    )
)]
pub async fn github_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<SessionResponse>, AppError> {
    let provider = state.oauth.as_ref().ok_or(AppError::NotFound)?;

    let profile = provider.exchange_code(&params.code).await.map_err(|e| {
        tracing::warn!(error = %e, "oauth code exchange failed");
        AppError::Unauthorized
    })?;

    let Some(email) = profile.email else {
        tracing::warn!("oauth profile has no email address");
        return Err(AppError::Unauthorized);
    };

    let user = state
        .repo
        .upsert_user(NewUser {
            email,
            name: profile.name,
            image: profile.image,
            password_hash: None,
        })
        .await?;

    tracing::info!(user_id = %user.id, "github sign-in");
    let token = issue_token(&state.config, user.id)?;
    Ok(Json(SessionResponse { token, user }))
}

/// get_me
///
/// [Authenticated Route] The signed-in user's profile.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 401, description = "No session", body = ErrorBody)
    )
)]
pub async fn get_me(identity: Identity, State(state): State<AppState>) -> Result<Json<User>, AppError> {
    state
        .repo
        .get_user(identity.id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}
