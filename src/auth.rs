use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::User,
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` to act as a user without a token.
pub const LOCAL_BYPASS_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of a session token. Signed with `AppConfig::auth_secret` (HS256).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id.
    pub sub: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// Identity
///
/// The resolved caller of a request. This is the value passed to the
/// visibility and ownership policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Identity {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

/// MaybeIdentity
///
/// Extractor for routes open to anonymous callers. Resolves to `None` when no
/// credentials were presented, and also when the presented credentials are
/// invalid, expired or name an unknown user: a stale session reads the
/// public view instead of failing.
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<Identity>);

impl MaybeIdentity {
    pub fn as_ref(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

/// issue_token
///
/// Signs a session token for `user_id` valid for `config.session_ttl_secs`.
/// A lifetime whose expiry does not fit the claim is a server error.
pub fn issue_token(config: &AppConfig, user_id: Uuid) -> Result<String, AppError> {
    let now = usize::try_from(chrono::Utc::now().timestamp().max(0)).unwrap_or_default();
    let exp = usize::try_from(config.session_ttl_secs)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or_else(|| {
            tracing::error!(ttl = config.session_ttl_secs, "session lifetime overflows the expiry claim");
            AppError::ServerError("failed to create session".to_string())
        })?;
    let claims = Claims { sub: user_id, iat: now, exp };
    let key = EncodingKey::from_secret(config.auth_secret.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| {
        tracing::error!(error = %e, "failed to sign session token");
        AppError::ServerError("failed to create session".to_string())
    })
}

/// resolve_identity
///
/// Shared resolution behind both extractors:
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing
///    user is accepted.
/// 2. Bearer token: decoded and validated (signature and expiry).
/// 3. The user named by the token is re-loaded so deleted users lose access.
///
/// Returns `Ok(None)` when the request carries no credentials at all.
async fn resolve_identity(
    parts: &Parts,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<Option<Identity>, AppError> {
    if config.env == Env::Local {
        let bypass_id = parts
            .headers
            .get(LOCAL_BYPASS_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok());
        if let Some(user_id) = bypass_id {
            if let Some(user) = repo.get_user(user_id).await? {
                return Ok(Some(user.into()));
            }
        }
    }

    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let decoding_key = DecodingKey::from_secret(config.auth_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
        AppError::Unauthorized
    })?;

    let user = repo
        .get_user(token_data.claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Some(user.into()))
}

/// Identity extractor for routes that require a signed-in caller.
/// Reuses an identity already placed in the request extensions by the auth
/// middleware; otherwise resolves it and rejects with 401 when no valid
/// credentials are presented.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_identity(parts, &repo, &config)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        match resolve_identity(parts, &repo, &config).await {
            Ok(identity) => Ok(MaybeIdentity(identity)),
            Err(AppError::Unauthorized) => {
                tracing::debug!("unusable credentials on a public route, continuing anonymously");
                Ok(MaybeIdentity(None))
            }
            Err(e) => Err(e),
        }
    }
}
