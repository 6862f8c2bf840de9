use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::GitHubConfig;

const USER_AGENT: &str = concat!("mini-cms/", env!("CARGO_PKG_VERSION"));

/// ExternalProfile
///
/// What an identity provider tells us about the person who signed in.
/// Sign-in is refused when no email is available.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalProfile {
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// OAuthError
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("request to identity provider failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("identity provider rejected the sign-in: {0}")]
    Rejected(String),
}

// 1. IdentityProvider Contract
/// IdentityProvider
///
/// Abstract contract for an external OAuth identity provider. The HTTP
/// handlers only see this trait, so the GitHub client can be swapped for the
/// mock during tests.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to in order to start the sign-in.
    fn authorize_url(&self) -> String;

    /// Exchanges the authorization `code` handed back to the callback for the
    /// signed-in person's profile.
    async fn exchange_code(&self, code: &str) -> Result<ExternalProfile, OAuthError>;
}

// 2. The Real Implementation (GitHub)
/// GitHubProvider
///
/// GitHub OAuth app client. Talks to `{oauth_url}/access_token` and
/// `{api_url}/user`, falling back to `{api_url}/user/emails` when the public
/// profile hides the email address.
#[derive(Clone)]
pub struct GitHubProvider {
    client: reqwest::Client,
    config: GitHubConfig,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GitHubUser {
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl GitHubProvider {
    pub fn new(config: GitHubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn primary_email(&self, access_token: &str) -> Result<Option<String>, OAuthError> {
        let emails = self
            .client
            .get(format!("{}/user/emails", self.config.api_url))
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<GitHubEmail>>()
            .await?;

        Ok(emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email))
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn authorize_url(&self) -> String {
        format!(
            "{}/authorize?client_id={}&scope=read:user%20user:email",
            self.config.oauth_url, self.config.client_id
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalProfile, OAuthError> {
        // Step 1: authorization code -> access token.
        let token = self
            .client
            .post(format!("{}/access_token", self.config.oauth_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&serde_json::json!({
                "client_id": self.config.client_id,
                "client_secret": self.config.client_secret,
                "code": code,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<AccessTokenResponse>()
            .await?;

        let access_token = match token.access_token {
            Some(t) => t,
            None => {
                let reason = token
                    .error_description
                    .or(token.error)
                    .unwrap_or_else(|| "no access token returned".to_string());
                return Err(OAuthError::Rejected(reason));
            }
        };

        // Step 2: the user's public profile.
        let user = self
            .client
            .get(format!("{}/user", self.config.api_url))
            .bearer_auth(&access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json::<GitHubUser>()
            .await?;

        // Step 3: private email addresses, only when the profile has none.
        let email = match user.email {
            Some(email) => Some(email),
            None => self.primary_email(&access_token).await?,
        };

        Ok(ExternalProfile {
            email,
            name: user.name.or(Some(user.login)),
            image: user.avatar_url,
        })
    }
}

// 3. The Mock Implementation (For Tests)
/// MockIdentityProvider
///
/// Returns a fixed profile for any code, or fails when `should_fail` is set.
#[derive(Clone, Default)]
pub struct MockIdentityProvider {
    pub profile: ExternalProfile,
    pub should_fail: bool,
}

impl MockIdentityProvider {
    pub fn new(profile: ExternalProfile) -> Self {
        Self {
            profile,
            should_fail: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            profile: ExternalProfile::default(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn authorize_url(&self) -> String {
        "http://localhost:9000/login/oauth/authorize?client_id=mock".to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalProfile, OAuthError> {
        if self.should_fail || code.is_empty() {
            return Err(OAuthError::Rejected("mock provider refused the code".to_string()));
        }
        Ok(self.profile.clone())
    }
}

/// IdentityProviderState
///
/// Shared handle to the configured provider; `None` in `AppState` means
/// OAuth sign-in is disabled.
pub type IdentityProviderState = Arc<dyn IdentityProvider>;
