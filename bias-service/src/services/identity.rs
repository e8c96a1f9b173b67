//! External identity provider used for signup and password login.

use crate::models::UserIdentity;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;

/// Username reported when the provider has none on record.
pub const DEFAULT_USERNAME: &str = "User";

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a user. Provider rejections surface as `BadRequest`.
    async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserIdentity, AppError>;

    /// Password login. Any failure surfaces as `InvalidCredentials`.
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity, AppError>;
}

/// Supabase GoTrue over its REST API.
pub struct SupabaseIdentityProvider {
    client: Client,
    base_url: String,
    anon_key: Secret<String>,
}

impl SupabaseIdentityProvider {
    pub fn new(base_url: &str, anon_key: Secret<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<serde_json::Value>,
}

impl GoTrueUser {
    fn into_identity(self, fallback_email: &str, fallback_username: &str) -> UserIdentity {
        let username = self
            .user_metadata
            .as_ref()
            .and_then(|m| m.get("username"))
            .and_then(|u| u.as_str())
            .filter(|u| !u.is_empty())
            .unwrap_or(fallback_username)
            .to_string();

        UserIdentity {
            id: self.id,
            username,
            email: self.email.unwrap_or_else(|| fallback_email.to_string()),
        }
    }
}

/// Signup responses carry the user either at the top level or under `user`
/// depending on whether email confirmation is enabled.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignupResponse {
    Session { user: GoTrueUser },
    User(GoTrueUser),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    user: GoTrueUser,
}

#[derive(Debug, Deserialize)]
struct GoTrueError {
    #[serde(default, alias = "error_description", alias = "message")]
    msg: Option<String>,
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserIdentity, AppError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", self.anon_key.expose_secret())
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "username": username },
            }))
            .send()
            .await
            .map_err(|e| AppError::UpstreamFailure(anyhow::anyhow!("Identity provider unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<GoTrueError>()
                .await
                .ok()
                .and_then(|e| e.msg)
                .unwrap_or_else(|| format!("Signup rejected ({})", status));
            tracing::info!(status = %status, "Signup rejected by identity provider");
            return Err(AppError::BadRequest(anyhow::anyhow!(message)));
        }

        let user = match response
            .json::<SignupResponse>()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Signup failed: {}", e)))?
        {
            SignupResponse::Session { user } | SignupResponse::User(user) => user,
        };

        Ok(user.into_identity(email, username))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity, AppError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", self.anon_key.expose_secret())
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Identity provider unreachable during login");
                AppError::InvalidCredentials
            })?;

        if !response.status().is_success() {
            tracing::info!(status = %response.status(), "Login rejected by identity provider");
            return Err(AppError::InvalidCredentials);
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Unreadable login response");
            AppError::InvalidCredentials
        })?;

        Ok(token.user.into_identity(email, DEFAULT_USERNAME))
    }
}
