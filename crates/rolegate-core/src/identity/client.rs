//! Network identity resolution against the backend's auth endpoints.
//!
//! `resolve` asks `/auth/me` who owns the access token. An expired access
//! token is refreshed once through `/auth/refresh` before giving up.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{Credential, Role};
use crate::config::Config;

use super::{AuthError, Identity, IdentityResolver, Resolution};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Identity resolver backed by the HTTP API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpIdentityResolver {
    client: Client,
    base_url: String,
    login_path: String,
    me_path: String,
    refresh_path: String,
}

impl HttpIdentityResolver {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url(),
            login_path: config.auth_login_path.clone(),
            me_path: config.auth_me_path.clone(),
            refresh_path: config.auth_refresh_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::from_status(status, &body))
    }

    /// Ask who owns `access_token`. `Ok(None)` means the token itself was rejected.
    async fn fetch_me(&self, access_token: &str) -> Result<Option<Identity>, AuthError> {
        let response = self
            .client
            .get(self.url(&self.me_path))
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }

        let payload: Value = Self::check_response(response).await?.json().await?;
        match extract_identity(&payload) {
            Some(identity) => Ok(Some(identity)),
            None => {
                warn!("Identity response is missing a user id or role");
                Err(AuthError::Unauthorized)
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        let response = self
            .client
            .post(self.url(&self.refresh_path))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let payload: Value = Self::check_response(response).await?.json().await?;
        let (access, refresh) = extract_tokens(&payload);
        let access = access.ok_or(AuthError::Unauthorized)?;

        Ok(Credential::new(
            access,
            Some(refresh.unwrap_or_else(|| refresh_token.to_string())),
        ))
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve(&self, credential: &Credential) -> Result<Resolution, AuthError> {
        credential.validate()?;

        if let Some(identity) = self.fetch_me(&credential.access_token).await? {
            return Ok(Resolution::new(identity));
        }

        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(AuthError::Unauthorized)?;

        debug!("Access token rejected, refreshing");
        let refreshed = self.refresh(refresh_token).await?;
        let identity = self
            .fetch_me(&refreshed.access_token)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        Ok(Resolution {
            identity,
            refreshed: Some(refreshed),
        })
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Credential, AuthError> {
        let email = email.trim();
        let password = password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Unauthorized);
        }

        let response = self
            .client
            .post(self.url(&self.login_path))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let payload: Value = Self::check_response(response).await?.json().await?;
        match extract_tokens(&payload) {
            (Some(access), Some(refresh)) => Ok(Credential::new(access, Some(refresh))),
            _ => {
                warn!("Login response did not contain both tokens");
                Err(AuthError::Unauthorized)
            }
        }
    }
}

// ============================================================================
// Payload extraction
// ============================================================================

const ACCESS_TOKEN_KEYS: &[&str] = &["accessToken", "access_token", "token"];
const REFRESH_TOKEN_KEYS: &[&str] = &["refreshToken", "refresh_token"];
const TOKEN_CONTAINERS: &[&str] = &["", "/data", "/tokens"];

const USER_CONTAINERS: &[&str] = &["/user", "/me", "/profile", "/data/user", "/data/me", "/data/profile", "/data"];

/// First non-blank string (or number) among `keys` of `value`.
fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn pick_token(payload: &Value, keys: &[&str]) -> Option<String> {
    TOKEN_CONTAINERS.iter().find_map(|container| {
        let scope = if container.is_empty() {
            Some(payload)
        } else {
            payload.pointer(container)
        };
        scope.and_then(|scope| pick_string(scope, keys))
    })
}

/// Access and refresh tokens wherever the server put them.
fn extract_tokens(payload: &Value) -> (Option<String>, Option<String>) {
    (
        pick_token(payload, ACCESS_TOKEN_KEYS),
        pick_token(payload, REFRESH_TOKEN_KEYS),
    )
}

fn extract_identity(payload: &Value) -> Option<Identity> {
    let user = USER_CONTAINERS
        .iter()
        .find_map(|pointer| payload.pointer(pointer).filter(|v| v.is_object()))
        .unwrap_or(payload);

    let user_id = pick_string(user, &["id", "_id", "userId", "uid"])?;
    let role = pick_string(user, &["role"])
        .and_then(|r| Role::parse(&r))
        .or_else(|| pick_string(payload, &["role"]).and_then(|r| Role::parse(&r)))?;

    Some(Identity {
        user_id,
        role,
        email: pick_string(user, &["email", "username"]),
        name: pick_string(user, &["name", "fullName", "nickname"]),
    })
}
