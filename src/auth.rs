// src/auth.rs

use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::client::{AuthType, ParkClient};
use crate::error::ParkError;

/// Seconds before `expires_at` at which a session already counts as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 10;

/// A staff account as returned by the auth service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub other_fields: HashMap<String, Value>,
}

/// Tokens issued on sign-in or refresh.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn expires_at_time(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// A session is valid while it has an access token and is not within
    /// [`EXPIRY_MARGIN_SECS`] of its expiry. Sessions without an expiry never expire.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at_time() {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    // Token responses may carry only `expires_in`.
    pub(crate) fn fill_expiry(&mut self, now: DateTime<Utc>) {
        if self.expires_at.is_none() {
            if let Some(expires_in) = self.expires_in {
                self.expires_at = Some(now.timestamp() + expires_in);
            }
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

#[derive(Serialize, Debug)]
struct PasswordGrantRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize, Debug)]
struct RefreshGrantRequest<'a> {
    refresh_token: &'a str,
}

/// Staff authentication against the backend's auth service.
///
/// Obtained from [`ParkClient::auth`]; updates the client's session in place.
pub struct AuthHandle<'a> {
    client: &'a mut ParkClient,
}

impl<'a> AuthHandle<'a> {
    pub fn new(client: &'a mut ParkClient) -> Self {
        AuthHandle { client }
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.client.session.as_ref()
    }

    /// Signs in with email and password and stores the resulting session on the client.
    ///
    /// Corresponds to `POST /auth/v1/token?grant_type=password`. Wrong credentials yield
    /// `ParkError::InvalidCredentials`; a previous session is left untouched on failure.
    pub async fn sign_in_with_password(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<Session, ParkError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ParkError::InvalidInput(
                "email and password must not be empty".to_string(),
            ));
        }

        let params = vec![("grant_type".to_string(), "password".to_string())];
        let body = PasswordGrantRequest { email, password };
        let mut session: Session = self
            .client
            ._request(
                Method::POST,
                "auth/v1/token",
                &params,
                Some(&body),
                AuthType::ApiKey,
                HeaderMap::new(),
            )
            .await?;
        session.fill_expiry(Utc::now());

        log::debug!("Signed in as {:?}", session.user.as_ref().and_then(|u| u.email.as_deref()));
        self.client.session = Some(session.clone());
        Ok(session)
    }

    /// Signs out the current session.
    ///
    /// The local session is cleared even when the server call fails; that error is
    /// still returned. Signing out without a session is a no-op.
    pub async fn sign_out(&mut self) -> Result<(), ParkError> {
        if self.client.session.is_none() {
            return Ok(());
        }

        let result: Result<Value, ParkError> = self
            .client
            ._request(
                Method::POST,
                "auth/v1/logout",
                &[],
                None::<&Value>,
                AuthType::UserToken,
                HeaderMap::new(),
            )
            .await;
        self.client.session = None;

        match result {
            Ok(_) => Ok(()),
            // The token was already invalid server-side; signed out either way.
            Err(ParkError::AuthenticationError(_)) | Err(ParkError::SessionExpired(_)) => Ok(()),
            Err(e) => {
                log::warn!("Sign-out request failed: {}", e);
                Err(e)
            }
        }
    }

    /// Retrieves the signed-in user from the auth service (`GET /auth/v1/user`).
    pub async fn get_user(&self) -> Result<AuthUser, ParkError> {
        if self.client.session.is_none() {
            return Err(ParkError::SessionMissing);
        }
        self.client
            ._request(
                Method::GET,
                "auth/v1/user",
                &[],
                None::<&Value>,
                AuthType::UserToken,
                HeaderMap::new(),
            )
            .await
    }

    /// Exchanges the refresh token for a new session.
    ///
    /// When the auth service rejects the refresh token the local session is dropped.
    pub async fn refresh_session(&mut self) -> Result<Session, ParkError> {
        let refresh_token = self
            .client
            .session
            .as_ref()
            .ok_or(ParkError::SessionMissing)?
            .refresh_token
            .clone()
            .ok_or_else(|| ParkError::SessionExpired("session has no refresh token".to_string()))?;

        let params = vec![("grant_type".to_string(), "refresh_token".to_string())];
        let body = RefreshGrantRequest {
            refresh_token: &refresh_token,
        };
        let result: Result<Session, ParkError> = self
            .client
            ._request(
                Method::POST,
                "auth/v1/token",
                &params,
                Some(&body),
                AuthType::ApiKey,
                HeaderMap::new(),
            )
            .await;

        match result {
            Ok(mut session) => {
                session.fill_expiry(Utc::now());
                self.client.session = Some(session.clone());
                Ok(session)
            }
            Err(e @ ParkError::InvalidCredentials(_))
            | Err(e @ ParkError::AuthenticationError(_))
            | Err(e @ ParkError::ApiError { .. }) => {
                log::warn!("Refresh token rejected, clearing session: {}", e);
                self.client.session = None;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Returns a usable session, refreshing it first when it has expired.
    ///
    /// `Ok(None)` means nobody is signed in.
    pub async fn get_session(&mut self) -> Result<Option<Session>, ParkError> {
        let valid = match &self.client.session {
            None => return Ok(None),
            Some(session) => session.is_valid(),
        };
        if valid {
            Ok(self.client.session.clone())
        } else {
            self.refresh_session().await.map(Some)
        }
    }
}
