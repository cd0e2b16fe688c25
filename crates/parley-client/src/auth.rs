//! Login, signup and password reset against the backend's auth routes.

use serde::{Deserialize, Serialize};

use crate::http_client::{error_for_status, HttpBackendClient};
use crate::{ClientError, Credential};

#[derive(Debug, Clone, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct SignupRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    new_password: &'a str,
}

/// Plain `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthMessage {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "crate::types::deserialize_id")]
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    user: Option<UserProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "crate::types::deserialize_optional_id")]
    pub user_id: Option<String>,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub credential: Credential,
    pub user: Option<UserProfile>,
}

impl HttpBackendClient {
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        let response = self
            .http()
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password })
            .timeout(self.timeout())
            .send()
            .await?;

        let body = error_for_status(response)
            .await?
            .json::<LoginResponse>()
            .await?;
        let credential = Credential::new(body.access_token)
            .ok_or_else(|| ClientError::Decode("login returned an empty access token".into()))?;

        tracing::info!(email = email, "logged in");
        Ok(AuthSession {
            credential,
            user: body.user,
        })
    }

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignupResponse, ClientError> {
        let response = self
            .http()
            .post(self.url("/auth/signup"))
            .json(&SignupRequest {
                email,
                password,
                username,
            })
            .timeout(self.timeout())
            .send()
            .await?;

        let body = error_for_status(response)
            .await?
            .json::<SignupResponse>()
            .await?;
        tracing::info!(email = email, "signed up");
        Ok(body)
    }

    /// Asks the backend to send a reset token for `email`.
    pub async fn forgot_password(&self, email: &str) -> Result<AuthMessage, ClientError> {
        let response = self
            .http()
            .post(self.url("/auth/forgot-password"))
            .json(&ForgotPasswordRequest { email })
            .timeout(self.timeout())
            .send()
            .await?;

        let body = error_for_status(response).await?.json::<AuthMessage>().await?;
        tracing::info!(email = email, "password reset requested");
        Ok(body)
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<AuthMessage, ClientError> {
        let response = self
            .http()
            .post(self.url("/auth/reset-password"))
            .json(&ResetPasswordRequest {
                token,
                new_password,
            })
            .timeout(self.timeout())
            .send()
            .await?;

        Ok(error_for_status(response).await?.json::<AuthMessage>().await?)
    }
}
