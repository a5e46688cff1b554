//! `reqwest` implementation of [`AuthApi`] (feature `http`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::api::{AuthApi, Credentials, PasswordReset, RegisterResponse, Registration, TokenResponse};
use crate::config::ClientConfig;
use crate::error::ApiError;

pub struct HttpAuthApi {
    api_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpAuthApi {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.api_url.clone(), config.auth_timeout)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_url, endpoint)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.timeout(self.timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout)
            } else {
                ApiError::Transport(e.to_string())
            }
        })?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::Rejected {
            status,
            message: error_message(&body),
        })
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.send(req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Backend errors look like `{"message": ...}` or `{"error": ...}`; anything
/// else is passed through as text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["message", "error", "detail"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        _ => body.trim().to_string(),
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        self.json(self.client.post(self.url("/auth/login")).json(credentials))
            .await
    }

    async fn register(&self, registration: &Registration) -> Result<RegisterResponse, ApiError> {
        self.json(self.client.post(self.url("/auth/register")).json(registration))
            .await
    }

    async fn refresh(&self, token: &str) -> Result<TokenResponse, ApiError> {
        self.json(self.client.post(self.url("/auth/refresh")).bearer_auth(token))
            .await
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.send(self.client.post(self.url("/auth/logout")).bearer_auth(token))
            .await
            .map(|_| ())
    }

    async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        self.send(
            self.client
                .post(self.url("/auth/forgot-password"))
                .json(&json!({ "email": email })),
        )
        .await
        .map(|_| ())
    }

    async fn reset_password(&self, reset: &PasswordReset) -> Result<(), ApiError> {
        self.send(self.client.post(self.url("/auth/reset-password")).json(reset))
            .await
            .map(|_| ())
    }

    async fn update_profile(
        &self,
        token: &str,
        patch: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ApiError> {
        let body: Value = self
            .json(
                self.client
                    .put(self.url("/auth/profile"))
                    .bearer_auth(token)
                    .json(patch),
            )
            .await?;

        // Some endpoints wrap the record as {"user": {...}}.
        match body {
            Value::Object(mut map) => match map.remove("user") {
                Some(Value::Object(user)) => Ok(user),
                Some(other) => {
                    map.insert("user".to_string(), other);
                    Ok(map)
                }
                None => Ok(map),
            },
            other => Err(ApiError::InvalidResponse(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}
