//! Client for the external stats provider.
//!
//! Every platform call goes through [`UpstreamClient::fetch_envelope`], which unwraps the
//! provider envelope so callers only ever see the inner `Response` payload.

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::Config;
use crate::errors::{AppError, UpstreamError};

/// Header carrying the application API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Envelope error code the provider uses for success.
pub const SUCCESS_ERROR_CODE: i64 = 1;

/// The provider's wrapper around every platform response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope<T> {
    pub response: Option<T>,
    pub error_code: Option<i64>,
    pub message: Option<String>,
    pub throttle_seconds: Option<i64>,
}

impl<T> Envelope<T> {
    /// Classify the envelope together with the HTTP status it arrived with.
    pub fn into_result(self, status: StatusCode) -> Result<T, UpstreamError> {
        let rejected = matches!(self.error_code, Some(code) if code != SUCCESS_ERROR_CODE);

        if !status.is_success() || rejected {
            return Err(UpstreamError {
                status: Some(status.as_u16()),
                error_code: self.error_code,
                throttle_seconds: self.throttle_seconds,
                message: self
                    .message
                    .unwrap_or_else(|| "Provider rejected the request".to_string()),
            });
        }

        self.response.ok_or_else(|| UpstreamError {
            status: Some(status.as_u16()),
            error_code: self.error_code,
            throttle_seconds: self.throttle_seconds,
            message: "Envelope carried no Response payload".to_string(),
        })
    }
}

/// Access token returned by the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// HTTP client bound to one provider origin and API key.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl UpstreamClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("guardian-ledger/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(&config.bungie_base_url, config.bungie_api_key.clone())
    }

    /// Provider origin, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of a platform endpoint, `path` starting with `/`.
    pub fn platform_url(&self, path: &str) -> String {
        format!("{}/Platform{}", self.base_url, path)
    }

    /// Full URL of an asset path returned by the provider.
    pub fn asset_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("BUNGIE_API_KEY is not configured".to_string()))
    }

    /// Call a platform endpoint and return its unwrapped `Response` payload.
    pub async fn fetch_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<T, AppError> {
        let api_key = self.api_key()?;
        let url = self.platform_url(path);
        tracing::debug!(%method, %url, "Upstream request");

        let mut request = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, api_key)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        self.execute(request).await
    }

    /// Call a platform endpoint on behalf of a logged-in user.
    pub async fn fetch_envelope_as_user<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let api_key = self.api_key()?;
        let url = self.platform_url(path);
        tracing::debug!(%url, "Upstream request (user token)");

        let request = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, api_key)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(ACCEPT, "application/json");

        self.execute(request).await
    }

    /// Fetch a plain JSON document (manifest content files are not enveloped).
    pub async fn fetch_json(&self, url: &str) -> Result<Value, AppError> {
        tracing::debug!(%url, "Upstream document request");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError {
                status: Some(status.as_u16()),
                error_code: None,
                throttle_seconds: None,
                message: format!("Document request to {} failed", url),
            }
            .into());
        }

        Ok(response.json().await?)
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_oauth_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<OAuthToken, AppError> {
        let url = self.platform_url("/App/OAuth/Token/");
        tracing::debug!(%url, "OAuth token exchange");

        let response = self
            .http
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "authorization_code"), ("code", code)])
            .send()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            return Err(UpstreamError {
                status: Some(status.as_u16()),
                error_code: None,
                throttle_seconds: None,
                message: body
                    .get("error_description")
                    .or_else(|| body.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("Token exchange failed")
                    .to_string(),
            }
            .into());
        }

        serde_json::from_value(body).map_err(|e| {
            AppError::from(UpstreamError {
                status: Some(status.as_u16()),
                error_code: None,
                throttle_seconds: None,
                message: format!("Token response missing access_token: {}", e),
            })
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AppError> {
        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        let envelope: Envelope<T> = serde_json::from_slice(&bytes).map_err(|e| UpstreamError {
            status: Some(status.as_u16()),
            error_code: None,
            throttle_seconds: None,
            message: format!("Malformed provider envelope: {}", e),
        })?;

        Ok(envelope.into_result(status)?)
    }
}

/// Accept ids the provider sends either as strings or as bare numbers.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
