//! Google 서비스 계정 인증.
//!
//! A self-signed RS256 JWT is exchanged for an OAuth2 access token, which is
//! cached until shortly before it expires.
use std::{
    path::Path,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chrono::Utc;
use reqwest::Client;
use rsa::{
    RsaPrivateKey,
    pkcs1v15::SigningKey,
    pkcs8::DecodePrivateKey,
    signature::{SignatureEncoding, Signer},
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::util::error::UpstreamStatusError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before their reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("neither GOOGLE_CREDENTIALS nor GOOGLE_CREDENTIALS_FILE is set")]
    Missing,
    #[error("GOOGLE_CREDENTIALS is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to read credentials file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid service account JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid service account private key: {0}")]
    Key(String),
}

/// 서비스 계정 JSON 키 중 토큰 발급에 필요한 필드.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// # Errors
    /// Returns [`CredentialsError::Json`] when required fields are missing.
    pub fn from_json(raw: &str) -> Result<Self, CredentialsError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decodes the base64-encoded JSON carried in `GOOGLE_CREDENTIALS`.
    ///
    /// # Errors
    /// Fails on invalid base64, UTF-8 or JSON.
    pub fn from_base64(encoded: &str) -> Result<Self, CredentialsError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        let raw = String::from_utf8(bytes)
            .map_err(|error| CredentialsError::Key(format!("credentials are not UTF-8: {error}")))?;
        Self::from_json(&raw)
    }

    /// # Errors
    /// Fails when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Inline base64 credentials win over the file path.
    ///
    /// # Errors
    /// [`CredentialsError::Missing`] when neither source is configured.
    pub fn resolve(
        encoded: Option<&str>,
        file: Option<&Path>,
    ) -> Result<Self, CredentialsError> {
        match (encoded, file) {
            (Some(encoded), _) => Self::from_base64(encoded),
            (None, Some(path)) => Self::from_file(path),
            (None, None) => Err(CredentialsError::Missing),
        }
    }
}

#[derive(Debug, Serialize)]
struct JwtHeader<'a> {
    alg: &'a str,
    typ: &'a str,
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// 캐시된 액세스 토큰을 발급/갱신한다.
pub struct TokenProvider {
    client: Client,
    signing_key: SigningKey<Sha256>,
    client_email: String,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("client_email", &self.client_email)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    /// `token_url` is both the exchange endpoint and the JWT audience.
    ///
    /// # Errors
    /// [`CredentialsError::Key`] when the private key is not PKCS#8 PEM.
    pub fn new(
        client: Client,
        key: &ServiceAccountKey,
        token_url: &str,
    ) -> Result<Self, CredentialsError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(&key.private_key)
            .map_err(|error| CredentialsError::Key(error.to_string()))?;
        Ok(Self {
            client,
            signing_key: SigningKey::<Sha256>::new(private_key),
            client_email: key.client_email.clone(),
            token_url: token_url.to_string(),
            cached: Mutex::new(None),
        })
    }

    /// Signed `header.claims.signature` assertion for the token endpoint.
    ///
    /// # Errors
    /// Only fails if the JWT parts cannot be serialized.
    pub fn signed_assertion(&self, issued_at: i64) -> Result<String> {
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
        };
        let claims = JwtClaims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_url,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = self.signing_key.sign(signing_input.as_bytes());
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    /// Current access token, exchanging a new assertion when the cache is
    /// empty or about to expire.
    ///
    /// # Errors
    /// Fails when the token endpoint is unreachable or rejects the assertion.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.signed_assertion(Utc::now().timestamp())?;
        let response = self
            .client
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("google token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamStatusError::new("google oauth", status, &body).into());
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("failed to deserialize google token response")?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(REFRESH_MARGIN);
        debug!(expires_in = token.expires_in, "obtained google access token");

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}
