//! OAuth2 access tokens for a Google service account.
//!
//! A signed JWT assertion is exchanged at the key's token endpoint; the
//! resulting token is shared by clones of the [`Authenticator`] and reused
//! until shortly before it expires.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, SheetsError};
use crate::models::{ServiceAccountCredentials, TokenResponse};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Full read/write access to Drive files.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Read/write access to spreadsheets.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Google caps assertion lifetime at one hour.
const ASSERTION_LIFETIME: u64 = 3600;

/// Refresh this long before the server-reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct Assertion<'a> {
    iss: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct OAuthError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: SystemTime,
}

impl AccessToken {
    fn usable_at(&self, now: SystemTime) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

/// Issues access tokens for a service account key.
///
/// Cloning is cheap and clones share one token cache.
#[derive(Clone)]
pub struct Authenticator {
    key: Arc<ServiceAccountCredentials>,
    scopes: Vec<String>,
    subject: Option<String>,
    http: Client,
    token: Arc<RwLock<Option<AccessToken>>>,
}

impl Authenticator {
    /// Load a service account key file (the JSON downloaded from the console).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read(path)?;
        Ok(Self::new(serde_json::from_slice(&raw)?))
    }

    /// Authenticator for the Drive and Spreadsheets scopes.
    pub fn new(key: ServiceAccountCredentials) -> Self {
        Self {
            key: Arc::new(key),
            scopes: vec![DRIVE_SCOPE.to_string(), SPREADSHEETS_SCOPE.to_string()],
            subject: None,
            http: Client::new(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Act on behalf of `user` (domain-wide delegation).
    pub fn with_subject(mut self, user: impl Into<String>) -> Self {
        self.subject = Some(user.into());
        self
    }

    pub fn service_account(&self) -> &str {
        &self.key.client_email
    }

    fn token_uri(&self) -> &str {
        self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn assertion(&self, now: u64) -> Assertion<'_> {
        Assertion {
            iss: &self.key.client_email,
            sub: self.subject.as_deref(),
            scope: self.scopes.join(" "),
            aud: self.token_uri(),
            iat: now,
            exp: now + ASSERTION_LIFETIME,
        }
    }

    /// A token valid for at least another minute, fetching one if needed.
    pub async fn get_access_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.usable_at(SystemTime::now()) {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = slot.as_ref() {
            if token.usable_at(SystemTime::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<AccessToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SheetsError::AuthenticationError(e.to_string()))?
            .as_secs();

        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let jwt = jsonwebtoken::encode(&header, &self.assertion(now), &key)?;

        debug!(token_uri = self.token_uri(), account = self.service_account(), "Exchanging JWT assertion");

        let response = self
            .http
            .post(self.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", jwt.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let reason = match serde_json::from_slice::<OAuthError>(&body) {
                Ok(e) => match e.error_description {
                    Some(description) => format!("{}: {}", e.error, description),
                    None => e.error,
                },
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };
            return Err(SheetsError::TokenRefreshError(format!("{} ({})", reason, status)));
        }

        let issued: TokenResponse = serde_json::from_slice(&body)?;
        info!(expires_in = issued.expires_in, "Obtained access token");

        Ok(AccessToken {
            value: issued.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(issued.expires_in),
        })
    }
}
