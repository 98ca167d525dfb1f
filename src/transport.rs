//! HTTP transport abstraction.
//!
//! [`SheetsClient`](crate::SheetsClient) only builds requests; a [`Transport`]
//! sends them. Implementations own authentication, timeouts and any retry
//! policy, and must turn non-2xx responses into [`SheetsError::ApiError`].

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{Body, Client};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::auth::Authenticator;
use crate::error::{Result, SheetsError};
use crate::models::ApiErrorResponse;

/// HTTP verbs used by the Drive and Sheets APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Upper-case verb as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an [`ApiRequest`] carries after its headers.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Raw bytes streamed from a local file.
    File { path: PathBuf, len: u64 },
}

/// One HTTP request built by the client, before authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    /// Request with no headers and an empty body.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Bodyless GET.
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::Get, uri)
    }

    /// Add a header. Repeated names are sent repeatedly.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set a JSON body along with its `Content-Type`.
    pub fn json(self, body: Value) -> Self {
        let mut request = self.header("Content-Type", "application/json");
        request.body = RequestBody::Json(body);
        request
    }

    /// Stream `len` bytes from `path` as the body.
    pub fn file(mut self, path: impl Into<PathBuf>, len: u64) -> Self {
        self.body = RequestBody::File {
            path: path.into(),
            len,
        };
        self
    }

    /// Look up a request header, ignoring case.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A completed HTTP exchange.
///
/// [`with_header`](Self::with_header) stores names lowercase, but
/// [`header`](Self::header) matches any case, so transports may also fill
/// `headers` directly.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Response with no headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header, storing the name lowercase.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a response header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends [`ApiRequest`]s on behalf of the client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one request.
    ///
    /// # Errors
    ///
    /// Returns [`SheetsError::ApiError`] carrying the status code for any
    /// non-2xx response, and transport-specific errors otherwise.
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Turn an error response into [`SheetsError::ApiError`].
///
/// The status is always the HTTP one; only the message is taken from
/// Google's error envelope, falling back to the raw body.
pub fn api_error(status: u16, body: &[u8]) -> SheetsError {
    let message = match serde_json::from_slice::<ApiErrorResponse>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    };
    SheetsError::ApiError { status, message }
}

/// How [`ReqwestTransport`] authorizes requests.
#[derive(Clone)]
pub enum Credentials {
    ServiceAccount(Authenticator),
    /// A pre-issued OAuth2 access token.
    Bearer(String),
}

impl Credentials {
    async fn access_token(&self) -> Result<String> {
        match self {
            Credentials::ServiceAccount(auth) => auth.get_access_token().await,
            Credentials::Bearer(token) => Ok(token.clone()),
        }
    }
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    credentials: Credentials,
    http: Client,
}

impl ReqwestTransport {
    /// Transport on a default `reqwest::Client`.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_client(credentials, Client::new())
    }

    /// Transport on a caller-configured client (timeouts, proxies).
    pub fn with_client(credentials: Credentials, http: Client) -> Self {
        Self { credentials, http }
    }

    fn convert_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let token = self.credentials.access_token().await?;

        debug!(method = %request.method, uri = %request.uri, "Sending request");

        let mut builder = self
            .http
            .request(Self::convert_method(request.method), &request.uri)
            .bearer_auth(&token);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(serde_json::to_vec(&value)?),
            RequestBody::File { path, .. } => {
                let file = tokio::fs::File::open(&path).await?;
                builder.body(Body::wrap_stream(ReaderStream::new(file)))
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|s| (k.as_str().to_ascii_lowercase(), s.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        if !(200..300).contains(&status) {
            warn!(status, uri = %request.uri, "Request failed");
            return Err(api_error(status, &body));
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
