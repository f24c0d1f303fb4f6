use std::collections::HashMap;
use std::error::Error as StdError;
use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::Client;

use crate::error::{ApiError, ApiErrorKind};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// One outgoing API call, fully resolved.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub verify_tls: bool,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests on behalf of the API client.
///
/// Must return `Ok` for any response the server produced, including error
/// statuses; `Err` is reserved for failures where no response exists.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Blocking reqwest transport with a fixed timeout and no retries.
pub struct ReqwestTransport {
    http: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let http = Self::builder(timeout)
            .build()
            .map_err(|e| ApiError::other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, timeout })
    }

    fn builder(timeout: Duration) -> reqwest::blocking::ClientBuilder {
        Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vikunja-flow/", env!("CARGO_PKG_VERSION")))
    }

    /// Client that skips certificate checks. Built per request so the relaxed
    /// trust never leaks into other calls.
    fn insecure_client(&self) -> Result<Client, ApiError> {
        Self::builder(self.timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ApiError::other(format!("Failed to build HTTP client: {}", e)))
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let insecure;
        let http = if skips_tls_verification(request) {
            log::debug!("TLS verification disabled for {}", request.url);
            insecure = self.insecure_client()?;
            &insecure
        } else {
            &self.http
        };

        let mut builder = http.request(request.method.clone(), &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().map_err(classify)?;

        let status = resp.status();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp
            .bytes()
            .map_err(|e| ApiError::new(format!("Failed to read response: {}", e), ApiErrorKind::Other))?
            .to_vec();

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }
}

/// Relaxed trust applies only to an https request that opted out.
fn skips_tls_verification(request: &HttpRequest) -> bool {
    !request.verify_tls
        && request
            .url
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
}

/// Map a reqwest failure to a status-less [`ApiError`] of the right kind.
fn classify(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        return ApiError::new("Request timed out", ApiErrorKind::Timeout);
    }
    if is_certificate_error(&e) {
        return ApiError::new(
            format!("TLS certificate verification failed: {}", e),
            ApiErrorKind::Tls,
        );
    }
    if e.is_connect() {
        return ApiError::new(format!("Connection failed: {}", e), ApiErrorKind::Connect);
    }
    ApiError::other(format!("Request failed: {}", e))
}

fn is_certificate_error(e: &reqwest::Error) -> bool {
    let mut source: Option<&dyn StdError> = Some(e);
    while let Some(err) = source {
        let text = err.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("invalidcertificate") {
            return true;
        }
        source = err.source();
    }
    false
}
