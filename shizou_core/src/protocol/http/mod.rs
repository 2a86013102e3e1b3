//! AniDB HTTP API
//!
//! Every request is a GET with the credentials in the query string. The
//! server answers with XML; errors and ban notices are an `<error>` document.

pub mod anime;

pub use anime::{AnimeRequest, AnimeResult};

use log::{debug, error, info, warn};
use std::time::Duration;

use crate::Result;
use crate::error::{ProtocolError, ValidationError};
use crate::protocol::{BanGate, DEFAULT_HTTP_PORT, DEFAULT_SERVER, Outcome};
use crate::ratelimit::RateLimiter;

/// HTTP protocol version
pub const HTTP_PROTOCOL_VERSION: &str = "1";

/// AniDB HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_name: String,
    pub client_version: String,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER.to_string(),
            port: DEFAULT_HTTP_PORT,
            username: String::new(),
            password: String::new(),
            client_name: "shizouhttp".to_string(),
            client_version: "1".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}/httpapi", self.host, self.port)
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.username.is_empty() {
            return Err(ValidationError::missing_field("anidb.username"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::missing_field("anidb.password"));
        }
        Ok(())
    }
}

/// One HTTP API request type
pub trait HttpRequest: Send + Sync {
    type Output: Send;

    /// Value of the `request` query parameter
    fn request_type(&self) -> &'static str;

    /// Request-specific query parameters
    fn params(&self) -> Vec<(String, String)>;

    /// Interpret a non-error response body
    fn classify(&self, body: &str) -> Outcome<Self::Output>;
}

/// Whether a body is an `<error>` document
fn is_error_body(body: &str) -> bool {
    body.trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<error"))
}

/// Rate-limited, ban-aware AniDB HTTP client
pub struct HttpSession {
    config: HttpConfig,
    client: reqwest::Client,
    limiter: RateLimiter,
    ban: BanGate,
}

impl HttpSession {
    pub fn new(config: HttpConfig, limiter: RateLimiter, ban: BanGate) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .map_err(ProtocolError::from)?;
        Ok(Self {
            config,
            client,
            limiter,
            ban,
        })
    }

    pub fn ban_gate(&self) -> &BanGate {
        &self.ban
    }

    fn query(&self, request_type: &str, params: Vec<(String, String)>) -> Vec<(String, String)> {
        let mut query = vec![("request".to_string(), request_type.to_string())];
        query.extend(params);
        query.extend([
            ("client".to_string(), self.config.client_name.clone()),
            ("clientver".to_string(), self.config.client_version.clone()),
            ("protover".to_string(), HTTP_PROTOCOL_VERSION.to_string()),
            ("user".to_string(), self.config.username.clone()),
            ("pass".to_string(), self.config.password.clone()),
        ]);
        query
    }

    /// Perform a request
    pub async fn execute<R: HttpRequest>(&self, request: &R) -> Result<Outcome<R::Output>> {
        let guard = self.limiter.acquire().await;
        let body = self.fetch(request.request_type(), request.params()).await;
        guard.release();

        let body = match body {
            Ok(body) => body,
            Err(outcome) => return Ok(outcome),
        };

        if body.trim().is_empty() {
            warn!("No HTTP response, may be banned");
            return Ok(Outcome::Fatal("No HTTP response, may be banned".to_string()));
        }

        if is_error_body(&body) {
            if body.to_ascii_lowercase().contains("banned") {
                let reason = body.trim().to_string();
                self.ban.ban(&reason);
                return Ok(Outcome::Ban { reason });
            }
            error!("Unknown error HTTP response: {body}");
            return Ok(Outcome::Fatal(format!(
                "Unknown error HTTP response: {}",
                body.trim()
            )));
        }

        Ok(request.classify(&body))
    }

    /// GET the request while holding the limiter
    async fn fetch<T>(
        &self,
        request_type: &str,
        params: Vec<(String, String)>,
    ) -> std::result::Result<String, Outcome<T>> {
        if let Some(ban) = self.ban.current() {
            warn!("HTTP banned, aborting {request_type} request");
            return Err(Outcome::Ban { reason: ban.reason });
        }
        if let Err(e) = self.config.validate() {
            return Err(Outcome::Fatal(e.to_string()));
        }

        info!("Sending HTTP {request_type} request");
        debug!(
            "HTTP {request_type} parameters: {}",
            params
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join("&")
        );

        let response = match self
            .client
            .get(self.config.url())
            .query(&self.query(request_type, params))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!("HTTP {request_type} request timed out");
                return Err(Outcome::Fatal("No HTTP response, may be banned".to_string()));
            }
            Err(e) => {
                warn!("HTTP {request_type} request failed: {e}");
                return Err(Outcome::TransientError(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("HTTP {request_type} request answered {status}");
            return Err(Outcome::TransientError(format!("HTTP status {status}")));
        }

        match response.text().await {
            Ok(body) => Ok(body),
            Err(e) if e.is_timeout() => {
                Err(Outcome::Fatal("No HTTP response, may be banned".to_string()))
            }
            Err(e) => Err(Outcome::TransientError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_url() {
        assert_eq!(HttpConfig::default().url(), "http://api.anidb.net:9001/httpapi");
    }

    #[test]
    fn test_error_body_detection() {
        assert!(is_error_body("<error>Banned</error>"));
        assert!(is_error_body("  <ERROR code=\"500\">x</ERROR>"));
        assert!(!is_error_body("<anime id=\"1\"></anime>"));
        assert!(!is_error_body("<err"));
    }

    #[test]
    fn test_query_order() {
        let config = HttpConfig {
            username: "user".to_string(),
            password: "pass".to_string(),
            ..Default::default()
        };
        let session = HttpSession::new(
            config,
            RateLimiter::new("test", crate::ratelimit::RateLimitConfig::http()),
            BanGate::new("HTTP", crate::protocol::DEFAULT_BAN_PERIOD),
        )
        .unwrap();
        let keys: Vec<String> = session
            .query("anime", vec![("aid".to_string(), "1".to_string())])
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(
            keys,
            vec!["request", "aid", "client", "clientver", "protover", "user", "pass"]
        );
    }
}
