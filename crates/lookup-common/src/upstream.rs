use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::Duration;

use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use crate::document::{decode_lookup_body, DecodeError, LookupDocument};
use crate::error::CommonError;

const SEARCH_PATH: &str = "simple_search";

#[derive(Clone)]
pub struct LookupClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub client_id: String,
    pub pa_number: String,
    pub timeout: Duration,
    pub health_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
    /// Skips TLS certificate verification. Off unless explicitly enabled.
    pub accept_invalid_certs: bool,
}

impl std::fmt::Debug for LookupClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("pa_number", &self.pa_number)
            .field("timeout", &self.timeout)
            .field("health_timeout", &self.health_timeout)
            .field("max_retries", &self.max_retries)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("max_error_body_bytes", &self.max_error_body_bytes)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

impl LookupClientConfig {
    /// Load the lookup client configuration from environment variables.
    ///
    /// Required:
    /// - `LOOKUP_BASE_URL`: http(s) base of the lookup API
    /// - `LOOKUP_API_KEY`, `LOOKUP_CLIENT_ID`, `LOOKUP_PA_NUMBER`: credentials sent as query parameters
    ///
    /// Optional:
    /// - `LOOKUP_TIMEOUT_SECS` (default 20, clamped to 1..=120)
    /// - `LOOKUP_HEALTH_TIMEOUT_SECS` (default 5)
    /// - `LOOKUP_MAX_RETRIES` (default 0, i.e. a single attempt)
    /// - `LOOKUP_RETRY_INITIAL_MS` (default 200), `LOOKUP_RETRY_MAX_MS` (default 5000)
    /// - `LOOKUP_MAX_ERROR_BODY_BYTES` (default 8 KiB)
    /// - `LOOKUP_ACCEPT_INVALID_CERTS` (`1`/`true`/`yes` to disable TLS verification)
    pub fn from_env() -> Result<Self, CommonError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, CommonError> {
        let required = |name: &str| {
            var(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| CommonError::Config(format!("{name} environment variable is required")))
        };

        let base_url = required("LOOKUP_BASE_URL")?;
        let parsed = Url::parse(&base_url)
            .map_err(|e| CommonError::Config(format!("LOOKUP_BASE_URL is not a valid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CommonError::Config(format!(
                "LOOKUP_BASE_URL must be http or https, got {}",
                parsed.scheme()
            )));
        }

        let api_key = required("LOOKUP_API_KEY")?;
        let client_id = required("LOOKUP_CLIENT_ID")?;
        let pa_number = required("LOOKUP_PA_NUMBER")?;

        let timeout = var("LOOKUP_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs.clamp(1, 120)))
            .unwrap_or_else(|| Duration::from_secs(20));

        let health_timeout = var("LOOKUP_HEALTH_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(5));

        let max_retries = var("LOOKUP_MAX_RETRIES")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(0);

        let initial_backoff = var("LOOKUP_RETRY_INITIAL_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));

        let max_backoff = var("LOOKUP_RETRY_MAX_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(5_000));

        let max_error_body_bytes = var("LOOKUP_MAX_ERROR_BODY_BYTES")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        let accept_invalid_certs = var("LOOKUP_ACCEPT_INVALID_CERTS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client_id,
            pa_number,
            timeout,
            health_timeout,
            max_retries,
            initial_backoff,
            max_backoff,
            max_error_body_bytes,
            accept_invalid_certs,
        })
    }
}

impl LookupClientConfig {
    /// Backoff before retry number `retry` (0-based): `initial_backoff` doubled
    /// per retry and capped at `max_backoff`, plus up to a quarter of that again.
    fn retry_delay(&self, retry: u32) -> Duration {
        let base = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_backoff);
        base + jitter(base / 4)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Transport failure. The request URL is stripped so credentials never
    /// end up in messages.
    #[error("upstream unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("upstream returned status {status}")]
    Status { status: StatusCode },

    #[error("upstream body could not be decoded: {0}")]
    MalformedBody(#[from] DecodeError),
}

impl LookupError {
    fn transport(err: reqwest::Error) -> Self {
        LookupError::Unreachable(err.without_url())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, LookupError::Unreachable(e) if e.is_timeout())
    }
}

/// Result of the lightweight reachability probe used by health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Responded(StatusCode),
    Failed(String),
}

impl ProbeOutcome {
    /// Any answer below 500 means the upstream is up, even a 404 on the root path.
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Responded(status) if !status.is_server_error())
    }
}

#[derive(Clone)]
pub struct LookupClient {
    config: LookupClientConfig,
    search_endpoint: Url,
    http: reqwest::Client,
}

impl LookupClient {
    pub fn new(config: LookupClientConfig) -> Result<Self, CommonError> {
        let search_endpoint = Url::parse(&format!("{}/{SEARCH_PATH}", config.base_url))
            .map_err(|e| CommonError::Config(format!("invalid lookup base URL: {e}")))?;

        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for the lookup API");
        }

        let http = reqwest::Client::builder()
            .user_agent("outsystems-relay/lookup")
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            config,
            search_endpoint,
            http,
        })
    }

    pub fn config(&self) -> &LookupClientConfig {
        &self.config
    }

    /// Build the search URL for one basic type, credentials included.
    /// Never log the returned value.
    pub fn search_url(&self, basic_type: &str) -> Url {
        let mut url = self.search_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("user", "None")
            .append_pair("Basistypen", basic_type)
            .append_pair("modus", "hfgst")
            .append_pair("key", &self.config.api_key)
            .append_pair("id", &self.config.client_id)
            .append_pair("PA_number", &self.config.pa_number)
            .append_pair("loc", "All")
            .append_pair("milestone", "0")
            .append_pair("differ_pa_baunumbers", "False");
        url
    }

    /// Fetch and decode the lookup document for `basic_type`.
    pub async fn fetch(&self, basic_type: &str) -> Result<LookupDocument, LookupError> {
        let url = self.search_url(basic_type);
        self.with_retries(|| {
            let url = url.clone();
            async move { self.fetch_once(url, basic_type).await }
        })
        .await
    }

    async fn fetch_once(&self, url: Url, basic_type: &str) -> Result<LookupDocument, LookupError> {
        let resp = self
            .http
            .get(url)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(LookupError::transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = body_preview(resp, self.config.max_error_body_bytes).await;
            warn!(basic_type, status = status.as_u16(), body = %body, "lookup returned non-success status");
            return Err(LookupError::Status { status });
        }

        let body = resp.text().await.map_err(LookupError::transport)?;
        let document = decode_lookup_body(&body).map_err(|e| {
            warn!(
                basic_type,
                error = %e,
                body = truncate_utf8(&body, self.config.max_error_body_bytes),
                "lookup body could not be decoded"
            );
            LookupError::MalformedBody(e)
        })?;

        debug!(
            basic_type,
            categories = document.main_categories.len(),
            "lookup document decoded"
        );
        Ok(document)
    }

    /// Reachability probe against the API root. Never fails; failures are
    /// reported in the outcome.
    pub async fn probe(&self) -> ProbeOutcome {
        let url = format!("{}/", self.config.base_url);
        match self
            .http
            .get(&url)
            .timeout(self.config.health_timeout)
            .send()
            .await
        {
            Ok(resp) => ProbeOutcome::Responded(resp.status()),
            Err(e) => {
                let e = e.without_url();
                warn!(error = %e, "lookup probe failed");
                ProbeOutcome::Failed(describe_transport(&e))
            }
        }
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// `max_retries` retries are used up.
    async fn with_retries<T, Fut, F>(&self, mut attempt: F) -> Result<T, LookupError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LookupError>>,
    {
        let mut retry: u32 = 0;
        loop {
            let err = match attempt().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            if retry >= self.config.max_retries || !should_retry(&err) {
                return Err(err);
            }
            let delay = self.config.retry_delay(retry);
            retry += 1;
            warn!(
                retry,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis(),
                error = %err,
                "lookup attempt failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Short, caller-safe description of a transport failure.
pub fn describe_transport(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        "request failed".to_string()
    }
}

fn should_retry(err: &LookupError) -> bool {
    match err {
        LookupError::Unreachable(e) => e.is_timeout() || e.is_connect(),
        LookupError::Status { status } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        LookupError::MalformedBody(_) => false,
    }
}

/// Uniform-ish delay in `0..=cap`, rounded to whole milliseconds.
fn jitter(cap: Duration) -> Duration {
    let cap_ms = u64::try_from(cap.as_millis()).unwrap_or(u64::MAX).max(1);
    let seed = RandomState::new().build_hasher().finish();
    Duration::from_millis(seed % cap_ms.saturating_add(1))
}

/// Read a response body for logging, cut to `max_bytes` on a char boundary.
async fn body_preview(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.text().await {
        Ok(text) => truncate_utf8(&text, max_bytes).to_string(),
        Err(e) => {
            let e = e.without_url();
            warn!(error = %e, "failed to read upstream body");
            "<unreadable body>".to_string()
        }
    }
}

fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
