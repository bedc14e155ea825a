//! Endpoint configuration: where a tool server lives and how to talk to it.
//!
//! Values are resolved once (from TOML or the `MCP_*` environment variables)
//! and then treated as immutable by the client that owns them.

use crate::error::{McpLinkError, McpLinkResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// URL used when neither configuration nor environment provide one.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000/mcp";

/// Transport hint for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// HTTP POST whose responses may arrive in event-stream framing.
    #[default]
    Sse,
    /// Plain HTTP POST with JSON responses.
    Http,
    /// Tools served by handlers inside this process.
    InProcess,
}

impl TransportKind {
    /// Lowercase name, as used in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::Http => "http",
            Self::InProcess => "in_process",
        }
    }
}

impl FromStr for TransportKind {
    type Err = McpLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sse" => Ok(Self::Sse),
            "http" | "streamable_http" => Ok(Self::Http),
            "in_process" | "local" => Ok(Self::InProcess),
            other => Err(McpLinkError::Config(format!(
                "unsupported transport type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the auth token is presented to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`.
    #[default]
    Bearer,
    /// OAuth access token, also sent as a bearer credential.
    Oauth,
    /// Never send credentials.
    None,
}

impl FromStr for AuthScheme {
    type Err = McpLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bearer" => Ok(Self::Bearer),
            "oauth" => Ok(Self::Oauth),
            "none" => Ok(Self::None),
            other => Err(McpLinkError::Config(format!(
                "unsupported auth type '{other}'"
            ))),
        }
    }
}

/// Retry behaviour for transient transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Upper bound for a single backoff delay, in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), doubling each time and
    /// capped at `backoff_max_ms`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = self.delay_ms.saturating_mul(2u64.saturating_pow(retry));
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_delay_ms() -> u64 {
    1_000
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_pool_size() -> usize {
    5
}
fn default_user_agent() -> String {
    format!("mcplink/{}", env!("CARGO_PKG_VERSION"))
}

/// Network address and policy for one logical tool server.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// URL that JSON-RPC envelopes are POSTed to.
    pub url: String,
    /// Upper bound for every request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra request headers; these win over the generated ones.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Credential sent according to `auth_scheme`.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// How `auth_token` is presented.
    #[serde(default)]
    pub auth_scheme: AuthScheme,
    /// Transport hint used to pick a connector.
    #[serde(default)]
    pub transport: TransportKind,
    /// Retry transient transport failures; `None` disables retrying.
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    /// Idle connections kept per host.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Value of the `User-Agent` header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Keywords added to the query guard's mandatory denylist.
    #[serde(default)]
    pub extra_denied_keywords: Vec<String>,
}

impl fmt::Debug for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEndpoint")
            .field("url", &self.url)
            .field("timeout_secs", &self.timeout_secs)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("auth_scheme", &self.auth_scheme)
            .field("transport", &self.transport)
            .field("retry", &self.retry)
            .field("pool_size", &self.pool_size)
            .finish_non_exhaustive()
    }
}

impl ServerEndpoint {
    /// Endpoint with default policy for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_timeout_secs(),
            headers: BTreeMap::new(),
            auth_token: None,
            auth_scheme: AuthScheme::default(),
            transport: TransportKind::default(),
            retry: None,
            pool_size: default_pool_size(),
            user_agent: default_user_agent(),
            extra_denied_keywords: Vec::new(),
        }
    }

    /// Sets the request timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the auth token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the transport hint.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Enables retrying with `policy`.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Adds an extra header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolves an endpoint from the `MCP_*` process environment variables.
    pub fn from_env() -> McpLinkResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves an endpoint from an arbitrary variable lookup.
    ///
    /// Recognised keys: `MCP_SERVER_URL`, `MCP_TIMEOUT`, `MCP_RETRY_ATTEMPTS`,
    /// `MCP_RETRY_DELAY` (seconds, fractional), `MCP_POOL_SIZE`,
    /// `MCP_AUTH_TOKEN`, `MCP_AUTH_TYPE`, `MCP_TRANSPORT_TYPE`.
    pub fn from_lookup<F>(lookup: F) -> McpLinkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut endpoint =
            Self::new(lookup("MCP_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()));

        endpoint.timeout_secs = parse_var(&lookup, "MCP_TIMEOUT", default_timeout_secs())?;
        endpoint.pool_size = parse_var(&lookup, "MCP_POOL_SIZE", default_pool_size())?;

        let attempts: u32 = parse_var(&lookup, "MCP_RETRY_ATTEMPTS", default_max_attempts())?;
        let delay_secs: f64 = parse_var(&lookup, "MCP_RETRY_DELAY", 1.0)?;
        if !delay_secs.is_finite() || delay_secs < 0.0 {
            return Err(McpLinkError::Config(format!(
                "MCP_RETRY_DELAY must be a non-negative number, got {delay_secs}"
            )));
        }
        endpoint.retry = (attempts > 1).then(|| RetryPolicy {
            max_attempts: attempts,
            delay_ms: (delay_secs * 1000.0).round() as u64,
            ..RetryPolicy::default()
        });

        endpoint.auth_token = lookup("MCP_AUTH_TOKEN").filter(|t| !t.trim().is_empty());
        if let Some(scheme) = lookup("MCP_AUTH_TYPE") {
            endpoint.auth_scheme = scheme.parse()?;
        }
        if let Some(transport) = lookup("MCP_TRANSPORT_TYPE") {
            endpoint.transport = transport.parse()?;
        }

        debug!(
            url = %endpoint.url,
            transport = %endpoint.transport,
            retry = endpoint.retry.is_some(),
            "Resolved endpoint from environment"
        );
        Ok(endpoint)
    }

    /// Checks that the URL has a scheme and a host and that the timeout is
    /// positive.
    pub fn validate(&self) -> McpLinkResult<()> {
        let url = reqwest::Url::parse(&self.url)
            .map_err(|e| McpLinkError::Config(format!("invalid server URL '{}': {e}", self.url)))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(McpLinkError::Config(format!(
                "server URL '{}' has no host",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(McpLinkError::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }

    /// Effective request headers, keyed by lowercase header name.
    pub fn request_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("user-agent".to_string(), self.user_agent.clone());

        let accept = match self.transport {
            TransportKind::Sse => "application/json, text/event-stream",
            TransportKind::Http | TransportKind::InProcess => "application/json",
        };
        headers.insert("accept".to_string(), accept.to_string());

        if let Some(token) = &self.auth_token {
            if self.auth_scheme != AuthScheme::None {
                headers.insert("authorization".to_string(), format!("Bearer {token}"));
            }
        }

        for (name, value) in &self.headers {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        headers
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> McpLinkResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| McpLinkError::Config(format!("{key}='{raw}': {e}"))),
        _ => Ok(default),
    }
}

/// A named set of endpoints, as loaded from `[servers.<name>]` tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Endpoint per server name.
    #[serde(default)]
    pub servers: BTreeMap<String, ServerEndpoint>,
}

impl PoolConfig {
    /// Validates every endpoint, naming the first offender.
    pub fn validate(&self) -> McpLinkResult<()> {
        for (name, endpoint) in &self.servers {
            endpoint
                .validate()
                .map_err(|e| McpLinkError::Config(format!("server '{name}': {e}")))?;
        }
        Ok(())
    }
}
