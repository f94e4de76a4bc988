//! Configuration for workflow-mcp
//!
//! Settings come from an optional TOML file, overridden by environment
//! variables. Everything is validated once at startup and is immutable
//! afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

pub const ENV_BASE_URL: &str = "WORKFLOW_BASE_URL";
pub const ENV_USERNAME: &str = "WORKFLOW_USERNAME";
pub const ENV_PASSWORD: &str = "WORKFLOW_PASSWORD";
pub const ENV_TOKEN: &str = "WORKFLOW_TOKEN";
pub const ENV_ALLOWED_PROJECT_PREFIXES: &str = "WORKFLOW_ALLOWED_PROJECT_PREFIXES";
pub const ENV_ALLOWED_BASE_URLS: &str = "WORKFLOW_ALLOWED_BASE_URLS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "WORKFLOW_REQUEST_TIMEOUT_MS";
pub const ENV_LOG_TOOL_CALLS: &str = "MCP_LOG_TOOL_CALLS";
pub const ENV_HOST: &str = "MCP_HOST";
pub const ENV_PORT: &str = "MCP_PORT";
pub const ENV_GATE_USERNAME: &str = "MCP_BASIC_AUTH_USERNAME";
pub const ENV_GATE_PASSWORD: &str = "MCP_BASIC_AUTH_PASSWORD";
pub const ENV_HEALTH_CHECK_PROJECT: &str = "MCP_HEALTH_CHECK_PROJECT";
pub const ENV_SESSION_IDLE_TIMEOUT_MS: &str = "MCP_SESSION_IDLE_TIMEOUT_MS";

/// On-disk shape of the optional config file. Every field may be overridden
/// from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub upstream: UpstreamSection,

    #[serde(default)]
    pub mcp: McpSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSection {
    /// Base URL of the platform, e.g. `https://bi.example.com`
    pub base_url: Option<String>,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Bearer token; takes precedence over username/password
    pub token: Option<String>,

    /// Project path prefixes tools may target (empty = any)
    #[serde(default)]
    pub allowed_project_prefixes: Vec<String>,

    /// Extra base URLs a caller may select instead of `base_url`
    #[serde(default)]
    pub allowed_base_urls: Vec<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpSection {
    /// Interface the HTTP transport binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP transport listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Emit a log line before and after every tool call
    #[serde(default = "default_log_tool_calls")]
    pub log_tool_calls: bool,

    /// Close HTTP sessions that see no traffic for this long
    #[serde(default = "default_session_idle_timeout_ms")]
    pub session_idle_timeout_ms: u64,

    pub basic_auth_username: Option<String>,
    pub basic_auth_password: Option<String>,

    /// Project whose parameters `/health` reads to check the upstream
    pub health_check_project: Option<String>,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            password: None,
            token: None,
            allowed_project_prefixes: Vec::new(),
            allowed_base_urls: Vec::new(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for McpSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_tool_calls: default_log_tool_calls(),
            session_idle_timeout_ms: default_session_idle_timeout_ms(),
            basic_auth_username: None,
            basic_auth_password: None,
            health_check_project: None,
        }
    }
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Username/password pair. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// How outbound requests authenticate against the platform.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    None,
    Basic(Credentials),
    Bearer(String),
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::None => f.write_str("None"),
            AuthMode::Basic(creds) => f.debug_tuple("Basic").field(creds).finish(),
            AuthMode::Bearer(_) => f.write_str("Bearer(***)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Inbound Basic gate on `/mcp`; only active when both halves are set
    pub basic_auth: Option<Credentials>,
    pub health_check_project: Option<String>,
    /// Sessions idle this long are closed and dropped from the table
    pub session_idle_timeout: Duration,
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_url: Url,
    pub auth: AuthMode,
    pub allowed_project_prefixes: Vec<String>,
    pub allowed_base_urls: Vec<Url>,
    pub request_timeout: Duration,
    pub log_tool_calls: bool,
    pub http: HttpConfig,
}

impl ServerConfig {
    /// Load from an optional TOML file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::from_lookup(file, |key| std::env::var(key).ok())
    }

    /// Build from a file config and a variable lookup. Blank variables count
    /// as unset.
    pub fn from_lookup<F>(file: FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let FileConfig { upstream, mcp } = file;

        let raw_base_url = env(ENV_BASE_URL)
            .or(upstream.base_url)
            .ok_or_else(|| Error::Config(format!("{} is required", ENV_BASE_URL)))?;
        let base_url = normalize_base_url(&raw_base_url)
            .map_err(|e| Error::Config(format!("{}: {}", ENV_BASE_URL, e)))?;

        let token = env(ENV_TOKEN).or(upstream.token);
        let basic = credential_pair(
            env(ENV_USERNAME).or(upstream.username),
            env(ENV_PASSWORD).or(upstream.password),
            ENV_USERNAME,
            ENV_PASSWORD,
        )?;
        let auth = match (token, basic) {
            (Some(token), _) => AuthMode::Bearer(token),
            (None, Some(creds)) => AuthMode::Basic(creds),
            (None, None) => AuthMode::None,
        };

        let prefixes = match env(ENV_ALLOWED_PROJECT_PREFIXES) {
            Some(list) => split_list(&list),
            None => upstream.allowed_project_prefixes,
        };
        let allowed_project_prefixes = prefixes
            .iter()
            .map(|p| normalize_prefix(p))
            .collect::<Result<Vec<_>>>()?;

        let raw_urls = match env(ENV_ALLOWED_BASE_URLS) {
            Some(list) => split_list(&list),
            None => upstream.allowed_base_urls,
        };
        let mut allowed_base_urls = Vec::with_capacity(raw_urls.len());
        for raw in &raw_urls {
            let url = normalize_base_url(raw)
                .map_err(|e| Error::Config(format!("{}: {}: {}", ENV_ALLOWED_BASE_URLS, raw, e)))?;
            if !allowed_base_urls.contains(&url) {
                allowed_base_urls.push(url);
            }
        }

        let timeout_ms = match env(ENV_REQUEST_TIMEOUT_MS) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Error::Config(format!("{} must be a positive integer, got {:?}", ENV_REQUEST_TIMEOUT_MS, raw))
            })?,
            None => upstream.request_timeout_ms,
        };
        if timeout_ms == 0 {
            return Err(Error::Config(format!("{} must be greater than zero", ENV_REQUEST_TIMEOUT_MS)));
        }

        let log_tool_calls = match env(ENV_LOG_TOOL_CALLS) {
            Some(raw) => parse_bool(ENV_LOG_TOOL_CALLS, &raw)?,
            None => mcp.log_tool_calls,
        };

        let port = match env(ENV_PORT) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("{} must be a port number, got {:?}", ENV_PORT, raw)))?,
            None => mcp.port,
        };

        let idle_ms = match env(ENV_SESSION_IDLE_TIMEOUT_MS) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Error::Config(format!("{} must be a positive integer, got {:?}", ENV_SESSION_IDLE_TIMEOUT_MS, raw))
            })?,
            None => mcp.session_idle_timeout_ms,
        };
        if idle_ms == 0 {
            return Err(Error::Config(format!("{} must be greater than zero", ENV_SESSION_IDLE_TIMEOUT_MS)));
        }

        let basic_auth = credential_pair(
            env(ENV_GATE_USERNAME).or(mcp.basic_auth_username),
            env(ENV_GATE_PASSWORD).or(mcp.basic_auth_password),
            ENV_GATE_USERNAME,
            ENV_GATE_PASSWORD,
        )?;

        let mut config = ServerConfig {
            base_url,
            auth,
            allowed_project_prefixes,
            allowed_base_urls,
            request_timeout: Duration::from_millis(timeout_ms),
            log_tool_calls,
            http: HttpConfig {
                host: env(ENV_HOST).unwrap_or(mcp.host),
                port,
                basic_auth,
                health_check_project: None,
                session_idle_timeout: Duration::from_millis(idle_ms),
            },
        };

        if let Some(project) = env(ENV_HEALTH_CHECK_PROJECT).or(mcp.health_check_project) {
            let project = config
                .validate_project_path(&project)
                .map_err(|e| Error::Config(format!("{}: {}", ENV_HEALTH_CHECK_PROJECT, e)))?;
            config.http.health_check_project = Some(project);
        }

        Ok(config)
    }

    /// Check a project path against the shape rules and the prefix
    /// allow-list. Returns the trimmed path.
    pub fn validate_project_path(&self, path: &str) -> Result<String> {
        let path = path.trim();
        if path.is_empty() {
            return Err(Error::InvalidProjectPath("project path must not be empty".into()));
        }
        if !path.starts_with('/') {
            return Err(Error::InvalidProjectPath(format!("{} must start with '/'", path)));
        }
        if path.split(['/', '\\']).any(|segment| segment == "..") {
            return Err(Error::InvalidProjectPath(format!("{} must not contain '..' segments", path)));
        }

        if !self.allowed_project_prefixes.is_empty()
            && !self
                .allowed_project_prefixes
                .iter()
                .any(|prefix| prefix_matches(prefix, path))
        {
            return Err(Error::ProjectNotAllowed {
                path: path.to_string(),
                allowed: self.allowed_project_prefixes.join(", "),
            });
        }

        Ok(path.to_string())
    }

    /// Pick the upstream base URL for one call. Overrides must already be
    /// registered; anything else is refused so callers cannot redirect
    /// requests to arbitrary hosts.
    pub fn resolve_base_url(&self, requested: Option<&str>) -> Result<Url> {
        let Some(raw) = requested.map(str::trim).filter(|r| !r.is_empty()) else {
            return Ok(self.base_url.clone());
        };

        let url = normalize_base_url(raw).map_err(|_| Error::BaseUrlNotAllowed(raw.to_string()))?;
        if url == self.base_url || self.allowed_base_urls.contains(&url) {
            Ok(url)
        } else {
            Err(Error::BaseUrlNotAllowed(url.to_string()))
        }
    }
}

/// Parse an http(s) URL, dropping query, fragment and trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(Error::Config("URL has no host".into()));
    }
    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    Ok(url)
}

fn normalize_prefix(raw: &str) -> Result<String> {
    let prefix = raw.trim();
    if !prefix.starts_with('/') {
        return Err(Error::Config(format!(
            "{}: prefix {:?} must start with '/'",
            ENV_ALLOWED_PROJECT_PREFIXES, prefix
        )));
    }
    let trimmed = prefix.trim_end_matches('/');
    Ok(if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() })
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn credential_pair(
    username: Option<String>,
    password: Option<String>,
    user_key: &str,
    pass_key: &str,
) -> Result<Option<Credentials>> {
    match (username, password) {
        (Some(username), Some(password)) => Ok(Some(Credentials { username, password })),
        (None, None) => Ok(None),
        _ => Err(Error::Config(format!("{} and {} must be set together", user_key, pass_key))),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{} must be true or false, got {:?}", key, raw))),
    }
}

// Default value functions

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3941
}

fn default_log_tool_calls() -> bool {
    true
}

fn default_session_idle_timeout_ms() -> u64 {
    30 * 60 * 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matches_on_segment_boundary() {
        assert!(prefix_matches("/mcptest", "/mcptest"));
        assert!(prefix_matches("/mcptest", "/mcptest/demo.iox"));
        assert!(!prefix_matches("/mcptest", "/mcptest2/demo.iox"));
        assert!(prefix_matches("/", "/anything/at/all.iox"));
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/a/b/").unwrap(), "/a/b");
        assert_eq!(normalize_prefix(" / ").unwrap(), "/");
        assert!(normalize_prefix("a/b").is_err());
    }

    #[test]
    fn test_normalize_base_url_strips_trailing_slash_and_query() {
        let url = normalize_base_url("https://BI.example.com/evo/?x=1#frag").unwrap();
        assert_eq!(url.as_str(), "https://bi.example.com/evo");

        let root = normalize_base_url("http://localhost:8080/").unwrap();
        assert_eq!(root, normalize_base_url("http://localhost:8080").unwrap());
    }

    #[test]
    fn test_normalize_base_url_rejects_other_schemes() {
        assert!(normalize_base_url("ftp://example.com").is_err());
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("K", "YES").unwrap());
        assert!(!parse_bool("K", "off").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = AuthMode::Basic(Credentials {
            username: "alice".into(),
            password: "hunter2".into(),
        });
        let printed = format!("{:?}", auth);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
        assert!(!format!("{:?}", AuthMode::Bearer("secret".into())).contains("secret"));
    }
}
