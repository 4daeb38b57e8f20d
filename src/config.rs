//! Server configuration loading.
//!
//! Settings come from built-in defaults, then an optional `key = value` file,
//! then `SHARELINK_*` environment variables. Command-line flags are applied by
//! the binary on top of the result.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::cache::DEFAULT_CACHE_TTL;
use crate::fetch::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOP_TIMEOUT_SECS, DEFAULT_MAX_HOPS};
use crate::resolver::DEFAULT_BASE_URL;
use crate::user_agent;

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

const ENV_COOKIE: &str = "SHARELINK_COOKIE";
const ENV_BASE_URL: &str = "SHARELINK_BASE_URL";
const ENV_BIND: &str = "SHARELINK_BIND";

/// Fully resolved runtime settings.
#[derive(Clone)]
pub struct ServerConfig {
    /// Listen address for `serve`.
    pub bind: SocketAddr,
    /// Upstream origin.
    pub base_url: String,
    /// User-Agent presented on negotiation hops.
    pub user_agent: String,
    /// Static session cookie used when no stored cookie exists.
    pub cookie: String,
    /// Directory for the persisted session cookie; in-memory when unset.
    pub cookie_dir: Option<PathBuf>,
    /// Lifetime of cached resolutions, in seconds.
    pub cache_ttl_secs: u64,
    /// Per-hop request timeout, in seconds.
    pub hop_timeout_secs: u64,
    /// Connect timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// Redirect hop budget per fetch.
    pub max_hops: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: user_agent::default_browser_user_agent(),
            cookie: String::new(),
            cookie_dir: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            hop_timeout_secs: DEFAULT_HOP_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cookie = if self.cookie.is_empty() {
            "<unset>"
        } else {
            "[REDACTED]"
        };
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("cookie", &cookie)
            .field("cookie_dir", &self.cookie_dir)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("hop_timeout_secs", &self.hop_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_hops", &self.max_hops)
            .finish()
    }
}

impl ServerConfig {
    /// Cache lifetime as a [`Duration`].
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Per-hop timeout as a [`Duration`].
    #[must_use]
    pub fn hop_timeout(&self) -> Duration {
        Duration::from_secs(self.hop_timeout_secs)
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range field.
    pub fn validate(&self) -> Result<()> {
        validate_range("hop_timeout_secs", self.hop_timeout_secs, 1, 120)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 120)?;
        validate_range("cache_ttl_secs", self.cache_ttl_secs, 1, 86_400)?;
        validate_range("max_hops", self.max_hops as u64, 1, 50)?;

        let base = url::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid config value for `base_url`: '{}'", self.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            bail!(
                "Invalid config value for `base_url`: '{}'. Expected an http(s) URL",
                self.base_url
            );
        }
        if self.user_agent.trim().is_empty() {
            bail!("Invalid config value for `user_agent`: must not be empty");
        }
        Ok(())
    }

    /// Applies `SHARELINK_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error when `SHARELINK_BIND` is not a socket address.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(cookie) = non_empty(ENV_COOKIE) {
            self.cookie = cookie.trim().to_string();
        }
        if let Some(base_url) = non_empty(ENV_BASE_URL) {
            self.base_url = base_url.trim().to_string();
        }
        if let Some(bind) = non_empty(ENV_BIND) {
            self.bind = bind
                .trim()
                .parse()
                .with_context(|| format!("Invalid `{ENV_BIND}` value '{bind}'"))?;
        }
        Ok(())
    }
}

fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/sharelink/config.toml`
/// 2. `$HOME/.config/sharelink/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("sharelink")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("sharelink")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads configuration from `path` (or the default path when it exists),
/// then applies environment overrides and validates the result.
///
/// # Errors
///
/// Returns an error when an explicit `path` cannot be read, when the file is
/// malformed, or when a value is out of range.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let mut config = match path {
        Some(path) => load_file_config(path)?,
        None => match resolve_default_config_path() {
            Some(default_path) if default_path.exists() => load_file_config(&default_path)?,
            _ => ServerConfig::default(),
        },
    };
    config.apply_env_overrides(|name| env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

fn load_file_config(path: &Path) -> Result<ServerConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<ServerConfig> {
    let mut cfg = ServerConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "bind" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.bind = parsed.parse().with_context(invalid)?;
            }
            "base_url" => cfg.base_url = parse_string_literal(value).with_context(invalid)?,
            "user_agent" => cfg.user_agent = parse_string_literal(value).with_context(invalid)?,
            "cookie" => cfg.cookie = parse_string_literal(value).with_context(invalid)?,
            "cookie_dir" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.cookie_dir = Some(PathBuf::from(parsed));
            }
            "cache_ttl_secs" => cfg.cache_ttl_secs = parse_integer_u64(value).with_context(invalid)?,
            "hop_timeout_secs" => {
                cfg.hop_timeout_secs = parse_integer_u64(value).with_context(invalid)?;
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = parse_integer_u64(value).with_context(invalid)?;
            }
            "max_hops" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.max_hops = usize::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_hops out of range for usize"))?;
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}
