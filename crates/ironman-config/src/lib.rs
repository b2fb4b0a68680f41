//! ironman-config
//!
//! Layered YAML configuration for the orders dashboard.
//!
//! Documents are merged in order (earlier = base, later = override), checked
//! for literal credentials, hashed, and finally projected onto the typed
//! [`DashboardConfig`]. Credentials themselves never live in YAML: the config
//! only names the env vars that hold them (see [`secrets`]).

pub mod secrets;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub use secrets::{
    resolve_secrets, resolve_secrets_with, OrderspaceCredentials, ResolvedSecrets,
    WooCredentials,
};

/// Known credential-like prefixes. If any leaf string value in the effective
/// config starts with one of these, loading aborts with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "ck_",        // WooCommerce consumer key
    "cs_",        // WooCommerce consumer secret
    "sk-",        // OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
];

/// Upper bound for any page size or fetch batch the dashboard will accept.
pub const MAX_PAGE_SIZE: u32 = 100;

// ---------------------------------------------------------------------------
// Raw layered config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Project the merged JSON onto [`DashboardConfig`]. Missing keys take
    /// their defaults.
    pub fn typed(&self) -> Result<DashboardConfig> {
        let cfg: DashboardConfig = serde_json::from_value(self.config_json.clone())
            .context("config does not match the dashboard schema")?;
        Ok(cfg)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty overlay file parses as null; it must not wipe the base.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json =
        serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

// ---------------------------------------------------------------------------
// Typed config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub pagination: PaginationConfig,
    pub woo: WooConfig,
    pub orderspace: OrderspaceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout for upstream API calls.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Staleness threshold and background refresh interval.
    pub ttl_secs: u64,
    /// Orders requested from each source per refresh.
    pub fetch_limit: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            fetch_limit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: 10,
            max_per_page: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WooKeysEnv {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl Default for WooKeysEnv {
    fn default() -> Self {
        Self {
            consumer_key: "WOO_CONSUMER_KEY".to_string(),
            consumer_secret: "WOO_CONSUMER_SECRET".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WooConfig {
    /// Store root, e.g. `https://shop.example.com`. Empty disables the source.
    pub base_url: String,
    pub keys_env: WooKeysEnv,
}

impl WooConfig {
    pub fn is_enabled(&self) -> bool {
        !self.base_url.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderspaceKeysEnv {
    pub client_id: String,
    pub client_secret: String,
}

impl Default for OrderspaceKeysEnv {
    fn default() -> Self {
        Self {
            client_id: "ORDERSPACE_CLIENT_ID".to_string(),
            client_secret: "ORDERSPACE_CLIENT_SECRET".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderspaceConfig {
    /// API root, e.g. `https://api.orderspace.com`. Empty disables the source.
    pub base_url: String,
    /// OAuth token endpoint; `<base_url>/oauth/token` when absent.
    pub token_url: Option<String>,
    pub keys_env: OrderspaceKeysEnv,
}

impl OrderspaceConfig {
    pub fn is_enabled(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    pub fn effective_token_url(&self) -> String {
        match self.token_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{}/oauth/token", self.base_url.trim_end_matches('/')),
        }
    }
}

impl DashboardConfig {
    /// Apply env-var overrides on top of the YAML layers.
    ///
    /// Precedence: defaults < YAML layers < environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("WOO_BASE_URL") {
            self.woo.base_url = v;
        }
        if let Some(v) = get("ORDERSPACE_BASE_URL") {
            self.orderspace.base_url = v;
        }
        if let Some(v) = get("IRONMAN_ADDR") {
            self.server.addr = v;
        }
        if let Some(v) = get("IRONMAN_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Reject values the cache and pagination layers cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_secs == 0 {
            bail!("CONFIG_INVALID cache.ttl_secs must be > 0");
        }
        if self.cache.fetch_limit == 0 || self.cache.fetch_limit > MAX_PAGE_SIZE {
            bail!(
                "CONFIG_INVALID cache.fetch_limit must be in 1..={}, got {}",
                MAX_PAGE_SIZE,
                self.cache.fetch_limit
            );
        }
        let p = &self.pagination;
        if p.max_per_page == 0 || p.max_per_page > MAX_PAGE_SIZE {
            bail!(
                "CONFIG_INVALID pagination.max_per_page must be in 1..={}, got {}",
                MAX_PAGE_SIZE,
                p.max_per_page
            );
        }
        if p.default_per_page == 0 || p.default_per_page > p.max_per_page {
            bail!(
                "CONFIG_INVALID pagination.default_per_page must be in 1..={}, got {}",
                p.max_per_page,
                p.default_per_page
            );
        }
        if self.http.timeout_secs == 0 {
            bail!("CONFIG_INVALID http.timeout_secs must be > 0");
        }
        Ok(())
    }
}
