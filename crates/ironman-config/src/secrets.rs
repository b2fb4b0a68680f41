//! Runtime credential resolution for the upstream order sources.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"WOO_CONSUMER_KEY"`).
//! - At startup the binary calls [`resolve_secrets`] once and passes the
//!   result into the adapter constructors.
//! - `Debug` impls on all credential structs **redact** values.
//! - Error messages reference the env var **NAME**, never the value.
//!
//! A source whose `base_url` is empty is disabled and needs no credentials.
//! An enabled source with a missing credential is a startup error.

use anyhow::{bail, Result};

use crate::DashboardConfig;

#[derive(Clone)]
pub struct WooCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl std::fmt::Debug for WooCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WooCredentials")
            .field("consumer_key", &"<REDACTED>")
            .field("consumer_secret", &"<REDACTED>")
            .finish()
    }
}

#[derive(Clone)]
pub struct OrderspaceCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OrderspaceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderspaceCredentials")
            .field("client_id", &"<REDACTED>")
            .field("client_secret", &"<REDACTED>")
            .finish()
    }
}

/// Credentials for every enabled source. `None` means the source is disabled.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub woo: Option<WooCredentials>,
    pub orderspace: Option<OrderspaceCredentials>,
}

/// Resolve credentials from the process environment.
pub fn resolve_secrets(cfg: &DashboardConfig) -> Result<ResolvedSecrets> {
    resolve_secrets_with(cfg, |name| std::env::var(name).ok())
}

/// Resolve credentials through `lookup` (env var name -> value).
///
/// # Errors
/// Returns `Err` naming the first missing env var of an enabled source.
pub fn resolve_secrets_with<F>(cfg: &DashboardConfig, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let resolve = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let woo = if cfg.woo.is_enabled() {
        let names = &cfg.woo.keys_env;
        let Some(consumer_key) = resolve(&names.consumer_key) else {
            bail!(
                "SECRETS_MISSING source=woocommerce: required env var '{}' \
                 (consumer_key) is not set or empty",
                names.consumer_key
            );
        };
        let Some(consumer_secret) = resolve(&names.consumer_secret) else {
            bail!(
                "SECRETS_MISSING source=woocommerce: required env var '{}' \
                 (consumer_secret) is not set or empty",
                names.consumer_secret
            );
        };
        Some(WooCredentials {
            consumer_key,
            consumer_secret,
        })
    } else {
        None
    };

    let orderspace = if cfg.orderspace.is_enabled() {
        let names = &cfg.orderspace.keys_env;
        let Some(client_id) = resolve(&names.client_id) else {
            bail!(
                "SECRETS_MISSING source=orderspace: required env var '{}' \
                 (client_id) is not set or empty",
                names.client_id
            );
        };
        let Some(client_secret) = resolve(&names.client_secret) else {
            bail!(
                "SECRETS_MISSING source=orderspace: required env var '{}' \
                 (client_secret) is not set or empty",
                names.client_secret
            );
        };
        Some(OrderspaceCredentials {
            client_id,
            client_secret,
        })
    } else {
        None
    };

    Ok(ResolvedSecrets { woo, orderspace })
}
