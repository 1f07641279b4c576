use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

/// Which [`crate::store::RouteStore`] implementation to construct at
/// startup. Resolved once, here, rather than loaded dynamically — there is
/// no runtime plugin mechanism.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Database,
}

/// Top-level configuration for the proxy process.
///
/// Loaded via `figment`: an optional YAML file merged with `CHP_`-prefixed
/// environment variable overrides, mirroring the donor's
/// `AndoConfig::load` (`Yaml::file` + `Env::prefixed("ANDO_").split("__")`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Data-plane listen address.
    #[serde(default = "default_ip")]
    pub ip: IpAddr,

    /// Data-plane listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Control-plane listen address.
    #[serde(default = "default_ip")]
    pub api_ip: IpAddr,

    /// Control-plane listen port. Defaults to `port + 1`, resolved by
    /// [`GatewayConfig::effective_api_port`] when left unset.
    #[serde(default)]
    pub api_port: Option<u16>,

    /// Seed a route for `/` at startup, if set.
    #[serde(default)]
    pub default_target: Option<String>,

    /// Custom error-target base URL (mode 1 of the error pipeline).
    /// Mutually exclusive with `error_path`.
    #[serde(default)]
    pub error_target: Option<String>,

    /// Directory of static error pages (mode 2 of the error pipeline).
    /// Mutually exclusive with `error_target`.
    #[serde(default)]
    pub error_path: Option<PathBuf>,

    /// When true, the first path segment is synthesized from the `Host`
    /// header before trie lookup. Known-limited; see DESIGN.md.
    #[serde(default)]
    pub host_routing: bool,

    /// Bearer token required on the control-plane API. Falls back to the
    /// `CONFIGPROXY_AUTH_TOKEN` environment variable when unset here.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Total forwarder timeout, in seconds. Unset means unbounded.
    #[serde(default)]
    pub timeout: Option<f64>,

    /// Upstream connect/response wait timeout, in seconds. Unset means
    /// unbounded.
    #[serde(default)]
    pub proxy_timeout: Option<f64>,

    /// Extra headers merged into every forwarded request.
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,

    /// Add `X-Forwarded-For`/`-Proto`/`-Host` to forwarded requests.
    #[serde(default = "default_true")]
    pub x_forward: bool,

    /// Concatenate the target's path with the request path rather than
    /// replacing it.
    #[serde(default = "default_true")]
    pub prepend_path: bool,

    /// Keep the matched prefix in the forwarded path.
    #[serde(default = "default_true")]
    pub include_prefix: bool,

    /// Which [`RouteStore`](crate::store::RouteStore) implementation to
    /// construct.
    #[serde(default)]
    pub storage_backend: StorageBackend,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            api_ip: default_ip(),
            api_port: None,
            default_target: None,
            error_target: None,
            error_path: None,
            host_routing: false,
            auth_token: None,
            timeout: None,
            proxy_timeout: None,
            custom_headers: HashMap::new(),
            x_forward: true,
            prepend_path: true,
            include_prefix: true,
            storage_backend: StorageBackend::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from an optional YAML file plus `CHP_`-prefixed
    /// environment overrides.
    pub fn load(config_path: Option<&PathBuf>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(figment::providers::Serialized::defaults(
            GatewayConfig::default(),
        ));

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("CHP_").split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the startup invariants that the CLI/config loader must reject
    /// before the proxy ever binds a socket.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.error_target.is_some() && self.error_path.is_some() {
            anyhow::bail!("error_target and error_path are mutually exclusive");
        }
        Ok(())
    }

    /// Control-plane port, defaulting to `port + 1` when unset.
    pub fn effective_api_port(&self) -> u16 {
        self.api_port.unwrap_or(self.port.wrapping_add(1))
    }

    /// Resolve the bearer token: config value takes precedence over the
    /// `CONFIGPROXY_AUTH_TOKEN` environment variable.
    pub fn effective_auth_token(&self) -> Option<String> {
        self.auth_token
            .clone()
            .or_else(|| std::env::var("CONFIGPROXY_AUTH_TOKEN").ok())
    }
}

fn default_ip() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}
