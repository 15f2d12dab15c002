use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;

/// Environment variable prefix for overrides, e.g. `TRACEMSG_STORE__URI`.
pub const ENV_PREFIX: &str = "TRACEMSG";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TraceConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// `"mongodb"` or `"memory"`
    pub backend: String,
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub max_pool_size: u32,
    pub connect_timeout_seconds: u64,
    pub server_selection_timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "mongodb".to_string(),
            uri: "mongodb://127.0.0.1:27017".to_string(),
            database: "exampleDb".to_string(),
            collection: "trace_msgs".to_string(),
            max_pool_size: 10,
            connect_timeout_seconds: 10,
            server_selection_timeout_seconds: 5,
        }
    }
}

impl TraceConfig {
    /// Load from an optional TOML file, then apply `TRACEMSG_*` environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// `env` replaces the process environment when set.
    fn load_with_env(path: &str, env: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;
        s.try_deserialize()
    }
}
