//! Layered application configuration
//!
//! Defaults, then `config/default` and `config/local`, then an optional
//! explicit file, then `TALKAI__*` environment variables.

use anyhow::Result;
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener
    pub server: ServerConfig,
    /// Log output
    pub logging: LoggingConfig,
    /// reCAPTCHA verification
    pub recaptcha: RecaptchaConfig,
    /// Hume token exchange
    pub hume: HumeConfig,
    /// Supabase project
    pub supabase: SupabaseConfig,
    /// Same-origin token fetch
    pub client: ClientConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Allowed CORS origins; empty allows any
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level
    pub level: String,
    /// Daily-rolled JSON log file
    #[serde(default)]
    pub file_path: Option<String>,
    /// `json` or `text`
    pub format: String,
}

/// reCAPTCHA settings
#[derive(Clone, Serialize, Deserialize)]
pub struct RecaptchaConfig {
    /// Server-side secret; verification is refused without it
    #[serde(default)]
    pub secret_key: Option<String>,
    /// siteverify endpoint
    pub verify_url: String,
}

/// Hume credentials and endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct HumeConfig {
    /// API key
    #[serde(default)]
    pub api_key: Option<String>,
    /// Secret key
    #[serde(default)]
    pub secret_key: Option<String>,
    /// OAuth2 client-credentials endpoint
    pub token_url: String,
}

/// Supabase project settings
#[derive(Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL
    #[serde(default)]
    pub url: Option<String>,
    /// Anonymous API key
    #[serde(default)]
    pub anon_key: Option<String>,
}

/// Settings for fetching tokens from a running server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server origin
    pub base_url: String,
    /// Timeout for outbound requests
    pub request_timeout_secs: u64,
}

fn redact(value: Option<&String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for RecaptchaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecaptchaConfig")
            .field("secret_key", &redact(self.secret_key.as_ref()))
            .field("verify_url", &self.verify_url)
            .finish()
    }
}

impl fmt::Debug for HumeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HumeConfig")
            .field("api_key", &redact(self.api_key.as_ref()))
            .field("secret_key", &redact(self.secret_key.as_ref()))
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &redact(self.anon_key.as_ref()))
            .finish()
    }
}

/// Google siteverify endpoint
pub const DEFAULT_RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
/// Hume OAuth2 token endpoint
pub const DEFAULT_HUME_TOKEN_URL: &str = "https://api.hume.ai/oauth2-cc/token";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                cors_allowed_origins: Vec::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            recaptcha: RecaptchaConfig {
                secret_key: None,
                verify_url: DEFAULT_RECAPTCHA_VERIFY_URL.to_string(),
            },
            hume: HumeConfig {
                api_key: None,
                secret_key: None,
                token_url: DEFAULT_HUME_TOKEN_URL.to_string(),
            },
            supabase: SupabaseConfig { url: None, anon_key: None },
            client: ClientConfig {
                base_url: "http://127.0.0.1:3000".to_string(),
                request_timeout_secs: 10,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        Self::load_with_env(None)
    }

    /// Load from files and `TALKAI__*` variables, then apply the vendor variables
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut app_config = Self::load_from(path)?;
        app_config.apply_env_overrides();
        app_config.validate()?;
        Ok(app_config)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults(Config::builder())?
            // Add config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Add environment variables with prefix, e.g. TALKAI__SERVER__PORT
            .add_source(Environment::with_prefix("TALKAI").separator("__"))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    fn defaults(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        let defaults = Self::default();
        builder
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("server.cors_allowed_origins", Vec::<String>::new())?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .set_default("recaptcha.verify_url", defaults.recaptcha.verify_url)?
            .set_default("hume.token_url", defaults.hume.token_url)?
            .set_default("client.base_url", defaults.client.base_url)?
            .set_default("client.request_timeout_secs", defaults.client.request_timeout_secs)
    }

    /// Apply the well-known vendor variables used by the web deployments
    pub fn apply_env_overrides(&mut self) {
        if let Some(secret) = env_non_empty("RECAPTCHA_SECRET_KEY") {
            self.recaptcha.secret_key = Some(secret);
        }
        if let Some(key) = env_non_empty("HUME_API_KEY") {
            self.hume.api_key = Some(key);
        }
        if let Some(secret) = env_non_empty("HUME_SECRET_KEY") {
            self.hume.secret_key = Some(secret);
        }
        if let Some(url) = env_non_empty("SUPABASE_URL") {
            self.supabase.url = Some(url);
        }
        if let Some(key) = env_non_empty("SUPABASE_ANON_KEY") {
            self.supabase.anon_key = Some(key);
        }
        if let Some(port) = env_non_empty("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate server config
        if self.server.host.trim().is_empty() {
            return Err(anyhow::anyhow!("server.host must not be empty"));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        // Validate endpoint URLs
        for (name, url) in [
            ("recaptcha.verify_url", Some(&self.recaptcha.verify_url)),
            ("hume.token_url", Some(&self.hume.token_url)),
            ("client.base_url", Some(&self.client.base_url)),
            ("supabase.url", self.supabase.url.as_ref()),
        ] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(anyhow::anyhow!("{} must be an http(s) URL: {}", name, url));
                }
            }
        }

        if self.client.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("request_timeout_secs must be greater than 0"));
        }

        Ok(())
    }

    /// Socket address string the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Hume credentials, when both halves are configured
    pub fn hume_credentials(&self) -> Option<(String, String)> {
        match (&self.hume.api_key, &self.hume.secret_key) {
            (Some(key), Some(secret)) => Some((key.clone(), secret.clone())),
            _ => None,
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
