use std::env;
use std::path::PathBuf;

use crate::directory::DirectoryShape;
use crate::query::QueryShape;

#[derive(Debug, Clone)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Event log backend
    pub hires_api_url: String,
    pub hires_api_cookie: Option<String>,
    pub hires_api_timeout_seconds: u64,

    // Deployment variant
    pub directory_shape: DirectoryShape,
    pub query_shape: QueryShape,
    pub classification_rules_path: Option<PathBuf>,

    // API settings
    pub api_host: String,
    pub api_port: u16,
    pub upstream_concurrent_limit: usize,

    // Caching
    pub cache_ttl_seconds: u64,
    pub cache_max_rows: u64,

    // Application metadata
    pub deployment: Deployment,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if a required variable is not set and
    /// `ConfigError::Invalid` if a shape selector has an unknown value.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let directory_shape = env::var("DIRECTORY_SHAPE").unwrap_or_else(|_| "paired".to_string());
        let query_shape = env::var("QUERY_SHAPE").unwrap_or_else(|_| "range".to_string());

        Ok(Self {
            // Event log backend
            hires_api_url: env::var("HIRES_API_URL")
                .map_err(|_| ConfigError::Missing("HIRES_API_URL"))?
                .trim_end_matches('/')
                .to_string(),
            hires_api_cookie: env::var("HIRES_API_COOKIE").ok().filter(|c| !c.is_empty()),
            hires_api_timeout_seconds: env::var("HIRES_API_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),

            // Deployment variant
            directory_shape: directory_shape
                .parse()
                .map_err(|_| ConfigError::Invalid("DIRECTORY_SHAPE", directory_shape.clone()))?,
            query_shape: query_shape
                .parse()
                .map_err(|_| ConfigError::Invalid("QUERY_SHAPE", query_shape.clone()))?,
            classification_rules_path: env::var("CLASSIFICATION_RULES_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),

            // API settings
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            upstream_concurrent_limit: env::var("UPSTREAM_CONCURRENT_LIMIT")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .unwrap_or(8),

            // Caching
            cache_ttl_seconds: env::var("CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            cache_max_rows: env::var("CACHE_MAX_ROWS")
                .unwrap_or_else(|_| "500000".to_string())
                .parse()
                .unwrap_or(500_000),

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    /// Configuration pointing at `hires_api_url` with every other setting at
    /// its default.
    #[must_use]
    pub fn with_api_url(hires_api_url: impl Into<String>) -> Self {
        Self {
            hires_api_url: hires_api_url.into(),
            hires_api_cookie: None,
            hires_api_timeout_seconds: 60,
            directory_shape: DirectoryShape::Paired,
            query_shape: QueryShape::Range,
            classification_rules_path: None,
            api_host: "0.0.0.0".to_string(),
            api_port: 3000,
            upstream_concurrent_limit: 8,
            cache_ttl_seconds: 300,
            cache_max_rows: 500_000,
            deployment: Deployment::Local,
        }
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
