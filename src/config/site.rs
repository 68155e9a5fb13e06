//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable consulted when `cms.access_token` is empty
pub const ACCESS_TOKEN_ENV: &str = "PRISMIC_ACCESS_TOKEN";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub language: String,
    pub timezone: String,

    // Directory
    pub public_dir: String,

    // Revalidation window, in seconds
    pub revalidate: u64,
    // How long a request for an unknown post waits before the loading page, in seconds
    pub fallback_wait: u64,

    // Content source
    #[serde(default)]
    pub cms: CmsConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            language: "pt-BR".to_string(),
            timezone: "UTC".to_string(),

            public_dir: "public".to_string(),

            revalidate: 24 * 60 * 60,
            fallback_wait: 3,

            cms: CmsConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let mut config: SiteConfig = serde_yaml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Fill the access token from the environment when the file leaves it empty
    pub fn apply_env(&mut self) {
        if self.cms.access_token.is_empty() {
            if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
                tracing::debug!("Using access token from {}", ACCESS_TOKEN_ENV);
                self.cms.access_token = token;
            }
        }
    }

    /// Parsed display timezone
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone {:?}: {}", self.timezone, e))
    }

    pub fn revalidate_window(&self) -> Duration {
        Duration::from_secs(self.revalidate)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_wait)
    }
}

/// Prismic repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    /// API entry point, e.g. `https://my-repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: String,
    /// Custom type of blog posts
    pub document_type: String,
    /// Posts per listing page
    pub page_size: usize,
    /// Per-request timeout, in seconds
    pub timeout: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: String::new(),
            document_type: "post".to_string(),
            page_size: 2,
            timeout: 10,
            retry: RetryConfig::default(),
        }
    }
}

impl CmsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Bound for one page load with every retry and backoff included
    pub fn page_timeout(&self) -> Duration {
        let attempts = self.retry.max_retries + 1;
        let backoff = Duration::from_millis(self.retry.max_backoff_ms) * self.retry.max_retries;
        self.request_timeout() * attempts + backoff
    }
}

/// Retry policy with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_backoff_ms: 200,
            max_backoff_ms: 2000,
            backoff_multiplier: 2.0,
        }
    }
}
