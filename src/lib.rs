//! spacetraveling: a statically generated blog over a Prismic repository
//!
//! Posts are fetched from the CMS, normalized into view models and rendered
//! with embedded Tera templates. The listing page grows incrementally by
//! following the CMS continuation URL.

pub mod cache;
pub mod cms;
pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod helpers;
pub mod i18n;
pub mod pagination;
pub mod server;
pub mod templates;

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::helpers::{DateFormatter, DisplayLocale};

/// The blog application
#[derive(Debug, Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
}

impl Blog {
    /// Create a new Blog instance from a directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            let mut config = config::SiteConfig::default();
            config.apply_env();
            config
        };

        Ok(Self::with_config(base_dir, config))
    }

    /// Create a Blog with an explicit configuration
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let public_dir = base_dir.join(&config.public_dir);
        Self {
            config,
            base_dir,
            public_dir,
        }
    }

    /// Client for the configured Prismic repository
    pub fn cms_client(&self) -> Result<cms::PrismicClient> {
        if self.config.cms.endpoint.trim().is_empty() {
            bail!("No CMS endpoint configured, set cms.endpoint in _config.yml");
        }
        Ok(cms::PrismicClient::new(&self.config.cms)?)
    }

    /// Normalizer formatting dates in the site language and timezone
    pub fn normalizer(&self) -> Result<content::Normalizer> {
        let locale = DisplayLocale::from_tag(&self.config.language);
        let dates = DateFormatter::new(locale, self.config.tz()?);
        Ok(content::Normalizer::new(dates))
    }

    /// Generate the static site
    pub async fn generate(&self, force: bool) -> Result<()> {
        commands::generate::run(self, force).await
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
