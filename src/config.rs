use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

const CONFIG_FILE: &str = "companydir";
const ENV_PREFIX: &str = "COMPANYDIR";

/// Tool-wide settings: defaults, then `companydir.toml`, then
/// `COMPANYDIR__*` environment variables. CLI flags override on top.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub store_dir: PathBuf,
    pub logo_dir: PathBuf,
    /// Prefix written into a record's `logo` field.
    pub logo_prefix: String,
    pub index_path: PathBuf,
    pub sitemap_path: PathBuf,
    pub site_url: String,
    pub http: HttpSettings,
    pub batch: BatchSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub linkedin_timeout_secs: u64,
    pub verify_ssl: bool,
    pub user_agent: String,
    pub accept_language: String,
    /// Bodies larger than this are used even when the status is an error.
    pub min_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchSettings {
    pub workers: usize,
    pub delay_ms: u64,
    pub linkedin_delay_ms: u64,
    pub logo_delay_ms: u64,
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    pub fn load() -> Result<Settings> {
        let settings: Settings = Self::builder()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to assemble configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        debug!(?settings, "configuration loaded");
        Ok(settings)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = Config::builder()
            .set_default("store_dir", "public/data/company")?
            .set_default("logo_dir", "public/img/company")?
            .set_default("logo_prefix", "img/company")?
            .set_default("index_path", "public/data/companies.json")?
            .set_default("sitemap_path", "docs/sitemap.xml")?
            .set_default("site_url", "https://bufirmanasil.com.tr")?
            .set_default("http.timeout_secs", 10)?
            .set_default("http.linkedin_timeout_secs", 30)?
            .set_default("http.verify_ssl", false)?
            .set_default(
                "http.user_agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
            )?
            .set_default("http.accept_language", "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7")?
            .set_default("http.min_body_bytes", 1000)?
            .set_default("batch.workers", 1)?
            .set_default("batch.delay_ms", 500)?
            .set_default("batch.linkedin_delay_ms", 5000)?
            .set_default("batch.logo_delay_ms", 1000)?;
        Ok(builder)
    }

    #[cfg(test)]
    pub fn defaults() -> Settings {
        Self::builder()
            .and_then(|b| Ok(b.build()?))
            .and_then(|c| Ok(c.try_deserialize()?))
            .unwrap()
    }
}
