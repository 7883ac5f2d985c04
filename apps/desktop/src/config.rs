use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::{ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_PAGE_SIZE};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "jobsift.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub database_url: String,
    pub page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            database_url: "sqlite://./data/jobsift.db".into(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_base_url: self.api_base_url.clone(),
            page_size: self.page_size.max(1),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }
}

/// Keys accepted in `jobsift.toml`; all optional.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    database_url: Option<String>,
    page_size: Option<u32>,
    request_timeout_secs: Option<u64>,
}

pub fn load_settings(config_path: &Path) -> anyhow::Result<Settings> {
    load_settings_with(config_path, |key| std::env::var(key).ok())
}

/// Defaults, then the config file, then the environment.
pub fn load_settings_with(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if config_path.exists() {
        let raw = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", config_path.display()))?;
        if let Some(v) = file_cfg.api_base_url {
            settings.api_base_url = v;
        }
        if let Some(v) = file_cfg.database_url {
            settings.database_url = v;
        }
        if let Some(v) = file_cfg.page_size {
            settings.page_size = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            settings.request_timeout_secs = v;
        }
    }

    if let Some(v) = env("JOBSIFT_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("JOBSIFT_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__PAGE_SIZE") {
        settings.page_size = v
            .trim()
            .parse()
            .with_context(|| format!("APP__PAGE_SIZE must be a positive integer, got '{v}'"))?;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v.trim().parse().with_context(|| {
            format!("APP__REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{v}'")
        })?;
    }

    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}
