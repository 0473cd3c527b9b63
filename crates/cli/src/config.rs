use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bankfeed_client::{ClientConfig, DEFAULT_TIMEOUT};
use bankfeed_core::DEFAULT_CURRENCY;
use bankfeed_import::FieldMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const ENV_BASE_URL: &str = "BANKFEED_BASE_URL";
pub const ENV_COMPANY_ID: &str = "BANKFEED_COMPANY_ID";
pub const ENV_TOKEN: &str = "BANKFEED_TOKEN";

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub import: ImportSettings,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub company_id: Option<String>,
    pub token: Option<SecretString>,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            company_id: None,
            token: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl ApiSettings {
    pub fn client_config(&self) -> Result<ClientConfig> {
        let Some(company_id) = self.company_id.as_deref().filter(|c| !c.trim().is_empty()) else {
            bail!("No company id configured; set api.company_id or {ENV_COMPANY_ID}");
        };
        let mut config = ClientConfig::new(&self.base_url, company_id);
        config.token = self
            .token
            .as_ref()
            .map(|t| SecretString::new(t.expose_secret().clone()));
        config.timeout = Duration::from_secs(self.timeout_secs.max(1));
        Ok(config)
    }
}

/// Defaults for `bankfeed import`; command-line flags win.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub delimiter: String,
    pub has_header: bool,
    pub currency: String,
    pub field_map: FieldMap,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            has_header: true,
            currency: DEFAULT_CURRENCY.to_string(),
            field_map: FieldMap::default(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "bankfeed", "bankfeed")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Settings {
    /// Reads `explicit` if given (it must exist), else the platform config
    /// file if present, then applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let settings = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(settings)
    }

    /// Non-empty environment values replace the file's API settings.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(base_url) = var(ENV_BASE_URL) {
            self.api.base_url = base_url;
        }
        if let Some(company_id) = var(ENV_COMPANY_ID) {
            self.api.company_id = Some(company_id);
        }
        if let Some(token) = var(ENV_TOKEN) {
            self.api.token = Some(SecretString::new(token));
        }
    }
}
