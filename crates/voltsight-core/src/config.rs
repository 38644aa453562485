//! Runtime configuration
//!
//! Resolved from an optional TOML file, then overridden by environment
//! variables. API keys are only ever read from here and are redacted from
//! `Debug` output.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WorkflowError};
use crate::normalize::AnalysisWindow;
use crate::onboarding::PollPolicy;

pub const CONFIG_PATH_ENV: &str = "VOLTSIGHT_CONFIG";
pub const PROVIDER_API_KEY_ENV: &str = "PROVIDER_API_KEY";
pub const PREDICTION_API_KEY_ENV: &str = "PREDICTION_API_KEY";
pub const PROVIDER_DOMAIN_ENV: &str = "PROVIDER_DOMAIN";
pub const PROVIDER_BASE_URL_ENV: &str = "PROVIDER_BASE_URL";
pub const PREDICTION_URL_ENV: &str = "PREDICTION_URL";
pub const UTILITY_ENV: &str = "VOLTSIGHT_UTILITY";
pub const CONTACT_EMAIL_ENV: &str = "VOLTSIGHT_CONTACT_EMAIL";
pub const ANALYSIS_YEAR_ENV: &str = "VOLTSIGHT_ANALYSIS_YEAR";
pub const HTTP_TIMEOUT_ENV: &str = "VOLTSIGHT_HTTP_TIMEOUT_SECS";
pub const POLL_INTERVAL_ENV: &str = "VOLTSIGHT_POLL_INTERVAL_SECS";
pub const POLL_MAX_WAIT_ENV: &str = "VOLTSIGHT_POLL_MAX_WAIT_SECS";

const DEFAULT_PROVIDER_DOMAIN: &str = "staging.bayou.energy";
const DEFAULT_PREDICTION_URL: &str = "https://ei.palmetto.com/api/v0/bem/calculate";
const DEFAULT_UTILITY: &str = "pacific_gas_and_electric";
const DEFAULT_CONTACT_EMAIL: &str = "test@example.com";

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub prediction: PredictionConfig,
    pub customer: CustomerConfig,
    pub analysis: AnalysisConfig,
    pub http: HttpConfig,
    pub polling: PollingConfig,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub domain: String,
    /// Full base URL; derived from `domain` when unset
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            domain: DEFAULT_PROVIDER_DOMAIN.to_string(),
            base_url: None,
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub api_key: Option<String>,
    pub url: String,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            url: DEFAULT_PREDICTION_URL.to_string(),
        }
    }
}

/// Defaults used when creating a provider customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerConfig {
    pub utility: String,
    pub contact_email: String,
}

impl Default for CustomerConfig {
    fn default() -> Self {
        Self {
            utility: DEFAULT_UTILITY.to_string(),
            contact_email: DEFAULT_CONTACT_EMAIL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub year: i32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            year: AnalysisWindow::DEFAULT_YEAR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub backoff_factor: f64,
    pub max_interval_secs: u64,
    pub max_wait_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            backoff_factor: 1.5,
            max_interval_secs: 30,
            max_wait_secs: 600,
        }
    }
}

fn redact(key: &Option<String>) -> &'static str {
    match key {
        Some(k) if !k.is_empty() => "***",
        _ => "<unset>",
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("domain", &self.domain)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for PredictionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionConfig")
            .field("api_key", &redact(&self.api_key))
            .field("url", &self.url)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("prediction", &self.prediction)
            .field("customer", &self.customer)
            .field("analysis", &self.analysis)
            .field("http", &self.http)
            .field("polling", &self.polling)
            .finish()
    }
}

impl Config {
    /// Load configuration from a file (explicit, `VOLTSIGHT_CONFIG`, or the
    /// default location) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env()?;
        Ok(config)
    }

    /// `<config dir>/voltsight/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voltsight").join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&contents)
            .map_err(|e| WorkflowError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| WorkflowError::InvalidConfig(e.to_string()))
    }

    /// Override values from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Override values from any variable lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(PROVIDER_API_KEY_ENV) {
            self.provider.api_key = Some(v);
        }
        if let Some(v) = get(PREDICTION_API_KEY_ENV) {
            self.prediction.api_key = Some(v);
        }
        if let Some(v) = get(PROVIDER_DOMAIN_ENV) {
            self.provider.domain = v;
        }
        if let Some(v) = get(PROVIDER_BASE_URL_ENV) {
            self.provider.base_url = Some(v);
        }
        if let Some(v) = get(PREDICTION_URL_ENV) {
            self.prediction.url = v;
        }
        if let Some(v) = get(UTILITY_ENV) {
            self.customer.utility = v;
        }
        if let Some(v) = get(CONTACT_EMAIL_ENV) {
            self.customer.contact_email = v;
        }
        if let Some(v) = get(ANALYSIS_YEAR_ENV) {
            self.analysis.year = parse_var(ANALYSIS_YEAR_ENV, &v)?;
        }
        if let Some(v) = get(HTTP_TIMEOUT_ENV) {
            self.http.timeout_secs = parse_var(HTTP_TIMEOUT_ENV, &v)?;
        }
        if let Some(v) = get(POLL_INTERVAL_ENV) {
            self.polling.interval_secs = parse_var(POLL_INTERVAL_ENV, &v)?;
        }
        if let Some(v) = get(POLL_MAX_WAIT_ENV) {
            self.polling.max_wait_secs = parse_var(POLL_MAX_WAIT_ENV, &v)?;
        }
        Ok(())
    }

    /// Provider base URL, explicit or `https://{domain}/api/v2`
    pub fn provider_base_url(&self) -> String {
        match &self.provider.base_url {
            Some(url) => url.clone(),
            None => format!("https://{}/api/v2", self.provider.domain),
        }
    }

    pub fn require_provider_key(&self) -> Result<&str> {
        require(&self.provider.api_key, PROVIDER_API_KEY_ENV)
    }

    pub fn require_prediction_key(&self) -> Result<&str> {
        require(&self.prediction.api_key, PREDICTION_API_KEY_ENV)
    }

    pub fn http_timeout(&self) -> Result<Duration> {
        if self.http.timeout_secs == 0 {
            return Err(WorkflowError::InvalidConfig(
                "http.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(Duration::from_secs(self.http.timeout_secs))
    }

    pub fn poll_policy(&self) -> Result<PollPolicy> {
        let policy = PollPolicy {
            interval: Duration::from_secs(self.polling.interval_secs),
            backoff_factor: self.polling.backoff_factor,
            max_interval: Duration::from_secs(self.polling.max_interval_secs),
            max_wait: Duration::from_secs(self.polling.max_wait_secs),
        };
        policy
            .validate()
            .map_err(|e| WorkflowError::InvalidConfig(format!("polling: {}", e)))?;
        Ok(policy)
    }

    pub fn analysis_window(&self) -> AnalysisWindow {
        AnalysisWindow::calendar_year(self.analysis.year)
    }
}

fn require<'a>(key: &'a Option<String>, name: &'static str) -> Result<&'a str> {
    match key.as_deref().map(str::trim) {
        Some(k) if !k.is_empty() => Ok(k),
        _ => Err(WorkflowError::ConfigMissing(name)),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| WorkflowError::InvalidConfig(format!("{} has invalid value {:?}", name, value)))
}
