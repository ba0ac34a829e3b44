use crate::core::ConfigProvider;
use crate::utils::error::{Result, TrackerError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "kaspi-tracker.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub marketplace: MarketplaceConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub login_url: String,
    pub continue_url: String,
    pub oauth_url: String,
    pub download_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_cookie: String,
    pub user_agent: String,
    pub referer: String,
    pub timeout_seconds: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            login_url: "https://idmc.shop.kaspi.kz/api/p/login".to_string(),
            continue_url: "https://idmc.shop.kaspi.kz/?continue".to_string(),
            oauth_url: "https://mc.shop.kaspi.kz/oauth2/authorization/1".to_string(),
            download_url:
                "https://mc.shop.kaspi.kz/content/pending/mc/product/BUGA/download?approvalStatus=CHECK"
                    .to_string(),
            username: None,
            password: None,
            session_cookie: "mc-sid".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36".to_string(),
            referer: "https://kaspi.kz/".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/kaspi-tracker.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where the last downloaded export is kept; empty disables saving.
    pub download_path: String,
    pub report_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_path: "pending_products.xlsx".to_string(),
            report_dir: "./reports".to_string(),
        }
    }
}

impl TrackerConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TrackerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Explicit path must exist; otherwise the default file is used when present.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path);
                Self::from_file(path)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                tracing::info!("Loading configuration from {}", DEFAULT_CONFIG_FILE);
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => {
                tracing::debug!("No configuration file, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// 環境變數優先於檔案設定
    pub fn apply_env_overrides(&mut self) {
        if let Ok(username) = std::env::var("KASPI_USERNAME") {
            self.marketplace.username = Some(username);
        }
        if let Ok(password) = std::env::var("KASPI_PASSWORD") {
            self.marketplace.password = Some(password);
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
    }

    /// 替換環境變數 (例如 ${KASPI_PASSWORD})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| TrackerError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Login and download need credentials; import and report do not.
    pub fn validate_credentials(&self) -> Result<()> {
        let username = validation::validate_required_field("marketplace.username", &self.marketplace.username)?;
        validation::validate_non_empty_string("marketplace.username", username)?;
        let password = validation::validate_required_field("marketplace.password", &self.marketplace.password)?;
        validation::validate_non_empty_string("marketplace.password", password)?;

        for (field, value) in [("marketplace.username", username), ("marketplace.password", password)] {
            if value.contains("${") {
                return Err(TrackerError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "Unresolved environment placeholder".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn download_path(&self) -> Option<&str> {
        let path = self.storage.download_path.trim();
        if path.is_empty() {
            None
        } else {
            Some(path)
        }
    }
}

impl Validate for TrackerConfig {
    fn validate(&self) -> Result<()> {
        let m = &self.marketplace;
        validation::validate_url("marketplace.login_url", &m.login_url)?;
        validation::validate_url("marketplace.continue_url", &m.continue_url)?;
        validation::validate_url("marketplace.oauth_url", &m.oauth_url)?;
        validation::validate_url("marketplace.download_url", &m.download_url)?;
        validation::validate_non_empty_string("marketplace.session_cookie", &m.session_cookie)?;
        validation::validate_non_empty_string("marketplace.user_agent", &m.user_agent)?;
        if m.timeout_seconds == 0 {
            return Err(TrackerError::InvalidConfigValueError {
                field: "marketplace.timeout_seconds".to_string(),
                value: m.timeout_seconds.to_string(),
                reason: "Value must be at least 1".to_string(),
            });
        }

        validation::validate_database_url("database.url", &self.database.url)?;
        validation::validate_path("storage.report_dir", &self.storage.report_dir)?;

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}

impl ConfigProvider for MarketplaceConfig {
    fn login_url(&self) -> &str {
        &self.login_url
    }

    fn continue_url(&self) -> &str {
        &self.continue_url
    }

    fn oauth_url(&self) -> &str {
        &self.oauth_url
    }

    fn download_url(&self) -> &str {
        &self.download_url
    }

    fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    fn password(&self) -> &str {
        self.password.as_deref().unwrap_or_default()
    }

    fn session_cookie(&self) -> &str {
        &self.session_cookie
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn referer(&self) -> &str {
        &self.referer
    }

    fn request_timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.marketplace.session_cookie, "mc-sid");
        assert_eq!(config.download_path(), Some("pending_products.xlsx"));
        assert!(config.validate_credentials().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = TrackerConfig::from_toml_str(
            r#"
[marketplace]
username = "program@example.kz"
password = "secret"

[database]
url = "sqlite::memory:"

[storage]
download_path = ""
"#,
        )
        .unwrap();

        assert_eq!(config.marketplace.username.as_deref(), Some("program@example.kz"));
        assert_eq!(config.marketplace.login_url, MarketplaceConfig::default().login_url);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.download_path(), None);
        assert!(config.validate().is_ok());
        assert!(config.validate_credentials().is_ok());
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("KASPI_TRACKER_TEST_PASSWORD", "from-env");
        let config = TrackerConfig::from_toml_str(
            r#"
[marketplace]
password = "${KASPI_TRACKER_TEST_PASSWORD}"
username = "${KASPI_TRACKER_TEST_UNSET_VAR}"
"#,
        )
        .unwrap();

        assert_eq!(config.marketplace.password.as_deref(), Some("from-env"));
        assert_eq!(
            config.marketplace.username.as_deref(),
            Some("${KASPI_TRACKER_TEST_UNSET_VAR}")
        );
        assert!(config.validate_credentials().is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = TrackerConfig::default();
        config.marketplace.download_url = "ftp://mc.shop.kaspi.kz/file".to_string();
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.database.url = "postgres://localhost/tracker".to_string();
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.marketplace.timeout_seconds = 0;
        assert!(config.validate().is_err());

        assert!(TrackerConfig::from_toml_str("[marketplace\nbroken").is_err());
    }
}
