use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::pipeline::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub feed_url: Option<String>,

    /// Where rendered diffs are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Log notifications instead of posting them. Thread anchors recorded in
    /// dry-run are synthetic; a live run opens a real thread in their place.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,

    /// Write logs to `<log_dir>/rss-diff.log` instead of stderr.
    pub log_dir: Option<String>,

    #[serde(default)]
    pub notifier: NotifierConfig,

    #[serde(default)]
    pub renderer: RendererConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub api_base: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RendererConfig {
    /// HTML-to-image command, e.g. `wkhtmltoimage --width 640`.
    pub image_command: Option<String>,
    /// CSS file replacing the built-in diff styles.
    pub stylesheet_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rss-diff");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    data_dir().join("versions.db").to_string_lossy().to_string()
}

fn default_output_dir() -> String {
    data_dir().join("output").to_string_lossy().to_string()
}

fn default_dry_run() -> bool {
    true
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_delay() -> u64 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            feed_url: None,
            output_dir: default_output_dir(),
            dry_run: default_dry_run(),
            log_dir: None,
            notifier: NotifierConfig::default(),
            renderer: RendererConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rss-diff")
            .join("config.toml")
    }

    /// Environment variables win over the file.
    ///
    /// `TESTING=False` turns dry-run off; any other value turns it on.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("RSS_URL") {
            self.feed_url = Some(url);
        }
        if let Some(testing) = lookup("TESTING") {
            self.dry_run = testing != "False";
        }
        if let Some(dir) = lookup("LOG_FOLDER") {
            self.log_dir = Some(dir).filter(|d| !d.is_empty());
        }
        if let Some(base) = lookup("NOTIFIER_API_BASE") {
            self.notifier.api_base = Some(base);
        }
        if let Some(token) = lookup("NOTIFIER_ACCESS_TOKEN") {
            self.notifier.access_token = Some(token);
        }
    }

    pub fn feed_url(&self) -> Result<&str> {
        self.feed_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AppError::Config("no feed_url configured (set RSS_URL)".to_string()))
    }

    /// API base and token for the live notifier.
    pub fn notifier_credentials(&self) -> Result<(&str, &str)> {
        let base = self.notifier.api_base.as_deref().filter(|s| !s.is_empty());
        let token = self.notifier.access_token.as_deref().filter(|s| !s.is_empty());
        match (base, token) {
            (Some(base), Some(token)) => Ok((base, token)),
            _ => Err(AppError::Config(
                "notifier.api_base and notifier.access_token are required outside dry-run".to_string(),
            )),
        }
    }

    /// HTML-to-image command for the renderer. Status APIs only accept
    /// images as media, so one is required outside dry-run.
    pub fn image_command(&self) -> Result<Option<String>> {
        let command = self
            .renderer
            .image_command
            .clone()
            .filter(|c| !c.trim().is_empty());
        if command.is_none() && !self.dry_run {
            return Err(AppError::Config(
                "renderer.image_command is required outside dry-run".to_string(),
            ));
        }
        Ok(command)
    }

    pub fn stylesheet(&self) -> Result<Option<String>> {
        match &self.renderer.stylesheet_path {
            Some(path) => Ok(Some(std::fs::read_to_string(path)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn overridden(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).cloned());
        config
    }

    #[test]
    fn dry_run_is_the_default() {
        assert!(Config::default().dry_run);
        assert!(overridden(&[]).dry_run);
    }

    #[test]
    fn testing_false_disables_dry_run() {
        assert!(!overridden(&[("TESTING", "False")]).dry_run);
        assert!(overridden(&[("TESTING", "false")]).dry_run);
        assert!(overridden(&[("TESTING", "True")]).dry_run);
    }

    #[test]
    fn env_supplies_feed_and_credentials() {
        let config = overridden(&[
            ("RSS_URL", "https://example.com/rss"),
            ("NOTIFIER_API_BASE", "https://social.example/api/v1"),
            ("NOTIFIER_ACCESS_TOKEN", "secret"),
            ("LOG_FOLDER", "/var/log/rss-diff"),
        ]);
        assert_eq!(config.feed_url().unwrap(), "https://example.com/rss");
        assert_eq!(
            config.notifier_credentials().unwrap(),
            ("https://social.example/api/v1", "secret")
        );
        assert_eq!(config.log_dir.as_deref(), Some("/var/log/rss-diff"));
    }

    #[test]
    fn missing_feed_and_credentials_are_config_errors() {
        let config = Config::default();
        assert!(matches!(config.feed_url(), Err(AppError::Config(_))));
        assert!(matches!(config.notifier_credentials(), Err(AppError::Config(_))));
    }

    #[test]
    fn live_mode_requires_an_image_command() {
        let mut config = Config::default();
        assert_eq!(config.image_command().unwrap(), None);

        config.dry_run = false;
        assert!(matches!(config.image_command(), Err(AppError::Config(_))));

        config.renderer.image_command = Some("   ".to_string());
        assert!(matches!(config.image_command(), Err(AppError::Config(_))));

        config.renderer.image_command = Some("wkhtmltoimage --width 640".to_string());
        assert_eq!(
            config.image_command().unwrap().as_deref(),
            Some("wkhtmltoimage --width 640")
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
feed_url = "https://example.com/rss"
dry_run = false

[retry]
max_retries = 2
"#,
        )
        .unwrap();
        assert!(!config.dry_run);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.retry_delay_secs, 3);
        assert!(config.renderer.image_command.is_none());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.retry.max_retries, 10);
        assert!(parsed.dry_run);
    }
}
