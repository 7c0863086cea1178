// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR_NAME: &str = "contractLens";
const BACKUP_KEEP: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("config JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rule pattern invalid: {0}")]
    Rules(#[from] regex::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub rules_file: Option<PathBuf>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_sparse_threshold")]
    pub sparse_text_threshold: usize,
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,
    #[serde(default = "default_enrichment_timeout")]
    pub enrichment_timeout_secs: u64,
    #[serde(default = "default_enrichment_concurrency")]
    pub enrichment_concurrency: usize,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
            sparse_text_threshold: default_sparse_threshold(),
            render_scale: default_render_scale(),
            enrichment_timeout_secs: default_enrichment_timeout(),
            enrichment_concurrency: default_enrichment_concurrency(),
            user_id: default_user_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    #[default]
    Standard,
    Reasoning,
}

/// Per-run enrichment settings; replaces a process-wide model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_standard_model")]
    pub standard_model: String,
    #[serde(default = "default_reasoning_model")]
    pub reasoning_model: String,
    #[serde(default)]
    pub mode: ModelMode,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            standard_model: default_standard_model(),
            reasoning_model: default_reasoning_model(),
            mode: ModelMode::Standard,
            base_url: None,
        }
    }
}

impl EnrichmentConfig {
    pub fn active_model(&self) -> &str {
        match self.mode {
            ModelMode::Standard => &self.standard_model,
            ModelMode::Reasoning => &self.reasoning_model,
        }
    }

    /// Whether the active model was set away from its built-in default.
    pub fn model_overridden(&self) -> bool {
        let builtin = match self.mode {
            ModelMode::Standard => default_standard_model(),
            ModelMode::Reasoning => default_reasoning_model(),
        };
        let active = self.active_model().trim();
        !active.is_empty() && active != builtin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

fn default_preview_chars() -> usize { 2000 }
fn default_sparse_threshold() -> usize { 100 }
fn default_render_scale() -> f32 { 2.0 }
fn default_enrichment_timeout() -> u64 { 60 }
fn default_enrichment_concurrency() -> usize { 4 }
fn default_user_id() -> String { "local_user".to_string() }
fn default_provider() -> String { "ollama".to_string() }
fn default_standard_model() -> String { "mistral".to_string() }
fn default_reasoning_model() -> String { "deepseek-r1".to_string() }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR_NAME))
    }

    /// Directory for audit trails and other run artifacts
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|p| p.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir)?;
        Ok(())
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content)?;
        Ok(())
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));
        fs::copy(&self.config_file, &backup_file)?;

        self.cleanup_old_backups(&backup_dir, BACKUP_KEEP)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Names embed the timestamp, so lexical order is age order.
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Get provider API key from config file
    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, ConfigError> {
        let config = self.load()?;
        Ok(config.api_keys.get(provider).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (ConfigStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("contract-lens-config-{}", uuid::Uuid::new_v4()));
        (ConfigStore::new(dir.clone()), dir)
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.analysis.preview_chars, 2000);
        assert_eq!(config.analysis.sparse_text_threshold, 100);
        assert_eq!(config.enrichment.provider, "ollama");
        assert_eq!(config.enrichment.active_model(), "mistral");
    }

    #[test]
    fn test_reasoning_mode_selects_reasoning_model() {
        let config = EnrichmentConfig {
            mode: ModelMode::Reasoning,
            ..EnrichmentConfig::default()
        };
        assert_eq!(config.active_model(), "deepseek-r1");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"analysis": {"previewChars": 50}}"#).unwrap();
        assert_eq!(config.analysis.preview_chars, 50);
        assert_eq!(config.analysis.enrichment_concurrency, 4);
        assert_eq!(config.enrichment.reasoning_model, "deepseek-r1");
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let (store, _dir) = temp_store();
        let config = store.load().unwrap();
        assert_eq!(config.analysis.user_id, "local_user");
    }

    #[test]
    fn test_model_overridden_only_when_changed() {
        let mut config = EnrichmentConfig::default();
        assert!(!config.model_overridden());
        config.standard_model = "gpt-4o".to_string();
        assert!(config.model_overridden());
        config.mode = ModelMode::Reasoning;
        assert!(!config.model_overridden());
    }

    #[test]
    fn test_save_load_and_backup() {
        let (store, dir) = temp_store();
        let mut config = AppConfig::default();
        config.api_keys.insert("openai".to_string(), "sk-test".to_string());
        store.save(&config).unwrap();

        config.providers.insert(
            "ollama".to_string(),
            ProviderConfig {
                model: None,
                base_url: Some("http://gpu-box:11434".to_string()),
            },
        );
        store.save(&config).unwrap();

        assert_eq!(store.get_api_key("openai").unwrap().as_deref(), Some("sk-test"));
        let loaded = store.load().unwrap();
        assert_eq!(
            loaded.providers.get("ollama").and_then(|p| p.base_url.as_deref()),
            Some("http://gpu-box:11434")
        );
        assert!(dir.join("backups").exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
