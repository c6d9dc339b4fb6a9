use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::palette::Palette;

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }

    /// Read the user config file, if there is one
    pub fn load_user_config(&self) -> Result<Option<AppConfig>> {
        let config_path = self.config_path("config.toml");
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        let config = toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })?;
        Ok(Some(config))
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub ingest: IngestConfig,
    pub plot: PlotConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Uploads whose name does not end with this are rejected
    pub accepted_extension: String,
    /// Header substring replaced at ingest...
    pub rename_from: String,
    /// ...by this one; headers containing it are dimension columns
    pub rename_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Built-in palette name: "dark24" or "plotly"
    pub palette: String,
    /// Explicit `#RRGGBB` colours; overrides `palette` when set
    pub custom_palette: Option<Vec<String>>,
    pub marker_size_3d: f64,
    pub marker_size_2d: f64,
    /// Horizontal legend anchor in paper coordinates
    pub legend_x: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            ingest: IngestConfig::default(),
            plot: PlotConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            accepted_extension: ".tsv".to_string(),
            rename_from: "V".to_string(),
            rename_to: "MDS".to_string(),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            palette: "dark24".to_string(),
            custom_palette: None,
            marker_size_3d: 4.0,
            marker_size_2d: 6.0,
            legend_x: -0.01,
        }
    }
}

impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let manager = ConfigManager::new(app_name)?;
        Self::load_with(&manager)
    }

    /// Load configuration using a specific config directory
    pub fn load_with(manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();

        if let Some(user_config) = manager.load_user_config()? {
            config.merge(user_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }
        self.ingest.merge(other.ingest);
        self.plot.merge(other.plot);
        self.debug.merge(other.debug);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.ingest.accepted_extension.is_empty() {
            return Err(eyre!("accepted_extension must not be empty"));
        }
        if self.ingest.rename_from.is_empty() || self.ingest.rename_to.is_empty() {
            return Err(eyre!("rename_from and rename_to must not be empty"));
        }

        if self.plot.marker_size_3d <= 0.0 || self.plot.marker_size_2d <= 0.0 {
            return Err(eyre!("marker sizes must be greater than 0"));
        }

        self.plot.palette()?;
        Ok(())
    }
}

impl IngestConfig {
    pub fn merge(&mut self, other: Self) {
        let default = IngestConfig::default();
        if other.accepted_extension != default.accepted_extension {
            self.accepted_extension = other.accepted_extension;
        }
        if other.rename_from != default.rename_from {
            self.rename_from = other.rename_from;
        }
        if other.rename_to != default.rename_to {
            self.rename_to = other.rename_to;
        }
    }
}

impl PlotConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PlotConfig::default();
        if other.palette != default.palette {
            self.palette = other.palette;
        }
        if other.custom_palette.is_some() {
            self.custom_palette = other.custom_palette;
        }
        if other.marker_size_3d != default.marker_size_3d {
            self.marker_size_3d = other.marker_size_3d;
        }
        if other.marker_size_2d != default.marker_size_2d {
            self.marker_size_2d = other.marker_size_2d;
        }
        if other.legend_x != default.legend_x {
            self.legend_x = other.legend_x;
        }
    }

    /// Resolve the configured palette
    pub fn palette(&self) -> Result<Palette> {
        if let Some(colors) = &self.custom_palette {
            return Palette::custom(colors.clone()).ok_or_else(|| {
                eyre!("custom_palette must be a non-empty list of #RRGGBB colours")
            });
        }
        Palette::named(&self.palette).ok_or_else(|| {
            eyre!(
                "Invalid palette: {}. Must be 'dark24' or 'plotly'",
                self.palette
            )
        })
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        if other.enabled {
            self.enabled = true;
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let parsed: AppConfig = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(parsed.version, "0.1");
        assert_eq!(parsed.ingest.accepted_extension, ".tsv");
        assert_eq!(parsed.plot.palette, "dark24");
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn merge_only_overrides_non_defaults() {
        let mut base = AppConfig::default();
        let mut other = AppConfig::default();
        other.plot.marker_size_3d = 8.0;
        other.debug.enabled = true;
        base.merge(other);
        assert_eq!(base.plot.marker_size_3d, 8.0);
        assert_eq!(base.plot.marker_size_2d, 6.0);
        assert!(base.debug.enabled);
    }
}
