//! Configuration management for shareguard.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::category::{Category, CustomPattern, MIN_TEXT_LEN};
use crate::detector::{self, DetectorConfig};
use crate::engine::{self, EngineConfig};
use crate::error::{Error, Result};
use crate::settings::{Settings, DEFAULT_INTENSITY};
use crate::surface::SurfaceConfig;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "shareguard";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "SHAREGUARD_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SHAREGUARD_`, nested keys
///    separated by `__`, e.g. `SHAREGUARD_DETECTOR__DEBOUNCE_MS`)
/// 2. TOML config file at `~/.config/shareguard/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture detection configuration.
    pub detector: DetectorSection,
    /// Redaction engine configuration.
    pub engine: EngineSection,
    /// Redaction settings.
    pub redaction: RedactionSection,
}

/// Capture detection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSection {
    /// Interval between indicator probes in milliseconds.
    pub probe_interval_ms: u64,
    /// Time an observed change must persist before it is confirmed.
    pub debounce_ms: u64,
    /// Quiet period after a confirmed change during which probing stops.
    pub cooldown_ms: u64,
    /// Observe capture acquisitions directly.
    pub hook_enabled: bool,
}

/// Redaction engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Quiet period after a document change before rescanning.
    pub scan_debounce_ms: u64,
    /// Minimum text length considered for matching.
    pub min_text_len: usize,
}

/// Redaction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionSection {
    /// Mask content while capture is active.
    pub protection_enabled: bool,
    /// Blur strength in pixels.
    pub intensity: u32,
    /// Turn protection back on when a capture starts.
    pub auto_enable: bool,
    /// Built-in category toggles.
    pub categories: CategoryToggles,
    /// User-defined patterns, in evaluation order.
    pub custom_patterns: Vec<CustomPatternEntry>,
}

/// Built-in category toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct CategoryToggles {
    /// Email addresses.
    pub email: bool,
    /// Card numbers.
    pub credit_card: bool,
    /// API keys and secret tokens.
    pub api_key: bool,
    /// Account numbers.
    pub account_number: bool,
    /// Monetary amounts.
    pub revenue: bool,
    /// Phone numbers and SSN-shaped identifiers.
    pub pii: bool,
}

/// A user-defined pattern as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPatternEntry {
    /// Display name, also the category name.
    pub name: String,
    /// The regular expression.
    pub pattern: String,
    /// Whether the pattern takes part in matching.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            probe_interval_ms: duration_ms(detector::DEFAULT_PROBE_INTERVAL),
            debounce_ms: duration_ms(detector::DEFAULT_DEBOUNCE),
            cooldown_ms: duration_ms(detector::DEFAULT_COOLDOWN),
            hook_enabled: true,
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            scan_debounce_ms: duration_ms(engine::DEFAULT_SCAN_DEBOUNCE),
            min_text_len: MIN_TEXT_LEN,
        }
    }
}

impl Default for RedactionSection {
    fn default() -> Self {
        Self {
            protection_enabled: true,
            intensity: DEFAULT_INTENSITY,
            auto_enable: true,
            categories: CategoryToggles::default(),
            custom_patterns: Vec::new(),
        }
    }
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            email: true,
            credit_card: true,
            api_key: true,
            account_number: true,
            revenue: true,
            pii: true,
        }
    }
}

impl CategoryToggles {
    /// Pair each built-in category with its toggle.
    #[must_use]
    pub fn entries(&self) -> [(Category, bool); 6] {
        [
            (Category::Email, self.email),
            (Category::CreditCard, self.credit_card),
            (Category::ApiKey, self.api_key),
            (Category::AccountNumber, self.account_number),
            (Category::Revenue, self.revenue),
            (Category::Pii, self.pii),
        ]
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `SHAREGUARD_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        Self::from_figment(Self::figment(&config_file))
    }

    /// Build the layered figment for a config file.
    #[must_use]
    pub fn figment(config_file: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract and validate configuration from a figment.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid, including
    /// custom patterns that do not compile.
    pub fn validate(&self) -> Result<()> {
        let detector = &self.detector;
        for (name, value) in [
            ("probe_interval_ms", detector.probe_interval_ms),
            ("debounce_ms", detector.debounce_ms),
            ("cooldown_ms", detector.cooldown_ms),
            ("scan_debounce_ms", self.engine.scan_debounce_ms),
        ] {
            if value == 0 {
                return Err(Error::validation(format!("{name} must be greater than 0")));
            }
        }

        if detector.cooldown_ms < detector.debounce_ms {
            return Err(Error::validation(format!(
                "cooldown_ms ({}) cannot be shorter than debounce_ms ({})",
                detector.cooldown_ms, detector.debounce_ms
            )));
        }

        if self.redaction.intensity == 0 {
            return Err(Error::validation("intensity must be greater than 0"));
        }

        let mut seen = HashSet::new();
        for entry in &self.redaction.custom_patterns {
            if entry.name.trim().is_empty() {
                return Err(Error::validation("custom pattern name cannot be empty"));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(Error::validation(format!(
                    "duplicate custom pattern name: {}",
                    entry.name
                )));
            }
            CustomPattern::new(&entry.name, &entry.pattern, entry.enabled)?;
        }

        Ok(())
    }

    /// Build the redaction settings described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a custom pattern does not compile.
    pub fn settings(&self) -> Result<Settings> {
        let redaction = &self.redaction;
        let enabled_categories = redaction
            .categories
            .entries()
            .into_iter()
            .filter_map(|(category, enabled)| enabled.then_some(category))
            .collect();
        let custom_patterns = redaction
            .custom_patterns
            .iter()
            .map(|entry| CustomPattern::new(&entry.name, &entry.pattern, entry.enabled))
            .collect::<Result<Vec<_>>>()?;

        Ok(Settings {
            enabled_categories,
            custom_patterns,
            intensity: redaction.intensity,
            auto_enable: redaction.auto_enable,
        })
    }

    /// Get the detector configuration.
    #[must_use]
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            probe_interval: Duration::from_millis(self.detector.probe_interval_ms),
            debounce: Duration::from_millis(self.detector.debounce_ms),
            cooldown: Duration::from_millis(self.detector.cooldown_ms),
            hook_enabled: self.detector.hook_enabled,
        }
    }

    /// Get the engine configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            scan_debounce: Duration::from_millis(self.engine.scan_debounce_ms),
            min_text_len: self.engine.min_text_len,
        }
    }

    /// Get the surface configuration.
    #[must_use]
    pub fn surface_config(&self) -> SurfaceConfig {
        SurfaceConfig {
            detector: self.detector_config(),
            engine: self.engine_config(),
            protection_enabled: self.redaction.protection_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.detector.probe_interval_ms, 1000);
        assert_eq!(config.detector.debounce_ms, 3000);
        assert_eq!(config.detector.cooldown_ms, 5000);
        assert!(config.detector.hook_enabled);
        assert_eq!(config.engine.scan_debounce_ms, 300);
        assert_eq!(config.engine.min_text_len, 3);
        assert!(config.redaction.protection_enabled);
        assert_eq!(config.redaction.intensity, 10);
        assert!(config.redaction.auto_enable);
        assert!(config.redaction.custom_patterns.is_empty());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_intervals() {
        for field in ["probe_interval_ms", "debounce_ms", "scan_debounce_ms"] {
            let mut config = Config::default();
            match field {
                "probe_interval_ms" => config.detector.probe_interval_ms = 0,
                "debounce_ms" => config.detector.debounce_ms = 0,
                _ => config.engine.scan_debounce_ms = 0,
            }
            let err = config.validate().unwrap_err().to_string();
            assert!(err.contains(field), "{err}");
        }
    }

    #[test]
    fn test_validate_cooldown_shorter_than_debounce() {
        let mut config = Config::default();
        config.detector.cooldown_ms = 1000;

        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("cooldown_ms"));
    }

    #[test]
    fn test_validate_zero_intensity() {
        let mut config = Config::default();
        config.redaction.intensity = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("intensity"), "{err}");
    }

    #[test]
    fn test_validate_invalid_custom_pattern_names_it() {
        let mut config = Config::default();
        config.redaction.custom_patterns.push(CustomPatternEntry {
            name: "Ticket".to_string(),
            pattern: "[invalid".to_string(),
            enabled: true,
        });

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { ref name, .. } if name == "Ticket"));
    }

    #[test]
    fn test_validate_duplicate_and_empty_names() {
        let entry = |name: &str| CustomPatternEntry {
            name: name.to_string(),
            pattern: r"\d+".to_string(),
            enabled: true,
        };

        let mut config = Config::default();
        config.redaction.custom_patterns = vec![entry("A"), entry("A")];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("duplicate"), "{err}");

        config.redaction.custom_patterns = vec![entry("  ")];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("empty"), "{err}");
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.redaction.categories.email = false;
        config.redaction.intensity = 16;
        config.redaction.custom_patterns.push(CustomPatternEntry {
            name: "SSN".to_string(),
            pattern: r"\b\d{3}-\d{2}-\d{4}\b".to_string(),
            enabled: true,
        });

        let settings = config.settings().unwrap();
        assert!(!settings.is_enabled(&Category::Email));
        assert!(settings.is_enabled(&Category::Pii));
        assert!(settings.is_enabled(&Category::Custom("SSN".to_string())));
        assert_eq!(settings.intensity, 16);
        assert_eq!(settings.enabled_categories.len(), 5);
    }

    #[test]
    fn test_default_settings_match_settings_default() {
        assert_eq!(Config::default().settings().unwrap(), Settings::default());
    }

    #[test]
    fn test_runtime_configs() {
        let config = Config::default();
        assert_eq!(config.detector_config(), DetectorConfig::default());
        assert_eq!(config.engine_config(), EngineConfig::default());
        assert_eq!(config.surface_config(), SurfaceConfig::default());
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("shareguard"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_load_toml_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                    [detector]
                    debounce_ms = 8000
                    cooldown_ms = 10000

                    [redaction.categories]
                    revenue = false

                    [[redaction.custom_patterns]]
                    name = "SSN"
                    pattern = '\b\d{3}-\d{2}-\d{4}\b'
                "#,
            )?;
            jail.set_env("SHAREGUARD_REDACTION__INTENSITY", "20");

            let path = std::path::Path::new("config.toml");
            let config = Config::from_figment(Config::figment(path)).map_err(|e| e.to_string())?;
            assert_eq!(config.detector.debounce_ms, 8000);
            assert_eq!(config.detector.probe_interval_ms, 1000);
            assert!(!config.redaction.categories.revenue);
            assert!(config.redaction.custom_patterns[0].enabled);
            assert_eq!(config.redaction.intensity, 20);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[detector]\ncooldown_ms = 10\n")?;
            let path = std::path::Path::new("config.toml");
            let result = Config::from_figment(Config::figment(path));
            assert!(result.unwrap_err().is_config_error());
            Ok(())
        });
    }

    #[test]
    fn test_config_roundtrips_through_toml_shape() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["detector"]["debounce_ms"], 3000);
        assert_eq!(json["redaction"]["categories"]["pii"], true);
    }
}
