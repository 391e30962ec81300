//! Configuration loading and management.
//!
//! [`ExtractorConfig`] carries everything a [`StrataExtractor`](crate::core::engine::StrataExtractor)
//! needs: confidence thresholds, feature toggles for the recovery tiers, and
//! the injected unit/material vocabularies. It can be created
//! programmatically or loaded from TOML or JSON files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, StrataError};
use crate::normalize::UnitTable;
use crate::parsers::signal::MaterialVocabulary;

/// Main extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Score below which an extraction is not save-worthy without recovery.
    #[serde(default = "default_min_confidence")]
    pub min_confidence_threshold: f64,

    /// Score at or above which an extraction is bucketed `high`.
    #[serde(default = "default_high_confidence")]
    pub high_confidence_threshold: f64,

    /// Floor under which guided correction gives way to template matching or
    /// manual entry.
    #[serde(default = "default_guided_minimum")]
    pub guided_minimum_threshold: f64,

    /// Run depth-sequence and boundary validation automatically.
    #[serde(default = "default_true")]
    pub auto_validate: bool,

    /// Offer the guided-correction recovery tier.
    #[serde(default = "default_true")]
    pub enable_guided_correction: bool,

    /// Offer the template-based recovery tier.
    #[serde(default = "default_true")]
    pub enable_template_matching: bool,

    /// Maximum line distance when correlating position-based signals.
    #[serde(default = "default_correlation_distance")]
    pub max_correlation_distance: usize,

    /// Depth unit vocabulary.
    #[serde(default)]
    pub units: UnitTable,

    /// Material and color vocabulary.
    #[serde(default)]
    pub materials: MaterialVocabulary,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_confidence_threshold: default_min_confidence(),
            high_confidence_threshold: default_high_confidence(),
            guided_minimum_threshold: default_guided_minimum(),
            auto_validate: true,
            enable_guided_correction: true,
            enable_template_matching: true,
            max_correlation_distance: default_correlation_distance(),
            units: UnitTable::default(),
            materials: MaterialVocabulary::default(),
        }
    }
}

impl ExtractorConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| StrataError::validation_with_source("Invalid TOML configuration", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| StrataError::validation_with_source("Invalid JSON configuration", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, dispatching on the extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            other => Err(StrataError::validation(format!(
                "Unsupported config format: {:?} (expected .toml or .json)",
                other
            ))),
        }
    }

    /// Check threshold coherence.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_confidence_threshold", self.min_confidence_threshold),
            ("high_confidence_threshold", self.high_confidence_threshold),
            ("guided_minimum_threshold", self.guided_minimum_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(StrataError::validation(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.min_confidence_threshold > self.high_confidence_threshold {
            return Err(StrataError::validation(
                "min_confidence_threshold must not exceed high_confidence_threshold",
            ));
        }
        if self.guided_minimum_threshold > self.min_confidence_threshold {
            return Err(StrataError::validation(
                "guided_minimum_threshold must not exceed min_confidence_threshold",
            ));
        }
        Ok(())
    }
}

fn default_min_confidence() -> f64 {
    0.5
}

fn default_high_confidence() -> f64 {
    0.8
}

fn default_guided_minimum() -> f64 {
    0.3
}

fn default_correlation_distance() -> usize {
    2
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractorConfig::default();
        assert_eq!(config.min_confidence_threshold, 0.5);
        assert_eq!(config.high_confidence_threshold, 0.8);
        assert_eq!(config.guided_minimum_threshold, 0.3);
        assert!(config.auto_validate);
        assert!(config.enable_guided_correction);
        assert!(config.enable_template_matching);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ExtractorConfig = toml::from_str("min_confidence_threshold = 0.6").unwrap();
        assert_eq!(config.min_confidence_threshold, 0.6);
        assert_eq!(config.high_confidence_threshold, 0.8);
        assert!(config.auto_validate);
        assert!(!config.units.entries.is_empty());
    }

    #[test]
    fn test_threshold_validation() {
        let config = ExtractorConfig {
            min_confidence_threshold: 0.9,
            high_confidence_threshold: 0.8,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ExtractorConfig {
            min_confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.toml");
        std::fs::write(&path, "enable_template_matching = false\n").unwrap();
        let config = ExtractorConfig::from_toml_file(&path).unwrap();
        assert!(!config.enable_template_matching);
        assert!(config.enable_guided_correction);
    }

    #[test]
    fn test_from_file_rejects_unknown_extension() {
        let err = ExtractorConfig::from_file("strata.yaml").unwrap_err();
        assert!(matches!(err, StrataError::Validation { .. }));
    }

    #[test]
    fn test_json_round_trip() {
        let config = ExtractorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ExtractorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.min_confidence_threshold, config.min_confidence_threshold);
    }
}
