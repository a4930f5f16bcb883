//! Pipeline configuration
//!
//! One immutable, typed configuration record replaces the loose settings that
//! used to travel between stages. Everything is validated once through
//! [`PipelineConfig::validate`]; the organizer and the processor repeat the
//! checks for the sections they own.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::utils::error::{DatasetGenError, Result};
use crate::{
    DEFAULT_MIN_SIZE, DEFAULT_QUALITY, DEFAULT_SEED, DEFAULT_TARGET_SIZE, DEFAULT_TEMP_DIR,
};

/// Allowed distance between the ratio sum and 1.0
pub const RATIO_TOLERANCE: f64 = 0.01;

/// Openverse image search endpoint
pub const OPENVERSE_IMAGES_URL: &str = "https://api.openverse.org/v1/images/";

/// Identifying header sent with every request
pub const DEFAULT_USER_AGENT: &str = "DatasetGenerator/1.0 (Educational Project)";

/// How images are brought to the target square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Shrink to fit, then center on a white square canvas
    #[default]
    Pad,
    /// Resize straight to the square (distorts proportions)
    Stretch,
}

/// Image processing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Side of the output square in pixels
    pub target_size: u32,
    /// Minimum accepted width and height
    pub min_size: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
    /// Resize policy
    pub resize_mode: ResizeMode,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            min_size: DEFAULT_MIN_SIZE,
            quality: DEFAULT_QUALITY,
            resize_mode: ResizeMode::Pad,
        }
    }
}

impl ProcessingConfig {
    /// Check quality range and target size
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(DatasetGenError::Config(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.quality
            )));
        }

        if self.target_size == 0 {
            return Err(DatasetGenError::Config(
                "Target size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Ratio configuration for train/val/test assignment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitRatios {
    /// Fraction assigned to train
    pub train: f64,
    /// Fraction assigned to validation
    pub val: f64,
    /// Fraction assigned to test
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.70,
            val: 0.15,
            test: 0.15,
        }
    }
}

impl SplitRatios {
    /// Create ratios, rejecting sets that do not sum to 1.0 (±0.01)
    pub fn new(train: f64, val: f64, test: f64) -> Result<Self> {
        let ratios = Self { train, val, test };
        ratios.validate()?;
        Ok(ratios)
    }

    /// Sum of the three fractions
    pub fn sum(&self) -> f64 {
        self.train + self.val + self.test
    }

    /// Validate each fraction and their sum
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("train", self.train), ("val", self.val), ("test", self.test)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DatasetGenError::Config(format!(
                    "{} ratio must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }

        let total = self.sum();
        if (total - 1.0).abs() > RATIO_TOLERANCE {
            return Err(DatasetGenError::Config(format!(
                "Ratios must sum to 1.0, got {:.4}",
                total
            )));
        }

        Ok(())
    }
}

/// Dataset split settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Split fractions
    pub ratios: SplitRatios,
    /// Seed for the shuffle
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            ratios: SplitRatios::default(),
            seed: DEFAULT_SEED,
        }
    }
}

/// Remote image source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Search endpoint
    pub base_url: String,
    /// Value of the `User-Agent` header
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Largest page requested from the search endpoint
    pub max_page_size: usize,
    /// Pause before every page after the first, in milliseconds
    pub page_delay_ms: u64,
    /// Pause after every image fetch, in milliseconds
    pub download_delay_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: OPENVERSE_IMAGES_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            max_page_size: 20,
            page_delay_ms: 1000,
            download_delay_ms: 500,
        }
    }
}

impl SourceConfig {
    /// Check limits that would make the client loop or never return
    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            return Err(DatasetGenError::Config(
                "max_page_size must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(DatasetGenError::Config(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete configuration for one pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Image processing settings
    pub processing: ProcessingConfig,
    /// Split settings
    pub split: SplitConfig,
    /// Remote source settings
    pub source: SourceConfig,
    /// Root for per-run temporary directories
    pub temp_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            split: SplitConfig::default(),
            source: SourceConfig::default(),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
        }
    }
}

impl PipelineConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.processing.validate()?;
        self.split.ratios.validate()?;
        self.source.validate()?;
        Ok(())
    }

    /// Load a configuration from a TOML file; missing fields take defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let config: Self = load_toml_config(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Read and deserialize a TOML file
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path).map_err(|e| {
        DatasetGenError::Config(format!("Failed to read config {}: {e}", path.display()))
    })?;

    toml::from_str(&content).map_err(|e| {
        DatasetGenError::Config(format!("Failed to parse config {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.processing.target_size, 256);
        assert_eq!(config.processing.min_size, 100);
        assert_eq!(config.processing.quality, 90);
        assert_eq!(config.split.seed, 42);
        assert_eq!(config.processing.resize_mode, ResizeMode::Pad);
    }

    #[test]
    fn test_ratios_within_tolerance() {
        assert!(SplitRatios::new(0.7, 0.15, 0.15).is_ok());
        assert!(SplitRatios::new(0.7, 0.15, 0.155).is_ok());
        assert!(SplitRatios::new(0.6, 0.2, 0.2).is_ok());
    }

    #[test]
    fn test_ratios_outside_tolerance() {
        assert!(SplitRatios::new(0.5, 0.3, 0.3).is_err());
        assert!(SplitRatios::new(0.5, 0.2, 0.2).is_err());
    }

    #[test]
    fn test_negative_ratio_rejected() {
        assert!(SplitRatios::new(1.2, -0.1, -0.1).is_err());
    }

    #[test]
    fn test_quality_range() {
        let mut processing = ProcessingConfig::default();
        processing.quality = 0;
        assert!(processing.validate().is_err());
        processing.quality = 101;
        assert!(processing.validate().is_err());
        processing.quality = 100;
        assert!(processing.validate().is_ok());
    }

    #[test]
    fn test_zero_target_size_rejected() {
        let processing = ProcessingConfig {
            target_size: 0,
            ..ProcessingConfig::default()
        };
        assert!(processing.validate().is_err());
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("generator.toml");
        fs::write(
            &path,
            r#"
temp_dir = "scratch"

[processing]
target_size = 128
resize_mode = "stretch"

[split]
seed = 7

[split.ratios]
train = 0.8
val = 0.1
test = 0.1
"#,
        )
        .unwrap();

        let config = PipelineConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.processing.target_size, 128);
        assert_eq!(config.processing.quality, 90);
        assert_eq!(config.processing.resize_mode, ResizeMode::Stretch);
        assert_eq!(config.split.seed, 7);
        assert_eq!(config.split.ratios.train, 0.8);
        assert_eq!(config.temp_dir, PathBuf::from("scratch"));
        assert_eq!(config.source.max_page_size, 20);
    }

    #[test]
    fn test_toml_with_bad_ratios_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[split.ratios]\ntrain = 0.5\nval = 0.3\ntest = 0.3\n").unwrap();

        let err = PipelineConfig::from_toml_file(&path).unwrap_err();
        assert!(matches!(err, DatasetGenError::Config(_)));
    }

    #[test]
    fn test_missing_toml_file() {
        let result = PipelineConfig::from_toml_file(Path::new("/nonexistent/generator.toml"));
        assert!(result.is_err());
    }
}
