//! Pipeline configuration

use crate::core::coverage::DEFAULT_COVERAGE_THRESHOLD;
use crate::types::{AsterError, AsterResult, Band, MaskKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ASTER L1T precision terrain corrected collection
pub const DEFAULT_COLLECTION: &str = "ASTER/AST_L1T_003";

/// Default CLOUDCOVER ceiling in percent
pub const DEFAULT_MAX_CLOUD_COVER: f64 = 25.0;

/// User-facing pipeline parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Collection identifier queried on the raster source
    pub collection: String,
    /// Output bands; empty means whatever the masks need
    pub bands: Vec<Band>,
    pub masks: Vec<MaskKind>,
    /// Bands ORIGINAL_BANDS_PRESENT must contain; `None` uses the VIS/SWIR + B13 default
    pub required_bands: Option<Vec<Band>>,
    /// Maximum CLOUDCOVER in percent
    pub max_cloud_cover: f64,
    /// Minimum fraction of the area of interest covered by valid pixels
    pub coverage_threshold: f64,
    /// Reduce the surviving scenes to a median composite
    pub composite: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            bands: Vec::new(),
            masks: vec![MaskKind::Cloud],
            required_bands: None,
            max_cloud_cover: DEFAULT_MAX_CLOUD_COVER,
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
            composite: true,
            start_date: None,
            end_date: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> AsterResult<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> AsterResult<Self> {
        log::info!("Loading pipeline configuration from {}", path.as_ref().display());
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Check value ranges
    pub fn validate(&self) -> AsterResult<()> {
        if self.collection.trim().is_empty() {
            return Err(AsterError::Config("Collection identifier is empty".to_string()));
        }
        if !(0.0..=100.0).contains(&self.max_cloud_cover) {
            return Err(AsterError::Config(format!(
                "max_cloud_cover must be within [0, 100], got {}",
                self.max_cloud_cover
            )));
        }
        if !(0.0..=1.0).contains(&self.coverage_threshold) {
            return Err(AsterError::Config(format!(
                "coverage_threshold must be within [0, 1], got {}",
                self.coverage_threshold
            )));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(AsterError::Config(format!(
                    "start_date {} is after end_date {}",
                    start, end
                )));
            }
        }
        Ok(())
    }
}
