//! Collaborator interfaces the pipeline evaluates against.
//!
//! Implementations own their connection/session state; the pipeline only
//! borrows them for the duration of a run.

use crate::types::{AsterError, AsterResult, RasterGrid, Scene};
use chrono::NaiveDate;
use geo::Polygon;
use ndarray::Array2;

/// Class code marking water in the monthly water history
pub const WATER_CLASS: u8 = 2;

/// Spatial and temporal filter for a scene collection query
#[derive(Debug, Clone)]
pub struct SceneQuery {
    /// Collection identifier, e.g. `ASTER/AST_L1T_003`
    pub collection: String,
    /// Area that returned scene footprints must intersect (lon/lat)
    pub bounds: Polygon<f64>,
    /// Inclusive acquisition date range
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl SceneQuery {
    pub fn new(collection: impl Into<String>, bounds: Polygon<f64>) -> Self {
        Self {
            collection: collection.into(),
            bounds,
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn accepts_date(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
    }
}

/// Source of multi-band scenes in DN
pub trait RasterSource: Send + Sync {
    fn query(&self, query: &SceneQuery) -> AsterResult<Vec<Scene>>;
}

/// One monthly water classification raster, resampled onto a scene grid
#[derive(Debug, Clone, PartialEq)]
pub struct WaterLayer {
    pub classes: Array2<u8>,
    pub valid: Array2<bool>,
}

impl WaterLayer {
    pub fn new(classes: Array2<u8>, valid: Array2<bool>) -> AsterResult<Self> {
        if classes.dim() != valid.dim() {
            return Err(AsterError::InvalidInput(format!(
                "Water layer classes {:?} and mask {:?} differ in shape",
                classes.dim(),
                valid.dim()
            )));
        }
        Ok(Self { classes, valid })
    }

    /// Nearest-neighbour resample from the layer's native grid onto `target`;
    /// target pixels outside the native grid are invalid
    pub fn resample(&self, native: &RasterGrid, target: &RasterGrid) -> WaterLayer {
        let mut classes = Array2::<u8>::zeros(target.dim());
        let mut valid = Array2::from_elem(target.dim(), false);
        for ((row, col), class) in classes.indexed_iter_mut() {
            if let Some(index) = native.sample_index(target, row, col) {
                *class = self.classes[index];
                valid[[row, col]] = self.valid[index];
            }
        }
        WaterLayer { classes, valid }
    }
}

/// Monthly surface water reference
pub trait WaterOccurrenceSource: Send + Sync {
    /// All layers for `year`/`month`, sampled onto `grid`; empty when none exist
    fn monthly_layers(&self, year: i32, month: u32, grid: &RasterGrid) -> AsterResult<Vec<WaterLayer>>;
}
