use chrono::{DateTime, Datelike, Utc};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub use crate::core::projection::Crs;

/// ASTER L1T band codes
///
/// B01-B09 are the reflective VIS/SWIR bands, B10-B14 the thermal (TIR) bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Band {
    B01,
    B02,
    B3N,
    B04,
    B05,
    B06,
    B07,
    B08,
    B09,
    B10,
    B11,
    B12,
    B13,
    B14,
}

impl Band {
    pub const ALL: [Band; 14] = [
        Band::B01, Band::B02, Band::B3N, Band::B04, Band::B05, Band::B06, Band::B07,
        Band::B08, Band::B09, Band::B10, Band::B11, Band::B12, Band::B13, Band::B14,
    ];

    /// Reflective bands, converted to TOA reflectance
    pub const VIS_SWIR: [Band; 9] = [
        Band::B01, Band::B02, Band::B3N, Band::B04, Band::B05,
        Band::B06, Band::B07, Band::B08, Band::B09,
    ];

    /// Thermal bands, converted to brightness temperature
    pub const TIR: [Band; 5] = [Band::B10, Band::B11, Band::B12, Band::B13, Band::B14];

    pub fn code(&self) -> &'static str {
        match self {
            Band::B01 => "B01",
            Band::B02 => "B02",
            Band::B3N => "B3N",
            Band::B04 => "B04",
            Band::B05 => "B05",
            Band::B06 => "B06",
            Band::B07 => "B07",
            Band::B08 => "B08",
            Band::B09 => "B09",
            Band::B10 => "B10",
            Band::B11 => "B11",
            Band::B12 => "B12",
            Band::B13 => "B13",
            Band::B14 => "B14",
        }
    }

    pub fn is_reflective(&self) -> bool {
        Band::VIS_SWIR.contains(self)
    }

    pub fn is_thermal(&self) -> bool {
        Band::TIR.contains(self)
    }

    /// Name of the scene attribute holding this band's gain coefficient
    pub fn gain_attribute(&self) -> String {
        format!("GAIN_COEFFICIENT_{}", self.code())
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Band {
    type Err = AsterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        Band::ALL
            .iter()
            .copied()
            .find(|band| band.code() == code)
            .ok_or_else(|| AsterError::InvalidInput(format!("Unknown ASTER band code: {}", s)))
    }
}

/// Deduplicated set of bands
///
/// Membership is the contract; iteration follows band order so results are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandSet(BTreeSet<Band>);

impl BandSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn insert(&mut self, band: Band) -> bool {
        self.0.insert(band)
    }

    pub fn contains(&self, band: Band) -> bool {
        self.0.contains(&band)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Band> + '_ {
        self.0.iter().copied()
    }

    pub fn union(&self, other: &BandSet) -> BandSet {
        BandSet(self.0.union(&other.0).copied().collect())
    }

    pub fn intersection(&self, other: &BandSet) -> BandSet {
        BandSet(self.0.intersection(&other.0).copied().collect())
    }

    pub fn difference(&self, other: &BandSet) -> BandSet {
        BandSet(self.0.difference(&other.0).copied().collect())
    }

    pub fn is_subset(&self, other: &BandSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn to_vec(&self) -> Vec<Band> {
        self.iter().collect()
    }

    pub fn vis_swir() -> BandSet {
        Band::VIS_SWIR.into_iter().collect()
    }

    pub fn tir() -> BandSet {
        Band::TIR.into_iter().collect()
    }
}

impl FromIterator<Band> for BandSet {
    fn from_iter<I: IntoIterator<Item = Band>>(iter: I) -> Self {
        BandSet(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Band; N]> for BandSet {
    fn from(bands: [Band; N]) -> Self {
        bands.into_iter().collect()
    }
}

impl fmt::Display for BandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.iter().map(|b| b.code()).collect();
        write!(f, "[{}]", codes.join(", "))
    }
}

/// Quality masks that can be applied to a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskKind {
    Cloud,
    Snow,
    Water,
}

impl MaskKind {
    /// Fixed application order of the cascade
    pub const ORDER: [MaskKind; 3] = [MaskKind::Cloud, MaskKind::Snow, MaskKind::Water];

    pub fn name(&self) -> &'static str {
        match self {
            MaskKind::Cloud => "cloud",
            MaskKind::Snow => "snow",
            MaskKind::Water => "water",
        }
    }
}

impl fmt::Display for MaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for MaskKind {
    type Err = AsterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cloud" => Ok(MaskKind::Cloud),
            "snow" => Ok(MaskKind::Snow),
            "water" => Ok(MaskKind::Water),
            other => Err(AsterError::InvalidInput(format!("Unknown mask: {}", other))),
        }
    }
}

/// Physical unit currently held by a band's pixel values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    /// Raw digital numbers
    Dn,
    /// At-sensor radiance (W m-2 sr-1 um-1)
    Radiance,
    /// Top-of-atmosphere reflectance (unitless)
    Reflectance,
    /// At-satellite brightness temperature (K)
    BrightnessTemperature,
}

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform with square pixels
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    /// Map fractional (col, row) pixel coordinates to CRS coordinates
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.top_left_x + col * self.pixel_width + row * self.rotation_x;
        let y = self.top_left_y + col * self.rotation_y + row * self.pixel_height;
        (x, y)
    }

    /// Map CRS coordinates to fractional (col, row) pixel coordinates
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let dx = x - self.top_left_x;
        let dy = y - self.top_left_y;
        let col = (dx * self.pixel_height - dy * self.rotation_x) / det;
        let row = (dy * self.pixel_width - dx * self.rotation_y) / det;
        Some((col, row))
    }

    pub fn as_array(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

/// Pixel grid of a raster: CRS, affine transform and shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterGrid {
    pub crs: Crs,
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

impl RasterGrid {
    pub fn new(crs: Crs, transform: GeoTransform, rows: usize, cols: usize) -> Self {
        Self { crs, transform, rows, cols }
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Centre of pixel (row, col) in the grid CRS
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Corners of pixel (row, col) in the grid CRS, as a closed ring order
    pub fn pixel_corners(&self, row: usize, col: usize) -> [(f64, f64); 4] {
        let (r, c) = (row as f64, col as f64);
        [
            self.transform.pixel_to_world(c, r),
            self.transform.pixel_to_world(c + 1.0, r),
            self.transform.pixel_to_world(c + 1.0, r + 1.0),
            self.transform.pixel_to_world(c, r + 1.0),
        ]
    }

    /// Pixel of `self` containing the centre of pixel (row, col) of `other`
    pub fn sample_index(&self, other: &RasterGrid, row: usize, col: usize) -> Option<(usize, usize)> {
        if self == other {
            return Some((row, col));
        }
        let (x, y) = other.pixel_center(row, col);
        let (sx, sy) = other.crs.transform_to(&self.crs, x, y);
        let (c, r) = self.transform.world_to_pixel(sx, sy)?;
        if !(c >= 0.0 && r >= 0.0) {
            return None;
        }
        let (r, c) = (r.floor() as usize, c.floor() as usize);
        if r < self.rows && c < self.cols {
            Some((r, c))
        } else {
            None
        }
    }

    /// Longitude/latitude of each corner of the full grid
    pub fn footprint_lon_lat(&self) -> Vec<(f64, f64)> {
        let (rows, cols) = (self.rows as f64, self.cols as f64);
        [(0.0, 0.0), (cols, 0.0), (cols, rows), (0.0, rows)]
            .iter()
            .map(|&(c, r)| {
                let (x, y) = self.transform.pixel_to_world(c, r);
                self.crs.to_lon_lat(x, y)
            })
            .collect()
    }
}

/// A band's pixel values together with its validity mask
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedBand {
    pub values: Array2<f32>,
    /// true = valid pixel
    pub valid: Array2<bool>,
    pub units: Units,
}

impl MaskedBand {
    pub fn new(values: Array2<f32>, valid: Array2<bool>, units: Units) -> AsterResult<Self> {
        if values.dim() != valid.dim() {
            return Err(AsterError::InvalidInput(format!(
                "Band values {:?} and mask {:?} differ in shape",
                values.dim(),
                valid.dim()
            )));
        }
        Ok(Self { values, valid, units })
    }

    /// Raw DN band; DN 0 is the L1T fill value and starts out invalid
    pub fn from_dn(values: Array2<f32>) -> Self {
        let valid = values.mapv(|dn| dn != 0.0);
        Self { values, valid, units: Units::Dn }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Intersect this band's mask with `keep`
    pub fn narrow(&mut self, keep: &Array2<bool>) {
        Zip::from(&mut self.valid).and(keep).for_each(|valid, &k| *valid = *valid && k);
    }
}

/// Scene-level attributes delivered with each ASTER L1T scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub scene_id: String,
    pub acquired: DateTime<Utc>,
    /// ORIGINAL_BANDS_PRESENT
    pub original_bands_present: BandSet,
    /// GAIN_COEFFICIENT_<band>
    pub gain_coefficients: BTreeMap<Band, f64>,
    /// SOLAR_ELEVATION in degrees
    pub solar_elevation: f64,
    /// CLOUDCOVER in percent
    pub cloud_cover: f64,
}

impl SceneMetadata {
    pub fn gain_coefficient(&self, band: Band) -> AsterResult<f64> {
        self.gain_coefficients.get(&band).copied().ok_or_else(|| {
            AsterError::Metadata(format!(
                "Scene {} is missing {}",
                self.scene_id,
                band.gain_attribute()
            ))
        })
    }

    /// Zero-based day of year (1 January is day 0)
    pub fn day_of_year(&self) -> u32 {
        self.acquired.ordinal0()
    }

    pub fn year_month(&self) -> (i32, u32) {
        (self.acquired.year(), self.acquired.month())
    }
}

/// Non-fatal conditions raised while processing a scene
#[derive(Debug, Clone, PartialEq)]
pub enum Advisory {
    /// Requested bands and convertible bands do not intersect
    NoValidBands { scene_id: String },
    /// A mask could not be evaluated because its input bands are unavailable
    MaskSkipped { scene_id: String, mask: MaskKind, missing: BandSet },
    /// The water reference has no layer for the acquisition month
    WaterReferenceUnavailable { scene_id: String, year: i32, month: u32 },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::NoValidBands { scene_id } => {
                write!(f, "scene {}: no valid bands to convert, returned unmodified", scene_id)
            }
            Advisory::MaskSkipped { scene_id, mask, missing } => {
                write!(f, "scene {}: {} mask skipped, bands unavailable: {}", scene_id, mask, missing)
            }
            Advisory::WaterReferenceUnavailable { scene_id, year, month } => {
                write!(f, "scene {}: no water reference for {}-{:02}, water mask skipped", scene_id, year, month)
            }
        }
    }
}

/// Multi-band ASTER scene
///
/// Each processing stage consumes a scene and returns the transformed value.
#[derive(Debug, Clone)]
pub struct Scene {
    pub metadata: SceneMetadata,
    pub grid: RasterGrid,
    pub bands: BTreeMap<Band, MaskedBand>,
    /// Fraction of the area of interest covered by valid pixels
    pub geom_coverage: Option<f64>,
    pub advisories: Vec<Advisory>,
}

impl Scene {
    pub fn new(
        metadata: SceneMetadata,
        grid: RasterGrid,
        bands: BTreeMap<Band, MaskedBand>,
    ) -> AsterResult<Self> {
        for (band, data) in &bands {
            if data.dim() != grid.dim() {
                return Err(AsterError::InvalidInput(format!(
                    "Scene {}: band {} has shape {:?}, grid is {:?}",
                    metadata.scene_id,
                    band,
                    data.dim(),
                    grid.dim()
                )));
            }
        }
        Ok(Self {
            metadata,
            grid,
            bands,
            geom_coverage: None,
            advisories: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.metadata.scene_id
    }

    pub fn band(&self, band: Band) -> Option<&MaskedBand> {
        self.bands.get(&band)
    }

    /// Band is both flagged in ORIGINAL_BANDS_PRESENT and carried as pixel data
    pub fn has_band(&self, band: Band) -> bool {
        self.metadata.original_bands_present.contains(band) && self.bands.contains_key(&band)
    }

    /// Bands that are physically present and loaded
    pub fn present_bands(&self) -> BandSet {
        self.bands
            .keys()
            .copied()
            .filter(|b| self.metadata.original_bands_present.contains(*b))
            .collect()
    }

    /// Present bands currently holding values in `units`
    pub fn bands_in_units(&self, units: Units) -> BandSet {
        self.present_bands()
            .iter()
            .filter(|b| self.bands.get(b).map(|d| d.units == units).unwrap_or(false))
            .collect()
    }

    /// Intersect every band's mask with `keep`
    pub fn narrow_mask(&mut self, keep: &Array2<bool>) {
        for data in self.bands.values_mut() {
            data.narrow(keep);
        }
    }

    pub fn advise(&mut self, advisory: Advisory) {
        log::warn!("{}", advisory);
        self.advisories.push(advisory);
    }
}

/// Error types for ASTER processing
#[derive(Debug, thiserror::Error)]
pub enum AsterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

impl AsterError {
    /// Errors confined to a single scene; the collection carries on without it
    pub fn is_scene_scoped(&self) -> bool {
        matches!(self, AsterError::Metadata(_) | AsterError::Processing(_))
    }
}

/// Result type for ASTER operations
pub type AsterResult<T> = Result<T, AsterError>;
