//! Clip-to-AOI and geometric coverage scoring.
//!
//! Coverage of a scene is the area of its valid pixels inside the area of
//! interest, measured in the AOI's UTM projection, averaged over bands and
//! divided by the AOI area.

use crate::core::aoi::ProjectedAoi;
use crate::types::{AsterError, AsterResult, RasterGrid, Scene};
use geo::{Coord, LineString, Polygon};
use ndarray::{Array2, Zip};
use std::ops::Range;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default minimum fraction of the AOI a scene must cover
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.75;

/// Rows and columns of `grid` that can touch the AOI, padded by one pixel
pub fn aoi_window(grid: &RasterGrid, aoi: &ProjectedAoi) -> Option<(Range<usize>, Range<usize>)> {
    let mut col_min = f64::INFINITY;
    let mut col_max = f64::NEG_INFINITY;
    let mut row_min = f64::INFINITY;
    let mut row_max = f64::NEG_INFINITY;

    for coord in aoi.lon_lat.exterior().coords() {
        let (x, y) = grid.crs.from_lon_lat(coord.x, coord.y);
        let (col, row) = grid.transform.world_to_pixel(x, y)?;
        col_min = col_min.min(col);
        col_max = col_max.max(col);
        row_min = row_min.min(row);
        row_max = row_max.max(row);
    }
    if !(col_min.is_finite() && col_max.is_finite() && row_min.is_finite() && row_max.is_finite()) {
        return None;
    }

    let clamp = |v: f64, len: usize| v.max(0.0).min(len as f64) as usize;
    let rows = clamp(row_min.floor() - 1.0, grid.rows)..clamp(row_max.ceil() + 1.0, grid.rows);
    let cols = clamp(col_min.floor() - 1.0, grid.cols)..clamp(col_max.ceil() + 1.0, grid.cols);
    if rows.is_empty() || cols.is_empty() {
        return None;
    }
    Some((rows, cols))
}

/// Footprint of pixel (row, col) expressed in the AOI projection
pub fn pixel_footprint(grid: &RasterGrid, aoi: &ProjectedAoi, row: usize, col: usize) -> Polygon<f64> {
    let mut ring: Vec<Coord<f64>> = grid
        .pixel_corners(row, col)
        .iter()
        .map(|&(x, y)| {
            let (ax, ay) = grid.crs.transform_to(&aoi.crs, x, y);
            Coord { x: ax, y: ay }
        })
        .collect();
    ring.push(ring[0]);
    Polygon::new(LineString::from(ring), vec![])
}

/// Evaluate `f(row, col)` for every pixel in the window, zero elsewhere
fn window_map<F>(grid: &RasterGrid, window: Option<(Range<usize>, Range<usize>)>, f: F) -> Array2<f64>
where
    F: Fn(usize, usize) -> f64 + Sync + Send,
{
    let mut out = Array2::<f64>::zeros(grid.dim());
    let (rows, cols) = match window {
        Some(window) => window,
        None => return out,
    };

    let compute_row = |row: usize| -> (usize, Vec<f64>) {
        (row, cols.clone().map(|col| f(row, col)).collect())
    };

    #[cfg(feature = "parallel")]
    let computed: Vec<(usize, Vec<f64>)> = rows.into_par_iter().map(compute_row).collect();
    #[cfg(not(feature = "parallel"))]
    let computed: Vec<(usize, Vec<f64>)> = rows.map(compute_row).collect();

    for (row, values) in computed {
        for (offset, value) in values.into_iter().enumerate() {
            out[[row, cols.start + offset]] = value;
        }
    }
    out
}

/// Square meters of each pixel footprint lying inside the AOI
pub fn overlap_areas(grid: &RasterGrid, aoi: &ProjectedAoi) -> Array2<f64> {
    window_map(grid, aoi_window(grid, aoi), |row, col| {
        aoi.overlap_area(&pixel_footprint(grid, aoi, row, col))
    })
}

/// Pixels whose centre falls inside the AOI
pub fn aoi_pixels(grid: &RasterGrid, aoi: &ProjectedAoi) -> Array2<bool> {
    window_map(grid, aoi_window(grid, aoi), |row, col| {
        let (x, y) = grid.pixel_center(row, col);
        let (ax, ay) = grid.crs.transform_to(&aoi.crs, x, y);
        if aoi.contains(ax, ay) {
            1.0
        } else {
            0.0
        }
    })
    .mapv(|inside| inside > 0.0)
}

/// Mask out every pixel whose centre lies outside the AOI
pub fn clip_to_aoi(mut scene: Scene, aoi: &ProjectedAoi) -> Scene {
    let inside = aoi_pixels(&scene.grid, aoi);
    scene.narrow_mask(&inside);
    scene
}

/// Fraction of the AOI covered by the scene's valid pixels, averaged over bands
pub fn compute_coverage(scene: &Scene, aoi: &ProjectedAoi) -> f64 {
    if scene.bands.is_empty() {
        return 0.0;
    }
    let overlap = overlap_areas(&scene.grid, aoi);

    let covered: f64 = scene
        .bands
        .values()
        .map(|band| {
            let mut area = 0.0;
            Zip::from(&overlap).and(&band.valid).for_each(|&a, &v| {
                if v {
                    area += a;
                }
            });
            area
        })
        .sum::<f64>()
        / scene.bands.len() as f64;

    covered / aoi.area
}

/// Compute and attach `geom_coverage`
pub fn with_coverage(mut scene: Scene, aoi: &ProjectedAoi) -> Scene {
    let coverage = compute_coverage(&scene, aoi);
    log::debug!("Scene {}: geometric coverage {:.3}", scene.id(), coverage);
    scene.geom_coverage = Some(coverage);
    scene
}

/// Keeps scenes covering at least `threshold` of the AOI
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageFilter {
    threshold: f64,
}

impl Default for CoverageFilter {
    fn default() -> Self {
        Self { threshold: DEFAULT_COVERAGE_THRESHOLD }
    }
}

impl CoverageFilter {
    pub fn new(threshold: f64) -> AsterResult<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AsterError::InvalidInput(format!(
                "Coverage threshold {} is outside [0, 1]",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scenes without a computed coverage are rejected
    pub fn accepts(&self, scene: &Scene) -> bool {
        scene.geom_coverage.map_or(false, |c| c >= self.threshold)
    }

    /// Split scenes into (kept, rejected ids)
    pub fn apply(&self, scenes: Vec<Scene>) -> (Vec<Scene>, Vec<String>) {
        let (kept, rejected): (Vec<Scene>, Vec<Scene>) =
            scenes.into_iter().partition(|scene| self.accepts(scene));
        for scene in &rejected {
            log::info!(
                "Dropping scene {}: coverage {:.3} below {:.2}",
                scene.id(),
                scene.geom_coverage.unwrap_or(0.0),
                self.threshold
            );
        }
        (kept, rejected.into_iter().map(|s| s.metadata.scene_id).collect())
    }
}
