use crate::core::aoi::ProjectedAoi;
use crate::core::coverage::aoi_pixels;
use crate::core::stretch::{median, vis_params, VisParams};
use crate::types::{AsterResult, Band, MaskedBand, RasterGrid, Scene, Units};
use ndarray::{Array2, Zip};
use std::collections::BTreeMap;

/// Per-pixel median of a scene collection
#[derive(Debug, Clone)]
pub struct Composite {
    pub grid: RasterGrid,
    pub bands: BTreeMap<Band, MaskedBand>,
    /// Contributing scenes, earliest acquisition first
    pub scene_ids: Vec<String>,
    /// Scene bands left out because their units differ from the other scenes
    pub excluded: Vec<(String, Band)>,
}

impl Composite {
    pub fn scene_count(&self) -> usize {
        self.scene_ids.len()
    }

    pub fn band(&self, band: Band) -> Option<&MaskedBand> {
        self.bands.get(&band)
    }

    /// Default 5/95 percentile stretch for the given bands
    pub fn vis_params(&self, selection: &[Band]) -> AsterResult<VisParams> {
        vis_params(&self.bands, selection)
    }
}

/// Index of the composite pixel's source pixel in every scene
type SampleMap = Array2<Option<(usize, usize)>>;

/// Unit held by most inputs; ties go to the earliest scene
fn consensus_units(inputs: &[(&Scene, &MaskedBand, &SampleMap)]) -> Option<Units> {
    let mut counts: Vec<(Units, usize)> = Vec::new();
    for (_, data, _) in inputs {
        match counts.iter_mut().find(|(units, _)| *units == data.units) {
            Some((_, n)) => *n += 1,
            None => counts.push((data.units, 1)),
        }
    }
    let best = counts.iter().map(|(_, n)| *n).max()?;
    counts.into_iter().find(|(_, n)| *n == best).map(|(units, _)| units)
}

fn sample_map(scene: &Scene, grid: &RasterGrid) -> SampleMap {
    Array2::from_shape_fn(grid.dim(), |(row, col)| scene.grid.sample_index(grid, row, col))
}

/// Median composite on the grid of the earliest scene
///
/// Scenes are nearest-neighbour sampled onto that grid. Pixels without any
/// valid sample stay masked; the result is clipped to `aoi` when given.
/// A band is reduced over the scenes that agree on its units; the others are
/// listed in [`Composite::excluded`]. Returns `None` for an empty collection.
pub fn median_composite(scenes: &[Scene], aoi: Option<&ProjectedAoi>) -> AsterResult<Option<Composite>> {
    let mut ordered: Vec<&Scene> = scenes.iter().collect();
    ordered.sort_by(|a, b| {
        (a.metadata.acquired, a.id()).cmp(&(b.metadata.acquired, b.id()))
    });
    let reference = match ordered.first() {
        Some(scene) => *scene,
        None => return Ok(None),
    };
    let grid = reference.grid;
    log::info!(
        "Compositing {} scene(s) on the grid of {} ({}, {}x{})",
        ordered.len(),
        reference.id(),
        grid.crs,
        grid.rows,
        grid.cols
    );

    let maps: Vec<SampleMap> = ordered.iter().map(|scene| sample_map(scene, &grid)).collect();
    let band_codes: Vec<Band> = {
        let mut codes: Vec<Band> = ordered.iter().flat_map(|s| s.bands.keys().copied()).collect();
        codes.sort();
        codes.dedup();
        codes
    };

    let mut bands = BTreeMap::new();
    let mut excluded = Vec::new();
    for band in band_codes {
        let inputs: Vec<(&Scene, &MaskedBand, &SampleMap)> = ordered
            .iter()
            .zip(maps.iter())
            .filter_map(|(scene, map)| scene.band(band).map(|data| (*scene, data, map)))
            .collect();
        let units = match consensus_units(&inputs) {
            Some(units) => units,
            None => continue,
        };
        let mut agreeing = Vec::with_capacity(inputs.len());
        for (scene, data, map) in inputs {
            if data.units == units {
                agreeing.push((data, map));
            } else {
                log::warn!(
                    "Leaving {} of scene {} out of the composite: {:?} values, expected {:?}",
                    band,
                    scene.id(),
                    data.units,
                    units
                );
                excluded.push((scene.id().to_string(), band));
            }
        }
        bands.insert(band, median_band(&grid, &agreeing, units));
    }

    if let Some(aoi) = aoi {
        let inside = aoi_pixels(&grid, aoi);
        for data in bands.values_mut() {
            data.narrow(&inside);
        }
    }

    Ok(Some(Composite {
        grid,
        bands,
        scene_ids: ordered.iter().map(|s| s.id().to_string()).collect(),
        excluded,
    }))
}

fn median_band(grid: &RasterGrid, inputs: &[(&MaskedBand, &SampleMap)], units: Units) -> MaskedBand {
    let mut values = Array2::<f32>::from_elem(grid.dim(), f32::NAN);
    let mut valid = Array2::from_elem(grid.dim(), false);

    let reduce = |(row, col): (usize, usize), value: &mut f32, ok: &mut bool| {
        let samples: Vec<f32> = inputs
            .iter()
            .filter_map(|(data, map)| {
                let index = map[[row, col]]?;
                if data.valid[index] {
                    Some(data.values[index])
                } else {
                    None
                }
            })
            .collect();
        if let Some(m) = median(samples) {
            *value = m;
            *ok = true;
        }
    };

    #[cfg(feature = "parallel")]
    Zip::indexed(&mut values).and(&mut valid).par_for_each(reduce);
    #[cfg(not(feature = "parallel"))]
    Zip::indexed(&mut values).and(&mut valid).for_each(reduce);

    MaskedBand { values, valid, units }
}
