//! In-memory collaborators for offline runs and tests

use crate::io::source::{RasterSource, SceneQuery, WaterLayer, WaterOccurrenceSource};
use crate::types::{AsterError, AsterResult, RasterGrid, Scene};
use geo::{Coord, Intersects, LineString, Polygon};
use std::collections::{BTreeMap, HashMap};

/// Scene collections held in memory, keyed by collection id
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    collections: BTreeMap<String, Vec<Scene>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenes(collection: impl Into<String>, scenes: Vec<Scene>) -> Self {
        let mut catalog = Self::new();
        catalog.collections.insert(collection.into(), scenes);
        catalog
    }

    pub fn insert(&mut self, collection: &str, scene: Scene) {
        self.collections.entry(collection.to_string()).or_default().push(scene);
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }
}

/// Scene footprint as a lon/lat polygon
pub fn footprint(grid: &RasterGrid) -> Polygon<f64> {
    let mut ring: Vec<Coord<f64>> = grid
        .footprint_lon_lat()
        .into_iter()
        .map(|(x, y)| Coord { x, y })
        .collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    Polygon::new(LineString::from(ring), vec![])
}

impl RasterSource for InMemoryCatalog {
    fn query(&self, query: &SceneQuery) -> AsterResult<Vec<Scene>> {
        let scenes = self.collections.get(&query.collection).ok_or_else(|| {
            AsterError::InvalidInput(format!("Unknown collection: {}", query.collection))
        })?;
        Ok(scenes
            .iter()
            .filter(|scene| query.accepts_date(scene.metadata.acquired.date_naive()))
            .filter(|scene| footprint(&scene.grid).intersects(&query.bounds))
            .cloned()
            .collect())
    }
}

/// Monthly water classification rasters on their native grids
#[derive(Debug, Clone, Default)]
pub struct InMemoryWaterHistory {
    months: HashMap<(i32, u32), Vec<(RasterGrid, WaterLayer)>>,
}

impl InMemoryWaterHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: i32, month: u32, grid: RasterGrid, layer: WaterLayer) -> AsterResult<()> {
        if layer.classes.dim() != grid.dim() {
            return Err(AsterError::InvalidInput(format!(
                "Water layer {:?} does not match its grid {:?}",
                layer.classes.dim(),
                grid.dim()
            )));
        }
        self.months.entry((year, month)).or_default().push((grid, layer));
        Ok(())
    }
}

impl WaterOccurrenceSource for InMemoryWaterHistory {
    fn monthly_layers(&self, year: i32, month: u32, grid: &RasterGrid) -> AsterResult<Vec<WaterLayer>> {
        Ok(self
            .months
            .get(&(year, month))
            .map(|layers| {
                layers
                    .iter()
                    .map(|(native, layer)| layer.resample(native, grid))
                    .collect()
            })
            .unwrap_or_default())
    }
}
