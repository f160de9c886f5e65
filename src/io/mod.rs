//! Collaborator interfaces and their implementations

pub mod source;
pub mod memory;
pub mod properties;
#[cfg(feature = "gdal")]
pub mod geotiff;

pub use source::{RasterSource, SceneQuery, WaterLayer, WaterOccurrenceSource};
pub use memory::{InMemoryCatalog, InMemoryWaterHistory};
#[cfg(feature = "gdal")]
pub use geotiff::{write_composite_geotiff, GeoTiffWaterHistory};
