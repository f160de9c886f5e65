use crate::core::composite::Composite;
use crate::io::source::{WaterLayer, WaterOccurrenceSource};
use crate::types::{AsterError, AsterResult, Band, Crs, GeoTransform, MaskedBand, RasterGrid, Scene};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// No-data class of the monthly water history
pub const WATER_NO_DATA: u8 = 0;

fn transform_from_gdal(gt: [f64; 6]) -> GeoTransform {
    GeoTransform {
        top_left_x: gt[0],
        pixel_width: gt[1],
        rotation_x: gt[2],
        top_left_y: gt[3],
        rotation_y: gt[4],
        pixel_height: gt[5],
    }
}

/// Write bands as a float32 GeoTIFF, one raster band per image band; masked
/// pixels are written as NaN
pub fn write_bands_geotiff<P: AsRef<Path>>(
    grid: &RasterGrid,
    bands: &BTreeMap<Band, MaskedBand>,
    output_path: P,
) -> AsterResult<()> {
    log::info!("Saving {} band(s) as GeoTIFF: {}", bands.len(), output_path.as_ref().display());
    if bands.is_empty() {
        return Err(AsterError::InvalidInput("No bands to write".to_string()));
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (height, width) = grid.dim();
    let mut dataset = driver.create_with_band_type::<f32, _>(
        output_path.as_ref(),
        width as isize,
        height as isize,
        bands.len() as isize,
    )?;

    dataset.set_geo_transform(&grid.transform.as_array())?;
    dataset.set_spatial_ref(&SpatialRef::from_epsg(grid.crs.epsg())?)?;

    for (index, (band, data)) in bands.iter().enumerate() {
        let mut rasterband = dataset.rasterband(index as isize + 1)?;
        let flat_data: Vec<f32> = data
            .values
            .iter()
            .zip(data.valid.iter())
            .map(|(&v, &ok)| if ok { v } else { f32::NAN })
            .collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;
        rasterband.set_no_data_value(Some(f64::NAN))?;
        rasterband.set_metadata_item("BAND_NAME", band.code(), "")?;
        log::debug!("Wrote band {} ({} valid pixels)", band, data.valid_count());
    }

    log::info!("✅ GeoTIFF saved successfully");
    Ok(())
}

pub fn write_composite_geotiff<P: AsRef<Path>>(composite: &Composite, output_path: P) -> AsterResult<()> {
    write_bands_geotiff(&composite.grid, &composite.bands, output_path)
}

pub fn write_scene_geotiff<P: AsRef<Path>>(scene: &Scene, output_path: P) -> AsterResult<()> {
    write_bands_geotiff(&scene.grid, &scene.bands, output_path)
}

/// Read a single-band class raster together with its grid
pub fn read_class_raster<P: AsRef<Path>>(path: P) -> AsterResult<(RasterGrid, WaterLayer)> {
    log::debug!("Reading class raster: {}", path.as_ref().display());
    let dataset = Dataset::open(path.as_ref())?;
    let transform = transform_from_gdal(dataset.geo_transform()?);
    let (width, height) = dataset.raster_size();
    let epsg = dataset.spatial_ref()?.auth_code()?;
    let crs = Crs::from_epsg(epsg as u32)?;

    let rasterband = dataset.rasterband(1)?;
    let no_data = rasterband
        .no_data_value()
        .map(|v| v as u8)
        .unwrap_or(WATER_NO_DATA);
    let band_data = rasterband.read_as::<u8>((0, 0), (width, height), (width, height), None)?;
    let classes = Array2::from_shape_vec((height, width), band_data.data)
        .map_err(|e| AsterError::Processing(format!("Failed to reshape class raster: {}", e)))?;
    let valid = classes.mapv(|c| c != no_data);

    let grid = RasterGrid::new(crs, transform, height, width);
    Ok((grid, WaterLayer::new(classes, valid)?))
}

/// Monthly water history stored as `<year>_<month:02>.tif` files in one directory
#[derive(Debug, Clone)]
pub struct GeoTiffWaterHistory {
    directory: PathBuf,
}

impl GeoTiffWaterHistory {
    pub fn new<P: AsRef<Path>>(directory: P) -> AsterResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.is_dir() {
            return Err(AsterError::Config(format!(
                "Water history directory {} does not exist",
                directory.display()
            )));
        }
        Ok(Self { directory })
    }

    pub fn month_path(&self, year: i32, month: u32) -> PathBuf {
        self.directory.join(format!("{}_{:02}.tif", year, month))
    }
}

impl WaterOccurrenceSource for GeoTiffWaterHistory {
    fn monthly_layers(&self, year: i32, month: u32, grid: &RasterGrid) -> AsterResult<Vec<WaterLayer>> {
        let path = self.month_path(year, month);
        if !path.exists() {
            log::debug!("No water history file {}", path.display());
            return Ok(Vec::new());
        }
        let (native, layer) = read_class_raster(&path)?;
        Ok(vec![layer.resample(&native, grid)])
    }
}
