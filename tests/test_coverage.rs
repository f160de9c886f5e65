mod common;

use approx::assert_relative_eq;
use asterprep::core::aoi::{AreaOfInterest, Feature, ProjectedAoi};
use asterprep::core::coverage::{clip_to_aoi, compute_coverage, with_coverage, CoverageFilter};
use asterprep::core::projection::{utm_epsg, utm_zone};
use asterprep::{AsterError, Band, Crs, GeoTransform, RasterGrid};
use common::{aoi_square, grid_over, physical_scene, projected, PIXEL_SIZE};
use geo::{Geometry, MultiPoint, MultiPolygon, Point};
use ndarray::Array2;

#[test]
fn test_utm_zone_lookup() {
    assert_eq!(utm_epsg(45.0, 15.0), 32633);
    assert_eq!(utm_epsg(-33.9, 18.4), 32734);
    // Southern Norway and Svalbard overrides
    assert_eq!(utm_zone(60.0, 5.0), 32);
    assert_eq!(utm_zone(78.0, 15.0), 33);
    assert_eq!(utm_zone(78.0, 25.0), 35);
    assert_eq!(utm_zone(0.0, 180.0), 60);
}

#[test]
fn test_aoi_projection_follows_centroid_hemisphere() {
    let south = projected(&aoi_square(-70.52, -33.5, 0.05));
    assert_eq!(south.crs, Crs::Utm { zone: 19, north: false });
    assert_eq!(south.crs.epsg(), 32719);
    assert!(south.area > 0.0);
}

#[test]
fn test_feature_wrapper_is_unwrapped() {
    let square = aoi_square(15.0, 45.0, 0.02);
    let feature = Feature::new(Geometry::MultiPolygon(MultiPolygon(vec![square.clone()])));
    let from_feature = ProjectedAoi::new(&AreaOfInterest::from(feature)).unwrap();
    let direct = projected(&square);
    assert_relative_eq!(from_feature.area, direct.area);

    let points = Feature::new(Geometry::MultiPoint(MultiPoint(vec![Point::new(15.0, 45.0)])));
    let err = ProjectedAoi::new(&AreaOfInterest::from(points)).unwrap_err();
    assert!(matches!(err, AsterError::InvalidInput(_)));
}

#[test]
fn test_coverage_is_a_fraction() {
    let aoi = projected(&aoi_square(15.0, 45.0, 0.02));
    let grid = grid_over(&aoi, 2);
    let full = physical_scene(grid, &[Band::B01, Band::B04], |_, _, _| 0.2);
    assert_relative_eq!(compute_coverage(&full, &aoi), 1.0, epsilon = 1e-6);

    // Masking pixels can only lower coverage
    let mut partial = full.clone();
    let keep = Array2::from_shape_fn(grid.dim(), |(r, c)| (r + c) % 2 == 0);
    partial.narrow_mask(&keep);
    let coverage = compute_coverage(&partial, &aoi);
    assert!(coverage > 0.4 && coverage < 0.6, "coverage {}", coverage);
}

#[test]
fn test_coverage_averages_over_bands() {
    let aoi = projected(&aoi_square(15.0, 45.0, 0.02));
    let grid = grid_over(&aoi, 2);
    let mut scene = physical_scene(grid, &[Band::B01, Band::B04], |_, _, _| 0.2);
    scene.bands.get_mut(&Band::B04).unwrap().valid.fill(false);
    assert_relative_eq!(compute_coverage(&scene, &aoi), 0.5, epsilon = 1e-6);
}

#[test]
fn test_zero_valid_pixels_is_excluded_by_default() {
    let aoi = projected(&aoi_square(15.0, 45.0, 0.02));
    let grid = grid_over(&aoi, 2);
    let mut scene = physical_scene(grid, &[Band::B01], |_, _, _| 0.2);
    scene.narrow_mask(&Array2::from_elem(grid.dim(), false));

    let scored = with_coverage(scene, &aoi);
    assert_eq!(scored.geom_coverage, Some(0.0));
    let (kept, rejected) = CoverageFilter::default().apply(vec![scored]);
    assert!(kept.is_empty());
    assert_eq!(rejected, vec!["physical".to_string()]);
}

#[test]
fn test_scene_off_the_aoi_has_no_coverage() {
    let aoi = projected(&aoi_square(15.0, 45.0, 0.02));
    let grid = grid_over(&aoi, 0);
    let far = RasterGrid::new(
        grid.crs,
        GeoTransform::north_up(
            grid.transform.top_left_x + 100_000.0,
            grid.transform.top_left_y,
            PIXEL_SIZE,
        ),
        grid.rows,
        grid.cols,
    );
    let scene = physical_scene(far, &[Band::B01], |_, _, _| 0.2);
    assert_eq!(compute_coverage(&scene, &aoi), 0.0);
}

#[test]
fn test_scene_in_neighbouring_zone() {
    // AOI centred just east of the 18E zone boundary, scene delivered in zone 33
    let aoi = projected(&aoi_square(18.005, 45.0, 0.02));
    assert_eq!(aoi.crs, Crs::Utm { zone: 34, north: true });

    let zone33 = Crs::Utm { zone: 33, north: true };
    let corners: Vec<(f64, f64)> = aoi
        .lon_lat
        .exterior()
        .coords()
        .map(|c| zone33.from_lon_lat(c.x, c.y))
        .collect();
    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min) - 300.0;
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max) + 300.0;
    let grid = RasterGrid::new(zone33, GeoTransform::north_up(min_x, max_y, PIXEL_SIZE), 60, 60);

    let scene = physical_scene(grid, &[Band::B01], |_, _, _| 0.2);
    assert_relative_eq!(compute_coverage(&scene, &aoi), 1.0, epsilon = 1e-3);
}

#[test]
fn test_clip_masks_outside_pixels() {
    let aoi = projected(&aoi_square(15.0, 45.0, 0.02));
    let grid = grid_over(&aoi, 4);
    let scene = physical_scene(grid, &[Band::B01], |_, _, _| 0.2);
    let before = scene.band(Band::B01).unwrap().valid_count();
    let clipped = clip_to_aoi(scene, &aoi);
    let band = clipped.band(Band::B01).unwrap();

    assert!(band.valid_count() < before);
    assert!(!band.valid[[0, 0]]);
    assert!(!band.valid[[grid.rows - 1, grid.cols - 1]]);
    assert!(band.valid[[grid.rows / 2, grid.cols / 2]]);
    let coverage = compute_coverage(&clipped, &aoi);
    assert!(coverage > 0.97 && coverage <= 1.0 + 1e-9, "coverage {}", coverage);
}
