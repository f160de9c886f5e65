mod common;

use approx::assert_relative_eq;
use asterprep::{
    Advisory, AreaOfInterest, AsterError, Band, CollectionPipeline, InMemoryCatalog,
    InMemoryWaterHistory, MaskKind, PipelineConfig, PipelinePlan, Scene, Units,
};
use chrono::NaiveDate;
use common::{
    aoi_square, clear_pixel, cloud_pixel, grid_over, init_logging, projected, SceneBuilder,
    UnreadableHistory,
};

const COLLECTION: &str = "ASTER/AST_L1T_003";

fn brighter(band: Band) -> f64 {
    if band.is_reflective() {
        clear_pixel(band) * 1.1
    } else {
        clear_pixel(band)
    }
}

fn catalog() -> (AreaOfInterest, InMemoryCatalog) {
    let square = aoi_square(15.0, 45.0, 0.02);
    let grid = grid_over(&projected(&square), 2);
    let third = grid.cols / 3;

    let scenes: Vec<Scene> = vec![
        SceneBuilder::new("good-a", grid).date(2019, 7, 1).build_clear(),
        SceneBuilder::new("good-b", grid)
            .date(2019, 7, 15)
            .build(|band, _, _| Some(brighter(band))),
        SceneBuilder::new("cloudy-meta", grid).cloud_cover(60.0).build_clear(),
        SceneBuilder::new("no-b13", grid)
            .bands(&[
                Band::B01, Band::B02, Band::B3N, Band::B04, Band::B05,
                Band::B06, Band::B07, Band::B08, Band::B09,
            ])
            .build_clear(),
        SceneBuilder::new("partial", grid)
            .date(2019, 7, 3)
            .build(|band, _, col| if col < third { Some(clear_pixel(band)) } else { None }),
        SceneBuilder::new("broken", grid).without_gain(Band::B05).build_clear(),
        SceneBuilder::new("overcast", grid)
            .cloud_cover(10.0)
            .build(|band, _, _| Some(cloud_pixel(band))),
    ];
    (AreaOfInterest::from(square), InMemoryCatalog::with_scenes(COLLECTION, scenes))
}

#[test]
fn test_collection_run_filters_and_composites() {
    init_logging();
    let (aoi, catalog) = catalog();
    let plan = PipelinePlan::from_config(&PipelineConfig::default()).unwrap();
    let output = CollectionPipeline::new(&catalog).run(&plan, &aoi).unwrap();

    let ids: Vec<&str> = output.scenes.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["good-a", "good-b"]);

    let report = &output.report;
    assert_eq!(report.queried, 7);
    assert_eq!(report.missing_bands, vec!["no-b13".to_string()]);
    assert_eq!(report.too_cloudy, vec!["cloudy-meta".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "broken");
    assert!(report.failed[0].1.contains("GAIN_COEFFICIENT_B05"));
    assert_eq!(report.below_coverage, vec!["partial".to_string(), "overcast".to_string()]);

    for scene in &output.scenes {
        let coverage = scene.geom_coverage.unwrap();
        assert!(coverage >= 0.75 && coverage <= 1.0 + 1e-9);
    }

    let composite = output.composite.expect("composite");
    assert_eq!(composite.scene_ids, vec!["good-a".to_string(), "good-b".to_string()]);
    let b01 = composite.band(Band::B01).unwrap();
    assert_eq!(b01.units, Units::Reflectance);
    let (rows, cols) = b01.dim();
    assert!(!b01.valid[[0, 0]]);
    assert!(b01.valid[[rows / 2, cols / 2]]);
    assert_relative_eq!(b01.values[[rows / 2, cols / 2]] as f64, 0.105, epsilon = 1e-5);

    assert!(composite.excluded.is_empty());
    assert!(report.composite_excluded.is_empty());
    let stretch = composite.vis_params(&[Band::B3N, Band::B13]).unwrap();
    assert_eq!(stretch.bands, vec![Band::B3N, Band::B13]);
    assert!(stretch.min[0] <= stretch.max[0]);
}

#[test]
fn test_date_range_and_empty_results() {
    let (aoi, catalog) = catalog();
    let config = PipelineConfig {
        start_date: NaiveDate::from_ymd_opt(2019, 7, 10),
        ..Default::default()
    };
    let plan = PipelinePlan::from_config(&config).unwrap();
    let output = CollectionPipeline::new(&catalog).run(&plan, &aoi).unwrap();
    assert_eq!(output.report.queried, 1);
    assert_eq!(output.scenes.len(), 1);

    let config = PipelineConfig {
        start_date: NaiveDate::from_ymd_opt(2021, 1, 1),
        ..Default::default()
    };
    let plan = PipelinePlan::from_config(&config).unwrap();
    let output = CollectionPipeline::new(&catalog).run(&plan, &aoi).unwrap();
    assert!(output.scenes.is_empty());
    assert!(output.composite.is_none());
}

#[test]
fn test_aoi_elsewhere_queries_nothing() {
    let (_, catalog) = catalog();
    let plan = PipelinePlan::from_config(&PipelineConfig::default()).unwrap();
    let far = AreaOfInterest::from(aoi_square(-100.0, 40.0, 0.02));
    let output = CollectionPipeline::new(&catalog).run(&plan, &far).unwrap();
    assert_eq!(output.report.queried, 0);
}

#[test]
fn test_water_mask_needs_reference() {
    let (aoi, catalog) = catalog();
    let config = PipelineConfig { masks: vec![MaskKind::Cloud, MaskKind::Water], ..Default::default() };
    let plan = PipelinePlan::from_config(&config).unwrap();
    let err = CollectionPipeline::new(&catalog).run(&plan, &aoi).unwrap_err();
    assert!(matches!(err, AsterError::Config(_)));

    // Empty history: water mask is skipped with an advisory on each scene
    let history = InMemoryWaterHistory::new();
    let output = CollectionPipeline::new(&catalog)
        .with_water_reference(&history)
        .run(&plan, &aoi)
        .unwrap();
    assert_eq!(output.scenes.len(), 2);
    assert!(output.scenes.iter().all(|s| s.advisories.len() == 1));
}

#[test]
fn test_unknown_collection_is_fatal() {
    let (aoi, catalog) = catalog();
    let config = PipelineConfig { collection: "ASTER/AST_L1A".to_string(), ..Default::default() };
    let plan = PipelinePlan::from_config(&config).unwrap();
    let err = CollectionPipeline::new(&catalog).run(&plan, &aoi).unwrap_err();
    assert!(matches!(err, AsterError::InvalidInput(_)));
}

#[test]
fn test_single_scene_entry_point() {
    let square = aoi_square(15.0, 45.0, 0.02);
    let grid = grid_over(&projected(&square), 2);
    let scene = SceneBuilder::new("single", grid).build_clear();
    let catalog = InMemoryCatalog::new();

    let config = PipelineConfig { masks: vec![MaskKind::Snow, MaskKind::Cloud], ..Default::default() };
    let plan = PipelinePlan::from_config(&config).unwrap();
    let out = CollectionPipeline::new(&catalog)
        .run_scene(&plan, scene, &AreaOfInterest::from(square))
        .unwrap();
    assert!(out.advisories.is_empty());
    assert!(out.geom_coverage.unwrap() > 0.97);
    assert_eq!(out.band(Band::B13).unwrap().units, Units::BrightnessTemperature);
}

#[test]
fn test_unconverted_scene_stays_out_of_the_composite() {
    init_logging();
    let square = aoi_square(15.0, 45.0, 0.02);
    let grid = grid_over(&projected(&square), 2);
    let catalog = InMemoryCatalog::with_scenes(
        COLLECTION,
        vec![
            SceneBuilder::new("thermal", grid).bands(&[Band::B01, Band::B10]).build_clear(),
            SceneBuilder::new("visible", grid)
                .date(2019, 7, 15)
                .bands(&[Band::B01])
                .build_clear(),
        ],
    );
    let config = PipelineConfig {
        bands: vec![Band::B10],
        masks: vec![],
        required_bands: Some(vec![Band::B01]),
        ..Default::default()
    };
    let plan = PipelinePlan::from_config(&config).unwrap();
    let output = CollectionPipeline::new(&catalog)
        .run(&plan, &AreaOfInterest::from(square))
        .unwrap();

    let ids: Vec<&str> = output.scenes.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["thermal", "visible"]);
    let visible = &output.scenes[1];
    assert!(matches!(visible.advisories.as_slice(), [Advisory::NoValidBands { .. }]));
    assert_eq!(visible.band(Band::B01).unwrap().units, Units::Dn);

    let composite = output.composite.expect("composite");
    assert_eq!(composite.band(Band::B01).unwrap().units, Units::Radiance);
    assert_eq!(composite.band(Band::B10).unwrap().units, Units::BrightnessTemperature);
    assert_eq!(output.report.composite_excluded, vec![("visible".to_string(), Band::B01)]);
}

#[test]
fn test_unreadable_water_reference_fails_scenes_not_the_run() {
    let (aoi, catalog) = catalog();
    let config = PipelineConfig {
        bands: vec![Band::B01],
        masks: vec![MaskKind::Water],
        ..Default::default()
    };
    let plan = PipelinePlan::from_config(&config).unwrap();
    let output = CollectionPipeline::new(&catalog)
        .with_water_reference(&UnreadableHistory)
        .run(&plan, &aoi)
        .unwrap();

    assert!(output.scenes.is_empty());
    assert!(output.composite.is_none());
    // broken fails on its gain first, the rest on the water reference
    assert_eq!(output.report.failed.len(), 5);
    let water_failures = output
        .report
        .failed
        .iter()
        .filter(|(_, message)| message.contains("Water reference"))
        .count();
    assert_eq!(water_failures, 4);
}
