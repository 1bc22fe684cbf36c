//! Config file -> pipeline wiring.

mod common;

use std::time::Duration;

use common::{ConfigBuilder, TestHarness};
use slipscan::{load_config, ConfigError, Database, PipelineConfig, PipelineCoordinator};

#[test]
fn test_written_config_loads_back() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new()
        .directories("/srv/slipscan/uploads", "/srv/slipscan/scratch")
        .database_path("/srv/slipscan/slipscan.db")
        .worker_count(3)
        .languages(&["eng", "deu"])
        .rasterizer("/usr/bin/pdftoppm", 30)
        .build();
    let path = harness.write_config("slipscan.json", &config);

    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded.upload_directory, "/srv/slipscan/uploads");
    assert_eq!(loaded.database_path.as_deref(), Some("/srv/slipscan/slipscan.db"));
    assert_eq!(loaded.worker_count, 3);
    assert_eq!(loaded.ocr.languages, vec!["eng", "deu"]);

    let pipeline = PipelineConfig::from_config(&loaded);
    assert_eq!(pipeline.scratch_directory.to_str(), Some("/srv/slipscan/scratch"));
    assert_eq!(pipeline.rasterizer_program, "/usr/bin/pdftoppm");
    assert_eq!(pipeline.rasterizer_timeout, Duration::from_secs(30));
    assert_eq!(pipeline.ocr_languages, vec!["eng", "deu"]);
}

#[test]
fn test_written_config_with_bad_version_is_rejected() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new().version("2.0").build();
    let path = harness.write_config("slipscan.json", &config);

    assert!(matches!(
        load_config(&path),
        Err(ConfigError::Validation { .. })
    ));
}

#[test]
fn test_written_config_with_zero_timeout_is_rejected() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new().rasterizer("pdftoppm", 0).build();
    let path = harness.write_config("slipscan.json", &config);

    assert!(load_config(&path).is_err());
}

#[test]
fn test_startup_fails_without_rasterizer() {
    let harness = TestHarness::new();
    let config = ConfigBuilder::new()
        .directories(
            harness.upload_dir.to_str().unwrap(),
            harness.scratch_dir.to_str().unwrap(),
        )
        .rasterizer("/nonexistent/bin/pdftoppm", 10)
        .build();
    let path = harness.write_config("slipscan.json", &config);
    let loaded = load_config(&path).unwrap();

    let result = PipelineCoordinator::from_config(
        &PipelineConfig::from_config(&loaded),
        Database::open_in_memory().unwrap(),
    );
    assert!(matches!(result, Err(ConfigError::MissingTool { .. })));
}
