use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

pub struct PipelineConfig {
    pub upload_directory: PathBuf,
    pub scratch_directory: PathBuf,
    pub ocr_languages: Vec<String>,
    pub rasterizer_program: String,
    pub rasterizer_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_directory: PathBuf::from(&config.upload_directory),
            scratch_directory: PathBuf::from(&config.scratch_directory),
            ocr_languages: config.ocr.languages.clone(),
            rasterizer_program: config.rasterizer.program.clone(),
            rasterizer_timeout: Duration::from_secs(config.rasterizer.timeout_secs),
        }
    }
}
