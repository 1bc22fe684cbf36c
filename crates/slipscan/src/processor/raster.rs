//! First-page rasterization through poppler's `pdftoppm`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{ConfigError, ProcessError};
use crate::processor::Rasterizer;
use crate::sanitize::redact_path;

/// Render resolution passed to the conversion tool.
pub const RASTER_DPI: u32 = 300;
/// Output width in pixels (A4 at 300 DPI).
pub const RASTER_WIDTH: u32 = 2480;
/// Output height in pixels (A4 at 300 DPI).
pub const RASTER_HEIGHT: u32 = 3508;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const MAX_STDERR_CHARS: usize = 2000;

/// A raster image on disk that is removed when the guard drops.
#[derive(Debug)]
pub struct ScratchImage {
    path: PathBuf,
}

impl ScratchImage {
    /// Takes ownership of an existing (or about to be created) file.
    pub fn adopt(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchImage {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed scratch image {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove scratch image {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Invokes `pdftoppm` with a fixed single-page PNG profile.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: String,
    scratch_dir: PathBuf,
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<String>, scratch_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            scratch_dir,
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Checks that the conversion tool can be launched at all.
    pub fn check_available(&self) -> Result<(), ConfigError> {
        Command::new(&self.program)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|_| ())
            .map_err(|e| ConfigError::MissingTool {
                program: self.program.clone(),
                reason: format!("{}. Make sure poppler-utils is installed.", e),
            })
    }

    fn build_command(&self, source: &Path, prefix: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-png",
            "-r",
            &RASTER_DPI.to_string(),
            "-f",
            "1",
            "-l",
            "1",
            "-singlefile",
            "-scale-to-x",
            &RASTER_WIDTH.to_string(),
            "-scale-to-y",
            &RASTER_HEIGHT.to_string(),
        ])
        .arg(source)
        .arg(prefix)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
        cmd
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn rasterize_first_page(&self, source: &Path) -> Result<ScratchImage, ProcessError> {
        let _span =
            tracing::info_span!("processor.rasterize", file = %redact_path(source)).entered();

        std::fs::create_dir_all(&self.scratch_dir).map_err(|e| {
            ProcessError::Rasterization(format!(
                "Failed to create scratch directory '{}': {}",
                self.scratch_dir.display(),
                e
            ))
        })?;

        let prefix = self
            .scratch_dir
            .join(format!("page_{}", uuid::Uuid::new_v4()));
        // Guard first so a partial output is removed on every error path below.
        let image = ScratchImage::adopt(prefix.with_extension("png"));

        let mut child = self.build_command(source, &prefix).spawn().map_err(|e| {
            ProcessError::Rasterization(format!("Failed to run {}: {}", self.program, e))
        })?;
        // Drained concurrently so a chatty tool never blocks on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProcessError::Rasterization(format!(
                        "{} timed out after {}s",
                        self.program,
                        self.timeout.as_secs_f64()
                    )));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(ProcessError::Rasterization(format!(
                        "Failed to wait for {}: {}",
                        self.program, e
                    )));
                }
            }
        };

        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .map(|buf| stderr_tail(&buf))
            .unwrap_or_default();

        if !status.success() {
            return Err(ProcessError::Rasterization(format!(
                "{} failed ({}): {}",
                self.program,
                status,
                stderr.trim()
            )));
        }

        if !image.path().is_file() {
            return Err(ProcessError::Rasterization(format!(
                "{} produced no image: {}",
                self.program,
                stderr.trim()
            )));
        }

        log::debug!("Rasterized page 1 to {}", image.path().display());
        Ok(image)
    }
}

/// Last `MAX_STDERR_CHARS` characters of the tool's diagnostics.
fn stderr_tail(buf: &[u8]) -> String {
    let text = String::from_utf8_lossy(buf);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(MAX_STDERR_CHARS);
    text.chars().skip(skip).collect()
}
