//! Fake pipeline stages.
//!
//! Both fakes share a `FakeControl` with the test so behaviour can be switched
//! while the coordinator owns the fake.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use slipscan::processor::{Rasterizer, ScratchImage, TextExtractor};
use slipscan::ProcessError;

/// Switches and counters shared between a fake and the test.
#[derive(Default)]
pub struct FakeControl {
    calls: AtomicUsize,
    fail: AtomicBool,
    panic: AtomicBool,
    delay_ms: AtomicU64,
}

impl FakeControl {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_panic(&self, panic: bool) {
        self.panic.store(panic, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn enter(&self) -> (bool, bool) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        (
            self.fail.load(Ordering::SeqCst),
            self.panic.load(Ordering::SeqCst),
        )
    }
}

/// Writes a placeholder PNG into the scratch directory.
pub struct FakeRasterizer {
    scratch_dir: PathBuf,
    control: Arc<FakeControl>,
}

impl FakeRasterizer {
    pub fn new(scratch_dir: PathBuf, control: Arc<FakeControl>) -> Self {
        Self {
            scratch_dir,
            control,
        }
    }
}

impl Rasterizer for FakeRasterizer {
    fn rasterize_first_page(&self, source: &Path) -> Result<ScratchImage, ProcessError> {
        let (fail, panic) = self.control.enter();
        if panic {
            panic!("fake rasterizer panic");
        }
        if fail {
            return Err(ProcessError::Rasterization(
                "Syntax Error: fake rasterizer failure".to_string(),
            ));
        }
        assert!(source.is_file(), "rasterizer called without a source file");

        std::fs::create_dir_all(&self.scratch_dir).unwrap();
        let path = self
            .scratch_dir
            .join(format!("page_{}.png", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"fake png").unwrap();
        Ok(ScratchImage::adopt(path))
    }
}

/// Returns canned text and records which images it was handed.
pub struct FakeExtractor {
    text: String,
    control: Arc<FakeControl>,
    seen: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeExtractor {
    pub fn new(text: &str, control: Arc<FakeControl>, seen: Arc<Mutex<Vec<PathBuf>>>) -> Self {
        Self {
            text: text.to_string(),
            control,
            seen,
        }
    }
}

impl TextExtractor for FakeExtractor {
    fn extract_text(&self, image: ScratchImage) -> Result<String, ProcessError> {
        assert!(image.path().is_file(), "extractor got a missing image");
        self.seen.lock().unwrap().push(image.path().to_path_buf());

        let (fail, panic) = self.control.enter();
        if panic {
            panic!("fake extractor panic");
        }
        if fail {
            return Err(ProcessError::Extraction(
                "fake engine failure".to_string(),
            ));
        }
        Ok(self.text.clone())
    }
}
