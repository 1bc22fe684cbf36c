//! Builders for test documents and configs.

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, Stream};

use slipscan::config::schema::{Config, OcrConfig, RasterizerConfig, ServerConfig};

/// Text the fake extractor returns unless a test overrides it.
pub const SAMPLE_RECEIPT_TEXT: &str = "Grocery Store A\n\
Receipt #123\n\
42 Harbour Road\n\
Date: 01/15/2024 10:42\n\
Milk            3.50\n\
Bread           2.25\n\
SUBTOTAL       40.00\n\
TOTAL: $45.75\n\
Thank you for shopping!";

/// A single-page PDF with one line of text.
pub fn receipt_pdf(line: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", line);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize test PDF");
    bytes
}

/// Bytes that look nothing like a PDF.
pub fn corrupt_pdf() -> Vec<u8> {
    b"this is not a pdf, just some scanned noise".to_vec()
}

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with sensible defaults for testing.
    pub fn new() -> Self {
        Self {
            config: Config {
                version: "1.0".to_string(),
                upload_directory: "/tmp/slipscan/uploads".to_string(),
                scratch_directory: "/tmp/slipscan/scratch".to_string(),
                database_path: None,
                worker_count: 1,
                queue_depth: 8,
                ocr: OcrConfig::default(),
                rasterizer: RasterizerConfig::default(),
                server: ServerConfig::default(),
            },
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.config.version = version.to_string();
        self
    }

    pub fn directories(mut self, upload: &str, scratch: &str) -> Self {
        self.config.upload_directory = upload.to_string();
        self.config.scratch_directory = scratch.to_string();
        self
    }

    pub fn database_path(mut self, path: &str) -> Self {
        self.config.database_path = Some(path.to_string());
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    pub fn languages(mut self, languages: &[&str]) -> Self {
        self.config.ocr.languages = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn rasterizer(mut self, program: &str, timeout_secs: u64) -> Self {
        self.config.rasterizer = RasterizerConfig {
            program: program.to_string(),
            timeout_secs,
        };
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
