use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod image_index;
pub mod navigation;
pub mod outline;
pub mod scheduler;
pub mod viewport;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheKey, CacheStats, RenderCache};
pub use config::EngineConfig;
pub use error::{ConfigError, DocumentOpenError, ExtractionError, ExtractionWriteError};
pub use extract::{
    default_file_name, BatchSummary, ExtractionService, FsSink, ImageSink, OutputFormat,
};
pub use geometry::{PageGeometry, PdfPoint, PdfRect, Rotation, ScreenPoint, ScreenRect};
pub use hit_test::HitTester;
pub use image_index::{ImageBoundingBox, ImageIndex};
pub use navigation::{
    Command, FitMode, Frame, FrameQuality, NavigationController, NavigationEvent, ViewState,
};
pub use outline::{NavigationEntry, OutlineNode, OutlineTree};
pub use scheduler::{RenderOutcome, RenderScheduler, RequestId};
pub use viewport::ViewportTransform;

pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("0d7f3a52-6c1e-5b8e-9f4a-2e61c7d8b913").expect("valid namespace UUID")
});

pub fn document_id_for_path(path: &Path) -> DocumentId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&DOCUMENT_NAMESPACE, rendered.as_bytes())
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub path: PathBuf,
    pub page_count: usize,
    pub has_outline: bool,
    /// Title from the document's metadata, if it declares one.
    pub title: Option<String>,
}

impl DocumentInfo {
    /// The metadata title when it has any text, else the file name.
    pub fn display_name(&self) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_owned)
            .or_else(|| {
                self.path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderRequest {
    pub page_index: usize,
    pub scale: f32,
}

/// RGBA8 raster, row-major, `width * height * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RenderImage {
    /// Opaque white bitmap used while a page has nothing better to show.
    pub fn blank(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * 4;
        Self {
            width,
            height,
            pixels: vec![255; len],
        }
    }
}

/// Identity the adapter hands out for one image placement, used to fetch the
/// original bytes later. Only the issuing adapter interprets `object_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSourceRef {
    pub page_index: usize,
    pub object_id: u64,
}

/// One image placement as reported by the adapter, in page space.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    pub source: ImageSourceRef,
    pub rect: PdfRect,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    /// Lower-case file extension of the encoding the bytes are in (`png`, `jpg`, ...).
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    /// Zero-based target page; negative when the entry has no destination.
    pub target_page: i64,
    pub children: Vec<OutlineEntry>,
}

pub trait DocumentBackend: Send + Sync {
    fn info(&self) -> &DocumentInfo;
    fn page_geometry(&self, page_index: usize) -> Result<PageGeometry>;
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage>;
    fn list_images(&self, page_index: usize) -> Result<Vec<ImagePlacement>>;
    fn extract_image_bytes(&self, source: ImageSourceRef) -> Result<EncodedImage>;
    fn outline(&self) -> Result<Vec<OutlineEntry>>;
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>, DocumentOpenError>;
}
