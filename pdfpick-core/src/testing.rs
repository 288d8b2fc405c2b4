//! In-memory document adapter shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use crate::{
    document_id_for_path, DocumentBackend, DocumentInfo, DocumentOpenError,
    DocumentProvider, EncodedImage, ImagePlacement, ImageSourceRef, OutlineEntry, PageGeometry,
    PdfRect, RenderImage, RenderRequest,
};

pub(crate) struct FakeDocument {
    info: DocumentInfo,
    geometries: Vec<PageGeometry>,
    images: HashMap<usize, Vec<ImagePlacement>>,
    outline: Vec<OutlineEntry>,
    failing_pages: HashSet<usize>,
    render_delay: Option<Duration>,
    tint: u8,
    render_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FakeDocument {
    pub(crate) fn new(path: &str, page_count: usize) -> Self {
        let path = PathBuf::from(path);
        Self {
            info: DocumentInfo {
                id: document_id_for_path(&path),
                path,
                page_count,
                has_outline: false,
                title: None,
            },
            geometries: vec![PageGeometry::default(); page_count],
            images: HashMap::new(),
            outline: Vec::new(),
            failing_pages: HashSet::new(),
            render_delay: None,
            tint: 0,
            render_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Adds one placement per rect, numbering object ids from zero.
    pub(crate) fn with_images(mut self, page_index: usize, rects: &[PdfRect]) -> Self {
        let placements = rects
            .iter()
            .enumerate()
            .map(|(idx, rect)| ImagePlacement {
                source: ImageSourceRef {
                    page_index,
                    object_id: idx as u64,
                },
                rect: *rect,
                pixel_width: 8 + idx as u32,
                pixel_height: 4 + idx as u32,
            })
            .collect();
        self.images.insert(page_index, placements);
        self
    }

    pub(crate) fn with_placements(mut self, page_index: usize, placements: Vec<ImagePlacement>) -> Self {
        self.images.insert(page_index, placements);
        self
    }

    pub(crate) fn with_geometry(mut self, page_index: usize, geometry: PageGeometry) -> Self {
        self.geometries[page_index] = geometry;
        self
    }

    pub(crate) fn with_outline(mut self, outline: Vec<OutlineEntry>) -> Self {
        self.info.has_outline = !outline.is_empty();
        self.outline = outline;
        self
    }

    pub(crate) fn with_failing_page(mut self, page_index: usize) -> Self {
        self.failing_pages.insert(page_index);
        self
    }

    pub(crate) fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = Some(delay);
        self
    }

    /// Marks every rendered pixel so bitmaps of two documents differ.
    pub(crate) fn with_tint(mut self, tint: u8) -> Self {
        self.tint = tint;
        self
    }

    pub(crate) fn render_calls(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

/// Pixel value the fake paints for a render request, so tests can tell
/// bitmaps apart.
pub(crate) fn fake_pixel(page_index: usize, scale: f32) -> [u8; 4] {
    let scale_byte = ((scale * 100.0).round() as u32 % 251) as u8;
    [page_index as u8, scale_byte, 0, 255]
}

impl DocumentBackend for FakeDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn page_geometry(&self, page_index: usize) -> Result<PageGeometry> {
        self.geometries
            .get(page_index)
            .copied()
            .ok_or_else(|| anyhow!("page {} out of range", page_index))
    }

    fn render_page(&self, request: RenderRequest) -> Result<RenderImage> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.render_delay {
            std::thread::sleep(delay);
        }
        if self.failing_pages.contains(&request.page_index) {
            return Err(anyhow!("malformed content stream on page {}", request.page_index));
        }
        if request.page_index >= self.info.page_count {
            return Err(anyhow!("page {} out of range", request.page_index));
        }
        let mut pixel = fake_pixel(request.page_index, request.scale);
        pixel[2] = self.tint;
        Ok(RenderImage {
            width: 2,
            height: 2,
            pixels: pixel.repeat(4),
        })
    }

    fn list_images(&self, page_index: usize) -> Result<Vec<ImagePlacement>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.images.get(&page_index).cloned().unwrap_or_default())
    }

    fn extract_image_bytes(&self, source: ImageSourceRef) -> Result<EncodedImage> {
        let placement = self
            .images
            .get(&source.page_index)
            .and_then(|list| list.iter().find(|p| p.source == source))
            .ok_or_else(|| anyhow!("unknown image {:?}", source))?;
        let pixels = image::RgbaImage::from_pixel(
            placement.pixel_width,
            placement.pixel_height,
            image::Rgba([10, 20, 30, 255]),
        );
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(pixels)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(EncodedImage {
            bytes,
            extension: "png".to_owned(),
        })
    }

    fn outline(&self) -> Result<Vec<OutlineEntry>> {
        Ok(self.outline.clone())
    }
}

pub(crate) enum FakeOpen {
    Document(Arc<FakeDocument>),
    Locked,
    Corrupt,
}

#[derive(Default)]
pub(crate) struct FakeProvider {
    entries: Mutex<HashMap<PathBuf, FakeOpen>>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, document: FakeDocument) -> Arc<FakeDocument> {
        let document = Arc::new(document);
        self.entries.lock().insert(
            document.info.path.clone(),
            FakeOpen::Document(Arc::clone(&document)),
        );
        document
    }

    pub(crate) fn register_locked(&self, path: &str) {
        self.entries.lock().insert(PathBuf::from(path), FakeOpen::Locked);
    }

    pub(crate) fn register_corrupt(&self, path: &str) {
        self.entries.lock().insert(PathBuf::from(path), FakeOpen::Corrupt);
    }
}

#[async_trait::async_trait]
impl DocumentProvider for FakeProvider {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>, DocumentOpenError> {
        match self.entries.lock().get(path) {
            Some(FakeOpen::Document(doc)) => {
                let backend: Arc<dyn DocumentBackend> = Arc::clone(doc) as Arc<dyn DocumentBackend>;
                Ok(backend)
            }
            Some(FakeOpen::Locked) => Err(DocumentOpenError::PasswordProtected(path.to_path_buf())),
            Some(FakeOpen::Corrupt) => Err(DocumentOpenError::Corrupt {
                path: path.to_path_buf(),
                reason: "trailer not found".to_owned(),
            }),
            None => Err(DocumentOpenError::NotFound(path.to_path_buf())),
        }
    }
}
