use std::convert::TryFrom;
use std::io::Cursor;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use pdfpick_core::geometry::PdfRect as PageRect;
use pdfpick_core::{
    document_id_for_path, DocumentBackend, DocumentInfo, DocumentOpenError,
    DocumentProvider, EncodedImage, ImagePlacement, ImageSourceRef, OutlineEntry, PageGeometry,
    RenderImage, RenderRequest, Rotation,
};
use tracing::{debug, instrument, warn};

/// Opens documents through a dynamically bound pdfium library.
pub struct PdfiumProvider {
    pdfium: Arc<Pdfium>,
}

impl PdfiumProvider {
    pub fn new() -> Result<Self> {
        let pdfium = match bind_pdfium_from_env() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
        })
    }
}

#[async_trait]
impl DocumentProvider for PdfiumProvider {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>, DocumentOpenError> {
        if !path.exists() {
            return Err(DocumentOpenError::NotFound(path.to_path_buf()));
        }
        let absolute = path
            .canonicalize()
            .map_err(|_| DocumentOpenError::NotFound(path.to_path_buf()))?;
        let document = PdfiumDocument::load(Arc::clone(&self.pdfium), absolute)?;
        Ok(Arc::new(document))
    }
}

struct PdfiumDocument {
    path: PathBuf,
    info: DocumentInfo,
    document: Mutex<PdfDocument<'static>>,
    pdfium: Arc<Pdfium>,
}

impl PdfiumDocument {
    fn load(pdfium: Arc<Pdfium>, path: PathBuf) -> Result<Self, DocumentOpenError> {
        let document = pdfium
            .load_pdf_from_file(&path, None)
            .map_err(|err| open_error(&path, err))?;
        // SAFETY: the document borrows the bindings owned by `pdfium`. Fields
        // drop in declaration order, so `document` is dropped before the
        // `Arc<Pdfium>` that keeps those bindings alive.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };
        let info = build_document_info(&document, &path);
        debug!(path = %path.display(), pages = info.page_count, "pdfium document loaded");
        Ok(Self {
            path,
            info,
            document: Mutex::new(document),
            pdfium,
        })
    }

    fn with_page<R, F>(&self, page_index: usize, f: F) -> Result<R>
    where
        F: FnOnce(&PdfPage<'_>) -> Result<R>,
    {
        let document = self.document.lock();
        let index: PdfPageIndex = page_index
            .try_into()
            .map_err(|_| anyhow!("page {} is out of supported range", page_index))?;
        let page = document
            .pages()
            .get(index)
            .with_context(|| format!("page {} out of range", page_index))?;
        f(&page)
    }
}

impl DocumentBackend for PdfiumDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn page_geometry(&self, page_index: usize) -> Result<PageGeometry> {
        self.with_page(page_index, |page| Ok(page_geometry(page)))
    }

    #[instrument(skip(self))]
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage> {
        self.with_page(request.page_index, |page| {
            let config = PdfRenderConfig::new().scale_page_by_factor(request.scale.max(0.01));
            let bitmap = page
                .render_with_config(&config)
                .with_context(|| format!("failed to render page {}", request.page_index))?;
            let image = bitmap.as_image().to_rgba8();
            Ok(RenderImage {
                width: u32::try_from(bitmap.width()).unwrap_or_default(),
                height: u32::try_from(bitmap.height()).unwrap_or_default(),
                pixels: image.into_raw(),
            })
        })
    }

    fn list_images(&self, page_index: usize) -> Result<Vec<ImagePlacement>> {
        self.with_page(page_index, |page| {
            let geometry = page_geometry(page);
            let mut placements = Vec::new();
            for (object_index, object) in page.objects().iter().enumerate() {
                let PdfPageObject::Image(image) = &object else {
                    continue;
                };
                let bounds = match image.bounds() {
                    Ok(quad) => quad.to_rect(),
                    Err(err) => {
                        warn!(
                            ?err,
                            page = page_index,
                            object = object_index,
                            path = %self.path.display(),
                            "failed to resolve image bounds"
                        );
                        continue;
                    }
                };
                let (pixel_width, pixel_height) = match image.get_raw_image() {
                    Ok(raw) => (raw.width(), raw.height()),
                    Err(_) => (0, 0),
                };
                placements.push(ImagePlacement {
                    source: ImageSourceRef {
                        page_index,
                        object_id: object_index as u64,
                    },
                    rect: to_page_space(
                        bounds.left().value,
                        bounds.bottom().value,
                        bounds.right().value,
                        bounds.top().value,
                        geometry.height,
                    ),
                    pixel_width,
                    pixel_height,
                });
            }
            Ok(placements)
        })
    }

    /// pdfium only exposes decoded pixels, so the original is handed back as
    /// a lossless PNG at its native resolution.
    fn extract_image_bytes(&self, source: ImageSourceRef) -> Result<EncodedImage> {
        let raw = self.with_page(source.page_index, |page| {
            let index = usize::try_from(source.object_id)
                .map_err(|_| anyhow!("image {} is out of supported range", source.object_id))?;
            let object = page
                .objects()
                .get(index)
                .with_context(|| format!("image {} not found", source.object_id))?;
            let PdfPageObject::Image(image) = &object else {
                return Err(anyhow!("object {} is not an image", source.object_id));
            };
            let raw = image
                .get_raw_image()
                .with_context(|| format!("failed to decode image {}", source.object_id))?
                .to_rgba8();
            Ok((raw.width(), raw.height(), raw.into_raw()))
        })?;

        let (width, height, pixels) = raw;
        let buffer = image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("image {} has an inconsistent buffer", source.object_id))?;
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(buffer)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .context("failed to encode image as png")?;
        Ok(EncodedImage {
            bytes,
            extension: "png".to_owned(),
        })
    }

    fn outline(&self) -> Result<Vec<OutlineEntry>> {
        let document = self.document.lock();
        let bookmarks = document.bookmarks();
        Ok(bookmarks.root().map(collect_outline).unwrap_or_default())
    }
}

fn page_geometry(page: &PdfPage<'_>) -> PageGeometry {
    let rotation = match page.rotation() {
        Ok(PdfPageRenderRotation::Degrees90) => Rotation::Cw90,
        Ok(PdfPageRenderRotation::Degrees180) => Rotation::Cw180,
        Ok(PdfPageRenderRotation::Degrees270) => Rotation::Cw270,
        _ => Rotation::None,
    };
    // pdfium reports the displayed size; the engine wants the unrotated box.
    let (width, height) = (page.width().value, page.height().value);
    let (width, height) = if rotation.is_quarter_turn() {
        (height, width)
    } else {
        (width, height)
    };
    if width <= 0.0 || height <= 0.0 {
        return PageGeometry::default();
    }
    PageGeometry::new(width, height, rotation)
}

/// pdfium's page space has its origin at the bottom-left; the engine's is
/// top-left with y growing downwards.
fn to_page_space(left: f32, bottom: f32, right: f32, top: f32, page_height: f32) -> PageRect {
    PageRect::new(left, page_height - top, right, page_height - bottom)
}

fn collect_outline(first: PdfBookmark<'_>) -> Vec<OutlineEntry> {
    let mut entries = Vec::new();
    let mut next = Some(first);
    while let Some(bookmark) = next {
        let target_page = bookmark
            .destination()
            .and_then(|destination| destination.page_index().ok())
            .map(|index| index as i64)
            .unwrap_or(-1);
        let children = bookmark.first_child().map(collect_outline).unwrap_or_default();
        entries.push(OutlineEntry {
            title: bookmark.title().unwrap_or_default(),
            target_page,
            children,
        });
        next = bookmark.next_sibling();
    }
    entries
}

fn open_error(path: &Path, err: PdfiumError) -> DocumentOpenError {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            DocumentOpenError::PasswordProtected(path.to_path_buf())
        }
        other => DocumentOpenError::Corrupt {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn build_document_info(document: &PdfDocument<'_>, path: &Path) -> DocumentInfo {
    let page_count = usize::try_from(document.pages().len()).unwrap_or_default();
    let metadata = document.metadata();

    let title = metadata
        .get(PdfDocumentMetadataTagType::Title)
        .map(|t| t.value().to_owned());

    DocumentInfo {
        id: document_id_for_path(path),
        path: path.to_path_buf(),
        page_count,
        has_outline: document.bookmarks().root().is_some(),
        title,
    }
}

fn bind_pdfium_from_env() -> Option<Pdfium> {
    let path = std::env::var("PDFPICK_PDFIUM_LIBRARY_PATH").ok()?;
    if path.is_empty() {
        return None;
    }
    match Pdfium::bind_to_library(&path) {
        Ok(bindings) => Some(Pdfium::new(bindings)),
        Err(err) => {
            warn!("failed to load pdfium from {}: {}", path, err);
            None
        }
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");

    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("{}: {}", cwd_path.display(), err));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; set PDFPICK_PDFIUM_LIBRARY_PATH or install it ({})",
                errors.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_left_bounds_flip_into_top_left_space() {
        let rect = to_page_space(10.0, 700.0, 110.0, 780.0, 792.0);
        assert_eq!(rect, PageRect::new(10.0, 12.0, 110.0, 92.0));
    }

    #[test]
    fn flipped_rect_keeps_its_size() {
        let rect = to_page_space(0.0, 0.0, 612.0, 792.0, 792.0);
        assert_eq!((rect.width(), rect.height()), (612.0, 792.0));
        assert_eq!((rect.x0, rect.y0), (0.0, 0.0));
    }

    #[test]
    fn password_errors_map_to_password_protected() {
        let path = Path::new("/docs/locked.pdf");
        let err = open_error(
            path,
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError),
        );
        assert!(matches!(err, DocumentOpenError::PasswordProtected(_)));

        let err = open_error(
            path,
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError),
        );
        assert!(matches!(err, DocumentOpenError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_not_found_before_touching_pdfium() {
        let Ok(provider) = PdfiumProvider::new() else {
            return;
        };
        let err = provider
            .open(Path::new("/definitely/not/here.pdf"))
            .await
            .err();
        assert!(matches!(err, Some(DocumentOpenError::NotFound(_))));
    }
}
