//! Saving image placements to disk at their original resolution.

use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tracing::{info, warn};

use crate::error::{ExtractionError, ExtractionWriteError};
use crate::image_index::ImageBoundingBox;
use crate::{DocumentBackend, RenderImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg { quality: u8 },
}

impl OutputFormat {
    /// `.jpg`/`.jpeg` select JPEG; anything else is PNG.
    pub fn from_path(path: &Path, jpeg_quality: u8) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("jpg") | Some("jpeg") => OutputFormat::Jpeg {
                quality: jpeg_quality,
            },
            _ => OutputFormat::Png,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg { .. } => "jpg",
        }
    }
}

/// `page{N}_image{ordinal}.{ext}` with a 1-based page number.
pub fn default_file_name(page_index: usize, ordinal: usize, format: OutputFormat) -> String {
    format!(
        "page{}_image{}.{}",
        page_index + 1,
        ordinal,
        format.extension()
    )
}

/// Destination for encoded image files.
pub trait ImageSink: Send + Sync {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Writes to a temporary sibling and renames it into place.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSink;

impl ImageSink for FsSink {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp = tmp_path(path);
        let result = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(bytes)?;
            file.flush()
        });
        if let Err(err) = result.and_then(|_| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

#[derive(Debug)]
pub struct ExtractionFailure {
    pub ordinal: usize,
    pub path: PathBuf,
    pub error: ExtractionError,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub saved: Vec<PathBuf>,
    pub failures: Vec<ExtractionFailure>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.saved.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub struct ExtractionService<'a> {
    backend: &'a dyn DocumentBackend,
    sink: &'a dyn ImageSink,
}

impl<'a> ExtractionService<'a> {
    pub fn new(backend: &'a dyn DocumentBackend, sink: &'a dyn ImageSink) -> Self {
        Self { backend, sink }
    }

    /// Fetches the original bytes of `image`, re-encodes them as `format` and
    /// writes them to `path`.
    pub fn extract(
        &self,
        image: &ImageBoundingBox,
        path: &Path,
        format: OutputFormat,
    ) -> Result<PathBuf, ExtractionError> {
        if path.file_name().is_none() {
            return Err(ExtractionWriteError::PathInvalid(path.to_path_buf()).into());
        }
        let encoded = self
            .backend
            .extract_image_bytes(image.source)
            .map_err(ExtractionError::Source)?;
        let decoded = image::load_from_memory(&encoded.bytes)?;
        let bytes = encode(&decoded, format)?;

        self.sink
            .write(path, &bytes)
            .map_err(|err| ExtractionWriteError::classify(path.to_path_buf(), err))?;

        info!(
            page = image.page_index,
            ordinal = image.ordinal,
            width = decoded.width(),
            height = decoded.height(),
            path = %path.display(),
            "saved image"
        );
        Ok(path.to_path_buf())
    }

    /// Decodes `image` at its original pixel size for on-screen preview.
    /// Nothing is written.
    pub fn preview(&self, image: &ImageBoundingBox) -> Result<RenderImage, ExtractionError> {
        let encoded = self
            .backend
            .extract_image_bytes(image.source)
            .map_err(ExtractionError::Source)?;
        let rgba = image::load_from_memory(&encoded.bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(RenderImage {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    /// Saves every entry into `dir` under its default file name. A failed
    /// entry is recorded and the batch moves on.
    pub fn extract_batch(
        &self,
        images: &[ImageBoundingBox],
        dir: &Path,
        format: OutputFormat,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for image in images {
            let path = dir.join(default_file_name(image.page_index, image.ordinal, format));
            match self.extract(image, &path, format) {
                Ok(saved) => summary.saved.push(saved),
                Err(error) => {
                    warn!(
                        ordinal = image.ordinal,
                        path = %path.display(),
                        %error,
                        "failed to save image"
                    );
                    summary.failures.push(ExtractionFailure {
                        ordinal: image.ordinal,
                        path,
                        error,
                    });
                }
            }
        }
        summary
    }
}

fn encode(image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, ExtractionError> {
    let mut bytes = Vec::new();
    match format {
        OutputFormat::Png => {
            image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        }
        OutputFormat::Jpeg { quality } => {
            let rgb = image.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
    }
    Ok(bytes)
}
