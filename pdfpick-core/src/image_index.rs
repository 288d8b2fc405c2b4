use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::geometry::PdfRect;
use crate::{DocumentBackend, ImageSourceRef};

/// One placement of one embedded image on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageBoundingBox {
    pub page_index: usize,
    /// 1-based position in the page listing.
    pub ordinal: usize,
    pub rect: PdfRect,
    pub source: ImageSourceRef,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// 0-based row in the page listing.
    pub display_index: usize,
    /// False for degenerate rects; such entries are listed but never hit.
    pub interactive: bool,
}

impl ImageBoundingBox {
    pub fn label(&self) -> String {
        format!(
            "Image #{}  {}\u{d7}{}",
            self.ordinal, self.pixel_width, self.pixel_height
        )
    }
}

/// Immutable per-page image listing. Rebuilt on page change, never patched.
#[derive(Debug, Clone)]
pub struct ImageIndex {
    page_index: usize,
    entries: Arc<[ImageBoundingBox]>,
}

impl ImageIndex {
    pub fn empty(page_index: usize) -> Self {
        Self {
            page_index,
            entries: Arc::from(Vec::new()),
        }
    }

    /// Lists every placement the adapter reports, in adapter order. The same
    /// image resource placed twice yields two entries.
    pub fn build_for_page(backend: &dyn DocumentBackend, page_index: usize) -> Result<Self> {
        let placements = backend
            .list_images(page_index)
            .with_context(|| format!("failed to list images on page {}", page_index))?;

        let entries: Vec<ImageBoundingBox> = placements
            .into_iter()
            .enumerate()
            .map(|(display_index, placement)| ImageBoundingBox {
                page_index,
                ordinal: display_index + 1,
                rect: placement.rect,
                source: placement.source,
                pixel_width: placement.pixel_width,
                pixel_height: placement.pixel_height,
                display_index,
                interactive: !placement.rect.is_degenerate(),
            })
            .collect();

        debug!(
            page = page_index,
            images = entries.len(),
            degenerate = entries.iter().filter(|e| !e.interactive).count(),
            "built image index"
        );

        Ok(Self {
            page_index,
            entries: Arc::from(entries),
        })
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn entries(&self) -> &[ImageBoundingBox] {
        &self.entries
    }

    pub fn interactive(&self) -> impl Iterator<Item = &ImageBoundingBox> {
        self.entries.iter().filter(|entry| entry.interactive)
    }

    pub fn by_ordinal(&self, ordinal: usize) -> Option<&ImageBoundingBox> {
        ordinal
            .checked_sub(1)
            .and_then(|idx| self.entries.get(idx))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDocument;
    use crate::ImagePlacement;

    #[test]
    fn build_numbers_entries_in_adapter_order() {
        let doc = FakeDocument::new("/docs/a.pdf", 3).with_images(
            1,
            &[
                PdfRect::new(0.0, 0.0, 100.0, 100.0),
                PdfRect::new(50.0, 50.0, 80.0, 80.0),
            ],
        );
        let index = ImageIndex::build_for_page(&doc, 1).unwrap();

        assert_eq!(index.page_index(), 1);
        let ordinals: Vec<_> = index.entries().iter().map(|e| e.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);
        assert_eq!(index.entries()[1].display_index, 1);
        assert_eq!(index.by_ordinal(2).unwrap().rect, PdfRect::new(50.0, 50.0, 80.0, 80.0));
        assert!(index.by_ordinal(0).is_none());
        assert!(index.by_ordinal(3).is_none());
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let doc = FakeDocument::new("/docs/a.pdf", 2).with_images(
            0,
            &[
                PdfRect::new(10.0, 10.0, 20.0, 20.0),
                PdfRect::new(30.0, 30.0, 60.0, 40.0),
                PdfRect::new(0.0, 0.0, 5.0, 5.0),
            ],
        );
        let first = ImageIndex::build_for_page(&doc, 0).unwrap();
        let second = ImageIndex::build_for_page(&doc, 0).unwrap();
        assert_eq!(first.entries(), second.entries());
    }

    #[test]
    fn same_source_at_two_placements_yields_two_entries() {
        let source = ImageSourceRef {
            page_index: 0,
            object_id: 7,
        };
        let placements = vec![
            ImagePlacement {
                source,
                rect: PdfRect::new(0.0, 0.0, 10.0, 10.0),
                pixel_width: 32,
                pixel_height: 32,
            },
            ImagePlacement {
                source,
                rect: PdfRect::new(100.0, 100.0, 110.0, 110.0),
                pixel_width: 32,
                pixel_height: 32,
            },
        ];
        let doc = FakeDocument::new("/docs/a.pdf", 1).with_placements(0, placements);
        let index = ImageIndex::build_for_page(&doc, 0).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.entries()[0].source, index.entries()[1].source);
        assert_ne!(index.entries()[0].rect, index.entries()[1].rect);
    }

    #[test]
    fn degenerate_rects_are_listed_but_not_interactive() {
        let doc = FakeDocument::new("/docs/a.pdf", 1).with_images(
            0,
            &[
                PdfRect::new(0.0, 0.0, 0.0, 50.0),
                PdfRect::new(0.0, 0.0, 40.0, 40.0),
            ],
        );
        let index = ImageIndex::build_for_page(&doc, 0).unwrap();

        assert_eq!(index.len(), 2);
        assert!(!index.entries()[0].interactive);
        let interactive: Vec<_> = index.interactive().map(|e| e.ordinal).collect();
        assert_eq!(interactive, vec![2]);
    }

    #[test]
    fn page_without_images_is_an_empty_index() {
        let doc = FakeDocument::new("/docs/a.pdf", 1);
        let index = ImageIndex::build_for_page(&doc, 0).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn label_shows_ordinal_and_pixel_size() {
        let doc = FakeDocument::new("/docs/a.pdf", 1)
            .with_images(0, &[PdfRect::new(0.0, 0.0, 10.0, 10.0)]);
        let index = ImageIndex::build_for_page(&doc, 0).unwrap();
        assert_eq!(index.entries()[0].label(), "Image #1  8\u{d7}4");
    }
}
