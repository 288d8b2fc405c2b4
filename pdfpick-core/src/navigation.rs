//! The one owner of view state: current page, zoom, fit mode and scroll.
//!
//! Every user-visible transition goes through [`NavigationController`], either
//! via the direct methods or the [`Command`] dispatcher.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::cache::{quantize_zoom, RenderCache};
use crate::config::EngineConfig;
use crate::error::DocumentOpenError;
use crate::geometry::{PageGeometry, ScreenPoint};
use crate::hit_test::HitTester;
use crate::image_index::{ImageBoundingBox, ImageIndex};
use crate::outline::OutlineTree;
use crate::scheduler::{RenderOutcome, RenderScheduler, RequestId};
use crate::viewport::{clamp_scroll, clamp_zoom, fit_zoom, ViewportTransform};
use crate::{DocumentBackend, DocumentId, DocumentInfo, DocumentProvider, RenderImage};

/// Longest side of the blank bitmap shown while nothing better is cached.
const PLACEHOLDER_MAX_SIDE: f32 = 256.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    Manual,
    FitToWindow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub current_page: usize,
    pub zoom: f32,
    pub fit_mode: FitMode,
    pub scroll_x: f32,
    pub scroll_y: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            current_page: 0,
            zoom: 1.0,
            fit_mode: FitMode::FitToWindow,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameQuality {
    Exact,
    /// Cached at another zoom, or the thumbnail; shown stretched.
    Intermediate,
    Placeholder,
}

/// Bitmap currently on screen for the active page.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: Arc<RenderImage>,
    pub page_index: usize,
    pub zoom: f32,
    pub quality: FrameQuality,
}

#[derive(Debug, Clone)]
pub enum Command {
    NextPage { count: usize },
    PrevPage { count: usize },
    GotoPage { page: usize },
    SetZoom { zoom: f32 },
    ZoomIn,
    ZoomOut,
    ZoomStep { steps: i32 },
    ResetZoom,
    FitToWindow,
    ResizeWindow { width: f32, height: f32 },
    /// Scroll by fractions of the viewport size.
    ScrollBy { dx: f32, dy: f32 },
    CloseDocument,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    DocumentOpened(DocumentId),
    DocumentClosed(DocumentId),
    PageChanged { page: usize },
    ZoomChanged { zoom: f32 },
    RedrawNeeded,
    Notice(String),
}

struct OpenDocument {
    backend: Arc<dyn DocumentBackend>,
    state: ViewState,
    geometry: PageGeometry,
    images: ImageIndex,
    outline: OutlineTree,
    frame: Option<Frame>,
    pending: Option<RequestId>,
}

pub struct NavigationController {
    config: EngineConfig,
    cache: Arc<RenderCache>,
    scheduler: RenderScheduler,
    document: Option<OpenDocument>,
    viewport: (f32, f32),
    events: Arc<Mutex<Vec<NavigationEvent>>>,
}

impl NavigationController {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let cache = Arc::new(RenderCache::from_config(&config));
        let scheduler = RenderScheduler::spawn(Arc::clone(&cache))?;
        Ok(Self {
            config,
            cache,
            scheduler,
            document: None,
            viewport: (0.0, 0.0),
            events: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<RenderCache> {
        &self.cache
    }

    pub fn events(&self) -> Arc<Mutex<Vec<NavigationEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn drain_events(&self) -> Vec<NavigationEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn emit(&self, event: NavigationEvent) {
        self.events.lock().push(event);
    }

    fn notice(&self, message: String) {
        self.emit(NavigationEvent::Notice(message));
    }

    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }

    pub fn info(&self) -> Option<&DocumentInfo> {
        self.document.as_ref().map(|doc| doc.backend.info())
    }

    pub fn backend(&self) -> Option<Arc<dyn DocumentBackend>> {
        self.document.as_ref().map(|doc| Arc::clone(&doc.backend))
    }

    pub fn view_state(&self) -> Option<&ViewState> {
        self.document.as_ref().map(|doc| &doc.state)
    }

    pub fn geometry(&self) -> Option<PageGeometry> {
        self.document.as_ref().map(|doc| doc.geometry)
    }

    pub fn images(&self) -> Option<&ImageIndex> {
        self.document.as_ref().map(|doc| &doc.images)
    }

    pub fn outline(&self) -> Option<&OutlineTree> {
        self.document.as_ref().map(|doc| &doc.outline)
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.document.as_ref().and_then(|doc| doc.frame.as_ref())
    }

    pub fn viewport(&self) -> (f32, f32) {
        self.viewport
    }

    pub fn transform(&self) -> Option<ViewportTransform> {
        self.document.as_ref().map(|doc| {
            ViewportTransform::new(doc.geometry, doc.state.zoom, self.config.base_resolution)
                .with_scroll(doc.state.scroll_x, doc.state.scroll_y)
        })
    }

    /// Image under a viewport point on the current page.
    pub fn resolve_hit(&self, point: ScreenPoint) -> Option<&ImageBoundingBox> {
        let transform = self.transform()?;
        let doc = self.document.as_ref()?;
        HitTester::resolve(&transform, &doc.images, point)
    }

    /// Opens `path` and makes it the active document. On failure the
    /// previously open document, if any, stays exactly as it was.
    #[instrument(skip(self, provider))]
    pub async fn open_document<P: DocumentProvider + ?Sized>(
        &mut self,
        provider: &P,
        path: PathBuf,
    ) -> Result<(), DocumentOpenError> {
        let backend = provider.open(&path).await?;
        let info = backend.info().clone();
        info!(
            path = %info.path.display(),
            pages = info.page_count,
            "opened document"
        );

        if let Some(previous) = self.document.take() {
            self.emit(NavigationEvent::DocumentClosed(previous.backend.info().id));
        }
        self.cache.reset();

        let outline = OutlineTree::build(backend.as_ref());
        self.document = Some(OpenDocument {
            backend,
            state: ViewState::default(),
            geometry: PageGeometry::default(),
            images: ImageIndex::empty(0),
            outline,
            frame: None,
            pending: None,
        });
        self.load_page(0);
        self.emit(NavigationEvent::DocumentOpened(info.id));
        if !self.refit() {
            self.request_render();
        }
        Ok(())
    }

    pub fn close_document(&mut self) {
        if let Some(doc) = self.document.take() {
            self.cache.reset();
            self.emit(NavigationEvent::DocumentClosed(doc.backend.info().id));
            self.emit(NavigationEvent::RedrawNeeded);
        }
    }

    /// Clamps `page` into range; out-of-range requests are not errors.
    pub fn go_to_page(&mut self, page: usize) {
        let Some(doc) = self.document.as_ref() else {
            return;
        };
        let next = page.min(doc.backend.info().page_count.saturating_sub(1));
        if next == doc.state.current_page {
            return;
        }
        self.load_page(next);
        if let Some(doc) = self.document.as_mut() {
            doc.state.scroll_x = 0.0;
            doc.state.scroll_y = 0.0;
        }
        self.emit(NavigationEvent::PageChanged { page: next });
        if !self.refit() {
            self.request_render();
        }
    }

    pub fn next_page(&mut self, count: usize) {
        if let Some(current) = self.view_state().map(|s| s.current_page) {
            self.go_to_page(current.saturating_add(count));
        }
    }

    pub fn prev_page(&mut self, count: usize) {
        if let Some(current) = self.view_state().map(|s| s.current_page) {
            self.go_to_page(current.saturating_sub(count));
        }
    }

    /// Explicit zoom; switches to manual fit mode.
    pub fn set_zoom(&mut self, zoom: f32) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        doc.state.fit_mode = FitMode::Manual;
        let zoom = clamp_zoom(zoom, self.config.min_zoom, self.config.max_zoom);
        self.apply_zoom(zoom);
    }

    pub fn zoom_in(&mut self) {
        self.zoom_step(1);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_step(-1);
    }

    pub fn zoom_step(&mut self, steps: i32) {
        if let Some(zoom) = self.view_state().map(|s| s.zoom) {
            self.set_zoom(zoom * self.config.zoom_step.powi(steps));
        }
    }

    pub fn fit_to_window(&mut self) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        doc.state.fit_mode = FitMode::FitToWindow;
        if !self.refit() {
            self.emit(NavigationEvent::RedrawNeeded);
        }
    }

    /// Manual mode keeps the zoom and only re-clamps scrolling; fit mode
    /// recomputes the zoom for the new size.
    pub fn on_window_resize(&mut self, width: f32, height: f32) {
        self.viewport = (width.max(0.0), height.max(0.0));
        let Some(mode) = self.view_state().map(|s| s.fit_mode) else {
            return;
        };
        match mode {
            FitMode::FitToWindow => {
                self.refit();
            }
            FitMode::Manual => {
                self.clamp_scroll();
                self.emit(NavigationEvent::RedrawNeeded);
            }
        }
    }

    pub fn scroll_by(&mut self, dx: f32, dy: f32) {
        let (vw, vh) = self.viewport;
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        doc.state.scroll_x += dx * vw;
        doc.state.scroll_y += dy * vh;
        self.clamp_scroll();
        self.emit(NavigationEvent::RedrawNeeded);
    }

    pub fn apply(&mut self, command: Command) {
        debug!(?command, "applying command");
        match command {
            Command::NextPage { count } => self.next_page(count),
            Command::PrevPage { count } => self.prev_page(count),
            Command::GotoPage { page } => self.go_to_page(page),
            Command::SetZoom { zoom } => self.set_zoom(zoom),
            Command::ZoomIn => self.zoom_in(),
            Command::ZoomOut => self.zoom_out(),
            Command::ZoomStep { steps } => self.zoom_step(steps),
            Command::ResetZoom => self.set_zoom(1.0),
            Command::FitToWindow => self.fit_to_window(),
            Command::ResizeWindow { width, height } => self.on_window_resize(width, height),
            Command::ScrollBy { dx, dy } => self.scroll_by(dx, dy),
            Command::CloseDocument => self.close_document(),
        }
    }

    pub fn thumbnail(&self, page_index: usize) -> Result<Arc<RenderImage>> {
        let doc = self
            .document
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no document is open"))?;
        self.cache.thumbnail(doc.backend.as_ref(), page_index)
    }

    /// Applies a finished render if one is ready. Returns true when the frame
    /// changed.
    pub fn poll_render(&mut self) -> bool {
        match self.scheduler.poll() {
            Some(outcome) => self.apply_outcome(outcome),
            None => false,
        }
    }

    /// Blocks up to `timeout` for the pending render.
    pub fn wait_render(&mut self, timeout: Duration) -> bool {
        let pending = self.document.as_ref().and_then(|doc| doc.pending);
        if pending.is_none() {
            return false;
        }
        match self.scheduler.wait(timeout) {
            Some(outcome) => self.apply_outcome(outcome),
            None => false,
        }
    }

    pub fn has_pending_render(&self) -> bool {
        self.document
            .as_ref()
            .is_some_and(|doc| doc.pending.is_some())
    }

    fn apply_outcome(&mut self, outcome: RenderOutcome) -> bool {
        let Some(doc) = self.document.as_mut() else {
            return false;
        };
        if doc.pending != Some(outcome.id) {
            debug!(id = outcome.id.0, "render result does not match pending request");
            return false;
        }
        doc.pending = None;
        match outcome.result {
            Ok(image) => {
                doc.frame = Some(Frame {
                    image,
                    page_index: outcome.page_index,
                    zoom: outcome.zoom,
                    quality: FrameQuality::Exact,
                });
            }
            Err(err) => {
                warn!(?err, page = outcome.page_index, "page render failed");
                let placeholder = placeholder_for(doc.geometry);
                doc.frame = Some(Frame {
                    image: Arc::new(placeholder),
                    page_index: outcome.page_index,
                    zoom: outcome.zoom,
                    quality: FrameQuality::Placeholder,
                });
                self.notice(format!(
                    "page {} could not be rendered: {:#}",
                    outcome.page_index + 1,
                    err
                ));
            }
        }
        self.emit(NavigationEvent::RedrawNeeded);
        true
    }

    fn load_page(&mut self, page_index: usize) {
        let Some(doc) = self.document.as_ref() else {
            return;
        };
        let backend = Arc::clone(&doc.backend);

        let geometry = match backend.page_geometry(page_index) {
            Ok(geometry) => geometry,
            Err(err) => {
                warn!(?err, page = page_index, "failed to measure page");
                self.notice(format!("page {} has no usable size", page_index + 1));
                PageGeometry::default()
            }
        };
        let images = match ImageIndex::build_for_page(backend.as_ref(), page_index) {
            Ok(images) => images,
            Err(err) => {
                warn!(?err, page = page_index, "failed to list images");
                self.notice(format!(
                    "images on page {} could not be listed",
                    page_index + 1
                ));
                ImageIndex::empty(page_index)
            }
        };

        if let Some(doc) = self.document.as_mut() {
            doc.state.current_page = page_index;
            doc.geometry = geometry;
            doc.images = images;
        }
    }

    /// Recomputes the zoom when in fit mode and the viewport is known.
    /// Returns true when that already requested a render.
    fn refit(&mut self) -> bool {
        let Some(doc) = self.document.as_ref() else {
            return false;
        };
        if doc.state.fit_mode != FitMode::FitToWindow {
            return false;
        }
        let (width, height) = self.viewport;
        let fitted = fit_zoom(&doc.geometry, width, height, self.config.base_resolution);
        if fitted <= 0.0 {
            return false;
        }
        let zoom = clamp_zoom(fitted, self.config.min_zoom, self.config.max_zoom);
        self.apply_zoom(zoom)
    }

    /// Returns true when the zoom moved to another cache bucket and a render
    /// was requested.
    fn apply_zoom(&mut self, zoom: f32) -> bool {
        let Some(doc) = self.document.as_mut() else {
            return false;
        };
        let changed = quantize_zoom(zoom) != quantize_zoom(doc.state.zoom);
        doc.state.zoom = zoom;
        self.clamp_scroll();
        if changed {
            self.emit(NavigationEvent::ZoomChanged { zoom });
            self.request_render();
        } else {
            self.emit(NavigationEvent::RedrawNeeded);
        }
        changed
    }

    fn clamp_scroll(&mut self) {
        let Some(transform) = self.transform() else {
            return;
        };
        let (content_w, content_h) = transform.content_size();
        let (vw, vh) = self.viewport;
        if let Some(doc) = self.document.as_mut() {
            doc.state.scroll_x = clamp_scroll(doc.state.scroll_x, content_w, vw);
            doc.state.scroll_y = clamp_scroll(doc.state.scroll_y, content_h, vh);
        }
    }

    /// Shows the best bitmap on hand right away and queues an exact render
    /// unless the exact one is already cached.
    fn request_render(&mut self) {
        let Some(doc) = self.document.as_mut() else {
            return;
        };
        let page = doc.state.current_page;
        let zoom = doc.state.zoom;

        if let Some(image) = self.cache.get_cached(page, zoom) {
            doc.frame = Some(Frame {
                image,
                page_index: page,
                zoom,
                quality: FrameQuality::Exact,
            });
            doc.pending = None;
            self.emit(NavigationEvent::RedrawNeeded);
            return;
        }

        let frame = match self.cache.peek_best(page, zoom) {
            Some(image) => Frame {
                image,
                page_index: page,
                zoom,
                quality: FrameQuality::Intermediate,
            },
            None => Frame {
                image: Arc::new(placeholder_for(doc.geometry)),
                page_index: page,
                zoom,
                quality: FrameQuality::Placeholder,
            },
        };
        doc.frame = Some(frame);
        let id = self.scheduler.submit(Arc::clone(&doc.backend), page, zoom);
        doc.pending = Some(id);
        debug!(id = id.0, page, zoom, "render requested");
        self.emit(NavigationEvent::RedrawNeeded);
    }
}

fn placeholder_for(geometry: PageGeometry) -> RenderImage {
    let (w, h) = geometry.displayed_size();
    let longest = w.max(h).max(1.0);
    let ratio = PLACEHOLDER_MAX_SIDE / longest;
    let width = ((w * ratio).round() as u32).max(1);
    let height = ((h * ratio).round() as u32).max(1);
    RenderImage::blank(width, height)
}
