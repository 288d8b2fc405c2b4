use crate::geometry::{PageGeometry, PdfPoint, PdfRect, ScreenPoint, ScreenRect};

/// Maps between page space and viewport pixels for one page at one zoom.
///
/// `screen = rotate(page) * scale - scroll`, with `scale = zoom * base_resolution`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    geometry: PageGeometry,
    zoom: f32,
    base_resolution: f32,
    scroll: (f32, f32),
}

impl ViewportTransform {
    pub fn new(geometry: PageGeometry, zoom: f32, base_resolution: f32) -> Self {
        Self {
            geometry,
            zoom,
            base_resolution,
            scroll: (0.0, 0.0),
        }
    }

    pub fn with_scroll(mut self, scroll_x: f32, scroll_y: f32) -> Self {
        self.scroll = (scroll_x, scroll_y);
        self
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn scroll(&self) -> (f32, f32) {
        self.scroll
    }

    pub fn scale(&self) -> f32 {
        self.zoom * self.base_resolution
    }

    /// Size of the rendered page in screen pixels.
    pub fn content_size(&self) -> (f32, f32) {
        let (w, h) = self.geometry.displayed_size();
        let scale = self.scale();
        (w * scale, h * scale)
    }

    pub fn to_screen_point(&self, point: PdfPoint) -> ScreenPoint {
        let (u, v) = self.geometry.rotate(point);
        let scale = self.scale();
        ScreenPoint::new(u * scale - self.scroll.0, v * scale - self.scroll.1)
    }

    pub fn to_pdf_point(&self, point: ScreenPoint) -> PdfPoint {
        let scale = self.scale();
        let u = (point.x + self.scroll.0) / scale;
        let v = (point.y + self.scroll.1) / scale;
        self.geometry.unrotate(u, v)
    }

    pub fn to_screen_rect(&self, rect: PdfRect) -> ScreenRect {
        let a = self.to_screen_point(PdfPoint::new(rect.x0, rect.y0));
        let b = self.to_screen_point(PdfPoint::new(rect.x1, rect.y1));
        ScreenRect {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            right: a.x.max(b.x),
            bottom: a.y.max(b.y),
        }
    }

    pub fn to_pdf_rect(&self, rect: ScreenRect) -> PdfRect {
        let a = self.to_pdf_point(ScreenPoint::new(rect.left, rect.top));
        let b = self.to_pdf_point(ScreenPoint::new(rect.right, rect.bottom));
        PdfRect::new(a.x, a.y, b.x, b.y)
    }
}

/// Zoom at which the whole rotated page fits into `available_width` by
/// `available_height` screen pixels. Zero when any input is unusable.
pub fn fit_zoom(
    geometry: &PageGeometry,
    available_width: f32,
    available_height: f32,
    base_resolution: f32,
) -> f32 {
    let (w, h) = geometry.displayed_size();
    if w <= 0.0 || h <= 0.0 || base_resolution <= 0.0 {
        return 0.0;
    }
    if available_width <= 0.0 || available_height <= 0.0 {
        return 0.0;
    }
    let zoom_x = available_width / (w * base_resolution);
    let zoom_y = available_height / (h * base_resolution);
    zoom_x.min(zoom_y)
}

/// Out-of-range values land on the nearer bound, so an overflowing zoom-in
/// (`+inf`) ends at `max_zoom`. NaN and non-positive values go to `min_zoom`.
pub fn clamp_zoom(zoom: f32, min_zoom: f32, max_zoom: f32) -> f32 {
    if zoom.is_nan() || zoom <= 0.0 {
        return min_zoom;
    }
    zoom.clamp(min_zoom, max_zoom)
}

/// Keeps a scroll offset inside the scrollable range of one axis.
pub fn clamp_scroll(scroll: f32, content: f32, viewport: f32) -> f32 {
    let max = (content - viewport).max(0.0);
    if !scroll.is_finite() {
        return 0.0;
    }
    scroll.clamp(0.0, max)
}
