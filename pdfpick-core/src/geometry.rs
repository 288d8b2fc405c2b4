//! Page-space and screen-space primitives.
//!
//! Page space is the unrotated page in points, origin top-left, y down.
//! Screen space is viewport pixels, origin top-left, y down.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Width or height below this many points makes a rect degenerate.
pub const DEGENERATE_EXTENT: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PdfRect {
    /// Builds a rect with ordered corners regardless of argument order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width() >= DEGENERATE_EXTENT && self.height() >= DEGENERATE_EXTENT)
    }

    /// Edge-inclusive containment.
    pub fn contains(&self, point: PdfPoint) -> bool {
        point.x >= self.x0 && point.x <= self.x1 && point.y >= self.y0 && point.y <= self.y1
    }

    pub fn approx_eq(&self, other: &PdfRect, tolerance: f32) -> bool {
        (self.x0 - other.x0).abs() <= tolerance
            && (self.y0 - other.y0).abs() <= tolerance
            && (self.x1 - other.x1).abs() <= tolerance
            && (self.y1 - other.y1).abs() <= tolerance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfPoint {
    pub x: f32,
    pub y: f32,
}

impl PdfPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl ScreenRect {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Clockwise display rotation of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Accepts any integer; off-grid values snap to the nearest quarter turn.
    pub fn from_degrees(degrees: i32) -> Self {
        let normalized = degrees.rem_euclid(360);
        if normalized % 90 != 0 {
            warn!(degrees, "page rotation is not a multiple of 90, snapping");
        }
        let quarter = ((normalized as f32 / 90.0).round() as i32).rem_euclid(4);
        match quarter {
            1 => Rotation::Cw90,
            2 => Rotation::Cw180,
            3 => Rotation::Cw270,
            _ => Rotation::None,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Unrotated width in points.
    pub width: f32,
    /// Unrotated height in points.
    pub height: f32,
    pub rotation: Rotation,
}

impl Default for PageGeometry {
    /// US Letter, used when the adapter cannot report a size.
    fn default() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            rotation: Rotation::None,
        }
    }
}

impl PageGeometry {
    pub fn new(width: f32, height: f32, rotation: Rotation) -> Self {
        Self {
            width,
            height,
            rotation,
        }
    }

    /// Size after rotation, still in points.
    pub fn displayed_size(&self) -> (f32, f32) {
        if self.rotation.is_quarter_turn() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Maps an unrotated page point into the rotated (displayed) frame.
    pub fn rotate(&self, point: PdfPoint) -> (f32, f32) {
        let (w, h) = (self.width, self.height);
        match self.rotation {
            Rotation::None => (point.x, point.y),
            Rotation::Cw90 => (h - point.y, point.x),
            Rotation::Cw180 => (w - point.x, h - point.y),
            Rotation::Cw270 => (point.y, w - point.x),
        }
    }

    /// Inverse of [`PageGeometry::rotate`].
    pub fn unrotate(&self, u: f32, v: f32) -> PdfPoint {
        let (w, h) = (self.width, self.height);
        match self.rotation {
            Rotation::None => PdfPoint::new(u, v),
            Rotation::Cw90 => PdfPoint::new(v, h - u),
            Rotation::Cw180 => PdfPoint::new(w - u, h - v),
            Rotation::Cw270 => PdfPoint::new(w - v, u),
        }
    }
}
