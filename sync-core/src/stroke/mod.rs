//! Ink reconstruction from raw pen samples.

pub mod filter;
pub mod width;

use serde::Serialize;

pub use filter::{FilterState, PathState, Point, StrokeFilter};
pub use width::LineWidthFilter;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl From<Point> for PointF {
    fn from(p: Point) -> Self {
        Self {
            x: p.x as f32,
            y: p.y as f32,
        }
    }
}

/// A polyline (move-to, then line-to for each further point) with one
/// stroke width, all in digitizer units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSegment {
    pub points: Vec<PointF>,
    pub stroke_width: f32,
}

impl PathSegment {
    /// Single line from `from` to `to`.
    pub fn line(from: Point, to: Point, stroke_width: f32) -> Self {
        Self {
            points: vec![from.into(), to.into()],
            stroke_width,
        }
    }

    pub fn start(&self) -> Option<PointF> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<PointF> {
        self.points.last().copied()
    }
}
