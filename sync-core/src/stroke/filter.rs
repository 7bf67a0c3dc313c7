//! Per-trace stroke reconstruction.
//!
//! ```text
//!              contact                  far enough
//!  NoPoints ───────────► OnePoint ───────────────────► MultiplePoints
//!     ▲                     │ lift: dot                    │  │ contact: filter,
//!     │                     ▼                              │  │ emit when far enough
//!     └─────────────────────┴──────────────────────────────┘◄─┘
//!                          lift: converge on the pen-up point
//! ```

use tracing::trace;

use crate::hid::CaptureReport;
use crate::stroke::PathSegment;
use crate::stroke::width::LineWidthFilter;

/// Squared distance (ticks²) a filtered point must travel before a segment
/// is emitted; 10 ticks is 0.1 mm.
pub const DISTANCE_THRESHOLD_SQUARED: i64 = 10 * 10;

/// Extra filter passes fed the last contact sample at pen-up.
pub const PEN_UP_PASSES: usize = 4;

// PD controller gains in 2^13 fixed point (0.15 and 0.60).
const KPP: i64 = 1229;
const KDD: i64 = 4915;
const SHIFT: u32 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
    pub pressure: i32,
}

impl From<&CaptureReport> for Point {
    fn from(report: &CaptureReport) -> Self {
        Self {
            x: report.x as i32,
            y: report.y as i32,
            pressure: report.pressure as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathState {
    #[default]
    NoPoints,
    OnePoint,
    MultiplePoints,
}

// ── FilterState ──────────────────────────────────────────────────

/// Dynamic filter state for the current trace.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    /// End of the last emitted segment.
    pub last: Point,
    /// Latest filtered position.
    pub current: Point,
    pub velocity: Point,
    /// Samples since the last emitted segment, saturating.
    pub elapsed: u8,
}

fn axis_step(raw: i32, current: &mut i32, velocity: &mut i32) {
    let accel = KPP * (raw as i64 - *current as i64) - KDD * *velocity as i64;
    *current = (*current as i64 + *velocity as i64) as i32;
    *velocity = ((((*velocity as i64) << SHIFT) + accel) >> SHIFT) as i32;
}

impl FilterState {
    /// Start a trace at `p`.
    pub fn start(&mut self, p: Point) {
        self.last = p;
        self.current = p;
        self.velocity = Point::default();
        self.elapsed = 0;
    }

    /// Advance one sample towards `raw` and return the squared distance
    /// from `last` to the new filtered position.
    pub fn step(&mut self, raw: Point) -> i64 {
        self.elapsed = self.elapsed.saturating_add(1);

        axis_step(raw.x, &mut self.current.x, &mut self.velocity.x);
        axis_step(raw.y, &mut self.current.y, &mut self.velocity.y);
        axis_step(
            raw.pressure,
            &mut self.current.pressure,
            &mut self.velocity.pressure,
        );

        self.distance_squared()
    }

    pub fn distance_squared(&self) -> i64 {
        let dx = self.current.x as i64 - self.last.x as i64;
        let dy = self.current.y as i64 - self.last.y as i64;
        dx * dx + dy * dy
    }

    /// A segment ending at `current` was emitted.
    pub fn mark_emitted(&mut self) {
        self.last = self.current;
        self.elapsed = 0;
    }

    fn speed(&self) -> f32 {
        let (vx, vy) = (self.velocity.x as f32, self.velocity.y as f32);
        (vx * vx + vy * vy).sqrt()
    }

    fn average_pressure(&self) -> f32 {
        (self.last.pressure as f32 + self.current.pressure as f32) / 2.0
    }
}

// ── StrokeFilter ─────────────────────────────────────────────────

/// Turns a stream of capture reports into smoothed path segments.
#[derive(Debug, Clone, Default)]
pub struct StrokeFilter {
    state: PathState,
    filter: FilterState,
    width: LineWidthFilter,
    last_capture: Option<CaptureReport>,
}

impl StrokeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PathState {
        self.state
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    /// Drop any trace in progress.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed one sample, returning the segments it completes.
    pub fn process(&mut self, report: &CaptureReport) -> Vec<PathSegment> {
        let mut segments = Vec::new();
        let contact = report.is_contact();

        match (self.state, contact) {
            (PathState::NoPoints, true) => {
                self.filter.start(Point::from(report));
                self.width.reset();
                self.state = PathState::OnePoint;
            }
            (PathState::NoPoints, false) => {}

            (PathState::OnePoint, true) => {
                if let Some(segment) = self.advance(report) {
                    segments.push(segment);
                    self.state = PathState::MultiplePoints;
                }
            }
            (PathState::OnePoint, false) => {
                let width = self
                    .width
                    .compute(-1.0, self.filter.current.pressure as f32);
                segments.push(self.segment(width));
                self.state = PathState::NoPoints;
            }

            (PathState::MultiplePoints, true) => {
                segments.extend(self.advance(report));
            }
            (PathState::MultiplePoints, false) => {
                // Hold the speed fixed so the repeated final sample does not
                // read as a slowdown and widen the tail.
                let speed = self.filter.speed();
                if let Some(last) = self.last_capture {
                    let raw = Point::from(&last);
                    for _ in 0..PEN_UP_PASSES {
                        if self.filter.step(raw) >= DISTANCE_THRESHOLD_SQUARED {
                            let width = self.width.compute(speed, self.filter.average_pressure());
                            segments.push(self.segment(width));
                            self.filter.mark_emitted();
                        }
                    }
                }
                self.state = PathState::NoPoints;
            }
        }

        self.last_capture = Some(*report);
        if !segments.is_empty() {
            trace!(count = segments.len(), state = ?self.state, "segments emitted");
        }
        segments
    }

    fn advance(&mut self, report: &CaptureReport) -> Option<PathSegment> {
        let dist_sq = self.filter.step(Point::from(report));
        if dist_sq < DISTANCE_THRESHOLD_SQUARED {
            return None;
        }

        let velocity = (dist_sq as f32).sqrt() / self.filter.elapsed as f32;
        let width = self
            .width
            .compute(velocity, self.filter.average_pressure());
        let segment = self.segment(width);
        self.filter.mark_emitted();
        Some(segment)
    }

    fn segment(&self, width: f32) -> PathSegment {
        PathSegment::line(self.filter.last, self.filter.current, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::ReportFlags;

    fn sample(x: u16, y: u16, pressure: u16, contact: bool) -> CaptureReport {
        let flags = if contact {
            ReportFlags::READY | ReportFlags::TIP_SWITCH
        } else {
            ReportFlags::READY
        };
        CaptureReport {
            report_id: 1,
            x,
            y,
            pressure,
            flags,
        }
    }

    #[test]
    fn filter_step_fixed_point() {
        let mut f = FilterState::default();
        f.start(Point { x: 0, y: 0, pressure: 0 });
        let raw = Point { x: 100, y: 0, pressure: 0 };

        assert_eq!(f.step(raw), 0);
        assert_eq!(f.velocity.x, 15);
        assert_eq!(f.elapsed, 1);

        assert_eq!(f.step(raw), 225);
        assert_eq!(f.current.x, 15);
        assert_eq!(f.velocity.x, 21);
        assert_eq!(f.elapsed, 2);
    }

    #[test]
    fn filter_shift_is_arithmetic() {
        let mut f = FilterState::default();
        f.start(Point { x: 100, y: 0, pressure: 0 });
        f.step(Point { x: 0, y: 0, pressure: 0 });
        // -122900 >> 13 rounds towards negative infinity
        assert_eq!(f.velocity.x, -16);
    }

    #[test]
    fn elapsed_saturates() {
        let mut f = FilterState::default();
        let p = Point::default();
        for _ in 0..300 {
            f.step(p);
        }
        assert_eq!(f.elapsed, 255);
    }

    #[test]
    fn no_contact_from_idle_does_nothing() {
        let mut filter = StrokeFilter::new();
        assert!(filter.process(&sample(10, 10, 100, false)).is_empty());
        assert_eq!(filter.state(), PathState::NoPoints);
    }

    #[test]
    fn tap_emits_a_dot() {
        let mut filter = StrokeFilter::new();
        assert!(filter.process(&sample(500, 600, 300, true)).is_empty());
        assert_eq!(filter.state(), PathState::OnePoint);

        let dot = filter.process(&sample(500, 600, 0, false));
        assert_eq!(dot.len(), 1);
        assert_eq!(dot[0].points.len(), 2);
        assert_eq!(dot[0].points[0], dot[0].points[1]);
        assert!(dot[0].stroke_width > 0.0);
        assert_eq!(filter.state(), PathState::NoPoints);
    }

    #[test]
    fn stationary_contact_emits_nothing() {
        let mut filter = StrokeFilter::new();
        for _ in 0..100 {
            assert!(filter.process(&sample(1000, 1000, 400, true)).is_empty());
        }
        assert_eq!(filter.state(), PathState::OnePoint);
    }

    #[test]
    fn drag_emits_connected_segments() {
        let mut filter = StrokeFilter::new();
        let mut segments = Vec::new();
        for i in 0..60u16 {
            segments.extend(filter.process(&sample(1000 + i * 20, 2000, 400, true)));
        }
        assert_eq!(filter.state(), PathState::MultiplePoints);
        assert!(segments.len() > 5);

        for pair in segments.windows(2) {
            assert_eq!(pair[0].points[1], pair[1].points[0]);
        }
        for s in &segments {
            assert!(s.points[1].x > s.points[0].x);
            assert!(s.stroke_width > 0.0);
        }
    }

    #[test]
    fn pen_up_emits_at_most_four_segments() {
        let mut filter = StrokeFilter::new();
        for i in 0..30u16 {
            filter.process(&sample(1000 + i * 40, 2000 + i * 10, 500, true));
        }
        assert_eq!(filter.state(), PathState::MultiplePoints);

        let tail = filter.process(&sample(0, 0, 0, false));
        assert!(tail.len() <= PEN_UP_PASSES);
        assert!(!tail.is_empty());
        assert_eq!(filter.state(), PathState::NoPoints);

        // converges towards the last contact sample, not the lift report
        let end = tail[tail.len() - 1].points[1];
        assert!(end.x > 1000.0);
    }

    #[test]
    fn new_trace_starts_fresh() {
        let mut filter = StrokeFilter::new();
        for i in 0..20u16 {
            filter.process(&sample(1000 + i * 40, 2000, 500, true));
        }
        filter.process(&sample(0, 0, 0, false));

        filter.process(&sample(5000, 5000, 200, true));
        assert_eq!(filter.state(), PathState::OnePoint);
        assert_eq!(filter.filter_state().last, Point { x: 5000, y: 5000, pressure: 200 });
        assert_eq!(filter.filter_state().velocity, Point::default());
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut filter = StrokeFilter::new();
        filter.process(&sample(1, 1, 1, true));
        filter.reset();
        assert_eq!(filter.state(), PathState::NoPoints);
    }
}
