//! Line width from pen speed and pressure.
//!
//! Widths were measured on the physical board for six pen speeds and
//! fourteen contact masses. Everything here is in digitizer units: ticks
//! for distance and width, raw pressure counts for mass.

/// Digitizer resolution is 0.01 mm.
const TICKS_PER_MM: f32 = 100.0;
/// About 144.4 samples per second.
const MS_PER_SAMPLE: f32 = 6.924;
/// Stylus held at 30 degrees.
const PEN_ANGLE_COS: f32 = 0.866;
/// Recorded lines are drawn a little sharper than the board shows them.
const SCALE: f32 = 0.75;

/// Initial width memory is capped to avoid blobs where a trace starts.
const MAX_INITIAL_WIDTH: f32 = 45.0;

/// Speed assumed for a dot, where no real speed is known.
const DOT_VELOCITY_MM_S: f32 = 75.0;

/// Distance between successive samples at `velocity` mm/s.
pub const fn velocity_to_distance(velocity: f32) -> f32 {
    velocity * TICKS_PER_MM * MS_PER_SAMPLE / 1000.0
}

/// Scaled width for a width measured in millimetres.
pub const fn mm_to_digitizer(mm: f32) -> f32 {
    mm * TICKS_PER_MM * SCALE
}

/// Pressure reading for a mass in grams normal to the surface.
pub const fn mass_to_pressure(grams: f32) -> i32 {
    (grams * PEN_ANGLE_COS * 1023.0 / 600.0 + 0.5) as i32
}

const MASS_BINS: usize = 14;

const MASS: [f32; MASS_BINS] = [
    mass_to_pressure(10.0) as f32,
    mass_to_pressure(25.0) as f32,
    mass_to_pressure(50.0) as f32,
    mass_to_pressure(100.0) as f32,
    mass_to_pressure(150.0) as f32,
    mass_to_pressure(200.0) as f32,
    mass_to_pressure(250.0) as f32,
    mass_to_pressure(300.0) as f32,
    mass_to_pressure(350.0) as f32,
    mass_to_pressure(400.0) as f32,
    mass_to_pressure(450.0) as f32,
    mass_to_pressure(500.0) as f32,
    mass_to_pressure(550.0) as f32,
    mass_to_pressure(600.0) as f32,
];

struct WidthRow {
    distance: f32,
    widths: [f32; MASS_BINS],
}

const fn row(velocity: f32, mm: [f32; MASS_BINS]) -> WidthRow {
    let mut widths = [0.0; MASS_BINS];
    let mut k = 0;
    while k < MASS_BINS {
        widths[k] = mm_to_digitizer(mm[k]);
        k += 1;
    }
    WidthRow {
        distance: velocity_to_distance(velocity),
        widths,
    }
}

#[rustfmt::skip]
const ROWS: [WidthRow; 6] = [
    //           10g       25g       50g       100g      150g      200g      250g      300g      350g      400g      450g      500g      550g      600g
    row(1.0,   [0.720000, 0.800000, 0.908937, 1.108957, 1.266351, 1.388042, 1.462073, 1.540000, 1.618852, 1.701938, 1.793265, 1.860000, 1.920000, 1.954108]),
    row(5.0,   [0.490000, 0.530000, 0.614119, 0.758321, 0.868824, 0.910000, 0.942034, 1.000218, 1.047881, 1.083052, 1.155148, 1.196536, 1.250000, 1.286546]),
    row(30.0,  [0.300000, 0.340000, 0.387672, 0.493372, 0.565948, 0.620261, 0.673648, 0.710716, 0.746997, 0.777846, 0.815101, 0.837235, 0.880000, 0.926857]),
    row(75.0,  [0.290000, 0.295000, 0.320000, 0.374948, 0.422921, 0.473530, 0.508386, 0.541358, 0.577623, 0.600577, 0.621771, 0.651861, 0.670000, 0.690000]),
    row(100.0, [0.280000, 0.290000, 0.302881, 0.338898, 0.387231, 0.433664, 0.452389, 0.482745, 0.516970, 0.534589, 0.557370, 0.581577, 0.610000, 0.620000]),
    row(180.0, [0.250000, 0.260000, 0.280375, 0.311056, 0.362906, 0.390511, 0.414745, 0.436406, 0.463840, 0.478165, 0.501515, 0.521805, 0.540000, 0.550000]),
];

/// Index `k >= 1` of the first bin whose bound is at least `value`.
fn upper_bin(bounds: impl Iterator<Item = f32>, value: f32, len: usize) -> usize {
    bounds
        .enumerate()
        .skip(1)
        .find(|&(_, bound)| value <= bound)
        .map_or(len - 1, |(k, _)| k)
}

/// Unsmoothed width for a per-sample `distance` and `pressure`, bilinearly
/// interpolated across pressure first, then distance. Inputs are clamped
/// to the table.
pub fn raw_width(distance: f32, pressure: f32) -> f32 {
    let first = &ROWS[0];
    let last = &ROWS[ROWS.len() - 1];
    let dist = distance.clamp(first.distance, last.distance);
    let pressure = pressure.clamp(MASS[0], MASS[MASS_BINS - 1]);

    let i = upper_bin(ROWS.iter().map(|r| r.distance), dist, ROWS.len());
    let j = upper_bin(MASS.iter().copied(), pressure, MASS_BINS);

    let dp = (pressure - MASS[j - 1]) / (MASS[j] - MASS[j - 1]);
    let across = |r: &WidthRow| r.widths[j - 1] + dp * (r.widths[j] - r.widths[j - 1]);
    let lwa = across(&ROWS[i - 1]);
    let lwb = across(&ROWS[i]);

    lwa + (dist - ROWS[i - 1].distance) * (lwb - lwa) / (ROWS[i].distance - ROWS[i - 1].distance)
}

/// Narrowest and widest widths in the table.
pub fn width_bounds() -> (f32, f32) {
    ROWS.iter()
        .flat_map(|r| r.widths.iter().copied())
        .fold((f32::MAX, f32::MIN), |(lo, hi), w| (lo.min(w), hi.max(w)))
}

/// Temporal smoothing of successive widths within one trace.
#[derive(Debug, Clone, Default)]
pub struct LineWidthFilter {
    memory: Option<f32>,
}

impl LineWidthFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous trace.
    pub fn reset(&mut self) {
        self.memory = None;
    }

    /// Width for a segment covering `velocity` ticks per sample. A negative
    /// velocity marks a dot and assumes a mid-range speed.
    pub fn compute(&mut self, velocity: f32, pressure: f32) -> f32 {
        let dist = if velocity < 0.0 {
            velocity_to_distance(DOT_VELOCITY_MM_S)
        } else {
            velocity
        };
        let dist = dist.clamp(ROWS[0].distance, ROWS[ROWS.len() - 1].distance);

        let raw = raw_width(dist, pressure);
        let memory = *self.memory.get_or_insert(raw.min(MAX_INITIAL_WIDTH));

        let width = (2.0 * dist * raw + memory * memory) / (2.0 * dist + memory);
        self.memory = Some(width);
        width
    }
}
