// src/fuzzy.rs
//
// Fuzzy inference from queue length to green duration: triangular
// membership sets, three rules, clip/max aggregation, centroid
// defuzzification of the aggregate sampled across the output universe.

/// Duration reported when the aggregated output shape has zero area.
pub const FALLBACK_DURATION_S: f64 = 30.0;

/// Counts above this saturate into the "high" set.
pub const COUNT_MAX: u32 = 150;

const OUT_MIN: u32 = 10;
const OUT_MAX: u32 = 90;

const IN_LOW: Triangle = Triangle::new(0.0, 0.0, 50.0);
const IN_MEDIUM: Triangle = Triangle::new(30.0, 75.0, 120.0);
const IN_HIGH: Triangle = Triangle::new(100.0, 150.0, 150.0);

const OUT_SHORT: Triangle = Triangle::new(10.0, 10.0, 35.0);
const OUT_MEDIUM: Triangle = Triangle::new(25.0, 50.0, 75.0);
const OUT_LONG: Triangle = Triangle::new(65.0, 90.0, 90.0);

/// Rule base: each input set drives exactly one output set.
const RULES: [(Triangle, Triangle); 3] = [
    (IN_LOW, OUT_SHORT),
    (IN_MEDIUM, OUT_MEDIUM),
    (IN_HIGH, OUT_LONG),
];

/// Triangular membership function with breakpoints a <= b <= c. A degenerate
/// edge (a == b or b == c) makes the peak sit on that edge.
#[derive(Debug, Clone, Copy)]
struct Triangle {
    a: f64,
    b: f64,
    c: f64,
}

impl Triangle {
    const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    fn degree(&self, x: f64) -> f64 {
        if x < self.a || x > self.c {
            0.0
        } else if x == self.b {
            1.0
        } else if x < self.b {
            (x - self.a) / (self.b - self.a)
        } else {
            (self.c - x) / (self.c - self.b)
        }
    }
}

/// Result of one inference: the centroid of the aggregated output shape, or
/// the fixed stand-in when the shape degenerates to zero area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DurationOutcome {
    Computed(f64),
    Fallback(f64),
}

impl DurationOutcome {
    pub fn seconds(self) -> f64 {
        match self {
            DurationOutcome::Computed(s) | DurationOutcome::Fallback(s) => s,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, DurationOutcome::Fallback(_))
    }
}

/// Green duration in seconds for a lane with `count` waiting vehicles.
/// Pure and deterministic; full precision, rounding is the caller's concern.
pub fn green_duration(count: u32) -> DurationOutcome {
    let x = f64::from(count.min(COUNT_MAX));

    let mut strengths = [0.0f64; 3];
    for (strength, (input, _)) in strengths.iter_mut().zip(RULES.iter()) {
        *strength = input.degree(x);
    }

    match defuzzify(&strengths) {
        Some(seconds) => DurationOutcome::Computed(seconds),
        None => DurationOutcome::Fallback(FALLBACK_DURATION_S),
    }
}

/// Centroid of the output sets clipped at their rule strengths and combined
/// by element-wise maximum. The aggregate is sampled once per unit of the
/// output universe and integrated piecewise-linearly between neighboring
/// samples. `None` when every strength is zero.
fn defuzzify(strengths: &[f64; 3]) -> Option<f64> {
    if strengths.iter().all(|&s| s == 0.0) {
        return None;
    }

    let mut area = 0.0;
    let mut moment = 0.0;
    let mut left = aggregate(strengths, f64::from(OUT_MIN));
    for y in OUT_MIN..OUT_MAX {
        let right = aggregate(strengths, f64::from(y + 1));
        let segment = 0.5 * (left + right);
        // First moment of the linear segment on [y, y + 1] about the origin.
        moment += f64::from(y) * segment + (left + 2.0 * right) / 6.0;
        area += segment;
        left = right;
    }

    if area == 0.0 {
        None
    } else {
        Some(moment / area)
    }
}

fn aggregate(strengths: &[f64; 3], y: f64) -> f64 {
    let mut mu = 0.0f64;
    for (strength, (_, output)) in strengths.iter().zip(RULES.iter()) {
        mu = mu.max(output.degree(y).min(*strength));
    }
    mu
}
