//! Easing curves keyed by the chart-format easing ids.
//!
//! Every curve maps progress in `[0, 1]` to eased progress. Back and Elastic
//! curves overshoot that range; callers lerp with the raw result.

use std::f64::consts::PI;

const BACK_C1: f64 = 1.70158;
const BACK_C2: f64 = BACK_C1 * 1.525;
const BACK_C3: f64 = BACK_C1 + 1.0;
const ELASTIC_C4: f64 = (2.0 * PI) / 3.0;
const ELASTIC_C5: f64 = (2.0 * PI) / 4.5;

/// Number of binary-search steps used to invert the bezier x(u) polynomial.
const BEZIER_ITERATIONS: usize = 18;

/// Highest id in the format easing table.
pub const MAX_EASING_ID: i32 = 29;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Easing {
    #[default]
    Linear,
    SineIn,
    SineOut,
    SineInOut,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    QuartIn,
    QuartOut,
    QuartInOut,
    QuintIn,
    QuintOut,
    ExpoIn,
    ExpoOut,
    CircIn,
    CircOut,
    CircInOut,
    BackIn,
    BackOut,
    BackInOut,
    ElasticIn,
    ElasticOut,
    ElasticInOut,
    BounceIn,
    BounceOut,
    BounceInOut,
    /// CSS-style cubic bezier through (0,0), (x1,y1), (x2,y2), (1,1).
    Bezier { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl Easing {
    /// Look up an easing by its table id. Ids 0 and 1 are both linear;
    /// unknown ids fall back to linear.
    pub fn from_id(id: i32) -> Self {
        match id {
            2 => Easing::SineOut,
            3 => Easing::SineIn,
            4 => Easing::QuadOut,
            5 => Easing::QuadIn,
            6 => Easing::SineInOut,
            7 => Easing::QuadInOut,
            8 => Easing::CubicOut,
            9 => Easing::CubicIn,
            10 => Easing::QuartOut,
            11 => Easing::QuartIn,
            12 => Easing::CubicInOut,
            13 => Easing::QuartInOut,
            14 => Easing::QuintOut,
            15 => Easing::QuintIn,
            16 => Easing::ExpoOut,
            17 => Easing::ExpoIn,
            18 => Easing::CircOut,
            19 => Easing::CircIn,
            20 => Easing::BackOut,
            21 => Easing::BackIn,
            22 => Easing::CircInOut,
            23 => Easing::BackInOut,
            24 => Easing::ElasticOut,
            25 => Easing::ElasticIn,
            26 => Easing::BounceOut,
            27 => Easing::BounceIn,
            28 => Easing::BounceInOut,
            29 => Easing::ElasticInOut,
            _ => Easing::Linear,
        }
    }

    pub fn bezier(points: [f64; 4]) -> Self {
        Easing::Bezier {
            x1: points[0],
            y1: points[1],
            x2: points[2],
            y2: points[3],
        }
    }

    /// Evaluate the curve. Input progress is clamped to `[0, 1]`.
    pub fn apply(&self, p: f64) -> f64 {
        let x = p.clamp(0.0, 1.0);
        match *self {
            Easing::Linear => x,
            Easing::SineIn => 1.0 - (x * PI / 2.0).cos(),
            Easing::SineOut => (x * PI / 2.0).sin(),
            Easing::SineInOut => -((PI * x).cos() - 1.0) / 2.0,
            Easing::QuadIn => x * x,
            Easing::QuadOut => 1.0 - (1.0 - x) * (1.0 - x),
            Easing::QuadInOut => {
                if x < 0.5 {
                    2.0 * x * x
                } else {
                    1.0 - (-2.0 * x + 2.0).powi(2) / 2.0
                }
            }
            Easing::CubicIn => x.powi(3),
            Easing::CubicOut => 1.0 - (1.0 - x).powi(3),
            Easing::CubicInOut => {
                if x < 0.5 {
                    4.0 * x.powi(3)
                } else {
                    1.0 - (-2.0 * x + 2.0).powi(3) / 2.0
                }
            }
            Easing::QuartIn => x.powi(4),
            Easing::QuartOut => 1.0 - (1.0 - x).powi(4),
            Easing::QuartInOut => {
                if x < 0.5 {
                    8.0 * x.powi(4)
                } else {
                    1.0 - (-2.0 * x + 2.0).powi(4) / 2.0
                }
            }
            Easing::QuintIn => x.powi(5),
            Easing::QuintOut => 1.0 - (1.0 - x).powi(5),
            Easing::ExpoIn => {
                if x == 0.0 {
                    0.0
                } else {
                    2f64.powf(10.0 * x - 10.0)
                }
            }
            Easing::ExpoOut => {
                if x == 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * x)
                }
            }
            Easing::CircIn => 1.0 - (1.0 - x * x).max(0.0).sqrt(),
            Easing::CircOut => (1.0 - (x - 1.0).powi(2)).max(0.0).sqrt(),
            Easing::CircInOut => {
                if x < 0.5 {
                    (1.0 - (1.0 - (2.0 * x).powi(2)).max(0.0).sqrt()) / 2.0
                } else {
                    ((1.0 - (-2.0 * x + 2.0).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
                }
            }
            Easing::BackIn => BACK_C3 * x.powi(3) - BACK_C1 * x * x,
            Easing::BackOut => 1.0 + BACK_C3 * (x - 1.0).powi(3) + BACK_C1 * (x - 1.0).powi(2),
            Easing::BackInOut => {
                if x < 0.5 {
                    ((2.0 * x).powi(2) * ((BACK_C2 + 1.0) * 2.0 * x - BACK_C2)) / 2.0
                } else {
                    ((2.0 * x - 2.0).powi(2) * ((BACK_C2 + 1.0) * (x * 2.0 - 2.0) + BACK_C2) + 2.0)
                        / 2.0
                }
            }
            Easing::ElasticIn => {
                if x == 0.0 || x == 1.0 {
                    x
                } else {
                    -(2f64.powf(10.0 * x - 10.0)) * ((x * 10.0 - 10.75) * ELASTIC_C4).sin()
                }
            }
            Easing::ElasticOut => {
                if x == 0.0 || x == 1.0 {
                    x
                } else {
                    2f64.powf(-10.0 * x) * ((x * 10.0 - 0.75) * ELASTIC_C4).sin() + 1.0
                }
            }
            Easing::ElasticInOut => {
                if x == 0.0 || x == 1.0 {
                    x
                } else if x < 0.5 {
                    -(2f64.powf(20.0 * x - 10.0) * ((20.0 * x - 11.125) * ELASTIC_C5).sin()) / 2.0
                } else {
                    (2f64.powf(-20.0 * x + 10.0) * ((20.0 * x - 11.125) * ELASTIC_C5).sin()) / 2.0
                        + 1.0
                }
            }
            Easing::BounceIn => 1.0 - bounce_out(1.0 - x),
            Easing::BounceOut => bounce_out(x),
            Easing::BounceInOut => {
                if x < 0.5 {
                    (1.0 - bounce_out(1.0 - 2.0 * x)) / 2.0
                } else {
                    (1.0 + bounce_out(2.0 * x - 1.0)) / 2.0
                }
            }
            Easing::Bezier { x1, y1, x2, y2 } => cubic_bezier_y_for_x(x1, y1, x2, y2, x),
        }
    }
}

fn bounce_out(x: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;
    if x < 1.0 / D1 {
        N1 * x * x
    } else if x < 2.0 / D1 {
        let x = x - 1.5 / D1;
        N1 * x * x + 0.75
    } else if x < 2.5 / D1 {
        let x = x - 2.25 / D1;
        N1 * x * x + 0.9375
    } else {
        let x = x - 2.625 / D1;
        N1 * x * x + 0.984375
    }
}

fn bezier_axis(u: f64, p1: f64, p2: f64) -> f64 {
    let inv = 1.0 - u;
    3.0 * inv * inv * u * p1 + 3.0 * inv * u * u * p2 + u * u * u
}

/// Solve a unit cubic bezier for `y` at horizontal position `x`.
///
/// The x polynomial is monotonic for control x values in `[0, 1]`, so a
/// fixed-step bisection on the curve parameter is enough.
pub fn cubic_bezier_y_for_x(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    for _ in 0..BEZIER_ITERATIONS {
        let mid = (lo + hi) * 0.5;
        if bezier_axis(mid, x1, x2) < x {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    bezier_axis((lo + hi) * 0.5, y1, y2)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn endpoints_are_fixed_for_every_table_curve() {
        for id in 0..=MAX_EASING_ID {
            let e = Easing::from_id(id);
            assert!((e.apply(0.0)).abs() < 1e-6, "id {id} at 0");
            assert!((e.apply(1.0) - 1.0).abs() < 1e-6, "id {id} at 1");
        }
    }

    #[test]
    fn ids_zero_and_one_are_linear() {
        assert_eq!(Easing::from_id(0), Easing::Linear);
        assert_eq!(Easing::from_id(1), Easing::Linear);
    }

    #[test]
    fn unknown_id_falls_back_to_linear() {
        assert_eq!(Easing::from_id(-3), Easing::Linear);
        assert_eq!(Easing::from_id(30), Easing::Linear);
        assert_eq!(Easing::from_id(1000), Easing::Linear);
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(Easing::Linear.apply(-1.0), 0.0);
        assert_eq!(Easing::Linear.apply(2.0), 1.0);
    }

    #[test]
    fn quad_midpoints() {
        assert!((Easing::QuadIn.apply(0.5) - 0.25).abs() < EPS);
        assert!((Easing::QuadOut.apply(0.5) - 0.75).abs() < EPS);
        assert!((Easing::QuadInOut.apply(0.5) - 0.5).abs() < EPS);
    }

    #[test]
    fn sine_in_out_is_symmetric() {
        let a = Easing::SineInOut.apply(0.25);
        let b = Easing::SineInOut.apply(0.75);
        assert!((a + b - 1.0).abs() < EPS);
    }

    #[test]
    fn back_in_undershoots() {
        assert!(Easing::BackIn.apply(0.2) < 0.0);
        assert!(Easing::BackOut.apply(0.8) > 1.0);
    }

    #[test]
    fn bounce_out_stays_in_unit_range() {
        for i in 0..=100 {
            let v = Easing::BounceOut.apply(i as f64 / 100.0);
            assert!((-EPS..=1.0 + EPS).contains(&v));
        }
    }

    #[test]
    fn linear_bezier_matches_identity() {
        let e = Easing::bezier([0.0, 0.0, 1.0, 1.0]);
        for i in 0..=10 {
            let x = i as f64 / 10.0;
            assert!((e.apply(x) - x).abs() < 1e-4, "x={x}");
        }
    }

    #[test]
    fn ease_bezier_is_monotonic() {
        let e = Easing::bezier([0.25, 0.1, 0.25, 1.0]);
        let mut prev = 0.0;
        for i in 1..=50 {
            let v = e.apply(i as f64 / 50.0);
            assert!(v + 1e-6 >= prev);
            prev = v;
        }
    }
}
