//! Weighted perpendicular-distance fit of a set of lines.
//!
//! Every geometric reconstruction reduces to the same problem: given lines
//! `y = m_i·x + b_i` (each defined by a point `(x_i, y_i)` and slope `m_i`)
//! and weights `w_i`, find the point minimizing
//!
//! ```text
//! Σ w_i · d_i²,    d_i = (m_i·X − Y + b_i) / sqrt(1 + m_i²)
//! ```
//!
//! The objective is quadratic in `(X, Y)`, so we solve the 2×2 normal
//! equations directly. The solver has no failure path of its own: parallel
//! lines make the normal matrix singular (up to rounding) and the result
//! non-finite. Callers reject such geometry beforehand (see
//! [`axes_angle_deg`]) and check the result with
//! [`PerpendicularFit::is_finite`].

use nalgebra::{Matrix2, Vector2};

/// Normal matrices with `|det| <= SINGULAR_EPS · a11 · a22` count as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// One line entering the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub x: f64,
    pub y: f64,
    pub slope: f64,
    pub weight: f64,
}

impl Line {
    pub fn new(x: f64, y: f64, slope: f64, weight: f64) -> Self {
        Self { x, y, slope, weight }
    }

    /// Signed perpendicular distance of `(px, py)` from the line.
    pub fn distance(&self, px: f64, py: f64) -> f64 {
        let b = self.y - self.slope * self.x;
        (self.slope * px - py + b) / (1.0 + self.slope * self.slope).sqrt()
    }
}

/// Best-fit point and the weighted RMS of perpendicular residuals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerpendicularFit {
    pub x: f64,
    pub y: f64,
    pub std: f64,
}

impl PerpendicularFit {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Solve the weighted perpendicular-distance problem.
pub fn perpendicular_fit(lines: &[Line]) -> PerpendicularFit {
    let mut a11 = 0.0;
    let mut a12 = 0.0;
    let mut a22 = 0.0;
    let mut r1 = 0.0;
    let mut r2 = 0.0;
    let mut w_sum = 0.0;

    for l in lines {
        let m = l.slope;
        let c = 1.0 / (1.0 + m * m);
        let b = l.y - m * l.x;
        a11 += l.weight * m * m * c;
        a12 += l.weight * m * c;
        a22 += l.weight * c;
        r1 -= l.weight * m * b * c;
        r2 += l.weight * b * c;
        w_sum += l.weight;
    }

    #[rustfmt::skip]
    let normal = Matrix2::new(
        a11,  -a12,
        -a12, a22,
    );
    let rhs = Vector2::new(r1, r2);

    let singular = normal.determinant().abs() <= SINGULAR_EPS * (a11 * a22).abs();
    let inverse = if singular { None } else { normal.try_inverse() };
    let Some(inv) = inverse else {
        return PerpendicularFit {
            x: f64::NAN,
            y: f64::NAN,
            std: f64::NAN,
        };
    };
    let p = inv * rhs;
    let (x, y) = (p[0], p[1]);

    let mut ss = 0.0;
    for l in lines {
        let d = l.distance(x, y);
        ss += l.weight * d * d;
    }
    let std = if w_sum > 0.0 { (ss / w_sum).sqrt() } else { f64::NAN };

    PerpendicularFit { x, y, std }
}

/// Intersection of two lines (unit weights).
pub fn intersect_two(a: &Line, b: &Line) -> PerpendicularFit {
    perpendicular_fit(&[
        Line::new(a.x, a.y, a.slope, 1.0),
        Line::new(b.x, b.y, b.slope, 1.0),
    ])
}

/// Angle between two image axes given by their slopes, in `[0, 180)` deg.
pub fn axes_angle_deg(slope_a: f64, slope_b: f64) -> f64 {
    (slope_a.atan() - slope_b.atan()).abs().to_degrees()
}

/// Whether an axes angle is within `min_deg` of 0° or 180°.
///
/// Exactly parallel axes are always rejected, even for `min_deg = 0`.
pub fn axes_too_parallel(angle_deg: f64, min_deg: f64) -> bool {
    let min = min_deg.max(1e-9);
    !angle_deg.is_finite() || angle_deg < min || angle_deg > 180.0 - min
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_through(px: f64, py: f64, angle_deg: f64, weight: f64) -> Line {
        Line::new(px, py, angle_deg.to_radians().tan(), weight)
    }

    #[test]
    fn two_lines_meet_at_analytic_intersection() {
        // y = 2x + 1 and y = -x + 4 meet at (1, 3).
        let a = Line::new(0.0, 1.0, 2.0, 1.0);
        let b = Line::new(4.0, 0.0, -1.0, 1.0);
        let fit = intersect_two(&a, &b);
        assert!((fit.x - 1.0).abs() < 1e-12);
        assert!((fit.y - 3.0).abs() < 1e-12);
        assert!(fit.std.abs() < 1e-12);
    }

    #[test]
    fn concurrent_lines_recover_common_point_regardless_of_weights() {
        let (sx, sy) = (2.0, 1.0);
        let lines = vec![
            line_through(sx, sy, 10.0, 1.0),
            line_through(sx, sy, 75.0, 5.0),
            line_through(sx, sy, 140.0, 0.3),
        ];
        // Move the anchor points along their lines; the fit must not care.
        let lines: Vec<Line> = lines
            .into_iter()
            .enumerate()
            .map(|(i, l)| {
                let t = 1.5 * (i as f64 + 1.0);
                Line::new(l.x + t, l.y + l.slope * t, l.slope, l.weight)
            })
            .collect();
        let fit = perpendicular_fit(&lines);
        assert!((fit.x - sx).abs() < 1e-10, "x = {}", fit.x);
        assert!((fit.y - sy).abs() < 1e-10, "y = {}", fit.y);
    }

    #[test]
    fn nearly_vertical_axis_is_handled() {
        let a = line_through(3.0, 0.0, 90.0, 1.0);
        let b = Line::new(0.0, 2.0, 0.0, 1.0);
        let fit = intersect_two(&a, &b);
        assert!((fit.x - 3.0).abs() < 1e-9);
        assert!((fit.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn parallel_lines_give_non_finite_result() {
        let a = Line::new(0.0, 0.0, 0.5, 1.0);
        let b = Line::new(0.0, 1.0, 0.5, 1.0);
        assert!(!intersect_two(&a, &b).is_finite());
    }

    #[test]
    fn many_parallel_lines_give_non_finite_result() {
        // Rounding leaves a tiny non-zero determinant for these slopes.
        for angle in [30.0, 61.7, 17.3] {
            let lines = vec![
                line_through(1.0, 0.5, angle, 250_000.0),
                line_through(1.0, 0.9, angle, 810_000.0),
                line_through(0.3, 0.5, angle, 90_000.0),
            ];
            assert!(!perpendicular_fit(&lines).is_finite(), "angle {angle}");
        }
    }

    #[test]
    fn residual_std_is_weighted_rms() {
        // Three horizontal/vertical lines around the origin, not concurrent.
        let lines = vec![
            Line::new(0.0, 1.0, 0.0, 1.0),
            Line::new(0.0, -1.0, 0.0, 1.0),
            line_through(0.0, 0.0, 90.0, 1.0),
        ];
        let fit = perpendicular_fit(&lines);
        assert!(fit.y.abs() < 1e-9);
        let expected = (2.0_f64 / 3.0).sqrt();
        assert!((fit.std - expected).abs() < 1e-9);
    }

    #[test]
    fn axes_angle_test_rejects_both_ends() {
        let a = 10f64.to_radians().tan();
        let b = 15f64.to_radians().tan();
        let angle = axes_angle_deg(a, b);
        assert!((angle - 5.0).abs() < 1e-9);
        assert!(axes_too_parallel(angle, 10.0));
        assert!(!axes_too_parallel(angle, 2.0));

        let c = (-88f64).to_radians().tan();
        let d = 89f64.to_radians().tan();
        let wide = axes_angle_deg(c, d);
        assert!((wide - 177.0).abs() < 1e-9);
        assert!(axes_too_parallel(wide, 5.0));
        assert!(axes_too_parallel(0.0, 0.0));
    }
}
