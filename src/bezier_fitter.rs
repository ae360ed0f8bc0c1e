//! Cubic Bézier emission from polygon vertices.
//!
//! Each vertex triple yields one cubic whose bulge follows the
//! parallelogram-area heuristic; flat triples fall back to two straight-line
//! curves through the middle vertex.

use crate::geometry::Point;
use rgb::RGB;

const EPS: f64 = 1e-8;

/// A cubic Bézier curve by its four control points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierCurve {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
    pub p3: Point,
}

impl BezierCurve {
    pub fn new(p0: Point, p1: Point, p2: Point, p3: Point) -> Self {
        Self { p0, p1, p2, p3 }
    }

    /// Straight segment expressed as a cubic.
    pub fn line(p0: Point, p3: Point) -> Self {
        let m = (p0 + p3) / 2.0;
        Self::new(p0, m, m, p3)
    }

    pub fn scale(&mut self, scale: f64) {
        self.p0 = self.p0 * scale;
        self.p1 = self.p1 * scale;
        self.p2 = self.p2 * scale;
        self.p3 = self.p3 * scale;
    }

    /// Point at parameter `t` in [0, 1].
    pub fn evaluate(&self, t: f64) -> Point {
        let mt = 1.0 - t;
        self.p0 * (mt * mt * mt)
            + self.p1 * (3.0 * mt * mt * t)
            + self.p2 * (3.0 * mt * t * t)
            + self.p3 * (t * t * t)
    }
}

/// A curve together with the colour sampled for it from the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveWithColor {
    pub curve: BezierCurve,
    pub color: RGB<f32>,
}

fn denom(p0: Point, p2: Point) -> f64 {
    let d = p2 - p0;
    let r = Point::new(-d.signum().y, d.signum().x);
    r.y * d.x - r.x * d.y
}

fn area_parallelogram(p0: Point, p1: Point, p2: Point) -> f64 {
    (p1 - p0).cross(p2 - p0)
}

/// Emits the cubic curves of a solved vertex chain.
///
/// Curve `i` spans the midpoints of segments `i` and `i+1` (endpoints are
/// pinned to the chain ends). The α parameter measures how far the middle
/// vertex bulges relative to its chord; α ≥ 1 means the triple is too flat
/// for a single cubic and splits into two straight segments instead.
pub fn fit_curves(vertices: &[Point]) -> Vec<BezierCurve> {
    let m = vertices.len();
    let mut curves = Vec::new();
    if m < 2 {
        return curves;
    }
    if m == 2 {
        curves.push(BezierCurve::line(vertices[0], vertices[1]));
        return curves;
    }

    for i in 0..=m - 3 {
        let j = i + 1;
        let k = i + 2;

        let mut p0 = (vertices[i] + vertices[j]) / 2.0;
        let mut p3 = (vertices[k] + vertices[j]) / 2.0;
        if i == 0 {
            p0 = vertices[0];
        }
        if i == m - 3 {
            p3 = vertices[m - 1];
        }

        let den = denom(vertices[i], vertices[k]);
        let mut alpha = 4.0 / 3.0;
        if den > EPS {
            let dd = (area_parallelogram(vertices[i], vertices[j], vertices[k]) / den).abs();
            alpha = if dd > 1.0 { 1.0 - 1.0 / dd } else { 0.0 };
            alpha /= 0.75;
        }

        if alpha >= 1.0 {
            curves.push(BezierCurve::line(p0, vertices[j]));
            curves.push(BezierCurve::line(vertices[j], p3));
        } else {
            let alpha_min = 4.0 * (2.0f64.sqrt() - 1.0) / 3.0;
            let alpha = alpha.clamp(alpha_min, 1.0);
            let t = 0.5 + 0.5 * alpha;
            let p1 = vertices[i] + (vertices[j] - vertices[i]) * t;
            let p2 = vertices[k] + (vertices[j] - vertices[k]) * t;
            curves.push(BezierCurve::new(p0, p1, p2, p3));
        }
    }

    curves
}
