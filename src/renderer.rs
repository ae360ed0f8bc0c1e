//! Curve rasterisation for previews and colour sampling.
//!
//! Lines use Wu's antialiased algorithm; cubics are flattened with an
//! adaptive parameter step derived from their second differences. Plot
//! buffers carry padding and every write is bounds-checked, so curves that
//! stray slightly outside the canvas are clipped rather than rejected.

use crate::bezier_fitter::{BezierCurve, CurveWithColor};
use crate::geometry::Point;
use crate::raster::{GreyscaleImage, Image, RgbImage};
use rgb::RGB;

/// Wu antialiased line from `p1` to `p2`; `plot(x, y, coverage)` receives
/// pixel coordinates still in f64 form.
fn draw_line<F: FnMut(f64, f64, f32)>(p1: Point, p2: Point, plot: &mut F) {
    let i_part = |x: f64| x.floor();
    let round = |x: f64| (x + 0.5).floor();
    let f_part = |x: f64| x - x.floor();
    let rf_part = |x: f64| 1.0 - f_part(x);

    let (mut x0, mut y0, mut x1, mut y1) = (p1.x, p1.y, p2.x, p2.y);
    let steep = (y1 - y0).abs() > (x1 - x0).abs();
    if steep {
        std::mem::swap(&mut x0, &mut y0);
        std::mem::swap(&mut x1, &mut y1);
    }
    if x0 > x1 {
        std::mem::swap(&mut x0, &mut x1);
        std::mem::swap(&mut y0, &mut y1);
    }

    let dx = x1 - x0;
    let dy = y1 - y0;
    let gradient = if dx == 0.0 { 1.0 } else { dy / dx };

    let mut xend = round(x0);
    let mut yend = y0 + gradient * (xend - x0);
    let mut xgap = rf_part(x0 + 0.5);
    let xpxl1 = xend;
    let ypxl1 = i_part(yend);
    if steep {
        plot(ypxl1, xpxl1, (rf_part(yend) * xgap) as f32);
        plot(ypxl1 + 1.0, xpxl1, (f_part(yend) * xgap) as f32);
    } else {
        plot(xpxl1, ypxl1, (rf_part(yend) * xgap) as f32);
        plot(xpxl1, ypxl1 + 1.0, (f_part(yend) * xgap) as f32);
    }

    let mut intery = yend + gradient;
    xend = round(x1);
    yend = y1 + gradient * (xend - x1);
    xgap = f_part(x1 + 0.5);
    let xpxl2 = xend;
    let ypxl2 = i_part(yend);
    if steep {
        plot(ypxl2, xpxl2, (rf_part(yend) * xgap) as f32);
        plot(ypxl2 + 1.0, xpxl2, (f_part(yend) * xgap) as f32);
    } else {
        plot(xpxl2, ypxl2, (rf_part(yend) * xgap) as f32);
        plot(xpxl2, ypxl2 + 1.0, (f_part(yend) * xgap) as f32);
    }

    let mut x = xpxl1 + 1.0;
    while x <= xpxl2 - 1.0 {
        if steep {
            plot(i_part(intery), x, rf_part(intery) as f32);
            plot(i_part(intery) + 1.0, x, f_part(intery) as f32);
        } else {
            plot(x, i_part(intery), rf_part(intery) as f32);
            plot(x, i_part(intery) + 1.0, f_part(intery) as f32);
        }
        intery += gradient;
        x += 1.0;
    }
}

/// Flattens the cubic with step `ε = √(8δ / dd)` (δ = 0.1, dd six times the
/// larger second-difference norm), clamped to a single step for short
/// curves, and draws a line per step.
fn draw_curve<F: FnMut(f64, f64, f32)>(curve: &BezierCurve, plot: &mut F) {
    let BezierCurve { p0, p1, p2, p3 } = *curve;

    let square = |v: f64| v * v;
    let delta = 0.1;
    let dd0 = square(p0.x - 2.0 * p1.x + p2.x) + square(p0.y - 2.0 * p1.y + p2.y);
    let dd1 = square(p1.x - 2.0 * p2.x + p3.x) + square(p1.y - 2.0 * p2.y + p3.y);
    let dd = 6.0 * dd0.max(dd1).sqrt();
    let e2 = if 8.0 * delta <= dd { 8.0 * delta / dd } else { 1.0 };
    let epsilon = e2.sqrt();

    let mut prev = p0;
    let mut t = epsilon;
    while t < 1.0 {
        let curr = curve.evaluate(t);
        draw_line(prev, curr, plot);
        prev = curr;
        t += epsilon;
    }
    draw_line(prev, p3, plot);
}

/// Renders the normalised curves into a greyscale plot. Curves blend toward
/// `1 - background`, so they read on both black and white canvases.
pub fn render_greyscale(
    width: i32,
    height: i32,
    curves: &[CurveWithColor],
    background: f32,
) -> GreyscaleImage {
    let mut result: GreyscaleImage = Image::new(width, height, 2);
    result.fill(background);
    let ink = 1.0 - background;

    for item in curves {
        let mut curve = item.curve;
        curve.scale(width as f64);

        draw_curve(&curve, &mut |x, y, coverage| {
            let (xi, yi) = (x as i32, y as i32);
            if result.contains(xi, yi) {
                let value = result[(xi, yi)];
                result[(xi, yi)] = value + (ink - value) * coverage;
            }
        });
    }

    result
}

/// Renders the normalised curves in their sampled colours over a solid
/// background.
pub fn render_color(
    width: i32,
    height: i32,
    curves: &[CurveWithColor],
    background: RGB<f32>,
) -> RgbImage {
    let mut result: RgbImage = Image::new(width, height, 2);
    result.fill(background);

    for item in curves {
        let mut curve = item.curve;
        curve.scale(width as f64);
        let color = item.color;

        draw_curve(&curve, &mut |x, y, coverage| {
            let (xi, yi) = (x as i32, y as i32);
            if result.contains(xi, yi) {
                let value = result[(xi, yi)];
                result[(xi, yi)] = value + (color - value) * coverage;
            }
        });
    }

    result
}

/// Coverage-weighted average of the source colours under the curve. The
/// curve arrives in normalised coordinates and is scaled by the image width.
pub fn compute_curve_color(curve: &BezierCurve, image: &RgbImage) -> RGB<f32> {
    let mut scaled = *curve;
    scaled.scale(image.width() as f64);

    let mut color_sum = RGB::new(0.0f32, 0.0, 0.0);
    let mut weight_sum = 0.0f32;
    draw_curve(&scaled, &mut |x, y, coverage| {
        let (xi, yi) = (x as i32, y as i32);
        if image.contains(xi, yi) {
            color_sum += image[(xi, yi)] * coverage;
            weight_sum += coverage;
        }
    });

    if weight_sum > 0.0 {
        color_sum / weight_sum
    } else {
        RGB::new(0.0, 0.0, 0.0)
    }
}
