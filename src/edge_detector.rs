//! Adaptive Canny-style edge detection.
//!
//! The chain runs adaptive edge-preserving blur, a structure-tensor colour
//! gradient, directional non-maximum thinning, Otsu threshold selection and
//! connected-component hysteresis, producing a strict {0, 1} edge map.

use crate::geometry::GridPoint;
use crate::kernel::{evaluate_kernel, Kernel};
use crate::raster::{
    BinaryImage, GradientCell, GradientImage, GreyscaleImage, Image, RgbImage,
};
use rgb::RGB;
use std::f32::consts::PI;

// Scharr 5x5 derivative operators.
// https://www.hlevkin.com/hlevkin/47articles/SobelScharrGradients5x5.pdf
pub const GRADIENT_X_KERNEL: Kernel<5> = Kernel::new(
    [
        [-1, -1, 0, 1, 1],
        [-2, -2, 0, 2, 2],
        [-3, -6, 0, 6, 3],
        [-2, -2, 0, 2, 2],
        [-1, -1, 0, 1, 1],
    ],
    60,
);

pub const GRADIENT_Y_KERNEL: Kernel<5> = Kernel::new(
    [
        [-1, -2, -3, -2, -1],
        [-1, -2, -6, -2, -1],
        [0, 0, 0, 0, 0],
        [1, 2, 6, 2, 1],
        [1, 2, 3, 2, 1],
    ],
    60,
);

/// Padding the detector needs on its source image.
pub const PADDING_REQUIREMENT: i32 = 2;

/// Histogram resolution for threshold selection.
const NR_BINS: usize = 256;

fn dot(a: RGB<f32>, b: RGB<f32>) -> f32 {
    a.r * b.r + a.g * b.g + a.b * b.b
}

/// Iterated edge-preserving blur.
///
/// Each of the `kernel_size` outer iterations derives per-pixel weights
/// `exp(-√(√g²) / 2h²)` from the squared colour-gradient magnitude of the
/// current image, then replaces every pixel by the weight-normalised average
/// of its 3×3 neighbourhood `nr_iterations` times. High-gradient pixels get
/// near-zero weight, so edges survive the averaging.
pub fn apply_adaptive_blur(
    image: &RgbImage,
    h: f32,
    kernel_size: u32,
    nr_iterations: u32,
) -> RgbImage {
    debug_assert!(image.padding() >= PADDING_REQUIREMENT);
    let width = image.width();
    let height = image.height();

    let mut result = image.clone();
    for _ in 0..kernel_size {
        let mut weights: GreyscaleImage = Image::new(width, height, 1);
        {
            let source = &result;
            weights.for_each_row_mut(|y, row| {
                for (x, cell) in row.iter_mut().enumerate() {
                    let x = x as i32;
                    let gx = evaluate_kernel(&GRADIENT_X_KERNEL, source, x, y);
                    let gy = evaluate_kernel(&GRADIENT_Y_KERNEL, source, x, y);
                    let g2 = dot(gx, gx) + dot(gy, gy);
                    *cell = (-g2.sqrt().sqrt() / (2.0 * h * h)).exp();
                }
            });
        }

        for _ in 0..nr_iterations {
            let source = result;
            let mut next: RgbImage = Image::new(width, height, PADDING_REQUIREMENT);
            next.for_each_row_mut(|y, row| {
                for (x, cell) in row.iter_mut().enumerate() {
                    let x = x as i32;
                    let mut sum = RGB::new(0.0, 0.0, 0.0);
                    let mut weight_sum = 0.0f32;
                    for j in -1..=1 {
                        for i in -1..=1 {
                            let weight = weights[(x + i, y + j)];
                            sum += source[(x + i, y + j)] * weight;
                            weight_sum += weight;
                        }
                    }
                    *cell = sum / weight_sum;
                }
            });
            result = next;
        }
    }

    result
}

/// Structure-tensor colour gradient.
///
/// The gradient of each channel feeds the 2×2 tensor `[[gx*gx, gx*gy],
/// [gx*gy, gy*gy]]`; the leading eigenvalue carries the squared edge energy
/// and the half-angle form its orientation, folded into [0, π). A second
/// pass normalises magnitudes by the image-wide maximum, so the strongest
/// edge sits at exactly 1.0. A flat image keeps all magnitudes at zero.
pub fn compute_gradient(image: &RgbImage) -> GradientImage {
    let width = image.width();
    let height = image.height();
    let mut result: GradientImage = Image::new(width, height, 1);

    result.for_each_row_mut(|y, row| {
        for (x, cell) in row.iter_mut().enumerate() {
            let x = x as i32;
            let gx = evaluate_kernel(&GRADIENT_X_KERNEL, image, x, y);
            let gy = evaluate_kernel(&GRADIENT_Y_KERNEL, image, x, y);

            let a = dot(gx, gx);
            let b = dot(gx, gy);
            let c = dot(gy, gy);

            let trace = a + c;
            let delta = ((a - c) * (a - c) + 4.0 * b * b).max(0.0);
            let lambda_max = 0.5 * (trace + delta.sqrt());

            const EPS: f32 = 1e-12;
            let mut angle = 0.5 * (2.0 * b).atan2(a - c + EPS);
            if angle < 0.0 {
                angle += PI;
            }

            *cell = GradientCell {
                magnitude: lambda_max.max(0.0).sqrt(),
                angle,
            };
        }
    });

    let max_magnitude = result
        .data()
        .iter()
        .map(|cell| cell.magnitude)
        .fold(0.0f32, f32::max);
    if max_magnitude > 0.0 {
        result.for_each_row_mut(|_, row| {
            for cell in row {
                cell.magnitude /= max_magnitude;
            }
        });
    }

    result
}

/// Directional non-maximum suppression.
///
/// The angle picks one of four scan directions; a magnitude survives only if
/// it strictly exceeds both neighbours along that direction. Border rows and
/// columns are forced to zero.
pub fn thin_edges(image: &GradientImage) -> GreyscaleImage {
    debug_assert!(image.padding() >= 1);
    let width = image.width();
    let height = image.height();
    let mut result: GreyscaleImage = Image::new(width, height, 2);

    result.for_each_row_mut(|y, row| {
        for (x, cell) in row.iter_mut().enumerate() {
            let x = x as i32;
            let angle = image[(x, y)].angle * 180.0 / PI;

            let dir = if angle <= 22.5 || angle >= 157.5 {
                GridPoint::new(1, 0)
            } else if angle < 67.5 {
                GridPoint::new(1, 1)
            } else if angle < 122.5 {
                GridPoint::new(0, 1)
            } else {
                GridPoint::new(-1, 1)
            };

            let g0 = image[(x, y)].magnitude;
            let g1 = image[(x + dir.x, y + dir.y)].magnitude;
            let g2 = image[(x - dir.x, y - dir.y)].magnitude;
            if g0 > g1 && g0 > g2 {
                *cell = g0;
            }
        }
    });

    for x in 0..width {
        result[(x, 0)] = 0.0;
        result[(x, height - 1)] = 0.0;
    }
    for y in 0..height {
        result[(0, y)] = 0.0;
        result[(width - 1, y)] = 0.0;
    }

    result
}

fn build_histogram(image: &GreyscaleImage) -> Vec<u32> {
    let mut bins = vec![0u32; NR_BINS];
    for y in 0..image.height() {
        for x in 0..image.width() {
            let idx = ((image[(x, y)] * NR_BINS as f32) as usize).min(NR_BINS - 1);
            bins[idx] += 1;
        }
    }
    bins
}

/// Two-level Otsu selection over a 256-bin histogram.
///
/// Enumerates every `(tl, th)` cut pair and maximises the three-class
/// inter-class variance. Degenerate histograms (fewer than three occupied
/// classes everywhere) fall back to `(1.0, 1.0)`, which suppresses every
/// pixel downstream.
pub fn compute_threshold(image: &GreyscaleImage) -> (f32, f32) {
    two_level_threshold(&build_histogram(image))
}

fn two_level_threshold(bins: &[u32]) -> (f32, f32) {
    let nr_bins = bins.len();
    let total: u32 = bins.iter().sum();
    if total == 0 {
        return (1.0, 1.0);
    }

    // Prefix sums of probability mass and first moment.
    let mut pref = vec![(0.0f64, 0.0f64); nr_bins + 1];
    for (i, &count) in bins.iter().enumerate() {
        let p = count as f64 / total as f64;
        pref[i + 1] = (pref[i].0 + p, pref[i].1 + p * i as f64);
    }
    let mean = pref[nr_bins].1;

    let mut max_var = 0.0;
    let mut best = None;
    for tl in 1..nr_bins - 1 {
        for th in tl + 1..nr_bins {
            let w1 = pref[tl].0;
            let w2 = pref[th].0 - pref[tl].0;
            let w3 = pref[nr_bins].0 - pref[th].0;
            if w1 == 0.0 || w2 == 0.0 || w3 == 0.0 {
                continue;
            }

            let m1 = pref[tl].1 / w1;
            let m2 = (pref[th].1 - pref[tl].1) / w2;
            let m3 = (pref[nr_bins].1 - pref[th].1) / w3;
            let var = w1 * (m1 - mean) * (m1 - mean)
                + w2 * (m2 - mean) * (m2 - mean)
                + w3 * (m3 - mean) * (m3 - mean);

            if var > max_var {
                max_var = var;
                best = Some((tl, th));
            }
        }
    }

    match best {
        Some((tl, th)) => (tl as f32 / nr_bins as f32, th as f32 / nr_bins as f32),
        None => (1.0, 1.0),
    }
}

/// Single-level Otsu selection; returns `(high/2, high)`.
///
/// A run of equally optimal cuts resolves to its midpoint, so a symmetric
/// bimodal histogram thresholds at the centre rather than at the first tied
/// cut.
pub fn compute_single_threshold(image: &GreyscaleImage) -> (f32, f32) {
    let high = otsu_threshold(&build_histogram(image));
    (high / 2.0, high)
}

fn otsu_threshold(bins: &[u32]) -> f32 {
    let nr_bins = bins.len();
    let total: u32 = bins.iter().sum();
    if total == 0 {
        return 1.0;
    }

    let total_moment: f64 = bins
        .iter()
        .enumerate()
        .map(|(i, &count)| count as f64 / total as f64 * i as f64)
        .sum();

    let mut w0 = 0.0f64;
    let mut m0 = 0.0f64;
    let mut max_var = 0.0f64;
    let mut first = None;
    let mut last = 0;
    for i in 1..nr_bins {
        let p = bins[i - 1] as f64 / total as f64;
        w0 += p;
        m0 += p * (i - 1) as f64;

        let w1 = 1.0 - w0;
        if w0 <= 0.0 || w1 <= 0.0 {
            continue;
        }
        let m1 = total_moment - m0;
        let diff = m1 / w1 - m0 / w0;
        let var = w0 * w1 * diff * diff;

        if var > max_var {
            max_var = var;
            first = Some(i);
            last = i;
        } else if var == max_var && first.is_some() {
            last = i;
        }
    }

    match first {
        Some(first) => ((first + last) / 2) as f32 / nr_bins as f32,
        None => 1.0,
    }
}

/// Hysteresis edge selection with weak-component salvage.
///
/// Pixels at or above `high` are edges outright. Pixels in `[low, high)` are
/// flooded into 8-connected components; a component touching any strong pixel
/// is promoted wholesale. The remaining weak-only components are sorted by
/// descending size and the top `take_percentile` fraction promoted as well,
/// recovering faint but extended structures.
pub fn apply_hysteresis(
    image: &GreyscaleImage,
    low: f32,
    high: f32,
    take_percentile: f32,
) -> BinaryImage {
    const DIRS: [(i32, i32); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];

    debug_assert!(image.padding() >= 1);
    let width = image.width();
    let height = image.height();
    let mut visited: BinaryImage = Image::new(width, height, image.padding());
    let mut result: BinaryImage = Image::new(width, height, 2);
    let mut weak_components: Vec<Vec<GridPoint>> = Vec::new();
    let mut stack: Vec<GridPoint> = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if visited[(x, y)] != 0 {
                continue;
            }
            let value = image[(x, y)];

            if value >= high {
                result[(x, y)] = 1;
            } else if value >= low {
                let mut points = Vec::new();
                let mut found_strong = false;

                stack.push(GridPoint::new(x, y));
                while let Some(p) = stack.pop() {
                    if visited[(p.x, p.y)] != 0 {
                        continue;
                    }
                    visited[(p.x, p.y)] = 1;
                    points.push(p);

                    for (dx, dy) in DIRS {
                        let q = GridPoint::new(p.x + dx, p.y + dy);
                        let neighbour = image[(q.x, q.y)];
                        if !found_strong && neighbour >= high {
                            found_strong = true;
                        }
                        let interior = q.x >= 0 && q.x < width && q.y >= 0 && q.y < height;
                        if !interior
                            || visited[(q.x, q.y)] != 0
                            || neighbour < low
                            || neighbour >= high
                        {
                            continue;
                        }
                        stack.push(q);
                    }
                }

                if found_strong {
                    for p in &points {
                        result[(p.x, p.y)] = 1;
                    }
                } else {
                    weak_components.push(points);
                }
            }
        }
    }

    // Stable sort keeps discovery order between equal sizes, so repeated runs
    // promote identical components.
    weak_components.sort_by(|a, b| b.len().cmp(&a.len()));
    let take_amount = (weak_components.len() as f32 * take_percentile) as usize;
    for component in weak_components.iter().take(take_amount) {
        for p in component {
            result[(p.x, p.y)] = 1;
        }
    }

    result
}

/// Full detection chain with the default blur and salvage parameters.
pub fn detect_edges(image: &RgbImage) -> BinaryImage {
    let blurred = apply_adaptive_blur(image, 1.0, 1, 1);
    let gradient = compute_gradient(&blurred);
    let thinned = thin_edges(&gradient);
    let (low, high) = compute_threshold(&thinned);
    apply_hysteresis(&thinned, low, high, 0.25)
}
