//! Optimal polygon fitting over extracted pixel paths.
//!
//! Straight-segment pivot bounds limit which chords may replace a run of
//! pixels, a least-squares penalty over integer prefix sums scores each
//! admissible chord, and a shortest path over the resulting DAG picks the
//! vertex sequence minimising (segment count, total penalty)
//! lexicographically. A constrained quadratic solve then places each interior
//! vertex inside the unit box around its path point.

use crate::geometry::{GridPoint, Point};

const EPS: f64 = 1e-8;

#[derive(Debug, Clone, Copy, Default)]
struct Sums {
    x: f64,
    y: f64,
    x2: f64,
    y2: f64,
    xy: f64,
}

type QuadForm = [[f64; 3]; 3];

fn floor_div(a: i64, b: i64) -> i64 {
    if a >= 0 {
        a / b
    } else {
        -1 - (-1 - a) / b
    }
}

/// Index of a step direction in the 4-direction histogram.
fn dir_index(dir: GridPoint) -> usize {
    ((3 + 3 * dir.x + dir.y) / 2) as usize
}

/// For every start index, the furthest path index still reachable by a
/// straight segment that stays within a one-pixel tube around the path.
fn compute_pivots(path: &[GridPoint]) -> Vec<usize> {
    let n = path.len();

    let mut next_corner = vec![0usize; n];
    let mut k = n - 1;
    for i in (0..n).rev() {
        if path[i].x != path[k].x && path[i].y != path[k].y {
            k = i + 1;
        }
        next_corner[i] = k;
    }

    let mut pivot = vec![0i64; n];
    for i in (0..n - 1).rev() {
        let mut dir_count = [0u32; 4];
        dir_count[dir_index(path[i + 1] - path[i])] += 1;

        let mut constraint0 = GridPoint::default();
        let mut constraint1 = GridPoint::default();
        let mut k = next_corner[i];
        let mut k_prev = i;
        loop {
            dir_count[dir_index((path[k] - path[k_prev]).signum())] += 1;

            // Every cardinal direction seen: the tube cannot contain a
            // straight chord any further.
            if dir_count.iter().all(|&count| count > 0) {
                pivot[i] = k_prev as i64;
                break;
            }

            let curr = path[k] - path[i];
            if constraint0.cross(curr) < 0 || constraint1.cross(curr) > 0 {
                // Chord leaves the constraint cone between k_prev and k;
                // intersect it with both constraints by integer division.
                let dk = (path[k] - path[k_prev]).signum();
                let curr = path[k_prev] - path[i];

                let a = constraint0.cross(curr);
                let b = constraint0.cross(dk);
                let c = constraint1.cross(curr);
                let d = constraint1.cross(dk);

                let mut j = i64::MAX;
                if b < 0 {
                    j = floor_div(a, -b);
                }
                if d > 0 {
                    j = j.min(floor_div(-c, d));
                }

                pivot[i] = (k_prev as i64).saturating_add(j);
                break;
            }

            if curr.x.abs() > 1 || curr.y.abs() > 1 {
                let offset = GridPoint::new(
                    curr.x + if curr.y >= 0 && (curr.y > 0 || curr.x < 0) { 1 } else { -1 },
                    curr.y + if curr.x <= 0 && (curr.x < 0 || curr.y < 0) { 1 } else { -1 },
                );
                if constraint0.cross(offset) >= 0 {
                    constraint0 = offset;
                }

                let offset = GridPoint::new(
                    curr.x + if curr.y <= 0 && (curr.y < 0 || curr.x < 0) { 1 } else { -1 },
                    curr.y + if curr.x >= 0 && (curr.x > 0 || curr.y < 0) { 1 } else { -1 },
                );
                if constraint1.cross(offset) <= 0 {
                    constraint1 = offset;
                }
            }

            k_prev = k;
            k = next_corner[k];
            if k_prev == n - 1 {
                pivot[i] = (n - 1) as i64;
                break;
            }
        }
    }

    pivot[n - 1] = (n - 1) as i64;
    let mut pivot: Vec<usize> = pivot
        .into_iter()
        .map(|p| p.clamp(0, (n - 1) as i64) as usize)
        .collect();

    // Weakly-decreasing propagation from the tail keeps the admissibility
    // table consistent between overlapping starts.
    let mut j = pivot[n - 1];
    for i in (0..n - 1).rev() {
        if pivot[i] >= i + 1 && pivot[i] < j {
            j = pivot[i];
        }
        pivot[i] = j;
    }

    pivot
}

fn compute_prefix_sums(path: &[GridPoint]) -> Vec<Sums> {
    let origin = path[0];
    let mut sums = vec![Sums::default(); path.len() + 1];
    for (i, &point) in path.iter().enumerate() {
        let p = point - origin;
        let (x, y) = (p.x as f64, p.y as f64);
        sums[i + 1] = Sums {
            x: sums[i].x + x,
            y: sums[i].y + y,
            x2: sums[i].x2 + x * x,
            y2: sums[i].y2 + y * y,
            xy: sums[i].xy + x * y,
        };
    }
    sums
}

fn range_sums(sums: &[Sums], i: usize, j: usize) -> (f64, f64, f64, f64, f64, f64) {
    let x = sums[j + 1].x - sums[i].x;
    let y = sums[j + 1].y - sums[i].y;
    let x2 = sums[j + 1].x2 - sums[i].x2;
    let y2 = sums[j + 1].y2 - sums[i].y2;
    let xy = sums[j + 1].xy - sums[i].xy;
    let k = (j - i + 1) as f64;
    (x, y, x2, y2, xy, k)
}

/// Orthogonal RMS distance of the path samples in `i..=j` to the chord
/// `path[i] → path[j]`.
fn segment_penalty(path: &[GridPoint], sums: &[Sums], i: usize, j: usize) -> f64 {
    let (x, y, x2, y2, xy, k) = range_sums(sums, i, j);
    let p = (Point::from(path[i]) + Point::from(path[j])) / 2.0 - Point::from(path[0]);
    let ey = (path[j].x - path[i].x) as f64;
    let ex = -((path[j].y - path[i].y) as f64);

    let a = (x2 - 2.0 * x * p.x) / k + p.x * p.x;
    let b = (xy - x * p.y - y * p.x) / k + p.x * p.y;
    let c = (y2 - 2.0 * y * p.y) / k + p.y * p.y;

    (ex * ex * a + 2.0 * ex * ey * b + ey * ey * c).max(0.0).sqrt()
}

fn shortest_sequence(path: &[GridPoint], pivot: &[usize], sums: &[Sums]) -> Vec<usize> {
    let n = path.len();

    let mut clip = vec![0usize; n];
    clip[0] = pivot[0].saturating_sub(1).max(1);
    clip[n - 1] = n - 1;
    for i in 1..n - 1 {
        let mut c = pivot[i - 1].saturating_sub(1);
        if c == n - 2 {
            c = n - 1;
        }
        clip[i] = c.max(i + 1);
    }

    const UNREACHED: u32 = u32::MAX;
    let mut dist: Vec<(u32, f64)> = vec![(UNREACHED, 0.0); n];
    let mut prev: Vec<usize> = vec![0; n];
    dist[0] = (0, 0.0);
    for i in 0..n {
        if dist[i].0 == UNREACHED {
            continue;
        }
        for j in i + 1..=clip[i] {
            let cand = (dist[i].0 + 1, dist[i].1 + segment_penalty(path, sums, i, j));
            if cand.0 < dist[j].0 || (cand.0 == dist[j].0 && cand.1 < dist[j].1) {
                dist[j] = cand;
                prev[j] = i;
            }
        }
    }

    let mut seq = Vec::new();
    let mut i = n - 1;
    while i > 0 {
        seq.push(i);
        i = prev[i];
    }
    seq.push(0);
    seq.reverse();
    seq
}

/// Best-fit line of the path samples in `i..=j`: centroid and unit
/// direction from the smaller-eigenvalue row of the covariance.
fn best_fit_line(sums: &[Sums], i: usize, j: usize) -> (Point, Point) {
    let (x, y, x2, y2, xy, k) = range_sums(sums, i, j);

    let mut a = (x2 - x * x / k) / k;
    let b = (xy - x * y / k) / k;
    let mut c = (y2 - y * y / k) / k;

    let lambda2 = (a + c + ((a - c) * (a - c) + 4.0 * b * b).sqrt()) / 2.0;
    a -= lambda2;
    c -= lambda2;

    let mut dir = Point::default();
    if a.abs() >= c.abs() {
        let l = (a * a + b * b).sqrt();
        if l > EPS {
            dir = Point::new(-b, a) / l;
        }
    } else {
        let l = (c * c + b * b).sqrt();
        if l > EPS {
            dir = Point::new(-c, b) / l;
        }
    }

    (Point::new(x, y) / k, dir)
}

fn apply_quadform(q: &QuadForm, p: Point) -> f64 {
    let v = [p.x, p.y, 1.0];
    let mut sum = 0.0;
    for (row, &vi) in q.iter().zip(&v) {
        for (&cell, &vj) in row.iter().zip(&v) {
            sum += vi * cell * vj;
        }
    }
    sum
}

fn solve_vertices(path: &[GridPoint], seq: &[usize], sums: &[Sums]) -> Vec<Point> {
    let m = seq.len();
    let mut vertices = vec![Point::default(); m];
    vertices[0] = Point::from(path[seq[0]]);
    vertices[m - 1] = Point::from(path[seq[m - 1]]);
    if m <= 2 {
        return vertices;
    }

    // Rank-1 point-to-line distance form of each polygon segment.
    let mut forms = vec![[[0.0f64; 3]; 3]; m - 1];
    for (i, form) in forms.iter_mut().enumerate() {
        let (center, dir) = best_fit_line(sums, seq[i], seq[i + 1]);
        let d = dir.dot(dir);
        if d < EPS {
            continue;
        }

        let vx = dir.y;
        let vy = -dir.x;
        let v = [vx, vy, -vy * center.y - vx * center.x];
        for r in 0..3 {
            for c in 0..3 {
                form[r][c] = v[r] * v[c] / d;
            }
        }
    }

    let origin = Point::from(path[seq[0]]);
    for i in 1..m - 1 {
        let s = Point::from(path[seq[i]]) - origin;

        let mut q = [[0.0f64; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                q[r][c] = forms[i][r][c] + forms[i - 1][r][c];
            }
        }

        let w = loop {
            let det = q[0][0] * q[1][1] - q[0][1] * q[1][0];
            if det.abs() > EPS {
                break Point::new(
                    (-q[0][2] * q[1][1] + q[1][2] * q[0][1]) / det,
                    (q[0][2] * q[1][0] - q[1][2] * q[0][0]) / det,
                );
            }

            // Singular form: add a rank-1 term through the path point along
            // the dominant axis and retry.
            let (vx, vy) = if q[0][0] > q[1][1] {
                (-q[0][1], q[0][0])
            } else if q[1][1].abs() > EPS {
                (-q[1][1], q[1][0])
            } else {
                (1.0, 0.0)
            };
            let d = vx * vx + vy * vy;
            let v = [vx, vy, -vy * s.y - vx * s.x];
            for r in 0..3 {
                for c in 0..3 {
                    q[r][c] += v[r] * v[c] / d;
                }
            }
        };

        if (w.x - s.x).abs() <= 0.5 && (w.y - s.y).abs() <= 0.5 {
            vertices[i] = origin + w;
            continue;
        }

        // Constrained minimum over the unit box: the centre, the two edge
        // points where a partial derivative vanishes, and the four corners.
        let mut min_val = apply_quadform(&q, s);
        let mut min_vec = s;

        if q[0][0].abs() > EPS {
            for z in 0..2 {
                let wy = s.y - 0.5 + z as f64;
                let wx = -(q[0][1] * wy + q[0][2]) / q[0][0];
                let candidate = apply_quadform(&q, Point::new(wx, wy));
                if (wx - s.x).abs() <= 0.5 && candidate < min_val {
                    min_val = candidate;
                    min_vec = Point::new(wx, wy);
                }
            }
        }

        if q[1][1].abs() > EPS {
            for z in 0..2 {
                let wx = s.x - 0.5 + z as f64;
                let wy = -(q[1][0] * wx + q[1][2]) / q[1][1];
                let candidate = apply_quadform(&q, Point::new(wx, wy));
                if (wy - s.y).abs() <= 0.5 && candidate < min_val {
                    min_val = candidate;
                    min_vec = Point::new(wx, wy);
                }
            }
        }

        for dx in 0..2 {
            for dy in 0..2 {
                let corner = Point::new(s.x - 0.5 + dx as f64, s.y - 0.5 + dy as f64);
                let candidate = apply_quadform(&q, corner);
                if candidate < min_val {
                    min_val = candidate;
                    min_vec = corner;
                }
            }
        }

        vertices[i] = origin + min_vec;
    }

    vertices
}

fn debug_assert_simple_path(path: &[GridPoint]) {
    debug_assert!(path
        .windows(2)
        .all(|pair| pair[0].chebyshev(pair[1]) <= 1));
}

/// Vertex index sequence of the optimal polygon: strictly increasing, from
/// 0 to `path.len() - 1`.
pub fn optimal_sequence(path: &[GridPoint]) -> Vec<usize> {
    debug_assert_simple_path(path);
    if path.len() < 2 {
        return (0..path.len()).collect();
    }
    let pivot = compute_pivots(path);
    let sums = compute_prefix_sums(path);
    shortest_sequence(path, &pivot, &sums)
}

/// Fits the optimal polygon and returns its solved vertices.
pub fn fit_polygon(path: &[GridPoint]) -> Vec<Point> {
    debug_assert_simple_path(path);
    if path.len() < 2 {
        return path.iter().map(|&p| Point::from(p)).collect();
    }

    let pivot = compute_pivots(path);
    let sums = compute_prefix_sums(path);
    let seq = shortest_sequence(path, &pivot, &sums);
    solve_vertices(path, &seq, &sums)
}

#[cfg(test)]
mod tests {
    include!("polygon_fitter_tests.rs");
}
