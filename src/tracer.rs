//! Path extraction from the binary edge map.
//!
//! The edge map is first repaired (T-junctions broken up so a greedy walk
//! cannot stall), then traversed with a direction-aligned neighbour order:
//! from every unvisited edge pixel a corner search walks to a path endpoint,
//! and a second walk from that endpoint records the pixel path, inserting
//! link pixels so consecutive points never jump more than one cell.

use crate::bezier_fitter::{self, BezierCurve};
use crate::geometry::GridPoint;
use crate::polygon_fitter;
use crate::raster::{BinaryImage, Image};
use log::debug;

const DISK_RADIUS: i32 = 2;
const PATH_LENGTH_THRESHOLD: usize = 5;

/// Neighbour visit order for each arrival direction in the radius-2 disk.
struct DirectionTable {
    table: Vec<Vec<GridPoint>>,
}

impl DirectionTable {
    fn new() -> Self {
        let mut dirs = Vec::new();
        for x in -DISK_RADIUS..=DISK_RADIUS {
            for y in -DISK_RADIUS..=DISK_RADIUS {
                if x * x + y * y <= DISK_RADIUS * DISK_RADIUS {
                    dirs.push(GridPoint::new(x, y));
                }
            }
        }

        let side = (2 * DISK_RADIUS + 1) as usize;
        let mut table = vec![Vec::new(); side * side];
        for &dir in &dirs {
            let mut aligned: Vec<GridPoint> = dirs
                .iter()
                .copied()
                .filter(|&v| v != GridPoint::default() && dir.dot(v) >= 0)
                .collect();

            // Prefer closer, then better-aligned neighbours. The null
            // direction has no alignment and degenerates to a distance sort.
            let dir_length = (dir.length_sq() as f32).sqrt();
            aligned.sort_by(|&a, &b| {
                let key = |v: GridPoint| {
                    const EPS: f32 = 1e-8;
                    let length = (v.length_sq() as f32).sqrt();
                    let alignment = dir.dot(v) as f32 / (dir_length * length + EPS);
                    (length, -alignment)
                };
                let ka = key(a);
                let kb = key(b);
                ka.0.total_cmp(&kb.0).then(ka.1.total_cmp(&kb.1))
            });

            table[Self::index(dir)] = aligned;
        }

        Self { table }
    }

    fn index(dir: GridPoint) -> usize {
        let side = 2 * DISK_RADIUS + 1;
        (side * (dir.y + DISK_RADIUS) + (dir.x + DISK_RADIUS)) as usize
    }

    fn neighbours(&self, dir: GridPoint) -> &[GridPoint] {
        &self.table[Self::index(dir)]
    }
}

/// Rewrites "T" junctions: a tail pixel perpendicular to a run of three
/// collinear pixels is folded into the run centre, provided the tail has no
/// other neighbours. All four rotations of the template are applied against
/// a snapshot, so rewrites cannot cascade within a pass.
pub fn fix_image(img: &BinaryImage) -> BinaryImage {
    debug_assert!(img.padding() >= 2);
    let mut result = img.clone();

    for y in 0..img.height() {
        for x in 0..img.width() {
            if img[(x + 1, y)] != 0 && img[(x - 1, y)] != 0 {
                if img[(x, y + 1)] != 0
                    && img[(x, y + 2)] == 0
                    && img[(x + 1, y + 1)] == 0
                    && img[(x - 1, y + 1)] == 0
                {
                    result[(x, y)] = 1;
                    result[(x, y + 1)] = 0;
                }

                if img[(x, y - 1)] != 0
                    && img[(x, y - 2)] == 0
                    && img[(x + 1, y - 1)] == 0
                    && img[(x - 1, y - 1)] == 0
                {
                    result[(x, y)] = 1;
                    result[(x, y - 1)] = 0;
                }
            } else if img[(x, y + 1)] != 0 && img[(x, y - 1)] != 0 {
                if img[(x + 1, y)] != 0
                    && img[(x + 2, y)] == 0
                    && img[(x + 1, y + 1)] == 0
                    && img[(x + 1, y - 1)] == 0
                {
                    result[(x, y)] = 1;
                    result[(x + 1, y)] = 0;
                }

                if img[(x - 1, y)] != 0
                    && img[(x - 2, y)] == 0
                    && img[(x - 1, y + 1)] == 0
                    && img[(x - 1, y - 1)] == 0
                {
                    result[(x, y)] = 1;
                    result[(x - 1, y)] = 0;
                }
            }
        }
    }

    result
}

struct PathFinder<'a> {
    image: &'a BinaryImage,
    visited: BinaryImage,
    directions: DirectionTable,
}

impl<'a> PathFinder<'a> {
    fn new(image: &'a BinaryImage) -> Self {
        Self {
            image,
            visited: Image::new(image.width(), image.height(), DISK_RADIUS),
            directions: DirectionTable::new(),
        }
    }

    /// First admissible unvisited edge pixel around `v`, in the visit order
    /// of the arrival direction.
    fn next_step(&self, v: GridPoint, arrival: GridPoint) -> Option<GridPoint> {
        for &dir in self.directions.neighbours(arrival) {
            let u = v + dir;
            if self.visited[(u.x, u.y)] == 0 && self.image[(u.x, u.y)] != 0 {
                return Some(u);
            }
        }
        None
    }

    /// Greedy walk to a path endpoint. The walk marks pixels to avoid
    /// cycling and unwinds every mark before returning, leaving `visited`
    /// untouched overall.
    fn search_corner(&mut self, start: GridPoint) -> GridPoint {
        let mut chain = Vec::new();
        let mut v = start;
        let mut prev: Option<GridPoint> = None;

        loop {
            self.visited[(v.x, v.y)] = 1;
            chain.push(v);

            let arrival = match prev {
                Some(p) => v - p,
                None => GridPoint::default(),
            };
            match self.next_step(v, arrival) {
                Some(u) => {
                    prev = Some(v);
                    v = u;
                }
                None => break,
            }
        }

        for p in chain {
            self.visited[(p.x, p.y)] = 0;
        }
        v
    }

    /// Appends `v`, first inserting a link pixel when the step jumps a cell
    /// or cuts a diagonal, so the recorded path moves one cell at a time.
    fn append_point(&self, path: &mut Vec<GridPoint>, v: GridPoint) {
        let prev = match path.last() {
            Some(&p) => p,
            None => v,
        };

        if v.chebyshev(prev) > 1 {
            path.push((prev + v) / 2);
        } else if prev.x != v.x && prev.y != v.y {
            if path.len() > 1 {
                let dir = prev - path[path.len() - 2];
                let next = prev + dir * 2;
                if self.image[(next.x, next.y)] != 0 {
                    path.push(v - dir);
                } else {
                    path.push(prev + dir);
                }
            } else {
                path.push(GridPoint::new(prev.x, v.y));
            }
        }
        path.push(v);
    }

    /// Greedy walk recording the path; `visited` marks stay set.
    fn search_path(&mut self, start: GridPoint) -> Vec<GridPoint> {
        let mut path = Vec::new();
        let mut v = start;
        let mut prev: Option<GridPoint> = None;

        loop {
            self.visited[(v.x, v.y)] = 1;
            self.append_point(&mut path, v);

            let arrival = match prev {
                Some(p) => v - p,
                None => GridPoint::default(),
            };
            match self.next_step(v, arrival) {
                Some(u) => {
                    prev = Some(v);
                    v = u;
                }
                None => break,
            }
        }

        path
    }

    fn find_paths(&mut self) -> Vec<Vec<GridPoint>> {
        let mut paths = Vec::new();

        for y in 0..self.image.height() {
            for x in 0..self.image.width() {
                // A traced path need not pass through (x, y) itself; repeat
                // until the pixel is consumed.
                while self.visited[(x, y)] == 0 {
                    if self.image[(x, y)] == 0 {
                        break;
                    }

                    let corner = self.search_corner(GridPoint::new(x, y));
                    let path = self.search_path(corner);
                    if path.len() > PATH_LENGTH_THRESHOLD {
                        paths.push(path);
                    }
                }
            }
        }

        paths
    }
}

/// Repairs the edge map and extracts every pixel path longer than the
/// minimum length.
pub fn extract_paths(image: &BinaryImage) -> Vec<Vec<GridPoint>> {
    let fixed = fix_image(image);
    PathFinder::new(&fixed).find_paths()
}

/// Traces the binary edge map into cubic Bézier curves with control points
/// normalised by the image width.
pub fn trace(image: &BinaryImage) -> Vec<BezierCurve> {
    let paths = extract_paths(image);
    debug!("extracted {} paths from {}x{} edge map", paths.len(), image.width(), image.height());

    let mut curves = Vec::new();
    for path in &paths {
        let vertices = polygon_fitter::fit_polygon(path);
        curves.extend(bezier_fitter::fit_curves(&vertices));
    }

    if image.width() > 0 {
        let scale = 1.0 / image.width() as f64;
        for curve in &mut curves {
            curve.scale(scale);
        }
    }

    curves
}
