//! Padded image containers.
//!
//! Every image carries a zero-initialised border of `padding` cells on each
//! side, so kernel evaluations and neighbourhood reads near the edge stay in
//! bounds without per-pixel branching. Indexing is `image[(x, y)]` with
//! `-padding <= x < width + padding` and likewise for `y`.

use rayon::prelude::*;
use rgb::{RGB, RGBA};
use std::ops::{Index, IndexMut};

/// One gradient sample: magnitude in [0, 1], angle folded into [0, π).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GradientCell {
    pub magnitude: f32,
    pub angle: f32,
}

/// Rectangular pixel grid with a zero-initialised padding border.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    width: i32,
    height: i32,
    padding: i32,
    data: Vec<T>,
}

pub type GreyscaleImage = Image<f32>;
pub type GradientImage = Image<GradientCell>;
pub type RgbImage = Image<RGB<f32>>;
pub type RgbaImage = Image<RGBA<f32>>;
pub type BinaryImage = Image<u8>;

impl<T: Copy + Default> Image<T> {
    pub fn new(width: i32, height: i32, padding: i32) -> Self {
        debug_assert!(width >= 0 && height >= 0 && padding >= 0);
        let stride = (width + 2 * padding) as usize;
        let rows = (height + 2 * padding) as usize;
        Self {
            width,
            height,
            padding,
            data: vec![T::default(); stride * rows],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn padding(&self) -> i32 {
        self.padding
    }

    /// Whole padded buffer in row-major order, border cells included.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Resets every cell, border included, to the default value.
    pub fn clear(&mut self) {
        for cell in &mut self.data {
            *cell = T::default();
        }
    }

    /// Sets every cell, border included, to `value`.
    pub fn fill(&mut self, value: T) {
        for cell in &mut self.data {
            *cell = value;
        }
    }

    /// True when `(x, y)` falls inside the padded buffer.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= -self.padding
            && x < self.width + self.padding
            && y >= -self.padding
            && y < self.height + self.padding
    }

    fn index_of(&self, x: i32, y: i32) -> usize {
        debug_assert!(self.contains(x, y), "pixel ({x}, {y}) outside padded image");
        let stride = self.width + 2 * self.padding;
        (stride * (y + self.padding) + (x + self.padding)) as usize
    }
}

impl<T: Copy + Default + Send> Image<T> {
    /// Runs `f` over every interior row in parallel, handing it the row index
    /// and the interior cells of that row. Each output pixel must depend only
    /// on data outside `self`, which keeps the result identical to a
    /// sequential sweep.
    pub fn for_each_row_mut<F>(&mut self, f: F)
    where
        F: Fn(i32, &mut [T]) + Send + Sync,
    {
        let stride = (self.width + 2 * self.padding) as usize;
        let pad = self.padding as usize;
        let width = self.width as usize;
        if stride == 0 {
            return;
        }
        self.data
            .par_chunks_mut(stride)
            .skip(pad)
            .take(self.height as usize)
            .enumerate()
            .for_each(|(y, row)| f(y as i32, &mut row[pad..pad + width]));
    }
}

impl<T: Copy + Default> Index<(i32, i32)> for Image<T> {
    type Output = T;

    fn index(&self, (x, y): (i32, i32)) -> &T {
        &self.data[self.index_of(x, y)]
    }
}

impl<T: Copy + Default> IndexMut<(i32, i32)> for Image<T> {
    fn index_mut(&mut self, (x, y): (i32, i32)) -> &mut T {
        let index = self.index_of(x, y);
        &mut self.data[index]
    }
}
