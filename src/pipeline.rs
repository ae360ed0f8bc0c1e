//! Stage-cached tracing pipeline.
//!
//! The engine form of the tracer: a linear chain of stages
//! (Blur → Gradient → Thinning → Threshold → Hysteresis → Tracing →
//! Plotting) where each stage remembers the config fields it consumed and
//! recomputes only when its inputs or those fields change. Every
//! intermediate image is exposed together with a 4-byte-per-pixel RGBA view
//! for host runtimes.

use crate::bezier_fitter::CurveWithColor;
use crate::edge_detector;
use crate::raster::{GradientCell, Image, RgbImage, RgbaImage};
use crate::renderer;
use crate::tracer;
use log::debug;
use rgb::{RGB, RGBA};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackgroundColor {
    #[default]
    Black,
    White,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DesmosColor {
    Solid,
    #[default]
    Colorful,
}

/// Tunable parameters of the pipeline. Stages consume disjoint subsets, so
/// changing a late-stage field re-runs only the stages after it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Outer blur iterations (weights are recomputed each time).
    pub kernel_size: u32,
    /// Inner blur iterations per weight computation.
    pub nr_iterations: u32,
    /// Fraction of weak-only hysteresis components to salvage.
    pub take_percentile: f32,
    /// Output rendering scale relative to the source dimensions.
    pub plot_scale: f32,
    pub background_color: BackgroundColor,
    /// Curve colouring mode for downstream consumers; no stage reads it.
    pub desmos_color: DesmosColor,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            kernel_size: 1,
            nr_iterations: 1,
            take_percentile: 0.25,
            plot_scale: 1.0,
            background_color: BackgroundColor::Black,
            desmos_color: DesmosColor::Colorful,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("kernel_size must be a positive odd integer, got {0}")]
    KernelSize(u32),
    #[error("nr_iterations must be at least 1")]
    NrIterations,
    #[error("take_percentile must lie in [0, 1], got {0}")]
    TakePercentile(f32),
    #[error("plot_scale must be positive, got {0}")]
    PlotScale(f32),
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(ConfigError::KernelSize(self.kernel_size));
        }
        if self.nr_iterations == 0 {
            return Err(ConfigError::NrIterations);
        }
        if !(0.0..=1.0).contains(&self.take_percentile) {
            return Err(ConfigError::TakePercentile(self.take_percentile));
        }
        if !(self.plot_scale > 0.0) {
            return Err(ConfigError::PlotScale(self.plot_scale));
        }
        Ok(())
    }
}

/// RGBA byte encoding of an image element.
pub trait RgbaBytes: Copy {
    fn to_rgba(self) -> [u8; 4];
}

fn clamp_byte(value: f32) -> u8 {
    (value * 255.0).clamp(0.0, 255.0) as u8
}

impl RgbaBytes for f32 {
    fn to_rgba(self) -> [u8; 4] {
        let v = clamp_byte(self);
        [v, v, v, 255]
    }
}

impl RgbaBytes for GradientCell {
    fn to_rgba(self) -> [u8; 4] {
        let v = clamp_byte(self.magnitude);
        [v, v, v, 255]
    }
}

impl RgbaBytes for u8 {
    fn to_rgba(self) -> [u8; 4] {
        let v = if self != 0 { 255 } else { 0 };
        [v, v, v, 255]
    }
}

impl RgbaBytes for RGB<f32> {
    fn to_rgba(self) -> [u8; 4] {
        [clamp_byte(self.r), clamp_byte(self.g), clamp_byte(self.b), 255]
    }
}

impl RgbaBytes for RGBA<f32> {
    fn to_rgba(self) -> [u8; 4] {
        [
            clamp_byte(self.r),
            clamp_byte(self.g),
            clamp_byte(self.b),
            clamp_byte(self.a),
        ]
    }
}

/// An image plus its RGBA byte view, kept in sync on construction.
#[derive(Debug, Clone)]
pub struct RawImage<T> {
    image: Image<T>,
    bytes: Vec<u8>,
}

pub type RawRgbaImage = RawImage<RGBA<f32>>;
pub type RawRgbImage = RawImage<RGB<f32>>;
pub type RawGradientImage = RawImage<GradientCell>;
pub type RawGreyscaleImage = RawImage<f32>;
pub type RawBinaryImage = RawImage<u8>;

impl<T: Copy + Default> Default for RawImage<T> {
    fn default() -> Self {
        Self {
            image: Image::new(0, 0, 0),
            bytes: Vec::new(),
        }
    }
}

impl<T: Copy + Default + RgbaBytes> RawImage<T> {
    pub fn new(image: Image<T>) -> Self {
        let mut bytes = Vec::with_capacity((image.width() * image.height() * 4) as usize);
        for y in 0..image.height() {
            for x in 0..image.width() {
                bytes.extend_from_slice(&image[(x, y)].to_rgba());
            }
        }
        Self { image, bytes }
    }
}

impl<T: Copy + Default> RawImage<T> {
    pub fn width(&self) -> i32 {
        self.image.width()
    }

    pub fn height(&self) -> i32 {
        self.image.height()
    }

    pub fn empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn image(&self) -> &Image<T> {
        &self.image
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.image.clear();
        self.bytes.clear();
    }
}

#[derive(Default)]
struct BlurStage {
    result: RawRgbImage,
    kernel_size: u32,
    nr_iterations: u32,
    runs: u64,
}

impl BlurStage {
    fn update(&mut self, source: &RawRgbImage, config: &PipelineConfig, dirty: bool) -> bool {
        if dirty
            || config.kernel_size != self.kernel_size
            || config.nr_iterations != self.nr_iterations
        {
            self.kernel_size = config.kernel_size;
            self.nr_iterations = config.nr_iterations;
            const H: f32 = 1.0;
            debug!("recomputing blur stage");
            self.result = RawImage::new(edge_detector::apply_adaptive_blur(
                source.image(),
                H,
                self.kernel_size,
                self.nr_iterations,
            ));
            self.runs += 1;
            return true;
        }
        false
    }
}

#[derive(Default)]
struct GradientStage {
    result: RawGradientImage,
    runs: u64,
}

impl GradientStage {
    fn update(&mut self, blurred: &RawRgbImage, dirty: bool) -> bool {
        if dirty {
            debug!("recomputing gradient stage");
            self.result = RawImage::new(edge_detector::compute_gradient(blurred.image()));
            self.runs += 1;
            return true;
        }
        false
    }
}

#[derive(Default)]
struct ThinningStage {
    result: RawGreyscaleImage,
    runs: u64,
}

impl ThinningStage {
    fn update(&mut self, gradient: &RawGradientImage, dirty: bool) -> bool {
        if dirty {
            debug!("recomputing thinning stage");
            self.result = RawImage::new(edge_detector::thin_edges(gradient.image()));
            self.runs += 1;
            return true;
        }
        false
    }
}

#[derive(Default)]
struct ThresholdStage {
    tl: f32,
    th: f32,
    runs: u64,
}

impl ThresholdStage {
    fn update(&mut self, thinned: &RawGreyscaleImage, dirty: bool) -> bool {
        if dirty {
            (self.tl, self.th) = edge_detector::compute_threshold(thinned.image());
            debug!("recomputed thresholds: low {}, high {}", self.tl, self.th);
            self.runs += 1;
            return true;
        }
        false
    }
}

struct HysteresisStage {
    result: RawBinaryImage,
    take_percentile: f32,
    runs: u64,
}

impl Default for HysteresisStage {
    fn default() -> Self {
        Self {
            result: RawImage::default(),
            take_percentile: -1.0,
            runs: 0,
        }
    }
}

impl HysteresisStage {
    fn update(
        &mut self,
        thinned: &RawGreyscaleImage,
        tl: f32,
        th: f32,
        config: &PipelineConfig,
        dirty: bool,
    ) -> bool {
        if dirty || config.take_percentile != self.take_percentile {
            self.take_percentile = config.take_percentile;
            debug!("recomputing hysteresis stage");
            self.result = RawImage::new(edge_detector::apply_hysteresis(
                thinned.image(),
                tl,
                th,
                self.take_percentile,
            ));
            self.runs += 1;
            return true;
        }
        false
    }
}

#[derive(Default)]
struct TracingStage {
    curves: Vec<CurveWithColor>,
    runs: u64,
}

impl TracingStage {
    fn update(&mut self, hysteresis: &RawBinaryImage, source: &RawRgbImage, dirty: bool) -> bool {
        if dirty {
            debug!("recomputing tracing stage");
            self.curves = tracer::trace(hysteresis.image())
                .into_iter()
                .map(|curve| CurveWithColor {
                    color: renderer::compute_curve_color(&curve, source.image()),
                    curve,
                })
                .collect();
            self.runs += 1;
            return true;
        }
        false
    }
}

#[derive(Default)]
struct PlottingStage {
    greyscale_plot: RawGreyscaleImage,
    color_plot: RawRgbImage,
    plot_scale: f32,
    background_color: BackgroundColor,
    runs: u64,
}

impl PlottingStage {
    fn update(
        &mut self,
        curves: &[CurveWithColor],
        source: &RawRgbImage,
        config: &PipelineConfig,
        dirty: bool,
    ) -> bool {
        if dirty
            || config.plot_scale != self.plot_scale
            || config.background_color != self.background_color
        {
            self.plot_scale = config.plot_scale;
            self.background_color = config.background_color;

            let plot_width = (source.width() as f32 * self.plot_scale) as i32;
            let plot_height = (source.height() as f32 * self.plot_scale) as i32;
            debug!("recomputing plots at {plot_width}x{plot_height}");

            let grey_background = match self.background_color {
                BackgroundColor::Black => 0.0,
                BackgroundColor::White => 1.0,
            };
            self.greyscale_plot = RawImage::new(renderer::render_greyscale(
                plot_width,
                plot_height,
                curves,
                grey_background,
            ));

            let color_background = match self.background_color {
                BackgroundColor::Black => RGB::new(0.0, 0.0, 0.0),
                BackgroundColor::White => RGB::new(1.0, 1.0, 1.0),
            };
            self.color_plot = RawImage::new(renderer::render_color(
                plot_width,
                plot_height,
                curves,
                color_background,
            ));

            self.runs += 1;
            return true;
        }
        false
    }
}

/// The stage-cached pipeline façade.
#[derive(Default)]
pub struct Pipeline {
    config: PipelineConfig,
    source_rgba: RawRgbaImage,
    source_rgb: RawRgbImage,

    blur: BlurStage,
    gradient: GradientStage,
    thinning: ThinningStage,
    threshold: ThresholdStage,
    hysteresis: HysteresisStage,
    tracing: TracingStage,
    plotting: PlottingStage,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_image(&self) -> &RawRgbaImage {
        &self.source_rgba
    }

    pub fn blurred_image(&self) -> &RawRgbImage {
        &self.blur.result
    }

    pub fn gradient_image(&self) -> &RawGradientImage {
        &self.gradient.result
    }

    pub fn thinned_image(&self) -> &RawGreyscaleImage {
        &self.thinning.result
    }

    /// Selected `(low, high)` thresholds.
    pub fn threshold(&self) -> (f32, f32) {
        (self.threshold.tl, self.threshold.th)
    }

    pub fn hysteresis_image(&self) -> &RawBinaryImage {
        &self.hysteresis.result
    }

    /// Traced curves with control points in [0, 1]² and colours sampled
    /// from the source.
    pub fn curves(&self) -> &[CurveWithColor] {
        &self.tracing.curves
    }

    pub fn greyscale_plot(&self) -> &RawGreyscaleImage {
        &self.plotting.greyscale_plot
    }

    pub fn color_plot(&self) -> &RawRgbImage {
        &self.plotting.color_plot
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    /// Recompute counters in stage order, for diagnostics and tests.
    pub fn stage_runs(&self) -> [u64; 7] {
        [
            self.blur.runs,
            self.gradient.runs,
            self.thinning.runs,
            self.threshold.runs,
            self.hysteresis.runs,
            self.tracing.runs,
            self.plotting.runs,
        ]
    }

    /// Replaces the source image and re-runs the whole chain.
    pub fn set_source_image(&mut self, image: RgbaImage) {
        let mut rgb: RgbImage = Image::new(
            image.width(),
            image.height(),
            edge_detector::PADDING_REQUIREMENT,
        );
        for y in 0..image.height() {
            for x in 0..image.width() {
                let color = image[(x, y)];
                rgb[(x, y)] = RGB::new(color.r, color.g, color.b);
            }
        }

        self.source_rgba = RawImage::new(image);
        self.source_rgb = RawImage::new(rgb);
        self.run_pipeline(true);
    }

    /// Validates and applies a config, re-running only the stages whose
    /// consumed fields changed.
    pub fn set_config(&mut self, config: PipelineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        self.run_pipeline(false);
        Ok(())
    }

    fn run_pipeline(&mut self, mut dirty: bool) {
        if self.source_rgba.width() == 0 || self.source_rgba.height() == 0 {
            self.blur.result.clear();
            self.gradient.result.clear();
            self.thinning.result.clear();
            self.threshold.tl = 0.0;
            self.threshold.th = 0.0;
            self.hysteresis.result.clear();
            self.tracing.curves.clear();
            self.plotting.greyscale_plot.clear();
            self.plotting.color_plot.clear();
            return;
        }

        dirty = self.blur.update(&self.source_rgb, &self.config, dirty);
        dirty = self.gradient.update(&self.blur.result, dirty);
        dirty = self.thinning.update(&self.gradient.result, dirty);
        dirty = self.threshold.update(&self.thinning.result, dirty);
        dirty = self.hysteresis.update(
            &self.thinning.result,
            self.threshold.tl,
            self.threshold.th,
            &self.config,
            dirty,
        );
        dirty = self.tracing.update(&self.hysteresis.result, &self.source_rgb, dirty);
        self.plotting
            .update(&self.tracing.curves, &self.source_rgb, &self.config, dirty);
    }
}
