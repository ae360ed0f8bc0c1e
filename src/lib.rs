//! img2bezier - traces raster images into cubic Bézier curves
//!
//! The pipeline detects salient edges with an adaptive Canny variant,
//! extracts pixel paths from the edge map, fits optimal polygons in the
//! Potrace style and emits cubic Bézier curves normalised to the unit
//! square.
//!
//! ## Features
//!
//! - **Adaptive blur** with gradient-derived weights for edge preservation
//! - **Structure-tensor gradients** over colour with Otsu threshold selection
//! - **Hysteresis** with weak-component salvage for faint structures
//! - **Potrace-style polygon fitting** and Bézier emission
//! - A stage-cached [`Pipeline`] façade that re-runs only affected stages
//!
//! ## Example
//!
//! ```rust,no_run
//! use img2bezier::{convert, ConvertOptions};
//! use std::path::Path;
//!
//! let options = ConvertOptions {
//!     scale: 2.0,
//!     color: true,
//! };
//!
//! convert(Path::new("input.png"), Path::new("output.png"), &options)
//!     .expect("Conversion failed");
//! ```

pub mod bezier_fitter;
pub mod edge_detector;
pub mod geometry;
pub mod image_io;
pub mod kernel;
pub mod pipeline;
pub mod polygon_fitter;
pub mod raster;
pub mod renderer;
pub mod tracer;

pub use anyhow::Result;
pub use bezier_fitter::{BezierCurve, CurveWithColor};
pub use pipeline::{BackgroundColor, ConfigError, DesmosColor, Pipeline, PipelineConfig};

use log::info;
use rgb::RGB;

/// Options for the one-shot [`convert`] entry point.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Output scale relative to the source dimensions (default: 1.0)
    pub scale: f32,
    /// Render curves in colour sampled from the source (default: false)
    pub color: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            color: false,
        }
    }
}

/// Convert an image file into a PNG rendering of its traced curves.
///
/// # Arguments
///
/// * `input_path` - Path to the input image file
/// * `output_path` - Path to the output PNG file
/// * `options` - Conversion options
pub fn convert(
    input_path: &std::path::Path,
    output_path: &std::path::Path,
    options: &ConvertOptions,
) -> Result<()> {
    if !(options.scale > 0.0) {
        anyhow::bail!("scale must be positive, got {}", options.scale);
    }

    let source = image_io::load(input_path, edge_detector::PADDING_REQUIREMENT)?;
    info!(
        "loaded {}x{} image from {}",
        source.width(),
        source.height(),
        input_path.display()
    );

    let edges = edge_detector::detect_edges(&source);
    let curves = tracer::trace(&edges);
    info!("traced {} curves", curves.len());

    let width = (source.width() as f32 * options.scale) as i32;
    let height = (source.height() as f32 * options.scale) as i32;

    if options.color {
        let colored: Vec<CurveWithColor> = curves
            .iter()
            .map(|&curve| CurveWithColor {
                color: renderer::compute_curve_color(&curve, &source),
                curve,
            })
            .collect();
        let plot = renderer::render_color(width, height, &colored, RGB::new(0.0, 0.0, 0.0));
        image_io::save_as_png(&plot, output_path)?;
    } else {
        let colored: Vec<CurveWithColor> = curves
            .iter()
            .map(|&curve| CurveWithColor {
                color: RGB::new(0.0, 0.0, 0.0),
                curve,
            })
            .collect();
        let plot = renderer::render_greyscale(width, height, &colored, 0.0);
        image_io::save_as_png(&plot, output_path)?;
    }

    info!("wrote {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_options_default() {
        let options = ConvertOptions::default();
        assert_eq!(options.scale, 1.0);
        assert!(!options.color);
    }

    #[test]
    fn test_convert_rejects_bad_scale() {
        let options = ConvertOptions {
            scale: 0.0,
            color: false,
        };
        let result = convert(
            std::path::Path::new("missing.png"),
            std::path::Path::new("out.png"),
            &options,
        );
        assert!(result.is_err());
    }
}
