//! PNG image loading and saving.
//!
//! The only module touching the `image` crate. Loading produces the padded
//! float RGB container the detector consumes; saving accepts greyscale or
//! RGB images through the `PngPixel` conversion trait.

use crate::raster::{Image, RgbImage};
use rgb::RGB;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageIoError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),
}

/// Loads an image as float RGB with the requested padding border.
pub fn load(path: &Path, padding: i32) -> Result<RgbImage, ImageIoError> {
    let decoded = image::open(path).map_err(|error| match error {
        image::ImageError::IoError(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
            ImageIoError::FileNotFound(path.to_path_buf())
        }
        other => ImageIoError::Decode(other),
    })?;

    let rgb = decoded.to_rgb8();
    let mut result: RgbImage = Image::new(rgb.width() as i32, rgb.height() as i32, padding);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        result[(x as i32, y as i32)] = RGB::new(
            pixel[0] as f32 / 255.0,
            pixel[1] as f32 / 255.0,
            pixel[2] as f32 / 255.0,
        );
    }
    Ok(result)
}

/// Element types that can be written to an RGB PNG.
pub trait PngPixel: Copy {
    fn to_rgb8(self) -> [u8; 3];
}

impl PngPixel for f32 {
    fn to_rgb8(self) -> [u8; 3] {
        let v = (self * 255.999).clamp(0.0, 255.0) as u8;
        [v, v, v]
    }
}

impl PngPixel for RGB<f32> {
    fn to_rgb8(self) -> [u8; 3] {
        [
            (self.r * 255.999).clamp(0.0, 255.0) as u8,
            (self.g * 255.999).clamp(0.0, 255.0) as u8,
            (self.b * 255.999).clamp(0.0, 255.0) as u8,
        ]
    }
}

/// Saves the interior of the image (the padding border is dropped) as PNG.
pub fn save_as_png<T: PngPixel + Default>(image: &Image<T>, path: &Path) -> Result<(), ImageIoError> {
    let width = image.width();
    let height = image.height();

    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&image[(x, y)].to_rgb8());
        }
    }

    image::save_buffer(
        path,
        &data,
        width as u32,
        height as u32,
        image::ColorType::Rgb8,
    )
    .map_err(ImageIoError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_reports_not_found() {
        let result = load(Path::new("/tmp/definitely-not-here-9c2f1.png"), 2);
        assert!(matches!(result, Err(ImageIoError::FileNotFound(_))));
    }

    #[test]
    fn test_png_pixel_conversion() {
        assert_eq!(1.0f32.to_rgb8(), [255, 255, 255]);
        assert_eq!(0.0f32.to_rgb8(), [0, 0, 0]);
        assert_eq!(RGB::new(1.0, 0.0, 0.5).to_rgb8(), [255, 0, 127]);
        // Out-of-range values clamp instead of wrapping.
        assert_eq!(2.0f32.to_rgb8(), [255, 255, 255]);
        assert_eq!((-1.0f32).to_rgb8(), [0, 0, 0]);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let path = std::env::temp_dir().join("img2bezier_io_test.png");
        let mut img: RgbImage = Image::new(4, 2, 0);
        for y in 0..2 {
            for x in 0..4 {
                img[(x, y)] = RGB::new(x as f32 / 4.0, y as f32 / 2.0, 0.5);
            }
        }
        save_as_png(&img, &path).unwrap();

        let loaded = load(&path, 2).unwrap();
        assert_eq!(loaded.width(), 4);
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.padding(), 2);
        assert!((loaded[(2, 1)].r - 0.5).abs() < 1.0 / 255.0);

        let _ = std::fs::remove_file(&path);
    }
}
