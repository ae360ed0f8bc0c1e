// Integration tests for img2bezier
use img2bezier::pipeline::Pipeline;
use img2bezier::{convert, ConvertOptions};
use std::fs;
use std::path::PathBuf;

// Create a simple test image programmatically
fn create_test_png(path: &PathBuf, width: u32, height: u32, pattern: &str) {
    let mut pixel_data: Vec<u8> = Vec::with_capacity((width * height * 4) as usize);

    for y in 0..height {
        for x in 0..width {
            let (r, g, b) = match pattern {
                "square" => {
                    let inset = width / 4;
                    let inside = x >= inset
                        && x < width - inset
                        && y >= inset
                        && y < height - inset;
                    if inside { (0, 0, 0) } else { (255, 255, 255) }
                }
                "circle" => {
                    let cx = width as i32 / 2;
                    let cy = height as i32 / 2;
                    let radius = (width.min(height) / 4) as i32;
                    let dx = x as i32 - cx;
                    let dy = y as i32 - cy;
                    if dx * dx + dy * dy < radius * radius {
                        (200, 40, 40)
                    } else {
                        (255, 255, 255)
                    }
                }
                "solid" => (255, 255, 255),
                _ => (255, 255, 255),
            };
            pixel_data.push(r);
            pixel_data.push(g);
            pixel_data.push(b);
            pixel_data.push(255);
        }
    }

    let img: image::RgbaImage = image::ImageBuffer::from_raw(width, height, pixel_data).unwrap();
    img.save(path).expect("Failed to save test image");
}

#[test]
fn test_convert_square_image() {
    let test_img = std::env::temp_dir().join("img2bezier_square.png");
    let test_out = std::env::temp_dir().join("img2bezier_square_out.png");

    create_test_png(&test_img, 32, 32, "square");

    let options = ConvertOptions::default();
    convert(&test_img, &test_out, &options).expect("conversion failed");

    assert!(test_out.exists());
    let rendered = image::open(&test_out).expect("output should decode").to_rgb8();
    assert_eq!(rendered.width(), 32);
    assert_eq!(rendered.height(), 32);

    let _ = fs::remove_file(&test_img);
    let _ = fs::remove_file(&test_out);
}

#[test]
fn test_convert_respects_scale() {
    let test_img = std::env::temp_dir().join("img2bezier_scale.png");
    let test_out = std::env::temp_dir().join("img2bezier_scale_out.png");

    create_test_png(&test_img, 32, 32, "square");

    let options = ConvertOptions {
        scale: 2.0,
        color: false,
    };
    convert(&test_img, &test_out, &options).expect("conversion failed");

    let rendered = image::open(&test_out).expect("output should decode").to_rgb8();
    assert_eq!(rendered.width(), 64);
    assert_eq!(rendered.height(), 64);

    let _ = fs::remove_file(&test_img);
    let _ = fs::remove_file(&test_out);
}

#[test]
fn test_convert_color_mode() {
    let test_img = std::env::temp_dir().join("img2bezier_color.png");
    let test_out = std::env::temp_dir().join("img2bezier_color_out.png");

    create_test_png(&test_img, 48, 48, "circle");

    let options = ConvertOptions {
        scale: 1.0,
        color: true,
    };
    convert(&test_img, &test_out, &options).expect("conversion failed");

    assert!(test_out.exists());
    let rendered = image::open(&test_out).expect("output should decode").to_rgb8();
    assert_eq!(rendered.width(), 48);

    let _ = fs::remove_file(&test_img);
    let _ = fs::remove_file(&test_out);
}

#[test]
fn test_convert_blank_image_renders_background_only() {
    let test_img = std::env::temp_dir().join("img2bezier_blank.png");
    let test_out = std::env::temp_dir().join("img2bezier_blank_out.png");

    create_test_png(&test_img, 16, 16, "solid");

    convert(&test_img, &test_out, &ConvertOptions::default()).expect("conversion failed");

    let rendered = image::open(&test_out).expect("output should decode").to_rgb8();
    assert!(rendered.pixels().all(|p| p[0] == 0 && p[1] == 0 && p[2] == 0));

    let _ = fs::remove_file(&test_img);
    let _ = fs::remove_file(&test_out);
}

#[test]
fn test_convert_missing_input_fails() {
    let result = convert(
        &PathBuf::from("/tmp/img2bezier_no_such_input.png"),
        &PathBuf::from("/tmp/img2bezier_no_such_output.png"),
        &ConvertOptions::default(),
    );
    assert!(result.is_err());
    let message = format!("{}", result.unwrap_err());
    assert!(message.contains("not found"), "unexpected error: {message}");
}

#[test]
fn test_pipeline_matches_source_dimensions() {
    use img2bezier::raster::{Image, RgbaImage};
    use rgb::RGBA;

    // Sloped background keeps the boundary gradient maxima unique.
    let mut source: RgbaImage = Image::new(24, 24, 0);
    for y in 0..24 {
        for x in 0..24 {
            let v = if (8..16).contains(&x) && (8..16).contains(&y) {
                0.05
            } else {
                0.75 + 0.004 * (x + y) as f32
            };
            source[(x, y)] = RGBA::new(v, v, v, 1.0);
        }
    }

    let mut pipeline = Pipeline::new();
    pipeline.set_source_image(source);

    assert_eq!(pipeline.source_image().width(), 24);
    assert_eq!(pipeline.blurred_image().width(), 24);
    assert_eq!(pipeline.gradient_image().width(), 24);
    assert_eq!(pipeline.thinned_image().width(), 24);
    assert_eq!(pipeline.hysteresis_image().width(), 24);
    assert_eq!(pipeline.greyscale_plot().width(), 24);
    assert_eq!(pipeline.color_plot().width(), 24);

    let (low, high) = pipeline.threshold();
    assert!(low <= high);
    assert!(!pipeline.curves().is_empty());
}
