#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::raster::{GradientCell, GradientImage, GreyscaleImage, Image, RgbImage};
    use rgb::RGB;

    fn solid_image(width: i32, height: i32, value: f32) -> RgbImage {
        let mut img: RgbImage = Image::new(width, height, PADDING_REQUIREMENT);
        for y in 0..height {
            for x in 0..width {
                img[(x, y)] = RGB::new(value, value, value);
            }
        }
        img
    }

    // A step edge with slightly sloped shoulders. The slope breaks the
    // mirror symmetry of the gradient profile across the step, which would
    // otherwise tie the two straddling maxima and let strict non-maximum
    // suppression erase both.
    fn vertical_step_image(width: i32, height: i32) -> RgbImage {
        let mut img: RgbImage = Image::new(width, height, PADDING_REQUIREMENT);
        for y in 0..height {
            for x in 0..width {
                let value = if x < width / 2 {
                    0.01 * x as f32
                } else {
                    0.95 - 0.005 * x as f32
                };
                img[(x, y)] = RGB::new(value, value, value);
            }
        }
        img
    }

    #[test]
    fn test_blur_keeps_flat_image_flat() {
        let img = solid_image(8, 8, 0.5);
        let blurred = apply_adaptive_blur(&img, 1.0, 1, 1);
        for y in 0..8 {
            for x in 0..8 {
                // Interior pixels average identical neighbours.
                if x > 0 && x < 7 && y > 0 && y < 7 {
                    assert!((blurred[(x, y)].r - 0.5).abs() < 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_blur_output_padding_matches_kernel_radius() {
        let img = solid_image(4, 4, 0.25);
        let blurred = apply_adaptive_blur(&img, 1.0, 2, 2);
        assert_eq!(blurred.padding(), PADDING_REQUIREMENT);
        assert_eq!(blurred.width(), 4);
        assert_eq!(blurred.height(), 4);
    }

    #[test]
    fn test_gradient_peak_magnitude_is_one() {
        let img = vertical_step_image(16, 16);
        let gradient = compute_gradient(&img);
        let max = gradient
            .data()
            .iter()
            .map(|c| c.magnitude)
            .fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_of_flat_image_is_zero() {
        let img = solid_image(8, 8, 0.7);
        let gradient = compute_gradient(&img);
        for cell in gradient.data() {
            assert_eq!(cell.magnitude, 0.0);
        }
    }

    #[test]
    fn test_gradient_angle_in_half_turn() {
        let img = vertical_step_image(16, 16);
        let gradient = compute_gradient(&img);
        for cell in gradient.data() {
            assert!(cell.angle >= 0.0 && cell.angle < std::f32::consts::PI + 1e-6);
        }
    }

    #[test]
    fn test_thinning_keeps_single_ridge_of_vertical_edge() {
        let img = vertical_step_image(16, 16);
        let gradient = compute_gradient(&img);
        let thinned = thin_edges(&gradient);
        // Along each interior row at most one ridge pixel survives per
        // direction flip; the step at width/2 must survive somewhere.
        let mut survivors = 0;
        for y in 4..12 {
            for x in 0..16 {
                if thinned[(x, y)] > 0.0 {
                    survivors += 1;
                }
            }
        }
        assert!(survivors > 0);
    }

    #[test]
    fn test_thinning_is_idempotent() {
        let img = vertical_step_image(16, 16);
        let gradient = compute_gradient(&img);
        let once = thin_edges(&gradient);

        // Rebuild gradient cells from the thinned magnitudes with unchanged
        // angles and thin again.
        let mut rebuilt: GradientImage = Image::new(16, 16, 1);
        for y in 0..16 {
            for x in 0..16 {
                rebuilt[(x, y)] = GradientCell {
                    magnitude: once[(x, y)],
                    angle: gradient[(x, y)].angle,
                };
            }
        }
        let twice = thin_edges(&rebuilt);
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(once[(x, y)], twice[(x, y)], "pixel ({x}, {y}) changed");
            }
        }
    }

    #[test]
    fn test_thinning_preserves_diagonal_ridge() {
        // Single-pixel diagonal stroke: the gradient points across the
        // stroke, so thinning scans the (-1, 1) direction and keeps it.
        let mut gradient: GradientImage = Image::new(32, 32, 1);
        for i in 0..32 {
            gradient[(i, i)] = GradientCell {
                magnitude: 1.0,
                angle: 135.0f32.to_radians(),
            };
        }
        let thinned = thin_edges(&gradient);
        for i in 2..30 {
            assert_eq!(thinned[(i, i)], 1.0);
            assert_eq!(thinned[(i + 1, i)], 0.0);
            assert_eq!(thinned[(i, i + 1)], 0.0);
        }
    }

    #[test]
    fn test_thinning_zeroes_monotone_ramp() {
        let mut gradient: GradientImage = Image::new(256, 1, 1);
        for x in 0..256 {
            gradient[(x, 0)] = GradientCell {
                magnitude: x as f32 / 255.0,
                angle: 0.0,
            };
        }
        let thinned = thin_edges(&gradient);
        for x in 0..256 {
            assert_eq!(thinned[(x, 0)], 0.0);
        }
    }

    #[test]
    fn test_otsu_bimodal_histogram_splits_in_middle() {
        let mut bins = vec![0u32; 256];
        bins[0] = 100;
        bins[255] = 100;
        let high = otsu_threshold(&bins);
        assert!((high - 0.5).abs() <= 1.0 / 256.0);
    }

    #[test]
    fn test_otsu_clear_bimodal_histogram() {
        let mut bins = vec![0u32; 256];
        bins[40] = 500;
        bins[200] = 500;
        let high = otsu_threshold(&bins);
        assert!(high > 40.0 / 256.0 && high <= 200.0 / 256.0);
    }

    #[test]
    fn test_two_level_threshold_orders_cuts() {
        let mut bins = vec![0u32; 256];
        bins[10] = 300;
        bins[128] = 300;
        bins[250] = 300;
        let (low, high) = two_level_threshold(&bins);
        assert!(low > 0.0 && low < high && high <= 1.0);
        assert!(low > 10.0 / 256.0 && low <= 128.0 / 256.0);
        assert!(high > 128.0 / 256.0 && high <= 250.0 / 256.0);
    }

    #[test]
    fn test_two_level_threshold_degenerate_histogram() {
        let bins = vec![0u32; 256];
        assert_eq!(two_level_threshold(&bins), (1.0, 1.0));

        let mut single = vec![0u32; 256];
        single[0] = 64;
        assert_eq!(two_level_threshold(&single), (1.0, 1.0));
    }

    #[test]
    fn test_single_threshold_halves_low() {
        let mut img: GreyscaleImage = Image::new(4, 4, 2);
        for y in 0..4 {
            for x in 0..4 {
                img[(x, y)] = if (x + y) % 2 == 0 { 0.1 } else { 0.9 };
            }
        }
        let (low, high) = compute_single_threshold(&img);
        assert!((low - high / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_hysteresis_promotes_weak_component_touching_strong() {
        let mut img: GreyscaleImage = Image::new(8, 8, 2);
        img[(1, 1)] = 0.9; // strong
        img[(2, 1)] = 0.3; // weak chain
        img[(3, 1)] = 0.3;
        img[(6, 6)] = 0.3; // isolated weak pixel
        let result = apply_hysteresis(&img, 0.25, 0.5, 0.0);
        assert_eq!(result[(1, 1)], 1);
        assert_eq!(result[(2, 1)], 1);
        assert_eq!(result[(3, 1)], 1);
        assert_eq!(result[(6, 6)], 0);
    }

    #[test]
    fn test_hysteresis_salvages_largest_weak_components() {
        // Twenty disconnected weak runs of sizes 1..=20 and no strong
        // pixels; a quarter of them (the five largest) must be promoted.
        let mut img: GreyscaleImage = Image::new(32, 48, 2);
        for size in 1..=20 {
            let y = 2 * size;
            for x in 0..size {
                img[(x, y)] = 0.3;
            }
        }
        let result = apply_hysteresis(&img, 0.25, 0.5, 0.25);

        let mut promoted = 0;
        for y in 0..48 {
            for x in 0..32 {
                promoted += result[(x, y)] as u32;
            }
        }
        assert_eq!(promoted, 16 + 17 + 18 + 19 + 20);

        // The size-15 run stays suppressed, the size-16 run survives.
        assert_eq!(result[(0, 30)], 0);
        assert_eq!(result[(0, 32)], 1);
    }

    #[test]
    fn test_hysteresis_is_deterministic() {
        let img = vertical_step_image(24, 24);
        let gradient = compute_gradient(&img);
        let thinned = thin_edges(&gradient);
        let a = apply_hysteresis(&thinned, 0.2, 0.5, 0.25);
        let b = apply_hysteresis(&thinned, 0.2, 0.5, 0.25);
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_hysteresis_diagonal_survives() {
        let mut thinned: GreyscaleImage = Image::new(32, 32, 2);
        for i in 1..31 {
            thinned[(i, i)] = 1.0;
        }
        let result = apply_hysteresis(&thinned, 0.25, 0.5, 0.0);
        for i in 1..31 {
            assert_eq!(result[(i, i)], 1);
        }
    }

    #[test]
    fn test_detect_edges_on_blank_image_is_empty() {
        let img = solid_image(4, 4, 1.0);
        let edges = detect_edges(&img);
        assert!(edges.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_detect_edges_finds_square_outline() {
        // Slightly sloped background so the boundary gradient has a unique
        // maximum on every scan line.
        let mut img = solid_image(16, 16, 0.0);
        for y in 0..16 {
            for x in 0..16 {
                let value = if (4..12).contains(&x) && (4..12).contains(&y) {
                    0.05
                } else {
                    0.8 + 0.005 * (x + y) as f32
                };
                img[(x, y)] = RGB::new(value, value, value);
            }
        }
        let edges = detect_edges(&img);
        let count: u32 = edges.data().iter().map(|&v| v as u32).sum();
        assert!(count > 0, "square boundary should produce edges");
    }
}
