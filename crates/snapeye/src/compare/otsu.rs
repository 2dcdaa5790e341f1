//! Otsu's automatic threshold over an 8-bit gray image.

use image::{GrayImage, Luma};

/// Level that maximises the between-class variance of the two pixel classes
/// `<= level` and `> level`.
///
/// Ties keep the lowest level. A histogram with a single occupied bin yields 0.
pub fn otsu_level(image: &GrayImage) -> u8 {
    let mut hist = [0u64; 256];
    for p in image.pixels() {
        hist[p.0[0] as usize] += 1;
    }

    let total = f64::from(image.width()) * f64::from(image.height());
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut best_level = 0u8;
    let mut best_variance = 0.0f64;
    let mut weight_bg = 0.0f64;
    let mut sum_bg = 0.0f64;

    for (level, &count) in hist.iter().enumerate() {
        weight_bg += count as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }

        sum_bg += level as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;

        let between = weight_bg * weight_fg * (mean_bg - mean_fg) * (mean_bg - mean_fg);
        if between > best_variance {
            best_variance = between;
            best_level = level as u8;
        }
    }

    best_level
}

/// Inverted binary threshold: 255 where the pixel is at or below `level`, 0 above.
pub fn threshold_inverted(image: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] > level {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_values(values: &[u8]) -> GrayImage {
        GrayImage::from_raw(values.len() as u32, 1, values.to_vec()).unwrap()
    }

    #[test]
    fn bimodal_level_falls_between_clusters() {
        let mut values: Vec<u8> = (0..50).collect();
        values.extend((0..50).map(|i| 200 + (i % 56) as u8));
        let level = otsu_level(&from_values(&values));
        assert!((49..200).contains(&level), "otsu level was {level}");
    }

    #[test]
    fn two_level_image_splits_at_zero() {
        let level = otsu_level(&from_values(&[0, 0, 255, 0, 255]));
        assert_eq!(level, 0);
    }

    #[test]
    fn uniform_image_yields_zero() {
        assert_eq!(otsu_level(&from_values(&[255; 16])), 0);
        assert_eq!(otsu_level(&from_values(&[7; 16])), 0);
    }

    #[test]
    fn inverted_threshold_marks_low_pixels() {
        let out = threshold_inverted(&from_values(&[0, 10, 11, 255]), 10);
        assert_eq!(out.as_raw(), &vec![255, 255, 0, 0]);
    }
}
