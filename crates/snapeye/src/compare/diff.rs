use image::{GrayImage, Luma, RgbImage};
use thiserror::Error;
use tracing::debug;

use super::{gray, otsu};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompareError {
    #[error(
        "width or height of the images are not the same: \
         baseline is {baseline_w}x{baseline_h}, actual is {actual_w}x{actual_h}"
    )]
    ShapeMismatch {
        baseline_w: u32,
        baseline_h: u32,
        actual_w: u32,
        actual_h: u32,
    },
}

/// Knobs for a single comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Percent of differing pixels (0-100) still classified as "same".
    pub tolerance_percent: f64,
    /// Also diff `actual - baseline`, not just `baseline - actual`.
    pub two_sided: bool,
    /// Keep the raw gray difference intensities in the result.
    pub debug_masks: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            tolerance_percent: 0.0,
            two_sided: true,
            debug_masks: false,
        }
    }
}

/// Binary per-pixel map: 255 where the pair differs, 0 where it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceMask(GrayImage);

impl DifferenceMask {
    fn empty(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Build from an inverted-threshold image, where 255 marks a match.
    fn from_matches(matches: &GrayImage) -> Self {
        Self(GrayImage::from_fn(matches.width(), matches.height(), |x, y| {
            if matches.get_pixel(x, y).0[0] == 255 {
                Luma([0])
            } else {
                Luma([255])
            }
        }))
    }

    fn union(&self, other: &Self) -> Self {
        Self(GrayImage::from_fn(self.width(), self.height(), |x, y| {
            Luma([self.0.get_pixel(x, y).0[0] | other.0.get_pixel(x, y).0[0]])
        }))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y).0[0] != 0
    }

    /// Number of differing cells.
    pub fn count(&self) -> u64 {
        self.0.pixels().filter(|p| p.0[0] != 0).count() as u64
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }
}

/// Gray difference intensities before binarization.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugMasks {
    /// `baseline - actual`.
    pub removed: GrayImage,
    /// `actual - baseline`, only when diffing both directions.
    pub added: Option<GrayImage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub percent_different: f64,
    pub is_different: bool,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    /// Union of every direction; this is what the percentage counts.
    pub mask: DifferenceMask,
    /// Where the baseline carries content the actual lost.
    pub removed: DifferenceMask,
    /// Where the actual carries content the baseline lacks. `None` when single-sided.
    pub added: Option<DifferenceMask>,
    pub debug: Option<DebugMasks>,
}

/// Compare `actual` against `baseline`.
///
/// Steps, per direction:
/// 1. Saturating per-channel subtraction
/// 2. Gray reduction
/// 3. Any nonzero intensity forced to 255
/// 4. Otsu threshold with inverted polarity
///
/// Pure and synchronous: the same inputs always give the same result.
pub fn compare(
    baseline: &RgbImage,
    actual: &RgbImage,
    options: &DiffOptions,
) -> Result<ComparisonResult, CompareError> {
    if baseline.dimensions() != actual.dimensions() {
        return Err(CompareError::ShapeMismatch {
            baseline_w: baseline.width(),
            baseline_h: baseline.height(),
            actual_w: actual.width(),
            actual_h: actual.height(),
        });
    }

    let (w, h) = baseline.dimensions();
    let total_pixels = u64::from(w) * u64::from(h);

    // Byte-identical fast path.
    if baseline.as_raw() == actual.as_raw() {
        debug!(width = w, height = h, "byte-identical images");
        let empty = DifferenceMask::empty(w, h);
        let debug_masks = options.debug_masks.then(|| DebugMasks {
            removed: GrayImage::new(w, h),
            added: options.two_sided.then(|| GrayImage::new(w, h)),
        });
        return Ok(ComparisonResult {
            percent_different: 0.0,
            is_different: false,
            diff_pixels: 0,
            total_pixels,
            mask: empty.clone(),
            removed: empty.clone(),
            added: options.two_sided.then_some(empty),
            debug: debug_masks,
        });
    }

    let removed_gray = gray::subtract_to_gray(baseline, actual);
    let removed = direction_mask(&removed_gray);

    let added_gray = options
        .two_sided
        .then(|| gray::subtract_to_gray(actual, baseline));
    let added = added_gray.as_ref().map(direction_mask);

    let mask = match &added {
        Some(added) => removed.union(added),
        None => removed.clone(),
    };

    let diff_pixels = mask.count();
    let percent_different = if total_pixels > 0 {
        (diff_pixels as f64 * 100.0) / total_pixels as f64
    } else {
        0.0
    };
    let is_different = percent_different > options.tolerance_percent;
    debug!(
        diff_pixels,
        total_pixels,
        percent = %format!("{percent_different:.5}"),
        is_different,
        "compared"
    );

    let debug_masks = options.debug_masks.then(|| DebugMasks {
        removed: removed_gray,
        added: added_gray,
    });

    Ok(ComparisonResult {
        percent_different,
        is_different,
        diff_pixels,
        total_pixels,
        mask,
        removed,
        added,
        debug: debug_masks,
    })
}

/// Binarize one direction of gray difference into a mask.
fn direction_mask(diff: &GrayImage) -> DifferenceMask {
    // Stretch every residue to full intensity; 1-2 level residues would
    // otherwise land in the "match" class and vanish.
    let mut contrast = diff.clone();
    let mut any = false;
    for p in contrast.pixels_mut() {
        if p.0[0] != 0 {
            p.0[0] = 255;
            any = true;
        }
    }

    if !any {
        return DifferenceMask::empty(diff.width(), diff.height());
    }

    let level = otsu::otsu_level(&contrast);
    let matches = otsu::threshold_inverted(&contrast, level);
    DifferenceMask::from_matches(&matches)
}
