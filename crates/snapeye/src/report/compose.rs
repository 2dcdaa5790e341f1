use std::path::{Path, PathBuf};

use image::{GrayImage, Rgb, RgbImage, imageops};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::font;
use crate::compare::{ComparisonResult, DifferenceMask};

/// Marker for pixels the actual image gained (or any difference, single-sided).
pub const ADDED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Marker for pixels only the baseline carries.
pub const REMOVED_COLOR: Rgb<u8> = Rgb([0, 0, 205]);
const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const LEGEND_REMOVED: &str = "Expected has and not on Actual";
const LEGEND_ADDED: &str = "Actual has and not on Expected";
const SWATCH_THICKNESS: u32 = 15;

/// Upper bound for `border` and `caption_height`, in pixels.
pub const MAX_LAYOUT_EXTENT: u32 = 4096;
pub const MAX_FONT_SCALE: u32 = 32;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(
        "report inputs disagree on size: baseline {baseline_w}x{baseline_h}, \
         actual {actual_w}x{actual_h}, mask {mask_w}x{mask_h}"
    )]
    ShapeMismatch {
        baseline_w: u32,
        baseline_h: u32,
        actual_w: u32,
        actual_h: u32,
        mask_w: u32,
        mask_h: u32,
    },
    #[error(
        "report canvas for {width}x{height} images with border {border} \
         and caption {caption_height} does not fit in u32"
    )]
    TooLarge {
        width: u32,
        height: u32,
        border: u32,
        caption_height: u32,
    },
    #[error("failed to create {}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write report {}", path.display())]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Geometry of the composite report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportLayout {
    /// Separator between the two halves, in pixels.
    pub border: u32,
    /// Height of the caption band below the images.
    pub caption_height: u32,
    /// Font scale of the "Expected" / "Actual" titles.
    pub title_scale: u32,
    /// Font scale of the info lines and legend.
    pub info_scale: u32,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            border: 10,
            caption_height: 220,
            title_scale: 4,
            info_scale: 2,
        }
    }
}

impl ReportLayout {
    /// Reject geometry that cannot produce a sensible canvas.
    pub fn validate(&self) -> Result<(), String> {
        for (key, value) in [
            ("border", self.border),
            ("caption_height", self.caption_height),
        ] {
            if value > MAX_LAYOUT_EXTENT {
                return Err(format!(
                    "{key} must be at most {MAX_LAYOUT_EXTENT} pixels, got {value}"
                ));
            }
        }
        for (key, value) in [
            ("title_scale", self.title_scale),
            ("info_scale", self.info_scale),
        ] {
            if !(1..=MAX_FONT_SCALE).contains(&value) {
                return Err(format!(
                    "{key} must be between 1 and {MAX_FONT_SCALE}, got {value}"
                ));
            }
        }
        Ok(())
    }
}

/// Text and swatch positions inside the caption band.
///
/// Text anchors are bottom-left corners. Swatches are `(x_start, x_end, y_center)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionAnchors {
    pub expected: (u32, u32),
    pub actual: (u32, u32),
    pub info: (u32, u32),
    pub label: (u32, u32),
    pub timestamp: (u32, u32),
    pub removed_swatch: (u32, u32, u32),
    pub removed_text: (u32, u32),
    pub added_swatch: (u32, u32, u32),
    pub added_text: (u32, u32),
}

impl CaptionAnchors {
    /// Positions for a report whose two halves are `width` x `height` each.
    pub fn new(width: u32, height: u32, layout: &ReportLayout) -> Self {
        let out_w = width.saturating_mul(2).saturating_add(layout.border);
        let last = out_w.saturating_sub(1);
        let frac = |f: f64| ((f64::from(out_w) * f) as u32).min(last);
        let left = 10u32.min(last);
        let row = |dy: u32| height.saturating_add(dy);

        Self {
            expected: (frac(0.20), row(70)),
            actual: (frac(0.73), row(70)),
            info: (left, row(120)),
            label: (left, row(160)),
            timestamp: (left, row(200)),
            removed_swatch: (frac(0.55), frac(0.60), row(150)),
            removed_text: (frac(0.61), row(160)),
            added_swatch: (frac(0.55), frac(0.60), row(190)),
            added_text: (frac(0.61), row(200)),
        }
    }
}

/// `(2W + border, H + caption)`, or `None` when it overflows.
fn output_size(width: u32, height: u32, layout: &ReportLayout) -> Option<(u32, u32)> {
    let out_w = width.checked_mul(2)?.checked_add(layout.border)?;
    let out_h = height.checked_add(layout.caption_height)?;
    Some((out_w, out_h))
}

/// What the caption says and where the report goes.
pub struct ReportMeta<'a> {
    /// Screen identity, printed under "Image info:".
    pub label: &'a str,
    /// Human-readable generation time.
    pub generated_at: &'a str,
    pub path: PathBuf,
}

/// A composed report, not yet written.
#[derive(Debug, Clone)]
pub struct ReportImage {
    pub image: RgbImage,
    pub path: PathBuf,
    pub generated_at: String,
}

impl ReportImage {
    pub fn save(&self) -> Result<(), ComposeError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ComposeError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.image
            .save_with_format(&self.path, image::ImageFormat::Png)
            .map_err(|source| ComposeError::Write {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), "report written");
        Ok(())
    }
}

/// Builds the side-by-side annotated comparison image.
#[derive(Debug, Clone, Default)]
pub struct ReportComposer {
    layout: ReportLayout,
}

impl ReportComposer {
    pub fn new(layout: ReportLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ReportLayout {
        &self.layout
    }

    /// Compose `baseline | border | annotated actual` over a caption band.
    ///
    /// Never touches `baseline`; the annotation is painted on a copy of
    /// `actual`. Same inputs always produce the same pixels.
    pub fn compose(
        &self,
        baseline: &RgbImage,
        actual: &RgbImage,
        result: &ComparisonResult,
        meta: ReportMeta<'_>,
    ) -> Result<ReportImage, ComposeError> {
        let (w, h) = baseline.dimensions();
        if actual.dimensions() != (w, h) || result.mask.as_image().dimensions() != (w, h) {
            return Err(ComposeError::ShapeMismatch {
                baseline_w: w,
                baseline_h: h,
                actual_w: actual.width(),
                actual_h: actual.height(),
                mask_w: result.mask.width(),
                mask_h: result.mask.height(),
            });
        }

        let layout = &self.layout;
        let (out_w, out_h) = output_size(w, h, layout).ok_or(ComposeError::TooLarge {
            width: w,
            height: h,
            border: layout.border,
            caption_height: layout.caption_height,
        })?;

        let mut annotated = actual.clone();
        match &result.added {
            Some(added) => {
                paint(&mut annotated, &result.removed, REMOVED_COLOR);
                paint(&mut annotated, added, ADDED_COLOR);
            }
            None => paint(&mut annotated, &result.mask, ADDED_COLOR),
        }

        let mut canvas = RgbImage::from_pixel(out_w, out_h, BACKGROUND);
        imageops::replace(&mut canvas, baseline, 0, 0);
        imageops::replace(&mut canvas, &annotated, i64::from(w + layout.border), 0);

        let at = CaptionAnchors::new(w, h, layout);
        let title = layout.title_scale;
        let info = layout.info_scale;
        font::draw_text(&mut canvas, "Expected", at.expected.0, at.expected.1, title, TEXT_COLOR);
        font::draw_text(&mut canvas, "Actual", at.actual.0, at.actual.1, title, TEXT_COLOR);
        font::draw_text(&mut canvas, "Image info:", at.info.0, at.info.1, info, TEXT_COLOR);
        font::draw_text(&mut canvas, meta.label, at.label.0, at.label.1, info, TEXT_COLOR);
        font::draw_text(
            &mut canvas,
            meta.generated_at,
            at.timestamp.0,
            at.timestamp.1,
            info,
            TEXT_COLOR,
        );

        if result.added.is_some() {
            draw_swatch(&mut canvas, at.removed_swatch, REMOVED_COLOR);
            font::draw_text(
                &mut canvas,
                LEGEND_REMOVED,
                at.removed_text.0,
                at.removed_text.1,
                info,
                TEXT_COLOR,
            );
            draw_swatch(&mut canvas, at.added_swatch, ADDED_COLOR);
            font::draw_text(
                &mut canvas,
                LEGEND_ADDED,
                at.added_text.0,
                at.added_text.1,
                info,
                TEXT_COLOR,
            );
        }

        debug!(
            width = out_w,
            height = out_h,
            path = %meta.path.display(),
            "report composed"
        );

        Ok(ReportImage {
            image: canvas,
            path: meta.path,
            generated_at: meta.generated_at.to_owned(),
        })
    }
}

fn paint(img: &mut RgbImage, mask: &DifferenceMask, color: Rgb<u8>) {
    for (x, y, p) in img.enumerate_pixels_mut() {
        if mask.is_set(x, y) {
            *p = color;
        }
    }
}

/// Horizontal line `SWATCH_THICKNESS` pixels thick, centred on `y`.
fn draw_swatch(img: &mut RgbImage, (x_start, x_end, y): (u32, u32, u32), color: Rgb<u8>) {
    let half = SWATCH_THICKNESS / 2;
    let y_end = (y + half + 1).min(img.height());
    let x_end = (x_end + 1).min(img.width());
    for py in y.saturating_sub(half)..y_end {
        for px in x_start..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

/// Write a gray intermediate next to its report. Used for debug masks.
pub fn save_gray(image: &GrayImage, path: &Path) -> Result<(), ComposeError> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|source| ComposeError::Write {
            path: path.to_path_buf(),
            source,
        })
}
