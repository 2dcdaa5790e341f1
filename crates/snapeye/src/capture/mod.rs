pub mod file;
pub mod runner;

use image::{RgbImage, imageops};
use serde::{Deserialize, Serialize};

pub use self::file::FileSource;
pub use self::runner::{CheckJob, CheckOutcome};

/// Rows of system UI to strip before comparing: status bar on top,
/// navigation bar at the bottom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromeInsets {
    pub top: u32,
    pub bottom: u32,
}

impl ChromeInsets {
    pub fn is_empty(&self) -> bool {
        self.top == 0 && self.bottom == 0
    }
}

/// Whatever drives the device or browser under test.
///
/// Only the verify loop talks to a source; the comparison engine works on
/// the images it returns.
pub trait ScreenSource {
    /// Take a fresh screenshot.
    fn capture_screen(&mut self) -> anyhow::Result<RgbImage>;

    /// Current system UI geometry, if the platform has any.
    fn chrome_insets(&mut self) -> anyhow::Result<Option<ChromeInsets>> {
        Ok(None)
    }

    /// Platform discriminator used in baseline names (e.g. `"android"`).
    fn platform(&self) -> Option<&str> {
        None
    }
}

/// Remove `insets` rows from `img`. `None` when nothing would remain.
pub fn crop_chrome(img: &RgbImage, insets: ChromeInsets) -> Option<RgbImage> {
    if insets.is_empty() {
        return Some(img.clone());
    }
    let height = img
        .height()
        .checked_sub(insets.top)?
        .checked_sub(insets.bottom)
        .filter(|&h| h > 0)?;
    Some(imageops::crop_imm(img, 0, insets.top, img.width(), height).to_image())
}
