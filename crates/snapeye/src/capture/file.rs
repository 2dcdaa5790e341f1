use std::path::PathBuf;

use anyhow::Context;
use image::RgbImage;

use super::{ChromeInsets, ScreenSource};
use crate::store;

/// A screen source backed by a file that an external driver keeps overwriting.
///
/// Each capture re-reads the file, so the verify loop sees whatever the
/// driver wrote last.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    platform: Option<String>,
    insets: Option<ChromeInsets>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            platform: None,
            insets: None,
        }
    }

    pub fn with_platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_insets(mut self, insets: Option<ChromeInsets>) -> Self {
        self.insets = insets.filter(|i| !i.is_empty());
        self
    }
}

impl ScreenSource for FileSource {
    fn capture_screen(&mut self) -> anyhow::Result<RgbImage> {
        store::load_image(&self.path)
            .with_context(|| format!("Failed to capture from {}", self.path.display()))
    }

    fn chrome_insets(&mut self) -> anyhow::Result<Option<ChromeInsets>> {
        Ok(self.insets)
    }

    fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn rereads_file_on_every_capture() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("screen.png");
        RgbImage::from_pixel(2, 2, Rgb([1, 1, 1])).save(&path).unwrap();

        let mut source = FileSource::new(&path);
        assert_eq!(source.capture_screen().unwrap().get_pixel(0, 0).0, [1, 1, 1]);

        RgbImage::from_pixel(2, 2, Rgb([9, 9, 9])).save(&path).unwrap();
        assert_eq!(source.capture_screen().unwrap().get_pixel(0, 0).0, [9, 9, 9]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut source = FileSource::new("/nonexistent/screen.png");
        assert!(source.capture_screen().is_err());
    }

    #[test]
    fn empty_insets_are_dropped() {
        let mut source =
            FileSource::new("x.png").with_insets(Some(ChromeInsets { top: 0, bottom: 0 }));
        assert_eq!(source.chrome_insets().unwrap(), None);

        let mut source = FileSource::new("x.png")
            .with_platform(Some("ios".into()))
            .with_insets(Some(ChromeInsets { top: 40, bottom: 0 }));
        assert_eq!(
            source.chrome_insets().unwrap(),
            Some(ChromeInsets { top: 40, bottom: 0 })
        );
        assert_eq!(source.platform(), Some("ios"));
    }
}
