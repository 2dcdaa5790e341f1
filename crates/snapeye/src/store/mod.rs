use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::RgbImage;
use thiserror::Error;
use tracing::info;

pub const BASE_DIR: &str = ".snapeye";
pub const EXPECTED_DIR: &str = "expected";
pub const RESULTS_DIR: &str = "results";
pub const TMP_DIR: &str = "tmp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create {}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode image {}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("failed to write image {}", path.display())]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Logical screen name up to its first `.` (`"login.png"` -> `"login"`).
pub fn screen_stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Uniqueness token for a report file, millisecond resolution.
pub fn report_id(now: &DateTime<Local>) -> String {
    now.format("%d_%m_%Y_%H_%M_%S_%3f").to_string()
}

/// Decode any supported raster file into RGB.
pub fn load_image(path: &Path) -> Result<RgbImage, StoreError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn write_png(path: &Path, img: &RgbImage) -> Result<(), StoreError> {
    ensure_parent(path)?;
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// On-disk layout for baselines, reports and per-screen scratch captures.
#[derive(Debug, Clone)]
pub struct Store {
    expected_dir: PathBuf,
    results_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl Default for Store {
    fn default() -> Self {
        let base = Path::new(BASE_DIR);
        Self::new(base.join(EXPECTED_DIR), base.join(RESULTS_DIR), base.join(TMP_DIR))
    }
}

impl Store {
    pub fn new(
        expected_dir: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
        tmp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            expected_dir: expected_dir.into(),
            results_dir: results_dir.into(),
            tmp_dir: tmp_dir.into(),
        }
    }

    pub fn expected_dir(&self) -> &Path {
        &self.expected_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Create any missing directory of the layout.
    pub fn ensure_dirs(&self) -> Result<(), StoreError> {
        for (dir, what) in [
            (&self.expected_dir, "Expected images"),
            (&self.results_dir, "Result images"),
            (&self.tmp_dir, "Temp"),
        ] {
            if dir.is_dir() {
                continue;
            }
            std::fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
                path: dir.clone(),
                source,
            })?;
            info!(path = %dir.display(), "{what} directory is created");
        }
        Ok(())
    }

    /// Baseline for `name` at a given capture size.
    ///
    /// Layout: `{expected}/{stem}[_{platform}]_{height}_{width}.png`, so a
    /// capture is never compared against another resolution or platform.
    pub fn baseline_path(
        &self,
        name: &str,
        platform: Option<&str>,
        height: u32,
        width: u32,
    ) -> PathBuf {
        let stem = screen_stem(name);
        let file = match platform {
            Some(p) => format!("{stem}_{}_{height}_{width}.png", p.to_lowercase()),
            None => format!("{stem}_{height}_{width}.png"),
        };
        self.expected_dir.join(file)
    }

    /// `Ok(None)` when no baseline exists yet.
    pub fn read_baseline(&self, path: &Path) -> Result<Option<RgbImage>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        load_image(path).map(Some)
    }

    pub fn write_baseline(&self, path: &Path, img: &RgbImage) -> Result<(), StoreError> {
        write_png(path, img)
    }

    /// Scratch path for the latest capture of `name`, scoped by resolution so
    /// concurrent checks of different screens never share a file.
    pub fn actual_path(&self, name: &str, height: u32, width: u32) -> PathBuf {
        self.tmp_dir
            .join(format!("{}_{height}_{width}.png", screen_stem(name)))
    }

    pub fn write_actual(&self, name: &str, img: &RgbImage) -> Result<PathBuf, StoreError> {
        let path = self.actual_path(name, img.height(), img.width());
        write_png(&path, img)?;
        Ok(path)
    }

    /// Fresh report path for `name`. Never returns a path that already exists.
    pub fn report_path(&self, name: &str, id: &str) -> PathBuf {
        let stem = screen_stem(name);
        let first = self.results_dir.join(format!("{stem}_{id}.png"));
        if !first.exists() {
            return first;
        }
        (1u32..)
            .map(|n| self.results_dir.join(format!("{stem}_{id}_{n}.png")))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }
}

/// Sibling of a report for an intermediate image (`{report}_{suffix}.png`).
pub fn companion_path(report: &Path, suffix: &str) -> PathBuf {
    let stem = report
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    report.with_file_name(format!("{stem}_{suffix}.png"))
}
