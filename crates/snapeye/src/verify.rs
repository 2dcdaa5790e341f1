//! Capture-compare-retry loop around the diff engine.
//!
//! A [`Verifier`] owns everything one check needs (store layout, diff knobs,
//! report layout, retry policy) so callers never touch ambient state. The
//! loop re-captures until the screen matches its baseline or the timeout
//! elapses, then composes a report from the last attempt.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::capture::{ScreenSource, crop_chrome};
use crate::compare::{CompareError, ComparisonResult, DiffOptions, compare};
use crate::report::compose::{self, ReportComposer, ReportLayout, ReportMeta};
use crate::store::{self, Store, StoreError};

/// Placeholder shown where a report path would go if writing it failed.
const REPORT_NOT_WRITTEN: &str = "<report not written>";

/// What happens when a screen still differs after the timeout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailMode {
    /// Return [`VerifyError::Different`].
    #[default]
    Hard,
    /// Log the difference and return [`Verdict::Different`].
    Soft,
}

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub diff: DiffOptions,
    pub layout: ReportLayout,
    /// How long to keep re-capturing while the screen differs.
    pub timeout: Duration,
    /// Pause between captures.
    pub poll_interval: Duration,
    pub mode: FailMode,
    /// Strip status/navigation bars reported by the source.
    pub crop_chrome: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            diff: DiffOptions::default(),
            layout: ReportLayout::default(),
            timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(200),
            mode: FailMode::Hard,
            crop_chrome: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Same {
        percent_different: f64,
        attempts: u32,
    },
    /// No baseline existed; the capture was saved as the new baseline.
    Bootstrapped { baseline: PathBuf },
    Different {
        percent_different: f64,
        diff_pixels: u64,
        /// `None` when composing or writing the report failed.
        report: Option<PathBuf>,
        attempts: u32,
    },
}

impl Verdict {
    pub fn is_different(&self) -> bool {
        matches!(self, Self::Different { .. })
    }
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("failed to capture {name}")]
    Capture {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error(
        "no image left for {name} after cropping system bars \
         ({top} top, {bottom} bottom of {height} rows)"
    )]
    Crop {
        name: String,
        top: u32,
        bottom: u32,
        height: u32,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{name}: {source}")]
    Shape {
        name: String,
        #[source]
        source: CompareError,
    },
    #[error(
        "Expected and Actual images are different for {name}. \
         Image to check difference: {}",
        report_label(.report)
    )]
    Different {
        name: String,
        percent_different: f64,
        diff_pixels: u64,
        report: Option<PathBuf>,
    },
}

fn report_label(report: &Option<PathBuf>) -> String {
    report
        .as_ref()
        .map_or_else(|| REPORT_NOT_WRITTEN.to_owned(), |p| p.display().to_string())
}

/// Caller-owned context for screen checks.
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    store: Store,
    options: VerifyOptions,
    composer: ReportComposer,
}

impl Verifier {
    pub fn new(store: Store, options: VerifyOptions) -> Self {
        let composer = ReportComposer::new(options.layout);
        Self {
            store,
            options,
            composer,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    /// Check `name` against its baseline, re-capturing from `source` until it
    /// matches or the timeout elapses. Always captures at least once.
    pub fn verify_screen(
        &self,
        source: &mut dyn ScreenSource,
        name: &str,
    ) -> Result<Verdict, VerifyError> {
        let started = Local::now();
        let report_id = store::report_id(&started);
        let deadline = Instant::now() + self.options.timeout;
        let mut attempts = 0u32;

        let (baseline, actual, result) = loop {
            attempts += 1;
            let actual = self.capture(source, name)?;
            let baseline_path = self.store.baseline_path(
                name,
                source.platform(),
                actual.height(),
                actual.width(),
            );
            let actual_path = self.store.write_actual(name, &actual)?;
            debug!(
                name,
                attempt = attempts,
                expected = %baseline_path.display(),
                actual = %actual_path.display(),
                "captured"
            );

            let Some(baseline) = self.store.read_baseline(&baseline_path)? else {
                self.store.write_baseline(&baseline_path, &actual)?;
                warn!(
                    "Image {} is not found. Saving current screenshot",
                    baseline_path.display()
                );
                return Ok(Verdict::Bootstrapped {
                    baseline: baseline_path,
                });
            };

            let result = compare(&baseline, &actual, &self.options.diff).map_err(|source| {
                VerifyError::Shape {
                    name: name.to_owned(),
                    source,
                }
            })?;
            info!(
                name,
                attempt = attempts,
                "Different: {:.5}%",
                result.percent_different
            );

            if !result.is_different {
                info!(name, "Images are same");
                return Ok(Verdict::Same {
                    percent_different: result.percent_different,
                    attempts,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                break (baseline, actual, result);
            }
            std::thread::sleep(self.options.poll_interval.min(deadline - now));
        };

        let report = self.write_report(name, &report_id, &started, &baseline, &actual, &result);
        match self.options.mode {
            FailMode::Hard => Err(VerifyError::Different {
                name: name.to_owned(),
                percent_different: result.percent_different,
                diff_pixels: result.diff_pixels,
                report,
            }),
            FailMode::Soft => {
                warn!(
                    "Expected and Actual images are different for {name}. \
                     Image to check difference: {}",
                    report_label(&report)
                );
                Ok(Verdict::Different {
                    percent_different: result.percent_different,
                    diff_pixels: result.diff_pixels,
                    report,
                    attempts,
                })
            }
        }
    }

    fn capture(
        &self,
        source: &mut dyn ScreenSource,
        name: &str,
    ) -> Result<RgbImage, VerifyError> {
        let capture_err = |e: anyhow::Error| VerifyError::Capture {
            name: name.to_owned(),
            source: e.into(),
        };

        let img = source.capture_screen().map_err(capture_err)?;
        if !self.options.crop_chrome {
            return Ok(img);
        }
        let Some(insets) = source.chrome_insets().map_err(capture_err)? else {
            return Ok(img);
        };
        crop_chrome(&img, insets).ok_or_else(|| VerifyError::Crop {
            name: name.to_owned(),
            top: insets.top,
            bottom: insets.bottom,
            height: img.height(),
        })
    }

    /// Compose and persist the report. Failures are logged, never raised: the
    /// difference verdict must survive a broken results directory.
    fn write_report(
        &self,
        name: &str,
        report_id: &str,
        started: &DateTime<Local>,
        baseline: &RgbImage,
        actual: &RgbImage,
        result: &ComparisonResult,
    ) -> Option<PathBuf> {
        let generated_at = started.format("%d.%m.%Y %H:%M:%S").to_string();
        let meta = ReportMeta {
            label: name,
            generated_at: &generated_at,
            path: self.store.report_path(name, report_id),
        };

        let written = self
            .composer
            .compose(baseline, actual, result, meta)
            .and_then(|report| report.save().map(|()| report.path));

        match written {
            Ok(path) => {
                info!(name, path = %path.display(), "Saving image with difference");
                if let Some(debug) = &result.debug {
                    save_debug_mask(&debug.removed, &path, "removed");
                    if let Some(added) = &debug.added {
                        save_debug_mask(added, &path, "added");
                    }
                }
                Some(path)
            }
            Err(e) => {
                let e = anyhow::Error::new(e);
                error!(name, error = %format!("{e:#}"), "failed to write difference report");
                None
            }
        }
    }
}

fn save_debug_mask(mask: &image::GrayImage, report: &Path, suffix: &str) {
    let path = store::companion_path(report, suffix);
    match compose::save_gray(mask, &path) {
        Ok(()) => debug!(path = %path.display(), "debug mask written"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to write debug mask"),
    }
}
