use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Local;
use image::RgbImage;
use serde::Serialize;
use tracing::error;

use snapeye::compare::{self, ComparisonResult, SnapshotStatus};
use snapeye::config::ResolvedRunConfig;
use snapeye::report::terminal;
use snapeye::report::{ReportComposer, ReportMeta};
use snapeye::store;

/// Machine-readable result of `snapeye compare --json`.
#[derive(Debug, Serialize)]
struct CompareSummary {
    name: String,
    is_different: bool,
    percent_different: f64,
    diff_pixels: u64,
    total_pixels: u64,
    tolerance_percent: f64,
    report: Option<PathBuf>,
}

/// `snapeye compare`: diff two files, write a report when they differ.
/// Returns exit code: 0 = same, 1 = different.
pub fn compare(
    config: ResolvedRunConfig,
    expected: &Path,
    actual: &Path,
    name: Option<&str>,
    json: bool,
) -> Result<i32> {
    let started = Instant::now();
    let summary = summarize(&config, expected, actual, name)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    } else {
        let status = if summary.is_different {
            SnapshotStatus::Fail {
                diff_pixels: summary.diff_pixels,
                percent: summary.percent_different,
                report: summary.report.clone(),
            }
        } else {
            SnapshotStatus::Pass
        };
        terminal::print_line(&summary.name, &status, started.elapsed());
    }

    Ok(i32::from(summary.is_different))
}

fn summarize(
    config: &ResolvedRunConfig,
    expected: &Path,
    actual: &Path,
    name: Option<&str>,
) -> Result<CompareSummary> {
    let name = match name {
        Some(n) => n.to_owned(),
        None => actual
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .context("Cannot derive a screen name from the actual path; pass --name")?,
    };

    let baseline = store::load_image(expected)?;
    let current = store::load_image(actual)?;
    let options = &config.verify.diff;
    let result = compare::compare(&baseline, &current, options).with_context(|| {
        format!(
            "Cannot compare {} with {}",
            expected.display(),
            actual.display()
        )
    })?;

    let report = if result.is_different {
        write_report(config, &name, &baseline, &current, &result)
    } else {
        None
    };

    Ok(CompareSummary {
        name,
        is_different: result.is_different,
        percent_different: result.percent_different,
        diff_pixels: result.diff_pixels,
        total_pixels: result.total_pixels,
        tolerance_percent: options.tolerance_percent,
        report,
    })
}

/// Compose and save the report. A failure is logged and yields `None`; the
/// verdict is reported either way.
fn write_report(
    config: &ResolvedRunConfig,
    name: &str,
    baseline: &RgbImage,
    current: &RgbImage,
    result: &ComparisonResult,
) -> Option<PathBuf> {
    let now = Local::now();
    let generated_at = now.format("%d.%m.%Y %H:%M:%S").to_string();
    let meta = ReportMeta {
        label: name,
        generated_at: &generated_at,
        path: config.store.report_path(name, &store::report_id(&now)),
    };

    let written = ReportComposer::new(config.verify.layout)
        .compose(baseline, current, result, meta)
        .and_then(|report| report.save().map(|()| report.path));

    match written {
        Ok(path) => Some(path),
        Err(e) => {
            let e = anyhow::Error::new(e);
            error!(name, error = %format!("{e:#}"), "failed to write difference report");
            None
        }
    }
}
