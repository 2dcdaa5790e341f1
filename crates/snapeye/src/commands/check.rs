use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use snapeye::capture::{CheckJob, runner};
use snapeye::compare::SnapshotStatus;
use snapeye::config::{CaptureConfig, ResolvedRunConfig};
use snapeye::report::terminal;
use snapeye::store;

/// One job per capture file matching the pattern, named after the file stem.
fn plan_jobs(capture: &CaptureConfig, filter: Option<&str>) -> Result<Vec<CheckJob>> {
    let pattern = capture.pattern();
    let paths = glob::glob(pattern).with_context(|| format!("Invalid capture pattern {pattern}"))?;
    let filter = filter.map(str::to_lowercase);

    let mut jobs = Vec::new();
    for entry in paths {
        let path: PathBuf = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "skipping unreadable capture path");
                continue;
            }
        };
        let Some(name) = screen_name(&path) else {
            continue;
        };
        if filter
            .as_deref()
            .is_some_and(|f| !name.to_lowercase().contains(f))
        {
            continue;
        }
        jobs.push(CheckJob {
            name,
            capture: path,
            platform: capture.platform.clone(),
            insets: capture.insets(),
        });
    }
    jobs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.capture.cmp(&b.capture)));

    // Baselines, scratch files and reports are keyed by name.
    if let Some(pair) = jobs.windows(2).find(|pair| pair[0].name == pair[1].name) {
        bail!(
            "{} and {} both map to screen {:?}; rename one so each screen has its own baseline",
            pair[0].capture.display(),
            pair[1].capture.display(),
            pair[0].name,
        );
    }
    Ok(jobs)
}

fn screen_name(path: &Path) -> Option<String> {
    let file = path.file_name()?.to_str()?;
    Some(store::screen_stem(file).to_owned())
}

/// `snapeye check`: verify every matching capture and print a summary.
/// Returns exit code: 0 = nothing failed, 1 = any fail or error.
pub async fn check(config: ResolvedRunConfig, filter: Option<&str>) -> Result<i32> {
    let jobs = plan_jobs(&config.capture, filter)?;
    if jobs.is_empty() {
        println!("No captures match {}", config.capture.pattern());
        return Ok(0);
    }
    config.store.ensure_dirs()?;

    let run_start = Instant::now();
    let total = jobs.len();
    let mut rx = runner::check_all(config.verifier(), jobs, config.capture.parallel());

    let mut done = 0usize;
    let mut passed = 0usize;
    let mut failed_names: Vec<String> = Vec::new();
    let mut new_names: Vec<String> = Vec::new();
    let mut errored_names: Vec<String> = Vec::new();

    debug!(total, "waiting for check results");
    while let Some((job, outcome)) = rx.recv().await {
        done += 1;
        debug!(done, total, name = %job.name, "received result");
        match &outcome.status {
            SnapshotStatus::Pass => passed += 1,
            SnapshotStatus::Fail { .. } => failed_names.push(job.name.clone()),
            SnapshotStatus::New => new_names.push(job.name.clone()),
            SnapshotStatus::Error(_) => errored_names.push(job.name.clone()),
        }
        terminal::print_line(&job.name, &outcome.status, outcome.elapsed);
        terminal::show_progress(done, total);
    }

    terminal::print_actionable_summary(&failed_names, &new_names, &errored_names);
    terminal::print_summary(
        total,
        passed,
        failed_names.len(),
        new_names.len(),
        errored_names.len(),
        run_start.elapsed(),
        config.store.results_dir(),
    );

    // New baselines do NOT affect exit code.
    if failed_names.is_empty() && errored_names.is_empty() {
        Ok(0)
    } else {
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn plans_one_job_per_capture_with_filter() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["Login.png", "cart.png", "checkout.v2.png"] {
            RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]))
                .save(tmp.path().join(name))
                .unwrap();
        }
        let capture = CaptureConfig {
            pattern: Some(format!("{}/*.png", tmp.path().display())),
            platform: Some("ios".into()),
            ..CaptureConfig::default()
        };

        let jobs = plan_jobs(&capture, None).unwrap();
        let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, ["Login", "cart", "checkout"]);
        assert!(jobs.iter().all(|j| j.platform.as_deref() == Some("ios")));

        let jobs = plan_jobs(&capture, Some("LOG")).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "Login");
    }

    #[test]
    fn captures_sharing_a_screen_name_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["checkout.v1.png", "checkout.v2.png", "home.png"] {
            RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]))
                .save(tmp.path().join(name))
                .unwrap();
        }
        let capture = CaptureConfig {
            pattern: Some(format!("{}/*.png", tmp.path().display())),
            ..CaptureConfig::default()
        };

        let msg = format!("{:#}", plan_jobs(&capture, None).unwrap_err());
        assert!(msg.contains("checkout.v1.png"), "{msg}");
        assert!(msg.contains("checkout.v2.png"), "{msg}");
        assert!(msg.contains("\"checkout\""), "{msg}");

        // Filtering down to one of them leaves no clash.
        let jobs = plan_jobs(&capture, Some("home")).unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let capture = CaptureConfig {
            pattern: Some("[".into()),
            ..CaptureConfig::default()
        };
        assert!(plan_jobs(&capture, None).is_err());
    }
}
