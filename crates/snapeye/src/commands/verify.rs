use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};

use snapeye::capture::FileSource;
use snapeye::compare::SnapshotStatus;
use snapeye::config::ResolvedRunConfig;
use snapeye::report::terminal;
use snapeye::{Verdict, VerifyError};

/// `snapeye verify`: run the capture/compare/retry loop for one screen.
/// Returns exit code: 0 = same, bootstrapped or soft difference; 1 = different.
pub async fn verify(config: ResolvedRunConfig, name: String, screenshot: PathBuf) -> Result<i32> {
    config.store.ensure_dirs()?;
    let verifier = config.verifier();
    let mut source = FileSource::new(screenshot)
        .with_platform(config.capture.platform.clone())
        .with_insets(config.capture.insets());

    let started = Instant::now();
    let (name, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = verifier.verify_screen(&mut source, &name);
        (name, outcome)
    })
    .await
    .context("Verify task panicked")?;

    let status = match outcome {
        Ok(Verdict::Same { .. }) => SnapshotStatus::Pass,
        Ok(Verdict::Bootstrapped { .. }) => SnapshotStatus::New,
        // Soft mode: reported, not failed.
        Ok(Verdict::Different {
            percent_different,
            diff_pixels,
            report,
            ..
        }) => SnapshotStatus::Fail {
            diff_pixels,
            percent: percent_different,
            report,
        },
        Err(e @ VerifyError::Different { .. }) => {
            eprintln!("{e}");
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };

    terminal::print_line(&name, &status, started.elapsed());
    Ok(0)
}
