use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, debug, info_span, warn};

use super::{ChromeInsets, FileSource};
use crate::compare::SnapshotStatus;
use crate::verify::{Verdict, Verifier, VerifyError};

/// One screen to check: a logical name plus the file its capture lands in.
#[derive(Debug, Clone)]
pub struct CheckJob {
    pub name: String,
    pub capture: PathBuf,
    pub platform: Option<String>,
    pub insets: Option<ChromeInsets>,
}

impl CheckJob {
    pub fn new(name: impl Into<String>, capture: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            capture: capture.into(),
            platform: None,
            insets: None,
        }
    }
}

/// Per-screen result of a batch run.
#[derive(Debug)]
pub struct CheckOutcome {
    pub status: SnapshotStatus,
    pub elapsed: Duration,
}

fn status_of(result: Result<Verdict, VerifyError>) -> SnapshotStatus {
    match result {
        Ok(Verdict::Same { .. }) => SnapshotStatus::Pass,
        Ok(Verdict::Bootstrapped { .. }) => SnapshotStatus::New,
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
        // Hard-mode verifiers surface differences as errors.
        Err(VerifyError::Different {
            percent_different,
            diff_pixels,
            report,
            ..
        }) => SnapshotStatus::Fail {
            diff_pixels,
            percent: percent_different,
            report,
        },
        Err(e) => SnapshotStatus::Error(format!("{:#}", anyhow::Error::new(e))),
    }
}

fn run_job(verifier: &Verifier, job: &CheckJob) -> SnapshotStatus {
    let mut source = FileSource::new(&job.capture)
        .with_platform(job.platform.clone())
        .with_insets(job.insets);
    status_of(verifier.verify_screen(&mut source, &job.name))
}

/// Check a list of screens with `parallel` workers pulling from a shared queue.
///
/// Failures are reported per screen rather than aborting the run. Returns a
/// `Receiver` immediately; outcomes stream in as checks complete.
pub fn check_all(
    verifier: Verifier,
    jobs: Vec<CheckJob>,
    parallel: usize,
) -> mpsc::Receiver<(CheckJob, CheckOutcome)> {
    check_all_with(verifier, jobs, parallel, run_job)
}

/// Worker pool around `run`. Every job yields exactly one outcome, even when
/// `run` panics.
fn check_all_with<F>(
    verifier: Verifier,
    jobs: Vec<CheckJob>,
    parallel: usize,
    run: F,
) -> mpsc::Receiver<(CheckJob, CheckOutcome)>
where
    F: Fn(&Verifier, &CheckJob) -> SnapshotStatus + Send + Sync + 'static,
{
    let job_count = jobs.len();
    let worker_count = job_count.min(parallel.max(1));
    debug!(
        jobs = job_count,
        workers = worker_count,
        parallel,
        "starting check run"
    );

    let verifier = Arc::new(verifier);
    let run = Arc::new(run);
    let queue = Arc::new(Mutex::new(jobs));
    let (tx, rx) = mpsc::channel(parallel.max(1) * 2);

    let mut set = tokio::task::JoinSet::new();
    for idx in 0..worker_count {
        let queue = queue.clone();
        let tx = tx.clone();
        let verifier = verifier.clone();
        let run = run.clone();
        let span = info_span!("worker", id = idx);
        set.spawn(
            async move {
                debug!("started");
                loop {
                    let (job, remaining) = {
                        let mut q = queue.lock().await;
                        match q.pop() {
                            Some(j) => {
                                let remaining = q.len();
                                (j, remaining)
                            }
                            None => {
                                debug!("queue empty, exiting");
                                break;
                            }
                        }
                    };
                    debug!(job = %job.name, remaining, "picked job");

                    // The verify loop sleeps between captures; keep it off the
                    // async workers.
                    let started = Instant::now();
                    let verifier = verifier.clone();
                    let run = run.clone();
                    let fallback = job.clone();
                    let (job, status) = match tokio::task::spawn_blocking(move || {
                        let status = run(&verifier, &job);
                        (job, status)
                    })
                    .await
                    {
                        Ok(done) => done,
                        Err(e) => {
                            warn!(job = %fallback.name, error = %e, "check task panicked");
                            let status = SnapshotStatus::Error(format!("check task panicked: {e}"));
                            (fallback, status)
                        }
                    };
                    let outcome = CheckOutcome {
                        status,
                        elapsed: started.elapsed(),
                    };

                    if tx.send((job, outcome)).await.is_err() {
                        warn!("channel send failed (receiver dropped), stopping");
                        break;
                    }
                }
                debug!("exiting");
            }
            .instrument(span),
        );
    }

    // Channel closes once every worker's sender is gone.
    drop(tx);

    tokio::spawn(async move {
        while let Some(result) = set.join_next().await {
            match result {
                Ok(()) => debug!("worker task joined"),
                Err(e) => warn!(error = %e, "worker task panicked"),
            }
        }
        debug!("all workers done");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::verify::{FailMode, VerifyOptions};
    use image::{Rgb, RgbImage};
    use std::path::Path;

    fn verifier_in(dir: &Path, mode: FailMode) -> Verifier {
        let store = Store::new(dir.join("expected"), dir.join("results"), dir.join("tmp"));
        let options = VerifyOptions {
            timeout: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
            mode,
            ..VerifyOptions::default()
        };
        Verifier::new(store, options)
    }

    fn write_capture(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
        let path = dir.join("captures").join(format!("{name}.png"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(8, 8, Rgb(color)).save(&path).unwrap();
        path
    }

    async fn collect(
        mut rx: mpsc::Receiver<(CheckJob, CheckOutcome)>,
    ) -> Vec<(String, SnapshotStatus)> {
        let mut out = Vec::new();
        while let Some((job, outcome)) = rx.recv().await {
            out.push((job.name, outcome.status));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    #[tokio::test]
    async fn empty_job_list_closes_channel() {
        let tmp = tempfile::tempdir().unwrap();
        let rx = check_all(verifier_in(tmp.path(), FailMode::Soft), Vec::new(), 4);
        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test]
    async fn first_run_bootstraps_then_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let jobs: Vec<CheckJob> = ["a", "b", "c"]
            .iter()
            .map(|n| CheckJob::new(*n, write_capture(tmp.path(), n, [10, 20, 30])))
            .collect();

        let first = collect(check_all(
            verifier_in(tmp.path(), FailMode::Soft),
            jobs.clone(),
            2,
        ))
        .await;
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|(_, s)| matches!(s, SnapshotStatus::New)));

        let second = collect(check_all(verifier_in(tmp.path(), FailMode::Soft), jobs, 2)).await;
        assert!(second.iter().all(|(_, s)| matches!(s, SnapshotStatus::Pass)));
    }

    #[tokio::test]
    async fn changed_capture_fails_with_report_in_either_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_capture(tmp.path(), "home", [0, 255, 0]);
        let job = CheckJob::new("home", &path);
        collect(check_all(
            verifier_in(tmp.path(), FailMode::Soft),
            vec![job.clone()],
            1,
        ))
        .await;

        write_capture(tmp.path(), "home", [255, 0, 0]);
        for mode in [FailMode::Soft, FailMode::Hard] {
            let out = collect(check_all(verifier_in(tmp.path(), mode), vec![job.clone()], 1)).await;
            let [(_, SnapshotStatus::Fail { percent, report, .. })] = out.as_slice() else {
                panic!("expected one failure, got {out:?}");
            };
            assert!((percent - 100.0).abs() < 1e-9);
            assert!(report.as_ref().is_some_and(|p| p.exists()));
        }
    }

    #[tokio::test]
    async fn panicking_check_still_reports_an_outcome() {
        let tmp = tempfile::tempdir().unwrap();
        let jobs = vec![
            CheckJob::new("boom", write_capture(tmp.path(), "boom", [1, 1, 1])),
            CheckJob::new("calm", write_capture(tmp.path(), "calm", [2, 2, 2])),
        ];
        let run = |verifier: &Verifier, job: &CheckJob| {
            if job.name == "boom" {
                panic!("renderer blew up");
            }
            run_job(verifier, job)
        };

        let out = collect(check_all_with(
            verifier_in(tmp.path(), FailMode::Soft),
            jobs,
            1,
            run,
        ))
        .await;

        assert_eq!(out.len(), 2);
        let (name, SnapshotStatus::Error(msg)) = &out[0] else {
            panic!("expected an error outcome, got {out:?}");
        };
        assert_eq!(name, "boom");
        assert!(msg.contains("panicked"), "{msg}");
        assert!(matches!(out[1], (ref n, SnapshotStatus::New) if n == "calm"));
    }

    #[tokio::test]
    async fn unreadable_capture_is_an_error_not_an_abort() {
        let tmp = tempfile::tempdir().unwrap();
        let good = CheckJob::new("good", write_capture(tmp.path(), "good", [1, 2, 3]));
        let bad = CheckJob::new("bad", tmp.path().join("missing.png"));

        let out = collect(check_all(
            verifier_in(tmp.path(), FailMode::Soft),
            vec![good, bad],
            2,
        ))
        .await;

        assert!(matches!(out[0], (ref n, SnapshotStatus::Error(_)) if n == "bad"));
        assert!(matches!(out[1], (ref n, SnapshotStatus::New) if n == "good"));
    }
}
