use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::compare::SnapshotStatus;

/// Clear the current terminal line (wipes progress indicator).
pub fn clear_line() {
    print!("\r\x1b[2K");
}

pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

fn format_line(name: &str, status: &SnapshotStatus, elapsed: Duration) -> String {
    let time_suffix = format!("  \x1b[2m{}\x1b[0m", format_duration(elapsed));
    match status {
        SnapshotStatus::Pass => format!("  \x1b[32mPASS\x1b[0m  {name}{time_suffix}"),
        SnapshotStatus::Fail {
            diff_pixels,
            percent,
            report,
        } => {
            let report = report
                .as_ref()
                .map(|p| format!(" -> {}", p.display()))
                .unwrap_or_default();
            format!(
                "  \x1b[31mFAIL\x1b[0m  {name}  ({diff_pixels} pixels, {percent:.5}%){report}{time_suffix}"
            )
        }
        SnapshotStatus::New => {
            format!("  \x1b[33m NEW\x1b[0m  {name}  (baseline saved){time_suffix}")
        }
        SnapshotStatus::Error(msg) => {
            format!("  \x1b[31m ERR\x1b[0m  {name}  ({msg}){time_suffix}")
        }
    }
}

/// Print a single screen result line.
pub fn print_line(name: &str, status: &SnapshotStatus, elapsed: Duration) {
    clear_line();
    println!("{}", format_line(name, status, elapsed));
}

/// Show check progress indicator.
pub fn show_progress(done: usize, total: usize) {
    if done < total {
        print!("  Checking  [{done}/{total}]");
        let _ = std::io::stdout().flush();
    }
}

/// Print screen names grouped by status. Only prints non-empty sections.
pub fn print_actionable_summary(failed: &[String], new: &[String], errored: &[String]) {
    if failed.is_empty() && new.is_empty() && errored.is_empty() {
        return;
    }

    clear_line();
    println!();
    println!("Actionable screens:");

    for (label, names) in [("Failed", failed), ("New", new), ("Errored", errored)] {
        if !names.is_empty() {
            println!();
            println!("  {label} ({}):", names.len());
            for name in names {
                println!("    {name}");
            }
        }
    }
}

fn failure_hint(failed: usize, results_dir: &Path) -> String {
    format!(
        "{failed} screen(s) have visual differences. See the reports in {}.",
        results_dir.display()
    )
}

/// Print the final summary.
pub fn print_summary(
    total: usize,
    passed: usize,
    failed: usize,
    new: usize,
    errored: usize,
    elapsed: Duration,
    results_dir: &Path,
) {
    clear_line();
    println!();
    print!(
        "Screens:  {total} total, \x1b[32m{passed} passed\x1b[0m, \x1b[31m{failed} failed\x1b[0m, \x1b[33m{new} new\x1b[0m"
    );
    if errored > 0 {
        print!(", \x1b[31m{errored} errored\x1b[0m");
    }
    println!();
    println!("Time:     {}", format_duration(elapsed));

    if failed > 0 || new > 0 || errored > 0 {
        println!();
        if failed > 0 {
            println!("{}", failure_hint(failed, results_dir));
        }
        if new > 0 {
            println!("{new} screen(s) had no baseline; the capture was saved as the baseline.");
        }
        if errored > 0 {
            println!("{errored} screen(s) could not be checked.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn durations_switch_to_seconds() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn fail_line_shows_percent_and_report() {
        let status = SnapshotStatus::Fail {
            diff_pixels: 100,
            percent: 1.0,
            report: Some(PathBuf::from("results/home_1.png")),
        };
        let line = format_line("home", &status, Duration::from_millis(5));
        assert!(line.contains("FAIL"));
        assert!(line.contains("100 pixels, 1.00000%"));
        assert!(line.contains("-> results/home_1.png"));
    }

    #[test]
    fn failure_hint_names_the_configured_results_dir() {
        let hint = failure_hint(2, Path::new("ci/out/reports"));
        assert_eq!(
            hint,
            "2 screen(s) have visual differences. See the reports in ci/out/reports."
        );
    }

    #[test]
    fn fail_line_without_report_has_no_arrow() {
        let status = SnapshotStatus::Fail {
            diff_pixels: 1,
            percent: 0.5,
            report: None,
        };
        assert!(!format_line("home", &status, Duration::ZERO).contains("->"));
    }
}
