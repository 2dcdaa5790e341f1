use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use snapeye::config::{self, CaptureConfig};

fn parse_tolerance(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    config::validate_tolerance(v)
}

#[derive(Parser)]
#[command(
    name = "snapeye",
    about = "Pixel-exact visual regression checks for captured UI screens"
)]
pub struct Cli {
    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    /// Log per-attempt detail
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

/// Comparison knobs shared by every command that diffs images.
#[derive(Args, Debug, Default)]
pub struct DiffArgs {
    /// Percent of differing pixels still treated as the same (0-100)
    #[arg(long, value_parser = parse_tolerance)]
    pub tolerance: Option<f64>,
    /// Paint every difference in one color instead of removed/added
    #[arg(long)]
    pub single_sided: bool,
    /// Also write the raw difference masks next to each report
    #[arg(long)]
    pub debug_masks: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create .snapeye/config.toml with default settings
    Init {
        /// Overwrite existing config and gitignore
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Compare two image files directly (exit 1 when different)
    Compare {
        /// Baseline image
        expected: PathBuf,
        /// Image to check against the baseline
        actual: PathBuf,
        /// Label for the report (defaults to the actual file's stem)
        #[arg(long)]
        name: Option<String>,
        /// Print a JSON summary instead of a status line
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        diff: DiffArgs,
    },

    /// Verify one screen against its stored baseline, retrying until stable
    Verify {
        /// Logical screen name (e.g. `login` or `login.png`)
        name: String,
        /// File the capture driver keeps the current screenshot in
        #[arg(long, short = 's')]
        screenshot: PathBuf,
        /// Keep re-capturing this long while the screen differs
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Pause between captures
        #[arg(long)]
        poll_ms: Option<u64>,
        /// Log differences instead of failing
        #[arg(long)]
        soft: bool,
        #[command(flatten)]
        diff: DiffArgs,
        #[command(flatten)]
        capture: CaptureConfig,
    },

    /// Verify every capture matching the configured pattern (exit 0/1)
    Check {
        /// Only check screens whose name contains PATTERN (case-insensitive)
        #[arg(long, short = 'f')]
        filter: Option<String>,
        #[command(flatten)]
        diff: DiffArgs,
        #[command(flatten)]
        capture: CaptureConfig,
    },
}
