mod cli;
mod commands;

use clap::Parser;
use snapeye::config::{CaptureConfig, CliOverrides, ResolvedRunConfig};
use tracing_subscriber::EnvFilter;

fn default_filter(cli: &cli::Cli) -> &'static str {
    if cli.quiet {
        "snapeye=warn"
    } else if cli.verbose {
        "snapeye=debug"
    } else {
        "snapeye=info"
    }
}

fn overrides(diff: cli::DiffArgs, capture: CaptureConfig) -> CliOverrides {
    CliOverrides {
        tolerance: diff.tolerance,
        single_sided: diff.single_sided,
        debug_masks: diff.debug_masks,
        capture,
        ..CliOverrides::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let default = default_filter(&cli);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Command::Init { force } => {
            commands::init(force)?;
        }
        cli::Command::Compare {
            expected,
            actual,
            name,
            json,
            diff,
        } => {
            let config = ResolvedRunConfig::new(overrides(diff, CaptureConfig::default()))?;
            let code = commands::compare(config, &expected, &actual, name.as_deref(), json)?;
            std::process::exit(code);
        }
        cli::Command::Verify {
            name,
            screenshot,
            timeout_ms,
            poll_ms,
            soft,
            diff,
            capture,
        } => {
            let config = ResolvedRunConfig::new(CliOverrides {
                timeout_ms,
                poll_ms,
                soft,
                ..overrides(diff, capture)
            })?;
            let code = commands::verify(config, name, screenshot).await?;
            std::process::exit(code);
        }
        cli::Command::Check {
            filter,
            diff,
            capture,
        } => {
            let config = ResolvedRunConfig::new(overrides(diff, capture))?;
            let code = commands::check(config, filter.as_deref()).await?;
            std::process::exit(code);
        }
    }

    Ok(())
}
