use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use super::capture::CaptureConfig;
use super::{Config, load_or_default, validate_tolerance};
use crate::compare::DiffOptions;
use crate::store::Store;
use crate::verify::{FailMode, Verifier, VerifyOptions};

/// Values extracted from the CLI that participate in the merge.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub tolerance: Option<f64>,
    pub single_sided: bool,
    pub debug_masks: bool,
    pub timeout_ms: Option<u64>,
    pub poll_ms: Option<u64>,
    pub soft: bool,
    pub capture: CaptureConfig,
}

/// Values read from `SNAPEYE_*` environment variables.
#[derive(Debug, Default)]
pub struct EnvOverrides {
    pub tolerance: Option<f64>,
    pub expected_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let tolerance = get("SNAPEYE_TOLERANCE")
            .map(|v| v.parse::<f64>())
            .transpose()
            .context("SNAPEYE_TOLERANCE must be a valid float")?;
        Ok(Self {
            tolerance,
            expected_dir: get("SNAPEYE_EXPECTED_DIR").map(PathBuf::from),
            results_dir: get("SNAPEYE_RESULTS_DIR").map(PathBuf::from),
        })
    }
}

/// Fully resolved config after CLI > env > file > defaults merge.
#[derive(Debug)]
pub struct ResolvedRunConfig {
    pub store: Store,
    pub verify: VerifyOptions,
    pub capture: CaptureConfig,
}

impl ResolvedRunConfig {
    pub fn new(cli: CliOverrides) -> Result<Self> {
        let file = load_or_default()?;
        let env = EnvOverrides::from_env()?;
        Self::merge(file, env, cli)
    }

    fn merge(file: Config, env: EnvOverrides, cli: CliOverrides) -> Result<Self> {
        let tolerance = cli
            .tolerance
            .or(env.tolerance)
            .unwrap_or(file.diff.tolerance);
        validate_tolerance(tolerance).map_err(|e| anyhow::anyhow!("{e}"))?;

        let store = Store::new(
            env.expected_dir.unwrap_or_else(|| file.paths.expected()),
            env.results_dir.unwrap_or_else(|| file.paths.results()),
            file.paths.tmp(),
        );

        let mut capture = file.capture;
        capture.merge(&cli.capture);

        let verify = VerifyOptions {
            diff: DiffOptions {
                tolerance_percent: tolerance,
                two_sided: file.diff.two_sided && !cli.single_sided,
                debug_masks: file.diff.debug_masks || cli.debug_masks,
            },
            layout: file.report,
            timeout: Duration::from_millis(cli.timeout_ms.unwrap_or(file.verify.timeout_ms)),
            poll_interval: Duration::from_millis(cli.poll_ms.unwrap_or(file.verify.poll_ms)),
            mode: if cli.soft {
                FailMode::Soft
            } else {
                file.verify.mode
            },
            crop_chrome: capture.insets().is_some(),
        };

        Ok(Self {
            store,
            verify,
            capture,
        })
    }

    pub fn verifier(&self) -> Verifier {
        Verifier::new(self.store.clone(), self.verify.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    fn env(pairs: &[(&str, &str)]) -> EnvOverrides {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvOverrides::from_lookup(|k| map.get(k).cloned()).unwrap()
    }

    #[test]
    fn defaults_without_any_layer() {
        let r = ResolvedRunConfig::merge(
            Config::default(),
            EnvOverrides::default(),
            CliOverrides::default(),
        )
        .unwrap();
        assert_eq!(r.verify.diff.tolerance_percent, 0.0);
        assert!(r.verify.diff.two_sided);
        assert_eq!(r.verify.timeout, Duration::from_secs(2));
        assert_eq!(r.verify.mode, FailMode::Hard);
        assert!(!r.verify.crop_chrome);
        assert_eq!(r.store.expected_dir(), Path::new(".snapeye/expected"));
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let mut file = Config::default();
        file.diff.tolerance = 1.0;

        let r = ResolvedRunConfig::merge(
            file.clone(),
            env(&[("SNAPEYE_TOLERANCE", "2.0")]),
            CliOverrides::default(),
        )
        .unwrap();
        assert_eq!(r.verify.diff.tolerance_percent, 2.0);

        let r = ResolvedRunConfig::merge(
            file.clone(),
            env(&[("SNAPEYE_TOLERANCE", "2.0")]),
            CliOverrides {
                tolerance: Some(3.0),
                ..CliOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(r.verify.diff.tolerance_percent, 3.0);

        let r =
            ResolvedRunConfig::merge(file, EnvOverrides::default(), CliOverrides::default())
                .unwrap();
        assert_eq!(r.verify.diff.tolerance_percent, 1.0);
    }

    #[test]
    fn env_relocates_store_directories() {
        let r = ResolvedRunConfig::merge(
            Config::default(),
            env(&[
                ("SNAPEYE_EXPECTED_DIR", "ci/expected"),
                ("SNAPEYE_RESULTS_DIR", "ci/results"),
            ]),
            CliOverrides::default(),
        )
        .unwrap();
        assert_eq!(r.store.expected_dir(), Path::new("ci/expected"));
        assert_eq!(r.store.results_dir(), Path::new("ci/results"));
    }

    #[test]
    fn invalid_env_tolerance_is_an_error() {
        let get = |k: &str| (k == "SNAPEYE_TOLERANCE").then(|| "lots".to_string());
        assert!(EnvOverrides::from_lookup(get).is_err());
    }

    #[test]
    fn out_of_range_cli_tolerance_is_rejected() {
        let err = ResolvedRunConfig::merge(
            Config::default(),
            EnvOverrides::default(),
            CliOverrides {
                tolerance: Some(101.0),
                ..CliOverrides::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn flags_switch_mode_and_sidedness() {
        let r = ResolvedRunConfig::merge(
            Config::default(),
            EnvOverrides::default(),
            CliOverrides {
                single_sided: true,
                soft: true,
                capture: CaptureConfig {
                    crop_top: Some(24),
                    ..CaptureConfig::default()
                },
                ..CliOverrides::default()
            },
        )
        .unwrap();
        assert!(!r.verify.diff.two_sided);
        assert_eq!(r.verify.mode, FailMode::Soft);
        assert!(r.verify.crop_chrome);
    }
}
