pub mod capture;
pub mod resolve;
pub mod template;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::report::ReportLayout;
use crate::store::{BASE_DIR, EXPECTED_DIR, RESULTS_DIR, TMP_DIR};
use crate::verify::FailMode;

pub use self::capture::CaptureConfig;
pub use self::resolve::{CliOverrides, EnvOverrides, ResolvedRunConfig};
pub use self::template::{config_file_exists, write_gitignore, write_template};

pub(crate) const CONFIG_DIR: &str = BASE_DIR;
const CONFIG_FILE: &str = "config.toml";

pub fn validate_tolerance(v: f64) -> Result<f64, String> {
    if !(0.0..=100.0).contains(&v) {
        return Err(format!("tolerance must be between 0 and 100 percent, got {v}"));
    }
    Ok(v)
}

/// Directory layout of the baseline store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub expected: Option<PathBuf>,
    #[serde(default)]
    pub results: Option<PathBuf>,
    #[serde(default)]
    pub tmp: Option<PathBuf>,
}

impl PathsConfig {
    pub fn expected(&self) -> PathBuf {
        self.expected
            .clone()
            .unwrap_or_else(|| Path::new(BASE_DIR).join(EXPECTED_DIR))
    }

    pub fn results(&self) -> PathBuf {
        self.results
            .clone()
            .unwrap_or_else(|| Path::new(BASE_DIR).join(RESULTS_DIR))
    }

    pub fn tmp(&self) -> PathBuf {
        self.tmp
            .clone()
            .unwrap_or_else(|| Path::new(BASE_DIR).join(TMP_DIR))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Percent of differing pixels still considered "same" (0-100).
    #[serde(default)]
    pub tolerance: f64,
    #[serde(default = "default_true")]
    pub two_sided: bool,
    #[serde(default)]
    pub debug_masks: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            two_sided: true,
            debug_masks: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default)]
    pub mode: FailMode,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            poll_ms: default_poll_ms(),
            mode: FailMode::default(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_poll_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub report: ReportLayout,
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Parse config text; `origin` names the source in error messages.
pub fn parse(content: &str, origin: &Path) -> Result<Config> {
    let config: Config =
        toml::from_str(content).with_context(|| format!("Failed to parse {}", origin.display()))?;
    validate_tolerance(config.diff.tolerance).map_err(|e| anyhow::anyhow!("diff.{e}"))?;
    config
        .report
        .validate()
        .map_err(|e| anyhow::anyhow!("report.{e}"))?;
    Ok(config)
}

pub fn load_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse(&content, path)
}

/// The project config file, or defaults when there is none.
pub fn load_or_default() -> Result<Config> {
    let path = Path::new(CONFIG_DIR).join(CONFIG_FILE);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    load_from(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(s: &str) -> Result<Config> {
        parse(s, Path::new("config.toml"))
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = parse_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.diff.two_sided);
        assert_eq!(config.verify.timeout_ms, 2000);
        assert_eq!(config.report, ReportLayout::default());
        assert_eq!(
            config.paths.expected(),
            Path::new(".snapeye").join("expected")
        );
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_str(
            r#"
            [paths]
            expected = "baselines"

            [diff]
            tolerance = 0.5
            two_sided = false

            [verify]
            timeout_ms = 5000
            mode = "soft"

            [report]
            caption_height = 300

            [capture]
            platform = "android"
            crop_top = 24
            "#,
        )
        .unwrap();
        assert_eq!(config.paths.expected(), Path::new("baselines"));
        assert_eq!(config.diff.tolerance, 0.5);
        assert!(!config.diff.two_sided);
        assert_eq!(config.verify.timeout_ms, 5000);
        assert_eq!(config.verify.poll_ms, 200);
        assert_eq!(config.verify.mode, FailMode::Soft);
        assert_eq!(config.report.caption_height, 300);
        assert_eq!(config.report.border, 10);
        assert_eq!(config.capture.platform.as_deref(), Some("android"));
    }

    #[test]
    fn out_of_range_tolerance_is_rejected() {
        let err = parse_str("[diff]\ntolerance = 150.0\n").unwrap_err();
        assert!(format!("{err:#}").contains("diff.tolerance"));
        assert!(validate_tolerance(-0.1).is_err());
        assert_eq!(validate_tolerance(100.0), Ok(100.0));
    }

    #[test]
    fn oversized_report_layout_is_rejected() {
        let err = parse_str("[report]\nborder = 4294967295\n").unwrap_err();
        assert!(format!("{err:#}").contains("report.border"));
        let err = parse_str("[report]\ntitle_scale = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("report.title_scale"));
    }

    #[test]
    fn malformed_file_names_its_path() {
        let err = parse_str("[diff\n").unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn template_parses_to_defaults() {
        let config = parse_str(template::CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, Config::default());
    }
}
