use serde::{Deserialize, Serialize};

use crate::capture::ChromeInsets;

pub const DEFAULT_PATTERN: &str = ".snapeye/captures/*.png";
const DEFAULT_PARALLEL: usize = 4;

/// Where captures come from and how to prepare them.
///
/// Fields are `Option`; `None` means "use default".
/// Serves both TOML deserialization (`[capture]`) and CLI argument parsing.
#[derive(Clone, Debug, Default, PartialEq, Eq, clap::Args, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Glob selecting the capture files `check` verifies
    #[arg(long)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Number of screens checked in parallel
    #[arg(long, short = 'p')]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,

    /// Platform added to baseline names (e.g. `android`, `ios`)
    #[arg(long)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Status bar rows to strip from the top of every capture
    #[arg(long)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_top: Option<u32>,

    /// Navigation bar rows to strip from the bottom of every capture
    #[arg(long)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_bottom: Option<u32>,
}

impl CaptureConfig {
    /// Overlay non-None fields from `other` onto self.
    pub fn merge(&mut self, other: &CaptureConfig) {
        if other.pattern.is_some() {
            self.pattern = other.pattern.clone();
        }
        if other.parallel.is_some() {
            self.parallel = other.parallel;
        }
        if other.platform.is_some() {
            self.platform = other.platform.clone();
        }
        if other.crop_top.is_some() {
            self.crop_top = other.crop_top;
        }
        if other.crop_bottom.is_some() {
            self.crop_bottom = other.crop_bottom;
        }
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_deref().unwrap_or(DEFAULT_PATTERN)
    }

    pub fn parallel(&self) -> usize {
        self.parallel.unwrap_or(DEFAULT_PARALLEL).max(1)
    }

    /// `None` unless at least one non-zero inset is configured.
    pub fn insets(&self) -> Option<ChromeInsets> {
        let insets = ChromeInsets {
            top: self.crop_top.unwrap_or(0),
            bottom: self.crop_bottom.unwrap_or(0),
        };
        (!insets.is_empty()).then_some(insets)
    }
}
