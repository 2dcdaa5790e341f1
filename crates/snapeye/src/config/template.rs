use std::path::Path;

use anyhow::{Context, Result};

use super::{CONFIG_DIR, CONFIG_FILE};

/// Hand-crafted config template with commented-out keys.
/// Used by `snapeye init` instead of `toml::to_string_pretty()` so that
/// users can see the available knobs with their defaults.
pub(crate) const CONFIG_TEMPLATE: &str = r#"# ─────────────────────────────────────────────────────────
# Baseline store: paths relative to the project root.
# ─────────────────────────────────────────────────────────
[paths]
# expected = ".snapeye/expected"    # baselines, commit these
# results = ".snapeye/results"      # difference reports
# tmp = ".snapeye/tmp"              # latest capture per screen

# ─────────────────────────────────────────────────────────
# Comparison: all fields optional.
# ─────────────────────────────────────────────────────────
[diff]
# tolerance = 0.0                   # percent of pixels allowed to differ (0-100)
# two_sided = true                  # separate removed/added colors in reports
# debug_masks = false               # write raw masks next to each report

# ─────────────────────────────────────────────────────────
# Verify loop
# ─────────────────────────────────────────────────────────
[verify]
# timeout_ms = 2000                 # keep re-capturing while different
# poll_ms = 200
# mode = "hard"                     # "hard" fails, "soft" only logs

[report]
# border = 10
# caption_height = 220
# title_scale = 4
# info_scale = 2

[capture]
# pattern = ".snapeye/captures/*.png"
# parallel = 4
# platform = "android"
# crop_top = 0                      # status bar rows
# crop_bottom = 0                   # navigation bar rows
"#;

const GITIGNORE: &str = "results/\ntmp/\n";

pub fn config_file_exists() -> bool {
    Path::new(CONFIG_DIR).join(CONFIG_FILE).exists()
}

pub fn write_gitignore(force: bool) -> Result<()> {
    let path = Path::new(CONFIG_DIR).join(".gitignore");
    if !force && path.exists() {
        return Ok(());
    }
    std::fs::write(&path, GITIGNORE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write the hand-crafted config template (with commented-out keys).
pub fn write_template() -> Result<()> {
    let dir = Path::new(CONFIG_DIR);
    std::fs::create_dir_all(dir).context("Failed to create .snapeye directory")?;
    let path = dir.join(CONFIG_FILE);
    std::fs::write(&path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
