use anyhow::{Result, bail};

use snapeye::config;
use snapeye::store::Store;

/// `snapeye init`: create .snapeye/config.toml and the store directories.
pub fn init(force: bool) -> Result<()> {
    if !force && config::config_file_exists() {
        bail!(".snapeye/config.toml already exists (use --force to overwrite)");
    }

    config::write_template()?;
    config::write_gitignore(force)?;
    Store::default().ensure_dirs()?;

    let verb = if force { "Regenerated" } else { "Created" };
    println!("{verb} .snapeye/config.toml");
    Ok(())
}
