//! Print or write the configuration.

use std::path::Path;

use fungen_common::AppConfig;

pub fn run(config: &AppConfig, path: &Path, write: bool) -> anyhow::Result<()> {
    if write {
        config
            .save_to(path)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
        println!("Configuration written to: {}", path.display());
        return Ok(());
    }

    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
