use std::path::Path;

use anyhow::Result;

use sectionnav_core::NavConfig;

pub fn run(config: &NavConfig, path: &Path, write: bool) -> Result<()> {
    if write {
        if path.exists() {
            println!("Config already exists at {}", path.display());
            return Ok(());
        }
        NavConfig::default().save_to(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
