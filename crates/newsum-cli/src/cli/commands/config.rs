//! `newsum config` – show where the config lives and what is in effect.

use anyhow::Result;
use newsum_core::config::{self, NewsumConfig};

pub fn run_config(cfg: &NewsumConfig) -> Result<()> {
    let path = config::config_path()?;
    println!("# {}", path.display());
    print!("{}", cfg.to_toml_string()?);
    Ok(())
}
