//! Config command implementations

use std::path::Path;

use anyhow::{Context, Result};

use adbr_core::config::{self, ConfigFile};

use crate::output::{print_error, print_info, print_success};

/// Show the effective configuration as TOML
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path);

    let effective = config::load_config_file(config_path)
        .with_context(|| format!("Failed to load config from {:?}", path))?;

    if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
    } else {
        print_info(&format!("No configuration file at {:?}, showing defaults", path));
    }
    println!();

    let rendered = toml::to_string_pretty(&effective).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

/// Write the default configuration, refusing to clobber an existing file
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(&path, &ConfigFile::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}
