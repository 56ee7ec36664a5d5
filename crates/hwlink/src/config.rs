//! CLI wrappers around `hwlink-config` that honour `--config`.

use std::path::PathBuf;

use hwlink_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub fn path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(hwlink_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(hwlink_config::load_config_from(&path(global))?)
}
