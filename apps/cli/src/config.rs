//! CLI configuration loading and merging.

use anyhow::{Context, Result};
use geotune_training::WorkflowConfig;
use std::path::{Path, PathBuf};

/// Load and merge workflow configuration.
///
/// Configuration precedence:
/// 1. CLI arguments (`--config`, `--shared-root`)
/// 2. Environment variables (`GEOTUNE_*`)
/// 3. Local config file (./.geotunerc)
/// 4. Global config file (~/.geotune/config.toml)
/// 5. Defaults
pub fn load_config(explicit: Option<&Path>, shared_root: Option<PathBuf>) -> Result<WorkflowConfig> {
    let mut config = WorkflowConfig::load(explicit).context("Failed to load configuration")?;
    if let Some(root) = shared_root {
        config.shared_root = root;
    }
    Ok(config)
}
