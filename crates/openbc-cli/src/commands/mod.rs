pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use openbc_types::config::OpenBcConfig;
use std::path::Path;

pub(crate) fn load_config(path: &Path) -> Result<OpenBcConfig> {
    OpenBcConfig::from_file(&path.to_string_lossy())
        .with_context(|| format!("failed to load config {}", path.display()))
}
