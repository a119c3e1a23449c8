//! Loading of name configurations from disk.

use std::fs;
use std::path::{Path, PathBuf};

use apdu_view::config::{Warning, CONFIG_PATH};
use apdu_view::Registry;
use tracing::{debug, info};

use crate::Result;

/// Outcome of looking for the configuration of a workspace.
#[derive(Debug)]
pub enum Loaded {
    Merged {
        path: PathBuf,
        warnings: Vec<Warning>,
    },

    /// The workspace has no configuration file.
    Missing(PathBuf),

    /// The workspace root does not exist.
    NoWorkspace,
}

/// Path of the configuration file inside the workspace.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_PATH)
}

/// Merges the configuration of the workspace, if any.
pub fn load_workspace(registry: &mut Registry, root: &Path) -> Result<Loaded> {
    if !root.is_dir() {
        return Ok(Loaded::NoWorkspace);
    }

    let path = config_path(root);
    if !path.is_file() {
        debug!("No configuration at {}", path.display());

        return Ok(Loaded::Missing(path));
    }

    let warnings = load_file(registry, &path)?;

    Ok(Loaded::Merged { path, warnings })
}

/// Merges a configuration file.
pub fn load_file(registry: &mut Registry, path: &Path) -> Result<Vec<Warning>> {
    let text = fs::read_to_string(path)?;
    let warnings = registry.merge_str(&text)?;

    info!(
        "Loaded {} with {} warning(s)",
        path.display(),
        warnings.len()
    );

    Ok(warnings)
}
