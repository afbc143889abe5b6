use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::model::MenuEntry;
use crate::projection;

/// Writes the `{ "menu": [...] }` document, pretty-printed.
pub fn write_json(path: &Path, forest: &[MenuEntry]) -> Result<()> {
    let data = projection::serialize(forest)?;
    write_file(path, &data)?;
    info!(path = %path.display(), "menu exported as JSON");
    Ok(())
}

pub fn write_html(path: &Path, forest: &[MenuEntry]) -> Result<()> {
    write_file(path, &projection::to_html(forest))?;
    info!(path = %path.display(), "menu exported as HTML");
    Ok(())
}

fn write_file(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data).with_context(|| format!("Unable to write {}", path.display()))
}
