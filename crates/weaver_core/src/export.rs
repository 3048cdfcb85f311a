use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::model::Catalog;

pub const CLASSES_FILE: &str = "classes.json";
pub const SPELLS_FILE: &str = "spells.json";

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub classes_path: PathBuf,
    pub spells_path: PathBuf,
    pub classes: usize,
    pub spells: usize,
}

/// Write `classes.json` and `spells.json` into `output_dir`, creating it if needed.
pub fn write_json(output_dir: &Path, catalog: &Catalog) -> Result<ExportReport> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let classes_path = output_dir.join(CLASSES_FILE);
    write_pretty(&classes_path, &catalog.classes)?;
    let spells_path = output_dir.join(SPELLS_FILE);
    write_pretty(&spells_path, &catalog.spells)?;

    info!(dir = %output_dir.display(), "wrote JSON catalog");
    Ok(ExportReport {
        classes_path,
        spells_path,
        classes: catalog.classes.len(),
        spells: catalog.spells.len(),
    })
}

fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))
}
