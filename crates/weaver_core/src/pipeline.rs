//! One parse run over a content tree: class files first, then spells.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::{extract_class, extract_spell};
use crate::error::{BatchError, DocumentFailure, ParseError};
use crate::model::Catalog;
use crate::registry::ClassRegistry;

pub const DEFAULT_SPELLS_DIR: &str = "srd/_spells";
pub const DEFAULT_CLASSES_DIR: &str = "srd/_docs/character/classes";

/// Where spell and class documents live inside a content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub spells_dir: String,
    pub classes_dir: String,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            spells_dir: DEFAULT_SPELLS_DIR.to_string(),
            classes_dir: DEFAULT_CLASSES_DIR.to_string(),
        }
    }
}

impl SourceLayout {
    pub fn subpaths(&self) -> Vec<String> {
        vec![self.spells_dir.clone(), self.classes_dir.clone()]
    }
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Fail when a spell names a class that no class file describes.
    pub require_localized_classes: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            require_localized_classes: true,
        }
    }
}

pub fn parse_tree(
    root: &Path,
    layout: &SourceLayout,
    options: &ParseOptions,
) -> Result<Catalog, BatchError> {
    let mut registry = ClassRegistry::new();
    let mut failures = Vec::new();

    let classes_dir = root.join(&layout.classes_dir);
    if classes_dir.is_dir() {
        let class_files = markdown_files(&classes_dir)?;
        info!(count = class_files.len(), dir = %classes_dir.display(), "parsing class files");
        for path in class_files {
            let contents = read_document(&path)?;
            match extract_class(&file_stem(&path), &contents) {
                Ok(entry) => {
                    let id = registry.register_localized(&entry.name, &entry.name_ua);
                    debug!(id, name = %entry.name, "registered class");
                }
                Err(error) => failures.push(DocumentFailure { path, error }),
            }
        }
    } else {
        warn!(dir = %classes_dir.display(), "classes directory not found, skipping class files");
    }

    let spells_dir = root.join(&layout.spells_dir);
    if !spells_dir.is_dir() {
        return Err(BatchError::MissingDirectory { path: spells_dir });
    }
    let spell_files = markdown_files(&spells_dir)?;
    info!(count = spell_files.len(), dir = %spells_dir.display(), "parsing spell files");

    let mut spells = Vec::with_capacity(spell_files.len());
    let mut slugs: HashMap<String, PathBuf> = HashMap::new();
    for path in spell_files {
        let stem = file_stem(&path);
        let slug = stem.to_lowercase();
        if let Some(first) = slugs.get(&slug) {
            failures.push(DocumentFailure {
                error: ParseError::DuplicateSlug {
                    slug,
                    first: first.clone(),
                },
                path,
            });
            continue;
        }
        slugs.insert(slug, path.clone());

        let contents = read_document(&path)?;
        let id = spells.len() as i64 + 1;
        match extract_spell(&stem, &contents, &mut registry, id) {
            Ok(spell) => {
                debug!(id, slug = %spell.slug, "parsed spell");
                spells.push(spell);
            }
            Err(error) => failures.push(DocumentFailure { path, error }),
        }
    }

    if !failures.is_empty() {
        return Err(BatchError::Documents { failures });
    }

    if options.require_localized_classes {
        let names: Vec<String> = registry
            .unlocalized()
            .into_iter()
            .map(|class| class.name.clone())
            .collect();
        if !names.is_empty() {
            return Err(BatchError::UnlocalizedClasses { names });
        }
    } else {
        for class in registry.unlocalized() {
            warn!(name = %class.name, "class has no localized name");
        }
    }

    info!(
        spells = spells.len(),
        classes = registry.len(),
        "parse run complete"
    );
    Ok(Catalog {
        classes: registry.into_classes(),
        spells,
    })
}

/// `*.md` files directly inside `dir`, sorted by file name.
fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|error| BatchError::Io {
            path: dir.to_path_buf(),
            source: error.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        out.push(entry.into_path());
    }
    Ok(out)
}

fn read_document(path: &Path) -> Result<String, BatchError> {
    fs::read_to_string(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}
