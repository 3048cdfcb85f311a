use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{WeaverConfig, render_default_config};

pub const STATE_DIR_NAME: &str = ".weaver";
pub const DATABASE_FILENAME: &str = "weaver.db";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Heuristic,
    Config,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Heuristic => "heuristic",
            Self::Config => "config",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self { cwd })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub source_dir: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub output_dir: PathBuf,
    pub root_source: ValueSource,
    pub data_source: ValueSource,
    pub db_source: ValueSource,
    pub config_source: ValueSource,
    pub output_source: ValueSource,
}

impl ResolvedPaths {
    pub fn diagnostics(&self) -> String {
        format!(
            "project_root={} ({})\nstate_dir={}\nsource_dir={}\ndata_dir={} ({})\ndb_path={} ({})\nconfig_path={} ({})\noutput_dir={} ({})",
            normalize_for_display(&self.project_root),
            self.root_source.as_str(),
            normalize_for_display(&self.state_dir),
            normalize_for_display(&self.source_dir),
            normalize_for_display(&self.data_dir),
            self.data_source.as_str(),
            normalize_for_display(&self.db_path),
            self.db_source.as_str(),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
            normalize_for_display(&self.output_dir),
            self.output_source.as_str(),
        )
    }

    /// Fill database and output paths from the config file where nothing
    /// stronger was given.
    pub fn apply_config(&mut self, config: &WeaverConfig) {
        if self.db_source == ValueSource::Default
            && let Some(path) = config.database.path.as_deref()
        {
            self.db_path = absolutize(path, &self.project_root);
            self.db_source = ValueSource::Config;
        }
        if self.output_source == ValueSource::Default
            && let Some(path) = config.output.dir.as_deref()
        {
            self.output_dir = absolutize(path, &self.project_root);
            self.output_source = ValueSource::Config;
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub created_dirs: Vec<PathBuf>,
    pub wrote_config: bool,
}

pub fn resolve_paths(
    context: &ResolutionContext,
    overrides: &PathOverrides,
) -> Result<ResolvedPaths> {
    resolve_paths_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_paths_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<ResolvedPaths>
where
    F: Fn(&str) -> Option<String>,
{
    let (project_root, root_source) = resolve_project_root(context, overrides, &lookup_env);

    let state_dir = project_root.join(STATE_DIR_NAME);
    let source_dir = state_dir.join("source");

    let (data_dir, data_source) = pick_path(
        overrides.data_dir.as_deref(),
        &lookup_env,
        "WEAVER_DATA_DIR",
        &project_root,
    )
    .unwrap_or_else(|| (state_dir.join("data"), ValueSource::Default));

    let (config_path, config_source) = pick_path(
        overrides.config.as_deref(),
        &lookup_env,
        "WEAVER_CONFIG",
        &project_root,
    )
    .unwrap_or_else(|| (state_dir.join("config.toml"), ValueSource::Default));

    let (db_path, db_source) = pick_path(
        overrides.database.as_deref(),
        &lookup_env,
        "WEAVER_DATABASE_PATH",
        &project_root,
    )
    .unwrap_or_else(|| (data_dir.join(DATABASE_FILENAME), ValueSource::Default));

    Ok(ResolvedPaths {
        output_dir: project_root.join(DEFAULT_OUTPUT_DIR),
        output_source: ValueSource::Default,
        project_root,
        state_dir,
        source_dir,
        data_dir,
        db_path,
        config_path,
        root_source,
        data_source,
        db_source,
        config_source,
    })
}

/// Create the state and data directories and write a starter config unless
/// one already exists (or `force` is set).
pub fn init_layout(paths: &ResolvedPaths, force: bool) -> Result<InitReport> {
    let mut created_dirs = Vec::new();
    for dir in [&paths.state_dir, &paths.data_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            created_dirs.push(dir.clone());
        }
    }

    let wrote_config = if paths.config_path.exists() && !force {
        false
    } else {
        if let Some(parent) = paths.config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&paths.config_path, render_default_config())
            .with_context(|| format!("failed to write {}", paths.config_path.display()))?;
        true
    };

    Ok(InitReport {
        created_dirs,
        wrote_config,
    })
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn pick_path<F>(
    flag: Option<&Path>,
    lookup_env: &F,
    env_key: &str,
    project_root: &Path,
) -> Option<(PathBuf, ValueSource)>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = flag {
        return Some((absolutize(path, project_root), ValueSource::Flag));
    }
    lookup_env(env_key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(|value| (absolutize(Path::new(&value), project_root), ValueSource::Env))
}

fn resolve_project_root<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: &F,
) -> (PathBuf, ValueSource)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = overrides.project_root.as_deref() {
        return (absolutize(path, &context.cwd), ValueSource::Flag);
    }

    if let Some(value) = lookup_env("WEAVER_PROJECT_ROOT")
        && !value.trim().is_empty()
    {
        return (
            absolutize(Path::new(value.trim()), &context.cwd),
            ValueSource::Env,
        );
    }

    match detect_project_root(&context.cwd) {
        Some(root) => (root, ValueSource::Heuristic),
        None => (context.cwd.clone(), ValueSource::Default),
    }
}

/// First ancestor of `cwd` (inclusive) that carries a `.weaver/` directory.
fn detect_project_root(cwd: &Path) -> Option<PathBuf> {
    let mut seen = HashSet::new();
    cwd.ancestors()
        .filter(|candidate| seen.insert(normalize_for_display(candidate)))
        .find(|candidate| candidate.join(STATE_DIR_NAME).is_dir())
        .map(Path::to_path_buf)
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
