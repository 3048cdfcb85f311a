use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::{DEFAULT_CLASSES_DIR, DEFAULT_SPELLS_DIR, SourceLayout};

pub const DEFAULT_REPO_URL: &str = "https://github.com/Tuomari-ua/tuomari-ua.github.io";
pub const DEFAULT_GIT_BINARY: &str = "git";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WeaverConfig {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SourceSection {
    pub repo_url: Option<String>,
    pub spells_dir: Option<String>,
    pub classes_dir: Option<String>,
    pub git_binary: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct DatabaseSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OutputSection {
    pub dir: Option<PathBuf>,
}

impl WeaverConfig {
    /// Resolve the source repository URL: env WEAVER_REPO_URL > config > DEFAULT_REPO_URL.
    pub fn repo_url(&self) -> String {
        self.repo_url_with_lookup(|key| env::var(key).ok())
    }

    /// Resolve the git binary: env WEAVER_GIT > config > `git` on PATH.
    pub fn git_binary(&self) -> PathBuf {
        self.git_binary_with_lookup(|key| env::var(key).ok())
    }

    pub fn layout(&self) -> SourceLayout {
        SourceLayout {
            spells_dir: non_empty(self.source.spells_dir.as_deref())
                .unwrap_or(DEFAULT_SPELLS_DIR)
                .to_string(),
            classes_dir: non_empty(self.source.classes_dir.as_deref())
                .unwrap_or(DEFAULT_CLASSES_DIR)
                .to_string(),
        }
    }

    fn repo_url_with_lookup<F>(&self, lookup_env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        env_value(&lookup_env, "WEAVER_REPO_URL")
            .or_else(|| non_empty(self.source.repo_url.as_deref()).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_REPO_URL.to_string())
    }

    fn git_binary_with_lookup<F>(&self, lookup_env: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        env_value(&lookup_env, "WEAVER_GIT")
            .or_else(|| non_empty(self.source.git_binary.as_deref()).map(str::to_string))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_GIT_BINARY))
    }
}

/// Load and parse a WeaverConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<WeaverConfig> {
    if !config_path.exists() {
        return Ok(WeaverConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: WeaverConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Config file written by `weaver init`.
pub fn render_default_config() -> String {
    format!(
        "# weaver configuration\n\n[source]\nrepo_url = \"{DEFAULT_REPO_URL}\"\nspells_dir = \"{DEFAULT_SPELLS_DIR}\"\nclasses_dir = \"{DEFAULT_CLASSES_DIR}\"\ngit_binary = \"{DEFAULT_GIT_BINARY}\"\n\n[database]\n# path = \".weaver/data/weaver.db\"\n\n[output]\n# dir = \"output\"\n"
    )
}

fn env_value<F>(lookup_env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_env(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
