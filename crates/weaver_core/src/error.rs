use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn one source document into a record.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no `---` delimited front matter block found")]
    MissingFrontMatter,

    #[error("front matter is not valid YAML: {0}")]
    MalformedFrontMatter(#[from] serde_yaml::Error),

    #[error("front matter field `{field}` is missing or malformed")]
    MissingField { field: &'static str },

    #[error("unrecognized component symbol \"{symbol}\"")]
    UnrecognizedComponentSymbol { symbol: String },

    #[error("slug `{slug}` is already used by {}", first.display())]
    DuplicateSlug { slug: String, first: PathBuf },
}

/// Failure of the external content fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("content tree not found: {}", path.display())]
    MissingTree { path: PathBuf },

    #[error("failed to remove {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure inside the catalog load transaction. Nothing from the attempt is committed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("load transaction failed while {stage}; all changes rolled back: {source}")]
    Transaction {
        stage: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("spell {spell_id} has components that cannot be encoded: {source}")]
    Encode {
        spell_id: i64,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: ParseError,
}

/// A parse run that produced no catalog.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("source directory not found: {}", path.display())]
    MissingDirectory { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} document(s) failed to parse:\n{}", failures.len(), render_failures(failures))]
    Documents { failures: Vec<DocumentFailure> },

    #[error("classes referenced by spells have no class file: {}", names.join(", "))]
    UnlocalizedClasses { names: Vec<String> },
}

fn render_failures(failures: &[DocumentFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("  - {}: {}", failure.path.display(), failure.error))
        .collect::<Vec<_>>()
        .join("\n")
}
