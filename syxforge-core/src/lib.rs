use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub mod bundle;
pub mod category;
pub mod descriptor;
pub mod domain;
pub mod generator;
pub mod names;
pub mod ops;
pub mod params;
pub mod patch;
pub mod schema;
pub mod settings;

pub use bundle::{Bundle, PatchSummary, ReplaceTarget};
pub use category::{category_code, category_name, CATEGORIES, UNKNOWN_CATEGORY};
pub use domain::{resolve_domains, AllowedDomain, Domains};
pub use generator::{GeneratedPatch, PatchGenerator};
pub use names::{canonical_name, NameExclusions};
pub use params::{Assignment, ParamSpec, ParamSpecs};
pub use patch::{PatchCodec, Record, PATCH_SIZE};
pub use schema::{AssignmentValidator, PatchSchema, SchemaRange};
pub use settings::{ForgeSettings, Workspace};

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("bundle size {0} bytes is not a multiple of 176")]
    BundleSize(usize),
    #[error("{}: size {} bytes is not a multiple of 176", .path.display(), .len)]
    Layout { path: PathBuf, len: usize },
    #[error("record must be exactly 176 bytes, got {0}")]
    RecordSize(usize),
    #[error("file '{}' is not a single preset file (size: {} bytes, expected: 176)", .path.display(), .len)]
    NotSingleRecord { path: PathBuf, len: usize },
    #[error("domain exhausted: produced {produced} of {requested} distinct patches")]
    DomainExhausted { requested: usize, produced: usize },
    #[error("no unused preset names left in the dictionary")]
    NamesExhausted,
    #[error("nothing to do: {0}")]
    NoInput(String),
}

pub type Result<T> = std::result::Result<T, ForgeError>;

/// Non-fatal conditions. Operations log these as they happen and carry them
/// in their reports; the operation continues with whatever is still valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    PositionOutOfRange { position: i64 },
    NameNotFound { token: String },
    DuplicateTarget { position: usize },
    NameConflict { name: String, positions: Vec<usize> },
    SkippedInput { path: PathBuf, reason: String },
    NameTruncated { from: String, to: String },
    RemoveFailed { path: PathBuf, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::PositionOutOfRange { position } => {
                write!(f, "position {position} out of range, skipping")
            }
            Warning::NameNotFound { token } => {
                write!(f, "'{token}' not found as preset name or position")
            }
            Warning::DuplicateTarget { position } => {
                write!(f, "position {position} listed more than once, using it once")
            }
            Warning::NameConflict { name, positions } => {
                let list: Vec<String> = positions.iter().map(|p| p.to_string()).collect();
                write!(
                    f,
                    "'{name}' appears at positions {} (duplicates are preserved)",
                    list.join(", ")
                )
            }
            Warning::SkippedInput { path, reason } => {
                write!(f, "skipping '{}': {reason}", path.display())
            }
            Warning::NameTruncated { from, to } => {
                write!(f, "name '{from}' is longer than 8 characters, truncated to '{to}'")
            }
            Warning::RemoveFailed { path, reason } => {
                write!(f, "failed to remove '{}': {reason}", path.display())
            }
        }
    }
}

/// Logs a warning and records it for the caller's report.
pub(crate) fn push_warning(warnings: &mut Vec<Warning>, warning: Warning) {
    tracing::warn!(event = "warning", "{warning}");
    warnings.push(warning);
}
