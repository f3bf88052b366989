use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeSettings {
    pub presets_dir: PathBuf,
    pub specs_dir: PathBuf,
    pub schema_path: PathBuf,
    pub template_path: PathBuf,
    pub seed: Option<u64>,
}

impl Default for ForgeSettings {
    fn default() -> Self {
        Self {
            presets_dir: PathBuf::from("presets"),
            specs_dir: PathBuf::from("specs"),
            schema_path: PathBuf::from("patch_schema.json"),
            template_path: PathBuf::from("init.syx"),
            seed: None,
        }
    }
}

impl ForgeSettings {
    /// Seeded from `seed` when set, otherwise from OS entropy.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Where an invocation writes new files, and the stamp that goes into
/// every file name it synthesizes.
#[derive(Debug, Clone)]
pub struct Workspace {
    presets_dir: PathBuf,
    stamp: String,
}

impl Workspace {
    pub fn new(presets_dir: impl Into<PathBuf>) -> Self {
        Self::with_stamp(presets_dir, chrono::Utc::now().timestamp().to_string())
    }

    pub fn with_stamp(presets_dir: impl Into<PathBuf>, stamp: impl Into<String>) -> Self {
        Self {
            presets_dir: presets_dir.into(),
            stamp: stamp.into(),
        }
    }

    pub fn from_settings(settings: &ForgeSettings) -> Self {
        Self::new(&settings.presets_dir)
    }

    pub fn presets_dir(&self) -> &Path {
        &self.presets_dir
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// `<Category>_<name>_<stamp>.syx`
    pub fn patch_file_name(&self, category: &str, name: &str) -> String {
        format!(
            "{}_{}_{}.syx",
            file_component(category),
            file_component(name),
            self.stamp
        )
    }

    /// `<stem>_backup_<stamp>.syx` next to `path`, never clobbering an
    /// earlier backup.
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let candidate = path.with_file_name(format!("{stem}_backup_{}.syx", self.stamp));
        unique_path(candidate, &HashSet::new())
    }
}

/// Keeps preset names from escaping the output directory.
pub fn file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' => '_',
            other => other,
        })
        .collect()
}

/// Returns `candidate`, or `candidate` with a `_2`, `_3`, ... suffix on the
/// stem, whichever neither exists on disk nor is in `claimed`.
pub fn unique_path(candidate: PathBuf, claimed: &HashSet<PathBuf>) -> PathBuf {
    if !candidate.exists() && !claimed.contains(&candidate) {
        return candidate;
    }
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 2usize;
    loop {
        let next = candidate.with_file_name(format!("{stem}_{n}{ext}"));
        if !next.exists() && !claimed.contains(&next) {
            return next;
        }
        n += 1;
    }
}
