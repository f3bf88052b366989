use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::bundle::Bundle;
use crate::Result;

/// The sidecar lives next to the bundle with a `.txt` extension. A bundle
/// that is itself named `*.txt` gets `.txt` appended so the two never share
/// a path.
pub fn descriptor_path(bundle_path: &Path) -> PathBuf {
    let already_txt = bundle_path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);
    if already_txt {
        let mut raw = bundle_path.as_os_str().to_os_string();
        raw.push(".txt");
        PathBuf::from(raw)
    } else {
        bundle_path.with_extension("txt")
    }
}

pub fn render_descriptor(bundle: &Bundle) -> String {
    let mut out = String::new();
    for summary in bundle.summaries() {
        out.push_str(&summary.to_string());
        out.push('\n');
    }
    out
}

/// Rewrites the sidecar for a multi-record bundle. Single records get no
/// descriptor; `None` is returned in that case.
pub fn write_descriptor(bundle_path: &Path, bundle: &Bundle) -> Result<Option<PathBuf>> {
    if bundle.len() <= 1 {
        return Ok(None);
    }
    let path = descriptor_path(bundle_path);
    fs::write(&path, render_descriptor(bundle))?;
    info!(event = "descriptor_written", path = %path.display(), patches = bundle.len());
    Ok(Some(path))
}
