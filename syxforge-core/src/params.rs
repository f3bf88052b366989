use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::patch::PARAM_REGION;
use crate::{ForgeError, Result};

/// Metadata for one synth parameter as shipped in the per-category spec files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub min: i64,
    pub max: i64,
    #[serde(default)]
    pub default: i64,
    pub sysex_offset: usize,
    #[serde(default = "default_sysex_length")]
    pub sysex_length: usize,
    #[serde(default)]
    pub scale: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub section: String,
}

fn default_sysex_length() -> usize {
    1
}

/// Parameter specs keyed by name. Ordered so that sampling and signatures
/// walk parameters in the same sequence on every run.
pub type ParamSpecs = BTreeMap<String, ParamSpec>;

/// One concrete value per parameter.
pub type Assignment = BTreeMap<String, i64>;

pub fn parse_param_specs(json: &str) -> Result<ParamSpecs> {
    let specs: ParamSpecs = serde_json::from_str(json)?;
    validate_param_specs(&specs)?;
    Ok(specs)
}

pub fn load_param_specs(path: &Path) -> Result<ParamSpecs> {
    let raw = fs::read_to_string(path).map_err(|err| {
        ForgeError::Config(format!(
            "failed to read spec JSON '{}': {err}",
            path.display()
        ))
    })?;
    parse_param_specs(&raw)
}

/// `<specs_dir>/<Category>.json`
pub fn category_spec_path(specs_dir: &Path, category: &str) -> PathBuf {
    specs_dir.join(format!("{category}.json"))
}

/// Every parameter must land inside the parameter region so that writes can
/// never touch the header, name, category, reserved or terminator bytes.
pub fn validate_param_specs(specs: &ParamSpecs) -> Result<()> {
    for (name, spec) in specs {
        if !PARAM_REGION.contains(&spec.sysex_offset) {
            return Err(ForgeError::Config(format!(
                "parameter '{name}' has sysex_offset {} outside the parameter region {}..={}",
                spec.sysex_offset,
                PARAM_REGION.start(),
                PARAM_REGION.end()
            )));
        }
    }
    Ok(())
}
