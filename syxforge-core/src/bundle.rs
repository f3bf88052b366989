use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::names::canonical_name;
use crate::patch::{Record, PATCH_SIZE};
use crate::{ForgeError, Result, Warning};

/// An ordered run of records, addressed by 1-based position externally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    records: Vec<Record>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % PATCH_SIZE != 0 {
            return Err(ForgeError::BundleSize(bytes.len()));
        }
        let records = bytes
            .chunks_exact(PATCH_SIZE)
            .map(Record::from_bytes)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { records })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read(path)?;
        Self::from_file_bytes(path, &raw)
    }

    /// Like `from_bytes`, but a ragged length is reported against `path`.
    pub fn from_file_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        Self::from_bytes(bytes).map_err(|err| match err {
            ForgeError::BundleSize(len) => ForgeError::Layout {
                path: path.to_path_buf(),
                len,
            },
            other => other,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.records.len() * PATCH_SIZE);
        for record in &self.records {
            out.extend_from_slice(record.as_bytes());
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Swaps in `record` at `index`, handing back the old one. `None` when
    /// the index is past the end, in which case nothing changes.
    pub fn replace(&mut self, index: usize, record: Record) -> Option<Record> {
        let slot = self.records.get_mut(index)?;
        Some(std::mem::replace(slot, record))
    }

    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(Record::name).collect()
    }

    pub fn summaries(&self) -> Vec<PatchSummary> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| PatchSummary::of(index, record))
            .collect()
    }
}

/// `(position, name, category)` for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSummary {
    pub position: usize,
    pub name: String,
    pub category: &'static str,
    pub category_code: u8,
}

impl PatchSummary {
    pub fn of(index: usize, record: &Record) -> Self {
        Self {
            position: index + 1,
            name: record.name(),
            category: record.category_name(),
            category_code: record.category_code(),
        }
    }
}

impl fmt::Display for PatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:2}: {} ({})", self.position, self.name, self.category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceTarget {
    /// 0-based slot in the bundle.
    pub index: usize,
    /// Set when the target was named rather than numbered.
    pub matched_name: Option<String>,
}

impl ReplaceTarget {
    pub fn position(&self) -> usize {
        self.index + 1
    }
}

/// Resolves a comma-separated list of 1-based positions and/or names against
/// the bundle's current names. Numbers are always positions; anything else
/// is matched by name ignoring case, first match wins. Unresolvable tokens
/// become warnings. A slot named twice is kept once.
pub fn resolve_targets(list: &str, names: &[String]) -> (Vec<ReplaceTarget>, Vec<Warning>) {
    let mut targets = Vec::new();
    let mut warnings = Vec::new();
    let mut taken = HashSet::new();

    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let target = if let Ok(position) = token.parse::<i64>() {
            if position >= 1 && (position as u64) <= names.len() as u64 {
                ReplaceTarget {
                    index: position as usize - 1,
                    matched_name: None,
                }
            } else {
                crate::push_warning(&mut warnings, Warning::PositionOutOfRange { position });
                continue;
            }
        } else {
            let wanted = canonical_name(token);
            match names.iter().position(|name| canonical_name(name) == wanted) {
                Some(index) => ReplaceTarget {
                    index,
                    matched_name: Some(names[index].clone()),
                },
                None => {
                    crate::push_warning(
                        &mut warnings,
                        Warning::NameNotFound {
                            token: token.to_string(),
                        },
                    );
                    continue;
                }
            }
        };

        if taken.insert(target.index) {
            targets.push(target);
        } else {
            crate::push_warning(
                &mut warnings,
                Warning::DuplicateTarget {
                    position: target.position(),
                },
            );
        }
    }

    (targets, warnings)
}

/// Names that occur more than once (ignoring case), with every 1-based
/// position they occupy, in order of first appearance.
pub fn find_name_conflicts(names: &[String]) -> Vec<Warning> {
    let mut positions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut first_seen: Vec<(String, String)> = Vec::new();

    for (index, name) in names.iter().enumerate() {
        let key = canonical_name(name);
        let slots = positions.entry(key.clone()).or_default();
        if slots.is_empty() {
            first_seen.push((key, name.clone()));
        }
        slots.push(index + 1);
    }

    first_seen
        .into_iter()
        .filter_map(|(key, name)| {
            let slots = positions.remove(&key)?;
            (slots.len() > 1).then_some(Warning::NameConflict {
                name,
                positions: slots,
            })
        })
        .collect()
}
