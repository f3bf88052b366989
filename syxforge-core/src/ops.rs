use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::bundle::{find_name_conflicts, resolve_targets, Bundle, PatchSummary};
use crate::category::{available_categories, category_code, category_name, display_order};
use crate::descriptor::write_descriptor;
use crate::generator::PatchGenerator;
use crate::names::{allocate_name, canonical_name, title_case, NameExclusions};
use crate::patch::{truncate_name, Record, PATCH_SIZE};
use crate::schema::AssignmentValidator;
use crate::settings::{unique_path, Workspace};
use crate::{push_warning, ForgeError, Result, Warning};

#[derive(Debug, Clone)]
pub struct WrittenPatch {
    pub summary: PatchSummary,
    pub path: PathBuf,
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string())
}

fn has_syx_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("syx"))
        .unwrap_or(false)
}

/// Writes one record as `<Category>_<name>_<stamp>.syx` under `dir`.
/// Two records that would share a file name in the same pass get a numeric
/// suffix instead of overwriting each other.
fn write_patch_file(
    ws: &Workspace,
    dir: &Path,
    index: usize,
    record: &Record,
    claimed: &mut HashSet<PathBuf>,
) -> Result<WrittenPatch> {
    let summary = PatchSummary::of(index, record);
    let candidate = dir.join(ws.patch_file_name(summary.category, &summary.name));
    let path = unique_path(candidate, claimed);
    fs::write(&path, record.as_bytes())?;
    claimed.insert(path.clone());
    debug!(event = "patch_file_written", path = %path.display());
    Ok(WrittenPatch { summary, path })
}

/// Creates `<presets>/<Word>` with a fresh dictionary word, retrying on
/// names that already exist.
fn create_bundle_dir<R: Rng + ?Sized>(ws: &Workspace, rng: &mut R) -> Result<(PathBuf, String)> {
    fs::create_dir_all(ws.presets_dir())?;
    let mut tried = NameExclusions::new();
    loop {
        let name = title_case(&allocate_name(rng, &tried)?);
        let dir = ws.presets_dir().join(&name);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((dir, name)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                tried.insert(&name);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DescribeReport {
    pub path: PathBuf,
    pub patches: Vec<PatchSummary>,
    pub descriptor: Option<PathBuf>,
}

pub fn describe(path: &Path) -> Result<DescribeReport> {
    let bundle = Bundle::read(path)?;
    let descriptor = write_descriptor(path, &bundle)?;
    info!(event = "bundle_described", path = %path.display(), patches = bundle.len());
    Ok(DescribeReport {
        path: path.to_path_buf(),
        patches: bundle.summaries(),
        descriptor,
    })
}

#[derive(Debug, Clone)]
pub struct SplitReport {
    pub source: PathBuf,
    /// Records in the source bundle.
    pub total: usize,
    /// `None` when nothing was written.
    pub output_dir: Option<PathBuf>,
    pub written: Vec<WrittenPatch>,
    pub warnings: Vec<Warning>,
}

impl SplitReport {
    fn new(source: &Path, total: usize) -> Self {
        Self {
            source: source.to_path_buf(),
            total,
            output_dir: None,
            written: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The bundle held one record or none, so there was nothing to take apart.
    pub fn is_single(&self) -> bool {
        self.total <= 1
    }
}

/// Writes every record of a bundle to its own file under
/// `<presets>/<stem>_split`.
pub fn split(ws: &Workspace, path: &Path) -> Result<SplitReport> {
    let bundle = Bundle::read(path)?;
    let mut report = SplitReport::new(path, bundle.len());
    if report.is_single() {
        info!(event = "split_skipped", path = %path.display(), patches = bundle.len());
        return Ok(report);
    }

    let dir = ws.presets_dir().join(format!("{}_split", file_stem(path)));
    fs::create_dir_all(&dir)?;

    let mut claimed = HashSet::new();
    for (index, record) in bundle.records().iter().enumerate() {
        report
            .written
            .push(write_patch_file(ws, &dir, index, record, &mut claimed)?);
    }

    info!(
        event = "bundle_split",
        path = %path.display(),
        written = report.written.len(),
        dir = %dir.display()
    );
    report.output_dir = Some(dir);
    Ok(report)
}

/// Like [`split`] but only for the listed positions/names, written under
/// `<presets>/<stem>_extracted`. Tokens that do not resolve are warnings.
pub fn extract(ws: &Workspace, path: &Path, list: &str) -> Result<SplitReport> {
    let bundle = Bundle::read(path)?;
    let mut report = SplitReport::new(path, bundle.len());
    if report.is_single() {
        info!(event = "extract_skipped", path = %path.display(), patches = bundle.len());
        return Ok(report);
    }

    let (targets, warnings) = resolve_targets(list, &bundle.names());
    report.warnings = warnings;

    let dir = ws.presets_dir().join(format!("{}_extracted", file_stem(path)));
    fs::create_dir_all(&dir)?;

    let mut claimed = HashSet::new();
    for target in &targets {
        let Some(record) = bundle.get(target.index) else {
            push_warning(
                &mut report.warnings,
                Warning::PositionOutOfRange {
                    position: target.position() as i64,
                },
            );
            continue;
        };
        report
            .written
            .push(write_patch_file(ws, &dir, target.index, record, &mut claimed)?);
    }

    if report.written.is_empty() {
        if let Err(err) = fs::remove_dir(&dir) {
            debug!(event = "extract_dir_kept", dir = %dir.display(), error = %err);
        }
    } else {
        info!(
            event = "bundle_extracted",
            path = %path.display(),
            written = report.written.len(),
            dir = %dir.display()
        );
        report.output_dir = Some(dir);
    }
    Ok(report)
}

#[derive(Debug, Clone)]
pub struct GroupReport {
    /// Every file that went into the bundle, with its record count.
    pub sources: Vec<(PathBuf, usize)>,
    pub output_dir: PathBuf,
    pub combined_path: PathBuf,
    pub total: usize,
    pub written: Vec<WrittenPatch>,
    pub descriptor: Option<PathBuf>,
    pub warnings: Vec<Warning>,
}

/// Directories contribute their immediate `.syx` entries, by file name.
fn expand_group_inputs(inputs: &[PathBuf], warnings: &mut Vec<Warning>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
            {
                match entry {
                    Ok(entry) => {
                        if entry.file_type().is_file() && has_syx_extension(entry.path()) {
                            files.push(entry.into_path());
                        }
                    }
                    Err(err) => push_warning(
                        warnings,
                        Warning::SkippedInput {
                            path: input.clone(),
                            reason: err.to_string(),
                        },
                    ),
                }
            }
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            push_warning(
                warnings,
                Warning::SkippedInput {
                    path: input.clone(),
                    reason: "no such file or directory".to_string(),
                },
            );
        }
    }
    files
}

/// Concatenates files and directories of presets, in argument order, into a
/// new bundle inside a freshly named directory under the presets root.
/// Duplicate names are reported and kept.
pub fn group<R: Rng + ?Sized>(ws: &Workspace, inputs: &[PathBuf], rng: &mut R) -> Result<GroupReport> {
    let mut warnings = Vec::new();
    let files = expand_group_inputs(inputs, &mut warnings);

    let mut combined = Bundle::new();
    let mut sources = Vec::new();
    for file in files {
        match Bundle::read(&file) {
            Ok(bundle) => {
                sources.push((file, bundle.len()));
                for record in bundle.into_records() {
                    combined.push(record);
                }
            }
            Err(err) => push_warning(
                &mut warnings,
                Warning::SkippedInput {
                    path: file,
                    reason: err.to_string(),
                },
            ),
        }
    }

    if combined.is_empty() {
        return Err(ForgeError::NoInput(
            "no presets found in any of the group inputs".to_string(),
        ));
    }

    for conflict in find_name_conflicts(&combined.names()) {
        push_warning(&mut warnings, conflict);
    }

    let (output_dir, dir_name) = create_bundle_dir(ws, rng)?;
    let combined_path = output_dir.join(format!("{dir_name}_grouped_{}.syx", ws.stamp()));
    combined.write(&combined_path)?;

    let mut claimed = HashSet::from([combined_path.clone()]);
    let mut written = Vec::with_capacity(combined.len());
    for (index, record) in combined.records().iter().enumerate() {
        written.push(write_patch_file(ws, &output_dir, index, record, &mut claimed)?);
    }
    let descriptor = write_descriptor(&combined_path, &combined)?;

    info!(
        event = "bundle_grouped",
        sources = sources.len(),
        patches = combined.len(),
        path = %combined_path.display()
    );
    Ok(GroupReport {
        sources,
        output_dir,
        combined_path,
        total: combined.len(),
        written,
        descriptor,
        warnings,
    })
}

#[derive(Debug, Clone)]
pub struct SortReport {
    pub path: PathBuf,
    pub before: Vec<PatchSummary>,
    pub after: Vec<PatchSummary>,
    /// Records whose position changed.
    pub moved: usize,
    pub backup: Option<PathBuf>,
    pub descriptor: Option<PathBuf>,
}

/// Reorders a bundle by category display order, then name ignoring case,
/// then original position. The untouched bytes are backed up first.
pub fn sort(ws: &Workspace, path: &Path) -> Result<SortReport> {
    let original = fs::read(path)?;
    let bundle = Bundle::from_file_bytes(path, &original)?;
    let before = bundle.summaries();

    if bundle.len() <= 1 {
        info!(event = "sort_skipped", path = %path.display(), patches = bundle.len());
        return Ok(SortReport {
            path: path.to_path_buf(),
            after: before.clone(),
            before,
            moved: 0,
            backup: None,
            descriptor: None,
        });
    }

    let mut indexed: Vec<(usize, Record)> = bundle.into_records().into_iter().enumerate().collect();
    indexed.sort_by_cached_key(|(index, record)| {
        (
            display_order(record.category_code()),
            canonical_name(&record.name()),
            *index,
        )
    });
    let moved = indexed
        .iter()
        .enumerate()
        .filter(|(position, (index, _))| position != index)
        .count();
    let sorted = Bundle::from_records(indexed.into_iter().map(|(_, record)| record).collect());

    let backup = ws.backup_path(path);
    fs::write(&backup, &original)?;
    sorted.write(path)?;
    let descriptor = write_descriptor(path, &sorted)?;

    info!(
        event = "bundle_sorted",
        path = %path.display(),
        moved,
        backup = %backup.display()
    );
    Ok(SortReport {
        path: path.to_path_buf(),
        before,
        after: sorted.summaries(),
        moved,
        backup: Some(backup),
        descriptor,
    })
}

#[derive(Debug, Clone)]
pub struct Replacement {
    pub record: Record,
    pub name: String,
    pub category: &'static str,
}

impl Replacement {
    pub fn from_record(record: Record) -> Self {
        Self {
            name: record.name(),
            category: record.category_name(),
            record,
        }
    }
}

/// Supplies the records that go into replaced slots.
pub trait ReplacementSource {
    /// Exactly `count` replacements. `exclusions` holds the names of every
    /// record that stays in the bundle.
    fn replacements(&mut self, count: usize, exclusions: &NameExclusions) -> Result<Vec<Replacement>>;
}

/// Freshly generated patches of one category.
pub struct RandomReplacements<'g, V> {
    generator: &'g mut PatchGenerator<V>,
    category: u8,
}

impl<'g, V> RandomReplacements<'g, V> {
    pub fn new(generator: &'g mut PatchGenerator<V>, category: u8) -> Self {
        Self {
            generator,
            category,
        }
    }
}

impl<V: AssignmentValidator> ReplacementSource for RandomReplacements<'_, V> {
    fn replacements(&mut self, count: usize, exclusions: &NameExclusions) -> Result<Vec<Replacement>> {
        let patches = self.generator.generate(count, self.category, exclusions)?;
        Ok(patches
            .into_iter()
            .map(|patch| Replacement {
                category: category_name(self.category),
                name: patch.name,
                record: patch.record,
            })
            .collect())
    }
}

/// Single-record donor files, handed out round-robin.
#[derive(Debug, Clone)]
pub struct DonorReplacements {
    donors: Vec<Replacement>,
}

impl DonorReplacements {
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        if records.is_empty() {
            return Err(ForgeError::NoInput(
                "no valid single preset files found for replacement".to_string(),
            ));
        }
        Ok(Self {
            donors: records.into_iter().map(Replacement::from_record).collect(),
        })
    }

    /// Loads donors, skipping (with a warning) anything that is missing or
    /// not exactly one record.
    pub fn load(paths: &[PathBuf]) -> Result<(Self, Vec<Warning>)> {
        let mut warnings = Vec::new();
        let mut records = Vec::new();
        for path in paths {
            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    push_warning(
                        &mut warnings,
                        Warning::SkippedInput {
                            path: path.clone(),
                            reason: err.to_string(),
                        },
                    );
                    continue;
                }
            };
            if bytes.len() != PATCH_SIZE {
                push_warning(
                    &mut warnings,
                    Warning::SkippedInput {
                        path: path.clone(),
                        reason: format!(
                            "not a single preset file (size: {} bytes, expected: {PATCH_SIZE})",
                            bytes.len()
                        ),
                    },
                );
                continue;
            }
            records.push(Record::from_bytes(&bytes)?);
        }
        Ok((Self::from_records(records)?, warnings))
    }

    pub fn donors(&self) -> &[Replacement] {
        &self.donors
    }
}

impl ReplacementSource for DonorReplacements {
    fn replacements(&mut self, count: usize, _exclusions: &NameExclusions) -> Result<Vec<Replacement>> {
        Ok((0..count)
            .map(|i| self.donors[i % self.donors.len()].clone())
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacedSlot {
    pub position: usize,
    pub old_name: String,
    pub new_name: String,
    pub category: &'static str,
}

#[derive(Debug, Clone)]
pub struct ReplaceReport {
    pub path: PathBuf,
    pub replaced: Vec<ReplacedSlot>,
    pub backup: PathBuf,
    pub descriptor: Option<PathBuf>,
    pub warnings: Vec<Warning>,
}

/// Swaps the listed slots of a bundle for records from `source`, leaving
/// every other record byte-for-byte as it was.
pub fn replace<S: ReplacementSource + ?Sized>(
    ws: &Workspace,
    path: &Path,
    list: &str,
    source: &mut S,
) -> Result<ReplaceReport> {
    let original = fs::read(path)?;
    let mut bundle = Bundle::from_file_bytes(path, &original)?;
    let names = bundle.names();

    let (targets, mut warnings) = resolve_targets(list, &names);
    if targets.is_empty() {
        return Err(ForgeError::NoInput(
            "no valid replacement targets specified".to_string(),
        ));
    }

    let replaced_slots: HashSet<usize> = targets.iter().map(|t| t.index).collect();
    let exclusions = NameExclusions::from_names(
        names
            .iter()
            .enumerate()
            .filter(|(index, _)| !replaced_slots.contains(index))
            .map(|(_, name)| name),
    );

    let replacements = source.replacements(targets.len(), &exclusions)?;
    if replacements.len() != targets.len() {
        return Err(ForgeError::Config(format!(
            "replacement source produced {} patches for {} targets",
            replacements.len(),
            targets.len()
        )));
    }

    let mut final_names = names;
    for (target, replacement) in targets.iter().zip(&replacements) {
        if let Some(slot) = final_names.get_mut(target.index) {
            *slot = replacement.name.clone();
        }
    }
    for conflict in find_name_conflicts(&final_names) {
        push_warning(&mut warnings, conflict);
    }

    let mut replaced = Vec::with_capacity(targets.len());
    for (target, replacement) in targets.iter().zip(replacements) {
        match bundle.replace(target.index, replacement.record) {
            Some(old) => replaced.push(ReplacedSlot {
                position: target.position(),
                old_name: old.name(),
                new_name: replacement.name,
                category: replacement.category,
            }),
            None => push_warning(
                &mut warnings,
                Warning::PositionOutOfRange {
                    position: target.position() as i64,
                },
            ),
        }
    }

    let backup = ws.backup_path(path);
    fs::write(&backup, &original)?;
    bundle.write(path)?;
    let descriptor = write_descriptor(path, &bundle)?;

    info!(
        event = "bundle_replaced",
        path = %path.display(),
        replaced = replaced.len(),
        backup = %backup.display()
    );
    Ok(ReplaceReport {
        path: path.to_path_buf(),
        replaced,
        backup,
        descriptor,
        warnings,
    })
}

fn read_single(path: &Path) -> Result<Record> {
    let raw = fs::read(path)?;
    if raw.len() != PATCH_SIZE {
        return Err(ForgeError::NotSingleRecord {
            path: path.to_path_buf(),
            len: raw.len(),
        });
    }
    Record::from_bytes(&raw)
}

/// Name and category of a single-record file.
pub fn inspect_single(path: &Path) -> Result<PatchSummary> {
    Ok(PatchSummary::of(0, &read_single(path)?))
}

/// Looks up the category for an edit of `path`. An unknown name is a
/// config error that also shows what the preset currently is.
pub fn category_for_edit(path: &Path, raw: &str) -> Result<u8> {
    if let Some(code) = category_code(raw) {
        return Ok(code);
    }
    let current = match inspect_single(path) {
        Ok(patch) => format!(" Current preset: '{}' ({}).", patch.name, patch.category),
        Err(_) => String::new(),
    };
    Err(ForgeError::Config(format!(
        "unknown category '{raw}'.{current} Available: {}",
        available_categories()
    )))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchEdit {
    pub name: Option<String>,
    pub category: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct EditReport {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    pub old_name: String,
    pub old_category: &'static str,
    pub new_name: String,
    pub new_category: &'static str,
    pub warnings: Vec<Warning>,
}

/// Edits a single-record file. The result is written under a new file name
/// built from its category, name and stamp, then the original is removed.
pub fn edit_single(ws: &Workspace, path: &Path, edit: &PatchEdit) -> Result<EditReport> {
    if edit.name.is_none() && edit.category.is_none() {
        return Err(ForgeError::Config(
            "nothing to change: give a new name and/or category".to_string(),
        ));
    }

    let mut record = read_single(path)?;
    let old_name = record.name();
    let old_category = record.category_name();
    let mut warnings = Vec::new();

    if let Some(name) = &edit.name {
        let fitted = truncate_name(name);
        if fitted != *name {
            push_warning(
                &mut warnings,
                Warning::NameTruncated {
                    from: name.clone(),
                    to: fitted.clone(),
                },
            );
        }
        record.set_name(&fitted);
    }
    if let Some(code) = edit.category {
        record.set_category(code);
    }

    let new_name = record.name();
    let new_category = record.category_name();
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let candidate = dir.join(ws.patch_file_name(new_category, &new_name));
    let new_path = if candidate == path {
        candidate
    } else {
        unique_path(candidate, &HashSet::new())
    };

    fs::write(&new_path, record.as_bytes())?;
    if new_path != path {
        if let Err(err) = fs::remove_file(path) {
            push_warning(
                &mut warnings,
                Warning::RemoveFailed {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                },
            );
        }
    }

    info!(
        event = "patch_edited",
        old = %path.display(),
        new = %new_path.display(),
        name = %new_name,
        category = new_category
    );
    Ok(EditReport {
        old_path: path.to_path_buf(),
        new_path,
        old_name,
        old_category,
        new_name,
        new_category,
        warnings,
    })
}

pub fn rename(ws: &Workspace, path: &Path, new_name: &str) -> Result<EditReport> {
    edit_single(
        ws,
        path,
        &PatchEdit {
            name: Some(new_name.to_string()),
            category: None,
        },
    )
}

pub fn change_category(ws: &Workspace, path: &Path, category: u8) -> Result<EditReport> {
    edit_single(
        ws,
        path,
        &PatchEdit {
            name: None,
            category: Some(category),
        },
    )
}

pub fn rename_and_change_category(
    ws: &Workspace,
    path: &Path,
    new_name: &str,
    category: u8,
) -> Result<EditReport> {
    edit_single(
        ws,
        path,
        &PatchEdit {
            name: Some(new_name.to_string()),
            category: Some(category),
        },
    )
}

#[derive(Debug, Clone)]
pub struct GenerateReport {
    pub written: Vec<WrittenPatch>,
    /// Set for batches of more than one patch.
    pub output_dir: Option<PathBuf>,
    pub combined_path: Option<PathBuf>,
    pub descriptor: Option<PathBuf>,
}

/// Generates `count` new patches. One patch lands directly in the presets
/// root; a batch gets its own directory with a combined bundle, one file
/// per patch and a descriptor.
pub fn generate<V: AssignmentValidator>(
    ws: &Workspace,
    generator: &mut PatchGenerator<V>,
    count: usize,
    category: u8,
) -> Result<GenerateReport> {
    if count == 0 {
        return Err(ForgeError::NoInput("count must be at least 1".to_string()));
    }

    let patches = generator.generate(count, category, &NameExclusions::new())?;
    let bundle = Bundle::from_records(patches.into_iter().map(|patch| patch.record).collect());
    fs::create_dir_all(ws.presets_dir())?;

    if bundle.len() == 1 {
        let mut claimed = HashSet::new();
        let written = bundle
            .records()
            .iter()
            .enumerate()
            .map(|(index, record)| write_patch_file(ws, ws.presets_dir(), index, record, &mut claimed))
            .collect::<Result<Vec<_>>>()?;
        info!(event = "patch_generated", category = category_name(category));
        return Ok(GenerateReport {
            written,
            output_dir: None,
            combined_path: None,
            descriptor: None,
        });
    }

    let (output_dir, dir_name) = create_bundle_dir(ws, generator.rng_mut())?;
    let combined_path = output_dir.join(format!("{dir_name}_bundle_{}.syx", ws.stamp()));
    bundle.write(&combined_path)?;

    let mut claimed = HashSet::from([combined_path.clone()]);
    let mut written = Vec::with_capacity(bundle.len());
    for (index, record) in bundle.records().iter().enumerate() {
        written.push(write_patch_file(ws, &output_dir, index, record, &mut claimed)?);
    }
    let descriptor = write_descriptor(&combined_path, &bundle)?;

    info!(
        event = "bundle_generated",
        patches = bundle.len(),
        category = category_name(category),
        path = %combined_path.display()
    );
    Ok(GenerateReport {
        written,
        output_dir: Some(output_dir),
        combined_path: Some(combined_path),
        descriptor,
    })
}
