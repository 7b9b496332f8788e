//! Locating and loading `message_<n>.json` fragments of one export directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::Value;

use crate::models::{ExportThread, Thread};
use crate::validate::{SchemaDrift, check_thread_document};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentFile {
    pub ordinal: u32,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFragment {
    pub thread: Thread,
    pub drift: Vec<SchemaDrift>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedExport {
    /// Highest ordinal first, the order threads are laid out in.
    pub threads: Vec<Thread>,
    pub drift: Vec<SchemaDrift>,
}

/// Whether `file_name` has the `message_<n>.json` shape, whatever `n` is.
#[must_use]
pub fn is_fragment_name(file_name: &str) -> bool {
    fragment_name_regex().is_match(file_name)
}

/// Ordinal of a fragment file name, `None` for anything else or for an
/// ordinal beyond `u32`.
#[must_use]
pub fn parse_fragment_ordinal(file_name: &str) -> Option<u32> {
    fragment_name_regex()
        .captures(file_name)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Fragment files directly inside `dir`, highest ordinal first.
pub fn discover_fragments(dir: &Path) -> Result<Vec<FragmentFile>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read export directory: {}", dir.display()))?;

    let mut by_ordinal: BTreeMap<u32, PathBuf> = BTreeMap::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read export directory: {}", dir.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", entry.path().display()))?;
        if !file_type.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().filter(|name| is_fragment_name(name)) else {
            continue;
        };
        let path = entry.path();
        let Some(ordinal) = parse_fragment_ordinal(name) else {
            tracing::warn!(
                path = %path.display(),
                "fragment ordinal out of range; skipping file"
            );
            continue;
        };

        if let Some(existing) = by_ordinal.insert(ordinal, path.clone()) {
            bail!(
                "fragments {} and {} share ordinal {ordinal}",
                existing.display(),
                path.display()
            );
        }
    }

    Ok(by_ordinal
        .into_iter()
        .rev()
        .map(|(ordinal, path)| FragmentFile { ordinal, path })
        .collect())
}

/// Parse one fragment: allow-list check on the raw document, then the typed
/// parse with its single text repair pass.
pub fn parse_fragment_json(input: &str, ordinal: u32, path: &Path) -> Result<LoadedFragment> {
    let document: Value = serde_json::from_str(input)
        .with_context(|| format!("failed to parse fragment JSON: {}", path.display()))?;
    let drift = check_thread_document(&document);
    let raw: ExportThread = serde_json::from_value(document)
        .with_context(|| format!("fragment has an unexpected shape: {}", path.display()))?;

    Ok(LoadedFragment {
        thread: Thread::from_export(ordinal, path.to_path_buf(), raw),
        drift,
    })
}

pub fn load_fragment(fragment: &FragmentFile) -> Result<LoadedFragment> {
    let input = std::fs::read_to_string(&fragment.path)
        .with_context(|| format!("failed to read fragment: {}", fragment.path.display()))?;
    parse_fragment_json(&input, fragment.ordinal, &fragment.path)
}

pub fn load_export_dir(dir: &Path) -> Result<LoadedExport> {
    let fragments = discover_fragments(dir)?;
    let mut threads = Vec::with_capacity(fragments.len());
    let mut drift = Vec::new();
    for fragment in &fragments {
        let loaded = load_fragment(fragment)?;
        tracing::debug!(
            ordinal = fragment.ordinal,
            messages = loaded.thread.messages.len(),
            drift = loaded.drift.len(),
            "loaded fragment"
        );
        threads.push(loaded.thread);
        drift.extend(loaded.drift);
    }

    Ok(LoadedExport { threads, drift })
}

/// Initial sheet name: the export directory's own name.
#[must_use]
pub fn default_sheet_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn fragment_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^message_(\d+)\.json$").expect("fragment name regex should compile")
    })
}
