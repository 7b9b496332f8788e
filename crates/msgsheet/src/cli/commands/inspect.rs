use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;

use crate::config::{ReportOptions, RuntimePaths, default_media_root};
use crate::discovery::{discover_fragments, load_fragment};
use crate::media::{AttachmentKind, DefaultMediaSource};
use crate::models::Thread;
use crate::report::{ReportWarning, count_warnings, render_threads};
use crate::utils::time::format_unix_ms;

#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    #[arg(value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub export_dir: String,
    pub fragments: Vec<FragmentSummary>,
    pub warning_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentSummary {
    pub ordinal: u32,
    pub path: String,
    pub title: String,
    pub participants: usize,
    pub messages: usize,
    /// Messages with nothing to put on a row.
    pub empty_messages: usize,
    /// Rows the fragment would contribute to a rendered sheet.
    pub rows: usize,
    pub reactions: usize,
    pub attachments: BTreeMap<String, usize>,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    pub warnings: Vec<String>,
}

/// Load every fragment of `dir` and lay each one out on its own, without
/// fetching media.
pub fn inspect_export(dir: &Path) -> Result<InspectReport> {
    if !dir.is_dir() {
        bail!("export directory does not exist: {}", dir.display());
    }

    let options = ReportOptions {
        embed_images: false,
        ..ReportOptions::default()
    };
    let source = DefaultMediaSource::default();
    let mut fragments = Vec::new();
    let mut warning_counts = BTreeMap::new();
    for fragment in discover_fragments(dir)? {
        let loaded = load_fragment(&fragment)?;
        let rendered = render_threads(
            "inspect",
            std::slice::from_ref(&loaded.thread),
            &options,
            default_media_root(dir),
            &source,
        )
        .with_context(|| format!("failed to lay out {}", fragment.path.display()))?;

        let mut warnings: Vec<ReportWarning> = loaded
            .drift
            .into_iter()
            .map(ReportWarning::SchemaDrift)
            .collect();
        warnings.extend(rendered.warnings);
        for (kind, count) in count_warnings(&warnings) {
            *warning_counts.entry(kind.to_string()).or_insert(0) += count;
        }

        fragments.push(summarize_fragment(
            &loaded.thread,
            rendered.stats.rows,
            &warnings,
        ));
    }

    Ok(InspectReport {
        export_dir: dir.to_string_lossy().to_string(),
        fragments,
        warning_counts,
    })
}

fn summarize_fragment(thread: &Thread, rows: usize, warnings: &[ReportWarning]) -> FragmentSummary {
    let mut attachments = BTreeMap::new();
    let mut add = |kind: AttachmentKind, count: usize| {
        if count > 0 {
            *attachments.entry(kind.as_str().to_string()).or_insert(0) += count;
        }
    };
    for message in &thread.messages {
        add(AttachmentKind::Photo, message.photos.len());
        add(AttachmentKind::Video, message.videos.len());
        add(AttachmentKind::Sticker, usize::from(message.sticker.is_some()));
        add(AttachmentKind::Gif, message.gifs.len());
        add(AttachmentKind::Audio, message.audio_files.len());
        add(AttachmentKind::File, message.files.len());
    }

    let timestamps = thread.messages.iter().filter_map(|message| message.timestamp_ms);
    let first = timestamps.clone().min();
    let last = timestamps.max();

    FragmentSummary {
        ordinal: thread.ordinal,
        path: thread.source_path.to_string_lossy().to_string(),
        title: thread.title.clone(),
        participants: thread.participants.len(),
        messages: thread.messages.len(),
        empty_messages: thread
            .messages
            .iter()
            .filter(|message| !message.has_renderable_content())
            .count(),
        rows,
        reactions: thread
            .messages
            .iter()
            .map(|message| message.reactions.len())
            .sum(),
        attachments,
        first_timestamp: first.map(format_unix_ms),
        last_timestamp: last.map(format_unix_ms),
        warnings: warnings.iter().map(ToString::to_string).collect(),
    }
}

#[must_use]
pub fn render_text_report(report: &InspectReport) -> String {
    let mut lines = vec![
        format!("export_dir: {}", report.export_dir),
        format!("fragments: {}", report.fragments.len()),
    ];

    for fragment in &report.fragments {
        let prefix = format!("fragment.{}", fragment.ordinal);
        lines.push(format!("{prefix}.path: {}", fragment.path));
        lines.push(format!("{prefix}.title: {}", fragment.title));
        lines.push(format!("{prefix}.participants: {}", fragment.participants));
        lines.push(format!("{prefix}.messages: {}", fragment.messages));
        lines.push(format!("{prefix}.empty_messages: {}", fragment.empty_messages));
        lines.push(format!("{prefix}.rows: {}", fragment.rows));
        lines.push(format!("{prefix}.reactions: {}", fragment.reactions));
        if !fragment.attachments.is_empty() {
            lines.push(format!(
                "{prefix}.attachments: {}",
                render_count_map(&fragment.attachments)
            ));
        }
        if let (Some(first), Some(last)) = (&fragment.first_timestamp, &fragment.last_timestamp) {
            lines.push(format!("{prefix}.time_range: {first}..{last}"));
        }
        if !fragment.warnings.is_empty() {
            lines.push(format!("{prefix}.warnings:"));
            lines.extend(fragment.warnings.iter().map(|warning| format!("- {warning}")));
        }
    }

    if !report.warning_counts.is_empty() {
        lines.push(format!(
            "warning_counts: {}",
            render_count_map(&report.warning_counts)
        ));
    }

    lines.join("\n")
}

pub fn render_json_report(report: &InspectReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to encode inspect report as JSON")
}

pub fn run(args: &InspectArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let dir = runtime_paths.resolve(&args.dir)?;
    let report = inspect_export(&dir)?;
    if args.json {
        println!("{}", render_json_report(&report)?);
    } else {
        println!("{}", render_text_report(&report));
    }
    Ok(())
}

fn render_count_map(counts: &BTreeMap<String, usize>) -> String {
    counts
        .iter()
        .map(|(key, count)| format!("{key}={count}"))
        .collect::<Vec<_>>()
        .join(",")
}
