pub mod emitter;
pub mod layout;
pub mod reactions;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::{MessageOrder, ReportOptions};
use crate::media::{MediaResolver, MediaSource};
use crate::models::{Message, Thread};
use crate::sheet::Sheet;
use crate::validate::SchemaDrift;
use layout::ThreadLayout;

/// A recoverable problem met while building the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ReportWarning {
    SchemaDrift(SchemaDrift),
    EmptyMessage {
        ordinal: u32,
        index: usize,
        /// The whole message, JSON encoded.
        record: String,
    },
    OrphanReaction {
        ordinal: u32,
        index: usize,
        actor: String,
        reaction: String,
    },
    UnlistedReactionActor {
        ordinal: u32,
        index: usize,
        actor: String,
    },
    AttachmentFetchFailure {
        ordinal: u32,
        index: usize,
        kind: &'static str,
        uri: String,
        detail: String,
    },
}

impl ReportWarning {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SchemaDrift(_) => "schema_drift",
            Self::EmptyMessage { .. } => "empty_message",
            Self::OrphanReaction { .. } => "orphan_reaction",
            Self::UnlistedReactionActor { .. } => "unlisted_reaction_actor",
            Self::AttachmentFetchFailure { .. } => "attachment_fetch_failure",
        }
    }
}

impl fmt::Display for ReportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaDrift(drift) => write!(f, "schema drift: {drift}"),
            Self::EmptyMessage {
                ordinal,
                index,
                record,
            } => write!(
                f,
                "message_{ordinal}.json message {index} has nothing to render: {record}"
            ),
            Self::OrphanReaction {
                ordinal,
                index,
                actor,
                reaction,
            } => write!(
                f,
                "message_{ordinal}.json message {index}: dropped reaction {reaction} from {actor} (no row)"
            ),
            Self::UnlistedReactionActor {
                ordinal,
                index,
                actor,
            } => write!(
                f,
                "message_{ordinal}.json message {index}: reaction from non-participant {actor}"
            ),
            Self::AttachmentFetchFailure {
                ordinal,
                index,
                kind,
                uri,
                detail,
            } => write!(
                f,
                "message_{ordinal}.json message {index}: {kind} {uri} not embedded: {detail}"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub threads: usize,
    pub threads_empty: usize,
    pub messages: usize,
    pub messages_rendered: usize,
    pub rows: usize,
    pub reactions_applied: usize,
    pub reactions_dropped: usize,
    pub reaction_columns: usize,
    pub images_embedded: usize,
    pub placeholders: usize,
    pub link_cells: usize,
}

/// Warnings and counters shared by the emitter and the reaction pass.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub warnings: Vec<ReportWarning>,
    pub stats: RenderStats,
}

impl Diagnostics {
    pub fn warn(&mut self, warning: ReportWarning) {
        tracing::warn!(kind = warning.kind(), "{warning}");
        self.warnings.push(warning);
    }
}

/// The finished sheet plus everything worth telling the user about it.
#[derive(Debug)]
pub struct RenderedReport {
    pub sheet: Sheet,
    pub warnings: Vec<ReportWarning>,
    pub stats: RenderStats,
}

impl RenderedReport {
    #[must_use]
    pub fn warning_counts(&self) -> BTreeMap<&'static str, usize> {
        count_warnings(&self.warnings)
    }
}

#[must_use]
pub fn count_warnings(warnings: &[ReportWarning]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for warning in warnings {
        *counts.entry(warning.kind()).or_insert(0) += 1;
    }
    counts
}

/// Lays threads out one after another into a single sheet.
pub struct ReportBuilder<'a> {
    layout: ThreadLayout,
    resolver: MediaResolver<'a>,
    message_order: MessageOrder,
    diagnostics: Diagnostics,
}

impl<'a> ReportBuilder<'a> {
    #[must_use]
    pub fn new(
        sheet_name: &str,
        options: &ReportOptions,
        media_root: PathBuf,
        source: &'a dyn MediaSource,
    ) -> Self {
        Self {
            layout: ThreadLayout::new(sheet_name, &options.salt),
            resolver: MediaResolver::new(media_root, options.embed_images, source),
            message_order: options.message_order,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn record_schema_drift(&mut self, drift: impl IntoIterator<Item = SchemaDrift>) {
        for entry in drift {
            self.diagnostics.warn(ReportWarning::SchemaDrift(entry));
        }
    }

    #[must_use]
    pub fn layout(&self) -> &ThreadLayout {
        &self.layout
    }

    pub fn process_thread(&mut self, thread: &Thread) -> Result<()> {
        let created = self
            .layout
            .open_thread(thread)
            .with_context(|| format!("failed to open thread {}", thread.source_path.display()))?;
        tracing::debug!(
            ordinal = thread.ordinal,
            title = %thread.title,
            messages = thread.messages.len(),
            new_reaction_columns = created.len(),
            "laying out thread"
        );

        let messages: Box<dyn Iterator<Item = &Message>> = match self.message_order {
            MessageOrder::OldestFirst => Box::new(thread.messages.iter().rev()),
            MessageOrder::Stored => Box::new(thread.messages.iter()),
        };
        for message in messages {
            self.diagnostics.stats.messages += 1;
            let last_row = emitter::emit_message(
                &mut self.layout,
                &self.resolver,
                &mut self.diagnostics,
                thread.ordinal,
                message,
            )?;
            reactions::apply_reactions(
                &mut self.layout,
                &mut self.diagnostics,
                thread.ordinal,
                message,
                last_row,
            );
        }

        self.diagnostics.stats.threads += 1;
        if self.layout.close_thread().is_none() {
            self.diagnostics.stats.threads_empty += 1;
        }
        Ok(())
    }

    #[must_use]
    pub fn finish(self) -> RenderedReport {
        let mut stats = self.diagnostics.stats;
        stats.reaction_columns = self.layout.reaction_columns().names().len();
        let sheet = self.layout.into_sheet();
        stats.rows = sheet.rows().len();

        RenderedReport {
            sheet,
            warnings: self.diagnostics.warnings,
            stats,
        }
    }
}

/// Render `threads` in the order given.
pub fn render_threads(
    sheet_name: &str,
    threads: &[Thread],
    options: &ReportOptions,
    media_root: PathBuf,
    source: &dyn MediaSource,
) -> Result<RenderedReport> {
    let mut builder = ReportBuilder::new(sheet_name, options, media_root, source);
    for thread in threads {
        builder.process_thread(thread)?;
    }
    Ok(builder.finish())
}
