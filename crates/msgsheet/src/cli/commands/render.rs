use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;

use crate::config::{DEFAULT_OUTPUT_FILE, MessageOrder, ReportOptions, RuntimePaths};
use crate::media::DefaultMediaSource;
use crate::report::ReportBuilder;

pub const OVERWRITE_PROMPT: &str = "File already exists. Continue overwriting? [y/N] ";

#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Thread directory holding `message_<n>.json` fragments.
    #[arg(value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_OUTPUT_FILE)]
    pub output: PathBuf,

    /// Overwrite an existing output file without asking.
    #[arg(short, long, default_value_t = false)]
    pub force: bool,

    /// Link images instead of downloading and embedding them.
    #[arg(long, default_value_t = false)]
    pub no_images: bool,

    /// Mixed into participant colors.
    #[arg(long, value_name = "TEXT", default_value = "")]
    pub salt: String,

    /// Directory export URIs are relative to (default: three levels above DIR).
    #[arg(long, value_name = "PATH")]
    pub media_root: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = MessageOrder::OldestFirst)]
    pub message_order: MessageOrder,
}

impl RenderArgs {
    #[must_use]
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            embed_images: !self.no_images,
            salt: self.salt.clone(),
            message_order: self.message_order,
        }
    }
}

pub fn run(args: &RenderArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let paths = crate::config::resolve_render_paths(
        runtime_paths,
        &args.dir,
        &args.output,
        args.media_root.as_deref(),
    )?;
    let options = args.report_options();
    println!(
        "render: start export_dir={} output={} media_root={} embed_images={} message_order={}",
        paths.export_dir.display(),
        paths.output.display(),
        paths.media_root.display(),
        options.embed_images,
        options.message_order.as_str()
    );

    if !paths.export_dir.is_dir() {
        bail!(
            "export directory does not exist: {}",
            paths.export_dir.display()
        );
    }
    if paths.output.exists() && !args.force {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        if !confirm_overwrite(stdin.lock(), stdout.lock())? {
            bail!("File exists, not overwriting");
        }
    }

    let loaded = crate::discovery::load_export_dir(&paths.export_dir)?;
    println!(
        "render: loaded fragments={} schema_drift={}",
        loaded.threads.len(),
        loaded.drift.len()
    );

    let source = DefaultMediaSource::default();
    let sheet_name = crate::discovery::default_sheet_name(&paths.export_dir);
    let mut builder = ReportBuilder::new(&sheet_name, &options, paths.media_root.clone(), &source);
    builder.record_schema_drift(loaded.drift);
    for thread in &loaded.threads {
        let rows_before = builder.layout().sheet().rows().len();
        builder.process_thread(thread)?;
        println!(
            "render: thread ordinal={} title={:?} messages={} rows={}",
            thread.ordinal,
            thread.title,
            thread.messages.len(),
            builder.layout().sheet().rows().len() - rows_before
        );
    }

    let report = builder.finish();
    let written = crate::xlsx::write_workbook(&report.sheet, &paths.output)?;
    let stats = &report.stats;
    println!(
        "render: complete threads={} messages={} rows={} reactions={} reaction_columns={} images_embedded={} placeholders={} link_cells={} warnings={}",
        stats.threads,
        stats.messages,
        stats.rows,
        stats.reactions_applied,
        stats.reaction_columns,
        written.images,
        stats.placeholders + written.image_failures,
        stats.link_cells,
        report.warnings.len()
    );
    for (kind, count) in report.warning_counts() {
        println!("render: warnings kind={kind} count={count}");
    }
    println!("render: wrote {}", paths.output.display());

    Ok(())
}

/// Ask before replacing an existing file. Any answer containing `y`
/// (`y`, `yes`, `Yes`) continues.
pub fn confirm_overwrite(mut input: impl BufRead, mut output: impl Write) -> Result<bool> {
    output
        .write_all(OVERWRITE_PROMPT.as_bytes())
        .and_then(|()| output.flush())
        .context("failed to write overwrite prompt")?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("failed to read overwrite answer")?;
    Ok(answer.to_ascii_lowercase().contains('y'))
}
