use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use clap::ValueEnum;

pub const DEFAULT_OUTPUT_FILE: &str = "facebook-messages.xlsx";
/// Export URIs are relative to this many levels above a thread directory
/// (`<root>/messages/inbox/<thread>/message_1.json`).
pub const MEDIA_ROOT_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: Option<PathBuf>,
    pub cwd: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPaths {
    pub export_dir: PathBuf,
    pub output: PathBuf,
    pub media_root: PathBuf,
}

/// Order in which a thread's stored messages are visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MessageOrder {
    /// Highest stored index first. Exports store the newest message at
    /// index 0, so this reads oldest to newest.
    #[default]
    OldestFirst,
    /// Stored index order, newest first.
    Stored,
}

impl MessageOrder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OldestFirst => "oldest-first",
            Self::Stored => "stored",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub embed_images: bool,
    pub salt: String,
    pub message_order: MessageOrder,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            embed_images: true,
            salt: String::new(),
            message_order: MessageOrder::OldestFirst,
        }
    }
}

pub fn resolve_runtime_paths(home_dir: Option<&Path>, cwd: &Path) -> Result<RuntimePaths> {
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }
    if let Some(home_dir) = home_dir
        && !home_dir.is_absolute()
    {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }

    Ok(RuntimePaths {
        home_dir: home_dir.map(normalize_lexical),
        cwd: normalize_lexical(cwd),
    })
}

impl RuntimePaths {
    /// Expand `~`, anchor relative paths at `cwd` and normalize.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let expanded = expand_tilde(path, self.home_dir.as_deref())?;
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            self.cwd.join(expanded)
        };

        Ok(normalize_lexical(&resolved))
    }
}

pub fn resolve_render_paths(
    runtime: &RuntimePaths,
    export_dir: &Path,
    output: &Path,
    media_root_override: Option<&Path>,
) -> Result<RenderPaths> {
    let export_dir = runtime.resolve(export_dir)?;
    let output = runtime.resolve(output)?;
    let media_root = match media_root_override {
        Some(path) => runtime.resolve(path)?,
        None => default_media_root(&export_dir),
    };

    Ok(RenderPaths {
        export_dir,
        output,
        media_root,
    })
}

#[must_use]
pub fn default_media_root(export_dir: &Path) -> PathBuf {
    let mut root = export_dir.to_path_buf();
    for _ in 0..MEDIA_ROOT_DEPTH {
        root.push(Component::ParentDir.as_os_str());
    }
    normalize_lexical(&root)
}

fn expand_tilde(path: &Path, home_dir: Option<&Path>) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let Some(home_dir) = home_dir else {
                bail!(
                    "cannot expand `~` without a home directory; pass --home-dir: {}",
                    path.display()
                );
            };
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

#[must_use]
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}
