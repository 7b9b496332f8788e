//! Attachment resolution: inline preview, placeholder, or link-only cell.

pub mod source;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::sheet::{CellValue, EmbeddedImage};
pub use source::{DefaultMediaSource, FetchTarget, MediaSource, SniffedImage, sniff_image};

pub const DISPLAY_WIDTH: f64 = 263.0;
pub const FALLBACK_ROW_HEIGHT: f64 = 100.0;

pub const BROKEN_THUMBNAIL_LABEL: &str = "❎ Broken thumbnail";
pub const IMAGE_TOOLTIP: &str = "Image 🖼";
pub const VIDEO_LABEL: &str = "Video ▶";
pub const AUDIO_LABEL: &str = "▶ 🎧 Audio clip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Photo,
    VideoThumbnail,
    Sticker,
    Gif,
    Video,
    Audio,
    File,
}

impl AttachmentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::VideoThumbnail => "video_thumbnail",
            Self::Sticker => "sticker",
            Self::Gif => "gif",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
        }
    }
}

/// A resolved attachment reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocation {
    pub target: FetchTarget,
    pub hyperlink: String,
}

/// Hyperlink and tooltip an image cell points at, when it is not the image itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub url: String,
    pub tooltip: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentOutcome {
    Embedded,
    Placeholder,
    Link,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAttachment {
    pub value: CellValue,
    pub outcome: AttachmentOutcome,
    /// Display height requested by an embedded image.
    pub row_height: Option<f64>,
    /// Why an embed fell back to a placeholder.
    pub fetch_failure: Option<String>,
    /// Set when the image was embedded without usable dimensions.
    pub dimensions_unknown: bool,
}

pub struct MediaResolver<'a> {
    media_root: PathBuf,
    embed_images: bool,
    source: &'a dyn MediaSource,
}

impl<'a> MediaResolver<'a> {
    #[must_use]
    pub fn new(media_root: PathBuf, embed_images: bool, source: &'a dyn MediaSource) -> Self {
        Self {
            media_root,
            embed_images,
            source,
        }
    }

    /// Absolute `http(s)`/`file` URIs are used as-is; anything else is a
    /// path under the media root.
    #[must_use]
    pub fn locate(&self, uri: &str) -> MediaLocation {
        if is_remote_uri(uri) {
            return MediaLocation {
                target: FetchTarget::Remote(uri.to_string()),
                hyperlink: uri.to_string(),
            };
        }
        if let Some(path) = file_uri_path(uri) {
            return MediaLocation {
                target: FetchTarget::Local(path),
                hyperlink: uri.to_string(),
            };
        }

        let mut path = self.media_root.clone();
        for segment in uri.split(['/', '\\']).filter(|segment| !segment.is_empty()) {
            path.push(segment);
        }
        let hyperlink = file_link(&path);
        MediaLocation {
            target: FetchTarget::Local(path),
            hyperlink,
        }
    }

    /// Photo, sticker, gif, or video thumbnail. `link` replaces the image's
    /// own location as the cell hyperlink (videos link to the video).
    #[must_use]
    pub fn resolve_image(&self, uri: &str, link: Option<LinkTarget>) -> ResolvedAttachment {
        let location = self.locate(uri);
        let link = link.unwrap_or_else(|| LinkTarget {
            url: location.hyperlink.clone(),
            tooltip: IMAGE_TOOLTIP.to_string(),
        });

        if !self.embed_images || is_dead_cdn_uri(uri) {
            return placeholder(link, None);
        }

        let bytes = match self.source.fetch(&location.target) {
            Ok(bytes) => bytes,
            Err(error) => return placeholder(link, Some(format!("{error:#}"))),
        };
        let sniffed = match sniff_image(&bytes) {
            Ok(sniffed) => sniffed,
            Err(error) => return placeholder(link, Some(format!("{error:#}"))),
        };
        if !source::is_embeddable(sniffed.format) {
            return placeholder(
                link,
                Some(format!(
                    "image format {:?} cannot be embedded",
                    sniffed.format
                )),
            );
        }

        let row_height = display_height(sniffed.dimensions);
        ResolvedAttachment {
            value: CellValue::Image {
                image: EmbeddedImage {
                    bytes,
                    extension: uri_extension(uri),
                    dimensions: sniffed.dimensions,
                },
                url: link.url,
                tooltip: Some(link.tooltip),
            },
            outcome: AttachmentOutcome::Embedded,
            row_height: Some(row_height.unwrap_or(FALLBACK_ROW_HEIGHT)),
            fetch_failure: None,
            dimensions_unknown: row_height.is_none(),
        }
    }

    /// Link-only cell for media without a visual preview.
    #[must_use]
    pub fn resolve_link(&self, kind: AttachmentKind, uri: &str) -> ResolvedAttachment {
        let location = self.locate(uri);
        let text = match kind {
            AttachmentKind::Audio => AUDIO_LABEL.to_string(),
            AttachmentKind::Video | AttachmentKind::VideoThumbnail => VIDEO_LABEL.to_string(),
            AttachmentKind::File
            | AttachmentKind::Photo
            | AttachmentKind::Sticker
            | AttachmentKind::Gif => uri_basename(uri),
        };

        ResolvedAttachment {
            value: CellValue::Hyperlinked {
                text,
                url: location.hyperlink,
                tooltip: None,
            },
            outcome: AttachmentOutcome::Link,
            row_height: None,
            fetch_failure: None,
            dimensions_unknown: false,
        }
    }

    /// The cell link for a video itself, used as the thumbnail's hyperlink.
    #[must_use]
    pub fn video_link(&self, video_uri: &str) -> LinkTarget {
        LinkTarget {
            url: self.locate(video_uri).hyperlink,
            tooltip: VIDEO_LABEL.to_string(),
        }
    }
}

fn placeholder(link: LinkTarget, fetch_failure: Option<String>) -> ResolvedAttachment {
    ResolvedAttachment {
        value: CellValue::Hyperlinked {
            text: BROKEN_THUMBNAIL_LABEL.to_string(),
            url: link.url,
            tooltip: Some(link.tooltip),
        },
        outcome: AttachmentOutcome::Placeholder,
        row_height: None,
        fetch_failure,
        dimensions_unknown: false,
    }
}

fn display_height(dimensions: Option<(u32, u32)>) -> Option<f64> {
    let (width, height) = dimensions?;
    Some(DISPLAY_WIDTH / f64::from(width) * f64::from(height))
}

#[must_use]
pub fn is_remote_uri(uri: &str) -> bool {
    remote_uri_regex().is_match(uri)
}

/// Internal CDN host whose links never resolve outside the exporter's network.
#[must_use]
pub fn is_dead_cdn_uri(uri: &str) -> bool {
    dead_cdn_regex().is_match(uri)
}

fn file_uri_path(uri: &str) -> Option<PathBuf> {
    if !uri.starts_with("file://") {
        return None;
    }
    Url::parse(uri).ok()?.to_file_path().ok()
}

fn file_link(path: &Path) -> String {
    Url::from_file_path(path)
        .map(String::from)
        .unwrap_or_else(|()| format!("file:///{}", path.display()))
}

/// Lowercase extension of the URI's path, ignoring any query string.
#[must_use]
pub fn uri_extension(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    Path::new(path)
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

#[must_use]
pub fn uri_basename(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_string()
}

fn remote_uri_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?i)^https?://").expect("remote uri regex should compile"))
}

fn dead_cdn_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^https?://interncache-prn\.fbcdn\.net/")
            .expect("dead cdn regex should compile")
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::path::{Path, PathBuf};

    use anyhow::{Result, bail};
    use image::{DynamicImage, ImageFormat, RgbImage};

    use super::{
        AttachmentKind, AttachmentOutcome, BROKEN_THUMBNAIL_LABEL, FALLBACK_ROW_HEIGHT,
        FetchTarget, MediaResolver, MediaSource, is_dead_cdn_uri, uri_basename, uri_extension,
    };
    use crate::sheet::CellValue;

    #[derive(Default)]
    struct RecordingSource {
        bytes: Option<Vec<u8>>,
        fetched: RefCell<Vec<FetchTarget>>,
    }

    impl MediaSource for RecordingSource {
        fn fetch(&self, target: &FetchTarget) -> Result<Vec<u8>> {
            self.fetched.borrow_mut().push(target.clone());
            match &self.bytes {
                Some(bytes) => Ok(bytes.clone()),
                None => bail!("no such file"),
            }
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("png should encode");
        bytes
    }

    fn resolver(source: &RecordingSource, embed_images: bool) -> MediaResolver<'_> {
        MediaResolver::new(PathBuf::from("/export"), embed_images, source)
    }

    #[test]
    fn relative_uris_resolve_under_media_root() {
        let source = RecordingSource::default();
        let location = resolver(&source, true).locate("messages/inbox/a_1/photos/p 1.jpg");

        assert_eq!(
            location.target,
            FetchTarget::Local(Path::new("/export/messages/inbox/a_1/photos/p 1.jpg").into())
        );
        assert_eq!(
            location.hyperlink,
            "file:///export/messages/inbox/a_1/photos/p%201.jpg"
        );
    }

    #[test]
    fn absolute_uris_are_used_directly() {
        let source = RecordingSource::default();
        let resolver = resolver(&source, true);

        let remote = resolver.locate("https://cdn.example.com/x.png");
        assert_eq!(
            remote.target,
            FetchTarget::Remote("https://cdn.example.com/x.png".to_string())
        );
        assert_eq!(remote.hyperlink, "https://cdn.example.com/x.png");

        let local = resolver.locate("file:///tmp/x.png");
        assert_eq!(local.target, FetchTarget::Local(PathBuf::from("/tmp/x.png")));
        assert_eq!(local.hyperlink, "file:///tmp/x.png");
    }

    #[test]
    fn embeds_image_with_aspect_scaled_height() {
        let source = RecordingSource {
            bytes: Some(png(20, 10)),
            ..RecordingSource::default()
        };
        let resolved = resolver(&source, true).resolve_image("photos/p.PNG", None);

        assert_eq!(resolved.outcome, AttachmentOutcome::Embedded);
        assert_eq!(resolved.row_height, Some(131.5));
        assert!(!resolved.dimensions_unknown);
        match resolved.value {
            CellValue::Image {
                image,
                url,
                tooltip,
            } => {
                assert_eq!(image.extension, "png");
                assert_eq!(image.dimensions, Some((20, 10)));
                assert_eq!(url, "file:///export/photos/p.PNG");
                assert_eq!(tooltip.as_deref(), Some("Image 🖼"));
            }
            other => panic!("expected image cell, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_dimensions_fall_back_to_fixed_height() {
        let bytes = png(4, 4);
        let source = RecordingSource {
            bytes: Some(bytes[..12].to_vec()),
            ..RecordingSource::default()
        };
        let resolved = resolver(&source, true).resolve_image("photos/p.png", None);

        assert_eq!(resolved.outcome, AttachmentOutcome::Embedded);
        assert_eq!(resolved.row_height, Some(FALLBACK_ROW_HEIGHT));
        assert!(resolved.dimensions_unknown);
    }

    #[test]
    fn disabled_embedding_yields_placeholder_without_fetching() {
        let source = RecordingSource {
            bytes: Some(png(2, 2)),
            ..RecordingSource::default()
        };
        let resolved = resolver(&source, false).resolve_image("photos/p.png", None);

        assert_eq!(resolved.outcome, AttachmentOutcome::Placeholder);
        assert!(source.fetched.borrow().is_empty());
        assert_eq!(resolved.value.text(), Some(BROKEN_THUMBNAIL_LABEL));
        assert_eq!(resolved.value.url(), Some("file:///export/photos/p.png"));
        assert!(resolved.fetch_failure.is_none());
    }

    #[test]
    fn dead_cdn_host_is_never_fetched() {
        let uri = "https://interncache-prn.fbcdn.net/v/t1/abc.jpg";
        assert!(is_dead_cdn_uri(uri));
        assert!(!is_dead_cdn_uri("https://scontent.fbcdn.net/v/abc.jpg"));

        let source = RecordingSource {
            bytes: Some(png(2, 2)),
            ..RecordingSource::default()
        };
        let resolved = resolver(&source, true).resolve_image(uri, None);

        assert_eq!(resolved.outcome, AttachmentOutcome::Placeholder);
        assert_eq!(resolved.value.url(), Some(uri));
        assert!(source.fetched.borrow().is_empty());
    }

    #[test]
    fn fetch_failure_degrades_to_placeholder() {
        let source = RecordingSource::default();
        let resolved = resolver(&source, true).resolve_image("photos/missing.jpg", None);

        assert_eq!(resolved.outcome, AttachmentOutcome::Placeholder);
        assert!(
            resolved
                .fetch_failure
                .as_deref()
                .is_some_and(|detail| detail.contains("no such file"))
        );
    }

    #[test]
    fn unembeddable_format_degrades_to_placeholder() {
        let source = RecordingSource {
            bytes: Some(b"RIFF\0\0\0\0WEBPVP8 ".to_vec()),
            ..RecordingSource::default()
        };
        let resolved = resolver(&source, true).resolve_image("stickers/s.webp", None);

        assert_eq!(resolved.outcome, AttachmentOutcome::Placeholder);
        assert!(resolved.fetch_failure.is_some());
    }

    #[test]
    fn video_thumbnail_links_to_the_video() {
        let source = RecordingSource::default();
        let resolver = resolver(&source, false);
        let link = resolver.video_link("videos/v.mp4");
        let resolved = resolver.resolve_image("videos/thumbs/v.jpg", Some(link));

        assert_eq!(resolved.value.url(), Some("file:///export/videos/v.mp4"));
        assert_eq!(resolved.value.tooltip(), Some("Video ▶"));
    }

    #[test]
    fn link_only_labels() {
        let source = RecordingSource::default();
        let resolver = resolver(&source, true);

        let audio = resolver.resolve_link(AttachmentKind::Audio, "audio/clip.mp4");
        assert_eq!(audio.outcome, AttachmentOutcome::Link);
        assert_eq!(audio.value.text(), Some("▶ 🎧 Audio clip"));

        let video = resolver.resolve_link(AttachmentKind::Video, "videos/v.mp4");
        assert_eq!(video.value.text(), Some("Video ▶"));

        let file = resolver.resolve_link(AttachmentKind::File, "files/report final.pdf");
        assert_eq!(file.value.text(), Some("report final.pdf"));
        assert_eq!(
            file.value.url(),
            Some("file:///export/files/report%20final.pdf")
        );
        assert!(source.fetched.borrow().is_empty());
    }

    #[test]
    fn uri_helpers_ignore_query_strings() {
        assert_eq!(uri_extension("https://x/y/img.JPG?size=2"), "jpg");
        assert_eq!(uri_extension("noext"), "");
        assert_eq!(uri_basename("a/b/c.pdf"), "c.pdf");
        assert_eq!(uri_basename("https://x/y/c.pdf?dl=1"), "c.pdf");
    }
}
