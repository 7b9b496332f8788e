use std::io::Cursor;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, Result, bail};
use image::{ImageFormat, ImageReader};

/// Where attachment bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    Remote(String),
    Local(PathBuf),
}

/// Blocking access to attachment bytes.
pub trait MediaSource {
    fn fetch(&self, target: &FetchTarget) -> Result<Vec<u8>>;
}

/// Reads local files and downloads `http(s)` URLs.
#[derive(Debug, Default)]
pub struct DefaultMediaSource {
    client: OnceLock<reqwest::blocking::Client>,
}

impl DefaultMediaSource {
    fn client(&self) -> &reqwest::blocking::Client {
        self.client.get_or_init(reqwest::blocking::Client::new)
    }
}

impl MediaSource for DefaultMediaSource {
    fn fetch(&self, target: &FetchTarget) -> Result<Vec<u8>> {
        match target {
            FetchTarget::Local(path) => std::fs::read(path)
                .with_context(|| format!("failed to read attachment: {}", path.display())),
            FetchTarget::Remote(url) => {
                let response = self
                    .client()
                    .get(url)
                    .send()
                    .with_context(|| format!("failed to fetch attachment: {url}"))?
                    .error_for_status()
                    .with_context(|| format!("attachment fetch was rejected: {url}"))?;
                let bytes = response
                    .bytes()
                    .with_context(|| format!("failed to read attachment body: {url}"))?;
                Ok(bytes.to_vec())
            }
        }
    }
}

/// Formats the workbook encoder can embed.
#[must_use]
pub const fn is_embeddable(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::Bmp
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedImage {
    pub format: ImageFormat,
    pub dimensions: Option<(u32, u32)>,
}

/// Sniff the image format from its bytes and read its pixel size.
///
/// An unknown format is an error; a known format whose header cannot be read
/// yields `dimensions: None`.
pub fn sniff_image(bytes: &[u8]) -> Result<SniffedImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to sniff image format")?;
    let Some(format) = reader.format() else {
        bail!("unrecognized image format");
    };
    let dimensions = reader
        .into_dimensions()
        .ok()
        .filter(|(width, height)| *width > 0 && *height > 0);

    Ok(SniffedImage { format, dimensions })
}
