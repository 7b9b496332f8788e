use anyhow::Result;

use super::layout::ThreadLayout;
use super::{Diagnostics, ReportWarning};
use crate::media::{
    AttachmentKind, AttachmentOutcome, LinkTarget, MediaResolver, ResolvedAttachment,
};
use crate::models::Message;
use crate::sheet::{CellValue, RowId};

/// Expand one message into its rows, in content, photo, video, sticker, gif,
/// audio, file order. Returns the last row written, `None` for a message
/// that produced nothing.
pub fn emit_message(
    layout: &mut ThreadLayout,
    resolver: &MediaResolver<'_>,
    diagnostics: &mut Diagnostics,
    ordinal: u32,
    message: &Message,
) -> Result<Option<RowId>> {
    let mut emitter = MessageEmitter {
        layout,
        resolver,
        diagnostics,
        ordinal,
        message,
        last_row: None,
    };

    if let Some(value) = text_cell(message) {
        let row = emitter.next_row()?;
        emitter.layout.set_message_cell(row, value);
    }
    for photo in &message.photos {
        emitter.image(AttachmentKind::Photo, &photo.uri, None)?;
    }
    for video in &message.videos {
        match &video.thumbnail {
            Some(thumbnail) => {
                let link = resolver.video_link(&video.uri);
                emitter.image(AttachmentKind::VideoThumbnail, &thumbnail.uri, Some(link))?;
            }
            None => emitter.link(AttachmentKind::Video, &video.uri)?,
        }
    }
    if let Some(sticker) = &message.sticker {
        emitter.image(AttachmentKind::Sticker, &sticker.uri, None)?;
    }
    for gif in &message.gifs {
        emitter.image(AttachmentKind::Gif, &gif.uri, None)?;
    }
    for audio in &message.audio_files {
        emitter.link(AttachmentKind::Audio, &audio.uri)?;
    }
    for file in &message.files {
        emitter.link(AttachmentKind::File, &file.uri)?;
    }

    let last_row = emitter.last_row;
    match last_row {
        Some(row) => {
            layout.end_message(row);
            diagnostics.stats.messages_rendered += 1;
        }
        None => diagnostics.warn(ReportWarning::EmptyMessage {
            ordinal,
            index: message.index,
            record: serde_json::to_string(message).unwrap_or_else(|_| format!("{message:?}")),
        }),
    }

    Ok(last_row)
}

struct MessageEmitter<'a, 'm> {
    layout: &'a mut ThreadLayout,
    resolver: &'a MediaResolver<'m>,
    diagnostics: &'a mut Diagnostics,
    ordinal: u32,
    message: &'a Message,
    last_row: Option<RowId>,
}

impl MessageEmitter<'_, '_> {
    fn next_row(&mut self) -> Result<RowId> {
        let row = self.layout.append_row(self.message)?;
        self.last_row = Some(row);
        Ok(row)
    }

    fn image(&mut self, kind: AttachmentKind, uri: &str, link: Option<LinkTarget>) -> Result<()> {
        let row = self.next_row()?;
        let resolved = self.resolver.resolve_image(uri, link);
        self.place(row, kind, uri, resolved);
        Ok(())
    }

    fn link(&mut self, kind: AttachmentKind, uri: &str) -> Result<()> {
        let row = self.next_row()?;
        let resolved = self.resolver.resolve_link(kind, uri);
        self.place(row, kind, uri, resolved);
        Ok(())
    }

    fn place(&mut self, row: RowId, kind: AttachmentKind, uri: &str, resolved: ResolvedAttachment) {
        let stats = &mut self.diagnostics.stats;
        match resolved.outcome {
            AttachmentOutcome::Embedded => stats.images_embedded += 1,
            AttachmentOutcome::Placeholder => stats.placeholders += 1,
            AttachmentOutcome::Link => stats.link_cells += 1,
        }
        if let Some(detail) = resolved.fetch_failure {
            self.diagnostics.warn(ReportWarning::AttachmentFetchFailure {
                ordinal: self.ordinal,
                index: self.message.index,
                kind: kind.as_str(),
                uri: uri.to_string(),
                detail,
            });
        }
        if resolved.dimensions_unknown {
            tracing::debug!(
                ordinal = self.ordinal,
                index = self.message.index,
                uri,
                "image dimensions unavailable; using fallback row height"
            );
        }
        if let Some(height) = resolved.row_height {
            self.layout.request_row_height(row, height);
        }
        self.layout.set_message_cell(row, resolved.value);
    }
}

/// Share text, else content, else the link; the share link becomes the
/// hyperlink and a call duration is appended.
#[must_use]
pub fn text_cell(message: &Message) -> Option<CellValue> {
    if message.content.is_none() && message.share.is_none() {
        return None;
    }

    let (mut text, link) = match &message.share {
        Some(share) => (
            share
                .share_text
                .clone()
                .or_else(|| message.content.clone())
                .or_else(|| share.link.clone())
                .unwrap_or_default(),
            share.link.clone(),
        ),
        None => (message.content.clone().unwrap_or_default(), None),
    };
    if let Some(duration) = message.call_duration {
        text.push_str(&format!(" ({duration}s)"));
    }

    Some(match link {
        Some(url) => CellValue::Hyperlinked {
            text,
            url,
            tooltip: None,
        },
        None => CellValue::Plain(text),
    })
}
