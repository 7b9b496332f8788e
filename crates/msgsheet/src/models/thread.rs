use std::path::PathBuf;

use serde::Serialize;

use super::export::{ExportMedia, ExportMessage, ExportShare, ExportThread, ExportVideo};

/// One export fragment after its single repair pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thread {
    pub ordinal: u32,
    pub source_path: PathBuf,
    pub title: String,
    pub thread_path: Option<String>,
    pub participants: Vec<Participant>,
    /// Stored order: index 0 is the newest message.
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Message {
    pub index: usize,
    pub sender_name: String,
    pub timestamp_ms: Option<i64>,
    pub kind: Option<String>,
    pub content: Option<String>,
    pub call_duration: Option<u64>,
    pub share: Option<Share>,
    pub photos: Vec<MediaRef>,
    pub videos: Vec<Video>,
    pub sticker: Option<MediaRef>,
    pub gifs: Vec<MediaRef>,
    pub audio_files: Vec<MediaRef>,
    pub files: Vec<MediaRef>,
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Share {
    pub link: Option<String>,
    pub share_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRef {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Video {
    pub uri: String,
    pub thumbnail: Option<MediaRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reaction {
    pub reaction: String,
    pub actor: String,
}

impl Thread {
    #[must_use]
    pub fn from_export(ordinal: u32, source_path: PathBuf, raw: ExportThread) -> Self {
        Self {
            ordinal,
            source_path,
            title: raw.title.map(|title| title.repaired()).unwrap_or_default(),
            thread_path: raw.thread_path,
            participants: raw
                .participants
                .unwrap_or_default()
                .into_iter()
                .map(|participant| Participant {
                    name: participant.name.repaired(),
                })
                .collect(),
            messages: raw
                .messages
                .into_iter()
                .enumerate()
                .map(|(index, message)| Message::from_export(index, message))
                .collect(),
        }
    }
}

impl Message {
    #[must_use]
    pub fn from_export(index: usize, raw: ExportMessage) -> Self {
        Self {
            index,
            sender_name: raw.sender_name.repaired(),
            timestamp_ms: raw.timestamp_ms,
            kind: raw.kind,
            content: raw
                .content
                .map(|content| content.repaired())
                .filter(|content| !content.is_empty()),
            call_duration: raw.call_duration,
            share: raw.share.map(Share::from_export),
            photos: media_list(raw.photos),
            videos: raw
                .videos
                .unwrap_or_default()
                .into_iter()
                .map(Video::from_export)
                .collect(),
            sticker: raw.sticker.map(MediaRef::from_export),
            gifs: media_list(raw.gifs),
            audio_files: media_list(raw.audio_files),
            files: media_list(raw.files),
            reactions: raw
                .reactions
                .unwrap_or_default()
                .into_iter()
                .map(|reaction| Reaction {
                    reaction: reaction.reaction.repaired(),
                    actor: reaction.actor.repaired(),
                })
                .collect(),
        }
    }

    /// Whether the message carries anything that becomes a row.
    #[must_use]
    pub fn has_renderable_content(&self) -> bool {
        self.content.is_some()
            || self.share.is_some()
            || !self.photos.is_empty()
            || !self.videos.is_empty()
            || self.sticker.is_some()
            || !self.gifs.is_empty()
            || !self.audio_files.is_empty()
            || !self.files.is_empty()
    }
}

impl Share {
    fn from_export(raw: ExportShare) -> Self {
        Self {
            link: raw.link.filter(|link| !link.is_empty()),
            share_text: raw
                .share_text
                .map(|text| text.repaired())
                .filter(|text| !text.is_empty()),
        }
    }
}

impl MediaRef {
    fn from_export(raw: ExportMedia) -> Self {
        Self { uri: raw.uri }
    }
}

impl Video {
    fn from_export(raw: ExportVideo) -> Self {
        Self {
            uri: raw.uri,
            thumbnail: raw.thumbnail.map(MediaRef::from_export),
        }
    }
}

fn media_list(raw: Option<Vec<ExportMedia>>) -> Vec<MediaRef> {
    raw.unwrap_or_default()
        .into_iter()
        .map(MediaRef::from_export)
        .collect()
}
