//! Serde view of one `message_<N>.json` fragment, as written by the exporter.
//!
//! Text fields that the exporter mis-decodes are typed [`RawText`]; URIs and
//! links are stored verbatim. Unknown fields are ignored here and reported by
//! [`crate::validate`].

use serde::Deserialize;

use crate::utils::encoding::RawText;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportThread {
    #[serde(default)]
    pub participants: Option<Vec<ExportParticipant>>,
    pub messages: Vec<ExportMessage>,
    #[serde(default)]
    pub title: Option<RawText>,
    #[serde(default)]
    pub thread_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportParticipant {
    #[serde(default)]
    pub name: RawText,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportMessage {
    #[serde(default)]
    pub sender_name: RawText,
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: Option<RawText>,
    #[serde(default)]
    pub call_duration: Option<u64>,
    #[serde(default)]
    pub share: Option<ExportShare>,
    #[serde(default)]
    pub photos: Option<Vec<ExportMedia>>,
    #[serde(default)]
    pub videos: Option<Vec<ExportVideo>>,
    #[serde(default)]
    pub sticker: Option<ExportMedia>,
    #[serde(default)]
    pub gifs: Option<Vec<ExportMedia>>,
    #[serde(default)]
    pub audio_files: Option<Vec<ExportMedia>>,
    #[serde(default)]
    pub files: Option<Vec<ExportMedia>>,
    #[serde(default)]
    pub reactions: Option<Vec<ExportReaction>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportShare {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub share_text: Option<RawText>,
}

/// Photo, sticker, gif, audio clip, generic file, or video thumbnail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportMedia {
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportVideo {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub thumbnail: Option<ExportMedia>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportReaction {
    #[serde(default)]
    pub reaction: RawText,
    #[serde(default)]
    pub actor: RawText,
}
