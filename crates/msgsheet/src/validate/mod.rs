//! Field allow-lists for export records.
//!
//! The loader only consumes a known subset of each record. Anything else is
//! reported as schema drift so that exporter format changes are noticed, but
//! never rejected.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Thread,
    Participant,
    Message,
    Share,
    Photo,
    Video,
    Thumbnail,
    Sticker,
    Gif,
    AudioFile,
    File,
    Reaction,
}

impl RecordKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thread => "thread",
            Self::Participant => "participant",
            Self::Message => "message",
            Self::Share => "share",
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Thumbnail => "thumbnail",
            Self::Sticker => "sticker",
            Self::Gif => "gif",
            Self::AudioFile => "audio_file",
            Self::File => "file",
            Self::Reaction => "reaction",
        }
    }

    #[must_use]
    pub const fn allowed_fields(self) -> &'static [&'static str] {
        match self {
            Self::Thread => &[
                "participants",
                "messages",
                "title",
                "is_still_participant",
                "thread_type",
                "thread_path",
            ],
            Self::Participant => &["name"],
            Self::Message => &[
                "sender_name",
                "timestamp_ms",
                "content",
                "photos",
                "reactions",
                "share",
                "files",
                "type",
                "sticker",
                "gifs",
                "videos",
                "call_duration",
                "audio_files",
                "users",
            ],
            Self::Share => &["link", "share_text"],
            Self::Photo | Self::AudioFile | Self::File => &["uri", "creation_timestamp"],
            Self::Video => &["uri", "creation_timestamp", "thumbnail"],
            Self::Thumbnail | Self::Sticker | Self::Gif => &["uri"],
            Self::Reaction => &["reaction", "actor"],
        }
    }
}

/// An unexpected field on a known record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDrift {
    pub record: RecordKind,
    pub field: String,
    /// Path of the record inside its fragment, e.g. `messages:4/photos:0`.
    pub locator: String,
}

impl fmt::Display for SchemaDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at `{}` has unexpected field `{}`",
            self.record.as_str(),
            self.locator,
            self.field
        )
    }
}

/// Report fields of `object` that are not on the allow-list for `kind`.
pub fn check_record(
    kind: RecordKind,
    object: &Map<String, Value>,
    locator: &str,
    drift: &mut Vec<SchemaDrift>,
) {
    let allowed = kind.allowed_fields();
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            drift.push(SchemaDrift {
                record: kind,
                field: key.clone(),
                locator: locator.to_string(),
            });
        }
    }
}

/// Walk a whole fragment document and collect every unexpected field.
///
/// Entries that are not objects are skipped; the typed parse decides whether
/// they are fatal.
#[must_use]
pub fn check_thread_document(root: &Value) -> Vec<SchemaDrift> {
    let mut drift = Vec::new();
    let Some(thread) = root.as_object() else {
        return drift;
    };
    check_record(RecordKind::Thread, thread, "thread", &mut drift);

    for (index, participant) in objects_in(thread.get("participants")) {
        check_record(
            RecordKind::Participant,
            participant,
            &format!("participants:{index}"),
            &mut drift,
        );
    }

    for (index, message) in objects_in(thread.get("messages")) {
        let locator = format!("messages:{index}");
        check_record(RecordKind::Message, message, &locator, &mut drift);
        check_message_children(message, &locator, &mut drift);
    }

    drift
}

fn check_message_children(
    message: &Map<String, Value>,
    locator: &str,
    drift: &mut Vec<SchemaDrift>,
) {
    if let Some(share) = message.get("share").and_then(Value::as_object) {
        check_record(RecordKind::Share, share, &format!("{locator}/share"), drift);
    }
    if let Some(sticker) = message.get("sticker").and_then(Value::as_object) {
        check_record(
            RecordKind::Sticker,
            sticker,
            &format!("{locator}/sticker"),
            drift,
        );
    }

    for (field, kind) in [
        ("photos", RecordKind::Photo),
        ("gifs", RecordKind::Gif),
        ("audio_files", RecordKind::AudioFile),
        ("files", RecordKind::File),
        ("reactions", RecordKind::Reaction),
    ] {
        for (index, child) in objects_in(message.get(field)) {
            check_record(kind, child, &format!("{locator}/{field}:{index}"), drift);
        }
    }

    for (index, video) in objects_in(message.get("videos")) {
        let video_locator = format!("{locator}/videos:{index}");
        check_record(RecordKind::Video, video, &video_locator, drift);
        if let Some(thumbnail) = video.get("thumbnail").and_then(Value::as_object) {
            check_record(
                RecordKind::Thumbnail,
                thumbnail,
                &format!("{video_locator}/thumbnail"),
                drift,
            );
        }
    }
}

fn objects_in(value: Option<&Value>) -> impl Iterator<Item = (usize, &Map<String, Value>)> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
        .filter_map(|(index, entry)| entry.as_object().map(|object| (index, object)))
}
