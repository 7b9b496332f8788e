use std::cell::RefCell;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{DynamicImage, ImageFormat, RgbImage};
use msgsheet::config::ReportOptions;
use msgsheet::discovery::load_export_dir;
use msgsheet::media::{FetchTarget, MediaSource};
use msgsheet::models::{MediaRef, Message, Participant, Reaction, Thread};
use msgsheet::report::{ReportWarning, render_threads};
use msgsheet::sheet::{Border, CellValue, ColumnKey};

const MEDIA_ROOT: &str = "/export";

/// Serves a 20x10 PNG for every request and records what was asked for.
#[derive(Default)]
struct PngSource {
    requests: RefCell<Vec<FetchTarget>>,
}

impl MediaSource for PngSource {
    fn fetch(&self, target: &FetchTarget) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push(target.clone());
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(20, 10))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/messenger/messages/inbox/alicebob_1")
}

fn fixture_threads() -> Vec<Thread> {
    load_export_dir(&fixture_dir())
        .expect("fixture export should load")
        .threads
}

fn thread(ordinal: u32, participants: &[&str], messages: Vec<Message>) -> Thread {
    Thread {
        ordinal,
        source_path: PathBuf::from(format!("message_{ordinal}.json")),
        title: format!("Thread {ordinal}"),
        thread_path: None,
        participants: participants
            .iter()
            .map(|name| Participant {
                name: (*name).to_string(),
            })
            .collect(),
        messages,
    }
}

fn message(index: usize, sender: &str) -> Message {
    Message {
        index,
        sender_name: sender.to_string(),
        timestamp_ms: Some(1_700_000_000_000 + index as i64),
        kind: Some("Generic".to_string()),
        ..Message::default()
    }
}

fn photo(uri: &str) -> MediaRef {
    MediaRef {
        uri: uri.to_string(),
    }
}

fn reaction(actor: &str, symbol: &str) -> Reaction {
    Reaction {
        reaction: symbol.to_string(),
        actor: actor.to_string(),
    }
}

#[test]
fn fixture_export_renders_expected_sheet() {
    let source = PngSource::default();
    let report = render_threads(
        "alicebob_1",
        &fixture_threads(),
        &ReportOptions::default(),
        PathBuf::from(MEDIA_ROOT),
        &source,
    )
    .expect("render");

    insta::assert_snapshot!(report.sheet.dump(), @r#"
    sheet: Alice, Bob and Carol
    columns: # | Date | Message type | Sender | Message | Alice | Bob | Carol | Mallory
    row 1: border=thin id=3 date=@1700000000000 type="Call" sender="Alice" message="Alice started a call. (42s)"
    row 2: border=thin id=2 date=@1700000100000 type="Share" sender="Bob" message="Lunch menu"<https://example.com/menu>
    row 3: border=thin height=131.5 id=1 date=@1700000200000 type="Generic" sender="Alice" message=[image .png]<file:///export/messages/inbox/alicebob_1/photos/sunset.png>
    row 4: border=double page_break id=0 date=@1700000300000 type="Generic" sender="Bob" message="See you at the café" reaction/Alice="👍👍"
    row 5: border=thin id=2 date=@1700000400000 type="Generic" sender="Alice" message="❎ Broken thumbnail"<file:///export/messages/inbox/alicebob_1/videos/clip.mp4> reaction/Mallory="❤"
    row 6: border=none id=1 date=@1700000500000 type="Generic" sender="Carol" message="▶ 🎧 Audio clip"<file:///export/messages/inbox/alicebob_1/audio/note.mp4>
    row 7: border=double page_break id=1 date=@1700000500000 type="Generic" sender="Carol" message="plan.pdf"<file:///export/messages/inbox/alicebob_1/files/plan.pdf>
    "#);

    // The dead CDN thumbnail is never requested.
    assert_eq!(
        source.requests.borrow().as_slice(),
        [FetchTarget::Local(PathBuf::from(
            "/export/messages/inbox/alicebob_1/photos/sunset.png"
        ))]
    );

    let kinds: Vec<&str> = report.warnings.iter().map(ReportWarning::kind).collect();
    assert_eq!(
        kinds,
        vec!["unlisted_reaction_actor", "empty_message", "orphan_reaction"]
    );
    assert_eq!(report.stats.threads, 2);
    assert_eq!(report.stats.messages, 7);
    assert_eq!(report.stats.messages_rendered, 6);
    assert_eq!(report.stats.rows, 7);
    assert_eq!(report.stats.reaction_columns, 4);
    assert_eq!(report.stats.images_embedded, 1);
    assert_eq!(report.stats.placeholders, 1);
}

#[test]
fn reaction_columns_are_monotonic_and_never_duplicated() {
    let threads = vec![
        thread(3, &["Alice", "Bob"], vec![message(0, "Alice")]),
        thread(2, &["Bob", "Alice"], vec![message(0, "Bob")]),
        thread(1, &["Carol", "Alice"], vec![message(0, "Carol")]),
    ];
    let threads: Vec<Thread> = threads
        .into_iter()
        .map(|mut thread| {
            thread.messages[0].content = Some("hi".to_string());
            thread
        })
        .collect();

    let report = render_threads(
        "inbox",
        &threads,
        &ReportOptions::default(),
        PathBuf::from(MEDIA_ROOT),
        &PngSource::default(),
    )
    .expect("render");

    let headers: Vec<&str> = report
        .sheet
        .columns()
        .iter()
        .map(|column| column.header.as_str())
        .collect();
    assert_eq!(
        headers,
        vec!["#", "Date", "Message type", "Sender", "Message", "Alice", "Bob", "Carol"]
    );
}

#[test]
fn each_attachment_gets_its_own_row_with_shared_identity() {
    let mut two_photos = message(4, "Alice");
    two_photos.photos = vec![photo("photos/a.png"), photo("photos/b.png")];
    let threads = vec![thread(1, &["Alice"], vec![two_photos])];

    let report = render_threads(
        "inbox",
        &threads,
        &ReportOptions::default(),
        PathBuf::from(MEDIA_ROOT),
        &PngSource::default(),
    )
    .expect("render");

    assert_eq!(report.sheet.rows().len(), 2);
    for row in 0..2 {
        assert_eq!(
            report.sheet.cell(row, &ColumnKey::Id).map(|cell| &cell.value),
            Some(&CellValue::Number(4.0))
        );
        assert_eq!(
            report.sheet.cell(row, &ColumnKey::Date).map(|cell| &cell.value),
            Some(&CellValue::Timestamp(1_700_000_000_004))
        );
        assert!(
            report
                .sheet
                .cell(row, &ColumnKey::Message)
                .is_some_and(|cell| cell.value.is_image())
        );
    }
}

#[test]
fn multi_row_message_gets_one_thin_border_on_its_last_row() {
    let mut album = message(1, "Alice");
    album.content = Some("holiday".to_string());
    album.photos = vec![photo("photos/a.png"), photo("photos/b.png")];
    let mut reply = message(0, "Bob");
    reply.content = Some("nice".to_string());
    let threads = vec![thread(1, &["Alice", "Bob"], vec![reply, album])];

    let report = render_threads(
        "inbox",
        &threads,
        &ReportOptions::default(),
        PathBuf::from(MEDIA_ROOT),
        &PngSource::default(),
    )
    .expect("render");

    let borders: Vec<Border> = report.sheet.rows().iter().map(|row| row.border).collect();
    assert_eq!(
        borders,
        vec![Border::None, Border::None, Border::Thin, Border::Double]
    );
}

#[test]
fn repeated_reactions_accumulate_on_the_last_row() {
    let mut with_photos = message(0, "Bob");
    with_photos.content = Some("look".to_string());
    with_photos.photos = vec![photo("photos/a.png")];
    with_photos.reactions = vec![reaction("Alice", "👍"), reaction("Alice", "👍")];
    let threads = vec![thread(1, &["Alice", "Bob"], vec![with_photos])];

    let report = render_threads(
        "inbox",
        &threads,
        &ReportOptions::default(),
        PathBuf::from(MEDIA_ROOT),
        &PngSource::default(),
    )
    .expect("render");

    let alice = ColumnKey::Reaction("Alice".to_string());
    assert!(report.sheet.cell(0, &alice).is_none());
    let cell = report.sheet.cell(1, &alice).expect("reaction cell");
    assert_eq!(cell.value, CellValue::Plain("👍👍".to_string()));
    assert!(cell.fill.is_some());
    assert_eq!(report.stats.reactions_applied, 2);
}

#[test]
fn empty_message_leaves_no_row_and_drops_its_reactions() {
    let mut empty = message(1, "Alice");
    empty.reactions = vec![reaction("Bob", "😮")];
    let mut text = message(0, "Bob");
    text.content = Some("hello".to_string());
    let threads = vec![thread(1, &["Alice", "Bob"], vec![text, empty])];

    let report = render_threads(
        "inbox",
        &threads,
        &ReportOptions::default(),
        PathBuf::from(MEDIA_ROOT),
        &PngSource::default(),
    )
    .expect("render");

    assert_eq!(report.sheet.rows().len(), 1);
    assert!(
        report
            .sheet
            .cell(0, &ColumnKey::Reaction("Bob".to_string()))
            .is_none()
    );
    match report.warnings.as_slice() {
        [
            ReportWarning::EmptyMessage { index: 1, record, .. },
            ReportWarning::OrphanReaction { actor, reaction, .. },
        ] => {
            assert!(record.contains("\"sender_name\":\"Alice\""));
            assert_eq!(actor, "Bob");
            assert_eq!(reaction, "😮");
        }
        other => panic!("unexpected warnings: {other:?}"),
    }
}

#[test]
fn thread_boundaries_get_double_border_and_page_break() {
    let mut first = message(0, "Alice");
    first.content = Some("a".to_string());
    let mut second = message(1, "Alice");
    second.content = Some("b".to_string());
    let mut third = message(0, "Bob");
    third.content = Some("c".to_string());
    let threads = vec![
        thread(2, &["Alice"], vec![first, second]),
        thread(1, &["Bob"], vec![]),
        thread(0, &["Bob"], vec![third]),
    ];

    let report = render_threads(
        "inbox",
        &threads,
        &ReportOptions::default(),
        PathBuf::from(MEDIA_ROOT),
        &PngSource::default(),
    )
    .expect("render");

    let styling: Vec<(Border, bool)> = report
        .sheet
        .rows()
        .iter()
        .map(|row| (row.border, row.page_break))
        .collect();
    assert_eq!(
        styling,
        vec![
            (Border::Thin, false),
            (Border::Double, true),
            (Border::Double, true),
        ]
    );
    assert_eq!(report.stats.threads_empty, 1);
}

#[test]
fn disabled_embedding_links_every_visual_attachment() {
    let source = PngSource::default();
    let options = ReportOptions {
        embed_images: false,
        ..ReportOptions::default()
    };

    let report = render_threads(
        "alicebob_1",
        &fixture_threads(),
        &options,
        PathBuf::from(MEDIA_ROOT),
        &source,
    )
    .expect("render");

    assert!(source.requests.borrow().is_empty());
    assert_eq!(report.stats.images_embedded, 0);
    assert_eq!(report.stats.placeholders, 2);
    for row in report.sheet.rows() {
        assert!(row.height.is_none());
        assert!(row.cells.values().all(|cell| !cell.value.is_image()));
    }
    let photo_row = report
        .sheet
        .cell(2, &ColumnKey::Message)
        .expect("photo row");
    assert_eq!(photo_row.value.text(), Some("❎ Broken thumbnail"));
    assert_eq!(
        photo_row.value.url(),
        Some("file:///export/messages/inbox/alicebob_1/photos/sunset.png")
    );
    assert_eq!(photo_row.value.tooltip(), Some("Image 🖼"));
}
