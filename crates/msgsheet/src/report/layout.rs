use std::collections::BTreeMap;

use anyhow::{Result, bail};

use crate::models::{Message, Thread};
use crate::sheet::{Border, Cell, CellValue, Column, ColumnKey, RowId, Sheet};
use crate::utils::color::color_for;

pub const DATE_FORMAT: &str = "m.d. hh:mm:ss";
pub const REACTION_COLUMN_WIDTH: f64 = 4.0;
pub const REACTION_HEADER_ROTATION: i16 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    Idle,
    ThreadOpen { ordinal: u32 },
    MessageProcessing { ordinal: u32, last_row: RowId },
    ThreadClosed { ordinal: u32 },
}

/// Reaction column per participant name, shared by every thread of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionColumns {
    by_name: BTreeMap<String, usize>,
    names: Vec<String>,
}

impl ReactionColumns {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Names in creation order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn insert(&mut self, name: &str, column: usize) {
        self.by_name.insert(name.to_string(), column);
        self.names.push(name.to_string());
    }
}

/// Owns the sheet while threads are laid out into it.
#[derive(Debug, Clone)]
pub struct ThreadLayout {
    sheet: Sheet,
    reaction_columns: ReactionColumns,
    state: LayoutState,
    salt: String,
}

impl ThreadLayout {
    #[must_use]
    pub fn new(sheet_name: &str, salt: &str) -> Self {
        let mut sheet = Sheet::new(sheet_name);
        sheet.append_column(Column::new(ColumnKey::Id, "#", 5.0).align_top());
        sheet.append_column(
            Column::new(ColumnKey::Date, "Date", 14.0)
                .align_top()
                .num_format(DATE_FORMAT),
        );
        sheet.append_column(
            Column::new(ColumnKey::Type, "Message type", 10.0)
                .align_top()
                .hidden(),
        );
        sheet.append_column(Column::new(ColumnKey::Sender, "Sender", 20.0).align_top());
        sheet.append_column(
            Column::new(ColumnKey::Message, "Message", 50.0)
                .align_top()
                .wrapped(),
        );

        Self {
            sheet,
            reaction_columns: ReactionColumns::default(),
            state: LayoutState::Idle,
            salt: salt.to_string(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> LayoutState {
        self.state
    }

    #[must_use]
    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    #[must_use]
    pub fn into_sheet(self) -> Sheet {
        self.sheet
    }

    #[must_use]
    pub fn reaction_columns(&self) -> &ReactionColumns {
        &self.reaction_columns
    }

    /// Rename the sheet after the thread and provision reaction columns for
    /// participants seen for the first time. Returns the new column names.
    pub fn open_thread(&mut self, thread: &Thread) -> Result<Vec<String>> {
        if let LayoutState::ThreadOpen { ordinal } | LayoutState::MessageProcessing { ordinal, .. } =
            self.state
        {
            bail!(
                "thread {} opened while thread {ordinal} is still open",
                thread.ordinal
            );
        }

        self.sheet.rename(&thread.title);
        let mut created = Vec::new();
        for participant in &thread.participants {
            let (_, is_new) = self.ensure_reaction_column(&participant.name);
            if is_new {
                created.push(participant.name.clone());
            }
        }

        self.state = LayoutState::ThreadOpen {
            ordinal: thread.ordinal,
        };
        Ok(created)
    }

    /// Column index for `name`, creating it at the right edge if needed.
    pub fn ensure_reaction_column(&mut self, name: &str) -> (usize, bool) {
        if let Some(column) = self.reaction_columns.get(name) {
            return (column, false);
        }

        let column = self.sheet.append_column(
            Column::new(
                ColumnKey::Reaction(name.to_string()),
                name,
                REACTION_COLUMN_WIDTH,
            )
            .centered()
            .header_rotation(REACTION_HEADER_ROTATION)
            .header_fill(color_for(name, &self.salt)),
        );
        self.reaction_columns.insert(name, column);
        (column, true)
    }

    /// Append a row carrying the message's identity cells.
    pub fn append_row(&mut self, message: &Message) -> Result<RowId> {
        let ordinal = match self.state {
            LayoutState::ThreadOpen { ordinal } | LayoutState::MessageProcessing { ordinal, .. } => {
                ordinal
            }
            LayoutState::Idle | LayoutState::ThreadClosed { .. } => {
                bail!(
                    "message {} emitted a row outside an open thread",
                    message.index
                )
            }
        };

        let row = self.sheet.append_row();
        self.set(row, &ColumnKey::Id, Cell::new(CellValue::Number(message.index as f64)));
        if let Some(timestamp_ms) = message.timestamp_ms {
            self.set(row, &ColumnKey::Date, Cell::new(CellValue::Timestamp(timestamp_ms)));
        }
        if let Some(kind) = &message.kind {
            self.set(row, &ColumnKey::Type, Cell::new(CellValue::Plain(kind.clone())));
        }
        self.set(
            row,
            &ColumnKey::Sender,
            Cell::filled(
                CellValue::Plain(message.sender_name.clone()),
                color_for(&message.sender_name, &self.salt),
            ),
        );

        self.state = LayoutState::MessageProcessing {
            ordinal,
            last_row: row,
        };
        Ok(row)
    }

    pub fn set_message_cell(&mut self, row: RowId, value: CellValue) {
        self.set(row, &ColumnKey::Message, Cell::new(value));
    }

    /// The first request wins; later attachments never resize the row.
    pub fn request_row_height(&mut self, row: RowId, height: f64) -> bool {
        match self.sheet.row_mut(row) {
            Some(target) if target.height.is_none() => {
                target.height = Some(height);
                true
            }
            _ => false,
        }
    }

    /// Append `symbol` to `actor`'s reaction cell on `row`. Returns whether a
    /// column had to be created for the actor.
    pub fn append_reaction(&mut self, row: RowId, actor: &str, symbol: &str) -> bool {
        let (column, created) = self.ensure_reaction_column(actor);
        let fill = color_for(actor, &self.salt);
        let Some(target) = self.sheet.row_mut(row) else {
            return created;
        };

        let mut text = match target.cells.get(&column).map(|cell| &cell.value) {
            Some(CellValue::Plain(existing)) => existing.clone(),
            _ => String::new(),
        };
        text.push_str(symbol);
        target
            .cells
            .insert(column, Cell::filled(CellValue::Plain(text), fill));
        created
    }

    /// Mark `row` as the last row of its message with a thin bottom border.
    pub fn end_message(&mut self, row: RowId) {
        if let Some(target) = self.sheet.row_mut(row) {
            target.border = Border::Thin;
        }
    }

    /// Close the open thread; its last row, if any, becomes a page boundary.
    pub fn close_thread(&mut self) -> Option<RowId> {
        let (ordinal, last_row) = match self.state {
            LayoutState::ThreadOpen { ordinal } => (ordinal, None),
            LayoutState::MessageProcessing { ordinal, last_row } => (ordinal, Some(last_row)),
            LayoutState::Idle | LayoutState::ThreadClosed { .. } => return None,
        };

        if let Some(row) = last_row
            && let Some(target) = self.sheet.row_mut(row)
        {
            target.border = Border::Double;
            target.page_break = true;
        }

        self.state = LayoutState::ThreadClosed { ordinal };
        last_row
    }

    fn set(&mut self, row: RowId, key: &ColumnKey, cell: Cell) {
        if let Some(column) = self.sheet.column_index(key) {
            self.sheet.set_cell(row, column, cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{LayoutState, ThreadLayout};
    use crate::models::{Message, Participant, Thread};
    use crate::sheet::{Border, CellValue, ColumnKey};
    use crate::utils::color::color_for;

    fn thread(ordinal: u32, title: &str, names: &[&str]) -> Thread {
        Thread {
            ordinal,
            source_path: PathBuf::from(format!("message_{ordinal}.json")),
            title: title.to_string(),
            thread_path: None,
            participants: names
                .iter()
                .map(|name| Participant {
                    name: (*name).to_string(),
                })
                .collect(),
            messages: Vec::new(),
        }
    }

    fn message(index: usize) -> Message {
        Message {
            index,
            sender_name: "Alice".to_string(),
            timestamp_ms: Some(1_000),
            kind: Some("Generic".to_string()),
            content: Some("hi".to_string()),
            ..Message::default()
        }
    }

    #[test]
    fn starts_with_fixed_columns() {
        let layout = ThreadLayout::new("inbox", "");
        let headers: Vec<&str> = layout
            .sheet()
            .columns()
            .iter()
            .map(|column| column.header.as_str())
            .collect();

        assert_eq!(headers, vec!["#", "Date", "Message type", "Sender", "Message"]);
        assert!(layout.sheet().columns()[2].hidden);
        assert_eq!(layout.state(), LayoutState::Idle);
    }

    #[test]
    fn reaction_columns_grow_monotonically_across_threads() {
        let mut layout = ThreadLayout::new("inbox", "");

        let created = layout
            .open_thread(&thread(2, "One", &["Alice", "Bob"]))
            .expect("open");
        assert_eq!(created, vec!["Alice", "Bob"]);
        layout.close_thread();

        let created = layout
            .open_thread(&thread(1, "Two", &["Bob", "Carol", "Alice"]))
            .expect("open");
        assert_eq!(created, vec!["Carol"]);

        assert_eq!(layout.reaction_columns().names(), ["Alice", "Bob", "Carol"]);
        let keys: Vec<String> = layout.sheet().columns()[5..]
            .iter()
            .map(|column| column.key.as_key())
            .collect();
        assert_eq!(
            keys,
            vec!["reaction/Alice", "reaction/Bob", "reaction/Carol"]
        );
        assert_eq!(layout.sheet().name(), "Two");
    }

    #[test]
    fn reaction_header_is_colored_rotated_and_narrow() {
        let mut layout = ThreadLayout::new("inbox", "salt");
        layout
            .open_thread(&thread(1, "t", &["Alice"]))
            .expect("open");
        let column = &layout.sheet().columns()[5];

        assert_eq!(column.header_fill, Some(color_for("Alice", "salt")));
        assert_eq!(column.header_rotation, Some(90));
        assert!((column.width - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rows_require_an_open_thread() {
        let mut layout = ThreadLayout::new("inbox", "");

        assert!(layout.append_row(&message(0)).is_err());
        layout.open_thread(&thread(1, "t", &[])).expect("open");
        assert!(layout.append_row(&message(0)).is_ok());
        layout.close_thread();
        assert!(layout.append_row(&message(1)).is_err());
    }

    #[test]
    fn opening_twice_without_closing_fails() {
        let mut layout = ThreadLayout::new("inbox", "");
        layout.open_thread(&thread(2, "a", &[])).expect("open");

        assert!(layout.open_thread(&thread(1, "b", &[])).is_err());
    }

    #[test]
    fn identity_cells_on_every_row() {
        let mut layout = ThreadLayout::new("inbox", "");
        layout.open_thread(&thread(1, "t", &[])).expect("open");
        let row = layout.append_row(&message(7)).expect("row");
        let sheet = layout.sheet();

        assert_eq!(
            sheet.cell(row, &ColumnKey::Id).map(|cell| &cell.value),
            Some(&CellValue::Number(7.0))
        );
        assert_eq!(
            sheet.cell(row, &ColumnKey::Date).map(|cell| &cell.value),
            Some(&CellValue::Timestamp(1_000))
        );
        let sender = sheet.cell(row, &ColumnKey::Sender).expect("sender cell");
        assert_eq!(sender.fill, Some(color_for("Alice", "")));
        assert_eq!(sheet.rows()[row].border, Border::None);
        assert_eq!(
            layout.state(),
            LayoutState::MessageProcessing {
                ordinal: 1,
                last_row: row
            }
        );
    }

    #[test]
    fn only_the_message_end_gets_a_thin_border() {
        let mut layout = ThreadLayout::new("inbox", "");
        layout.open_thread(&thread(1, "t", &[])).expect("open");
        let text = layout.append_row(&message(0)).expect("row");
        let photo = layout.append_row(&message(0)).expect("row");
        layout.end_message(photo);

        let rows = layout.sheet().rows();
        assert_eq!(rows[text].border, Border::None);
        assert_eq!(rows[photo].border, Border::Thin);
    }

    #[test]
    fn first_height_request_wins() {
        let mut layout = ThreadLayout::new("inbox", "");
        layout.open_thread(&thread(1, "t", &[])).expect("open");
        let row = layout.append_row(&message(0)).expect("row");

        assert!(layout.request_row_height(row, 120.0));
        assert!(!layout.request_row_height(row, 300.0));
        assert_eq!(layout.sheet().rows()[row].height, Some(120.0));
    }

    #[test]
    fn reactions_accumulate_per_actor() {
        let mut layout = ThreadLayout::new("inbox", "");
        layout.open_thread(&thread(1, "t", &["Alice"])).expect("open");
        let row = layout.append_row(&message(0)).expect("row");

        assert!(!layout.append_reaction(row, "Alice", "👍"));
        assert!(!layout.append_reaction(row, "Alice", "👍"));
        assert!(layout.append_reaction(row, "Mallory", "😮"));

        let key = ColumnKey::Reaction("Alice".to_string());
        let cell = layout.sheet().cell(row, &key).expect("reaction cell");
        assert_eq!(cell.value, CellValue::Plain("👍👍".to_string()));
        assert_eq!(cell.fill, Some(color_for("Alice", "")));
    }

    #[test]
    fn closing_marks_the_last_row_as_boundary() {
        let mut layout = ThreadLayout::new("inbox", "");
        layout.open_thread(&thread(1, "t", &[])).expect("open");
        let first = layout.append_row(&message(1)).expect("row");
        layout.end_message(first);
        let last = layout.append_row(&message(0)).expect("row");
        layout.end_message(last);

        assert_eq!(layout.close_thread(), Some(last));
        let rows = layout.sheet().rows();
        assert_eq!(rows[first].border, Border::Thin);
        assert!(!rows[first].page_break);
        assert_eq!(rows[last].border, Border::Double);
        assert!(rows[last].page_break);
        assert_eq!(layout.state(), LayoutState::ThreadClosed { ordinal: 1 });
    }

    #[test]
    fn closing_an_empty_thread_leaves_no_rows() {
        let mut layout = ThreadLayout::new("inbox", "");
        layout.open_thread(&thread(1, "t", &["Alice"])).expect("open");

        assert_eq!(layout.close_thread(), None);
        assert!(layout.sheet().rows().is_empty());
        assert_eq!(layout.sheet().columns().len(), 6);
    }
}
