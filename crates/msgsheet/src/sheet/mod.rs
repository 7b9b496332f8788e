//! In-memory report document.
//!
//! The layout engine writes into a [`Sheet`]; [`crate::xlsx`] encodes it. Row
//! ids index data rows only, the header row is implicit.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::utils::color::Color;

pub type RowId = usize;

pub const SHEET_NAME_MAX_CHARS: usize = 31;
const SHEET_NAME_ILLEGAL: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];
/// Reserved by Excel, compared case-insensitively.
const SHEET_NAME_RESERVED: &str = "History";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnKey {
    Id,
    Date,
    Type,
    Sender,
    Message,
    Reaction(String),
}

impl ColumnKey {
    #[must_use]
    pub fn as_key(&self) -> String {
        match self {
            Self::Id => "id".to_string(),
            Self::Date => "date".to_string(),
            Self::Type => "type".to_string(),
            Self::Sender => "sender".to_string(),
            Self::Message => "message".to_string(),
            Self::Reaction(name) => format!("reaction/{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlign {
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub key: ColumnKey,
    pub header: String,
    pub width: f64,
    pub hidden: bool,
    pub horizontal: Option<HorizontalAlign>,
    pub vertical: Option<VerticalAlign>,
    pub wrap_text: bool,
    pub num_format: Option<String>,
    pub header_fill: Option<Color>,
    pub header_rotation: Option<i16>,
}

impl Column {
    #[must_use]
    pub fn new(key: ColumnKey, header: impl Into<String>, width: f64) -> Self {
        Self {
            key,
            header: header.into(),
            width,
            hidden: false,
            horizontal: None,
            vertical: None,
            wrap_text: false,
            num_format: None,
            header_fill: None,
            header_rotation: None,
        }
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn align_top(mut self) -> Self {
        self.vertical = Some(VerticalAlign::Top);
        self
    }

    #[must_use]
    pub fn centered(mut self) -> Self {
        self.horizontal = Some(HorizontalAlign::Center);
        self
    }

    #[must_use]
    pub fn wrapped(mut self) -> Self {
        self.wrap_text = true;
        self
    }

    #[must_use]
    pub fn num_format(mut self, format: impl Into<String>) -> Self {
        self.num_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn header_fill(mut self, color: Color) -> Self {
        self.header_fill = Some(color);
        self
    }

    #[must_use]
    pub fn header_rotation(mut self, degrees: i16) -> Self {
        self.header_rotation = Some(degrees);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Border {
    #[default]
    None,
    Thin,
    Double,
    Thick,
}

impl Border {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Thin => "thin",
            Self::Double => "double",
            Self::Thick => "thick",
        }
    }
}

/// Media bytes to be drawn over a cell.
#[derive(Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub bytes: Vec<u8>,
    pub extension: String,
    pub dimensions: Option<(u32, u32)>,
}

impl std::fmt::Debug for EmbeddedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedImage")
            .field("bytes", &self.bytes.len())
            .field("extension", &self.extension)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    /// Unix milliseconds, rendered as a date.
    Timestamp(i64),
    Plain(String),
    Hyperlinked {
        text: String,
        url: String,
        tooltip: Option<String>,
    },
    Image {
        image: EmbeddedImage,
        url: String,
        tooltip: Option<String>,
    },
}

impl CellValue {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Plain(text) | Self::Hyperlinked { text, .. } => Some(text),
            Self::Number(_) | Self::Timestamp(_) | Self::Image { .. } => None,
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Hyperlinked { url, .. } | Self::Image { url, .. } => Some(url),
            Self::Number(_) | Self::Timestamp(_) | Self::Plain(_) => None,
        }
    }

    #[must_use]
    pub fn tooltip(&self) -> Option<&str> {
        match self {
            Self::Hyperlinked { tooltip, .. } | Self::Image { tooltip, .. } => tooltip.as_deref(),
            Self::Number(_) | Self::Timestamp(_) | Self::Plain(_) => None,
        }
    }

    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub fill: Option<Color>,
}

impl Cell {
    #[must_use]
    pub const fn new(value: CellValue) -> Self {
        Self { value, fill: None }
    }

    #[must_use]
    pub const fn filled(value: CellValue, fill: Color) -> Self {
        Self {
            value,
            fill: Some(fill),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Keyed by column index.
    pub cells: BTreeMap<usize, Cell>,
    pub height: Option<f64>,
    pub border: Border,
    pub page_break: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Sheet {
    /// `name` is sanitized; an unusable name falls back to `Sheet1`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: sanitize_sheet_name(name).unwrap_or_else(|| "Sheet1".to_string()),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `false`, keeping the current name, when `name` is unusable as a sheet name.
    pub fn rename(&mut self, name: &str) -> bool {
        match sanitize_sheet_name(name) {
            Some(sanitized) => {
                self.name = sanitized;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column_index(&self, key: &ColumnKey) -> Option<usize> {
        self.columns.iter().position(|column| &column.key == key)
    }

    /// Append a column; an existing column with the same key is kept and its
    /// index returned.
    pub fn append_column(&mut self, column: Column) -> usize {
        if let Some(index) = self.column_index(&column.key) {
            return index;
        }
        self.columns.push(column);
        self.columns.len() - 1
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, row: RowId) -> Option<&Row> {
        self.rows.get(row)
    }

    pub fn row_mut(&mut self, row: RowId) -> Option<&mut Row> {
        self.rows.get_mut(row)
    }

    pub fn append_row(&mut self) -> RowId {
        self.rows.push(Row::default());
        self.rows.len() - 1
    }

    /// Write a cell; returns `false` when the row or column does not exist.
    pub fn set_cell(&mut self, row: RowId, column: usize, cell: Cell) -> bool {
        if column >= self.columns.len() {
            return false;
        }
        match self.rows.get_mut(row) {
            Some(target) => {
                target.cells.insert(column, cell);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn cell(&self, row: RowId, key: &ColumnKey) -> Option<&Cell> {
        let column = self.column_index(key)?;
        self.rows.get(row)?.cells.get(&column)
    }

    /// Stable text rendering, one line per row, fills omitted.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "sheet: {}", self.name);
        let headers: Vec<&str> = self
            .columns
            .iter()
            .map(|column| column.header.as_str())
            .collect();
        let _ = writeln!(out, "columns: {}", headers.join(" | "));

        for (index, row) in self.rows.iter().enumerate() {
            let _ = write!(out, "row {}: border={}", index + 1, row.border.as_str());
            if row.page_break {
                out.push_str(" page_break");
            }
            if let Some(height) = row.height {
                let _ = write!(out, " height={height}");
            }
            for (column, cell) in &row.cells {
                let key = self.columns[*column].key.as_key();
                let _ = write!(out, " {key}={}", dump_value(&cell.value));
            }
            out.push('\n');
        }

        out
    }
}

fn dump_value(value: &CellValue) -> String {
    match value {
        CellValue::Number(number) => number.to_string(),
        CellValue::Timestamp(timestamp_ms) => format!("@{timestamp_ms}"),
        CellValue::Plain(text) => format!("{text:?}"),
        CellValue::Hyperlinked { text, url, .. } => format!("{text:?}<{url}>"),
        CellValue::Image { image, url, .. } => format!("[image .{}]<{url}>", image.extension),
    }
}

/// Apply spreadsheet sheet-name rules: no `[]:*?/\`, no leading or trailing
/// apostrophe, at most 31 characters, not `History`. Returns `None` if nothing
/// usable is left.
#[must_use]
pub fn sanitize_sheet_name(raw: &str) -> Option<String> {
    let replaced: String = raw
        .chars()
        .map(|ch| if SHEET_NAME_ILLEGAL.contains(&ch) { '_' } else { ch })
        .collect();
    let trimmed = replaced.trim().trim_matches('\'');
    let truncated: String = trimmed.chars().take(SHEET_NAME_MAX_CHARS).collect();
    let truncated = truncated.trim_end().trim_end_matches('\'').to_string();
    if truncated.is_empty() || truncated.eq_ignore_ascii_case(SHEET_NAME_RESERVED) {
        None
    } else {
        Some(truncated)
    }
}
