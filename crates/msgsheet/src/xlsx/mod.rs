//! Encodes a [`Sheet`] as a single-worksheet `.xlsx` workbook.

use std::path::Path;

use anyhow::{Context, Result, bail};
use rust_xlsxwriter::{
    Color as XlsxColor, Format, FormatAlign, FormatBorder, FormatPattern, Image, Url as XlsxUrl,
    Workbook, Worksheet,
};
use serde::Serialize;

use crate::media::{BROKEN_THUMBNAIL_LABEL, DISPLAY_WIDTH, IMAGE_TOOLTIP};
use crate::sheet::{Border, Cell, CellValue, Column, HorizontalAlign, Sheet, VerticalAlign};
use crate::utils::color::Color;
use crate::utils::time::excel_serial_from_unix_ms;

const MAX_COLUMNS: usize = 16_384;
/// Data rows; the header takes the first worksheet row.
const MAX_DATA_ROWS: usize = 1_048_575;
const MAX_PAGE_BREAKS: usize = 1_023;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub rows: usize,
    pub columns: usize,
    pub images: usize,
    pub image_failures: usize,
    pub page_breaks: usize,
    pub page_breaks_dropped: usize,
}

pub fn write_workbook(sheet: &Sheet, path: &Path) -> Result<WriteSummary> {
    let mut workbook = Workbook::new();
    let summary = populate_worksheet(workbook.add_worksheet(), sheet)?;
    workbook
        .save(path)
        .with_context(|| format!("failed to write workbook: {}", path.display()))?;
    Ok(summary)
}

/// Write header, data rows, column geometry and page breaks into `worksheet`.
pub fn populate_worksheet(worksheet: &mut Worksheet, sheet: &Sheet) -> Result<WriteSummary> {
    if sheet.columns().len() > MAX_COLUMNS {
        bail!(
            "sheet has {} columns; the workbook limit is {MAX_COLUMNS}",
            sheet.columns().len()
        );
    }
    if sheet.rows().len() > MAX_DATA_ROWS {
        bail!(
            "sheet has {} rows; the workbook limit is {MAX_DATA_ROWS}",
            sheet.rows().len()
        );
    }

    worksheet
        .set_name(sheet.name())
        .with_context(|| format!("invalid worksheet name `{}`", sheet.name()))?;

    let mut summary = WriteSummary {
        rows: sheet.rows().len(),
        columns: sheet.columns().len(),
        ..WriteSummary::default()
    };

    for (index, column) in sheet.columns().iter().enumerate() {
        let col = column_number(index);
        worksheet
            .set_column_width(col, column.width)
            .with_context(|| format!("failed to size column `{}`", column.header))?;
        if column.hidden {
            worksheet
                .set_column_hidden(col)
                .with_context(|| format!("failed to hide column `{}`", column.header))?;
        }
        worksheet
            .write_string_with_format(0, col, column.header.as_str(), &header_format(column))
            .with_context(|| format!("failed to write header `{}`", column.header))?;
    }

    for (index, row) in sheet.rows().iter().enumerate() {
        let row_number = row_number(index);
        if let Some(height) = row.height {
            worksheet
                .set_row_height(row_number, height)
                .with_context(|| format!("failed to set height of row {row_number}"))?;
        }

        for (column_index, column) in sheet.columns().iter().enumerate() {
            let cell = row.cells.get(&column_index);
            let format = cell_format(column, row.border, cell.and_then(|cell| cell.fill));
            let col = column_number(column_index);
            match cell {
                Some(cell) => write_cell(worksheet, row_number, col, cell, &format, &mut summary)?,
                None if row.border != Border::None => {
                    worksheet
                        .write_blank(row_number, col, &format)
                        .with_context(|| format!("failed to write cell {row_number}:{col}"))?;
                }
                None => {}
            }
        }
    }

    let (breaks, dropped) = page_break_rows(sheet);
    if dropped > 0 {
        tracing::warn!(
            kept = breaks.len(),
            dropped,
            "too many thread boundaries; later page breaks were dropped"
        );
    }
    if !breaks.is_empty() {
        worksheet
            .set_page_breaks(&breaks)
            .context("failed to set page breaks")?;
    }
    summary.page_breaks = breaks.len();
    summary.page_breaks_dropped = dropped;

    Ok(summary)
}

/// Worksheet rows that end a page, in ascending order, capped at the
/// workbook limit. Returns the kept breaks and how many were dropped.
#[must_use]
pub fn page_break_rows(sheet: &Sheet) -> (Vec<u32>, usize) {
    let mut breaks: Vec<u32> = sheet
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| row.page_break)
        // The break sits below the row: one for the header, one because the
        // break position names the row after it.
        .map(|(index, _)| row_number(index) + 1)
        .collect();
    let dropped = breaks.len().saturating_sub(MAX_PAGE_BREAKS);
    breaks.truncate(MAX_PAGE_BREAKS);
    (breaks, dropped)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    format: &Format,
    summary: &mut WriteSummary,
) -> Result<()> {
    let written = match &cell.value {
        CellValue::Number(value) => worksheet.write_number_with_format(row, col, *value, format),
        CellValue::Timestamp(timestamp_ms) => worksheet.write_number_with_format(
            row,
            col,
            excel_serial_from_unix_ms(*timestamp_ms),
            format,
        ),
        CellValue::Plain(text) => worksheet.write_string_with_format(row, col, text, format),
        CellValue::Hyperlinked { text, url, tooltip } => {
            return write_link(worksheet, row, col, text, url, tooltip.as_deref(), format);
        }
        CellValue::Image {
            image,
            url,
            tooltip,
        } => {
            let label = tooltip.as_deref().unwrap_or(IMAGE_TOOLTIP);
            write_link(worksheet, row, col, label, url, tooltip.as_deref(), format)?;
            match Image::new_from_buffer(&image.bytes) {
                Ok(mut embedded) => {
                    if let Some((width, _)) = image.dimensions.filter(|(width, _)| *width > 0) {
                        let scale = DISPLAY_WIDTH / f64::from(width);
                        embedded = embedded.set_scale_width(scale).set_scale_height(scale);
                    }
                    worksheet
                        .insert_image(row, col, &embedded)
                        .with_context(|| format!("failed to place image at {row}:{col}"))?;
                    summary.images += 1;
                }
                Err(error) => {
                    tracing::warn!(row, col, url, "image could not be embedded: {error}");
                    summary.image_failures += 1;
                    write_link(
                        worksheet,
                        row,
                        col,
                        BROKEN_THUMBNAIL_LABEL,
                        url,
                        tooltip.as_deref(),
                        format,
                    )?;
                }
            }
            return Ok(());
        }
    };

    written.with_context(|| format!("failed to write cell {row}:{col}"))?;
    Ok(())
}

/// Hyperlinked text; a link the workbook rejects (too long, bad scheme)
/// degrades to the plain text.
fn write_link(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    text: &str,
    url: &str,
    tooltip: Option<&str>,
    format: &Format,
) -> Result<()> {
    let mut link = XlsxUrl::new(url).set_text(text);
    if let Some(tooltip) = tooltip {
        link = link.set_tip(tooltip);
    }

    if let Err(error) = worksheet.write_url_with_format(row, col, link, format) {
        tracing::debug!(row, col, url, "hyperlink rejected, writing text only: {error}");
        worksheet
            .write_string_with_format(row, col, text, format)
            .with_context(|| format!("failed to write cell {row}:{col}"))?;
    }
    Ok(())
}

fn header_format(column: &Column) -> Format {
    let mut format = Format::new()
        .set_bold()
        .set_align(vertical_align(VerticalAlign::Bottom))
        .set_border_bottom(border_style(Border::Thick));
    if let Some(horizontal) = column.horizontal {
        format = format.set_align(horizontal_align(horizontal));
    }
    if let Some(degrees) = column.header_rotation {
        format = format.set_rotation(degrees);
    }
    if let Some(fill) = column.header_fill {
        format = with_fill(format, fill);
    }
    format
}

/// Column base style, then the row's bottom border, then the cell's fill.
fn cell_format(column: &Column, border: Border, fill: Option<Color>) -> Format {
    let mut format = Format::new();
    if let Some(horizontal) = column.horizontal {
        format = format.set_align(horizontal_align(horizontal));
    }
    if let Some(vertical) = column.vertical {
        format = format.set_align(vertical_align(vertical));
    }
    if column.wrap_text {
        format = format.set_text_wrap();
    }
    if let Some(num_format) = &column.num_format {
        format = format.set_num_format(num_format);
    }
    if border != Border::None {
        format = format.set_border_bottom(border_style(border));
    }
    if let Some(fill) = fill {
        format = with_fill(format, fill);
    }
    format
}

fn with_fill(format: Format, fill: Color) -> Format {
    format
        .set_pattern(FormatPattern::Solid)
        .set_background_color(XlsxColor::RGB(fill.rgb()))
}

const fn border_style(border: Border) -> FormatBorder {
    match border {
        Border::None => FormatBorder::None,
        Border::Thin => FormatBorder::Thin,
        Border::Double => FormatBorder::Double,
        Border::Thick => FormatBorder::Thick,
    }
}

const fn horizontal_align(align: HorizontalAlign) -> FormatAlign {
    match align {
        HorizontalAlign::Center => FormatAlign::Center,
    }
}

const fn vertical_align(align: VerticalAlign) -> FormatAlign {
    match align {
        VerticalAlign::Top => FormatAlign::Top,
        VerticalAlign::Bottom => FormatAlign::Bottom,
    }
}

// Both conversions are bounded by the limit checks in `populate_worksheet`.
fn column_number(index: usize) -> u16 {
    u16::try_from(index).unwrap_or(u16::MAX)
}

fn row_number(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}
