//! Extracts draw rows from the HTML fragment of a results page.

use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use vietlott_core::{DrawRecord, TableShape};

static ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tr").expect("valid row selector"));
static CELLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("valid cell selector"));
static SPANS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("valid span selector"));

const SITE_DATE_FORMAT: &str = "%d/%m/%Y";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";
const RESULT_SEPARATOR: &str = "|";

/// Rows are numbered from 1, counting data rows only.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("no table rows in page")]
    Empty,
    #[error("row {row}: expected at least {expected} cells, found {found}")]
    Shape {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row}: invalid draw date {value:?}")]
    Date { row: usize, value: String },
    #[error("row {row}: non-numeric result {value:?}")]
    NumberFormat { row: usize, value: String },
}

/// Parse every data row of the results table in `html`.
///
/// The first table row is the header. A header-only table yields no
/// records; a fragment without any table row is [`ParseError::Empty`].
pub fn parse_results(
    html: &str,
    page_index: u32,
    shape: &TableShape,
    process_time: &str,
) -> Result<Vec<DrawRecord>, ParseError> {
    let fragment = Html::parse_fragment(html);
    let rows: Vec<ElementRef> = fragment.select(&ROWS).collect();
    if rows.is_empty() {
        return Err(ParseError::Empty);
    }

    rows.iter()
        .skip(1)
        .enumerate()
        .map(|(idx, row)| parse_row(*row, idx + 1, page_index, shape, process_time))
        .collect()
}

fn parse_row(
    row: ElementRef,
    row_no: usize,
    page_index: u32,
    shape: &TableShape,
    process_time: &str,
) -> Result<DrawRecord, ParseError> {
    let cells: Vec<ElementRef> = row.select(&CELLS).collect();
    if cells.len() < shape.min_columns() {
        return Err(ParseError::Shape {
            row: row_no,
            expected: shape.min_columns(),
            found: cells.len(),
        });
    }

    let raw_date = cell_text(cells[shape.date_col]);
    let date = NaiveDate::parse_from_str(raw_date.trim(), SITE_DATE_FORMAT)
        .map_err(|_| ParseError::Date {
            row: row_no,
            value: raw_date.clone(),
        })?
        .format(ISO_DATE_FORMAT)
        .to_string();

    let id = cell_text(cells[shape.id_col]).trim().to_string();

    let mut result = Vec::new();
    for span in cells[shape.result_col].select(&SPANS) {
        let text = cell_text(span);
        let text = text.trim();
        if text == RESULT_SEPARATOR {
            continue;
        }
        let n = text.parse::<u32>().map_err(|_| ParseError::NumberFormat {
            row: row_no,
            value: text.to_string(),
        })?;
        result.push(n);
    }

    Ok(DrawRecord {
        date,
        id,
        result,
        page: i64::from(page_index),
        process_time: process_time.to_string(),
    })
}

fn cell_text(el: ElementRef) -> String {
    el.text().collect()
}

/// Test fixture: a results fragment shaped like the live site's.
#[cfg(test)]
pub(crate) fn results_html(rows: &[(&str, &str, &[u32])]) -> String {
    let mut html = String::from(
        "<div class=\"doso_output_nd\"><table class=\"table table-hover\"><thead><tr><th>Ngày</th><th>Kỳ</th><th>Bộ số</th></tr></thead><tbody>",
    );
    for (date, id, numbers) in rows {
        html.push_str(&format!(
            "<tr><td>{date}</td><td><a href=\"#\">{id}</a></td><td><div class=\"day_so_ket_qua_v2\">"
        ));
        for (i, n) in numbers.iter().enumerate() {
            if i + 1 == numbers.len() && numbers.len() == 7 {
                html.push_str("<span>|</span>");
            }
            html.push_str(&format!("<span class=\"bong_tron small\">{n:02}</span>"));
        }
        html.push_str("</div></td></tr>");
    }
    html.push_str("</tbody></table></div>");
    html
}
