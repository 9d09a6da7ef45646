//! HTML table extraction
//!
//! Every `<table>` becomes a grid of rows, every `<td>`/`<th>` a trimmed cell
//! with inner tags stripped.

use once_cell::sync::Lazy;
use regex::Regex;

/// One parsed table: rows of cells
pub type Table = Vec<Vec<String>>;

static TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b.*?</table>").expect("valid table pattern"));
static ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr\b.*?</tr>").expect("valid row pattern"));
static CELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<t[dh]\b[^>]*>(.*?)</t[dh]>").expect("valid cell pattern")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

/// Parse all tables in the markup (pure function)
pub fn parse_tables(html: &str) -> Vec<Table> {
    TABLE
        .find_iter(html)
        .map(|table| {
            ROW.find_iter(table.as_str())
                .map(|row| {
                    CELL.captures_iter(row.as_str())
                        .map(|cell| strip_tags(&cell[1]))
                        .collect::<Vec<String>>()
                })
                .collect::<Table>()
        })
        .collect()
}

fn strip_tags(fragment: &str) -> String {
    TAG.replace_all(fragment, "").trim().to_string()
}
