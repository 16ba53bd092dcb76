//! CSV export of match records

use crate::model::MatchRecord;
use std::io::{self, Write};

pub const CSV_HEADER: &str = "firstIsPresent,secondIsPresent,firstMatches,secondMatches,firstValues,secondValues,documentId,begin,end";

/// Quote a value dump for a CSV cell
///
/// Double quotes, single quotes and backslashes are doubled.
pub fn escape_values(values: &str) -> String {
    let escaped = values
        .replace('"', "\"\"")
        .replace('\'', "''")
        .replace('\\', "\\\\");
    format!("\"{}\"", escaped)
}

/// Write records as CSV, one row per record after the header
pub fn write_csv<'a, W: Write>(
    records: impl IntoIterator<Item = &'a MatchRecord>,
    mut out: W,
) -> io::Result<usize> {
    writeln!(out, "{}", CSV_HEADER)?;
    let mut rows = 0;
    for record in records {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{}",
            record.first_is_present,
            record.second_is_present,
            record.first_matches,
            record.second_matches,
            escape_values(&record.first_values),
            escape_values(&record.second_values),
            record.document_id,
            record.span.begin,
            record.span.end,
        )?;
        rows += 1;
    }
    out.flush()?;
    Ok(rows)
}
