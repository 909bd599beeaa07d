//! Text rendering of select-list descriptions, records and summaries

use std::fmt::Write;

use crate::descriptor::ColumnDescriptor;
use crate::row::Row;

pub const NULL_TEXT: &str = "NULL";

/// Select-list description table
pub fn describe_table(columns: &[ColumnDescriptor], name_width: usize) -> String {
    let width = name_width + 1;
    let mut out = String::new();

    let _ = writeln!(out, "There were {} select-list items.", columns.len());
    let _ = writeln!(out, "{:<width$}{:>6}   {:>8}", "Item name", "Length", "Datatype");
    out.push('\n');
    for column in columns {
        let _ = writeln!(
            out,
            "{:<width$}{:>6}   {:>8}",
            column.name, column.max_length, column.type_code
        );
    }

    out
}

/// One fetched row as a numbered record block
pub fn record(number: u64, row: &Row<'_>, name_width: usize) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "-- RECORD {:04} -------------------------", number);
    for (column, cell) in row.iter() {
        let value = cell.as_str().unwrap_or(NULL_TEXT);
        let _ = writeln!(out, "{:<name_width$}: {}", column.name, value);
    }

    out
}

pub fn summary(rows: u64) -> String {
    format!("{} record{} returned.", rows, if rows == 1 { "" } else { "s" })
}
