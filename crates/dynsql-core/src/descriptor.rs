//! Schema description of a parsed statement's select-list

use serde::{Deserialize, Serialize};

use crate::engine::{CursorHandle, DescribedColumn, Engine};
use crate::error::Diagnostic;

/// One projected column of the current statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// 1-based ordinal in the select-list
    pub position: usize,
    /// Column name, bounded to the cursor's name width
    pub name: String,
    /// Character length of the name as the engine reported it
    pub reported_name_len: usize,
    pub type_code: u16,
    pub type_name: String,
    pub max_length: usize,
    pub display_length: usize,
    pub precision: u8,
    pub scale: i8,
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn from_described(position: usize, column: DescribedColumn, name_width: usize) -> Self {
        let reported_name_len = column.name.chars().count();
        let name = bounded_name(&column.name, name_width).to_string();

        Self {
            position,
            name,
            reported_name_len,
            type_code: column.type_code,
            type_name: column.type_name,
            max_length: column.max_length,
            display_length: column.display_length,
            precision: column.precision,
            scale: column.scale,
            nullable: column.nullable,
        }
    }

    pub fn name_truncated(&self) -> bool {
        self.reported_name_len > self.name.chars().count()
    }
}

/// Longest prefix of `name` holding at most `width` characters
pub fn bounded_name(name: &str, width: usize) -> &str {
    match name.char_indices().nth(width) {
        Some((end, _)) => &name[..end],
        None => name,
    }
}

/// Describe select-list item `position`.
///
/// `Ok(None)` is the end-of-columns signal; any `Err` is a genuine failure.
pub fn describe_column<E: Engine + ?Sized>(
    engine: &E,
    cursor: CursorHandle,
    position: usize,
    name_width: usize,
) -> Result<Option<ColumnDescriptor>, Diagnostic> {
    let described = engine.describe_column(cursor, position)?;

    Ok(described.map(|column| {
        let descriptor = ColumnDescriptor::from_described(position, column, name_width);
        if descriptor.name_truncated() {
            tracing::debug!(
                position,
                reported = descriptor.reported_name_len,
                width = name_width,
                "column name truncated"
            );
        }
        descriptor
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_name_short() {
        assert_eq!(bounded_name("ename", 30), "ename");
        assert_eq!(bounded_name("", 30), "");
    }

    #[test]
    fn test_bounded_name_respects_char_boundaries() {
        assert_eq!(bounded_name("émpløyée", 3), "émp");
        assert_eq!(bounded_name("abcdef", 6), "abcdef");
        assert_eq!(bounded_name("abcdefg", 6), "abcdef");
    }

    #[test]
    fn test_long_name_is_truncated() {
        let long = "a_really_long_column_name_that_keeps_going";
        let descriptor = ColumnDescriptor::from_described(1, DescribedColumn::text(long, 10), 30);

        assert_eq!(descriptor.name.chars().count(), 30);
        assert_eq!(descriptor.name, &long[..30]);
        assert_eq!(descriptor.reported_name_len, long.len());
        assert!(descriptor.name_truncated());
    }
}
