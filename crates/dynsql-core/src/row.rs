//! Projection of bound buffers into generic rows

use std::borrow::Cow;

use crate::binding::Binding;
use crate::descriptor::ColumnDescriptor;

/// One value of a fetched row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell<'a> {
    Null,
    Text { value: Cow<'a, str>, truncated: bool },
}

impl<'a> Cell<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Null => None,
            Cell::Text { value, .. } => Some(value),
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Cell::Text { truncated: true, .. })
    }
}

/// View of the current fetch.
///
/// Borrows the cursor's bindings, so it cannot outlive the next fetch.
#[derive(Debug)]
pub struct Row<'a> {
    columns: &'a [ColumnDescriptor],
    cells: Vec<Cell<'a>>,
}

impl<'a> Row<'a> {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn columns(&self) -> &'a [ColumnDescriptor] {
        self.columns
    }

    /// Cell at 0-based `index`
    pub fn get(&self, index: usize) -> Option<&Cell<'a>> {
        self.cells.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ColumnDescriptor, &Cell<'a>)> {
        self.columns.iter().zip(self.cells.iter())
    }

    /// Copy the values out so they survive the next fetch
    pub fn to_values(&self) -> Vec<Option<String>> {
        self.cells
            .iter()
            .map(|cell| cell.as_str().map(str::to_string))
            .collect()
    }

    /// Row as a JSON object keyed by column name.
    ///
    /// A name already taken by an earlier column (possible once names are
    /// truncated) gets its position appended, as in `NAME_2`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut row_obj = serde_json::Map::new();
        for (column, cell) in self.iter() {
            let value = match cell.as_str() {
                Some(text) => serde_json::Value::String(text.to_string()),
                None => serde_json::Value::Null,
            };
            let key = if row_obj.contains_key(&column.name) {
                format!("{}_{}", column.name, column.position)
            } else {
                column.name.clone()
            };
            row_obj.insert(key, value);
        }
        serde_json::Value::Object(row_obj)
    }
}

/// Read the bindings into a row.
///
/// A set null indicator always wins over buffer contents; non-null values
/// are read up to their stored length, which never exceeds the allocation.
pub fn project<'a>(columns: &'a [ColumnDescriptor], bindings: &'a [Binding]) -> Row<'a> {
    let cells = bindings
        .iter()
        .map(|binding| match binding.value() {
            None => Cell::Null,
            Some(bytes) => {
                let truncated = binding.truncation().is_some();
                let bytes = if truncated { whole_chars(bytes) } else { bytes };
                Cell::Text {
                    value: String::from_utf8_lossy(bytes),
                    truncated,
                }
            }
        })
        .collect();

    Row { columns, cells }
}

/// Drop a character cut in half at the end of a truncated value
fn whole_chars(bytes: &[u8]) -> &[u8] {
    match std::str::from_utf8(bytes) {
        Err(e) if e.error_len().is_none() => &bytes[..e.valid_up_to()],
        _ => bytes,
    }
}
