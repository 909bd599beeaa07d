//! Host-side output buffers the engine writes fetched values into

use serde::{Deserialize, Serialize};

use crate::descriptor::ColumnDescriptor;
use crate::error::CursorError;

/// Out-of-band state of a binding after a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indicator {
    /// Buffer holds the complete value
    Value,
    /// Value is SQL NULL; buffer contents are meaningless
    Null,
    /// Value was cut to the buffer capacity; `actual_len` is the engine's length
    Truncated { actual_len: usize },
}

/// Non-fatal warning raised when a value did not fit its buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    pub position: usize,
    pub actual_len: usize,
    pub capacity: usize,
}

/// Output buffer plus null indicator for one select-list position.
///
/// The buffer is `max_length + 1` bytes; the extra byte always holds a
/// terminating zero after the value, whatever its length.
#[derive(Debug)]
pub struct Binding {
    position: usize,
    buffer: Vec<u8>,
    len: usize,
    indicator: Indicator,
}

impl Binding {
    /// Allocate the buffer for `descriptor`.
    ///
    /// Allocation is fallible: an oversized descriptor yields
    /// `CursorError::Allocation` instead of aborting the process.
    pub fn allocate(descriptor: &ColumnDescriptor) -> Result<Self, CursorError> {
        let position = descriptor.position;
        let bytes = descriptor
            .max_length
            .checked_add(1)
            .ok_or(CursorError::Allocation {
                position,
                bytes: usize::MAX,
            })?;

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(bytes)
            .map_err(|_| CursorError::Allocation { position, bytes })?;
        buffer.resize(bytes, 0);

        Ok(Self {
            position,
            buffer,
            len: 0,
            indicator: Indicator::Null,
        })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Total buffer size, terminator included
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Largest value length the buffer can hold
    pub fn value_capacity(&self) -> usize {
        self.buffer.len() - 1
    }

    /// Store `value`, capping it to the buffer capacity.
    ///
    /// Returns the truncation warning when bytes had to be dropped.
    pub fn write(&mut self, value: &[u8]) -> Option<Truncation> {
        let capacity = self.value_capacity();
        let len = value.len().min(capacity);

        self.buffer[..len].copy_from_slice(&value[..len]);
        self.buffer[len] = 0;
        self.len = len;

        if value.len() > capacity {
            self.indicator = Indicator::Truncated {
                actual_len: value.len(),
            };
            Some(Truncation {
                position: self.position,
                actual_len: value.len(),
                capacity,
            })
        } else {
            self.indicator = Indicator::Value;
            None
        }
    }

    /// Mark the value as NULL, leaving whatever bytes the buffer held
    pub fn set_null(&mut self) {
        self.len = 0;
        self.indicator = Indicator::Null;
    }

    pub fn indicator(&self) -> Indicator {
        self.indicator
    }

    pub fn is_null(&self) -> bool {
        self.indicator == Indicator::Null
    }

    /// Current value bytes, or `None` for NULL
    pub fn value(&self) -> Option<&[u8]> {
        match self.indicator {
            Indicator::Null => None,
            Indicator::Value | Indicator::Truncated { .. } => Some(&self.buffer[..self.len]),
        }
    }

    pub fn truncation(&self) -> Option<Truncation> {
        match self.indicator {
            Indicator::Truncated { actual_len } => Some(Truncation {
                position: self.position,
                actual_len,
                capacity: self.value_capacity(),
            }),
            _ => None,
        }
    }
}
