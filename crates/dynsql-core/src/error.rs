//! Diagnostics reported by the engine and errors raised by the cursor pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::cursor::CursorState;

/// Engine-reported status code plus message.
///
/// Code `0` is the success status; every failing engine operation produces
/// a non-zero code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: i32,
    pub message: String,
}

impl Diagnostic {
    pub const SUCCESS: i32 = 0;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Status returned by `last_error` when nothing has failed yet
    pub fn success() -> Self {
        Self::new(Self::SUCCESS, "normal, successful completion")
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "engine error (code {})", self.code)
        } else {
            write!(f, "engine error (code {}): {}", self.code, self.message)
        }
    }
}

impl std::error::Error for Diagnostic {}

/// Pipeline stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Connect,
    Open,
    Parse,
    Describe,
    Bind,
    Execute,
    Fetch,
    Close,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connect => "connect",
            Stage::Open => "open",
            Stage::Parse => "parse",
            Stage::Describe => "describe",
            Stage::Bind => "bind",
            Stage::Execute => "execute",
            Stage::Fetch => "fetch",
            Stage::Close => "close",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error(
        "{stage} failed{}: {diagnostic}",
        .position.map(|p| format!(" at column {p}")).unwrap_or_default()
    )]
    Engine {
        stage: Stage,
        position: Option<usize>,
        diagnostic: Diagnostic,
    },

    #[error("failed to allocate {bytes} bytes for column {position}")]
    Allocation { position: usize, bytes: usize },

    #[error("cannot {operation} while cursor is {state}")]
    State {
        operation: &'static str,
        state: CursorState,
    },

    #[error("select-list exceeds the supported maximum of {limit} columns")]
    TooManyColumns { limit: usize },
}

impl CursorError {
    pub(crate) fn engine(stage: Stage, position: Option<usize>, diagnostic: Diagnostic) -> Self {
        CursorError::Engine {
            stage,
            position,
            diagnostic,
        }
    }

    /// The engine diagnostic behind this error, if the engine produced one
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            CursorError::Engine { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            CursorError::Engine { stage, .. } => Some(*stage),
            CursorError::Allocation { .. } => Some(Stage::Bind),
            CursorError::TooManyColumns { .. } => Some(Stage::Describe),
            CursorError::State { .. } => None,
        }
    }

    pub fn is_state_violation(&self) -> bool {
        matches!(self, CursorError::State { .. })
    }
}
