//! Scripted in-memory engine for testing
//!
//! Statements are registered up front by their exact SQL text together with
//! the columns they describe, the rows they return and optional injected
//! failures. Every engine call is counted so tests can prove a call never
//! reached the engine.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::binding::Binding;
use crate::engine::{Credentials, CursorHandle, DescribedColumn, Engine, Fetch};
use crate::error::Diagnostic;

pub const INVALID_SQL: i32 = 900;
pub const INVALID_CURSOR: i32 = 1001;
pub const FETCH_OUT_OF_SEQUENCE: i32 = 1002;
pub const NO_STATEMENT: i32 = 1003;
pub const NOT_IN_SELECT_LIST: i32 = 1007;
pub const INJECTED: i32 = 20000;

/// A statement the mock engine knows how to run
#[derive(Debug, Clone, Default)]
pub struct MockStatement {
    pub columns: Vec<DescribedColumn>,
    pub rows: Vec<Vec<Option<String>>>,
    pub fail_describe_at: Option<usize>,
    pub fail_bind_at: Option<usize>,
    pub fail_execute: bool,
    /// Fail the fetch that would return this 1-based row
    pub fail_fetch_at: Option<usize>,
}

impl MockStatement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a nullable text column
    pub fn column(self, name: &str, max_length: usize) -> Self {
        self.with_column(DescribedColumn::text(name, max_length))
    }

    pub fn with_column(mut self, column: DescribedColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn row<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.rows
            .push(values.into_iter().map(|v| v.map(Into::into)).collect());
        self
    }

    pub fn fail_describe_at(mut self, position: usize) -> Self {
        self.fail_describe_at = Some(position);
        self
    }

    pub fn fail_bind_at(mut self, position: usize) -> Self {
        self.fail_bind_at = Some(position);
        self
    }

    pub fn fail_execute(mut self) -> Self {
        self.fail_execute = true;
        self
    }

    pub fn fail_fetch_at(mut self, row: usize) -> Self {
        self.fail_fetch_at = Some(row);
        self
    }
}

/// Number of calls made to each engine operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub parse: usize,
    pub describe: usize,
    pub bind: usize,
    pub execute: usize,
    pub fetch: usize,
    pub close_cursor: usize,
}

#[derive(Debug, Default)]
struct MockCursor {
    statement: Option<MockStatement>,
    defined: Vec<Option<usize>>,
    executed: bool,
    next_row: usize,
}

#[derive(Debug, Default)]
pub struct MockEngine {
    statements: HashMap<String, MockStatement>,
    cursors: RefCell<HashMap<CursorHandle, MockCursor>>,
    next_handle: Cell<u32>,
    last_error: RefCell<Option<Diagnostic>>,
    calls: Cell<CallCounts>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statement(mut self, sql: &str, statement: MockStatement) -> Self {
        self.add_statement(sql, statement);
        self
    }

    pub fn add_statement(&mut self, sql: &str, statement: MockStatement) {
        self.statements.insert(sql.trim().to_string(), statement);
    }

    pub fn calls(&self) -> CallCounts {
        self.calls.get()
    }

    pub fn open_cursors(&self) -> usize {
        self.cursors.borrow().len()
    }

    fn count(&self, f: impl FnOnce(&mut CallCounts)) {
        let mut calls = self.calls.get();
        f(&mut calls);
        self.calls.set(calls);
    }

    fn fail(&self, code: i32, message: impl Into<String>) -> Diagnostic {
        let diagnostic = Diagnostic::new(code, message);
        *self.last_error.borrow_mut() = Some(diagnostic.clone());
        diagnostic
    }

    fn with_cursor<T>(
        &self,
        handle: CursorHandle,
        f: impl FnOnce(&mut MockCursor) -> Result<T, (i32, String)>,
    ) -> Result<T, Diagnostic> {
        let mut cursors = self.cursors.borrow_mut();
        let result = match cursors.get_mut(&handle) {
            Some(cursor) => f(cursor),
            None => Err((INVALID_CURSOR, format!("invalid cursor {}", handle))),
        };
        drop(cursors);
        result.map_err(|(code, message)| self.fail(code, message))
    }
}

fn statement_of(cursor: &MockCursor) -> Result<&MockStatement, (i32, String)> {
    cursor
        .statement
        .as_ref()
        .ok_or_else(|| (NO_STATEMENT, "no statement parsed".to_string()))
}

impl Engine for MockEngine {
    fn connect(_credentials: &Credentials) -> Result<Self, Diagnostic> {
        Ok(Self::new())
    }

    fn open_cursor(&self) -> Result<CursorHandle, Diagnostic> {
        let handle = CursorHandle(self.next_handle.get() + 1);
        self.next_handle.set(handle.0);
        self.cursors
            .borrow_mut()
            .insert(handle, MockCursor::default());
        Ok(handle)
    }

    fn parse(&self, handle: CursorHandle, sql: &str) -> Result<(), Diagnostic> {
        self.count(|c| c.parse += 1);
        let statement = self.statements.get(sql.trim()).cloned();

        self.with_cursor(handle, |cursor| {
            *cursor = MockCursor::default();
            match statement {
                Some(statement) => {
                    cursor.defined = vec![None; statement.columns.len()];
                    cursor.statement = Some(statement);
                    Ok(())
                }
                None => Err((INVALID_SQL, "invalid SQL statement".to_string())),
            }
        })
    }

    fn describe_column(
        &self,
        handle: CursorHandle,
        position: usize,
    ) -> Result<Option<DescribedColumn>, Diagnostic> {
        self.count(|c| c.describe += 1);

        self.with_cursor(handle, |cursor| {
            let statement = statement_of(cursor)?;
            if statement.fail_describe_at == Some(position) {
                return Err((INJECTED, format!("describe of column {} failed", position)));
            }
            Ok(position
                .checked_sub(1)
                .and_then(|i| statement.columns.get(i))
                .cloned())
        })
    }

    fn bind_column(
        &self,
        handle: CursorHandle,
        position: usize,
        capacity: usize,
    ) -> Result<(), Diagnostic> {
        self.count(|c| c.bind += 1);

        self.with_cursor(handle, |cursor| {
            let statement = statement_of(cursor)?;
            if statement.fail_bind_at == Some(position) {
                return Err((INJECTED, format!("define of column {} failed", position)));
            }
            let slot = position
                .checked_sub(1)
                .and_then(|i| cursor.defined.get_mut(i))
                .ok_or_else(|| (NOT_IN_SELECT_LIST, "variable not in select list".to_string()))?;
            *slot = Some(capacity);
            Ok(())
        })
    }

    fn execute(&self, handle: CursorHandle) -> Result<(), Diagnostic> {
        self.count(|c| c.execute += 1);

        self.with_cursor(handle, |cursor| {
            if statement_of(cursor)?.fail_execute {
                return Err((INJECTED, "insufficient privileges".to_string()));
            }
            cursor.executed = true;
            cursor.next_row = 0;
            Ok(())
        })
    }

    fn fetch(&self, handle: CursorHandle, bindings: &mut [Binding]) -> Result<Fetch, Diagnostic> {
        self.count(|c| c.fetch += 1);

        self.with_cursor(handle, |cursor| {
            if !cursor.executed {
                return Err((FETCH_OUT_OF_SEQUENCE, "fetch out of sequence".to_string()));
            }
            let statement = statement_of(cursor)?;
            if bindings.len() != statement.columns.len() {
                return Err((
                    NOT_IN_SELECT_LIST,
                    format!(
                        "{} bindings for {} select-list items",
                        bindings.len(),
                        statement.columns.len()
                    ),
                ));
            }
            if statement.fail_fetch_at == Some(cursor.next_row + 1) {
                return Err((INJECTED, format!("fetch of row {} failed", cursor.next_row + 1)));
            }

            let Some(row) = statement.rows.get(cursor.next_row) else {
                return Ok(Fetch::EndOfRows);
            };
            for (binding, value) in bindings.iter_mut().zip(row) {
                match value {
                    Some(text) => {
                        binding.write(text.as_bytes());
                    }
                    None => binding.set_null(),
                }
            }
            cursor.next_row += 1;
            Ok(Fetch::Row)
        })
    }

    fn close_cursor(&self, handle: CursorHandle) -> Result<(), Diagnostic> {
        self.count(|c| c.close_cursor += 1);

        match self.cursors.borrow_mut().remove(&handle) {
            Some(_) => Ok(()),
            None => Err(self.fail(INVALID_CURSOR, format!("invalid cursor {}", handle))),
        }
    }

    fn close_session(&self) -> Result<(), Diagnostic> {
        self.cursors.borrow_mut().clear();
        Ok(())
    }

    fn last_error(&self) -> Diagnostic {
        self.last_error
            .borrow()
            .clone()
            .unwrap_or_else(Diagnostic::success)
    }
}
