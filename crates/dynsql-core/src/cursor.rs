//! Sessions, cursors and the describe → bind → execute → fetch lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::binding::Binding;
use crate::descriptor::{describe_column, ColumnDescriptor};
use crate::engine::{Credentials, CursorHandle, Engine, Fetch};
use crate::error::{CursorError, Diagnostic, Stage};
use crate::row::{project, Row};

/// Limits applied to every statement a cursor runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorOptions {
    /// Hard upper bound on the number of select-list items
    pub max_columns: usize,
    /// Column names are cut to this many characters
    pub name_width: usize,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self {
            max_columns: 1024,
            name_width: 30,
        }
    }
}

/// Where a cursor is in its statement lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorState {
    /// Open, no statement parsed (or the last one was abandoned)
    Opened,
    Parsed,
    Described,
    Bound,
    Executed,
    Fetching,
    Exhausted,
    Failed,
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CursorState::Opened => "opened",
            CursorState::Parsed => "parsed",
            CursorState::Described => "described",
            CursorState::Bound => "bound",
            CursorState::Executed => "executed",
            CursorState::Fetching => "fetching",
            CursorState::Exhausted => "exhausted",
            CursorState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Totals reported once a statement's rows are exhausted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub rows: u64,
    pub columns: usize,
    pub truncated_values: u64,
}

/// An open connection to an engine.
///
/// Cursors borrow the session, so it cannot be closed while any of them is
/// still alive.
pub struct Session<E: Engine> {
    engine: E,
    options: CursorOptions,
}

impl<E: Engine> Session<E> {
    pub fn open(credentials: &Credentials) -> Result<Self, CursorError> {
        Self::open_with(credentials, CursorOptions::default())
    }

    pub fn open_with(credentials: &Credentials, options: CursorOptions) -> Result<Self, CursorError> {
        let engine = E::connect(credentials)
            .map_err(|d| CursorError::engine(Stage::Connect, None, d))?;
        info!(
            user = %credentials.user,
            database = credentials.database.as_deref().unwrap_or(":memory:"),
            "session opened"
        );
        Ok(Self::from_engine(engine, options))
    }

    pub fn from_engine(engine: E, options: CursorOptions) -> Self {
        Self { engine, options }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn options(&self) -> &CursorOptions {
        &self.options
    }

    pub fn open_cursor(&self) -> Result<Cursor<'_, E>, CursorError> {
        let handle = self
            .engine
            .open_cursor()
            .map_err(|d| CursorError::engine(Stage::Open, None, d))?;
        debug!(cursor = %handle, "cursor opened");

        Ok(Cursor {
            session: self,
            handle,
            state: CursorState::Opened,
            statement_id: None,
            columns: Vec::new(),
            bindings: Vec::new(),
            rows_fetched: 0,
            truncated_values: 0,
            closed: false,
        })
    }

    /// Most recent engine failure on this session
    pub fn last_error(&self) -> Diagnostic {
        self.engine.last_error()
    }

    pub fn close(self) -> Result<(), CursorError> {
        self.engine
            .close_session()
            .map_err(|d| CursorError::engine(Stage::Close, None, d))?;
        info!("session closed");
        Ok(())
    }
}

/// Execution context for one statement at a time.
///
/// Owns the descriptors and bindings of the current statement. They are
/// dropped when the statement is exhausted, abandoned or replaced by the
/// next parse, never read across statements.
pub struct Cursor<'s, E: Engine> {
    session: &'s Session<E>,
    handle: CursorHandle,
    state: CursorState,
    statement_id: Option<Uuid>,
    columns: Vec<ColumnDescriptor>,
    bindings: Vec<Binding>,
    rows_fetched: u64,
    truncated_values: u64,
    closed: bool,
}

impl<'s, E: Engine> Cursor<'s, E> {
    pub fn handle(&self) -> CursorHandle {
        self.handle
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Identifier of the statement most recently parsed, for log correlation
    pub fn statement_id(&self) -> Option<Uuid> {
        self.statement_id
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Bindings of the current statement; kept after a failure for inspection
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn rows_fetched(&self) -> u64 {
        self.rows_fetched
    }

    pub fn last_error(&self) -> Diagnostic {
        self.session.last_error()
    }

    /// Available only after the fetch loop reached the end of rows
    pub fn summary(&self) -> Option<Summary> {
        (self.state == CursorState::Exhausted).then(|| Summary {
            rows: self.rows_fetched,
            columns: self.columns.len(),
            truncated_values: self.truncated_values,
        })
    }

    /// Parse a new statement, discarding everything left from the previous one
    pub fn parse(&mut self, sql: &str) -> Result<(), CursorError> {
        self.release();
        self.columns.clear();
        self.rows_fetched = 0;
        self.truncated_values = 0;

        let statement_id = Uuid::new_v4();
        self.statement_id = Some(statement_id);
        debug!(cursor = %self.handle, statement = %statement_id, sql, "parse");

        match self.session.engine.parse(self.handle, sql) {
            Ok(()) => {
                self.state = CursorState::Parsed;
                Ok(())
            }
            Err(d) => Err(self.fail(CursorError::engine(Stage::Parse, None, d))),
        }
    }

    /// Enumerate the select-list until the engine reports no more columns.
    ///
    /// The first genuine engine error aborts the enumeration.
    pub fn describe(&mut self) -> Result<&[ColumnDescriptor], CursorError> {
        self.require("describe", &[CursorState::Parsed])?;

        match enumerate_columns(self.session, self.handle) {
            Ok(columns) => {
                debug!(cursor = %self.handle, columns = columns.len(), "described select-list");
                self.columns = columns;
                self.state = CursorState::Described;
                Ok(&self.columns)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Allocate and register one binding per described column
    pub fn bind(&mut self) -> Result<(), CursorError> {
        self.require("bind", &[CursorState::Described])?;

        match allocate_bindings(self.session, self.handle, &self.columns) {
            Ok(bindings) => {
                debug!(cursor = %self.handle, bindings = bindings.len(), "bound output buffers");
                self.bindings = bindings;
                self.state = CursorState::Bound;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    pub fn execute(&mut self) -> Result<(), CursorError> {
        self.require("execute", &[CursorState::Bound])?;

        match self.session.engine.execute(self.handle) {
            Ok(()) => {
                debug!(cursor = %self.handle, "executed");
                self.state = CursorState::Executed;
                Ok(())
            }
            Err(d) => Err(self.fail(CursorError::engine(Stage::Execute, None, d))),
        }
    }

    /// Pull the next row into the bindings.
    ///
    /// Returns `Ok(None)` at the end of rows, and keeps returning it until
    /// the next parse. A failed cursor is rejected without calling the engine.
    pub fn fetch(&mut self) -> Result<Option<Row<'_>>, CursorError> {
        match self.state {
            CursorState::Executed | CursorState::Fetching => {}
            CursorState::Exhausted => return Ok(None),
            _ => {
                return Err(CursorError::State {
                    operation: "fetch",
                    state: self.state,
                })
            }
        }

        match self.session.engine.fetch(self.handle, &mut self.bindings) {
            Ok(Fetch::Row) => {
                self.rows_fetched += 1;
                self.state = CursorState::Fetching;
                for truncation in self.bindings.iter().filter_map(Binding::truncation) {
                    self.truncated_values += 1;
                    warn!(
                        cursor = %self.handle,
                        row = self.rows_fetched,
                        position = truncation.position,
                        actual_len = truncation.actual_len,
                        capacity = truncation.capacity,
                        "value truncated to buffer capacity"
                    );
                }
                Ok(Some(project(&self.columns, &self.bindings)))
            }
            Ok(Fetch::EndOfRows) => {
                self.state = CursorState::Exhausted;
                self.release();
                debug!(cursor = %self.handle, rows = self.rows_fetched, "fetch exhausted");
                Ok(None)
            }
            Err(d) => Err(self.fail(CursorError::engine(Stage::Fetch, None, d))),
        }
    }

    /// Parse, describe, bind and execute `sql`, returning its rows
    pub fn run_query(&mut self, sql: &str) -> Result<RowStream<'_, 's, E>, CursorError> {
        self.parse(sql)?;
        self.describe()?;
        self.bind()?;
        self.execute()?;
        Ok(RowStream { cursor: self })
    }

    pub fn close(mut self) -> Result<(), CursorError> {
        self.closed = true;
        self.release();
        self.session
            .engine
            .close_cursor(self.handle)
            .map_err(|d| CursorError::engine(Stage::Close, None, d))?;
        debug!(cursor = %self.handle, "cursor closed");
        Ok(())
    }

    fn require(&self, operation: &'static str, allowed: &[CursorState]) -> Result<(), CursorError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CursorError::State {
                operation,
                state: self.state,
            })
        }
    }

    fn fail(&mut self, err: CursorError) -> CursorError {
        warn!(cursor = %self.handle, state = %self.state, error = %err, "statement failed");
        self.state = CursorState::Failed;
        err
    }

    fn release(&mut self) {
        self.bindings = Vec::new();
    }

    /// Drop a statement whose rows were not read to the end
    fn abandon(&mut self) {
        debug!(cursor = %self.handle, rows = self.rows_fetched, "statement abandoned");
        self.release();
        self.state = CursorState::Opened;
    }
}

fn enumerate_columns<E: Engine>(
    session: &Session<E>,
    handle: CursorHandle,
) -> Result<Vec<ColumnDescriptor>, CursorError> {
    let options = &session.options;
    let mut columns = Vec::new();

    for position in 1.. {
        match describe_column(&session.engine, handle, position, options.name_width) {
            Ok(Some(_)) if position > options.max_columns => {
                return Err(CursorError::TooManyColumns {
                    limit: options.max_columns,
                })
            }
            Ok(Some(descriptor)) => columns.push(descriptor),
            Ok(None) => break,
            Err(d) => return Err(CursorError::engine(Stage::Describe, Some(position), d)),
        }
    }

    Ok(columns)
}

/// Allocate and register one binding per column.
///
/// An early return drops the partially built vector, so bindings for
/// earlier positions are released before the error propagates.
fn allocate_bindings<E: Engine>(
    session: &Session<E>,
    handle: CursorHandle,
    columns: &[ColumnDescriptor],
) -> Result<Vec<Binding>, CursorError> {
    let mut bindings = Vec::with_capacity(columns.len());

    for descriptor in columns {
        let binding = Binding::allocate(descriptor)?;
        session
            .engine
            .bind_column(handle, descriptor.position, binding.capacity())
            .map_err(|d| CursorError::engine(Stage::Bind, Some(descriptor.position), d))?;
        bindings.push(binding);
    }

    Ok(bindings)
}

impl<E: Engine> Drop for Cursor<'_, E> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(d) = self.session.engine.close_cursor(self.handle) {
            warn!(cursor = %self.handle, error = %d, "failed to close cursor");
        }
    }
}

/// Lazy, finite, non-restartable sequence of rows for one statement.
///
/// Dropping the stream before the end abandons the statement and releases
/// its bindings.
pub struct RowStream<'c, 's, E: Engine> {
    cursor: &'c mut Cursor<'s, E>,
}

impl<'c, 's, E: Engine> RowStream<'c, 's, E> {
    pub fn columns(&self) -> &[ColumnDescriptor] {
        self.cursor.columns()
    }

    /// Next row, `Ok(None)` at normal completion
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Row<'_>>, CursorError> {
        self.cursor.fetch()
    }

    pub fn rows_fetched(&self) -> u64 {
        self.cursor.rows_fetched()
    }

    pub fn state(&self) -> CursorState {
        self.cursor.state()
    }

    pub fn summary(&self) -> Option<Summary> {
        self.cursor.summary()
    }

    /// Drain the remaining rows, copying their values
    pub fn collect_values(mut self) -> Result<(Vec<Vec<Option<String>>>, Summary), CursorError> {
        let mut rows = Vec::new();
        while let Some(row) = self.next()? {
            rows.push(row.to_values());
        }
        Ok((rows, self.summary().unwrap_or_default()))
    }
}

impl<E: Engine> Drop for RowStream<'_, '_, E> {
    fn drop(&mut self) {
        if matches!(
            self.cursor.state,
            CursorState::Executed | CursorState::Fetching
        ) {
            self.cursor.abandon();
        }
    }
}
