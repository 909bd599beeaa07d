//! DuckDB engine for dynamic SQL cursors
//!
//! Statements are validated by preparing them and described through DuckDB's
//! `DESCRIBE <query>`. Statements `DESCRIBE` cannot handle (DML with
//! `RETURNING`, `SHOW`, `PRAGMA`, `EXPLAIN`, DDL) are run when first described
//! and their result columns are read from the Arrow schema. Fetched values are
//! rendered to text with Arrow's display formatter.

use duckdb::arrow::array::Array;
use duckdb::arrow::datatypes::SchemaRef;
use duckdb::arrow::error::ArrowError;
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::arrow::util::display::{ArrayFormatter, FormatOptions};
use duckdb::{AccessMode, Config, Connection, Result as DuckResult};
use dynsql_core::{Binding, Credentials, CursorHandle, DescribedColumn, Diagnostic, Engine, Fetch};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

pub mod types;

/// Status codes for diagnostics raised by this engine
pub mod codes {
    /// DuckDB rejected the statement
    pub const ENGINE_FAILURE: i32 = 1;
    /// Client-side failure (value conversion, invalid argument)
    pub const CLIENT_FAILURE: i32 = 2;
    pub const INVALID_CURSOR: i32 = 10;
    pub const NO_STATEMENT: i32 = 11;
    pub const NOT_EXECUTED: i32 = 12;
    pub const NOT_IN_SELECT_LIST: i32 = 13;
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckOptions {
    /// Maximum text length reported for types without a fixed bound
    pub text_length: usize,
    /// Open file databases read-only
    pub read_only: bool,
}

impl Default for DuckOptions {
    fn default() -> Self {
        Self {
            text_length: 4000,
            read_only: false,
        }
    }
}

/// Result batches of an executed statement plus the read position.
///
/// A duckdb `Statement` borrows the connection, so an open result stream
/// cannot be kept in the cursor between fetches. The result is held as
/// columnar Arrow batches instead and each row is formatted only when it is
/// fetched.
#[derive(Debug, Default)]
struct ResultSet {
    batches: VecDeque<RecordBatch>,
    /// Next row within the front batch
    row: usize,
}

impl ResultSet {
    fn remaining(&self) -> usize {
        let total: usize = self.batches.iter().map(RecordBatch::num_rows).sum();
        total - self.row.min(total)
    }

    fn next_row(&mut self) -> Option<(RecordBatch, usize)> {
        while let Some(batch) = self.batches.front() {
            if self.row < batch.num_rows() {
                let row = self.row;
                self.row += 1;
                return Some((batch.clone(), row));
            }
            self.batches.pop_front();
            self.row = 0;
        }
        None
    }
}

#[derive(Debug, Default)]
struct DuckCursor {
    sql: Option<String>,
    columns: Option<Vec<DescribedColumn>>,
    defined: Vec<Option<usize>>,
    /// Results of a statement that had to run to be described
    described_results: Option<ResultSet>,
    results: Option<ResultSet>,
}

pub struct DuckEngine {
    conn: Connection,
    options: DuckOptions,
    cursors: RefCell<HashMap<CursorHandle, DuckCursor>>,
    next_handle: Cell<u32>,
    last_error: RefCell<Option<Diagnostic>>,
}

impl DuckEngine {
    pub fn open(credentials: &Credentials, options: DuckOptions) -> Result<Self, Diagnostic> {
        let conn = match credentials.database.as_deref() {
            None | Some("") | Some(":memory:") => Connection::open_in_memory(),
            Some(path) if options.read_only => Config::default()
                .access_mode(AccessMode::ReadOnly)
                .and_then(|config| Connection::open_with_flags(path, config)),
            Some(path) => Connection::open(path),
        }
        .map_err(|e| diagnostic(&e))?;

        Ok(Self::from_connection(conn, options))
    }

    pub fn from_connection(conn: Connection, options: DuckOptions) -> Self {
        Self {
            conn,
            options,
            cursors: RefCell::new(HashMap::new()),
            next_handle: Cell::new(0),
            last_error: RefCell::new(None),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn options(&self) -> &DuckOptions {
        &self.options
    }

    fn record(&self, diagnostic: Diagnostic) -> Diagnostic {
        *self.last_error.borrow_mut() = Some(diagnostic.clone());
        diagnostic
    }

    /// Run `f` on the cursor slot, recording any failure as the last error
    fn with_cursor<T>(
        &self,
        handle: CursorHandle,
        f: impl FnOnce(&mut DuckCursor) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        let mut cursors = self.cursors.borrow_mut();
        let result = match cursors.get_mut(&handle) {
            Some(cursor) => f(cursor),
            None => Err(Diagnostic::new(
                codes::INVALID_CURSOR,
                format!("invalid cursor {}", handle),
            )),
        };
        drop(cursors);
        result.map_err(|d| self.record(d))
    }

    /// Select-list of `sql`.
    ///
    /// When `DESCRIBE` cannot report the columns the statement is run here,
    /// and its results come back with the columns so execute does not run it
    /// a second time.
    fn describe_statement(
        &self,
        sql: &str,
    ) -> DuckResult<(Vec<DescribedColumn>, Option<ResultSet>)> {
        match self.describe_query(sql) {
            Ok(rows) if !rows.is_empty() => {
                let columns = rows
                    .into_iter()
                    .map(|(name, type_name, null)| {
                        self.described_column(name, type_name, null.as_deref() != Some("NO"))
                    })
                    .collect();
                return Ok((columns, None));
            }
            Ok(_) => debug!("DESCRIBE reported no columns, running statement"),
            Err(e) => debug!(error = %e, "statement not describable, running it"),
        }

        let (schema, results) = self.run_statement(sql)?;
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                self.described_column(
                    field.name().clone(),
                    types::arrow_type_name(field.data_type()),
                    field.is_nullable(),
                )
            })
            .collect();
        Ok((columns, Some(results)))
    }

    /// `(column_name, column_type, null)` rows of `DESCRIBE <sql>`
    fn describe_query(&self, sql: &str) -> DuckResult<Vec<(String, String, Option<String>)>> {
        let mut stmt = self.conn.prepare(&format!("DESCRIBE {}", sql))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<DuckResult<Vec<_>>>()?;
        Ok(rows)
    }

    fn described_column(&self, name: String, type_name: String, nullable: bool) -> DescribedColumn {
        let info = types::type_info(&type_name);
        let max_length = info.max_length.unwrap_or(self.options.text_length);

        DescribedColumn {
            name,
            type_code: info.code,
            type_name,
            max_length,
            display_length: max_length.max(1),
            precision: info.precision,
            scale: info.scale,
            nullable,
        }
    }

    fn run_statement(&self, sql: &str) -> DuckResult<(SchemaRef, ResultSet)> {
        let mut stmt = self.conn.prepare(sql)?;
        let arrow = stmt.query_arrow([])?;
        let schema = arrow.get_schema();
        let results = ResultSet {
            batches: arrow.collect(),
            row: 0,
        };

        debug!(columns = schema.fields().len(), rows = results.remaining(), "statement executed");
        Ok((schema, results))
    }
}

/// Statement text without surrounding whitespace or trailing semicolons
fn statement_text(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

fn diagnostic(err: &duckdb::Error) -> Diagnostic {
    let code = match err {
        duckdb::Error::DuckDBFailure(..) => codes::ENGINE_FAILURE,
        _ => codes::CLIENT_FAILURE,
    };
    Diagnostic::new(code, err.to_string())
}

fn conversion(err: &ArrowError) -> Diagnostic {
    Diagnostic::new(codes::CLIENT_FAILURE, err.to_string())
}

/// Text form of one non-null value
fn cell_text(column: &dyn Array, row: usize) -> Result<String, ArrowError> {
    let formatter = ArrayFormatter::try_new(column, &FormatOptions::default())?;
    Ok(formatter.value(row).to_string())
}

fn no_statement() -> Diagnostic {
    Diagnostic::new(codes::NO_STATEMENT, "no statement parsed")
}

impl Engine for DuckEngine {
    fn connect(credentials: &Credentials) -> Result<Self, Diagnostic> {
        Self::open(credentials, DuckOptions::default())
    }

    fn open_cursor(&self) -> Result<CursorHandle, Diagnostic> {
        let handle = CursorHandle(self.next_handle.get() + 1);
        self.next_handle.set(handle.0);
        self.cursors
            .borrow_mut()
            .insert(handle, DuckCursor::default());
        Ok(handle)
    }

    fn parse(&self, handle: CursorHandle, sql: &str) -> Result<(), Diagnostic> {
        let sql = statement_text(sql);
        let prepared = self.conn.prepare(sql).map(drop).map_err(|e| diagnostic(&e));

        self.with_cursor(handle, |cursor| {
            *cursor = DuckCursor::default();
            prepared?;
            cursor.sql = Some(sql.to_string());
            Ok(())
        })
    }

    fn describe_column(
        &self,
        handle: CursorHandle,
        position: usize,
    ) -> Result<Option<DescribedColumn>, Diagnostic> {
        self.with_cursor(handle, |cursor| {
            if cursor.columns.is_none() {
                let sql = cursor.sql.as_deref().ok_or_else(no_statement)?;
                let (columns, results) = self.describe_statement(sql).map_err(|e| diagnostic(&e))?;
                cursor.defined = vec![None; columns.len()];
                cursor.columns = Some(columns);
                cursor.described_results = results;
            }

            let columns = cursor.columns.as_deref().unwrap_or_default();
            Ok(position
                .checked_sub(1)
                .and_then(|i| columns.get(i))
                .cloned())
        })
    }

    fn bind_column(
        &self,
        handle: CursorHandle,
        position: usize,
        capacity: usize,
    ) -> Result<(), Diagnostic> {
        self.with_cursor(handle, |cursor| {
            let slot = position
                .checked_sub(1)
                .and_then(|i| cursor.defined.get_mut(i))
                .ok_or_else(|| {
                    Diagnostic::new(
                        codes::NOT_IN_SELECT_LIST,
                        format!("column {} is not in the select list", position),
                    )
                })?;
            *slot = Some(capacity);
            Ok(())
        })
    }

    fn execute(&self, handle: CursorHandle) -> Result<(), Diagnostic> {
        self.with_cursor(handle, |cursor| {
            let sql = cursor.sql.as_deref().ok_or_else(no_statement)?;
            let results = match cursor.described_results.take() {
                Some(results) => results,
                None => self.run_statement(sql).map_err(|e| diagnostic(&e))?.1,
            };

            cursor.results = Some(results);
            Ok(())
        })
    }

    fn fetch(&self, handle: CursorHandle, bindings: &mut [Binding]) -> Result<Fetch, Diagnostic> {
        self.with_cursor(handle, |cursor| {
            let results = cursor
                .results
                .as_mut()
                .ok_or_else(|| Diagnostic::new(codes::NOT_EXECUTED, "fetch before execute"))?;

            let Some((batch, row)) = results.next_row() else {
                return Ok(Fetch::EndOfRows);
            };
            if bindings.len() != batch.num_columns() {
                return Err(Diagnostic::new(
                    codes::NOT_IN_SELECT_LIST,
                    format!(
                        "{} bindings for {} select-list items",
                        bindings.len(),
                        batch.num_columns()
                    ),
                ));
            }

            for (binding, column) in bindings.iter_mut().zip(batch.columns()) {
                if column.is_null(row) {
                    binding.set_null();
                    continue;
                }
                let text = cell_text(column.as_ref(), row).map_err(|e| conversion(&e))?;
                binding.write(text.as_bytes());
            }
            Ok(Fetch::Row)
        })
    }

    fn close_cursor(&self, handle: CursorHandle) -> Result<(), Diagnostic> {
        match self.cursors.borrow_mut().remove(&handle) {
            Some(_) => Ok(()),
            None => Err(self.record(Diagnostic::new(
                codes::INVALID_CURSOR,
                format!("invalid cursor {}", handle),
            ))),
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
