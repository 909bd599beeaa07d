//! Capability contract of the database engine behind a session
//!
//! The core never talks to a database directly. Everything it needs from
//! one (connect, cursor management, parse, describe, define, execute,
//! fetch, diagnostics) goes through [`Engine`], so the describe/bind/fetch
//! pipeline can run against DuckDB or a scripted in-memory engine alike.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::binding::Binding;
use crate::error::Diagnostic;

/// Engine-side identifier of an open cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorHandle(pub u32);

impl fmt::Display for CursorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Logon credentials, parsed from a `user/password@database` connect string
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl Credentials {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Parse `user[/password][@database]`.
    ///
    /// The database part is split at the last `@`, so a connect string that
    /// names only a database must still start with `@`.
    pub fn parse(connect: &str) -> Self {
        let connect = connect.trim();
        let (auth, database) = match connect.rsplit_once('@') {
            Some((auth, db)) => (auth, Some(db.to_string()).filter(|d| !d.is_empty())),
            None => (connect, None),
        };
        let (user, password) = match auth.split_once('/') {
            Some((user, password)) => (user, Some(password.to_string())),
            None => (auth, None),
        };

        Self {
            user: user.to_string(),
            password,
            database,
        }
    }
}

impl FromStr for Credentials {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}

/// Shape of one select-list item as the engine reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedColumn {
    /// Column name, possibly longer than the caller's display width
    pub name: String,
    /// Engine-specific datatype code
    pub type_code: u16,
    pub type_name: String,
    /// Maximum length in bytes of a value rendered as text
    pub max_length: usize,
    pub display_length: usize,
    pub precision: u8,
    pub scale: i8,
    pub nullable: bool,
}

impl DescribedColumn {
    /// A nullable text column of the given maximum length
    pub fn text(name: impl Into<String>, max_length: usize) -> Self {
        Self {
            name: name.into(),
            type_code: 0,
            type_name: "VARCHAR".to_string(),
            max_length,
            display_length: max_length,
            precision: 0,
            scale: 0,
            nullable: true,
        }
    }
}

/// Outcome of a successful fetch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// The next row was written into the bindings
    Row,
    /// No more rows; the bindings were left untouched
    EndOfRows,
}

/// Operations a database engine must provide for dynamic SQL.
///
/// All calls are blocking. Implementations keep per-cursor state behind
/// interior mutability so several cursors can share one session; none of
/// them need to be thread-safe.
pub trait Engine {
    /// Open an authenticated session
    fn connect(credentials: &Credentials) -> Result<Self, Diagnostic>
    where
        Self: Sized;

    fn open_cursor(&self) -> Result<CursorHandle, Diagnostic>;

    /// Parse `sql` into the cursor, discarding any previous statement and
    /// its column definitions
    fn parse(&self, cursor: CursorHandle, sql: &str) -> Result<(), Diagnostic>;

    /// Describe select-list item `position` (1-based).
    ///
    /// Returns `Ok(None)` once `position` is past the last column.
    fn describe_column(
        &self,
        cursor: CursorHandle,
        position: usize,
    ) -> Result<Option<DescribedColumn>, Diagnostic>;

    /// Register a host buffer of `capacity` bytes for item `position`
    fn bind_column(
        &self,
        cursor: CursorHandle,
        position: usize,
        capacity: usize,
    ) -> Result<(), Diagnostic>;

    fn execute(&self, cursor: CursorHandle) -> Result<(), Diagnostic>;

    /// Write the next row into `bindings`, ordered by position
    fn fetch(&self, cursor: CursorHandle, bindings: &mut [Binding]) -> Result<Fetch, Diagnostic>;

    fn close_cursor(&self, cursor: CursorHandle) -> Result<(), Diagnostic>;

    fn close_session(&self) -> Result<(), Diagnostic>;

    /// Most recent failure recorded by this session, or the success status.
    ///
    /// Must not change any state: two calls in a row return the same value.
    fn last_error(&self) -> Diagnostic;
}
