//! dynsql core - dynamic SQL execution against a runtime-described result set
//!
//! The shape of a statement's select-list is only known once it has been
//! parsed. A [`Cursor`] discovers it column by column, allocates a correctly
//! sized [`Binding`] for each, executes, and streams rows back through the
//! bindings as borrowed [`Row`] views.
//!
//! ```ignore
//! let session = Session::<DuckEngine>::open(&Credentials::parse("scott/tiger@:memory:"))?;
//! let mut cursor = session.open_cursor()?;
//! let mut rows = cursor.run_query("SELECT 42 AS answer")?;
//! while let Some(row) = rows.next()? {
//!     println!("{:?}", row.to_values());
//! }
//! println!("{:?}", rows.summary());
//! ```

pub mod binding;
pub mod cursor;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod format;
pub mod mock;
pub mod row;

pub use binding::{Binding, Indicator, Truncation};
pub use cursor::{Cursor, CursorOptions, CursorState, RowStream, Session, Summary};
pub use descriptor::{describe_column, ColumnDescriptor};
pub use engine::{Credentials, CursorHandle, DescribedColumn, Engine, Fetch};
pub use error::{CursorError, Diagnostic, Stage};
pub use row::{project, Cell, Row};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cursor::{Cursor, CursorOptions, RowStream, Session, Summary};
    pub use crate::engine::{Credentials, Engine};
    pub use crate::error::{CursorError, Diagnostic};
    pub use crate::row::{Cell, Row};
}
