//! Interactive statement loop
//!
//! Reads one statement per line, runs it through the cursor and prints the
//! select-list, the records and a summary. Engine errors are reported and the
//! loop carries on with the next statement.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use dynsql_core::{format, Cursor, CursorError, Engine, Summary};
use thiserror::Error;
use tracing::Level;

use crate::config::OutputFormat;

pub const PROMPT: &str = "\nEnter a query or \"exit\"> ";

#[derive(Debug, Error)]
pub enum StatementError {
    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

pub struct Shell<'s, E: Engine> {
    cursor: Cursor<'s, E>,
    format: OutputFormat,
    name_width: usize,
}

impl<'s, E: Engine> Shell<'s, E> {
    pub fn new(cursor: Cursor<'s, E>, format: OutputFormat, name_width: usize) -> Self {
        Self {
            cursor,
            format,
            name_width,
        }
    }

    /// Prompt for statements until `exit` or end of input
    pub fn run<R, W, X>(&mut self, input: R, out: &mut W, err: &mut X) -> io::Result<()>
    where
        R: BufRead,
        W: Write,
        X: Write,
    {
        let mut lines = input.lines();

        loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            let Some(line) = lines.next() else {
                writeln!(out)?;
                break;
            };
            let line = line?;
            let sql = line.trim();

            if sql.is_empty() {
                continue;
            }
            if is_exit(sql) {
                break;
            }

            self.execute(sql, out, err)?;
        }

        Ok(())
    }

    /// Run one statement, reporting engine errors on `err`.
    ///
    /// Returns the summary of a statement that ran to completion. Only
    /// failures to write output are propagated.
    pub fn execute<W: Write, X: Write>(
        &mut self,
        sql: &str,
        out: &mut W,
        err: &mut X,
    ) -> io::Result<Option<Summary>> {
        match self.run_statement(sql, out) {
            Ok(summary) => Ok(Some(summary)),
            Err(StatementError::Cursor(e)) => {
                writeln!(err, "\nEngine ERROR\n{}", e)?;
                Ok(None)
            }
            Err(StatementError::Io(e)) => Err(e),
        }
    }

    fn run_statement<W: Write>(&mut self, sql: &str, out: &mut W) -> Result<Summary, StatementError> {
        let started = Instant::now();
        let result = self.write_rows(sql, out);

        let statement = self
            .cursor
            .statement_id()
            .map(|id| id.to_string())
            .unwrap_or_default();
        let elapsed_ms = started.elapsed().as_millis();

        match &result {
            Ok(summary) => {
                log_event!(
                    level: Level::INFO,
                    event: "statement_completed",
                    statement: statement,
                    rows: summary.rows,
                    columns: summary.columns,
                    truncated_values: summary.truncated_values,
                    elapsed_ms: elapsed_ms
                );
            }
            Err(e) => {
                log_event!(
                    level: Level::WARN,
                    event: "statement_failed",
                    statement: statement,
                    error: e.to_string(),
                    elapsed_ms: elapsed_ms
                );
            }
        }

        result
    }

    fn write_rows<W: Write>(&mut self, sql: &str, out: &mut W) -> Result<Summary, StatementError> {
        let format = self.format;
        let name_width = self.name_width;
        let mut rows = self.cursor.run_query(sql)?;

        if format == OutputFormat::Records {
            write!(out, "\n{}", format::describe_table(rows.columns(), name_width))?;
        }

        let mut number = 0;
        while let Some(row) = rows.next()? {
            number += 1;
            match format {
                OutputFormat::Records => {
                    write!(out, "\n{}", format::record(number, &row, name_width))?
                }
                OutputFormat::Json => writeln!(out, "{}", row.to_json())?,
            }
        }

        let summary = rows.summary().unwrap_or_default();
        match format {
            OutputFormat::Records => writeln!(out, "\n{}", format::summary(summary.rows))?,
            OutputFormat::Json => writeln!(out, "{}", serde_json::json!({ "summary": summary }))?,
        }

        Ok(summary)
    }

    pub fn close(self) -> Result<(), CursorError> {
        self.cursor.close()
    }
}

fn is_exit(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .map(|word| word.trim_end_matches(';'))
        .is_some_and(|word| word.eq_ignore_ascii_case("exit"))
}
