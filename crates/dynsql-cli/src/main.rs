//! dynsql - interactive dynamic SQL shell over DuckDB
//!
//! Connects once, then reads statements from stdin and prints whatever
//! select-list each one turns out to have.

use anyhow::Context;
use dynsql_core::Session;
use dynsql_duck::DuckEngine;
use std::path::Path;
use tracing::{debug, info};

#[macro_use]
mod logging;
mod config;
mod shell;

use config::Config;
use shell::Shell;

fn main() -> anyhow::Result<()> {
    // Secrets (DYNSQL_PASSWORD) come from .env
    dotenvy::dotenv().ok();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DYNSQL_CONFIG").ok())
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    config.apply_logging_env();
    logging::init();
    debug!(
        path = %config_path,
        found = Path::new(&config_path).exists(),
        "configuration loaded"
    );

    let credentials = config.credentials();
    let engine = DuckEngine::open(&credentials, config.engine.clone())
        .with_context(|| format!("Cannot connect as {}", credentials.user))?;
    info!(
        user = %credentials.user,
        database = credentials.database.as_deref().unwrap_or(":memory:"),
        "connected"
    );

    let session = Session::from_engine(engine, config.cursor.clone());
    let cursor = session.open_cursor().context("Couldn't open cursor")?;
    let mut shell = Shell::new(cursor, config.output.format, config.cursor.name_width);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    shell.run(stdin.lock(), &mut stdout, &mut stderr)?;

    shell.close().context("Failed to close cursor")?;
    session.close().context("Failed to close session")?;
    info!("disconnected");

    Ok(())
}
