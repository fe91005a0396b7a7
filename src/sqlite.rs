use crate::collector::JsonLocationsCollector;
use rusqlite::{params, Connection, Result};
use std::fs;
use std::path::Path;
use tracing::info;

const EXPECTED_TABLES: [(&str, &[&str]); 2] = [
    ("runs", &["id", "created_at", "tool_version", "selection_mode"]),
    (
        "locations",
        &[
            "id", "run_id", "file_path", "class_name", "method_signature", "method_start_line",
            "method_end_line", "line", "mutant_id", "node_type", "masked_code", "fingerprint",
        ],
    ),
];

fn create_schema(connection: &Connection) -> Result<()> {
    info!("SQLite option: new db detected, creating schema");

    connection.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS runs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            tool_version    TEXT,
            selection_mode  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS locations (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id              INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            file_path           TEXT NOT NULL,
            class_name          TEXT NOT NULL,
            method_signature    TEXT NOT NULL,
            method_start_line   INTEGER NOT NULL,
            method_end_line     INTEGER NOT NULL,
            line                INTEGER NOT NULL,
            mutant_id           INTEGER NOT NULL,
            node_type           TEXT NOT NULL,
            masked_code         TEXT NOT NULL,
            fingerprint         TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_locations_run ON locations(run_id);
        CREATE INDEX IF NOT EXISTS idx_locations_file ON locations(file_path);
        CREATE INDEX IF NOT EXISTS idx_locations_fingerprint ON locations(fingerprint);
        ",
    )
}

fn check_schema(connection: &Connection) -> Result<()> {
    info!("SQLite option: checking schema integrity");

    for (table, columns) in EXPECTED_TABLES {
        let mut stmt = connection.prepare(&format!("PRAGMA table_xinfo({});", table))?;
        let column_names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(Result::ok)
            .collect();

        if column_names.is_empty() {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(format!("Missing table: {}", table)),
            ));
        }

        for col in columns {
            if !column_names.iter().any(|name| name.as_str() == *col) {
                return Err(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(1),
                    Some(format!("Missing column '{}' in table '{}'", col, table)),
                ));
            }
        }
    }

    Ok(())
}

/// Creates the database (and its parent folder) on first use, otherwise
/// verifies its schema.
pub fn check_db(db_path: &Path) -> crate::error::Result<()> {
    let is_new_db = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let connection = Connection::open(db_path)?;
    if is_new_db {
        create_schema(&connection)?;
    } else {
        check_schema(&connection)?;
    }
    Ok(())
}

pub fn store_run(db_path: &Path, selection_mode: &str) -> Result<i64> {
    let connection = Connection::open(db_path)?;
    let tool_version = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    connection.execute(
        "INSERT INTO runs (tool_version, selection_mode) VALUES (?1, ?2);",
        params![tool_version, selection_mode],
    )?;

    Ok(connection.last_insert_rowid())
}

/// Inserts every collected location under `run_id`; returns the number stored.
pub fn store_locations(db_path: &Path, run_id: i64, collector: &JsonLocationsCollector) -> Result<usize> {
    info!("SQLite option: storing locations on {}", db_path.display());
    let mut connection = Connection::open(db_path)?;
    let transaction = connection.transaction()?;
    let mut stored = 0;

    {
        let mut insert = transaction.prepare(
            "INSERT INTO locations (run_id, file_path, class_name, method_signature, method_start_line,
                method_end_line, line, mutant_id, node_type, masked_code, fingerprint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
        )?;

        for file in &collector.files {
            for class in &file.classes {
                for method in &class.methods {
                    for entry in &method.locations {
                        insert.execute(params![
                            run_id,
                            file.file_path,
                            class.qualified_name,
                            method.signature,
                            method.start_line as i64,
                            method.end_line as i64,
                            entry.line as i64,
                            entry.location.mutant_id as i64,
                            entry.location.node_type.to_string(),
                            entry.location.masked_code,
                            entry.location.fingerprint,
                        ])?;
                        stored += 1;
                    }
                }
            }
        }
    }

    transaction.commit()?;
    Ok(stored)
}
