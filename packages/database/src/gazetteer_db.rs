//! Gazetteer location tables in `DuckDB`.
//!
//! Stores one preprocessed location per row with its geometry as plain
//! WKT text (no spatial extension) and its OSM tags as a JSON object.
//! The default database lives at `data/gazetteer.duckdb`.

use std::path::Path;

use duckdb::Connection;
use geoparse_gazetteer_models::LocationRow;

use crate::DbError;

/// Opens (or creates) a gazetteer `DuckDB` file.
///
/// # Errors
///
/// Returns [`DbError`] if the parent directory or connection cannot be
/// created.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch("SET threads = 4; SET memory_limit = '512MB';")?;

    Ok(conn)
}

/// Opens the gazetteer DB at the default path.
///
/// # Errors
///
/// Returns [`DbError`] if the connection fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&crate::paths::gazetteer_db_path())
}

/// Opens a throwaway in-memory gazetteer DB.
///
/// # Errors
///
/// Returns [`DbError`] if `DuckDB` cannot allocate the database.
pub fn open_in_memory() -> Result<Connection, DbError> {
    Ok(Connection::open_in_memory()?)
}

/// Creates a location table if it does not exist yet.
///
/// # Errors
///
/// Returns [`DbError`] if the name is not a plain identifier or the DDL
/// fails.
pub fn create_table(conn: &Connection, table: &str) -> Result<(), DbError> {
    validate_table_name(table)?;

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            loc_id BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            osm_id TEXT NOT NULL,
            admin_parents TEXT,
            geom_wkt TEXT NOT NULL,
            tags_json TEXT
        );"
    ))?;

    Ok(())
}

/// Returns whether a table exists in the main schema.
///
/// # Errors
///
/// Returns [`DbError`] if the catalog query fails.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, DbError> {
    validate_table_name(table)?;

    let count: i64 = conn
        .prepare(
            "SELECT COUNT(*) FROM information_schema.tables
             WHERE table_schema = 'main' AND table_name = ?",
        )?
        .query_row(duckdb::params![table], |row| row.get(0))?;

    Ok(count > 0)
}

/// Upserts location rows into a table, creating it if needed.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if the table cannot be created or an insert fails.
pub fn insert_rows(conn: &Connection, table: &str, rows: &[LocationRow]) -> Result<u64, DbError> {
    create_table(conn, table)?;

    if rows.is_empty() {
        return Ok(0);
    }

    let mut stmt = conn.prepare(&format!(
        "INSERT OR REPLACE INTO {table} (loc_id, name, osm_id, admin_parents, geom_wkt, tags_json)
         VALUES (?, ?, ?, ?, ?, ?)"
    ))?;

    let mut written = 0u64;
    for row in rows {
        written += stmt.execute(duckdb::params![
            row.loc_id,
            row.name,
            row.osm_id,
            row.admin_parents,
            row.geom_wkt,
            row.tags_json,
        ])? as u64;
    }

    log::debug!("Wrote {written} rows to {table}");

    Ok(written)
}

/// Reads the rows of one location table, ordered by `loc_id`.
///
/// When `loc_id_range` is given only rows with `min <= loc_id <= max` are
/// returned.
///
/// # Errors
///
/// Returns [`DbError::TableNotFound`] if the table does not exist, or
/// [`DbError`] if the query fails.
pub fn fetch_rows(
    conn: &Connection,
    table: &str,
    loc_id_range: Option<(i64, i64)>,
) -> Result<Vec<LocationRow>, DbError> {
    if !table_exists(conn, table)? {
        return Err(DbError::TableNotFound(table.to_string()));
    }

    let select = format!(
        "SELECT loc_id, name, osm_id, admin_parents, geom_wkt, tags_json FROM {table}"
    );

    let rows = if let Some((min, max)) = loc_id_range {
        let mut stmt =
            conn.prepare(&format!("{select} WHERE loc_id BETWEEN ? AND ? ORDER BY loc_id"))?;
        let rows = stmt
            .query_map(duckdb::params![min, max], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    } else {
        let mut stmt = conn.prepare(&format!("{select} ORDER BY loc_id"))?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    log::debug!("Fetched {} rows from {table}", rows.len());

    Ok(rows)
}

fn map_row(row: &duckdb::Row<'_>) -> duckdb::Result<LocationRow> {
    Ok(LocationRow {
        loc_id: row.get(0)?,
        name: row.get(1)?,
        osm_id: row.get(2)?,
        admin_parents: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        geom_wkt: row.get(4)?,
        tags_json: row
            .get::<_, Option<String>>(5)?
            .unwrap_or_else(|| "{}".to_string()),
    })
}

/// Table names are interpolated into SQL, so only `[a-z0-9_]` is allowed.
fn validate_table_name(table: &str) -> Result<(), DbError> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidTableName(table.to_string()))
    }
}
