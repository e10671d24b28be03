//! Row sources the location cache is loaded from.
//!
//! A [`LocationSource`] hands out the raw rows of one focus-area table at a
//! time. The store behind it is assumed single-reader while the cache is
//! being built, hence `&mut self`.

use std::collections::BTreeMap;

use geoparse_database::{Connection, DbError, gazetteer_db};
use geoparse_gazetteer_models::{FocusArea, LocationRow, SourceTable};

/// Errors raised while reading raw rows.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The backing database failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// The requested table is not present in the source.
    #[error("Table not available: {0}")]
    MissingTable(String),

    /// A row could not be converted into a location record.
    #[error("Malformed row {loc_id}: {message}")]
    MalformedRow {
        /// Row id within its table.
        loc_id: i64,
        /// What was wrong with it.
        message: String,
    },
}

/// Supplies raw location rows per focus-area table.
pub trait LocationSource {
    /// Reads every row of `focus_area`'s `table`, honoring its `loc_id`
    /// range.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the table cannot be read.
    fn fetch(
        &mut self,
        focus_area: &FocusArea,
        table: SourceTable,
    ) -> Result<Vec<LocationRow>, SourceError>;
}

/// Rows held in memory, keyed by store table name (`uk_places_point`).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: BTreeMap<String, Vec<LocationRow>>,
}

impl MemorySource {
    /// Creates an empty source.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }

    /// Adds rows to a table, creating it if needed.
    pub fn insert(&mut self, table_name: impl Into<String>, rows: Vec<LocationRow>) {
        self.tables.entry(table_name.into()).or_default().extend(rows);
    }

    /// Builder-style [`Self::insert`].
    #[must_use]
    pub fn with_table(mut self, table_name: impl Into<String>, rows: Vec<LocationRow>) -> Self {
        self.insert(table_name, rows);
        self
    }
}

impl LocationSource for MemorySource {
    fn fetch(
        &mut self,
        focus_area: &FocusArea,
        table: SourceTable,
    ) -> Result<Vec<LocationRow>, SourceError> {
        let name = focus_area.table_name(table);
        let rows = self
            .tables
            .get(&name)
            .ok_or(SourceError::MissingTable(name))?;

        Ok(rows
            .iter()
            .filter(|row| {
                focus_area
                    .loc_id_range
                    .is_none_or(|(min, max)| (min..=max).contains(&row.loc_id))
            })
            .cloned()
            .collect())
    }
}

/// Reads focus-area tables from a gazetteer `DuckDB` connection.
pub struct DuckDbSource<'a> {
    conn: &'a Connection,
}

impl<'a> DuckDbSource<'a> {
    /// Wraps an open connection.
    #[must_use]
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl LocationSource for DuckDbSource<'_> {
    fn fetch(
        &mut self,
        focus_area: &FocusArea,
        table: SourceTable,
    ) -> Result<Vec<LocationRow>, SourceError> {
        let name = focus_area.table_name(table);
        match gazetteer_db::fetch_rows(self.conn, &name, focus_area.loc_id_range) {
            Ok(rows) => Ok(rows),
            Err(DbError::TableNotFound(name)) => Err(SourceError::MissingTable(name)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(loc_id: i64) -> LocationRow {
        LocationRow {
            loc_id,
            name: format!("place{loc_id}"),
            osm_id: loc_id.to_string(),
            admin_parents: String::new(),
            geom_wkt: "POINT(0 0)".to_string(),
            tags_json: "{}".to_string(),
        }
    }

    #[test]
    fn memory_source_applies_id_range() {
        let mut source = MemorySource::new().with_table("uk_point", (1..=4).map(row).collect());
        let mut area = FocusArea::new("uk");
        area.loc_id_range = Some((2, 3));

        let rows = source.fetch(&area, SourceTable::Point).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.loc_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn memory_source_reports_missing_tables() {
        let mut source = MemorySource::new();
        assert!(matches!(
            source.fetch(&FocusArea::new("uk"), SourceTable::Admin),
            Err(SourceError::MissingTable(name)) if name == "uk_admin"
        ));
    }

    #[test]
    fn duckdb_source_reads_focus_tables() {
        let conn = gazetteer_db::open_in_memory().unwrap();
        gazetteer_db::insert_rows(&conn, "uk_line", &[row(5), row(6)]).unwrap();

        let mut source = DuckDbSource::new(&conn);
        let rows = source.fetch(&FocusArea::new("uk"), SourceTable::Line).unwrap();
        assert_eq!(rows.len(), 2);

        assert!(matches!(
            source.fetch(&FocusArea::new("uk"), SourceTable::Poly),
            Err(SourceError::MissingTable(_))
        ));
    }
}
