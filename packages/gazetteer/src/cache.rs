//! The location cache: the working set of gazetteer rows.
//!
//! Rows are validated into [`LocationRecord`]s and stored in load order.
//! A record's position in the cache is its internal key for every derived
//! index, so the cache is append-only while building and read-only once
//! finished.

use geoparse_gazetteer_models::{
    FocusArea, LocationRecord, LocationRow, OsmId, OsmTags, SourceTable,
};

use crate::source::{LocationSource, SourceError};

/// Errors from building the location cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A focus-area table could not be read or contained malformed rows.
    /// Nothing from that focus area is kept.
    #[error("Source unavailable for focus area '{focus_area}' table '{table}': {source}")]
    SourceUnavailable {
        /// Focus area being loaded.
        focus_area: String,
        /// Table that failed.
        table: SourceTable,
        /// Underlying failure.
        #[source]
        source: SourceError,
    },
}

/// Immutable, position-indexed gazetteer rows.
#[derive(Debug, Clone, Default)]
pub struct LocationCache {
    records: Vec<LocationRecord>,
}

impl LocationCache {
    /// Loads every focus area, failing on the first one that cannot be
    /// loaded completely.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::SourceUnavailable`] for the first failing
    /// focus-area table.
    pub fn build<S: LocationSource + ?Sized>(
        source: &mut S,
        focus_areas: &[FocusArea],
    ) -> Result<Self, CacheError> {
        let mut builder = CacheBuilder::new();
        for area in focus_areas {
            builder.add_focus_area(source, area)?;
        }
        Ok(builder.finish())
    }

    /// Loads every focus area that can be loaded completely and reports
    /// the ones that could not.
    pub fn build_partial<S: LocationSource + ?Sized>(
        source: &mut S,
        focus_areas: &[FocusArea],
    ) -> (Self, Vec<CacheError>) {
        let mut builder = CacheBuilder::new();
        let mut failures = Vec::new();

        for area in focus_areas {
            if let Err(e) = builder.add_focus_area(source, area) {
                log::warn!("Skipping focus area '{}': {e}", area.name);
                failures.push(e);
            }
        }

        (builder.finish(), failures)
    }

    /// Wraps already validated records, keeping their order.
    #[must_use]
    pub const fn from_records(records: Vec<LocationRecord>) -> Self {
        Self { records }
    }

    /// Record at a cache position.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&LocationRecord> {
        self.records.get(position)
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(position, record)` pairs in cache order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &LocationRecord)> {
        self.records.iter().enumerate()
    }

    /// All records in cache order.
    #[must_use]
    pub fn records(&self) -> &[LocationRecord] {
        &self.records
    }
}

/// Incrementally loads focus areas, all-or-nothing per focus area.
#[derive(Debug, Default)]
pub struct CacheBuilder {
    records: Vec<LocationRecord>,
}

impl CacheBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Loads every table of a focus area.
    ///
    /// Rows are staged until all tables have been read and validated; on
    /// failure the staged rows are discarded and the cache is unchanged.
    /// Returns the number of records added.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::SourceUnavailable`] if a table cannot be read
    /// or contains a malformed row.
    pub fn add_focus_area<S: LocationSource + ?Sized>(
        &mut self,
        source: &mut S,
        focus_area: &FocusArea,
    ) -> Result<usize, CacheError> {
        let mut staged = Vec::new();

        for &table in &focus_area.tables {
            let unavailable = |source| CacheError::SourceUnavailable {
                focus_area: focus_area.name.clone(),
                table,
                source,
            };

            let rows = source.fetch(focus_area, table).map_err(unavailable)?;
            let count = rows.len();

            for row in rows {
                staged.push(to_record(row, table, &focus_area.name).map_err(unavailable)?);
            }

            log::debug!(
                "Loaded {count} rows from {}",
                focus_area.table_name(table)
            );
        }

        let added = staged.len();
        self.records.append(&mut staged);

        log::info!(
            "Cached {added} locations for focus area '{}'",
            focus_area.name
        );

        Ok(added)
    }

    /// Number of records loaded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been loaded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freezes the loaded records into a cache.
    #[must_use]
    pub fn finish(self) -> LocationCache {
        LocationCache::from_records(self.records)
    }
}

/// Validates a raw row.
fn to_record(
    row: LocationRow,
    table: SourceTable,
    focus_area: &str,
) -> Result<LocationRecord, SourceError> {
    let malformed = |message: String| SourceError::MalformedRow {
        loc_id: row.loc_id,
        message,
    };

    let name = row.name.trim();
    if name.is_empty() {
        return Err(malformed("empty name".to_string()));
    }

    let osm_id: OsmId = row.osm_id.parse().map_err(|e| malformed(format!("{e}")))?;

    let admin_parents = row
        .admin_parents
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<OsmId>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| malformed(format!("admin parents: {e}")))?;

    let tags: OsmTags = if row.tags_json.trim().is_empty() {
        OsmTags::new()
    } else {
        serde_json::from_str(&row.tags_json).map_err(|e| malformed(format!("tags: {e}")))?
    };

    Ok(LocationRecord {
        loc_id: row.loc_id,
        name: name.to_string(),
        osm_id,
        admin_parents,
        geometry_wkt: row.geom_wkt,
        tags,
        table,
        focus_area: focus_area.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn row(loc_id: i64, name: &str, osm_id: &str) -> LocationRow {
        LocationRow {
            loc_id,
            name: name.to_string(),
            osm_id: osm_id.to_string(),
            admin_parents: "(-62149);(-58447)".to_string(),
            geom_wkt: "POINT(-1.4 50.9)".to_string(),
            tags_json: format!(r#"{{"name":"{name}","place":"city"}}"#),
        }
    }

    fn area(name: &str, tables: &[SourceTable]) -> FocusArea {
        FocusArea {
            name: name.to_string(),
            tables: tables.to_vec(),
            loc_id_range: None,
        }
    }

    #[test]
    fn builds_records_in_load_order() {
        let mut source = MemorySource::new()
            .with_table("uk_admin", vec![row(1, "England", "(-58447)")])
            .with_table("uk_point", vec![row(7, "Southampton", "(26847709)")]);

        let cache = LocationCache::build(
            &mut source,
            &[area("uk", &[SourceTable::Admin, SourceTable::Point])],
        )
        .unwrap();

        assert_eq!(cache.len(), 2);
        let first = cache.get(0).unwrap();
        assert_eq!(first.name, "England");
        assert_eq!(first.table, SourceTable::Admin);
        assert_eq!(first.admin_parents.len(), 2);
        assert_eq!(first.tags.get("place"), Some("city"));

        let second = cache.get(1).unwrap();
        assert_eq!(second.osm_id, OsmId::single(26_847_709));
        assert_eq!(second.focus_area, "uk");
    }

    #[test]
    fn failing_focus_area_is_discarded_whole() {
        let mut bad = row(3, "Broken", "(oops)");
        bad.tags_json = "{}".to_string();
        let mut source = MemorySource::new()
            .with_table("good_admin", vec![row(1, "England", "(-58447)")])
            .with_table("bad_admin", vec![row(2, "Fine", "(5)")])
            .with_table("bad_point", vec![bad]);

        let areas = [
            area("good", &[SourceTable::Admin]),
            area("bad", &[SourceTable::Admin, SourceTable::Point]),
        ];

        let strict = LocationCache::build(&mut source, &areas);
        assert!(matches!(
            strict,
            Err(CacheError::SourceUnavailable { ref focus_area, table: SourceTable::Point, .. })
                if focus_area == "bad"
        ));

        let (cache, failures) = LocationCache::build_partial(&mut source, &areas);
        assert_eq!(failures.len(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(0).unwrap().name, "England");
    }

    #[test]
    fn missing_table_fails_its_focus_area() {
        let mut source = MemorySource::new();
        let (cache, failures) =
            LocationCache::build_partial(&mut source, &[area("nowhere", &[SourceTable::Line])]);
        assert!(cache.is_empty());
        assert!(matches!(
            failures[0],
            CacheError::SourceUnavailable {
                source: SourceError::MissingTable(_),
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_rows() {
        let mut empty_name = row(1, "x", "(1)");
        empty_name.name = "   ".to_string();
        assert!(to_record(empty_name, SourceTable::Point, "uk").is_err());

        let mut bad_tags = row(2, "x", "(1)");
        bad_tags.tags_json = r#"{"population": 5}"#.to_string();
        assert!(to_record(bad_tags, SourceTable::Point, "uk").is_err());

        let mut bad_parent = row(3, "x", "(1)");
        bad_parent.admin_parents = "(1);(x)".to_string();
        assert!(to_record(bad_parent, SourceTable::Point, "uk").is_err());
    }

    #[test]
    fn blank_tags_are_empty() {
        let mut blank = row(1, " Bassett ", "(1)");
        blank.tags_json = String::new();
        let record = to_record(blank, SourceTable::Point, "uk").unwrap();
        assert!(record.tags.is_empty());
        assert_eq!(record.name, "Bassett");
    }
}
