#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Gazetteer loading and lookup structures.
//!
//! Loads focus-area tables into a [`LocationCache`], then derives the
//! three read-only indexes the matcher works against:
//!
//! - [`OsmidLookup`]: identifier → cache positions
//! - [`InvertedIndex`]: normalized name phrase → identifiers
//! - [`GeometryIndex`]: identifier → parsed geometry, R-tree backed
//!
//! [`Gazetteer`] bundles the cache, the indexes, and the tokenizer used to
//! build them into one immutable snapshot that matching workers share.

pub mod cache;
pub mod config;
pub mod inverted_index;
pub mod lookup;
pub mod names;
pub mod source;
pub mod tokenize;

use std::fmt;

use geoparse_gazetteer_models::config::{GeoparseConfig, NameConfig};
use serde::Serialize;

pub use cache::{CacheBuilder, CacheError, LocationCache};
pub use geoparse_spatial::GeometryIndex;
pub use inverted_index::InvertedIndex;
pub use lookup::OsmidLookup;
pub use source::{DuckDbSource, LocationSource, MemorySource, SourceError};
pub use tokenize::{Tokenizer, UnigramTokenizer, normalize_phrase};

/// Errors from assembling a gazetteer snapshot.
#[derive(Debug, thiserror::Error)]
pub enum GazetteerError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The tokenizer pattern could not be compiled from the configuration.
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] regex::Error),
}

/// Immutable gazetteer snapshot: the cache plus every derived index.
///
/// Indexes are built together and never mutated afterwards, so a
/// snapshot can be shared across threads behind an `Arc`.
pub struct Gazetteer {
    cache: LocationCache,
    lookup: OsmidLookup,
    phrases: InvertedIndex,
    geometries: GeometryIndex,
    tokenizer: Box<dyn Tokenizer>,
}

impl fmt::Debug for Gazetteer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gazetteer")
            .field("records", &self.cache.len())
            .field("ids", &self.lookup.len())
            .field("phrases", &self.phrases.len())
            .field("geometries", &self.geometries.len())
            .finish_non_exhaustive()
    }
}

impl Gazetteer {
    /// Builds the indexes over a loaded cache using the configured
    /// [`UnigramTokenizer`].
    ///
    /// # Errors
    ///
    /// Returns [`GazetteerError::Tokenizer`] if the tokenizer configuration
    /// does not compile.
    pub fn build(cache: LocationCache, config: &GeoparseConfig) -> Result<Self, GazetteerError> {
        let tokenizer = UnigramTokenizer::new(&config.tokenizer)?;
        Ok(Self::with_tokenizer(cache, Box::new(tokenizer), &config.names))
    }

    /// Builds the indexes with a caller-supplied tokenizer.
    ///
    /// The three indexes are independent, so each is built on its own
    /// scoped thread and published together.
    #[must_use]
    pub fn with_tokenizer(
        cache: LocationCache,
        tokenizer: Box<dyn Tokenizer>,
        names: &NameConfig,
    ) -> Self {
        let start = std::time::Instant::now();

        let (lookup, phrases, geometries) = std::thread::scope(|s| {
            let cache = &cache;
            let tokenizer = tokenizer.as_ref();

            let lookup = s.spawn(move || OsmidLookup::build(cache));
            let phrases = s.spawn(move || InvertedIndex::build(cache, tokenizer, names));
            let geometries = s.spawn(move || {
                GeometryIndex::build(
                    cache
                        .iter()
                        .map(|(_, record)| (record.osm_id.clone(), record.geometry_wkt.as_str())),
                )
            });

            (join(lookup), join(phrases), join(geometries))
        });

        log::info!(
            "Built gazetteer over {} records in {:.1}s ({} ids, {} phrases, {} geometries)",
            cache.len(),
            start.elapsed().as_secs_f64(),
            lookup.len(),
            phrases.len(),
            geometries.len(),
        );

        Self {
            cache,
            lookup,
            phrases,
            geometries,
            tokenizer,
        }
    }

    /// Assembles a snapshot from indexes built elsewhere.
    ///
    /// Nothing checks that the parts agree; a lookup pointing outside the
    /// cache surfaces as an index corruption error during matching.
    #[must_use]
    pub fn from_parts(
        cache: LocationCache,
        lookup: OsmidLookup,
        phrases: InvertedIndex,
        geometries: GeometryIndex,
        tokenizer: Box<dyn Tokenizer>,
    ) -> Self {
        Self {
            cache,
            lookup,
            phrases,
            geometries,
            tokenizer,
        }
    }

    /// Loads every configured focus area from `source` and builds the
    /// snapshot. Focus areas that fail to load are skipped and returned
    /// alongside the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`GazetteerError::Tokenizer`] if the tokenizer configuration
    /// does not compile.
    pub fn load<S: LocationSource + ?Sized>(
        source: &mut S,
        config: &GeoparseConfig,
    ) -> Result<(Self, Vec<CacheError>), GazetteerError> {
        let (cache, failures) = LocationCache::build_partial(source, &config.focus_areas);
        Ok((Self::build(cache, config)?, failures))
    }

    /// Like [`Self::load`], but any focus-area failure aborts.
    ///
    /// # Errors
    ///
    /// Returns [`GazetteerError`] if a focus area fails to load or the
    /// tokenizer configuration does not compile.
    pub fn load_strict<S: LocationSource + ?Sized>(
        source: &mut S,
        config: &GeoparseConfig,
    ) -> Result<Self, GazetteerError> {
        let cache = LocationCache::build(source, &config.focus_areas)?;
        Self::build(cache, config)
    }

    #[must_use]
    pub const fn cache(&self) -> &LocationCache {
        &self.cache
    }

    #[must_use]
    pub const fn lookup(&self) -> &OsmidLookup {
        &self.lookup
    }

    #[must_use]
    pub const fn phrases(&self) -> &InvertedIndex {
        &self.phrases
    }

    #[must_use]
    pub const fn geometries(&self) -> &GeometryIndex {
        &self.geometries
    }

    /// The tokenizer the phrase index was built with; documents must be
    /// tokenized with it too.
    #[must_use]
    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// Summary counts and index fingerprints.
    #[must_use]
    pub fn stats(&self) -> GazetteerStats {
        GazetteerStats {
            records: self.cache.len(),
            ids: self.lookup.len(),
            phrases: self.phrases.len(),
            max_phrase_len: self.phrases.max_phrase_len(),
            geometries: self.geometries.len(),
            skipped_geometries: self.geometries.skipped().len(),
            lookup_fingerprint: self.lookup.fingerprint(),
            phrase_fingerprint: self.phrases.fingerprint(),
        }
    }
}

fn join<T>(handle: std::thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

/// Snapshot summary, printed by the `stats` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GazetteerStats {
    pub records: usize,
    pub ids: usize,
    pub phrases: usize,
    pub max_phrase_len: usize,
    pub geometries: usize,
    pub skipped_geometries: usize,
    pub lookup_fingerprint: String,
    pub phrase_fingerprint: String,
}

#[cfg(test)]
mod tests {
    use geoparse_gazetteer_models::{FocusArea, LocationRow, SourceTable};

    use super::*;

    fn row(loc_id: i64, name: &str, osm_id: &str, wkt: &str, tags: &str) -> LocationRow {
        LocationRow {
            loc_id,
            name: name.to_string(),
            osm_id: osm_id.to_string(),
            admin_parents: String::new(),
            geom_wkt: wkt.to_string(),
            tags_json: tags.to_string(),
        }
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_table(
                "uk_admin",
                vec![
                    row(
                        1,
                        "England",
                        "(-58447)",
                        "POLYGON((-6 49,2 49,2 56,-6 56,-6 49))",
                        "{}",
                    ),
                    row(
                        2,
                        "London",
                        "(-65606)",
                        "POLYGON((-0.5 51.3,0.3 51.3,0.3 51.7,-0.5 51.7,-0.5 51.3))",
                        r#"{"name:fr":"Londres"}"#,
                    ),
                ],
            )
            .with_table(
                "uk_point",
                vec![
                    row(3, "Southampton", "(26847709)", "POINT(-1.40 50.90)", "{}"),
                    row(4, "Broken", "(99)", "POINT(oops)", "{}"),
                ],
            )
    }

    fn config() -> GeoparseConfig {
        GeoparseConfig {
            focus_areas: vec![FocusArea {
                name: "uk".to_string(),
                tables: vec![SourceTable::Admin, SourceTable::Point],
                loc_id_range: None,
            }],
            ..GeoparseConfig::default()
        }
    }

    #[test]
    fn every_indexed_phrase_resolves_to_cached_records() {
        let gazetteer = Gazetteer::load_strict(&mut source(), &config()).unwrap();

        for (phrase, ids) in gazetteer.phrases().iter() {
            for id in ids {
                let positions = gazetteer.lookup().get(id).unwrap();
                assert!(!positions.is_empty(), "{phrase} -> {id} has no rows");
                for &position in positions {
                    assert_eq!(&gazetteer.cache().get(position).unwrap().osm_id, id);
                }
            }
        }
    }

    #[test]
    fn snapshot_stats_reflect_skipped_geometry() {
        let gazetteer = Gazetteer::load_strict(&mut source(), &config()).unwrap();
        let stats = gazetteer.stats();

        assert_eq!(stats.records, 4);
        assert_eq!(stats.ids, 4);
        assert_eq!(stats.geometries, 3);
        assert_eq!(stats.skipped_geometries, 1);
        assert_eq!(stats.max_phrase_len, 1);
    }

    #[test]
    fn rebuilding_from_the_same_rows_is_identical() {
        let a = Gazetteer::load_strict(&mut source(), &config()).unwrap();
        let b = Gazetteer::load_strict(&mut source(), &config()).unwrap();
        assert_eq!(a.stats(), b.stats());
    }

    #[test]
    fn localized_names_are_indexed_with_the_shared_tokenizer() {
        let mut config = config();
        config.names.lang_codes = vec!["fr".to_string()];
        let gazetteer = Gazetteer::load_strict(&mut source(), &config).unwrap();

        let tokens = gazetteer.tokenizer().tokenize("LONDRES");
        assert!(gazetteer.phrases().contains(&tokens));
    }

    #[test]
    fn load_skips_failing_focus_areas() {
        let mut config = config();
        config.focus_areas.push(FocusArea::new("missing"));

        let (gazetteer, failures) = Gazetteer::load(&mut source(), &config).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(gazetteer.cache().len(), 4);

        assert!(matches!(
            Gazetteer::load_strict(&mut source(), &config),
            Err(GazetteerError::Cache(_))
        ));
    }
}
