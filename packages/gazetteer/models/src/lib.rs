#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared gazetteer types.
//!
//! Location identifiers, source table kinds, raw and validated location
//! rows, and the configuration consumed by the indexing and matching
//! pipeline. This crate has no heavyweight dependencies (no geometry
//! library, no database, no I/O).

pub mod config;

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use config::{
    FilterConfig, GeoparseConfig, NameConfig, RegionOfInterest, TokenizerConfig, UriConfig,
};

/// Stable identifier of a real-world place in the source map data.
///
/// A place built from several OSM elements (e.g. a polygon stitched from
/// multiple ways) carries all of their ids, so the identifier is an
/// ordered, non-empty list. Negative ids are relations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct OsmId(Vec<i64>);

impl OsmId {
    /// Creates an identifier from its component ids.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidOsmIdError`] if `ids` is empty.
    pub fn new(ids: Vec<i64>) -> Result<Self, InvalidOsmIdError> {
        if ids.is_empty() {
            return Err(InvalidOsmIdError {
                input: String::new(),
            });
        }
        Ok(Self(ids))
    }

    /// Creates an identifier for a single OSM element.
    #[must_use]
    pub fn single(id: i64) -> Self {
        Self(vec![id])
    }

    /// The component ids, in source order.
    #[must_use]
    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    /// The first component id.
    #[must_use]
    pub fn primary(&self) -> i64 {
        self.0[0]
    }

    /// Whether the primary element is an OSM relation.
    #[must_use]
    pub fn is_relation(&self) -> bool {
        self.primary() < 0
    }
}

impl fmt::Display for OsmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        f.write_str(")")
    }
}

impl FromStr for OsmId {
    type Err = InvalidOsmIdError;

    /// Parses `(-148838)`, `(101,102)` or a bare `101,102`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidOsmIdError {
            input: s.to_string(),
        };

        let inner = s
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim();
        if inner.is_empty() {
            return Err(err());
        }

        let ids = inner
            .split(',')
            .map(|part| part.trim().parse::<i64>().map_err(|_| err()))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(ids).map_err(|_| err())
    }
}

impl TryFrom<Vec<i64>> for OsmId {
    type Error = InvalidOsmIdError;

    fn try_from(ids: Vec<i64>) -> Result<Self, Self::Error> {
        Self::new(ids)
    }
}

impl From<OsmId> for Vec<i64> {
    fn from(id: OsmId) -> Self {
        id.0
    }
}

/// Error returned when an [`OsmId`] cannot be parsed or is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOsmIdError {
    /// The rejected input text (empty when constructed from an empty list).
    pub input: String,
}

impl fmt::Display for InvalidOsmIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid OSM id '{}': expected a non-empty list of integers",
            self.input
        )
    }
}

impl std::error::Error for InvalidOsmIdError {}

/// A normalized multi-word name: the token sequence both gazetteer names
/// and document text are reduced to before lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phrase(Vec<String>);

impl Phrase {
    /// The tokens of the phrase.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the phrase has no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for Phrase {
    fn from(tokens: Vec<String>) -> Self {
        Self(tokens)
    }
}

impl From<&[String]> for Phrase {
    fn from(tokens: &[String]) -> Self {
        Self(tokens.to_vec())
    }
}

// Lets ordered maps keyed by `Phrase` be queried with token slices.
impl Borrow<[String]> for Phrase {
    fn borrow(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Which preprocessed gazetteer table a location row came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceTable {
    /// Administrative boundaries (countries, regions, cities).
    Admin,
    /// Named polygons (parks, buildings, lakes).
    Poly,
    /// Named lines (roads, rivers).
    Line,
    /// Named points (villages, stations, venues).
    Point,
}

impl SourceTable {
    /// Every table kind, in loading order.
    pub const ALL: &[Self] = &[Self::Admin, Self::Poly, Self::Line, Self::Point];
}

/// A focus area whose preprocessed tables are loaded into the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusArea {
    /// Focus area name, used as the table name prefix (e.g. `uk_places`).
    pub name: String,
    /// Tables to load for this focus area.
    #[serde(default = "default_tables")]
    pub tables: Vec<SourceTable>,
    /// Inclusive `loc_id` range to load; `None` loads the whole table.
    #[serde(default)]
    pub loc_id_range: Option<(i64, i64)>,
}

fn default_tables() -> Vec<SourceTable> {
    SourceTable::ALL.to_vec()
}

impl FocusArea {
    /// A focus area loading all four tables without an id range.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: default_tables(),
            loc_id_range: None,
        }
    }

    /// Store table name for one of this focus area's tables
    /// (e.g. `uk_places_point`).
    #[must_use]
    pub fn table_name(&self, table: SourceTable) -> String {
        format!("{}_{table}", self.name)
    }
}

/// Free-form OSM tag mapping (`name:fr` → `Londres`, `place` → `city`).
///
/// There is no fixed schema: consumers look tags up by key and handle
/// absence themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OsmTags(BTreeMap<String, String>);

impl OsmTags {
    /// Creates an empty tag mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Looks up a tag value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Sets a tag value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Iterates tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OsmTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A raw location row as supplied by a gazetteer store.
///
/// Identifier lists and tags are still text; they are validated when the
/// row enters the location cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRow {
    /// Row id within its source table.
    pub loc_id: i64,
    /// Primary display name.
    pub name: String,
    /// OSM id list text, e.g. `(-148838)` or `101,102`.
    pub osm_id: String,
    /// Containing admin region id lists separated by `;`.
    #[serde(default)]
    pub admin_parents: String,
    /// Geometry as OGC well-known text.
    pub geom_wkt: String,
    /// Tag mapping as a JSON object of strings.
    #[serde(default = "empty_json_object")]
    pub tags_json: String,
}

fn empty_json_object() -> String {
    "{}".to_string()
}

/// A validated gazetteer location.
///
/// Immutable once cached; derived indexes refer to it by cache position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Row id within its source table.
    pub loc_id: i64,
    /// Primary display name.
    pub name: String,
    /// External identifier.
    pub osm_id: OsmId,
    /// Identifiers of admin regions containing this location.
    pub admin_parents: Vec<OsmId>,
    /// Geometry as OGC well-known text.
    pub geometry_wkt: String,
    /// OSM tags.
    pub tags: OsmTags,
    /// Source table kind.
    pub table: SourceTable,
    /// Focus area the row was loaded for.
    pub focus_area: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_parenthesized_relation_id() {
        let id: OsmId = "(-148838)".parse().unwrap();
        assert_eq!(id.ids(), &[-148_838]);
        assert!(id.is_relation());
    }

    #[test]
    fn parses_bare_composite_id() {
        let id: OsmId = " 101, 102 ".parse().unwrap();
        assert_eq!(id.ids(), &[101, 102]);
        assert_eq!(id.to_string(), "(101,102)");
        assert!(!id.is_relation());
    }

    #[test]
    fn rejects_empty_and_garbage_ids() {
        assert!("()".parse::<OsmId>().is_err());
        assert!("".parse::<OsmId>().is_err());
        assert!("12,abc".parse::<OsmId>().is_err());
        assert!(OsmId::new(vec![]).is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let id = OsmId::new(vec![-62149, 5]).unwrap();
        assert_eq!(id.to_string().parse::<OsmId>().unwrap(), id);
    }

    #[test]
    fn osm_id_serializes_as_list() {
        let id = OsmId::new(vec![1, 2]).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "[1,2]");
        assert!(serde_json::from_str::<OsmId>("[]").is_err());
    }

    #[test]
    fn phrase_lookup_accepts_token_slice() {
        let mut map = BTreeMap::new();
        let phrase = Phrase::from(vec!["new".to_string(), "york".to_string()]);
        map.insert(phrase.clone(), 1);

        let tokens = ["hello", "new", "york"].map(str::to_string);
        assert_eq!(map.get(&tokens[1..3]), Some(&1));
        assert_eq!(map.get(&tokens[0..2]), None);
        assert_eq!(phrase.to_string(), "new york");
    }

    #[test]
    fn source_table_string_forms() {
        assert_eq!(SourceTable::Admin.to_string(), "admin");
        assert_eq!("point".parse::<SourceTable>().unwrap(), SourceTable::Point);
        assert!("building".parse::<SourceTable>().is_err());
    }

    #[test]
    fn focus_area_table_names() {
        let area = FocusArea::new("uk_places");
        assert_eq!(area.table_name(SourceTable::Poly), "uk_places_poly");
        assert_eq!(area.tables.len(), 4);
    }

    #[test]
    fn tags_lookup_handles_absence() {
        let tags: OsmTags = [("name", "London"), ("name:fr", "Londres")]
            .into_iter()
            .collect();
        assert_eq!(tags.get("name:fr"), Some("Londres"));
        assert_eq!(tags.get("name:de"), None);
        assert_eq!(tags.len(), 2);
    }
}
