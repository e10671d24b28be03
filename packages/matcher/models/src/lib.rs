#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Types flowing through the toponym matching pipeline.
//!
//! A [`Document`] is tokenized and scanned into [`TokenMatch`]es, each
//! expanded into one [`LocationMatch`] per candidate gazetteer row, and
//! the survivors of disambiguation become [`ResolvedMention`]s collected
//! in a [`DocumentAnnotation`].

use std::collections::BTreeSet;

use geoparse_gazetteer_models::{OsmId, OsmTags, Phrase, SourceTable};
use serde::{Deserialize, Serialize};

/// A text to geoparse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Caller-assigned identifier, echoed in the annotation.
    pub id: String,
    /// Raw text.
    pub text: String,
    /// Optional WKT geometry the document is known to be about (e.g. a
    /// post's geotag). Used as disambiguation context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geotag: Option<String>,
}

impl Document {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            geotag: None,
        }
    }

    #[must_use]
    pub fn with_geotag(mut self, wkt: impl Into<String>) -> Self {
        self.geotag = Some(wkt.into());
        self
    }
}

/// A token span whose phrase is a gazetteer name.
///
/// `end` is exclusive, so `end - start` is the phrase length in tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMatch {
    pub start: usize,
    pub end: usize,
    /// The matched tokens.
    pub phrase: Phrase,
    /// Every identifier indexed under the phrase.
    pub osm_ids: BTreeSet<OsmId>,
}

impl TokenMatch {
    /// Span length in tokens.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// One candidate gazetteer row for a token match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMatch {
    pub start: usize,
    pub end: usize,
    pub phrase: Phrase,
    /// Cache position of the row.
    pub position: usize,
    pub loc_id: i64,
    /// Primary name of the row.
    pub name: String,
    pub osm_id: OsmId,
    /// Admin regions containing the row.
    #[serde(default)]
    pub admin_parents: Vec<OsmId>,
    pub geometry_wkt: String,
    pub tags: OsmTags,
    pub table: SourceTable,
}

impl LocationMatch {
    /// `(start, end)` token span.
    #[must_use]
    pub const fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Span length in tokens.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Whether this span lies inside `other`'s span and is strictly
    /// shorter.
    #[must_use]
    pub const fn is_subsumed_by(&self, other: &Self) -> bool {
        other.start <= self.start && self.end <= other.end && other.len() > self.len()
    }
}

/// A disambiguated location mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMention {
    pub start: usize,
    pub end: usize,
    pub phrase: Phrase,
    pub osm_id: OsmId,
    pub loc_id: i64,
    /// Primary name of the winning row.
    pub name: String,
    /// Names across the merged candidates, primary first, then configured
    /// languages. No duplicates.
    pub names: Vec<String>,
    /// Canonical OSM URI.
    pub uri: String,
    pub table: SourceTable,
    pub geometry_wkt: String,
}

/// The result of geoparsing one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnnotation {
    pub document_id: String,
    pub tokens: Vec<String>,
    /// Raw phrase matches before expansion.
    pub token_matches: Vec<TokenMatch>,
    /// Candidate rows before filtering.
    pub candidates: usize,
    pub mentions: Vec<ResolvedMention>,
}

/// An indexed location containing a reverse geocoding query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainingRegion {
    pub osm_id: OsmId,
    /// Primary names of the identifier's cached rows, deduplicated.
    pub names: Vec<String>,
    pub table: Option<SourceTable>,
    pub uri: String,
}

/// Per-document outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Annotated(DocumentAnnotation),
    /// The document could not be annotated; the rest of the batch was
    /// unaffected.
    Failed {
        document_id: String,
        error: String,
    },
}

impl DocumentOutcome {
    #[must_use]
    pub fn document_id(&self) -> &str {
        match self {
            Self::Annotated(annotation) => &annotation.document_id,
            Self::Failed { document_id, .. } => document_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(start: usize, end: usize) -> LocationMatch {
        LocationMatch {
            start,
            end,
            phrase: Phrase::default(),
            position: 0,
            loc_id: 0,
            name: String::new(),
            osm_id: OsmId::single(1),
            admin_parents: Vec::new(),
            geometry_wkt: String::new(),
            tags: OsmTags::new(),
            table: SourceTable::Point,
        }
    }

    #[test]
    fn subsumption_requires_a_strictly_longer_enclosing_span() {
        let york = location(2, 3);
        let new_york = location(1, 3);
        assert!(york.is_subsumed_by(&new_york));
        assert!(!new_york.is_subsumed_by(&york));
        assert!(!york.is_subsumed_by(&location(2, 3)));
        assert!(!york.is_subsumed_by(&location(3, 5)));
    }

    #[test]
    fn document_geotag_is_optional_in_json() {
        let doc: Document = serde_json::from_str(r#"{"id":"d1","text":"hello"}"#).unwrap();
        assert_eq!(doc, Document::new("d1", "hello"));

        let tagged = Document::new("d2", "x").with_geotag("POINT(1 2)");
        let json = serde_json::to_string(&tagged).unwrap();
        assert!(json.contains("\"geotag\":\"POINT(1 2)\""));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let failed = DocumentOutcome::Failed {
            document_id: "d3".to_string(),
            error: "dangling".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(failed.document_id(), "d3");
    }
}
