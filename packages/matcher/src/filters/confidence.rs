//! Confidence filter: subsumed mentions and document context.
//!
//! Three passes, in order:
//!
//! 1. A candidate whose span lies inside a strictly longer candidate span
//!    is dropped ("york" inside "new york").
//! 2. With a context geometry, each candidate is classified against it.
//!    Within a span, if any candidate relates to the context, only the
//!    best-related candidates survive.
//! 3. Within a span, if any candidate has an admin parent that is a
//!    candidate of another span ("New York, USA"), only such candidates
//!    survive.

use std::collections::{BTreeMap, BTreeSet};

use geo::{Centroid, Geometry, Point};
use geoparse_gazetteer::GeometryIndex;
use geoparse_gazetteer_models::OsmId;
use geoparse_matcher_models::LocationMatch;
use geoparse_spatial::SpatialError;

/// How a candidate relates to the document context geometry.
/// Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContextRelation {
    Unrelated,
    /// Centroid within the configured radius of the context centroid.
    Near,
    /// Candidate geometry contains the context geometry.
    Contains,
}

/// A parsed document context geometry.
#[derive(Debug, Clone)]
pub struct ContextGeometry {
    wkt: String,
    geometry: Geometry<f64>,
    centroid: Option<Point<f64>>,
}

impl ContextGeometry {
    /// Parses a context geometry from WKT.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeometryParse`] if the text is not valid WKT.
    pub fn parse(wkt: &str) -> Result<Self, SpatialError> {
        let geometry = geoparse_spatial::parse_wkt(wkt)?;
        let centroid = geometry.centroid();
        Ok(Self {
            wkt: wkt.to_string(),
            geometry,
            centroid,
        })
    }

    /// The WKT this context was parsed from.
    #[must_use]
    pub fn wkt(&self) -> &str {
        &self.wkt
    }
}

/// Memoized candidate/context relations.
///
/// Keys are the candidate identifier and the context's WKT text, so two
/// contexts share entries only when their text is identical. Owned by one
/// matching worker; never shared between threads.
#[derive(Debug, Default)]
pub struct ConfidenceCache {
    relations: BTreeMap<(OsmId, String), ContextRelation>,
    hits: u64,
    misses: u64,
}

impl ConfidenceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Lookups answered from the cache.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that had to be computed.
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.relations.clear();
        self.hits = 0;
        self.misses = 0;
    }

    fn get_or_classify(
        &mut self,
        osm_id: &OsmId,
        context: &ContextGeometry,
        classify: impl FnOnce() -> ContextRelation,
    ) -> ContextRelation {
        let key = (osm_id.clone(), context.wkt.clone());
        if let Some(&relation) = self.relations.get(&key) {
            self.hits += 1;
            return relation;
        }

        self.misses += 1;
        let relation = classify();
        self.relations.insert(key, relation);
        relation
    }
}

/// Classifies a candidate geometry against the context.
#[must_use]
pub fn classify(
    geometries: &GeometryIndex,
    osm_id: &OsmId,
    context: &ContextGeometry,
    radius_km: f64,
) -> ContextRelation {
    let Some(indexed) = geometries.get(osm_id) else {
        return ContextRelation::Unrelated;
    };

    if indexed.contains(&context.geometry) {
        return ContextRelation::Contains;
    }

    match (indexed.centroid(), context.centroid) {
        (Some(a), Some(b)) if geoparse_spatial::distance_km(a, b) <= radius_km => {
            ContextRelation::Near
        }
        _ => ContextRelation::Unrelated,
    }
}

/// Applies both confidence passes in place.
///
/// `cache` is consulted only when given; pass `None` to classify every
/// candidate afresh.
pub fn filter_by_confidence(
    matches: &mut Vec<LocationMatch>,
    document_id: &str,
    geometries: &GeometryIndex,
    context: Option<&ContextGeometry>,
    radius_km: f64,
    mut cache: Option<&mut ConfidenceCache>,
) {
    let before = matches.len();

    drop_subsumed(matches);
    let after_subsumed = matches.len();

    if let Some(context) = context {
        let relations: Vec<ContextRelation> = matches
            .iter()
            .map(|m| {
                let compute = || classify(geometries, &m.osm_id, context, radius_km);
                match cache.as_deref_mut() {
                    Some(cache) => cache.get_or_classify(&m.osm_id, context, compute),
                    None => compute(),
                }
            })
            .collect();

        let mut best: BTreeMap<(usize, usize), ContextRelation> = BTreeMap::new();
        for (m, &relation) in matches.iter().zip(&relations) {
            let entry = best.entry(m.span()).or_insert(relation);
            *entry = (*entry).max(relation);
        }

        let mut relations = relations.into_iter();
        matches.retain(|m| {
            let relation = relations.next().unwrap_or(ContextRelation::Unrelated);
            let span_best = best
                .get(&m.span())
                .copied()
                .unwrap_or(ContextRelation::Unrelated);
            let keep = span_best == ContextRelation::Unrelated || relation == span_best;
            if !keep {
                log::trace!(
                    "[{document_id}] dropping {} '{}': {relation:?}, span has {span_best:?}",
                    m.osm_id,
                    m.name
                );
            }
            keep
        });
    }

    let after_context = matches.len();

    prefer_mentioned_parents(matches, document_id);

    log::debug!(
        "[{document_id}] confidence filter: {before} -> {after_subsumed} (subsumed) -> \
         {after_context} (context) -> {} (parents)",
        matches.len()
    );
}

fn prefer_mentioned_parents(matches: &mut Vec<LocationMatch>, document_id: &str) {
    let supported: Vec<bool> = matches
        .iter()
        .map(|m| {
            m.admin_parents.iter().any(|parent| {
                matches
                    .iter()
                    .any(|other| other.span() != m.span() && other.osm_id == *parent)
            })
        })
        .collect();

    let supported_spans: BTreeSet<(usize, usize)> = matches
        .iter()
        .zip(&supported)
        .filter(|(_, supported)| **supported)
        .map(|(m, _)| m.span())
        .collect();

    let mut supported = supported.into_iter();
    matches.retain(|m| {
        let keep = supported.next().unwrap_or(false) || !supported_spans.contains(&m.span());
        if !keep {
            log::trace!(
                "[{document_id}] dropping {} '{}': no admin parent mentioned",
                m.osm_id,
                m.name
            );
        }
        keep
    });
}

fn drop_subsumed(matches: &mut Vec<LocationMatch>) {
    let subsumed: Vec<bool> = matches
        .iter()
        .map(|m| matches.iter().any(|other| m.is_subsumed_by(other)))
        .collect();
    let mut subsumed = subsumed.into_iter();
    matches.retain(|_| !subsumed.next().unwrap_or(false));
}

#[cfg(test)]
mod tests {
    use geoparse_gazetteer_models::{OsmTags, Phrase, SourceTable};

    use super::*;

    const ENGLAND: &str = "POLYGON((-6 49,2 49,2 56,-6 56,-6 49))";
    const NEW_ENGLAND: &str = "POLYGON((-73 41,-67 41,-67 47,-73 47,-73 41))";

    fn candidate(start: usize, end: usize, osm_id: i64, wkt: &str) -> LocationMatch {
        LocationMatch {
            start,
            end,
            phrase: Phrase::default(),
            position: 0,
            loc_id: osm_id,
            name: format!("place{osm_id}"),
            osm_id: OsmId::single(osm_id),
            admin_parents: Vec::new(),
            geometry_wkt: wkt.to_string(),
            tags: OsmTags::new(),
            table: SourceTable::Admin,
        }
    }

    fn index(candidates: &[LocationMatch]) -> GeometryIndex {
        GeometryIndex::build(
            candidates
                .iter()
                .map(|m| (m.osm_id.clone(), m.geometry_wkt.as_str())),
        )
    }

    fn ids(matches: &[LocationMatch]) -> Vec<i64> {
        matches.iter().map(|m| m.osm_id.primary()).collect()
    }

    #[test]
    fn drops_spans_inside_longer_spans() {
        let mut matches = vec![
            candidate(1, 3, 1, "POINT(-74 40.7)"),
            candidate(2, 3, 2, "POINT(-1.08 53.96)"),
            candidate(4, 5, 3, "POINT(0 0)"),
        ];
        let geometries = index(&matches);

        filter_by_confidence(&mut matches, "d", &geometries, None, 50.0, None);

        assert_eq!(ids(&matches), vec![1, 3]);
    }

    #[test]
    fn context_keeps_containing_candidates() {
        let mut matches = vec![
            candidate(0, 1, 10, ENGLAND),
            candidate(0, 1, 20, NEW_ENGLAND),
        ];
        let geometries = index(&matches);
        let context = ContextGeometry::parse("POINT(-1.4 50.9)").unwrap();

        filter_by_confidence(&mut matches, "d", &geometries, Some(&context), 50.0, None);

        assert_eq!(ids(&matches), vec![10]);
    }

    #[test]
    fn nearby_point_beats_distant_point() {
        let mut matches = vec![
            candidate(0, 1, 1, "POINT(-1.40 50.90)"),
            candidate(0, 1, 2, "POINT(-72.30 40.88)"),
        ];
        let geometries = index(&matches);
        let context = ContextGeometry::parse("POINT(-1.30 50.95)").unwrap();

        filter_by_confidence(&mut matches, "d", &geometries, Some(&context), 50.0, None);

        assert_eq!(ids(&matches), vec![1]);
    }

    #[test]
    fn unrelated_spans_are_left_alone() {
        let mut matches = vec![
            candidate(0, 1, 1, "POINT(100 10)"),
            candidate(0, 1, 2, "POINT(120 -10)"),
        ];
        let geometries = index(&matches);
        let context = ContextGeometry::parse("POINT(-1.3 50.9)").unwrap();

        filter_by_confidence(&mut matches, "d", &geometries, Some(&context), 50.0, None);

        assert_eq!(ids(&matches), vec![1, 2]);
    }

    #[test]
    fn cache_is_keyed_by_context_text() {
        let candidates = vec![candidate(0, 1, 10, ENGLAND), candidate(0, 1, 20, NEW_ENGLAND)];
        let geometries = index(&candidates);
        let context = ContextGeometry::parse("POINT(-1.4 50.9)").unwrap();
        let mut cache = ConfidenceCache::new();

        let mut first = candidates.clone();
        filter_by_confidence(&mut first, "a", &geometries, Some(&context), 50.0, Some(&mut cache));
        assert_eq!((cache.hits(), cache.misses()), (0, 2));

        let mut second = candidates.clone();
        filter_by_confidence(&mut second, "b", &geometries, Some(&context), 50.0, Some(&mut cache));
        assert_eq!((cache.hits(), cache.misses()), (2, 2));
        assert_eq!(ids(&first), ids(&second));

        // Same point, different text: not shared.
        let respaced = ContextGeometry::parse("POINT (-1.4 50.9)").unwrap();
        let mut third = candidates;
        filter_by_confidence(&mut third, "c", &geometries, Some(&respaced), 50.0, Some(&mut cache));
        assert_eq!(cache.misses(), 4);
        assert_eq!(cache.len(), 4);
    }

    fn with_parents(mut m: LocationMatch, parents: &[i64]) -> LocationMatch {
        m.admin_parents = parents.iter().copied().map(OsmId::single).collect();
        m
    }

    #[test]
    fn mentioned_parent_supports_candidate() {
        // "New York , USA": the city in the USA beats the English village.
        let mut matches = vec![
            with_parents(candidate(0, 2, 61_320, "POINT(-74.0 40.7)"), &[-148_838]),
            with_parents(candidate(0, 2, 2_000, "POINT(-0.1 53.1)"), &[-58_447]),
            candidate(3, 4, -148_838, "POINT(-100 40)"),
        ];
        let geometries = index(&matches);

        filter_by_confidence(&mut matches, "d", &geometries, None, 50.0, None);

        assert_eq!(ids(&matches), vec![61_320, -148_838]);
    }

    #[test]
    fn unmentioned_parents_leave_span_alone() {
        let mut matches = vec![
            with_parents(candidate(0, 2, 1, "POINT(-74.0 40.7)"), &[-148_838]),
            with_parents(candidate(0, 2, 2, "POINT(-0.1 53.1)"), &[-58_447]),
        ];
        let geometries = index(&matches);

        filter_by_confidence(&mut matches, "d", &geometries, None, 50.0, None);

        assert_eq!(ids(&matches), vec![1, 2]);
    }

    #[test]
    fn parent_in_same_span_does_not_count() {
        let mut matches = vec![
            with_parents(candidate(0, 1, 1, "POINT(0 0)"), &[2]),
            candidate(0, 1, 2, "POINT(1 1)"),
            with_parents(candidate(0, 1, 3, "POINT(2 2)"), &[9]),
        ];
        let geometries = index(&matches);

        filter_by_confidence(&mut matches, "d", &geometries, None, 50.0, None);

        assert_eq!(ids(&matches), vec![1, 2, 3]);
    }

    #[test]
    fn invalid_context_is_rejected() {
        assert!(ContextGeometry::parse("POINT(").is_err());
    }
}
