//! Identifier lookup: every cache position holding a given [`OsmId`].

use std::collections::{BTreeMap, BTreeSet};

use geoparse_gazetteer_models::OsmId;

use crate::cache::LocationCache;

/// Maps each identifier to the cache positions of its rows.
///
/// Several rows can share an identifier (a relation stored in both the
/// admin and poly tables, or a way split across focus areas).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsmidLookup {
    positions: BTreeMap<OsmId, BTreeSet<usize>>,
}

impl OsmidLookup {
    /// Indexes every record of the cache.
    #[must_use]
    pub fn build(cache: &LocationCache) -> Self {
        let mut positions: BTreeMap<OsmId, BTreeSet<usize>> = BTreeMap::new();

        for (position, record) in cache.iter() {
            positions
                .entry(record.osm_id.clone())
                .or_default()
                .insert(position);
        }

        log::debug!(
            "Built identifier lookup: {} ids over {} records",
            positions.len(),
            cache.len()
        );

        Self { positions }
    }

    /// Cache positions for an identifier.
    #[must_use]
    pub fn get(&self, osm_id: &OsmId) -> Option<&BTreeSet<usize>> {
        self.positions.get(osm_id)
    }

    /// Number of distinct identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Entries in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&OsmId, &BTreeSet<usize>)> {
        self.positions.iter()
    }

    /// MD5 hex digest of the lookup's canonical text form.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut ctx = md5::Context::new();
        for (osm_id, positions) in &self.positions {
            ctx.consume(osm_id.to_string().as_bytes());
            for position in positions {
                ctx.consume(b" ");
                ctx.consume(position.to_string().as_bytes());
            }
            ctx.consume(b"\n");
        }
        format!("{:x}", ctx.finalize())
    }
}

#[cfg(test)]
mod tests {
    use geoparse_gazetteer_models::{LocationRecord, OsmTags, SourceTable};

    use super::*;

    fn record(loc_id: i64, osm_id: i64) -> LocationRecord {
        LocationRecord {
            loc_id,
            name: format!("place{loc_id}"),
            osm_id: OsmId::single(osm_id),
            admin_parents: Vec::new(),
            geometry_wkt: "POINT(0 0)".to_string(),
            tags: OsmTags::new(),
            table: SourceTable::Point,
            focus_area: "test".to_string(),
        }
    }

    #[test]
    fn every_position_is_reachable_from_its_id() {
        let cache =
            LocationCache::from_records(vec![record(1, 10), record(2, -20), record(3, 10)]);
        let lookup = OsmidLookup::build(&cache);

        assert_eq!(lookup.len(), 2);
        for (position, record) in cache.iter() {
            assert!(lookup.get(&record.osm_id).unwrap().contains(&position));
        }
        assert_eq!(
            lookup.get(&OsmId::single(10)).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![0, 2]
        );
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let cache = LocationCache::from_records(vec![record(1, 10), record(2, 11)]);
        let a = OsmidLookup::build(&cache);
        let b = OsmidLookup::build(&cache);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 32);

        let other = OsmidLookup::build(&LocationCache::from_records(vec![record(1, 10)]));
        assert_ne!(a.fingerprint(), other.fingerprint());
    }
}
