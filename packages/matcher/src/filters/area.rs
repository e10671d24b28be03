//! Area filter: drops polygonal candidates of implausible size.

use geoparse_gazetteer::GeometryIndex;
use geoparse_matcher_models::LocationMatch;

/// Drops polygonal candidates whose area in km² is zero or outside
/// `[min_km2, max_km2]`.
///
/// Points, lines, and candidates without an indexed geometry have no area
/// to judge and pass through.
pub fn filter_by_area(
    matches: &mut Vec<LocationMatch>,
    document_id: &str,
    geometries: &GeometryIndex,
    min_km2: f64,
    max_km2: f64,
) {
    let before = matches.len();

    matches.retain(|m| {
        let Some(indexed) = geometries.get(&m.osm_id) else {
            return true;
        };
        if !indexed.is_areal() {
            return true;
        }

        let area = indexed.area_km2();
        let keep = area > 0.0 && area >= min_km2 && area <= max_km2;
        if !keep {
            log::trace!(
                "[{document_id}] dropping {} '{}': area {area:.3} km² outside [{min_km2}, {max_km2}]",
                m.osm_id,
                m.name
            );
        }
        keep
    });

    log::debug!("[{document_id}] area filter: {before} -> {}", matches.len());
}

#[cfg(test)]
mod tests {
    use geoparse_gazetteer_models::{OsmId, OsmTags, Phrase, SourceTable};

    use super::*;

    fn candidate(osm_id: i64, wkt: &str) -> LocationMatch {
        LocationMatch {
            start: 0,
            end: 1,
            phrase: Phrase::default(),
            position: 0,
            loc_id: osm_id,
            name: format!("place{osm_id}"),
            osm_id: OsmId::single(osm_id),
            admin_parents: Vec::new(),
            geometry_wkt: wkt.to_string(),
            tags: OsmTags::new(),
            table: SourceTable::Poly,
        }
    }

    fn run(candidates: Vec<LocationMatch>, min: f64, max: f64) -> Vec<i64> {
        let geometries = GeometryIndex::build(
            candidates
                .iter()
                .map(|m| (m.osm_id.clone(), m.geometry_wkt.clone())),
        );
        let mut matches = candidates;
        filter_by_area(&mut matches, "d", &geometries, min, max);
        matches.iter().map(|m| m.osm_id.primary()).collect()
    }

    #[test]
    fn drops_polygons_outside_range() {
        // ~0.01° square near the equator is roughly 1.2 km².
        let small = "POLYGON((0 0,0.01 0,0.01 0.01,0 0.01,0 0))";
        // A continent-sized box.
        let huge = "POLYGON((-60 -30,60 -30,60 30,-60 30,-60 -30))";

        assert_eq!(
            run(vec![candidate(1, small), candidate(2, huge)], 0.0, 1_000_000.0),
            vec![1]
        );
        assert_eq!(
            run(vec![candidate(1, small), candidate(2, huge)], 10.0, 1e9),
            vec![2]
        );
    }

    #[test]
    fn zero_area_polygons_are_dropped() {
        let degenerate = "POLYGON((1 1,1 1,1 1,1 1))";
        assert!(run(vec![candidate(1, degenerate)], 0.0, 1e9).is_empty());
    }

    #[test]
    fn points_and_lines_pass() {
        assert_eq!(
            run(
                vec![
                    candidate(1, "POINT(1 1)"),
                    candidate(2, "LINESTRING(0 0,5 5)"),
                    candidate(3, "not wkt"),
                ],
                10.0,
                20.0,
            ),
            vec![1, 2, 3]
        );
    }
}
