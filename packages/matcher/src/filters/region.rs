//! Region-of-interest filter: a hard geographic scope on candidates.

use geo::Point;
use geoparse_gazetteer::GeometryIndex;
use geoparse_gazetteer_models::RegionOfInterest;
use geoparse_matcher_models::LocationMatch;

/// Drops every candidate whose centroid lies outside the region of
/// interest. Candidates without an indexed geometry cannot be placed and
/// are dropped as well. `None` disables the filter.
pub fn filter_by_region(
    matches: &mut Vec<LocationMatch>,
    document_id: &str,
    geometries: &GeometryIndex,
    region: Option<&RegionOfInterest>,
) {
    let Some(region) = region else {
        return;
    };
    let before = matches.len();

    matches.retain(|m| {
        let centroid = geometries.get(&m.osm_id).and_then(|g| g.centroid());
        let keep = centroid.is_some_and(|c| in_region(geometries, region, c));
        if !keep {
            log::trace!(
                "[{document_id}] dropping {} '{}': outside region of interest",
                m.osm_id,
                m.name
            );
        }
        keep
    });

    log::debug!("[{document_id}] region filter: {before} -> {}", matches.len());
}

fn in_region(geometries: &GeometryIndex, region: &RegionOfInterest, point: Point<f64>) -> bool {
    match region {
        RegionOfInterest::BoundingBox { min, max } => {
            (min[0]..=max[0]).contains(&point.x()) && (min[1]..=max[1]).contains(&point.y())
        }
        RegionOfInterest::Regions { osm_ids } => {
            osm_ids.iter().any(|id| geometries.contains(id, point))
        }
    }
}
