//! Expansion of token matches into per-row location candidates.

use geoparse_gazetteer::{LocationCache, OsmidLookup};
use geoparse_matcher_models::{LocationMatch, TokenMatch};

use crate::MatchError;

/// Turns every token match into one [`LocationMatch`] per cached row of
/// each of its identifiers.
///
/// Output follows token match order, then identifier order, then cache
/// position.
///
/// # Errors
///
/// * [`MatchError::DanglingIdentifier`] if an identifier has no lookup
///   entry. The phrase index and lookup were built from different caches.
/// * [`MatchError::IndexCorruption`] if a lookup position is outside the
///   cache.
pub fn expand(
    matches: &[TokenMatch],
    cache: &LocationCache,
    lookup: &OsmidLookup,
) -> Result<Vec<LocationMatch>, MatchError> {
    let mut expanded = Vec::new();

    for token_match in matches {
        for osm_id in &token_match.osm_ids {
            let positions = lookup
                .get(osm_id)
                .ok_or_else(|| MatchError::DanglingIdentifier {
                    osm_id: osm_id.clone(),
                    phrase: token_match.phrase.clone(),
                })?;

            for &position in positions {
                let record = cache.get(position).ok_or_else(|| MatchError::IndexCorruption {
                    osm_id: osm_id.clone(),
                    position,
                    cache_len: cache.len(),
                })?;

                expanded.push(LocationMatch {
                    start: token_match.start,
                    end: token_match.end,
                    phrase: token_match.phrase.clone(),
                    position,
                    loc_id: record.loc_id,
                    name: record.name.clone(),
                    osm_id: record.osm_id.clone(),
                    admin_parents: record.admin_parents.clone(),
                    geometry_wkt: record.geometry_wkt.clone(),
                    tags: record.tags.clone(),
                    table: record.table,
                });
            }
        }
    }

    Ok(expanded)
}
