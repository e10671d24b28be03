//! Final dedup/merge step: one resolved mention per identifier.

use std::collections::BTreeMap;

use geoparse_gazetteer::names::multilingual_names;
use geoparse_gazetteer_models::{NameConfig, OsmId, UriConfig};
use geoparse_matcher_models::{LocationMatch, ResolvedMention};

use crate::uri::osm_uri;

/// Collapses candidates sharing an identifier into one mention.
///
/// The first candidate of each identifier wins and fixes the mention's
/// span, row, and URI. The name lists of every candidate in the group are
/// unioned in first-seen order. Output follows the order of first
/// occurrence.
#[must_use]
pub fn dedup_matches(
    matches: Vec<LocationMatch>,
    document_id: &str,
    names: &NameConfig,
    uri: &UriConfig,
) -> Vec<ResolvedMention> {
    let before = matches.len();
    let mut resolved: Vec<ResolvedMention> = Vec::new();
    let mut by_id: BTreeMap<OsmId, usize> = BTreeMap::new();

    for m in matches {
        let candidate_names = multilingual_names(&m.name, &m.tags, names);

        if let Some(&slot) = by_id.get(&m.osm_id) {
            let mention = &mut resolved[slot];
            for name in candidate_names {
                if !mention.names.contains(&name) {
                    mention.names.push(name);
                }
            }
            continue;
        }

        by_id.insert(m.osm_id.clone(), resolved.len());
        resolved.push(ResolvedMention {
            uri: osm_uri(&m.osm_id, &m.geometry_wkt, uri),
            start: m.start,
            end: m.end,
            phrase: m.phrase,
            osm_id: m.osm_id,
            loc_id: m.loc_id,
            name: m.name,
            names: candidate_names,
            table: m.table,
            geometry_wkt: m.geometry_wkt,
        });
    }

    log::debug!("[{document_id}] dedup: {before} -> {}", resolved.len());

    resolved
}
