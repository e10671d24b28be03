//! Disambiguation of location candidates.
//!
//! Filters only ever remove candidates. They run in a fixed order:
//! confidence, area, region of interest, then the dedup/merge step that
//! turns survivors into [`ResolvedMention`]s.

pub mod area;
pub mod confidence;
pub mod dedup;
pub mod region;

use geoparse_gazetteer::GeometryIndex;
use geoparse_gazetteer_models::config::GeoparseConfig;
use geoparse_matcher_models::{LocationMatch, ResolvedMention};

pub use area::filter_by_area;
pub use confidence::{ConfidenceCache, ContextGeometry, ContextRelation, filter_by_confidence};
pub use dedup::dedup_matches;
pub use region::filter_by_region;

/// The configured filter sequence over one geometry index.
#[derive(Debug, Clone, Copy)]
pub struct DisambiguationFilterChain<'a> {
    config: &'a GeoparseConfig,
    geometries: &'a GeometryIndex,
}

impl<'a> DisambiguationFilterChain<'a> {
    #[must_use]
    pub const fn new(config: &'a GeoparseConfig, geometries: &'a GeometryIndex) -> Self {
        Self { config, geometries }
    }

    /// Runs every filter over a document's candidates.
    ///
    /// `cache` is only consulted when the confidence cache is enabled in
    /// the configuration. An empty result is a normal outcome.
    #[must_use]
    pub fn apply(
        &self,
        mut matches: Vec<LocationMatch>,
        document_id: &str,
        context: Option<&ContextGeometry>,
        cache: &mut ConfidenceCache,
    ) -> Vec<ResolvedMention> {
        let filters = &self.config.filters;

        filter_by_confidence(
            &mut matches,
            document_id,
            self.geometries,
            context,
            filters.context_radius_km,
            filters.confidence_cache.then_some(cache),
        );
        filter_by_area(
            &mut matches,
            document_id,
            self.geometries,
            filters.min_area_km2,
            filters.max_area_km2,
        );
        filter_by_region(
            &mut matches,
            document_id,
            self.geometries,
            filters.region_of_interest.as_ref(),
        );

        dedup_matches(
            matches,
            document_id,
            &self.config.names,
            &self.config.uri,
        )
    }
}
