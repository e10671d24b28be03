#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Toponym matching and disambiguation.
//!
//! Per document, strictly in order:
//!
//! 1. Tokenize with the gazetteer's tokenizer
//! 2. Scan for the longest indexed phrase at each token ([`token_set`])
//! 3. Expand phrase matches into per-row candidates ([`expand`])
//! 4. Run the [`filters::DisambiguationFilterChain`]
//!
//! [`Geoparser::annotate_batch`] fans documents out over blocking worker
//! tasks; the gazetteer snapshot is shared read-only between them.

pub mod expand;
pub mod filters;
pub mod progress;
pub mod token_set;
pub mod uri;

use std::sync::Arc;

use futures::StreamExt;
use geoparse_gazetteer::Gazetteer;
use geoparse_gazetteer_models::{OsmId, Phrase, config::GeoparseConfig};
use geoparse_matcher_models::{
    ContainingRegion, Document, DocumentAnnotation, DocumentOutcome,
};
use geoparse_spatial::SpatialError;

use crate::filters::{ConfidenceCache, ContextGeometry, DisambiguationFilterChain};
use crate::progress::BatchProgress;

/// Documents handed to one blocking task at a time in batch mode.
const BATCH_CHUNK_SIZE: usize = 64;

/// Errors from matching.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A phrase resolved to an identifier the lookup does not know.
    #[error("Dangling identifier {osm_id} for phrase '{phrase}'")]
    DanglingIdentifier { osm_id: OsmId, phrase: Phrase },

    /// The lookup points outside the location cache. Every later document
    /// would be affected, so batches abort on it.
    #[error("Index corruption: {osm_id} maps to position {position} of a {cache_len}-row cache")]
    IndexCorruption {
        osm_id: OsmId,
        position: usize,
        cache_len: usize,
    },

    /// A geotag or reverse geocoding query was not valid WKT.
    #[error(transparent)]
    Geometry(#[from] SpatialError),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl MatchError {
    /// Whether the error invalidates the whole session rather than one
    /// document.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::IndexCorruption { .. } | Self::Join(_))
    }
}

/// Annotates documents against a gazetteer snapshot.
#[derive(Debug)]
pub struct Geoparser {
    gazetteer: Arc<Gazetteer>,
    config: GeoparseConfig,
}

impl Geoparser {
    /// `config` should be the one the gazetteer was built with; its
    /// tokenizer rules decide which tokens are stop tokens.
    #[must_use]
    pub const fn new(gazetteer: Arc<Gazetteer>, config: GeoparseConfig) -> Self {
        Self { gazetteer, config }
    }

    #[must_use]
    pub const fn gazetteer(&self) -> &Arc<Gazetteer> {
        &self.gazetteer
    }

    #[must_use]
    pub const fn config(&self) -> &GeoparseConfig {
        &self.config
    }

    /// Annotates one document.
    ///
    /// # Errors
    ///
    /// * [`MatchError::DanglingIdentifier`] / [`MatchError::IndexCorruption`]
    ///   if the snapshot's indexes disagree
    /// * [`MatchError::Geometry`] if the document geotag is not valid WKT
    pub fn annotate(
        &self,
        document: &Document,
        cache: &mut ConfidenceCache,
    ) -> Result<DocumentAnnotation, MatchError> {
        let gazetteer = &self.gazetteer;

        let context = document
            .geotag
            .as_deref()
            .map(ContextGeometry::parse)
            .transpose()?;

        let tokens = gazetteer.tokenizer().tokenize(&document.text);
        let token_matches =
            token_set::match_tokens(&tokens, gazetteer.phrases(), &self.config.tokenizer);
        let candidates = expand::expand(&token_matches, gazetteer.cache(), gazetteer.lookup())?;
        let candidate_count = candidates.len();

        let mentions = DisambiguationFilterChain::new(&self.config, gazetteer.geometries())
            .apply(candidates, &document.id, context.as_ref(), cache);

        log::debug!(
            "[{}] {} tokens, {} phrase matches, {candidate_count} candidates, {} mentions",
            document.id,
            tokens.len(),
            token_matches.len(),
            mentions.len()
        );

        Ok(DocumentAnnotation {
            document_id: document.id.clone(),
            tokens,
            token_matches,
            candidates: candidate_count,
            mentions,
        })
    }

    /// Annotates many documents in parallel.
    ///
    /// Documents are split into chunks, each processed on a blocking task
    /// with its own [`ConfidenceCache`]; at most `concurrency` chunks run at
    /// once. Per-document errors become [`DocumentOutcome::Failed`]. Output
    /// order matches input order.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`MatchError`] (see [`MatchError::is_fatal`]);
    /// remaining results are discarded.
    pub async fn annotate_batch(
        self: Arc<Self>,
        documents: Vec<Document>,
        concurrency: usize,
        progress: Arc<dyn BatchProgress>,
    ) -> Result<Vec<DocumentOutcome>, MatchError> {
        let total = documents.len();
        progress.start(total as u64);

        let mut chunks: Vec<(usize, Vec<Document>)> = Vec::new();
        let mut documents = documents.into_iter();
        let mut offset = 0;
        loop {
            let chunk: Vec<Document> = documents.by_ref().take(BATCH_CHUNK_SIZE).collect();
            if chunk.is_empty() {
                break;
            }
            let len = chunk.len();
            chunks.push((offset, chunk));
            offset += len;
        }

        log::info!(
            "Annotating {total} documents in {} chunks (concurrency {concurrency})",
            chunks.len()
        );

        let mut results = futures::stream::iter(chunks.into_iter().map(|(offset, chunk)| {
            let geoparser = Arc::clone(&self);
            let progress = Arc::clone(&progress);
            async move {
                tokio::task::spawn_blocking(move || {
                    let outcomes = geoparser.annotate_chunk(&chunk)?;
                    progress.advance(outcomes.len() as u64);
                    Ok::<_, MatchError>((offset, outcomes))
                })
                .await?
            }
        }))
        .buffer_unordered(concurrency.max(1));

        let mut slots: Vec<Option<DocumentOutcome>> = vec![None; total];
        while let Some(result) = results.next().await {
            let (offset, outcomes) = result?;
            for (i, outcome) in outcomes.into_iter().enumerate() {
                slots[offset + i] = Some(outcome);
            }
        }

        let outcomes: Vec<DocumentOutcome> = slots.into_iter().flatten().collect();
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, DocumentOutcome::Failed { .. }))
            .count();

        progress.finish(&format!(
            "Annotated {} documents ({failed} failed)",
            outcomes.len()
        ));

        Ok(outcomes)
    }

    fn annotate_chunk(&self, documents: &[Document]) -> Result<Vec<DocumentOutcome>, MatchError> {
        let mut cache = ConfidenceCache::new();
        let mut outcomes = Vec::with_capacity(documents.len());

        for document in documents {
            match self.annotate(document, &mut cache) {
                Ok(annotation) => outcomes.push(DocumentOutcome::Annotated(annotation)),
                Err(e) if e.is_fatal() => {
                    log::error!("[{}] aborting batch: {e}", document.id);
                    return Err(e);
                }
                Err(e) => {
                    log::warn!("[{}] annotation failed: {e}", document.id);
                    outcomes.push(DocumentOutcome::Failed {
                        document_id: document.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        log::trace!(
            "Chunk done: confidence cache {} hits, {} misses",
            cache.hits(),
            cache.misses()
        );

        Ok(outcomes)
    }

    /// Every indexed location whose geometry contains the WKT query, with
    /// the names of its cached rows.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Geometry`] if the query is not valid WKT.
    pub fn reverse_geocode(&self, wkt: &str) -> Result<Vec<ContainingRegion>, MatchError> {
        let gazetteer = &self.gazetteer;
        let ids = gazetteer.geometries().reverse_geocode_wkt(wkt)?;

        Ok(ids
            .into_iter()
            .map(|osm_id| {
                let records: Vec<_> = gazetteer
                    .lookup()
                    .get(&osm_id)
                    .into_iter()
                    .flatten()
                    .filter_map(|&position| gazetteer.cache().get(position))
                    .collect();

                let mut names: Vec<String> = Vec::new();
                for record in &records {
                    if !names.contains(&record.name) {
                        names.push(record.name.clone());
                    }
                }

                let geometry_wkt = records.first().map_or("", |r| r.geometry_wkt.as_str());
                ContainingRegion {
                    uri: uri::osm_uri(&osm_id, geometry_wkt, &self.config.uri),
                    table: records.first().map(|r| r.table),
                    osm_id,
                    names,
                }
            })
            .collect())
    }
}
