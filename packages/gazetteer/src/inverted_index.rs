//! Phrase index: normalized names to the identifiers carrying them.

use std::collections::{BTreeMap, BTreeSet};

use geoparse_gazetteer_models::{NameConfig, OsmId, Phrase};

use crate::cache::LocationCache;
use crate::names::index_names;
use crate::tokenize::{Tokenizer, normalize_phrase};

/// Maps every normalized name phrase to the identifiers whose records
/// carry it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvertedIndex {
    phrases: BTreeMap<Phrase, BTreeSet<OsmId>>,
    max_phrase_len: usize,
}

impl InvertedIndex {
    /// Indexes the names of every cached record.
    #[must_use]
    pub fn build<T: Tokenizer + ?Sized>(
        cache: &LocationCache,
        tokenizer: &T,
        names: &NameConfig,
    ) -> Self {
        let mut phrases: BTreeMap<Phrase, BTreeSet<OsmId>> = BTreeMap::new();
        let mut max_phrase_len = 0;

        for (_, record) in cache.iter() {
            for name in index_names(record, names) {
                let phrase = normalize_phrase(tokenizer, &name);
                if phrase.is_empty() {
                    log::trace!("Skipping name '{name}' of {}: no tokens", record.osm_id);
                    continue;
                }

                max_phrase_len = max_phrase_len.max(phrase.len());
                phrases
                    .entry(phrase)
                    .or_default()
                    .insert(record.osm_id.clone());
            }
        }

        log::debug!(
            "Built phrase index: {} phrases, longest {max_phrase_len} tokens",
            phrases.len()
        );

        Self {
            phrases,
            max_phrase_len,
        }
    }

    /// Identifiers for an exact token sequence.
    #[must_use]
    pub fn get(&self, tokens: &[String]) -> Option<&BTreeSet<OsmId>> {
        self.phrases.get(tokens)
    }

    /// Whether the exact token sequence is a key.
    #[must_use]
    pub fn contains(&self, tokens: &[String]) -> bool {
        self.phrases.contains_key(tokens)
    }

    /// Number of distinct phrases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Token count of the longest indexed phrase.
    #[must_use]
    pub const fn max_phrase_len(&self) -> usize {
        self.max_phrase_len
    }

    /// Entries in phrase order.
    pub fn iter(&self) -> impl Iterator<Item = (&Phrase, &BTreeSet<OsmId>)> {
        self.phrases.iter()
    }

    /// MD5 hex digest of the index's canonical text form.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut ctx = md5::Context::new();
        for (phrase, ids) in &self.phrases {
            for token in phrase.tokens() {
                ctx.consume(token.as_bytes());
                ctx.consume(b"\x1f");
            }
            ctx.consume(b"\t");
            for id in ids {
                ctx.consume(id.to_string().as_bytes());
            }
            ctx.consume(b"\n");
        }
        format!("{:x}", ctx.finalize())
    }
}

#[cfg(test)]
mod tests {
    use geoparse_gazetteer_models::{LocationRecord, OsmTags, SourceTable, TokenizerConfig};

    use super::*;
    use crate::tokenize::UnigramTokenizer;

    fn record(osm_id: i64, name: &str, tags: &[(&str, &str)]) -> LocationRecord {
        LocationRecord {
            loc_id: osm_id,
            name: name.to_string(),
            osm_id: OsmId::single(osm_id),
            admin_parents: Vec::new(),
            geometry_wkt: "POINT(0 0)".to_string(),
            tags: tags.iter().copied().collect(),
            table: SourceTable::Point,
            focus_area: "test".to_string(),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(' ').map(str::to_string).collect()
    }

    fn build(records: Vec<LocationRecord>) -> InvertedIndex {
        let tokenizer = UnigramTokenizer::new(&TokenizerConfig::default()).unwrap();
        InvertedIndex::build(
            &LocationCache::from_records(records),
            &tokenizer,
            &NameConfig::default(),
        )
    }

    #[test]
    fn indexes_normalized_names() {
        let index = build(vec![
            record(1, "New York City", &[]),
            record(2, "York", &[]),
            record(3, "New York", &[("alt_name", "NYC")]),
        ]);

        assert_eq!(index.max_phrase_len(), 3);
        assert!(index.contains(&tokens("new york city")));
        assert_eq!(
            index.get(&tokens("nyc")).unwrap(),
            &BTreeSet::from([OsmId::single(3)])
        );
        assert!(index.get(&tokens("New York")).is_none());
    }

    #[test]
    fn shared_names_collect_every_id() {
        let index = build(vec![
            record(1, "Southampton", &[]),
            record(2, "Southampton", &[]),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&tokens("southampton")).unwrap().len(), 2);
    }

    #[test]
    fn names_without_tokens_are_skipped() {
        let index = build(vec![record(1, "()", &[])]);
        assert!(index.is_empty());
        assert_eq!(index.max_phrase_len(), 0);
    }

    #[test]
    fn rebuild_is_byte_identical() {
        let records = vec![record(1, "London", &[("name:fr", "Londres")]), record(2, "Paris", &[])];
        assert_eq!(build(records.clone()).fingerprint(), build(records).fingerprint());
    }
}
