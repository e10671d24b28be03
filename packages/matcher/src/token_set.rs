//! Phrase scanning over a token sequence.

use geoparse_gazetteer::InvertedIndex;
use geoparse_gazetteer_models::{Phrase, TokenizerConfig};
use geoparse_matcher_models::TokenMatch;

/// Finds gazetteer phrases in a token sequence.
///
/// At every start offset the longest indexed phrase beginning there is
/// reported, so "new york city" yields one match at its first token rather
/// than also "new york". Matches starting at different offsets may
/// overlap. A single stop word, punctuation token, or sentence separator
/// never matches on its own.
#[must_use]
pub fn match_tokens(
    tokens: &[String],
    index: &InvertedIndex,
    tokenizer: &TokenizerConfig,
) -> Vec<TokenMatch> {
    let max_len = index.max_phrase_len();
    let mut matches = Vec::new();

    if max_len == 0 {
        return matches;
    }

    for start in 0..tokens.len() {
        let longest = (start + 1..=tokens.len().min(start + max_len))
            .rev()
            .find_map(|end| {
                let window = &tokens[start..end];
                if window.len() == 1 && tokenizer.is_stop_token(&window[0]) {
                    return None;
                }
                index.get(window).map(|ids| (end, ids))
            });

        if let Some((end, ids)) = longest {
            log::trace!("Matched tokens {start}..{end}: {}", tokens[start..end].join(" "));
            matches.push(TokenMatch {
                start,
                end,
                phrase: Phrase::from(&tokens[start..end]),
                osm_ids: ids.clone(),
            });
        }
    }

    matches
}

/// [`match_tokens`] over several token sequences, one result per sequence.
#[must_use]
pub fn match_token_sets(
    token_sets: &[Vec<String>],
    index: &InvertedIndex,
    tokenizer: &TokenizerConfig,
) -> Vec<Vec<TokenMatch>> {
    token_sets
        .iter()
        .map(|tokens| match_tokens(tokens, index, tokenizer))
        .collect()
}
