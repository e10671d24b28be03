//! Configuration consumed by index building and matching.
//!
//! Every field carries a serde default so partial TOML files only need to
//! mention what they change.

use serde::{Deserialize, Serialize};

use crate::{FocusArea, OsmId};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoparseConfig {
    /// Text tokenization and phrase normalization rules.
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    /// Which tags contribute indexable and reportable names.
    #[serde(default)]
    pub names: NameConfig,
    /// Disambiguation filter settings.
    #[serde(default)]
    pub filters: FilterConfig,
    /// Canonical URI settings.
    #[serde(default)]
    pub uri: UriConfig,
    /// Focus areas to load into the location cache.
    #[serde(default)]
    pub focus_areas: Vec<FocusArea>,
}

/// Tokenization rules shared by index building and document scanning.
///
/// Gazetteer names and document text must be normalized with the same
/// rules or phrase lookups silently miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Extra characters treated as whitespace (quotes, brackets).
    #[serde(default = "default_whitespace")]
    pub whitespace: String,
    /// Characters emitted as standalone punctuation tokens.
    #[serde(default = "default_punctuation")]
    pub punctuation: String,
    /// Sentence separators, emitted as standalone tokens.
    #[serde(default = "default_sentence_separators")]
    pub sentence_separators: Vec<String>,
    /// Lowercase stop words that never match as a single-token phrase.
    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,
}

fn default_whitespace() -> String {
    "\"\u{201a}\u{201b}\u{201c}\u{201d}()".to_string()
}

fn default_punctuation() -> String {
    ",;\\/:+-#~&*=!?".to_string()
}

fn default_sentence_separators() -> Vec<String> {
    ["\n", "\r\n", "\u{000c}", "\u{2026}"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_stop_words() -> Vec<String> {
    [
        "a", "an", "and", "at", "by", "for", "from", "in", "is", "it", "its", "of", "on", "the",
        "to", "with",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            whitespace: default_whitespace(),
            punctuation: default_punctuation(),
            sentence_separators: default_sentence_separators(),
            stop_words: default_stop_words(),
        }
    }
}

impl TokenizerConfig {
    /// Whether a normalized token can never be a match on its own
    /// (stop word, punctuation character, or sentence separator).
    #[must_use]
    pub fn is_stop_token(&self, token: &str) -> bool {
        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next())
            && self.punctuation.contains(c)
        {
            return true;
        }

        self.sentence_separators.iter().any(|s| s == token)
            || self.stop_words.iter().any(|w| w == token)
    }
}

/// Which tags provide a location's names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameConfig {
    /// Language codes whose `name:<lang>` tags are indexed and reported.
    #[serde(default = "default_lang_codes")]
    pub lang_codes: Vec<String>,
    /// Alternate-name tag keys indexed in addition to `name`; each is also
    /// consulted with a `:<lang>` suffix.
    #[serde(default = "default_alt_name_keys")]
    pub alt_name_keys: Vec<String>,
}

fn default_lang_codes() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_alt_name_keys() -> Vec<String> {
    ["alt_name", "old_name", "short_name", "official_name"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Default for NameConfig {
    fn default() -> Self {
        Self {
            lang_codes: default_lang_codes(),
            alt_name_keys: default_alt_name_keys(),
        }
    }
}

/// Disambiguation filter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Smallest plausible area for a polygonal candidate, in km².
    #[serde(default)]
    pub min_area_km2: f64,
    /// Largest plausible area for a polygonal candidate, in km².
    #[serde(default = "default_max_area_km2")]
    pub max_area_km2: f64,
    /// Radius within which a candidate counts as near the document
    /// context geometry, in km.
    #[serde(default = "default_context_radius_km")]
    pub context_radius_km: f64,
    /// Whether candidate/context relations are memoized across mentions.
    #[serde(default = "default_true")]
    pub confidence_cache: bool,
    /// Hard geographic scope; `None` disables the filter.
    #[serde(default)]
    pub region_of_interest: Option<RegionOfInterest>,
}

const fn default_max_area_km2() -> f64 {
    20_000_000.0
}

const fn default_context_radius_km() -> f64 {
    50.0
}

const fn default_true() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_area_km2: 0.0,
            max_area_km2: default_max_area_km2(),
            context_radius_km: default_context_radius_km(),
            confidence_cache: default_true(),
            region_of_interest: None,
        }
    }
}

/// A caller-supplied geographic scope for candidates.
///
/// Bounding box corners may be given in any order; deserialization orders
/// them the same way [`RegionOfInterest::bounding_box`] does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", from = "RawRegionOfInterest")]
pub enum RegionOfInterest {
    /// Two opposite `[lon, lat]` corners of a bounding box.
    BoundingBox {
        /// First corner.
        min: [f64; 2],
        /// Opposite corner.
        max: [f64; 2],
    },
    /// Indexed regions (typically admin relations) a candidate must fall in.
    Regions {
        /// Identifiers of the enclosing regions.
        osm_ids: Vec<OsmId>,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawRegionOfInterest {
    BoundingBox { min: [f64; 2], max: [f64; 2] },
    Regions { osm_ids: Vec<OsmId> },
}

impl From<RawRegionOfInterest> for RegionOfInterest {
    fn from(raw: RawRegionOfInterest) -> Self {
        match raw {
            RawRegionOfInterest::BoundingBox { min, max } => Self::bounding_box(min, max),
            RawRegionOfInterest::Regions { osm_ids } => Self::Regions { osm_ids },
        }
    }
}

impl RegionOfInterest {
    /// Builds a bounding box from any two opposite corners.
    #[must_use]
    pub fn bounding_box(a: [f64; 2], b: [f64; 2]) -> Self {
        Self::BoundingBox {
            min: [a[0].min(b[0]), a[1].min(b[1])],
            max: [a[0].max(b[0]), a[1].max(b[1])],
        }
    }
}

/// Canonical URI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriConfig {
    /// Base URL that `/{node|way|relation}/{id}` is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://www.openstreetmap.org".to_string()
}

impl Default for UriConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}
