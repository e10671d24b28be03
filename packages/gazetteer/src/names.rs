//! Name extraction from location records and their OSM tags.

use geoparse_gazetteer_models::{LocationRecord, NameConfig, OsmTags};

/// All names a record should be findable by: the primary name,
/// `name` and `name:<lang>` tags, and the configured alternate-name keys
/// (each also with `:<lang>`). Tag values holding several names separated
/// by `;` are split. Order is first-seen, duplicates removed.
#[must_use]
pub fn index_names(record: &LocationRecord, config: &NameConfig) -> Vec<String> {
    let mut names = Vec::new();
    push_name(&mut names, &record.name);

    for key in tag_keys(config) {
        if let Some(value) = record.tags.get(&key) {
            for part in value.split(';') {
                push_name(&mut names, part);
            }
        }
    }

    names
}

/// Names reported for a resolved mention: the primary name, then the
/// `name` tag, then `name:<lang>` for each configured language.
#[must_use]
pub fn multilingual_names(name: &str, tags: &OsmTags, config: &NameConfig) -> Vec<String> {
    let mut names = Vec::new();
    push_name(&mut names, name);

    if let Some(tag_name) = tags.get("name") {
        push_name(&mut names, tag_name);
    }
    for lang in &config.lang_codes {
        if let Some(localized) = tags.get(&format!("name:{lang}")) {
            push_name(&mut names, localized);
        }
    }

    names
}

fn tag_keys(config: &NameConfig) -> Vec<String> {
    let mut keys = vec!["name".to_string()];
    keys.extend(config.lang_codes.iter().map(|lang| format!("name:{lang}")));

    for alt in &config.alt_name_keys {
        keys.push(alt.clone());
        keys.extend(config.lang_codes.iter().map(|lang| format!("{alt}:{lang}")));
    }

    keys
}

fn push_name(names: &mut Vec<String>, candidate: &str) {
    let candidate = candidate.trim();
    if !candidate.is_empty() && !names.iter().any(|n| n == candidate) {
        names.push(candidate.to_string());
    }
}
