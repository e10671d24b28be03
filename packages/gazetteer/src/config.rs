//! Loading [`GeoparseConfig`] from TOML.
//!
//! The default configuration is embedded at compile time; a file given at
//! runtime is parsed the same way and falls back to serde defaults for
//! anything it leaves out.

use std::collections::BTreeSet;
use std::path::Path;

use geoparse_gazetteer_models::config::{GeoparseConfig, RegionOfInterest};

const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Errors from reading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configuration parsed but is not usable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Parses and validates a TOML configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] if the TOML is malformed or fails validation.
pub fn parse_config(toml_str: &str) -> Result<GeoparseConfig, ConfigError> {
    let config: GeoparseConfig = toml::de::from_str(toml_str)?;
    validate(&config)?;
    Ok(config)
}

/// Reads a configuration file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, parsed, or
/// validated.
pub fn load_config(path: &Path) -> Result<GeoparseConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let config = parse_config(&text)?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// The embedded default configuration.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed (it is fixed at compile time
/// and covered by tests).
#[must_use]
pub fn default_config() -> GeoparseConfig {
    parse_config(DEFAULT_CONFIG_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse embedded default.toml: {e}"))
}

fn validate(config: &GeoparseConfig) -> Result<(), ConfigError> {
    let filters = &config.filters;

    let ordered = filters.min_area_km2 >= 0.0 && filters.min_area_km2 <= filters.max_area_km2;
    if !ordered {
        return Err(ConfigError::Invalid(format!(
            "area bounds must satisfy 0 <= min <= max, got [{}, {}]",
            filters.min_area_km2, filters.max_area_km2
        )));
    }

    if filters.context_radius_km.is_nan() || filters.context_radius_km < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "context_radius_km must be non-negative, got {}",
            filters.context_radius_km
        )));
    }

    if let Some(RegionOfInterest::BoundingBox { min, max }) = &filters.region_of_interest
        && min.iter().chain(max).any(|c| !c.is_finite())
    {
        return Err(ConfigError::Invalid(format!(
            "region_of_interest corners must be finite, got {min:?} and {max:?}"
        )));
    }

    if config.uri.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("uri.base_url is empty".to_string()));
    }

    let mut seen = BTreeSet::new();
    for area in &config.focus_areas {
        if !seen.insert(area.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "focus area '{}' is listed twice",
                area.name
            )));
        }
        if let Some((min, max)) = area.loc_id_range
            && min > max
        {
            return Err(ConfigError::Invalid(format!(
                "focus area '{}' has an empty loc_id range ({min}, {max})",
                area.name
            )));
        }
    }

    Ok(())
}
