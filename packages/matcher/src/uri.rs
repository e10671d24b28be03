//! Canonical OSM URIs for resolved locations.

use geoparse_gazetteer_models::{OsmId, UriConfig};
use strum_macros::{AsRefStr, Display};

/// OSM element kind used in the URI path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    /// Infers the element kind: a negative first id is a relation, a
    /// point geometry is a node, anything else is a way.
    #[must_use]
    pub fn infer(osm_id: &OsmId, geometry_wkt: &str) -> Self {
        if osm_id.is_relation() {
            Self::Relation
        } else if is_point_wkt(geometry_wkt) {
            Self::Node
        } else {
            Self::Way
        }
    }
}

/// `{base_url}/{node|way|relation}/{id}` for the first id of `osm_id`.
#[must_use]
pub fn osm_uri(osm_id: &OsmId, geometry_wkt: &str, config: &UriConfig) -> String {
    let kind = ElementKind::infer(osm_id, geometry_wkt);
    format!(
        "{}/{kind}/{}",
        config.base_url.trim_end_matches('/'),
        osm_id.primary().unsigned_abs()
    )
}

fn is_point_wkt(wkt: &str) -> bool {
    let keyword: String = wkt
        .trim_start()
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    keyword.eq_ignore_ascii_case("point") || keyword.eq_ignore_ascii_case("multipoint")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_ids_are_relations() {
        assert_eq!(
            osm_uri(
                &OsmId::single(-65606),
                "MULTIPOLYGON(((0 0,1 0,1 1,0 0)))",
                &UriConfig::default()
            ),
            "http://www.openstreetmap.org/relation/65606"
        );
    }

    #[test]
    fn points_are_nodes_and_other_shapes_are_ways() {
        let config = UriConfig::default();
        assert_eq!(
            osm_uri(&OsmId::single(26_847_709), " point (-1.4 50.9)", &config),
            "http://www.openstreetmap.org/node/26847709"
        );
        assert_eq!(
            osm_uri(&OsmId::single(4_321), "LINESTRING(0 0,1 1)", &config),
            "http://www.openstreetmap.org/way/4321"
        );
    }

    #[test]
    fn composite_ids_use_the_first_id() {
        let id = OsmId::new(vec![101, 102]).unwrap();
        let config = UriConfig {
            base_url: "https://osm.example/".to_string(),
        };
        assert_eq!(
            osm_uri(&id, "POLYGON((0 0,1 0,1 1,0 0))", &config),
            "https://osm.example/way/101"
        );
    }
}
