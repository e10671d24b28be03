#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory geometry index for reverse geocoding.
//!
//! Parses gazetteer WKT geometries once at startup, aggregates rows that
//! share an identifier, and builds an R-tree over their envelopes. Point
//! (or geometry) containment queries use the R-tree as a prefilter and
//! then test each candidate exactly.

use std::collections::BTreeMap;

use geo::{
    BooleanOps, BoundingRect, Centroid, ChamberlainDuquetteArea, Contains, Distance, Geometry,
    GeometryCollection, Haversine, MultiPolygon, Point, Polygon, Relate,
};
use geoparse_gazetteer_models::OsmId;
use rstar::{AABB, RTree, RTreeObject};
use wkt::{ToWkt, TryFromWkt};

/// Errors from geometry parsing and spatial queries.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// WKT text could not be parsed into a geometry.
    #[error("Failed to parse WKT geometry '{wkt}': {message}")]
    GeometryParse {
        /// The offending WKT (truncated).
        wkt: String,
        /// Parser message.
        message: String,
    },
}

/// Parses OGC well-known text into a geometry.
///
/// # Errors
///
/// Returns [`SpatialError::GeometryParse`] if the text is not valid WKT or
/// describes a geometry that has no `geo` representation (e.g. `POINT
/// EMPTY`).
pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>, SpatialError> {
    Geometry::<f64>::try_from_wkt_str(wkt).map_err(|e| SpatialError::GeometryParse {
        wkt: wkt.chars().take(80).collect(),
        message: e.to_string(),
    })
}

/// Formats a geometry as well-known text.
#[must_use]
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

/// Great-circle distance between two lon/lat points, in kilometres.
#[must_use]
pub fn distance_km(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b) / 1000.0
}

/// A parsed geometry with the derived values the filters need.
#[derive(Debug, Clone)]
pub struct IndexedGeometry {
    geometry: Geometry<f64>,
    centroid: Option<Point<f64>>,
    area_km2: f64,
    areal: bool,
}

impl IndexedGeometry {
    fn new(geometry: Geometry<f64>) -> Self {
        let centroid = geometry.centroid();
        let area_km2 = polygonal_area_km2(&geometry);
        let areal = is_areal(&geometry);
        Self {
            geometry,
            centroid,
            area_km2,
            areal,
        }
    }

    /// The (possibly aggregated) geometry.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    /// Centroid, or `None` for an empty geometry.
    #[must_use]
    pub const fn centroid(&self) -> Option<Point<f64>> {
        self.centroid
    }

    /// Spherical area of the polygonal parts, in km². Overlapping parts
    /// are counted once.
    #[must_use]
    pub const fn area_km2(&self) -> f64 {
        self.area_km2
    }

    /// Whether any part is polygonal.
    #[must_use]
    pub const fn is_areal(&self) -> bool {
        self.areal
    }

    /// Whether any part of this geometry contains `query`.
    #[must_use]
    pub fn contains(&self, query: &Geometry<f64>) -> bool {
        part_contains(&self.geometry, query)
    }

    /// Well-known text of the geometry.
    #[must_use]
    pub fn to_wkt(&self) -> String {
        to_wkt(&self.geometry)
    }
}

/// A geometry that was left out of the index.
#[derive(Debug, Clone)]
pub struct SkippedGeometry {
    /// Identifier of the row whose geometry failed.
    pub osm_id: OsmId,
    /// Why it was skipped.
    pub reason: String,
}

/// Envelope entry stored in the R-tree; the geometry itself lives in the
/// ordered map so iteration stays deterministic.
struct EnvelopeEntry {
    osm_id: OsmId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for EnvelopeEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Identifier → geometry index with R-tree containment lookups.
///
/// Built once and read-only afterwards, so it can be shared across
/// threads without locking.
pub struct GeometryIndex {
    entries: BTreeMap<OsmId, IndexedGeometry>,
    tree: RTree<EnvelopeEntry>,
    skipped: Vec<SkippedGeometry>,
}

impl std::fmt::Debug for GeometryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryIndex")
            .field("geometries", &self.entries.len())
            .field("skipped", &self.skipped.len())
            .finish_non_exhaustive()
    }
}

impl GeometryIndex {
    /// Builds the index from `(identifier, wkt)` pairs.
    ///
    /// Rows sharing an identifier are aggregated into one
    /// `GeometryCollection`. Geometries that fail to parse are logged,
    /// recorded in [`Self::skipped`], and excluded.
    pub fn build<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (OsmId, S)>,
        S: AsRef<str>,
    {
        let mut parts: BTreeMap<OsmId, Vec<Geometry<f64>>> = BTreeMap::new();
        let mut skipped = Vec::new();

        for (osm_id, wkt) in rows {
            match parse_wkt(wkt.as_ref()) {
                Ok(geometry) => parts.entry(osm_id).or_default().push(geometry),
                Err(e) => {
                    log::warn!("Skipping geometry for {osm_id}: {e}");
                    skipped.push(SkippedGeometry {
                        osm_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let entries: BTreeMap<OsmId, IndexedGeometry> = parts
            .into_iter()
            .map(|(osm_id, mut geometries)| {
                let geometry = if geometries.len() == 1 {
                    geometries.remove(0)
                } else {
                    let collection: GeometryCollection<f64> = geometries.into_iter().collect();
                    Geometry::GeometryCollection(collection)
                };
                (osm_id, IndexedGeometry::new(geometry))
            })
            .collect();

        let envelopes: Vec<EnvelopeEntry> = entries
            .iter()
            .filter_map(|(osm_id, indexed)| {
                compute_envelope(&indexed.geometry).map(|envelope| EnvelopeEntry {
                    osm_id: osm_id.clone(),
                    envelope,
                })
            })
            .collect();

        let tree = RTree::bulk_load(envelopes);

        log::info!(
            "Indexed {} geometries ({} skipped)",
            entries.len(),
            skipped.len()
        );

        Self {
            entries,
            tree,
            skipped,
        }
    }

    /// Number of indexed identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the geometry of an identifier.
    #[must_use]
    pub fn get(&self, osm_id: &OsmId) -> Option<&IndexedGeometry> {
        self.entries.get(osm_id)
    }

    /// Indexed identifiers in order.
    pub fn ids(&self) -> impl Iterator<Item = &OsmId> {
        self.entries.keys()
    }

    /// Geometries excluded at build time.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedGeometry] {
        &self.skipped
    }

    /// Returns every identifier whose geometry contains `query`.
    ///
    /// An empty result means the query lies outside all indexed regions.
    #[must_use]
    pub fn reverse_geocode(&self, query: &Geometry<f64>) -> Vec<OsmId> {
        let Some(query_env) = compute_envelope(query) else {
            return Vec::new();
        };

        let mut found: Vec<OsmId> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| {
                self.entries
                    .get(&entry.osm_id)
                    .is_some_and(|indexed| indexed.contains(query))
            })
            .map(|entry| entry.osm_id.clone())
            .collect();

        found.sort();
        found.dedup();
        found
    }

    /// [`Self::reverse_geocode`] for a WKT query.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeometryParse`] if the query is not valid WKT.
    pub fn reverse_geocode_wkt(&self, wkt: &str) -> Result<Vec<OsmId>, SpatialError> {
        let query = parse_wkt(wkt)?;
        Ok(self.reverse_geocode(&query))
    }

    /// Reverse geocodes a batch of WKT queries, one result per query.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeometryParse`] for the first query that is
    /// not valid WKT.
    pub fn reverse_geocode_all<S: AsRef<str>>(
        &self,
        queries: &[S],
    ) -> Result<Vec<Vec<OsmId>>, SpatialError> {
        queries
            .iter()
            .map(|q| self.reverse_geocode_wkt(q.as_ref()))
            .collect()
    }

    /// Whether the geometry indexed for `osm_id` contains `point`.
    ///
    /// Returns `false` when the identifier has no indexed geometry.
    #[must_use]
    pub fn contains(&self, osm_id: &OsmId, point: Point<f64>) -> bool {
        self.entries
            .get(osm_id)
            .is_some_and(|indexed| indexed.contains(&Geometry::Point(point)))
    }
}

/// Containment of `query` by one (possibly multi-part) geometry: true if
/// any part contains it.
fn part_contains(part: &Geometry<f64>, query: &Geometry<f64>) -> bool {
    match part {
        Geometry::GeometryCollection(collection) => {
            collection.iter().any(|p| part_contains(p, query))
        }
        Geometry::MultiPolygon(multi) => multi.iter().any(|p| polygon_contains(p, query)),
        Geometry::Polygon(polygon) => polygon_contains(polygon, query),
        _ => part.relate(query).is_contains(),
    }
}

fn polygon_contains(polygon: &Polygon<f64>, query: &Geometry<f64>) -> bool {
    match query {
        Geometry::Point(point) => polygon.contains(point),
        _ => polygon.relate(query).is_contains(),
    }
}

/// Area of an aggregated geometry. Rows that share an identifier often
/// repeat the same polygon (admin and poly tables), so collection parts are
/// unioned before measuring.
fn polygonal_area_km2(geometry: &Geometry<f64>) -> f64 {
    let Geometry::GeometryCollection(collection) = geometry else {
        return geometry.chamberlain_duquette_unsigned_area() / 1_000_000.0;
    };

    let mut polygons = Vec::new();
    for part in collection {
        collect_polygons(part, &mut polygons);
    }

    let merged = polygons
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, polygon| {
            acc.union(&MultiPolygon::new(vec![polygon]))
        });

    merged.chamberlain_duquette_unsigned_area() / 1_000_000.0
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => out.push(polygon.clone()),
        Geometry::MultiPolygon(multi) => out.extend(multi.iter().cloned()),
        Geometry::Rect(rect) => out.push(rect.to_polygon()),
        Geometry::Triangle(triangle) => out.push(triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for part in collection {
                collect_polygons(part, out);
            }
        }
        _ => {}
    }
}

fn is_areal(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => true,
        Geometry::GeometryCollection(collection) => collection.iter().any(is_areal),
        _ => false,
    }
}

/// Compute the bounding box envelope of a geometry, or `None` if empty.
fn compute_envelope(geometry: &Geometry<f64>) -> Option<AABB<[f64; 2]>> {
    geometry.bounding_rect().map(|rect| {
        AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
    })
}
