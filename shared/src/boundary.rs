use serde::{Deserialize, Serialize};

/// Static asset path of the area-of-interest polygon.
pub const BOUNDARY_PATH: &str = "/data/east-bay-hills.geojson";

/// A GeoJSON position; extra ordinates (altitude) are ignored.
type Position = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

/// Top-level GeoJSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoJson {
    FeatureCollection(Vec<Feature>),
    Feature(Feature),
    Geometry(Geometry),
}

/// Axis-aligned bounds in lng/lat degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLatBounds {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl LngLatBounds {
    /// `[minX, minY, maxX, maxY]`, the GeoJSON bbox order.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }

    /// Finite on every side and not inverted.
    pub fn is_valid(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
            && self.min_lng <= self.max_lng
            && self.min_lat <= self.max_lat
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lng + self.max_lng) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct BoundsAccumulator {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl BoundsAccumulator {
    const fn new() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, position: &[f64]) {
        let [x, y, ..] = position else {
            return;
        };
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.min_x = self.min_x.min(*x);
        self.min_y = self.min_y.min(*y);
        self.max_x = self.max_x.max(*x);
        self.max_y = self.max_y.max(*y);
    }

    fn push_geometry(&mut self, geometry: &Geometry) {
        match geometry {
            Geometry::Point { coordinates } => self.push(coordinates),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter().for_each(|p| self.push(p));
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().for_each(|p| self.push(p));
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates
                    .iter()
                    .flatten()
                    .flatten()
                    .for_each(|p| self.push(p));
            }
            Geometry::GeometryCollection { geometries } => {
                geometries.iter().for_each(|g| self.push_geometry(g));
            }
        }
    }

    fn finish(self) -> LngLatBounds {
        LngLatBounds {
            min_lng: self.min_x,
            min_lat: self.min_y,
            max_lng: self.max_x,
            max_lat: self.max_y,
        }
    }
}

impl GeoJson {
    pub fn from_value(document: serde_json::Value) -> Result<Self, serde_json::Error> {
        match document.get("type").and_then(serde_json::Value::as_str) {
            Some("FeatureCollection") => {
                let collection: FeatureCollection = serde_json::from_value(document)?;
                Ok(Self::FeatureCollection(collection.features))
            }
            Some("Feature") => serde_json::from_value(document).map(Self::Feature),
            _ => serde_json::from_value(document).map(Self::Geometry),
        }
    }

    /// Bounds over every position in the document. Sides stay infinite when the
    /// document holds no usable position.
    pub fn raw_bounds(&self) -> LngLatBounds {
        let mut acc = BoundsAccumulator::new();
        match self {
            Self::FeatureCollection(features) => features
                .iter()
                .filter_map(|f| f.geometry.as_ref())
                .for_each(|g| acc.push_geometry(g)),
            Self::Feature(feature) => {
                if let Some(geometry) = &feature.geometry {
                    acc.push_geometry(geometry);
                }
            }
            Self::Geometry(geometry) => acc.push_geometry(geometry),
        }
        acc.finish()
    }
}

/// A loaded, validated boundary. Keeps the raw document for handing to the map
/// engine unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    document: serde_json::Value,
    bounds: LngLatBounds,
}

impl Boundary {
    pub fn from_value(document: serde_json::Value) -> Result<Self, String> {
        let parsed = GeoJson::from_value(document.clone())
            .map_err(|e| format!("invalid GeoJSON: {e}"))?;
        let bounds = parsed.raw_bounds();
        if !bounds.is_valid() {
            return Err("boundary has no usable coordinates".into());
        }
        Ok(Self { document, bounds })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let document: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| format!("parse error: {e}"))?;
        Self::from_value(document)
    }

    pub fn document(&self) -> &serde_json::Value {
        &self.document
    }

    pub fn bounds(&self) -> LngLatBounds {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feature_collection_bounds_cover_every_ring() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-122.3, 37.8], [-122.1, 37.8], [-122.1, 37.9], [-122.3, 37.8]]]
                }},
                {"type": "Feature", "properties": {}, "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[-122.0, 37.7, 12.0], [-121.9, 37.75], [-122.0, 37.7]]]]
                }}
            ]
        });
        let boundary = Boundary::from_value(doc).expect("valid boundary");
        assert_eq!(boundary.bounds().to_array(), [-122.3, 37.7, -121.9, 37.9]);
    }

    #[test]
    fn bare_polygon_is_accepted() {
        let doc = json!({
            "type": "Polygon",
            "coordinates": [[[-122.2, 37.8], [-122.1, 37.85], [-122.2, 37.8]]]
        });
        let boundary = Boundary::from_value(doc).expect("valid boundary");
        let (lng, lat) = boundary.bounds().center();
        assert!((lng + 122.15).abs() < 1e-9);
        assert!((lat - 37.825).abs() < 1e-9);
    }

    #[test]
    fn feature_without_geometry_is_rejected() {
        let doc = json!({"type": "Feature", "properties": {}, "geometry": null});
        let err = Boundary::from_value(doc).expect_err("no coordinates");
        assert!(err.contains("no usable coordinates"));
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(Boundary::from_slice(b"<html>404</html>").is_err());
        assert!(Boundary::from_value(json!({"type": "Polygon"})).is_err());
    }

    #[test]
    fn infinite_bounds_are_invalid() {
        let empty = GeoJson::FeatureCollection(Vec::new()).raw_bounds();
        assert!(!empty.is_valid());
        let nan = LngLatBounds {
            min_lng: f64::NAN,
            min_lat: 0.0,
            max_lng: 1.0,
            max_lat: 1.0,
        };
        assert!(!nan.is_valid());
    }
}
