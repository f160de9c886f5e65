use crate::core::projection::Crs;
use crate::types::{AsterError, AsterResult};
use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{
    Area, BooleanOps, Centroid, Contains, Coord, Geometry, Intersects, Line, LineString,
    MapCoords, Point, Polygon,
};

/// Feature wrapper around a geometry
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self { geometry }
    }
}

/// Area of interest as handed to the pipeline (lon/lat, WGS84)
#[derive(Debug, Clone, PartialEq)]
pub enum AreaOfInterest {
    Polygon(Polygon<f64>),
    Feature(Feature),
}

impl From<Polygon<f64>> for AreaOfInterest {
    fn from(polygon: Polygon<f64>) -> Self {
        AreaOfInterest::Polygon(polygon)
    }
}

impl From<Feature> for AreaOfInterest {
    fn from(feature: Feature) -> Self {
        AreaOfInterest::Feature(feature)
    }
}

fn single_polygon(geometry: &Geometry<f64>) -> AsterResult<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(polygon.clone()),
        Geometry::MultiPolygon(multi) if multi.0.len() == 1 => Ok(multi.0[0].clone()),
        Geometry::Rect(rect) => Ok(rect.to_polygon()),
        Geometry::Triangle(triangle) => Ok(triangle.to_polygon()),
        Geometry::GeometryCollection(collection) if collection.0.len() == 1 => {
            single_polygon(&collection.0[0])
        }
        other => Err(AsterError::InvalidInput(format!(
            "Area of interest must be a single polygon, got {}",
            geometry_kind(other)
        ))),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// First pair of ring edges that cross or overlap, if any
///
/// Edges next to each other on the ring may share their common vertex only.
fn ring_self_intersection(ring: &LineString<f64>) -> Option<(Line<f64>, Line<f64>)> {
    let edges: Vec<Line<f64>> = ring.lines().filter(|l| l.start != l.end).collect();
    let n = edges.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return Some((edges[i], edges[j])),
            }
        }
    }
    None
}

impl AreaOfInterest {
    /// Reduce the input to one validated lon/lat polygon
    pub fn resolve_polygon(&self) -> AsterResult<Polygon<f64>> {
        let polygon = match self {
            AreaOfInterest::Polygon(polygon) => polygon.clone(),
            AreaOfInterest::Feature(feature) => single_polygon(&feature.geometry)?,
        };

        let ring = polygon.exterior();
        let mut distinct: Vec<Coord<f64>> = Vec::new();
        for coord in ring.coords() {
            if !coord.x.is_finite() || !coord.y.is_finite() {
                return Err(AsterError::InvalidInput("Non-finite coordinate in area of interest".to_string()));
            }
            if !(-180.0..=180.0).contains(&coord.x) || !(-90.0..=90.0).contains(&coord.y) {
                return Err(AsterError::InvalidInput(format!(
                    "Coordinate ({}, {}) is not a longitude/latitude pair",
                    coord.x, coord.y
                )));
            }
            if !distinct.contains(coord) {
                distinct.push(*coord);
            }
        }
        if distinct.len() < 3 {
            return Err(AsterError::InvalidInput(format!(
                "Area of interest has {} distinct vertices, need at least 3",
                distinct.len()
            )));
        }
        for ring in std::iter::once(ring).chain(polygon.interiors()) {
            if let Some((a, b)) = ring_self_intersection(ring) {
                return Err(AsterError::InvalidInput(format!(
                    "Area of interest ring intersects itself: edge ({}, {})-({}, {}) crosses ({}, {})-({}, {})",
                    a.start.x, a.start.y, a.end.x, a.end.y, b.start.x, b.start.y, b.end.x, b.end.y
                )));
            }
        }
        Ok(polygon)
    }
}

/// Area of interest resolved once at the pipeline boundary and projected to
/// the UTM zone of its centroid
#[derive(Debug, Clone)]
pub struct ProjectedAoi {
    pub lon_lat: Polygon<f64>,
    /// Centroid (lon, lat)
    pub centroid: (f64, f64),
    pub crs: Crs,
    pub projected: Polygon<f64>,
    /// Area in square meters under `crs`
    pub area: f64,
}

impl ProjectedAoi {
    pub fn new(aoi: &AreaOfInterest) -> AsterResult<Self> {
        let lon_lat = aoi.resolve_polygon()?;
        let centroid = lon_lat.centroid().ok_or_else(|| {
            AsterError::InvalidInput("Area of interest has no centroid".to_string())
        })?;
        let crs = Crs::utm_for(centroid.x(), centroid.y());
        let projected = lon_lat.map_coords(move |c| {
            let (x, y) = crs.from_lon_lat(c.x, c.y);
            Coord { x, y }
        });
        let area = projected.unsigned_area();
        if !(area > 0.0) {
            return Err(AsterError::InvalidInput("Area of interest has zero area".to_string()));
        }

        log::info!(
            "Area of interest: centroid ({:.4}, {:.4}) in {}, area {:.1} m2",
            centroid.x(),
            centroid.y(),
            crs,
            area
        );

        Ok(Self {
            lon_lat,
            centroid: (centroid.x(), centroid.y()),
            crs,
            projected,
            area,
        })
    }

    /// Point given in the AOI projection lies inside the AOI
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.projected.contains(&Point::new(x, y))
    }

    /// Area of `footprint` (AOI projection) that falls inside the AOI
    pub fn overlap_area(&self, footprint: &Polygon<f64>) -> f64 {
        if self.projected.contains(footprint) {
            footprint.unsigned_area()
        } else if self.projected.intersects(footprint) {
            self.projected.intersection(footprint).unsigned_area()
        } else {
            0.0
        }
    }
}
