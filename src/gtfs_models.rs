// Static GTFS data model for the crowd-aware bus backend.
//
// Two tables are read once at startup:
// - stops.txt  (stop_id, stop_name, stop_lat, stop_lon)
// - shapes.txt (shape_id, shape_pt_lat, shape_pt_lon, shape_pt_sequence)
//
// Both catalogs are immutable after load and shared read-only between requests.

use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(rename = "stop_id")]
    pub id: String,
    #[serde(rename = "stop_name")]
    pub name: String,
    #[serde(rename = "stop_lat", deserialize_with = "blank_as_nan")]
    pub lat: f64,
    #[serde(rename = "stop_lon", deserialize_with = "blank_as_nan")]
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShapePoint {
    pub shape_id: String,
    #[serde(rename = "shape_pt_sequence")]
    pub sequence: u32,
    #[serde(rename = "shape_pt_lat", deserialize_with = "blank_as_nan")]
    pub lat: f64,
    #[serde(rename = "shape_pt_lon", deserialize_with = "blank_as_nan")]
    pub lon: f64,
}

// GTFS leaves coordinates blank on entrances and generic nodes (location_type 3/4).
// NaN keeps the row and never matches a proximity test.
fn blank_as_nan<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Stops in file order. Ids are expected to be unique; the catalog does not
/// deduplicate them.
#[derive(Debug, Clone, Default)]
pub struct StopCatalog {
    stops: Vec<Stop>,
}

impl StopCatalog {
    pub fn new(stops: Vec<Stop>) -> Self {
        StopCatalog { stops }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let stops = rdr
            .deserialize::<Stop>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(StopCatalog { stops })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| TransitError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file)
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// First `limit` stops whose name contains `query`, ignoring case.
    pub fn search_by_name(&self, query: &str, limit: usize) -> Vec<&Stop> {
        let needle = query.to_lowercase();
        self.stops
            .iter()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }
}

/// Shape points in file order, all shapes interleaved as they appear in shapes.txt.
#[derive(Debug, Clone, Default)]
pub struct ShapeCatalog {
    points: Vec<ShapePoint>,
}

impl ShapeCatalog {
    pub fn new(points: Vec<ShapePoint>) -> Self {
        ShapeCatalog { points }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let points = rdr
            .deserialize::<ShapePoint>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ShapeCatalog { points })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| TransitError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file)
    }

    pub fn points(&self) -> &[ShapePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points of one shape ordered by sequence. Equal sequences keep file order.
    pub fn shape(&self, shape_id: &str) -> Vec<&ShapePoint> {
        let mut points: Vec<&ShapePoint> = self
            .points
            .iter()
            .filter(|p| p.shape_id == shape_id)
            .collect();
        points.sort_by_key(|p| p.sequence);
        points
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransitNetwork {
    pub stops: StopCatalog,
    pub shapes: ShapeCatalog,
}

impl TransitNetwork {
    pub const STOPS_FILE: &'static str = "stops.txt";
    pub const SHAPES_FILE: &'static str = "shapes.txt";

    /// Loads both tables from `gtfs_dir`. A table that cannot be read is
    /// replaced by an empty catalog so the server can still start.
    pub fn load_or_empty(gtfs_dir: &Path) -> Self {
        let stops_path = gtfs_dir.join(Self::STOPS_FILE);
        let stops = match StopCatalog::load(&stops_path) {
            Ok(stops) => {
                log::info!("   ✓ Loaded {} stops", stops.len());
                stops
            }
            Err(e) => {
                log::warn!("⚠️  Could not load stops ({}), continuing with no stops", e);
                StopCatalog::default()
            }
        };

        let shapes_path = gtfs_dir.join(Self::SHAPES_FILE);
        let shapes = match ShapeCatalog::load(&shapes_path) {
            Ok(shapes) => {
                log::info!("   ✓ Loaded {} shape points", shapes.len());
                shapes
            }
            Err(e) => {
                log::warn!("⚠️  Could not load shapes ({}), routing will be unavailable", e);
                ShapeCatalog::default()
            }
        };

        TransitNetwork { stops, shapes }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("File error: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Malformed start coordinate '{0}', expected \"lat,lon\"")]
    MalformedStart(String),
    #[error("Missing field '{0}'")]
    MissingField(&'static str),
    #[error("Invalid coordinate in '{field}': {value}")]
    InvalidCoordinate { field: &'static str, value: String },
    #[error("Shape catalog has no usable points, no route can be selected")]
    EmptyShapeCatalog,
    #[error("Occupancy state lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, TransitError>;

#[cfg(test)]
mod tests {
    use super::*;

    const STOPS_CSV: &str = "\
stop_id,stop_code,stop_name,stop_lat,stop_lon,zone_id
101,A1,Main Ave,12.9500,77.6000,
102,A2,Market Square,12.9100,77.5900,
103,A3,MAIN avenue North,12.9600,77.6100,
";

    const SHAPES_CSV: &str = "\
shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence
S1,12.90,77.59,1
S1,12.92,77.59,3
S1,12.91,77.59,2
S2,13.00,77.70,1
";

    #[test]
    fn stops_parse_by_header_name() {
        let catalog = StopCatalog::from_reader(STOPS_CSV.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.stops()[0].id, "101");
        assert_eq!(catalog.stops()[1].name, "Market Square");
        assert_eq!(catalog.stops()[2].lon, 77.61);
    }

    #[test]
    fn malformed_stop_row_fails_the_table() {
        let csv = "stop_id,stop_name,stop_lat,stop_lon\n1,A,not-a-number,77.0\n";
        assert!(matches!(
            StopCatalog::from_reader(csv.as_bytes()),
            Err(TransitError::Csv(_))
        ));
    }

    #[test]
    fn blank_coordinates_keep_the_row_as_nan() {
        let csv = "\
stop_id,stop_name,stop_lat,stop_lon,location_type
1,Main Ave,12.9,77.59,0
2,Entrance node,,,3
3,Market Square,12.91,77.60,0
";
        let catalog = StopCatalog::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.stops()[0].lat, 12.9);
        assert!(catalog.stops()[1].lat.is_nan());
        assert!(catalog.stops()[1].lon.is_nan());
        assert_eq!(catalog.stops()[2].id, "3");
    }

    #[test]
    fn blank_shape_coordinates_parse_as_nan() {
        let csv = "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\nS,,,1\nS,1.0,2.0,2\n";
        let catalog = ShapeCatalog::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.points()[0].lat.is_nan());
        assert_eq!(catalog.points()[1].lon, 2.0);
    }

    #[test]
    fn search_is_case_insensitive_and_limited() {
        let catalog = StopCatalog::from_reader(STOPS_CSV.as_bytes()).unwrap();
        let hits = catalog.search_by_name("main", 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "101");
        assert_eq!(hits[1].id, "103");

        assert_eq!(catalog.search_by_name("a", 1).len(), 1);
        assert!(catalog.search_by_name("nowhere", 5).is_empty());
    }

    #[test]
    fn shape_points_are_ordered_by_sequence() {
        let catalog = ShapeCatalog::from_reader(SHAPES_CSV.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 4);
        let seqs: Vec<u32> = catalog.shape("S1").iter().map(|p| p.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(catalog.shape("missing").is_empty());
    }

    #[test]
    fn duplicate_sequences_keep_file_order() {
        let csv = "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
                   S,1.0,1.0,2\nS,2.0,2.0,1\nS,3.0,3.0,2\n";
        let catalog = ShapeCatalog::from_reader(csv.as_bytes()).unwrap();
        let lats: Vec<f64> = catalog.shape("S").iter().map(|p| p.lat).collect();
        assert_eq!(lats, vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn missing_directory_degrades_to_empty_network() {
        let network = TransitNetwork::load_or_empty(Path::new("/nonexistent/gtfs/dir"));
        assert!(network.stops.is_empty());
        assert!(network.shapes.is_empty());
    }
}
