// Naive single-shape routing: pick the shape passing closest to the
// destination, return its polyline, the stops along it and a fare estimate.

use crate::geo::{self, Coord, NEAR_TOLERANCE_DEG};
use crate::gtfs_models::{Result, Stop, TransitError, TransitNetwork};
use serde::Serialize;
use serde_json::Value;

/// Only every n-th polyline point is tested against stops.
pub const STOP_SCAN_STRIDE: usize = 5;

const DEFAULT_DEST_NAME: &str = "Destination";

const BUS_MIN_FARE: i64 = 15;
const BUS_FARE_PER_KM: f64 = 5.0;
const BUS_MINUTES_PER_KM: f64 = 3.0;
const AUTO_FARE_PER_KM: f64 = 15.0;
const AUTO_DISPLAY_TIME: &str = "3m";

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub start: Coord,
    pub dest: Coord,
    pub dest_name: String,
}

impl RouteRequest {
    /// Reads `start` ("lat,lon"), `dest_lat`, `dest_lon` (number or numeric
    /// string) and the optional `dest_name` from a JSON body.
    pub fn from_json(body: &Value) -> Result<Self> {
        let start = match body.get("start") {
            None | Some(Value::Null) => return Err(TransitError::MissingField("start")),
            Some(Value::String(s)) => parse_start(s)?,
            Some(other) => return Err(TransitError::MalformedStart(other.to_string())),
        };

        let dest_lat = coordinate_field(body, "dest_lat")?;
        let dest_lon = coordinate_field(body, "dest_lon")?;

        let dest_name = body
            .get("dest_name")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_DEST_NAME)
            .to_string();

        Ok(RouteRequest {
            start,
            dest: Coord::new(dest_lat, dest_lon),
            dest_name,
        })
    }
}

fn parse_start(raw: &str) -> Result<Coord> {
    let compact: String = raw.chars().filter(|c| *c != ' ').collect();
    let malformed = || TransitError::MalformedStart(raw.to_string());

    let mut parts = compact.split(',');
    let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let lat: f64 = lat.parse().map_err(|_| malformed())?;
    let lon: f64 = lon.parse().map_err(|_| malformed())?;
    if !lat.is_finite() || !lon.is_finite() {
        return Err(malformed());
    }
    Ok(Coord::new(lat, lon))
}

fn coordinate_field(body: &Value, field: &'static str) -> Result<f64> {
    let value = match body.get(field) {
        None | Some(Value::Null) => return Err(TransitError::MissingField(field)),
        Some(v) => v,
    };
    let invalid = || TransitError::InvalidCoordinate {
        field,
        value: value.to_string(),
    };

    let parsed = match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(invalid())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideOption {
    #[serde(rename = "type")]
    pub kind: String,
    pub price: String,
    pub time: String,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteQuote {
    pub options: Vec<RideOption>,
    pub polyline: Vec<[f64; 2]>,
    pub stops: Vec<Stop>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Found(RouteQuote),
    Failed(String),
}

/// Wire shape for both outcomes. Failures carry empty arrays plus `error`.
#[derive(Debug, Clone, Serialize)]
pub struct RouteResponse {
    pub options: Vec<RideOption>,
    pub polyline: Vec<[f64; 2]>,
    pub stops: Vec<Stop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<RouteOutcome> for RouteResponse {
    fn from(outcome: RouteOutcome) -> Self {
        match outcome {
            RouteOutcome::Found(quote) => RouteResponse {
                options: quote.options,
                polyline: quote.polyline,
                stops: quote.stops,
                error: None,
            },
            RouteOutcome::Failed(error) => RouteResponse {
                options: Vec::new(),
                polyline: Vec::new(),
                stops: Vec::new(),
                error: Some(error),
            },
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

pub struct RouteResolver<'a> {
    network: &'a TransitNetwork,
}

impl<'a> RouteResolver<'a> {
    pub fn new(network: &'a TransitNetwork) -> Self {
        RouteResolver { network }
    }

    /// Parses and resolves a raw request body. Never fails: every error is
    /// folded into `RouteOutcome::Failed`.
    pub fn resolve_json(&self, body: &Value) -> RouteOutcome {
        match RouteRequest::from_json(body).and_then(|req| self.resolve(&req)) {
            Ok(quote) => RouteOutcome::Found(quote),
            Err(e) => {
                log::warn!("⚠️  Routing error: {}", e);
                RouteOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn resolve(&self, request: &RouteRequest) -> Result<RouteQuote> {
        let shape_id = self.nearest_shape_id(request.dest)?;
        let polyline = self.polyline(shape_id);
        let stops = self.stops_along(&polyline);
        let options = fare_options(request);

        log::debug!(
            "Route to {} via shape {}: {} points, {} stops",
            request.dest_name,
            shape_id,
            polyline.len(),
            stops.len()
        );

        Ok(RouteQuote {
            options,
            polyline,
            stops,
        })
    }

    /// Shape of the point closest to `dest` by squared degree distance.
    /// Ties go to the earliest point in catalog order. Points without
    /// usable coordinates are skipped.
    pub fn nearest_shape_id(&self, dest: Coord) -> Result<&'a str> {
        let mut best: Option<(f64, &'a str)> = None;
        for point in self.network.shapes.points() {
            let d = geo::squared_degree_distance(Coord::new(point.lat, point.lon), dest);
            if !d.is_finite() {
                continue;
            }
            match best {
                Some((best_d, _)) if d >= best_d => {}
                _ => best = Some((d, point.shape_id.as_str())),
            }
        }
        best.map(|(_, id)| id).ok_or(TransitError::EmptyShapeCatalog)
    }

    pub fn polyline(&self, shape_id: &str) -> Vec<[f64; 2]> {
        self.network
            .shapes
            .shape(shape_id)
            .into_iter()
            .map(|p| [p.lat, p.lon])
            .collect()
    }

    /// Catalog stops inside the tolerance box of at least one sampled
    /// polyline point, in catalog order.
    pub fn stops_along(&self, polyline: &[[f64; 2]]) -> Vec<Stop> {
        let sampled: Vec<Coord> = polyline
            .iter()
            .step_by(STOP_SCAN_STRIDE)
            .map(|[lat, lon]| Coord::new(*lat, *lon))
            .collect();

        self.network
            .stops
            .stops()
            .iter()
            .filter(|stop| {
                let at = Coord::new(stop.lat, stop.lon);
                sampled
                    .iter()
                    .any(|pt| geo::is_near(at, *pt, NEAR_TOLERANCE_DEG, NEAR_TOLERANCE_DEG))
            })
            .cloned()
            .collect()
    }
}

fn fare_options(request: &RouteRequest) -> Vec<RideOption> {
    let distance = geo::great_circle_distance_km(
        request.start.lat,
        request.start.lon,
        request.dest.lat,
        request.dest.lon,
    );

    let bus_price = BUS_MIN_FARE.max(round_half_even(distance * BUS_FARE_PER_KM));
    let bus_minutes = round_half_even(distance * BUS_MINUTES_PER_KM);
    let auto_price = round_half_even(distance * AUTO_FARE_PER_KM);

    vec![
        RideOption {
            kind: "Bus".to_string(),
            price: format!("₹{}", bus_price),
            time: format!("{}m", bus_minutes),
            info: format!("Route serving {}", request.dest_name),
        },
        RideOption {
            kind: "Auto".to_string(),
            price: format!("₹{}", auto_price),
            time: AUTO_DISPLAY_TIME.to_string(),
            info: "Last-mile sync enabled".to_string(),
        },
    ]
}

fn round_half_even(x: f64) -> i64 {
    x.round_ties_even() as i64
}
