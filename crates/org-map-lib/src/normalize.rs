//! Point normalization from heterogeneous raw records
//!
//! Directory rows arrive with inconsistent field names (`latitude`, `Lat`, `lng`, ...).
//! Each logical field is read from an explicit, prioritized list of source keys and the
//! result is a fixed-shape [`Point`]. Records without usable coordinates are dropped
//! silently since partial datasets are expected.

use crate::Point;
use rayon::prelude::*;
use serde_json::{Map, Value};

/// Source keys for each logical field, in priority order
pub mod keys {
    pub const ORG_ID: &[&str] = &["orgId", "OrgId", "OrgID", "org_id", "id"];
    pub const ORG_NAME: &[&str] = &["orgName", "OrgName", "org_name", "name", "Name"];
    pub const SALES_REGION: &[&str] = &[
        "salesRegion",
        "SalesRegion",
        "sales_region",
        "region",
        "Region",
    ];
    pub const COUNTRY_NAME: &[&str] = &[
        "countryName",
        "CountryName",
        "country_name",
        "country",
        "Country",
    ];
    pub const CITY: &[&str] = &["city", "City", "cityName", "CityName"];
    pub const LATITUDE: &[&str] = &["latitude", "Latitude", "LATITUDE", "lat", "Lat", "LAT"];
    pub const LONGITUDE: &[&str] = &[
        "longitude",
        "Longitude",
        "LONGITUDE",
        "lng",
        "Lng",
        "lon",
        "Lon",
        "LON",
        "long",
    ];
    pub const IS_HQ: &[&str] = &["isHQ", "IsHQ", "isHq", "is_hq", "hq", "HQ"];
    pub const LOCATION_ID: &[&str] = &["locationId", "LocationId", "LocationID", "location_id"];
}

/// Result of normalizing a batch of raw records
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Points in input order
    pub points: Vec<Point>,
    /// Number of records dropped for missing or invalid coordinates
    pub dropped: usize,
}

/// Normalize a batch of raw records into points
///
/// Order is preserved. Non-object records and records without a finite
/// latitude/longitude are skipped.
pub fn normalize_records(records: &[Value]) -> Normalized {
    #[cfg(feature = "profiling")]
    profiling::scope!("normalize::normalize_records");

    let points: Vec<Point> = records
        .par_iter()
        .filter_map(|record| record.as_object().and_then(normalize_record))
        .collect();

    let dropped = records.len() - points.len();
    if dropped > 0 {
        tracing::debug!(
            "Dropped {} of {} records without usable coordinates",
            dropped,
            records.len()
        );
    }

    Normalized { points, dropped }
}

/// Normalize a single record, returning `None` if it has no usable coordinates
pub fn normalize_record(record: &Map<String, Value>) -> Option<Point> {
    let latitude = first_value(record, keys::LATITUDE).and_then(coerce_coordinate)?;
    let longitude = first_value(record, keys::LONGITUDE).and_then(coerce_coordinate)?;

    Some(Point {
        org_id: first_string(record, keys::ORG_ID).unwrap_or_default(),
        org_name: first_string(record, keys::ORG_NAME).unwrap_or_default(),
        sales_region: first_string(record, keys::SALES_REGION).unwrap_or_default(),
        country_name: first_string(record, keys::COUNTRY_NAME).unwrap_or_default(),
        city: first_string(record, keys::CITY).filter(|city| !city.trim().is_empty()),
        latitude,
        longitude,
        is_hq: first_value(record, keys::IS_HQ).is_some_and(coerce_flag),
        location_id: first_string(record, keys::LOCATION_ID).filter(|id| !id.is_empty()),
    })
}

/// First non-null value among `keys`
fn first_value<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

/// First value among `keys` that can be read as text
fn first_string(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(coerce_string)
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numbers and numeric strings, finite only
fn coerce_coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// `true`, `1`, and the strings "true"/"1"/"yes" (any case) are truthy
fn coerce_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_basic_record() {
        let record = json!({
            "orgId": 12,
            "orgName": "Acme",
            "salesRegion": "NA",
            "countryName": "US",
            "city": "Austin",
            "latitude": 30.27,
            "longitude": -97.74,
            "isHQ": true,
            "locationId": "L-1"
        });
        let point = normalize_record(record.as_object().unwrap()).unwrap();
        assert_eq!(point.org_id, "12");
        assert_eq!(point.org_name, "Acme");
        assert_eq!(point.city.as_deref(), Some("Austin"));
        assert_eq!(point.latitude, 30.27);
        assert_eq!(point.longitude, -97.74);
        assert!(point.is_hq);
        assert_eq!(point.location_id.as_deref(), Some("L-1"));
    }

    #[test]
    fn test_normalize_key_variants() {
        let record = json!({
            "OrgID": "a",
            "name": "Beta",
            "Lat": "48.85",
            "lng": "2.35",
            "HQ": "YES",
            "location_id": 991
        });
        let point = normalize_record(record.as_object().unwrap()).unwrap();
        assert_eq!(point.org_id, "a");
        assert_eq!(point.org_name, "Beta");
        assert_eq!(point.latitude, 48.85);
        assert_eq!(point.longitude, 2.35);
        assert!(point.is_hq);
        assert_eq!(point.location_id.as_deref(), Some("991"));
        assert_eq!(point.city, None);
    }

    #[test]
    fn test_key_priority() {
        // `latitude` outranks `lat`
        let record = json!({ "lat": 1.0, "latitude": 2.0, "lon": 3.0 });
        let point = normalize_record(record.as_object().unwrap()).unwrap();
        assert_eq!(point.latitude, 2.0);
    }

    #[test]
    fn test_null_falls_through_to_next_key() {
        let record = json!({ "latitude": null, "lat": 5.0, "longitude": 6.0 });
        let point = normalize_record(record.as_object().unwrap()).unwrap();
        assert_eq!(point.latitude, 5.0);
    }

    #[test]
    fn test_drops_invalid_coordinates() {
        let records = vec![
            json!({ "latitude": 1.0, "longitude": 1.0 }),
            json!({ "latitude": "abc", "longitude": 1.0 }),
            json!({ "longitude": 1.0 }),
            json!({ "latitude": 1.0, "longitude": "NaN" }),
            json!({ "latitude": 1.0, "longitude": "inf" }),
            json!("not an object"),
            json!({ "Latitude": " 3.5 ", "Longitude": "-4" }),
        ];
        let normalized = normalize_records(&records);
        assert_eq!(normalized.points.len(), 2);
        assert_eq!(normalized.dropped, 5);
        assert_eq!(normalized.points[1].latitude, 3.5);
        assert_eq!(normalized.points[1].longitude, -4.0);
    }

    #[test]
    fn test_hq_coercion() {
        let cases = [
            (json!(true), true),
            (json!(false), false),
            (json!(1), true),
            (json!(1.0), true),
            (json!(0), false),
            (json!(2), false),
            (json!("true"), true),
            (json!("TRUE"), true),
            (json!("1"), true),
            (json!("Yes"), true),
            (json!("no"), false),
            (json!("y"), false),
            (json!(null), false),
        ];
        for (value, expected) in cases {
            let record = json!({ "lat": 0.0, "lon": 0.0, "isHQ": value });
            let point = normalize_record(record.as_object().unwrap()).unwrap();
            assert_eq!(point.is_hq, expected, "isHQ = {value}");
        }
    }

    #[test]
    fn test_empty_location_id_is_no_identity() {
        let record = json!({ "lat": 0.0, "lon": 0.0, "locationId": "" });
        let point = normalize_record(record.as_object().unwrap()).unwrap();
        assert_eq!(point.location_id, None);
        assert_eq!(point.stable_id(), None);
    }

    #[test]
    fn test_blank_city_is_unknown() {
        let record = json!({ "lat": 0.0, "lon": 0.0, "city": "  " });
        let point = normalize_record(record.as_object().unwrap()).unwrap();
        assert_eq!(point.city, None);
    }
}
