// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use crate::duration_since_unix_epoch;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One route leg as the store returns it, vehicle type already joined in.
/// Loose columns stay `serde_json::Value` until they cross the field-decode
/// boundary; nothing downstream of the segment builder sees them raw.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteRow {
    pub route_id: String,
    pub route_seq: i64,
    pub operation_id: String,
    pub vehicle_id: Option<String>,
    pub route_info: Value,
    pub origin_station_id: Option<String>,
    pub origin_dept_time: Value,
    pub dest_station_id: Option<String>,
    pub dest_arrival_time: Value,
    pub dispatch_ids: Value,
    pub lon: Value,
    pub lat: Value,
    pub vehicle_type: Option<String>,
    pub op_vehicle_id: Option<String>,
}

/// One reservation row, keyed by dispatch id. The store returns at most one
/// row per dispatch id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReservationRow {
    pub dispatch_id: String,
    pub passenger_count: Value,
    pub wheelchair_count: Value,
    pub pickup_station_id: Option<String>,
    pub dropoff_station_id: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EventCounts {
    pub passenger: i64,
    pub wheelchair: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StopEvents {
    pub board: EventCounts,
    pub alight: EventCounts,
}

/// Boarding/alighting counters for both ends of a leg. The dest.board and
/// origin.alight counters stay zero; the shape is kept full so the
/// downstream adapter never has to null-check.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SegmentEvents {
    pub origin: StopEvents,
    pub dest: StopEvents,
}

/// The derived output unit, one per (route id, route sequence). Serialized
/// field names are frozen: the deck.gl adapter on the other side keys off
/// them by name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    #[serde(rename = "routeID")]
    pub route_id: String,
    pub segment_id: String,
    #[serde(rename = "operationID")]
    pub operation_id: String,
    #[serde(rename = "vehicleID")]
    pub vehicle_id: Option<String>,
    #[serde(rename = "vehicleType")]
    pub vehicle_type: Option<String>,
    #[serde(rename = "routeInfo")]
    pub route_info: i64,
    #[serde(rename = "originStationID")]
    pub origin_station_id: Option<String>,
    #[serde(rename = "originDeptTime")]
    pub origin_dept_time: Value,
    #[serde(rename = "destStationID")]
    pub dest_station_id: Option<String>,
    #[serde(rename = "destDeptTime")]
    pub dest_dept_time: Value,
    #[serde(rename = "originMs")]
    pub origin_ms: Option<i64>,
    #[serde(rename = "destMs")]
    pub dest_ms: Option<i64>,
    pub polyline: Vec<[f64; 2]>,
    #[serde(rename = "dispatchIDs")]
    pub dispatch_ids: Vec<String>,
    pub events: SegmentEvents,
}

/// A versioned bundle of one day's segments, either the continuously
/// refreshed live view or a memoized replay of a past day.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub ok: bool,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub day: Option<u32>,
    pub routes: usize,
    #[serde(rename = "segmentsCount")]
    pub segments_count: usize,
    #[serde(rename = "updatedAtMs")]
    pub updated_at_ms: Option<u64>,
    pub segments: Vec<Segment>,
}

impl Snapshot {
    /// The live slot before any refresh has completed.
    pub fn cold_live() -> Snapshot {
        Snapshot {
            ok: true,
            mode: String::from("live"),
            date: None,
            day: None,
            routes: 0,
            segments_count: 0,
            updated_at_ms: None,
            segments: Vec::new(),
        }
    }

    pub fn live(day: u32, route_count: usize, segments: Vec<Segment>) -> Snapshot {
        Snapshot {
            ok: true,
            mode: String::from("live"),
            date: None,
            day: Some(day),
            routes: route_count,
            segments_count: segments.len(),
            updated_at_ms: Some(duration_since_unix_epoch().as_millis() as u64),
            segments,
        }
    }

    pub fn replay(date: &str, day: u32, route_count: usize, segments: Vec<Segment>) -> Snapshot {
        Snapshot {
            ok: true,
            mode: String::from("replay"),
            date: Some(date.to_string()),
            day: Some(day),
            routes: route_count,
            segments_count: segments.len(),
            updated_at_ms: Some(duration_since_unix_epoch().as_millis() as u64),
            segments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // The adapter on the consumer side looks fields up by name; renames here
    // are wire breaks.
    #[test]
    fn test_segment_serializes_with_frozen_field_names() {
        let segment = Segment {
            route_id: "R1".to_string(),
            segment_id: "R1:1".to_string(),
            operation_id: "OP1".to_string(),
            vehicle_id: Some("V1".to_string()),
            vehicle_type: Some("VAN".to_string()),
            route_info: 0,
            origin_station_id: Some("A".to_string()),
            origin_dept_time: json!(202602050930u64),
            dest_station_id: Some("B".to_string()),
            dest_dept_time: json!(202602051000u64),
            origin_ms: Some(1),
            dest_ms: Some(2),
            polyline: vec![[126.97, 37.56], [126.98, 37.57]],
            dispatch_ids: vec!["D1".to_string()],
            events: SegmentEvents::default(),
        };

        let value = serde_json::to_value(&segment).unwrap();
        for key in [
            "routeID",
            "segment_id",
            "operationID",
            "vehicleID",
            "vehicleType",
            "routeInfo",
            "originStationID",
            "originDeptTime",
            "destStationID",
            "destDeptTime",
            "originMs",
            "destMs",
            "polyline",
            "dispatchIDs",
            "events",
        ] {
            assert!(value.get(key).is_some(), "missing field {}", key);
        }
        assert!(value["events"]["origin"]["board"].get("passenger").is_some());
        assert!(value["events"]["dest"]["alight"].get("wheelchair").is_some());
    }

    #[test]
    fn test_snapshot_serialized_shape() {
        let cold = serde_json::to_value(Snapshot::cold_live()).unwrap();
        assert_eq!(cold["ok"], json!(true));
        assert_eq!(cold["mode"], json!("live"));
        assert_eq!(cold["segmentsCount"], json!(0));
        assert_eq!(cold["updatedAtMs"], Value::Null);
        // "date" only appears on replay snapshots.
        assert!(cold.get("date").is_none());

        let replay = serde_json::to_value(Snapshot::replay("2025-07-29", 20250729, 0, Vec::new()))
            .unwrap();
        assert_eq!(replay["mode"], json!("replay"));
        assert_eq!(replay["date"], json!("2025-07-29"));
        assert_eq!(replay["day"], json!(20250729));
    }
}
