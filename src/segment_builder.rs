// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Turns one day of route legs plus their reservations into segments.
//!
//! Pass 1 builds one segment per leg and aggregates origin boardings.
//! Pass 2 resolves alightings: a rider who boards on leg N of a route may
//! alight on leg N+k, so each reservation's dropoff is matched to the
//! earliest arrival of its route at the dropoff station at or after the
//! boarding leg's departure time.

use crate::field_decode::{
    decode_epoch_ms, decode_flag01, decode_id, decode_int, decode_list, decode_polyline,
};
use crate::models::{EventCounts, ReservationRow, RouteRow, Segment, SegmentEvents, StopEvents};
use ahash::AHashMap;

pub fn build_segments(
    routes: &[RouteRow],
    reservations: &AHashMap<String, ReservationRow>,
) -> Vec<Segment> {
    let mut segments: Vec<Segment> = routes
        .iter()
        .map(|route| build_base_segment(route, reservations))
        .collect();

    attach_alightings(&mut segments, routes, reservations);

    segments
}

fn build_base_segment(
    route: &RouteRow,
    reservations: &AHashMap<String, ReservationRow>,
) -> Segment {
    let dispatch_ids: Vec<String> = decode_list(&route.dispatch_ids)
        .iter()
        .filter_map(decode_id)
        .collect();

    let mut board_passenger = 0i64;
    let mut board_wheelchair = 0i64;
    for dispatch_id in &dispatch_ids {
        let Some(reservation) = reservations.get(dispatch_id) else {
            continue;
        };
        let boards_here = match (&reservation.pickup_station_id, &route.origin_station_id) {
            (Some(pickup), Some(origin)) => pickup == origin,
            _ => false,
        };
        if boards_here {
            board_passenger += decode_int(&reservation.passenger_count, 0);
            board_wheelchair += decode_flag01(&reservation.wheelchair_count);
        }
    }

    // The leg's own vehicle id, unless the dispatcher left it blank.
    let vehicle_id = route
        .vehicle_id
        .clone()
        .filter(|v| !v.is_empty())
        .or_else(|| route.op_vehicle_id.clone());

    let events = SegmentEvents {
        origin: StopEvents {
            board: EventCounts {
                passenger: board_passenger,
                wheelchair: board_wheelchair,
            },
            alight: EventCounts::default(),
        },
        dest: StopEvents::default(),
    };

    Segment {
        route_id: route.route_id.clone(),
        segment_id: format!("{}:{}", route.route_id, route.route_seq),
        operation_id: route.operation_id.clone(),
        vehicle_id,
        vehicle_type: route.vehicle_type.clone(),
        route_info: decode_int(&route.route_info, 0),
        origin_station_id: route.origin_station_id.clone(),
        origin_dept_time: route.origin_dept_time.clone(),
        dest_station_id: route.dest_station_id.clone(),
        dest_dept_time: route.dest_arrival_time.clone(),
        origin_ms: decode_epoch_ms(&route.origin_dept_time),
        dest_ms: decode_epoch_ms(&route.dest_arrival_time),
        polyline: decode_polyline(&route.lon, &route.lat),
        dispatch_ids,
        events,
    }
}

fn attach_alightings(
    segments: &mut [Segment],
    routes: &[RouteRow],
    reservations: &AHashMap<String, ReservationRow>,
) {
    let mut by_route: AHashMap<String, Vec<usize>> = AHashMap::new();
    for (idx, segment) in segments.iter().enumerate() {
        by_route.entry(segment.route_id.clone()).or_default().push(idx);
    }

    for (_route_id, mut leg_indices) in by_route {
        // Deterministic leg order: variant marker, then arrival time;
        // routeSeq breaks ties between legs sharing a destination time.
        leg_indices.sort_by_key(|&idx| {
            (
                segments[idx].route_info,
                segments[idx].dest_ms.unwrap_or(0),
                routes[idx].route_seq,
            )
        });

        let mut arrivals_by_station: AHashMap<String, Vec<(usize, i64)>> = AHashMap::new();
        for &idx in &leg_indices {
            if let Some(station) = segments[idx].dest_station_id.clone() {
                arrivals_by_station
                    .entry(station)
                    .or_default()
                    .push((idx, segments[idx].dest_ms.unwrap_or(0)));
            }
        }

        for &idx in &leg_indices {
            if segments[idx].dispatch_ids.is_empty() {
                continue;
            }
            let Some(origin_ms) = segments[idx].origin_ms else {
                continue;
            };

            let dispatch_ids = segments[idx].dispatch_ids.clone();
            for dispatch_id in &dispatch_ids {
                let Some(reservation) = reservations.get(dispatch_id) else {
                    continue;
                };
                let Some(drop_station) = reservation
                    .dropoff_station_id
                    .as_deref()
                    .filter(|s| !s.is_empty())
                else {
                    continue;
                };
                let Some(candidates) = arrivals_by_station.get(drop_station) else {
                    continue;
                };

                // First arrival at the drop station at or after departure.
                let Some(&(target, _)) = candidates
                    .iter()
                    .find(|&&(_, arrival_ms)| arrival_ms >= origin_ms)
                else {
                    continue;
                };

                let alight = &mut segments[target].events.dest.alight;
                alight.passenger += decode_int(&reservation.passenger_count, 0);
                alight.wheelchair += decode_flag01(&reservation.wheelchair_count);
            }
        }
    }
}
