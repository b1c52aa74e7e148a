//! MySQL implementation of [`DispatchSource`]. The store's columns are
//! loosely typed, so everything non-structural is pulled out as CHAR or
//! UNSIGNED and handed to the field decoders untouched.

use crate::models::{ReservationRow, RouteRow};
use crate::source::DispatchSource;
use ahash::AHashMap;
use serde_json::Value;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySqlPool, Row};

pub async fn make_mysql_pool(database_url: &str) -> anyhow::Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct MysqlDispatchDb {
    pool: MySqlPool,
}

impl MysqlDispatchDb {
    pub fn new(pool: MySqlPool) -> MysqlDispatchDb {
        MysqlDispatchDb { pool }
    }
}

// destArrivalTime keeps its historical alias destDeptTime all the way to the
// serialized segment.
const ROUTES_FOR_DAY_SQL: &str = "
SELECT
    CAST(r.routeID AS CHAR)             AS routeID,
    CAST(r.routeSeq AS UNSIGNED)        AS routeSeq,
    CAST(r.operationID AS CHAR)         AS operationID,
    CAST(r.vehicleID AS CHAR)           AS vehicleID,
    CAST(r.routeInfo AS CHAR)           AS routeInfo,
    CAST(r.originStationID AS CHAR)     AS originStationID,
    CAST(r.originDeptTime AS UNSIGNED)  AS originDeptTime,
    CAST(r.destStationID AS CHAR)       AS destStationID,
    CAST(r.destArrivalTime AS UNSIGNED) AS destDeptTime,
    CAST(r.dispatchIDs AS CHAR)         AS dispatchIDs,
    CAST(r.lon AS CHAR)                 AS lon,
    CAST(r.lat AS CHAR)                 AS lat,

    CAST(o.VehicleType AS CHAR)         AS vehicleType,
    CAST(o.vehicleID AS CHAR)           AS op_vehicleID

FROM route r
JOIN operation o
  ON o.operationID = r.operationID
 AND o.vehicleID   = r.vehicleID
WHERE CAST(r.originDeptTime AS UNSIGNED) BETWEEN ? AND ?
ORDER BY r.operationID, r.routeInfo, r.routeSeq
LIMIT 200000
";

const RESERVATIONS_SQL_PREFIX: &str = "
SELECT
    CAST(dispatchID AS CHAR)        AS dispatchID,
    CAST(passengerCount AS CHAR)    AS passengerCount,
    CAST(wheelchairCount AS CHAR)   AS wheelchairCount,
    CAST(pickupStationID AS CHAR)   AS pickupStationID,
    CAST(dropoffStationID AS CHAR)  AS dropoffStationID
FROM reservation_request
WHERE dispatchID IN (";

fn opt_u64_value(raw: Option<u64>) -> Value {
    match raw {
        Some(n) => Value::from(n),
        None => Value::Null,
    }
}

fn opt_text_value(raw: Option<String>) -> Value {
    match raw {
        Some(text) => Value::String(text),
        None => Value::Null,
    }
}

impl DispatchSource for MysqlDispatchDb {
    async fn routes_for_day(&self, day: u32) -> anyhow::Result<Vec<RouteRow>> {
        // Departure times are day-prefixed YYYYMMDDHHMM numbers.
        let window_start: u64 = day as u64 * 10_000;
        let window_end: u64 = day as u64 * 10_000 + 2359;

        let rows = sqlx::query(ROUTES_FOR_DAY_SQL)
            .bind(window_start)
            .bind(window_end)
            .fetch_all(&self.pool)
            .await?;

        let mut routes = Vec::with_capacity(rows.len());
        for row in rows {
            routes.push(RouteRow {
                route_id: row
                    .try_get::<Option<String>, _>("routeID")?
                    .unwrap_or_default(),
                route_seq: row.try_get::<Option<u64>, _>("routeSeq")?.unwrap_or(0) as i64,
                operation_id: row
                    .try_get::<Option<String>, _>("operationID")?
                    .unwrap_or_default(),
                vehicle_id: row.try_get("vehicleID")?,
                route_info: opt_text_value(row.try_get("routeInfo")?),
                origin_station_id: row.try_get("originStationID")?,
                origin_dept_time: opt_u64_value(row.try_get("originDeptTime")?),
                dest_station_id: row.try_get("destStationID")?,
                dest_arrival_time: opt_u64_value(row.try_get("destDeptTime")?),
                dispatch_ids: opt_text_value(row.try_get("dispatchIDs")?),
                lon: opt_text_value(row.try_get("lon")?),
                lat: opt_text_value(row.try_get("lat")?),
                vehicle_type: row.try_get("vehicleType")?,
                op_vehicle_id: row.try_get("op_vehicleID")?,
            });
        }
        Ok(routes)
    }

    async fn reservations_by_dispatch(
        &self,
        dispatch_ids: &[String],
    ) -> anyhow::Result<AHashMap<String, ReservationRow>> {
        if dispatch_ids.is_empty() {
            return Ok(AHashMap::new());
        }

        let placeholders = vec!["?"; dispatch_ids.len()].join(",");
        let sql = format!("{}{})", RESERVATIONS_SQL_PREFIX, placeholders);

        let mut query = sqlx::query(&sql);
        for dispatch_id in dispatch_ids {
            query = query.bind(dispatch_id.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut reservations = AHashMap::with_capacity(rows.len());
        for row in rows {
            let Some(dispatch_id) = row.try_get::<Option<String>, _>("dispatchID")? else {
                continue;
            };
            reservations.insert(
                dispatch_id.clone(),
                ReservationRow {
                    dispatch_id,
                    passenger_count: opt_text_value(row.try_get("passengerCount")?),
                    wheelchair_count: opt_text_value(row.try_get("wheelchairCount")?),
                    pickup_station_id: row.try_get("pickupStationID")?,
                    dropoff_station_id: row.try_get("dropoffStationID")?,
                },
            );
        }
        Ok(reservations)
    }
}
