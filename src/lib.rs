// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::arc_with_non_send_sync,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_unit_value,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::bytes_nth,
    clippy::deprecated_clippy_cfg_attr,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

pub mod dispatch_db;
pub mod field_decode;
pub mod live_cache;
pub mod models;
pub mod replay_cache;
pub mod segment_builder;
pub mod source;

use chrono::Datelike;
use chrono::NaiveDate;
use chrono::Utc;
use chrono_tz::Tz;
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

/// Civil time zone of the dispatch deployment. Day windows and the
/// calendar-shaped timestamps in the store are local to this zone.
pub const DISPATCH_TZ: Tz = chrono_tz::Asia::Seoul;

pub fn duration_since_unix_epoch() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap()
}

/// Current service day in the dispatch zone, as a YYYYMMDD number.
pub fn today_yyyymmdd() -> u32 {
    let today = Utc::now().with_timezone(&DISPATCH_TZ).date_naive();
    today.year() as u32 * 10_000 + today.month() * 100 + today.day()
}

/// "2025-07-29" -> 20250729. Malformed dates error out of the replay build.
pub fn date_to_yyyymmdd(date_str: &str) -> anyhow::Result<u32> {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")?;
    Ok(date.year() as u32 * 10_000 + date.month() * 100 + date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_to_yyyymmdd() {
        assert_eq!(date_to_yyyymmdd("2025-07-29").unwrap(), 20250729);
        assert_eq!(date_to_yyyymmdd("2026-01-02").unwrap(), 20260102);
    }

    #[test]
    fn test_date_to_yyyymmdd_rejects_garbage() {
        assert!(date_to_yyyymmdd("").is_err());
        assert!(date_to_yyyymmdd("20250729").is_err());
        assert!(date_to_yyyymmdd("2025-13-01").is_err());
    }
}
