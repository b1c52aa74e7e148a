//! The seam between the segment pipeline and the dispatch store. Live and
//! replay builds go through [`assemble_day`]; anything implementing
//! [`DispatchSource`] can feed it, which is how the cache tests run without
//! a database.

use crate::field_decode::{decode_id, decode_list};
use crate::models::{ReservationRow, RouteRow, Segment};
use crate::segment_builder::build_segments;
use ahash::AHashMap;
use itertools::Itertools;

/// The two read operations the store owes us.
#[allow(async_fn_in_trait)]
pub trait DispatchSource {
    /// All route legs whose origin departure falls within the given
    /// YYYYMMDD day, vehicle type already joined in.
    async fn routes_for_day(&self, day: u32) -> anyhow::Result<Vec<RouteRow>>;

    /// At most one reservation per dispatch id; absent ids are simply
    /// missing from the map.
    async fn reservations_by_dispatch(
        &self,
        dispatch_ids: &[String],
    ) -> anyhow::Result<AHashMap<String, ReservationRow>>;
}

/// Fetch one service day and build its segments. Returns the raw route
/// count alongside, since the snapshot reports both.
pub async fn assemble_day<S: DispatchSource>(
    source: &S,
    day: u32,
) -> anyhow::Result<(usize, Vec<Segment>)> {
    let routes = source.routes_for_day(day).await?;

    let dispatch_ids: Vec<String> = routes
        .iter()
        .flat_map(|route| decode_list(&route.dispatch_ids))
        .filter_map(|raw| decode_id(&raw))
        .unique()
        .collect();

    let reservations = if dispatch_ids.is_empty() {
        AHashMap::new()
    } else {
        source.reservations_by_dispatch(&dispatch_ids).await?
    };

    let segments = build_segments(&routes, &reservations);
    Ok((routes.len(), segments))
}
