//! Derives the scene time to look for next.
//!
//! The archive publishes a full-disk scan every 15 minutes, so the cursor
//! steps by that cadence. With no history it starts 45 minutes before the top
//! of the current hour, which targets the most recent slot that is reliably
//! published.

use chrono::{DateTime, Duration, Utc};

use eumdac_client::product::truncate_to_minute;

use crate::state::CursorState;

/// Spacing between consecutive scenes.
pub const CADENCE_MINUTES: i64 = 15;

/// How far before the top of the current hour a fresh cursor starts.
pub const BOOTSTRAP_LAG_MINUTES: i64 = 45;

/// The single target timestamp for a cycle starting at `now`.
pub fn next_target(state: &CursorState, now: DateTime<Utc>) -> DateTime<Utc> {
    match state.date {
        Some(last) => truncate_to_minute(last) + Duration::minutes(CADENCE_MINUTES),
        None => bootstrap_target(now),
    }
}

/// Start of the current UTC hour minus the bootstrap lag.
pub fn bootstrap_target(now: DateTime<Utc>) -> DateTime<Utc> {
    truncate_to_hour(now) - Duration::minutes(BOOTSTRAP_LAG_MINUTES)
}

fn truncate_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    let secs = dt.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0).unwrap_or(dt)
}
