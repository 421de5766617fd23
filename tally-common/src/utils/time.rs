use chrono::Utc;

/// Returns the current UNIX timestamp in milliseconds.
///
/// Used to stamp vote payloads at cast time and vote projections at ingest
/// time.
pub fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}
