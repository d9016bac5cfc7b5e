use chrono::{DateTime, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Age of an object in fractional days. Future timestamps count as zero.
pub fn age_in_days(last_modified: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - last_modified).num_milliseconds().max(0);
    millis as f64 / MILLIS_PER_DAY
}

/// Strictly older than the retention window; boundary objects are kept.
pub fn is_expired(last_modified: DateTime<Utc>, now: DateTime<Utc>, expiry_days: u32) -> bool {
    expiry_days > 0 && age_in_days(last_modified, now) > f64::from(expiry_days)
}

/// Tracks the most recently modified object seen while walking a listing.
#[derive(Debug, Default)]
pub struct LatestObject {
    current: Option<(DateTime<Utc>, String)>,
}

impl LatestObject {
    pub fn observe(&mut self, name: impl Into<String>, last_modified: DateTime<Utc>) {
        let newer = match &self.current {
            Some((seen, _)) => last_modified > *seen,
            None => true,
        };
        if newer {
            self.current = Some((last_modified, name.into()));
        }
    }

    pub fn into_name(self) -> Option<String> {
        self.current.map(|(_, name)| name)
    }
}
