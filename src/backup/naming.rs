use chrono::{DateTime, Utc};
use std::fmt;

/// Upper bound the millisecond timestamp is subtracted from, so newer
/// archives get smaller prefixes and sort first.
const INVERSE_BASE: i64 = 9_999_999_999_999;

pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// `<9999999999999 - epoch_ms>-<ISO 8601 without colons>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub inverse_timestamp: i64,
    pub iso_timestamp: String,
}

impl ArchiveName {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        let iso_timestamp = time
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string()
            .replace(':', "");
        Self {
            inverse_timestamp: INVERSE_BASE - time.timestamp_millis(),
            iso_timestamp,
        }
    }

    /// Name without extension; also used for the working directory.
    pub fn stem(&self) -> String {
        format!("{}-{}", self.inverse_timestamp, self.iso_timestamp)
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem(), ARCHIVE_EXTENSION)
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Drops a trailing `.tar.gz` (or a single other extension) from an object name.
pub fn strip_archive_extension(object_name: &str) -> &str {
    let base = object_name.rsplit('/').next().unwrap_or(object_name);
    if let Some(stem) = base.strip_suffix(ARCHIVE_EXTENSION) {
        return stem;
    }
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_known_timestamp() {
        let time = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let name = ArchiveName::at(time);

        assert_eq!(name.inverse_timestamp, 8_299_999_999_999);
        assert_eq!(name.iso_timestamp, "2023-11-14T221320.000Z");
        assert_eq!(name.file_name(), "8299999999999-2023-11-14T221320.000Z.tar.gz");
        assert_eq!(name.to_string(), name.file_name());
    }

    #[test]
    fn test_newer_sorts_first() {
        let base = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
        let offsets = [
            Duration::milliseconds(1),
            Duration::seconds(59),
            Duration::hours(5),
            Duration::days(400),
            Duration::days(365 * 60),
        ];

        for offset in offsets {
            let earlier = ArchiveName::at(base).file_name();
            let later = ArchiveName::at(base + offset).file_name();
            assert!(earlier > later, "{} should sort after {}", earlier, later);
        }
    }

    #[test]
    fn test_strip_archive_extension() {
        assert_eq!(strip_archive_extension("123-2024.tar.gz"), "123-2024");
        assert_eq!(strip_archive_extension("dir/123-x.tar.gz"), "123-x");
        assert_eq!(strip_archive_extension("dump.zip"), "dump");
        assert_eq!(strip_archive_extension("plain"), "plain");
    }
}
