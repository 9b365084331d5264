use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{ArchiveError, ArchiveResult};

/// Application name stamped into every archive.
pub const APP_NAME: &str = "fader";

/// Plain-text line separating bucket records from file records.
pub const BUCKETS_END: &str = "--fader-end-of-buckets--";

/// The first line of an archive: who wrote it, when, and why.
///
/// Encoded as base64 of `app|version|author|rfc3339 timestamp|description`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveInfoLine {
    pub app_name: String,
    pub version: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub description: String,
}

impl ArchiveInfoLine {
    /// Info for an archive written now by this application.
    pub fn new(
        version: impl Into<String>,
        author: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            version: version.into(),
            author: author.into(),
            created_at: Utc::now(),
            description: description.into(),
        }
    }

    /// Encode as a single base64 line, without the trailing newline.
    pub fn to_line(&self) -> ArchiveResult<String> {
        for (field, value) in [
            ("app_name", &self.app_name),
            ("version", &self.version),
            ("author", &self.author),
            ("description", &self.description),
        ] {
            if value.contains(['|', '\n', '\r']) {
                return Err(ArchiveError::InvalidInfoField { field });
            }
        }
        let record = format!(
            "{}|{}|{}|{}|{}",
            self.app_name,
            self.version,
            self.author,
            self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.description
        );
        Ok(general_purpose::STANDARD.encode(record))
    }

    /// Decode an info line and check that it was written by [`APP_NAME`].
    pub fn parse(line: &str) -> ArchiveResult<Self> {
        let bytes = general_purpose::STANDARD
            .decode(line.trim())
            .map_err(|source| ArchiveError::Base64 { line: 1, source })?;
        let record = String::from_utf8(bytes)
            .map_err(|_| ArchiveError::MalformedInfo("not UTF-8".to_string()))?;

        let parts: Vec<&str> = record.splitn(5, '|').collect();
        let [app_name, version, author, timestamp, description] = parts[..] else {
            return Err(ArchiveError::MalformedInfo(format!(
                "expected 5 fields, found {}",
                parts.len()
            )));
        };
        if app_name != APP_NAME {
            return Err(ArchiveError::AppName {
                expected: APP_NAME.to_string(),
                found: app_name.to_string(),
            });
        }
        let created_at = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| ArchiveError::MalformedInfo(format!("timestamp {timestamp:?}: {e}")))?
            .with_timezone(&Utc);

        Ok(Self {
            app_name: app_name.to_string(),
            version: version.to_string(),
            author: author.to_string(),
            created_at,
            description: description.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_roundtrip() {
        let info = ArchiveInfoLine::new("1.2.0", "ops", "nightly backup");
        let parsed = ArchiveInfoLine::parse(&info.to_line().unwrap()).unwrap();
        assert_eq!(parsed.app_name, APP_NAME);
        assert_eq!(parsed.version, "1.2.0");
        assert_eq!(parsed.author, "ops");
        assert_eq!(parsed.description, "nightly backup");
        assert_eq!(parsed.created_at.timestamp(), info.created_at.timestamp());
    }

    #[test]
    fn pipes_are_rejected_on_write() {
        let info = ArchiveInfoLine::new("1", "a|b", "");
        assert!(matches!(
            info.to_line(),
            Err(ArchiveError::InvalidInfoField { field: "author" })
        ));
        let info = ArchiveInfoLine::new("1", "a", "two\nlines");
        assert!(info.to_line().is_err());
    }

    #[test]
    fn foreign_app_is_rejected() {
        let line = general_purpose::STANDARD.encode("other|1|a|2024-01-01T00:00:00Z|d");
        assert!(matches!(
            ArchiveInfoLine::parse(&line),
            Err(ArchiveError::AppName { .. })
        ));
    }

    #[test]
    fn short_record_is_malformed() {
        let line = general_purpose::STANDARD.encode("fader|1|a");
        assert!(matches!(
            ArchiveInfoLine::parse(&line),
            Err(ArchiveError::MalformedInfo(_))
        ));
        assert!(matches!(
            ArchiveInfoLine::parse("%%%"),
            Err(ArchiveError::Base64 { .. })
        ));
    }

    #[test]
    fn empty_description_is_allowed() {
        let line = general_purpose::STANDARD.encode("fader|1|a|2024-01-01T00:00:00Z|");
        let info = ArchiveInfoLine::parse(&line).unwrap();
        assert_eq!(info.description, "");
    }
}
