use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Row identifier of a stored suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a stored value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionSource {
    /// Typed or submitted by the user
    #[default]
    UserInput,
    /// Seeded by the host (imports, profile data)
    Prefilled,
}

impl SuggestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionSource::UserInput => "USER_INPUT",
            SuggestionSource::Prefilled => "PREFILLED",
        }
    }

    /// Unknown column values fall back to `UserInput`
    pub fn from_column(value: &str) -> Self {
        match value {
            "PREFILLED" => SuggestionSource::Prefilled,
            _ => SuggestionSource::UserInput,
        }
    }
}

/// A single stored field observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRecord {
    pub id: RecordId,
    pub field_identifier: String,
    pub value: String,
    /// Epoch milliseconds
    pub last_used_timestamp: i64,
    pub usage_count: u32,
    pub field_type: String,
    pub source: SuggestionSource,
    pub url_scope: Option<String>,
}

/// Derive the URL scope (host only) of a page URL
///
/// Returns `None` for unparsable URLs and for URLs without a host
/// (`about:blank`, `data:` and friends).
pub fn url_scope(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_ascii_lowercase())
}

/// Whether a value may be written to the store
///
/// Blank values and a lone "." are placeholder noise and never persisted.
pub fn is_persistable(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != "."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_scope_extracts_host() {
        assert_eq!(
            url_scope("https://Example.com/login?next=/home"),
            Some("example.com".to_string())
        );
        assert_eq!(
            url_scope("http://sub.example.com:8080/a"),
            Some("sub.example.com".to_string())
        );
    }

    #[test]
    fn test_url_scope_none_without_host() {
        assert_eq!(url_scope("about:blank"), None);
        assert_eq!(url_scope("not a url"), None);
        assert_eq!(url_scope(""), None);
    }

    #[test]
    fn test_is_persistable() {
        assert!(is_persistable("a@b.com"));
        assert!(is_persistable(" x "));
        assert!(!is_persistable(""));
        assert!(!is_persistable("   "));
        assert!(!is_persistable("."));
        assert!(!is_persistable(" . "));
        assert!(is_persistable(".."));
    }

    #[test]
    fn test_source_column_round_trip() {
        for source in [SuggestionSource::UserInput, SuggestionSource::Prefilled] {
            assert_eq!(SuggestionSource::from_column(source.as_str()), source);
        }
        assert_eq!(
            SuggestionSource::from_column("garbage"),
            SuggestionSource::UserInput
        );
    }
}
