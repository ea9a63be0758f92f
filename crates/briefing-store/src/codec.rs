//! Column encodings. Nothing outside the store sees these strings.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use briefing_types::{BriefingError, Result};

pub(crate) fn encode_list(items: &[String]) -> String {
    serde_json::Value::from(items.to_vec()).to_string()
}

pub(crate) fn decode_list(column: &str, raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| {
        BriefingError::persistence("decode", format!("column {column} holds an invalid list: {e}"))
    })
}

pub(crate) fn encode_set(items: &BTreeSet<String>) -> String {
    serde_json::Value::from(items.iter().cloned().collect::<Vec<_>>()).to_string()
}

pub(crate) fn decode_set(column: &str, raw: &str) -> Result<BTreeSet<String>> {
    decode_list(column, raw).map(|items| items.into_iter().collect())
}

pub(crate) fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339()
}

pub(crate) fn decode_time(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            BriefingError::persistence("decode", format!("column {column} holds an invalid timestamp: {e}"))
        })
}

pub(crate) fn decode_opt_time(column: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|r| decode_time(column, &r)).transpose()
}

pub(crate) fn encode_path(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.to_string_lossy().into_owned())
}

/// Parse an enum stored as its canonical string.
pub(crate) fn decode_enum<T: FromStr>(column: &str, raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(|_| {
        BriefingError::persistence("decode", format!("column {column} holds unknown value '{raw}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_keep_their_order() {
        let tags = vec!["Weekly".to_string(), "AI".to_string(), "News".to_string()];
        let raw = encode_list(&tags);
        assert_eq!(raw, r#"["Weekly","AI","News"]"#);
        assert_eq!(decode_list("tags", &raw).unwrap(), tags);
    }

    #[test]
    fn awkward_strings_survive() {
        let sources = vec![
            "Ben's Bites".to_string(),
            "\"Quoted\", with comma".to_string(),
            String::new(),
        ];
        assert_eq!(decode_list("newsletter_sources", &encode_list(&sources)).unwrap(), sources);
    }

    #[test]
    fn corrupt_column_is_a_persistence_error() {
        let err = decode_list("tags", "AI, News").unwrap_err();
        assert!(matches!(err, BriefingError::Persistence { .. }));
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn enums_decode_from_canonical_strings() {
        use briefing_types::{ArtifactStatus, Category};
        let status: ArtifactStatus = decode_enum("status", "MARKDOWN_CREATED").unwrap();
        assert_eq!(status, ArtifactStatus::MarkdownCreated);
        let category: Category = decode_enum("category", "AI").unwrap();
        assert_eq!(category, Category::Ai);
        assert!(decode_enum::<Category>("category", "GARDENING").is_err());
    }
}
