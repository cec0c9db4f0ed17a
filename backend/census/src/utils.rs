use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, de::Error};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Lookup key for usernames and emails: trimmed, lowercased, inner whitespace collapsed.
pub fn sanitize_key(input: &str) -> String {
    WHITESPACE
        .replace_all(input.trim(), " ")
        .into_owned()
        .to_lowercase()
}

/// Accepts plain dates as well as timestamps (`2024-02-13 00:00:00`, `2024-02-13T00:00:00Z`).
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    let date_part = trimmed
        .split(|c| c == 'T' || c == ' ')
        .next()
        .unwrap_or(trimmed);

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Form inputs sometimes post counts as strings ("5"), take either.
pub fn count_from_any<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u32),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(count) => Ok(count),
        Count::Text(text) if text.trim().is_empty() => Ok(0),
        Count::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid count: {text}"))),
    }
}
