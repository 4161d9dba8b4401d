use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by the host's log pipeline.
    #[default]
    Json,
    /// Human-readable single line output for the administrative console.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("JSON", LogFormat::Json)]
    #[case("compact", LogFormat::Compact)]
    #[case("Compact", LogFormat::Compact)]
    fn parses_case_insensitively(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(LogFormat::from_str(input).expect("format parses"), expected);
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(LogFormat::from_str("xml").is_err());
    }
}
