//! Regex pattern extraction over recognized text.

use regex::Regex;

use crate::error::OcrError;
use crate::options::PatternConfig;

/// Extracts all non-overlapping matches of `config`'s pattern from `input`,
/// in order of appearance.
///
/// Matches rejected by the config's validation function are dropped. An
/// empty input or an empty pattern yields an empty list; a pattern that
/// does not compile is a configuration error.
pub fn extract_patterns(input: &str, config: &PatternConfig) -> Result<Vec<String>, OcrError> {
    if input.is_empty() || config.regex_pattern.is_empty() {
        return Ok(Vec::new());
    }

    let regex = Regex::new(&config.regex_pattern).map_err(|source| OcrError::InvalidPattern {
        pattern: config.regex_pattern.clone(),
        source,
    })?;

    let matches = regex
        .find_iter(input)
        .map(|m| m.as_str())
        .filter(|text| {
            config
                .validation_function
                .as_ref()
                .map_or(true, |validate| validate(text))
        })
        .map(str::to_owned)
        .collect();

    Ok(matches)
}

/// Extracts the first validated match only.
#[deprecated(note = "use extract_patterns, which returns every match")]
pub fn extract_pattern(input: &str, config: &PatternConfig) -> Result<Option<String>, OcrError> {
    Ok(extract_patterns(input, config)?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_all_matches_in_order() {
        let config = PatternConfig::new(r"#\d+");
        let matches = extract_patterns("order #123 and #456", &config).unwrap();
        assert_eq!(matches, ["#123", "#456"]);
    }

    #[test]
    fn test_validator_drops_rejected_matches() {
        let config = PatternConfig::with_validator(r"#\d+", |m| m != "#456");
        let matches = extract_patterns("order #123 and #456", &config).unwrap();
        assert_eq!(matches, ["#123"]);
    }

    #[test]
    fn test_empty_pattern_matches_nothing() {
        let config = PatternConfig::new("");
        assert!(extract_patterns("any text at all", &config).unwrap().is_empty());
    }

    #[test]
    fn test_empty_input_matches_nothing() {
        let config = PatternConfig::new(r"\d+");
        assert!(extract_patterns("", &config).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_regex_is_a_config_error() {
        let config = PatternConfig::new("[unclosed");
        let err = extract_patterns("text", &config).unwrap_err();
        assert!(matches!(err, OcrError::InvalidPattern { .. }));
    }

    #[test]
    #[allow(deprecated)]
    fn test_single_match_alias_returns_first() {
        let config = PatternConfig::new(r"#\d+");
        let first = extract_pattern("order #123 and #456", &config).unwrap();
        assert_eq!(first.as_deref(), Some("#123"));
    }
}
