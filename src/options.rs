//! Per-call recognition options and the pattern rules they carry.

use std::fmt;
use std::sync::Arc;

/// Validates a single extracted pattern match.
pub type PatternValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Callback invoked once per recognition with the final joined text.
///
/// The boolean return is advisory only; the recognizer does not consult it
/// when building the result.
pub type RecognitionCallback = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A regex extraction rule applied to the recognized text.
///
/// An empty pattern matches nothing, so optional pattern lists stay cheap to
/// pass around. A pattern that fails to compile is a configuration error
/// raised when the rule is applied.
#[derive(Clone, Default)]
pub struct PatternConfig {
    /// The regex pattern to match.
    pub regex_pattern: String,
    /// If present, a match is kept only when this returns true.
    pub validation_function: Option<PatternValidator>,
}

impl PatternConfig {
    /// A rule that keeps every match of `regex_pattern`.
    pub fn new(regex_pattern: impl Into<String>) -> Self {
        Self {
            regex_pattern: regex_pattern.into(),
            validation_function: None,
        }
    }

    /// A rule that keeps only matches accepted by `validator`.
    pub fn with_validator(
        regex_pattern: impl Into<String>,
        validator: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            regex_pattern: regex_pattern.into(),
            validation_function: Some(Arc::new(validator)),
        }
    }
}

impl fmt::Debug for PatternConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternConfig")
            .field("regex_pattern", &self.regex_pattern)
            .field("validation_function", &self.validation_function.is_some())
            .finish()
    }
}

/// Accuracy profile for a recognition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecognitionProfile {
    /// Fast, on-device recognition.
    #[default]
    Fast,
    /// Slower, more thorough recognition; may be cloud-backed on engines
    /// that support it.
    Accurate,
}

/// Immutable options for one recognition call, built via
/// [`OcrOptions::builder`].
#[derive(Clone, Default)]
pub struct OcrOptions {
    language: Option<String>,
    try_hard: bool,
    pattern_configs: Vec<PatternConfig>,
    custom_callback: Option<RecognitionCallback>,
}

impl OcrOptions {
    pub fn builder() -> OcrOptionsBuilder {
        OcrOptionsBuilder::default()
    }

    /// BCP-47 tag to recognize in, if the caller pinned one.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Whether the caller asked for the thorough profile.
    pub fn try_hard(&self) -> bool {
        self.try_hard
    }

    /// The accuracy profile selected by `try_hard`.
    pub fn profile(&self) -> RecognitionProfile {
        if self.try_hard {
            RecognitionProfile::Accurate
        } else {
            RecognitionProfile::Fast
        }
    }

    /// Extraction rules to run over the recognized text, in order.
    pub fn pattern_configs(&self) -> &[PatternConfig] {
        &self.pattern_configs
    }

    pub fn custom_callback(&self) -> Option<&RecognitionCallback> {
        self.custom_callback.as_ref()
    }
}

impl fmt::Debug for OcrOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrOptions")
            .field("language", &self.language)
            .field("try_hard", &self.try_hard)
            .field("pattern_configs", &self.pattern_configs)
            .field("custom_callback", &self.custom_callback.is_some())
            .finish()
    }
}

/// Builder for [`OcrOptions`].
#[derive(Default)]
pub struct OcrOptionsBuilder {
    language: Option<String>,
    try_hard: bool,
    pattern_configs: Vec<PatternConfig>,
    custom_callback: Option<RecognitionCallback>,
}

impl OcrOptionsBuilder {
    /// Sets the BCP-47 language to recognize in.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Selects between the fast and thorough profiles.
    pub fn try_hard(mut self, try_hard: bool) -> Self {
        self.try_hard = try_hard;
        self
    }

    /// Appends one extraction rule.
    pub fn add_pattern_config(mut self, config: PatternConfig) -> Self {
        self.pattern_configs.push(config);
        self
    }

    /// Replaces the extraction rules wholesale.
    pub fn pattern_configs(mut self, configs: Vec<PatternConfig>) -> Self {
        self.pattern_configs = configs;
        self
    }

    /// Sets a callback invoked once with the final joined text.
    pub fn custom_callback(
        mut self,
        callback: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.custom_callback = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> OcrOptions {
        OcrOptions {
            language: self.language,
            try_hard: self.try_hard,
            pattern_configs: self.pattern_configs,
            custom_callback: self.custom_callback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = OcrOptions::default();
        assert_eq!(options.language(), None);
        assert!(!options.try_hard());
        assert_eq!(options.profile(), RecognitionProfile::Fast);
        assert!(options.pattern_configs().is_empty());
        assert!(options.custom_callback().is_none());
    }

    #[test]
    fn test_builder_sets_all_fields() {
        let options = OcrOptions::builder()
            .language("en-US")
            .try_hard(true)
            .add_pattern_config(PatternConfig::new(r"\d+"))
            .custom_callback(|text| !text.is_empty())
            .build();

        assert_eq!(options.language(), Some("en-US"));
        assert_eq!(options.profile(), RecognitionProfile::Accurate);
        assert_eq!(options.pattern_configs().len(), 1);
        assert!(options.custom_callback().is_some());
    }

    #[test]
    fn test_pattern_configs_replaces_list() {
        let options = OcrOptions::builder()
            .add_pattern_config(PatternConfig::new("a"))
            .pattern_configs(vec![PatternConfig::new("b"), PatternConfig::new("c")])
            .build();

        let patterns: Vec<_> = options
            .pattern_configs()
            .iter()
            .map(|c| c.regex_pattern.as_str())
            .collect();
        assert_eq!(patterns, ["b", "c"]);
    }
}
