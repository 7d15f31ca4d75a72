//! The shared recognition core.
//!
//! Everything that is common across native engines lives here: idempotent
//! initialization, image decode, language validation, the bounded retry
//! loop around the "model still downloading" condition, and mapping the
//! raw engine output into an [`OcrResult`]. Platform backends only turn a
//! decoded image into raw lines and words:
//! - Windows OCR API (Media.Ocr)
//! - Apple Vision (behind the `apple-vision` feature)

#[cfg(all(target_os = "macos", feature = "apple-vision"))]
pub mod vision;
#[cfg(windows)]
pub mod windows;

pub mod unsupported;

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use image::DynamicImage;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::OcrError;
use crate::options::{OcrOptions, RecognitionProfile};
use crate::pattern::extract_patterns;
use crate::result::{OcrElement, OcrResult, Rect};

/// Maximum recognition attempts while the engine model is downloading.
const MAX_ATTEMPTS: u32 = 5;

/// Fixed delay between recognition attempts.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Raw per-word output from a native engine.
#[derive(Debug, Clone)]
pub struct RawWord {
    pub text: String,
    pub confidence: f32,
    pub bounds: Option<Rect>,
}

/// Raw per-line output from a native engine.
#[derive(Debug, Clone)]
pub struct RawLine {
    pub text: String,
    pub words: Vec<RawWord>,
}

/// Untranslated output of one successful native recognition.
#[derive(Debug, Clone, Default)]
pub struct RawRecognition {
    pub lines: Vec<RawLine>,
}

/// Supported-language sets per accuracy profile.
///
/// Engines that route the thorough profile through a different recognizer
/// (cloud-backed, typically) can support a wider set there.
#[derive(Debug, Clone, Default)]
pub struct LanguageSupport {
    pub fast: Vec<String>,
    pub accurate: Vec<String>,
}

impl LanguageSupport {
    /// A support set shared by both profiles.
    pub fn uniform(languages: Vec<String>) -> Self {
        Self {
            fast: languages.clone(),
            accurate: languages,
        }
    }

    pub fn for_profile(&self, profile: RecognitionProfile) -> &[String] {
        match profile {
            RecognitionProfile::Fast => &self.fast,
            RecognitionProfile::Accurate => &self.accurate,
        }
    }
}

/// How a single native recognition attempt failed.
#[derive(Debug)]
pub enum BackendError {
    /// The recognition model or language pack is still downloading; the
    /// recognizer waits and retries.
    ModelDownloading(String),
    /// Anything else; surfaced immediately without retrying.
    Fatal(anyhow::Error),
}

/// The seam in front of a platform-native text recognition engine.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// One-time native setup; returns the languages the engine supports.
    async fn setup(&self) -> Result<LanguageSupport, OcrError>;

    /// Runs one recognition attempt over a decoded image.
    ///
    /// A shared fast-profile recognizer instance must tolerate reuse across
    /// calls; an accurate-profile instance created for this call must be
    /// released before returning, on every exit path.
    async fn recognize(
        &self,
        image: &DynamicImage,
        language: Option<&str>,
        profile: RecognitionProfile,
    ) -> Result<RawRecognition, BackendError>;
}

/// Shared adapter over an [`OcrBackend`].
///
/// Owns the call sequence every platform shares: decode, language
/// validation, recognize-with-retry, result mapping, pattern and callback
/// post-processing.
pub struct Recognizer<B> {
    backend: B,
    init_lock: tokio::sync::Mutex<()>,
    // Some(..) once setup has run; doubles as the initialized flag.
    languages: RwLock<Option<LanguageSupport>>,
}

impl<B: OcrBackend> Recognizer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            init_lock: tokio::sync::Mutex::new(()),
            languages: RwLock::new(None),
        }
    }

    /// Runs the backend's one-time setup. Safe to call repeatedly and
    /// concurrently; only the first call reaches the native engine.
    pub async fn init(&self, ct: &CancellationToken) -> Result<(), OcrError> {
        let _guard = self.init_lock.lock().await;
        if self.languages.read().is_some() {
            return Ok(());
        }
        if ct.is_cancelled() {
            return Err(OcrError::Cancelled);
        }

        let support = self.backend.setup().await?;
        debug!(
            fast = support.fast.len(),
            accurate = support.accurate.len(),
            "recognizer initialized"
        );
        *self.languages.write() = Some(support);
        Ok(())
    }

    /// Languages available on the fast profile, empty before [`init`].
    pub fn supported_languages(&self) -> Vec<String> {
        self.languages
            .read()
            .as_ref()
            .map(|support| support.fast.clone())
            .unwrap_or_default()
    }

    /// Recognizes text in encoded image bytes (PNG, JPEG, ...).
    pub async fn recognize(
        &self,
        image_data: &[u8],
        options: &OcrOptions,
        ct: &CancellationToken,
    ) -> Result<OcrResult, OcrError> {
        let support = self.languages.read().clone().ok_or(OcrError::InvalidState)?;
        if ct.is_cancelled() {
            return Err(OcrError::Cancelled);
        }

        let image = image::load_from_memory(image_data).map_err(OcrError::InvalidImage)?;

        if let Some(requested) = options.language() {
            let supported = support.for_profile(options.profile());
            if !supported.iter().any(|tag| tag == requested) {
                return Err(OcrError::UnsupportedLanguage {
                    requested: requested.to_owned(),
                    supported: supported.to_vec(),
                });
            }
        }

        let raw = self.recognize_with_retry(&image, options, ct).await?;
        map_result(raw, options)
    }

    /// Invokes the native engine, waiting out the model-downloading
    /// condition up to [`MAX_ATTEMPTS`] times.
    async fn recognize_with_retry(
        &self,
        image: &DynamicImage,
        options: &OcrOptions,
        ct: &CancellationToken,
    ) -> Result<RawRecognition, OcrError> {
        let mut last_busy: Option<String> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if ct.is_cancelled() {
                return Err(OcrError::Cancelled);
            }

            match self
                .backend
                .recognize(image, options.language(), options.profile())
                .await
            {
                Ok(raw) => return Ok(raw),
                Err(BackendError::ModelDownloading(message)) => {
                    warn!(
                        attempt,
                        max = MAX_ATTEMPTS,
                        "recognition model not ready, waiting before retry"
                    );
                    last_busy = Some(message);
                    tokio::select! {
                        _ = ct.cancelled() => return Err(OcrError::Cancelled),
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
                Err(BackendError::Fatal(source)) => return Err(OcrError::Engine(source)),
            }
        }

        Err(match last_busy {
            Some(message) => OcrError::EngineBusy(message),
            None => OcrError::Engine(anyhow!("recognition failed without a specific cause")),
        })
    }
}

/// Builds the normalized result: joins lines into `all_text`, flattens
/// elements, then runs pattern extraction and the custom callback.
fn map_result(raw: RawRecognition, options: &OcrOptions) -> Result<OcrResult, OcrError> {
    let mut result = OcrResult::default();

    for line in raw.lines {
        for word in line.words {
            result.elements.push(OcrElement {
                text: word.text,
                confidence: word.confidence,
                bounds: word.bounds,
            });
        }
        if !result.all_text.is_empty() {
            result.all_text.push(' ');
        }
        result.all_text.push_str(&line.text);
        result.lines.push(line.text);
    }

    for config in options.pattern_configs() {
        result
            .matched_values
            .extend(extract_patterns(&result.all_text, config)?);
    }

    if let Some(callback) = options.custom_callback() {
        // Return value is advisory only; see OcrOptions docs.
        let _ = callback(&result.all_text);
    }

    result.success = true;
    debug!(
        lines = result.lines.len(),
        elements = result.elements.len(),
        matches = result.matched_values.len(),
        "mapped recognition result"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PatternConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    type Responder =
        Box<dyn Fn(u32) -> Result<RawRecognition, BackendError> + Send + Sync>;

    /// Scripted backend: `respond` is handed the 1-based attempt number.
    struct MockBackend {
        languages: LanguageSupport,
        setup_calls: Arc<AtomicU32>,
        recognize_calls: Arc<AtomicU32>,
        seen_profiles: Arc<Mutex<Vec<RecognitionProfile>>>,
        respond: Responder,
    }

    impl MockBackend {
        fn new(respond: Responder) -> Self {
            Self {
                languages: LanguageSupport::uniform(vec!["en".into(), "es".into()]),
                setup_calls: Arc::new(AtomicU32::new(0)),
                recognize_calls: Arc::new(AtomicU32::new(0)),
                seen_profiles: Arc::new(Mutex::new(Vec::new())),
                respond,
            }
        }

        fn always_busy() -> Self {
            Self::new(Box::new(|_| {
                Err(BackendError::ModelDownloading(
                    "waiting for the text module to be downloaded".into(),
                ))
            }))
        }

        fn single_line(text: &str) -> Self {
            let line = raw_line(text);
            Self::new(Box::new(move |_| Ok(RawRecognition { lines: vec![line.clone()] })))
        }
    }

    #[async_trait]
    impl OcrBackend for MockBackend {
        async fn setup(&self) -> Result<LanguageSupport, OcrError> {
            self.setup_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(self.languages.clone())
        }

        async fn recognize(
            &self,
            _image: &DynamicImage,
            _language: Option<&str>,
            profile: RecognitionProfile,
        ) -> Result<RawRecognition, BackendError> {
            let attempt = self.recognize_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen_profiles.lock().unwrap().push(profile);
            (self.respond)(attempt)
        }
    }

    fn raw_line(text: &str) -> RawLine {
        let words = text
            .split(' ')
            .map(|word| RawWord {
                text: word.to_owned(),
                confidence: 0.9,
                bounds: Some(Rect { x: 1, y: 2, width: 30, height: 10 }),
            })
            .collect();
        RawLine { text: text.to_owned(), words }
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 255, 255, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    async fn ready(backend: MockBackend) -> Recognizer<MockBackend> {
        let recognizer = Recognizer::new(backend);
        recognizer.init(&CancellationToken::new()).await.unwrap();
        recognizer
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_after_five_attempts() {
        let recognizer = ready(MockBackend::always_busy()).await;
        let calls = Arc::clone(&recognizer.backend.recognize_calls);

        let started = tokio::time::Instant::now();
        let err = recognizer
            .recognize(&png_bytes(), &OcrOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, OcrError::EngineBusy(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // One fixed delay after every busy attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(25));
    }

    #[tokio::test]
    async fn test_fatal_error_short_circuits() {
        let backend = MockBackend::new(Box::new(|_| {
            Err(BackendError::Fatal(anyhow!("engine exploded")))
        }));
        let recognizer = ready(backend).await;
        let calls = Arc::clone(&recognizer.backend.recognize_calls);

        let err = recognizer
            .recognize(&png_bytes(), &OcrOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, OcrError::Engine(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff() {
        let recognizer = Arc::new(ready(MockBackend::always_busy()).await);
        let calls = Arc::clone(&recognizer.backend.recognize_calls);
        let ct = CancellationToken::new();

        let task = {
            let recognizer = Arc::clone(&recognizer);
            let ct = ct.clone();
            let image = png_bytes();
            tokio::spawn(async move {
                recognizer.recognize(&image, &OcrOptions::default(), &ct).await
            })
        };

        // Fire the token one (virtual) second into the first 5s backoff.
        tokio::time::sleep(Duration::from_secs(1)).await;
        ct.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, OcrError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_token_short_circuits() {
        let recognizer = ready(MockBackend::single_line("hello")).await;
        let calls = Arc::clone(&recognizer.backend.recognize_calls);

        let ct = CancellationToken::new();
        ct.cancel();
        let err = recognizer
            .recognize(&png_bytes(), &OcrOptions::default(), &ct)
            .await
            .unwrap_err();

        assert!(matches!(err, OcrError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_language_rejected_before_native_call() {
        let recognizer = ready(MockBackend::single_line("hola")).await;
        let calls = Arc::clone(&recognizer.backend.recognize_calls);

        let options = OcrOptions::builder().language("xx-XX").build();
        let err = recognizer
            .recognize(&png_bytes(), &options, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            OcrError::UnsupportedLanguage { requested, supported } => {
                assert_eq!(requested, "xx-XX");
                assert_eq!(supported, ["en", "es"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_language_validation_uses_profile_set() {
        let mut backend = MockBackend::single_line("bonjour");
        backend.languages = LanguageSupport {
            fast: vec!["en".into()],
            accurate: vec!["en".into(), "fr".into()],
        };
        let recognizer = ready(backend).await;

        let options = OcrOptions::builder().language("fr").try_hard(true).build();
        let result = recognizer
            .recognize(&png_bytes(), &options, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);

        let options = OcrOptions::builder().language("fr").build();
        let err = recognizer
            .recognize(&png_bytes(), &options, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedLanguage { .. }));
    }

    #[tokio::test]
    async fn test_init_is_idempotent_under_concurrency() {
        let recognizer = Arc::new(Recognizer::new(MockBackend::single_line("x")));
        let setup_calls = Arc::clone(&recognizer.backend.setup_calls);
        let ct = CancellationToken::new();

        let (a, b) = tokio::join!(recognizer.init(&ct), recognizer.init(&ct));
        a.unwrap();
        b.unwrap();
        recognizer.init(&ct).await.unwrap();

        assert_eq!(setup_calls.load(Ordering::SeqCst), 1);
        assert_eq!(recognizer.supported_languages(), ["en", "es"]);
    }

    #[tokio::test]
    async fn test_recognize_before_init_is_invalid_state() {
        let recognizer = Recognizer::new(MockBackend::single_line("x"));
        let err = recognizer
            .recognize(&png_bytes(), &OcrOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidState));
    }

    #[tokio::test]
    async fn test_invalid_image_rejected_before_retry_loop() {
        let recognizer = ready(MockBackend::always_busy()).await;
        let calls = Arc::clone(&recognizer.backend.recognize_calls);

        let err = recognizer
            .recognize(b"definitely not an image", &OcrOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, OcrError::InvalidImage(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_single_line_scenario() {
        let recognizer = ready(MockBackend::single_line("INVOICE 42")).await;
        let result = recognizer
            .recognize(&png_bytes(), &OcrOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.all_text, "INVOICE 42");
        assert_eq!(result.lines, ["INVOICE 42"]);
        assert_eq!(result.elements.len(), 2);
        assert_eq!(result.elements[0].text, "INVOICE");
        assert!(result.matched_values.is_empty());
    }

    #[tokio::test]
    async fn test_mapping_joins_lines_without_leading_space() {
        let lines = vec![raw_line("first line"), raw_line("second")];
        let backend =
            MockBackend::new(Box::new(move |_| Ok(RawRecognition { lines: lines.clone() })));
        let recognizer = ready(backend).await;

        let result = recognizer
            .recognize(&png_bytes(), &OcrOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.all_text, "first line second");
        assert_eq!(result.lines, ["first line", "second"]);
        assert_eq!(result.elements.len(), 3);
    }

    #[tokio::test]
    async fn test_patterns_applied_in_config_order() {
        let recognizer = ready(MockBackend::single_line("invoice INV-9 total $25")).await;
        let options = OcrOptions::builder()
            .add_pattern_config(PatternConfig::new(r"\$\d+"))
            .add_pattern_config(PatternConfig::new(r"INV-\d+"))
            .build();

        let result = recognizer
            .recognize(&png_bytes(), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.matched_values, ["$25", "INV-9"]);
    }

    #[tokio::test]
    async fn test_custom_callback_sees_joined_text() {
        let recognizer = ready(MockBackend::single_line("hello world")).await;
        let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        let options = OcrOptions::builder()
            .custom_callback(move |text| {
                *sink.lock().unwrap() = Some(text.to_owned());
                false
            })
            .build();

        let result = recognizer
            .recognize(&png_bytes(), &options, &CancellationToken::new())
            .await
            .unwrap();

        // The callback's false return does not affect the result.
        assert!(result.success);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn test_invalid_pattern_fails_the_call() {
        let recognizer = ready(MockBackend::single_line("text")).await;
        let options = OcrOptions::builder()
            .add_pattern_config(PatternConfig::new("[broken"))
            .build();

        let err = recognizer
            .recognize(&png_bytes(), &options, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn test_profile_follows_try_hard() {
        let recognizer = ready(MockBackend::single_line("x")).await;
        let profiles = Arc::clone(&recognizer.backend.seen_profiles);

        let options = OcrOptions::builder().try_hard(true).build();
        recognizer
            .recognize(&png_bytes(), &options, &CancellationToken::new())
            .await
            .unwrap();
        recognizer
            .recognize(&png_bytes(), &OcrOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        let seen = profiles.lock().unwrap().clone();
        assert_eq!(seen, [RecognitionProfile::Accurate, RecognitionProfile::Fast]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_after_transient_busy() {
        let backend = MockBackend::new(Box::new(|attempt| {
            if attempt < 3 {
                Err(BackendError::ModelDownloading("still downloading".into()))
            } else {
                Ok(RawRecognition { lines: vec![raw_line("ready now")] })
            }
        }));
        let recognizer = ready(backend).await;
        let calls = Arc::clone(&recognizer.backend.recognize_calls);

        let result = recognizer
            .recognize(&png_bytes(), &OcrOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.all_text, "ready now");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
