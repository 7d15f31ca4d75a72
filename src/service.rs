//! Facade contract, the one-shot completion path, and the process-wide
//! default service.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::OcrError;
use crate::options::OcrOptions;
use crate::recognizer::{OcrBackend, Recognizer};
use crate::result::OcrResult;

/// One-shot handler for the completion-driven path.
pub type CompletionHandler = Box<dyn FnOnce(RecognitionOutcome) + Send>;

/// Outcome delivered by [`OcrService::start_recognize`].
#[derive(Debug, Clone, Default)]
pub struct RecognitionOutcome {
    /// The recognition result, absent when the call failed outright.
    pub result: Option<OcrResult>,
    /// Error display text, empty on success.
    pub error_message: String,
}

impl RecognitionOutcome {
    pub fn is_successful(&self) -> bool {
        self.result.as_ref().map_or(false, |r| r.success)
    }
}

/// The recognition API exposed to application code.
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Runs platform setup; idempotent.
    async fn init(&self, ct: &CancellationToken) -> Result<(), OcrError>;

    /// BCP-47 tags the engine can recognize, empty before [`init`](Self::init).
    fn supported_languages(&self) -> Vec<String>;

    /// Recognizes text in encoded image bytes.
    async fn recognize(
        &self,
        image_data: &[u8],
        options: &OcrOptions,
        ct: &CancellationToken,
    ) -> Result<OcrResult, OcrError>;

    /// Sugar over [`recognize`](Self::recognize) with only the accuracy
    /// profile set.
    async fn recognize_with_accuracy(
        &self,
        image_data: &[u8],
        try_hard: bool,
        ct: &CancellationToken,
    ) -> Result<OcrResult, OcrError> {
        let options = OcrOptions::builder().try_hard(try_hard).build();
        self.recognize(image_data, &options, ct).await
    }

    /// Completion-driven path: `on_complete` fires exactly once with either
    /// the result or a failure outcome. Engine and configuration failures
    /// never propagate out of this call; cancellation does.
    async fn start_recognize(
        &self,
        image_data: &[u8],
        options: &OcrOptions,
        ct: &CancellationToken,
        on_complete: CompletionHandler,
    ) -> Result<(), OcrError> {
        match self.recognize(image_data, options, ct).await {
            Ok(result) => on_complete(RecognitionOutcome {
                result: Some(result),
                error_message: String::new(),
            }),
            Err(OcrError::Cancelled) => return Err(OcrError::Cancelled),
            Err(err) => on_complete(RecognitionOutcome {
                result: None,
                error_message: err.to_string(),
            }),
        }
        Ok(())
    }
}

#[async_trait]
impl<B: OcrBackend> OcrService for Recognizer<B> {
    async fn init(&self, ct: &CancellationToken) -> Result<(), OcrError> {
        Recognizer::init(self, ct).await
    }

    fn supported_languages(&self) -> Vec<String> {
        Recognizer::supported_languages(self)
    }

    async fn recognize(
        &self,
        image_data: &[u8],
        options: &OcrOptions,
        ct: &CancellationToken,
    ) -> Result<OcrResult, OcrError> {
        Recognizer::recognize(self, image_data, options, ct).await
    }
}

static DEFAULT_SERVICE: RwLock<Option<Arc<dyn OcrService>>> = RwLock::new(None);

/// The process-wide recognition service, constructed for the running
/// platform on first access.
pub fn default_service() -> Arc<dyn OcrService> {
    if let Some(service) = DEFAULT_SERVICE.read().as_ref() {
        return Arc::clone(service);
    }
    let mut slot = DEFAULT_SERVICE.write();
    Arc::clone(slot.get_or_insert_with(platform_service))
}

/// Replaces the default service; `None` restores the platform
/// implementation on next access. Intended as a test seam.
pub fn set_default_service(service: Option<Arc<dyn OcrService>>) {
    *DEFAULT_SERVICE.write() = service;
}

fn platform_service() -> Arc<dyn OcrService> {
    #[cfg(windows)]
    {
        Arc::new(Recognizer::new(crate::recognizer::windows::WindowsBackend::new()))
    }
    #[cfg(all(target_os = "macos", feature = "apple-vision"))]
    {
        Arc::new(Recognizer::new(crate::recognizer::vision::VisionBackend::new()))
    }
    #[cfg(not(any(windows, all(target_os = "macos", feature = "apple-vision"))))]
    {
        Arc::new(Recognizer::new(crate::recognizer::unsupported::UnsupportedBackend))
    }
}
