//! Fallback backend for platforms without a native recognition engine.

use anyhow::anyhow;
use async_trait::async_trait;
use image::DynamicImage;

use crate::error::OcrError;
use crate::options::RecognitionProfile;
use crate::recognizer::{BackendError, LanguageSupport, OcrBackend, RawRecognition};

/// Backend used where no native engine is available. Setup succeeds with an
/// empty language set; every recognition attempt fails fatally.
pub struct UnsupportedBackend;

#[async_trait]
impl OcrBackend for UnsupportedBackend {
    async fn setup(&self) -> Result<LanguageSupport, OcrError> {
        Ok(LanguageSupport::default())
    }

    async fn recognize(
        &self,
        _image: &DynamicImage,
        _language: Option<&str>,
        _profile: RecognitionProfile,
    ) -> Result<RawRecognition, BackendError> {
        Err(BackendError::Fatal(anyhow!(
            "text recognition is not supported on this platform"
        )))
    }
}
