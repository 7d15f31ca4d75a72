//! Cross-platform text recognition (OCR) behind one unified async API.
//!
//! Callers hand over encoded image bytes and [`OcrOptions`]; the crate
//! dispatches to whichever native engine the platform provides (Windows
//! OCR API on Windows, Apple Vision on macOS) and normalizes the output
//! into one [`OcrResult`] shape. The shared [`Recognizer`] core handles
//! image decode, language validation, bounded retry while an engine model
//! is still downloading, and regex pattern extraction over the recognized
//! text.
//!
//! ```no_run
//! use ocr_kit::{default_service, OcrOptions, OcrService};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(image_bytes: Vec<u8>) -> Result<(), ocr_kit::OcrError> {
//! let service = default_service();
//! let ct = CancellationToken::new();
//! service.init(&ct).await?;
//!
//! let options = OcrOptions::builder().try_hard(true).build();
//! let result = service.recognize(&image_bytes, &options, &ct).await?;
//! println!("{}", result.all_text);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod options;
pub mod pattern;
pub mod recognizer;
pub mod result;
pub mod service;

pub use error::OcrError;
pub use options::{
    OcrOptions, OcrOptionsBuilder, PatternConfig, PatternValidator, RecognitionCallback,
    RecognitionProfile,
};
pub use pattern::extract_patterns;
pub use recognizer::{
    BackendError, LanguageSupport, OcrBackend, RawLine, RawRecognition, RawWord, Recognizer,
};
pub use result::{OcrElement, OcrResult, Rect};
pub use service::{
    default_service, set_default_service, CompletionHandler, OcrService, RecognitionOutcome,
};
