//! Error taxonomy for recognition calls.

use thiserror::Error;

/// Failure modes surfaced by the recognition API.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Recognition was requested before [`init`](crate::OcrService::init) ran.
    #[error("init must be called before recognize")]
    InvalidState,

    /// The supplied bytes could not be decoded as an image.
    #[error("image data could not be decoded")]
    InvalidImage(#[source] image::ImageError),

    /// The requested language is not available on this engine.
    #[error("unsupported language \"{requested}\", supported languages are: ({list})", list = .supported.join(","))]
    UnsupportedLanguage {
        requested: String,
        supported: Vec<String>,
    },

    /// The engine's recognition model was still downloading after every
    /// retry attempt.
    #[error("recognition model is not ready: {0}")]
    EngineBusy(String),

    /// A pattern config carries a regex that does not compile.
    #[error("invalid pattern \"{pattern}\"")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The caller's cancellation token fired.
    #[error("recognition was cancelled")]
    Cancelled,

    /// Any other native engine failure; never retried.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}
