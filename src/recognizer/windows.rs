//! Windows OCR API backend (Media.Ocr).
//!
//! The built-in engine is on-device only, so the fast and accurate profiles
//! resolve to the same recognizer and the model-downloading condition never
//! occurs. Per-word confidence is not reported; elements carry 1.0.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use tracing::debug;
use windows::{
    core::HSTRING,
    Globalization::Language,
    Graphics::Imaging::{BitmapPixelFormat, SoftwareBitmap},
    Media::Ocr::{OcrEngine as WinOcrEngine, OcrResult as WinOcrResult},
};

use crate::error::OcrError;
use crate::options::RecognitionProfile;
use crate::recognizer::{BackendError, LanguageSupport, OcrBackend, RawLine, RawRecognition, RawWord};
use crate::result::Rect;

/// Windows.Media.Ocr backend.
pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        Self
    }

    fn recognize_inner(&self, image: &DynamicImage, language: Option<&str>) -> Result<RawRecognition> {
        let engine = match language {
            Some(tag) => {
                let language = Language::CreateLanguage(&HSTRING::from(tag))
                    .context("failed to create language")?;
                WinOcrEngine::TryCreateFromLanguage(&language)
                    .context("failed to create OCR engine for language")?
            }
            None => WinOcrEngine::TryCreateFromUserProfileLanguages()
                .context("OCR not supported on this device or no languages are installed")?,
        };

        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!("Windows OCR: processing {}x{} image", width, height);

        let bgra = rgba_to_bgra(rgba.as_raw());
        let bitmap = create_software_bitmap(&bgra, width, height)?;

        let result = engine
            .RecognizeAsync(&bitmap)
            .context("failed to start OCR recognition")?
            .get()
            .context("OCR recognition failed")?;

        extract_raw(&result)
    }
}

impl Default for WindowsBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrBackend for WindowsBackend {
    async fn setup(&self) -> Result<LanguageSupport, OcrError> {
        let languages = WinOcrEngine::AvailableRecognizerLanguages()
            .context("failed to enumerate recognizer languages")?;

        let mut tags = Vec::new();
        for i in 0..languages.Size().context("failed to get languages size")? {
            if let Ok(language) = languages.GetAt(i) {
                if let Ok(tag) = language.LanguageTag() {
                    tags.push(tag.to_string());
                }
            }
        }

        debug!(languages = tags.len(), "Windows OCR languages enumerated");
        Ok(LanguageSupport::uniform(tags))
    }

    async fn recognize(
        &self,
        image: &DynamicImage,
        language: Option<&str>,
        _profile: RecognitionProfile,
    ) -> Result<RawRecognition, BackendError> {
        self.recognize_inner(image, language).map_err(BackendError::Fatal)
    }
}

/// Convert RGBA to BGRA (Windows expects BGRA).
fn rgba_to_bgra(rgba: &[u8]) -> Vec<u8> {
    let mut bgra = rgba.to_vec();
    for chunk in bgra.chunks_exact_mut(4) {
        chunk.swap(0, 2);
    }
    bgra
}

/// Create a SoftwareBitmap from BGRA data using CopyFromBuffer.
fn create_software_bitmap(bgra_data: &[u8], width: u32, height: u32) -> Result<SoftwareBitmap> {
    use windows::Storage::Streams::{DataReader, DataWriter, InMemoryRandomAccessStream};

    let stream = InMemoryRandomAccessStream::new().context("failed to create in-memory stream")?;

    let writer = DataWriter::CreateDataWriter(&stream).context("failed to create data writer")?;
    writer.WriteBytes(bgra_data).context("failed to write pixel data")?;
    writer
        .StoreAsync()
        .context("failed to start store operation")?
        .get()
        .context("failed to store data")?;
    writer
        .FlushAsync()
        .context("failed to start flush operation")?
        .get()
        .context("failed to flush data")?;

    stream.Seek(0).context("failed to seek stream")?;

    let bitmap = SoftwareBitmap::Create(BitmapPixelFormat::Bgra8, width as i32, height as i32)
        .context("failed to create SoftwareBitmap")?;

    let input_stream = stream.GetInputStreamAt(0).context("failed to get input stream")?;
    let reader = DataReader::CreateDataReader(&input_stream).context("failed to create data reader")?;
    reader
        .LoadAsync(bgra_data.len() as u32)
        .context("failed to start load operation")?
        .get()
        .context("failed to load data")?;
    let buffer = reader
        .ReadBuffer(bgra_data.len() as u32)
        .context("failed to read buffer")?;

    bitmap.CopyFromBuffer(&buffer).context("failed to copy buffer to bitmap")?;

    Ok(bitmap)
}

/// Flatten the native result into raw lines and words.
fn extract_raw(ocr_result: &WinOcrResult) -> Result<RawRecognition> {
    let mut raw = RawRecognition::default();

    let lines = ocr_result.Lines().context("failed to get OCR lines")?;
    for i in 0..lines.Size().context("failed to get lines size")? {
        let line = lines.GetAt(i).context("failed to get line")?;
        let text = line.Text().context("failed to get line text")?.to_string();

        let mut words = Vec::new();
        let native_words = line.Words().context("failed to get words")?;
        for j in 0..native_words.Size().context("failed to get words size")? {
            let word = native_words.GetAt(j).context("failed to get word")?;
            let rect = word.BoundingRect().context("failed to get bounding rect")?;

            words.push(RawWord {
                text: word.Text().context("failed to get word text")?.to_string(),
                // Windows OCR doesn't provide confidence
                confidence: 1.0,
                bounds: Some(Rect {
                    x: rect.X as i32,
                    y: rect.Y as i32,
                    width: rect.Width as i32,
                    height: rect.Height as i32,
                }),
            });
        }

        raw.lines.push(RawLine { text, words });
    }

    debug!("Windows OCR: found {} lines", raw.lines.len());
    Ok(raw)
}
