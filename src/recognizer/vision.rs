//! Apple Vision backend (VNRecognizeTextRequest via a Swift shim).
//!
//! The shim wraps the Vision framework behind a small C ABI, the same way
//! the screen-reading tools in this family bind Vision. Boxes come back in
//! Vision's normalized, bottom-left-origin space and are converted to
//! top-left pixel coordinates here. Vision reports line-level candidates
//! only, so elements are the line split on spaces, sharing the line's box
//! and confidence.

use std::ffi::{c_char, c_double, c_float, c_uint, c_void, CStr, CString};
use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use tracing::debug;

use crate::error::OcrError;
use crate::options::RecognitionProfile;
use crate::recognizer::{BackendError, LanguageSupport, OcrBackend, RawLine, RawRecognition, RawWord};
use crate::result::Rect;

#[repr(C)]
struct VisionLine {
    text: *const c_char,
    confidence: c_float,
    // Normalized, bottom-left-origin box.
    x: c_double,
    y: c_double,
    width: c_double,
    height: c_double,
}

extern "C" {
    fn vision_recognize_text(
        png_data: *const u8,
        png_len: c_uint,
        language: *const c_char,
        accurate: bool,
        out_lines: *mut *mut c_void,
        out_count: *mut c_uint,
        out_error: *mut *mut c_char,
    ) -> bool;

    fn vision_free_lines(lines: *mut c_void, count: c_uint);

    fn vision_supported_languages(
        accurate: bool,
        out_tags: *mut *mut *mut c_char,
        out_count: *mut c_uint,
    ) -> bool;

    fn vision_free_languages(tags: *mut *mut c_char, count: c_uint);

    fn vision_free_error(error: *mut c_char);
}

/// Apple Vision framework backend.
pub struct VisionBackend;

impl VisionBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VisionBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn languages_for(accurate: bool) -> Result<Vec<String>> {
    let mut tags_ptr: *mut *mut c_char = std::ptr::null_mut();
    let mut count: c_uint = 0;

    let ok = unsafe { vision_supported_languages(accurate, &mut tags_ptr, &mut count) };
    if !ok || tags_ptr.is_null() {
        return Err(anyhow!("failed to query Vision recognition languages"));
    }

    let mut tags = Vec::with_capacity(count as usize);
    unsafe {
        for &tag in std::slice::from_raw_parts(tags_ptr, count as usize) {
            if !tag.is_null() {
                tags.push(CStr::from_ptr(tag).to_string_lossy().into_owned());
            }
        }
        vision_free_languages(tags_ptr, count);
    }

    Ok(tags)
}

#[async_trait]
impl OcrBackend for VisionBackend {
    async fn setup(&self) -> Result<LanguageSupport, OcrError> {
        let support = LanguageSupport {
            fast: languages_for(false)?,
            accurate: languages_for(true)?,
        };
        debug!(
            fast = support.fast.len(),
            accurate = support.accurate.len(),
            "Vision languages enumerated"
        );
        Ok(support)
    }

    async fn recognize(
        &self,
        image: &DynamicImage,
        language: Option<&str>,
        profile: RecognitionProfile,
    ) -> Result<RawRecognition, BackendError> {
        recognize_inner(image, language, profile).map_err(BackendError::Fatal)
    }
}

fn recognize_inner(
    image: &DynamicImage,
    language: Option<&str>,
    profile: RecognitionProfile,
) -> Result<RawRecognition> {
    let (image_width, image_height) = (image.width(), image.height());

    // The shim takes encoded PNG bytes.
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .context("failed to re-encode image for Vision")?;

    let c_language = language
        .map(CString::new)
        .transpose()
        .context("language tag contains a NUL byte")?;
    let accurate = profile == RecognitionProfile::Accurate;

    let mut lines_ptr: *mut c_void = std::ptr::null_mut();
    let mut count: c_uint = 0;
    let mut error_ptr: *mut c_char = std::ptr::null_mut();

    let ok = unsafe {
        vision_recognize_text(
            png.as_ptr(),
            png.len() as c_uint,
            c_language.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            accurate,
            &mut lines_ptr,
            &mut count,
            &mut error_ptr,
        )
    };

    if !ok {
        let message = if error_ptr.is_null() {
            "Vision recognition failed".to_owned()
        } else {
            unsafe {
                let message = CStr::from_ptr(error_ptr).to_string_lossy().into_owned();
                vision_free_error(error_ptr);
                message
            }
        };
        return Err(anyhow!(message));
    }

    let mut raw = RawRecognition::default();
    if !lines_ptr.is_null() {
        unsafe {
            let typed = lines_ptr as *const VisionLine;
            for line in std::slice::from_raw_parts(typed, count as usize) {
                let text = if line.text.is_null() {
                    String::new()
                } else {
                    CStr::from_ptr(line.text).to_string_lossy().into_owned()
                };
                if text.is_empty() {
                    continue;
                }

                let bounds = Rect::from_normalized(
                    line.x,
                    line.y,
                    line.width,
                    line.height,
                    image_width,
                    image_height,
                );
                let words = text
                    .split(' ')
                    .map(|word| RawWord {
                        text: word.to_owned(),
                        confidence: line.confidence,
                        bounds: Some(bounds),
                    })
                    .collect();

                raw.lines.push(RawLine { text, words });
            }
            vision_free_lines(lines_ptr, count);
        }
    }

    debug!("Vision: found {} lines", raw.lines.len());
    Ok(raw)
}
