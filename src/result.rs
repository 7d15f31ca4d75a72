//! Normalized recognition results.

/// Pixel-space bounding box with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Converts a normalized, bottom-left-origin box (the Vision framework
    /// convention) into top-left-origin pixel coordinates.
    pub fn from_normalized(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        let img_w = f64::from(image_width);
        let img_h = f64::from(image_height);
        Self {
            x: (x * img_w).round() as i32,
            y: ((1.0 - y - height) * img_h).round() as i32,
            width: (width * img_w).round() as i32,
            height: (height * img_h).round() as i32,
        }
    }
}

/// One recognized word or token.
#[derive(Debug, Clone)]
pub struct OcrElement {
    pub text: String,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
    /// Pixel bounds; not every engine reports geometry.
    pub bounds: Option<Rect>,
}

/// The normalized result of one recognition call.
///
/// Containers are always present: a failed or empty recognition carries
/// empty collections, never absent ones.
#[derive(Debug, Clone, Default)]
pub struct OcrResult {
    /// Whether recognition ran to completion.
    pub success: bool,
    /// All recognized lines joined with single spaces.
    pub all_text: String,
    /// Recognized lines, top to bottom.
    pub lines: Vec<String>,
    /// Recognized words/tokens across all lines, in reading order.
    pub elements: Vec<OcrElement>,
    /// Pattern matches over `all_text`, in pattern-config order.
    pub matched_values: Vec<String>,
}
