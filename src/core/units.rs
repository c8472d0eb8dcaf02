//! Conversions between physical page lengths (millimetres) and pixel counts
//! at a given print resolution.

/// Millimetres per inch, the fixed constant relating DPI to pixels-per-mm.
pub const MM_PER_INCH: f64 = 25.4;

/// Converts millimetres to pixels at the given DPI.
///
/// Precondition: `dpi > 0`. Not enforced here; the geometry layer validates
/// resolution before any conversion takes place.
pub fn mm_to_px(mm: f64, dpi: f64) -> f64 {
    mm * (dpi / MM_PER_INCH)
}

/// Converts pixels to millimetres at the given DPI. Exact inverse of
/// [`mm_to_px`].
pub fn px_to_mm(px: f64, dpi: f64) -> f64 {
    px / (dpi / MM_PER_INCH)
}
