//! Maps an arbitrarily sized raster surface onto an A4 page: aspect-preserving
//! scale selection, margin-aware centering and orientation handling.

use fast_image_resize as fr;
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::core::formats::PageFormat;
use crate::core::units::mm_to_px;
use crate::error::ConvertError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Page margins in millimetres, independently specifiable per edge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub const fn zero() -> Self {
        Self::uniform(0.0)
    }

    pub const fn uniform(mm: f64) -> Self {
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }

    fn each(&self) -> [f64; 4] {
        [self.top, self.right, self.bottom, self.left]
    }
}

/// How a source surface is fitted onto an A4 page. Immutable value object,
/// constructed per call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageConfiguration {
    pub orientation: Orientation,
    /// Margins in millimetres.
    pub margins: Margins,
    /// Print resolution in dots per inch.
    pub dpi: f64,
    /// Upper bound on the scale factor.
    pub max_scale: f64,
    /// When false the surface is never upscaled, only shrunk to fit.
    pub fit_to_page: bool,
}

impl Default for PageConfiguration {
    fn default() -> Self {
        Self {
            orientation: Orientation::Portrait,
            margins: Margins::uniform(10.0),
            dpi: 300.0,
            max_scale: 1.0,
            fit_to_page: true,
        }
    }
}

impl PageConfiguration {
    /// Rejects configurations that cannot produce a placement: non-positive
    /// resolution or max scale, negative margins, or margins that consume the
    /// whole page for the chosen orientation. Nothing is silently clamped.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !self.dpi.is_finite() || self.dpi <= 0.0 {
            return Err(ConvertError::Configuration(format!(
                "resolution must be positive, got {}",
                self.dpi
            )));
        }
        if !self.max_scale.is_finite() || self.max_scale <= 0.0 {
            return Err(ConvertError::Configuration(format!(
                "max scale must be positive, got {}",
                self.max_scale
            )));
        }
        if self.margins.each().iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(ConvertError::Configuration(
                "margins must be non-negative".to_string(),
            ));
        }
        let (page_w, page_h) = self.page_mm();
        if self.margins.horizontal() >= page_w || self.margins.vertical() >= page_h {
            return Err(ConvertError::Configuration(format!(
                "margins leave no printable area on a {page_w}x{page_h}mm page"
            )));
        }
        Ok(())
    }

    /// A4 dimensions in millimetres with the orientation applied.
    pub fn page_mm(&self) -> (f64, f64) {
        PageFormat::A4.oriented(self.orientation)
    }

    /// Full page size in pixels at the configured resolution.
    pub fn page_px(&self) -> (f64, f64) {
        let (w, h) = self.page_mm();
        (mm_to_px(w, self.dpi), mm_to_px(h, self.dpi))
    }

    /// Printable area in pixels: the page minus all four margins.
    pub fn printable_px(&self) -> (f64, f64) {
        let (page_w, page_h) = self.page_mm();
        (
            mm_to_px(page_w - self.margins.horizontal(), self.dpi),
            mm_to_px(page_h - self.margins.vertical(), self.dpi),
        )
    }
}

/// Pixel dimensions of a source surface before placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Where and how large a source surface lands on the page. Dimensions and
/// offsets are pixels, scale is the dimensionless ratio applied uniformly to
/// both axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub width: f64,
    pub height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

/// Computes the centered, aspect-preserving placement of `source` inside the
/// printable area described by `config`.
///
/// Pure and deterministic: identical inputs always yield identical outputs.
pub fn compute_placement(
    source: SurfaceSize,
    config: &PageConfiguration,
) -> Result<Placement, ConvertError> {
    config.validate()?;
    if source.width == 0 || source.height == 0 {
        return Err(ConvertError::Configuration(format!(
            "source surface must have positive dimensions, got {}x{}",
            source.width, source.height
        )));
    }

    let (printable_w, printable_h) = config.printable_px();

    // Largest uniform scale that fits the surface without cropping.
    let mut scale = f64::min(
        printable_w / source.width as f64,
        printable_h / source.height as f64,
    );
    scale = scale.min(config.max_scale);
    if !config.fit_to_page {
        // Never upscale when fit-to-page is disabled.
        scale = scale.min(1.0);
    }

    let width = source.width as f64 * scale;
    let height = source.height as f64 * scale;

    let offset_x = mm_to_px(config.margins.left, config.dpi) + (printable_w - width) / 2.0;
    let offset_y = mm_to_px(config.margins.top, config.dpi) + (printable_h - height) / 2.0;

    Ok(Placement {
        width,
        height,
        offset_x,
        offset_y,
        scale,
    })
}

/// Materializes a full A4 page surface with `source` drawn at its computed
/// placement over an opaque white background.
///
/// The returned image always has page-proportioned pixel dimensions; content
/// is letterboxed inside it, never cropped and never distorted.
pub fn materialize_page(
    source: &DynamicImage,
    config: &PageConfiguration,
) -> Result<RgbaImage, ConvertError> {
    let (src_w, src_h) = (source.width(), source.height());
    let placement = compute_placement(SurfaceSize::new(src_w, src_h), config)?;

    let (page_w, page_h) = config.page_px();
    let page_w = page_w.round().max(1.0) as u32;
    let page_h = page_h.round().max(1.0) as u32;

    let mut page = RgbaImage::from_pixel(page_w, page_h, Rgba([255, 255, 255, 255]));

    let target_w = placement.width.round().max(1.0) as u32;
    let target_h = placement.height.round().max(1.0) as u32;

    let scaled = if (target_w, target_h) == (src_w, src_h) {
        source.to_rgba8()
    } else {
        match fast_resize(source, target_w, target_h) {
            Ok(resized) => resized,
            Err(e) => {
                tracing::warn!("Fast resize failed: {e}, falling back to slow resize");
                source
                    .resize_exact(target_w, target_h, image::imageops::FilterType::Lanczos3)
                    .to_rgba8()
            }
        }
    };

    image::imageops::overlay(
        &mut page,
        &scaled,
        placement.offset_x.round() as i64,
        placement.offset_y.round() as i64,
    );

    Ok(page)
}

/// Resize through fast_image_resize with a Lanczos3 kernel.
fn fast_resize(source: &DynamicImage, width: u32, height: u32) -> anyhow::Result<RgbaImage> {
    use anyhow::anyhow;
    use std::num::NonZeroU32;

    let rgba = source.to_rgba8();
    let (src_w, src_h) = rgba.dimensions();

    let src = fr::Image::from_vec_u8(
        NonZeroU32::new(src_w).ok_or_else(|| anyhow!("zero source width"))?,
        NonZeroU32::new(src_h).ok_or_else(|| anyhow!("zero source height"))?,
        rgba.into_raw(),
        fr::PixelType::U8x4,
    )?;

    let dst_w = NonZeroU32::new(width).ok_or_else(|| anyhow!("zero target width"))?;
    let dst_h = NonZeroU32::new(height).ok_or_else(|| anyhow!("zero target height"))?;
    let mut dst = fr::Image::new(dst_w, dst_h, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));
    resizer.resize(&src.view(), &mut dst.view_mut())?;

    ImageBuffer::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| anyhow!("resized buffer has wrong length"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::mm_to_px;

    const EPS: f64 = 1e-6;

    fn config() -> PageConfiguration {
        PageConfiguration::default()
    }

    #[test]
    fn caps_scale_at_max_scale() {
        // 800x600 fits many times into the printable area at 300 dpi, so the
        // max_scale of 1 is the binding constraint.
        let placement = compute_placement(SurfaceSize::new(800, 600), &config()).unwrap();

        assert!((placement.scale - 1.0).abs() < EPS);
        assert!((placement.width - 800.0).abs() < EPS);
        assert!((placement.height - 600.0).abs() < EPS);

        let (printable_w, printable_h) = config().printable_px();
        let margin_px = mm_to_px(10.0, 300.0);
        assert!((placement.offset_x - (margin_px + (printable_w - 800.0) / 2.0)).abs() < EPS);
        assert!((placement.offset_y - (margin_px + (printable_h - 600.0) / 2.0)).abs() < EPS);
    }

    #[test]
    fn downscales_oversized_surfaces_preserving_aspect_ratio() {
        let source = SurfaceSize::new(8000, 3000);
        let placement = compute_placement(source, &config()).unwrap();
        let (printable_w, printable_h) = config().printable_px();

        assert!(placement.scale > 0.0 && placement.scale < 1.0);
        assert!(placement.width <= printable_w + EPS);
        assert!(placement.height <= printable_h + EPS);

        let source_ratio = source.width as f64 / source.height as f64;
        let placed_ratio = placement.width / placement.height;
        assert!((source_ratio - placed_ratio).abs() < EPS);
    }

    #[test]
    fn centers_with_symmetric_residual_space() {
        let placement = compute_placement(SurfaceSize::new(1000, 1000), &config()).unwrap();
        let (printable_w, printable_h) = config().printable_px();
        let margin_px = mm_to_px(10.0, 300.0);

        let left_gap = placement.offset_x - margin_px;
        let right_gap = printable_w - placement.width - left_gap;
        assert!((left_gap - right_gap).abs() < EPS);

        let top_gap = placement.offset_y - margin_px;
        let bottom_gap = printable_h - placement.height - top_gap;
        assert!((top_gap - bottom_gap).abs() < EPS);
    }

    #[test]
    fn fit_to_page_enables_upscaling() {
        let cfg = PageConfiguration {
            max_scale: 10.0,
            ..config()
        };
        let placement = compute_placement(SurfaceSize::new(100, 100), &cfg).unwrap();
        assert!(placement.scale > 1.0);

        let no_fit = PageConfiguration {
            fit_to_page: false,
            ..cfg
        };
        let placement = compute_placement(SurfaceSize::new(100, 100), &no_fit).unwrap();
        assert!((placement.scale - 1.0).abs() < EPS);
    }

    #[test]
    fn fit_to_page_disabled_never_upscales() {
        for (w, h) in [(10, 10), (500, 20), (3000, 4000), (10_000, 50)] {
            let cfg = PageConfiguration {
                fit_to_page: false,
                max_scale: 100.0,
                ..config()
            };
            let placement = compute_placement(SurfaceSize::new(w, h), &cfg).unwrap();
            assert!(placement.scale <= 1.0 + EPS, "{w}x{h} upscaled");
        }
    }

    #[test]
    fn source_matching_printable_area_lands_on_the_margins() {
        let cfg = PageConfiguration {
            dpi: 25.4, // 1 px per mm keeps the arithmetic exact
            margins: Margins::uniform(10.0),
            ..config()
        };
        // Printable area is (210-20) x (297-20) px.
        let placement = compute_placement(SurfaceSize::new(190, 277), &cfg).unwrap();

        assert!((placement.scale - 1.0).abs() < EPS);
        assert!((placement.offset_x - 10.0).abs() < EPS);
        assert!((placement.offset_y - 10.0).abs() < EPS);
    }

    #[test]
    fn landscape_swaps_printable_axes() {
        let portrait = config();
        let landscape = PageConfiguration {
            orientation: Orientation::Landscape,
            ..config()
        };

        let (pw, ph) = portrait.printable_px();
        let (lw, lh) = landscape.printable_px();
        assert!((pw - lh).abs() < EPS);
        assert!((ph - lw).abs() < EPS);

        // A wide surface fits better on the landscape page.
        let source = SurfaceSize::new(4000, 1000);
        let cfg_unclamped = |o| PageConfiguration {
            orientation: o,
            max_scale: 100.0,
            ..config()
        };
        let p = compute_placement(source, &cfg_unclamped(Orientation::Portrait)).unwrap();
        let l = compute_placement(source, &cfg_unclamped(Orientation::Landscape)).unwrap();
        assert!(l.scale > p.scale);
    }

    #[test]
    fn rejects_invalid_configurations() {
        let zero_dpi = PageConfiguration { dpi: 0.0, ..config() };
        assert!(matches!(
            compute_placement(SurfaceSize::new(10, 10), &zero_dpi),
            Err(ConvertError::Configuration(_))
        ));

        let negative_margin = PageConfiguration {
            margins: Margins { top: -1.0, right: 0.0, bottom: 0.0, left: 0.0 },
            ..config()
        };
        assert!(negative_margin.validate().is_err());

        let swallowing_margins = PageConfiguration {
            margins: Margins::uniform(150.0),
            ..config()
        };
        assert!(swallowing_margins.validate().is_err());

        let bad_scale = PageConfiguration { max_scale: 0.0, ..config() };
        assert!(bad_scale.validate().is_err());
    }

    #[test]
    fn rejects_zero_sized_sources() {
        assert!(matches!(
            compute_placement(SurfaceSize::new(0, 100), &config()),
            Err(ConvertError::Configuration(_))
        ));
        assert!(matches!(
            compute_placement(SurfaceSize::new(100, 0), &config()),
            Err(ConvertError::Configuration(_))
        ));
    }

    #[test]
    fn materialized_page_is_page_sized_and_letterboxed() {
        let cfg = PageConfiguration {
            dpi: 25.4,
            margins: Margins::zero(),
            max_scale: 100.0,
            ..config()
        };
        let source =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 5, Rgba([255, 0, 0, 255])));

        let page = materialize_page(&source, &cfg).unwrap();
        assert_eq!(page.dimensions(), (210, 297));

        // scale = min(210/10, 297/5) = 21, so the content spans the full
        // width and is centered vertically: rows 96..201.
        assert_eq!(page.get_pixel(105, 148), &Rgba([255, 0, 0, 255]));
        assert_eq!(page.get_pixel(105, 10), &Rgba([255, 255, 255, 255]));
        assert_eq!(page.get_pixel(105, 290), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn materialize_keeps_exact_fit_unscaled() {
        let cfg = PageConfiguration {
            dpi: 25.4,
            margins: Margins::uniform(10.0),
            ..config()
        };
        let source =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(190, 277, Rgba([0, 0, 255, 255])));

        let page = materialize_page(&source, &cfg).unwrap();
        assert_eq!(page.dimensions(), (210, 297));
        assert_eq!(page.get_pixel(10, 10), &Rgba([0, 0, 255, 255]));
        assert_eq!(page.get_pixel(5, 5), &Rgba([255, 255, 255, 255]));
        assert_eq!(page.get_pixel(199, 286), &Rgba([0, 0, 255, 255]));
    }
}
