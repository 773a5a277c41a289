use crate::{
    config::AnalyzerConfig,
    error::AnalyzerError,
    model::NormalizedImage,
};
use image::{DynamicImage, imageops::FilterType};
use kornia_image::{Image, ImageSize, allocator::CpuAllocator};

/// Returns the centered square crop `(left, top, side)` for an image of `width x height`.
///
/// Offsets use truncating division on each term, so odd sizes lean one pixel
/// towards the top-left.
pub fn crop_box(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    let left = width / 2 - side / 2;
    let top = height / 2 - side / 2;
    (left, top, side)
}

/// Turns arbitrary encoded images into fixed-size RGB model inputs.
#[derive(Clone, Debug)]
pub struct Normalizer {
    target: ImageSize,
    filter: FilterType,
}

impl Normalizer {
    pub fn new(target: ImageSize) -> Self {
        Self {
            target,
            filter: FilterType::CatmullRom,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.target_size).with_filter(config.filter)
    }

    /// Sets the resampling filter used for the resize pass.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn target_size(&self) -> ImageSize {
        self.target
    }

    /// Decodes `raw`, center-crops it to a square and resizes it to the target size.
    ///
    /// Grayscale, palette and alpha layouts are converted to RGB before cropping;
    /// alpha is dropped without blending. Samples stay in the 0-255 range.
    /// The resampler only reads pixels inside the crop, so edge pixels are not
    /// bit-identical to resamplers that sample across the crop box.
    pub fn normalize(&self, raw: &[u8]) -> Result<NormalizedImage, AnalyzerError> {
        let ImageSize { width, height } = self.target;
        let (target_w, target_h) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(AnalyzerError::InvalidTargetSize { width, height }),
        };

        let decoded = image::load_from_memory(raw)?;
        log::debug!(
            "Decoded {}x{} image ({:?})",
            decoded.width(),
            decoded.height(),
            decoded.color()
        );

        let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
        let (left, top, side) = crop_box(rgb.width(), rgb.height());
        let resized = rgb
            .crop_imm(left, top, side, side)
            .resize_exact(target_w, target_h, self.filter)
            .into_rgb8();

        Ok(Image::new(self.target, resized.into_raw(), CpuAllocator)?)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_config(&AnalyzerConfig::default())
    }
}

/// Normalizes `raw` to `target` with the default resampling filter.
pub fn normalize(raw: &[u8], target: ImageSize) -> Result<NormalizedImage, AnalyzerError> {
    Normalizer::new(target).normalize(raw)
}
