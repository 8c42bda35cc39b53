use image::error::{ImageFormatHint, UnsupportedErrorKind};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageError, ImageReader, Luma, RgbImage};
use imageproc::filter::separable_filter_equal;
use scanline_core::PreprocessSettings;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::clahe::Clahe;

/// Fixed 3-tap Gaussian used for a 3×3 kernel with automatic sigma.
const GAUSSIAN_3: [f32; 3] = [0.25, 0.5, 0.25];

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("No image source provided")]
    NoSource,
    #[error("Provide either an image path or image data, not both")]
    AmbiguousSource,
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    /// The bytes are not a readable image.
    #[error("Failed to decode image: {0}")]
    Decode(ImageError),
    /// A recognized image the decoder cannot handle, or one that exceeds
    /// decoder limits.
    #[error("Image cannot be processed: {0}")]
    Unprocessable(ImageError),
    #[error("Upscaled size of {width}x{height} by {scale} overflows")]
    TooLarge { width: u32, height: u32, scale: u32 },
}

impl PreprocessError {
    /// Whether the caller supplied a bad or missing image, as opposed to a
    /// server-side failure while handling a valid one.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            PreprocessError::NoSource
            | PreprocessError::AmbiguousSource
            | PreprocessError::Io(_)
            | PreprocessError::Decode(_) => true,
            PreprocessError::Unprocessable(_) | PreprocessError::TooLarge { .. } => false,
        }
    }
}

impl From<ImageError> for PreprocessError {
    fn from(e: ImageError) -> Self {
        let unprocessable = match &e {
            ImageError::Limits(_) => true,
            // Unknown format means the content is not an image at all.
            ImageError::Unsupported(u) => {
                !matches!(u.kind(), UnsupportedErrorKind::Format(ImageFormatHint::Unknown))
            }
            _ => false,
        };
        if unprocessable {
            PreprocessError::Unprocessable(e)
        } else {
            PreprocessError::Decode(e)
        }
    }
}

/// Where the raw image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Decoded(DynamicImage),
}

impl ImageSource {
    /// Exactly one of `path` or `buffer` must be set.
    pub fn from_parts(
        path: Option<PathBuf>,
        buffer: Option<Vec<u8>>,
    ) -> Result<Self, PreprocessError> {
        match (path, buffer) {
            (Some(path), None) => Ok(ImageSource::Path(path)),
            (None, Some(buffer)) => Ok(ImageSource::Bytes(buffer)),
            (None, None) => Err(PreprocessError::NoSource),
            (Some(_), Some(_)) => Err(PreprocessError::AmbiguousSource),
        }
    }

    pub fn load(self) -> Result<DynamicImage, PreprocessError> {
        match self {
            // Sniff the content rather than trusting the file extension.
            ImageSource::Path(path) => Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?),
            ImageSource::Bytes(data) => Ok(image::load_from_memory(&data)?),
            ImageSource::Decoded(img) => Ok(img),
        }
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(img: DynamicImage) -> Self {
        ImageSource::Decoded(img)
    }
}

/// Conditions a raw scan for the recognizer: upscale, grayscale, CLAHE,
/// 3×3 Gaussian, back to three channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePreprocessor {
    pub scale: u32,
    pub clip_limit: f32,
    pub tile_grid: u32,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::from_settings(&PreprocessSettings::default())
    }
}

impl ImagePreprocessor {
    pub fn from_settings(settings: &PreprocessSettings) -> Self {
        Self {
            scale: settings.scale.max(1),
            clip_limit: settings.clip_limit,
            tile_grid: settings.tile_grid.max(1),
        }
    }

    /// Load `source` and normalize it.
    pub fn prepare(&self, source: ImageSource) -> Result<RgbImage, PreprocessError> {
        let img = source.load()?;
        self.normalize(&img)
    }

    pub fn normalize(&self, img: &DynamicImage) -> Result<RgbImage, PreprocessError> {
        let (width, height) = (img.width(), img.height());
        debug!(width, height, scale = self.scale, "normalizing image");

        let too_large = || PreprocessError::TooLarge { width, height, scale: self.scale };
        let target_w = width.checked_mul(self.scale).ok_or_else(too_large)?;
        let target_h = height.checked_mul(self.scale).ok_or_else(too_large)?;

        // Cubic upscale helps the recognizer with small glyphs.
        let upscaled = img.resize_exact(target_w, target_h, FilterType::CatmullRom);
        let gray = to_gray_bt601(&upscaled);
        let equalized = Clahe::new(self.clip_limit, self.tile_grid).apply(&gray);
        let smoothed: GrayImage = separable_filter_equal(&equalized, &GAUSSIAN_3[..]);

        Ok(DynamicImage::ImageLuma8(smoothed).to_rgb8())
    }
}

/// BT.601 luma in 14-bit fixed point, rounding half up.
pub(crate) fn to_gray_bt601(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = (u32::from(r) * 4899 + u32::from(g) * 9617 + u32::from(b) * 1868 + 8192) >> 14;
        Luma([luma as u8])
    })
}

/// Encode a normalized image as PNG, e.g. for shipping to a remote recognizer.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
