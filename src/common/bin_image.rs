use fast_image_resize::images::Image as FirImage;
use fast_image_resize::PixelType;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::common::error::{BinError, Result};

/// A decoded bin photograph, always 3-channel RGB.
#[derive(Debug, Clone, Default)]
pub struct BinImage {
    pub image: RgbImage,
}

impl std::ops::Deref for BinImage {
    type Target = RgbImage;

    fn deref(&self) -> &Self::Target {
        &self.image
    }
}

impl From<DynamicImage> for BinImage {
    fn from(image: DynamicImage) -> Self {
        Self {
            image: image.to_rgb8(),
        }
    }
}

impl From<GrayImage> for BinImage {
    fn from(image: GrayImage) -> Self {
        Self {
            image: DynamicImage::from(image).to_rgb8(),
        }
    }
}

impl From<RgbImage> for BinImage {
    fn from(image: RgbImage) -> Self {
        Self { image }
    }
}

impl From<RgbaImage> for BinImage {
    fn from(image: RgbaImage) -> Self {
        Self {
            image: DynamicImage::from(image).to_rgb8(),
        }
    }
}

impl BinImage {
    /// Decodes uploaded bytes, guessing the container format from its magic number.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(BinError::Decode("image upload is empty".to_string()));
        }
        let image = image::load_from_memory(bytes)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(BinError::Decode("image has no pixels".to_string()));
        }
        Ok(Self::from(image))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Moves the pixel buffer into a `fast_image_resize` image without copying.
    pub fn into_fir_image(self) -> Result<FirImage<'static>> {
        let (width, height) = self.image.dimensions();
        FirImage::from_vec_u8(width, height, self.image.into_raw(), PixelType::U8x3)
            .map_err(|e| BinError::Decode(format!("unsupported pixel buffer: {e}")))
    }
}
