//! Image preprocessing
//!
//! Turns uploaded image bytes into the `[1, 3, 224, 224]` tensor the skin
//! classifier was trained on. Pixel values are scaled to [0, 1] by dividing
//! by 255 and nothing else: the training pipeline applied no mean/std
//! normalization, and a mismatch here silently degrades every prediction.

use image::{imageops::FilterType, DynamicImage, RgbImage};

use crate::utils::error::{DiagnosisError, Result};

/// Input resolution of the image model (width and height)
pub const IMAGE_SIZE: u32 = 224;

/// Number of input channels (RGB)
pub const CHANNELS: usize = 3;

/// A single preprocessed image, CHW layout with a leading batch dimension of 1
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    height: usize,
    width: usize,
}

impl ImageTensor {
    /// Tensor shape: [batch, channels, height, width]
    pub fn shape(&self) -> [usize; 4] {
        [1, CHANNELS, self.height, self.width]
    }

    /// Flattened values in CHW order
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Value at (channel, y, x)
    pub fn get(&self, channel: usize, y: usize, x: usize) -> f32 {
        self.data[channel * self.height * self.width + y * self.width + x]
    }
}

/// Decode raw bytes into an image
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(DiagnosisError::InvalidInput(
            "Invalid image file: empty payload".to_string(),
        ));
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Resize to the model geometry with nearest-neighbour resampling
fn resize_image(image: &DynamicImage, size: u32) -> RgbImage {
    image.resize_exact(size, size, FilterType::Nearest).to_rgb8()
}

/// Scale to [0, 1] and lay out as CHW
fn to_chw_tensor(rgb: &RgbImage) -> ImageTensor {
    let (width, height) = rgb.dimensions();
    let num_pixels = (width * height) as usize;

    let mut data = vec![0.0f32; CHANNELS * num_pixels];

    for (i, pixel) in rgb.pixels().enumerate() {
        // CHW layout: all R values, then all G values, then all B values
        data[i] = pixel[0] as f32 / 255.0;
        data[num_pixels + i] = pixel[1] as f32 / 255.0;
        data[2 * num_pixels + i] = pixel[2] as f32 / 255.0;
    }

    ImageTensor {
        data,
        height: height as usize,
        width: width as usize,
    }
}

/// Preprocess an already decoded image
pub fn preprocess_image(image: &DynamicImage) -> ImageTensor {
    let resized = resize_image(image, IMAGE_SIZE);
    to_chw_tensor(&resized)
}

/// Decode, resize and scale raw image bytes
///
/// Fails with `InvalidInput` carrying the decoder message when the bytes are
/// not a decodable image.
pub fn preprocess_bytes(bytes: &[u8]) -> Result<ImageTensor> {
    let image = decode_image(bytes)?;
    Ok(preprocess_image(&image))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{GrayImage, ImageFormat, Luma, Rgb, Rgba, RgbaImage};

    use super::*;
    use crate::ErrorKind;

    fn encode_png(image: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_empty_bytes_are_invalid_input() {
        let err = preprocess_bytes(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_garbage_bytes_are_invalid_input() {
        let err = preprocess_bytes(b"definitely not a jpeg").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("Invalid image file"));
    }

    #[test]
    fn test_output_geometry() {
        let bytes = encode_png(DynamicImage::new_rgb8(100, 40));
        let tensor = preprocess_bytes(&bytes).unwrap();

        assert_eq!(tensor.shape(), [1, 3, 224, 224]);
        assert_eq!(tensor.as_slice().len(), 3 * 224 * 224);
    }

    #[test]
    fn test_scaling_and_channel_order() {
        let img = RgbImage::from_pixel(10, 20, Rgb([255, 0, 51]));
        let tensor = preprocess_bytes(&encode_png(DynamicImage::ImageRgb8(img))).unwrap();

        assert_eq!(tensor.get(0, 0, 0), 1.0);
        assert_eq!(tensor.get(1, 100, 100), 0.0);
        assert!((tensor.get(2, 223, 223) - 0.2).abs() < 1e-6);
        assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_alpha_is_dropped() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 10]));
        let tensor = preprocess_image(&DynamicImage::ImageRgba8(img));

        assert_eq!(tensor.shape()[1], 3);
        assert_eq!(tensor.get(1, 5, 5), 1.0);
    }

    #[test]
    fn test_grayscale_expands_to_rgb() {
        let img = GrayImage::from_pixel(16, 16, Luma([255]));
        let tensor = preprocess_image(&DynamicImage::ImageLuma8(img));

        for channel in 0..3 {
            assert_eq!(tensor.get(channel, 7, 7), 1.0);
        }
    }
}
