//! Image preprocessing
//!
//! Turns a decoded image into the channel-planar float tensor a classifier
//! expects: resize to the model's extent, subtract the per-channel mean,
//! divide by the scale and lay the planes out in the model's color order.

use domain::{ChannelOrder, ImageDimensions};
use image::DynamicImage;
use image::imageops::FilterType;
use rayon::prelude::*;

use crate::error::VisionError;
use crate::ports::InputTensor;

/// Per-channel normalization applied to every pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    /// Mean per tensor plane, in plane order
    pub mean: [f32; 3],
    /// Divisor applied after mean subtraction
    pub scale: f32,
    /// Which color feeds which plane
    pub order: ChannelOrder,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            mean: [0.0; 3],
            scale: 1.0,
            order: ChannelOrder::default(),
        }
    }
}

impl Normalization {
    pub fn new(mean: [f32; 3], scale: f32, order: ChannelOrder) -> Result<Self, VisionError> {
        if scale == 0.0 || !scale.is_finite() {
            return Err(VisionError::InvalidInput(format!(
                "scale must be finite and non-zero, got {scale}"
            )));
        }
        Ok(Self { mean, scale, order })
    }
}

/// Resize and normalize `image` into a single-image C×H×W tensor
pub fn image_to_tensor(
    image: &DynamicImage,
    dims: ImageDimensions,
    norm: &Normalization,
) -> Result<InputTensor, VisionError> {
    if dims.channels() != 3 {
        return Err(VisionError::InvalidInput(format!(
            "expected 3 channels, got {}",
            dims.channels()
        )));
    }
    let width = extent(dims.width(), "width")?;
    let height = extent(dims.height(), "height")?;

    let rgb = if image.width() == width && image.height() == height {
        image.to_rgb8()
    } else {
        image.resize_exact(width, height, FilterType::Triangle).to_rgb8()
    };
    let pixels = rgb.as_raw();

    let plane_len = dims.plane_len();
    let mut data = vec![0.0_f32; 3 * plane_len];
    let sources = norm.order.source_channels();

    data.par_chunks_mut(plane_len)
        .enumerate()
        .for_each(|(plane, out)| {
            let source = sources[plane];
            let mean = norm.mean[plane];
            for (value, pixel) in out.iter_mut().zip(pixels.chunks_exact(3)) {
                *value = (f32::from(pixel[source]) - mean) / norm.scale;
            }
        });

    InputTensor::new(data, dims)
}

fn extent(value: usize, name: &str) -> Result<u32, VisionError> {
    u32::try_from(value)
        .map_err(|_| VisionError::InvalidInput(format!("{name} {value} is too large")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    fn dims(h: usize, w: usize) -> ImageDimensions {
        ImageDimensions::new(1, 3, h, w).unwrap()
    }

    #[test]
    fn bgr_planes_by_default() {
        let tensor =
            image_to_tensor(&solid(2, 2, [10, 20, 30]), dims(2, 2), &Normalization::default())
                .unwrap();
        let data = tensor.data();
        assert_eq!(&data[0..4], &[30.0; 4]);
        assert_eq!(&data[4..8], &[20.0; 4]);
        assert_eq!(&data[8..12], &[10.0; 4]);
    }

    #[test]
    fn rgb_planes_on_request() {
        let norm = Normalization::new([0.0; 3], 1.0, ChannelOrder::Rgb).unwrap();
        let tensor = image_to_tensor(&solid(1, 1, [10, 20, 30]), dims(1, 1), &norm).unwrap();
        assert_eq!(tensor.data(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn mean_and_scale_apply_per_plane() {
        let norm = Normalization::new([30.0, 10.0, 0.0], 2.0, ChannelOrder::Bgr).unwrap();
        let tensor = image_to_tensor(&solid(1, 1, [10, 20, 30]), dims(1, 1), &norm).unwrap();
        assert_eq!(tensor.data(), &[0.0, 5.0, 5.0]);
    }

    #[test]
    fn resizes_to_model_extent() {
        let tensor =
            image_to_tensor(&solid(64, 48, [1, 2, 3]), dims(8, 4), &Normalization::default())
                .unwrap();
        assert_eq!(tensor.data().len(), 3 * 8 * 4);
        assert_eq!(tensor.dims().as_nchw(), [1, 3, 8, 4]);
        assert!(tensor.data()[..32].iter().all(|v| (*v - 3.0).abs() < f32::EPSILON));
    }

    #[test]
    fn grayscale_input_is_expanded() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(2, 2, image::Luma([7])));
        let tensor = image_to_tensor(&gray, dims(2, 2), &Normalization::default()).unwrap();
        assert!(tensor.data().iter().all(|v| *v == 7.0));
    }

    #[test]
    fn zero_scale_is_rejected() {
        assert!(Normalization::new([0.0; 3], 0.0, ChannelOrder::Bgr).is_err());
        assert!(Normalization::new([0.0; 3], f32::NAN, ChannelOrder::Bgr).is_err());
    }

    #[test]
    fn non_rgb_model_is_rejected() {
        let one_channel = ImageDimensions::new(1, 1, 2, 2).unwrap();
        let err = image_to_tensor(&solid(2, 2, [0, 0, 0]), one_channel, &Normalization::default())
            .unwrap_err();
        assert!(matches!(err, VisionError::InvalidInput(_)));
    }
}
