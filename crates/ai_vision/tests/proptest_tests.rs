//! Property-based tests for image preprocessing and mean reduction

use ai_vision::mean::channel_means;
use ai_vision::preprocess::image_to_tensor;
use ai_vision::Normalization;
use domain::{ChannelOrder, ImageDimensions};
use image::{DynamicImage, Rgb, RgbImage};
use proptest::prelude::*;

fn order() -> impl Strategy<Value = ChannelOrder> {
    prop_oneof![Just(ChannelOrder::Bgr), Just(ChannelOrder::Rgb)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn tensor_has_model_shape(
        src_w in 1u32..40,
        src_h in 1u32..40,
        h in 1usize..32,
        w in 1usize..32,
        order in order(),
    ) {
        let image = DynamicImage::new_rgb8(src_w, src_h);
        let dims = ImageDimensions::new(1, 3, h, w).unwrap();
        let norm = Normalization::new([0.0; 3], 1.0, order).unwrap();
        let tensor = image_to_tensor(&image, dims, &norm).unwrap();
        prop_assert_eq!(tensor.data().len(), 3 * h * w);
        prop_assert_eq!(tensor.dims().as_nchw(), [1, 3, h, w]);
    }

    #[test]
    fn solid_image_normalizes_per_plane(
        color in prop::array::uniform3(any::<u8>()),
        mean in prop::array::uniform3(-255.0f32..255.0),
        scale in prop_oneof![0.5f32..4.0, -4.0f32..-0.5],
        order in order(),
    ) {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb(color)));
        let dims = ImageDimensions::new(1, 3, 2, 3).unwrap();
        let norm = Normalization::new(mean, scale, order).unwrap();
        let tensor = image_to_tensor(&image, dims, &norm).unwrap();

        let sources = order.source_channels();
        for (plane, values) in tensor.data().chunks(6).enumerate() {
            let expected = (f32::from(color[sources[plane]]) - mean[plane]) / scale;
            for v in values {
                prop_assert!((v - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn constant_planes_reduce_to_their_value(
        values in prop::array::uniform3(-1000.0f32..1000.0),
        plane in 1usize..64,
    ) {
        let buffer: Vec<f32> = values
            .iter()
            .flat_map(|v| std::iter::repeat_n(*v, plane))
            .collect();
        let means = channel_means(&buffer).unwrap();
        for (got, want) in means.iter().zip(values) {
            prop_assert!((got - want).abs() < 1e-3);
        }
    }
}
