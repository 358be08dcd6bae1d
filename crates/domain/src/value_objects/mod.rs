//! Value Objects - Immutable, identity-less domain primitives

mod channel_order;
pub(crate) mod framework;
mod image_dimensions;
mod mean_source;
mod parameter_value;

pub use channel_order::ChannelOrder;
pub use framework::FrameworkManifest;
pub use image_dimensions::ImageDimensions;
pub use mean_source::MeanSource;
pub use parameter_value::ParameterValue;
