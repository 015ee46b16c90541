//! frameresize — per-frame crop and scale for live video
//!
//! Takes one captured frame (a row-strided packed pixel buffer), crops a
//! rectangle out of it and resizes the crop, producing a new frame in the
//! same pixel format that carries the source timing and orientation.
//!
//! # Features
//!
//! - **Zero-copy input**: the source is read through a scoped read lock and
//!   never copied, mutated or released
//! - **Area resampling**: exact overlap-weighted averaging per channel
//! - **Two strategies**: direct resampling, or cropping through an image
//!   graph renderer with a shared render context
//! - **Typed failures**: one [`Error`] enum, no panics across the API
//!
//! # Example
//!
//! ```rust
//! use frameresize::{Frame, Orientation, PixelBuffer, PixelFormat, SampleTiming};
//!
//! fn main() -> frameresize::Result<()> {
//!     let buffer = PixelBuffer::from_packed(vec![0; 640 * 480 * 4], 640, 480, PixelFormat::Bgra8888)?;
//!     let frame = Frame::new(buffer, SampleTiming::default(), Orientation::Up)?;
//!
//!     let thumb = frameresize::resize(&frame, 0, 0, 640, 480, Some((160, 120)))?;
//!     assert_eq!((thumb.width(), thumb.height()), (160, 120));
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod processing;
pub mod render;
pub mod resizer;
pub mod types;

// Re-exports for convenience
pub use buffer::{BufferDescriptor, DestinationBuffer, PixelBuffer};
pub use config::{Limits, ResizeConfig, StrategyKind, TimingPolicy};
pub use error::{Error, GeometryError, Result};
pub use frame::{FormatDescription, Frame};
pub use geometry::{CropWindow, ResolvedGeometry};
pub use render::{context_generation, reset_shared_context, shared_context};
pub use resizer::{CropRequest, FrameResizer, ResizeStats, ResizeStrategy, Resized, ResizerBuilder};
pub use types::{MediaTime, Orientation, PixelFormat, Rect, SampleTiming, ScaleTarget, Size};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crop `frame` to the given window and optionally scale it.
///
/// Uses the default configuration: direct resampling, source timing kept.
/// Without `scale` the output has the crop size.
pub fn resize(
    frame: &Frame,
    crop_x: i64,
    crop_y: i64,
    crop_width: i64,
    crop_height: i64,
    scale: Option<(i64, i64)>,
) -> Result<Frame> {
    let mut request = CropRequest::new(crop_x, crop_y, crop_width, crop_height);
    if let Some((width, height)) = scale {
        request = request.with_scale(width, height);
    }
    FrameResizer::new(ResizeConfig::default())?.resize(frame, request)
}
