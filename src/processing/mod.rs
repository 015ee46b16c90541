//! Pixel processing kernels
//!
//! - Area-averaging resize from a strided source window

mod resample;

pub use resample::{area_resize, ResampleStatus, StridedView};
