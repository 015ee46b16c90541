//! Frames and frame assembly
//!
//! A [`Frame`] binds a pixel buffer to its format description, sample timing
//! and display orientation. Resizing produces a new frame around the new
//! buffer; [`assemble`] builds it from the source frame.

use crate::buffer::PixelBuffer;
use crate::config::{Limits, TimingPolicy};
use crate::error::{Error, Result};
use crate::types::{Orientation, PixelFormat, SampleTiming, Size};

/// Format and dimensions downstream consumers read before touching pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatDescription {
    pub format: PixelFormat,
    pub size: Size,
}

impl FormatDescription {
    /// Describe `buffer`, rejecting geometry consumers cannot handle
    pub fn for_buffer(buffer: &PixelBuffer) -> Result<Self> {
        let size = buffer.size();
        let format = buffer.pixel_format();

        if size.width == 0 || size.height == 0 {
            return Err(Error::Assembly(format!("{} buffer has no pixels", size)));
        }
        if format.is_planar() && (size.width % 2 != 0 || size.height % 2 != 0) {
            return Err(Error::Assembly(format!(
                "{} needs even dimensions, got {}",
                format, size
            )));
        }

        Ok(Self { format, size })
    }
}

/// A captured or produced video sample
#[derive(Debug, Clone)]
pub struct Frame {
    buffer: PixelBuffer,
    description: FormatDescription,
    timing: SampleTiming,
    orientation: Orientation,
}

impl Frame {
    /// Wrap a buffer delivered by the capture pipeline. Output limits do not
    /// apply to source frames.
    pub fn new(buffer: PixelBuffer, timing: SampleTiming, orientation: Orientation) -> Result<Self> {
        let description = FormatDescription::for_buffer(&buffer)?;
        Ok(Self {
            buffer,
            description,
            timing,
            orientation,
        })
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Give up the frame, keeping its buffer
    pub fn into_buffer(self) -> PixelBuffer {
        self.buffer
    }

    pub fn description(&self) -> &FormatDescription {
        &self.description
    }

    pub fn timing(&self) -> SampleTiming {
        self.timing
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn width(&self) -> u32 {
        self.description.size.width
    }

    pub fn height(&self) -> u32 {
        self.description.size.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.description.format
    }
}

/// Timing for a frame derived from `source`
pub fn derive_timing(source: &Frame, policy: TimingPolicy) -> SampleTiming {
    match policy {
        TimingPolicy::Preserve => source.timing(),
        TimingPolicy::Reset => SampleTiming::RESET,
    }
}

/// Build the output frame for `buffer`, keeping the source orientation.
///
/// On failure `buffer` is dropped here, so its memory is released.
pub fn assemble(
    buffer: PixelBuffer,
    source: &Frame,
    policy: TimingPolicy,
    limits: &Limits,
) -> Result<Frame> {
    let size = buffer.size();
    if size.width > limits.max_dimension || size.height > limits.max_dimension {
        return Err(Error::Assembly(format!(
            "{} exceeds the maximum dimension {}",
            size, limits.max_dimension
        )));
    }
    let timing = derive_timing(source, policy);
    Frame::new(buffer, timing, source.orientation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn source_frame() -> Frame {
        let buffer = PixelBuffer::from_packed(vec![0; 64], 4, 4, PixelFormat::Bgra8888).unwrap();
        let timing = SampleTiming {
            presentation: MediaTime::from_micros(33_366),
            decode: MediaTime::from_micros(33_000),
            duration: MediaTime::new(1, 30),
        };
        Frame::new(buffer, timing, Orientation::Right).unwrap()
    }

    fn output_buffer(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_packed(
            vec![0; (width * height * 4) as usize],
            width,
            height,
            PixelFormat::Bgra8888,
        )
        .unwrap()
    }

    #[test]
    fn test_preserve_copies_timing_and_orientation() {
        let source = source_frame();
        let frame = assemble(
            output_buffer(2, 2),
            &source,
            TimingPolicy::Preserve,
            &Limits::default(),
        )
        .unwrap();
        assert_eq!(frame.timing(), source.timing());
        assert_eq!(frame.orientation(), Orientation::Right);
        assert_eq!(frame.description().size, Size::new(2, 2));
    }

    #[test]
    fn test_reset_uses_sentinels() {
        let source = source_frame();
        let frame = assemble(
            output_buffer(2, 2),
            &source,
            TimingPolicy::Reset,
            &Limits::default(),
        )
        .unwrap();
        assert_eq!(frame.timing().presentation, MediaTime::ZERO);
        assert!(!frame.timing().decode.is_valid());
        assert!(!frame.timing().duration.is_valid());
        assert_eq!(frame.orientation(), Orientation::Right);
    }

    #[test]
    fn test_failed_assembly_releases_buffer() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let buffer = output_buffer(8, 1).with_release_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let limits = Limits {
            max_dimension: 4,
            ..Limits::default()
        };

        let err = assemble(buffer, &source_frame(), TimingPolicy::Preserve, &limits).unwrap_err();
        assert!(matches!(err, Error::Assembly(_)));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_planar_description_needs_even_dimensions() {
        let odd = PixelBuffer::from_packed(vec![0; 9], 3, 3, PixelFormat::Nv12).unwrap();
        assert!(FormatDescription::for_buffer(&odd).is_err());
        let even = PixelBuffer::from_packed(vec![0; 4], 2, 2, PixelFormat::Nv12).unwrap();
        assert!(FormatDescription::for_buffer(&even).is_ok());
    }

    #[test]
    fn test_source_frames_ignore_output_limit() {
        let wide = PixelBuffer::from_packed(vec![0; 20_000], 20_000, 1, PixelFormat::Gray8).unwrap();
        let frame = Frame::new(wide, SampleTiming::default(), Orientation::Up).unwrap();
        assert_eq!(frame.width(), 20_000);
    }
}
