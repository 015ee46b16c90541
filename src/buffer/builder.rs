//! Destination buffer allocation
//!
//! The resampler and the renderer write into a [`DestinationBuffer`] and then
//! hand it over as a [`PixelBuffer`]. Whichever way it ends, the memory is
//! freed exactly once: by the `PixelBuffer` after [`DestinationBuffer::finish`],
//! or by dropping the unfinished `DestinationBuffer` on an error path.

use crate::buffer::PixelBuffer;
use crate::config::Limits;
use crate::error::{Error, Result};
use crate::types::{PixelFormat, Size};

/// Freshly allocated, exclusively owned output memory
#[derive(Debug)]
pub struct DestinationBuffer {
    memory: Box<[u8]>,
    size: Size,
    bytes_per_row: usize,
    format: PixelFormat,
}

impl DestinationBuffer {
    /// Allocate a zeroed, tightly packed buffer for `size` pixels of `format`
    pub fn allocate(size: Size, format: PixelFormat, limits: &Limits) -> Result<Self> {
        let bytes_per_row = format
            .min_bytes_per_row(size.width)
            .ok_or(Error::Allocation { bytes: usize::MAX })?;
        let bytes = bytes_per_row
            .checked_mul(size.height as usize)
            .ok_or(Error::Allocation { bytes: usize::MAX })?;

        if bytes > limits.max_allocation_bytes {
            tracing::warn!(
                "Destination {} {:?} needs {} bytes, limit is {}",
                size,
                format,
                bytes,
                limits.max_allocation_bytes
            );
            return Err(Error::Allocation { bytes });
        }

        let mut memory = Vec::new();
        memory
            .try_reserve_exact(bytes)
            .map_err(|_| Error::Allocation { bytes })?;
        memory.resize(bytes, 0);

        Ok(Self {
            memory: memory.into_boxed_slice(),
            size,
            bytes_per_row,
            format,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Writable view for a kernel
    pub fn view_mut(&mut self) -> DestinationView<'_> {
        DestinationView {
            data: &mut self.memory[..],
            size: self.size,
            stride: self.bytes_per_row,
            format: self.format,
        }
    }

    /// Hand the memory over to a [`PixelBuffer`]
    pub fn finish(self) -> PixelBuffer {
        PixelBuffer::from_owned(self.memory, self.size, self.bytes_per_row, self.format)
    }
}

/// Mutable, row-strided window into destination memory
#[derive(Debug)]
pub struct DestinationView<'a> {
    data: &'a mut [u8],
    size: Size,
    stride: usize,
    format: PixelFormat,
}

impl<'a> DestinationView<'a> {
    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &*self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    /// Pixel bytes of row `y`, without padding
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.size.height {
            return None;
        }
        let start = y as usize * self.stride;
        let len = self.format.min_bytes_per_row(self.size.width)?;
        self.data.get_mut(start..start + len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_allocate_and_finish() {
        let mut dst =
            DestinationBuffer::allocate(Size::new(3, 2), PixelFormat::Rgba8888, &Limits::default())
                .unwrap();
        assert_eq!(dst.bytes_per_row(), 12);
        {
            let mut view = dst.view_mut();
            view.row_mut(1).unwrap().fill(9);
            assert!(view.row_mut(2).is_none());
        }

        let buffer = dst.finish();
        assert_eq!(buffer.size(), Size::new(3, 2));
        assert_eq!(buffer.pixel_format(), PixelFormat::Rgba8888);
        let desc = buffer.lock_read().unwrap();
        assert_eq!(desc.row(0).unwrap(), &[0u8; 12][..]);
        assert_eq!(desc.row(1).unwrap(), &[9u8; 12][..]);
    }

    #[test]
    fn test_allocation_limit() {
        let limits = Limits {
            max_allocation_bytes: 1024,
            ..Limits::default()
        };
        let err = DestinationBuffer::allocate(Size::new(32, 32), PixelFormat::Bgra8888, &limits)
            .unwrap_err();
        assert!(matches!(err, Error::Allocation { bytes: 4096 }));
    }

    #[test]
    fn test_size_overflow_is_allocation_error() {
        let err = DestinationBuffer::allocate(
            Size::new(u32::MAX, u32::MAX),
            PixelFormat::Bgra8888,
            &Limits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Allocation { .. }));
    }

    #[test]
    fn test_finished_buffer_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let dst =
            DestinationBuffer::allocate(Size::new(2, 2), PixelFormat::Gray8, &Limits::default())
                .unwrap();
        let buffer = dst.finish().with_release_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(buffer);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
