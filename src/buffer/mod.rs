//! Pixel buffers and scoped read access
//!
//! A [`PixelBuffer`] is a reference-counted handle to row-strided pixel
//! memory. Cloning it retains the same memory; the memory is released exactly
//! once, when the last handle drops. The memory is either owned by this crate
//! or foreign (handed over by the host together with a release callback).
//!
//! Pixel bytes are only reachable through a [`BufferDescriptor`], a read-only
//! lock guard. It cannot mutate or release the buffer, and it unlocks when it
//! goes out of scope, whichever way the caller leaves.

mod builder;

pub use builder::{DestinationBuffer, DestinationView};

use std::fmt;
use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::types::{PixelFormat, Size};

/// Callback run once after a buffer's memory has been released
pub type ReleaseHook = Box<dyn FnOnce() + Send + 'static>;

/// Callback that gives foreign memory back to its owner
pub type ForeignRelease = Box<dyn FnOnce(NonNull<u8>, usize) + Send + 'static>;

/// Reference-counted pixel buffer handle
#[derive(Clone)]
pub struct PixelBuffer {
    inner: Arc<Inner>,
}

struct Inner {
    size: Size,
    bytes_per_row: usize,
    format: PixelFormat,
    memory: Memory,
    locks: AtomicUsize,
    invalidated: AtomicBool,
    release_hooks: Mutex<Vec<ReleaseHook>>,
}

enum Memory {
    Owned(Box<[u8]>),
    Foreign(ForeignMemory),
}

impl Memory {
    fn as_slice(&self) -> &[u8] {
        match self {
            Memory::Owned(bytes) => bytes,
            // SAFETY: `from_raw_parts` requires the host to keep `len` bytes
            // at `ptr` readable and unmodified until the release callback
            // runs, which only happens when this value drops.
            Memory::Foreign(foreign) => unsafe {
                slice::from_raw_parts(foreign.ptr.as_ptr(), foreign.len)
            },
        }
    }
}

struct ForeignMemory {
    ptr: NonNull<u8>,
    len: usize,
    release: Option<ForeignRelease>,
}

impl Drop for ForeignMemory {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.ptr, self.len);
        }
    }
}

// SAFETY: foreign memory is only ever read through shared references, and
// the `from_raw_parts` contract makes the host guarantee it is not written
// while we hold it. The release callback is `Send`.
unsafe impl Send for ForeignMemory {}
// SAFETY: see above, no interior mutation happens through `&ForeignMemory`.
unsafe impl Sync for ForeignMemory {}

impl Drop for Inner {
    fn drop(&mut self) {
        // Release the memory first so hooks observe a finished release.
        drop(std::mem::replace(
            &mut self.memory,
            Memory::Owned(Box::default()),
        ));
        for hook in self.release_hooks.get_mut().drain(..) {
            hook();
        }
    }
}

impl PixelBuffer {
    /// Wrap crate-owned memory.
    ///
    /// `data` must hold at least `(height - 1) * bytes_per_row` bytes plus one
    /// minimal row, and `bytes_per_row` must fit a full row of `width` pixels.
    pub fn from_vec(
        data: Vec<u8>,
        width: u32,
        height: u32,
        bytes_per_row: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        let size = Size::new(width, height);
        check_layout(size, bytes_per_row, format, data.len())?;
        Ok(Self::from_memory(
            Memory::Owned(data.into_boxed_slice()),
            size,
            bytes_per_row,
            format,
        ))
    }

    /// Wrap a tightly packed `Vec` (stride = minimal row length)
    pub fn from_packed(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let bytes_per_row = format
            .min_bytes_per_row(width)
            .ok_or_else(|| Error::BufferAccess(format!("row of {} pixels overflows", width)))?;
        Self::from_vec(data, width, height, bytes_per_row, format)
    }

    /// Wrap memory owned by the host.
    ///
    /// `release` is called exactly once, with `ptr` and `len`, after the last
    /// handle drops. If the layout is rejected, an error is returned,
    /// `release` is never called, and the memory stays with the caller.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` readable bytes that stay valid and are not
    /// written to until `release` runs.
    pub unsafe fn from_raw_parts<F>(
        ptr: NonNull<u8>,
        len: usize,
        width: u32,
        height: u32,
        bytes_per_row: usize,
        format: PixelFormat,
        release: F,
    ) -> Result<Self>
    where
        F: FnOnce(NonNull<u8>, usize) + Send + 'static,
    {
        let size = Size::new(width, height);
        check_layout(size, bytes_per_row, format, len)?;
        Ok(Self::from_memory(
            Memory::Foreign(ForeignMemory {
                ptr,
                len,
                release: Some(Box::new(release)),
            }),
            size,
            bytes_per_row,
            format,
        ))
    }

    /// Wrap memory produced by [`DestinationBuffer`], whose layout is
    /// correct by construction
    pub(crate) fn from_owned(
        memory: Box<[u8]>,
        size: Size,
        bytes_per_row: usize,
        format: PixelFormat,
    ) -> Self {
        Self::from_memory(Memory::Owned(memory), size, bytes_per_row, format)
    }

    fn from_memory(memory: Memory, size: Size, bytes_per_row: usize, format: PixelFormat) -> Self {
        Self {
            inner: Arc::new(Inner {
                size,
                bytes_per_row,
                format,
                memory,
                locks: AtomicUsize::new(0),
                invalidated: AtomicBool::new(false),
                release_hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a hook that runs once the memory has been released
    pub fn with_release_hook<F>(self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.release_hooks.lock().push(Box::new(hook));
        self
    }

    /// Lock the buffer for reading
    pub fn lock_read(&self) -> Result<BufferDescriptor<'_>> {
        if self.is_invalidated() {
            return Err(Error::BufferAccess(
                "pixel buffer has been invalidated by its owner".into(),
            ));
        }
        self.inner.locks.fetch_add(1, Ordering::AcqRel);
        Ok(BufferDescriptor {
            buffer: self,
            bytes: self.inner.memory.as_slice(),
        })
    }

    /// Mark the buffer as reclaimed by its owner. Existing locks stay valid,
    /// new ones fail.
    pub fn invalidate(&self) {
        self.inner.invalidated.store(true, Ordering::Release);
    }

    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.load(Ordering::Acquire)
    }

    /// Number of live read locks
    pub fn lock_count(&self) -> usize {
        self.inner.locks.load(Ordering::Acquire)
    }

    /// Number of live handles to the same memory
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn width(&self) -> u32 {
        self.inner.size.width
    }

    pub fn height(&self) -> u32 {
        self.inner.size.height
    }

    pub fn size(&self) -> Size {
        self.inner.size
    }

    pub fn bytes_per_row(&self) -> usize {
        self.inner.bytes_per_row
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.inner.format
    }

    /// Both handles refer to the same memory
    pub fn ptr_eq(&self, other: &PixelBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let memory = match self.inner.memory {
            Memory::Owned(_) => "owned",
            Memory::Foreign(_) => "foreign",
        };
        f.debug_struct("PixelBuffer")
            .field("size", &self.inner.size)
            .field("bytes_per_row", &self.inner.bytes_per_row)
            .field("format", &self.inner.format)
            .field("memory", &memory)
            .field("locks", &self.lock_count())
            .finish()
    }
}

/// Read-only, scoped view of a locked [`PixelBuffer`]
///
/// Pixel bytes borrow from the guard, so they cannot outlive the lock:
///
/// ```compile_fail
/// use frameresize::{PixelBuffer, PixelFormat};
///
/// let buffer = PixelBuffer::from_packed(vec![0; 16], 2, 2, PixelFormat::Bgra8888).unwrap();
/// let bytes = buffer.lock_read().unwrap().bytes();
/// assert_eq!(bytes[0], 0);
/// ```
pub struct BufferDescriptor<'a> {
    buffer: &'a PixelBuffer,
    bytes: &'a [u8],
}

impl<'a> BufferDescriptor<'a> {
    /// The locked buffer
    pub fn buffer(&self) -> &'a PixelBuffer {
        self.buffer
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn size(&self) -> Size {
        self.buffer.size()
    }

    pub fn bytes_per_row(&self) -> usize {
        self.buffer.bytes_per_row()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.buffer.pixel_format()
    }

    /// All bytes backing the buffer, readable while this lock is held
    pub fn bytes(&self) -> &[u8] {
        self.bytes
    }

    /// Base address of the pixel data
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    /// Pixel bytes of row `y`, without the stride padding
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height() {
            return None;
        }
        let start = y as usize * self.bytes_per_row();
        let len = self.pixel_format().min_bytes_per_row(self.width())?;
        self.bytes.get(start..start + len)
    }
}

impl Drop for BufferDescriptor<'_> {
    fn drop(&mut self) {
        self.buffer.inner.locks.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for BufferDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferDescriptor")
            .field("size", &self.size())
            .field("bytes_per_row", &self.bytes_per_row())
            .field("format", &self.pixel_format())
            .finish()
    }
}

/// Bytes a buffer of this geometry needs: every full row but the last, plus
/// one minimal row
pub(crate) fn required_len(size: Size, bytes_per_row: usize, format: PixelFormat) -> Option<usize> {
    if size.height == 0 {
        return Some(0);
    }
    let last_row = format.min_bytes_per_row(size.width)?;
    (size.height as usize - 1)
        .checked_mul(bytes_per_row)?
        .checked_add(last_row)
}

fn check_layout(size: Size, bytes_per_row: usize, format: PixelFormat, len: usize) -> Result<()> {
    let min_row = format
        .min_bytes_per_row(size.width)
        .ok_or_else(|| Error::BufferAccess(format!("row of {} pixels overflows", size.width)))?;
    if bytes_per_row < min_row {
        return Err(Error::BufferAccess(format!(
            "stride {} is shorter than a {} row of {} pixels ({} bytes)",
            bytes_per_row, format, size.width, min_row
        )));
    }
    let needed = required_len(size, bytes_per_row, format)
        .ok_or_else(|| Error::BufferAccess(format!("{} buffer size overflows", size)))?;
    if len < needed {
        return Err(Error::BufferAccess(format!(
            "{} bytes backing a {} buffer with stride {}, need {}",
            len, size, bytes_per_row, needed
        )));
    }
    Ok(())
}
