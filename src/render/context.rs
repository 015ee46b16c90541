//! Render context and compute device

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use super::graph::ImageNode;
use crate::buffer::DestinationView;
use crate::error::{Error, Result};
use crate::types::Rect;

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

/// Reasons the renderer refuses a job
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStatus {
    #[error("compute device was lost")]
    DeviceLost,
    #[error("image and destination formats differ")]
    FormatMismatch,
    #[error("render bounds do not match the destination size")]
    BoundsMismatch,
    #[error("span does not start on a macropixel boundary")]
    Misaligned,
}

impl RenderStatus {
    pub fn code(&self) -> i32 {
        match self {
            RenderStatus::DeviceLost => -100,
            RenderStatus::FormatMismatch => -101,
            RenderStatus::BoundsMismatch => -102,
            RenderStatus::Misaligned => -103,
        }
    }
}

impl From<RenderStatus> for Error {
    fn from(status: RenderStatus) -> Self {
        Error::Resampling {
            code: status.code(),
        }
    }
}

/// Device a render context executes on
#[derive(Debug)]
pub struct ComputeDevice {
    id: u64,
    name: String,
    lost: AtomicBool,
}

impl ComputeDevice {
    /// The default device of this system. Every call opens a fresh device.
    pub fn system_default() -> Arc<Self> {
        let id = NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed);
        Arc::new(Self {
            id,
            name: format!("cpu-raster-{}", id),
            lost: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Flag the device as gone. Contexts bound to it stop rendering.
    pub fn mark_lost(&self) {
        self.lost.store(true, Ordering::Release);
    }
}

/// Rasterizes [`ImageNode`] graphs into destination memory
#[derive(Debug)]
pub struct RenderContext {
    device: Arc<ComputeDevice>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::with_device(ComputeDevice::system_default())
    }

    pub fn with_device(device: Arc<ComputeDevice>) -> Self {
        tracing::debug!("Render context bound to {}", device.name());
        Self { device }
    }

    pub fn device(&self) -> &Arc<ComputeDevice> {
        &self.device
    }

    /// Rasterize the `bounds` region of `node` into `dst`.
    ///
    /// Graph position `(bounds.x, bounds.y)` lands on destination pixel
    /// `(0, 0)`. Destination pixels the node does not cover are zero.
    pub fn render(&self, node: &ImageNode, dst: &mut DestinationView<'_>, bounds: Rect) -> Result<()> {
        if self.device.is_lost() {
            return Err(RenderStatus::DeviceLost.into());
        }

        let format = node.pixel_format();
        if format != dst.pixel_format() {
            return Err(RenderStatus::FormatMismatch.into());
        }
        if format.is_planar() {
            return Err(Error::UnsupportedFormat(
                format,
                "planar images cannot be rendered",
            ));
        }
        if bounds.width != dst.width() as i64 || bounds.height != dst.height() as i64 {
            return Err(RenderStatus::BoundsMismatch.into());
        }

        let placement = node.placement();
        let desc = placement.buffer.lock_read()?;

        dst.data_mut().fill(0);

        let visible = placement.clip.intersect(&bounds);
        if visible.is_empty() {
            return Ok(());
        }

        let paired = format.requires_even_x();
        let bpp = format.bytes_per_pixel();
        let src_x = visible.x - placement.offset_x;
        let dst_x = visible.x - bounds.x;
        if paired && (src_x % 2 != 0 || dst_x % 2 != 0) {
            return Err(RenderStatus::Misaligned.into());
        }

        // Packed 4:2:2 is copied in whole 4-byte macropixels.
        let (src_start, dst_start, span) = if paired {
            (
                src_x as usize / 2 * 4,
                dst_x as usize / 2 * 4,
                (visible.width as usize).div_ceil(2) * 4,
            )
        } else {
            (
                src_x as usize * bpp,
                dst_x as usize * bpp,
                visible.width as usize * bpp,
            )
        };

        for gy in visible.y..visible.bottom() {
            let src_row = desc
                .row((gy - placement.offset_y) as u32)
                .and_then(|row| row.get(src_start..))
                .ok_or(RenderStatus::BoundsMismatch)?;
            let dst_row = dst
                .row_mut((gy - bounds.y) as u32)
                .and_then(|row| row.get_mut(dst_start..))
                .ok_or(RenderStatus::BoundsMismatch)?;
            let len = span.min(src_row.len()).min(dst_row.len());
            dst_row[..len].copy_from_slice(&src_row[..len]);
        }

        Ok(())
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}
