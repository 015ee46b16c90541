//! Area-averaging resampler
//!
//! Works on bytes: every pixel is `bytes_per_pixel` independent channel
//! bytes, so the same kernel handles RGBA, BGRA, ARGB, ABGR and gray. The
//! source is a strided window into a locked buffer and is never copied.

use std::collections::VecDeque;

use thiserror::Error;

use crate::buffer::{BufferDescriptor, DestinationView};
use crate::error::Error as ResizeError;
use crate::geometry::CropWindow;

/// Status reported by the kernel when it refuses to run
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResampleStatus {
    #[error("row stride shorter than a row of pixels")]
    InvalidStride,
    #[error("source memory ends before the last row")]
    SourceTooSmall,
    #[error("destination memory ends before the last row")]
    DestinationTooSmall,
    #[error("zero-sized image")]
    EmptyImage,
    #[error("source and destination pixel sizes differ")]
    ChannelMismatch,
    #[error("window too large for the integer accumulators")]
    WindowTooLarge,
}

impl ResampleStatus {
    /// Numeric status code carried by [`ResizeError::Resampling`]
    pub fn code(&self) -> i32 {
        match self {
            ResampleStatus::InvalidStride => -1,
            ResampleStatus::SourceTooSmall => -2,
            ResampleStatus::DestinationTooSmall => -3,
            ResampleStatus::EmptyImage => -4,
            ResampleStatus::ChannelMismatch => -5,
            ResampleStatus::WindowTooLarge => -6,
        }
    }
}

impl From<ResampleStatus> for ResizeError {
    fn from(status: ResampleStatus) -> Self {
        ResizeError::Resampling {
            code: status.code(),
        }
    }
}

/// Read-only window of `height` rows, `width` pixels each, `stride` bytes
/// apart
#[derive(Debug, Clone, Copy)]
pub struct StridedView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    bytes_per_pixel: usize,
}

impl<'a> StridedView<'a> {
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        stride: usize,
        bytes_per_pixel: usize,
    ) -> Result<Self, ResampleStatus> {
        if width == 0 || height == 0 || bytes_per_pixel == 0 {
            return Err(ResampleStatus::EmptyImage);
        }
        let row_len = (width as usize)
            .checked_mul(bytes_per_pixel)
            .ok_or(ResampleStatus::InvalidStride)?;
        if stride < row_len {
            return Err(ResampleStatus::InvalidStride);
        }
        let needed = (height as usize - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(row_len))
            .ok_or(ResampleStatus::SourceTooSmall)?;
        if data.len() < needed {
            return Err(ResampleStatus::SourceTooSmall);
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
            bytes_per_pixel,
        })
    }

    /// Window over `window` of a locked buffer. The view starts at byte
    /// `y * bytes_per_row + x * bytes_per_pixel` and keeps the buffer's
    /// stride.
    pub fn crop(desc: &'a BufferDescriptor<'_>, window: CropWindow) -> Result<Self, ResampleStatus> {
        let bpp = desc.pixel_format().bytes_per_pixel();
        let offset = (window.y as usize)
            .checked_mul(desc.bytes_per_row())
            .and_then(|n| n.checked_add(window.x as usize * bpp))
            .ok_or(ResampleStatus::SourceTooSmall)?;
        let data = desc
            .bytes()
            .get(offset..)
            .ok_or(ResampleStatus::SourceTooSmall)?;
        Self::new(data, window.width, window.height, desc.bytes_per_row(), bpp)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    /// Pixel bytes of row `y`
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width as usize * self.bytes_per_pixel]
    }
}

/// Source taps for every output position along one axis.
///
/// Positions are measured in units of `gcd / (src_len * dst_len)`, so every
/// overlap is an exact integer and the weights of one output sum to
/// `total = src_len / gcd`.
struct AxisWeights {
    starts: Vec<usize>,
    offsets: Vec<usize>,
    weights: Vec<u32>,
    total: u32,
}

impl AxisWeights {
    fn new(src_len: usize, dst_len: usize) -> Self {
        let g = gcd(src_len, dst_len);
        let mut starts = Vec::with_capacity(dst_len);
        let mut offsets = Vec::with_capacity(dst_len + 1);
        let mut weights = Vec::with_capacity(dst_len + src_len);

        for d in 0..dst_len {
            let lo = d * src_len;
            let hi = lo + src_len;
            let first = lo / dst_len;
            let last = (hi - 1) / dst_len;

            starts.push(first);
            offsets.push(weights.len());
            for i in first..=last {
                // Both ends are multiples of src_len or dst_len, hence of g.
                let overlap = hi.min((i + 1) * dst_len) - lo.max(i * dst_len);
                weights.push((overlap / g) as u32);
            }
        }
        offsets.push(weights.len());

        Self {
            starts,
            offsets,
            weights,
            total: (src_len / g) as u32,
        }
    }

    fn taps(&self, d: usize) -> (usize, &[u32]) {
        (
            self.starts[d],
            &self.weights[self.offsets[d]..self.offsets[d + 1]],
        )
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Rounded division by a fixed divisor without a hardware divide per byte
struct Divider {
    divisor: u64,
    half: u64,
    magic: u64,
}

impl Divider {
    fn new(divisor: u64) -> Self {
        Self {
            divisor,
            half: divisor / 2,
            magic: u64::MAX / divisor,
        }
    }

    /// `(n + divisor / 2) / divisor`, exact for `n < 2^63`
    #[inline(always)]
    fn round(&self, n: u64) -> u64 {
        let n = n + self.half;
        // The estimate is never high and at most one low.
        let q = ((n as u128 * self.magic as u128) >> 64) as u64;
        if n - q * self.divisor >= self.divisor {
            q + 1
        } else {
            q
        }
    }
}

/// Horizontal pass over one source row: per-channel weighted sums for every
/// output column
fn horizontal_pass<const BPP: usize>(row: &[u8], wx: &AxisWeights, out: &mut [u32]) {
    for (dx, sums) in out.chunks_exact_mut(BPP).enumerate() {
        let (sx0, taps) = wx.taps(dx);
        let mut acc = [0u32; BPP];
        for (&w, px) in taps.iter().zip(row[sx0 * BPP..].chunks_exact(BPP)) {
            for c in 0..BPP {
                acc[c] += px[c] as u32 * w;
            }
        }
        sums.copy_from_slice(&acc);
    }
}

fn horizontal_pass_any(row: &[u8], bpp: usize, wx: &AxisWeights, out: &mut [u32]) {
    match bpp {
        1 => horizontal_pass::<1>(row, wx, out),
        2 => horizontal_pass::<2>(row, wx, out),
        3 => horizontal_pass::<3>(row, wx, out),
        4 => horizontal_pass::<4>(row, wx, out),
        _ => {
            for (dx, sums) in out.chunks_exact_mut(bpp).enumerate() {
                let (sx0, taps) = wx.taps(dx);
                sums.fill(0);
                for (&w, px) in taps.iter().zip(row[sx0 * bpp..].chunks_exact(bpp)) {
                    for (sum, &byte) in sums.iter_mut().zip(px) {
                        *sum += byte as u32 * w;
                    }
                }
            }
        }
    }
}

/// Resample `src` into `dst`.
///
/// Each output channel byte is the overlap-weighted mean of the source bytes
/// under it, rounded to nearest. Equal sizes copy rows verbatim.
///
/// The filter is separable: every source row goes through the horizontal
/// pass once and is kept while the output rows it feeds are produced.
pub fn area_resize(src: &StridedView<'_>, dst: &mut DestinationView<'_>) -> Result<(), ResampleStatus> {
    let bpp = src.bytes_per_pixel();
    if dst.pixel_format().bytes_per_pixel() != bpp {
        return Err(ResampleStatus::ChannelMismatch);
    }
    let dst_w = dst.width() as usize;
    let dst_h = dst.height() as usize;
    if dst_w == 0 || dst_h == 0 {
        return Err(ResampleStatus::EmptyImage);
    }
    let row_len = dst_w * bpp;
    if dst.stride() < row_len {
        return Err(ResampleStatus::InvalidStride);
    }
    if dst.data().len() < (dst_h - 1) * dst.stride() + row_len {
        return Err(ResampleStatus::DestinationTooSmall);
    }

    let src_w = src.width() as usize;
    let src_h = src.height() as usize;

    if src_w == dst_w && src_h == dst_h {
        copy_rows(src, dst);
        return Ok(());
    }

    let wx = AxisWeights::new(src_w, dst_w);
    let wy = AxisWeights::new(src_h, dst_h);
    // Horizontal sums live in u32, weighted totals below 2^63.
    if wx.total as u64 * u8::MAX as u64 > u32::MAX as u64 {
        return Err(ResampleStatus::WindowTooLarge);
    }
    let divisor = wx.total as u64 * wy.total as u64;
    if divisor > (1 << 63) / 256 {
        return Err(ResampleStatus::WindowTooLarge);
    }
    let divider = Divider::new(divisor);

    // Horizontal sums of consecutive source rows, oldest first.
    let mut rows: VecDeque<(usize, Vec<u32>)> = VecDeque::new();
    let mut spare: Vec<Vec<u32>> = Vec::new();
    let mut acc = vec![0u64; row_len];
    let stride = dst.stride();
    let out = dst.data_mut();

    for dy in 0..dst_h {
        let (sy0, y_taps) = wy.taps(dy);

        while rows.front().is_some_and(|(sy, _)| *sy < sy0) {
            if let Some((_, sums)) = rows.pop_front() {
                spare.push(sums);
            }
        }
        let next = rows.back().map_or(sy0, |(sy, _)| sy + 1);
        for sy in next..sy0 + y_taps.len() {
            let mut sums = spare.pop().unwrap_or_else(|| vec![0u32; row_len]);
            horizontal_pass_any(src.row(sy), bpp, &wx, &mut sums);
            rows.push_back((sy, sums));
        }

        let dst_row = &mut out[dy * stride..dy * stride + row_len];
        if let [(_, sums)] = rows.make_contiguous() {
            // One source row: skip the u64 accumulator.
            for (byte, &sum) in dst_row.iter_mut().zip(sums.iter()) {
                *byte = divider.round(sum as u64 * y_taps[0] as u64) as u8;
            }
            continue;
        }

        acc.fill(0);
        for (&w, (_, sums)) in y_taps.iter().zip(rows.iter()) {
            let w = w as u64;
            for (a, &sum) in acc.iter_mut().zip(sums.iter()) {
                *a += sum as u64 * w;
            }
        }
        for (byte, &sum) in dst_row.iter_mut().zip(acc.iter()) {
            *byte = divider.round(sum) as u8;
        }
    }

    Ok(())
}

fn copy_rows(src: &StridedView<'_>, dst: &mut DestinationView<'_>) {
    let row_len = src.width() as usize * src.bytes_per_pixel();
    let stride = dst.stride();
    let out = dst.data_mut();
    for y in 0..src.height() as usize {
        out[y * stride..y * stride + row_len].copy_from_slice(src.row(y));
    }
}
