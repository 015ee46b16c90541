//! Common types used throughout frameresize

use serde::{Deserialize, Serialize};

/// Pixel dimensions of a buffer or crop window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Calculate total pixels
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format tag describing the byte layout of one plane of pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32-bit B, G, R, A (the usual camera output)
    #[default]
    Bgra8888,
    /// 32-bit R, G, B, A
    Rgba8888,
    /// 32-bit A, R, G, B
    Argb8888,
    /// 32-bit A, B, G, R
    Abgr8888,
    /// 8-bit luminance
    Gray8,
    /// Packed 4:2:2, Y0 U Y1 V
    Yuyv422,
    /// Packed 4:2:2, U Y0 V Y1
    Uyvy422,
    /// Y plane + interleaved UV plane
    Nv12,
    /// Planar YUV 4:2:0
    I420,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 9] = [
        PixelFormat::Bgra8888,
        PixelFormat::Rgba8888,
        PixelFormat::Argb8888,
        PixelFormat::Abgr8888,
        PixelFormat::Gray8,
        PixelFormat::Yuyv422,
        PixelFormat::Uyvy422,
        PixelFormat::Nv12,
        PixelFormat::I420,
    ];

    /// Bytes per pixel in the first plane
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgra8888
            | PixelFormat::Rgba8888
            | PixelFormat::Argb8888
            | PixelFormat::Abgr8888 => 4,
            PixelFormat::Yuyv422 | PixelFormat::Uyvy422 => 2,
            PixelFormat::Gray8 | PixelFormat::Nv12 | PixelFormat::I420 => 1,
        }
    }

    /// Pixel data is split across more than one plane
    pub fn is_planar(&self) -> bool {
        matches!(self, PixelFormat::Nv12 | PixelFormat::I420)
    }

    /// Two horizontally adjacent pixels share chroma, so crop origins must
    /// land on an even column
    pub fn requires_even_x(&self) -> bool {
        matches!(self, PixelFormat::Yuyv422 | PixelFormat::Uyvy422)
    }

    /// Every pixel is an independent group of `bytes_per_pixel` channel
    /// bytes, so per-byte averaging across pixels is meaningful
    pub fn is_uniform(&self) -> bool {
        !self.is_planar() && !self.requires_even_x()
    }

    /// Smallest row length in bytes that holds `width` pixels
    pub fn min_bytes_per_row(&self, width: u32) -> Option<usize> {
        let width = width as usize;
        if self.requires_even_x() {
            width.div_ceil(2).checked_mul(4)
        } else {
            width.checked_mul(self.bytes_per_pixel())
        }
    }

    /// Four-character code
    pub const fn fourcc(&self) -> u32 {
        match self {
            PixelFormat::Bgra8888 => fourcc(b"BGRA"),
            PixelFormat::Rgba8888 => fourcc(b"RGBA"),
            PixelFormat::Argb8888 => fourcc(b"ARGB"),
            PixelFormat::Abgr8888 => fourcc(b"ABGR"),
            PixelFormat::Gray8 => fourcc(b"GREY"),
            PixelFormat::Yuyv422 => fourcc(b"YUYV"),
            PixelFormat::Uyvy422 => fourcc(b"UYVY"),
            PixelFormat::Nv12 => fourcc(b"NV12"),
            PixelFormat::I420 => fourcc(b"I420"),
        }
    }

    /// Look up a format by its four-character code
    pub fn from_fourcc(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.fourcc() == code)
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            PixelFormat::Bgra8888 => "BGRA 8:8:8:8",
            PixelFormat::Rgba8888 => "RGBA 8:8:8:8",
            PixelFormat::Argb8888 => "ARGB 8:8:8:8",
            PixelFormat::Abgr8888 => "ABGR 8:8:8:8",
            PixelFormat::Gray8 => "Gray 8",
            PixelFormat::Yuyv422 => "YUYV 4:2:2",
            PixelFormat::Uyvy422 => "UYVY 4:2:2",
            PixelFormat::Nv12 => "NV12 4:2:0 (bi-planar)",
            PixelFormat::I420 => "I420 4:2:0 (planar)",
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Pack four ASCII bytes into a little-endian code
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | ((code[1] as u32) << 8) | ((code[2] as u32) << 16) | ((code[3] as u32) << 24)
}

/// Rectangle in source-pixel units.
///
/// Signed so that negative origins coming out of the host can be reported as
/// out of bounds instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i64 {
        self.y.saturating_add(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Overlap of two rectangles; empty rectangles come back with zero size
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect::new(x, y, (right - x).max(0), (bottom - y).max(0))
    }

    pub fn translate(&self, dx: i64, dy: i64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Output dimensions in destination-pixel units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScaleTarget {
    pub width: i64,
    pub height: i64,
}

impl ScaleTarget {
    pub const fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }
}

/// Rational media timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
    pub flags: u32,
}

impl MediaTime {
    pub const FLAG_VALID: u32 = 1;

    /// Time zero, valid
    pub const ZERO: Self = Self {
        value: 0,
        timescale: 1,
        flags: Self::FLAG_VALID,
    };

    /// Sentinel for "no time"
    pub const INVALID: Self = Self {
        value: 0,
        timescale: 0,
        flags: 0,
    };

    pub const fn new(value: i64, timescale: i32) -> Self {
        Self {
            value,
            timescale,
            flags: Self::FLAG_VALID,
        }
    }

    /// Timestamp in microseconds
    pub const fn from_micros(us: i64) -> Self {
        Self::new(us, 1_000_000)
    }

    pub fn is_valid(&self) -> bool {
        self.flags & Self::FLAG_VALID != 0 && self.timescale > 0
    }

    /// Seconds as f64, `None` when invalid
    pub fn seconds(&self) -> Option<f64> {
        self.is_valid()
            .then(|| self.value as f64 / self.timescale as f64)
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Per-sample timing attached to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SampleTiming {
    /// Presentation timestamp
    pub presentation: MediaTime,
    /// Decode timestamp
    pub decode: MediaTime,
    /// Duration
    pub duration: MediaTime,
}

impl SampleTiming {
    /// Presentation at zero, everything else invalid
    pub const RESET: Self = Self {
        presentation: MediaTime::ZERO,
        decode: MediaTime::INVALID,
        duration: MediaTime::INVALID,
    };
}

/// Display orientation of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_round_trip() {
        for format in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_fourcc(format.fourcc()), Some(format));
        }
        assert_eq!(PixelFormat::from_fourcc(fourcc(b"XXXX")), None);
    }

    #[test]
    fn test_min_bytes_per_row() {
        assert_eq!(PixelFormat::Bgra8888.min_bytes_per_row(640), Some(2560));
        assert_eq!(PixelFormat::Gray8.min_bytes_per_row(7), Some(7));
        assert_eq!(PixelFormat::Yuyv422.min_bytes_per_row(6), Some(12));
        assert_eq!(PixelFormat::Yuyv422.min_bytes_per_row(7), Some(16));
    }

    #[test]
    fn test_format_classes() {
        assert!(PixelFormat::Rgba8888.is_uniform());
        assert!(!PixelFormat::Uyvy422.is_uniform());
        assert!(PixelFormat::Uyvy422.requires_even_x());
        assert!(PixelFormat::Nv12.is_planar());
        assert!(!PixelFormat::I420.is_uniform());
        assert_eq!(PixelFormat::default(), PixelFormat::Bgra8888);
    }

    #[test]
    fn test_rect_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.intersect(&Rect::new(5, 5, 10, 10)), Rect::new(5, 5, 5, 5));
        assert!(a.intersect(&Rect::new(20, 20, 5, 5)).is_empty());
    }

    #[test]
    fn test_media_time() {
        assert!(MediaTime::ZERO.is_valid());
        assert!(!MediaTime::INVALID.is_valid());
        assert_eq!(MediaTime::new(3, 2).seconds(), Some(1.5));
        assert_eq!(MediaTime::INVALID.seconds(), None);
    }
}
