//! Error types for frameresize

use thiserror::Error;

use crate::types::PixelFormat;

/// Result type alias for frameresize operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a crop/scale request was rejected by the geometry resolver
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error(
        "crop window ({x}, {y}) {width}x{height} does not fit in a {source_width}x{source_height} buffer"
    )]
    OutOfBounds {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        source_width: u32,
        source_height: u32,
    },

    #[error("{what} must be positive, got {width}x{height}")]
    NonPositiveDimension {
        what: &'static str,
        width: i64,
        height: i64,
    },

    #[error("output {width}x{height} exceeds the maximum dimension {max_dimension}")]
    OutputTooLarge {
        width: i64,
        height: i64,
        max_dimension: u32,
    },
}

/// frameresize error type
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),

    #[error("Unsupported pixel format {0:?}: {1}")]
    UnsupportedFormat(PixelFormat, &'static str),

    // Resource errors
    #[error("Buffer access failed: {0}")]
    BufferAccess(String),

    #[error("Failed to allocate {bytes} bytes for destination buffer")]
    Allocation { bytes: usize },

    // Algorithmic errors
    #[error("Resampling failed with status {code}")]
    Resampling { code: i32 },

    #[error("Frame assembly failed: {0}")]
    Assembly(String),

    // General errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Caller supplied bad parameters for this frame
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::InvalidGeometry(_) | Error::UnsupportedFormat(..))
    }

    /// Memory could not be locked or allocated
    pub fn is_resource_error(&self) -> bool {
        matches!(self, Error::BufferAccess(_) | Error::Allocation { .. })
    }

    /// Check if this error is recoverable by dropping the frame and moving on.
    ///
    /// Everything a resize can return is scoped to one frame. Only
    /// configuration and I/O failures, which happen outside the per-frame
    /// path, are not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Config(_) | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let geometry = Error::from(GeometryError::NonPositiveDimension {
            what: "crop",
            width: 0,
            height: 4,
        });
        assert!(geometry.is_input_error());
        assert!(!geometry.is_resource_error());
        assert!(geometry.is_recoverable());

        let alloc = Error::Allocation { bytes: 1 << 40 };
        assert!(alloc.is_resource_error());
        assert!(alloc.is_recoverable());

        let resample = Error::Resampling { code: -3 };
        assert!(!resample.is_input_error());
        assert!(!resample.is_resource_error());
        assert!(resample.is_recoverable());

        assert!(!Error::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn test_messages() {
        let err = Error::from(GeometryError::OutOfBounds {
            x: 90,
            y: 0,
            width: 20,
            height: 100,
            source_width: 100,
            source_height: 100,
        });
        assert_eq!(
            err.to_string(),
            "Invalid geometry: crop window (90, 0) 20x100 does not fit in a 100x100 buffer"
        );
        assert_eq!(
            Error::Resampling { code: -2 }.to_string(),
            "Resampling failed with status -2"
        );
    }
}
