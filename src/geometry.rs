//! Crop geometry resolution
//!
//! Turns the six integers coming from the host into a crop window that is
//! known to lie inside the source buffer and an output size that is known to
//! be non-empty.

use crate::buffer::BufferDescriptor;
use crate::config::Limits;
use crate::error::{GeometryError, Result};
use crate::types::{PixelFormat, Rect, ScaleTarget, Size};

/// The parts of a source buffer the resolver looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceGeometry {
    pub size: Size,
    pub format: PixelFormat,
}

impl SourceGeometry {
    pub const fn new(size: Size, format: PixelFormat) -> Self {
        Self { size, format }
    }
}

impl From<&BufferDescriptor<'_>> for SourceGeometry {
    fn from(desc: &BufferDescriptor<'_>) -> Self {
        Self::new(desc.size(), desc.pixel_format())
    }
}

/// Crop window in source pixels, inside the source bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropWindow {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(
            self.x as i64,
            self.y as i64,
            self.width as i64,
            self.height as i64,
        )
    }
}

/// Validated crop and output geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedGeometry {
    /// Window actually read from the source
    pub crop: CropWindow,
    /// Output dimensions
    pub output: Size,
    /// Window as the caller asked for it
    pub requested: Rect,
    /// Columns the origin was moved right to satisfy format alignment
    pub origin_shift: u32,
}

impl ResolvedGeometry {
    /// Output size differs from the crop size
    pub fn is_scaled(&self) -> bool {
        self.output != self.crop.size()
    }

    /// The crop window differs from the requested one
    pub fn was_adjusted(&self) -> bool {
        self.origin_shift != 0
    }
}

/// Validate and normalize a crop/scale request.
///
/// For formats whose pixels pair up horizontally, an odd `crop.x` is moved
/// one column right. The window keeps its width, so it ends one column later
/// than requested. Bounds are checked on the moved window. The output size
/// is checked against `limits.max_dimension` last.
pub fn resolve(
    source: SourceGeometry,
    crop: Rect,
    scale: Option<ScaleTarget>,
    limits: &Limits,
) -> Result<ResolvedGeometry> {
    if crop.width <= 0 || crop.height <= 0 {
        return Err(GeometryError::NonPositiveDimension {
            what: "crop",
            width: crop.width,
            height: crop.height,
        }
        .into());
    }
    if let Some(scale) = scale {
        if scale.width <= 0 || scale.height <= 0 {
            return Err(GeometryError::NonPositiveDimension {
                what: "scale",
                width: scale.width,
                height: scale.height,
            }
            .into());
        }
    }

    let out_of_bounds = |x: i64| GeometryError::OutOfBounds {
        x,
        y: crop.y,
        width: crop.width,
        height: crop.height,
        source_width: source.size.width,
        source_height: source.size.height,
    };

    if crop.x < 0 || crop.y < 0 {
        return Err(out_of_bounds(crop.x).into());
    }

    let mut x = crop.x;
    let mut origin_shift = 0;
    if source.format.requires_even_x() && x % 2 != 0 {
        x += 1;
        origin_shift = 1;
        tracing::debug!(
            "Crop origin x={} moved to {} for {} alignment",
            crop.x,
            x,
            source.format
        );
    }

    let fits = |start: i64, len: i64, limit: u32| {
        start
            .checked_add(len)
            .is_some_and(|end| end <= limit as i64)
    };
    if !fits(x, crop.width, source.size.width) || !fits(crop.y, crop.height, source.size.height) {
        return Err(out_of_bounds(x).into());
    }

    // Everything below fits in the source, so it fits in u32.
    let window = CropWindow {
        x: x as u32,
        y: crop.y as u32,
        width: crop.width as u32,
        height: crop.height as u32,
    };

    let (out_w, out_h) = match scale {
        Some(scale) => (scale.width, scale.height),
        None => (crop.width, crop.height),
    };
    let max = limits.max_dimension as i64;
    if out_w > max || out_h > max {
        return Err(GeometryError::OutputTooLarge {
            width: out_w,
            height: out_h,
            max_dimension: limits.max_dimension,
        }
        .into());
    }
    // Both are in 1..=max_dimension here.
    let output = Size::new(out_w as u32, out_h as u32);

    Ok(ResolvedGeometry {
        crop: window,
        output,
        requested: crop,
        origin_shift,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn rgba(width: u32, height: u32) -> SourceGeometry {
        SourceGeometry::new(Size::new(width, height), PixelFormat::Rgba8888)
    }

    fn yuyv(width: u32, height: u32) -> SourceGeometry {
        SourceGeometry::new(Size::new(width, height), PixelFormat::Yuyv422)
    }

    fn resolve_default(
        source: SourceGeometry,
        crop: Rect,
        scale: Option<ScaleTarget>,
    ) -> Result<ResolvedGeometry> {
        resolve(source, crop, scale, &Limits::default())
    }

    fn geometry_error(result: Result<ResolvedGeometry>) -> GeometryError {
        match result {
            Err(Error::InvalidGeometry(e)) => e,
            other => panic!("expected geometry error, got {:?}", other),
        }
    }

    #[test]
    fn test_crop_only_uses_crop_size() {
        let resolved = resolve_default(rgba(640, 480), Rect::new(10, 20, 100, 50), None).unwrap();
        assert_eq!(resolved.output, Size::new(100, 50));
        assert!(!resolved.is_scaled());
        assert!(!resolved.was_adjusted());
    }

    #[test]
    fn test_scale_target() {
        let resolved = resolve_default(
            rgba(640, 480),
            Rect::new(0, 0, 640, 480),
            Some(ScaleTarget::new(160, 120)),
        )
        .unwrap();
        assert_eq!(resolved.output, Size::new(160, 120));
        assert!(resolved.is_scaled());
    }

    #[test]
    fn test_out_of_bounds() {
        let err = geometry_error(resolve_default(
            rgba(100, 100),
            Rect::new(90, 0, 20, 100),
            Some(ScaleTarget::new(10, 10)),
        ));
        assert!(matches!(err, GeometryError::OutOfBounds { x: 90, .. }));

        let err = geometry_error(resolve_default(rgba(100, 100), Rect::new(0, 1, 100, 100), None));
        assert!(matches!(err, GeometryError::OutOfBounds { .. }));

        let err = geometry_error(resolve_default(rgba(100, 100), Rect::new(-1, 0, 10, 10), None));
        assert!(matches!(err, GeometryError::OutOfBounds { .. }));

        let err = geometry_error(resolve_default(
            rgba(100, 100),
            Rect::new(i64::MAX, 0, 10, 10),
            None,
        ));
        assert!(matches!(err, GeometryError::OutOfBounds { .. }));
    }

    #[test]
    fn test_non_positive_dimensions() {
        let err = geometry_error(resolve_default(rgba(100, 100), Rect::new(0, 0, 0, 10), None));
        assert!(matches!(
            err,
            GeometryError::NonPositiveDimension { what: "crop", .. }
        ));

        let err = geometry_error(resolve_default(
            rgba(100, 100),
            Rect::new(0, 0, 10, 10),
            Some(ScaleTarget::new(10, 0)),
        ));
        assert!(matches!(
            err,
            GeometryError::NonPositiveDimension { what: "scale", .. }
        ));
    }

    #[test]
    fn test_dimension_check_precedes_bounds_check() {
        let err = geometry_error(resolve_default(rgba(10, 10), Rect::new(50, 50, -3, 4), None));
        assert!(matches!(err, GeometryError::NonPositiveDimension { .. }));
    }

    #[test]
    fn test_odd_origin_shifted_for_packed_422() {
        for x in [1i64, 3, 5, 17] {
            let resolved = resolve_default(yuyv(64, 8), Rect::new(x, 0, 8, 8), None).unwrap();
            assert_eq!(resolved.crop.x as i64, x + 1);
            assert_eq!(resolved.crop.width, 8);
            assert_eq!(resolved.origin_shift, 1);
            assert_eq!(resolved.requested.x, x);
        }

        let resolved = resolve_default(yuyv(64, 8), Rect::new(4, 0, 8, 8), None).unwrap();
        assert_eq!(resolved.crop.x, 4);
        assert!(!resolved.was_adjusted());
    }

    #[test]
    fn test_rgba_odd_origin_untouched() {
        let resolved = resolve_default(rgba(64, 8), Rect::new(3, 0, 8, 8), None).unwrap();
        assert_eq!(resolved.crop.x, 3);
    }

    #[test]
    fn test_shift_can_push_window_out_of_bounds() {
        let err = geometry_error(resolve_default(yuyv(16, 4), Rect::new(9, 0, 7, 4), None));
        assert!(matches!(err, GeometryError::OutOfBounds { x: 10, .. }));
    }

    #[test]
    fn test_output_limit_checked_before_allocation() {
        let err = geometry_error(resolve_default(
            rgba(16, 16),
            Rect::new(0, 0, 16, 16),
            Some(ScaleTarget::new(1 << 40, 1)),
        ));
        assert!(matches!(err, GeometryError::OutputTooLarge { .. }));

        let limits = Limits {
            max_dimension: 64,
            ..Limits::default()
        };
        let err = geometry_error(resolve(
            rgba(16, 16),
            Rect::new(0, 0, 16, 16),
            Some(ScaleTarget::new(65, 1)),
            &limits,
        ));
        assert!(matches!(
            err,
            GeometryError::OutputTooLarge {
                width: 65,
                max_dimension: 64,
                ..
            }
        ));
        assert!(resolve(
            rgba(16, 16),
            Rect::new(0, 0, 16, 16),
            Some(ScaleTarget::new(64, 64)),
            &limits
        )
        .is_ok());
    }

    #[test]
    fn test_crop_of_oversized_source() {
        let limits = Limits {
            max_dimension: 100,
            ..Limits::default()
        };
        let wide = rgba(20_000, 1);
        assert!(resolve(wide, Rect::new(0, 0, 100, 1), None, &limits).is_ok());
        let err = geometry_error(resolve(wide, Rect::new(0, 0, 101, 1), None, &limits));
        assert!(matches!(err, GeometryError::OutputTooLarge { width: 101, .. }));
    }
}
