//! Frame resizer front end
//!
//! [`FrameResizer`] locks the source, resolves the crop geometry, hands the
//! work to a [`ResizeStrategy`] and assembles the output frame. Two
//! strategies exist:
//!
//! - [`DirectResampler`]: area-averages straight from a strided view of the
//!   source into the destination
//! - [`RenderedCropper`]: crops through the image-graph renderer, then
//!   scales the rendered crop when the output size differs

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::buffer::{BufferDescriptor, DestinationBuffer, PixelBuffer};
use crate::config::{Limits, ResizeConfig, StrategyKind, TimingPolicy};
use crate::error::{Error, Result};
use crate::frame::{self, Frame};
use crate::geometry::{self, CropWindow, ResolvedGeometry, SourceGeometry};
use crate::processing::{area_resize, StridedView};
use crate::render::{self, ImageNode, RenderContext};
use crate::types::{Rect, ScaleTarget};

/// One way of turning a locked source into the output pixels
pub trait ResizeStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Produce a buffer of `geometry.output` pixels in the source format.
    /// The source is only read.
    fn resize(
        &self,
        source: &BufferDescriptor<'_>,
        geometry: &ResolvedGeometry,
        limits: &Limits,
    ) -> Result<PixelBuffer>;
}

/// Area resampling from a strided view of the source
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectResampler;

impl ResizeStrategy for DirectResampler {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectResample
    }

    fn resize(
        &self,
        source: &BufferDescriptor<'_>,
        geometry: &ResolvedGeometry,
        limits: &Limits,
    ) -> Result<PixelBuffer> {
        let format = source.pixel_format();
        if !format.is_uniform() {
            return Err(Error::UnsupportedFormat(
                format,
                "direct resampling needs independent packed pixels",
            ));
        }

        let view = StridedView::crop(source, geometry.crop)?;
        let mut dst = DestinationBuffer::allocate(geometry.output, format, limits)?;
        area_resize(&view, &mut dst.view_mut())?;
        Ok(dst.finish())
    }
}

/// Crop through the renderer, scale as a second step
#[derive(Debug, Default, Clone)]
pub struct RenderedCropper {
    context: Option<Arc<RenderContext>>,
}

impl RenderedCropper {
    /// Render with the process-wide shared context
    pub fn new() -> Self {
        Self::default()
    }

    /// Render with a caller-owned context
    pub fn with_context(context: Arc<RenderContext>) -> Self {
        Self {
            context: Some(context),
        }
    }

    fn context(&self) -> Arc<RenderContext> {
        self.context.clone().unwrap_or_else(render::shared_context)
    }
}

impl ResizeStrategy for RenderedCropper {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RenderedCrop
    }

    fn resize(
        &self,
        source: &BufferDescriptor<'_>,
        geometry: &ResolvedGeometry,
        limits: &Limits,
    ) -> Result<PixelBuffer> {
        let format = source.pixel_format();
        if format.is_planar() {
            return Err(Error::UnsupportedFormat(
                format,
                "planar frames cannot be rendered",
            ));
        }
        if geometry.is_scaled() && !format.is_uniform() {
            return Err(Error::UnsupportedFormat(
                format,
                "packed 4:2:2 frames can be cropped but not scaled",
            ));
        }

        let crop = geometry.crop.as_rect();
        let node = ImageNode::source(source.buffer().clone())
            .cropped(crop)
            .translated(-crop.x, -crop.y);

        let mut rendered = DestinationBuffer::allocate(geometry.crop.size(), format, limits)?;
        self.context().render(
            &node,
            &mut rendered.view_mut(),
            Rect::new(0, 0, crop.width, crop.height),
        )?;
        let rendered = rendered.finish();

        if !geometry.is_scaled() {
            return Ok(rendered);
        }

        let desc = rendered.lock_read()?;
        let window = CropWindow {
            x: 0,
            y: 0,
            width: geometry.crop.width,
            height: geometry.crop.height,
        };
        let view = StridedView::crop(&desc, window)?;
        let mut dst = DestinationBuffer::allocate(geometry.output, format, limits)?;
        area_resize(&view, &mut dst.view_mut())?;
        Ok(dst.finish())
    }
}

/// Create the strategy for `kind`
pub fn create_strategy(kind: StrategyKind) -> Box<dyn ResizeStrategy> {
    match kind {
        StrategyKind::DirectResample => Box::new(DirectResampler),
        StrategyKind::RenderedCrop => Box::new(RenderedCropper::new()),
    }
}

/// Crop window plus optional output size, as raw host integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRequest {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub scale: Option<ScaleTarget>,
}

impl CropRequest {
    /// Crop-only request
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            scale: None,
        }
    }

    /// Scale the crop to `width`x`height`
    pub fn with_scale(mut self, width: i64, height: i64) -> Self {
        self.scale = Some(ScaleTarget::new(width, height));
        self
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Output frame together with the geometry that produced it
#[derive(Debug, Clone)]
pub struct Resized {
    pub frame: Frame,
    pub geometry: ResolvedGeometry,
}

/// Running counters for a resizer
#[derive(Debug, Clone, Default)]
pub struct ResizeStats {
    /// Frames produced
    pub frames_resized: u64,
    /// Frames that failed and were dropped
    pub frames_failed: u64,
    /// Time spent on successful resizes
    pub total_time: Duration,
}

impl ResizeStats {
    /// Average time per produced frame in milliseconds
    pub fn avg_resize_time_ms(&self) -> f64 {
        if self.frames_resized == 0 {
            return 0.0;
        }
        self.total_time.as_secs_f64() * 1000.0 / self.frames_resized as f64
    }
}

/// Crops and scales frames with a configured strategy
pub struct FrameResizer {
    config: ResizeConfig,
    strategy: Box<dyn ResizeStrategy>,
    stats: Mutex<ResizeStats>,
}

impl FrameResizer {
    pub fn new(config: ResizeConfig) -> Result<Self> {
        let strategy = create_strategy(config.strategy);
        Self::with_strategy(config, strategy)
    }

    /// Use a custom strategy. `config.strategy` is ignored.
    pub fn with_strategy(config: ResizeConfig, strategy: Box<dyn ResizeStrategy>) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            "Frame resizer using {} strategy, {:?} timing",
            strategy.kind(),
            config.timing
        );
        Ok(Self {
            config,
            strategy,
            stats: Mutex::new(ResizeStats::default()),
        })
    }

    pub fn builder() -> ResizerBuilder {
        ResizerBuilder::new()
    }

    pub fn config(&self) -> &ResizeConfig {
        &self.config
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Crop and scale `frame`
    pub fn resize(&self, frame: &Frame, request: CropRequest) -> Result<Frame> {
        self.resize_with_report(frame, request)
            .map(|resized| resized.frame)
    }

    /// Like [`resize`](Self::resize), also reporting the resolved geometry
    pub fn resize_with_report(&self, frame: &Frame, request: CropRequest) -> Result<Resized> {
        let started = Instant::now();
        let result = self.run(frame, request);
        let elapsed = started.elapsed();

        let mut stats = self.stats.lock();
        match &result {
            Ok(resized) => {
                stats.frames_resized += 1;
                stats.total_time += elapsed;
                tracing::trace!(
                    "Resized {} -> {} in {:?}",
                    frame.description().size,
                    resized.frame.description().size,
                    elapsed
                );
            }
            Err(e) => {
                stats.frames_failed += 1;
                if e.is_input_error() {
                    tracing::debug!("Resize request rejected: {}", e);
                } else {
                    tracing::warn!("Resize failed, dropping frame: {}", e);
                }
            }
        }

        result
    }

    fn run(&self, frame: &Frame, request: CropRequest) -> Result<Resized> {
        let (buffer, geometry) = {
            let source = frame.buffer().lock_read()?;
            let geometry = geometry::resolve(
                SourceGeometry::from(&source),
                request.rect(),
                request.scale,
                &self.config.limits,
            )?;
            let buffer = self
                .strategy
                .resize(&source, &geometry, &self.config.limits)?;
            (buffer, geometry)
        };

        let frame = frame::assemble(buffer, frame, self.config.timing, &self.config.limits)?;
        Ok(Resized { frame, geometry })
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> ResizeStats {
        self.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = ResizeStats::default();
    }
}

impl std::fmt::Debug for FrameResizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameResizer")
            .field("config", &self.config)
            .field("strategy", &self.strategy.kind())
            .finish()
    }
}

/// Builder for [`FrameResizer`]
#[derive(Debug, Default)]
pub struct ResizerBuilder {
    config: ResizeConfig,
    context: Option<Arc<RenderContext>>,
}

impl ResizerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ResizeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn timing(mut self, timing: TimingPolicy) -> Self {
        self.config.timing = timing;
        self
    }

    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.limits.max_dimension = max_dimension;
        self
    }

    pub fn max_allocation_bytes(mut self, bytes: usize) -> Self {
        self.config.limits.max_allocation_bytes = bytes;
        self
    }

    /// Render context for the rendered-crop strategy instead of the shared one
    pub fn render_context(mut self, context: Arc<RenderContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Result<FrameResizer> {
        let strategy: Box<dyn ResizeStrategy> = match (self.config.strategy, self.context) {
            (StrategyKind::RenderedCrop, Some(context)) => {
                Box::new(RenderedCropper::with_context(context))
            }
            (kind, _) => create_strategy(kind),
        };
        FrameResizer::with_strategy(self.config, strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MediaTime, Orientation, PixelFormat, SampleTiming, Size};

    fn timing() -> SampleTiming {
        SampleTiming {
            presentation: MediaTime::new(1001, 30_000),
            decode: MediaTime::INVALID,
            duration: MediaTime::new(1001, 30_000),
        }
    }

    fn frame(width: u32, height: u32, format: PixelFormat) -> Frame {
        let row = format.min_bytes_per_row(width).unwrap();
        let data = (0..row * height as usize).map(|i| (i * 7 % 251) as u8).collect();
        let buffer = PixelBuffer::from_packed(data, width, height, format).unwrap();
        Frame::new(buffer, timing(), Orientation::Up).unwrap()
    }

    fn rendered() -> FrameResizer {
        FrameResizer::builder()
            .strategy(StrategyKind::RenderedCrop)
            .render_context(Arc::new(RenderContext::new()))
            .build()
            .unwrap()
    }

    fn bytes(frame: &Frame) -> Vec<u8> {
        frame.buffer().lock_read().unwrap().bytes().to_vec()
    }

    #[test]
    fn test_strategies_agree_on_crop() {
        let source = frame(32, 16, PixelFormat::Bgra8888);
        let request = CropRequest::new(3, 5, 17, 9);
        let direct = FrameResizer::new(ResizeConfig::default()).unwrap();

        let a = direct.resize(&source, request).unwrap();
        let b = rendered().resize(&source, request).unwrap();
        assert_eq!(a.description(), b.description());
        assert_eq!(bytes(&a), bytes(&b));
    }

    #[test]
    fn test_strategies_agree_on_scale() {
        let source = frame(40, 30, PixelFormat::Rgba8888);
        let request = CropRequest::new(4, 2, 24, 24).with_scale(6, 6);
        let direct = FrameResizer::new(ResizeConfig::default()).unwrap();

        let a = direct.resize(&source, request).unwrap();
        let b = rendered().resize(&source, request).unwrap();
        assert_eq!(a.description().size, Size::new(6, 6));
        assert_eq!(bytes(&a), bytes(&b));
    }

    #[test]
    fn test_packed_422_crop() {
        let source = frame(16, 4, PixelFormat::Yuyv422);
        let direct = FrameResizer::new(ResizeConfig::default()).unwrap();
        let err = direct
            .resize(&source, CropRequest::new(2, 0, 4, 2))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedFormat(PixelFormat::Yuyv422, _)
        ));

        let report = rendered()
            .resize_with_report(&source, CropRequest::new(3, 1, 4, 2))
            .unwrap();
        assert_eq!(report.geometry.crop.x, 4);
        assert!(report.geometry.was_adjusted());

        let out = bytes(&report.frame);
        let src = source.buffer().lock_read().unwrap();
        assert_eq!(&out[..8], &src.row(1).unwrap()[8..16]);
        assert_eq!(&out[8..], &src.row(2).unwrap()[8..16]);
    }

    #[test]
    fn test_packed_422_scale_rejected() {
        let source = frame(16, 4, PixelFormat::Uyvy422);
        let err = rendered()
            .resize(&source, CropRequest::new(0, 0, 8, 4).with_scale(4, 2))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(..)));
    }

    #[test]
    fn test_planar_rejected_by_both() {
        let source = frame(8, 8, PixelFormat::Nv12);
        let direct = FrameResizer::new(ResizeConfig::default()).unwrap();
        for resizer in [direct, rendered()] {
            let err = resizer
                .resize(&source, CropRequest::new(0, 0, 4, 4))
                .unwrap_err();
            assert!(matches!(err, Error::UnsupportedFormat(PixelFormat::Nv12, _)));
            assert_eq!(source.buffer().lock_count(), 0);
        }
    }

    #[test]
    fn test_reset_timing() {
        let source = frame(8, 8, PixelFormat::Gray8);
        let resizer = FrameResizer::builder()
            .timing(TimingPolicy::Reset)
            .build()
            .unwrap();
        let out = resizer
            .resize(&source, CropRequest::new(0, 0, 8, 8).with_scale(2, 2))
            .unwrap();
        assert_eq!(out.timing(), SampleTiming::RESET);

        let preserved = FrameResizer::new(ResizeConfig::default())
            .unwrap()
            .resize(&source, CropRequest::new(0, 0, 4, 4))
            .unwrap();
        assert_eq!(preserved.timing(), source.timing());
    }

    #[test]
    fn test_stats() {
        let source = frame(8, 8, PixelFormat::Gray8);
        let resizer = FrameResizer::new(ResizeConfig::default()).unwrap();
        resizer
            .resize(&source, CropRequest::new(0, 0, 4, 4))
            .unwrap();
        assert!(resizer
            .resize(&source, CropRequest::new(6, 0, 4, 4))
            .is_err());

        let stats = resizer.stats();
        assert_eq!(stats.frames_resized, 1);
        assert_eq!(stats.frames_failed, 1);

        resizer.reset_stats();
        assert_eq!(resizer.stats().frames_resized, 0);
        assert_eq!(resizer.stats().avg_resize_time_ms(), 0.0);
    }

    #[test]
    fn test_builder_validates() {
        assert!(matches!(
            FrameResizer::builder().max_dimension(0).build(),
            Err(Error::Config(_))
        ));
        let resizer = FrameResizer::builder()
            .strategy(StrategyKind::RenderedCrop)
            .build()
            .unwrap();
        assert_eq!(resizer.strategy_kind(), StrategyKind::RenderedCrop);
    }

    #[test]
    fn test_create_strategy() {
        for kind in [StrategyKind::DirectResample, StrategyKind::RenderedCrop] {
            assert_eq!(create_strategy(kind).kind(), kind);
        }
    }
}
