use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use frameresize::{
    CropRequest, Frame, FrameResizer, Orientation, PixelBuffer, PixelFormat, ResizeConfig,
    SampleTiming, StrategyKind,
};

fn frame(width: u32, height: u32) -> Frame {
    let data = (0..width as usize * height as usize * 4)
        .map(|i| (i % 253) as u8)
        .collect();
    let buffer = PixelBuffer::from_packed(data, width, height, PixelFormat::Bgra8888).unwrap();
    Frame::new(buffer, SampleTiming::default(), Orientation::Up).unwrap()
}

fn bench_scale(c: &mut Criterion) {
    let source = frame(1920, 1080);
    let mut group = c.benchmark_group("scale_1080p");

    for strategy in [StrategyKind::DirectResample, StrategyKind::RenderedCrop] {
        let resizer = FrameResizer::new(ResizeConfig::default().with_strategy(strategy)).unwrap();
        for (w, h) in [(1919, 1079), (1280, 720), (640, 360), (480, 270)] {
            let request = CropRequest::new(0, 0, 1920, 1080).with_scale(w, h);
            group.bench_with_input(
                BenchmarkId::new(strategy.display_name(), format!("{}x{}", w, h)),
                &request,
                |b, request| b.iter(|| resizer.resize(black_box(&source), *request).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_crop(c: &mut Criterion) {
    let source = frame(1920, 1080);
    let request = CropRequest::new(320, 180, 1280, 720);
    let mut group = c.benchmark_group("crop_720p");

    for strategy in [StrategyKind::DirectResample, StrategyKind::RenderedCrop] {
        let resizer = FrameResizer::new(ResizeConfig::default().with_strategy(strategy)).unwrap();
        group.bench_function(strategy.display_name(), |b| {
            b.iter(|| resizer.resize(black_box(&source), request).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scale, bench_crop);
criterion_main!(benches);
