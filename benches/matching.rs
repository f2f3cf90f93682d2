use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use evony_cdb::core::coords::{Point, Rect};
use evony_cdb::{CaptureFrame, MatchParams, Matcher, ScaleRange, TemplateStore};
use image::imageops::FilterType;
use image::{GrayImage, Luma, Rgb, RgbImage};

fn make_image(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        Luma([(((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as u8])
    })
}

/// Game-sized frame with a button-like patch at (913, 417).
fn make_scene() -> (CaptureFrame, GrayImage) {
    let base = image::imageops::resize(&make_image(200, 113), 1600, 900, FilterType::Triangle);
    let button = image::imageops::resize(&make_image(20, 8), 80, 32, FilterType::Triangle);
    let mut gray = base;
    image::imageops::replace(&mut gray, &button, 913, 417);
    let rgb = RgbImage::from_fn(1600, 900, |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    });
    (CaptureFrame::new(rgb, Point::new(0, 0)), button)
}

fn bench_locate(c: &mut Criterion) {
    let (frame, button) = make_scene();
    let store = TemplateStore::preloaded(vec![("Attack.png", button)]);
    let matcher = Matcher::new(Arc::new(store));
    let names = ["Attack.png"];

    let click_step = MatchParams::new(0.80, ScaleRange::new(0.95, 1.05, 0.05), false);
    c.bench_function("locate_window_3_scales", |b| {
        b.iter(|| black_box(matcher.locate(&frame, None, &names, &click_step)))
    });

    let attack_step = MatchParams::new(0.72, ScaleRange::new(0.85, 1.20, 0.05), true);
    let roi = Rect::new(440, 247, 720, 405);
    c.bench_function("locate_roi_8_scales_edges", |b| {
        b.iter(|| black_box(matcher.locate(&frame, Some(roi), &names, &attack_step)))
    });
}

criterion_group!(benches, bench_locate);
criterion_main!(benches);
