//! Benchmarks for CPU-side batching against the mock context

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::{Affine2, UVec2, Vec2};
use pulse_render::{
    Color, DrawSpriteOptions, RenderConfig, Renderer, StrokePathOptions, Texture, TextureOptions,
    Vertex2d,
};
use pulse_test_utils::MockRenderContext;

fn setup() -> (Arc<MockRenderContext>, Renderer, Texture, Texture) {
    let ctx = Arc::new(MockRenderContext::new());
    let renderer = Renderer::new(ctx.clone(), RenderConfig::default()).unwrap();
    let texture = |size| {
        Texture::new(
            &*ctx,
            &TextureOptions {
                width: size,
                height: size,
                ..Default::default()
            },
        )
        .unwrap()
    };
    let target = texture(1024);
    let atlas = texture(256);
    (ctx, renderer, target, atlas)
}

fn bench_sprite_batching(c: &mut Criterion) {
    let mut group = c.benchmark_group("sprite_batching");

    for count in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(count as u64));

        let (ctx, mut renderer, target, atlas) = setup();
        let tile = atlas.sub_texture(UVec2::ZERO, UVec2::splat(32)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                for i in 0..count {
                    let options = DrawSpriteOptions {
                        transform: Affine2::from_translation(Vec2::new(i as f32, 0.0)),
                        ..Default::default()
                    };
                    renderer
                        .draw_sprite(target.region(), tile, black_box(&options))
                        .unwrap();
                }
                let stats = renderer.flush_all().unwrap();
                ctx.clear_calls();
                stats
            });
        });
    }

    group.finish();
}

fn bench_mesh_batching(c: &mut Criterion) {
    let mut group = c.benchmark_group("mesh_batching");

    for triangles in [100, 10000] {
        group.throughput(Throughput::Elements(triangles as u64));

        let (ctx, mut renderer, target, _atlas) = setup();
        let vertices: Vec<Vertex2d> = (0..triangles * 3)
            .map(|i| Vertex2d::new(Vec2::new(i as f32, (i % 3) as f32), Color::WHITE))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(triangles), &vertices, |b, vertices| {
            b.iter(|| {
                renderer
                    .draw_triangles(target.region(), black_box(vertices), &Default::default())
                    .unwrap();
                let stats = renderer.flush_all().unwrap();
                ctx.clear_calls();
                stats
            });
        });
    }

    group.finish();
}

fn bench_stroke_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("stroke_chunking");

    for points in [1000, 300_000] {
        group.throughput(Throughput::Elements(points as u64));

        let (ctx, mut renderer, target, _atlas) = setup();
        let path: Vec<Vec2> = (0..points).map(|i| Vec2::new(i as f32, 0.0)).collect();

        group.bench_with_input(BenchmarkId::from_parameter(points), &path, |b, path| {
            b.iter(|| {
                renderer
                    .stroke_path(target.region(), black_box(path), &StrokePathOptions::default())
                    .unwrap();
                ctx.clear_calls();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sprite_batching,
    bench_mesh_batching,
    bench_stroke_chunking
);
criterion_main!(benches);
