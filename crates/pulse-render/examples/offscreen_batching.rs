//! Example rendering a frame offscreen and reporting how it was batched.
//!
//! This example shows how to:
//! - Create a graphics context without a window
//! - Build a sprite atlas from CPU pixels and draw regions of it
//! - Mix sprites, filled and stroked paths in one frame
//! - Read the per-frame pass statistics
//!
//! Run with `RUST_LOG=pulse_render=debug` to see every submitted pass.

use glam::{Affine2, UVec2, Vec2};
use pulse_core::{
    logging,
    profiling::{ProfilingBackend, init_profiling, new_frame, profile_scope},
};
use pulse_render::{
    BlendMode, Color, DrawSpriteOptions, FillPathOptions, GraphicsContext,
    GraphicsContextDescriptor, RenderConfig, Renderer, StrokePathOptions, Texture,
    TextureOptions,
};

const ATLAS_SIZE: u32 = 64;
const TILE_SIZE: u32 = 16;
const FRAMES: usize = 3;

/// A 4x4 grid of differently tinted tiles.
fn atlas_pixels() -> Vec<u8> {
    let mut pixels = Vec::with_capacity((ATLAS_SIZE * ATLAS_SIZE * 4) as usize);
    for y in 0..ATLAS_SIZE {
        for x in 0..ATLAS_SIZE {
            let tile = (x / TILE_SIZE + y / TILE_SIZE * 4) as u8;
            pixels.extend_from_slice(&[tile * 16, 255 - tile * 16, 128, 255]);
        }
    }
    pixels
}

fn main() {
    logging::init();
    init_profiling(ProfilingBackend::PuffinHttp);

    let ctx = GraphicsContext::new_owned_sync(GraphicsContextDescriptor::default())
        .expect("Failed to create graphics context");
    let info = ctx.info();
    println!("Rendering on {} ({:?})", info.name, info.backend);

    let mut renderer =
        Renderer::new(ctx.clone(), RenderConfig::default()).expect("Failed to create renderer");

    let target = Texture::new(
        &*ctx,
        &TextureOptions {
            label: Some("Offscreen"),
            width: 512,
            height: 512,
            msaa: true,
            ..Default::default()
        },
    )
    .expect("Failed to create render target");
    let atlas = Texture::from_rgba8(&*ctx, Some("Atlas"), ATLAS_SIZE, ATLAS_SIZE, &atlas_pixels())
        .expect("Failed to upload atlas");

    let outline: Vec<Vec2> = (0..=64)
        .map(|i| {
            let angle = i as f32 / 64.0 * std::f32::consts::TAU;
            Vec2::new(256.0, 256.0) + Vec2::from_angle(angle) * 180.0
        })
        .collect();

    for frame in 0..FRAMES {
        profile_scope!("frame");

        renderer
            .clear(target.region(), Color::from_hex(0x202030))
            .expect("clear");

        // every tile shares the atlas, so these batch into one pass
        for index in 0..256u32 {
            let tile = UVec2::new(index % 4, index / 4 % 4) * TILE_SIZE;
            let source = atlas
                .sub_texture(tile, UVec2::splat(TILE_SIZE))
                .expect("tile inside atlas");
            let position = Vec2::new((index % 16) as f32, (index / 16) as f32) * 32.0;
            let options = DrawSpriteOptions {
                transform: Affine2::from_scale_angle_translation(
                    Vec2::splat(2.0),
                    frame as f32 * 0.1,
                    position,
                ),
                ..Default::default()
            };
            renderer
                .draw_sprite(target.region(), source, &options)
                .expect("draw sprite");
        }

        renderer
            .fill_path(
                target.region(),
                &outline[..32],
                &FillPathOptions {
                    color: Color::rgba(0.2, 0.6, 1.0, 0.5),
                    blend: BlendMode::Alpha,
                    ..Default::default()
                },
            )
            .expect("fill path");
        renderer
            .stroke_path(
                target.region(),
                &outline,
                &StrokePathOptions {
                    thickness: 6.0,
                    color: Color::WHITE,
                    ..Default::default()
                },
            )
            .expect("stroke path");

        let stats = renderer.flush_all().expect("flush frame");
        println!(
            "frame {}: {} passes, {} records, {} new pipelines",
            frame, stats.passes, stats.records, stats.pipelines_created
        );
        new_frame();
    }

    renderer.release_texture(atlas).expect("release atlas");
    renderer.release_texture(target).expect("release target");
}
