//! The draw API used by games.
//!
//! A [`Renderer`] owns every batch and cache. Each draw is routed to the
//! batch of its kind through the [`CommandRouter`], so draws of different
//! kinds are submitted in call order even though they are batched.
//!
//! # Example
//!
//! ```ignore
//! let mut renderer = Renderer::new(context, RenderConfig::default())?;
//!
//! renderer.clear(target.region(), Color::BLACK)?;
//! renderer.draw_sprite(target.region(), player.region(), &DrawSpriteOptions::default())?;
//! renderer.stroke_path(target.region(), &outline, &StrokePathOptions::default())?;
//!
//! let stats = renderer.flush_all()?;
//! tracing::debug!("{} passes", stats.passes);
//! ```

use std::sync::Arc;

use glam::{Affine2, Vec2};
use pulse_core::profiling::profile_function;
use pulse_test_utils::RenderContext;

use crate::{
    batch::{
        BatchStats, ClearCommand, DrawSpriteOptions, DrawSpritesFromGpuOptions,
        DrawTrianglesOptions, LineBatch, MeshBatch, SpriteBatch, StrokePathOptions, Vertex2d,
    },
    blend::BlendMode,
    color::Color,
    config::RenderConfig,
    error::RenderResult,
    router::{CommandKind, CommandRouter, FlushCommand},
    texture::{Texture, TextureRegion},
};

#[derive(Debug, Clone, Default)]
pub struct FillPathOptions {
    pub transform: Affine2,
    pub color: Color,
    pub blend: BlendMode,
}

/// Work submitted since the last [`Renderer::flush_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub passes: u32,
    /// Sprite instances, mesh vertices and line points drawn
    pub records: u64,
    pub pipelines_created: u64,
}

/// All batches, flushed by kind.
struct Commands {
    sprite: SpriteBatch,
    mesh: MeshBatch,
    line: LineBatch,
    clear: ClearCommand,
}

impl FlushCommand for Commands {
    fn flush(&mut self, kind: CommandKind) -> RenderResult<()> {
        match kind {
            CommandKind::Sprite => self.sprite.flush(),
            CommandKind::Mesh2d => self.mesh.flush(),
            CommandKind::Line => self.line.flush(),
            CommandKind::Clear => self.clear.flush(&mut self.sprite),
        }
    }
}

impl Commands {
    fn pipelines_created(&self) -> u64 {
        self.sprite.pipelines().created_count()
            + self.mesh.pipelines().created_count()
            + self.line.pipelines().created_count()
    }

    fn batch_stats(&self) -> [BatchStats; 4] {
        [
            self.sprite.stats(),
            self.mesh.stats(),
            self.line.stats(),
            self.clear.stats(),
        ]
    }

    fn reset_stats(&mut self) {
        self.sprite.stats_mut().take();
        self.mesh.stats_mut().take();
        self.line.stats_mut().take();
        self.clear.stats_mut().take();
    }
}

pub struct Renderer {
    ctx: Arc<dyn RenderContext>,
    router: CommandRouter,
    commands: Commands,
    /// Pipelines created before the current frame
    pipelines_baseline: u64,
}

impl Renderer {
    pub fn new(ctx: Arc<dyn RenderContext>, config: RenderConfig) -> RenderResult<Self> {
        config.validate()?;

        let commands = Commands {
            sprite: SpriteBatch::new(ctx.clone(), &config)?,
            mesh: MeshBatch::new(ctx.clone(), &config)?,
            line: LineBatch::new(ctx.clone(), &config)?,
            clear: ClearCommand::new(ctx.clone())?,
        };
        tracing::debug!("Created renderer with {:?}", config);

        Ok(Self {
            ctx,
            router: CommandRouter::new(),
            commands,
            pipelines_baseline: 0,
        })
    }

    pub fn context(&self) -> &Arc<dyn RenderContext> {
        &self.ctx
    }

    pub fn draw_sprite(
        &mut self,
        dest: TextureRegion,
        source: TextureRegion,
        options: &DrawSpriteOptions,
    ) -> RenderResult<()> {
        self.router.switch_to(CommandKind::Sprite, &mut self.commands)?;
        self.commands.sprite.draw(dest, source, options)
    }

    /// Draw sprite instances stored in a GPU buffer in a pass of their own.
    pub fn draw_sprites_from_gpu(
        &mut self,
        dest: TextureRegion,
        source: TextureRegion,
        options: &DrawSpritesFromGpuOptions,
    ) -> RenderResult<()> {
        self.router.switch_to(CommandKind::Sprite, &mut self.commands)?;
        self.commands.sprite.draw_from_gpu(dest, source, options)
    }

    pub fn draw_triangles(
        &mut self,
        dest: TextureRegion,
        vertices: &[Vertex2d],
        options: &DrawTrianglesOptions,
    ) -> RenderResult<()> {
        self.router.switch_to(CommandKind::Mesh2d, &mut self.commands)?;
        self.commands.mesh.draw_triangles(dest, vertices, options)
    }

    pub fn stroke_path(
        &mut self,
        dest: TextureRegion,
        points: &[Vec2],
        options: &StrokePathOptions,
    ) -> RenderResult<()> {
        self.router.switch_to(CommandKind::Line, &mut self.commands)?;
        self.commands.line.stroke(dest, points, options)
    }

    /// Fill the polygon through `points` as a triangle fan around the first
    /// point. Exact for convex and star-shaped contours.
    pub fn fill_path(
        &mut self,
        dest: TextureRegion,
        points: &[Vec2],
        options: &FillPathOptions,
    ) -> RenderResult<()> {
        profile_function!();

        if points.len() < 3 {
            return Ok(());
        }

        let vertex = |position: Vec2| Vertex2d::new(position, options.color);
        let vertices: Vec<Vertex2d> = points
            .windows(2)
            .skip(1)
            .flat_map(|pair| [vertex(points[0]), vertex(pair[1]), vertex(pair[0])])
            .collect();

        self.draw_triangles(
            dest,
            &vertices,
            &DrawTrianglesOptions {
                transform: options.transform,
                blend: options.blend,
                color: Color::WHITE,
                shader: None,
            },
        )
    }

    pub fn clear(&mut self, dest: TextureRegion, color: Color) -> RenderResult<()> {
        self.router.switch_to(CommandKind::Clear, &mut self.commands)?;
        let Commands { sprite, clear, .. } = &mut self.commands;
        clear.clear(sprite, dest, color)
    }

    /// Submit everything pending. Call once per frame before presenting.
    ///
    /// Returns the work submitted since the previous call, and resets it.
    pub fn flush_all(&mut self) -> RenderResult<FrameStats> {
        profile_function!();

        let result = self.router.flush_current(&mut self.commands);
        let stats = self.take_stats();
        result?;

        tracing::trace!(
            "Frame: {} passes, {} records, {} new pipelines",
            stats.passes,
            stats.records,
            stats.pipelines_created
        );
        Ok(stats)
    }

    /// Work submitted so far in this frame.
    pub fn stats(&self) -> FrameStats {
        let mut stats = FrameStats {
            pipelines_created: self.commands.pipelines_created() - self.pipelines_baseline,
            ..Default::default()
        };
        for batch in self.commands.batch_stats() {
            stats.passes += batch.passes;
            stats.records += batch.records;
        }
        stats
    }

    fn take_stats(&mut self) -> FrameStats {
        let stats = self.stats();
        self.commands.reset_stats();
        self.pipelines_baseline = self.commands.pipelines_created();
        stats
    }

    /// Flush pending work, which may reference `texture`, then destroy it.
    pub fn release_texture(&mut self, texture: Texture) -> RenderResult<()> {
        let result = self.router.flush_current(&mut self.commands);
        texture.release(&*self.ctx);
        result
    }

    /// The batch currently holding pending work.
    pub fn current_command(&self) -> Option<CommandKind> {
        self.router.current()
    }

    /// Pending sprite instances.
    pub fn pending_sprites(&self) -> usize {
        self.commands.sprite.len()
    }

    /// Pending mesh vertices.
    pub fn pending_mesh_vertices(&self) -> usize {
        self.commands.mesh.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::TextureOptions;
    use pulse_test_utils::MockRenderContext;

    fn setup() -> (Arc<MockRenderContext>, Renderer, Texture) {
        let ctx = Arc::new(MockRenderContext::new());
        let renderer = Renderer::new(ctx.clone(), RenderConfig::default()).unwrap();
        let target = Texture::new(
            &*ctx,
            &TextureOptions {
                width: 64,
                height: 64,
                ..Default::default()
            },
        )
        .unwrap();
        (ctx, renderer, target)
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let ctx = Arc::new(MockRenderContext::new());
        let config = RenderConfig::default().with_sampler_cache_capacity(0);
        assert!(Renderer::new(ctx, config).is_err());
    }

    #[test]
    fn test_fill_path_builds_fan() {
        let (ctx, mut renderer, target) = setup();
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];

        renderer
            .fill_path(target.region(), &square, &FillPathOptions::default())
            .unwrap();
        assert_eq!(renderer.pending_mesh_vertices(), 6);

        renderer.flush_all().unwrap();
        assert_eq!(ctx.passes()[0].vertex_count(), 6);
    }

    #[test]
    fn test_fill_path_needs_three_points() {
        let (ctx, mut renderer, target) = setup();
        renderer
            .fill_path(target.region(), &[Vec2::ZERO, Vec2::ONE], &Default::default())
            .unwrap();
        renderer.flush_all().unwrap();
        assert_eq!(ctx.count_passes(), 0);
    }

    #[test]
    fn test_flush_all_reports_and_resets_stats() {
        let (_ctx, mut renderer, target) = setup();
        let source = Texture::new(&**renderer.context(), &TextureOptions::default()).unwrap();

        for _ in 0..3 {
            renderer
                .draw_sprite(target.region(), source.region(), &Default::default())
                .unwrap();
        }
        renderer
            .stroke_path(target.region(), &[Vec2::ZERO, Vec2::ONE], &Default::default())
            .unwrap();

        let stats = renderer.flush_all().unwrap();
        assert_eq!(
            stats,
            FrameStats {
                passes: 2,
                records: 5,
                pipelines_created: 2,
            }
        );

        assert_eq!(renderer.flush_all().unwrap(), FrameStats::default());
    }

    #[test]
    fn test_release_texture_flushes_first() {
        let (ctx, mut renderer, target) = setup();
        let source = Texture::new(&*ctx, &TextureOptions::default()).unwrap();
        let source_id = source.id();

        renderer
            .draw_sprite(target.region(), source.region(), &Default::default())
            .unwrap();
        renderer.release_texture(source).unwrap();

        assert_eq!(ctx.count_passes(), 1);
        assert_eq!(ctx.destroyed_textures(), vec![source_id]);
        assert_eq!(renderer.current_command(), None);
    }
}
