//! Filling a region with a solid color.

use std::sync::Arc;

use glam::Affine2;
use pulse_core::profiling::profile_function;
use pulse_test_utils::{ColorAttachmentSpec, LoadAction, RenderContext, RenderPassSpec};

use super::{BatchStats, DrawSpriteOptions, SpriteBatch};
use crate::{
    blend::BlendMode,
    color::Color,
    error::RenderResult,
    texture::{Texture, TextureRegion},
};

/// Clears whole textures with a load-op pass and sub-regions by drawing a
/// scaled white texel through the sprite batch.
pub struct ClearCommand {
    ctx: Arc<dyn RenderContext>,
    white: Option<Texture>,
    stats: BatchStats,
}

impl ClearCommand {
    pub fn new(ctx: Arc<dyn RenderContext>) -> RenderResult<Self> {
        let white = Texture::from_rgba8(&*ctx, Some("Clear.White"), 1, 1, &[255; 4])?;
        Ok(Self {
            ctx,
            white: Some(white),
            stats: BatchStats::default(),
        })
    }

    pub fn clear(
        &mut self,
        sprites: &mut SpriteBatch,
        dest: TextureRegion,
        color: Color,
    ) -> RenderResult<()> {
        profile_function!();

        if dest.is_root() {
            // pending region clears must land before the whole target is reset
            sprites.flush()?;

            let (view, resolve_target) = dest.render_views();
            self.ctx.submit_render_pass(&RenderPassSpec::clear_only(
                "RenderPassClear",
                ColorAttachmentSpec {
                    view,
                    resolve_target,
                    load: LoadAction::Clear(color.to_wgpu()),
                },
            ));
            self.stats.record_pass(0);
            tracing::debug!("Cleared texture {}", dest.root().id());
            return Ok(());
        }

        let Some(white) = self.white.as_ref() else {
            return Ok(());
        };
        let size = dest.size().as_vec2();
        sprites.draw(
            dest,
            white.region(),
            &DrawSpriteOptions {
                transform: Affine2::from_scale(size),
                color,
                filter: wgpu::FilterMode::Nearest,
                blend: BlendMode::Replace,
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                shader: None,
            },
        )
    }

    /// Region clears are queued in the sprite batch.
    pub fn flush(&mut self, sprites: &mut SpriteBatch) -> RenderResult<()> {
        sprites.flush()
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn stats_mut(&mut self) -> &mut BatchStats {
        &mut self.stats
    }
}

impl Drop for ClearCommand {
    fn drop(&mut self) {
        if let Some(white) = self.white.take() {
            white.release(&*self.ctx);
        }
    }
}
