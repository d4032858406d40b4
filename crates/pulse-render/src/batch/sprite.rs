//! Instanced textured quads.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Affine2;
use pulse_core::profiling::profile_function;
use pulse_test_utils::{
    BindGroupEntrySpec, BindGroupSpec, BindingResource, ColorAttachmentSpec, DrawCall, GpuBuffer,
    GpuError, GpuRenderPipeline, LoadAction, RenderContext, RenderPassSpec, RenderPipelineSpec,
    ScissorRect, VertexBufferSpec,
};

use super::{BatchStats, create_buffer, non_zero};
use crate::{
    blend::BlendMode,
    cache::{PipelineCache, PipelineConfig, SamplerCache, SamplerKey},
    color::Color,
    config::RenderConfig,
    error::{RenderError, RenderResult},
    rect::URect,
    shader::{SPRITE_SHADER, ShaderSource},
    texture::{RenderTarget, SampledTexture, TextureRegion},
    transform::affine_rows,
};

/// One sprite as stored in the instance buffer.
///
/// Rectangles are `[x, y, width, height]` in root texels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    pub color: [f32; 4],
    pub row0: [f32; 3],
    pub row1: [f32; 3],
    pub source: [u16; 4],
    pub target: [u16; 4],
}

static_assertions::assert_eq_size!(SpriteInstance, [u8; 56]);

impl SpriteInstance {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        // color
        0 => Float32x4,
        // transform rows
        1 => Float32x3,
        2 => Float32x3,
        // source region
        3 => Uint16x4,
        // target region
        4 => Uint16x4,
    ];

    pub fn new(transform: &Affine2, color: Color, source: URect, target: URect) -> Self {
        let (row0, row1) = affine_rows(transform);
        Self {
            color: color.to_array(),
            row0,
            row1,
            source: pack_rect(source),
            target: pack_rect(target),
        }
    }

    pub fn layout() -> VertexBufferSpec {
        VertexBufferSpec {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: Self::ATTRIBUTES.to_vec(),
        }
    }
}

// Texture dimensions are capped at u16::MAX, so every rect inside one fits.
fn pack_rect(rect: URect) -> [u16; 4] {
    [rect.x as u16, rect.y as u16, rect.width as u16, rect.height as u16]
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteUniform {
    pub target_size: [f32; 2],
    pub source_size: [f32; 2],
}

static_assertions::assert_eq_size!(SpriteUniform, [u8; 16]);

#[derive(Debug, Clone)]
pub struct DrawSpriteOptions {
    /// Applied to the source-sized quad before it is placed at the
    /// destination's origin
    pub transform: Affine2,
    /// Multiplied with the sampled color
    pub color: Color,
    pub filter: wgpu::FilterMode,
    pub blend: BlendMode,
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    pub shader: Option<ShaderSource>,
}

impl Default for DrawSpriteOptions {
    fn default() -> Self {
        Self {
            transform: Affine2::IDENTITY,
            color: Color::WHITE,
            filter: wgpu::FilterMode::Linear,
            blend: BlendMode::Alpha,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            shader: None,
        }
    }
}

/// Draw sprite instances that already live in a GPU buffer.
///
/// The buffer must hold `instance_count` [`SpriteInstance`] records and have
/// `VERTEX` usage.
#[derive(Debug, Clone)]
pub struct DrawSpritesFromGpuOptions {
    pub buffer: GpuBuffer,
    pub instance_count: u32,
    pub filter: wgpu::FilterMode,
    pub blend: BlendMode,
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    pub shader: Option<ShaderSource>,
}

impl DrawSpritesFromGpuOptions {
    pub fn new(buffer: GpuBuffer, instance_count: u32) -> Self {
        Self {
            buffer,
            instance_count,
            filter: wgpu::FilterMode::Linear,
            blend: BlendMode::Alpha,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            shader: None,
        }
    }
}

/// Everything two sprite draws must share to end up in the same pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteBatchConfig {
    pub target: RenderTarget,
    pub source: SampledTexture,
    pub sampler: SamplerKey,
    pub blend: BlendMode,
    pub shader: ShaderSource,
}

impl SpriteBatchConfig {
    fn pipeline(&self) -> SpritePipeline {
        SpritePipeline {
            format: self.target.format,
            sample_count: self.target.sample_count,
            blend: self.blend,
            shader: self.shader.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpritePipeline {
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub blend: BlendMode,
    pub shader: ShaderSource,
}

impl PipelineConfig for SpritePipeline {
    fn label(&self) -> String {
        format!(
            "Sprite({:?}, {}x, {:?})",
            self.format, self.sample_count, self.blend
        )
    }

    fn specialize(&self, ctx: &dyn RenderContext) -> Result<GpuRenderPipeline, GpuError> {
        ctx.create_render_pipeline(&RenderPipelineSpec {
            label: self.label(),
            shader_source: self.shader.as_str().to_string(),
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            vertex_buffers: vec![SpriteInstance::layout()],
            color_target: self.blend.to_color_target_state(self.format),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            sample_count: self.sample_count,
        })
    }
}

const QUAD_INDICES: [u16; 6] = [2, 0, 1, 1, 3, 2];

/// Accumulates textured quads sharing one [`SpriteBatchConfig`].
pub struct SpriteBatch {
    ctx: Arc<dyn RenderContext>,
    pipelines: PipelineCache<SpritePipeline>,
    samplers: SamplerCache,
    default_shader: ShaderSource,

    instance_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    uniform_buffer: GpuBuffer,

    instances: Vec<SpriteInstance>,
    capacity: usize,
    config: Option<SpriteBatchConfig>,
    /// Union of all pending target rectangles
    scissor: Option<URect>,
    stats: BatchStats,
}

impl SpriteBatch {
    pub fn new(ctx: Arc<dyn RenderContext>, config: &RenderConfig) -> RenderResult<Self> {
        let capacity = non_zero(config.max_sprite_instances, "max_sprite_instances")?.get();

        let instance_buffer = create_buffer(
            &*ctx,
            &wgpu::BufferDescriptor {
                label: Some("Sprite.Instances"),
                size: capacity as u64 * SpriteInstance::SIZE,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            },
        )?;
        let index_buffer = ctx
            .create_buffer_init(
                Some("Sprite.Indices"),
                bytemuck::cast_slice(&QUAD_INDICES),
                wgpu::BufferUsages::INDEX,
            )
            .map_err(|source| RenderError::resource_creation("Sprite.Indices", source))?;
        let uniform_buffer = create_buffer(
            &*ctx,
            &wgpu::BufferDescriptor {
                label: Some("Sprite.Uniforms"),
                size: std::mem::size_of::<SpriteUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            },
        )?;

        Ok(Self {
            pipelines: PipelineCache::new(
                ctx.clone(),
                non_zero(config.pipeline_cache_capacity, "pipeline_cache_capacity")?,
                non_zero(
                    config.bind_group_layout_cache_capacity,
                    "bind_group_layout_cache_capacity",
                )?,
            ),
            samplers: SamplerCache::new(
                ctx.clone(),
                non_zero(config.sampler_cache_capacity, "sampler_cache_capacity")?,
            ),
            ctx,
            default_shader: ShaderSource::from(SPRITE_SHADER),
            instance_buffer,
            index_buffer,
            uniform_buffer,
            instances: Vec::with_capacity(capacity),
            capacity,
            config: None,
            scissor: None,
            stats: BatchStats::default(),
        })
    }

    /// Queue `source` drawn into `dest`.
    ///
    /// Flushes first if the pending sprites use a different configuration or
    /// the instance buffer is full.
    pub fn draw(
        &mut self,
        dest: TextureRegion,
        source: TextureRegion,
        options: &DrawSpriteOptions,
    ) -> RenderResult<()> {
        profile_function!();

        let config = SpriteBatchConfig {
            target: dest.render_target(),
            source: source.sampled(),
            sampler: SamplerKey::new(options.filter, options.address_mode_u, options.address_mode_v),
            blend: options.blend,
            shader: options.shader.clone().unwrap_or_else(|| self.default_shader.clone()),
        };

        if self.config.as_ref().is_some_and(|pending| *pending != config)
            || self.instances.len() >= self.capacity
        {
            self.flush()?;
        }

        self.instances.push(SpriteInstance::new(
            &options.transform,
            options.color,
            source.rect(),
            dest.rect(),
        ));
        self.scissor = Some(match self.scissor {
            Some(scissor) => scissor.union(&dest.rect()),
            None => dest.rect(),
        });
        if self.config.is_none() {
            self.config = Some(config);
        }

        Ok(())
    }

    /// Flush pending sprites, then draw the caller's instance buffer in its
    /// own pass.
    pub fn draw_from_gpu(
        &mut self,
        dest: TextureRegion,
        source: TextureRegion,
        options: &DrawSpritesFromGpuOptions,
    ) -> RenderResult<()> {
        profile_function!();

        self.flush()?;
        if options.instance_count == 0 {
            return Ok(());
        }

        let config = SpriteBatchConfig {
            target: dest.render_target(),
            source: source.sampled(),
            sampler: SamplerKey::new(options.filter, options.address_mode_u, options.address_mode_v),
            blend: options.blend,
            shader: options.shader.clone().unwrap_or_else(|| self.default_shader.clone()),
        };

        self.submit(&config, &options.buffer, options.instance_count, None)
    }

    /// Encode all pending sprites as one pass. Does nothing when empty.
    ///
    /// The batch is empty afterwards even if the pass could not be built.
    pub fn flush(&mut self) -> RenderResult<()> {
        let Some(config) = self.config.take() else {
            return Ok(());
        };
        profile_function!();

        let count = self.instances.len() as u32;
        self.ctx.write_buffer(
            &self.instance_buffer,
            0,
            bytemuck::cast_slice(&self.instances),
        );
        let scissor = self.scissor.take().map(URect::to_scissor);
        self.instances.clear();

        let instance_buffer = self.instance_buffer.clone();
        self.submit(&config, &instance_buffer, count, scissor)
    }

    fn submit(
        &mut self,
        config: &SpriteBatchConfig,
        instances: &GpuBuffer,
        instance_count: u32,
        scissor: Option<ScissorRect>,
    ) -> RenderResult<()> {
        let uniform = SpriteUniform {
            target_size: config.target.size.as_vec2().to_array(),
            source_size: config.source.size.as_vec2().to_array(),
        };
        self.ctx
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        let sampler = self.samplers.get(&config.sampler)?;
        let pipeline = self.pipelines.get(&config.pipeline())?;
        let layout = pipeline.bind_group_layout(0);

        let bind_group = self.ctx.create_bind_group(&BindGroupSpec {
            label: "Sprite.BindGroup",
            layout: &layout,
            entries: &[
                BindGroupEntrySpec {
                    binding: 0,
                    resource: BindingResource::TextureView(&config.source.view),
                },
                BindGroupEntrySpec {
                    binding: 1,
                    resource: BindingResource::Sampler(&sampler),
                },
                BindGroupEntrySpec {
                    binding: 2,
                    resource: BindingResource::Buffer(&self.uniform_buffer),
                },
            ],
        });

        self.ctx.submit_render_pass(&RenderPassSpec {
            label: "RenderPassSprite",
            color: ColorAttachmentSpec {
                view: &config.target.view,
                resolve_target: config.target.resolve.as_ref(),
                load: LoadAction::Load,
            },
            stencil: None,
            pipeline: Some(pipeline.pipeline()),
            bind_groups: &[&bind_group],
            vertex_buffers: &[instances],
            index_buffer: Some(&self.index_buffer),
            scissor,
            stencil_reference: None,
            draw: Some(DrawCall::Indexed {
                index_count: QUAD_INDICES.len() as u32,
                instance_count,
            }),
        });

        tracing::debug!(
            "Flushed {} sprites from texture {} to {}",
            instance_count,
            config.source.texture,
            config.target.texture
        );
        self.stats.record_pass(instance_count as u64);

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configuration of the pending sprites.
    pub fn pending_config(&self) -> Option<&SpriteBatchConfig> {
        self.config.as_ref()
    }

    pub fn pipelines(&self) -> &PipelineCache<SpritePipeline> {
        &self.pipelines
    }

    pub fn samplers(&self) -> &SamplerCache {
        &self.samplers
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn stats_mut(&mut self) -> &mut BatchStats {
        &mut self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batch::read_records,
        texture::{Texture, TextureOptions},
    };
    use glam::{UVec2, Vec2};
    use pulse_test_utils::MockRenderContext;

    fn setup(capacity: usize) -> (Arc<MockRenderContext>, SpriteBatch) {
        let ctx = Arc::new(MockRenderContext::new());
        let config = RenderConfig::default().with_max_sprite_instances(capacity);
        let batch = SpriteBatch::new(ctx.clone(), &config).unwrap();
        (ctx, batch)
    }

    fn texture(ctx: &MockRenderContext, size: u32) -> Texture {
        Texture::new(
            ctx,
            &TextureOptions {
                width: size,
                height: size,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_instance_layout() {
        assert_eq!(SpriteInstance::SIZE, 56);
        assert_eq!(std::mem::offset_of!(SpriteInstance, color), 0);
        assert_eq!(std::mem::offset_of!(SpriteInstance, row0), 16);
        assert_eq!(std::mem::offset_of!(SpriteInstance, row1), 28);
        assert_eq!(std::mem::offset_of!(SpriteInstance, source), 40);
        assert_eq!(std::mem::offset_of!(SpriteInstance, target), 48);

        let layout = SpriteInstance::layout();
        let offsets: Vec<u64> = layout.attributes.iter().map(|attr| attr.offset).collect();
        assert_eq!(offsets, vec![0, 16, 28, 40, 48]);
        assert_eq!(layout.array_stride, SpriteInstance::SIZE);
    }

    #[test]
    fn test_instance_packs_transform_and_rects() {
        let transform = Affine2::from_translation(Vec2::new(3.0, 4.0));
        let instance = SpriteInstance::new(
            &transform,
            Color::RED,
            URect::new(1, 2, 3, 4),
            URect::new(10, 20, 30, 40),
        );
        assert_eq!(instance.row0, [1.0, 0.0, 3.0]);
        assert_eq!(instance.row1, [0.0, 1.0, 4.0]);
        assert_eq!(instance.source, [1, 2, 3, 4]);
        assert_eq!(instance.target, [10, 20, 30, 40]);
        assert_eq!(instance.color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_same_config_single_pass() {
        let (ctx, mut batch) = setup(16);
        let dest = texture(&ctx, 64);
        let source = texture(&ctx, 8);

        for _ in 0..5 {
            batch
                .draw(dest.region(), source.region(), &DrawSpriteOptions::default())
                .unwrap();
        }
        assert_eq!(ctx.count_passes(), 0);

        batch.flush().unwrap();
        let passes = ctx.passes();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].label, "RenderPassSprite");
        assert_eq!(passes[0].instance_count(), 5);
        assert_eq!(passes[0].target, dest.region().render_target().view.id());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_config_change_flushes() {
        let (ctx, mut batch) = setup(16);
        let dest = texture(&ctx, 64);
        let a = texture(&ctx, 8);
        let b = texture(&ctx, 8);

        batch.draw(dest.region(), a.region(), &Default::default()).unwrap();
        batch.draw(dest.region(), b.region(), &Default::default()).unwrap();
        assert_eq!(ctx.count_passes(), 1);

        let additive = DrawSpriteOptions {
            blend: BlendMode::Additive,
            ..Default::default()
        };
        batch.draw(dest.region(), b.region(), &additive).unwrap();
        assert_eq!(ctx.count_passes(), 2);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_overflow_starts_next_batch() {
        let (ctx, mut batch) = setup(2);
        let dest = texture(&ctx, 64);
        let source = texture(&ctx, 8);

        for i in 0..3 {
            let options = DrawSpriteOptions {
                color: Color::rgb(i as f32, 0.0, 0.0),
                ..Default::default()
            };
            batch.draw(dest.region(), source.region(), &options).unwrap();
        }
        assert_eq!(ctx.count_passes(), 1);
        assert_eq!(ctx.passes()[0].instance_count(), 2);
        assert_eq!(batch.len(), 1);

        batch.flush().unwrap();
        let instances = ctx.buffer_labeled("Sprite.Instances").unwrap();
        let writes = ctx.writes_to(instances);
        let last: Vec<SpriteInstance> = read_records(&writes[1]);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].color[0], 2.0);
    }

    #[test]
    fn test_empty_flush_submits_nothing() {
        let (ctx, mut batch) = setup(4);
        batch.flush().unwrap();
        assert_eq!(ctx.count_passes(), 0);
    }

    #[test]
    fn test_scissor_is_union_of_targets() {
        let (ctx, mut batch) = setup(4);
        let dest = texture(&ctx, 64);
        let source = texture(&ctx, 8);

        let a = dest.sub_texture(UVec2::new(4, 4), UVec2::new(8, 8)).unwrap();
        let b = dest.sub_texture(UVec2::new(20, 10), UVec2::new(4, 20)).unwrap();
        batch.draw(a, source.region(), &Default::default()).unwrap();
        batch.draw(b, source.region(), &Default::default()).unwrap();
        batch.flush().unwrap();

        assert_eq!(
            ctx.passes()[0].scissor,
            Some(ScissorRect {
                x: 4,
                y: 4,
                width: 20,
                height: 26
            })
        );
    }

    #[test]
    fn test_pipeline_and_sampler_reused() {
        let (ctx, mut batch) = setup(4);
        let dest = texture(&ctx, 64);
        let a = texture(&ctx, 8);
        let b = texture(&ctx, 8);

        for source in [&a, &b, &a] {
            batch.draw(dest.region(), source.region(), &Default::default()).unwrap();
        }
        batch.flush().unwrap();

        assert_eq!(ctx.count_passes(), 3);
        assert_eq!(ctx.count_render_pipeline_creates(), 1);
        assert_eq!(ctx.count_sampler_creates(), 1);
        assert_eq!(batch.pipelines().created_count(), 1);
    }

    #[test]
    fn test_failed_pipeline_resets_batch() {
        let (ctx, mut batch) = setup(4);
        ctx.fail_shaders_containing("// broken");
        let dest = texture(&ctx, 64);
        let source = texture(&ctx, 8);
        let options = DrawSpriteOptions {
            shader: Some(ShaderSource::from("// broken")),
            ..Default::default()
        };

        batch.draw(dest.region(), source.region(), &options).unwrap();
        let err = batch.flush().unwrap_err();
        assert!(matches!(err, crate::RenderError::PipelineSpecialization { .. }));
        assert!(batch.is_empty());
        assert!(batch.pending_config().is_none());
        assert_eq!(ctx.count_passes(), 0);
    }

    fn blend_modes() -> [BlendMode; 6] {
        [
            BlendMode::Replace,
            BlendMode::Alpha,
            BlendMode::PremultipliedAlpha,
            BlendMode::Additive,
            BlendMode::Multiply,
            BlendMode::Custom(wgpu::BlendState {
                color: wgpu::BlendComponent::OVER,
                alpha: wgpu::BlendComponent::REPLACE,
            }),
        ]
    }

    #[test]
    fn test_pipeline_blend_follows_mode() {
        let (ctx, mut batch) = setup(4);
        let dest = texture(&ctx, 64);
        let source = texture(&ctx, 8);

        for blend in blend_modes() {
            let options = DrawSpriteOptions {
                blend,
                ..Default::default()
            };
            batch.draw(dest.region(), source.region(), &options).unwrap();
            batch.flush().unwrap();

            let pass = ctx.passes().pop().unwrap();
            let pipeline = ctx.pipeline(pass.pipeline.unwrap()).unwrap();
            assert_eq!(pipeline.color_target.blend, Some(blend.to_blend_state()));
            assert_eq!(pipeline.color_target.format, dest.format());
            assert_eq!(pipeline.depth_stencil, None);
            assert_eq!(pipeline.sample_count, 1);
        }
        assert_eq!(ctx.count_render_pipeline_creates(), blend_modes().len());
    }

    #[test]
    fn test_msaa_target_specializes_multisampled_pipeline() {
        let (ctx, mut batch) = setup(4);
        let dest = Texture::new(
            &*ctx,
            &TextureOptions {
                width: 64,
                height: 64,
                msaa: true,
                ..Default::default()
            },
        )
        .unwrap();
        let source = texture(&ctx, 8);

        batch.draw(dest.region(), source.region(), &Default::default()).unwrap();
        batch.flush().unwrap();

        let pass = &ctx.passes()[0];
        let pipeline = ctx.pipeline(pass.pipeline.unwrap()).unwrap();
        assert_eq!(pipeline.sample_count, 4);
        let (_, resolve) = dest.region().render_views();
        assert!(resolve.is_some());
        assert_eq!(pass.resolve_target, resolve.map(|view| view.id()));
    }

    #[test]
    fn test_failed_sampler_aborts_flush() {
        let (ctx, mut batch) = setup(4);
        let dest = texture(&ctx, 64);
        let source = texture(&ctx, 8);
        ctx.fail_allocations_labeled("Cached Sampler");

        batch.draw(dest.region(), source.region(), &Default::default()).unwrap();
        let err = batch.flush().unwrap_err();

        assert!(matches!(err, crate::RenderError::ResourceCreation { .. }));
        assert_eq!(ctx.count_passes(), 0);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_draw_from_gpu_flushes_pending_first() {
        let (ctx, mut batch) = setup(4);
        let dest = texture(&ctx, 64);
        let source = texture(&ctx, 8);
        batch.draw(dest.region(), source.region(), &Default::default()).unwrap();

        let buffer = GpuBuffer::mock();
        batch
            .draw_from_gpu(
                dest.region(),
                source.region(),
                &DrawSpritesFromGpuOptions::new(buffer.clone(), 100),
            )
            .unwrap();

        let passes = ctx.passes();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].instance_count(), 1);
        assert_eq!(passes[1].instance_count(), 100);
        assert_eq!(passes[1].vertex_buffers, vec![buffer.id()]);
        assert_eq!(passes[1].scissor, None);
    }
}
