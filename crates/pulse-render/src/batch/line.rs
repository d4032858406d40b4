//! Stroked polylines.
//!
//! Lines are drawn eagerly: every stroke is uploaded and submitted right
//! away, split into chunks that fit the point buffer. A stencil attachment
//! cleared at the start of each pass makes overlapping segments and joins
//! cover every pixel only once, so translucent strokes blend evenly.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Affine2, Mat3, Vec2};
use pulse_core::profiling::{profile_function, profile_scope};
use pulse_test_utils::{
    BindGroupEntrySpec, BindGroupSpec, BindingResource, ColorAttachmentSpec, DrawCall, GpuBuffer,
    GpuError, GpuRenderPipeline, LoadAction, RenderContext, RenderPassSpec, RenderPipelineSpec,
    StencilAttachmentSpec,
};

use super::{BatchStats, create_buffer, non_zero};
use crate::{
    blend::BlendMode,
    cache::{PipelineCache, PipelineConfig, STENCIL_FORMAT, StencilCache, StencilKey},
    color::Color,
    config::{LINE_POINT_SIZE, RenderConfig},
    error::{RenderError, RenderResult},
    shader::LINES_SHADER,
    texture::TextureRegion,
    transform::{GpuMat3, pixel_to_clip, to_gpu_mat3},
};

/// Triangles of the round join drawn at every point.
const JOIN_TRIANGLES: u32 = 32;

/// Vertices per instance: one segment quad plus one join fan.
pub const LINE_INSTANCE_VERTICES: u32 = 6 + JOIN_TRIANGLES * 3;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LineUniform {
    pub projection: GpuMat3,
    pub color: [f32; 4],
    pub thickness: f32,
    pub points_count: u32,
    /// Last point of the previous pass, joined to point 0 by an extra instance
    pub lead_in: [f32; 2],
    pub has_lead_in: u32,
    pub _padding: [u32; 3],
}

static_assertions::assert_eq_size!(LineUniform, [u8; 96]);

#[derive(Debug, Clone)]
pub struct StrokePathOptions {
    /// Applied to the points, which are pixels relative to the destination
    pub transform: Affine2,
    pub color: Color,
    /// Stroke width in pixels
    pub thickness: f32,
    pub blend: BlendMode,
}

impl Default for StrokePathOptions {
    fn default() -> Self {
        Self {
            transform: Affine2::IDENTITY,
            color: Color::WHITE,
            thickness: 1.0,
            blend: BlendMode::Alpha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinePipeline {
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub blend: BlendMode,
}

impl PipelineConfig for LinePipeline {
    fn label(&self) -> String {
        format!(
            "Lines({:?}, {}x, {:?})",
            self.format, self.sample_count, self.blend
        )
    }

    fn specialize(&self, ctx: &dyn RenderContext) -> Result<GpuRenderPipeline, GpuError> {
        let face = wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::Greater,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::Replace,
        };

        ctx.create_render_pipeline(&RenderPipelineSpec {
            label: self.label(),
            shader_source: LINES_SHADER.to_string(),
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            vertex_buffers: Vec::new(),
            color_target: self.blend.to_color_target_state(self.format),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: STENCIL_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState {
                    front: face,
                    back: face,
                    read_mask: 0xff,
                    write_mask: 0xff,
                },
                bias: wgpu::DepthBiasState::default(),
            }),
            sample_count: self.sample_count,
        })
    }
}

/// Strokes polylines through a fixed-size point buffer.
pub struct LineBatch {
    ctx: Arc<dyn RenderContext>,
    pipelines: PipelineCache<LinePipeline>,
    stencils: StencilCache,
    points_buffer: GpuBuffer,
    uniform_buffer: GpuBuffer,
    max_points: usize,
    stats: BatchStats,
}

impl LineBatch {
    pub fn new(ctx: Arc<dyn RenderContext>, config: &RenderConfig) -> RenderResult<Self> {
        let max_points = config.max_line_points();
        if max_points == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "line_points_buffer_size of {} bytes holds no point",
                config.line_points_buffer_size
            )));
        }

        let points_buffer = create_buffer(
            &*ctx,
            &wgpu::BufferDescriptor {
                label: Some("LinePoints"),
                size: max_points as u64 * LINE_POINT_SIZE,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            },
        )?;
        let uniform_buffer = create_buffer(
            &*ctx,
            &wgpu::BufferDescriptor {
                label: Some("LineConfig"),
                size: std::mem::size_of::<LineUniform>() as u64,
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
            stencils: StencilCache::new(
                ctx.clone(),
                non_zero(config.stencil_cache_capacity, "stencil_cache_capacity")?,
            ),
            ctx,
            points_buffer,
            uniform_buffer,
            max_points,
            stats: BatchStats::default(),
        })
    }

    /// Stroke the polyline through `points`, submitting one pass per chunk of
    /// at most [`max_points`](Self::max_points) points.
    ///
    /// Chunks are consecutive and disjoint. Every pass after the first draws
    /// one extra instance for the seam segment, from the last point of the
    /// previous chunk (passed in the uniform, not re-uploaded) to its first.
    pub fn stroke(
        &mut self,
        dest: TextureRegion,
        points: &[Vec2],
        options: &StrokePathOptions,
    ) -> RenderResult<()> {
        profile_function!();

        if points.is_empty() {
            return Ok(());
        }

        let target = dest.render_target();
        let region = dest.rect();
        let projection = pixel_to_clip(target.size.as_vec2(), region.position().as_vec2())
            * options.transform;
        let projection = to_gpu_mat3(&Mat3::from(projection));

        let pipeline = self.pipelines.get(&LinePipeline {
            format: target.format,
            sample_count: target.sample_count,
            blend: options.blend,
        })?;
        let layout = pipeline.bind_group_layout(0);
        let stencil = self.stencils.get(&StencilKey {
            width: target.size.x,
            height: target.size.y,
            sample_count: target.sample_count,
        })?;

        let bind_group = self.ctx.create_bind_group(&BindGroupSpec {
            label: "Lines.BindGroup",
            layout: &layout,
            entries: &[
                BindGroupEntrySpec {
                    binding: 0,
                    resource: BindingResource::Buffer(&self.uniform_buffer),
                },
                BindGroupEntrySpec {
                    binding: 1,
                    resource: BindingResource::Buffer(&self.points_buffer),
                },
            ],
        });

        let mut lead_in: Option<Vec2> = None;
        for chunk in points.chunks(self.max_points) {
            profile_scope!("line_chunk");

            let uniform = LineUniform {
                projection,
                color: options.color.to_array(),
                thickness: options.thickness,
                points_count: chunk.len() as u32,
                lead_in: lead_in.unwrap_or(Vec2::ZERO).to_array(),
                has_lead_in: lead_in.is_some() as u32,
                _padding: [0; 3],
            };
            self.ctx
                .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
            self.ctx
                .write_buffer(&self.points_buffer, 0, bytemuck::cast_slice(chunk));

            self.ctx.submit_render_pass(&RenderPassSpec {
                label: "RenderPassLines",
                color: ColorAttachmentSpec {
                    view: &target.view,
                    resolve_target: target.resolve.as_ref(),
                    load: LoadAction::Load,
                },
                stencil: Some(StencilAttachmentSpec {
                    view: &stencil,
                    clear_value: 0,
                }),
                pipeline: Some(pipeline.pipeline()),
                bind_groups: &[&bind_group],
                vertex_buffers: &[],
                index_buffer: None,
                scissor: Some(region.to_scissor()),
                stencil_reference: Some(1),
                draw: Some(DrawCall::Direct {
                    vertex_count: LINE_INSTANCE_VERTICES,
                    instance_count: chunk.len() as u32 + uniform.has_lead_in,
                }),
            });

            self.stats.record_pass(chunk.len() as u64);
            lead_in = chunk.last().copied();
        }

        tracing::debug!(
            "Stroked {} points to {} in {} passes",
            points.len(),
            target.texture,
            points.len().div_ceil(self.max_points)
        );

        Ok(())
    }

    /// Strokes are submitted eagerly, so there is never anything pending.
    pub fn flush(&mut self) -> RenderResult<()> {
        Ok(())
    }

    /// Points per pass.
    pub fn max_points(&self) -> usize {
        self.max_points
    }

    pub fn pipelines(&self) -> &PipelineCache<LinePipeline> {
        &self.pipelines
    }

    pub fn stencils(&self) -> &StencilCache {
        &self.stencils
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn stats_mut(&mut self) -> &mut BatchStats {
        &mut self.stats
    }
}
