//! Colored triangle lists.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Affine2, Mat3, Vec2};
use pulse_core::profiling::profile_function;
use pulse_test_utils::{
    BindGroupEntrySpec, BindGroupSpec, BindingResource, ColorAttachmentSpec, DrawCall, GpuBuffer,
    GpuError, GpuRenderPipeline, LoadAction, RenderContext, RenderPassSpec, RenderPipelineSpec,
    VertexBufferSpec,
};

use super::{BatchStats, create_buffer, non_zero};
use crate::{
    blend::BlendMode,
    cache::{PipelineCache, PipelineConfig},
    color::Color,
    config::RenderConfig,
    error::{RenderError, RenderResult},
    rect::URect,
    shader::{MESH2D_SHADER, ShaderSource},
    texture::{RenderTarget, TextureRegion},
    transform::{GpuMat3, pixel_to_clip, to_gpu_mat3},
};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
    /// Index into the model transforms of the pass
    pub transform_index: u32,
}

static_assertions::assert_eq_size!(MeshVertex, [u8; 28]);

impl MeshVertex {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x4,
        2 => Uint32,
    ];

    pub fn layout() -> VertexBufferSpec {
        VertexBufferSpec {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: Self::ATTRIBUTES.to_vec(),
        }
    }
}

/// A vertex as passed to [`MeshBatch::draw_triangles`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex2d {
    /// Pixels relative to the destination region
    pub position: Vec2,
    pub color: Color,
}

impl Vertex2d {
    pub fn new(position: Vec2, color: Color) -> Self {
        Self { position, color }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrawTrianglesOptions {
    pub transform: Affine2,
    pub blend: BlendMode,
    /// Multiplied with every vertex color
    pub color: Color,
    pub shader: Option<ShaderSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshBatchConfig {
    pub target: RenderTarget,
    pub region: URect,
    pub blend: BlendMode,
    pub shader: ShaderSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeshPipeline {
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub blend: BlendMode,
    pub shader: ShaderSource,
}

impl PipelineConfig for MeshPipeline {
    fn label(&self) -> String {
        format!(
            "Mesh2d({:?}, {}x, {:?})",
            self.format, self.sample_count, self.blend
        )
    }

    fn specialize(&self, ctx: &dyn RenderContext) -> Result<GpuRenderPipeline, GpuError> {
        ctx.create_render_pipeline(&RenderPipelineSpec {
            label: self.label(),
            shader_source: self.shader.as_str().to_string(),
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            vertex_buffers: vec![MeshVertex::layout()],
            color_target: self.blend.to_color_target_state(self.format),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            sample_count: self.sample_count,
        })
    }
}

/// Accumulates triangles sharing one [`MeshBatchConfig`].
///
/// Vertices refer to a per-pass array of model transforms, so draws with
/// different transforms still share a pass.
pub struct MeshBatch {
    ctx: Arc<dyn RenderContext>,
    pipelines: PipelineCache<MeshPipeline>,
    default_shader: ShaderSource,

    vertex_buffer: GpuBuffer,
    transform_buffer: GpuBuffer,
    view_buffer: GpuBuffer,

    vertices: Vec<MeshVertex>,
    transforms: Vec<GpuMat3>,
    max_vertices: usize,
    max_transforms: usize,
    config: Option<MeshBatchConfig>,
    stats: BatchStats,
}

impl MeshBatch {
    pub fn new(ctx: Arc<dyn RenderContext>, config: &RenderConfig) -> RenderResult<Self> {
        let max_vertices = config.max_mesh_vertices;
        if max_vertices < 3 {
            return Err(RenderError::InvalidConfig(format!(
                "max_mesh_vertices must hold a triangle, got {}",
                max_vertices
            )));
        }
        let max_transforms = non_zero(config.max_mesh_transforms, "max_mesh_transforms")?.get();

        let vertex_buffer = create_buffer(
            &*ctx,
            &wgpu::BufferDescriptor {
                label: Some("Mesh2d.Vertices"),
                size: max_vertices as u64 * MeshVertex::SIZE,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            },
        )?;
        let transform_buffer = create_buffer(
            &*ctx,
            &wgpu::BufferDescriptor {
                label: Some("Mesh2d.ModelTransformations"),
                size: (max_transforms * std::mem::size_of::<GpuMat3>()) as u64,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            },
        )?;
        let view_buffer = create_buffer(
            &*ctx,
            &wgpu::BufferDescriptor {
                label: Some("Mesh2d.ViewTransform"),
                size: std::mem::size_of::<GpuMat3>() as u64,
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
            ctx,
            default_shader: ShaderSource::from(MESH2D_SHADER),
            vertex_buffer,
            transform_buffer,
            view_buffer,
            vertices: Vec::with_capacity(max_vertices),
            transforms: Vec::new(),
            max_vertices,
            max_transforms,
            config: None,
            stats: BatchStats::default(),
        })
    }

    /// Queue `vertices` as a triangle list.
    ///
    /// A trailing partial triangle is ignored. Flushes whenever the
    /// configuration changes or the vertex or transform buffer fills up.
    pub fn draw_triangles(
        &mut self,
        dest: TextureRegion,
        vertices: &[Vertex2d],
        options: &DrawTrianglesOptions,
    ) -> RenderResult<()> {
        profile_function!();

        let triangles = vertices.chunks_exact(3);
        if !triangles.remainder().is_empty() {
            tracing::warn!(
                "Ignoring {} vertices that do not form a triangle",
                triangles.remainder().len()
            );
        }
        if triangles.len() == 0 {
            return Ok(());
        }

        let config = MeshBatchConfig {
            target: dest.render_target(),
            region: dest.rect(),
            blend: options.blend,
            shader: options.shader.clone().unwrap_or_else(|| self.default_shader.clone()),
        };
        if self.config.as_ref().is_some_and(|pending| *pending != config) {
            self.flush()?;
        }

        let transform = to_gpu_mat3(&Mat3::from(options.transform));
        for triangle in triangles {
            if self.vertices.len() + 3 > self.max_vertices {
                self.flush()?;
            }
            let transform_index = self.push_transform(transform)?;

            self.vertices.extend(triangle.iter().map(|vertex| MeshVertex {
                position: vertex.position.to_array(),
                color: (vertex.color * options.color).to_array(),
                transform_index,
            }));
            if self.config.is_none() {
                self.config = Some(config.clone());
            }
        }

        Ok(())
    }

    /// Index of `transform` in the pending transforms, appending it unless it
    /// is already the last one.
    fn push_transform(&mut self, transform: GpuMat3) -> RenderResult<u32> {
        if self.transforms.last() != Some(&transform) {
            if self.transforms.len() >= self.max_transforms {
                self.flush()?;
            }
            self.transforms.push(transform);
        }

        Ok(self.transforms.len() as u32 - 1)
    }

    /// Encode all pending triangles as one pass. Does nothing when empty.
    pub fn flush(&mut self) -> RenderResult<()> {
        let Some(config) = self.config.take() else {
            self.transforms.clear();
            return Ok(());
        };
        profile_function!();

        let vertex_count = self.vertices.len() as u32;
        let view = pixel_to_clip(
            config.target.size.as_vec2(),
            config.region.position().as_vec2(),
        );
        self.ctx
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));
        self.ctx.write_buffer(
            &self.transform_buffer,
            0,
            bytemuck::cast_slice(&self.transforms),
        );
        self.ctx.write_buffer(
            &self.view_buffer,
            0,
            bytemuck::cast_slice(&to_gpu_mat3(&Mat3::from(view))),
        );
        let transform_count = self.transforms.len();
        self.vertices.clear();
        self.transforms.clear();

        let pipeline = self.pipelines.get(&MeshPipeline {
            format: config.target.format,
            sample_count: config.target.sample_count,
            blend: config.blend,
            shader: config.shader.clone(),
        })?;
        let layout = pipeline.bind_group_layout(0);

        let bind_group = self.ctx.create_bind_group(&BindGroupSpec {
            label: "Mesh2d.BindGroup",
            layout: &layout,
            entries: &[
                BindGroupEntrySpec {
                    binding: 0,
                    resource: BindingResource::Buffer(&self.view_buffer),
                },
                BindGroupEntrySpec {
                    binding: 1,
                    resource: BindingResource::Buffer(&self.transform_buffer),
                },
            ],
        });

        self.ctx.submit_render_pass(&RenderPassSpec {
            label: "RenderPassMesh2d",
            color: ColorAttachmentSpec {
                view: &config.target.view,
                resolve_target: config.target.resolve.as_ref(),
                load: LoadAction::Load,
            },
            stencil: None,
            pipeline: Some(pipeline.pipeline()),
            bind_groups: &[&bind_group],
            vertex_buffers: &[&self.vertex_buffer],
            index_buffer: None,
            scissor: Some(config.region.to_scissor()),
            stencil_reference: None,
            draw: Some(DrawCall::Direct {
                vertex_count,
                instance_count: 1,
            }),
        });

        tracing::debug!(
            "Flushed {} mesh vertices with {} transforms to {}",
            vertex_count,
            transform_count,
            config.target.texture
        );
        self.stats.record_pass(vertex_count as u64);

        Ok(())
    }

    /// Pending vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Pending model transforms.
    pub fn transform_count(&self) -> usize {
        self.transforms.len()
    }

    pub fn pipelines(&self) -> &PipelineCache<MeshPipeline> {
        &self.pipelines
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
    use glam::UVec2;
    use pulse_test_utils::{MockRenderContext, ScissorRect};

    fn setup(config: RenderConfig) -> (Arc<MockRenderContext>, MeshBatch, Texture) {
        let ctx = Arc::new(MockRenderContext::new());
        let batch = MeshBatch::new(ctx.clone(), &config).unwrap();
        let target = Texture::new(
            &*ctx,
            &TextureOptions {
                width: 100,
                height: 50,
                ..Default::default()
            },
        )
        .unwrap();
        (ctx, batch, target)
    }

    fn triangle() -> [Vertex2d; 3] {
        [
            Vertex2d::new(Vec2::new(0.0, 0.0), Color::WHITE),
            Vertex2d::new(Vec2::new(10.0, 0.0), Color::WHITE),
            Vertex2d::new(Vec2::new(0.0, 10.0), Color::WHITE),
        ]
    }

    fn moved(x: f32) -> DrawTrianglesOptions {
        DrawTrianglesOptions {
            transform: Affine2::from_translation(Vec2::new(x, 0.0)),
            ..Default::default()
        }
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(MeshVertex::SIZE, 28);
        assert_eq!(std::mem::offset_of!(MeshVertex, color), 8);
        assert_eq!(std::mem::offset_of!(MeshVertex, transform_index), 24);
        let offsets: Vec<u64> = MeshVertex::layout()
            .attributes
            .iter()
            .map(|attr| attr.offset)
            .collect();
        assert_eq!(offsets, vec![0, 8, 24]);
    }

    #[test]
    fn test_repeated_transform_is_shared() {
        let (ctx, mut batch, target) = setup(RenderConfig::default());

        batch.draw_triangles(target.region(), &triangle(), &moved(1.0)).unwrap();
        batch.draw_triangles(target.region(), &triangle(), &moved(1.0)).unwrap();
        assert_eq!(batch.transform_count(), 1);
        batch.draw_triangles(target.region(), &triangle(), &moved(2.0)).unwrap();
        assert_eq!(batch.transform_count(), 2);

        batch.flush().unwrap();
        let vertices_id = ctx.buffer_labeled("Mesh2d.Vertices").unwrap();
        let writes = ctx.writes_to(vertices_id);
        let vertices: Vec<MeshVertex> = read_records(&writes[0]);
        let indices: Vec<u32> = vertices.iter().map(|v| v.transform_index).collect();
        assert_eq!(indices, vec![0, 0, 0, 0, 0, 0, 1, 1, 1]);

        let passes = ctx.passes();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].vertex_count(), 9);
    }

    #[test]
    fn test_full_transform_array_flushes() {
        let (ctx, mut batch, target) =
            setup(RenderConfig::default().with_max_mesh_transforms(2));

        for x in 0..3 {
            batch
                .draw_triangles(target.region(), &triangle(), &moved(x as f32))
                .unwrap();
        }
        assert_eq!(ctx.count_passes(), 1);
        assert_eq!(ctx.passes()[0].vertex_count(), 6);
        assert_eq!(batch.transform_count(), 1);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_vertex_overflow_flushes() {
        let (ctx, mut batch, target) = setup(RenderConfig::default().with_max_mesh_vertices(6));

        let vertices: Vec<Vertex2d> = (0..3).flat_map(|_| triangle()).collect();
        batch
            .draw_triangles(target.region(), &vertices, &Default::default())
            .unwrap();

        assert_eq!(ctx.count_passes(), 1);
        assert_eq!(batch.len(), 3);
        // the new pass starts with the transform again
        assert_eq!(batch.transform_count(), 1);
    }

    #[test]
    fn test_partial_triangle_ignored() {
        let (ctx, mut batch, target) = setup(RenderConfig::default());
        let mut vertices = triangle().to_vec();
        vertices.push(Vertex2d::new(Vec2::ZERO, Color::RED));

        batch
            .draw_triangles(target.region(), &vertices, &Default::default())
            .unwrap();
        assert_eq!(batch.len(), 3);

        batch.draw_triangles(target.region(), &vertices[..2], &Default::default()).unwrap();
        assert_eq!(batch.len(), 3);

        batch.flush().unwrap();
        assert_eq!(ctx.count_passes(), 1);
    }

    #[test]
    fn test_region_scissor_and_color() {
        let (ctx, mut batch, target) = setup(RenderConfig::default());
        let region = target
            .sub_texture(UVec2::new(10, 5), UVec2::new(20, 30))
            .unwrap();

        let options = DrawTrianglesOptions {
            color: Color::rgba(1.0, 0.5, 1.0, 0.5),
            ..Default::default()
        };
        batch.draw_triangles(region, &triangle(), &options).unwrap();
        batch.flush().unwrap();

        let pass = &ctx.passes()[0];
        assert_eq!(pass.label, "RenderPassMesh2d");
        assert_eq!(
            pass.scissor,
            Some(ScissorRect {
                x: 10,
                y: 5,
                width: 20,
                height: 30
            })
        );

        let writes = ctx.writes_to(ctx.buffer_labeled("Mesh2d.Vertices").unwrap());
        let vertices: Vec<MeshVertex> = read_records(&writes[0]);
        assert_eq!(vertices[0].color, [1.0, 0.5, 1.0, 0.5]);

        // the view maps the region origin to its pixel position in clip space
        let view_writes = ctx.writes_to(ctx.buffer_labeled("Mesh2d.ViewTransform").unwrap());
        let view: Vec<f32> = read_records(&view_writes[0]);
        let (x, y) = (view[8], view[9]);
        assert!((x - (-1.0 + 2.0 * 10.0 / 100.0)).abs() < 1e-6);
        assert!((y - (1.0 - 2.0 * 5.0 / 50.0)).abs() < 1e-6);
    }

    #[test]
    fn test_different_region_splits_pass() {
        let (ctx, mut batch, target) = setup(RenderConfig::default());
        let left = target.sub_texture(UVec2::ZERO, UVec2::new(50, 50)).unwrap();
        let right = target.sub_texture(UVec2::new(50, 0), UVec2::new(50, 50)).unwrap();

        batch.draw_triangles(left, &triangle(), &Default::default()).unwrap();
        batch.draw_triangles(right, &triangle(), &Default::default()).unwrap();
        batch.flush().unwrap();

        assert_eq!(ctx.count_passes(), 2);
        assert_eq!(ctx.count_render_pipeline_creates(), 1);
    }

    #[test]
    fn test_pipeline_blend_follows_mode() {
        let (ctx, mut batch, target) = setup(RenderConfig::default());
        let modes = [
            BlendMode::Replace,
            BlendMode::Alpha,
            BlendMode::PremultipliedAlpha,
            BlendMode::Additive,
            BlendMode::Multiply,
        ];

        for blend in modes {
            let options = DrawTrianglesOptions {
                blend,
                ..Default::default()
            };
            batch.draw_triangles(target.region(), &triangle(), &options).unwrap();
            batch.flush().unwrap();

            let pass = ctx.passes().pop().unwrap();
            let pipeline = ctx.pipeline(pass.pipeline.unwrap()).unwrap();
            assert_eq!(pipeline.color_target.blend, Some(blend.to_blend_state()));
            assert_eq!(pipeline.color_target.write_mask, wgpu::ColorWrites::ALL);
            assert_eq!(pipeline.depth_stencil, None);
        }
        assert_eq!(ctx.count_render_pipeline_creates(), modes.len());
    }

    #[test]
    fn test_failed_buffer_allocation() {
        let ctx = Arc::new(MockRenderContext::new());
        ctx.fail_allocations_labeled("Mesh2d.ModelTransformations");

        let err = MeshBatch::new(ctx.clone(), &RenderConfig::default()).err().unwrap();

        assert!(matches!(
            err,
            RenderError::ResourceCreation { ref label, .. } if label == "Mesh2d.ModelTransformations"
        ));
    }

    #[test]
    fn test_rejects_tiny_vertex_buffer() {
        let ctx = Arc::new(MockRenderContext::new());
        let config = RenderConfig::default().with_max_mesh_vertices(2);
        assert!(matches!(
            MeshBatch::new(ctx, &config),
            Err(RenderError::InvalidConfig(_))
        ));
    }
}
