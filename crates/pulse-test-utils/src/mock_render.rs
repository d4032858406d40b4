//! Mock implementation of RenderContext for testing.
//!
//! This module provides a mock GPU context that records operations
//! without actually interacting with the GPU.

use crate::{gpu_types::*, render_context::*};
use parking_lot::Mutex;
use wgpu::*;

/// A submitted render pass, reduced to resource ids.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    pub label: String,
    pub target: ResourceId,
    pub resolve_target: Option<ResourceId>,
    pub load: LoadAction,
    pub stencil: Option<ResourceId>,
    pub stencil_clear_value: Option<u32>,
    pub pipeline: Option<ResourceId>,
    pub bind_groups: Vec<ResourceId>,
    pub vertex_buffers: Vec<ResourceId>,
    pub index_buffer: Option<ResourceId>,
    pub scissor: Option<ScissorRect>,
    pub stencil_reference: Option<u32>,
    pub draw: Option<DrawCall>,
}

impl RecordedPass {
    /// Instance count of the pass' draw, or 0 if it has none.
    pub fn instance_count(&self) -> u32 {
        match self.draw {
            Some(DrawCall::Indexed { instance_count, .. })
            | Some(DrawCall::Direct { instance_count, .. }) => instance_count,
            None => 0,
        }
    }

    /// Vertex count of a non-indexed draw, or 0.
    pub fn vertex_count(&self) -> u32 {
        match self.draw {
            Some(DrawCall::Direct { vertex_count, .. }) => vertex_count,
            _ => 0,
        }
    }
}

/// A created render pipeline and the fixed-function state it was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPipeline {
    pub id: ResourceId,
    pub label: String,
    pub color_target: ColorTargetState,
    pub depth_stencil: Option<DepthStencilState>,
    pub sample_count: u32,
}

/// Records a GPU operation call for verification in tests.
#[derive(Debug, Clone)]
pub enum RenderCall {
    CreateBuffer {
        id: ResourceId,
        label: Option<String>,
        size: u64,
        usage: BufferUsages,
    },
    WriteBuffer {
        buffer_id: ResourceId,
        offset: u64,
        data: Vec<u8>,
    },
    CreateTexture {
        id: ResourceId,
        width: u32,
        height: u32,
        format: TextureFormat,
        sample_count: u32,
    },
    CreateTextureView {
        texture_id: ResourceId,
        view_id: ResourceId,
    },
    WriteTexture {
        texture_id: ResourceId,
        size: usize,
    },
    DestroyTexture {
        id: ResourceId,
    },
    CreateSampler {
        id: ResourceId,
        label: Option<String>,
    },
    ReleaseSampler {
        id: ResourceId,
    },
    CreateRenderPipeline(RecordedPipeline),
    GetBindGroupLayout {
        pipeline_id: ResourceId,
        index: u32,
        id: ResourceId,
    },
    ReleaseBindGroupLayout {
        id: ResourceId,
    },
    ReleaseRenderPipeline {
        id: ResourceId,
    },
    CreateBindGroup {
        id: ResourceId,
        label: String,
        layout_id: ResourceId,
        resources: Vec<ResourceId>,
    },
    SubmitRenderPass(RecordedPass),
}

/// Mock implementation of RenderContext for testing.
///
/// # Borrow Checking Pattern: Interior Mutability
///
/// Methods take `&self` but need to record calls, so the call log lives in a
/// `parking_lot::Mutex` (`Send + Sync`, as the trait requires).
///
/// # Example
///
/// ```rust
/// use pulse_test_utils::{MockRenderContext, RenderContext};
/// use wgpu::*;
///
/// let mock = MockRenderContext::new();
///
/// let buffer = mock
///     .create_buffer(&BufferDescriptor {
///         label: None,
///         size: 1024,
///         usage: BufferUsages::VERTEX,
///         mapped_at_creation: false,
///     })
///     .unwrap();
///
/// assert!(buffer.is_mock());
/// assert_eq!(mock.count_buffer_creates(), 1);
/// ```
pub struct MockRenderContext {
    /// Recorded calls for verification
    calls: Mutex<Vec<RenderCall>>,

    /// Pipelines whose shader source contains this marker fail to compile
    failing_shader_marker: Mutex<Option<String>>,

    /// Buffers, textures and samplers with this label fail to allocate
    failing_allocation_label: Mutex<Option<String>>,
}

impl MockRenderContext {
    /// Create a new mock render context.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing_shader_marker: Mutex::new(None),
            failing_allocation_label: Mutex::new(None),
        }
    }

    /// Make every pipeline whose shader source contains `marker` fail with a
    /// validation error.
    pub fn fail_shaders_containing(&self, marker: impl Into<String>) {
        *self.failing_shader_marker.lock() = Some(marker.into());
    }

    /// Make every buffer, texture or sampler allocation labeled `label` fail
    /// as if the device ran out of memory.
    pub fn fail_allocations_labeled(&self, label: impl Into<String>) {
        *self.failing_allocation_label.lock() = Some(label.into());
    }

    fn check_allocation(&self, kind: &str, label: Option<&str>) -> Result<(), GpuError> {
        match (self.failing_allocation_label.lock().as_deref(), label) {
            (Some(failing), Some(label)) if failing == label => Err(GpuError::OutOfMemory(
                format!("{kind} '{label}' could not be allocated"),
            )),
            _ => Ok(()),
        }
    }

    fn record(&self, call: RenderCall) {
        self.calls.lock().push(call);
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    /// All submitted passes in submission order.
    pub fn passes(&self) -> Vec<RecordedPass> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RenderCall::SubmitRenderPass(pass) => Some(pass.clone()),
                _ => None,
            })
            .collect()
    }

    /// Payloads written to `buffer_id`, in write order.
    pub fn writes_to(&self, buffer_id: ResourceId) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RenderCall::WriteBuffer { buffer_id: id, data, .. } if *id == buffer_id => {
                    Some(data.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Id of the most recently created buffer with the given label.
    pub fn buffer_labeled(&self, label: &str) -> Option<ResourceId> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            RenderCall::CreateBuffer { id, label: Some(l), .. } if l == label => Some(*id),
            _ => None,
        })
    }

    /// Every successfully created pipeline, in creation order.
    pub fn created_pipelines(&self) -> Vec<RecordedPipeline> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RenderCall::CreateRenderPipeline(pipeline) => Some(pipeline.clone()),
                _ => None,
            })
            .collect()
    }

    /// The creation record of pipeline `id`.
    pub fn pipeline(&self, id: ResourceId) -> Option<RecordedPipeline> {
        self.created_pipelines().into_iter().find(|p| p.id == id)
    }

    /// Resources bound into the bind group `id`.
    pub fn bind_group_resources(&self, id: ResourceId) -> Vec<ResourceId> {
        self.calls
            .lock()
            .iter()
            .find_map(|call| match call {
                RenderCall::CreateBindGroup { id: bg, resources, .. } if *bg == id => {
                    Some(resources.clone())
                }
                _ => None,
            })
            .unwrap_or_default()
    }

    fn count(&self, predicate: impl Fn(&RenderCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn ids(&self, select: impl Fn(&RenderCall) -> Option<ResourceId>) -> Vec<ResourceId> {
        self.calls.lock().iter().filter_map(select).collect()
    }

    /// Count calls of a specific type.
    pub fn count_buffer_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateBuffer { .. }))
    }

    /// Count buffer write operations.
    pub fn count_buffer_writes(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::WriteBuffer { .. }))
    }

    /// Count texture creates.
    pub fn count_texture_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateTexture { .. }))
    }

    /// Count sampler creates.
    pub fn count_sampler_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateSampler { .. }))
    }

    /// Count render pipeline creates.
    pub fn count_render_pipeline_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateRenderPipeline(_)))
    }

    /// Count bind group layout lookups that reached the "device".
    pub fn count_bind_group_layout_fetches(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::GetBindGroupLayout { .. }))
    }

    /// Count submitted render passes.
    pub fn count_passes(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::SubmitRenderPass(_)))
    }

    pub fn released_pipelines(&self) -> Vec<ResourceId> {
        self.ids(|call| match call {
            RenderCall::ReleaseRenderPipeline { id } => Some(*id),
            _ => None,
        })
    }

    pub fn released_bind_group_layouts(&self) -> Vec<ResourceId> {
        self.ids(|call| match call {
            RenderCall::ReleaseBindGroupLayout { id } => Some(*id),
            _ => None,
        })
    }

    pub fn released_samplers(&self) -> Vec<ResourceId> {
        self.ids(|call| match call {
            RenderCall::ReleaseSampler { id } => Some(*id),
            _ => None,
        })
    }

    pub fn destroyed_textures(&self) -> Vec<ResourceId> {
        self.ids(|call| match call {
            RenderCall::DestroyTexture { id } => Some(*id),
            _ => None,
        })
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for MockRenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext for MockRenderContext {
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<GpuBuffer, GpuError> {
        self.check_allocation("buffer", desc.label)?;
        let buffer = GpuBuffer::mock();
        self.record(RenderCall::CreateBuffer {
            id: buffer.id(),
            label: desc.label.map(str::to_string),
            size: desc.size,
            usage: desc.usage,
        });
        Ok(buffer)
    }

    fn create_buffer_init(
        &self,
        label: Option<&str>,
        contents: &[u8],
        usage: BufferUsages,
    ) -> Result<GpuBuffer, GpuError> {
        self.check_allocation("buffer", label)?;
        let buffer = GpuBuffer::mock();
        self.record(RenderCall::CreateBuffer {
            id: buffer.id(),
            label: label.map(str::to_string),
            size: contents.len() as u64,
            usage,
        });
        Ok(buffer)
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        self.record(RenderCall::WriteBuffer {
            buffer_id: buffer.id(),
            offset,
            data: data.to_vec(),
        });
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<GpuTexture, GpuError> {
        self.check_allocation("texture", desc.label)?;
        let texture = GpuTexture::mock();
        self.record(RenderCall::CreateTexture {
            id: texture.id(),
            width: desc.size.width,
            height: desc.size.height,
            format: desc.format,
            sample_count: desc.sample_count,
        });
        Ok(texture)
    }

    fn create_texture_view(&self, texture: &GpuTexture) -> GpuTextureView {
        let view = GpuTextureView::mock();
        self.record(RenderCall::CreateTextureView {
            texture_id: texture.id(),
            view_id: view.id(),
        });
        view
    }

    fn write_texture(&self, texture: &GpuTexture, data: &[u8], _bytes_per_row: u32, _size: Extent3d) {
        self.record(RenderCall::WriteTexture {
            texture_id: texture.id(),
            size: data.len(),
        });
    }

    fn destroy_texture(&self, texture: GpuTexture) {
        self.record(RenderCall::DestroyTexture { id: texture.id() });
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<GpuSampler, GpuError> {
        self.check_allocation("sampler", desc.label)?;
        let sampler = GpuSampler::mock();
        self.record(RenderCall::CreateSampler {
            id: sampler.id(),
            label: desc.label.map(str::to_string),
        });
        Ok(sampler)
    }

    fn release_sampler(&self, sampler: GpuSampler) {
        self.record(RenderCall::ReleaseSampler { id: sampler.id() });
    }

    fn create_render_pipeline(
        &self,
        spec: &RenderPipelineSpec,
    ) -> Result<GpuRenderPipeline, GpuError> {
        if let Some(marker) = self.failing_shader_marker.lock().as_deref() {
            if spec.shader_source.contains(marker) {
                return Err(GpuError::Validation(format!(
                    "shader of pipeline '{}' failed to compile",
                    spec.label
                )));
            }
        }

        let pipeline = GpuRenderPipeline::mock();
        self.record(RenderCall::CreateRenderPipeline(RecordedPipeline {
            id: pipeline.id(),
            label: spec.label.clone(),
            color_target: spec.color_target.clone(),
            depth_stencil: spec.depth_stencil.clone(),
            sample_count: spec.sample_count,
        }));
        Ok(pipeline)
    }

    fn get_bind_group_layout(&self, pipeline: &GpuRenderPipeline, index: u32) -> GpuBindGroupLayout {
        let layout = GpuBindGroupLayout::mock();
        self.record(RenderCall::GetBindGroupLayout {
            pipeline_id: pipeline.id(),
            index,
            id: layout.id(),
        });
        layout
    }

    fn release_bind_group_layout(&self, layout: GpuBindGroupLayout) {
        self.record(RenderCall::ReleaseBindGroupLayout { id: layout.id() });
    }

    fn release_render_pipeline(&self, pipeline: GpuRenderPipeline) {
        self.record(RenderCall::ReleaseRenderPipeline { id: pipeline.id() });
    }

    fn create_bind_group(&self, desc: &BindGroupSpec) -> GpuBindGroup {
        let bind_group = GpuBindGroup::mock();
        self.record(RenderCall::CreateBindGroup {
            id: bind_group.id(),
            label: desc.label.to_string(),
            layout_id: desc.layout.id(),
            resources: desc.entries.iter().map(|entry| entry.resource.id()).collect(),
        });
        bind_group
    }

    fn submit_render_pass(&self, pass: &RenderPassSpec) {
        self.record(RenderCall::SubmitRenderPass(RecordedPass {
            label: pass.label.to_string(),
            target: pass.color.view.id(),
            resolve_target: pass.color.resolve_target.map(GpuTextureView::id),
            load: pass.color.load,
            stencil: pass.stencil.map(|s| s.view.id()),
            stencil_clear_value: pass.stencil.map(|s| s.clear_value),
            pipeline: pass.pipeline.map(GpuRenderPipeline::id),
            bind_groups: pass.bind_groups.iter().map(|bg| bg.id()).collect(),
            vertex_buffers: pass.vertex_buffers.iter().map(|b| b.id()).collect(),
            index_buffer: pass.index_buffer.map(GpuBuffer::id),
            scissor: pass.scissor,
            stencil_reference: pass.stencil_reference,
            draw: pass.draw,
        }));
    }
}
