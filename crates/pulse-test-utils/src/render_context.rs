//! Trait abstracting GPU operations.
//!
//! The `RenderContext` trait covers exactly what the batching layer needs from
//! a device: resource creation and release, buffer/texture uploads and
//! submission of single render passes. It has a real implementation on top of
//! wgpu and a mock implementation for tests.

use crate::gpu_types::*;

/// Error reported by the GPU while creating a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The descriptor or shader failed validation
    Validation(String),
    /// The device ran out of memory
    OutOfMemory(String),
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "GPU validation error: {}", msg),
            Self::OutOfMemory(msg) => write!(f, "GPU out of memory: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {}

impl From<wgpu::Error> for GpuError {
    fn from(err: wgpu::Error) -> Self {
        match &err {
            wgpu::Error::OutOfMemory { .. } => Self::OutOfMemory(err.to_string()),
            _ => Self::Validation(err.to_string()),
        }
    }
}

/// Layout of one vertex buffer slot.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferSpec {
    pub array_stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

/// Everything needed to compile one render pipeline.
///
/// The pipeline layout is derived from the shader, so bind group layouts are
/// obtained afterwards with [`RenderContext::get_bind_group_layout`].
#[derive(Debug, Clone)]
pub struct RenderPipelineSpec {
    pub label: String,
    /// WGSL source
    pub shader_source: String,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
    pub vertex_buffers: Vec<VertexBufferSpec>,
    pub color_target: wgpu::ColorTargetState,
    pub primitive: wgpu::PrimitiveState,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub sample_count: u32,
}

/// A resource bound into a bind group.
#[derive(Debug, Clone, Copy)]
pub enum BindingResource<'a> {
    Buffer(&'a GpuBuffer),
    TextureView(&'a GpuTextureView),
    Sampler(&'a GpuSampler),
}

impl BindingResource<'_> {
    /// Identity of the bound resource.
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Buffer(buffer) => buffer.id(),
            Self::TextureView(view) => view.id(),
            Self::Sampler(sampler) => sampler.id(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BindGroupEntrySpec<'a> {
    pub binding: u32,
    pub resource: BindingResource<'a>,
}

#[derive(Debug, Clone, Copy)]
pub struct BindGroupSpec<'a> {
    pub label: &'a str,
    pub layout: &'a GpuBindGroupLayout,
    pub entries: &'a [BindGroupEntrySpec<'a>],
}

/// What happens to the color attachment when the pass begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadAction {
    Load,
    Clear(wgpu::Color),
}

#[derive(Debug, Clone, Copy)]
pub struct ColorAttachmentSpec<'a> {
    pub view: &'a GpuTextureView,
    pub resolve_target: Option<&'a GpuTextureView>,
    pub load: LoadAction,
}

/// Stencil attachment, cleared to `clear_value` when the pass begins.
#[derive(Debug, Clone, Copy)]
pub struct StencilAttachmentSpec<'a> {
    pub view: &'a GpuTextureView,
    pub clear_value: u32,
}

/// Scissor rectangle in target pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    /// Indexed draw using the 16-bit index buffer of the pass.
    Indexed { index_count: u32, instance_count: u32 },
    /// Non-indexed draw.
    Direct { vertex_count: u32, instance_count: u32 },
}

/// A complete single render pass: one pipeline, one draw.
///
/// A pass without pipeline and draw only performs its load action, which is
/// how clears are expressed.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassSpec<'a> {
    pub label: &'a str,
    pub color: ColorAttachmentSpec<'a>,
    pub stencil: Option<StencilAttachmentSpec<'a>>,
    pub pipeline: Option<&'a GpuRenderPipeline>,
    /// Bind group `i` is bound at group index `i`
    pub bind_groups: &'a [&'a GpuBindGroup],
    /// Vertex buffer `i` is bound at slot `i`
    pub vertex_buffers: &'a [&'a GpuBuffer],
    pub index_buffer: Option<&'a GpuBuffer>,
    pub scissor: Option<ScissorRect>,
    pub stencil_reference: Option<u32>,
    pub draw: Option<DrawCall>,
}

impl<'a> RenderPassSpec<'a> {
    /// A pass that only clears `color` (or just loads it).
    pub fn clear_only(label: &'a str, color: ColorAttachmentSpec<'a>) -> Self {
        Self {
            label,
            color,
            stencil: None,
            pipeline: None,
            bind_groups: &[],
            vertex_buffers: &[],
            index_buffer: None,
            scissor: None,
            stencil_reference: None,
            draw: None,
        }
    }
}

/// Trait abstracting GPU resource creation and submission.
///
/// # Borrow Checking Pattern
///
/// Methods take `&self` and return owned handles, so one context can be
/// shared (via `Arc<dyn RenderContext>`) by every batch and cache, and the
/// mock can record calls through interior mutability.
///
/// # Release
///
/// The `release_*`/`destroy_*` methods consume the handle. Caches call them
/// exactly once when an entry is evicted so the release is synchronous and
/// observable in tests.
///
/// # Errors
///
/// Allocations (buffers, textures, samplers, pipelines) return `GpuError`
/// instead of handing the failure to the device's uncaptured-error handler.
pub trait RenderContext: Send + Sync {
    // Buffer operations

    /// Create a GPU buffer.
    fn create_buffer(&self, desc: &wgpu::BufferDescriptor) -> Result<GpuBuffer, GpuError>;

    /// Create a GPU buffer initialized with `contents`.
    fn create_buffer_init(
        &self,
        label: Option<&str>,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> Result<GpuBuffer, GpuError>;

    /// Write data to a buffer; ordered before the next submitted pass.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]);

    // Texture operations

    /// Create a GPU texture.
    fn create_texture(&self, desc: &wgpu::TextureDescriptor) -> Result<GpuTexture, GpuError>;

    /// Create the default view of a texture.
    fn create_texture_view(&self, texture: &GpuTexture) -> GpuTextureView;

    /// Upload tightly packed texel rows to mip level 0.
    fn write_texture(
        &self,
        texture: &GpuTexture,
        data: &[u8],
        bytes_per_row: u32,
        size: wgpu::Extent3d,
    );

    /// Free the texture's GPU memory.
    fn destroy_texture(&self, texture: GpuTexture);

    // Sampler operations

    fn create_sampler(&self, desc: &wgpu::SamplerDescriptor) -> Result<GpuSampler, GpuError>;

    fn release_sampler(&self, sampler: GpuSampler);

    // Pipeline operations

    /// Compile the shader and build a render pipeline.
    fn create_render_pipeline(
        &self,
        spec: &RenderPipelineSpec,
    ) -> Result<GpuRenderPipeline, GpuError>;

    /// Get the (shader-derived) bind group layout at `index`.
    fn get_bind_group_layout(&self, pipeline: &GpuRenderPipeline, index: u32)
    -> GpuBindGroupLayout;

    fn release_bind_group_layout(&self, layout: GpuBindGroupLayout);

    fn release_render_pipeline(&self, pipeline: GpuRenderPipeline);

    // Bind group operations

    fn create_bind_group(&self, desc: &BindGroupSpec) -> GpuBindGroup;

    // Submission

    /// Encode `pass` into a fresh command buffer and submit it to the queue.
    fn submit_render_pass(&self, pass: &RenderPassSpec);
}
