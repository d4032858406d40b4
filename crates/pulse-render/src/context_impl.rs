//! Implementation of the RenderContext trait for GraphicsContext.
//!
//! This lets every batch run on a real device and on `MockRenderContext`
//! through the same trait object.

use pulse_core::profiling::profile_function;
use pulse_test_utils::{
    BindGroupSpec, BindingResource, DrawCall, GpuBindGroup, GpuBindGroupLayout, GpuBuffer,
    GpuError, GpuRenderPipeline, GpuSampler, GpuTexture, GpuTextureView, LoadAction,
    RenderContext, RenderPassSpec, RenderPipelineSpec,
};
use wgpu::util::DeviceExt;

use crate::context::GraphicsContext;

impl GraphicsContext {
    /// Run `create` inside out-of-memory and validation error scopes.
    ///
    /// wgpu reports allocation and validation failures asynchronously through
    /// the scopes; without them they reach the uncaptured-error handler.
    fn scoped<T>(&self, what: &str, create: impl FnOnce() -> T) -> Result<T, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let value = create();

        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            tracing::error!("Creating {} failed: {}", what, err);
            return Err(err.into());
        }

        Ok(value)
    }
}

impl RenderContext for GraphicsContext {
    fn create_buffer(&self, desc: &wgpu::BufferDescriptor) -> Result<GpuBuffer, GpuError> {
        let buffer = self.scoped(desc.label.unwrap_or("buffer"), || {
            self.device.create_buffer(desc)
        })?;
        Ok(GpuBuffer::from_wgpu(buffer))
    }

    fn create_buffer_init(
        &self,
        label: Option<&str>,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> Result<GpuBuffer, GpuError> {
        let buffer = self.scoped(label.unwrap_or("buffer"), || {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label,
                    contents,
                    usage,
                })
        })?;
        Ok(GpuBuffer::from_wgpu(buffer))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer.as_wgpu(), offset, data);
    }

    fn create_texture(&self, desc: &wgpu::TextureDescriptor) -> Result<GpuTexture, GpuError> {
        let texture = self.scoped(desc.label.unwrap_or("texture"), || {
            self.device.create_texture(desc)
        })?;
        Ok(GpuTexture::from_wgpu(texture))
    }

    fn create_texture_view(&self, texture: &GpuTexture) -> GpuTextureView {
        let view = texture
            .as_wgpu()
            .create_view(&wgpu::TextureViewDescriptor::default());
        GpuTextureView::from_wgpu(view)
    }

    fn write_texture(
        &self,
        texture: &GpuTexture,
        data: &[u8],
        bytes_per_row: u32,
        size: wgpu::Extent3d,
    ) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: texture.as_wgpu(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(size.height),
            },
            size,
        );
    }

    fn destroy_texture(&self, texture: GpuTexture) {
        texture.as_wgpu().destroy();
    }

    fn create_sampler(&self, desc: &wgpu::SamplerDescriptor) -> Result<GpuSampler, GpuError> {
        let sampler = self.scoped(desc.label.unwrap_or("sampler"), || {
            self.device.create_sampler(desc)
        })?;
        Ok(GpuSampler::from_wgpu(sampler))
    }

    fn release_sampler(&self, sampler: GpuSampler) {
        drop(sampler);
    }

    fn create_render_pipeline(
        &self,
        spec: &RenderPipelineSpec,
    ) -> Result<GpuRenderPipeline, GpuError> {
        profile_function!();

        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = spec
            .vertex_buffers
            .iter()
            .map(|buffer| wgpu::VertexBufferLayout {
                array_stride: buffer.array_stride,
                step_mode: buffer.step_mode,
                attributes: &buffer.attributes,
            })
            .collect();

        // shader compilation errors surface through the scopes, not a return value
        let pipeline = self.scoped(&spec.label, || {
            let module = self
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(spec.label.as_str()),
                    source: wgpu::ShaderSource::Wgsl(spec.shader_source.as_str().into()),
                });

            self.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(spec.label.as_str()),
                    layout: None,
                    vertex: wgpu::VertexState {
                        module: &module,
                        entry_point: Some(spec.vertex_entry),
                        buffers: &vertex_buffers,
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &module,
                        entry_point: Some(spec.fragment_entry),
                        targets: &[Some(spec.color_target.clone())],
                        compilation_options: Default::default(),
                    }),
                    primitive: spec.primitive,
                    depth_stencil: spec.depth_stencil.clone(),
                    multisample: wgpu::MultisampleState {
                        count: spec.sample_count,
                        mask: !0,
                        alpha_to_coverage_enabled: false,
                    },
                    multiview: None,
                    cache: None,
                })
        })?;

        Ok(GpuRenderPipeline::from_wgpu(pipeline))
    }

    fn get_bind_group_layout(
        &self,
        pipeline: &GpuRenderPipeline,
        index: u32,
    ) -> GpuBindGroupLayout {
        GpuBindGroupLayout::from_wgpu(pipeline.as_wgpu().get_bind_group_layout(index))
    }

    fn release_bind_group_layout(&self, layout: GpuBindGroupLayout) {
        drop(layout);
    }

    fn release_render_pipeline(&self, pipeline: GpuRenderPipeline) {
        drop(pipeline);
    }

    fn create_bind_group(&self, desc: &BindGroupSpec) -> GpuBindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = desc
            .entries
            .iter()
            .map(|entry| wgpu::BindGroupEntry {
                binding: entry.binding,
                resource: match entry.resource {
                    BindingResource::Buffer(buffer) => buffer.as_wgpu().as_entire_binding(),
                    BindingResource::TextureView(view) => {
                        wgpu::BindingResource::TextureView(view.as_wgpu())
                    }
                    BindingResource::Sampler(sampler) => {
                        wgpu::BindingResource::Sampler(sampler.as_wgpu())
                    }
                },
            })
            .collect();

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(desc.label),
            layout: desc.layout.as_wgpu(),
            entries: &entries,
        });
        GpuBindGroup::from_wgpu(bind_group)
    }

    fn submit_render_pass(&self, pass: &RenderPassSpec) {
        profile_function!();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(pass.label),
            });

        {
            let load = match pass.color.load {
                LoadAction::Load => wgpu::LoadOp::Load,
                LoadAction::Clear(color) => wgpu::LoadOp::Clear(color),
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(pass.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: pass.color.view.as_wgpu(),
                    depth_slice: None,
                    resolve_target: pass.color.resolve_target.map(GpuTextureView::as_wgpu),
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: pass.stencil.map(|stencil| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view: stencil.view.as_wgpu(),
                        depth_ops: None,
                        stencil_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(stencil.clear_value),
                            store: wgpu::StoreOp::Discard,
                        }),
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(pipeline) = pass.pipeline {
                render_pass.set_pipeline(pipeline.as_wgpu());
            }
            for (index, bind_group) in pass.bind_groups.iter().enumerate() {
                render_pass.set_bind_group(index as u32, bind_group.as_wgpu(), &[]);
            }
            for (slot, buffer) in pass.vertex_buffers.iter().enumerate() {
                render_pass.set_vertex_buffer(slot as u32, buffer.as_wgpu().slice(..));
            }
            if let Some(index_buffer) = pass.index_buffer {
                render_pass.set_index_buffer(index_buffer.as_wgpu().slice(..), wgpu::IndexFormat::Uint16);
            }
            if let Some(scissor) = pass.scissor {
                render_pass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
            }
            if let Some(reference) = pass.stencil_reference {
                render_pass.set_stencil_reference(reference);
            }

            match pass.draw {
                Some(DrawCall::Indexed {
                    index_count,
                    instance_count,
                }) => render_pass.draw_indexed(0..index_count, 0, 0..instance_count),
                Some(DrawCall::Direct {
                    vertex_count,
                    instance_count,
                }) => render_pass.draw(0..vertex_count, 0..instance_count),
                None => {}
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
