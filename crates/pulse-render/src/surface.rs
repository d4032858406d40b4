//! Presenting to a window surface.

use std::sync::Arc;

use pulse_core::profiling::profile_function;
use pulse_test_utils::{GpuTexture, GpuTextureView, RenderContext};

use crate::{
    context::GraphicsContext,
    error::{GraphicsError, RenderError, RenderResult, SurfaceErrorKind},
    texture::{ImportedTexture, MSAA_SAMPLE_COUNT, Texture},
};

/// Descriptor for configuring a presentation surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceTargetDescriptor {
    /// The surface texture format. If None, uses the default format for the surface.
    pub format: Option<wgpu::TextureFormat>,
    /// Present mode for the surface.
    pub present_mode: Option<wgpu::PresentMode>,
    /// Alpha mode for the surface.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,
    /// Render into a 4x multisampled texture that resolves into the
    /// swapchain image.
    pub msaa: bool,
}

struct MsaaTexture {
    texture: GpuTexture,
    view: GpuTextureView,
}

/// A configured `wgpu::Surface` handing out frames as [`Texture`]s.
pub struct SurfaceTarget {
    context: Arc<GraphicsContext>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    msaa: Option<MsaaTexture>,
}

impl SurfaceTarget {
    /// Create a surface for `window` and configure it.
    pub fn from_window(
        context: Arc<GraphicsContext>,
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        descriptor: SurfaceTargetDescriptor,
    ) -> RenderResult<Self> {
        let surface = context
            .instance
            .create_surface(window)
            .map_err(|err| GraphicsError::SurfaceCreation(err.to_string()))?;
        Self::new(context, surface, width, height, descriptor)
    }

    pub fn new(
        context: Arc<GraphicsContext>,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        descriptor: SurfaceTargetDescriptor,
    ) -> RenderResult<Self> {
        let mut config = surface
            .get_default_config(&context.adapter, width.max(1), height.max(1))
            .ok_or(GraphicsError::UnsupportedSurface)?;

        if let Some(format) = descriptor.format {
            config.format = format;
        }
        if let Some(present_mode) = descriptor.present_mode {
            config.present_mode = present_mode;
        }
        if let Some(alpha_mode) = descriptor.alpha_mode {
            config.alpha_mode = alpha_mode;
        }

        surface.configure(&context.device, &config);
        tracing::info!(
            "Configured surface {}x{} ({:?}, {:?}, msaa: {})",
            config.width,
            config.height,
            config.format,
            config.present_mode,
            descriptor.msaa
        );

        let mut target = Self {
            context,
            surface,
            config,
            msaa: None,
        };
        if descriptor.msaa {
            target.msaa = Some(target.create_msaa_texture()?);
        }

        Ok(target)
    }

    fn create_msaa_texture(&self) -> RenderResult<MsaaTexture> {
        let created = self.context.create_texture(&wgpu::TextureDescriptor {
            label: Some("Surface.Msaa"),
            size: wgpu::Extent3d {
                width: self.config.width,
                height: self.config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: MSAA_SAMPLE_COUNT,
            dimension: wgpu::TextureDimension::D2,
            format: self.config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let texture =
            created.map_err(|source| RenderError::resource_creation("Surface.Msaa", source))?;
        let view = self.context.create_texture_view(&texture);
        Ok(MsaaTexture { texture, view })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn sample_count(&self) -> u32 {
        if self.msaa.is_some() { MSAA_SAMPLE_COUNT } else { 1 }
    }

    pub fn surface_config(&self) -> &wgpu::SurfaceConfiguration {
        &self.config
    }

    /// Reconfigure for a new window size. Zero sizes are ignored.
    ///
    /// If the multisampled texture cannot be reallocated the error is
    /// returned and the surface continues without MSAA.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 || (width, height) == self.size() {
            return Ok(());
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.context.device, &self.config);

        if let Some(old) = self.msaa.take() {
            self.context.destroy_texture(old.texture);
            self.msaa = Some(self.create_msaa_texture()?);
        }
        tracing::debug!("Resized surface to {}x{}", width, height);
        Ok(())
    }

    /// Acquire the next frame.
    ///
    /// An outdated or lost surface is reconfigured before the error is
    /// returned, so the next call can succeed. Check
    /// [`RenderError::is_recoverable`] to decide whether to skip the frame.
    pub fn acquire(&mut self) -> RenderResult<SurfaceFrame> {
        profile_function!();

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                let kind = SurfaceErrorKind::from(err);
                match kind {
                    SurfaceErrorKind::Outdated | SurfaceErrorKind::Lost => {
                        tracing::warn!("Surface {}, reconfiguring", kind);
                        self.surface.configure(&self.context.device, &self.config);
                    }
                    SurfaceErrorKind::Timeout => tracing::warn!("Surface {}", kind),
                    _ => tracing::error!("Surface {}", kind),
                }
                return Err(RenderError::Surface(kind));
            }
        };
        if frame.suboptimal {
            tracing::trace!("Acquired suboptimal surface frame");
        }

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let info = ImportedTexture {
            format: self.config.format,
            sample_count: 1,
            width: self.config.width,
            height: self.config.height,
        };
        let swapchain = Texture::import(
            GpuTexture::from_wgpu(frame.texture.clone()),
            GpuTextureView::from_wgpu(view),
            info,
            None,
        )?;

        let texture = match &self.msaa {
            Some(msaa) => Texture::import(
                msaa.texture.clone(),
                msaa.view.clone(),
                ImportedTexture {
                    sample_count: MSAA_SAMPLE_COUNT,
                    ..info
                },
                Some(swapchain),
            )?,
            None => swapchain,
        };

        Ok(SurfaceFrame { frame, texture })
    }
}

impl Drop for SurfaceTarget {
    fn drop(&mut self) {
        if let Some(msaa) = self.msaa.take() {
            self.context.destroy_texture(msaa.texture);
        }
    }
}

/// One acquired swapchain image.
///
/// All batches drawing to [`texture`](Self::texture) must be flushed before
/// [`present`](Self::present).
pub struct SurfaceFrame {
    frame: wgpu::SurfaceTexture,
    texture: Texture,
}

impl SurfaceFrame {
    /// The texture to render into. With MSAA this is the multisampled
    /// texture whose resolve target is the swapchain image.
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn present(self) {
        self.frame.present();
    }
}
