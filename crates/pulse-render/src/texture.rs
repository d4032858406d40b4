//! Textures and rectangular regions of them.
//!
//! A [`Texture`] owns its GPU resource. A [`TextureRegion`] is a cheap,
//! copyable view of a rectangle inside one; every batch addresses textures
//! through regions. Regions borrow their root, so a root can only be released
//! once no region of it is alive.

use glam::{UVec2, Vec2};
use pulse_test_utils::{GpuTexture, GpuTextureView, RenderContext, ResourceId};

use crate::{
    error::{RenderError, RenderResult},
    rect::URect,
};

/// Sample count of multisampled textures.
pub const MSAA_SAMPLE_COUNT: u32 = 4;

/// Largest texture edge; regions are packed into 16-bit sprite records.
pub const MAX_TEXTURE_DIMENSION: u32 = u16::MAX as u32;

#[derive(Debug, Clone)]
pub struct TextureOptions<'a> {
    pub label: Option<&'a str>,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    /// Render with 4x MSAA; sampling reads the resolved texture
    pub msaa: bool,
}

impl Default for TextureOptions<'_> {
    fn default() -> Self {
        Self {
            label: None,
            format: wgpu::TextureFormat::Rgba8Unorm,
            width: 1,
            height: 1,
            msaa: false,
        }
    }
}

/// Description of a texture created outside of Pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportedTexture {
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub width: u32,
    pub height: u32,
}

/// A root texture.
///
/// `resolve_target` is present exactly when `sample_count > 1`.
#[derive(Debug)]
pub struct Texture {
    texture: GpuTexture,
    view: GpuTextureView,
    format: wgpu::TextureFormat,
    sample_count: u32,
    width: u32,
    height: u32,
    resolve: Option<Box<Texture>>,
    /// Imported textures are never destroyed by us
    owned: bool,
}

impl Texture {
    /// Allocate a new texture usable as render target, sampling source and
    /// copy destination.
    pub fn new(ctx: &dyn RenderContext, options: &TextureOptions) -> RenderResult<Self> {
        check_dimensions(options.width, options.height)?;

        let sample_count = if options.msaa { MSAA_SAMPLE_COUNT } else { 1 };
        let resolve = if options.msaa {
            let single = TextureOptions {
                msaa: false,
                ..options.clone()
            };
            Some(Box::new(Self::new(ctx, &single)?))
        } else {
            None
        };

        let usage = if sample_count > 1 {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
        };

        let created = ctx.create_texture(&wgpu::TextureDescriptor {
            label: options.label,
            size: wgpu::Extent3d {
                width: options.width,
                height: options.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: options.format,
            usage,
            view_formats: &[],
        });
        let texture = match created {
            Ok(texture) => texture,
            Err(source) => {
                if let Some(resolve) = resolve {
                    resolve.release(ctx);
                }
                return Err(RenderError::resource_creation(
                    options.label.unwrap_or("Texture"),
                    source,
                ));
            }
        };
        let view = ctx.create_texture_view(&texture);

        tracing::trace!(
            "Created texture {} ({}x{}, {:?}, {} samples)",
            texture.id(),
            options.width,
            options.height,
            options.format,
            sample_count
        );

        Ok(Self {
            texture,
            view,
            format: options.format,
            sample_count,
            width: options.width,
            height: options.height,
            resolve,
            owned: true,
        })
    }

    /// Create an `Rgba8Unorm` texture filled with tightly packed `pixels`.
    pub fn from_rgba8(
        ctx: &dyn RenderContext,
        label: Option<&str>,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RenderResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::InvalidTexture(format!(
                "expected {} bytes of RGBA8 data for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }

        let texture = Self::new(
            ctx,
            &TextureOptions {
                label,
                format: wgpu::TextureFormat::Rgba8Unorm,
                width,
                height,
                msaa: false,
            },
        )?;

        ctx.write_texture(
            &texture.texture,
            pixels,
            width * 4,
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        Ok(texture)
    }

    /// Wrap a texture owned elsewhere, such as a swapchain image.
    ///
    /// Releasing an imported texture never destroys the GPU resource.
    pub fn import(
        texture: GpuTexture,
        view: GpuTextureView,
        info: ImportedTexture,
        resolve: Option<Texture>,
    ) -> RenderResult<Self> {
        check_dimensions(info.width, info.height)?;

        if (info.sample_count > 1) != resolve.is_some() {
            return Err(RenderError::InvalidTexture(format!(
                "a texture with {} samples {} a resolve target",
                info.sample_count,
                if resolve.is_some() {
                    "must not have"
                } else {
                    "needs"
                }
            )));
        }

        if let Some(resolve) = &resolve {
            if resolve.sample_count != 1 || resolve.size() != UVec2::new(info.width, info.height) {
                return Err(RenderError::InvalidTexture(
                    "resolve target must be single-sampled and match the texture size".to_string(),
                ));
            }
        }

        Ok(Self {
            texture,
            view,
            format: info.format,
            sample_count: info.sample_count,
            width: info.width,
            height: info.height,
            resolve: resolve.map(Box::new),
            owned: false,
        })
    }

    /// Identity of the GPU texture, shared by all regions of it.
    pub fn id(&self) -> ResourceId {
        self.texture.id()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn gpu_texture(&self) -> &GpuTexture {
        &self.texture
    }

    /// The single-sample texture this one resolves into.
    pub fn resolve_target(&self) -> Option<&Texture> {
        self.resolve.as_deref()
    }

    /// The whole texture as a region.
    pub fn region(&self) -> TextureRegion<'_> {
        TextureRegion {
            root: self,
            rect: URect::new(0, 0, self.width, self.height),
        }
    }

    /// Shorthand for `self.region().sub_texture(position, size)`.
    pub fn sub_texture(&self, position: UVec2, size: UVec2) -> RenderResult<TextureRegion<'_>> {
        self.region().sub_texture(position, size)
    }

    /// Destroy the GPU resources. Pending batches drawing to or from this
    /// texture must be flushed first.
    pub fn release(self, ctx: &dyn RenderContext) {
        if let Some(resolve) = self.resolve {
            resolve.release(ctx);
        }

        if self.owned {
            tracing::trace!("Destroying texture {}", self.texture.id());
            ctx.destroy_texture(self.texture);
        }
    }
}

fn check_dimensions(width: u32, height: u32) -> RenderResult<()> {
    if width == 0 || height == 0 || width > MAX_TEXTURE_DIMENSION || height > MAX_TEXTURE_DIMENSION {
        return Err(RenderError::InvalidTexture(format!(
            "dimensions {}x{} outside of 1..={}",
            width, height, MAX_TEXTURE_DIMENSION
        )));
    }

    Ok(())
}

/// A rectangle inside a root [`Texture`].
///
/// Regions are `Copy`; creating one never touches the GPU.
#[derive(Debug, Clone, Copy)]
pub struct TextureRegion<'a> {
    root: &'a Texture,
    rect: URect,
}

impl<'a> TextureRegion<'a> {
    pub fn root(&self) -> &'a Texture {
        self.root
    }

    /// The region in root texel coordinates.
    pub fn rect(&self) -> URect {
        self.rect
    }

    pub fn position(&self) -> UVec2 {
        self.rect.position()
    }

    pub fn size(&self) -> UVec2 {
        self.rect.size()
    }

    /// Whether the region spans its whole root.
    pub fn is_root(&self) -> bool {
        self.rect == self.root.region().rect
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.root.format
    }

    pub fn sample_count(&self) -> u32 {
        self.root.sample_count
    }

    /// A rectangle of this region; `position` is relative to it.
    ///
    /// Fails with [`RenderError::OutOfBounds`] unless the rectangle lies
    /// completely inside this region.
    pub fn sub_texture(&self, position: UVec2, size: UVec2) -> RenderResult<TextureRegion<'a>> {
        let out_of_bounds = || RenderError::OutOfBounds {
            parent: self.rect,
            position,
            size,
        };

        let end = position.x.checked_add(size.x).zip(position.y.checked_add(size.y));
        match end {
            Some((right, bottom)) if right <= self.rect.width && bottom <= self.rect.height => {
                Ok(TextureRegion {
                    root: self.root,
                    rect: URect::from_pos_size(self.rect.position() + position, size),
                })
            }
            _ => Err(out_of_bounds()),
        }
    }

    /// Normalized offset of the region inside its root.
    pub fn uv_offset(&self) -> Vec2 {
        self.rect.position().as_vec2() / self.root.size().as_vec2()
    }

    /// Normalized size of the region relative to its root.
    pub fn uv_scale(&self) -> Vec2 {
        self.rect.size().as_vec2() / self.root.size().as_vec2()
    }

    /// View to sample from: the resolve target if there is one.
    pub fn source_view(&self) -> &'a GpuTextureView {
        match self.root.resolve.as_deref() {
            Some(resolve) => &resolve.view,
            None => &self.root.view,
        }
    }

    /// View to render into plus the resolve target view, if any.
    pub fn render_views(&self) -> (&'a GpuTextureView, Option<&'a GpuTextureView>) {
        (
            &self.root.view,
            self.root.resolve.as_deref().map(|resolve| &resolve.view),
        )
    }

    /// The same rectangle of the root's resolve target.
    pub fn resolve_target(&self) -> Option<TextureRegion<'a>> {
        self.root.resolve.as_deref().map(|resolve| TextureRegion {
            root: resolve,
            rect: self.rect,
        })
    }

    /// Everything a pass needs to render into the root.
    pub(crate) fn render_target(&self) -> RenderTarget {
        let (view, resolve) = self.render_views();
        RenderTarget {
            texture: self.root.id(),
            view: view.clone(),
            resolve: resolve.cloned(),
            format: self.root.format,
            sample_count: self.root.sample_count,
            size: self.root.size(),
        }
    }

    /// Everything a pass needs to sample from the root.
    pub(crate) fn sampled(&self) -> SampledTexture {
        SampledTexture {
            texture: self.root.id(),
            view: self.source_view().clone(),
            size: self.root.size(),
        }
    }
}

impl PartialEq for TextureRegion<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.root.id() == other.root.id() && self.rect == other.rect
    }
}

impl<'a> From<&'a Texture> for TextureRegion<'a> {
    fn from(texture: &'a Texture) -> Self {
        texture.region()
    }
}

/// Owned handles of a root texture used as a color attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    pub texture: ResourceId,
    pub view: GpuTextureView,
    pub resolve: Option<GpuTextureView>,
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub size: UVec2,
}

/// Owned handles of a root texture bound for sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledTexture {
    pub texture: ResourceId,
    pub view: GpuTextureView,
    pub size: UVec2,
}
