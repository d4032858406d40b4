use std::{num::NonZeroUsize, sync::Arc};

use pulse_test_utils::{GpuTexture, GpuTextureView, RenderContext};

use super::{Release, ResourceCache};
use crate::error::{RenderError, RenderResult};

/// Format of the scratch stencil textures.
pub const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Stencil8;

/// Label of the scratch stencil textures.
pub const STENCIL_LABEL: &str = "LinesStencil";

/// Descriptor of a scratch stencil texture: it must match its color target's
/// size and sample count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilKey {
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

pub struct StencilTexture {
    texture: GpuTexture,
    view: GpuTextureView,
}

impl Release for StencilTexture {
    fn release(self, ctx: &dyn RenderContext) {
        drop(self.view);
        ctx.destroy_texture(self.texture);
    }
}

/// Scratch stencil textures shared by every line pass with the same key.
///
/// The contents are cleared at the start of each pass, so sharing is safe.
pub struct StencilCache {
    textures: ResourceCache<StencilKey, StencilTexture>,
}

impl StencilCache {
    pub fn new(ctx: Arc<dyn RenderContext>, capacity: NonZeroUsize) -> Self {
        Self {
            textures: ResourceCache::new(ctx, "Stencil", capacity),
        }
    }

    /// View of the stencil texture for `key`, allocated on a miss.
    pub fn get(&mut self, key: &StencilKey) -> RenderResult<GpuTextureView> {
        let stencil = self.textures.get_or_try_insert_with(key, |ctx| -> RenderResult<_> {
            let texture = ctx
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(STENCIL_LABEL),
                    size: wgpu::Extent3d {
                        width: key.width,
                        height: key.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: key.sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format: STENCIL_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .map_err(|source| RenderError::resource_creation(STENCIL_LABEL, source))?;
            let view = ctx.create_texture_view(&texture);
            Ok(StencilTexture { texture, view })
        })?;
        Ok(stencil.view.clone())
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_test_utils::MockRenderContext;

    fn key(width: u32) -> StencilKey {
        StencilKey {
            width,
            height: 64,
            sample_count: 1,
        }
    }

    #[test]
    fn test_stencil_reuse_per_key() {
        let mock = Arc::new(MockRenderContext::new());
        let mut cache = StencilCache::new(mock.clone(), NonZeroUsize::new(4).unwrap());

        let a = cache.get(&key(64)).unwrap();
        let b = cache.get(&key(64)).unwrap();
        let msaa = cache
            .get(&StencilKey {
                sample_count: 4,
                ..key(64)
            })
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, msaa);
        assert_eq!(mock.count_texture_creates(), 2);
    }

    #[test]
    fn test_fifth_size_destroys_oldest() {
        let mock = Arc::new(MockRenderContext::new());
        let mut cache = StencilCache::new(mock.clone(), NonZeroUsize::new(4).unwrap());

        for width in 1..=5 {
            cache.get(&key(width)).unwrap();
        }

        assert_eq!(cache.len(), 4);
        assert_eq!(mock.destroyed_textures().len(), 1);
    }

    #[test]
    fn test_failed_allocation_is_not_cached() {
        let mock = Arc::new(MockRenderContext::new());
        let mut cache = StencilCache::new(mock.clone(), NonZeroUsize::new(4).unwrap());
        mock.fail_allocations_labeled(STENCIL_LABEL);

        let err = cache.get(&key(64)).unwrap_err();

        assert!(matches!(
            err,
            RenderError::ResourceCreation { ref label, .. } if label == STENCIL_LABEL
        ));
        assert!(cache.is_empty());
        assert_eq!(mock.count_texture_creates(), 0);
    }
}
