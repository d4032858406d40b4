use std::{
    hash::{Hash, Hasher},
    num::NonZeroUsize,
    sync::Arc,
};

use pulse_test_utils::{GpuSampler, RenderContext};

use super::ResourceCache;
use crate::error::{RenderError, RenderResult};

const SAMPLER_LABEL: &str = "Cached Sampler";

/// A hashable sampler description.
///
/// `wgpu::SamplerDescriptor` is neither `Eq` nor `Hash` because of its float
/// LOD clamps, so those are stored as bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerKey {
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    pub address_mode_w: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::FilterMode,
    pub lod_min_clamp: u32, // f32 bits
    pub lod_max_clamp: u32, // f32 bits
}

impl Hash for SamplerKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address_mode_u.hash(state);
        self.address_mode_v.hash(state);
        self.address_mode_w.hash(state);
        self.mag_filter.hash(state);
        self.min_filter.hash(state);
        self.mipmap_filter.hash(state);
        self.lod_min_clamp.hash(state);
        self.lod_max_clamp.hash(state);
    }
}

impl SamplerKey {
    /// Sampler used by sprite draws: one filter for both magnification and
    /// minification, linear mipmap blending.
    pub fn new(
        filter: wgpu::FilterMode,
        address_mode_u: wgpu::AddressMode,
        address_mode_v: wgpu::AddressMode,
    ) -> Self {
        Self {
            address_mode_u,
            address_mode_v,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Linear,
            lod_min_clamp: 0.0f32.to_bits(),
            lod_max_clamp: 32.0f32.to_bits(),
        }
    }

    pub fn linear() -> Self {
        Self::new(
            wgpu::FilterMode::Linear,
            wgpu::AddressMode::ClampToEdge,
            wgpu::AddressMode::ClampToEdge,
        )
    }

    pub fn nearest() -> Self {
        Self::new(
            wgpu::FilterMode::Nearest,
            wgpu::AddressMode::ClampToEdge,
            wgpu::AddressMode::ClampToEdge,
        )
    }

    pub fn from_descriptor(desc: &wgpu::SamplerDescriptor) -> Self {
        Self {
            address_mode_u: desc.address_mode_u,
            address_mode_v: desc.address_mode_v,
            address_mode_w: desc.address_mode_w,
            mag_filter: desc.mag_filter,
            min_filter: desc.min_filter,
            mipmap_filter: desc.mipmap_filter,
            lod_min_clamp: desc.lod_min_clamp.to_bits(),
            lod_max_clamp: desc.lod_max_clamp.to_bits(),
        }
    }

    pub fn to_descriptor<'a>(&self, label: Option<&'a str>) -> wgpu::SamplerDescriptor<'a> {
        wgpu::SamplerDescriptor {
            label,
            address_mode_u: self.address_mode_u,
            address_mode_v: self.address_mode_v,
            address_mode_w: self.address_mode_w,
            mag_filter: self.mag_filter,
            min_filter: self.min_filter,
            mipmap_filter: self.mipmap_filter,
            lod_min_clamp: f32::from_bits(self.lod_min_clamp),
            lod_max_clamp: f32::from_bits(self.lod_max_clamp),
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        }
    }
}

/// LRU cache of samplers keyed by their description.
pub struct SamplerCache {
    samplers: ResourceCache<SamplerKey, GpuSampler>,
}

impl SamplerCache {
    pub fn new(ctx: Arc<dyn RenderContext>, capacity: NonZeroUsize) -> Self {
        Self {
            samplers: ResourceCache::new(ctx, "Sampler", capacity),
        }
    }

    /// Get or create the sampler for `key`.
    ///
    /// The handle stays valid for passes already submitted even if the cache
    /// evicts it later. A failed allocation leaves the cache untouched.
    pub fn get(&mut self, key: &SamplerKey) -> RenderResult<GpuSampler> {
        self.samplers
            .get_or_try_insert_with(key, |ctx| {
                ctx.create_sampler(&key.to_descriptor(Some(SAMPLER_LABEL)))
                    .map_err(|source| RenderError::resource_creation(SAMPLER_LABEL, source))
            })
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}
