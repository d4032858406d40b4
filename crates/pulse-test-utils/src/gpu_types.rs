//! GPU resource handles that can be real or mock.
//!
//! # Design Pattern: Opaque Handle
//!
//! Each type hides whether it holds a real wgpu object or a mock. Handles are
//! cheap to clone (wgpu reference counts internally) and compare by their
//! [`ResourceId`], never by content.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a GPU resource handle.
///
/// Clones of a handle share the id; two separately created resources never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, mostly useful in log output.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident, $inner:ident, $wgpu:ty, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        pub struct $name {
            id: ResourceId,
            inner: $inner,
        }

        #[derive(Clone, Debug)]
        enum $inner {
            Real($wgpu),
            #[cfg(feature = "mock")]
            Mock,
        }

        impl $name {
            /// Wrap a real wgpu object, assigning it a fresh id.
            pub fn from_wgpu(value: $wgpu) -> Self {
                Self {
                    id: ResourceId::next(),
                    inner: $inner::Real(value),
                }
            }

            /// Create a mock handle (for testing).
            #[cfg(feature = "mock")]
            pub fn mock() -> Self {
                Self {
                    id: ResourceId::next(),
                    inner: $inner::Mock,
                }
            }

            /// Identity of the underlying resource.
            pub fn id(&self) -> ResourceId {
                self.id
            }

            /// Get the underlying wgpu object.
            ///
            /// # Panics
            /// Panics if this is a mock handle (test code never reaches the real backend).
            pub fn as_wgpu(&self) -> &$wgpu {
                match &self.inner {
                    $inner::Real(value) => value,
                    #[cfg(feature = "mock")]
                    $inner::Mock => {
                        panic!(concat!("Attempted to get ", $what, " from a mock handle"))
                    }
                }
            }

            /// Check if this is a mock (useful in tests).
            #[cfg(feature = "mock")]
            pub fn is_mock(&self) -> bool {
                matches!(self.inner, $inner::Mock)
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for $name {}
    };
}

gpu_handle!(
    /// Wrapper around a GPU buffer.
    GpuBuffer,
    GpuBufferInner,
    wgpu::Buffer,
    "wgpu::Buffer"
);

gpu_handle!(
    /// Wrapper around a GPU texture.
    GpuTexture,
    GpuTextureInner,
    wgpu::Texture,
    "wgpu::Texture"
);

gpu_handle!(
    /// Wrapper around a GPU texture view.
    GpuTextureView,
    GpuTextureViewInner,
    wgpu::TextureView,
    "wgpu::TextureView"
);

gpu_handle!(
    /// Wrapper around a GPU sampler.
    GpuSampler,
    GpuSamplerInner,
    wgpu::Sampler,
    "wgpu::Sampler"
);

gpu_handle!(
    /// Wrapper around a GPU render pipeline.
    GpuRenderPipeline,
    GpuRenderPipelineInner,
    wgpu::RenderPipeline,
    "wgpu::RenderPipeline"
);

gpu_handle!(
    /// Wrapper around a GPU bind group layout.
    GpuBindGroupLayout,
    GpuBindGroupLayoutInner,
    wgpu::BindGroupLayout,
    "wgpu::BindGroupLayout"
);

gpu_handle!(
    /// Wrapper around a GPU bind group.
    GpuBindGroup,
    GpuBindGroupInner,
    wgpu::BindGroup,
    "wgpu::BindGroup"
);
