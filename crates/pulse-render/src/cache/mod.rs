//! Fixed-capacity GPU resource caches.
//!
//! All caches share [`ResourceCache`]: an LRU map that hands evicted values
//! back to the [`RenderContext`](pulse_test_utils::RenderContext) the moment
//! they leave the cache, and releases everything it still holds on drop.

mod resource;
mod pipeline;
mod sampler;
mod stencil;

pub use resource::{Release, ResourceCache};
pub use pipeline::{CachedPipeline, PipelineCache, PipelineConfig};
pub use sampler::{SamplerCache, SamplerKey};
pub use stencil::{STENCIL_FORMAT, STENCIL_LABEL, StencilCache, StencilKey, StencilTexture};
