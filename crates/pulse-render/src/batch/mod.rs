//! Draw accumulators.
//!
//! Each batch owns its GPU buffers and a CPU mirror of the pending records.
//! `draw` appends (flushing first when the configuration changes or the
//! buffer is full) and `flush` encodes everything pending as one render pass.

mod clear;
mod line;
mod mesh;
mod sprite;

use std::num::NonZeroUsize;

pub use clear::ClearCommand;
pub use line::{LineBatch, LinePipeline, LineUniform, StrokePathOptions};
pub use mesh::{DrawTrianglesOptions, MeshBatch, MeshBatchConfig, MeshPipeline, MeshVertex, Vertex2d};
pub use sprite::{
    DrawSpriteOptions, DrawSpritesFromGpuOptions, SpriteBatch, SpriteBatchConfig, SpriteInstance,
    SpritePipeline, SpriteUniform,
};

use pulse_test_utils::{GpuBuffer, RenderContext};

use crate::error::{RenderError, RenderResult};

/// Counters of one batch since the last [`BatchStats::take`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Render passes submitted
    pub passes: u32,
    /// Instances, vertices or points drawn
    pub records: u64,
}

impl BatchStats {
    pub(crate) fn record_pass(&mut self, records: u64) {
        self.passes += 1;
        self.records += records;
    }

    /// Return the counters and reset them.
    pub fn take(&mut self) -> BatchStats {
        std::mem::take(self)
    }
}

pub(crate) fn non_zero(value: usize, what: &str) -> RenderResult<NonZeroUsize> {
    NonZeroUsize::new(value).ok_or_else(|| RenderError::InvalidConfig(format!("{} must not be zero", what)))
}

/// Allocate a batch-owned buffer, reporting failure under its label.
pub(crate) fn create_buffer(
    ctx: &dyn RenderContext,
    desc: &wgpu::BufferDescriptor,
) -> RenderResult<GpuBuffer> {
    ctx.create_buffer(desc)
        .map_err(|source| RenderError::resource_creation(desc.label.unwrap_or("Buffer"), source))
}

/// Decode records from bytes captured by the mock context, which carry no
/// alignment guarantee.
#[cfg(test)]
pub(crate) fn read_records<T: bytemuck::Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}
