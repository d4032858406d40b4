//! Capacities of the batches and caches.

use crate::error::{RenderError, RenderResult};

/// Size of one stroked path point on the GPU (`vec2<f32>`).
pub const LINE_POINT_SIZE: u64 = 8;

/// Capacities used by a [`Renderer`](crate::Renderer).
///
/// The defaults fit typical 2D games. Every value must be non-zero.
///
/// ```
/// use pulse_render::RenderConfig;
///
/// let config = RenderConfig::default()
///     .with_max_sprite_instances(4096)
///     .with_sampler_cache_capacity(8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Sprite instances per pass
    pub max_sprite_instances: usize,
    /// Mesh vertices per pass
    pub max_mesh_vertices: usize,
    /// Distinct model transforms per mesh pass
    pub max_mesh_transforms: usize,
    /// Bytes of the line point buffer, which bounds the points per line pass
    pub line_points_buffer_size: u64,
    /// Specialized pipelines kept per batch kind
    pub pipeline_cache_capacity: usize,
    /// Bind group layouts kept per pipeline
    pub bind_group_layout_cache_capacity: usize,
    pub sampler_cache_capacity: usize,
    /// Scratch stencil textures kept for line rendering
    pub stencil_cache_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_sprite_instances: 128 * 1024,
            max_mesh_vertices: 128 * 1024 * 3,
            max_mesh_transforms: 16 * 1024,
            line_points_buffer_size: 1024 * 1024,
            pipeline_cache_capacity: 16,
            bind_group_layout_cache_capacity: 16,
            sampler_cache_capacity: 16,
            stencil_cache_capacity: 4,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_sprite_instances(mut self, count: usize) -> Self {
        self.max_sprite_instances = count;
        self
    }

    pub fn with_max_mesh_vertices(mut self, count: usize) -> Self {
        self.max_mesh_vertices = count;
        self
    }

    pub fn with_max_mesh_transforms(mut self, count: usize) -> Self {
        self.max_mesh_transforms = count;
        self
    }

    pub fn with_line_points_buffer_size(mut self, bytes: u64) -> Self {
        self.line_points_buffer_size = bytes;
        self
    }

    pub fn with_pipeline_cache_capacity(mut self, capacity: usize) -> Self {
        self.pipeline_cache_capacity = capacity;
        self
    }

    pub fn with_bind_group_layout_cache_capacity(mut self, capacity: usize) -> Self {
        self.bind_group_layout_cache_capacity = capacity;
        self
    }

    pub fn with_sampler_cache_capacity(mut self, capacity: usize) -> Self {
        self.sampler_cache_capacity = capacity;
        self
    }

    pub fn with_stencil_cache_capacity(mut self, capacity: usize) -> Self {
        self.stencil_cache_capacity = capacity;
        self
    }

    /// Number of points a single line pass can hold.
    pub fn max_line_points(&self) -> usize {
        (self.line_points_buffer_size / LINE_POINT_SIZE) as usize
    }

    /// Check that every capacity is usable.
    pub fn validate(&self) -> RenderResult<()> {
        let counts = [
            ("max_sprite_instances", self.max_sprite_instances),
            ("max_mesh_transforms", self.max_mesh_transforms),
            ("pipeline_cache_capacity", self.pipeline_cache_capacity),
            (
                "bind_group_layout_cache_capacity",
                self.bind_group_layout_cache_capacity,
            ),
            ("sampler_cache_capacity", self.sampler_cache_capacity),
            ("stencil_cache_capacity", self.stencil_cache_capacity),
        ];

        for (name, value) in counts {
            if value == 0 {
                return Err(RenderError::InvalidConfig(format!("{} must not be zero", name)));
            }
        }

        if self.max_mesh_vertices < 3 {
            return Err(RenderError::InvalidConfig(
                "max_mesh_vertices must hold at least one triangle".to_string(),
            ));
        }

        if self.line_points_buffer_size < LINE_POINT_SIZE {
            return Err(RenderError::InvalidConfig(format!(
                "line_points_buffer_size must hold at least one point ({} bytes)",
                LINE_POINT_SIZE
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.max_sprite_instances, 131_072);
        assert_eq!(config.max_mesh_vertices, 393_216);
        assert_eq!(config.max_line_points(), 131_072);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = RenderConfig::default().with_sampler_cache_capacity(0);
        assert!(matches!(config.validate(), Err(RenderError::InvalidConfig(_))));

        let config = RenderConfig::default().with_max_mesh_vertices(2);
        assert!(config.validate().is_err());

        let config = RenderConfig::default().with_line_points_buffer_size(4);
        assert!(config.validate().is_err());
    }
}
