use std::{fmt::Debug, hash::Hash, num::NonZeroUsize, sync::Arc};

use pulse_core::profiling::profile_function;
use pulse_test_utils::{GpuBindGroupLayout, GpuError, GpuRenderPipeline, RenderContext};

use super::{Release, ResourceCache};
use crate::error::{RenderError, RenderResult};

/// Everything that decides which render pipeline a batch needs.
///
/// Two equal configs must specialize to interchangeable pipelines.
pub trait PipelineConfig: Clone + Eq + Hash + Debug {
    /// Human readable name, used in logs and errors.
    fn label(&self) -> String;

    /// Build the pipeline for this configuration.
    fn specialize(&self, ctx: &dyn RenderContext) -> Result<GpuRenderPipeline, GpuError>;
}

/// A specialized pipeline plus the bind group layouts fetched from it.
pub struct CachedPipeline {
    pipeline: GpuRenderPipeline,
    layouts: ResourceCache<u32, GpuBindGroupLayout>,
}

impl CachedPipeline {
    pub fn pipeline(&self) -> &GpuRenderPipeline {
        &self.pipeline
    }

    /// The layout of bind group `index`, derived from the shader.
    pub fn bind_group_layout(&mut self, index: u32) -> GpuBindGroupLayout {
        let pipeline = &self.pipeline;
        self.layouts
            .get_or_insert_with(&index, |ctx| ctx.get_bind_group_layout(pipeline, index))
            .clone()
    }
}

impl Release for CachedPipeline {
    fn release(self, ctx: &dyn RenderContext) {
        let CachedPipeline {
            pipeline,
            mut layouts,
        } = self;

        // layouts go before the pipeline they came from
        layouts.clear();
        drop(layouts);
        pipeline.release(ctx);
    }
}

/// LRU cache of specialized pipelines for one config type.
pub struct PipelineCache<C: PipelineConfig> {
    ctx: Arc<dyn RenderContext>,
    pipelines: ResourceCache<C, CachedPipeline>,
    layout_capacity: NonZeroUsize,
    created: u64,
}

impl<C: PipelineConfig> PipelineCache<C> {
    pub fn new(
        ctx: Arc<dyn RenderContext>,
        capacity: NonZeroUsize,
        layout_capacity: NonZeroUsize,
    ) -> Self {
        Self {
            pipelines: ResourceCache::new(ctx.clone(), "Pipeline", capacity),
            ctx,
            layout_capacity,
            created: 0,
        }
    }

    /// Get the pipeline for `config`, specializing it on a miss.
    ///
    /// Specialization failures are not cached; the next call tries again.
    pub fn get(&mut self, config: &C) -> RenderResult<&mut CachedPipeline> {
        profile_function!();

        let ctx = &self.ctx;
        let created = &mut self.created;
        let layout_capacity = self.layout_capacity;

        self.pipelines.get_or_try_insert_with(config, |device| {
            let label = config.label();
            tracing::info!("Creating render pipeline {}", label);

            let pipeline = config
                .specialize(device)
                .map_err(|source| RenderError::PipelineSpecialization { label, source })?;
            *created += 1;

            Ok(CachedPipeline {
                pipeline,
                layouts: ResourceCache::new(ctx.clone(), "BindGroupLayout", layout_capacity),
            })
        })
    }

    /// Whether `config` is cached, without promoting it.
    pub fn contains(&self, config: &C) -> bool {
        self.pipelines.contains(config)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Number of pipelines specialized since creation.
    pub fn created_count(&self) -> u64 {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_test_utils::{MockRenderContext, RenderPipelineSpec};

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct TestConfig(u32);

    impl PipelineConfig for TestConfig {
        fn label(&self) -> String {
            format!("Test.{}", self.0)
        }

        fn specialize(&self, ctx: &dyn RenderContext) -> Result<GpuRenderPipeline, GpuError> {
            ctx.create_render_pipeline(&RenderPipelineSpec {
                label: self.label(),
                shader_source: format!("// shader {}", self.0),
                vertex_entry: "vs_main",
                fragment_entry: "fs_main",
                vertex_buffers: Vec::new(),
                color_target: wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                sample_count: 1,
            })
        }
    }

    fn cache(mock: &Arc<MockRenderContext>) -> PipelineCache<TestConfig> {
        PipelineCache::new(
            mock.clone(),
            NonZeroUsize::new(16).unwrap(),
            NonZeroUsize::new(16).unwrap(),
        )
    }

    #[test]
    fn test_same_config_specializes_once() {
        let mock = Arc::new(MockRenderContext::new());
        let mut cache = cache(&mock);

        let first = cache.get(&TestConfig(1)).unwrap().pipeline().clone();
        let second = cache.get(&TestConfig(1)).unwrap().pipeline().clone();

        assert_eq!(first, second);
        assert_eq!(mock.count_render_pipeline_creates(), 1);
        assert_eq!(cache.created_count(), 1);
    }

    #[test]
    fn test_bind_group_layouts_are_cached() {
        let mock = Arc::new(MockRenderContext::new());
        let mut cache = cache(&mock);

        let cached = cache.get(&TestConfig(1)).unwrap();
        let a = cached.bind_group_layout(0);
        let b = cached.bind_group_layout(0);
        cached.bind_group_layout(1);

        assert_eq!(a, b);
        assert_eq!(mock.count_bind_group_layout_fetches(), 2);
    }

    #[test]
    fn test_eviction_releases_layouts_then_pipeline() {
        let mock = Arc::new(MockRenderContext::new());
        let mut cache = cache(&mock);

        let cached = cache.get(&TestConfig(0)).unwrap();
        let victim = cached.pipeline().clone();
        let layout = cached.bind_group_layout(0);

        for i in 1..=16 {
            cache.get(&TestConfig(i)).unwrap();
        }

        assert_eq!(cache.len(), 16);
        assert!(!cache.contains(&TestConfig(0)));
        assert_eq!(mock.released_pipelines(), vec![victim.id()]);
        assert_eq!(mock.released_bind_group_layouts(), vec![layout.id()]);

        let calls = mock.calls();
        let layout_release = calls.iter().position(|c| {
            matches!(c, pulse_test_utils::RenderCall::ReleaseBindGroupLayout { .. })
        });
        let pipeline_release = calls.iter().position(|c| {
            matches!(c, pulse_test_utils::RenderCall::ReleaseRenderPipeline { .. })
        });
        assert!(layout_release < pipeline_release);
    }

    #[test]
    fn test_specialization_failure_propagates() {
        let mock = Arc::new(MockRenderContext::new());
        mock.fail_shaders_containing("shader 7");
        let mut cache = cache(&mock);

        let err = cache.get(&TestConfig(7)).err().unwrap();
        assert!(matches!(
            err,
            RenderError::PipelineSpecialization { ref label, .. } if label == "Test.7"
        ));
        assert!(cache.is_empty());
        assert_eq!(cache.created_count(), 0);
    }
}
