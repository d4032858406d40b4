use std::{hash::Hash, num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use pulse_test_utils::{GpuBindGroupLayout, GpuRenderPipeline, GpuSampler, RenderContext};

/// A GPU resource that must be handed back to the context explicitly.
pub trait Release {
    fn release(self, ctx: &dyn RenderContext);
}

impl Release for GpuSampler {
    fn release(self, ctx: &dyn RenderContext) {
        ctx.release_sampler(self);
    }
}

impl Release for GpuBindGroupLayout {
    fn release(self, ctx: &dyn RenderContext) {
        ctx.release_bind_group_layout(self);
    }
}

impl Release for GpuRenderPipeline {
    fn release(self, ctx: &dyn RenderContext) {
        ctx.release_render_pipeline(self);
    }
}

/// LRU cache of GPU resources.
///
/// Lookups promote the entry. Inserting into a full cache releases the least
/// recently used value synchronously, exactly once.
pub struct ResourceCache<K: Hash + Eq, V: Release> {
    ctx: Arc<dyn RenderContext>,
    entries: LruCache<K, V, ahash::RandomState>,
    label: &'static str,
}

impl<K: Hash + Eq + Clone + std::fmt::Debug, V: Release> ResourceCache<K, V> {
    pub fn new(ctx: Arc<dyn RenderContext>, label: &'static str, capacity: NonZeroUsize) -> Self {
        Self {
            ctx,
            entries: LruCache::with_hasher(capacity, ahash::RandomState::new()),
            label,
        }
    }

    /// Look up `key`, creating the value with `create` on a miss.
    ///
    /// A failed `create` leaves the cache untouched.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: &K,
        create: impl FnOnce(&dyn RenderContext) -> Result<V, E>,
    ) -> Result<&mut V, E> {
        if self.entries.contains(key) {
            tracing::trace!("{} cache hit for {:?}", self.label, key);
        } else {
            let value = create(&*self.ctx)?;

            if self.entries.len() == self.entries.cap().get() {
                if let Some((evicted_key, evicted)) = self.entries.pop_lru() {
                    tracing::trace!("{} cache evicting {:?}", self.label, evicted_key);
                    evicted.release(&*self.ctx);
                }
            }

            self.entries.put(key.clone(), value);
        }

        Ok(self
            .entries
            .get_mut(key)
            .expect("entry is present after lookup or insert"))
    }

    /// Infallible variant of [`get_or_try_insert_with`](Self::get_or_try_insert_with).
    pub fn get_or_insert_with(
        &mut self,
        key: &K,
        create: impl FnOnce(&dyn RenderContext) -> V,
    ) -> &mut V {
        match self.get_or_try_insert_with(key, |ctx| Ok::<_, std::convert::Infallible>(create(ctx))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Whether `key` is cached, without promoting it.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Release every cached value.
    pub fn clear(&mut self) {
        while let Some((_, value)) = self.entries.pop_lru() {
            value.release(&*self.ctx);
        }
    }
}

impl<K: Hash + Eq, V: Release> Drop for ResourceCache<K, V> {
    fn drop(&mut self) {
        while let Some((_, value)) = self.entries.pop_lru() {
            value.release(&*self.ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_test_utils::MockRenderContext;

    fn cache(mock: &Arc<MockRenderContext>, capacity: usize) -> ResourceCache<u32, GpuSampler> {
        ResourceCache::new(
            mock.clone(),
            "Test",
            NonZeroUsize::new(capacity).unwrap(),
        )
    }

    fn sampler(ctx: &dyn RenderContext) -> GpuSampler {
        ctx.create_sampler(&wgpu::SamplerDescriptor::default()).unwrap()
    }

    #[test]
    fn test_hit_returns_same_value() {
        let mock = Arc::new(MockRenderContext::new());
        let mut cache = cache(&mock, 2);

        let first = cache.get_or_insert_with(&1, sampler).clone();
        let second = cache.get_or_insert_with(&1, sampler).clone();

        assert_eq!(first, second);
        assert_eq!(mock.count_sampler_creates(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mock = Arc::new(MockRenderContext::new());
        let mut cache = cache(&mock, 2);

        let one = cache.get_or_insert_with(&1, sampler).clone();
        let two = cache.get_or_insert_with(&2, sampler).clone();

        // touch 1 so 2 becomes the eviction candidate
        cache.get_or_insert_with(&1, sampler);
        cache.get_or_insert_with(&3, sampler);

        assert_eq!(mock.released_samplers(), vec![two.id()]);
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert_eq!(cache.len(), 2);
        assert!(!mock.released_samplers().contains(&one.id()));
    }

    #[test]
    fn test_failed_create_leaves_cache_untouched() {
        let mock = Arc::new(MockRenderContext::new());
        let mut cache = cache(&mock, 1);
        cache.get_or_insert_with(&1, sampler);

        let result = cache.get_or_try_insert_with(&2, |_| Err("boom"));

        assert_eq!(result.err(), Some("boom"));
        assert!(cache.contains(&1));
        assert!(mock.released_samplers().is_empty());
    }

    #[test]
    fn test_drop_releases_everything() {
        let mock = Arc::new(MockRenderContext::new());
        {
            let mut cache = cache(&mock, 4);
            cache.get_or_insert_with(&1, sampler);
            cache.get_or_insert_with(&2, sampler);
        }
        assert_eq!(mock.released_samplers().len(), 2);
    }
}
