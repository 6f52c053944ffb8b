use std::sync::Arc;

use crate::cache::CacheStats;
use crate::config::{PipelineCacheConfig, ReflectionConfig};
use crate::device::PipelineDevice;
use crate::error::D3d12CacheError;
use crate::pso::{ComputePipelineInit, GraphicsPipelineInit, Pipeline, PsoCache};
use crate::reflection::ShaderStageBinding;
use crate::root_signature::{
    RootSignature, RootSignatureCache, RootSignatureCacheStats, RootSignatureInit,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineContextStats {
    pub root_signatures: RootSignatureCacheStats,
    pub pipelines: CacheStats,
}

/// Owns a [`PipelineDevice`] and the root signature and pipeline caches built on it.
///
/// Cached objects belong to the device that created them. [`Self::replace_device`] drops both
/// caches so objects from a lost device are never handed out again; entries are not evicted
/// otherwise.
///
/// All cache operations take `&mut self`: callers sharing a context across threads must
/// serialize access themselves (e.g. behind a `Mutex`).
pub struct D3d12PipelineContext<D: PipelineDevice> {
    device: D,
    config: PipelineCacheConfig,
    reflection: ReflectionConfig,
    root_signatures: RootSignatureCache<D::RootSignature>,
    pipelines: PsoCache<D::PipelineState>,
}

impl<D: PipelineDevice> D3d12PipelineContext<D> {
    pub fn new(device: D, config: PipelineCacheConfig, reflection: ReflectionConfig) -> Self {
        Self {
            root_signatures: RootSignatureCache::new(&config),
            pipelines: PsoCache::new(&config),
            device,
            config,
            reflection,
        }
    }

    /// Configuration read from the environment.
    pub fn from_env(device: D) -> Self {
        Self::new(
            device,
            PipelineCacheConfig::from_env(),
            ReflectionConfig::from_env(),
        )
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn config(&self) -> &PipelineCacheConfig {
        &self.config
    }

    pub fn reflection_config(&self) -> &ReflectionConfig {
        &self.reflection
    }

    /// Reflects a compiled shader with this context's reflection settings.
    pub fn reflect_shader(
        &self,
        bytecode: impl Into<Arc<[u8]>>,
    ) -> Result<ShaderStageBinding, D3d12CacheError> {
        Ok(ShaderStageBinding::from_dxbc(bytecode, &self.reflection)?)
    }

    pub fn get_or_create_root_signature(
        &mut self,
        init: &RootSignatureInit<'_>,
    ) -> Result<Arc<RootSignature<D::RootSignature>>, D3d12CacheError> {
        self.root_signatures.get_or_create(&self.device, init)
    }

    pub fn get_or_create_graphics_pipeline(
        &mut self,
        init: &GraphicsPipelineInit<D::RootSignature>,
    ) -> Result<Arc<Pipeline<D::PipelineState>>, D3d12CacheError> {
        self.pipelines.get_or_create_graphics(&self.device, init)
    }

    pub fn get_or_create_compute_pipeline(
        &mut self,
        init: &ComputePipelineInit<D::RootSignature>,
    ) -> Result<Arc<Pipeline<D::PipelineState>>, D3d12CacheError> {
        self.pipelines.get_or_create_compute(&self.device, init)
    }

    /// Swaps in a new device (e.g. after device removal) and returns the old one.
    pub fn replace_device(&mut self, device: D) -> D {
        let old = std::mem::replace(&mut self.device, device);

        // Root signatures and pipelines are tied to the old device.
        self.root_signatures = RootSignatureCache::new(&self.config);
        self.pipelines = PsoCache::new(&self.config);
        tracing::debug!("replaced device; pipeline caches cleared");
        old
    }

    pub fn stats(&self) -> PipelineContextStats {
        PipelineContextStats {
            root_signatures: self.root_signatures.stats(),
            pipelines: self.pipelines.stats(),
        }
    }
}
