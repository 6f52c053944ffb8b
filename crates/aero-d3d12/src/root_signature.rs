//! Two-level root signature cache.
//!
//! The first level is keyed by the shader combination and answers repeated requests for the same
//! shaders without re-planning. On a miss the layout is planned and looked up in the second level,
//! keyed by the planned layout itself, so different shader combinations with identical bindings
//! share one device object.

use std::fmt;
use std::sync::Arc;

use crate::cache::{stable_hash64, CacheStats, ContentCache};
use crate::config::{PipelineCacheConfig, RangeMergePolicy};
use crate::device::PipelineDevice;
use crate::error::D3d12CacheError;
use crate::reflection::{ResourceRanges, ShaderStageBinding};
use crate::resource_mapping::ResourceMappings;
use crate::rts0::{RootSignatureDesc, RootSignatureFlags};
use crate::shader::{PipelineKind, ShaderKey, ShaderStage};

/// Shaders a root signature is built for.
#[derive(Debug, Clone, Copy)]
pub enum RootSignatureShaders<'a> {
    /// Indexed by [`ShaderStage::index`]: vertex, hull, domain, geometry, pixel.
    Graphics([Option<&'a ShaderStageBinding>; 5]),
    Compute(&'a ShaderStageBinding),
}

impl RootSignatureShaders<'_> {
    pub fn kind(&self) -> PipelineKind {
        match self {
            RootSignatureShaders::Graphics(_) => PipelineKind::Graphics,
            RootSignatureShaders::Compute(_) => PipelineKind::Compute,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RootSignatureInit<'a> {
    pub shaders: RootSignatureShaders<'a>,
    pub node_mask: u32,
}

impl<'a> RootSignatureInit<'a> {
    pub fn graphics(shaders: [Option<&'a ShaderStageBinding>; 5], node_mask: u32) -> Self {
        Self {
            shaders: RootSignatureShaders::Graphics(shaders),
            node_mask,
        }
    }

    pub fn compute(shader: &'a ShaderStageBinding, node_mask: u32) -> Self {
        Self {
            shaders: RootSignatureShaders::Compute(shader),
            node_mask,
        }
    }

    /// Present shaders in stage order, checked against the slot they occupy.
    fn stages(&self) -> Result<Vec<(ShaderStage, &'a ShaderStageBinding)>, D3d12CacheError> {
        let slots: Vec<(ShaderStage, &'a ShaderStageBinding)> = match self.shaders {
            RootSignatureShaders::Graphics(shaders) => ShaderStage::GRAPHICS
                .into_iter()
                .zip(shaders)
                .filter_map(|(stage, shader)| Some((stage, shader?)))
                .collect(),
            RootSignatureShaders::Compute(shader) => vec![(ShaderStage::Compute, shader)],
        };
        for &(expected, shader) in &slots {
            if shader.stage() != expected {
                return Err(D3d12CacheError::StageMismatch {
                    expected,
                    found: shader.stage(),
                });
            }
        }
        Ok(slots)
    }

    /// Plans the layout and flags for these shaders.
    pub fn plan(
        &self,
        policy: &RangeMergePolicy,
    ) -> Result<(ResourceMappings, RootSignatureFlags), D3d12CacheError> {
        let stages = self.stages()?;
        let ranges: Vec<(ShaderStage, &ResourceRanges)> = stages
            .iter()
            .map(|&(stage, shader)| (stage, shader.ranges()))
            .collect();
        let mappings = ResourceMappings::build(&ranges, policy)?;
        let flags = match self.shaders {
            RootSignatureShaders::Graphics(shaders) => {
                RootSignatureFlags::graphics(|stage| shaders[stage.index()].is_some())
            }
            RootSignatureShaders::Compute(_) => RootSignatureFlags::empty(),
        };
        Ok((mappings, flags))
    }
}

/// A compiled root signature together with the layout it was built from.
pub struct RootSignature<R> {
    hash: u64,
    mappings: ResourceMappings,
    flags: RootSignatureFlags,
    node_mask: u32,
    handle: R,
}

impl<R> RootSignature<R> {
    /// Layout hash, tagged with the pipeline kind. Identifies this root signature within its
    /// cache.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn kind(&self) -> PipelineKind {
        PipelineKind::from_tagged_hash(self.hash)
    }

    pub fn mappings(&self) -> &ResourceMappings {
        &self.mappings
    }

    pub fn flags(&self) -> RootSignatureFlags {
        self.flags
    }

    pub fn node_mask(&self) -> u32 {
        self.node_mask
    }

    pub fn handle(&self) -> &R {
        &self.handle
    }
}

impl<R> fmt::Debug for RootSignature<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSignature")
            .field("hash", &format_args!("{:#018x}", self.hash))
            .field("root_parameters", &self.mappings.root_parameters().len())
            .field("flags", &self.flags)
            .field("node_mask", &self.node_mask)
            .finish_non_exhaustive()
    }
}

/// One shader of a combination. The same bytecode can carry different ranges (another
/// `ReflectionConfig`, or a hand-built binding), so the ranges are part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StageKey {
    shader: ShaderKey,
    ranges: u64,
}

impl StageKey {
    fn new(binding: &ShaderStageBinding, precise: bool) -> Self {
        Self {
            shader: binding.bytecode().key(precise),
            ranges: stable_hash64(binding.ranges()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ShaderCombinationKey {
    Graphics {
        shaders: [Option<StageKey>; 5],
        node_mask: u32,
    },
    Compute {
        shader: StageKey,
        node_mask: u32,
    },
}

impl ShaderCombinationKey {
    fn new(init: &RootSignatureInit<'_>, precise: bool) -> Self {
        match init.shaders {
            RootSignatureShaders::Graphics(shaders) => ShaderCombinationKey::Graphics {
                shaders: shaders.map(|s| s.map(|s| StageKey::new(s, precise))),
                node_mask: init.node_mask,
            },
            RootSignatureShaders::Compute(shader) => ShaderCombinationKey::Compute {
                shader: StageKey::new(shader, precise),
                node_mask: init.node_mask,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LayoutKey {
    mappings: ResourceMappings,
    flags: RootSignatureFlags,
    node_mask: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RootSignatureCacheStats {
    pub by_shaders: CacheStats,
    pub by_layout: CacheStats,
}

pub struct RootSignatureCache<R> {
    by_shaders: ContentCache<ShaderCombinationKey, Arc<RootSignature<R>>>,
    by_layout: ContentCache<LayoutKey, Arc<RootSignature<R>>>,
    precise_dedup: bool,
    merge: RangeMergePolicy,
}

impl<R> RootSignatureCache<R> {
    pub fn new(config: &PipelineCacheConfig) -> Self {
        Self {
            by_shaders: ContentCache::new("root signature (shaders)", config.verify_collisions),
            by_layout: ContentCache::new("root signature (layout)", config.verify_collisions),
            precise_dedup: config.precise_dedup,
            merge: config.merge,
        }
    }

    /// Returns the root signature for `init`, creating it on the device if no shader combination
    /// with the same layout has been seen.
    ///
    /// Failures are not cached: the same request fails again on the next call.
    pub fn get_or_create<D>(
        &mut self,
        device: &D,
        init: &RootSignatureInit<'_>,
    ) -> Result<Arc<RootSignature<R>>, D3d12CacheError>
    where
        D: PipelineDevice<RootSignature = R>,
    {
        let kind = init.shaders.kind();
        let key = ShaderCombinationKey::new(init, self.precise_dedup);
        let hash = kind.tag_hash(self.by_shaders.hash_key(&key));

        let by_layout = &mut self.by_layout;
        let merge = self.merge;
        self.by_shaders.get_or_try_insert_with(hash, key, |_| {
            let (mappings, flags) = init.plan(&merge)?;
            let key = LayoutKey {
                mappings,
                flags,
                node_mask: init.node_mask,
            };
            let hash = kind.tag_hash(by_layout.hash_key(&key));
            by_layout.get_or_try_insert_with(hash, key, |key| create(device, hash, key))
        })
    }

    pub fn stats(&self) -> RootSignatureCacheStats {
        RootSignatureCacheStats {
            by_shaders: self.by_shaders.stats(),
            by_layout: self.by_layout.stats(),
        }
    }

    /// Number of distinct root signatures created.
    pub fn len(&self) -> usize {
        self.by_layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_layout.is_empty()
    }
}

impl<R> fmt::Debug for RootSignatureCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSignatureCache")
            .field("by_shaders", &self.by_shaders)
            .field("by_layout", &self.by_layout)
            .field("precise_dedup", &self.precise_dedup)
            .finish_non_exhaustive()
    }
}

fn create<D: PipelineDevice>(
    device: &D,
    hash: u64,
    key: &LayoutKey,
) -> Result<Arc<RootSignature<D::RootSignature>>, D3d12CacheError> {
    let desc = RootSignatureDesc {
        mappings: key.mappings.clone(),
        flags: key.flags,
    };
    let blob = device.serialize_root_signature(&desc).map_err(|err| {
        tracing::error!(hash, %err, "failed to serialize root signature");
        D3d12CacheError::RootSignatureSerialize(err)
    })?;
    let handle = device
        .create_root_signature(key.node_mask, &blob)
        .map_err(|err| {
            tracing::error!(hash, %err, "failed to create root signature");
            D3d12CacheError::RootSignatureCreate(err)
        })?;

    tracing::debug!(
        hash,
        root_parameters = desc.mappings.root_parameters().len(),
        descriptor_tables = desc.mappings.descriptor_tables().len(),
        blob_len = blob.len(),
        "created root signature"
    );

    Ok(Arc::new(RootSignature {
        hash,
        mappings: desc.mappings,
        flags: desc.flags,
        node_mask: key.node_mask,
        handle,
    }))
}
