//! `aero-d3d12` deduplicates D3D12 root signatures and pipeline state objects.
//!
//! Currently this crate provides:
//! - Shader reflection from `DXBC` containers into per-class register ranges
//!   (see [`ShaderStageBinding`]).
//! - A root-signature layout planner (see [`ResourceMappings`]) and a version 1.0 blob
//!   serializer (see [`rts0`]).
//! - A two-level root signature cache keyed by shader combination and by layout
//!   (see [`RootSignatureCache`]).
//! - A pipeline state cache keyed by a canonical, relocation-independent description
//!   (see [`PsoCache`]).
//!
//! Device object creation goes through the [`PipelineDevice`] trait.

mod context;
mod device;
mod error;

pub mod bind_range;
pub mod cache;
pub mod config;
pub mod pso;
pub mod reflection;
pub mod resource_mapping;
pub mod root_signature;
pub mod rts0;
pub mod shader;

pub use bind_range::{BindRange, BindRangeSet, ResourceClass};
pub use cache::{CacheStats, ContentCache};
pub use config::{PipelineCacheConfig, RangeMergePolicy, ReflectionConfig};
pub use context::{D3d12PipelineContext, PipelineContextStats};
pub use device::PipelineDevice;
pub use error::{CacheError, D3d12CacheError, DeviceError, MappingError, ReflectionError};
pub use pso::{
    ComputePipelineInit, GraphicsPipelineInit, GraphicsPipelineState, Pipeline, PsoCache,
};
pub use reflection::{ResourceRanges, ShaderStageBinding};
pub use resource_mapping::{
    ResourceMappingBuilder, ResourceMappings, RootParameter, ShaderVisibility,
};
pub use root_signature::{
    RootSignature, RootSignatureCache, RootSignatureInit, RootSignatureShaders,
};
pub use rts0::{serialize_root_signature, RootSignatureDesc, RootSignatureFlags};
pub use shader::{content_hash, PipelineKind, ShaderBytecode, ShaderId, ShaderStage};
