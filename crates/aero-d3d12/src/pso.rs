//! Pipeline state objects, deduplicated by a canonical description.
//!
//! The cache key replaces every shader with its content identity and the root signature with its
//! layout hash, so requests that differ only in where the bytecode lives map to the same pipeline.
//! With precise deduplication off, shaders are keyed by bytecode address instead.

use std::fmt;
use std::sync::Arc;

use crate::cache::{CacheStats, ContentCache};
use crate::config::PipelineCacheConfig;
use crate::device::PipelineDevice;
use crate::error::D3d12CacheError;
use crate::root_signature::RootSignature;
use crate::shader::{PipelineKind, ShaderBytecode, ShaderKey, ShaderStage};

/// `f32` stored by bit pattern so state descriptions can be hashed and compared exactly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FloatBits(pub u32);

impl FloatBits {
    pub fn new(v: f32) -> Self {
        Self(v.to_bits())
    }

    pub fn get(self) -> f32 {
        f32::from_bits(self.0)
    }
}

impl From<f32> for FloatBits {
    fn from(v: f32) -> Self {
        Self::new(v)
    }
}

impl fmt::Debug for FloatBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

/// Raw `D3D12_*` enum values are used for fixed-function state; the caches only hash them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBlend {
    pub blend_enable: bool,
    pub logic_op_enable: bool,
    pub src_blend: u32,
    pub dest_blend: u32,
    pub blend_op: u32,
    pub src_blend_alpha: u32,
    pub dest_blend_alpha: u32,
    pub blend_op_alpha: u32,
    pub logic_op: u32,
    pub write_mask: u8,
}

impl Default for RenderTargetBlend {
    fn default() -> Self {
        Self {
            blend_enable: false,
            logic_op_enable: false,
            src_blend: 2,  // D3D12_BLEND_ONE
            dest_blend: 1, // D3D12_BLEND_ZERO
            blend_op: 1,   // D3D12_BLEND_OP_ADD
            src_blend_alpha: 2,
            dest_blend_alpha: 1,
            blend_op_alpha: 1,
            logic_op: 4, // D3D12_LOGIC_OP_NOOP
            write_mask: 0xf,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendState {
    pub alpha_to_coverage_enable: bool,
    pub independent_blend_enable: bool,
    pub render_targets: [RenderTargetBlend; 8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub fill_mode: u32,
    pub cull_mode: u32,
    pub front_counter_clockwise: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: FloatBits,
    pub slope_scaled_depth_bias: FloatBits,
    pub depth_clip_enable: bool,
    pub multisample_enable: bool,
    pub antialiased_line_enable: bool,
    pub forced_sample_count: u32,
    pub conservative_raster: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            fill_mode: 3, // D3D12_FILL_MODE_SOLID
            cull_mode: 3, // D3D12_CULL_MODE_BACK
            front_counter_clockwise: false,
            depth_bias: 0,
            depth_bias_clamp: FloatBits::default(),
            slope_scaled_depth_bias: FloatBits::default(),
            depth_clip_enable: true,
            multisample_enable: false,
            antialiased_line_enable: false,
            forced_sample_count: 0,
            conservative_raster: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilOpDesc {
    pub fail_op: u32,
    pub depth_fail_op: u32,
    pub pass_op: u32,
    pub func: u32,
}

impl Default for StencilOpDesc {
    fn default() -> Self {
        Self {
            fail_op: 1, // D3D12_STENCIL_OP_KEEP
            depth_fail_op: 1,
            pass_op: 1,
            func: 8, // D3D12_COMPARISON_FUNC_ALWAYS
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_enable: bool,
    pub depth_write_enable: bool,
    pub depth_func: u32,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: StencilOpDesc,
    pub back_face: StencilOpDesc,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_enable: true,
            depth_write_enable: true,
            depth_func: 2, // D3D12_COMPARISON_FUNC_LESS
            stencil_enable: false,
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
            front_face: StencilOpDesc::default(),
            back_face: StencilOpDesc::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputElement {
    pub semantic_name: String,
    pub semantic_index: u32,
    /// `DXGI_FORMAT`
    pub format: u32,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
    pub per_instance: bool,
    pub instance_data_step_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleDesc {
    pub count: u32,
    pub quality: u32,
}

impl Default for SampleDesc {
    fn default() -> Self {
        Self {
            count: 1,
            quality: 0,
        }
    }
}

/// Everything in a graphics pipeline description except shaders and root signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphicsPipelineState {
    pub blend: BlendState,
    pub sample_mask: u32,
    pub rasterizer: RasterizerState,
    pub depth_stencil: DepthStencilState,
    pub input_layout: Vec<InputElement>,
    /// `D3D12_INDEX_BUFFER_STRIP_CUT_VALUE`
    pub strip_cut_value: u32,
    /// `D3D12_PRIMITIVE_TOPOLOGY_TYPE`
    pub primitive_topology_type: u32,
    /// `DXGI_FORMAT` per bound render target.
    pub rtv_formats: Vec<u32>,
    pub dsv_format: u32,
    pub sample_desc: SampleDesc,
    pub node_mask: u32,
}

impl Default for GraphicsPipelineState {
    fn default() -> Self {
        Self {
            blend: BlendState::default(),
            sample_mask: u32::MAX,
            rasterizer: RasterizerState::default(),
            depth_stencil: DepthStencilState::default(),
            input_layout: Vec::new(),
            strip_cut_value: 0,
            primitive_topology_type: 3, // D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE
            rtv_formats: Vec::new(),
            dsv_format: 0,
            sample_desc: SampleDesc::default(),
            node_mask: 0,
        }
    }
}

pub struct GraphicsPipelineInit<R> {
    pub root_signature: Arc<RootSignature<R>>,
    /// Indexed by [`ShaderStage::index`]. A vertex shader is required.
    pub shaders: [Option<ShaderBytecode>; 5],
    pub state: GraphicsPipelineState,
}

impl<R> GraphicsPipelineInit<R> {
    pub fn shader(&self, stage: ShaderStage) -> Option<&ShaderBytecode> {
        self.shaders.get(stage.index())?.as_ref()
    }
}

impl<R> fmt::Debug for GraphicsPipelineInit<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsPipelineInit")
            .field("root_signature", &self.root_signature)
            .field("shaders", &self.shaders)
            .field("state", &self.state)
            .finish()
    }
}

pub struct ComputePipelineInit<R> {
    pub root_signature: Arc<RootSignature<R>>,
    pub shader: ShaderBytecode,
    pub node_mask: u32,
}

impl<R> fmt::Debug for ComputePipelineInit<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputePipelineInit")
            .field("root_signature", &self.root_signature)
            .field("shader", &self.shader)
            .field("node_mask", &self.node_mask)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PipelineKey {
    Graphics {
        root_signature: u64,
        shaders: [Option<ShaderKey>; 5],
        state: GraphicsPipelineState,
    },
    Compute {
        root_signature: u64,
        shader: ShaderKey,
        node_mask: u32,
    },
}

impl PipelineKey {
    fn kind(&self) -> PipelineKind {
        match self {
            PipelineKey::Graphics { .. } => PipelineKind::Graphics,
            PipelineKey::Compute { .. } => PipelineKind::Compute,
        }
    }
}

/// A compiled pipeline state object.
pub struct Pipeline<P> {
    hash: u64,
    handle: P,
}

impl<P> Pipeline<P> {
    /// Key hash, tagged with the pipeline kind.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn kind(&self) -> PipelineKind {
        PipelineKind::from_tagged_hash(self.hash)
    }

    pub fn handle(&self) -> &P {
        &self.handle
    }
}

impl<P> fmt::Debug for Pipeline<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("hash", &format_args!("{:#018x}", self.hash))
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Graphics and compute pipelines share one map; the low bit of the key hash keeps them apart.
pub struct PsoCache<P> {
    pipelines: ContentCache<PipelineKey, Arc<Pipeline<P>>>,
    precise_dedup: bool,
}

impl<P> PsoCache<P> {
    pub fn new(config: &PipelineCacheConfig) -> Self {
        Self {
            pipelines: ContentCache::new("pipeline state", config.verify_collisions),
            precise_dedup: config.precise_dedup,
        }
    }

    #[cfg(test)]
    fn with_hasher(config: &PipelineCacheConfig, hasher: fn(&PipelineKey) -> u64) -> Self {
        Self {
            pipelines: ContentCache::with_hasher(
                "pipeline state",
                config.verify_collisions,
                hasher,
            ),
            precise_dedup: config.precise_dedup,
        }
    }

    pub fn get_or_create_graphics<D>(
        &mut self,
        device: &D,
        init: &GraphicsPipelineInit<D::RootSignature>,
    ) -> Result<Arc<Pipeline<P>>, D3d12CacheError>
    where
        D: PipelineDevice<PipelineState = P>,
    {
        if init.shader(ShaderStage::Vertex).is_none() {
            return Err(D3d12CacheError::MissingShader(ShaderStage::Vertex));
        }
        for (expected, shader) in ShaderStage::GRAPHICS.into_iter().zip(&init.shaders) {
            if let Some(shader) = shader {
                check_stage(expected, shader)?;
            }
        }

        let key = PipelineKey::Graphics {
            root_signature: init.root_signature.hash(),
            shaders: init
                .shaders
                .each_ref()
                .map(|s| s.as_ref().map(|s| s.key(self.precise_dedup))),
            state: init.state.clone(),
        };
        self.get_or_insert(key, || {
            device.create_graphics_pipeline(init).map_err(|err| {
                tracing::error!(%err, "failed to create graphics pipeline");
                D3d12CacheError::PipelineCreate(err)
            })
        })
    }

    pub fn get_or_create_compute<D>(
        &mut self,
        device: &D,
        init: &ComputePipelineInit<D::RootSignature>,
    ) -> Result<Arc<Pipeline<P>>, D3d12CacheError>
    where
        D: PipelineDevice<PipelineState = P>,
    {
        check_stage(ShaderStage::Compute, &init.shader)?;

        let key = PipelineKey::Compute {
            root_signature: init.root_signature.hash(),
            shader: init.shader.key(self.precise_dedup),
            node_mask: init.node_mask,
        };
        self.get_or_insert(key, || {
            device.create_compute_pipeline(init).map_err(|err| {
                tracing::error!(%err, "failed to create compute pipeline");
                D3d12CacheError::PipelineCreate(err)
            })
        })
    }

    fn get_or_insert(
        &mut self,
        key: PipelineKey,
        create: impl FnOnce() -> Result<P, D3d12CacheError>,
    ) -> Result<Arc<Pipeline<P>>, D3d12CacheError> {
        let kind = key.kind();
        let hash = kind.tag_hash(self.pipelines.hash_key(&key));
        self.pipelines.get_or_try_insert_with(hash, key, |_| {
            let handle = create()?;
            tracing::debug!(hash, ?kind, "created pipeline state");
            Ok(Arc::new(Pipeline { hash, handle }))
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.pipelines.stats()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl<P> fmt::Debug for PsoCache<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PsoCache")
            .field("pipelines", &self.pipelines)
            .field("precise_dedup", &self.precise_dedup)
            .finish()
    }
}

fn check_stage(expected: ShaderStage, shader: &ShaderBytecode) -> Result<(), D3d12CacheError> {
    if shader.stage() != expected {
        return Err(D3d12CacheError::StageMismatch {
            expected,
            found: shader.stage(),
        });
    }
    Ok(())
}
