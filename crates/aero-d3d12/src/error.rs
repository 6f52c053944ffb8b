use aero_dxbc::DxbcError;
use thiserror::Error;

use crate::shader::ShaderStage;

/// Failure reported by the device layer when serializing or creating an object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (hr={hresult:#010x})")]
pub struct DeviceError {
    /// `HRESULT` returned by the device call.
    pub hresult: u32,
    pub message: String,
}

impl DeviceError {
    /// `E_INVALIDARG`
    pub const E_INVALIDARG: u32 = 0x8007_0057;
    /// `E_OUTOFMEMORY`
    pub const E_OUTOFMEMORY: u32 = 0x8007_000E;

    pub fn new(hresult: u32, message: impl Into<String>) -> Self {
        Self {
            hresult,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReflectionError {
    #[error(transparent)]
    Dxbc(#[from] DxbcError),
    #[error("shader container has no RDEF chunk")]
    MissingRdef,
    #[error("unknown shader program type in RDEF target {target:#010x}")]
    UnknownProgramType { target: u32 },
    #[error("resource {name:?} uses register space {space}; only space 0 is supported")]
    UnsupportedRegisterSpace { name: String, space: u32 },
    #[error("resource {name:?} is an unbounded array")]
    UnboundedArray { name: String },
    #[error("resource {name:?} registers {bind_point}+{bind_count} run past the register space")]
    RegisterOverflow {
        name: String,
        bind_point: u32,
        bind_count: u32,
    },
    #[error("resource {name:?} has unknown input type {input_type}")]
    UnknownInputType { name: String, input_type: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("root signature layout exceeds {max} {what}")]
    CapacityExceeded { what: &'static str, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("{cache} cache: hash {hash:#018x} maps to a different key")]
    HashCollision { cache: &'static str, hash: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum D3d12CacheError {
    #[error("shader reflection failed: {0}")]
    Reflection(#[from] ReflectionError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Collision(#[from] CacheError),
    #[error("shader stage mismatch: slot expects {expected:?}, shader is {found:?}")]
    StageMismatch {
        expected: ShaderStage,
        found: ShaderStage,
    },
    #[error("pipeline is missing a {0:?} shader")]
    MissingShader(ShaderStage),
    #[error("root signature serialization failed: {0}")]
    RootSignatureSerialize(DeviceError),
    #[error("root signature creation failed: {0}")]
    RootSignatureCreate(DeviceError),
    #[error("pipeline state creation failed: {0}")]
    PipelineCreate(DeviceError),
}
