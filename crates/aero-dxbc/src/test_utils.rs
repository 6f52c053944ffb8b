use crate::rdef::input_type;
use crate::{write_container, FourCC};

/// Shader model 5.0 vertex shader target token.
pub const TARGET_VS_5_0: u32 = 0xFFFE_0500;
/// Shader model 5.0 pixel shader target token.
pub const TARGET_PS_5_0: u32 = 0xFFFF_0500;
/// Shader model 5.0 compute shader target token.
pub const TARGET_CS_5_0: u32 = 0x4353_0500;
/// Shader model 5.1 pixel shader target token (40-byte binding entries).
pub const TARGET_PS_5_1: u32 = 0xFFFF_0501;

/// One bound resource to emit in a synthetic RDEF chunk.
#[derive(Debug, Clone)]
pub struct TestBinding {
    pub name: &'static str,
    pub input_type: u32,
    pub dimension: u32,
    pub bind_point: u32,
    pub bind_count: u32,
    pub flags: u32,
    pub space: u32,
}

impl TestBinding {
    pub fn new(name: &'static str, input_type: u32, bind_point: u32, bind_count: u32) -> Self {
        Self {
            name,
            input_type,
            dimension: 0,
            bind_point,
            bind_count,
            flags: 0,
            space: 0,
        }
    }

    pub fn cbuffer(name: &'static str, bind_point: u32) -> Self {
        Self::new(name, input_type::CBUFFER, bind_point, 1)
    }

    pub fn texture(name: &'static str, bind_point: u32) -> Self {
        Self {
            dimension: 4, // D3D_SRV_DIMENSION_TEXTURE2D
            ..Self::new(name, input_type::TEXTURE, bind_point, 1)
        }
    }

    pub fn sampler(name: &'static str, bind_point: u32) -> Self {
        Self::new(name, input_type::SAMPLER, bind_point, 1)
    }

    pub fn uav(name: &'static str, bind_point: u32) -> Self {
        Self::new(name, input_type::UAV_RWTYPED, bind_point, 1)
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_space(mut self, space: u32) -> Self {
        self.space = space;
        self
    }
}

/// Builds an RDEF chunk payload with the given target token and bound resources.
///
/// Binding entries use the 40-byte layout for shader model 5.1+ targets and the 32-byte layout
/// otherwise, matching what the parser expects. No constant buffer descriptors are emitted.
pub fn build_rdef_chunk(target: u32, bindings: &[TestBinding]) -> Vec<u8> {
    const HEADER_LEN: usize = 28;
    let sm51 = {
        let major = (target >> 8) & 0xff;
        let minor = target & 0xff;
        major > 5 || (major == 5 && minor >= 1)
    };
    let entry_len = if sm51 { 40 } else { 32 };
    let strings_start = HEADER_LEN + entry_len * bindings.len();

    let mut strings = Vec::new();
    let mut name_offsets = Vec::with_capacity(bindings.len());
    for binding in bindings {
        name_offsets.push((strings_start + strings.len()) as u32);
        strings.extend_from_slice(binding.name.as_bytes());
        strings.push(0);
    }

    let mut out = Vec::with_capacity(strings_start + strings.len());
    for v in [
        0,
        0,
        bindings.len() as u32,
        HEADER_LEN as u32,
        target,
        0,
        0,
    ] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for (binding, name_offset) in bindings.iter().zip(name_offsets) {
        for v in [
            name_offset,
            binding.input_type,
            0, // return type
            binding.dimension,
            0, // num samples
            binding.bind_point,
            binding.bind_count,
            binding.flags,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        if sm51 {
            out.extend_from_slice(&binding.space.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes()); // range id
        }
    }
    out.extend_from_slice(&strings);
    out
}

/// Builds a complete shader container with an RDEF chunk and a placeholder `SHEX` chunk.
///
/// `body` distinguishes otherwise-identical shaders so their content hashes differ.
pub fn build_shader(target: u32, bindings: &[TestBinding], body: &[u8]) -> Vec<u8> {
    let rdef = build_rdef_chunk(target, bindings);
    write_container(&[(FourCC::RDEF, &rdef), (FourCC::SHEX, body)])
}
