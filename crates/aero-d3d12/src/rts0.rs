//! Version 1.0 root signature blobs (`RTS0` chunk in a `DXBC` container).

use aero_dxbc::{write_container, FourCC};
use bitflags::bitflags;

use crate::resource_mapping::{ResourceMappings, RootParameter};
use crate::shader::ShaderStage;

bitflags! {
    /// `D3D12_ROOT_SIGNATURE_FLAGS`
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct RootSignatureFlags: u32 {
        const ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT = 0x1;
        const DENY_VERTEX_SHADER_ROOT_ACCESS = 0x2;
        const DENY_HULL_SHADER_ROOT_ACCESS = 0x4;
        const DENY_DOMAIN_SHADER_ROOT_ACCESS = 0x8;
        const DENY_GEOMETRY_SHADER_ROOT_ACCESS = 0x10;
        const DENY_PIXEL_SHADER_ROOT_ACCESS = 0x20;
    }
}

impl RootSignatureFlags {
    /// Input assembler enabled, root access denied to every graphics stage without a shader.
    pub fn graphics(present: impl Fn(ShaderStage) -> bool) -> Self {
        let mut flags = Self::ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT;
        for stage in ShaderStage::GRAPHICS {
            if !present(stage) {
                flags |= Self::deny_root_access(stage);
            }
        }
        flags
    }

    fn deny_root_access(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => Self::DENY_VERTEX_SHADER_ROOT_ACCESS,
            ShaderStage::Hull => Self::DENY_HULL_SHADER_ROOT_ACCESS,
            ShaderStage::Domain => Self::DENY_DOMAIN_SHADER_ROOT_ACCESS,
            ShaderStage::Geometry => Self::DENY_GEOMETRY_SHADER_ROOT_ACCESS,
            ShaderStage::Pixel => Self::DENY_PIXEL_SHADER_ROOT_ACCESS,
            ShaderStage::Compute => Self::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootSignatureDesc {
    pub mappings: ResourceMappings,
    pub flags: RootSignatureFlags,
}

pub const ROOT_SIGNATURE_VERSION_1_0: u32 = 1;

const HEADER_LEN: u32 = 24;
const PARAMETER_LEN: u32 = 12;
const TABLE_LEN: u32 = 8;
const RANGE_LEN: u32 = 20;
const ROOT_DESCRIPTOR_LEN: u32 = 8;

/// `D3D12_ROOT_PARAMETER_TYPE`
mod parameter_type {
    pub const DESCRIPTOR_TABLE: u32 = 0;
    pub const CBV: u32 = 2;
    pub const SRV: u32 = 3;
    pub const UAV: u32 = 4;
}

/// Serializes `desc` into a container holding a single `RTS0` chunk. No static samplers.
///
/// All offsets inside the chunk are relative to the start of the chunk payload.
pub fn serialize_root_signature(desc: &RootSignatureDesc) -> Vec<u8> {
    let m = &desc.mappings;
    let params = m.root_parameters();

    let mut payload_offset = HEADER_LEN + PARAMETER_LEN * params.len() as u32;
    let mut headers = Vec::with_capacity(params.len() * PARAMETER_LEN as usize);
    let mut payloads = Vec::new();

    for param in params {
        let (ty, register) = match *param {
            RootParameter::DescriptorTable { .. } => (parameter_type::DESCRIPTOR_TABLE, 0),
            RootParameter::ConstantBufferView { register, .. } => (parameter_type::CBV, register),
            RootParameter::ShaderResourceView { register, .. } => (parameter_type::SRV, register),
            RootParameter::UnorderedAccessView { register, .. } => (parameter_type::UAV, register),
        };
        push_u32s(
            &mut headers,
            &[ty, param.visibility() as u32, payload_offset],
        );

        if param.is_descriptor_table() {
            let ranges = m.table_ranges(param);
            let ranges_offset = payload_offset + TABLE_LEN;
            push_u32s(&mut payloads, &[ranges.len() as u32, ranges_offset]);
            for range in ranges {
                push_u32s(
                    &mut payloads,
                    &[
                        range.range_type as u32,
                        range.num_descriptors,
                        range.base_register,
                        range.register_space,
                        range.offset_in_table,
                    ],
                );
            }
            payload_offset = ranges_offset + RANGE_LEN * ranges.len() as u32;
        } else {
            push_u32s(&mut payloads, &[register, 0]);
            payload_offset += ROOT_DESCRIPTOR_LEN;
        }
    }

    let mut chunk = Vec::with_capacity(payload_offset as usize);
    push_u32s(
        &mut chunk,
        &[
            ROOT_SIGNATURE_VERSION_1_0,
            params.len() as u32,
            HEADER_LEN,
            0,
            payload_offset,
            desc.flags.bits(),
        ],
    );
    chunk.extend_from_slice(&headers);
    chunk.extend_from_slice(&payloads);

    write_container(&[(FourCC::RTS0, &chunk)])
}

fn push_u32s(out: &mut Vec<u8>, values: &[u32]) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}
