//! Parser for DXBC resource definition chunks (`RDEF` / `RD11`).
//!
//! Only the parts needed to build a binding layout are decoded: the header, the constant buffer
//! descriptors and the bound-resource table. Variable and type tables are skipped.

use crate::error::DxbcError;
use crate::fourcc::FourCC;

const RDEF_HEADER_LEN: usize = 28;
const CBUFFER_DESC_LEN: usize = 24;
const BINDING_DESC_LEN_SM50: usize = 32;
const BINDING_DESC_LEN_SM51: usize = 40;
const MAX_RDEF_ENTRIES: u32 = 4096;

/// `D3D_SHADER_INPUT_TYPE` values.
pub mod input_type {
    /// Constant buffer (`b#`).
    pub const CBUFFER: u32 = 0;
    /// Texture buffer (`t#`).
    pub const TBUFFER: u32 = 1;
    /// Texture (`t#`).
    pub const TEXTURE: u32 = 2;
    /// Sampler (`s#`).
    pub const SAMPLER: u32 = 3;
    /// Typed read/write UAV (`u#`).
    pub const UAV_RWTYPED: u32 = 4;
    /// Structured buffer (`t#`).
    pub const STRUCTURED: u32 = 5;
    /// Read/write structured UAV (`u#`).
    pub const UAV_RWSTRUCTURED: u32 = 6;
    /// Byte-address buffer (`t#`).
    pub const BYTEADDRESS: u32 = 7;
    /// Read/write byte-address UAV (`u#`).
    pub const UAV_RWBYTEADDRESS: u32 = 8;
    /// Append structured UAV (`u#`).
    pub const UAV_APPEND_STRUCTURED: u32 = 9;
    /// Consume structured UAV (`u#`).
    pub const UAV_CONSUME_STRUCTURED: u32 = 10;
    /// Structured UAV with hidden counter (`u#`).
    pub const UAV_RWSTRUCTURED_WITH_COUNTER: u32 = 11;
    /// Ray-tracing acceleration structure (`t#`).
    pub const RTACCELERATIONSTRUCTURE: u32 = 12;
    /// Sampler feedback texture (`u#`).
    pub const UAV_FEEDBACKTEXTURE: u32 = 13;
}

/// `D3D_SHADER_INPUT_FLAGS` bits.
pub mod input_flags {
    /// Register was assigned explicitly in source.
    pub const USERPACKED: u32 = 0x1;
    /// Comparison sampler.
    pub const COMPARISON_SAMPLER: u32 = 0x2;
    /// The resource is declared but never referenced by the shader body.
    pub const UNUSED: u32 = 0x10;
}

/// Program type stored in the upper 16 bits of the RDEF target token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdefProgramKind {
    /// `0xFFFE`
    Vertex,
    /// `0x4853` (`HS`)
    Hull,
    /// `0x4453` (`DS`)
    Domain,
    /// `0x4753` (`GS`)
    Geometry,
    /// `0xFFFF`
    Pixel,
    /// `0x4353` (`CS`)
    Compute,
}

impl RdefProgramKind {
    /// Decodes the program type half of an RDEF target token.
    pub fn from_target(target: u32) -> Option<Self> {
        match target >> 16 {
            0xFFFE => Some(Self::Vertex),
            0x4853 => Some(Self::Hull),
            0x4453 => Some(Self::Domain),
            0x4753 => Some(Self::Geometry),
            0xFFFF => Some(Self::Pixel),
            0x4353 => Some(Self::Compute),
            _ => None,
        }
    }
}

/// A constant buffer descriptor from the RDEF chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefConstantBuffer {
    /// Buffer name as declared in source.
    pub name: String,
    /// Number of variables in the buffer (the variable table itself is not decoded).
    pub variable_count: u32,
    /// Size in bytes.
    pub size: u32,
    /// `D3D_SHADER_CBUFFER_FLAGS`.
    pub flags: u32,
    /// `D3D_CBUFFER_TYPE`.
    pub kind: u32,
}

/// A bound resource (texture, buffer, sampler, UAV or constant buffer binding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefResourceBinding {
    /// Resource name as declared in source.
    pub name: String,
    /// `D3D_SHADER_INPUT_TYPE`, see [`input_type`].
    pub input_type: u32,
    /// `D3D_RESOURCE_RETURN_TYPE`.
    pub return_type: u32,
    /// `D3D_SRV_DIMENSION`.
    pub dimension: u32,
    /// Sample count for multisampled textures.
    pub num_samples: u32,
    /// First register.
    pub bind_point: u32,
    /// Number of registers; `0` for unbounded arrays.
    pub bind_count: u32,
    /// `D3D_SHADER_INPUT_FLAGS`, see [`input_flags`].
    pub flags: u32,
    /// Register space (always `0` before shader model 5.1).
    pub space: u32,
}

/// A parsed resource definition chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefChunk {
    /// Target version token (`minor | major << 8 | program_type << 16`).
    pub target: u32,
    /// Compile flags.
    pub flags: u32,
    /// Compiler identification string, if present.
    pub creator: Option<String>,
    /// Constant buffer descriptors in declaration order.
    pub constant_buffers: Vec<RdefConstantBuffer>,
    /// Bound resources in declaration order.
    pub bound_resources: Vec<RdefResourceBinding>,
}

impl RdefChunk {
    /// Returns the program type encoded in [`RdefChunk::target`].
    pub fn program_kind(&self) -> Option<RdefProgramKind> {
        RdefProgramKind::from_target(self.target)
    }

    /// Returns `(major, minor)` of the target shader model.
    pub fn shader_model(&self) -> (u8, u8) {
        (((self.target >> 8) & 0xff) as u8, (self.target & 0xff) as u8)
    }
}

/// Parses an RDEF chunk payload.
pub fn parse_rdef_chunk(bytes: &[u8]) -> Result<RdefChunk, DxbcError> {
    parse_rdef_chunk_for_fourcc(FourCC::RDEF, bytes)
}

pub(crate) fn parse_rdef_chunk_for_fourcc(
    fourcc: FourCC,
    bytes: &[u8],
) -> Result<RdefChunk, DxbcError> {
    if bytes.len() < RDEF_HEADER_LEN {
        return Err(DxbcError::invalid_chunk(format!(
            "{fourcc} chunk is truncated: need {RDEF_HEADER_LEN} bytes for header, got {}",
            bytes.len()
        )));
    }

    let cb_count = read_u32_le(bytes, 0, "cb_count")?;
    let cb_offset = read_u32_le(bytes, 4, "cb_offset")?;
    let rb_count = read_u32_le(bytes, 8, "resource_count")?;
    let rb_offset = read_u32_le(bytes, 12, "resource_offset")?;
    let target = read_u32_le(bytes, 16, "target")?;
    let flags = read_u32_le(bytes, 20, "flags")?;
    let creator_offset = read_u32_le(bytes, 24, "creator_offset")?;

    let creator = match creator_offset {
        0 => None,
        offset => Some(read_cstring(bytes, offset, "creator")?),
    };

    let major = (target >> 8) & 0xff;
    let minor = target & 0xff;
    let binding_desc_len = if major > 5 || (major == 5 && minor >= 1) {
        BINDING_DESC_LEN_SM51
    } else {
        BINDING_DESC_LEN_SM50
    };

    let constant_buffers = table(bytes, cb_offset, cb_count, CBUFFER_DESC_LEN, "constant buffer")?
        .map(|base| {
            Ok::<_, DxbcError>(RdefConstantBuffer {
                name: read_cstring(bytes, read_u32_le(bytes, base, "cb name")?, "cb name")?,
                variable_count: read_u32_le(bytes, base + 4, "cb variable_count")?,
                size: read_u32_le(bytes, base + 12, "cb size")?,
                flags: read_u32_le(bytes, base + 16, "cb flags")?,
                kind: read_u32_le(bytes, base + 20, "cb type")?,
            })
        })
        .collect::<Result<Vec<_>, DxbcError>>()?;

    let bound_resources = table(bytes, rb_offset, rb_count, binding_desc_len, "resource")?
        .map(|base| {
            let space = if binding_desc_len == BINDING_DESC_LEN_SM51 {
                read_u32_le(bytes, base + 32, "resource space")?
            } else {
                0
            };
            Ok::<_, DxbcError>(RdefResourceBinding {
                name: read_cstring(
                    bytes,
                    read_u32_le(bytes, base, "resource name")?,
                    "resource name",
                )?,
                input_type: read_u32_le(bytes, base + 4, "resource input_type")?,
                return_type: read_u32_le(bytes, base + 8, "resource return_type")?,
                dimension: read_u32_le(bytes, base + 12, "resource dimension")?,
                num_samples: read_u32_le(bytes, base + 16, "resource num_samples")?,
                bind_point: read_u32_le(bytes, base + 20, "resource bind_point")?,
                bind_count: read_u32_le(bytes, base + 24, "resource bind_count")?,
                flags: read_u32_le(bytes, base + 28, "resource flags")?,
                space,
            })
        })
        .collect::<Result<Vec<_>, DxbcError>>()?;

    Ok(RdefChunk {
        target,
        flags,
        creator,
        constant_buffers,
        bound_resources,
    })
}

/// Validates a descriptor table and yields the byte offset of each entry.
fn table(
    bytes: &[u8],
    offset: u32,
    count: u32,
    entry_len: usize,
    what: &str,
) -> Result<impl Iterator<Item = usize>, DxbcError> {
    if count > MAX_RDEF_ENTRIES {
        return Err(DxbcError::invalid_chunk(format!(
            "{what} count {count} exceeds maximum {MAX_RDEF_ENTRIES}"
        )));
    }
    let start = offset as usize;
    let end = start.saturating_add(count as usize * entry_len);
    if count != 0 && end > bytes.len() {
        return Err(DxbcError::invalid_chunk(format!(
            "{what} table at {start}..{end} is outside chunk length {}",
            bytes.len()
        )));
    }
    Ok((0..count as usize).map(move |i| start + i * entry_len))
}

fn read_u32_le(bytes: &[u8], offset: usize, what: &str) -> Result<u32, DxbcError> {
    offset
        .checked_add(4)
        .and_then(|end| bytes.get(offset..end))
        .map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
        .ok_or_else(|| {
            DxbcError::invalid_chunk(format!(
                "{what} at {offset} is outside chunk length {}",
                bytes.len()
            ))
        })
}

fn read_cstring(bytes: &[u8], offset: u32, what: &str) -> Result<String, DxbcError> {
    let tail = bytes.get(offset as usize..).ok_or_else(|| {
        DxbcError::invalid_chunk(format!(
            "{what} string offset {offset} is outside chunk length {}",
            bytes.len()
        ))
    })?;
    let len = tail.iter().position(|&b| b == 0).ok_or_else(|| {
        DxbcError::invalid_chunk(format!("{what} string at {offset} is not NUL-terminated"))
    })?;
    Ok(String::from_utf8_lossy(&tail[..len]).into_owned())
}
