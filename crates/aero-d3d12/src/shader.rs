use std::fmt;
use std::sync::Arc;

use xxhash_rust::xxh64::xxh64;

/// Pipeline stage a shader is compiled for.
///
/// Ordinals follow the engine's stage numbering; graphics stages come first so they can index
/// fixed per-stage arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ShaderStage {
    Vertex = 0,
    Hull = 1,
    Domain = 2,
    Geometry = 3,
    Pixel = 4,
    Compute = 5,
}

impl ShaderStage {
    /// Graphics stages in pipeline order.
    pub const GRAPHICS: [ShaderStage; 5] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_graphics(self) -> bool {
        self != ShaderStage::Compute
    }
}

/// Graphics or compute. Both kinds share one hash space in the caches; the low bit of every
/// cache hash is reserved for this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Graphics,
    Compute,
}

impl PipelineKind {
    /// Clears (graphics) or sets (compute) the low bit of `hash`.
    pub fn tag_hash(self, hash: u64) -> u64 {
        match self {
            PipelineKind::Graphics => hash & !1,
            PipelineKind::Compute => hash | 1,
        }
    }

    /// Recovers the kind from a tagged hash.
    pub fn from_tagged_hash(hash: u64) -> Self {
        if hash & 1 == 1 {
            PipelineKind::Compute
        } else {
            PipelineKind::Graphics
        }
    }
}

/// xxHash64 of `bytes`, seeded with the bitwise complement of the length.
pub fn content_hash(bytes: &[u8]) -> u64 {
    xxh64(bytes, !(bytes.len() as u64))
}

/// Stable identity of a compiled shader: survives the bytecode being reallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId {
    pub content_hash: u64,
    pub stage: ShaderStage,
}

/// Compiled shader bytecode plus its content identity.
#[derive(Clone)]
pub struct ShaderBytecode {
    id: ShaderId,
    bytes: Arc<[u8]>,
}

impl ShaderBytecode {
    pub fn new(stage: ShaderStage, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            id: ShaderId {
                content_hash: content_hash(&bytes),
                stage,
            },
            bytes,
        }
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn stage(&self) -> ShaderStage {
        self.id.stage
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cache key for this shader.
    ///
    /// With `precise` the key is the content identity; otherwise it is the address and length of
    /// this particular allocation, so relocated copies of the same bytecode get distinct keys.
    pub(crate) fn key(&self, precise: bool) -> ShaderKey {
        if precise {
            ShaderKey::Content(self.id)
        } else {
            ShaderKey::Address {
                addr: self.bytes.as_ptr() as usize,
                len: self.bytes.len(),
                stage: self.id.stage,
            }
        }
    }
}

impl fmt::Debug for ShaderBytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderBytecode")
            .field("stage", &self.id.stage)
            .field("content_hash", &format_args!("{:#018x}", self.id.content_hash))
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ShaderKey {
    Content(ShaderId),
    Address {
        addr: usize,
        len: usize,
        stage: ShaderStage,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_seeded_with_inverted_length() {
        let bytes = b"shader bytes";
        assert_eq!(content_hash(bytes), xxh64(bytes, !(bytes.len() as u64)));
        assert_ne!(content_hash(bytes), xxh64(bytes, 0));
    }

    #[test]
    fn relocated_bytecode_keeps_content_key_but_not_address_key() {
        let a = ShaderBytecode::new(ShaderStage::Pixel, b"ps".to_vec());
        let b = ShaderBytecode::new(ShaderStage::Pixel, b"ps".to_vec());

        assert_eq!(a.id(), b.id());
        assert_eq!(a.key(true), b.key(true));
        assert_ne!(a.key(false), b.key(false));
        assert_eq!(a.key(false), a.clone().key(false));
    }

    #[test]
    fn kind_tag_occupies_low_bit() {
        let hash = 0xdead_beef_0000_0001;
        assert_eq!(PipelineKind::Graphics.tag_hash(hash), 0xdead_beef_0000_0000);
        assert_eq!(PipelineKind::Compute.tag_hash(hash & !1), hash);
        assert_eq!(
            PipelineKind::from_tagged_hash(PipelineKind::Compute.tag_hash(42)),
            PipelineKind::Compute
        );
        assert_eq!(
            PipelineKind::from_tagged_hash(PipelineKind::Graphics.tag_hash(43)),
            PipelineKind::Graphics
        );
    }
}
