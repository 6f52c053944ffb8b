use crate::error::DxbcError;
use crate::fourcc::FourCC;
use crate::rdef::{parse_rdef_chunk_for_fourcc, RdefChunk};
use core::fmt;

/// magic + checksum + reserved + total_size + chunk_count
pub(crate) const DXBC_HEADER_LEN: usize = 4 + 16 + 4 + 4 + 4;
const CHUNK_HEADER_LEN: usize = 8;
// Real containers carry a handful of chunks; anything beyond this is hostile input.
const MAX_DXBC_CHUNK_COUNT: u32 = 4096;

/// The fixed header of a `DXBC` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxbcHeader {
    /// Always [`FourCC::DXBC`].
    pub magic: FourCC,
    /// Checksum stored in the header. Not validated.
    pub checksum: [u8; 16],
    /// Declared total size, in bytes, of the container.
    pub total_size: u32,
    /// Number of entries in the chunk offset table.
    pub chunk_count: u32,
}

/// A single chunk within a `DXBC` container.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DxbcChunk<'a> {
    /// Chunk identifier.
    pub fourcc: FourCC,
    /// Chunk payload (without the 8-byte chunk header).
    pub data: &'a [u8],
}

impl fmt::Debug for DxbcChunk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DxbcChunk")
            .field("fourcc", &self.fourcc)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// A parsed `DXBC` container.
///
/// Every offset and size is validated against the declared `total_size` during
/// [`DxbcFile::parse`], so chunk iteration afterwards cannot fail.
#[derive(Debug, Clone)]
pub struct DxbcFile<'a> {
    bytes: &'a [u8],
    header: DxbcHeader,
    chunk_offsets: &'a [u8],
}

impl<'a> DxbcFile<'a> {
    /// Parses a `DXBC` container from untrusted `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<DxbcFile<'a>, DxbcError> {
        if bytes.len() < DXBC_HEADER_LEN {
            return Err(DxbcError::malformed_header(format!(
                "need at least {DXBC_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let magic = FourCC(read_array::<4>(bytes, 0)?);
        if magic != FourCC::DXBC {
            return Err(DxbcError::malformed_header(format!(
                "bad magic {magic:?}, expected {:?}",
                FourCC::DXBC
            )));
        }
        let checksum = read_array::<16>(bytes, 4)?;
        let total_size = read_u32_le(bytes, 24)?;
        let chunk_count = read_u32_le(bytes, 28)?;

        if chunk_count > MAX_DXBC_CHUNK_COUNT {
            return Err(DxbcError::malformed_offsets(format!(
                "chunk_count {chunk_count} exceeds maximum {MAX_DXBC_CHUNK_COUNT}"
            )));
        }
        if (total_size as usize) < DXBC_HEADER_LEN {
            return Err(DxbcError::malformed_header(format!(
                "total_size {total_size} is smaller than header size {DXBC_HEADER_LEN}"
            )));
        }
        if total_size as usize > bytes.len() {
            return Err(DxbcError::out_of_bounds(format!(
                "total_size {total_size} exceeds buffer length {}",
                bytes.len()
            )));
        }
        let bytes = &bytes[..total_size as usize];

        // chunk_count is capped above, so this cannot overflow.
        let offset_table_end = DXBC_HEADER_LEN + chunk_count as usize * 4;
        if offset_table_end > bytes.len() {
            return Err(DxbcError::malformed_offsets(format!(
                "chunk offset table ends at {offset_table_end}, but total_size is {}",
                bytes.len()
            )));
        }
        let chunk_offsets = &bytes[DXBC_HEADER_LEN..offset_table_end];

        for (i, raw) in chunk_offsets.chunks_exact(4).enumerate() {
            let chunk_offset = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
            if chunk_offset < offset_table_end {
                return Err(DxbcError::malformed_offsets(format!(
                    "chunk {i} offset {chunk_offset} points into the container header or offset table (need >= {offset_table_end})"
                )));
            }

            let header_end = chunk_offset
                .checked_add(CHUNK_HEADER_LEN)
                .filter(|&end| end <= bytes.len())
                .ok_or_else(|| {
                    DxbcError::out_of_bounds(format!(
                        "chunk {i} header at {chunk_offset} is outside total_size {}",
                        bytes.len()
                    ))
                })?;
            let fourcc = FourCC(read_array::<4>(bytes, chunk_offset)?);
            let chunk_size = read_u32_le(bytes, chunk_offset + 4)? as usize;
            let data_end = header_end.checked_add(chunk_size).ok_or_else(|| {
                DxbcError::malformed_offsets(format!(
                    "chunk {i} size {chunk_size} overflows when computing data range"
                ))
            })?;
            if data_end > bytes.len() {
                return Err(DxbcError::out_of_bounds(format!(
                    "chunk {i} ({fourcc}) data at {header_end}..{data_end} is outside total_size {}",
                    bytes.len()
                )));
            }
        }

        Ok(DxbcFile {
            bytes,
            header: DxbcHeader {
                magic,
                checksum,
                total_size,
                chunk_count,
            },
            chunk_offsets,
        })
    }

    /// Returns the parsed header.
    pub fn header(&self) -> &DxbcHeader {
        &self.header
    }

    /// Returns the bytes covered by the declared `total_size`.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Iterates over all chunks in file order.
    pub fn chunks(&self) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        let bytes = self.bytes;
        self.chunk_offsets.chunks_exact(4).filter_map(move |raw| {
            let offset = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
            let header = bytes.get(offset..offset.checked_add(CHUNK_HEADER_LEN)?)?;
            let fourcc = FourCC([header[0], header[1], header[2], header[3]]);
            let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
            let start = offset + CHUNK_HEADER_LEN;
            let data = bytes.get(start..start.checked_add(size)?)?;
            Some(DxbcChunk { fourcc, data })
        })
    }

    /// Returns the first chunk matching `fourcc`, if any.
    pub fn get_chunk(&self, fourcc: FourCC) -> Option<DxbcChunk<'a>> {
        self.chunks().find(|chunk| chunk.fourcc == fourcc)
    }

    /// Iterates over all chunks matching `fourcc`, in file order.
    pub fn get_chunks(&self, fourcc: FourCC) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        self.chunks().filter(move |chunk| chunk.fourcc == fourcc)
    }

    /// Returns and parses the resource definition chunk, if any.
    ///
    /// `RDEF` chunks are tried first in file order; the first one that parses wins. If none
    /// parse (or none exist), `RD11` chunks are tried. When every candidate fails, the error of
    /// the first `RDEF` candidate is reported in preference to an `RD11` error.
    pub fn get_rdef(&self) -> Option<Result<RdefChunk, DxbcError>> {
        let parse_first = |kind: FourCC| -> Option<Result<RdefChunk, DxbcError>> {
            let mut first_err = None;
            for chunk in self.get_chunks(kind) {
                match parse_rdef_chunk_for_fourcc(chunk.fourcc, chunk.data) {
                    Ok(rdef) => return Some(Ok(rdef)),
                    Err(err) => {
                        first_err.get_or_insert_with(|| {
                            DxbcError::invalid_chunk(format!("{kind} chunk: {}", err.context()))
                        });
                    }
                }
            }
            first_err.map(Err)
        };

        let primary = parse_first(FourCC::RDEF);
        if matches!(primary, Some(Ok(_))) {
            return primary;
        }
        match parse_first(FourCC::RD11) {
            ok @ Some(Ok(_)) => ok,
            Some(Err(err)) if primary.is_none() => Some(Err(err)),
            _ => primary,
        }
    }

    /// Returns the first shader bytecode chunk (`SHEX` or `SHDR`) in file order.
    pub fn find_first_shader_chunk(&self) -> Option<DxbcChunk<'a>> {
        self.chunks()
            .find(|chunk| chunk.fourcc == FourCC::SHEX || chunk.fourcc == FourCC::SHDR)
    }

    /// Returns a one-line-per-chunk summary, for logs and diagnostics.
    pub fn debug_summary(&self) -> String {
        use core::fmt::Write as _;

        let mut out = format!(
            "{} total_size={} chunk_count={}",
            self.header.magic, self.header.total_size, self.header.chunk_count
        );
        for (idx, chunk) in self.chunks().enumerate() {
            let _ = write!(
                out,
                "\n  [{idx:02}] {} {} bytes",
                chunk.fourcc,
                chunk.data.len()
            );
        }
        out
    }
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N], DxbcError> {
    let slice = offset
        .checked_add(N)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| {
            DxbcError::malformed_header(format!(
                "need {N} bytes at offset {offset}, but buffer length is {}",
                bytes.len()
            ))
        })?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, DxbcError> {
    read_array::<4>(bytes, offset).map(u32::from_le_bytes)
}
