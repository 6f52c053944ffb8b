use crate::dxbc::DXBC_HEADER_LEN;
use crate::FourCC;

/// Builds a `DXBC` container holding `chunks` in the given order.
///
/// The header checksum is left zeroed; the D3D runtime's checksum is not recomputed here and the
/// parser in this crate does not validate it.
///
/// # Panics
///
/// Panics if the container would exceed 4 GiB.
pub fn write_container(chunks: &[(FourCC, &[u8])]) -> Vec<u8> {
    let table_len = 4 * chunks.len();
    let payload_len: usize = chunks.iter().map(|(_, data)| 8 + data.len()).sum();
    let total_len = DXBC_HEADER_LEN + table_len + payload_len;
    let total_size = u32::try_from(total_len).expect("DXBC container does not fit in u32");

    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(&FourCC::DXBC.0);
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&total_size.to_le_bytes());
    out.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

    let mut offset = DXBC_HEADER_LEN + table_len;
    for (_, data) in chunks {
        out.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += 8 + data.len();
    }
    for (fourcc, data) in chunks {
        out.extend_from_slice(&fourcc.0);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }

    debug_assert_eq!(out.len(), total_len);
    out
}
