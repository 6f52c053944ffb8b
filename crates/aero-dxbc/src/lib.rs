//! A safe, zero-copy parser for DirectX shader bytecode containers (`DXBC`).
//!
//! This crate parses **untrusted** shader blobs without panicking or reading out of bounds.
//! Besides container parsing it provides:
//!
//! - A parser for resource definition chunks (`RDEF`/`RD11`), which describe the registers a
//!   shader binds and are the input to root-signature layout building.
//! - A container writer, used to wrap serialized root signatures (`RTS0`).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod dxbc;
mod error;
mod fourcc;
/// Parser for DXBC resource definition chunks (`RDEF`).
pub mod rdef;
mod writer;

/// Helpers for building synthetic shader blobs in tests.
///
/// Only available to this crate's own tests or with the `test-utils` feature. Not part of the
/// stable parsing API.
#[cfg(any(test, feature = "test-utils"))]
#[allow(missing_docs)]
pub mod test_utils;

#[cfg(test)]
mod tests_rdef;

pub use crate::dxbc::{DxbcChunk, DxbcFile, DxbcHeader};
pub use crate::error::{DxbcError, DxbcErrorKind};
pub use crate::fourcc::FourCC;
pub use crate::rdef::{
    parse_rdef_chunk, RdefChunk, RdefConstantBuffer, RdefProgramKind, RdefResourceBinding,
};
pub use crate::writer::write_container;
