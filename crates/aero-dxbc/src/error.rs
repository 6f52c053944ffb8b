use std::borrow::Cow;

/// Classification of a [`DxbcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DxbcErrorKind {
    /// The fixed container header is truncated or inconsistent.
    MalformedHeader,
    /// The chunk offset table is inconsistent (overlaps the header, overflows, ...).
    MalformedOffsets,
    /// A declared size or offset points outside the available bytes.
    OutOfBounds,
    /// A chunk payload could not be decoded.
    InvalidChunk,
}

/// Error returned by every parser in this crate.
///
/// Errors carry a kind plus a free-form context string describing which field failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {context}")]
pub struct DxbcError {
    kind: DxbcErrorKind,
    context: Cow<'static, str>,
}

impl DxbcError {
    fn new(kind: DxbcErrorKind, context: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            context: context.into(),
        }
    }

    pub(crate) fn malformed_header(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(DxbcErrorKind::MalformedHeader, context)
    }

    pub(crate) fn malformed_offsets(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(DxbcErrorKind::MalformedOffsets, context)
    }

    pub(crate) fn out_of_bounds(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(DxbcErrorKind::OutOfBounds, context)
    }

    pub(crate) fn invalid_chunk(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(DxbcErrorKind::InvalidChunk, context)
    }

    /// Returns the error classification.
    pub fn kind(&self) -> DxbcErrorKind {
        self.kind
    }

    /// Returns the human-readable context without the kind prefix.
    pub fn context(&self) -> &str {
        &self.context
    }
}
