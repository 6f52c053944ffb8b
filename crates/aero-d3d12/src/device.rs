use crate::error::DeviceError;
use crate::pso::{ComputePipelineInit, GraphicsPipelineInit};
use crate::rts0::{serialize_root_signature, RootSignatureDesc};

/// The device calls the caches make on a miss.
///
/// Handles are owned by the caches once returned; they are dropped when the owning cache is
/// dropped or rebuilt by [`crate::D3d12PipelineContext::replace_device`].
pub trait PipelineDevice {
    type RootSignature;
    type PipelineState;

    /// Produces a version 1.0 root signature blob.
    fn serialize_root_signature(&self, desc: &RootSignatureDesc) -> Result<Vec<u8>, DeviceError> {
        Ok(serialize_root_signature(desc))
    }

    fn create_root_signature(
        &self,
        node_mask: u32,
        blob: &[u8],
    ) -> Result<Self::RootSignature, DeviceError>;

    /// `init` carries the caller's bytecode, not the canonicalized cache key.
    fn create_graphics_pipeline(
        &self,
        init: &GraphicsPipelineInit<Self::RootSignature>,
    ) -> Result<Self::PipelineState, DeviceError>;

    fn create_compute_pipeline(
        &self,
        init: &ComputePipelineInit<Self::RootSignature>,
    ) -> Result<Self::PipelineState, DeviceError>;
}
