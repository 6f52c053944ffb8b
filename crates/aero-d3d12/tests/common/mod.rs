#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use aero_d3d12::{
    ComputePipelineInit, DeviceError, GraphicsPipelineInit, PipelineDevice, ReflectionConfig,
    ShaderStageBinding,
};
use aero_dxbc::test_utils::{build_shader, TestBinding};

/// Device handle carrying the id the mock device assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRootSignature {
    pub id: u32,
    pub blob: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPipeline {
    pub id: u32,
    pub root_signature: u32,
}

/// Counts device object creations and can be told to fail the next calls.
#[derive(Debug, Default)]
pub struct MockDevice {
    pub root_signatures_created: Cell<u32>,
    pub pipelines_created: Cell<u32>,
    pub fail_root_signatures: Cell<bool>,
    pub fail_pipelines: Cell<bool>,
    pub pipeline_bytecode_lens: RefCell<Vec<usize>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PipelineDevice for MockDevice {
    type RootSignature = MockRootSignature;
    type PipelineState = MockPipeline;

    fn create_root_signature(
        &self,
        _node_mask: u32,
        blob: &[u8],
    ) -> Result<MockRootSignature, DeviceError> {
        if self.fail_root_signatures.get() {
            return Err(DeviceError::new(
                DeviceError::E_INVALIDARG,
                "root signature rejected",
            ));
        }
        let id = self.root_signatures_created.get() + 1;
        self.root_signatures_created.set(id);
        Ok(MockRootSignature {
            id,
            blob: blob.to_vec(),
        })
    }

    fn create_graphics_pipeline(
        &self,
        init: &GraphicsPipelineInit<MockRootSignature>,
    ) -> Result<MockPipeline, DeviceError> {
        if self.fail_pipelines.get() {
            return Err(DeviceError::new(
                DeviceError::E_OUTOFMEMORY,
                "pipeline rejected",
            ));
        }
        self.pipeline_bytecode_lens
            .borrow_mut()
            .extend(init.shaders.iter().flatten().map(|s| s.bytes().len()));
        let id = self.pipelines_created.get() + 1;
        self.pipelines_created.set(id);
        Ok(MockPipeline {
            id,
            root_signature: init.root_signature.handle().id,
        })
    }

    fn create_compute_pipeline(
        &self,
        init: &ComputePipelineInit<MockRootSignature>,
    ) -> Result<MockPipeline, DeviceError> {
        if self.fail_pipelines.get() {
            return Err(DeviceError::new(
                DeviceError::E_OUTOFMEMORY,
                "pipeline rejected",
            ));
        }
        let id = self.pipelines_created.get() + 1;
        self.pipelines_created.set(id);
        Ok(MockPipeline {
            id,
            root_signature: init.root_signature.handle().id,
        })
    }
}

/// Reflects a synthetic shader with the default reflection settings.
pub fn shader(target: u32, bindings: &[TestBinding], body: &[u8]) -> ShaderStageBinding {
    shader_with(target, bindings, body, &ReflectionConfig::default())
}

pub fn shader_with(
    target: u32,
    bindings: &[TestBinding],
    body: &[u8],
    config: &ReflectionConfig,
) -> ShaderStageBinding {
    ShaderStageBinding::from_dxbc(build_shader(target, bindings, body), config)
        .expect("synthetic shader reflects")
}
