//! Extracts per-class binding ranges from a compiled shader container.

use std::sync::Arc;

use aero_dxbc::rdef::{input_flags, input_type};
use aero_dxbc::{DxbcFile, RdefProgramKind, RdefResourceBinding};

use crate::bind_range::{BindRange, BindRangeSet, ResourceClass};
use crate::config::ReflectionConfig;
use crate::error::ReflectionError;
use crate::shader::{ShaderBytecode, ShaderId, ShaderStage};

/// Binding ranges of one shader, one set per register class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResourceRanges {
    pub constant_buffers: BindRangeSet,
    pub input_resources: BindRangeSet,
    pub output_resources: BindRangeSet,
    pub samplers: BindRangeSet,
}

impl ResourceRanges {
    pub fn class(&self, class: ResourceClass) -> &BindRangeSet {
        match class {
            ResourceClass::ConstantBuffer => &self.constant_buffers,
            ResourceClass::ShaderResource => &self.input_resources,
            ResourceClass::UnorderedAccess => &self.output_resources,
            ResourceClass::Sampler => &self.samplers,
        }
    }

    pub fn class_mut(&mut self, class: ResourceClass) -> &mut BindRangeSet {
        match class {
            ResourceClass::ConstantBuffer => &mut self.constant_buffers,
            ResourceClass::ShaderResource => &mut self.input_resources,
            ResourceClass::UnorderedAccess => &mut self.output_resources,
            ResourceClass::Sampler => &mut self.samplers,
        }
    }
}

/// A compiled shader together with its binding ranges.
#[derive(Debug, Clone)]
pub struct ShaderStageBinding {
    bytecode: ShaderBytecode,
    ranges: ResourceRanges,
}

impl ShaderStageBinding {
    pub fn new(stage: ShaderStage, bytecode: impl Into<Arc<[u8]>>, ranges: ResourceRanges) -> Self {
        Self {
            bytecode: ShaderBytecode::new(stage, bytecode),
            ranges,
        }
    }

    /// Reflects a `DXBC` container. The stage is taken from the RDEF target token.
    pub fn from_dxbc(
        bytecode: impl Into<Arc<[u8]>>,
        config: &ReflectionConfig,
    ) -> Result<Self, ReflectionError> {
        let bytecode: Arc<[u8]> = bytecode.into();
        let dxbc = DxbcFile::parse(&bytecode)?;
        tracing::trace!(container = %dxbc.debug_summary(), "parsed shader container");
        let rdef = dxbc.get_rdef().ok_or(ReflectionError::MissingRdef)??;

        let stage = match rdef.program_kind() {
            Some(RdefProgramKind::Vertex) => ShaderStage::Vertex,
            Some(RdefProgramKind::Hull) => ShaderStage::Hull,
            Some(RdefProgramKind::Domain) => ShaderStage::Domain,
            Some(RdefProgramKind::Geometry) => ShaderStage::Geometry,
            Some(RdefProgramKind::Pixel) => ShaderStage::Pixel,
            Some(RdefProgramKind::Compute) => ShaderStage::Compute,
            None => {
                return Err(ReflectionError::UnknownProgramType {
                    target: rdef.target,
                })
            }
        };

        let mut bindings = rdef
            .bound_resources
            .iter()
            .map(|res| classify(res).map(|class| (class, res)))
            .collect::<Result<Vec<_>, ReflectionError>>()?;
        // Merging only looks at the previous range; feed registers in ascending order.
        bindings.sort_by_key(|(class, res)| (*class, res.bind_point));

        let mut ranges = ResourceRanges::default();
        for (class, res) in bindings {
            if res.space != 0 {
                return Err(ReflectionError::UnsupportedRegisterSpace {
                    name: res.name.clone(),
                    space: res.space,
                });
            }
            if res.bind_count == 0 {
                return Err(ReflectionError::UnboundedArray {
                    name: res.name.clone(),
                });
            }
            if res.bind_point.checked_add(res.bind_count).is_none() {
                return Err(ReflectionError::RegisterOverflow {
                    name: res.name.clone(),
                    bind_point: res.bind_point,
                    bind_count: res.bind_count,
                });
            }

            let mut range =
                BindRange::new(res.bind_point, res.bind_count, res.input_type, res.dimension);
            range.used = res.flags & input_flags::UNUSED == 0;
            range.shared = class == ResourceClass::ConstantBuffer
                && config.is_shared_constant_buffer(res.bind_point);
            // Arrays keep their own descriptor range.
            range.unmergeable = res.bind_count > 1;
            ranges.class_mut(class).add(range);
        }

        tracing::debug!(
            ?stage,
            cbs = ranges.constant_buffers.total_length(),
            srvs = ranges.input_resources.total_length(),
            uavs = ranges.output_resources.total_length(),
            samplers = ranges.samplers.total_length(),
            "reflected shader"
        );

        Ok(Self {
            bytecode: ShaderBytecode::new(stage, bytecode),
            ranges,
        })
    }

    pub fn id(&self) -> ShaderId {
        self.bytecode.id()
    }

    pub fn stage(&self) -> ShaderStage {
        self.bytecode.stage()
    }

    pub fn bytecode(&self) -> &ShaderBytecode {
        &self.bytecode
    }

    pub fn ranges(&self) -> &ResourceRanges {
        &self.ranges
    }
}

fn classify(res: &RdefResourceBinding) -> Result<ResourceClass, ReflectionError> {
    Ok(match res.input_type {
        input_type::CBUFFER => ResourceClass::ConstantBuffer,
        input_type::TBUFFER
        | input_type::TEXTURE
        | input_type::STRUCTURED
        | input_type::BYTEADDRESS
        | input_type::RTACCELERATIONSTRUCTURE => ResourceClass::ShaderResource,
        input_type::UAV_RWTYPED
        | input_type::UAV_RWSTRUCTURED
        | input_type::UAV_RWBYTEADDRESS
        | input_type::UAV_APPEND_STRUCTURED
        | input_type::UAV_CONSUME_STRUCTURED
        | input_type::UAV_RWSTRUCTURED_WITH_COUNTER
        | input_type::UAV_FEEDBACKTEXTURE => ResourceClass::UnorderedAccess,
        input_type::SAMPLER => ResourceClass::Sampler,
        other => {
            return Err(ReflectionError::UnknownInputType {
                name: res.name.clone(),
                input_type: other,
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aero_dxbc::test_utils::{
        build_shader, TestBinding, TARGET_CS_5_0, TARGET_PS_5_1, TARGET_VS_5_0,
    };
    use aero_dxbc::{write_container, FourCC};

    #[test]
    fn classifies_and_merges_bindings() {
        let bytes = build_shader(
            TARGET_VS_5_0,
            &[
                TestBinding::cbuffer("PerDraw", 1),
                TestBinding::cbuffer("PerMaterial", 0),
                TestBinding::texture("albedo", 0),
                TestBinding::texture("normal", 1),
                TestBinding::texture("detail", 3),
                TestBinding::sampler("linear", 0),
            ],
            b"vs",
        );
        let shader = ShaderStageBinding::from_dxbc(bytes, &ReflectionConfig::default()).unwrap();

        assert_eq!(shader.stage(), ShaderStage::Vertex);
        let ranges = shader.ranges();
        assert_eq!(ranges.constant_buffers.ranges().len(), 1);
        assert_eq!(ranges.constant_buffers.ranges()[0].registers(), 0..2);
        assert_eq!(ranges.input_resources.ranges().len(), 2);
        assert_eq!(ranges.input_resources.total_length(), 3);
        assert_eq!(ranges.samplers.total_length(), 1);
        assert!(ranges.output_resources.is_empty());
    }

    #[test]
    fn shared_and_unused_flags_come_from_config_and_rdef() {
        let bytes = build_shader(
            TARGET_CS_5_0,
            &[
                TestBinding::cbuffer("PerFrame", 13),
                TestBinding::cbuffer("Debug", 2).with_flags(input_flags::UNUSED),
                TestBinding::uav("out", 0),
            ],
            b"cs",
        );
        let config = ReflectionConfig {
            shared_constant_buffer_slots: vec![13],
        };
        let shader = ShaderStageBinding::from_dxbc(bytes, &config).unwrap();

        assert_eq!(shader.stage(), ShaderStage::Compute);
        let cbs = shader.ranges().constant_buffers.ranges();
        assert_eq!(cbs.len(), 2);
        assert!(!cbs[0].used && cbs[0].start == 2);
        assert!(cbs[1].shared && cbs[1].start == 13);
        assert_eq!(shader.ranges().output_resources.total_length(), 1);
    }

    #[test]
    fn arrays_are_unmergeable() {
        let bytes = build_shader(
            TARGET_VS_5_0,
            &[
                TestBinding::new("lights", input_type::STRUCTURED, 0, 4),
                TestBinding::texture("shadow", 4),
            ],
            b"vs",
        );
        let shader = ShaderStageBinding::from_dxbc(bytes, &ReflectionConfig::default()).unwrap();
        let srvs = shader.ranges().input_resources.ranges();
        assert_eq!(srvs.len(), 2);
        assert!(srvs[0].unmergeable);
        assert_eq!(srvs[0].registers(), 0..4);
    }

    #[test]
    fn content_hash_covers_whole_container() {
        let a = build_shader(TARGET_VS_5_0, &[], b"one");
        let b = build_shader(TARGET_VS_5_0, &[], b"two");
        let config = ReflectionConfig::default();
        let a = ShaderStageBinding::from_dxbc(a, &config).unwrap();
        let b = ShaderStageBinding::from_dxbc(b, &config).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn rejects_nonzero_register_space() {
        let bytes = build_shader(
            TARGET_PS_5_1,
            &[TestBinding::texture("bindless", 0).with_space(1)],
            b"ps",
        );
        let err = ShaderStageBinding::from_dxbc(bytes, &ReflectionConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ReflectionError::UnsupportedRegisterSpace { space: 1, .. }
        ));
    }

    #[test]
    fn rejects_unbounded_arrays() {
        let bytes = build_shader(
            TARGET_PS_5_1,
            &[TestBinding::new("textures", input_type::TEXTURE, 0, 0)],
            b"ps",
        );
        let err = ShaderStageBinding::from_dxbc(bytes, &ReflectionConfig::default()).unwrap_err();
        assert!(matches!(err, ReflectionError::UnboundedArray { .. }));
    }

    #[test]
    fn rejects_registers_past_the_register_space() {
        let bytes = build_shader(
            TARGET_VS_5_0,
            &[
                TestBinding::texture("a", u32::MAX),
                TestBinding::texture("b", u32::MAX),
            ],
            b"vs",
        );
        let err = ShaderStageBinding::from_dxbc(bytes, &ReflectionConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ReflectionError::RegisterOverflow {
                name: "a".into(),
                bind_point: u32::MAX,
                bind_count: 1
            }
        );

        let bytes = build_shader(
            TARGET_VS_5_0,
            &[TestBinding::new("lights", input_type::STRUCTURED, 0x8000_0000, 0x8000_0000)],
            b"vs",
        );
        let err = ShaderStageBinding::from_dxbc(bytes, &ReflectionConfig::default()).unwrap_err();
        assert!(matches!(err, ReflectionError::RegisterOverflow { .. }));
    }

    #[test]
    fn overlapping_huge_arrays_reflect_without_overflow() {
        let bytes = build_shader(
            TARGET_VS_5_0,
            &[
                TestBinding::new("a", input_type::TEXTURE, 0, 0x8000_0000),
                TestBinding::new("b", input_type::TEXTURE, 0, 0x8000_0000),
            ],
            b"vs",
        );
        let shader = ShaderStageBinding::from_dxbc(bytes, &ReflectionConfig::default()).unwrap();
        let srvs = &shader.ranges().input_resources;
        assert_eq!(srvs.ranges().len(), 2);
        assert_eq!(srvs.total_length(), u32::MAX);

        let err = crate::resource_mapping::ResourceMappings::build(
            &[(ShaderStage::Vertex, shader.ranges())],
            &crate::config::RangeMergePolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::MappingError::CapacityExceeded { .. }));
    }

    #[test]
    fn missing_rdef_is_an_error() {
        let bytes = write_container(&[(FourCC::SHEX, b"body")]);
        let err = ShaderStageBinding::from_dxbc(bytes, &ReflectionConfig::default()).unwrap_err();
        assert_eq!(err, ReflectionError::MissingRdef);
    }

    #[test]
    fn garbage_is_a_dxbc_error() {
        let err =
            ShaderStageBinding::from_dxbc(b"not a shader".to_vec(), &ReflectionConfig::default())
                .unwrap_err();
        assert!(matches!(err, ReflectionError::Dxbc(_)));
    }
}
