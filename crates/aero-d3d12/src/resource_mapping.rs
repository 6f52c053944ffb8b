//! Root-signature layout planning.
//!
//! A [`ResourceMappings`] is the flattened plan for one shader combination: the ordered root
//! parameters, the descriptor ranges referenced by descriptor-table parameters, one layout entry
//! per descriptor table, and a lookup entry for every heap descriptor a draw must provide.
//!
//! Descriptor-table parameters refer to their ranges by index, so a plan can be cloned, hashed
//! and compared structurally.

use crate::bind_range::{BindRange, ResourceClass};
use crate::config::RangeMergePolicy;
use crate::error::MappingError;
use crate::reflection::ResourceRanges;
use crate::shader::ShaderStage;

pub const MAX_DESCRIPTOR_RANGES: usize = 128;
pub const MAX_ROOT_PARAMETERS: usize = 64;
pub const MAX_DESCRIPTOR_TABLES: usize = 64;
pub const MAX_RESOURCES: usize = 128;
pub const MAX_SAMPLERS: usize = 32;
/// Matches the number of per-frame constant buffer addresses bound at root level.
pub const MAX_SHARED_CONSTANT_BUFFERS: usize = 8;

/// `D3D12_SHADER_VISIBILITY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ShaderVisibility {
    All = 0,
    Vertex = 1,
    Hull = 2,
    Domain = 3,
    Geometry = 4,
    Pixel = 5,
}

impl ShaderVisibility {
    /// Graphics stages map to their single-stage visibility; compute maps to `All`.
    pub fn for_stage(stage: ShaderStage) -> Self {
        // The visibility ordinals are the stage ordinals shifted by one, wrapping after pixel.
        match (stage.index() + 1) % (ShaderStage::Pixel.index() + 2) {
            1 => ShaderVisibility::Vertex,
            2 => ShaderVisibility::Hull,
            3 => ShaderVisibility::Domain,
            4 => ShaderVisibility::Geometry,
            5 => ShaderVisibility::Pixel,
            _ => ShaderVisibility::All,
        }
    }
}

/// `D3D12_DESCRIPTOR_RANGE_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DescriptorRangeType {
    Srv = 0,
    Uav = 1,
    Cbv = 2,
    Sampler = 3,
}

impl DescriptorRangeType {
    pub fn for_class(class: ResourceClass) -> Self {
        match class {
            ResourceClass::ConstantBuffer => DescriptorRangeType::Cbv,
            ResourceClass::ShaderResource => DescriptorRangeType::Srv,
            ResourceClass::UnorderedAccess => DescriptorRangeType::Uav,
            ResourceClass::Sampler => DescriptorRangeType::Sampler,
        }
    }
}

/// The two shader-visible descriptor heaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapType {
    CbvSrvUav,
    Sampler,
}

impl DescriptorHeapType {
    pub fn for_class(class: ResourceClass) -> Self {
        match class {
            ResourceClass::Sampler => DescriptorHeapType::Sampler,
            _ => DescriptorHeapType::CbvSrvUav,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorRange {
    pub range_type: DescriptorRangeType,
    pub num_descriptors: u32,
    pub base_register: u32,
    pub register_space: u32,
    pub offset_in_table: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootParameter {
    /// Ranges `first_range..first_range + range_count` of the owning plan, backed by descriptor
    /// table `table`.
    DescriptorTable {
        first_range: u32,
        range_count: u32,
        table: u32,
        visibility: ShaderVisibility,
    },
    ConstantBufferView {
        register: u32,
        visibility: ShaderVisibility,
    },
    ShaderResourceView {
        register: u32,
        visibility: ShaderVisibility,
    },
    UnorderedAccessView {
        register: u32,
        visibility: ShaderVisibility,
    },
}

/// Kind of root descriptor a register class can be bound through. Samplers have none; they are
/// only reachable through descriptor tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootDescriptorKind {
    Cbv,
    Srv,
    Uav,
}

impl RootDescriptorKind {
    fn for_class(class: ResourceClass) -> Option<Self> {
        match class {
            ResourceClass::ConstantBuffer => Some(Self::Cbv),
            ResourceClass::ShaderResource => Some(Self::Srv),
            ResourceClass::UnorderedAccess => Some(Self::Uav),
            ResourceClass::Sampler => None,
        }
    }

    fn parameter(self, register: u32, visibility: ShaderVisibility) -> RootParameter {
        match self {
            Self::Cbv => RootParameter::ConstantBufferView {
                register,
                visibility,
            },
            Self::Srv => RootParameter::ShaderResourceView {
                register,
                visibility,
            },
            Self::Uav => RootParameter::UnorderedAccessView {
                register,
                visibility,
            },
        }
    }
}

impl RootParameter {

    pub fn visibility(&self) -> ShaderVisibility {
        match *self {
            RootParameter::DescriptorTable { visibility, .. }
            | RootParameter::ConstantBufferView { visibility, .. }
            | RootParameter::ShaderResourceView { visibility, .. }
            | RootParameter::UnorderedAccessView { visibility, .. } => visibility,
        }
    }

    pub fn is_descriptor_table(&self) -> bool {
        matches!(self, RootParameter::DescriptorTable { .. })
    }
}

/// Where a descriptor table's descriptors start within its heap's slice of lookup entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorTableLayout {
    pub heap_type: DescriptorHeapType,
    /// Index into [`ResourceMappings::resources`] or [`ResourceMappings::samplers`].
    pub offset: u32,
}

/// One heap descriptor a draw must supply: which shader register of which stage it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceBinding {
    pub view_type: ResourceClass,
    pub stage: ShaderStage,
    pub slot: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResourceMappings {
    root_parameters: Vec<RootParameter>,
    descriptor_ranges: Vec<DescriptorRange>,
    descriptor_tables: Vec<DescriptorTableLayout>,
    resources: Vec<ResourceBinding>,
    samplers: Vec<ResourceBinding>,
    shared_constant_buffers: Vec<u32>,
}

impl ResourceMappings {
    /// Plans the layout for `stages`, visited in the given order.
    pub fn build(
        stages: &[(ShaderStage, &ResourceRanges)],
        policy: &RangeMergePolicy,
    ) -> Result<Self, MappingError> {
        let mut builder = ResourceMappingBuilder::new(*policy);
        for &(stage, ranges) in stages {
            builder.append_stage(stage, ranges)?;
        }
        Ok(builder.finish())
    }

    pub fn root_parameters(&self) -> &[RootParameter] {
        &self.root_parameters
    }

    pub fn descriptor_ranges(&self) -> &[DescriptorRange] {
        &self.descriptor_ranges
    }

    pub fn descriptor_tables(&self) -> &[DescriptorTableLayout] {
        &self.descriptor_tables
    }

    pub fn resources(&self) -> &[ResourceBinding] {
        &self.resources
    }

    pub fn samplers(&self) -> &[ResourceBinding] {
        &self.samplers
    }

    /// Constant buffer registers bound once at root level for every stage.
    pub fn shared_constant_buffers(&self) -> &[u32] {
        &self.shared_constant_buffers
    }

    /// Descriptor ranges of a descriptor-table parameter; empty for root descriptors.
    pub fn table_ranges(&self, param: &RootParameter) -> &[DescriptorRange] {
        match *param {
            RootParameter::DescriptorTable {
                first_range,
                range_count,
                ..
            } => {
                let start = first_range as usize;
                self.descriptor_ranges
                    .get(start..start + range_count as usize)
                    .unwrap_or(&[])
            }
            _ => &[],
        }
    }

    /// Number of heap descriptors `param` consumes. Root descriptors live outside the heaps.
    pub fn heap_descriptor_count(&self, param: &RootParameter) -> u32 {
        self.table_ranges(param)
            .iter()
            .map(|r| r.num_descriptors)
            .sum()
    }

    /// `(root parameter index, table)` for every descriptor table backed by `heap_type`, in root
    /// parameter order.
    pub fn descriptor_tables_for_heap(
        &self,
        heap_type: DescriptorHeapType,
    ) -> impl Iterator<Item = (u32, &DescriptorTableLayout)> + '_ {
        self.root_parameters
            .iter()
            .enumerate()
            .filter_map(move |(index, param)| match *param {
                RootParameter::DescriptorTable { table, .. } => {
                    Some((index as u32, self.descriptor_tables.get(table as usize)?))
                }
                _ => None,
            })
            .filter(move |(_, table)| table.heap_type == heap_type)
    }

    /// `(root parameter index, parameter)` for every root descriptor.
    pub fn root_descriptors(&self) -> impl Iterator<Item = (u32, &RootParameter)> + '_ {
        self.root_parameters
            .iter()
            .enumerate()
            .filter(|(_, param)| !param.is_descriptor_table())
            .map(|(index, param)| (index as u32, param))
    }
}

/// Descriptor table being filled for the current stage.
#[derive(Debug)]
struct PendingTable {
    heap_type: DescriptorHeapType,
    first_range: usize,
    offset: usize,
    descriptors: u32,
}

/// Incremental form of [`ResourceMappings::build`]: one call to
/// [`append_stage`](Self::append_stage) per shader stage.
#[derive(Debug)]
pub struct ResourceMappingBuilder {
    policy: RangeMergePolicy,
    mappings: ResourceMappings,
}

impl ResourceMappingBuilder {
    pub fn new(policy: RangeMergePolicy) -> Self {
        Self {
            policy,
            mappings: ResourceMappings::default(),
        }
    }

    /// Appends the parameters of one stage. Classes are visited constant buffers first, then
    /// shader resources, unordered access views and samplers.
    ///
    /// Unused constant buffer, shader resource and unordered access ranges become one root
    /// descriptor per register. Shared constant buffer ranges become a single root constant
    /// buffer view visible to all stages, emitted only by the first stage that declares the
    /// register. Everything else goes into descriptor tables.
    pub fn append_stage(
        &mut self,
        stage: ShaderStage,
        ranges: &ResourceRanges,
    ) -> Result<(), MappingError> {
        let visibility = ShaderVisibility::for_stage(stage);
        let mut pending: Option<PendingTable> = None;

        for class in ResourceClass::ALL {
            let heap_type = DescriptorHeapType::for_class(class);
            if pending.as_ref().is_some_and(|t| t.heap_type != heap_type) {
                self.flush(&mut pending, visibility)?;
            }
            let merges = self.policy.merges(class);

            let root_kind = RootDescriptorKind::for_class(class);

            for range in ranges.class(class).ranges() {
                if let (false, Some(kind)) = (range.used, root_kind) {
                    for register in range.registers() {
                        self.push_root_parameter(kind.parameter(register, visibility))?;
                    }
                    continue;
                }

                if range.shared && class == ResourceClass::ConstantBuffer {
                    self.push_shared_constant_buffer(range.start)?;
                    continue;
                }

                if !merges {
                    self.flush(&mut pending, visibility)?;
                }
                let mappings = &self.mappings;
                let table = pending.get_or_insert_with(|| PendingTable {
                    heap_type,
                    first_range: mappings.descriptor_ranges.len(),
                    offset: match heap_type {
                        DescriptorHeapType::CbvSrvUav => mappings.resources.len(),
                        DescriptorHeapType::Sampler => mappings.samplers.len(),
                    },
                    descriptors: 0,
                });
                let offset_in_table = table.descriptors;
                table.descriptors = table.descriptors.saturating_add(range.length);
                self.push_table_range(class, stage, range, offset_in_table)?;
                if !merges {
                    self.flush(&mut pending, visibility)?;
                }
            }
        }

        self.flush(&mut pending, visibility)
    }

    pub fn finish(self) -> ResourceMappings {
        self.mappings
    }

    fn push_table_range(
        &mut self,
        class: ResourceClass,
        stage: ShaderStage,
        range: &BindRange,
        offset_in_table: u32,
    ) -> Result<(), MappingError> {
        let m = &mut self.mappings;
        check_capacity(m.descriptor_ranges.len(), MAX_DESCRIPTOR_RANGES, "descriptor ranges")?;
        m.descriptor_ranges.push(DescriptorRange {
            range_type: DescriptorRangeType::for_class(class),
            num_descriptors: range.length,
            base_register: range.start,
            register_space: 0,
            offset_in_table,
        });

        let (lookup, max, what) = match class {
            ResourceClass::Sampler => (&mut m.samplers, MAX_SAMPLERS, "samplers"),
            _ => (&mut m.resources, MAX_RESOURCES, "resources"),
        };
        for slot in range.registers() {
            check_capacity(lookup.len(), max, what)?;
            lookup.push(ResourceBinding {
                view_type: class,
                stage,
                slot,
            });
        }
        Ok(())
    }

    fn push_shared_constant_buffer(&mut self, register: u32) -> Result<(), MappingError> {
        if self.mappings.shared_constant_buffers.contains(&register) {
            return Ok(());
        }
        check_capacity(
            self.mappings.shared_constant_buffers.len(),
            MAX_SHARED_CONSTANT_BUFFERS,
            "shared constant buffers",
        )?;
        self.push_root_parameter(RootParameter::ConstantBufferView {
            register,
            visibility: ShaderVisibility::All,
        })?;
        self.mappings.shared_constant_buffers.push(register);
        Ok(())
    }

    fn push_root_parameter(&mut self, param: RootParameter) -> Result<(), MappingError> {
        check_capacity(
            self.mappings.root_parameters.len(),
            MAX_ROOT_PARAMETERS,
            "root parameters",
        )?;
        self.mappings.root_parameters.push(param);
        Ok(())
    }

    fn flush(
        &mut self,
        pending: &mut Option<PendingTable>,
        visibility: ShaderVisibility,
    ) -> Result<(), MappingError> {
        let Some(table) = pending.take() else {
            return Ok(());
        };
        let range_count = self.mappings.descriptor_ranges.len() - table.first_range;
        if range_count == 0 {
            return Ok(());
        }

        check_capacity(
            self.mappings.descriptor_tables.len(),
            MAX_DESCRIPTOR_TABLES,
            "descriptor tables",
        )?;
        let index = self.mappings.descriptor_tables.len() as u32;
        self.push_root_parameter(RootParameter::DescriptorTable {
            first_range: table.first_range as u32,
            range_count: range_count as u32,
            table: index,
            visibility,
        })?;
        self.mappings.descriptor_tables.push(DescriptorTableLayout {
            heap_type: table.heap_type,
            offset: table.offset as u32,
        });
        Ok(())
    }
}

fn check_capacity(len: usize, max: usize, what: &'static str) -> Result<(), MappingError> {
    if len >= max {
        return Err(MappingError::CapacityExceeded { what, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind_range::BindRangeSet;
    use pretty_assertions::assert_eq;

    fn set(ranges: impl IntoIterator<Item = BindRange>) -> BindRangeSet {
        ranges.into_iter().collect()
    }

    fn r(start: u32, length: u32) -> BindRange {
        BindRange::new(start, length, 0, 0)
    }

    fn total_heap_descriptors(m: &ResourceMappings) -> u32 {
        m.root_parameters()
            .iter()
            .map(|p| m.heap_descriptor_count(p))
            .sum()
    }

    #[test]
    fn visibility_is_stage_plus_one_wrapping_compute_to_all() {
        assert_eq!(
            ShaderVisibility::for_stage(ShaderStage::Vertex),
            ShaderVisibility::Vertex
        );
        assert_eq!(
            ShaderVisibility::for_stage(ShaderStage::Pixel),
            ShaderVisibility::Pixel
        );
        assert_eq!(
            ShaderVisibility::for_stage(ShaderStage::Compute),
            ShaderVisibility::All
        );
    }

    #[test]
    fn one_stage_gets_one_resource_table_and_one_sampler_table() {
        let ranges = ResourceRanges {
            constant_buffers: set([r(0, 2)]),
            input_resources: set([r(0, 1), r(4, 2)]),
            output_resources: BindRangeSet::new(),
            samplers: set([r(0, 1)]),
        };
        let m = ResourceMappings::build(
            &[(ShaderStage::Pixel, &ranges)],
            &RangeMergePolicy::default(),
        )
        .unwrap();

        assert_eq!(m.root_parameters().len(), 2);
        assert_eq!(
            m.descriptor_tables(),
            &[
                DescriptorTableLayout {
                    heap_type: DescriptorHeapType::CbvSrvUav,
                    offset: 0
                },
                DescriptorTableLayout {
                    heap_type: DescriptorHeapType::Sampler,
                    offset: 0
                },
            ]
        );

        let table = &m.root_parameters()[0];
        assert_eq!(table.visibility(), ShaderVisibility::Pixel);
        let offsets: Vec<_> = m
            .table_ranges(table)
            .iter()
            .map(|r| (r.range_type, r.base_register, r.offset_in_table))
            .collect();
        assert_eq!(
            offsets,
            vec![
                (DescriptorRangeType::Cbv, 0, 0),
                (DescriptorRangeType::Srv, 0, 2),
                (DescriptorRangeType::Srv, 4, 3),
            ]
        );
        assert_eq!(m.resources().len(), 5);
        assert_eq!(m.samplers().len(), 1);
        assert_eq!(total_heap_descriptors(&m), 6);
    }

    #[test]
    fn unused_ranges_become_per_register_root_descriptors() {
        let ranges = ResourceRanges {
            constant_buffers: set([r(0, 1), r(1, 2).unused()]),
            output_resources: set([r(0, 1).unused()]),
            samplers: set([r(0, 1).unused()]),
            ..Default::default()
        };
        let m = ResourceMappings::build(
            &[(ShaderStage::Vertex, &ranges)],
            &RangeMergePolicy::default(),
        )
        .unwrap();

        let vis = ShaderVisibility::Vertex;
        assert_eq!(
            m.root_parameters(),
            &[
                RootParameter::ConstantBufferView {
                    register: 1,
                    visibility: vis
                },
                RootParameter::ConstantBufferView {
                    register: 2,
                    visibility: vis
                },
                RootParameter::UnorderedAccessView {
                    register: 0,
                    visibility: vis
                },
                RootParameter::DescriptorTable {
                    first_range: 0,
                    range_count: 1,
                    table: 0,
                    visibility: vis
                },
                RootParameter::DescriptorTable {
                    first_range: 1,
                    range_count: 1,
                    table: 1,
                    visibility: vis
                },
            ]
        );
        assert_eq!(m.resources().len(), 1);
        assert_eq!(m.samplers().len(), 1);
        assert_eq!(m.root_descriptors().count(), 3);
    }

    #[test]
    fn only_samplers_lack_a_root_descriptor_kind() {
        let vis = ShaderVisibility::Hull;
        let params: Vec<_> = ResourceClass::ALL
            .into_iter()
            .map(|class| RootDescriptorKind::for_class(class).map(|k| k.parameter(7, vis)))
            .collect();
        assert_eq!(
            params,
            vec![
                Some(RootParameter::ConstantBufferView {
                    register: 7,
                    visibility: vis
                }),
                Some(RootParameter::ShaderResourceView {
                    register: 7,
                    visibility: vis
                }),
                Some(RootParameter::UnorderedAccessView {
                    register: 7,
                    visibility: vis
                }),
                None,
            ]
        );
    }

    #[test]
    fn shared_constant_buffers_are_first_writer_wins() {
        let vs = ResourceRanges {
            constant_buffers: set([r(0, 3).shared()]),
            ..Default::default()
        };
        let ps = vs.clone();
        let m = ResourceMappings::build(
            &[(ShaderStage::Vertex, &vs), (ShaderStage::Pixel, &ps)],
            &RangeMergePolicy::default(),
        )
        .unwrap();

        assert_eq!(
            m.root_parameters(),
            &[RootParameter::ConstantBufferView {
                register: 0,
                visibility: ShaderVisibility::All
            }]
        );
        assert_eq!(m.shared_constant_buffers(), &[0]);
        assert!(m.descriptor_tables().is_empty());
    }

    #[test]
    fn mergeable_constant_buffers_in_two_stages_use_two_tables() {
        let vs = ResourceRanges {
            constant_buffers: set([r(0, 3)]),
            ..Default::default()
        };
        let m = ResourceMappings::build(
            &[(ShaderStage::Vertex, &vs), (ShaderStage::Pixel, &vs)],
            &RangeMergePolicy::default(),
        )
        .unwrap();

        assert_eq!(m.root_parameters().len(), 2);
        assert_eq!(m.root_parameters()[0].visibility(), ShaderVisibility::Vertex);
        assert_eq!(m.root_parameters()[1].visibility(), ShaderVisibility::Pixel);
        assert_eq!(m.descriptor_tables()[1].offset, 3);
        assert_eq!(m.resources()[3].stage, ShaderStage::Pixel);
        assert_eq!(total_heap_descriptors(&m), 6);
    }

    #[test]
    fn non_merging_class_gets_a_table_per_range() {
        let ranges = ResourceRanges {
            constant_buffers: set([r(0, 1)]),
            input_resources: set([r(0, 1), r(2, 1)]),
            output_resources: set([r(0, 1)]),
            ..Default::default()
        };
        let policy = RangeMergePolicy {
            shader_resources: false,
            ..Default::default()
        };
        let m = ResourceMappings::build(&[(ShaderStage::Compute, &ranges)], &policy).unwrap();

        let counts: Vec<_> = m
            .root_parameters()
            .iter()
            .map(|p| m.table_ranges(p).len())
            .collect();
        assert_eq!(counts, vec![1, 1, 1, 1]);
        let offsets: Vec<_> = m.descriptor_tables().iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3]);
        assert!(m
            .root_parameters()
            .iter()
            .all(|p| p.visibility() == ShaderVisibility::All));
    }

    #[test]
    fn tables_are_enumerated_per_heap_in_root_order() {
        let ranges = ResourceRanges {
            constant_buffers: set([r(5, 1).unused(), r(0, 1)]),
            samplers: set([r(0, 2)]),
            ..Default::default()
        };
        let m = ResourceMappings::build(
            &[(ShaderStage::Vertex, &ranges), (ShaderStage::Pixel, &ranges)],
            &RangeMergePolicy::default(),
        )
        .unwrap();

        let samplers: Vec<_> = m
            .descriptor_tables_for_heap(DescriptorHeapType::Sampler)
            .map(|(index, table)| (index, table.offset))
            .collect();
        assert_eq!(samplers, vec![(2, 0), (5, 2)]);
        let resources: Vec<_> = m
            .descriptor_tables_for_heap(DescriptorHeapType::CbvSrvUav)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(resources, vec![1, 4]);
    }

    #[test]
    fn capacity_overflow_is_an_error() {
        let ranges = ResourceRanges {
            constant_buffers: set([r(0, 65).unused()]),
            ..Default::default()
        };
        let err = ResourceMappings::build(
            &[(ShaderStage::Vertex, &ranges)],
            &RangeMergePolicy::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MappingError::CapacityExceeded {
                what: "root parameters",
                max: MAX_ROOT_PARAMETERS
            }
        );

        let ranges = ResourceRanges {
            samplers: set([r(0, 33)]),
            ..Default::default()
        };
        let err = ResourceMappings::build(
            &[(ShaderStage::Pixel, &ranges)],
            &RangeMergePolicy::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MappingError::CapacityExceeded {
                what: "samplers",
                max: MAX_SAMPLERS
            }
        );
    }

    #[test]
    fn empty_stages_produce_empty_mappings() {
        let m = ResourceMappings::build(
            &[(ShaderStage::Vertex, &ResourceRanges::default())],
            &RangeMergePolicy::default(),
        )
        .unwrap();
        assert_eq!(m, ResourceMappings::default());
    }
}
