//! Per-stage register ranges, coalesced as they are registered.

use std::ops::Range;

/// The four register classes a shader can bind, in the order root-signature layouts visit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceClass {
    /// `b#`
    ConstantBuffer,
    /// `t#`
    ShaderResource,
    /// `u#`
    UnorderedAccess,
    /// `s#`
    Sampler,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 4] = [
        ResourceClass::ConstantBuffer,
        ResourceClass::ShaderResource,
        ResourceClass::UnorderedAccess,
        ResourceClass::Sampler,
    ];
}

/// A run of consecutive registers of one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindRange {
    pub start: u32,
    pub length: u32,
    /// `D3D_SHADER_INPUT_TYPE` of the first resource in the range.
    pub resource_type: u32,
    /// `D3D_SRV_DIMENSION` of the first resource in the range.
    pub dimension: u32,
    pub used: bool,
    pub shared: bool,
    pub unmergeable: bool,
}

impl BindRange {
    /// A used, mergeable, non-shared range.
    pub fn new(start: u32, length: u32, resource_type: u32, dimension: u32) -> Self {
        Self {
            start,
            length,
            resource_type,
            dimension,
            used: true,
            shared: false,
            unmergeable: false,
        }
    }

    pub fn unused(mut self) -> Self {
        self.used = false;
        self
    }

    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    pub fn unmergeable(mut self) -> Self {
        self.unmergeable = true;
        self
    }

    /// One past the last register, clamped to `u32::MAX`.
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.length)
    }

    pub fn registers(&self) -> Range<u32> {
        self.start..self.end()
    }

    fn can_absorb(&self, next: &BindRange) -> bool {
        !self.unmergeable
            && !self.shared
            && !next.unmergeable
            && !next.shared
            && self.used == next.used
            && self.start.checked_add(self.length) == Some(next.start)
            && next.start.checked_add(next.length).is_some()
    }
}

/// Ordered ranges for one register class of one shader.
///
/// Only the most recently added range is considered when merging, so ranges must be added in
/// ascending register order to get minimal output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BindRangeSet {
    ranges: Vec<BindRange>,
    total_length: u32,
}

impl BindRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `range`, folding it into the previous range when the two abut and neither is shared
    /// or unmergeable.
    pub fn add(&mut self, range: BindRange) {
        self.total_length = self.total_length.saturating_add(range.length);
        match self.ranges.last_mut() {
            Some(last) if last.can_absorb(&range) => last.length += range.length,
            _ => self.ranges.push(range),
        }
    }

    pub fn ranges(&self) -> &[BindRange] {
        &self.ranges
    }

    /// Number of registers across all ranges.
    pub fn total_length(&self) -> u32 {
        self.total_length
    }

    pub fn is_empty(&self) -> bool {
        self.total_length == 0
    }
}

impl FromIterator<BindRange> for BindRangeSet {
    fn from_iter<I: IntoIterator<Item = BindRange>>(iter: I) -> Self {
        let mut set = BindRangeSet::new();
        for range in iter {
            set.add(range);
        }
        set
    }
}
