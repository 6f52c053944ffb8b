use crate::bind_range::ResourceClass;

/// Controls how table-bound ranges of one stage are grouped into descriptor tables.
///
/// When a class merges, all of its table-bound ranges in a stage join the current descriptor
/// table even across register gaps. When it does not, every range of that class gets a
/// descriptor table of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeMergePolicy {
    pub constant_buffers: bool,
    pub shader_resources: bool,
    pub unordered_access: bool,
    pub samplers: bool,
}

impl RangeMergePolicy {
    pub fn merges(&self, class: ResourceClass) -> bool {
        match class {
            ResourceClass::ConstantBuffer => self.constant_buffers,
            ResourceClass::ShaderResource => self.shader_resources,
            ResourceClass::UnorderedAccess => self.unordered_access,
            ResourceClass::Sampler => self.samplers,
        }
    }
}

impl Default for RangeMergePolicy {
    fn default() -> Self {
        Self {
            constant_buffers: true,
            shader_resources: true,
            unordered_access: true,
            samplers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineCacheConfig {
    /// Key shaders by content hash instead of bytecode address.
    pub precise_dedup: bool,
    /// Compare full keys on every cache hit and fail on hash collisions.
    pub verify_collisions: bool,
    pub merge: RangeMergePolicy,
}

impl Default for PipelineCacheConfig {
    fn default() -> Self {
        Self {
            precise_dedup: true,
            verify_collisions: cfg!(debug_assertions),
            merge: RangeMergePolicy::default(),
        }
    }
}

impl PipelineCacheConfig {
    /// Defaults overridden by `AERO_D3D12_PRECISE_DEDUP` and `AERO_D3D12_VERIFY_COLLISIONS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_flag("AERO_D3D12_PRECISE_DEDUP") {
            config.precise_dedup = v;
        }
        if let Some(v) = env_flag("AERO_D3D12_VERIFY_COLLISIONS") {
            config.verify_collisions = v;
        }
        config
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectionConfig {
    /// Constant buffer registers bound identically in every stage (per-frame/per-view data).
    /// These become root descriptors visible to all stages.
    pub shared_constant_buffer_slots: Vec<u32>,
}

impl ReflectionConfig {
    /// Defaults overridden by `AERO_D3D12_SHARED_CB_SLOTS` (comma-separated registers).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("AERO_D3D12_SHARED_CB_SLOTS") {
            config.shared_constant_buffer_slots = parse_slot_list(&raw);
        }
        config
    }

    pub fn is_shared_constant_buffer(&self, register: u32) -> bool {
        self.shared_constant_buffer_slots.contains(&register)
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    parse_flag(&raw)
}

fn parse_flag(raw: &str) -> Option<bool> {
    let v = raw.trim();
    if v == "1"
        || v.eq_ignore_ascii_case("true")
        || v.eq_ignore_ascii_case("yes")
        || v.eq_ignore_ascii_case("on")
    {
        Some(true)
    } else if v == "0"
        || v.eq_ignore_ascii_case("false")
        || v.eq_ignore_ascii_case("no")
        || v.eq_ignore_ascii_case("off")
    {
        Some(false)
    } else {
        tracing::warn!("ignoring unrecognized boolean value {v:?}");
        None
    }
}

fn parse_slot_list(raw: &str) -> Vec<u32> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(slot) => Some(slot),
            Err(_) => {
                tracing::warn!("ignoring invalid constant buffer slot {s:?}");
                None
            }
        })
        .collect()
}
