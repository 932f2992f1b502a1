use serde::{Deserialize, Serialize};

use crate::codec::{Wire, WireStream};
use crate::error::ProtocolResult;
use crate::wire_enum;

/// A session-local key naming a dependency object.
///
/// Handles are indices issued by one recording session. They are only ever
/// used as map keys and are meaningless on the other side of the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
         Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(pub u64);

impl SessionHandle {
    /// Create a null/invalid handle.
    pub fn null() -> Self {
        Self(0)
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Wire for SessionHandle {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        s.u64(&mut self.0)
    }
}

/// Object kinds a pipeline may depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum DependencyKind {
    #[default]
    Sampler = 0,
    ShaderModule = 1,
    RenderPass = 2,
    PipelineLayout = 3,
    DescriptorSetLayout = 4,
}

wire_enum!(DependencyKind {
    Sampler,
    ShaderModule,
    RenderPass,
    PipelineLayout,
    DescriptorSetLayout,
});

impl DependencyKind {
    pub const ALL: [DependencyKind; 5] = [
        DependencyKind::Sampler,
        DependencyKind::ShaderModule,
        DependencyKind::RenderPass,
        DependencyKind::PipelineLayout,
        DependencyKind::DescriptorSetLayout,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DependencyKind::Sampler => "sampler",
            DependencyKind::ShaderModule => "shader module",
            DependencyKind::RenderPass => "render pass",
            DependencyKind::PipelineLayout => "pipeline layout",
            DependencyKind::DescriptorSetLayout => "descriptor set layout",
        }
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
