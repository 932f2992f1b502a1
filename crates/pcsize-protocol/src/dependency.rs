use std::collections::BTreeMap;

use crate::codec::{Wire, WireStream};
use crate::error::ProtocolResult;
use crate::handle::{DependencyKind, SessionHandle};

/// Textual descriptions of the objects pipelines depend on, one map per
/// object kind.
///
/// Maps are ordered by handle so the encoded form is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMaps {
    samplers: BTreeMap<SessionHandle, String>,
    shader_modules: BTreeMap<SessionHandle, String>,
    render_passes: BTreeMap<SessionHandle, String>,
    pipeline_layouts: BTreeMap<SessionHandle, String>,
    descriptor_set_layouts: BTreeMap<SessionHandle, String>,
}

impl DependencyMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self, kind: DependencyKind) -> &BTreeMap<SessionHandle, String> {
        match kind {
            DependencyKind::Sampler => &self.samplers,
            DependencyKind::ShaderModule => &self.shader_modules,
            DependencyKind::RenderPass => &self.render_passes,
            DependencyKind::PipelineLayout => &self.pipeline_layouts,
            DependencyKind::DescriptorSetLayout => &self.descriptor_set_layouts,
        }
    }

    pub fn map_mut(&mut self, kind: DependencyKind) -> &mut BTreeMap<SessionHandle, String> {
        match kind {
            DependencyKind::Sampler => &mut self.samplers,
            DependencyKind::ShaderModule => &mut self.shader_modules,
            DependencyKind::RenderPass => &mut self.render_passes,
            DependencyKind::PipelineLayout => &mut self.pipeline_layouts,
            DependencyKind::DescriptorSetLayout => &mut self.descriptor_set_layouts,
        }
    }

    /// Insert a description unless the handle is already present.
    /// Returns `true` if the entry was inserted.
    pub fn insert_if_absent(
        &mut self,
        kind: DependencyKind,
        handle: SessionHandle,
        description: impl Into<String>,
    ) -> bool {
        let map = self.map_mut(kind);
        if map.contains_key(&handle) {
            return false;
        }
        map.insert(handle, description.into());
        true
    }

    pub fn get(&self, kind: DependencyKind, handle: SessionHandle) -> Option<&str> {
        self.map(kind).get(&handle).map(String::as_str)
    }

    pub fn len(&self, kind: DependencyKind) -> usize {
        self.map(kind).len()
    }

    pub fn total_len(&self) -> usize {
        DependencyKind::ALL.iter().map(|k| self.len(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}

impl Wire for DependencyMaps {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        self.samplers.wire(s)?;
        self.shader_modules.wire(s)?;
        self.render_passes.wire(s)?;
        self.pipeline_layouts.wire(s)?;
        self.descriptor_set_layouts.wire(s)
    }
}
