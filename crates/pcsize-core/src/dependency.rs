//! Dependency objects recorded during a session, and pruning of the ones no
//! pipeline reaches.

use std::collections::BTreeSet;

use pcsize_protocol::{DependencyKind, DependencyMaps, ProtocolError, SessionHandle};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{CoreError, CoreResult};

/// Dependency objects one pipeline names directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReferences {
    pub shader_modules: Vec<SessionHandle>,
    pub render_pass: Option<SessionHandle>,
    pub pipeline_layout: Option<SessionHandle>,
}

impl PipelineReferences {
    pub fn compute(shader_module: SessionHandle, pipeline_layout: SessionHandle) -> Self {
        Self {
            shader_modules: vec![shader_module],
            render_pass: None,
            pipeline_layout: Some(pipeline_layout),
        }
    }

    pub fn graphics(
        shader_modules: Vec<SessionHandle>,
        render_pass: SessionHandle,
        pipeline_layout: SessionHandle,
    ) -> Self {
        Self {
            shader_modules,
            render_pass: Some(render_pass),
            pipeline_layout: Some(pipeline_layout),
        }
    }

    /// Every (kind, handle) pair named here.
    pub fn handles(&self) -> impl Iterator<Item = (DependencyKind, SessionHandle)> + '_ {
        self.shader_modules
            .iter()
            .map(|h| (DependencyKind::ShaderModule, *h))
            .chain(self.render_pass.map(|h| (DependencyKind::RenderPass, h)))
            .chain(self.pipeline_layout.map(|h| (DependencyKind::PipelineLayout, h)))
    }
}

/// Session-scoped dependency descriptions, keyed by handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyCache {
    maps: DependencyMaps,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_maps(maps: DependencyMaps) -> Self {
        Self { maps }
    }

    pub fn maps(&self) -> &DependencyMaps {
        &self.maps
    }

    pub fn into_maps(self) -> DependencyMaps {
        self.maps
    }

    /// Store a description. Descriptions are stable for a run, so a known
    /// handle is left untouched. Returns `true` if the entry was new.
    pub fn insert_if_absent(
        &mut self,
        kind: DependencyKind,
        handle: SessionHandle,
        description: impl Into<String>,
    ) -> bool {
        let inserted = self.maps.insert_if_absent(kind, handle, description);
        if inserted {
            debug!(%kind, %handle, "recorded dependency");
        } else {
            trace!(%kind, %handle, "dependency already recorded");
        }
        inserted
    }

    pub fn lookup(&self, kind: DependencyKind, handle: SessionHandle) -> CoreResult<&str> {
        self.maps
            .get(kind, handle)
            .ok_or(CoreError::UnknownDependency { kind, handle })
    }

    pub fn len(&self, kind: DependencyKind) -> usize {
        self.maps.len(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Highest handle present in any map, or 0 when empty.
    pub fn max_handle(&self) -> u64 {
        DependencyKind::ALL
            .iter()
            .filter_map(|kind| self.maps.map(*kind).last_key_value())
            .map(|(handle, _)| handle.0)
            .max()
            .unwrap_or(0)
    }

    /// Fold in the maps of another session.
    ///
    /// Handles from different sessions collide, so `other` is shifted above
    /// this cache's highest handle first, including the handles its
    /// descriptions refer to. Returns the offset applied, or
    /// [`CoreError::HandleOverflow`] when a shifted handle leaves the `u64`
    /// range.
    pub fn merge(&mut self, other: DependencyMaps) -> CoreResult<u64> {
        let offset = self.max_handle();
        // Nothing is inserted until every entry has been rebased.
        let mut staged = Vec::with_capacity(other.total_len());
        for kind in DependencyKind::ALL {
            for (handle, description) in other.map(kind) {
                let rebased = rebase_handle(kind, *handle, offset)?;
                let description = if offset == 0 {
                    description.clone()
                } else {
                    rebase_description(kind, description, offset)?
                };
                staged.push((kind, rebased, description));
            }
        }
        for (kind, handle, description) in staged {
            self.maps.insert_if_absent(kind, handle, description);
        }
        debug!(offset, merged = other.total_len(), "merged dependency maps");
        Ok(offset)
    }

    /// Keep only entries of `kind` for which `keep` returns `true`.
    pub fn retain<F>(&mut self, kind: DependencyKind, mut keep: F)
    where
        F: FnMut(SessionHandle, &str) -> bool,
    {
        self.maps
            .map_mut(kind)
            .retain(|handle, description| keep(*handle, description));
    }

    /// Drop every entry no pipeline reaches.
    ///
    /// Roots are the objects pipelines name directly. Pipeline layouts reach
    /// descriptor-set layouts through `"setLayouts"`, which reach samplers
    /// through `"bindings"[*]."immutableSamplers"`. Returns the number of
    /// entries removed.
    pub fn prune_unreferenced<'a, I>(&mut self, pipelines: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = &'a PipelineReferences>,
    {
        let before = self.total_len();

        let mut shader_modules = BTreeSet::new();
        let mut render_passes = BTreeSet::new();
        let mut pipeline_layouts = BTreeSet::new();
        for references in pipelines {
            for (kind, handle) in references.handles() {
                match kind {
                    DependencyKind::ShaderModule => shader_modules.insert(handle),
                    DependencyKind::RenderPass => render_passes.insert(handle),
                    DependencyKind::PipelineLayout => pipeline_layouts.insert(handle),
                    DependencyKind::Sampler | DependencyKind::DescriptorSetLayout => false,
                };
            }
        }

        self.retain(DependencyKind::ShaderModule, |h, _| shader_modules.contains(&h));
        self.retain(DependencyKind::RenderPass, |h, _| render_passes.contains(&h));
        self.retain(DependencyKind::PipelineLayout, |h, _| pipeline_layouts.contains(&h));

        let mut set_layouts = BTreeSet::new();
        for description in self.maps.map(DependencyKind::PipelineLayout).values() {
            let layout: PipelineLayoutRefs = parse_description("pipeline layout", description)?;
            set_layouts.extend(layout.set_layouts);
        }
        self.retain(DependencyKind::DescriptorSetLayout, |h, _| set_layouts.contains(&h));

        let mut samplers = BTreeSet::new();
        for description in self.maps.map(DependencyKind::DescriptorSetLayout).values() {
            let layout: DescriptorSetLayoutRefs =
                parse_description("descriptor set layout", description)?;
            for binding in layout.bindings {
                samplers.extend(binding.immutable_samplers.into_iter().flatten().filter(|h| !h.is_null()));
            }
        }
        self.retain(DependencyKind::Sampler, |h, _| samplers.contains(&h));

        let removed = before - self.total_len();
        debug!(removed, kept = self.total_len(), "pruned unreferenced dependencies");
        Ok(removed)
    }

    fn total_len(&self) -> usize {
        self.maps.total_len()
    }
}

#[derive(Deserialize)]
struct PipelineLayoutRefs {
    #[serde(default, rename = "setLayouts")]
    set_layouts: Vec<SessionHandle>,
}

#[derive(Deserialize)]
struct DescriptorSetLayoutRefs {
    #[serde(default)]
    bindings: Vec<BindingRefs>,
}

#[derive(Deserialize)]
struct BindingRefs {
    #[serde(default, rename = "immutableSamplers")]
    immutable_samplers: Vec<Option<SessionHandle>>,
}

fn rebase_description(kind: DependencyKind, description: &str, offset: u64) -> CoreResult<String> {
    let record = match kind {
        DependencyKind::PipelineLayout => "pipeline layout",
        DependencyKind::DescriptorSetLayout => "descriptor set layout",
        DependencyKind::Sampler | DependencyKind::ShaderModule | DependencyKind::RenderPass => {
            return Ok(description.to_string())
        }
    };
    let mut value: serde_json::Value = parse_description(record, description)?;
    if kind == DependencyKind::PipelineLayout {
        shift_handles(DependencyKind::DescriptorSetLayout, value.get_mut("setLayouts"), offset)?;
    } else if let Some(bindings) = value.get_mut("bindings").and_then(|b| b.as_array_mut()) {
        for binding in bindings {
            shift_handles(DependencyKind::Sampler, binding.get_mut("immutableSamplers"), offset)?;
        }
    }
    serde_json::to_string(&value).map_err(|e| {
        CoreError::Protocol(ProtocolError::MalformedStructuredText {
            record,
            reason: e.to_string(),
        })
    })
}

fn rebase_handle(kind: DependencyKind, handle: SessionHandle, offset: u64) -> CoreResult<SessionHandle> {
    handle
        .0
        .checked_add(offset)
        .map(SessionHandle)
        .ok_or(CoreError::HandleOverflow { kind, handle, offset })
}

fn shift_handles(
    kind: DependencyKind,
    array: Option<&mut serde_json::Value>,
    offset: u64,
) -> CoreResult<()> {
    let Some(items) = array.and_then(|a| a.as_array_mut()) else {
        return Ok(());
    };
    for item in items {
        // Null handles stay null.
        if let Some(handle) = item.as_u64().filter(|h| *h != 0) {
            let rebased = rebase_handle(kind, SessionHandle(handle), offset)?;
            *item = serde_json::Value::from(rebased.0);
        }
    }
    Ok(())
}

fn parse_description<T: for<'de> Deserialize<'de>>(
    record: &'static str,
    description: &str,
) -> CoreResult<T> {
    serde_json::from_str(description).map_err(|e| {
        CoreError::Protocol(ProtocolError::MalformedStructuredText {
            record,
            reason: e.to_string(),
        })
    })
}
