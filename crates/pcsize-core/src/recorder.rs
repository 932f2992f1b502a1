//! Recording front end used by a test harness while it replays a workload.

use std::collections::BTreeMap;

use pcsize_protocol::{
    CommandPoolAccounting, DependencyKind, FeatureSet, PipelineDescription, PipelineIdentifier,
    SessionHandle, TransmissionEnvelope,
};
use pcsize_protocol::pipeline::PIPELINE_IDENTIFIER_SIZE;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::assemble::build_envelope;
use crate::config::SizingConfig;
use crate::dependency::{DependencyCache, PipelineReferences};
use crate::error::CoreResult;
use crate::handle_arena::HandleArena;
use crate::ledger::PipelineLedger;
use crate::resource::ResourceLedger;

/// Derive a pipeline identifier from the test that created it and its
/// creation parameters.
pub fn derive_identifier(test_path: &str, create_info_json: &str) -> PipelineIdentifier {
    let mut hasher = Sha256::new();
    hasher.update(test_path.as_bytes());
    hasher.update(b":");
    hasher.update(create_info_json.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; PIPELINE_IDENTIFIER_SIZE];
    bytes.copy_from_slice(&digest[..PIPELINE_IDENTIFIER_SIZE]);
    PipelineIdentifier::from_bytes(bytes)
}

/// Collects everything one session creates and turns it into an envelope.
#[derive(Debug, Default)]
pub struct CacheRecorder {
    test_path: String,
    handles: HandleArena,
    dependencies: DependencyCache,
    pipelines: PipelineLedger,
    references: BTreeMap<PipelineIdentifier, PipelineReferences>,
    pools: ResourceLedger,
}

impl CacheRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start attributing pipelines to `test_path`.
    pub fn begin_test(&mut self, test_path: impl Into<String>) {
        self.test_path = test_path.into();
        debug!(test = %self.test_path, "begin test");
    }

    pub fn current_test(&self) -> &str {
        &self.test_path
    }

    fn create_dependency(&mut self, kind: DependencyKind, json: impl Into<String>) -> SessionHandle {
        let handle = self.handles.alloc();
        self.dependencies.insert_if_absent(kind, handle, json);
        handle
    }

    pub fn create_sampler(&mut self, json: impl Into<String>) -> SessionHandle {
        self.create_dependency(DependencyKind::Sampler, json)
    }

    pub fn create_shader_module(&mut self, json: impl Into<String>) -> SessionHandle {
        self.create_dependency(DependencyKind::ShaderModule, json)
    }

    pub fn create_render_pass(&mut self, json: impl Into<String>) -> SessionHandle {
        self.create_dependency(DependencyKind::RenderPass, json)
    }

    pub fn create_pipeline_layout(&mut self, json: impl Into<String>) -> SessionHandle {
        self.create_dependency(DependencyKind::PipelineLayout, json)
    }

    pub fn create_descriptor_set_layout(&mut self, json: impl Into<String>) -> SessionHandle {
        self.create_dependency(DependencyKind::DescriptorSetLayout, json)
    }

    /// Record a pipeline creation. Every referenced object must have been
    /// created through this recorder.
    pub fn create_pipeline(
        &mut self,
        create_info_json: &str,
        references: PipelineReferences,
        compiled_blob: Vec<u8>,
        required_features: FeatureSet,
        required_extensions: Vec<String>,
    ) -> CoreResult<PipelineIdentifier> {
        for (kind, handle) in references.handles() {
            self.dependencies.lookup(kind, handle)?;
        }

        let identifier = derive_identifier(&self.test_path, create_info_json);
        self.pipelines.upsert(
            identifier,
            compiled_blob,
            required_features,
            required_extensions,
            &self.test_path,
        );
        self.references.entry(identifier).or_insert(references);
        Ok(identifier)
    }

    pub fn destroy_pipeline(&mut self, identifier: &PipelineIdentifier) -> CoreResult<()> {
        self.pipelines.release(identifier)?;
        Ok(())
    }

    pub fn command_pool_delta(
        &mut self,
        pool_id: u64,
        pool_alloc_delta: i64,
        pool_reserved_delta: i64,
        buffer_alloc_delta: i64,
    ) -> &CommandPoolAccounting {
        self.pools
            .record_delta(pool_id, pool_alloc_delta, pool_reserved_delta, buffer_alloc_delta)
    }

    pub fn allocate_command_buffers(&mut self, pool_id: u64, count: u32) -> &CommandPoolAccounting {
        self.pools.allocate_command_buffers(pool_id, count)
    }

    pub fn reset_command_pool(&mut self, pool_id: u64) -> &CommandPoolAccounting {
        self.pools.reset(pool_id)
    }

    pub fn pipeline(&self, identifier: &PipelineIdentifier) -> Option<&PipelineDescription> {
        self.pipelines.get(identifier)
    }

    pub fn pipelines(&self) -> &PipelineLedger {
        &self.pipelines
    }

    pub fn dependencies(&self) -> &DependencyCache {
        &self.dependencies
    }

    pub fn pools(&self) -> &ResourceLedger {
        &self.pools
    }

    /// Drop unreachable dependencies, size the reservation and pack the
    /// envelope.
    pub fn finish(mut self, config: &SizingConfig) -> CoreResult<TransmissionEnvelope> {
        let pruned = self.dependencies.prune_unreferenced(self.references.values())?;
        info!(
            handles = self.handles.issued(),
            pruned,
            pipelines = self.pipelines.len(),
            "recording finished"
        );
        build_envelope(
            self.pipelines,
            self.dependencies.into_maps(),
            self.pools,
            config,
        )
    }
}
