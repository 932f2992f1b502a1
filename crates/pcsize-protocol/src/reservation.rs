use serde::{Deserialize, Serialize};

use crate::codec::{Wire, WireStream};
use crate::error::ProtocolResult;
use crate::pipeline::PipelineIdentifier;
use crate::text::{wire_text, StructuredText};

/// How the runtime matches an offline-compiled pipeline to its identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchControl {
    #[default]
    #[serde(rename = "application_uuid_exact")]
    ApplicationUuidExact,
}

/// Identity of one pipeline compiled by the offline service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineCompileIdentity {
    pub pipeline_identifier: PipelineIdentifier,
    #[serde(default)]
    pub match_control: MatchControl,
    pub pool_entry_size: u64,
}

impl StructuredText for OfflineCompileIdentity {
    const RECORD: &'static str = "OfflineCompileIdentity";
}

impl Wire for OfflineCompileIdentity {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        wire_text(self, s)
    }
}

/// A group of pipeline pool entries of one size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePoolSize {
    pub pool_entry_size: u64,
    pub pool_entry_count: u32,
}

impl Wire for PipelinePoolSize {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        s.u64(&mut self.pool_entry_size)?;
        s.u32(&mut self.pool_entry_count)
    }
}

/// Static resource budget for an allocation-free runtime, derived from
/// observed peaks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSizingRecord {
    pub pipeline_cache_request_count: u32,
    pub pipeline_request_count: u32,
    pub sampler_request_count: u32,
    pub shader_module_request_count: u32,
    pub render_pass_request_count: u32,
    pub pipeline_layout_request_count: u32,
    pub descriptor_set_layout_request_count: u32,
    pub command_pool_request_count: u32,
    pub command_buffer_request_count: u32,
    pub command_pool_reserved_bytes: u64,
    pub command_pool_allocated_bytes: u64,
    pub max_command_buffer_bytes: u64,
    pub max_pipeline_cache_bytes: u64,
    pub pipeline_pool_sizes: Vec<PipelinePoolSize>,
    pub pipeline_identities: Vec<OfflineCompileIdentity>,
}

impl Wire for ReservationSizingRecord {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        s.u32(&mut self.pipeline_cache_request_count)?;
        s.u32(&mut self.pipeline_request_count)?;
        s.u32(&mut self.sampler_request_count)?;
        s.u32(&mut self.shader_module_request_count)?;
        s.u32(&mut self.render_pass_request_count)?;
        s.u32(&mut self.pipeline_layout_request_count)?;
        s.u32(&mut self.descriptor_set_layout_request_count)?;
        s.u32(&mut self.command_pool_request_count)?;
        s.u32(&mut self.command_buffer_request_count)?;
        s.u64(&mut self.command_pool_reserved_bytes)?;
        s.u64(&mut self.command_pool_allocated_bytes)?;
        s.u64(&mut self.max_command_buffer_bytes)?;
        s.u64(&mut self.max_pipeline_cache_bytes)?;
        self.pipeline_pool_sizes.wire(s)?;
        self.pipeline_identities.wire(s)
    }
}
