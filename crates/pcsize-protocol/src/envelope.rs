use tracing::debug;

use crate::accounting::CommandPoolAccounting;
use crate::codec::{Wire, WireReader, WireStream, WireWriter};
use crate::dependency::DependencyMaps;
use crate::error::{ProtocolError, ProtocolResult};
use crate::pipeline::PipelineDescription;
use crate::reservation::ReservationSizingRecord;

/// Version of the binary layout and of the canonical text form.
pub const FORMAT_VERSION: u32 = 1;

/// Everything the offline service needs to rebuild the pipeline cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineCacheInput {
    pub dependencies: DependencyMaps,
    pub pipelines: Vec<PipelineDescription>,
}

impl Wire for PipelineCacheInput {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        self.dependencies.wire(s)?;
        self.pipelines.wire(s)
    }
}

/// Top-level unit exchanged with the offline sizing/compilation service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmissionEnvelope {
    pub cache_input: PipelineCacheInput,
    pub reservation: ReservationSizingRecord,
    /// Ordered by pool id.
    pub command_pools: Vec<CommandPoolAccounting>,
}

impl TransmissionEnvelope {
    /// Encode without consuming; works on a clone of `self`.
    pub fn to_bytes(&self) -> ProtocolResult<Vec<u8>> {
        self.clone().into_bytes()
    }

    pub fn into_bytes(mut self) -> ProtocolResult<Vec<u8>> {
        let mut writer = WireWriter::new();
        self.wire(&mut writer)?;
        debug!(
            bytes = writer.len(),
            pipelines = self.cache_input.pipelines.len(),
            pools = self.command_pools.len(),
            "encoded transmission envelope"
        );
        Ok(writer.into_bytes())
    }

    /// Decode a complete envelope. Any failure, including trailing bytes,
    /// rejects the whole buffer.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let mut reader = WireReader::new(bytes);
        let mut envelope = Self::default();
        envelope.wire(&mut reader)?;
        reader.finish().map_err(|e| e.in_stage("trailer"))?;
        Ok(envelope)
    }
}

impl Wire for TransmissionEnvelope {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        let mut version = FORMAT_VERSION;
        s.u32(&mut version).map_err(|e| e.in_stage("version"))?;
        if version != FORMAT_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                expected: FORMAT_VERSION,
                found: version,
            }
            .in_stage("version"));
        }
        self.cache_input
            .wire(s)
            .map_err(|e| e.in_stage("cache input"))?;
        self.reservation
            .wire(s)
            .map_err(|e| e.in_stage("reservation"))?;
        self.command_pools
            .wire(s)
            .map_err(|e| e.in_stage("command pools"))
    }
}
