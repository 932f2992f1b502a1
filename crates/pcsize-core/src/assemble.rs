//! Packing ledgers into a transmission envelope and back.

use pcsize_protocol::{
    DependencyMaps, PipelineCacheInput, ReservationSizingRecord, TransmissionEnvelope,
};
use tracing::info;

use crate::config::SizingConfig;
use crate::dependency::DependencyCache;
use crate::error::CoreResult;
use crate::ledger::PipelineLedger;
use crate::resource::ResourceLedger;
use crate::sizing::{compute_reservation, verify_reservation};

/// Ledgers recovered from an envelope.
#[derive(Debug, Clone, Default)]
pub struct DecodedLedgers {
    pub pipelines: PipelineLedger,
    pub dependencies: DependencyCache,
    pub pools: ResourceLedger,
    pub reservation: ReservationSizingRecord,
}

/// Size the reservation for the given ledgers, check it, and pack everything
/// into one envelope.
pub fn build_envelope(
    pipelines: PipelineLedger,
    dependencies: DependencyMaps,
    pools: ResourceLedger,
    config: &SizingConfig,
) -> CoreResult<TransmissionEnvelope> {
    let reservation = compute_reservation(&pipelines, &dependencies, &pools, config);
    verify_reservation(&reservation, &pipelines, &dependencies, &pools, config)?;

    info!(
        pipelines = pipelines.len(),
        dependencies = dependencies.total_len(),
        pools = pools.len(),
        "assembled envelope"
    );
    Ok(TransmissionEnvelope {
        cache_input: PipelineCacheInput {
            dependencies,
            pipelines: pipelines.into_descriptions(),
        },
        reservation,
        command_pools: pools.into_accounting(),
    })
}

/// Unpack an envelope into ledgers that can be merged or re-sized.
pub fn split_envelope(envelope: TransmissionEnvelope) -> DecodedLedgers {
    DecodedLedgers {
        pipelines: PipelineLedger::from_descriptions(envelope.cache_input.pipelines),
        dependencies: DependencyCache::from_maps(envelope.cache_input.dependencies),
        pools: ResourceLedger::from_accounting(envelope.command_pools),
        reservation: envelope.reservation,
    }
}

impl DecodedLedgers {
    /// Fold another shard in. The carried reservation no longer describes
    /// the merged ledgers and is cleared; re-size after merging.
    pub fn merge(&mut self, other: DecodedLedgers) -> CoreResult<()> {
        self.pipelines.merge(other.pipelines);
        self.dependencies.merge(other.dependencies.into_maps())?;
        self.pools.merge(other.pools);
        self.reservation = ReservationSizingRecord::default();
        Ok(())
    }

    /// Check the carried reservation against the carried ledgers.
    pub fn verify(&self, config: &SizingConfig) -> CoreResult<()> {
        verify_reservation(
            &self.reservation,
            &self.pipelines,
            self.dependencies.maps(),
            &self.pools,
            config,
        )
    }

    /// Reservation the carried ledgers call for under `config`.
    pub fn required_reservation(&self, config: &SizingConfig) -> ReservationSizingRecord {
        compute_reservation(&self.pipelines, self.dependencies.maps(), &self.pools, config)
    }

    pub fn into_envelope(self, config: &SizingConfig) -> CoreResult<TransmissionEnvelope> {
        build_envelope(
            self.pipelines,
            self.dependencies.into_maps(),
            self.pools,
            config,
        )
    }
}
