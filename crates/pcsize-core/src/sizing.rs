//! Reservation sizing from observed peaks.
//!
//! Every field of the computed record is an upper bound on what the replayed
//! workload can use at once. Summing per-pipeline peaks over-counts when
//! pipelines were never live together, which is the safe direction.

use std::collections::BTreeMap;

use pcsize_protocol::{
    DependencyKind, DependencyMaps, OfflineCompileIdentity, PipelinePoolSize,
    ReservationSizingRecord,
};
use pcsize_protocol::reservation::MatchControl;
use tracing::info;

use crate::config::SizingConfig;
use crate::error::{CoreError, CoreResult};
use crate::ledger::PipelineLedger;
use crate::resource::ResourceLedger;

/// Pool entry size for a compiled blob: aligned up, never below the minimum.
pub fn pool_entry_size(blob_len: usize, config: &SizingConfig) -> u64 {
    let align = config.pool_entry_alignment.max(1);
    let len = blob_len as u64;
    let aligned = len.div_ceil(align).saturating_mul(align);
    aligned.max(config.min_pool_entry_size)
}

fn pad(value: u64, headroom_percent: u32) -> u64 {
    let extra = value
        .saturating_mul(u64::from(headroom_percent))
        .div_ceil(100);
    value.saturating_add(extra)
}

fn pad32(value: u64, headroom_percent: u32) -> u32 {
    u32::try_from(pad(value, headroom_percent)).unwrap_or(u32::MAX)
}

/// Compute the reservation covering everything the ledgers observed, plus
/// the configured headroom.
pub fn compute_reservation(
    pipelines: &PipelineLedger,
    dependencies: &DependencyMaps,
    pools: &ResourceLedger,
    config: &SizingConfig,
) -> ReservationSizingRecord {
    let headroom = config.headroom_percent;

    let mut groups: BTreeMap<u64, u64> = BTreeMap::new();
    let mut identities = Vec::with_capacity(pipelines.len());
    let mut pipeline_requests = 0u64;
    let mut cache_bytes = 0u64;
    for pipeline in pipelines.iter() {
        let entry_size = pool_entry_size(pipeline.compiled_blob.len(), config);
        let peak = u64::from(pipeline.peak_ref_count);
        *groups.entry(entry_size).or_default() += peak;
        pipeline_requests += peak;
        cache_bytes = cache_bytes.saturating_add(entry_size);
        identities.push(OfflineCompileIdentity {
            pipeline_identifier: pipeline.identifier,
            match_control: MatchControl::ApplicationUuidExact,
            pool_entry_size: entry_size,
        });
    }

    let pipeline_pool_sizes = groups
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(pool_entry_size, count)| PipelinePoolSize {
            pool_entry_size,
            pool_entry_count: pad32(count, headroom),
        })
        .collect();

    let dep = |kind| pad32(dependencies.len(kind) as u64, headroom);
    let record = ReservationSizingRecord {
        pipeline_cache_request_count: u32::from(!pipelines.is_empty()),
        pipeline_request_count: pad32(pipeline_requests, headroom),
        sampler_request_count: dep(DependencyKind::Sampler),
        shader_module_request_count: dep(DependencyKind::ShaderModule),
        render_pass_request_count: dep(DependencyKind::RenderPass),
        pipeline_layout_request_count: dep(DependencyKind::PipelineLayout),
        descriptor_set_layout_request_count: dep(DependencyKind::DescriptorSetLayout),
        command_pool_request_count: pad32(pools.len() as u64, headroom),
        command_buffer_request_count: pad32(
            pools.iter().map(|p| u64::from(p.buffer_count)).sum(),
            headroom,
        ),
        command_pool_reserved_bytes: pad(
            pools.iter().map(|p| p.peak_pool_reserved).fold(0, u64::saturating_add),
            headroom,
        ),
        command_pool_allocated_bytes: pad(
            pools.iter().map(|p| p.peak_pool_allocated).fold(0, u64::saturating_add),
            headroom,
        ),
        max_command_buffer_bytes: pad(
            pools.iter().map(|p| p.peak_buffer_allocated).max().unwrap_or(0),
            headroom,
        ),
        max_pipeline_cache_bytes: pad(cache_bytes, headroom),
        pipeline_pool_sizes,
        pipeline_identities: identities,
    };

    info!(
        pipelines = pipelines.len(),
        pipeline_requests = record.pipeline_request_count,
        pools = record.command_pool_request_count,
        cache_bytes = record.max_pipeline_cache_bytes,
        "computed reservation"
    );
    record
}

/// Check that `record` covers everything the ledgers observed.
///
/// Fails with [`CoreError::Undersized`] on the first field that falls short.
pub fn verify_reservation(
    record: &ReservationSizingRecord,
    pipelines: &PipelineLedger,
    dependencies: &DependencyMaps,
    pools: &ResourceLedger,
    config: &SizingConfig,
) -> CoreResult<()> {
    let unpadded = SizingConfig {
        headroom_percent: 0,
        ..config.clone()
    };
    let required = compute_reservation(pipelines, dependencies, pools, &unpadded);

    let scalars: [(&'static str, u64, u64); 13] = [
        (
            "pipeline_cache_request_count",
            record.pipeline_cache_request_count.into(),
            required.pipeline_cache_request_count.into(),
        ),
        (
            "pipeline_request_count",
            record.pipeline_request_count.into(),
            required.pipeline_request_count.into(),
        ),
        (
            "sampler_request_count",
            record.sampler_request_count.into(),
            required.sampler_request_count.into(),
        ),
        (
            "shader_module_request_count",
            record.shader_module_request_count.into(),
            required.shader_module_request_count.into(),
        ),
        (
            "render_pass_request_count",
            record.render_pass_request_count.into(),
            required.render_pass_request_count.into(),
        ),
        (
            "pipeline_layout_request_count",
            record.pipeline_layout_request_count.into(),
            required.pipeline_layout_request_count.into(),
        ),
        (
            "descriptor_set_layout_request_count",
            record.descriptor_set_layout_request_count.into(),
            required.descriptor_set_layout_request_count.into(),
        ),
        (
            "command_pool_request_count",
            record.command_pool_request_count.into(),
            required.command_pool_request_count.into(),
        ),
        (
            "command_buffer_request_count",
            record.command_buffer_request_count.into(),
            required.command_buffer_request_count.into(),
        ),
        (
            "command_pool_reserved_bytes",
            record.command_pool_reserved_bytes,
            required.command_pool_reserved_bytes,
        ),
        (
            "command_pool_allocated_bytes",
            record.command_pool_allocated_bytes,
            required.command_pool_allocated_bytes,
        ),
        (
            "max_command_buffer_bytes",
            record.max_command_buffer_bytes,
            required.max_command_buffer_bytes,
        ),
        (
            "max_pipeline_cache_bytes",
            record.max_pipeline_cache_bytes,
            required.max_pipeline_cache_bytes,
        ),
    ];
    for (field, reserved, required) in scalars {
        if reserved < required {
            return Err(CoreError::Undersized {
                field,
                reserved,
                required,
            });
        }
    }

    // Entries of size >= s must cover every pipeline needing size >= s.
    for threshold in required.pipeline_pool_sizes.iter().map(|p| p.pool_entry_size) {
        let needed = entries_at_least(&required.pipeline_pool_sizes, threshold);
        let available = entries_at_least(&record.pipeline_pool_sizes, threshold);
        if available < needed {
            return Err(CoreError::Undersized {
                field: "pipeline_pool_sizes",
                reserved: available,
                required: needed,
            });
        }
    }

    for pipeline in pipelines.iter() {
        let needed = pool_entry_size(pipeline.compiled_blob.len(), &unpadded);
        let covered = record.pipeline_identities.iter().any(|identity| {
            identity.pipeline_identifier == pipeline.identifier
                && identity.pool_entry_size >= needed
        });
        if !covered {
            return Err(CoreError::Undersized {
                field: "pipeline_identities",
                reserved: record.pipeline_identities.len() as u64,
                required: pipelines.len() as u64,
            });
        }
    }

    Ok(())
}

fn entries_at_least(sizes: &[PipelinePoolSize], threshold: u64) -> u64 {
    sizes
        .iter()
        .filter(|p| p.pool_entry_size >= threshold)
        .map(|p| u64::from(p.pool_entry_count))
        .sum()
}
