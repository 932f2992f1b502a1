//! Human and JSON summaries of an envelope.

use pcsize_protocol::{DependencyKind, ReservationSizingRecord, TransmissionEnvelope};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct EnvelopeSummary {
    pub dependencies: Vec<DependencyCount>,
    pub pipelines: Vec<PipelineSummary>,
    pub command_pools: usize,
    pub reservation: ReservationSizingRecord,
}

#[derive(Debug, Serialize)]
pub struct DependencyCount {
    pub kind: &'static str,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PipelineSummary {
    pub identifier: String,
    pub blob_bytes: usize,
    pub tests: Vec<String>,
    pub current: u32,
    pub peak: u32,
    pub total: u32,
}

pub fn summarize(envelope: &TransmissionEnvelope) -> EnvelopeSummary {
    let maps = &envelope.cache_input.dependencies;
    EnvelopeSummary {
        dependencies: DependencyKind::ALL
            .iter()
            .map(|kind| DependencyCount {
                kind: kind.name(),
                count: maps.len(*kind),
            })
            .collect(),
        pipelines: envelope
            .cache_input
            .pipelines
            .iter()
            .map(|p| PipelineSummary {
                identifier: p.identifier.to_hex(),
                blob_bytes: p.compiled_blob.len(),
                tests: p.originating_tests.iter().cloned().collect(),
                current: p.current_ref_count,
                peak: p.peak_ref_count,
                total: p.total_ref_count,
            })
            .collect(),
        command_pools: envelope.command_pools.len(),
        reservation: envelope.reservation.clone(),
    }
}

pub fn print_summary_pretty(summary: &EnvelopeSummary) {
    println!();
    println!("Dependencies:");
    for dep in &summary.dependencies {
        println!("  {:<24} {}", dep.kind, dep.count);
    }
    println!();
    println!("Pipelines: {}", summary.pipelines.len());
    for p in &summary.pipelines {
        println!("  {}", p.identifier);
        println!("    Blob:     {} bytes", p.blob_bytes);
        println!("    Refs:     current {}, peak {}, total {}", p.current, p.peak, p.total);
        println!("    Tests:    {}", p.tests.join(", "));
    }
    println!();
    println!("Command pools: {}", summary.command_pools);
    println!();
    print_reservation_pretty(&summary.reservation);
}

pub fn print_reservation_pretty(record: &ReservationSizingRecord) {
    println!("Reservation:");
    println!("  pipeline caches          {}", record.pipeline_cache_request_count);
    println!("  pipelines                {}", record.pipeline_request_count);
    println!("  samplers                 {}", record.sampler_request_count);
    println!("  shader modules           {}", record.shader_module_request_count);
    println!("  render passes            {}", record.render_pass_request_count);
    println!("  pipeline layouts         {}", record.pipeline_layout_request_count);
    println!("  descriptor set layouts   {}", record.descriptor_set_layout_request_count);
    println!("  command pools            {}", record.command_pool_request_count);
    println!("  command buffers          {}", record.command_buffer_request_count);
    println!("  pool reserved bytes      {}", record.command_pool_reserved_bytes);
    println!("  pool allocated bytes     {}", record.command_pool_allocated_bytes);
    println!("  max buffer bytes         {}", record.max_command_buffer_bytes);
    println!("  max cache bytes          {}", record.max_pipeline_cache_bytes);
    for pool in &record.pipeline_pool_sizes {
        println!(
            "  pool entries             {} x {} bytes",
            pool.pool_entry_count, pool.pool_entry_size
        );
    }
    println!();
}
