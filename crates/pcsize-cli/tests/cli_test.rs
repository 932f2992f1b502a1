//! Integration test: merge and verify commands
//!
//! Records shard envelopes with the CacheRecorder, writes them to disk, and
//! drives the command implementations against the files.
//!
//! Run with: cargo test --test cli_test -- --nocapture

use std::path::PathBuf;

use pcsize_cli::inspect::summarize;
use pcsize_cli::merge::{load_ledgers, merge_files};
use pcsize_cli::verify::{collect_checks, CheckStatus};
use pcsize_core::config::SizingConfig;
use pcsize_core::{CacheRecorder, PipelineReferences};
use pcsize_protocol::wire::{read_envelope_file, write_envelope_file};
use pcsize_protocol::{DependencyKind, FeatureSet, SessionHandle};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pcsize-cli-{}-{}", std::process::id(), name))
}

/// One shard: a compute pipeline whose layout reaches one sampler.
fn write_shard(name: &str, test: &str, uses: u32) -> PathBuf {
    let mut recorder = CacheRecorder::new();
    recorder.begin_test(test);
    let sampler = recorder.create_sampler(r#"{"magFilter":"LINEAR"}"#);
    let set_layout = recorder.create_descriptor_set_layout(format!(
        r#"{{"bindings":[{{"binding":0,"immutableSamplers":[{}]}}]}}"#,
        sampler.0
    ));
    let layout = recorder.create_pipeline_layout(format!(r#"{{"setLayouts":[{}]}}"#, set_layout.0));
    let shader = recorder.create_shader_module(r#"{"codeSize":64}"#);
    for _ in 0..uses {
        recorder
            .create_pipeline(
                r#"{"stage":"compute"}"#,
                PipelineReferences::compute(shader, layout),
                vec![1; 5000],
                FeatureSet::new(4_198_400),
                Vec::new(),
            )
            .unwrap();
    }
    recorder.command_pool_delta(1, 1000, 2000, 100);
    recorder.allocate_command_buffers(1, 1);

    let envelope = recorder.finish(&SizingConfig::default()).unwrap();
    let path = temp_path(name);
    write_envelope_file(&path, envelope, true).unwrap();
    path
}

fn cleanup(paths: &[PathBuf]) {
    for path in paths {
        std::fs::remove_file(path).ok();
    }
}

#[test]
fn test_merge_shards_in_parallel() {
    let paths = vec![
        write_shard("merge-a.pcs", "t.a", 2),
        write_shard("merge-b.pcs", "t.b", 1),
        write_shard("merge-c.pcs", "t.c", 3),
    ];

    let merged = merge_files(&paths, 3).unwrap();
    let again = merge_files(&paths, 1).unwrap();
    cleanup(&paths);

    assert_eq!(merged.pipelines.len(), 3);
    assert_eq!(merged.dependencies.len(DependencyKind::Sampler), 3);
    assert_eq!(merged.dependencies.len(DependencyKind::DescriptorSetLayout), 3);
    // Handles of later shards are shifted past earlier ones.
    assert!(merged
        .dependencies
        .lookup(DependencyKind::Sampler, SessionHandle(1))
        .is_ok());
    assert_eq!(merged.dependencies.maps(), again.dependencies.maps());
    assert_eq!(merged.pipelines, again.pipelines);

    let pool = merged.pools.get(1).unwrap();
    assert_eq!(pool.current_pool_reserved, 6000);
    assert_eq!(pool.peak_pool_reserved, 6000);

    let envelope = merged.into_envelope(&SizingConfig::default()).unwrap();
    assert_eq!(envelope.reservation.pipeline_request_count, 6);
    assert_eq!(envelope.reservation.sampler_request_count, 3);
}

#[test]
fn test_merge_reports_bad_input() {
    let good = write_shard("bad-good.pcs", "t.good", 1);
    let bad = temp_path("bad-bad.pcs");
    std::fs::write(&bad, b"not a frame at all").unwrap();

    let err = merge_files(&[good.clone(), bad.clone()], 2).unwrap_err();
    cleanup(&[good, bad.clone()]);
    let message = format!("{:#}", err);
    println!("{}", message);
    assert!(message.contains(&bad.display().to_string()));

    assert!(merge_files(&[], 2).is_err());
    assert!(load_ledgers(&temp_path("does-not-exist.pcs")).is_err());
}

#[test]
fn test_verify_passes_for_recorded_envelope() {
    let path = write_shard("verify-ok.pcs", "t.ok", 2);
    let results = collect_checks(&path, "/nonexistent/pcsize.toml");
    cleanup(&[path]);

    for result in &results {
        println!("{:?} {} - {}", result.status, result.name, result.message);
    }
    assert_eq!(results[0].status, CheckStatus::Warn);
    assert!(results.iter().all(|r| r.status != CheckStatus::Fail));
    assert!(results
        .iter()
        .any(|r| r.name == "Reservation" && r.status == CheckStatus::Pass));
}

#[test]
fn test_verify_flags_undersized_reservation() {
    let path = write_shard("verify-small.pcs", "t.small", 2);
    let mut envelope = read_envelope_file(&path).unwrap();
    envelope.reservation.pipeline_request_count = 1;
    write_envelope_file(&path, envelope, false).unwrap();

    let results = collect_checks(&path, "/nonexistent/pcsize.toml");
    cleanup(&[path]);

    let reservation = results.iter().find(|r| r.name == "Reservation").unwrap();
    assert_eq!(reservation.status, CheckStatus::Fail);
    assert!(reservation.message.contains("pipeline_request_count"));
}

#[test]
fn test_verify_skips_after_decode_failure() {
    let path = temp_path("verify-garbage.pcs");
    std::fs::write(&path, [0u8; 4]).unwrap();
    let results = collect_checks(&path, "/nonexistent/pcsize.toml");
    cleanup(&[path]);

    let envelope = results.iter().find(|r| r.name == "Envelope").unwrap();
    assert_eq!(envelope.status, CheckStatus::Fail);
    assert_eq!(
        results
            .iter()
            .filter(|r| r.status == CheckStatus::Skip)
            .count(),
        3
    );
}

#[test]
fn test_summary_json() {
    let path = write_shard("inspect.pcs", "t.inspect", 1);
    let envelope = read_envelope_file(&path).unwrap();
    cleanup(&[path]);

    let summary = summarize(&envelope);
    assert_eq!(summary.pipelines.len(), 1);
    assert_eq!(summary.pipelines[0].blob_bytes, 5000);
    assert_eq!(summary.pipelines[0].tests, vec!["t.inspect".to_string()]);

    let json: serde_json::Value = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["command_pools"], 1);
    assert_eq!(json["reservation"]["pipeline_request_count"], 1);
    assert_eq!(json["dependencies"][0]["kind"], "sampler");
}
