//! Integration test: dependency cache lookups, pruning and shard merging
//!
//! Run with: cargo test --test dependency_test -- --nocapture

use pcsize_core::{CoreError, DependencyCache, PipelineReferences};
use pcsize_protocol::{DependencyKind, ProtocolError, SessionHandle};

fn h(n: u64) -> SessionHandle {
    SessionHandle(n)
}

/// sampler 1 <- set layout 2 <- pipeline layout 3, shader 4, render pass 5,
/// plus one unreachable object of every kind.
fn populated() -> DependencyCache {
    let mut cache = DependencyCache::new();
    cache.insert_if_absent(DependencyKind::Sampler, h(1), r#"{"magFilter":"LINEAR"}"#);
    cache.insert_if_absent(
        DependencyKind::DescriptorSetLayout,
        h(2),
        r#"{"bindings":[{"binding":0,"immutableSamplers":[1,null,0]},{"binding":1}]}"#,
    );
    cache.insert_if_absent(DependencyKind::PipelineLayout, h(3), r#"{"setLayouts":[2]}"#);
    cache.insert_if_absent(DependencyKind::ShaderModule, h(4), r#"{"codeSize":64}"#);
    cache.insert_if_absent(DependencyKind::RenderPass, h(5), r#"{"attachments":[]}"#);

    cache.insert_if_absent(DependencyKind::Sampler, h(11), r#"{"magFilter":"NEAREST"}"#);
    cache.insert_if_absent(
        DependencyKind::DescriptorSetLayout,
        h(12),
        r#"{"bindings":[{"binding":0,"immutableSamplers":[11]}]}"#,
    );
    cache.insert_if_absent(DependencyKind::PipelineLayout, h(13), r#"{"setLayouts":[12]}"#);
    cache.insert_if_absent(DependencyKind::ShaderModule, h(14), r#"{"codeSize":32}"#);
    cache.insert_if_absent(DependencyKind::RenderPass, h(15), r#"{"attachments":[]}"#);
    cache
}

#[test]
fn test_insert_keeps_first_description() {
    let mut cache = DependencyCache::new();
    assert!(cache.insert_if_absent(DependencyKind::Sampler, h(1), "first"));
    assert!(!cache.insert_if_absent(DependencyKind::Sampler, h(1), "second"));
    assert_eq!(cache.lookup(DependencyKind::Sampler, h(1)).unwrap(), "first");
    assert_eq!(cache.len(DependencyKind::Sampler), 1);
}

#[test]
fn test_maps_are_independent_per_kind() {
    let mut cache = DependencyCache::new();
    cache.insert_if_absent(DependencyKind::Sampler, h(1), "sampler");
    cache.insert_if_absent(DependencyKind::RenderPass, h(1), "render pass");
    assert_eq!(cache.lookup(DependencyKind::Sampler, h(1)).unwrap(), "sampler");
    assert_eq!(cache.lookup(DependencyKind::RenderPass, h(1)).unwrap(), "render pass");
}

#[test]
fn test_lookup_unknown_dependency() {
    let cache = populated();
    match cache.lookup(DependencyKind::ShaderModule, h(99)) {
        Err(CoreError::UnknownDependency { kind, handle }) => {
            assert_eq!(kind, DependencyKind::ShaderModule);
            assert_eq!(handle, h(99));
        }
        other => panic!("expected UnknownDependency, got {:?}", other),
    }
    // Known handle, wrong kind.
    assert!(cache.lookup(DependencyKind::Sampler, h(4)).is_err());
}

#[test]
fn test_prune_keeps_reachable_objects() {
    let mut cache = populated();
    let references = [PipelineReferences::graphics(vec![h(4)], h(5), h(3))];
    let removed = cache.prune_unreferenced(&references).unwrap();
    assert_eq!(removed, 5);

    for kind in DependencyKind::ALL {
        assert_eq!(cache.len(kind), 1, "{}", kind);
    }
    assert!(cache.lookup(DependencyKind::Sampler, h(1)).is_ok());
    assert!(cache.lookup(DependencyKind::DescriptorSetLayout, h(2)).is_ok());
    assert!(cache.lookup(DependencyKind::Sampler, h(11)).is_err());
}

#[test]
fn test_prune_with_no_pipelines_empties_cache() {
    let mut cache = populated();
    let removed = cache.prune_unreferenced(&Vec::<PipelineReferences>::new()).unwrap();
    assert_eq!(removed, 10);
    assert!(cache.is_empty());
}

#[test]
fn test_prune_compute_pipeline_drops_render_passes() {
    let mut cache = populated();
    let references = [PipelineReferences::compute(h(14), h(13))];
    cache.prune_unreferenced(&references).unwrap();
    assert_eq!(cache.len(DependencyKind::RenderPass), 0);
    assert!(cache.lookup(DependencyKind::Sampler, h(11)).is_ok());
    assert!(cache.lookup(DependencyKind::Sampler, h(1)).is_err());
}

#[test]
fn test_prune_malformed_description() {
    let mut cache = DependencyCache::new();
    cache.insert_if_absent(DependencyKind::PipelineLayout, h(1), "{not json");
    cache.insert_if_absent(DependencyKind::ShaderModule, h(2), "{}");
    let references = [PipelineReferences::compute(h(2), h(1))];
    match cache.prune_unreferenced(&references) {
        Err(CoreError::Protocol(ProtocolError::MalformedStructuredText { record, .. })) => {
            assert_eq!(record, "pipeline layout");
        }
        other => panic!("expected MalformedStructuredText, got {:?}", other),
    }
}

#[test]
fn test_merge_rebases_colliding_handles() {
    let mut merged = populated();
    assert_eq!(merged.max_handle(), 15);

    let mut shard = DependencyCache::new();
    shard.insert_if_absent(DependencyKind::Sampler, h(1), r#"{"magFilter":"CUBIC"}"#);
    shard.insert_if_absent(
        DependencyKind::DescriptorSetLayout,
        h(2),
        r#"{"bindings":[{"binding":0,"immutableSamplers":[1,0]}]}"#,
    );
    shard.insert_if_absent(DependencyKind::PipelineLayout, h(3), r#"{"setLayouts":[2]}"#);

    let offset = merged.merge(shard.into_maps()).unwrap();
    assert_eq!(offset, 15);
    assert_eq!(merged.len(DependencyKind::Sampler), 3);
    assert_eq!(
        merged.lookup(DependencyKind::Sampler, h(16)).unwrap(),
        r#"{"magFilter":"CUBIC"}"#
    );
    assert_eq!(
        merged.lookup(DependencyKind::DescriptorSetLayout, h(17)).unwrap(),
        r#"{"bindings":[{"binding":0,"immutableSamplers":[16,0]}]}"#
    );
    assert_eq!(
        merged.lookup(DependencyKind::PipelineLayout, h(18)).unwrap(),
        r#"{"setLayouts":[17]}"#
    );

    // The rebased chain is still reachable from its pipeline layout.
    let references = [PipelineReferences {
        pipeline_layout: Some(h(18)),
        ..PipelineReferences::default()
    }];
    merged.prune_unreferenced(&references).unwrap();
    assert!(merged.lookup(DependencyKind::Sampler, h(16)).is_ok());
    assert_eq!(merged.len(DependencyKind::Sampler), 1);
}

#[test]
fn test_merge_into_empty_keeps_handles() {
    let mut merged = DependencyCache::new();
    let offset = merged.merge(populated().into_maps()).unwrap();
    assert_eq!(offset, 0);
    assert_eq!(merged, populated());
}

#[test]
fn test_merge_rejects_handle_overflow() {
    let mut merged = DependencyCache::new();
    merged.insert_if_absent(DependencyKind::Sampler, h(u64::MAX), "{}");
    let before = merged.clone();

    let mut shard = DependencyCache::new();
    shard.insert_if_absent(DependencyKind::Sampler, h(1), r#"{"magFilter":"CUBIC"}"#);

    match merged.merge(shard.into_maps()) {
        Err(CoreError::HandleOverflow { kind, handle, offset }) => {
            assert_eq!(kind, DependencyKind::Sampler);
            assert_eq!(handle, h(1));
            assert_eq!(offset, u64::MAX);
        }
        other => panic!("expected HandleOverflow, got {:?}", other),
    }
    assert_eq!(merged, before);
    assert!(merged.lookup(DependencyKind::Sampler, SessionHandle::null()).is_err());
}

#[test]
fn test_merge_rejects_overflowing_handle_reference() {
    let mut merged = DependencyCache::new();
    merged.insert_if_absent(DependencyKind::ShaderModule, h(10), "{}");

    // The key fits after shifting, the sampler it names does not.
    let mut shard = DependencyCache::new();
    shard.insert_if_absent(
        DependencyKind::DescriptorSetLayout,
        h(1),
        format!(r#"{{"bindings":[{{"binding":0,"immutableSamplers":[{}]}}]}}"#, u64::MAX),
    );

    let err = merged.merge(shard.into_maps()).unwrap_err();
    assert!(
        matches!(
            err,
            CoreError::HandleOverflow {
                kind: DependencyKind::Sampler,
                offset: 10,
                ..
            }
        ),
        "got {:?}",
        err
    );
    assert_eq!(merged.len(DependencyKind::DescriptorSetLayout), 0);
}
