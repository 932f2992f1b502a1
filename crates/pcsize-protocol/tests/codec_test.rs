//! Integration test: wire codec layout and corruption handling
//!
//! Checks the exact byte layout of primitives and containers, and that every
//! malformed input is rejected with the right error instead of a partial value.
//!
//! Run with: cargo test --test codec_test -- --nocapture

use std::collections::{BTreeMap, BTreeSet, HashMap};

use pcsize_protocol::codec::{decode, encode, encode_in_place};
use pcsize_protocol::text::{from_canonical_text, to_canonical_text};
use pcsize_protocol::{DependencyKind, FeatureSet, ProtocolError, SessionHandle, WireWriter};
use pcsize_protocol::{Wire, WireStream};

#[test]
fn test_scalar_layout_is_little_endian() {
    assert_eq!(encode(&0x0102_0304u32).unwrap(), vec![4, 3, 2, 1]);
    assert_eq!(encode(&-2i32).unwrap(), vec![0xfe, 0xff, 0xff, 0xff]);
    assert_eq!(encode(&true).unwrap(), vec![1]);
    assert_eq!(
        encode(&SessionHandle(7)).unwrap(),
        vec![7, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn test_string_and_sequence_prefixes() {
    assert_eq!(encode(&"ab".to_string()).unwrap(), vec![2, 0, 0, 0, b'a', b'b']);
    assert_eq!(
        encode(&vec![1u16, 2u16]).unwrap(),
        vec![2, 0, 0, 0, 1, 0, 2, 0]
    );
    assert_eq!(encode(&Vec::<u64>::new()).unwrap(), vec![0, 0, 0, 0]);
}

#[test]
fn test_option_and_enum_layout() {
    assert_eq!(encode(&None::<u8>).unwrap(), vec![0]);
    assert_eq!(encode(&Some(5u8)).unwrap(), vec![1, 5]);
    assert_eq!(encode(&DependencyKind::RenderPass).unwrap(), vec![2, 0, 0, 0]);
}

#[test]
fn test_map_is_written_in_key_order() {
    let mut map = BTreeMap::new();
    map.insert(3u8, 30u8);
    map.insert(1u8, 10u8);
    assert_eq!(encode(&map).unwrap(), vec![2, 0, 0, 0, 1, 10, 3, 30]);

    let back: BTreeMap<u8, u8> = decode(&[2, 0, 0, 0, 1, 10, 3, 30]).unwrap();
    assert_eq!(back, map);
}

#[test]
fn test_hash_map_roundtrip() {
    let mut map = HashMap::new();
    map.insert("vertex".to_string(), 1u32);
    map.insert("fragment".to_string(), 2u32);
    let bytes = encode(&map).unwrap();
    let back: HashMap<String, u32> = decode(&bytes).unwrap();
    assert_eq!(back, map);
}

#[test]
fn test_writing_leaves_value_untouched() {
    let mut set: BTreeSet<String> = ["t1".to_string(), "t2".to_string()].into();
    let before = set.clone();
    let bytes = encode_in_place(&mut set).unwrap();
    assert_eq!(set, before);
    assert_eq!(decode::<BTreeSet<String>>(&bytes).unwrap(), before);
}

#[test]
fn test_count_larger_than_remaining_is_corrupt() {
    let err = decode::<Vec<u64>>(&[5, 0, 0, 0]).unwrap_err();
    match err {
        ProtocolError::CorruptStream { offset, .. } => assert_eq!(offset, 4),
        other => panic!("expected CorruptStream, got {:?}", other),
    }
}

/// A record much larger in memory than any byte of its encoding could
/// justify up front.
#[derive(Debug)]
struct Page(Box<[u8; 64 * 1024]>);

impl Default for Page {
    fn default() -> Self {
        Page(Box::new([0; 64 * 1024]))
    }
}

impl Wire for Page {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> pcsize_protocol::ProtocolResult<()> {
        s.raw(&mut self.0[..])
    }
}

#[test]
fn test_huge_count_decodes_incrementally() {
    // A count that fits the remaining bytes but not `count` whole pages.
    let count: u32 = 1_000_000;
    let mut bytes = count.to_le_bytes().to_vec();
    bytes.resize(4 + count as usize, 0);

    let err = decode::<Vec<Page>>(&bytes).unwrap_err();
    println!("{}", err);
    match err {
        // Fifteen whole pages decode before the sixteenth runs out of input.
        ProtocolError::CorruptStream { offset, .. } => assert_eq!(offset, 4 + 15 * 64 * 1024),
        other => panic!("expected CorruptStream, got {:?}", other),
    }
}

#[test]
fn test_truncated_scalar_is_corrupt() {
    let err = decode::<u64>(&[1, 2, 3]).unwrap_err();
    assert!(matches!(err, ProtocolError::CorruptStream { offset: 0, .. }));
}

#[test]
fn test_trailing_bytes_are_corrupt() {
    let err = decode::<u8>(&[1, 2]).unwrap_err();
    assert!(matches!(err, ProtocolError::CorruptStream { offset: 1, .. }));
}

#[test]
fn test_invalid_utf8_is_corrupt() {
    let err = decode::<String>(&[1, 0, 0, 0, 0xff]).unwrap_err();
    assert!(matches!(err, ProtocolError::CorruptStream { .. }));
}

#[test]
fn test_duplicate_set_element_is_corrupt() {
    let err = decode::<BTreeSet<u8>>(&[2, 0, 0, 0, 7, 7]).unwrap_err();
    match err {
        ProtocolError::CorruptStream { offset, reason } => {
            assert_eq!(offset, 6);
            assert!(reason.contains("duplicate"), "reason: {}", reason);
        }
        other => panic!("expected CorruptStream, got {:?}", other),
    }
}

#[test]
fn test_duplicate_map_key_is_corrupt() {
    let err = decode::<BTreeMap<u8, u8>>(&[2, 0, 0, 0, 1, 9, 1, 8]).unwrap_err();
    assert!(matches!(err, ProtocolError::CorruptStream { .. }));
}

#[test]
fn test_unknown_enum_value() {
    let err = decode::<DependencyKind>(&[9, 0, 0, 0]).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::UnknownVariant {
            what: "DependencyKind",
            value: "9".to_string(),
        }
    );
}

#[test]
fn test_bad_bool_and_option_tags() {
    let err = decode::<bool>(&[2]).unwrap_err();
    assert!(matches!(err, ProtocolError::UnknownVariant { what: "bool", .. }));

    let err = decode::<Option<u8>>(&[3, 1]).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnknownVariant {
            what: "option tag",
            ..
        }
    ));
}

#[test]
fn test_feature_set_canonical_text() {
    let features = FeatureSet::new(4_198_400)
        .with_core("geometryShader")
        .with_extension_feature("VK_KHR_shader_float16_int8", "shaderFloat16");
    let text = to_canonical_text(&features).unwrap();
    assert_eq!(
        text,
        r#"{"api_version":4198400,"core":["geometryShader"],"extensions":{"VK_KHR_shader_float16_int8":["shaderFloat16"]}}"#
    );
    assert_eq!(from_canonical_text::<FeatureSet>(&text).unwrap(), features);

    // Empty collections are omitted.
    assert_eq!(
        to_canonical_text(&FeatureSet::new(1)).unwrap(),
        r#"{"api_version":1}"#
    );
}

#[test]
fn test_feature_set_ignores_unknown_fields() {
    let features: FeatureSet =
        from_canonical_text(r#"{"api_version":1,"future_field":true}"#).unwrap();
    assert_eq!(features, FeatureSet::new(1));
}

fn text_payload(text: &str) -> Vec<u8> {
    let mut writer = WireWriter::new();
    writer.text(&mut text.to_string()).unwrap();
    writer.into_bytes()
}

#[test]
fn test_malformed_structured_text() {
    for bad in ["not json", "{}", r#"{"api_version":"one"}"#] {
        let err = decode::<FeatureSet>(&text_payload(bad)).unwrap_err();
        match err {
            ProtocolError::MalformedStructuredText { record, .. } => {
                assert_eq!(record, "FeatureSet", "input: {}", bad);
            }
            other => panic!("expected MalformedStructuredText for {}, got {:?}", bad, other),
        }
    }
}

#[test]
fn test_feature_set_wire_is_text() {
    let mut features = FeatureSet::new(1).with_core("depthClamp");
    let mut writer = WireWriter::new();
    features.wire(&mut writer).unwrap();
    assert_eq!(
        writer.into_bytes(),
        text_payload(r#"{"api_version":1,"core":["depthClamp"]}"#)
    );
}
