use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{Wire, WireStream};
use crate::error::ProtocolResult;
use crate::text::{wire_text, StructuredText};

/// Identifier size in bytes (the Vulkan UUID size).
pub const PIPELINE_IDENTIFIER_SIZE: usize = 16;

/// Opaque key naming one compiled pipeline variant.
///
/// Equality and ordering are plain byte-wise comparisons.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipelineIdentifier(pub [u8; PIPELINE_IDENTIFIER_SIZE]);

impl PipelineIdentifier {
    pub fn from_bytes(bytes: [u8; PIPELINE_IDENTIFIER_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PIPELINE_IDENTIFIER_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parse the 32-character lowercase or uppercase hex form.
    pub fn from_hex(text: &str) -> Option<Self> {
        if text.len() != PIPELINE_IDENTIFIER_SIZE * 2 || !text.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; PIPELINE_IDENTIFIER_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Debug for PipelineIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PipelineIdentifier({})", self.to_hex())
    }
}

impl fmt::Display for PipelineIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PipelineIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PipelineIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid pipeline identifier '{}'", text))
        })
    }
}

impl Wire for PipelineIdentifier {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        s.raw(&mut self.0)
    }
}

/// Device features a pipeline needs, by name.
///
/// Extensible: new core or extension feature names need no format change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Packed API version (`VK_MAKE_API_VERSION` layout).
    pub api_version: u32,
    /// Enabled core feature names, e.g. `"geometryShader"`.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub core: BTreeSet<String>,
    /// Enabled feature names keyed by the extension that defines them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, BTreeSet<String>>,
}

impl FeatureSet {
    pub fn new(api_version: u32) -> Self {
        Self {
            api_version,
            ..Self::default()
        }
    }

    pub fn with_core(mut self, feature: &str) -> Self {
        self.core.insert(feature.to_string());
        self
    }

    pub fn with_extension_feature(mut self, extension: &str, feature: &str) -> Self {
        self.extensions
            .entry(extension.to_string())
            .or_default()
            .insert(feature.to_string());
        self
    }
}

impl StructuredText for FeatureSet {
    const RECORD: &'static str = "FeatureSet";
}

impl Wire for FeatureSet {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        wire_text(self, s)
    }
}

/// One deduplicated pipeline and its usage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineDescription {
    pub identifier: PipelineIdentifier,
    pub compiled_blob: Vec<u8>,
    pub required_features: FeatureSet,
    pub required_extensions: Vec<String>,
    pub originating_tests: BTreeSet<String>,
    pub current_ref_count: u32,
    pub peak_ref_count: u32,
    pub total_ref_count: u32,
}

impl Wire for PipelineDescription {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        self.identifier.wire(s)?;
        s.blob(&mut self.compiled_blob)?;
        self.required_features.wire(s)?;
        self.required_extensions.wire(s)?;
        self.originating_tests.wire(s)?;
        s.u32(&mut self.current_ref_count)?;
        s.u32(&mut self.peak_ref_count)?;
        s.u32(&mut self.total_ref_count)
    }
}
