/// Result type for codec and adapter operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Failures raised while encoding or decoding the wire format.
///
/// None of these are recoverable: once a decode fails the whole value being
/// decoded must be discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("corrupt stream at offset {offset}: {reason}")]
    CorruptStream { offset: usize, reason: String },

    #[error("unknown {what} variant: {value}")]
    UnknownVariant { what: &'static str, value: String },

    #[error("malformed structured text for {record}: {reason}")]
    MalformedStructuredText { record: &'static str, reason: String },

    #[error("length {0} does not fit a u32 length prefix")]
    LengthOverflow(usize),

    #[error("unsupported format version {found} (expected {expected})")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("envelope corrupt while decoding {stage}: {source}")]
    EnvelopeCorrupt {
        stage: &'static str,
        source: Box<ProtocolError>,
    },
}

impl ProtocolError {
    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        Self::CorruptStream {
            offset,
            reason: reason.into(),
        }
    }

    /// Wrap this error as an envelope failure at the given stage.
    pub fn in_stage(self, stage: &'static str) -> Self {
        Self::EnvelopeCorrupt {
            stage,
            source: Box::new(self),
        }
    }
}
