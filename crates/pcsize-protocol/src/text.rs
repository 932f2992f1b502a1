//! Canonical structured-text form for extensible records.
//!
//! Records whose native shape is partly optional are carried on the wire as
//! a JSON document inside a length-prefixed string. The document is
//! canonical: it goes through `serde_json::Value`, whose object map keeps
//! keys sorted, and is printed without whitespace. Both endpoints version
//! this form together with the binary layout.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::WireStream;
use crate::error::{ProtocolError, ProtocolResult};

/// A record exchanged through the canonical text form.
pub trait StructuredText: Serialize + DeserializeOwned {
    /// Record name used in error messages.
    const RECORD: &'static str;
}

pub fn to_canonical_text<T: StructuredText>(value: &T) -> ProtocolResult<String> {
    let tree = serde_json::to_value(value).map_err(|e| malformed::<T>(e.to_string()))?;
    serde_json::to_string(&tree).map_err(|e| malformed::<T>(e.to_string()))
}

pub fn from_canonical_text<T: StructuredText>(text: &str) -> ProtocolResult<T> {
    serde_json::from_str(text).map_err(|e| malformed::<T>(e.to_string()))
}

/// Codec routine for a [`StructuredText`] record: canonical text, then a
/// length-prefixed string.
pub fn wire_text<T, S>(value: &mut T, s: &mut S) -> ProtocolResult<()>
where
    T: StructuredText,
    S: WireStream,
{
    let mut text = if S::READING {
        String::new()
    } else {
        to_canonical_text(value)?
    };
    s.text(&mut text)?;
    if S::READING {
        *value = from_canonical_text(&text)?;
    }
    Ok(())
}

fn malformed<T: StructuredText>(reason: String) -> ProtocolError {
    ProtocolError::MalformedStructuredText {
        record: T::RECORD,
        reason,
    }
}
