//! Symmetric binary codec.
//!
//! Every record implements [`Wire`] once. The same routine runs against a
//! [`WireWriter`] (values are appended to a buffer) or a [`WireReader`]
//! (values are overwritten with what the buffer holds), so encode and decode
//! cannot drift apart. Writing never modifies the value; the `&mut` receiver
//! only exists so one routine can serve both directions.
//!
//! Layout rules:
//! - scalars are fixed width, little-endian
//! - strings and blobs are a `u32` length followed by the raw bytes
//! - sequences, sets and maps are a `u32` count followed by the elements
//! - enums are an `i32`
//! - options are a `u8` presence tag followed by the value

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use crate::error::{ProtocolError, ProtocolResult};

macro_rules! scalar_methods {
    ($($name:ident: $ty:ty),+ $(,)?) => {
        $(
            fn $name(&mut self, v: &mut $ty) -> ProtocolResult<()> {
                let mut bytes = v.to_le_bytes();
                self.raw(&mut bytes)?;
                *v = <$ty>::from_le_bytes(bytes);
                Ok(())
            }
        )+
    };
}

/// One direction of the codec.
pub trait WireStream {
    /// `true` for [`WireReader`], `false` for [`WireWriter`].
    const READING: bool;

    /// Bytes written or consumed so far.
    fn offset(&self) -> usize;

    /// Fixed-size bytes with no prefix. The writer copies `bytes` out, the
    /// reader fills them in.
    fn raw(&mut self, bytes: &mut [u8]) -> ProtocolResult<()>;

    /// Element count prefix. The writer emits `len`; the reader ignores it
    /// and returns the count found in the stream.
    fn count(&mut self, len: usize) -> ProtocolResult<usize>;

    /// Length-prefixed byte blob.
    fn blob(&mut self, v: &mut Vec<u8>) -> ProtocolResult<()>;

    /// Length-prefixed UTF-8 string.
    fn text(&mut self, v: &mut String) -> ProtocolResult<()>;

    scalar_methods! {
        u8: u8,
        u16: u16,
        u32: u32,
        u64: u64,
        i32: i32,
        i64: i64,
    }

    fn bool(&mut self, v: &mut bool) -> ProtocolResult<()> {
        let mut byte = u8::from(*v);
        self.u8(&mut byte)?;
        *v = match byte {
            0 => false,
            1 => true,
            other => {
                return Err(ProtocolError::UnknownVariant {
                    what: "bool",
                    value: other.to_string(),
                })
            }
        };
        Ok(())
    }
}

/// A value with a fixed wire layout.
pub trait Wire {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()>;
}

// ── Writer ─────────────────────────────────────────────────

/// Appends encoded values to an owned buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn prefix(&mut self, len: usize) -> ProtocolResult<()> {
        let len = u32::try_from(len).map_err(|_| ProtocolError::LengthOverflow(len))?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        Ok(())
    }
}

impl WireStream for WireWriter {
    const READING: bool = false;

    fn offset(&self) -> usize {
        self.buf.len()
    }

    fn raw(&mut self, bytes: &mut [u8]) -> ProtocolResult<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn count(&mut self, len: usize) -> ProtocolResult<usize> {
        self.prefix(len)?;
        Ok(len)
    }

    fn blob(&mut self, v: &mut Vec<u8>) -> ProtocolResult<()> {
        self.prefix(v.len())?;
        self.buf.extend_from_slice(v);
        Ok(())
    }

    fn text(&mut self, v: &mut String) -> ProtocolResult<()> {
        self.prefix(v.len())?;
        self.buf.extend_from_slice(v.as_bytes());
        Ok(())
    }
}

// ── Reader ─────────────────────────────────────────────────

/// Consumes encoded values from a borrowed buffer, in write order.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(self) -> ProtocolResult<()> {
        if self.remaining() != 0 {
            return Err(ProtocolError::corrupt(
                self.pos,
                format!("{} trailing byte(s)", self.remaining()),
            ));
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> ProtocolResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(ProtocolError::corrupt(
                self.pos,
                format!("needed {} byte(s), {} remaining", n, self.remaining()),
            ));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn prefix(&mut self) -> ProtocolResult<usize> {
        let mut len = 0u32;
        self.u32(&mut len)?;
        let len = len as usize;
        // Every element occupies at least one byte, so a larger count can
        // only come from a corrupt stream.
        if len > self.remaining() {
            return Err(ProtocolError::corrupt(
                self.pos,
                format!("length {} exceeds {} remaining byte(s)", len, self.remaining()),
            ));
        }
        Ok(len)
    }
}

impl WireStream for WireReader<'_> {
    const READING: bool = true;

    fn offset(&self) -> usize {
        self.pos
    }

    fn raw(&mut self, bytes: &mut [u8]) -> ProtocolResult<()> {
        let src = self.take(bytes.len())?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn count(&mut self, _len: usize) -> ProtocolResult<usize> {
        self.prefix()
    }

    fn blob(&mut self, v: &mut Vec<u8>) -> ProtocolResult<()> {
        let len = self.prefix()?;
        *v = self.take(len)?.to_vec();
        Ok(())
    }

    fn text(&mut self, v: &mut String) -> ProtocolResult<()> {
        let start = self.pos;
        let len = self.prefix()?;
        let bytes = self.take(len)?;
        *v = std::str::from_utf8(bytes)
            .map_err(|e| ProtocolError::corrupt(start, format!("invalid UTF-8: {e}")))?
            .to_owned();
        Ok(())
    }
}

// ── Top-level helpers ──────────────────────────────────────

/// Encode a value without cloning it.
pub fn encode_in_place<T: Wire>(value: &mut T) -> ProtocolResult<Vec<u8>> {
    let mut writer = WireWriter::new();
    value.wire(&mut writer)?;
    Ok(writer.into_bytes())
}

/// Encode a value. The codec routine needs `&mut`, so this works on a clone.
pub fn encode<T: Wire + Clone>(value: &T) -> ProtocolResult<Vec<u8>> {
    encode_in_place(&mut value.clone())
}

/// Decode a value that must span the whole buffer.
pub fn decode<T: Wire + Default>(bytes: &[u8]) -> ProtocolResult<T> {
    let mut reader = WireReader::new(bytes);
    let mut value = T::default();
    value.wire(&mut reader)?;
    reader.finish()?;
    Ok(value)
}

// ── Primitive impls ────────────────────────────────────────

macro_rules! wire_scalar {
    ($($ty:ty => $method:ident),+ $(,)?) => {
        $(
            impl Wire for $ty {
                fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
                    s.$method(self)
                }
            }
        )+
    };
}

wire_scalar! {
    u8 => u8,
    u16 => u16,
    u32 => u32,
    u64 => u64,
    i32 => i32,
    i64 => i64,
    bool => bool,
    String => text,
}

impl<const N: usize> Wire for [u8; N] {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        s.raw(self)
    }
}

impl<T: Wire> Wire for Box<T> {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        (**self).wire(s)
    }
}

impl<T: Wire + Default> Wire for Option<T> {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        let mut present = self.is_some();
        s.bool(&mut present).map_err(|e| match e {
            ProtocolError::UnknownVariant { value, .. } => ProtocolError::UnknownVariant {
                what: "option tag",
                value,
            },
            other => other,
        })?;
        if S::READING {
            *self = present.then(T::default);
        }
        match self {
            Some(value) => value.wire(s),
            None => Ok(()),
        }
    }
}

// ── Container impls ────────────────────────────────────────

/// Upper bound on memory reserved from a decoded count before any element
/// has been read. Larger containers grow as their elements decode.
const MAX_PREALLOC_BYTES: usize = 64 * 1024;

fn prealloc<T>(count: usize) -> usize {
    count.min(MAX_PREALLOC_BYTES / std::mem::size_of::<T>().max(1))
}

impl<T: Wire + Default> Wire for Vec<T> {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        let count = s.count(self.len())?;
        if !S::READING {
            for item in self.iter_mut() {
                item.wire(s)?;
            }
            return Ok(());
        }
        self.clear();
        self.reserve(prealloc::<T>(count));
        for _ in 0..count {
            let mut item = T::default();
            item.wire(s)?;
            self.push(item);
        }
        Ok(())
    }
}

impl<T: Wire + Default + Ord + Clone> Wire for BTreeSet<T> {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        let count = s.count(self.len())?;
        if !S::READING {
            for item in self.iter() {
                item.clone().wire(s)?;
            }
            return Ok(());
        }
        self.clear();
        for _ in 0..count {
            let mut item = T::default();
            item.wire(s)?;
            if !self.insert(item) {
                return Err(duplicate_key(s, "set element"));
            }
        }
        Ok(())
    }
}

impl<K, V> Wire for BTreeMap<K, V>
where
    K: Wire + Default + Ord + Clone,
    V: Wire + Default,
{
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        let count = s.count(self.len())?;
        if !S::READING {
            for (key, value) in self.iter_mut() {
                key.clone().wire(s)?;
                value.wire(s)?;
            }
            return Ok(());
        }
        self.clear();
        for _ in 0..count {
            let (key, value) = read_entry(s)?;
            if self.insert(key, value).is_some() {
                return Err(duplicate_key(s, "map key"));
            }
        }
        Ok(())
    }
}

impl<K, V> Wire for HashMap<K, V>
where
    K: Wire + Default + Eq + Hash + Clone,
    V: Wire + Default,
{
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        let count = s.count(self.len())?;
        if !S::READING {
            for (key, value) in self.iter_mut() {
                key.clone().wire(s)?;
                value.wire(s)?;
            }
            return Ok(());
        }
        self.clear();
        self.reserve(prealloc::<(K, V)>(count));
        for _ in 0..count {
            let (key, value) = read_entry(s)?;
            if self.insert(key, value).is_some() {
                return Err(duplicate_key(s, "map key"));
            }
        }
        Ok(())
    }
}

fn read_entry<K, V, S>(s: &mut S) -> ProtocolResult<(K, V)>
where
    K: Wire + Default,
    V: Wire + Default,
    S: WireStream,
{
    let mut key = K::default();
    key.wire(s)?;
    let mut value = V::default();
    value.wire(s)?;
    Ok((key, value))
}

fn duplicate_key<S: WireStream>(s: &S, what: &str) -> ProtocolError {
    ProtocolError::corrupt(s.offset(), format!("duplicate {what}"))
}

/// Implement [`Wire`] for a fieldless `#[repr(i32)]` enum, encoded as its
/// discriminant. Unknown values decode to `UnknownVariant`.
#[macro_export]
macro_rules! wire_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl $name {
            pub fn to_raw(self) -> i32 {
                self as i32
            }

            pub fn from_raw(raw: i32) -> Option<Self> {
                $(
                    if raw == Self::$variant as i32 {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl $crate::codec::Wire for $name {
            fn wire<S: $crate::codec::WireStream>(
                &mut self,
                s: &mut S,
            ) -> $crate::error::ProtocolResult<()> {
                let mut raw = self.to_raw();
                s.i32(&mut raw)?;
                *self = Self::from_raw(raw).ok_or_else(|| {
                    $crate::error::ProtocolError::UnknownVariant {
                        what: stringify!($name),
                        value: raw.to_string(),
                    }
                })?;
                Ok(())
            }
        }
    };
}
