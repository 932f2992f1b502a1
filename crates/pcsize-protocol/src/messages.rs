use crate::codec::{Wire, WireStream};
use crate::envelope::TransmissionEnvelope;
use crate::error::{ProtocolError, ProtocolResult};
use crate::shader::{ShaderBuildOptions, ShaderSource};

/// Current protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// A unique identifier for a request, used for matching responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl Wire for RequestId {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        s.u64(&mut self.0)
    }
}

/// Messages between the driving harness and the offline service.
///
/// Encoded as an `i32` discriminator followed by the variant's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // ── Connection establishment ────────────────────────────
    Hello {
        protocol_version: u32,
        name: String,
    },

    // ── Shader compilation ──────────────────────────────────
    CompileShader {
        request_id: RequestId,
        source: ShaderSource,
        build_options: ShaderBuildOptions,
    },
    ShaderCompiled {
        request_id: RequestId,
        spirv: Vec<u32>,
    },

    // ── Pipeline cache ──────────────────────────────────────
    CreateCache {
        request_id: RequestId,
        envelope: Box<TransmissionEnvelope>,
    },
    CacheCreated {
        request_id: RequestId,
        cache_blob: Vec<u8>,
    },

    // ── Error ───────────────────────────────────────────────
    Error {
        request_id: RequestId,
        stage: String,
        message: String,
    },
}

impl Message {
    pub fn discriminator(&self) -> i32 {
        match self {
            Message::Hello { .. } => 1,
            Message::CompileShader { .. } => 2,
            Message::ShaderCompiled { .. } => 3,
            Message::CreateCache { .. } => 4,
            Message::CacheCreated { .. } => 5,
            Message::Error { .. } => 6,
        }
    }

    fn empty(discriminator: i32) -> ProtocolResult<Self> {
        Ok(match discriminator {
            1 => Message::Hello {
                protocol_version: 0,
                name: String::new(),
            },
            2 => Message::CompileShader {
                request_id: RequestId::default(),
                source: ShaderSource::default(),
                build_options: ShaderBuildOptions::default(),
            },
            3 => Message::ShaderCompiled {
                request_id: RequestId::default(),
                spirv: Vec::new(),
            },
            4 => Message::CreateCache {
                request_id: RequestId::default(),
                envelope: Box::default(),
            },
            5 => Message::CacheCreated {
                request_id: RequestId::default(),
                cache_blob: Vec::new(),
            },
            6 => Message::Error {
                request_id: RequestId::default(),
                stage: String::new(),
                message: String::new(),
            },
            other => {
                return Err(ProtocolError::UnknownVariant {
                    what: "message",
                    value: other.to_string(),
                })
            }
        })
    }

    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Message::Hello { .. } => None,
            Message::CompileShader { request_id, .. }
            | Message::ShaderCompiled { request_id, .. }
            | Message::CreateCache { request_id, .. }
            | Message::CacheCreated { request_id, .. }
            | Message::Error { request_id, .. } => Some(*request_id),
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Message::ShaderCompiled { .. } | Message::CacheCreated { .. } | Message::Error { .. }
        )
    }
}

impl Default for Message {
    fn default() -> Self {
        Message::Hello {
            protocol_version: PROTOCOL_VERSION,
            name: String::new(),
        }
    }
}

impl Wire for Message {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        let mut discriminator = self.discriminator();
        s.i32(&mut discriminator)?;
        if S::READING {
            *self = Self::empty(discriminator)?;
        }
        match self {
            Message::Hello {
                protocol_version,
                name,
            } => {
                s.u32(protocol_version)?;
                s.text(name)
            }
            Message::CompileShader {
                request_id,
                source,
                build_options,
            } => {
                request_id.wire(s)?;
                source.wire(s)?;
                build_options.wire(s)
            }
            Message::ShaderCompiled { request_id, spirv } => {
                request_id.wire(s)?;
                spirv.wire(s)
            }
            Message::CreateCache {
                request_id,
                envelope,
            } => {
                request_id.wire(s)?;
                envelope.wire(s)
            }
            Message::CacheCreated {
                request_id,
                cache_blob,
            } => {
                request_id.wire(s)?;
                s.blob(cache_blob)
            }
            Message::Error {
                request_id,
                stage,
                message,
            } => {
                request_id.wire(s)?;
                s.text(stage)?;
                s.text(message)
            }
        }
    }
}
