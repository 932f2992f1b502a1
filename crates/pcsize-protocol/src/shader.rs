use crate::codec::{Wire, WireStream};
use crate::error::{ProtocolError, ProtocolResult};
use crate::wire_enum;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum ShaderStage {
    #[default]
    Vertex = 0,
    TessellationControl = 1,
    TessellationEvaluation = 2,
    Geometry = 3,
    Fragment = 4,
    Compute = 5,
}

wire_enum!(ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
});

/// Shader program source; the dialect selects which fields exist.
///
/// On the wire the dialect name comes first, followed by that dialect's
/// fields only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    Glsl {
        stage: ShaderStage,
        source: String,
    },
    Hlsl {
        stage: ShaderStage,
        source: String,
        entry_point: String,
    },
    SpirvAsm {
        source: String,
    },
    Spirv {
        words: Vec<u32>,
    },
}

impl ShaderSource {
    pub const GLSL: &'static str = "glsl";
    pub const HLSL: &'static str = "hlsl";
    pub const SPIRV_ASM: &'static str = "spirv-asm";
    pub const SPIRV: &'static str = "spirv";

    pub fn dialect(&self) -> &'static str {
        match self {
            ShaderSource::Glsl { .. } => Self::GLSL,
            ShaderSource::Hlsl { .. } => Self::HLSL,
            ShaderSource::SpirvAsm { .. } => Self::SPIRV_ASM,
            ShaderSource::Spirv { .. } => Self::SPIRV,
        }
    }

    fn empty(dialect: &str) -> ProtocolResult<Self> {
        Ok(match dialect {
            Self::GLSL => ShaderSource::Glsl {
                stage: ShaderStage::default(),
                source: String::new(),
            },
            Self::HLSL => ShaderSource::Hlsl {
                stage: ShaderStage::default(),
                source: String::new(),
                entry_point: String::new(),
            },
            Self::SPIRV_ASM => ShaderSource::SpirvAsm {
                source: String::new(),
            },
            Self::SPIRV => ShaderSource::Spirv { words: Vec::new() },
            other => {
                return Err(ProtocolError::UnknownVariant {
                    what: "shader dialect",
                    value: other.to_string(),
                })
            }
        })
    }
}

impl Default for ShaderSource {
    fn default() -> Self {
        ShaderSource::Spirv { words: Vec::new() }
    }
}

impl Wire for ShaderSource {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        let mut dialect = self.dialect().to_string();
        s.text(&mut dialect)?;
        if S::READING {
            *self = Self::empty(&dialect)?;
        }
        match self {
            ShaderSource::Glsl { stage, source } => {
                stage.wire(s)?;
                s.text(source)
            }
            ShaderSource::Hlsl {
                stage,
                source,
                entry_point,
            } => {
                stage.wire(s)?;
                s.text(source)?;
                s.text(entry_point)
            }
            ShaderSource::SpirvAsm { source } => s.text(source),
            ShaderSource::Spirv { words } => words.wire(s),
        }
    }
}

/// Options forwarded to the offline shader compiler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderBuildOptions {
    /// Packed SPIR-V version, e.g. `0x0001_0000` for 1.0.
    pub target_spirv_version: u32,
    pub flags: u32,
}

impl Wire for ShaderBuildOptions {
    fn wire<S: WireStream>(&mut self, s: &mut S) -> ProtocolResult<()> {
        s.u32(&mut self.target_spirv_version)?;
        s.u32(&mut self.flags)
    }
}
