pub mod codec;
pub mod error;
pub mod text;
pub mod handle;
pub mod pipeline;
pub mod dependency;
pub mod accounting;
pub mod reservation;
pub mod shader;
pub mod envelope;
pub mod messages;
pub mod wire;

pub use accounting::CommandPoolAccounting;
pub use codec::{Wire, WireReader, WireStream, WireWriter};
pub use dependency::DependencyMaps;
pub use envelope::{PipelineCacheInput, TransmissionEnvelope, FORMAT_VERSION};
pub use error::{ProtocolError, ProtocolResult};
pub use handle::{DependencyKind, SessionHandle};
pub use messages::{Message, RequestId};
pub use pipeline::{FeatureSet, PipelineDescription, PipelineIdentifier};
pub use reservation::{OfflineCompileIdentity, PipelinePoolSize, ReservationSizingRecord};
