pub mod config;
pub mod error;
pub mod handle_arena;
pub mod ledger;
pub mod resource;
pub mod dependency;
pub mod sizing;
pub mod assemble;
pub mod recorder;

pub use assemble::{build_envelope, split_envelope, DecodedLedgers};
pub use config::{PcsizeConfig, SizingConfig};
pub use dependency::{DependencyCache, PipelineReferences};
pub use error::{CoreError, CoreResult};
pub use handle_arena::HandleArena;
pub use ledger::PipelineLedger;
pub use recorder::{derive_identifier, CacheRecorder};
pub use resource::ResourceLedger;
pub use sizing::{compute_reservation, verify_reservation};
