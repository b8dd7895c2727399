// Core encoding engine - independent of the CLI surface

pub mod error;
pub mod executor;
pub mod hardware;
pub mod ladder;
pub mod output;
pub mod policy;
pub mod probe;
pub mod scheduler;

pub use error::EncodeError;
pub use executor::{EncodeJob, EncodedRendition, JobResult, RunContext};
pub use hardware::{
    Backend, BackendDescriptor, ConcurrencyClass, EncoderAvailability, HwAccelRequest,
};
pub use ladder::{plan, QualitySelection, QualityTier, RenditionSpec, CANONICAL_LADDER};
pub use output::OutputManager;
pub use policy::{ExecutionMode, SchedulingPolicy, MANY_SESSION_CEILING};
pub use scheduler::{run, RunSummary};
