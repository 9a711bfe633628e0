//! Site planner core: operation descriptors, projects, teams, and the
//! cost/duration estimation engine.
//!
//! Pure domain code: no I/O, no global state. Runtime services (metadata
//! cache, message logger) live in `siteplan-server`.

pub mod clock;
pub mod descriptor;
pub mod estimation;
pub mod message;
pub mod project;
pub mod team;
pub mod worker;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use descriptor::{
    DescriptorError, OperationDeclaration, OperationDescriptor, OperationEntry, OwnerDeclarations,
    Priority,
};
pub use estimation::{
    CostEstimator, EstimationConfig, EstimationEngine, EstimationError, EstimationResult,
    MaterialNormalizer,
};
pub use message::{MessageRecord, MessageType};
pub use project::{ProjectDescriptor, ProjectError, MAX_ALLOWED_AREA};
pub use team::ConstructionTeam;
pub use worker::{Worker, WorkerKind};
