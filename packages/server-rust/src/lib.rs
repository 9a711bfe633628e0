//! Site planner runtime: operation metadata lookup with a concurrent cache,
//! the process-wide message logger, service lifecycle, configuration, and
//! the concurrent construction-site simulation.

pub mod config;
pub mod messages;
pub mod metadata;
pub mod service;
pub mod simulation;

pub use config::{ConfigError, LogFormat, SimulationConfig, SitePlannerConfig};
pub use messages::{CompositeSink, MemorySink, MessageLogger, MessageSink, TracingSink};
pub use metadata::{
    register_builtin_catalog, CatalogError, MetadataLookupService, OperationMetadataStore,
    OperationOwner,
};
pub use service::{ManagedService, ServiceContext, ServiceRegistry};
pub use simulation::{
    reference_assignments, CheckpointPass, SiteAssignment, SiteOutcome, SiteSimulation,
};
