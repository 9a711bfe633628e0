//! Service lifecycle: registration, ordered init, reset, and shutdown.

pub mod registry;

pub use registry::{ManagedService, ServiceContext, ServiceRegistry};
