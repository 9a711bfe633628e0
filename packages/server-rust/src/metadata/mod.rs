//! Operation metadata: declaration registry, built-in catalog, and the
//! memoizing lookup service.

pub mod catalog;
pub mod registry;
pub mod service;

pub use catalog::register_builtin_catalog;
pub use registry::{CatalogError, OperationMetadataStore, OperationOwner};
pub use service::MetadataLookupService;
