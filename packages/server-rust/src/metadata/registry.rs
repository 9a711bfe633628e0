//! Declarative operation metadata, keyed by owner name.
//!
//! Owners are registered explicitly: by name with an [`OwnerDeclarations`]
//! value, by type through [`OperationOwner`], or in bulk from a JSON
//! document. Registration never touches the lookup cache held by
//! [`MetadataLookupService`](super::MetadataLookupService).

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use siteplan_core::{OperationDeclaration, OwnerDeclarations};
use thiserror::Error;
use tracing::debug;

/// A Rust type that carries operation metadata.
///
/// ```
/// use siteplan_core::{OperationDeclaration, OwnerDeclarations, Priority};
/// use siteplan_server::metadata::{OperationMetadataStore, OperationOwner};
///
/// struct CraneHire;
///
/// impl OperationOwner for CraneHire {
///     const OWNER_NAME: &'static str = "CraneHire";
///
///     fn declarations() -> OwnerDeclarations {
///         OwnerDeclarations::new().operation(
///             "lift",
///             OperationDeclaration::new("Lift steel").priority(Priority::High),
///         )
///     }
/// }
///
/// let store = OperationMetadataStore::new();
/// store.register_owner::<CraneHire>();
/// assert!(store.declaration("CraneHire", "lift").is_some());
/// ```
pub trait OperationOwner {
    const OWNER_NAME: &'static str;

    fn declarations() -> OwnerDeclarations;
}

/// Errors raised while loading a JSON metadata document.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse metadata document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("metadata entry {index} has an empty owner name")]
    EmptyOwnerName { index: usize },
}

/// One owner in a JSON metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OwnerDocument {
    owner: String,
    #[serde(flatten)]
    declarations: OwnerDeclarations,
}

/// Concurrent owner → declarations table.
pub struct OperationMetadataStore {
    owners: DashMap<String, Arc<OwnerDeclarations>>,
    /// First-registration order, for stable reports.
    order: RwLock<Vec<String>>,
}

impl OperationMetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            owners: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Registers `declarations` under `owner`, replacing any previous set.
    pub fn register(&self, owner: impl Into<String>, declarations: OwnerDeclarations) {
        let owner = owner.into();
        debug!(
            owner = %owner,
            operations = declarations.operations.len(),
            owner_level = declarations.owner_level.is_some(),
            "operation metadata registered"
        );
        let previous = self.owners.insert(owner.clone(), Arc::new(declarations));
        if previous.is_none() {
            self.order.write().push(owner);
        }
    }

    /// Registers the metadata attached to `T`.
    pub fn register_owner<T: OperationOwner>(&self) {
        self.register(T::OWNER_NAME, T::declarations());
    }

    /// Registers every owner in a JSON document of the form
    /// `[{ "owner": "...", "ownerLevel": {...}, "operations": [...] }]`.
    /// Returns the number of owners registered.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the document does not parse or names an
    /// empty owner. Nothing is registered in that case.
    pub fn load_json(&self, json: &str) -> Result<usize, CatalogError> {
        let documents: Vec<OwnerDocument> = serde_json::from_str(json)?;
        if let Some(index) = documents.iter().position(|d| d.owner.is_empty()) {
            return Err(CatalogError::EmptyOwnerName { index });
        }
        let count = documents.len();
        for document in documents {
            self.register(document.owner, document.declarations);
        }
        Ok(count)
    }

    /// All declarations for `owner`.
    #[must_use]
    pub fn declarations(&self, owner: &str) -> Option<Arc<OwnerDeclarations>> {
        self.owners.get(owner).map(|entry| Arc::clone(entry.value()))
    }

    /// One declaration; empty `operation` selects the owner level.
    #[must_use]
    pub fn declaration(&self, owner: &str, operation: &str) -> Option<OperationDeclaration> {
        self.owners
            .get(owner)
            .and_then(|entry| entry.value().find(operation).cloned())
    }

    /// Owner names in first-registration order.
    #[must_use]
    pub fn owners(&self) -> Vec<String> {
        self.order.read().clone()
    }

    #[must_use]
    pub fn contains_owner(&self, owner: &str) -> bool {
        self.owners.contains_key(owner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl Default for OperationMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}
