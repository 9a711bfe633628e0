//! Memoizing lookup of operation descriptors.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use siteplan_core::{OperationDescriptor, Priority};
use tracing::{debug, info, warn};

use super::registry::OperationMetadataStore;
use crate::service::{ManagedService, ServiceContext};

/// Resolves `(owner, operation)` pairs to shared, validated descriptors.
///
/// Resolved descriptors are cached by `(owner, operation)` for the life of
/// the service, until [`MetadataLookupService::clear_cache`] or a
/// lifecycle reset. Misses and malformed declarations are never cached.
///
/// Concurrent first-time resolutions of the same key may each build a
/// descriptor, but only the first insert is kept and every caller receives
/// that cached instance.
pub struct MetadataLookupService {
    store: Arc<OperationMetadataStore>,
    cache: DashMap<DescriptorKey, Arc<OperationDescriptor>>,
}

/// Cache identity: owner name and operation name, empty for owner level.
/// Kept as a pair so no owner or operation spelling can alias another key.
type DescriptorKey = (String, String);

impl MetadataLookupService {
    #[must_use]
    pub fn new(store: Arc<OperationMetadataStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<OperationMetadataStore> {
        &self.store
    }

    /// Resolves the descriptor for `operation` on `owner`. An empty
    /// `operation` selects the owner-level descriptor.
    ///
    /// Returns `None` when nothing is declared for the pair, or when the
    /// declaration fails validation (logged at `warn`).
    pub fn resolve(&self, owner: &str, operation: &str) -> Option<Arc<OperationDescriptor>> {
        let key: DescriptorKey = (owner.to_string(), operation.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Some(Arc::clone(hit.value()));
        }

        let declarations = self.store.declarations(owner)?;
        let declaration = declarations.find(operation)?;

        // Built without holding any cache shard lock.
        let descriptor = match OperationDescriptor::build(owner, operation, declaration) {
            Ok(descriptor) => Arc::new(descriptor),
            Err(e) => {
                warn!(owner, operation, error = %e, "malformed operation metadata ignored");
                return None;
            }
        };

        let cached = Arc::clone(self.cache.entry(key).or_insert(descriptor).value());
        debug!(owner, operation, "operation metadata cached");
        Some(cached)
    }

    /// Owner-level descriptor.
    pub fn resolve_owner(&self, owner: &str) -> Option<Arc<OperationDescriptor>> {
        self.resolve(owner, "")
    }

    /// Operation-level descriptor. An empty `operation` never matches.
    pub fn resolve_operation(
        &self,
        owner: &str,
        operation: &str,
    ) -> Option<Arc<OperationDescriptor>> {
        if operation.is_empty() {
            return None;
        }
        self.resolve(owner, operation)
    }

    /// The owner-level descriptor (if any) followed by every operation-level
    /// descriptor in declaration order. Malformed entries are skipped.
    pub fn list_all(&self, owner: &str) -> Vec<Arc<OperationDescriptor>> {
        let Some(declarations) = self.store.declarations(owner) else {
            return Vec::new();
        };

        let mut descriptors = Vec::with_capacity(declarations.operations.len() + 1);
        if declarations.owner_level.is_some() {
            descriptors.extend(self.resolve_owner(owner));
        }
        for name in declarations.operation_names() {
            descriptors.extend(self.resolve_operation(owner, name));
        }
        descriptors
    }

    /// Descriptors whose priority is at least `minimum`.
    pub fn filter_by_priority(&self, owner: &str, minimum: Priority) -> Vec<Arc<OperationDescriptor>> {
        self.list_all(owner)
            .into_iter()
            .filter(|d| d.priority() >= minimum)
            .collect()
    }

    /// Descriptors whose priority is exactly `priority`.
    pub fn with_priority(&self, owner: &str, priority: Priority) -> Vec<Arc<OperationDescriptor>> {
        self.list_all(owner)
            .into_iter()
            .filter(|d| d.priority() == priority)
            .collect()
    }

    /// `High` and `Critical` descriptors.
    pub fn high_priority(&self, owner: &str) -> Vec<Arc<OperationDescriptor>> {
        self.filter_by_priority(owner, Priority::High)
    }

    /// Sum of estimated cost over [`MetadataLookupService::list_all`].
    pub fn total_estimated_cost(&self, owner: &str) -> f64 {
        self.list_all(owner)
            .iter()
            .map(|d| d.estimated_cost())
            .sum()
    }

    /// Total estimated cost plus `rate` times the cost of every
    /// high-priority descriptor.
    pub fn budget_with_contingency(&self, owner: &str, rate: f64) -> f64 {
        let descriptors = self.list_all(owner);
        let base: f64 = descriptors.iter().map(|d| d.estimated_cost()).sum();
        let contingency: f64 = descriptors
            .iter()
            .filter(|d| d.priority().is_high())
            .map(|d| d.estimated_cost() * rate)
            .sum();
        base + contingency
    }

    /// Whether a declaration exists for the pair. Does not build or cache.
    pub fn has_operation(&self, owner: &str, operation: &str) -> bool {
        self.store.declaration(owner, operation).is_some()
    }

    /// Emits one `info` event per resolvable descriptor of `owner`.
    pub fn log_operations(&self, owner: &str) {
        let descriptors = self.list_all(owner);
        if descriptors.is_empty() {
            info!(owner, "no operation metadata declared");
            return;
        }
        for d in descriptors {
            info!(
                owner,
                operation = d.name(),
                priority = %d.priority(),
                cost = d.estimated_cost(),
                tools = ?d.required_tools(),
                hours = d.estimated_time(),
                certification = d.requires_certification(),
                risk = d.risk_level(),
                description = d.description(),
                "operation metadata"
            );
        }
    }

    /// Drops every cached descriptor. Resolutions racing with the clear may
    /// repopulate their own keys.
    pub fn clear_cache(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        debug!(dropped, "operation metadata cache cleared");
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolves every registered descriptor. Returns how many resolved.
    pub fn warm(&self) -> usize {
        self.store
            .owners()
            .iter()
            .map(|owner| self.list_all(owner).len())
            .sum()
    }
}

#[async_trait]
impl ManagedService for MetadataLookupService {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        let owners = self.store.len();
        if ctx.config.warm_metadata_cache {
            let resolved = self.warm();
            info!(owners, resolved, "metadata service initialized with warm cache");
        } else {
            info!(owners, "metadata service initialized");
        }
        Ok(())
    }

    async fn reset(&self) -> anyhow::Result<()> {
        self.clear_cache();
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        info!(cached = self.cached_len(), "metadata service shut down");
        self.clear_cache();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use siteplan_core::{OperationDeclaration, OwnerDeclarations};

    use super::*;
    use crate::config::SitePlannerConfig;

    fn plan() -> OwnerDeclarations {
        OwnerDeclarations::new()
            .owner_level(OperationDeclaration::new("Plan").priority(Priority::Low))
            .operation(
                "foundation",
                OperationDeclaration::new("Foundation")
                    .priority(Priority::Critical)
                    .cost(50_000.0),
            )
            .operation(
                "framing",
                OperationDeclaration::new("Framing")
                    .priority(Priority::High)
                    .cost(35_000.0),
            )
            .operation(
                "interior",
                OperationDeclaration::new("Interior")
                    .priority(Priority::Medium)
                    .cost(15_000.0),
            )
    }

    fn service() -> MetadataLookupService {
        let store = Arc::new(OperationMetadataStore::new());
        store.register("Plan", plan());
        MetadataLookupService::new(store)
    }

    #[test]
    fn unknown_owner_is_none_and_not_cached() {
        let svc = service();
        assert!(svc.resolve("Ghost", "").is_none());
        assert!(svc.resolve("Ghost", "").is_none());
        assert!(svc.resolve("Plan", "demolish").is_none());
        assert_eq!(svc.cached_len(), 0);
    }

    #[test]
    fn repeated_resolve_returns_cached_instance() {
        let svc = service();
        let first = svc.resolve("Plan", "foundation").unwrap();
        let second = svc.resolve("Plan", "foundation").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(svc.cached_len(), 1);
    }

    #[test]
    fn concurrent_first_resolve_yields_one_instance() {
        let svc = service();
        let resolved: Vec<Arc<OperationDescriptor>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| svc.resolve("Plan", "framing").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(resolved.iter().all(|d| Arc::ptr_eq(d, &resolved[0])));
        assert_eq!(svc.cached_len(), 1);
    }

    #[test]
    fn resolve_owner_and_operation_forms() {
        let svc = service();
        let owner = svc.resolve_owner("Plan").unwrap();
        assert!(owner.is_owner_level());
        assert_eq!(owner.name(), "Plan");
        assert!(svc.resolve_operation("Plan", "").is_none());
        assert_eq!(
            svc.resolve_operation("Plan", "interior").unwrap().priority(),
            Priority::Medium
        );
    }

    #[test]
    fn list_all_is_owner_first_then_declaration_order() {
        let svc = service();
        let names: Vec<String> = svc
            .list_all("Plan")
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["Plan", "foundation", "framing", "interior"]);
        assert!(svc.list_all("Ghost").is_empty());
    }

    #[test]
    fn priority_queries() {
        let svc = service();
        let high: Vec<String> = svc
            .high_priority("Plan")
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(high, vec!["foundation", "framing"]);

        assert_eq!(svc.filter_by_priority("Plan", Priority::Low).len(), 4);
        assert_eq!(svc.filter_by_priority("Plan", Priority::Critical).len(), 1);

        let exact = svc.with_priority("Plan", Priority::High);
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].name(), "framing");
    }

    #[test]
    fn total_and_contingency_budget() {
        let svc = service();
        assert!((svc.total_estimated_cost("Plan") - 100_000.0).abs() < 1e-9);
        // 100k + 20% of (50k + 35k)
        assert!((svc.budget_with_contingency("Plan", 0.2) - 117_000.0).abs() < 1e-9);
        assert!((svc.total_estimated_cost("Ghost") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn has_operation_does_not_cache() {
        let svc = service();
        assert!(svc.has_operation("Plan", "framing"));
        assert!(svc.has_operation("Plan", ""));
        assert!(!svc.has_operation("Plan", "roofing"));
        assert_eq!(svc.cached_len(), 0);
    }

    #[test]
    fn malformed_declaration_degrades_to_none() {
        let store = Arc::new(OperationMetadataStore::new());
        store.register(
            "Broken",
            OwnerDeclarations::new()
                .operation("bad", OperationDeclaration::new("bad").cost(-5.0))
                .operation("risky", OperationDeclaration::new("risky").risk(9))
                .operation("good", OperationDeclaration::new("good").cost(5.0)),
        );
        let svc = MetadataLookupService::new(store);

        assert!(svc.resolve("Broken", "bad").is_none());
        assert!(svc.resolve("Broken", "risky").is_none());
        assert_eq!(svc.list_all("Broken").len(), 1);
        assert!((svc.total_estimated_cost("Broken") - 5.0).abs() < f64::EPSILON);
        assert_eq!(svc.cached_len(), 1);
    }

    #[test]
    fn clear_cache_forces_rebuild() {
        let svc = service();
        let before = svc.resolve("Plan", "foundation").unwrap();
        svc.clear_cache();
        assert_eq!(svc.cached_len(), 0);

        let after = svc.resolve("Plan", "foundation").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
    }

    #[test]
    fn re_registration_is_invisible_until_cache_cleared() {
        let svc = service();
        let cached = svc.resolve("Plan", "framing").unwrap();
        svc.store().register(
            "Plan",
            OwnerDeclarations::new().operation("framing", OperationDeclaration::new("v2")),
        );

        assert_eq!(svc.resolve("Plan", "framing").unwrap().description(), cached.description());
        svc.clear_cache();
        assert_eq!(svc.resolve("Plan", "framing").unwrap().description(), "v2");
    }

    #[test]
    fn warm_resolves_everything() {
        let svc = service();
        assert_eq!(svc.warm(), 4);
        assert_eq!(svc.cached_len(), 4);
    }

    #[test]
    fn operation_named_class_is_distinct_from_owner_level() {
        let store = Arc::new(OperationMetadataStore::new());
        store.register(
            "P",
            OwnerDeclarations::new()
                .owner_level(OperationDeclaration::new("owner-level").cost(1.0))
                .operation("class", OperationDeclaration::new("class op").cost(100.0)),
        );
        let svc = MetadataLookupService::new(store);

        let owner = svc.resolve_owner("P").unwrap();
        let op = svc.resolve("P", "class").unwrap();
        assert!(owner.is_owner_level());
        assert_eq!(op.operation_name(), "class");
        assert_eq!(op.description(), "class op");
        assert!(!Arc::ptr_eq(&owner, &op));

        let listed: Vec<String> = svc
            .list_all("P")
            .iter()
            .map(|d| d.description().to_string())
            .collect();
        assert_eq!(listed, vec!["owner-level", "class op"]);
        assert!((svc.total_estimated_cost("P") - 101.0).abs() < f64::EPSILON);
        assert_eq!(svc.cached_len(), 2);
    }

    #[test]
    fn owner_names_with_separator_do_not_alias() {
        let store = Arc::new(OperationMetadataStore::new());
        store.register(
            "a#b",
            OwnerDeclarations::new().owner_level(OperationDeclaration::new("a#b owner").cost(7.0)),
        );
        store.register(
            "a",
            OwnerDeclarations::new().operation("b#class", OperationDeclaration::new("a op").cost(3.0)),
        );
        let svc = MetadataLookupService::new(store);

        let owner = svc.resolve_owner("a#b").unwrap();
        let op = svc.resolve_operation("a", "b#class").unwrap();
        assert_eq!(owner.description(), "a#b owner");
        assert_eq!(op.description(), "a op");
        assert_eq!(op.owner_name(), "a");
        assert_eq!(svc.cached_len(), 2);

        // Resolving in the other order after a clear gives the same answers.
        svc.clear_cache();
        assert_eq!(svc.resolve_operation("a", "b#class").unwrap().description(), "a op");
        assert_eq!(svc.resolve_owner("a#b").unwrap().description(), "a#b owner");
    }

    #[test]
    fn clear_cache_while_resolving_keeps_results_consistent() {
        let decls = plan();
        let expected: Vec<(&str, OperationDescriptor)> = ["", "foundation", "framing", "interior"]
            .into_iter()
            .map(|op| {
                let built = OperationDescriptor::build("Plan", op, decls.find(op).unwrap()).unwrap();
                (op, built)
            })
            .collect();
        let svc = service();
        let declared_keys = expected.len();
        let done = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|s| {
            let resolvers: Vec<_> = (0..6)
                .map(|t| {
                    let svc = &svc;
                    let expected = &expected;
                    s.spawn(move || {
                        for i in 0..2_000 {
                            let (op, want) = &expected[(t + i) % expected.len()];
                            let got = svc.resolve("Plan", op).unwrap();
                            assert_eq!(*got, *want);
                            assert!(svc.cached_len() <= declared_keys);
                        }
                    })
                })
                .collect();

            s.spawn(|| {
                while !done.load(std::sync::atomic::Ordering::Acquire) {
                    svc.clear_cache();
                    assert!(svc.cached_len() <= declared_keys);
                    std::thread::yield_now();
                }
            });

            for r in resolvers {
                r.join().unwrap();
            }
            done.store(true, std::sync::atomic::Ordering::Release);
        });

        assert!(svc.cached_len() <= declared_keys);
        let first = svc.resolve("Plan", "framing").unwrap();
        assert!(Arc::ptr_eq(&first, &svc.resolve("Plan", "framing").unwrap()));
    }

    #[tokio::test]
    async fn lifecycle_reset_clears_cache() {
        let svc = service();
        let ctx = ServiceContext::new(SitePlannerConfig {
            warm_metadata_cache: true,
            ..SitePlannerConfig::default()
        });

        svc.init(&ctx).await.unwrap();
        assert_eq!(svc.cached_len(), 4);
        svc.reset().await.unwrap();
        assert_eq!(svc.cached_len(), 0);
        svc.shutdown(false).await.unwrap();
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn total_cost_is_sum_of_listed(
                owner_cost in proptest::option::of(0.0f64..1e6),
                costs in proptest::collection::vec(0.0f64..1e6, 0..12),
            ) {
                let mut decls = OwnerDeclarations::new();
                if let Some(cost) = owner_cost {
                    decls = decls.owner_level(OperationDeclaration::new("owner").cost(cost));
                }
                for (i, cost) in costs.iter().enumerate() {
                    decls = decls.operation(format!("op{i}"), OperationDeclaration::new("op").cost(*cost));
                }
                let store = Arc::new(OperationMetadataStore::new());
                store.register("P", decls);
                let svc = MetadataLookupService::new(store);

                let listed: f64 = svc.list_all("P").iter().map(|d| d.estimated_cost()).sum();
                let expected: f64 = owner_cost.into_iter().chain(costs.iter().copied()).sum();

                prop_assert!((svc.total_estimated_cost("P") - listed).abs() < 1e-6);
                prop_assert!((listed - expected).abs() < 1e-6);
                prop_assert_eq!(svc.list_all("P").len(), costs.len() + usize::from(owner_cost.is_some()));
            }
        }
    }
}
