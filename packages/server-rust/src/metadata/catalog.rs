//! Built-in operation metadata for the site planner's own components.

use siteplan_core::{OperationDeclaration, OwnerDeclarations, Priority};

use super::registry::{OperationMetadataStore, OperationOwner};
use crate::messages::MessageLogger;
use crate::simulation::SiteSimulation;

/// Reference residential site plan: the building operations a typical
/// project schedules.
pub struct SitePlan;

impl OperationOwner for SitePlan {
    const OWNER_NAME: &'static str = "SitePlan";

    fn declarations() -> OwnerDeclarations {
        OwnerDeclarations::new()
            .owner_level(
                OperationDeclaration::new("Reference site plan with declared building operations")
                    .priority(Priority::Low),
            )
            .operation(
                "build_foundation",
                OperationDeclaration::new("Excavate and pour the foundation")
                    .priority(Priority::Critical)
                    .cost(50_000.0)
                    .tools(["concrete-mixer", "excavator", "rebar"])
                    .time(120.0)
                    .certified()
                    .risk(3),
            )
            .operation(
                "build_framing",
                OperationDeclaration::new("Raise the structural frame")
                    .priority(Priority::High)
                    .cost(35_000.0)
                    .tools(["nail-gun", "lumber", "level"])
                    .time(80.0)
                    .risk(2)
                    .depends_on(["build_foundation"]),
            )
            .operation(
                "finish_interior",
                OperationDeclaration::new("Paint and seal interior surfaces")
                    .priority(Priority::Medium)
                    .cost(15_000.0)
                    .tools(["paint", "brushes", "caulk"])
                    .time(60.0)
                    .risk(1)
                    .depends_on(["build_framing"]),
            )
            .operation(
                "calculate_project_budget",
                OperationDeclaration::new("Budget from declared costs plus contingency")
                    .priority(Priority::High),
            )
    }
}

/// Report production for finished estimates.
pub struct ReportGenerator;

impl OperationOwner for ReportGenerator {
    const OWNER_NAME: &'static str = "ReportGenerator";

    fn declarations() -> OwnerDeclarations {
        OwnerDeclarations::new()
            .owner_level(
                OperationDeclaration::new("Report generation for construction projects")
                    .priority(Priority::Medium),
            )
            .operation(
                "generate_detailed_report",
                OperationDeclaration::new("Detailed report for one estimate")
                    .tools(["reporting-template", "project-data"]),
            )
            .operation(
                "export_report",
                OperationDeclaration::new("Export a report to a file format")
                    .priority(Priority::Low)
                    .cost(25.0)
                    .tools(["pdf-generator", "csv-converter", "file-system-access"]),
            )
    }
}

impl OperationOwner for MessageLogger {
    const OWNER_NAME: &'static str = "MessageLogger";

    fn declarations() -> OwnerDeclarations {
        OwnerDeclarations::new()
            .owner_level(
                OperationDeclaration::new("Sequenced message logging for concurrent producers")
                    .priority(Priority::Medium),
            )
            .operation(
                "global",
                OperationDeclaration::new("Process-wide logger, created once")
                    .priority(Priority::High),
            )
            .operation(
                "log_message",
                OperationDeclaration::new("Log a typed message with the next sequence number")
                    .priority(Priority::Medium),
            )
            .operation(
                "reset",
                OperationDeclaration::new("Restart message numbering").priority(Priority::Low),
            )
    }
}

impl OperationOwner for SiteSimulation {
    const OWNER_NAME: &'static str = "SiteSimulation";

    fn declarations() -> OwnerDeclarations {
        OwnerDeclarations::new()
            .owner_level(
                OperationDeclaration::new("Concurrent construction sites with shared checkpoints")
                    .priority(Priority::High),
            )
            .operation(
                "run",
                OperationDeclaration::new("Run every site assignment to completion")
                    .priority(Priority::High)
                    .depends_on(["MessageLogger::global"]),
            )
            .operation(
                "checkpoint",
                OperationDeclaration::new("Wait for all sites, then announce the next phase"),
            )
    }
}

/// Registers every built-in owner.
pub fn register_builtin_catalog(store: &OperationMetadataStore) {
    store.register_owner::<SitePlan>();
    store.register_owner::<ReportGenerator>();
    store.register_owner::<MessageLogger>();
    store.register_owner::<SiteSimulation>();
}
