//! Operation metadata: priorities, raw declarations, and validated descriptors.
//!
//! An *owner* (a type or named component) declares zero-or-one owner-level
//! [`OperationDeclaration`] plus any number of operation-level declarations.
//! Declarations are unchecked data; [`OperationDescriptor::build`] validates
//! one and produces the immutable record handed out by the lookup service.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound (inclusive) for [`OperationDescriptor::risk_level`].
pub const MAX_RISK_LEVEL: u8 = 3;

/// Cache-key suffix used for owner-level descriptors.
const OWNER_LEVEL_SUFFIX: &str = "class";

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Priority of an operation. Variants are declared in ascending order so the
/// derived `Ord` matches business priority.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Returns `true` for `High` and `Critical`.
    #[must_use]
    pub fn is_high(self) -> bool {
        self >= Priority::High
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Declarations (unchecked)
// ---------------------------------------------------------------------------

/// Raw declarative metadata for one owner or operation.
///
/// Field defaults mirror an empty declaration: no description, `Medium`
/// priority, zero cost and time, no tools, no certification, risk 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OperationDeclaration {
    pub description: String,
    pub priority: Priority,
    pub estimated_cost: f64,
    pub required_tools: Vec<String>,
    /// Hours.
    pub estimated_time: f64,
    pub requires_certification: bool,
    pub risk_level: u8,
    pub dependencies: Vec<String>,
}

impl OperationDeclaration {
    /// Starts a declaration with the given description and default fields.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn cost(mut self, estimated_cost: f64) -> Self {
        self.estimated_cost = estimated_cost;
        self
    }

    #[must_use]
    pub fn tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn time(mut self, hours: f64) -> Self {
        self.estimated_time = hours;
        self
    }

    #[must_use]
    pub fn certified(mut self) -> Self {
        self.requires_certification = true;
        self
    }

    #[must_use]
    pub fn risk(mut self, risk_level: u8) -> Self {
        self.risk_level = risk_level;
        self
    }

    #[must_use]
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }
}

/// A named operation-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEntry {
    pub name: String,
    #[serde(flatten)]
    pub declaration: OperationDeclaration,
}

/// Everything one owner declares, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OwnerDeclarations {
    pub owner_level: Option<OperationDeclaration>,
    pub operations: Vec<OperationEntry>,
}

impl OwnerDeclarations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the owner-level declaration.
    #[must_use]
    pub fn owner_level(mut self, declaration: OperationDeclaration) -> Self {
        self.owner_level = Some(declaration);
        self
    }

    /// Appends an operation-level declaration.
    #[must_use]
    pub fn operation(mut self, name: impl Into<String>, declaration: OperationDeclaration) -> Self {
        self.operations.push(OperationEntry {
            name: name.into(),
            declaration,
        });
        self
    }

    /// Finds a declaration: empty `operation` selects the owner-level one.
    /// When an operation name is declared twice the first declaration wins.
    #[must_use]
    pub fn find(&self, operation: &str) -> Option<&OperationDeclaration> {
        if operation.is_empty() {
            return self.owner_level.as_ref();
        }
        self.operations
            .iter()
            .find(|entry| entry.name == operation)
            .map(|entry| &entry.declaration)
    }

    /// Names of operation-level declarations in declaration order, without
    /// repeats.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.operations.len());
        for entry in &self.operations {
            if !names.contains(&entry.name.as_str()) {
                names.push(entry.name.as_str());
            }
        }
        names
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owner_level.is_none() && self.operations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Descriptor (validated)
// ---------------------------------------------------------------------------

/// Reasons a declaration cannot be turned into a descriptor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptorError {
    #[error("estimated cost must be a non-negative number, got {value}")]
    NegativeCost { value: f64 },
    #[error("estimated time must be a non-negative number, got {value}")]
    NegativeTime { value: f64 },
    #[error("risk level {value} is outside 0..={max}")]
    RiskOutOfRange { value: u8, max: u8 },
}

/// Validated, immutable metadata for an owner or one of its operations.
///
/// Identity is `(owner_name, operation_name)`; an empty operation name marks
/// the owner-level descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    owner_name: String,
    operation_name: String,
    description: String,
    priority: Priority,
    estimated_cost: f64,
    required_tools: Vec<String>,
    estimated_time: f64,
    requires_certification: bool,
    risk_level: u8,
    dependencies: Vec<String>,
}

impl OperationDescriptor {
    /// Validates `declaration` and builds the descriptor for
    /// `(owner, operation)`.
    ///
    /// # Errors
    ///
    /// Returns a [`DescriptorError`] when cost or time is negative or not
    /// finite, or when the risk level exceeds [`MAX_RISK_LEVEL`].
    pub fn build(
        owner: &str,
        operation: &str,
        declaration: &OperationDeclaration,
    ) -> Result<Self, DescriptorError> {
        if !declaration.estimated_cost.is_finite() || declaration.estimated_cost < 0.0 {
            return Err(DescriptorError::NegativeCost {
                value: declaration.estimated_cost,
            });
        }
        if !declaration.estimated_time.is_finite() || declaration.estimated_time < 0.0 {
            return Err(DescriptorError::NegativeTime {
                value: declaration.estimated_time,
            });
        }
        if declaration.risk_level > MAX_RISK_LEVEL {
            return Err(DescriptorError::RiskOutOfRange {
                value: declaration.risk_level,
                max: MAX_RISK_LEVEL,
            });
        }

        Ok(Self {
            owner_name: owner.to_string(),
            operation_name: operation.to_string(),
            description: declaration.description.clone(),
            priority: declaration.priority,
            estimated_cost: declaration.estimated_cost,
            required_tools: declaration.required_tools.clone(),
            estimated_time: declaration.estimated_time,
            requires_certification: declaration.requires_certification,
            risk_level: declaration.risk_level,
            dependencies: declaration.dependencies.clone(),
        })
    }

    /// Display form of a descriptor's identity: `owner#operation`, or
    /// `owner#class` for the owner-level descriptor. Not unique: an operation
    /// named `class` or an owner containing `#` renders the same string as
    /// another pair, so lookups key on the `(owner, operation)` pair instead.
    #[must_use]
    pub fn cache_key(owner: &str, operation: &str) -> String {
        if operation.is_empty() {
            format!("{owner}#{OWNER_LEVEL_SUFFIX}")
        } else {
            format!("{owner}#{operation}")
        }
    }

    #[must_use]
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    #[must_use]
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// The operation name, or the owner name for owner-level descriptors.
    #[must_use]
    pub fn name(&self) -> &str {
        if self.is_owner_level() {
            &self.owner_name
        } else {
            &self.operation_name
        }
    }

    #[must_use]
    pub fn is_owner_level(&self) -> bool {
        self.operation_name.is_empty()
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub fn estimated_cost(&self) -> f64 {
        self.estimated_cost
    }

    #[must_use]
    pub fn required_tools(&self) -> &[String] {
        &self.required_tools
    }

    #[must_use]
    pub fn required_tools_count(&self) -> usize {
        self.required_tools.len()
    }

    #[must_use]
    pub fn requires_tool(&self, tool: &str) -> bool {
        self.required_tools.iter().any(|t| t == tool)
    }

    /// Hours.
    #[must_use]
    pub fn estimated_time(&self) -> f64 {
        self.estimated_time
    }

    #[must_use]
    pub fn requires_certification(&self) -> bool {
        self.requires_certification
    }

    #[must_use]
    pub fn risk_level(&self) -> u8 {
        self.risk_level
    }

    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Returns a copy with a different priority. The original is untouched.
    #[must_use]
    pub fn with_priority(&self, priority: Priority) -> Self {
        Self {
            priority,
            ..self.clone()
        }
    }

    /// Returns a copy with a different estimated cost. The original is
    /// untouched.
    #[must_use]
    pub fn with_estimated_cost(&self, estimated_cost: f64) -> Self {
        Self {
            estimated_cost,
            ..self.clone()
        }
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.owner_name)?;
        if !self.is_owner_level() {
            write!(f, "::{}", self.operation_name)?;
        }
        write!(
            f,
            " [{}] ${:.2} \"{}\"",
            self.priority, self.estimated_cost, self.description
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foundation() -> OperationDeclaration {
        OperationDeclaration::new("Pour the foundation")
            .priority(Priority::Critical)
            .cost(50_000.0)
            .tools(["concrete-mixer", "excavator", "rebar"])
    }

    #[test]
    fn priority_ordering_is_ascending() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
        assert!(Priority::Critical.is_high());
        assert!(!Priority::Medium.is_high());
    }

    #[test]
    fn default_declaration_matches_empty_annotation() {
        let decl = OperationDeclaration::default();
        assert_eq!(decl.priority, Priority::Medium);
        assert!(decl.required_tools.is_empty());
        assert!((decl.estimated_cost - 0.0).abs() < f64::EPSILON);
        assert_eq!(decl.risk_level, 0);
    }

    #[test]
    fn build_copies_all_fields() {
        let decl = foundation().time(12.5).certified().risk(2).depends_on(["survey"]);
        let d = OperationDescriptor::build("SitePlan", "build_foundation", &decl).unwrap();

        assert_eq!(d.owner_name(), "SitePlan");
        assert_eq!(d.operation_name(), "build_foundation");
        assert_eq!(d.name(), "build_foundation");
        assert!(!d.is_owner_level());
        assert_eq!(d.priority(), Priority::Critical);
        assert!((d.estimated_cost() - 50_000.0).abs() < f64::EPSILON);
        assert_eq!(d.required_tools_count(), 3);
        assert!(d.requires_tool("rebar"));
        assert!(!d.requires_tool("hammer"));
        assert!((d.estimated_time() - 12.5).abs() < f64::EPSILON);
        assert!(d.requires_certification());
        assert_eq!(d.risk_level(), 2);
        assert_eq!(d.dependencies(), ["survey".to_string()]);
    }

    #[test]
    fn owner_level_name_is_owner() {
        let d = OperationDescriptor::build("SitePlan", "", &OperationDeclaration::new("x")).unwrap();
        assert!(d.is_owner_level());
        assert_eq!(d.name(), "SitePlan");
    }

    #[test]
    fn build_rejects_negative_cost() {
        let err = OperationDescriptor::build("o", "op", &foundation().cost(-1.0)).unwrap_err();
        assert_eq!(err, DescriptorError::NegativeCost { value: -1.0 });
    }

    #[test]
    fn build_rejects_non_finite_cost_and_time() {
        assert!(matches!(
            OperationDescriptor::build("o", "op", &foundation().cost(f64::NAN)),
            Err(DescriptorError::NegativeCost { .. })
        ));
        assert!(matches!(
            OperationDescriptor::build("o", "op", &foundation().time(f64::INFINITY)),
            Err(DescriptorError::NegativeTime { .. })
        ));
    }

    #[test]
    fn build_rejects_risk_above_three() {
        let err = OperationDescriptor::build("o", "op", &foundation().risk(4)).unwrap_err();
        assert_eq!(err, DescriptorError::RiskOutOfRange { value: 4, max: 3 });
        assert!(OperationDescriptor::build("o", "op", &foundation().risk(3)).is_ok());
    }

    #[test]
    fn cache_key_format() {
        assert_eq!(OperationDescriptor::cache_key("Owner", ""), "Owner#class");
        assert_eq!(OperationDescriptor::cache_key("Owner", "run"), "Owner#run");
    }

    #[test]
    fn with_helpers_leave_original_untouched() {
        let d = OperationDescriptor::build("o", "op", &foundation()).unwrap();
        let lowered = d.with_priority(Priority::Low);
        let cheaper = d.with_estimated_cost(10.0);

        assert_eq!(d.priority(), Priority::Critical);
        assert_eq!(lowered.priority(), Priority::Low);
        assert!((cheaper.estimated_cost() - 10.0).abs() < f64::EPSILON);
        assert!((d.estimated_cost() - 50_000.0).abs() < f64::EPSILON);
        assert_eq!(lowered.required_tools(), d.required_tools());
    }

    #[test]
    fn owner_declarations_find_and_order() {
        let decls = OwnerDeclarations::new()
            .owner_level(OperationDeclaration::new("owner"))
            .operation("b", OperationDeclaration::new("first b"))
            .operation("a", OperationDeclaration::new("a"))
            .operation("b", OperationDeclaration::new("second b"));

        assert_eq!(decls.find("").unwrap().description, "owner");
        assert_eq!(decls.find("b").unwrap().description, "first b");
        assert!(decls.find("missing").is_none());
        assert_eq!(decls.operation_names(), vec!["b", "a"]);
        assert!(!decls.is_empty());
        assert!(OwnerDeclarations::new().is_empty());
    }

    #[test]
    fn declarations_deserialize_with_defaults() {
        let json = r#"{
            "ownerLevel": { "description": "Crane hire", "priority": "HIGH" },
            "operations": [
                { "name": "lift", "estimatedCost": 1200.0, "requiredTools": ["crane"] }
            ]
        }"#;
        let decls: OwnerDeclarations = serde_json::from_str(json).unwrap();

        let owner = decls.owner_level.as_ref().unwrap();
        assert_eq!(owner.priority, Priority::High);
        let lift = decls.find("lift").unwrap();
        assert_eq!(lift.priority, Priority::Medium);
        assert_eq!(lift.required_tools, vec!["crane".to_string()]);
    }

    #[test]
    fn display_includes_priority_and_cost() {
        let d = OperationDescriptor::build("SitePlan", "build_foundation", &foundation()).unwrap();
        assert_eq!(
            d.to_string(),
            "SitePlan::build_foundation [CRITICAL] $50000.00 \"Pour the foundation\""
        );
    }
}
