//! Cost and duration estimation for a (project, team) pair.
//!
//! [`EstimationEngine::estimate`] runs four ordered stages and stops at the
//! first failure:
//!
//! 1. **Team size**: fewer than `min_team_size` members is rejected before any
//!    cost is computed.
//! 2. **Material**: the project's material (case-insensitive) must map to a
//!    coefficient in [`MATERIAL_COEFFICIENTS`].
//! 3. **Budget**: material cost plus labor cost must not exceed the ceiling.
//! 4. **Duration**: `ceil((area / divisor × floors) × (1 − size × efficiency))`.
//!
//! The engine holds no mutable state and can be shared across threads.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::project::ProjectDescriptor;
use crate::team::ConstructionTeam;

/// Per-square-metre-per-floor coefficients for supported materials.
pub const MATERIAL_COEFFICIENTS: [(&str, f64); 3] =
    [("brick", 5000.0), ("wood", 3000.0), ("concrete", 4000.0)];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Constants used by the estimation formulas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EstimationConfig {
    /// Minimum number of team members required to estimate.
    pub min_team_size: usize,
    /// Total cost above which estimation fails.
    pub budget_ceiling: f64,
    /// Labor cost per square metre.
    pub labor_area_factor: f64,
    /// Flat labor cost per team member.
    pub team_member_cost: f64,
    /// Square metres handled per day per floor before team efficiency.
    pub area_divisor: f64,
    /// Fraction of duration saved per additional team member.
    pub team_efficiency_factor: f64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            min_team_size: 3,
            budget_ceiling: 100_000_000.0,
            labor_area_factor: 2000.0,
            team_member_cost: 50_000.0,
            area_divisor: 10.0,
            team_efficiency_factor: 0.02,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Deterministic validation failures from [`EstimationEngine::estimate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    #[error("team is too small for construction project: {actual} members, {required} required")]
    InsufficientTeamSize { actual: usize, required: usize },

    #[error("unsupported building material: {material}")]
    InvalidMaterial { material: String },

    #[error("project cost {calculated:.2} exceeds available budget {ceiling:.2}")]
    BudgetExceeded { calculated: f64, ceiling: f64 },
}

impl EstimationError {
    /// How far over budget the estimate went; `None` for other variants.
    #[must_use]
    pub fn exceeded_amount(&self) -> Option<f64> {
        match self {
            EstimationError::BudgetExceeded {
                calculated,
                ceiling,
            } => Some(calculated - ceiling),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of a successful estimation. Only [`EstimationEngine`] builds these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationResult {
    project: ProjectDescriptor,
    team: ConstructionTeam,
    material_cost: f64,
    labor_cost: f64,
    estimated_cost: f64,
    estimated_duration: f64,
}

impl EstimationResult {
    #[must_use]
    pub fn project(&self) -> &ProjectDescriptor {
        &self.project
    }

    #[must_use]
    pub fn team(&self) -> &ConstructionTeam {
        &self.team
    }

    #[must_use]
    pub fn material_cost(&self) -> f64 {
        self.material_cost
    }

    #[must_use]
    pub fn labor_cost(&self) -> f64 {
        self.labor_cost
    }

    /// Material plus labor.
    #[must_use]
    pub fn estimated_cost(&self) -> f64 {
        self.estimated_cost
    }

    /// Days. May be negative for very large teams; see
    /// [`EstimationResult::has_negative_duration`].
    #[must_use]
    pub fn estimated_duration(&self) -> f64 {
        self.estimated_duration
    }

    /// The duration formula is applied verbatim, so a team large enough to
    /// push the efficiency factor past 1 yields a negative duration. Callers
    /// should treat such results as needing review.
    #[must_use]
    pub fn has_negative_duration(&self) -> bool {
        self.estimated_duration < 0.0
    }
}

impl fmt::Display for EstimationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConstructionResult: {} (Cost: ${:.2}, Duration: {:.1} days)",
            self.project.name(),
            self.estimated_cost,
            self.estimated_duration
        )
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Material cost strategy: `(area, coefficient, floors) -> cost`.
pub type CostEstimator = Arc<dyn Fn(f64, f64, u32) -> f64 + Send + Sync>;

/// Material name normalization applied before the coefficient lookup.
pub type MaterialNormalizer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Stateless estimation pipeline.
///
/// Strategies are explicit values set through the `with_*` builders; the
/// defaults reproduce `area × coefficient × floors` and lower-casing.
#[derive(Clone)]
pub struct EstimationEngine {
    config: EstimationConfig,
    cost_estimator: CostEstimator,
    material_normalizer: MaterialNormalizer,
}

impl EstimationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EstimationConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EstimationConfig) -> Self {
        Self {
            config,
            cost_estimator: Arc::new(|area: f64, coefficient: f64, floors: u32| {
                area * coefficient * f64::from(floors)
            }),
            material_normalizer: Arc::new(str::to_lowercase),
        }
    }

    #[must_use]
    pub fn with_cost_estimator(mut self, estimator: CostEstimator) -> Self {
        self.cost_estimator = estimator;
        self
    }

    #[must_use]
    pub fn with_material_normalizer(mut self, normalizer: MaterialNormalizer) -> Self {
        self.material_normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EstimationConfig {
        &self.config
    }

    /// Runs the full pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's [`EstimationError`]; no partial
    /// result is produced.
    pub fn estimate(
        &self,
        project: &ProjectDescriptor,
        team: &ConstructionTeam,
    ) -> Result<EstimationResult, EstimationError> {
        info!(project = %project.name(), team_size = team.size(), "starting estimation");

        let team_size = team.size();
        if team_size < self.config.min_team_size {
            return Err(EstimationError::InsufficientTeamSize {
                actual: team_size,
                required: self.config.min_team_size,
            });
        }

        let material_cost = self.material_cost(project)?;
        let labor_cost = self.labor_cost(project, team);
        let total = material_cost + labor_cost;

        if total > self.config.budget_ceiling {
            return Err(EstimationError::BudgetExceeded {
                calculated: total,
                ceiling: self.config.budget_ceiling,
            });
        }

        let duration = self.duration(project, team);
        if duration < 0.0 {
            warn!(
                project = %project.name(),
                team_size,
                duration,
                "estimated duration is negative; team efficiency factor exceeds 1"
            );
        }

        debug!(project = %project.name(), total, duration, "estimation completed");
        Ok(EstimationResult {
            project: project.clone(),
            team: team.clone(),
            material_cost,
            labor_cost,
            estimated_cost: total,
            estimated_duration: duration,
        })
    }

    /// Coefficient for `material` after normalization.
    ///
    /// # Errors
    ///
    /// Returns [`EstimationError::InvalidMaterial`] carrying the caller's
    /// original spelling when the material is not in the table.
    pub fn material_coefficient(&self, material: &str) -> Result<f64, EstimationError> {
        let normalized = (self.material_normalizer)(material);
        MATERIAL_COEFFICIENTS
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|&(_, coefficient)| coefficient)
            .ok_or_else(|| EstimationError::InvalidMaterial {
                material: material.to_string(),
            })
    }

    /// Material cost via the configured [`CostEstimator`].
    ///
    /// # Errors
    ///
    /// Returns [`EstimationError::InvalidMaterial`] for unmapped materials.
    pub fn material_cost(&self, project: &ProjectDescriptor) -> Result<f64, EstimationError> {
        let coefficient = self.material_coefficient(project.material())?;
        let cost = (self.cost_estimator)(project.area(), coefficient, project.floors());
        debug!(project = %project.name(), cost, "material cost calculated");
        Ok(cost)
    }

    /// `area × labor_area_factor + team_size × team_member_cost`. Individual
    /// worker rates do not enter this aggregate.
    #[must_use]
    pub fn labor_cost(&self, project: &ProjectDescriptor, team: &ConstructionTeam) -> f64 {
        let cost = project.area() * self.config.labor_area_factor
            + team_size_f64(team) * self.config.team_member_cost;
        debug!(project = %project.name(), cost, "labor cost calculated");
        cost
    }

    /// Duration in days. Not clamped.
    #[must_use]
    pub fn duration(&self, project: &ProjectDescriptor, team: &ConstructionTeam) -> f64 {
        let base_time = project.area() / self.config.area_divisor * f64::from(project.floors());
        let team_factor = 1.0 - team_size_f64(team) * self.config.team_efficiency_factor;
        (base_time * team_factor).ceil()
    }
}

impl Default for EstimationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EstimationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimationEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// Team sizes are small; u32 covers any realistic roster exactly.
fn team_size_f64(team: &ConstructionTeam) -> f64 {
    f64::from(u32::try_from(team.size()).unwrap_or(u32::MAX))
}
