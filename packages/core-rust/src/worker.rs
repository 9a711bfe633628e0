//! Construction workers and their salary rules.
//!
//! Worker kinds form a closed set; each variant carries the data its own
//! salary and certification rules need.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hazard-pay uplift applied to electricians.
const ELECTRICIAN_HAZARD_PAY: f64 = 0.2;
/// Bonus for plumbers who bring their own tools.
const PLUMBER_TOOL_BONUS: f64 = 0.15;
/// Per-experience-level uplift applied to builders.
const BUILDER_EXPERIENCE_BONUS: f64 = 0.1;
/// Minimum insurance cover for a certified electrician.
const ELECTRICIAN_MIN_INSURANCE: f64 = 1000.0;

/// Variant-specific worker data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WorkerKind {
    Builder { specialization: String },
    Electrician { insurance_amount: f64 },
    Plumber { has_own_tools: bool },
}

impl WorkerKind {
    /// Position label used for team grouping.
    #[must_use]
    pub fn position(&self) -> &'static str {
        match self {
            WorkerKind::Builder { .. } => "Builder",
            WorkerKind::Electrician { .. } => "Electrician",
            WorkerKind::Plumber { .. } => "Plumber",
        }
    }

    /// Experience level a freshly hired worker of this kind starts with.
    #[must_use]
    pub fn default_experience(&self) -> u32 {
        match self {
            WorkerKind::Builder { .. } => 3,
            WorkerKind::Electrician { .. } => 4,
            WorkerKind::Plumber { .. } => 2,
        }
    }
}

/// A single team member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub name: String,
    pub hourly_rate: f64,
    pub experience_level: u32,
    pub kind: WorkerKind,
}

impl Worker {
    /// Creates a worker with the kind's default experience level.
    #[must_use]
    pub fn new(name: impl Into<String>, hourly_rate: f64, kind: WorkerKind) -> Self {
        let experience_level = kind.default_experience();
        Self {
            name: name.into(),
            hourly_rate,
            experience_level,
            kind,
        }
    }

    #[must_use]
    pub fn builder(name: impl Into<String>, specialization: impl Into<String>, hourly_rate: f64) -> Self {
        Self::new(
            name,
            hourly_rate,
            WorkerKind::Builder {
                specialization: specialization.into(),
            },
        )
    }

    #[must_use]
    pub fn electrician(name: impl Into<String>, insurance_amount: f64, hourly_rate: f64) -> Self {
        Self::new(name, hourly_rate, WorkerKind::Electrician { insurance_amount })
    }

    #[must_use]
    pub fn plumber(name: impl Into<String>, has_own_tools: bool, hourly_rate: f64) -> Self {
        Self::new(name, hourly_rate, WorkerKind::Plumber { has_own_tools })
    }

    /// Overrides the experience level.
    #[must_use]
    pub fn with_experience(mut self, experience_level: u32) -> Self {
        self.experience_level = experience_level;
        self
    }

    #[must_use]
    pub fn position(&self) -> &'static str {
        self.kind.position()
    }

    /// Monthly salary for `hours_worked`, using the variant's bonus rule:
    ///
    /// - builder: `rate × hours × (1 + experience × 0.1)`
    /// - electrician: `rate × hours × 1.2`
    /// - plumber: `rate × hours × 1.15` with own tools, else `rate × hours`
    #[must_use]
    pub fn monthly_salary(&self, hours_worked: u32) -> f64 {
        let base = self.hourly_rate * f64::from(hours_worked);
        let multiplier = match &self.kind {
            WorkerKind::Builder { .. } => {
                1.0 + f64::from(self.experience_level) * BUILDER_EXPERIENCE_BONUS
            }
            WorkerKind::Electrician { .. } => 1.0 + ELECTRICIAN_HAZARD_PAY,
            WorkerKind::Plumber { has_own_tools } => {
                if *has_own_tools {
                    1.0 + PLUMBER_TOOL_BONUS
                } else {
                    1.0
                }
            }
        };
        base * multiplier
    }

    #[must_use]
    pub fn is_certified(&self) -> bool {
        match &self.kind {
            WorkerKind::Builder { .. } | WorkerKind::Plumber { .. } => true,
            WorkerKind::Electrician { insurance_amount } => {
                *insurance_amount >= ELECTRICIAN_MIN_INSURANCE
            }
        }
    }

    #[must_use]
    pub fn can_perform_complex_task(&self) -> bool {
        match &self.kind {
            WorkerKind::Builder { .. } => self.experience_level >= 3,
            WorkerKind::Electrician { .. } => self.is_certified() && self.experience_level > 3,
            WorkerKind::Plumber { has_own_tools } => *has_own_tools && self.experience_level > 1,
        }
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WorkerKind::Builder { specialization } => {
                write!(f, "Builder: {} ({specialization})", self.name)
            }
            WorkerKind::Electrician { insurance_amount } => {
                write!(f, "Electrician: {} (Insurance: ${insurance_amount:.2})", self.name)
            }
            WorkerKind::Plumber { has_own_tools } => {
                write!(f, "Plumber: {} (Has tools: {has_own_tools})", self.name)
            }
        }
    }
}
