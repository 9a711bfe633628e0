//! Project descriptor: the building to be estimated.
//!
//! Area bounds are enforced at construction and on every area mutation, so an
//! existing [`ProjectDescriptor`] is always within `0 < area <= MAX_ALLOWED_AREA`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Maximum floor area (square metres) a single project may declare.
pub const MAX_ALLOWED_AREA: f64 = 1000.0;

/// Days of work per square metre per floor used by
/// [`ProjectDescriptor::construction_time`].
const DAYS_PER_AREA_FLOOR: f64 = 0.5;

/// Errors raised while constructing or mutating a project.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectError {
    /// Area exceeds [`MAX_ALLOWED_AREA`].
    #[error("project area {actual} exceeds maximum allowed size {max}")]
    SizeTooLarge { actual: f64, max: f64 },
    #[error("project area must be a positive number, got {actual}")]
    InvalidArea { actual: f64 },
    #[error("project must have at least one floor")]
    InvalidFloors,
}

/// A validated building project.
///
/// Deserialization goes through [`ProjectDescriptor::new`], so documents with
/// out-of-range values are rejected rather than producing an invalid project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProject")]
pub struct ProjectDescriptor {
    name: String,
    area: f64,
    floors: u32,
    material: String,
}

impl ProjectDescriptor {
    /// Creates a project.
    ///
    /// `material` is stored verbatim; it is resolved against the material
    /// table only at estimation time.
    ///
    /// # Errors
    ///
    /// - [`ProjectError::SizeTooLarge`] if `area > MAX_ALLOWED_AREA` (1000 is accepted)
    /// - [`ProjectError::InvalidArea`] if `area` is zero, negative, or not finite
    /// - [`ProjectError::InvalidFloors`] if `floors == 0`
    pub fn new(
        name: impl Into<String>,
        area: f64,
        floors: u32,
        material: impl Into<String>,
    ) -> Result<Self, ProjectError> {
        check_area(area)?;
        if floors == 0 {
            return Err(ProjectError::InvalidFloors);
        }
        let project = Self {
            name: name.into(),
            area,
            floors,
            material: material.into(),
        };
        debug!(project = %project.name, area, floors, "project created");
        Ok(project)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Square metres.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.area
    }

    #[must_use]
    pub fn floors(&self) -> u32 {
        self.floors
    }

    #[must_use]
    pub fn material(&self) -> &str {
        &self.material
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        debug!(project = %self.name, "project renamed");
    }

    /// Updates the area. On error the project is left unchanged.
    ///
    /// # Errors
    ///
    /// Same area rules as [`ProjectDescriptor::new`].
    pub fn set_area(&mut self, area: f64) -> Result<(), ProjectError> {
        check_area(area)?;
        self.area = area;
        debug!(project = %self.name, area, "project area updated");
        Ok(())
    }

    /// Updates the floor count. On error the project is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::InvalidFloors`] if `floors == 0`.
    pub fn set_floors(&mut self, floors: u32) -> Result<(), ProjectError> {
        if floors == 0 {
            return Err(ProjectError::InvalidFloors);
        }
        self.floors = floors;
        debug!(project = %self.name, floors, "project floors updated");
        Ok(())
    }

    pub fn set_material(&mut self, material: impl Into<String>) {
        self.material = material.into();
        debug!(project = %self.name, material = %self.material, "project material updated");
    }

    /// Blueprint sanity check: positive area and floors, non-blank material.
    #[must_use]
    pub fn validate_blueprint(&self) -> bool {
        self.area > 0.0 && self.floors > 0 && !self.material.trim().is_empty()
    }

    /// Rough construction time in days (area × floors × 0.5), independent of
    /// team composition.
    #[must_use]
    pub fn construction_time(&self) -> f64 {
        self.area * f64::from(self.floors) * DAYS_PER_AREA_FLOOR
    }
}

impl fmt::Display for ProjectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Project: {} ({:.2} m², {} floors, {})",
            self.name, self.area, self.floors, self.material
        )
    }
}

/// Unchecked wire form of a project.
#[derive(Deserialize)]
struct RawProject {
    name: String,
    area: f64,
    floors: u32,
    material: String,
}

impl TryFrom<RawProject> for ProjectDescriptor {
    type Error = ProjectError;

    fn try_from(raw: RawProject) -> Result<Self, Self::Error> {
        Self::new(raw.name, raw.area, raw.floors, raw.material)
    }
}

fn check_area(area: f64) -> Result<(), ProjectError> {
    if !area.is_finite() || area <= 0.0 {
        return Err(ProjectError::InvalidArea { actual: area });
    }
    if area > MAX_ALLOWED_AREA {
        return Err(ProjectError::SizeTooLarge {
            actual: area,
            max: MAX_ALLOWED_AREA,
        });
    }
    Ok(())
}
