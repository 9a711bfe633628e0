//! Construction team: an ordered roster with position indices.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::worker::Worker;

/// Ordered team roster.
///
/// Maintains two derived indices alongside the roster: member indices grouped
/// by position, and the distinct positions in first-seen order. Both are
/// updated on every [`ConstructionTeam::add_member`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Worker>", into = "Vec<Worker>")]
pub struct ConstructionTeam {
    members: Vec<Worker>,
    by_position: HashMap<&'static str, Vec<usize>>,
    positions: Vec<&'static str>,
}

impl ConstructionTeam {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&mut self, worker: Worker) {
        let position = worker.position();
        let index = self.members.len();
        debug!(member = %worker.name, position, "team member added");

        self.by_position.entry(position).or_default().push(index);
        if !self.positions.contains(&position) {
            self.positions.push(position);
        }
        self.members.push(worker);
    }

    #[must_use]
    pub fn members(&self) -> &[Worker] {
        &self.members
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members holding `position`, in roster order. Empty for unknown positions.
    #[must_use]
    pub fn members_by_position(&self, position: &str) -> Vec<&Worker> {
        self.by_position
            .get(position)
            .map(|indices| indices.iter().map(|&i| &self.members[i]).collect())
            .unwrap_or_default()
    }

    /// Distinct positions in the order they first joined the team.
    #[must_use]
    pub fn positions(&self) -> &[&'static str] {
        &self.positions
    }

    /// Whether at least one certified member holds `position`.
    #[must_use]
    pub fn has_qualified_member(&self, position: &str) -> bool {
        let result = self
            .members
            .iter()
            .any(|m| m.position() == position && m.is_certified());
        debug!(position, result, "qualified member check");
        result
    }

    /// Sum of every member's monthly salary for `hours`.
    #[must_use]
    pub fn team_cost(&self, hours: u32) -> f64 {
        self.members.iter().map(|m| m.monthly_salary(hours)).sum()
    }

    /// The most experienced member; the earliest one wins ties.
    #[must_use]
    pub fn team_lead(&self) -> Option<&Worker> {
        self.members.iter().fold(None, |lead: Option<&Worker>, m| match lead {
            Some(l) if l.experience_level >= m.experience_level => Some(l),
            _ => Some(m),
        })
    }

    /// Members accepted by `filter`, in roster order.
    pub fn members_matching<F>(&self, filter: F) -> Vec<&Worker>
    where
        F: Fn(&Worker) -> bool,
    {
        self.members.iter().filter(|&m| filter(m)).collect()
    }
}

impl From<Vec<Worker>> for ConstructionTeam {
    fn from(workers: Vec<Worker>) -> Self {
        let mut team = Self::new();
        for worker in workers {
            team.add_member(worker);
        }
        team
    }
}

impl From<ConstructionTeam> for Vec<Worker> {
    fn from(team: ConstructionTeam) -> Self {
        team.members
    }
}

impl FromIterator<Worker> for ConstructionTeam {
    fn from_iter<I: IntoIterator<Item = Worker>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl fmt::Display for ConstructionTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConstructionTeam: {} members, {} specializations",
            self.members.len(),
            self.positions.len()
        )
    }
}
