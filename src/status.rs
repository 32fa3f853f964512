//! Reading status, list filters and the stats derived from a plan list.
//!
//! Everything here is a pure function over the canonical list. Nothing is
//! cached; callers recompute on each render.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a book sits in the family's reading journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanStatus {
    #[default]
    ToRead,
    Reading,
    Completed,
}

impl PlanStatus {
    pub const ALL: [PlanStatus; 3] = [PlanStatus::ToRead, PlanStatus::Reading, PlanStatus::Completed];

    /// Wire value, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::ToRead => "to-read",
            PlanStatus::Reading => "reading",
            PlanStatus::Completed => "completed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlanStatus::ToRead => "To Read",
            PlanStatus::Reading => "Reading",
            PlanStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "to-read" | "toread" | "to_read" => Ok(PlanStatus::ToRead),
            "reading" => Ok(PlanStatus::Reading),
            "completed" | "done" => Ok(PlanStatus::Completed),
            other => anyhow::bail!("unknown status '{}' (expected to-read, reading or completed)", other),
        }
    }
}

/// Filter tab over the plan list. `All` is the identity projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(PlanStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: PlanStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => status.fmt(f),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        Ok(StatusFilter::Only(s.parse()?))
    }
}

/// Anything carrying a reading status: local entries, remote items and the
/// unified rows built from both.
pub trait HasStatus {
    fn status(&self) -> PlanStatus;
}

/// Project a list through a filter without touching the list itself.
pub fn filter_items<T: HasStatus>(items: &[T], filter: StatusFilter) -> Vec<&T> {
    items.iter().filter(|item| filter.matches(item.status())).collect()
}

/// Per-status counts over a plan list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanStats {
    pub total: usize,
    pub to_read: usize,
    pub reading: usize,
    pub completed: usize,
}

impl PlanStats {
    pub fn from_items<T: HasStatus>(items: &[T]) -> Self {
        let mut stats = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            match item.status() {
                PlanStatus::ToRead => stats.to_read += 1,
                PlanStatus::Reading => stats.reading += 1,
                PlanStatus::Completed => stats.completed += 1,
            }
        }
        stats
    }

    pub fn count(&self, filter: StatusFilter) -> usize {
        match filter {
            StatusFilter::All => self.total,
            StatusFilter::Only(PlanStatus::ToRead) => self.to_read,
            StatusFilter::Only(PlanStatus::Reading) => self.reading,
            StatusFilter::Only(PlanStatus::Completed) => self.completed,
        }
    }

    /// Whole-number completion percentage, or `None` for an empty plan (the
    /// progress bar is not shown at all then).
    pub fn completion_percent(&self) -> Option<u32> {
        if self.total == 0 {
            return None;
        }
        let pct = 100.0 * self.completed as f64 / self.total as f64;
        Some(pct.round() as u32)
    }
}
