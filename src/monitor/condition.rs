//! Cell conditions and their evaluation against two snapshots

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sheets::value::parse_number;
use crate::sheets::{CellRef, CellValue, Snapshot};

/// Comparison applied to a watched cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    Changed,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "does not equal",
            Operator::GreaterThan => "is greater than",
            Operator::LessThan => "is less than",
            Operator::Contains => "contains",
            Operator::Changed => "changed",
        };
        f.write_str(s)
    }
}

/// User-defined rule over a single cell; immutable once attached to a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub id: String,
    pub cell: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub description: String,
}

impl Condition {
    pub fn new(
        id: impl Into<String>,
        cell: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            cell: cell.into(),
            operator,
            value: value.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Bare A1 form of the watched cell (`Sheet1!$B$2` -> `B2`)
    pub fn cell_key(&self) -> String {
        CellRef::parse_unqualified(&self.cell)
            .map(|c| c.to_a1())
            .unwrap_or_else(|_| self.cell.trim().to_string())
    }

    /// Whether the transition `old -> new` satisfies this condition.
    ///
    /// Only transitions fire: an unchanged cell never matches, whatever the
    /// operator. Unparsable numbers never match.
    pub fn matches(&self, old: &CellValue, new: &CellValue) -> bool {
        let old_text = old.as_text();
        let new_text = new.as_text();
        if old_text == new_text {
            return false;
        }

        match self.operator {
            Operator::Changed => true,
            Operator::Equals => new_text == self.value,
            Operator::NotEquals => new_text != self.value,
            Operator::Contains => new_text.contains(self.value.as_str()),
            Operator::GreaterThan => compare_numbers(new, &self.value, |a, b| a > b),
            Operator::LessThan => compare_numbers(new, &self.value, |a, b| a < b),
        }
    }

    /// Message used for the notification headline
    pub fn summary(&self) -> String {
        if !self.description.trim().is_empty() {
            return self.description.trim().to_string();
        }
        match self.operator {
            Operator::Changed => format!("{} changed", self.cell_key()),
            op => format!("{} {} {}", self.cell_key(), op, self.value),
        }
    }
}

fn compare_numbers(new: &CellValue, target: &str, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (new.as_f64(), parse_number(target)) {
        (Some(actual), Some(threshold)) => cmp(actual, threshold),
        _ => false,
    }
}

/// `"<cell>: <old> → <new>"`
pub fn describe_delta(cell: &str, old: &CellValue, new: &CellValue) -> String {
    format!("{}: {} → {}", cell, old, new)
}

/// A condition that fired during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionMatch {
    pub condition_id: String,
    pub cell: String,
    pub old_value: CellValue,
    pub new_value: CellValue,
    pub message: String,
    pub delta: String,
}

/// Evaluate every condition, in order, against the previous and fresh snapshots
pub fn evaluate_conditions(
    previous: &Snapshot,
    fresh: &Snapshot,
    conditions: &[Condition],
) -> Vec<ConditionMatch> {
    conditions
        .iter()
        .filter_map(|condition| {
            let cell = condition.cell_key();
            let old_value = previous.get(&cell);
            let new_value = fresh.get(&cell);

            condition.matches(&old_value, &new_value).then(|| ConditionMatch {
                condition_id: condition.id.clone(),
                delta: describe_delta(&cell, &old_value, &new_value),
                message: condition.summary(),
                cell,
                old_value,
                new_value,
            })
        })
        .collect()
}
