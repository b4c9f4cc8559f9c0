//! Selector rules: pick one branch of an OR compound.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ClearanceError, Result};
use crate::license::LicenseExpression;

/// Choose `selected` wherever `specified` appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub specified: String,
    pub selected: String,
}

/// Payload of a selector rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRule {
    #[serde(default)]
    pub selections: Vec<Selection>,
}

impl SelectorRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(mut self, specified: &str, selected: &str) -> Self {
        self.selections.push(Selection {
            specified: specified.to_string(),
            selected: selected.to_string(),
        });
        self
    }

    /// Selection whose compound has the same alternatives as `license`.
    pub fn selection_for(&self, alternatives: &BTreeSet<String>) -> Option<&Selection> {
        self.selections.iter().find(|s| {
            LicenseExpression::parse(&s.specified)
                .ok()
                .and_then(|e| e.alternatives())
                .is_some_and(|a| &a == alternatives)
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.selections.is_empty() {
            return Err(ClearanceError::InvalidRule(
                "selector rule has no selections".to_string(),
            ));
        }

        let mut seen: Vec<BTreeSet<String>> = Vec::new();
        for selection in &self.selections {
            let expression = LicenseExpression::parse(&selection.specified)?;
            if expression.contains_and() {
                return Err(ClearanceError::InvalidRule(format!(
                    "'{}' contains AND",
                    selection.specified
                )));
            }
            let alternatives = expression.alternatives().ok_or_else(|| {
                ClearanceError::InvalidRule(format!(
                    "'{}' is not an OR compound",
                    selection.specified
                ))
            })?;
            if !alternatives.contains(&selection.selected) {
                return Err(ClearanceError::InvalidRule(format!(
                    "'{}' is not a branch of '{}'",
                    selection.selected, selection.specified
                )));
            }
            if seen.contains(&alternatives) {
                return Err(ClearanceError::InvalidRule(format!(
                    "'{}' is selected twice",
                    selection.specified
                )));
            }
            seen.push(alternatives);
        }
        Ok(())
    }
}
