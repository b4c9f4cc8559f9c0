//! Resolver rules: collapse a set of co-existing licenses into one compound.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{ClearanceError, Result};
use crate::license::LicenseExpression;
use crate::record::scope;

/// One resolution: files whose license set equals `licenses` and that lie in
/// one of `scopes` get the single license `result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(default)]
    pub licenses: Vec<Option<String>>,
    pub result: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Resolution {
    pub fn new<I, S>(licenses: I, result: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            licenses: licenses.into_iter().map(|l| Some(l.into())).collect(),
            result: result.into(),
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// The license set as distinct values.
    pub fn license_set(&self) -> BTreeSet<String> {
        self.licenses.iter().flatten().cloned().collect()
    }

    /// Whether a file path lies inside one of the declared scopes.
    pub fn covers(&self, path: &str) -> bool {
        self.scopes.iter().any(|s| scope::contains(s, path))
    }

    /// Whether a file's license set is resolved by this resolution.
    ///
    /// With `any_subset`, any subset of at least two of the licenses
    /// qualifies; otherwise the sets must be equal.
    pub fn accepts(&self, licenses: &BTreeSet<String>, any_subset: bool) -> bool {
        let own = self.license_set();
        if any_subset {
            licenses.len() >= 2 && licenses.is_subset(&own)
        } else {
            !licenses.is_empty() && *licenses == own
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.licenses.is_empty() {
            return Err(ClearanceError::InvalidRule(format!(
                "resolution to '{}' lists no licenses",
                self.result
            )));
        }
        if self.licenses.iter().any(|l| l.is_none()) {
            return Err(ClearanceError::InvalidRule(format!(
                "resolution to '{}' contains a null license",
                self.result
            )));
        }

        let expression = LicenseExpression::parse(&self.result)?;
        if expression.contains_and() {
            return Err(ClearanceError::InvalidRule(format!(
                "resolution result '{}' must not contain AND",
                self.result
            )));
        }
        if expression.alternatives().is_none() {
            return Err(ClearanceError::InvalidRule(format!(
                "resolution result '{}' is not an OR compound",
                self.result
            )));
        }

        if self.scopes.is_empty() {
            self.scopes.push(String::new());
        }
        for s in &mut self.scopes {
            *s = scope::normalize(s);
        }
        Ok(())
    }
}

/// Payload of a resolver rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverRule {
    #[serde(default)]
    pub resolutions: Vec<Resolution>,
}

impl ResolverRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolutions.push(resolution);
        self
    }

    /// Normalize scopes and check every resolution.
    ///
    /// The same scope may not be declared twice for the same license set.
    pub(crate) fn validate(&mut self) -> Result<()> {
        if self.resolutions.is_empty() {
            return Err(ClearanceError::InvalidRule(
                "resolver rule has no resolutions".to_string(),
            ));
        }

        let mut seen: HashSet<(String, BTreeSet<String>)> = HashSet::new();
        for resolution in &mut self.resolutions {
            resolution.validate()?;
            let set = resolution.license_set();
            for s in &resolution.scopes {
                if !seen.insert((s.clone(), set.clone())) {
                    return Err(ClearanceError::InvalidRule(format!(
                        "scope '{}' is declared twice for licenses {:?}",
                        s, set
                    )));
                }
            }
        }
        Ok(())
    }
}
