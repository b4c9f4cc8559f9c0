//! Declarative rules and the catalog that matches them to packages.
//!
//! Every rule kind shares the same identifier pattern and origin bookkeeping;
//! the stage-specific part lives in a [`RulePayload`] variant. Rule files are
//! YAML lists, one schema per kind:
//!
//! ```yaml
//! - id: { type: NPM, namespace: "", name: left-pad, version: "[1.0,2.0[" }
//!   licenses:
//!     - modifier: update
//!       license: GPL-2.0
//!       replacement: GPL-2.0-only
//! ```

mod catalog;
mod classification;
mod curation;
mod resolver;
mod selector;
mod version;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::Identifier;

pub use catalog::RuleCatalog;
pub use classification::ClassificationRule;
pub use curation::{
    wildcard_regex, CopyrightCuration, CopyrightOp, CurationRule, LicenseCuration, LicenseOp,
    Modifier,
};
pub use resolver::{Resolution, ResolverRule};
pub use selector::{Selection, SelectorRule};
pub use version::{compare_versions, Bound, VersionSpec};

/// The stage a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Curation,
    Resolver,
    Selector,
    Classification,
}

impl RuleKind {
    /// Lower-case name used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Curation => "curation",
            RuleKind::Resolver => "resolver",
            RuleKind::Selector => "selector",
            RuleKind::Classification => "classification",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Package pattern of a rule. The version may be a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl RuleIdentifier {
    /// Create a pattern from its four parts.
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Pattern matching exactly one package.
    pub fn exact(id: &Identifier) -> Self {
        Self::new(&id.kind, &id.namespace, &id.name, &id.version)
    }
}

impl fmt::Display for RuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.kind, self.namespace, self.name, self.version
        )
    }
}

/// File and list position a rule was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOrigin {
    pub file: PathBuf,
    pub index: usize,
}

impl RuleOrigin {
    pub fn new(file: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            file: file.into(),
            index,
        }
    }

    /// Rules built in code rather than read from a file.
    pub fn inline() -> Self {
        Self::new("<inline>", 0)
    }
}

impl fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.display().to_string());
        write!(f, "{}#{}", name, self.index + 1)
    }
}

/// Stage-specific part of a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RulePayload {
    Curation(CurationRule),
    Resolver(ResolverRule),
    Selector(SelectorRule),
    Classification(ClassificationRule),
}

impl RulePayload {
    /// Kind of rule this payload belongs to.
    pub fn kind(&self) -> RuleKind {
        match self {
            RulePayload::Curation(_) => RuleKind::Curation,
            RulePayload::Resolver(_) => RuleKind::Resolver,
            RulePayload::Selector(_) => RuleKind::Selector,
            RulePayload::Classification(_) => RuleKind::Classification,
        }
    }

    fn validate(&mut self) -> Result<()> {
        match self {
            RulePayload::Curation(rule) => rule.validate(),
            RulePayload::Resolver(rule) => rule.validate(),
            RulePayload::Selector(rule) => rule.validate(),
            RulePayload::Classification(rule) => rule.validate(),
        }
    }

    fn anchor(&mut self, base: &Path) {
        if let RulePayload::Curation(rule) = self {
            rule.anchor(base);
        }
    }
}

/// A validated rule ready for matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: RuleIdentifier,
    pub version: VersionSpec,
    pub origin: RuleOrigin,
    pub payload: RulePayload,
}

impl Rule {
    /// Build and validate a rule.
    pub fn new(id: RuleIdentifier, payload: RulePayload) -> Result<Self> {
        Self::build(id, payload, RuleOrigin::inline())
    }

    pub(crate) fn build(
        id: RuleIdentifier,
        mut payload: RulePayload,
        origin: RuleOrigin,
    ) -> Result<Self> {
        let version = VersionSpec::parse(&id.version)?;
        if let Some(base) = origin.file.parent() {
            payload.anchor(base);
        }
        payload.validate()?;
        Ok(Self {
            id,
            version,
            origin,
            payload,
        })
    }

    /// Replace the origin, e.g. for rules assembled in memory.
    pub fn with_origin(mut self, origin: RuleOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Whether the rule applies to a package.
    ///
    /// The type compares case-insensitively, namespace and name exactly.
    pub fn matches(&self, id: &Identifier) -> bool {
        self.id.kind.eq_ignore_ascii_case(&id.kind)
            && self.id.namespace == id.namespace
            && self.id.name == id.name
            && self.version.matches(&id.version)
    }

    pub fn kind(&self) -> RuleKind {
        self.payload.kind()
    }

    pub fn as_curation(&self) -> Option<&CurationRule> {
        match &self.payload {
            RulePayload::Curation(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_resolver(&self) -> Option<&ResolverRule> {
        match &self.payload {
            RulePayload::Resolver(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_selector(&self) -> Option<&SelectorRule> {
        match &self.payload {
            RulePayload::Selector(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_classification(&self) -> Option<&ClassificationRule> {
        match &self.payload {
            RulePayload::Classification(rule) => Some(rule),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> RulePayload {
        RulePayload::Selector(SelectorRule::new().with_selection("MIT OR Apache-2.0", "MIT"))
    }

    #[test]
    fn test_type_matches_case_insensitively() {
        let rule = Rule::new(RuleIdentifier::new("npm", "", "left-pad", ""), selector())
            .expect("valid rule");
        assert!(rule.matches(&Identifier::new("NPM", "", "left-pad", "1.3.0")));
        assert!(!rule.matches(&Identifier::new("NPM", "", "Left-Pad", "1.3.0")));
        assert!(!rule.matches(&Identifier::new("NPM", "acme", "left-pad", "1.3.0")));
    }

    #[test]
    fn test_version_range_matching() {
        let rule = Rule::new(
            RuleIdentifier::new("Maven", "org.acme", "core", "[1.0,2.0["),
            selector(),
        )
        .expect("valid rule");
        assert!(rule.matches(&Identifier::new("Maven", "org.acme", "core", "1.4.2")));
        assert!(!rule.matches(&Identifier::new("Maven", "org.acme", "core", "2.0")));
    }

    #[test]
    fn test_invalid_version_rejects_rule() {
        let result = Rule::new(RuleIdentifier::new("NPM", "", "x", "[1.0"), selector());
        assert!(result.is_err());
    }

    #[test]
    fn test_origin_display() {
        let origin = RuleOrigin::new("/rules/curations.yml", 2);
        assert_eq!(origin.to_string(), "curations.yml#3");
        assert_eq!(RuleOrigin::inline().to_string(), "<inline>#1");
    }
}
