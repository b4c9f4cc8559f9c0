//! Classification rules: how a package is distributed and what it builds.

use serde::{Deserialize, Serialize};

use crate::error::{ClearanceError, Result};
use crate::record::{Distribution, PackageType};

/// Payload of a classification rule. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<PackageType>,
}

impl ClassificationRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = Some(distribution);
        self
    }

    pub fn with_package_type(mut self, package_type: PackageType) -> Self {
        self.package_type = Some(package_type);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.distribution.is_none() && self.package_type.is_none() {
            return Err(ClearanceError::InvalidRule(
                "classification rule sets neither distribution nor packageType".to_string(),
            ));
        }
        Ok(())
    }
}
