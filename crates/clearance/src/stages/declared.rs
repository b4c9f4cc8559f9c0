//! Authoritative declared-license data used to auto-generate resolutions.
//!
//! The document maps canonical package identifiers to a processed license
//! expression and a mapping from the simple identifiers in that expression
//! to normalized ones:
//!
//! ```json
//! { "packages": {
//!     "NPM::left-pad:1.0.0": {
//!       "expression": "MIT OR Apache",
//!       "mapping": { "Apache": "Apache-2.0" } } } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ClearanceError, Result};
use crate::license::LicenseExpression;
use crate::record::Identifier;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the declared-license document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredSource {
    File(PathBuf),
    Url(String),
}

impl DeclaredSource {
    /// `http://` and `https://` locations are fetched, anything else is a file.
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            DeclaredSource::Url(location.to_string())
        } else {
            DeclaredSource::File(PathBuf::from(location))
        }
    }
}

/// Declared license of one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredEntry {
    pub expression: String,
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

impl DeclaredEntry {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            mapping: BTreeMap::new(),
        }
    }

    pub fn with_mapping(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.mapping.insert(from.into(), to.into());
        self
    }

    /// The expression with every simple identifier passed through the mapping.
    pub fn mapped_expression(&self) -> Result<LicenseExpression> {
        let expression = LicenseExpression::parse(&self.expression)?;
        Ok(self.map(expression))
    }

    fn map(&self, expression: LicenseExpression) -> LicenseExpression {
        let rename = |id: String| self.mapping.get(&id).cloned().unwrap_or(id);
        match expression {
            LicenseExpression::Simple(id) => LicenseExpression::Simple(rename(id)),
            LicenseExpression::WithException { license, exception } => {
                LicenseExpression::WithException {
                    license: rename(license),
                    exception,
                }
            }
            LicenseExpression::And(items) => {
                LicenseExpression::And(items.into_iter().map(|e| self.map(e)).collect())
            }
            LicenseExpression::Or(items) => {
                LicenseExpression::Or(items.into_iter().map(|e| self.map(e)).collect())
            }
        }
    }
}

/// Declared licenses for many packages, keyed by canonical identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredLicenses {
    #[serde(default)]
    pub packages: BTreeMap<String, DeclaredEntry>,
}

impl DeclaredLicenses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, id: &Identifier, entry: DeclaredEntry) -> Self {
        self.packages.insert(id.to_string(), entry);
        self
    }

    /// Parse a declared-license document.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read the document from a file or fetch it over HTTP.
    pub fn load(source: &DeclaredSource) -> Result<Self> {
        match source {
            DeclaredSource::File(path) => {
                let text = fs::read_to_string(path).map_err(|e| ClearanceError::io(path, e))?;
                Self::from_json(&text)
            }
            DeclaredSource::Url(url) => {
                let client = Client::builder()
                    .timeout(FETCH_TIMEOUT)
                    .build()
                    .map_err(|e| {
                        ClearanceError::Config(format!("Failed to create HTTP client: {}", e))
                    })?;
                tracing::info!(%url, "Fetching declared licenses");
                let document = client.get(url).send()?.error_for_status()?.json()?;
                Ok(document)
            }
        }
    }

    pub fn get(&self, id: &Identifier) -> Option<&DeclaredEntry> {
        self.packages.get(&id.to_string())
    }
}
