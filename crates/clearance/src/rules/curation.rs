//! Curation rules: hand-authored corrections of default-scope facts.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ClearanceError, Result};

/// What a curation item does to its target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Modifier {
    Insert,
    Delete,
    Update,
    DeleteAll,
}

/// A license correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseCuration {
    pub modifier: Modifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// New value for `update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Origin path of the inserted fact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// License text to copy into the archive for the inserted fact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<PathBuf>,
}

/// A copyright correction. Delete targets may use `*` and `?` wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyrightCuration {
    pub modifier: Modifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Primitive license operation after `update` expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseOp {
    Delete(String),
    Insert {
        license: String,
        path: Option<String>,
        text: Option<PathBuf>,
    },
}

/// Primitive copyright operation after `update` expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyrightOp {
    DeleteAll,
    Delete(String),
    Insert {
        copyright: String,
        path: Option<String>,
    },
}

/// Payload of a curation rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurationRule {
    #[serde(default)]
    pub licenses: Vec<LicenseCuration>,
    #[serde(default)]
    pub copyrights: Vec<CopyrightCuration>,
}

impl LicenseCuration {
    fn item(modifier: Modifier, license: &str) -> Self {
        Self {
            modifier,
            license: Some(license.to_string()),
            replacement: None,
            path: None,
            text: None,
        }
    }

    pub fn insert(license: &str) -> Self {
        Self::item(Modifier::Insert, license)
    }

    pub fn delete(license: &str) -> Self {
        Self::item(Modifier::Delete, license)
    }

    pub fn update(license: &str, replacement: &str) -> Self {
        let mut item = Self::item(Modifier::Update, license);
        item.replacement = Some(replacement.to_string());
        item
    }

    /// Attach a license text file to an insert or update.
    pub fn with_text(mut self, text: impl Into<PathBuf>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn validate(&self) -> Result<()> {
        let license = self.license.as_deref().filter(|l| !l.trim().is_empty());
        match self.modifier {
            Modifier::DeleteAll => {
                return Err(ClearanceError::InvalidRule(
                    "delete-all is only valid for copyrights".to_string(),
                ))
            }
            Modifier::Insert | Modifier::Delete if license.is_none() => {
                return Err(ClearanceError::InvalidRule(
                    "license curation needs a license".to_string(),
                ))
            }
            Modifier::Update if license.is_none() || self.replacement.is_none() => {
                return Err(ClearanceError::InvalidRule(
                    "license update needs a license and a replacement".to_string(),
                ))
            }
            _ => {}
        }
        if self.text.is_some() && self.modifier == Modifier::Delete {
            return Err(ClearanceError::InvalidRule(
                "a license text can only accompany insert or update".to_string(),
            ));
        }
        if let Some(text) = &self.text {
            if !text.is_file() {
                return Err(ClearanceError::InvalidRule(format!(
                    "license text '{}' does not exist",
                    text.display()
                )));
            }
        }
        Ok(())
    }
}

impl CopyrightCuration {
    fn item(modifier: Modifier, copyright: Option<&str>) -> Self {
        Self {
            modifier,
            copyright: copyright.map(str::to_string),
            replacement: None,
            path: None,
        }
    }

    pub fn insert(copyright: &str) -> Self {
        Self::item(Modifier::Insert, Some(copyright))
    }

    pub fn delete(pattern: &str) -> Self {
        Self::item(Modifier::Delete, Some(pattern))
    }

    pub fn delete_all() -> Self {
        Self::item(Modifier::DeleteAll, None)
    }

    pub fn update(pattern: &str, replacement: &str) -> Self {
        let mut item = Self::item(Modifier::Update, Some(pattern));
        item.replacement = Some(replacement.to_string());
        item
    }

    fn validate(&self) -> Result<()> {
        let copyright = self.copyright.as_deref().filter(|c| !c.trim().is_empty());
        match (self.modifier, copyright) {
            (Modifier::DeleteAll, Some(_)) => Err(ClearanceError::InvalidRule(
                "delete-all takes no copyright value".to_string(),
            )),
            (Modifier::Insert | Modifier::Delete | Modifier::Update, None) => Err(
                ClearanceError::InvalidRule("copyright curation needs a copyright".to_string()),
            ),
            (Modifier::Update, Some(_)) if self.replacement.is_none() => Err(
                ClearanceError::InvalidRule("copyright update needs a replacement".to_string()),
            ),
            (Modifier::Delete | Modifier::Update, Some(pattern)) => {
                wildcard_regex(pattern).map(|_| ())
            }
            _ => Ok(()),
        }
    }
}

impl CurationRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_license(mut self, item: LicenseCuration) -> Self {
        self.licenses.push(item);
        self
    }

    pub fn with_copyright(mut self, item: CopyrightCuration) -> Self {
        self.copyrights.push(item);
        self
    }

    /// License operations in application order: every delete, then every
    /// insert. An `update` contributes one of each.
    pub fn license_ops(&self) -> Vec<LicenseOp> {
        let mut deletes = Vec::new();
        let mut inserts = Vec::new();
        for item in &self.licenses {
            let Some(license) = item.license.clone() else {
                continue;
            };
            match item.modifier {
                Modifier::Delete => deletes.push(LicenseOp::Delete(license)),
                Modifier::Insert => inserts.push(LicenseOp::Insert {
                    license,
                    path: item.path.clone(),
                    text: item.text.clone(),
                }),
                Modifier::Update => {
                    deletes.push(LicenseOp::Delete(license));
                    if let Some(replacement) = item.replacement.clone() {
                        inserts.push(LicenseOp::Insert {
                            license: replacement,
                            path: item.path.clone(),
                            text: item.text.clone(),
                        });
                    }
                }
                Modifier::DeleteAll => {}
            }
        }
        deletes.extend(inserts);
        deletes
    }

    /// Copyright operations in application order: delete-all, deletes,
    /// then inserts.
    pub fn copyright_ops(&self) -> Vec<CopyrightOp> {
        let mut clear = Vec::new();
        let mut deletes = Vec::new();
        let mut inserts = Vec::new();
        for item in &self.copyrights {
            match (item.modifier, item.copyright.clone()) {
                (Modifier::DeleteAll, _) => clear.push(CopyrightOp::DeleteAll),
                (Modifier::Delete, Some(pattern)) => deletes.push(CopyrightOp::Delete(pattern)),
                (Modifier::Insert, Some(copyright)) => inserts.push(CopyrightOp::Insert {
                    copyright,
                    path: item.path.clone(),
                }),
                (Modifier::Update, Some(pattern)) => {
                    deletes.push(CopyrightOp::Delete(pattern));
                    if let Some(replacement) = item.replacement.clone() {
                        inserts.push(CopyrightOp::Insert {
                            copyright: replacement,
                            path: item.path.clone(),
                        });
                    }
                }
                (_, None) => {}
            }
        }
        clear.truncate(1);
        clear.extend(deletes);
        clear.extend(inserts);
        clear
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.licenses.is_empty() && self.copyrights.is_empty() {
            return Err(ClearanceError::InvalidRule(
                "curation rule has no items".to_string(),
            ));
        }
        for item in &self.licenses {
            item.validate()?;
        }
        for item in &self.copyrights {
            item.validate()?;
        }
        Ok(())
    }

    /// Resolve relative text paths against the rule file's directory.
    pub(crate) fn anchor(&mut self, base: &Path) {
        for item in &mut self.licenses {
            if let Some(text) = &item.text {
                if text.is_relative() {
                    item.text = Some(base.join(text));
                }
            }
        }
    }
}

/// Compile a copyright pattern where `*` matches any run of characters and
/// `?` a single character. Everything else matches literally.
pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Ok(Regex::new(&source)?)
}
