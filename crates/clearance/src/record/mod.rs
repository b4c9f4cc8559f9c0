//! The compliance record model.
//!
//! A record owns one project, which owns an ordered list of packages and a
//! reference to the content archive. Each package carries license and
//! copyright facts at three scope levels:
//!
//! ```text
//! package default scope          defaultLicensings / defaultCopyrights
//! └── directory scope "lib"      dirLicensings[scope = "lib"]
//!     └── file scope "lib/a.js"  fileLicensings[scope = "lib/a.js"]
//! ```

mod identifier;
mod model;
mod persistence;
pub mod scope;

pub use identifier::Identifier;
pub use model::{
    is_sentinel, ComplianceRecord, CopyrightFact, DirLicensing, Distribution, FileLicensing,
    LicenseFact, Package, PackageType, Project, CURATED_PATH, DECLARED_PATH,
    FOUND_IN_FILE_SCOPE, NOASSERTION,
};
pub use persistence::archive_path_for;
