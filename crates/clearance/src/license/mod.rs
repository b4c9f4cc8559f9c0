//! License expression handling shared by resolution and selection.

mod expression;

pub use expression::{is_compound, or_alternatives, same_compound, LicenseExpression};
