//! Scope path utilities.
//!
//! Scopes are slash-separated paths relative to the package root. The empty
//! scope denotes the package root itself. Every engine that needs "the next
//! scope up" goes through [`best_match`] so they all agree on the hierarchy.

/// Normalize a scope path: backslashes become slashes, leading `./` and
/// slashes as well as trailing slashes are removed.
pub fn normalize(scope: &str) -> String {
    let unified = scope.replace('\\', "/");
    let mut trimmed = unified.as_str();
    loop {
        let rest = trimmed.trim_start_matches('/');
        let rest = rest.strip_prefix("./").unwrap_or(rest);
        if rest.len() == trimmed.len() {
            break;
        }
        trimmed = rest;
    }
    trimmed.trim_end_matches('/').to_string()
}

/// Whether `path` lies inside (or is) the directory scope `dir`.
///
/// The empty scope contains everything. A prefix only counts at a path
/// component boundary, so `lib` contains `lib/a.js` but not `library/a.js`.
pub fn contains(dir: &str, path: &str) -> bool {
    if dir.is_empty() {
        return true;
    }
    match path.strip_prefix(dir) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Whether `dir` is a strict ancestor of `path`.
pub fn is_ancestor(dir: &str, path: &str) -> bool {
    dir != path && contains(dir, path)
}

/// Pick the enclosing scope of `path` among `candidates`.
///
/// The winner is the longest candidate that is a strict ancestor of `path`;
/// ties are broken by the shortest remaining suffix, then by position.
/// Returns the index into `candidates`, or `None` when only the package
/// default scope applies.
pub fn best_match<'a, I>(path: &str, candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .enumerate()
        .filter(|(_, dir)| is_ancestor(dir, path))
        .min_by_key(|(index, dir)| {
            let suffix = path.len() - dir.len();
            (usize::MAX - dir.len(), suffix, *index)
        })
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("./lib/"), "lib");
        assert_eq!(normalize("lib\\sub"), "lib/sub");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn test_contains_respects_component_boundaries() {
        assert!(contains("lib", "lib/a.js"));
        assert!(contains("lib", "lib"));
        assert!(!contains("lib", "library/a.js"));
        assert!(contains("", "anything/at/all"));
    }

    #[test]
    fn test_best_match_prefers_longest_prefix() {
        let dirs = ["lib", "lib/sub", "src"];
        assert_eq!(best_match("lib/sub/a.js", dirs), Some(1));
        assert_eq!(best_match("lib/b.js", dirs), Some(0));
        assert_eq!(best_match("README.md", dirs), None);
    }

    #[test]
    fn test_best_match_excludes_self() {
        let dirs = ["lib", "lib/sub"];
        assert_eq!(best_match("lib/sub", dirs), Some(0));
        assert_eq!(best_match("lib", dirs), None);
    }

    #[test]
    fn test_best_match_duplicate_scopes_pick_first() {
        let dirs = ["lib", "lib"];
        assert_eq!(best_match("lib/a.js", dirs), Some(0));
    }
}
