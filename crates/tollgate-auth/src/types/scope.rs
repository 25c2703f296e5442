//! Scope set helpers.
//!
//! Scopes travel on the wire as a space-delimited string (RFC 6749 §3.3) and
//! are handled internally as an ordered set so that issued scope strings are
//! deterministic.

use std::collections::BTreeSet;

/// A set of scope tokens.
pub type Scopes = BTreeSet<String>;

/// The OpenID Connect scope that triggers ID token issuance.
pub const OPENID: &str = "openid";

/// Parses a space-delimited scope string into a set.
///
/// Repeated whitespace and duplicate tokens are collapsed.
#[must_use]
pub fn parse_scope(scope: &str) -> Scopes {
    scope.split_whitespace().map(str::to_string).collect()
}

/// Renders a scope set as a space-delimited string.
#[must_use]
pub fn format_scope(scopes: &Scopes) -> String {
    scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

/// Builds a scope set from anything yielding string-like items.
#[must_use]
pub fn scopes<I, S>(items: I) -> Scopes
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scope_collapses_whitespace_and_duplicates() {
        let parsed = parse_scope("  openid  profile openid ");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains("openid"));
        assert!(parsed.contains("profile"));
    }

    #[test]
    fn test_parse_empty_scope() {
        assert!(parse_scope("").is_empty());
        assert!(parse_scope("   ").is_empty());
    }

    #[test]
    fn test_format_scope_is_sorted() {
        let set = scopes(["scope2", "openid", "scope1"]);
        assert_eq!(format_scope(&set), "openid scope1 scope2");
    }
}
