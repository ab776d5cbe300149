//! # Version Resolver
//!
//! Evaluates a range expression against the known versions of a package and
//! picks the highest one that satisfies it.
//!
//! ## Range grammar
//!
//! ```text
//! range      := "latest" | exact | clause | clause " " clause
//! exact      := ["="] version
//! clause     := op version
//! op         := ">" | "<" | ">=" | "<="
//! ```
//!
//! Two clauses must use different operators: `">1.0.0 >1.5.0"` is rejected with
//! [`StoreError::BadRange`] rather than being collapsed into the tighter bound.
//!
//! ## Precedence
//!
//! Versions are ordered by numeric major, minor, patch. A larger core always
//! wins, prerelease tag or not, so `2.0.0-rc.1` outranks `1.2.0`. With equal
//! cores a release outranks any prerelease, and prerelease tags compare
//! identifier by identifier. Build metadata is ignored.

use crate::error::{StoreError, StoreResult};
use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Comparison operator of a range clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Gte => ">=",
            Op::Lte => "<=",
        }
    }

    /// Parse the route-style operator names (`gt`, `lt`, `gte`, `lte`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gt" => Some(Op::Gt),
            "lt" => Some(Op::Lt),
            "gte" => Some(Op::Gte),
            "lte" => Some(Op::Lte),
            _ => None,
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Op::Gt => ordering == Ordering::Greater,
            Op::Lt => ordering == Ordering::Less,
            Op::Gte => ordering != Ordering::Less,
            Op::Lte => ordering != Ordering::Greater,
        }
    }
}

/// A single `<op><version>` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    pub fn matches(&self, candidate: &Version) -> bool {
        self.op.accepts(precedence(candidate, &self.version))
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

/// A parsed range expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Range {
    /// Unconstrained: the maximum known version
    Latest,
    /// Exactly this version
    Exact(Version),
    /// One or two clauses with distinct operators, all of which must hold
    Clauses(Vec<Comparator>),
}

impl Range {
    pub fn matches(&self, candidate: &Version) -> bool {
        match self {
            Range::Latest => true,
            Range::Exact(version) => precedence(candidate, version) == Ordering::Equal,
            Range::Clauses(clauses) => clauses.iter().all(|c| c.matches(candidate)),
        }
    }
}

impl FromStr for Range {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        let expr = s.trim();
        if expr.is_empty() {
            return Err(StoreError::bad_range("empty range expression"));
        }
        if expr == "latest" {
            return Ok(Range::Latest);
        }

        let tokens: Vec<&str> = expr.split_whitespace().collect();
        match tokens.as_slice() {
            [single] => match split_operator(single) {
                Some((op, version)) => {
                    Ok(Range::Clauses(vec![parse_clause(op, version, expr)?]))
                }
                None => {
                    let literal = single.strip_prefix('=').unwrap_or(single);
                    Ok(Range::Exact(parse_version(literal, expr)?))
                }
            },
            [first, second] => {
                let (op1, v1) = split_operator(first).ok_or_else(|| {
                    StoreError::bad_range(format!("'{expr}': expected a comparator, got '{first}'"))
                })?;
                let (op2, v2) = split_operator(second).ok_or_else(|| {
                    StoreError::bad_range(format!(
                        "'{expr}': expected a comparator, got '{second}'"
                    ))
                })?;
                if op1 == op2 {
                    return Err(StoreError::bad_range(format!(
                        "'{expr}' uses the '{}' operator twice",
                        op1.as_str()
                    )));
                }
                Ok(Range::Clauses(vec![
                    parse_clause(op1, v1, expr)?,
                    parse_clause(op2, v2, expr)?,
                ]))
            }
            _ => Err(StoreError::bad_range(format!(
                "'{expr}' has more than two clauses"
            ))),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Range::Latest => f.write_str("latest"),
            Range::Exact(version) => write!(f, "{version}"),
            Range::Clauses(clauses) => {
                let parts: Vec<String> = clauses.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(" "))
            }
        }
    }
}

fn split_operator(token: &str) -> Option<(Op, &str)> {
    // Two-character operators first so ">=" is not read as ">" followed by "=1.0.0".
    if let Some(rest) = token.strip_prefix(">=") {
        Some((Op::Gte, rest))
    } else if let Some(rest) = token.strip_prefix("<=") {
        Some((Op::Lte, rest))
    } else if let Some(rest) = token.strip_prefix('>') {
        Some((Op::Gt, rest))
    } else {
        token.strip_prefix('<').map(|rest| (Op::Lt, rest))
    }
}

fn parse_clause(op: Op, version: &str, expr: &str) -> StoreResult<Comparator> {
    Ok(Comparator {
        op,
        version: parse_version(version, expr)?,
    })
}

fn parse_version(version: &str, expr: &str) -> StoreResult<Version> {
    Version::parse(version).map_err(|e| {
        StoreError::bad_range(format!(
            "'{expr}': '{version}' is not a semantic version: {e}"
        ))
    })
}

/// Build a range from route-style operator names, e.g. `("gt", "1.0.0")`.
pub fn range_from_ops(clauses: &[(&str, &str)]) -> StoreResult<Range> {
    let mut expr = Vec::with_capacity(clauses.len());
    for (name, version) in clauses {
        let op = Op::from_name(name)
            .ok_or_else(|| StoreError::bad_range(format!("unknown operator '{name}'")))?;
        expr.push(format!("{}{}", op.as_str(), version));
    }
    expr.join(" ").parse()
}

/// Semantic-version precedence, ignoring build metadata.
pub fn precedence(a: &Version, b: &Version) -> Ordering {
    a.major
        .cmp(&b.major)
        .then(a.minor.cmp(&b.minor))
        .then(a.patch.cmp(&b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// Sort version strings ascending by precedence. Unparsable strings sort first, lexically.
pub fn sort_versions(versions: &mut [String]) {
    versions.sort_by(|a, b| match (Version::parse(a), Version::parse(b)) {
        (Ok(va), Ok(vb)) => precedence(&va, &vb).then_with(|| a.cmp(b)),
        (Err(_), Ok(_)) => Ordering::Less,
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
}

/// Select the highest version in `versions` that satisfies `range`.
///
/// Returns `None` when nothing matches.
pub fn max_satisfying<I, S>(versions: I, range: &Range) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut best: Option<(Version, String)> = None;

    for raw in versions {
        let raw = raw.as_ref();
        let Ok(candidate) = Version::parse(raw) else {
            debug!(version = %raw, "Skipping unparsable version");
            continue;
        };
        if !range.matches(&candidate) {
            continue;
        }
        let better = best
            .as_ref()
            .is_none_or(|(current, _)| precedence(&candidate, current) == Ordering::Greater);
        if better {
            best = Some((candidate, raw.to_string()));
        }
    }

    best.map(|(_, raw)| raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn range(s: &str) -> Range {
        s.parse().unwrap()
    }

    #[test]
    fn test_latest_prefers_larger_core_over_prerelease_tag() {
        let versions = ["1.0.0", "1.2.0", "2.0.0-rc.1"];
        assert_eq!(
            max_satisfying(versions, &Range::Latest).as_deref(),
            Some("2.0.0-rc.1")
        );
    }

    #[test]
    fn test_release_outranks_prerelease_with_same_core() {
        let versions = ["2.0.0-rc.1", "2.0.0", "2.0.0-beta.3"];
        assert_eq!(
            max_satisfying(versions, &Range::Latest).as_deref(),
            Some("2.0.0")
        );
    }

    #[test]
    fn test_prerelease_identifiers_compare_componentwise() {
        assert_eq!(
            precedence(&v("1.0.0-alpha.2"), &v("1.0.0-alpha.10")),
            Ordering::Less
        );
        assert_eq!(
            precedence(&v("1.0.0-alpha"), &v("1.0.0-alpha.1")),
            Ordering::Less
        );
        assert_eq!(
            precedence(&v("1.0.0-alpha.beta"), &v("1.0.0-beta")),
            Ordering::Less
        );
        assert_eq!(precedence(&v("1.0.0-rc.1"), &v("1.0.0")), Ordering::Less);
        assert_eq!(
            precedence(&v("1.0.0+build.5"), &v("1.0.0")),
            Ordering::Equal
        );
    }

    #[test]
    fn test_two_clause_range() {
        let versions = ["1.0.0", "1.5.0", "2.0.0"];
        let best = |text: &str| max_satisfying(versions, &range(text));
        assert_eq!(best(">1.0.0 <=2.0.0").as_deref(), Some("2.0.0"));
        assert_eq!(best(">=1.0.0 <2.0.0").as_deref(), Some("1.5.0"));
        assert_eq!(best("<1.5.0").as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_duplicate_operator_is_rejected() {
        let err = ">1.0.0 >1.5.0".parse::<Range>().unwrap_err();
        assert!(matches!(err, StoreError::BadRange(_)));
        assert!("<=1.0.0 <=2.0.0".parse::<Range>().is_err());
    }

    #[test]
    fn test_exact_version() {
        let versions = ["1.0.0", "1.5.0"];
        assert_eq!(
            max_satisfying(versions, &range("1.0.0")).as_deref(),
            Some("1.0.0")
        );
        assert_eq!(
            max_satisfying(versions, &range("=1.5.0")).as_deref(),
            Some("1.5.0")
        );
        assert_eq!(max_satisfying(versions, &range("3.0.0")), None);
    }

    #[test]
    fn test_no_match_is_none() {
        let versions = ["1.0.0"];
        assert_eq!(max_satisfying(versions, &range(">1.0.0")), None);
        assert_eq!(max_satisfying(Vec::<String>::new(), &Range::Latest), None);
    }

    #[test]
    fn test_unparsable_ranges() {
        for expr in [
            "",
            "   ",
            "abc",
            ">",
            ">=x.y.z",
            "1.0.0 2.0.0",
            ">1.0.0 <2.0.0 >=1.1.0",
            "~1.2.0",
        ] {
            assert!(
                matches!(expr.parse::<Range>(), Err(StoreError::BadRange(_))),
                "{expr:?} should be a bad range"
            );
        }
    }

    #[test]
    fn test_range_from_ops() {
        let range = range_from_ops(&[("gt", "1.0.0"), ("lte", "2.0.0")])
            .unwrap();
        assert_eq!(range.to_string(), ">1.0.0 <=2.0.0");
        let repeated = [("gte", "1.0.0"), ("gte", "2.0.0")];
        assert!(range_from_ops(&repeated).is_err());
        assert!(range_from_ops(&[("eq", "1.0.0")]).is_err());
    }

    #[test]
    fn test_sort_versions() {
        let mut versions = vec![
            "1.10.0".to_string(),
            "1.2.0".to_string(),
            "2.0.0-rc.1".to_string(),
            "1.2.0-beta".to_string(),
        ];
        sort_versions(&mut versions);
        assert_eq!(
            versions,
            vec!["1.2.0-beta", "1.2.0", "1.10.0", "2.0.0-rc.1"]
        );
    }
}
