//! npm version-range evaluation.
//!
//! Answers whether a concrete version satisfies an npm range expression.
//! The npm grammar is wider than what the `semver` crate parses directly,
//! so ranges are normalized first:
//! - Hyphen ranges: `1.0.0 - 2.0.0`
//! - X-ranges: `1.x`, `1.2.x`, `*`
//! - Space-separated comparators: `>= 2.1.2 < 3.0.0`
//! - OR unions: `^1.0.0 || ^2.0.0`
//! - Bare versions (`1.2.3` means exactly `1.2.3`, not `^1.2.3`)

use crate::error::Error;
use semver::{Version, VersionReq};

/// Check whether a concrete `version` satisfies a `range` expression.
///
/// # Errors
/// Returns `Error::BadVersionSpec` when either input is outside the
/// semver/npm grammar.
pub fn satisfies(version: &str, range: &str) -> Result<bool, Error> {
    let version = parse_version(version)?;
    let range = range.trim();

    if range.is_empty() {
        return Err(Error::bad_spec(range, "empty version range"));
    }

    // OR unions: satisfied when any alternative matches.
    if range.contains("||") {
        let mut matched = false;
        for alt in range.split("||") {
            let alt = alt.trim();
            if alt.is_empty() {
                return Err(Error::bad_spec(range, "empty alternative in OR range"));
            }
            if parse_range(alt)?.matches(&version) {
                matched = true;
            }
        }
        return Ok(matched);
    }

    Ok(parse_range(range)?.matches(&version))
}

/// Parse a concrete semver version.
pub fn parse_version(version: &str) -> Result<Version, Error> {
    Version::parse(version.trim()).map_err(|e| Error::bad_spec(version, e.to_string()))
}

/// Parse a single version range, handling npm-specific syntax.
fn parse_range(range: &str) -> Result<VersionReq, Error> {
    let range = range.trim();

    // Hyphen ranges: "1.0.0 - 2.0.0" -> ">=1.0.0, <=2.0.0"
    if let Some((start, end)) = parse_hyphen_range(range) {
        let converted = format!(">={start}, <={end}");
        return VersionReq::parse(&converted).map_err(|e| Error::bad_spec(range, e.to_string()));
    }

    // X-ranges: "1.x" -> ">=1.0.0, <2.0.0"
    if range.contains(['x', 'X']) || range == "*" {
        let converted = convert_x_range(range);
        return VersionReq::parse(&converted).map_err(|e| Error::bad_spec(range, e.to_string()));
    }

    // A bare version is an exact requirement in npm, not a caret range.
    if let Ok(exact) = Version::parse(range) {
        return VersionReq::parse(&format!("={exact}"))
            .map_err(|e| Error::bad_spec(range, e.to_string()));
    }

    // Space-separated comparators: ">= 2.1.2 < 3.0.0" -> ">=2.1.2, <3.0.0"
    let converted = convert_space_separated_comparators(range);

    VersionReq::parse(&converted).map_err(|e| Error::bad_spec(range, e.to_string()))
}

/// Parse a hyphen range like "1.0.0 - 2.0.0".
fn parse_hyphen_range(range: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = range.split(" - ").collect();
    if parts.len() == 2 {
        let start = parts[0].trim();
        let end = parts[1].trim();
        if !start.is_empty() && !end.is_empty() {
            return Some((start.to_string(), end.to_string()));
        }
    }
    None
}

/// Convert space-separated comparators to comma-separated.
///
/// npm allows ">= 2.1.2 < 3.0.0" meaning ">=2.1.2 AND <3.0.0"; the semver
/// crate requires ">=2.1.2, <3.0.0".
fn convert_space_separated_comparators(range: &str) -> String {
    let mut result = String::new();
    let mut need_comma = false;

    for token in range.split_whitespace() {
        if token_has_version(token) {
            if need_comma {
                result.push_str(", ");
            }
            result.push_str(token);
            need_comma = true;
        } else {
            // Operator without a version, keep accumulating.
            if need_comma {
                result.push_str(", ");
                need_comma = false;
            }
            result.push_str(token);
        }
    }

    if result.is_empty() {
        return range.to_string();
    }

    result
}

/// Check if a token contains a version number (has digits).
fn token_has_version(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
}

/// Convert an x-range to a semver range.
fn convert_x_range(range: &str) -> String {
    let range = range.trim();

    if range == "*" || range == "x" || range == "X" {
        return ">=0.0.0".to_string();
    }

    let parts: Vec<&str> = range.split('.').collect();

    match parts.as_slice() {
        [major, "x" | "X" | "*"] => {
            // "1.x" -> ">=1.0.0, <2.0.0"
            if let Ok(m) = major.parse::<u64>() {
                return format!(">={m}.0.0, <{}.0.0", m + 1);
            }
        }
        [major, minor, "x" | "X" | "*"] => {
            // "1.2.x" -> ">=1.2.0, <1.3.0"
            if let (Ok(m), Ok(n)) = (major.parse::<u64>(), minor.parse::<u64>()) {
                return format!(">={m}.{n}.0, <{m}.{}.0", n + 1);
            }
        }
        _ => {}
    }

    // Fallback: just replace x with 0.
    range.replace(['x', 'X'], "0")
}
