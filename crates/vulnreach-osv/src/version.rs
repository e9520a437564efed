//! Version normalization and semver range membership.
//!
//! Two flavors of version string flow through the analyzer: toolchain release
//! tags (`go1.21.3`) and module versions (`v1.0.1`). Both are normalized here
//! before any comparison. Invalid input normalizes to the empty string, the
//! sentinel for "unknown version"; nothing in this module panics or errors.

use std::sync::OnceLock;

use regex::Regex;
use semver::Version;

use crate::entry::{Range, RangeKind};

/// Groups: 1 major.minor, 2 patch (or empty), 3 whole prerelease,
/// 4 prerelease kind ("beta", "rc", "-pre"), 5 prerelease number.
fn tag_regexp() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^go(\d+\.\d+)(\.\d+|)((beta|rc|-pre)(\d+))?$").unwrap())
}

/// Converts a toolchain release tag to a semver string.
///
/// `go1` maps to `v1.0.0` and `go1.0` to unknown; anything outside the tag
/// grammar is unknown as well.
pub fn go_tag_to_semver(tag: &str) -> String {
    if tag.is_empty() {
        return String::new();
    }
    let tag = match tag.split_whitespace().next() {
        Some(t) => t,
        None => return String::new(),
    };
    if tag == "go1" {
        return "v1.0.0".to_string();
    }
    if tag == "go1.0" {
        return String::new();
    }
    let caps = match tag_regexp().captures(tag) {
        Some(c) => c,
        None => return String::new(),
    };
    let mut version = format!("v{}", &caps[1]);
    match caps.get(2).map(|m| m.as_str()) {
        Some(patch) if !patch.is_empty() => version.push_str(patch),
        _ => version.push_str(".0"),
    }
    if caps.get(3).is_some() {
        let kind = &caps[4];
        if !kind.starts_with('-') {
            version.push('-');
        }
        version.push_str(kind);
        version.push('.');
        version.push_str(&caps[5]);
    }
    version
}

/// Canonicalizes a user-supplied version, preserving build metadata.
///
/// Strips a leading `v` or `go` prefix and re-renders through the semver
/// parser. Returns the empty string when the remainder is not valid semver.
pub fn canonicalize_version(version: &str) -> String {
    let trimmed = version
        .strip_prefix("go")
        .or_else(|| version.strip_prefix('v'))
        .unwrap_or(version);
    match Version::parse(trimmed) {
        Ok(v) => v.to_string(),
        Err(_) => String::new(),
    }
}

/// Reports whether `version` falls inside any SEMVER range.
///
/// The empty sentinel never matches; an unknown module version must not
/// raise alarms.
pub fn affects_semver(ranges: &[Range], version: &str) -> bool {
    if version.is_empty() {
        return false;
    }
    ranges.iter().any(|r| contains_semver(r, version))
}

/// Event-walk membership for a single range. Events are scanned in authored
/// order: an `introduced` at or below the version opens the affected window,
/// a `fixed` at or below it closes it. A SEMVER range with no events matches
/// every version.
fn contains_semver(range: &Range, version: &str) -> bool {
    if range.kind != RangeKind::Semver {
        return false;
    }
    if range.events.is_empty() {
        return true;
    }
    let v = match parse(version) {
        Some(v) => v,
        None => return false,
    };
    let mut affected = false;
    for event in &range.events {
        if !affected {
            if let Some(introduced) = &event.introduced {
                affected = introduced == "0"
                    || parse(introduced).is_some_and(|intro| v >= intro);
            }
        } else if let Some(fixed) = &event.fixed {
            affected = parse(fixed).is_none_or(|fix| v < fix);
        }
    }
    affected
}

fn parse(version: &str) -> Option<Version> {
    let trimmed = version.strip_prefix('v').unwrap_or(version);
    Version::parse(trimmed).ok()
}
