//! Version strings
//!
//! Release tags and app versions are plain dotted numbers, sometimes prefixed
//! with `v` or `v.`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v\.?").expect("valid prefix regex"));

static VERSION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^|\s)([0-9]+\.[0-9.]+)").expect("valid version regex"));

/// Remove a leading `v` or `v.` from a tag
pub fn strip_prefix(version: &str) -> &str {
    match PREFIX.find(version) {
        Some(m) => &version[m.end()..],
        None => version,
    }
}

/// Numeric component-wise comparison. Missing trailing components count as 0.
pub fn compare(a: &str, b: &str) -> Ordering {
    let a = components(strip_prefix(a));
    let b = components(strip_prefix(b));
    let len = a.len().max(b.len());

    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn components(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.trim().parse::<u64>().unwrap_or(0))
        .collect()
}

/// Whether `candidate` should replace `current`.
///
/// An empty string on either side means "unknown", which always counts as newer.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    if candidate.is_empty() || current.is_empty() {
        return true;
    }
    compare(candidate, current) == Ordering::Greater
}

/// Pull every dotted version number out of free-form patcher output
pub fn extract_versions(output: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in VERSION_TOKEN.captures_iter(output) {
        let version = caps[1].trim_end_matches('.').to_string();
        if !found.contains(&version) {
            found.push(version);
        }
    }
    found
}

/// Highest version in the list
pub fn newest<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    versions
        .into_iter()
        .map(String::as_str)
        .max_by(|a, b| compare(a, b))
}
