//! Game version parsing and the tested-version gate
//!
//! Authors declare versions like `1.20` or `1.8.x`, so parsing pads missing
//! components instead of insisting on strict semver.

use semver::Version;

/// Parse a version string, padding `1.20` to `1.20.0` and `1` to `1.0.0`.
///
/// A leading `v` is ignored. A trailing `x` wildcard component counts as `0`.
/// Returns `None` for anything that is not made of at most three numeric
/// components (plus an optional semver pre-release/build suffix).
pub fn parse_lenient(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    let core_end = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(core_end);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = match *part {
            "x" | "X" | "*" => 0,
            digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                digits.parse().ok()?
            }
            _ => return None,
        };
    }

    let padded = Version::new(numbers[0], numbers[1], numbers[2]);
    if suffix.is_empty() {
        return Some(padded);
    }

    Version::parse(&format!("{padded}{suffix}")).ok().or(Some(padded))
}

/// Whether `required` shares major and minor with any of the tested versions.
///
/// Unparseable entries are skipped.
pub fn is_tested_version(required: &Version, tested: &[String]) -> bool {
    tested.iter().any(|raw| match parse_lenient(raw) {
        Some(version) => version.major == required.major && version.minor == required.minor,
        None => {
            tracing::debug!(version = %raw, "Unable to parse tested version, skipping");
            false
        }
    })
}
