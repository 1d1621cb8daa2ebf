use std::cmp::Ordering;

use log::debug;
use semver::Version;

/// Parse a package version string as reported by the device into a semantic
/// version.
///
/// Game builds carry their build number after an underscore
/// (`1.35.0_8016709773`), which is read as build metadata. Versions with
/// missing minor/patch components are padded with zeros.
#[must_use]
pub fn parse_game_version(version: &str) -> Option<Version> {
    if let Some(parsed) = parse_loose(version) {
        return Some(parsed);
    }

    let cleaned = version.replace(' ', "").replace('_', "+");
    let parsed = parse_loose(&cleaned);
    if parsed.is_none() {
        debug!("Version {version} is not a semantic version");
    }
    parsed
}

/// Order two versions by precedence, ignoring build metadata. Versions that
/// fail to parse sort below every parsable version and compare equal to each
/// other.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_game_version(a), parse_game_version(b)) {
        (Some(a), Some(b)) => a.cmp_precedence(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn parse_loose(version: &str) -> Option<Version> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let (core, suffix) = split_semver_core_and_suffix(version);
    let mut parts = core.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = parts.next().and_then(|part| part.parse::<u64>().ok());
    let patch = parts.next().and_then(|part| part.parse::<u64>().ok());

    if parts.next().is_some() {
        return None;
    }

    let normalized = match (minor, patch) {
        (None, None) => format!("{major}.0.0{suffix}"),
        (Some(minor), None) => format!("{major}.{minor}.0{suffix}"),
        (Some(minor), Some(patch)) => format!("{major}.{minor}.{patch}{suffix}"),
        (None, Some(_)) => return None,
    };

    Version::parse(&normalized).ok()
}

fn split_semver_core_and_suffix(version: &str) -> (&str, &str) {
    let suffix_idx = version.find(['-', '+']).unwrap_or(version.len());
    (&version[..suffix_idx], &version[suffix_idx..])
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;

    #[test]
    fn parses_plain_and_build_suffixed_versions() {
        assert_eq!(
            parse_game_version("1.34.2"),
            Some(Version::new(1, 34, 2))
        );

        let with_build = parse_game_version("1.35.0_8016709773").expect("build suffix parses");
        assert_eq!((with_build.major, with_build.minor, with_build.patch), (1, 35, 0));
        assert_eq!(with_build.build.as_str(), "8016709773");
    }

    #[test]
    fn pads_short_versions() {
        assert_eq!(parse_game_version("1.28"), Some(Version::new(1, 28, 0)));
        assert_eq!(parse_game_version("v2"), Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_game_version("not-a-version").is_none());
        assert!(parse_game_version("1.2.3.4").is_none());
        assert!(parse_game_version("").is_none());
    }

    #[test]
    fn compare_ignores_build_metadata() {
        assert_eq!(
            compare_versions("1.35.0_111", "1.35.0_222"),
            Ordering::Equal
        );
        assert_eq!(compare_versions("1.35.0", "1.34.2"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0-beta.2", "1.0.0"), Ordering::Less);
    }

    #[test]
    fn unparsable_versions_sort_last() {
        assert_eq!(compare_versions("garbage", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0", "garbage"), Ordering::Greater);
    }
}
