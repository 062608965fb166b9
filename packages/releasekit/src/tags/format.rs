//! Tag name templates and their inverse.
//!
//! Templates use `{name}`, `{version}` and `{label}` placeholders.

use regex::Regex;

/// Default per-package tag template
pub const DEFAULT_TAG_FORMAT: &str = "{name}-v{version}";

/// Default umbrella tag template
pub const DEFAULT_UMBRELLA_FORMAT: &str = "v{version}";

const SEMVER_PATTERN: &str =
    r"(?P<version>\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?)";

/// Substitute placeholders in a tag template
pub fn format_tag(template: &str, name: &str, version: &str, label: &str) -> String {
    template
        .replace("{name}", name)
        .replace("{version}", version)
        .replace("{label}", label)
}

/// Recover `(name, version)` from a tag produced by `template`
///
/// Returns `None` when the tag does not match. A template without `{name}`
/// yields an empty name.
pub fn parse_tag(tag: &str, template: &str) -> Option<(String, String)> {
    let regex = template_regex(template)?;
    let captures = regex.captures(tag)?;
    let name = captures.name("name").map(|m| m.as_str()).unwrap_or_default();
    let version = captures.name("version").map(|m| m.as_str()).unwrap_or_default();
    Some((name.to_string(), version.to_string()))
}

fn template_regex(template: &str) -> Option<Regex> {
    let escaped = regex::escape(template);
    let pattern = replace_first_and_rest(&escaped, &regex::escape("{name}"), "(?P<name>.+?)", ".+?");
    let pattern = replace_first_and_rest(&pattern, &regex::escape("{version}"), SEMVER_PATTERN, r"[0-9A-Za-z.+-]+");
    let pattern = pattern.replace(&regex::escape("{label}"), ".*?");

    match Regex::new(&format!("^{}$", pattern)) {
        Ok(regex) => Some(regex),
        Err(e) => {
            log::debug!("tag template '{}' does not compile: {}", template, e);
            None
        }
    }
}

/// Named groups may only appear once; later occurrences match without capturing
fn replace_first_and_rest(haystack: &str, needle: &str, first: &str, rest: &str) -> String {
    match haystack.split_once(needle) {
        Some((head, tail)) => format!("{}{}{}", head, first, tail.replace(needle, rest)),
        None => haystack.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formats_placeholders() {
        assert_eq!(format_tag(DEFAULT_TAG_FORMAT, "core", "0.2.0", ""), "core-v0.2.0");
        assert_eq!(format_tag(DEFAULT_UMBRELLA_FORMAT, "core", "0.2.0", ""), "v0.2.0");
        assert_eq!(
            format_tag("{label}/{name}@{version}", "core", "1.0.0-rc.1", "py"),
            "py/core@1.0.0-rc.1"
        );
    }

    #[test]
    fn parses_dashed_names_and_prereleases() {
        assert_eq!(
            parse_tag("plugin-google-v1.2.3-beta.1", DEFAULT_TAG_FORMAT),
            Some(("plugin-google".to_string(), "1.2.3-beta.1".to_string()))
        );
        assert_eq!(
            parse_tag("v0.5.0", DEFAULT_UMBRELLA_FORMAT),
            Some((String::new(), "0.5.0".to_string()))
        );
    }

    #[test]
    fn rejects_non_matching_tags() {
        assert_eq!(parse_tag("core-0.2.0", DEFAULT_TAG_FORMAT), None);
        assert_eq!(parse_tag("core-vlatest", DEFAULT_TAG_FORMAT), None);
        assert_eq!(parse_tag("xv0.2.0", DEFAULT_UMBRELLA_FORMAT), None);
    }

    #[test]
    fn label_matches_anything() {
        assert_eq!(
            parse_tag("js/core@2.0.0", "{label}/{name}@{version}"),
            Some(("core".to_string(), "2.0.0".to_string()))
        );
    }

    proptest! {
        #[test]
        fn parse_inverts_format(
            name in "[a-z][a-z0-9_]{0,12}",
            major in 0u64..100,
            minor in 0u64..100,
            patch in 0u64..100,
            pre in proptest::option::of("[a-z]{1,5}\\.[0-9]{1,2}"),
            template in prop::sample::select(vec![
                "{name}-v{version}",
                "{name}@{version}",
                "release/{name}/{version}",
                "{name}.{version}",
            ]),
        ) {
            let version = match pre {
                Some(pre) => format!("{}.{}.{}-{}", major, minor, patch, pre),
                None => format!("{}.{}.{}", major, minor, patch),
            };
            let tag = format_tag(template, &name, &version, "");
            prop_assert_eq!(parse_tag(&tag, template), Some((name, version)));
        }
    }
}
