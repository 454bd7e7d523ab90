//! Host predicate evaluation

use crate::model::Recipe;
use kiln_errors::RecipeError;
use kiln_platform::HostInfo;
use std::cmp::Ordering;

/// Check that `host` satisfies the recipe's platform constraint
///
/// Empty `os`/`arch` lists accept any host. A minimum OS version cannot be
/// checked against a host that does not report one, so that case is
/// rejected.
///
/// # Errors
///
/// Returns `UnsupportedPlatform` naming the first constraint that fails.
pub fn check_platform(recipe: &Recipe, host: &HostInfo) -> Result<(), RecipeError> {
    let constraint = &recipe.platform;
    let unsupported = |constraint: String, host: String| RecipeError::UnsupportedPlatform {
        recipe: recipe.name().to_string(),
        constraint,
        host,
    };

    let host_os = normalize_os(&host.os);
    if !constraint.os.is_empty() && !constraint.os.iter().any(|os| normalize_os(os) == host_os) {
        return Err(unsupported(
            format!("os in [{}]", constraint.os.join(", ")),
            host.os.clone(),
        ));
    }

    let host_arch = normalize_arch(&host.arch);
    if !constraint.arch.is_empty()
        && !constraint
            .arch
            .iter()
            .any(|arch| normalize_arch(arch) == host_arch)
    {
        return Err(unsupported(
            format!("arch in [{}]", constraint.arch.join(", ")),
            host.arch.clone(),
        ));
    }

    if let Some(minimum) = &constraint.min_os_version {
        let requirement = format!("os version >= {minimum}");
        match &host.os_version {
            None => return Err(unsupported(requirement, "unknown".to_string())),
            Some(actual) => {
                if compare_dotted(actual, minimum) == Ordering::Less {
                    return Err(unsupported(requirement, actual.clone()));
                }
            }
        }
    }

    Ok(())
}

fn normalize_os(os: &str) -> String {
    let lower = os.trim().to_ascii_lowercase();
    match lower.as_str() {
        "darwin" | "osx" | "macosx" => "macos".to_string(),
        _ => lower,
    }
}

fn normalize_arch(arch: &str) -> String {
    let lower = arch.trim().to_ascii_lowercase();
    match lower.as_str() {
        "arm64" => "aarch64".to_string(),
        "amd64" | "x64" => "x86_64".to_string(),
        _ => lower,
    }
}

/// Compare dotted numeric versions; missing parts count as zero and any
/// non-numeric suffix on a part is ignored
fn compare_dotted(left: &str, right: &str) -> Ordering {
    let parse = |s: &str| -> Vec<u64> {
        s.trim()
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    };
    let (l, r) = (parse(left), parse(right));
    let len = l.len().max(r.len());
    for i in 0..len {
        let a = l.get(i).copied().unwrap_or(0);
        let b = r.get(i).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_recipe_from_str;

    fn recipe(platform: &str) -> Recipe {
        let content = format!(
            r#"
metadata: {{ name: o2l, version: 0.0.1 }}
source: {{ url: "https://example.invalid/o2l.tar.gz" }}
{platform}
verify:
  - {{ run: [o2l], expect: {{ exit_code: 0 }} }}
"#
        );
        parse_recipe_from_str(&content, "o2l.yml").unwrap()
    }

    #[test]
    fn unconstrained_recipe_accepts_any_host() {
        let r = recipe("");
        assert!(check_platform(&r, &HostInfo::new("linux", "riscv64", None)).is_ok());
    }

    #[test]
    fn macos_minimum_version() {
        let r = recipe("platform: { os: [macos], min_os_version: '12.0' }");

        assert!(check_platform(&r, &HostInfo::new("macos", "aarch64", Some("14.5".into()))).is_ok());
        assert!(check_platform(&r, &HostInfo::new("macos", "x86_64", Some("12".into()))).is_ok());

        let err = check_platform(&r, &HostInfo::new("macos", "aarch64", Some("11.7.10".into())))
            .unwrap_err();
        assert!(matches!(
            err,
            RecipeError::UnsupportedPlatform { ref host, .. } if host == "11.7.10"
        ));
    }

    #[test]
    fn wrong_os_is_rejected() {
        let r = recipe("platform: { os: [macos] }");
        let err = check_platform(&r, &HostInfo::new("linux", "x86_64", Some("6.1".into())))
            .unwrap_err();
        assert!(matches!(
            err,
            RecipeError::UnsupportedPlatform { ref constraint, .. } if constraint.contains("macos")
        ));
    }

    #[test]
    fn unknown_host_version_fails_closed() {
        let r = recipe("platform: { min_os_version: '12.0' }");
        let err = check_platform(&r, &HostInfo::new("macos", "aarch64", None)).unwrap_err();
        assert!(matches!(
            err,
            RecipeError::UnsupportedPlatform { ref host, .. } if host == "unknown"
        ));
    }

    #[test]
    fn aliases_are_normalized() {
        let r = recipe("platform: { os: [darwin], arch: [arm64] }");
        assert!(check_platform(&r, &HostInfo::new("macos", "aarch64", None)).is_ok());
        assert!(check_platform(&r, &HostInfo::new("macos", "x86_64", None)).is_err());
    }

    #[test]
    fn dotted_comparison_pads_with_zero() {
        assert_eq!(compare_dotted("12", "12.0.0"), Ordering::Equal);
        assert_eq!(compare_dotted("12.0.1", "12.0"), Ordering::Greater);
        assert_eq!(compare_dotted("10.15", "11"), Ordering::Less);
    }
}
