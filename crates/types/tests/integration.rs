//! Integration tests for types

#[cfg(test)]
mod tests {
    use kiln_types::*;
    use std::path::PathBuf;
    use std::str::FromStr;

    #[test]
    fn test_version_spec_complex() {
        let spec = VersionSpec::from_str(">=3.4,<4.0,!=3.4.5").unwrap();

        assert!(!spec.matches(&parse_version("3.3.9").unwrap()));
        assert!(spec.matches(&parse_version("3.4").unwrap()));
        assert!(!spec.matches(&parse_version("3.4.5").unwrap())); // Excluded
        assert!(spec.matches(&parse_version("3.4.6").unwrap()));
        assert!(!spec.matches(&parse_version("4.0.0").unwrap()));
        assert_eq!(spec.to_string(), ">=3.4.0,<4.0.0,!=3.4.5");
    }

    #[test]
    fn test_lenient_versions() {
        assert_eq!(parse_version("3").unwrap(), Version::new(3, 0, 0));
        assert_eq!(parse_version("v3.28").unwrap(), Version::new(3, 28, 0));
        assert!(parse_version("3.x").is_err());
        assert!(VersionSpec::from_str("*").unwrap().is_any());
    }

    #[test]
    fn test_destination_categories() {
        assert_eq!(DestinationCategory::Bin.relative_dir("o2l"), PathBuf::from("bin"));
        assert_eq!(
            DestinationCategory::Doc.relative_dir("o2l"),
            PathBuf::from("share/doc/o2l")
        );
        let json = serde_json::to_string(&DestinationCategory::Share).unwrap();
        assert_eq!(json, r#""share""#);
    }

    #[test]
    fn test_dependency_phase_aliases() {
        let phase: DependencyPhase = serde_yml::from_str("build-only").unwrap();
        assert!(phase.is_build_only());
        assert_eq!(phase.to_string(), "build-only");
        assert_eq!(DependencyPhase::default(), DependencyPhase::Runtime);
    }

    #[test]
    fn test_output_format_default() {
        let fmt = OutputFormat::default();
        assert_eq!(fmt, OutputFormat::Tty);
    }
}
