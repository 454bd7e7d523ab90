//! Integration tests for error types

#[cfg(test)]
mod tests {
    use kiln_errors::*;

    #[test]
    fn test_error_conversion() {
        let resolve_err = ResolveError::UnresolvedDependency {
            name: "libffi".into(),
            constraint: ">=3.4".into(),
            required_by: "o2l".into(),
        };
        let err: Error = resolve_err.into();
        assert!(matches!(err, Error::Resolve(_)));
        assert_eq!(err.user_code(), Some("resolve.unresolved_dependency"));
        assert!(err.user_hint().is_some());
    }

    #[test]
    fn test_error_display() {
        let err = ResolveError::DependencyCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");

        let err = BuildError::PhaseFailed {
            phase: "configure".into(),
            exit_status: None,
            stderr_tail: String::new(),
        };
        assert_eq!(err.to_string(), "phase configure failed with no exit status");
    }

    #[test]
    fn test_error_clone() {
        let err = VerifyError::VerificationFailed {
            check_index: 0,
            expected: "exit code 0".into(),
            actual: "exit code 1".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { path: None, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_recipe_not_found_message() {
        let err: Error = RecipeError::NotFound {
            name: "cmake".into(),
        }
        .into();
        assert!(err.user_message().contains("cmake"));
        assert!(!err.is_retryable());
    }
}
