//! CLI error handling

use std::fmt;

use kiln_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Operations error
    Ops(kiln_errors::Error),
    /// Invalid command arguments
    InvalidArguments(String),
    /// I/O error
    Io(std::io::Error),
}

impl CliError {
    /// Stable code, when the error carries one
    pub fn code(&self) -> Option<String> {
        match self {
            CliError::Ops(e) => e.user_code().map(str::to_string),
            CliError::InvalidArguments(_) => Some("cli.invalid_arguments".to_string()),
            CliError::Io(_) => Some("cli.io".to_string()),
        }
    }

    /// Error object printed on stdout in `--json` mode
    pub fn to_json(&self) -> serde_json::Value {
        let (message, hint, retryable) = match self {
            CliError::Ops(e) => (
                e.user_message().into_owned(),
                e.user_hint().map(str::to_string),
                e.is_retryable(),
            ),
            CliError::InvalidArguments(msg) => (msg.clone(), None, false),
            CliError::Io(e) => (e.to_string(), None, false),
        };
        serde_json::json!({
            "error": {
                "code": self.code(),
                "message": message,
                "hint": hint,
                "retryable": retryable,
            }
        })
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Ops(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Ops(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::InvalidArguments(_) => None,
        }
    }
}

impl From<kiln_errors::Error> for CliError {
    fn from(e: kiln_errors::Error) -> Self {
        CliError::Ops(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_errors::FetchError;

    #[test]
    fn test_display_includes_code_and_hint() {
        let err = CliError::from(kiln_errors::Error::from(FetchError::IntegrityMismatch {
            uri: "o2l.tar.gz".to_string(),
            expected: "sha256:aa".to_string(),
            actual: "sha256:bb".to_string(),
        }));
        let text = err.to_string();
        assert!(text.contains("Code: fetch.integrity_mismatch"));
        assert!(text.contains("Hint:"));
        assert!(!text.contains("Retry:"));
    }

    #[test]
    fn test_json_error_shape() {
        let err = CliError::from(kiln_errors::Error::from(FetchError::FetchUnavailable {
            uri: "https://example.invalid/o2l.tar.gz".to_string(),
            message: "connection refused".to_string(),
        }));
        let json = err.to_json();
        assert_eq!(json["error"]["code"], "fetch.unavailable");
        assert_eq!(json["error"]["retryable"], true);
    }
}
