use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Component/feature that originated the event.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventSource(Cow<'static, str>);

impl EventSource {
    pub const GENERAL: Self = Self::const_str("general");
    pub const RECIPE: Self = Self::const_str("recipe");
    pub const RESOLVER: Self = Self::const_str("resolver");
    pub const FETCH: Self = Self::const_str("fetch");
    pub const BUILD: Self = Self::const_str("build");
    pub const INSTALL: Self = Self::const_str("install");
    pub const VERIFY: Self = Self::const_str("verify");
    pub const TRANSACTION: Self = Self::const_str("transaction");
    pub const PLATFORM: Self = Self::const_str("platform");

    const fn const_str(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    /// Borrow the underlying identifier used for logging.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
