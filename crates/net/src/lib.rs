#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Source acquisition for kiln
//!
//! This crate retrieves a recipe's source archive through a transport
//! (HTTP via reqwest, or the local filesystem), verifies it against the
//! digest the recipe declares, and offers a caller-side retry policy with
//! exponential backoff for transient transport failures.

mod client;
mod fetch;
mod retry;
mod transport;

pub use client::{NetClient, NetConfig};
pub use fetch::{fetch_and_verify, fetch_with_retry, required_digest, FetchedSource};
pub use retry::{calculate_backoff_delay, RetryConfig};
pub use transport::{resolve_locator, FileTransport, HttpTransport, SchemeTransport, Transport};

use kiln_errors::{Error, FetchError};
use url::Url;

/// Parse and validate an absolute URL
///
/// # Errors
///
/// Returns `InvalidSource` if the URL string is malformed.
pub fn parse_url(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|e| {
        FetchError::InvalidSource {
            uri: url.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        assert!(parse_url("https://example.com").is_ok());
        assert!(parse_url("not a url").is_err());
    }
}
