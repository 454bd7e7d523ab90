//! Fetch and verify recipe sources

use crate::retry::{calculate_backoff_delay, RetryConfig};
use crate::transport::{resolve_locator, Transport};
use bytes::Bytes;
use kiln_errors::{Error, FetchError, UserFacingError};
use kiln_events::{AppEvent, EventEmitter, EventSender, FailureContext, FetchEvent};
use kiln_hash::SourceDigest;
use kiln_recipe::Recipe;
use std::path::{Path, PathBuf};

/// Source bytes whose digest matched the recipe
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub uri: String,
    pub digest: SourceDigest,
    pub file_name: String,
    pub data: Bytes,
}

impl FetchedSource {
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Write the archive into `dir` under its original file name
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf, Error> {
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.data)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?;
        Ok(path)
    }
}

/// Declared digest, refusing absent or placeholder values before any fetch
///
/// # Errors
///
/// Returns `MissingIntegrityDigest` for an absent, empty or all-zero digest
/// and `InvalidDigest` for a malformed one.
pub fn required_digest(recipe: &Recipe, uri: &str) -> Result<SourceDigest, Error> {
    let digest = recipe
        .source
        .digest()
        .filter(|d| !d.is_placeholder())
        .ok_or_else(|| FetchError::MissingIntegrityDigest {
            recipe: recipe.name().to_string(),
            uri: uri.to_string(),
        })?;
    digest.validate()?;
    Ok(digest)
}

/// Fetch the recipe's source once and check it against the declared digest
///
/// The digest check is unconditional: nothing is returned unless the bytes
/// hash to exactly the declared value.
///
/// # Errors
///
/// `MissingIntegrityDigest` (before any transport call), `FetchUnavailable`
/// or `InvalidSource` from the transport, and `IntegrityMismatch`.
pub async fn fetch_and_verify(
    transport: &dyn Transport,
    recipe: &Recipe,
    events: Option<&EventSender>,
) -> Result<FetchedSource, Error> {
    let uri = resolve_locator(&recipe.source.url, recipe.base_dir());
    let result = fetch_once(transport, recipe, &uri, events).await;
    if let Err(err) = &result {
        events.emit(AppEvent::Fetch(FetchEvent::Failed {
            recipe: recipe.name().to_string(),
            uri,
            failure: FailureContext::from_error(err),
        }));
    }
    result
}

async fn fetch_once(
    transport: &dyn Transport,
    recipe: &Recipe,
    uri: &str,
    events: Option<&EventSender>,
) -> Result<FetchedSource, Error> {
    let expected = required_digest(recipe, uri)?;

    events.emit(AppEvent::Fetch(FetchEvent::Started {
        recipe: recipe.name().to_string(),
        uri: uri.to_string(),
    }));

    let data = transport.fetch(uri).await?;
    let actual = SourceDigest::compute(expected.algorithm, &data);
    if actual != expected {
        return Err(FetchError::IntegrityMismatch {
            uri: uri.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
        .into());
    }

    events.emit(AppEvent::Fetch(FetchEvent::Verified {
        recipe: recipe.name().to_string(),
        uri: uri.to_string(),
        digest: actual.to_string(),
        bytes: data.len() as u64,
    }));

    Ok(FetchedSource {
        uri: uri.to_string(),
        digest: actual,
        file_name: recipe.source.file_name(),
        data,
    })
}

/// [`fetch_and_verify`] with exponential backoff on retryable failures
///
/// Only `FetchUnavailable` is retried; every other error returns at once.
///
/// # Errors
///
/// The last error once retries are exhausted, or the first non-retryable one.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    recipe: &Recipe,
    retry: &RetryConfig,
    events: Option<&EventSender>,
) -> Result<FetchedSource, Error> {
    let uri = resolve_locator(&recipe.source.url, recipe.base_dir());
    let max_attempts = retry.max_retries.saturating_add(1);
    let mut attempt = 1;

    loop {
        match fetch_once(transport, recipe, &uri, events).await {
            Ok(source) => return Ok(source),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = calculate_backoff_delay(retry, attempt);
                tracing::debug!(%uri, attempt, ?delay, error = %err, "retrying fetch");
                events.emit(AppEvent::Fetch(FetchEvent::Retrying {
                    uri: uri.clone(),
                    attempt,
                    max_attempts,
                    delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    failure: FailureContext::from_error(&err),
                }));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                events.emit(AppEvent::Fetch(FetchEvent::Failed {
                    recipe: recipe.name().to_string(),
                    uri,
                    failure: FailureContext::from_error(&err),
                }));
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kiln_hash::DigestAlgorithm;
    use kiln_recipe::parse_recipe_from_str;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Serves fixed bytes after failing a set number of times
    #[derive(Debug, Default)]
    struct FlakyTransport {
        data: Vec<u8>,
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn fetch(&self, uri: &str) -> Result<Bytes, Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(FetchError::FetchUnavailable {
                    uri: uri.to_string(),
                    message: "connection reset".to_string(),
                }
                .into());
            }
            Ok(Bytes::from(self.data.clone()))
        }
    }

    fn recipe_with_digest(digest: &str) -> Recipe {
        let content = format!(
            r#"
metadata: {{ name: o2l, version: 0.0.1 }}
source: {{ url: "https://example.invalid/v0.0.1.tar.gz", sha256: "{digest}" }}
verify:
  - {{ run: [o2l], expect: {{ exit_code: 0 }} }}
"#
        );
        parse_recipe_from_str(&content, "o2l.yml").unwrap()
    }

    fn sha256_of(data: &[u8]) -> String {
        SourceDigest::compute(DigestAlgorithm::Sha256, data).hex
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn empty_digest_fails_before_transport() {
        let transport = FlakyTransport {
            data: b"archive".to_vec(),
            ..FlakyTransport::default()
        };
        for digest in ["", "0000000000000000000000000000000000000000000000000000000000000000"] {
            let err = fetch_and_verify(&transport, &recipe_with_digest(digest), None)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::Fetch(FetchError::MissingIntegrityDigest { .. })
            ));
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn matching_digest_is_accepted() {
        let transport = FlakyTransport {
            data: b"archive".to_vec(),
            ..FlakyTransport::default()
        };
        let recipe = recipe_with_digest(&sha256_of(b"archive"));
        let source = fetch_and_verify(&transport, &recipe, None).await.unwrap();
        assert_eq!(source.file_name, "v0.0.1.tar.gz");
        assert_eq!(source.size(), 7);
    }

    #[tokio::test]
    async fn mismatched_digest_is_rejected() {
        let transport = FlakyTransport {
            data: b"tampered".to_vec(),
            ..FlakyTransport::default()
        };
        let recipe = recipe_with_digest(&sha256_of(b"archive"));
        let err = fetch_and_verify(&transport, &recipe, None).await.unwrap_err();
        match err {
            Error::Fetch(FetchError::IntegrityMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, format!("sha256:{}", sha256_of(b"archive")));
                assert_eq!(actual, format!("sha256:{}", sha256_of(b"tampered")));
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let transport = FlakyTransport {
            data: b"archive".to_vec(),
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let recipe = recipe_with_digest(&sha256_of(b"archive"));
        let (tx, mut rx) = kiln_events::channel();

        fetch_with_retry(&transport, &recipe, &fast_retry(), Some(&tx))
            .await
            .unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

        let mut retries = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, AppEvent::Fetch(FetchEvent::Retrying { .. })) {
                retries += 1;
            }
        }
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let transport = FlakyTransport {
            data: b"archive".to_vec(),
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let recipe = recipe_with_digest(&sha256_of(b"archive"));
        let err = fetch_with_retry(&transport, &recipe, &fast_retry(), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn integrity_mismatch_is_never_retried() {
        let transport = FlakyTransport {
            data: b"tampered".to_vec(),
            ..FlakyTransport::default()
        };
        let recipe = recipe_with_digest(&sha256_of(b"archive"));
        let err = fetch_with_retry(&transport, &recipe, &fast_retry(), None)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
