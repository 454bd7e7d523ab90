//! Integration tests for net crate

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use kiln_errors::{Error, FetchError, UserFacingError};
    use kiln_events::{channel, AppEvent, FetchEvent};
    use kiln_hash::{DigestAlgorithm, SourceDigest};
    use kiln_net::*;
    use kiln_recipe::{parse_recipe_from_str, Recipe};
    use std::time::Duration;

    fn recipe_for(url: &str, content: &[u8]) -> Recipe {
        let digest = SourceDigest::compute(DigestAlgorithm::Sha256, content);
        let yaml = format!(
            r#"
metadata: {{ name: o2l, version: 0.0.1 }}
source: {{ url: "{url}", sha256: "{}" }}
verify:
  - {{ run: [o2l], expect: {{ exit_code: 0 }} }}
"#,
            digest.hex
        );
        parse_recipe_from_str(&yaml, "o2l.yml").unwrap()
    }

    fn transport() -> SchemeTransport {
        SchemeTransport::new(NetClient::with_defaults().unwrap())
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn test_http_fetch_and_verify() {
        let server = MockServer::start_async().await;
        let content = b"o2l source archive";
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v0.0.1.tar.gz");
                then.status(200)
                    .header("content-length", content.len().to_string())
                    .body(content);
            })
            .await;

        let (tx, mut rx) = channel();
        let recipe = recipe_for(&server.url("/v0.0.1.tar.gz"), content);
        let source = fetch_and_verify(&transport(), &recipe, Some(&tx))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(&source.data[..], content);
        assert_eq!(source.file_name, "v0.0.1.tar.gz");

        let dir = tempfile::tempdir().unwrap();
        let written = source.write_to(dir.path()).await.unwrap();
        assert_eq!(tokio::fs::read(&written).await.unwrap(), content);

        let mut saw_start = false;
        let mut saw_verified = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::Fetch(FetchEvent::Started { .. }) => saw_start = true,
                AppEvent::Fetch(FetchEvent::Verified { bytes, .. }) => {
                    saw_verified = true;
                    assert_eq!(bytes, content.len() as u64);
                }
                _ => {}
            }
        }
        assert!(saw_start);
        assert!(saw_verified);
    }

    #[tokio::test]
    async fn test_http_integrity_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/src.tar.gz");
                then.status(200).body("something else");
            })
            .await;

        let recipe = recipe_for(&server.url("/src.tar.gz"), b"expected content");
        let err = fetch_and_verify(&transport(), &recipe, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Fetch(FetchError::IntegrityMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable_and_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/src.tar.gz");
                then.status(503);
            })
            .await;

        let recipe = recipe_for(&server.url("/src.tar.gz"), b"content");
        let err = fetch_with_retry(&transport(), &recipe, &fast_retry(2), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Fetch(FetchError::FetchUnavailable { .. })
        ));
        assert!(err.is_retryable());
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.tar.gz");
                then.status(404);
            })
            .await;

        let recipe = recipe_for(&server.url("/missing.tar.gz"), b"content");
        let err = fetch_with_retry(&transport(), &recipe, &fast_retry(3), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fetch(FetchError::InvalidSource { .. })));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        // Nothing listens on port 9 of localhost in test environments
        let recipe = recipe_for("http://127.0.0.1:9/src.tar.gz", b"content");
        let err = fetch_and_verify(&transport(), &recipe, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Fetch(FetchError::FetchUnavailable { .. })
        ));
    }
}
