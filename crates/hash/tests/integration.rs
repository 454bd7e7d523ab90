//! Integration tests for hash crate

#[cfg(test)]
mod tests {
    use kiln_hash::*;
    use tempfile::tempdir;
    use tokio::fs;

    #[tokio::test]
    async fn test_verify_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("o2l");

        let data = b"#!/bin/sh\necho o2l 0.0.1\n";
        fs::write(&file_path, data).await.unwrap();

        let hash = Hash::from_data(data);
        assert!(verify_file(&file_path, &hash).await.unwrap());

        let wrong_hash = Hash::from_data(b"different content");
        assert!(!verify_file(&file_path, &wrong_hash).await.unwrap());
    }

    #[test]
    fn test_hash_from_hex_errors() {
        // Too short
        assert!(Hash::from_hex("1234").is_err());

        // Too long
        assert!(Hash::from_hex(&"a".repeat(65)).is_err());

        // Invalid hex
        assert!(Hash::from_hex("xyz123").is_err());
    }

    #[tokio::test]
    async fn test_tree_digest_tracks_contents() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("share/examples"))
            .await
            .unwrap();
        fs::write(dir.path().join("share/examples/hello.o2l"), "print 1")
            .await
            .unwrap();
        fs::write(dir.path().join("README.md"), "# o2l").await.unwrap();

        let first = hash_tree(dir.path()).await.unwrap();
        assert_eq!(first.files.len(), 2);
        assert_eq!(first.files[0].relative_path, "README.md");
        assert_eq!(hash_tree(dir.path()).await.unwrap().hash, first.hash);

        fs::write(dir.path().join("README.md"), "# o2l!").await.unwrap();
        assert_ne!(hash_tree(dir.path()).await.unwrap().hash, first.hash);
    }

    #[test]
    fn test_source_digest_matches_data() {
        let data = b"source archive bytes";
        for algorithm in [DigestAlgorithm::Sha256, DigestAlgorithm::Blake3] {
            let digest = SourceDigest::compute(algorithm, data);
            assert!(digest.matches(data));
            assert!(!digest.matches(b"tampered"));
            assert!(digest.validate().is_ok());
        }
    }
}
