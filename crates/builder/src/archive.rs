//! Source archive unpacking

use kiln_errors::{Error, FetchError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Result of unpacking a source archive
#[derive(Debug, Clone)]
pub struct UnpackedSource {
    /// Directory phase commands run in
    pub source_dir: PathBuf,
    /// Number of archive entries written
    pub entries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Tar,
    TarGz,
}

/// Unpack `archive` into the empty directory `dest`
///
/// Supported formats are `.tar`, `.tar.gz` and `.tgz` (gzip is also
/// recognised by its magic bytes). When the archive wraps everything in a
/// single top-level directory, that directory becomes the source dir.
///
/// # Errors
///
/// Returns `ExtractionFailed` for unreadable or unsupported archives and for
/// entries whose path would land outside `dest`.
pub async fn unpack_source(archive: &Path, dest: &Path) -> Result<UnpackedSource, Error> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || unpack_blocking(&archive, &dest))
        .await
        .map_err(|e| Error::internal(format!("unpack task failed: {e}")))?
}

fn unpack_blocking(archive: &Path, dest: &Path) -> Result<UnpackedSource, Error> {
    let failed = |message: String| -> Error {
        FetchError::ExtractionFailed {
            archive: archive.display().to_string(),
            message,
        }
        .into()
    };

    let format = detect_format(archive).map_err(|e| failed(e.to_string()))?;
    std::fs::create_dir_all(dest).map_err(|e| Error::io_with_path(&e, dest))?;

    let file = File::open(archive).map_err(|e| failed(e.to_string()))?;
    let reader: Box<dyn Read> = match format {
        ArchiveFormat::Tar => Box::new(BufReader::new(file)),
        ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(BufReader::new(file))),
    };

    let mut tar = tar::Archive::new(reader);
    tar.set_preserve_permissions(true);
    tar.set_overwrite(true);

    let mut entries = 0usize;
    for entry in tar.entries().map_err(|e| failed(e.to_string()))? {
        let mut entry = entry.map_err(|e| failed(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| failed(e.to_string()))?
            .into_owned();

        // unpack_in refuses absolute paths and `..` components
        let inside = entry
            .unpack_in(dest)
            .map_err(|e| failed(format!("{}: {e}", path.display())))?;
        if !inside {
            return Err(failed(format!(
                "entry {} escapes the work directory",
                path.display()
            )));
        }
        entries += 1;
    }

    if entries == 0 {
        return Err(failed("archive is empty".to_string()));
    }

    let source_dir = single_top_level_dir(dest)
        .map_err(|e| Error::io_with_path(&e, dest))?
        .unwrap_or_else(|| dest.to_path_buf());

    tracing::debug!(
        archive = %archive.display(),
        source_dir = %source_dir.display(),
        entries,
        "unpacked source"
    );

    Ok(UnpackedSource {
        source_dir,
        entries,
    })
}

fn detect_format(archive: &Path) -> std::io::Result<ArchiveFormat> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        return Ok(ArchiveFormat::TarGz);
    }
    if name.ends_with(".tar") {
        return Ok(ArchiveFormat::Tar);
    }

    let mut magic = [0u8; 2];
    let mut file = File::open(archive)?;
    let read = file.read(&mut magic)?;
    if read == 2 && magic == [0x1f, 0x8b] {
        Ok(ArchiveFormat::TarGz)
    } else {
        Ok(ArchiveFormat::Tar)
    }
}

/// The only entry of `dir` when it is a directory
fn single_top_level_dir(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut children = std::fs::read_dir(dir)?;
    let Some(first) = children.next().transpose()? else {
        return Ok(None);
    };
    if children.next().is_some() {
        return Ok(None);
    }
    Ok(first.file_type()?.is_dir().then(|| first.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn append_file(builder: &mut tar::Builder<impl std::io::Write>, path: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, path, data).unwrap();
    }

    fn write_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, data) in files {
            append_file(&mut builder, name, data);
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[tokio::test]
    async fn strips_single_top_level_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("v0.0.1.tar.gz");
        write_tar_gz(
            &archive,
            &[
                ("o2l-0.0.1/CMakeLists.txt", b"project(o2l)"),
                ("o2l-0.0.1/README.md", b"# o2l"),
            ],
        );

        let dest = tmp.path().join("work");
        let unpacked = unpack_source(&archive, &dest).await.unwrap();
        assert_eq!(unpacked.source_dir, dest.join("o2l-0.0.1"));
        assert_eq!(unpacked.entries, 2);
        assert!(unpacked.source_dir.join("README.md").is_file());
    }

    #[tokio::test]
    async fn flat_archive_uses_work_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("flat.tgz");
        write_tar_gz(&archive, &[("a.txt", b"a"), ("b.txt", b"b")]);

        let dest = tmp.path().join("work");
        let unpacked = unpack_source(&archive, &dest).await.unwrap();
        assert_eq!(unpacked.source_dir, dest);
    }

    #[tokio::test]
    async fn plain_tar_and_magic_detection() {
        let tmp = tempfile::tempdir().unwrap();
        let plain = tmp.path().join("src.tar");
        {
            let mut builder = tar::Builder::new(File::create(&plain).unwrap());
            append_file(&mut builder, "pkg/main.c", b"int main(){}");
            builder.finish().unwrap();
        }
        let unpacked = unpack_source(&plain, &tmp.path().join("w1")).await.unwrap();
        assert!(unpacked.source_dir.join("main.c").is_file());

        // gzip data without a telling extension
        let disguised = tmp.path().join("download");
        write_tar_gz(&disguised, &[("pkg/main.c", b"int main(){}")]);
        let unpacked = unpack_source(&disguised, &tmp.path().join("w2")).await.unwrap();
        assert!(unpacked.source_dir.join("main.c").is_file());
    }

    #[tokio::test]
    async fn garbage_is_extraction_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("broken.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();

        let err = unpack_source(&archive, &tmp.path().join("work"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Fetch(FetchError::ExtractionFailed { .. })
        ));
    }
}
