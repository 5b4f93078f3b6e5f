use std::io;

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use futures::{Stream, TryStreamExt};
use kernel::StoredFile;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tempfile::TempPath;
use tokio_util::io::StreamReader;

use crate::config::GateConfig;
use crate::error::UploadError;

/// Slack allowed on top of the file ceiling for multipart framing and text fields
/// when judging the declared request length.
pub const FORM_OVERHEAD: u64 = 64 * 1024;

/// Staged uploads start with a dot so the static route never serves them.
pub const STAGING_PREFIX: &str = ".staging-";

/// Decides whether a file part may be persisted and writes it under a generated name.
#[derive(Debug, Clone)]
pub struct UploadGate {
    config: GateConfig,
}

/// File part metadata as declared by the client.
#[derive(Debug, Clone, Copy)]
pub struct FilePart<'a> {
    pub field_name: &'a str,
    pub original_name: &'a str,
    pub mime_type: Option<&'a str>,
}

impl UploadGate {
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Largest request body worth reading at all.
    #[must_use]
    pub fn max_request_size(&self) -> u64 {
        self.config.max_file_size.saturating_add(FORM_OVERHEAD)
    }

    /// Rejects requests that announce a body no acceptable upload could need.
    pub fn check_content_length(&self, declared: Option<u64>) -> Result<(), UploadError> {
        match declared {
            Some(len) if len > self.max_request_size() => {
                Err(UploadError::too_large(self.config.max_file_size))
            }
            _ => Ok(()),
        }
    }

    /// MIME type must match an allowed type exactly.
    pub fn validate(&self, part: &FilePart<'_>) -> Result<(), UploadError> {
        let allowed = part
            .mime_type
            .is_some_and(|m| self.config.allowed_types.iter().any(|t| t == m));
        if allowed {
            Ok(())
        } else {
            Err(UploadError::UnsupportedMediaType)
        }
    }

    /// Validates the part and streams its bytes into a hidden file in the uploads
    /// directory. The bytes only show up under the storage name once the returned
    /// [`StagedFile`] is committed; dropping it or this future deletes them.
    pub async fn stage<S>(&self, part: FilePart<'_>, stream: S) -> Result<StagedFile, UploadError>
    where
        S: Stream<Item = Result<Bytes, MultipartError>>,
    {
        self.validate(&part)?;

        let dir = &self.config.uploads_dir;
        tokio::fs::create_dir_all(dir).await?;
        let (file, temp) = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".part")
            .tempfile_in(dir)?
            .into_parts();

        let written = self.write(File::from_std(file), stream).await?;

        let file_name = generate_storage_name(part.original_name);
        let path = dir.join(&file_name);
        tracing::debug!(
            "file: {} staged at: {} size: {written}",
            part.original_name,
            temp.display()
        );

        Ok(StagedFile {
            file: StoredFile {
                field_name: part.field_name.to_owned(),
                original_name: part.original_name.to_owned(),
                mime_type: part.mime_type.unwrap_or_default().to_owned(),
                destination: dir.display().to_string(),
                file_name,
                path: path.display().to_string(),
                size: written,
            },
            temp,
        })
    }

    async fn write<S>(&self, file: File, stream: S) -> Result<u64, UploadError>
    where
        S: Stream<Item = Result<Bytes, MultipartError>>,
    {
        let max = self.config.max_file_size;
        // Convert the stream into an `AsyncRead`.
        let body_with_io_error = stream.map_err(io::Error::other);
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);
        // One byte past the ceiling is enough to know the file is too big.
        let mut limited = body_reader.take(max.saturating_add(1));

        let mut writer = BufWriter::new(file);
        let copied = tokio::io::copy(&mut limited, &mut writer)
            .await
            .map_err(|e| self.classify(e))?;
        writer.flush().await?;

        if copied > max {
            return Err(UploadError::too_large(max));
        }
        Ok(copied)
    }

    fn classify(&self, e: io::Error) -> UploadError {
        let multipart = e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>());
        match multipart {
            Some(m) => UploadError::from_multipart(m, self.config.max_file_size),
            None => UploadError::Io(e),
        }
    }
}

/// Fully received upload that is not yet visible under its storage name.
#[derive(Debug)]
pub struct StagedFile {
    file: StoredFile,
    temp: TempPath,
}

impl StagedFile {
    #[must_use]
    pub fn stored(&self) -> &StoredFile {
        &self.file
    }

    /// Renames the staged bytes to the storage name.
    pub fn commit(self) -> Result<StoredFile, UploadError> {
        self.temp
            .persist(&self.file.path)
            .map_err(|e| UploadError::Io(e.error))?;
        tracing::info!(
            "file: {} stored as: {} size: {}",
            self.file.original_name,
            self.file.path,
            self.file.size
        );
        Ok(self.file)
    }
}

/// Storage name for `original` stamped with the current time.
#[must_use]
pub fn generate_storage_name(original: &str) -> String {
    storage_name(original, chrono::Utc::now().timestamp_millis())
}

/// `"Dir/My Photo.JPG"` at `1700000000000` becomes `"my-photo-1700000000000.JPG"`.
///
/// Only the final path component of the untrusted name is used. Same name
/// uploads within one millisecond get the same storage name.
#[must_use]
pub fn storage_name(original: &str, millis: i64) -> String {
    let (stem, ext) = split_extension(name_from_path(original));
    let stem = stem.to_lowercase().replace(' ', "-");
    format!("{stem}-{millis}{ext}")
}

fn name_from_path(path: &str) -> &str {
    if let Some(ix) = path.rfind(['\\', '/']) {
        &path[ix + 1..]
    } else {
        path
    }
}

/// Splits at the last dot unless the dot leads the name. The extension keeps its dot.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(ix) if ix > 0 => name.split_at(ix),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};
    use rstest::rstest;
    use std::time::Duration;

    const STAMP: i64 = 1_700_000_000_000;

    fn gate(dir: &std::path::Path, max: u64) -> UploadGate {
        UploadGate::new(GateConfig::new(dir).with_max_file_size(max))
    }

    fn part(mime: Option<&str>) -> FilePart<'_> {
        FilePart {
            field_name: "avatar",
            original_name: "My Photo.png",
            mime_type: mime,
        }
    }

    fn list(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn chunks(data: Vec<u8>) -> impl Stream<Item = Result<Bytes, MultipartError>> {
        let parts: Vec<Result<Bytes, MultipartError>> = data
            .chunks(4096)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        stream::iter(parts)
    }

    #[rstest]
    #[case("My Photo.JPG", "my-photo-1700000000000.JPG")]
    #[case("photo.png", "photo-1700000000000.png")]
    #[case("A  B.jpeg", "a--b-1700000000000.jpeg")]
    #[case("archive.tar.png", "archive.tar-1700000000000.png")]
    #[case("noext", "noext-1700000000000")]
    #[case(".hidden", ".hidden-1700000000000")]
    #[case("trailing.", "trailing-1700000000000.")]
    #[case("", "-1700000000000")]
    #[case("../../etc/Pass Wd.png", "pass-wd-1700000000000.png")]
    #[case("C:\\Users\\me\\Selfie.PNG", "selfie-1700000000000.PNG")]
    #[trace]
    fn storage_name_tests(#[case] original: &str, #[case] expected: &str) {
        // Act
        let name = storage_name(original, STAMP);

        // Assert
        assert_eq!(name, expected);
    }

    #[rstest]
    #[case("", "")]
    #[case("file.ext", "file.ext")]
    #[case("dir/file.ext", "file.ext")]
    #[case("dir\\file.ext", "file.ext")]
    #[case("dir1/dir2/file.ext", "file.ext")]
    #[trace]
    fn name_from_path_tests(#[case] path: &str, #[case] expected: &str) {
        // Act
        let name = name_from_path(path);

        // Assert
        assert_eq!(name, expected);
    }

    #[test]
    fn generated_names_carry_millis() {
        // Act
        let name = generate_storage_name("x.png");

        // Assert
        let stamp = name.strip_prefix("x-").unwrap().strip_suffix(".png").unwrap();
        assert_eq!(stamp.len(), 13);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[rstest]
    #[case(Some("image/jpeg"), true)]
    #[case(Some("image/jpg"), true)]
    #[case(Some("image/png"), true)]
    #[case(Some("image/gif"), false)]
    #[case(Some("IMAGE/PNG"), false)]
    #[case(Some("image/png; charset=binary"), false)]
    #[case(Some("text/plain"), false)]
    #[case(None, false)]
    #[trace]
    fn validate_tests(#[case] mime: Option<&str>, #[case] accepted: bool) {
        // Arrange
        let g = gate(std::path::Path::new("unused"), 10);

        // Act
        let result = g.validate(&part(mime));

        // Assert
        assert_eq!(result.is_ok(), accepted);
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some(0), true)]
    #[case(Some(1_000_000 + FORM_OVERHEAD), true)]
    #[case(Some(1_000_001 + FORM_OVERHEAD), false)]
    #[case(Some(u64::MAX), false)]
    #[trace]
    fn content_length_tests(#[case] declared: Option<u64>, #[case] accepted: bool) {
        // Arrange
        let g = gate(std::path::Path::new("unused"), 1_000_000);

        // Act
        let result = g.check_content_length(declared);

        // Assert
        assert_eq!(result.is_ok(), accepted);
    }

    #[tokio::test]
    async fn commit_writes_identical_bytes() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        let g = gate(&uploads, 100_000);
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();

        // Act
        let staged = g
            .stage(part(Some("image/png")), chunks(data.clone()))
            .await
            .unwrap();
        let stored = staged.commit().unwrap();

        // Assert
        assert_eq!(stored.size, 50_000);
        assert_eq!(stored.original_name, "My Photo.png");
        assert!(stored.file_name.starts_with("my-photo-"));
        assert!(stored.file_name.ends_with(".png"));
        let on_disk = std::fs::read(uploads.join(&stored.file_name)).unwrap();
        assert_eq!(on_disk, data);
        assert_eq!(list(&uploads), vec![stored.file_name]);
    }

    #[rstest]
    #[case(1_000, true)]
    #[case(1_001, false)]
    #[trace]
    #[tokio::test]
    async fn stage_enforces_ceiling(#[case] size: usize, #[case] accepted: bool) {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let g = gate(dir.path(), 1_000);

        // Act
        let result = g.stage(part(Some("image/jpeg")), chunks(vec![7u8; size])).await;

        // Assert
        assert_eq!(result.is_ok(), accepted);
        if let Ok(staged) = result {
            staged.commit().unwrap();
        }
        assert_eq!(list(dir.path()).len(), usize::from(accepted));
    }

    #[tokio::test]
    async fn stage_rejects_type_before_touching_disk() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        let g = gate(&uploads, 1_000);

        // Act
        let result = g.stage(part(Some("image/gif")), chunks(vec![1u8; 10])).await;

        // Assert
        assert!(matches!(result, Err(UploadError::UnsupportedMediaType)));
        assert!(!uploads.exists());
    }

    #[tokio::test]
    async fn staged_file_is_hidden_until_commit() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let g = gate(dir.path(), 1_000);

        // Act
        let staged = g
            .stage(part(Some("image/png")), chunks(vec![1u8; 10]))
            .await
            .unwrap();

        // Assert
        let names = list(dir.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with(STAGING_PREFIX));
        assert!(!std::path::Path::new(&staged.stored().path).exists());
    }

    #[tokio::test]
    async fn dropped_staged_file_leaves_nothing() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let g = gate(dir.path(), 1_000);
        let staged = g
            .stage(part(Some("image/png")), chunks(vec![1u8; 10]))
            .await
            .unwrap();

        // Act
        drop(staged);

        // Assert
        assert!(list(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn interrupted_stream_leaves_nothing() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let g = gate(dir.path(), 100_000);
        let first: Result<Bytes, MultipartError> = Ok(Bytes::from(vec![1u8; 10_000]));
        let never_ending = stream::iter(vec![first]).chain(stream::pending());

        // Act
        let result = tokio::time::timeout(
            Duration::from_millis(200),
            g.stage(part(Some("image/png")), never_ending),
        )
        .await;

        // Assert
        assert!(result.is_err());
        assert!(list(dir.path()).is_empty());
    }
}
