//! Image uploads from multipart forms.
//!
//! Text parts of a form are collected into [`FormFields`]; file parts are
//! checked against the allowed image types and the size ceiling for their
//! [`UploadKind`], then written to the upload directory under a random name.
//! The stored file is addressed by its public URL (`{prefix}/{file name}`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use thiserror::Error;
use uuid::Uuid;

const MIB: usize = 1024 * 1024;

/// Accepted image content types.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/jpg"];

/// Upper bound for a whole multipart request body (several product images).
pub const MAX_FORM_BYTES: usize = 30 * MIB;

/// Errors raised while receiving an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The part is not a JPEG or PNG image.
    #[error("Only .jpeg, .jpg and .png images are allowed (got {0})")]
    UnsupportedType(String),

    /// The part exceeds the ceiling for its kind.
    #[error("File too large: the limit is {} MB", .max_bytes / MIB)]
    TooLarge {
        /// Ceiling that was exceeded.
        max_bytes: usize,
    },

    /// A second file was sent where only one is kept.
    #[error("Only one image may be uploaded")]
    TooManyFiles,

    /// The multipart body could not be read.
    #[error("Invalid form data: {0}")]
    Multipart(#[from] MultipartError),

    /// Writing to the upload directory failed.
    #[error("upload storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// What an uploaded image is for; decides the size ceiling and file prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    ProductImage,
    ProfilePicture,
    CategoryIcon,
}

impl UploadKind {
    /// Size ceiling for one file.
    #[must_use]
    pub const fn max_bytes(self) -> usize {
        match self {
            Self::ProductImage | Self::ProfilePicture => 5 * MIB,
            Self::CategoryIcon => 2 * MIB,
        }
    }

    /// Whether a form may carry more than one file of this kind.
    #[must_use]
    pub const fn allows_many(self) -> bool {
        matches!(self, Self::ProductImage)
    }

    const fn file_prefix(self) -> &'static str {
        match self {
            Self::ProductImage => "product",
            Self::ProfilePicture => "profile",
            Self::CategoryIcon => "category",
        }
    }
}

/// Extension for an accepted content type.
fn extension_for(content_type: &str) -> Result<&'static str, UploadError> {
    match content_type {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        other => Err(UploadError::UnsupportedType(other.to_owned())),
    }
}

/// Text parts of a multipart form.
#[derive(Debug, Clone, Default)]
pub struct FormFields(HashMap<String, Vec<String>>);

impl FormFields {
    /// Append a value for `name`.
    pub fn push(&mut self, name: &str, value: &str) {
        self.0
            .entry(name.to_owned())
            .or_default()
            .push(value.to_owned());
    }

    /// First non-blank value of a field, trimmed.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)?
            .iter()
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    /// All values of a list field.
    ///
    /// Each value may be a JSON string array or a comma separated list;
    /// repeated fields are concatenated. Blank entries are dropped.
    #[must_use]
    pub fn list(&self, name: &str) -> Vec<String> {
        let Some(values) = self.0.get(name) else {
            return Vec::new();
        };
        values
            .iter()
            .flat_map(|raw| {
                let raw = raw.trim();
                if raw.starts_with('[')
                    && let Ok(items) = serde_json::from_str::<Vec<String>>(raw)
                {
                    return items;
                }
                raw.split(',').map(str::to_owned).collect()
            })
            .map(|item| item.trim().to_owned())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

/// Local directory of uploaded files plus the URL prefix it is served under.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    public_prefix: String,
}

impl UploadStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_prefix: public_prefix.into(),
        }
    }

    /// Directory files are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Validate and store one image. Returns its public URL.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] for a disallowed type, an oversized file or a
    /// failed write.
    pub async fn save(
        &self,
        kind: UploadKind,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        let extension = extension_for(content_type)?;
        if bytes.len() > kind.max_bytes() {
            return Err(UploadError::TooLarge {
                max_bytes: kind.max_bytes(),
            });
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = format!("{}-{}.{extension}", kind.file_prefix(), Uuid::new_v4());
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;

        tracing::debug!(file = %file_name, size = bytes.len(), "Stored upload");
        Ok(format!("{}/{file_name}", self.public_prefix))
    }

    /// Delete a previously stored file by its public URL.
    ///
    /// URLs outside this store are ignored. Failures are logged, not returned:
    /// a leftover file never blocks the record change that replaced it.
    pub async fn remove(&self, public_url: &str) {
        let Some(file_name) = public_url
            .strip_prefix(self.public_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return;
        };
        if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.dir.join(file_name)).await {
            tracing::warn!(error = %e, file = %file_name, "Failed to remove upload");
        }
    }

    /// Read a whole multipart form.
    ///
    /// Parts with a file name are stored as `kind` images, parts without one
    /// are kept as text. Profile pictures and category icons take one file. Each file is checked against the ceiling while it
    /// streams in, so oversized files are rejected without being buffered.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] for unreadable forms or rejected files. Files
    /// stored before the failing part are removed again.
    pub async fn read_form(
        &self,
        mut multipart: Multipart,
        kind: UploadKind,
    ) -> Result<(FormFields, Vec<String>), UploadError> {
        let mut fields = FormFields::default();
        let mut stored: Vec<String> = Vec::new();

        let result = async {
            while let Some(mut field) = multipart.next_field().await? {
                let name = field.name().unwrap_or_default().to_owned();

                if field.file_name().is_none_or(str::is_empty) {
                    let value = field.text().await?;
                    fields.push(&name, &value);
                    continue;
                }

                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                extension_for(&content_type)?;

                let mut bytes = Vec::new();
                while let Some(chunk) = field.chunk().await? {
                    if bytes.len() + chunk.len() > kind.max_bytes() {
                        return Err(UploadError::TooLarge {
                            max_bytes: kind.max_bytes(),
                        });
                    }
                    bytes.extend_from_slice(&chunk);
                }
                if bytes.is_empty() {
                    continue;
                }
                if !kind.allows_many() && !stored.is_empty() {
                    return Err(UploadError::TooManyFiles);
                }

                stored.push(self.save(kind, &content_type, &bytes).await?);
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            for url in &stored {
                self.remove(url).await;
            }
            return Err(e);
        }

        Ok((fields, stored))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, UploadStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), "/uploads");
        (dir, store)
    }

    #[test]
    fn test_size_ceilings() {
        assert_eq!(UploadKind::ProductImage.max_bytes(), 5 * MIB);
        assert_eq!(UploadKind::ProfilePicture.max_bytes(), 5 * MIB);
        assert_eq!(UploadKind::CategoryIcon.max_bytes(), 2 * MIB);
    }

    async fn multipart(files: &[&str]) -> Multipart {
        use axum::extract::FromRequest;

        let mut body =
            String::from("--X\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAsha\r\n");
        for file in files {
            body.push_str(&format!(
                "--X\r\nContent-Disposition: form-data; name=\"picture\"; filename=\"{file}\"\r\n\
                 Content-Type: image/png\r\n\r\nPNGDATA\r\n"
            ));
        }
        body.push_str("--X--\r\n");

        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "multipart/form-data; boundary=X")
            .body(axum::body::Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_read_form_keeps_single_picture() {
        let (dir, store) = store();
        let (fields, stored) = store
            .read_form(multipart(&["me.png"]).await, UploadKind::ProfilePicture)
            .await
            .unwrap();
        assert_eq!(fields.text("name"), Some("Asha"));
        assert_eq!(stored.len(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_read_form_rejects_second_picture() {
        let (dir, store) = store();
        let result = store
            .read_form(multipart(&["a.png", "b.png"]).await, UploadKind::ProfilePicture)
            .await;
        assert!(matches!(result, Err(UploadError::TooManyFiles)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let (_, stored) = store
            .read_form(multipart(&["a.png", "b.png"]).await, UploadKind::ProductImage)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn test_form_fields_text_and_list() {
        let mut form = FormFields::default();
        form.push("name", "  Kurta ");
        form.push("sizes", r#"["S", "M"]"#);
        form.push("sizes", "L, XL,");
        form.push("blank", "   ");

        assert_eq!(form.text("name"), Some("Kurta"));
        assert_eq!(form.text("blank"), None);
        assert_eq!(form.text("missing"), None);
        assert_eq!(form.list("sizes"), vec!["S", "M", "L", "XL"]);
        assert!(form.list("missing").is_empty());
    }

    #[tokio::test]
    async fn test_save_writes_file_and_returns_url() {
        let (dir, store) = store();
        let url = store
            .save(UploadKind::ProductImage, "image/png", b"\x89PNG")
            .await
            .unwrap();

        assert!(url.starts_with("/uploads/product-"));
        assert!(url.ends_with(".png"));
        let file_name = url.trim_start_matches("/uploads/");
        assert!(dir.path().join(file_name).exists());

        store.remove(&url).await;
        assert!(!dir.path().join(file_name).exists());
    }

    #[tokio::test]
    async fn test_save_rejects_wrong_type() {
        let (_dir, store) = store();
        let result = store
            .save(UploadKind::ProductImage, "image/gif", b"GIF89a")
            .await;
        assert!(matches!(result, Err(UploadError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_save_rejects_oversized_icon() {
        let (_dir, store) = store();
        let bytes = vec![0_u8; 2 * MIB + 1];
        let result = store
            .save(UploadKind::CategoryIcon, "image/jpeg", &bytes)
            .await;
        assert!(matches!(
            result,
            Err(UploadError::TooLarge { max_bytes }) if max_bytes == 2 * MIB
        ));
    }

    #[tokio::test]
    async fn test_remove_ignores_foreign_urls() {
        let (dir, store) = store();
        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, "x").unwrap();
        store.remove("/elsewhere/keep.txt").await;
        store.remove("/uploads/../keep.txt").await;
        assert!(outside.exists());
    }
}
