use std::fmt;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::portal::session::Session;

/// A file picked by the user, with its declared MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FileSelection {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Reads a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{}' does not name a file", path.display()),
                )
            })?
            .to_string();
        let content_type = mime_guess::from_path(path)
            .first()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        let data = tokio::fs::read(path).await?;
        Ok(Self::new(name, content_type.essence_str(), data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn summary(&self) -> SelectedFile {
        SelectedFile {
            name: self.name.clone(),
            content_type: self.content_type.clone(),
            size: self.size(),
        }
    }
}

impl fmt::Debug for FileSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSelection")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Metadata of the selected file as exposed in view snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

/// Storage key an upload lands on: `{username}/{file name}`.
pub fn destination_key(username: &str, file_name: &str) -> String {
    format!("{username}/{file_name}")
}

/// One upload in flight; dropped once the put call settles.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub file: FileSelection,
    pub content_type: String,
    pub destination_key: String,
}

impl UploadTask {
    pub fn new(session: &Session, file: &FileSelection) -> Self {
        Self {
            content_type: file.content_type.clone(),
            destination_key: destination_key(&session.username, &file.name),
            file: file.clone(),
        }
    }
}
