//! Sender-side note assembly
//!
//! A [`ContainerBuilder`] is mutated while the sender edits the note; `build`
//! freezes it into a [`Container`] that the codec consumes. Files are kept as
//! byte sources and only read when the container is encoded.

use bytes::Bytes;
use secnote_core::{SecnoteError, SecnoteResult};
use std::io::Cursor;
use std::path::Path;
use tokio::io::AsyncRead;

use crate::codec;

/// Sequential reader over a file's contents.
pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// A file attached to a note: its name, declared size, and where to read it.
pub struct FileEntry {
    name: String,
    size: u64,
    source: ByteSource,
}

impl FileEntry {
    /// `size` must be the exact number of bytes `source` yields.
    pub fn new(name: impl Into<String>, size: u64, source: ByteSource) -> Self {
        Self {
            name: name.into(),
            size,
            source,
        }
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        let size = data.len() as u64;
        Self::new(name, size, Box::new(Cursor::new(data)))
    }

    /// Reference a file on disk; the name is the path's final component.
    pub async fn open(path: &Path) -> SecnoteResult<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                SecnoteError::invalid("file name", format!("{} has no file name", path.display()))
            })?;
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self::new(name, size, Box::new(file)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn into_source(self) -> (String, u64, ByteSource) {
        (self.name, self.size, self.source)
    }
}

impl std::fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEntry")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Mutable note under construction.
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    text: String,
    password: String,
    files: Vec<FileEntry>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn file(mut self, file: FileEntry) -> Self {
        self.files.push(file);
        self
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    pub fn add_file(&mut self, file: FileEntry) {
        self.files.push(file);
    }

    /// Remove the file at `index`; out-of-range indices are ignored.
    pub fn remove_file(&mut self, index: usize) -> Option<FileEntry> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.password.is_empty() && self.files.is_empty()
    }

    pub fn build(self) -> Container {
        Container {
            text: self.text,
            password: self.password,
            files: self.files,
        }
    }
}

/// A finalized note, ready for encoding.
#[derive(Debug)]
pub struct Container {
    text: String,
    password: String,
    files: Vec<FileEntry>,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.password.is_empty() && self.files.is_empty()
    }

    /// Exact size of the serialized container.
    ///
    /// Fails if any field exceeds its length encoding.
    pub fn encoded_len(&self) -> SecnoteResult<usize> {
        codec::encoded_len(self)
    }

    /// Size of the wire blob after sealing: envelope overhead included.
    pub fn sealed_len(&self) -> SecnoteResult<usize> {
        let overhead = secnote_crypto::EnvelopeVersion::CURRENT.overhead();
        let encoded = self.encoded_len()?;
        encoded
            .checked_add(overhead)
            .ok_or(SecnoteError::OutOfRange {
                field: "sealed note",
                value: encoded as u64,
                limit: (usize::MAX - overhead) as u64,
            })
    }

    pub(crate) fn into_parts(self) -> (String, String, Vec<FileEntry>) {
        (self.text, self.password, self.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_add_remove() {
        let mut builder = ContainerBuilder::new();
        assert!(builder.is_empty());

        builder.add_file(FileEntry::from_bytes("a.txt", "aaa"));
        builder.add_file(FileEntry::from_bytes("b.txt", "bb"));
        builder.add_file(FileEntry::from_bytes("c.txt", "c"));
        assert!(!builder.is_empty());

        let removed = builder.remove_file(1).unwrap();
        assert_eq!(removed.name(), "b.txt");
        assert!(builder.remove_file(5).is_none());

        let names: Vec<&str> = builder.files().iter().map(FileEntry::name).collect();
        assert_eq!(names, ["a.txt", "c.txt"]);
    }

    #[test]
    fn test_set_text_and_password() {
        let mut builder = ContainerBuilder::new();
        builder.set_text("first");
        builder.set_text("second");
        builder.set_password("pw");
        let container = builder.build();
        assert_eq!(container.text(), "second");
        assert_eq!(container.password(), "pw");
        assert!(!container.is_empty());
    }

    #[test]
    fn test_encoded_len_tracks_utf8_bytes() {
        let container = Container::builder()
            .text("héllo")
            .password("pässword")
            .file(FileEntry::from_bytes("ñame", vec![0u8; 100]))
            .build();

        // 12 header + 6 text + 9 pwd + (4 + 5 + 8 + 100) file
        assert_eq!(container.encoded_len().unwrap(), 12 + 6 + 9 + 4 + 5 + 8 + 100);
        assert_eq!(
            container.sealed_len().unwrap(),
            container.encoded_len().unwrap() + 13 + 16
        );
    }

    #[test]
    fn test_empty_container_len() {
        let container = ContainerBuilder::new().build();
        assert!(container.is_empty());
        assert_eq!(container.encoded_len().unwrap(), 12);
    }

    #[tokio::test]
    async fn test_open_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, vec![7u8; 321]).unwrap();

        let entry = FileEntry::open(&path).await.unwrap();
        assert_eq!(entry.name(), "report.pdf");
        assert_eq!(entry.size(), 321);
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileEntry::open(&dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, SecnoteError::Io(_)));
    }
}
