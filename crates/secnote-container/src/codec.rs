//! Binary container format (version 1 payload)
//!
//! Layout (little-endian, no padding):
//! ```text
//! [u32 text_len][text utf8]
//! [u32 pwd_len ][pwd utf8]
//! [u32 file_count]
//!   file_count × [u32 name_len][name utf8][u64 file_len][file bytes]
//! ```
//!
//! Lengths are validated before the first byte is written, and the output
//! buffer is allocated once at its exact final size. Decoding is
//! all-or-nothing; file bodies come back as zero-copy slices of the input.

use bytes::Bytes;
use secnote_core::{SecnoteError, SecnoteResult};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroize;

use crate::container::{Container, FileEntry};

/// text_len + pwd_len + file_count
pub const DATA_HEADER_LEN: usize = 4 + 4 + 4;

/// name_len + file_len
pub const FILE_HEADER_LEN: usize = 4 + 8;

/// Largest integer a browser peer can hold exactly (2^53 - 1). File sizes and
/// the total length must stay below it for the format to round-trip there.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// File bytes are streamed in chunks of this size, with a cancellation check
/// between chunks.
pub const STREAM_CHUNK: usize = 64 * 1024;

/// A file recovered from a decoded container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFile {
    pub name: String,
    /// View into the decoded buffer
    pub data: Bytes,
}

/// Receiver-side reconstruction of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedNote {
    pub text: String,
    pub password: String,
    pub files: Vec<DecodedFile>,
}

fn u32_len(field: &'static str, len: usize) -> SecnoteResult<u32> {
    u32::try_from(len).map_err(|_| SecnoteError::OutOfRange {
        field,
        value: len as u64,
        limit: u64::from(u32::MAX),
    })
}

fn checked_total(total: u64, add: u64) -> SecnoteResult<u64> {
    let limit = MAX_SAFE_INTEGER.min(usize::MAX as u64);
    total
        .checked_add(add)
        .filter(|t| *t <= limit)
        .ok_or(SecnoteError::OutOfRange {
            field: "container",
            value: total.saturating_add(add),
            limit,
        })
}

/// Exact encoded size of `container`, validating every length field.
pub fn encoded_len(container: &Container) -> SecnoteResult<usize> {
    let text_len = u32_len("text", container.text().len())?;
    let pwd_len = u32_len("password", container.password().len())?;
    u32_len("file count", container.files().len())?;

    let mut total = DATA_HEADER_LEN as u64 + u64::from(text_len) + u64::from(pwd_len);
    for file in container.files() {
        let name_len = u32_len("file name", file.name().len())?;
        if file.size() > MAX_SAFE_INTEGER {
            return Err(SecnoteError::OutOfRange {
                field: "file size",
                value: file.size(),
                limit: MAX_SAFE_INTEGER,
            });
        }
        total = checked_total(total, FILE_HEADER_LEN as u64 + u64::from(name_len))?;
        total = checked_total(total, file.size())?;
    }
    Ok(total as usize)
}

/// Sequential writer over a buffer whose final size is known up front.
struct NoteWriter {
    buf: Vec<u8>,
}

impl NoteWriter {
    /// Fails instead of aborting when the host cannot provide `len` bytes.
    fn with_len(len: usize) -> SecnoteResult<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|e| {
                tracing::warn!(len, "container allocation failed: {e}");
                SecnoteError::OutOfRange {
                    field: "container",
                    value: len as u64,
                    limit: MAX_SAFE_INTEGER,
                }
            })?;
        Ok(Self { buf })
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_str(&mut self, s: &str) {
        // lengths were validated by `encoded_len`
        self.write_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Reserve `len` zeroed bytes at the end and return them for filling.
    fn tail(&mut self, len: usize) -> &mut [u8] {
        let start = self.buf.len();
        self.buf.resize(start + len, 0);
        &mut self.buf[start..]
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Overwrite everything written so far with zeros.
    fn wipe(&mut self) {
        self.buf.as_mut_slice().zeroize();
    }
}

/// Serialize `container`, streaming each file from its byte source in order.
///
/// Fails with [`SecnoteError::OutOfRange`] before reading anything if a field
/// does not fit its encoding, with [`SecnoteError::Io`] if a source ends
/// before its declared size, and with [`SecnoteError::Cancelled`] if `cancel`
/// fires between chunks.
pub async fn encode(container: Container, cancel: &CancellationToken) -> SecnoteResult<Vec<u8>> {
    let total = encoded_len(&container)?;
    let (text, password, files) = container.into_parts();

    let mut w = NoteWriter::with_len(total)?;
    w.write_str(&text);
    w.write_str(&password);
    w.write_u32(files.len() as u32);

    if let Err(e) = write_files(&mut w, files, cancel).await {
        w.wipe();
        return Err(e);
    }

    let buf = w.finish();
    debug_assert_eq!(buf.len(), total);
    tracing::debug!(len = buf.len(), "encoded container");
    Ok(buf)
}

async fn write_files(
    w: &mut NoteWriter,
    files: Vec<FileEntry>,
    cancel: &CancellationToken,
) -> SecnoteResult<()> {
    for file in files {
        let (name, size, mut source) = file.into_source();
        w.write_str(&name);
        w.write_u64(size);

        let body = w.tail(size as usize);
        for chunk in body.chunks_mut(STREAM_CHUNK) {
            if cancel.is_cancelled() {
                tracing::debug!(file = %name, "container encoding cancelled");
                return Err(SecnoteError::Cancelled);
            }
            source.read_exact(chunk).await?;
        }
    }
    Ok(())
}

/// Sequential reader that checks remaining length before every field.
struct NoteReader {
    buf: Bytes,
    pos: usize,
}

impl NoteReader {
    fn new(buf: Bytes) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, field: &'static str, len: u64) -> SecnoteResult<Bytes> {
        let available = self.remaining();
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= available)
            .ok_or(SecnoteError::Truncated {
                field,
                needed: len,
                available: available as u64,
            })?;
        let out = self.buf.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(out)
    }

    fn read_u32(&mut self, field: &'static str) -> SecnoteResult<u32> {
        let raw = self.take(field, 4)?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&raw);
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_u64(&mut self, field: &'static str) -> SecnoteResult<u64> {
        let raw = self.take(field, 8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&raw);
        Ok(u64::from_le_bytes(bytes))
    }

    fn read_str(&mut self, len_field: &'static str, field: &'static str) -> SecnoteResult<String> {
        let len = self.read_u32(len_field)?;
        let raw = self.take(field, u64::from(len))?;
        String::from_utf8(raw.to_vec()).map_err(|e| SecnoteError::invalid(field, e.to_string()))
    }
}

/// Reverse [`encode`]. The input is taken as [`Bytes`] so file bodies can be
/// handed out as slices of it.
pub fn decode(buf: impl Into<Bytes>) -> SecnoteResult<DecryptedNote> {
    let mut r = NoteReader::new(buf.into());

    let text = r.read_str("text length", "text")?;
    let password = r.read_str("password length", "password")?;
    let file_count = r.read_u32("file count")?;

    // every file needs at least its header; bound the allocation accordingly
    let mut files = Vec::with_capacity((file_count as usize).min(r.remaining() / FILE_HEADER_LEN));
    for _ in 0..file_count {
        let name = r.read_str("file name length", "file name")?;
        let size = r.read_u64("file size")?;
        if size > MAX_SAFE_INTEGER {
            return Err(SecnoteError::OutOfRange {
                field: "file size",
                value: size,
                limit: MAX_SAFE_INTEGER,
            });
        }
        let data = r.take("file body", size)?;
        files.push(DecodedFile { name, data });
    }

    if r.remaining() > 0 {
        return Err(SecnoteError::invalid(
            "container",
            format!("{} trailing bytes", r.remaining()),
        ));
    }

    tracing::debug!(files = files.len(), "decoded container");
    Ok(DecryptedNote {
        text,
        password,
        files,
    })
}
