// Binary snapshot of a VectorIndex
//
// Layout, all integers little-endian:
//   dimension: u32, count: u32,
//   count x { document_id_len: u32, document_id: utf8,
//             position_index: u32, text_len: u32, text: utf8,
//             vector: f32 x dimension }

#[cfg(test)]
mod tests;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::{IndexEntry, IndexError, VectorIndex};
use crate::embeddings::chunking::{Chunk, DocumentId};

/// Upper bound on entries preallocated from an untrusted header
const MAX_PREALLOCATED_ENTRIES: usize = 4096;
const MAX_DIMENSION: usize = 65_536;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Snapshot ended unexpectedly while reading {0}")]
    Truncated(&'static str),
    #[error("Snapshot contains invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("Snapshot entry {position} contains a non-finite vector value")]
    NonFinite { position: usize },
    #[error("Snapshot entry {position} has an empty document ID")]
    EmptyDocumentId { position: usize },
    #[error("Value for {0} does not fit in the snapshot format")]
    TooLarge(&'static str),
    #[error("Invalid snapshot header: {0}")]
    InvalidHeader(String),
    #[error("Snapshot does not form a valid index: {0}")]
    Index(#[from] IndexError),
}

/// Serialize `index` into `writer`
#[inline]
pub fn write_snapshot<W: Write>(index: &VectorIndex, writer: &mut W) -> Result<(), SnapshotError> {
    write_len(writer, index.dimension(), "dimension")?;
    write_len(writer, index.count(), "count")?;

    for (chunk, vector) in index.entries() {
        write_str(writer, chunk.document_id.as_str(), "document_id")?;
        write_len(writer, chunk.position_index, "position_index")?;
        write_str(writer, &chunk.text, "text")?;
        for value in vector {
            writer.write_all(&value.to_le_bytes())?;
        }
    }

    Ok(())
}

/// Deserialize an index previously written by [`write_snapshot`]
#[inline]
pub fn read_snapshot<R: Read>(reader: &mut R) -> Result<VectorIndex, SnapshotError> {
    let dimension = read_u32(reader, "dimension")?;
    if dimension == 0 || dimension > MAX_DIMENSION {
        return Err(SnapshotError::InvalidHeader(format!(
            "dimension {} outside 1..={}",
            dimension, MAX_DIMENSION
        )));
    }
    let count = read_u32(reader, "count")?;

    let mut entries = Vec::with_capacity(count.min(MAX_PREALLOCATED_ENTRIES));
    for position in 0..count {
        let document_id = read_string(reader, "document_id")?;
        if document_id.trim().is_empty() {
            return Err(SnapshotError::EmptyDocumentId { position });
        }
        let position_index = read_u32(reader, "position_index")?;
        let text = read_string(reader, "text")?;

        let mut vector = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            let value = f32::from_le_bytes(read_array(reader, "vector")?);
            if !value.is_finite() {
                return Err(SnapshotError::NonFinite { position });
            }
            vector.push(value);
        }

        entries.push(IndexEntry {
            chunk: Chunk {
                text,
                position_index,
                document_id: DocumentId::new(document_id),
            },
            vector,
        });
    }

    let mut index = VectorIndex::new(dimension);
    index.add(entries)?;
    Ok(index)
}

/// Write `index` to `path`, replacing any previous snapshot atomically
#[inline]
pub fn save<P: AsRef<Path>>(index: &VectorIndex, path: P) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        write_snapshot(index, &mut writer)?;
        writer.flush()?;
    }
    fs::rename(&temp_path, path)?;

    info!(
        "Saved snapshot with {} entries to {}",
        index.count(),
        path.display()
    );
    Ok(())
}

/// Read a snapshot from `path`
#[inline]
pub fn load<P: AsRef<Path>>(path: P) -> Result<VectorIndex, SnapshotError> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let index = read_snapshot(&mut reader)?;

    debug!(
        "Loaded snapshot with {} entries (dimension {}) from {}",
        index.count(),
        index.dimension(),
        path.display()
    );
    Ok(index)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_len<W: Write>(
    writer: &mut W,
    value: usize,
    field: &'static str,
) -> Result<(), SnapshotError> {
    let value = u32::try_from(value).map_err(|_| SnapshotError::TooLarge(field))?;
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_str<W: Write>(
    writer: &mut W,
    value: &str,
    field: &'static str,
) -> Result<(), SnapshotError> {
    write_len(writer, value.len(), field)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_array<R: Read, const N: usize>(
    reader: &mut R,
    field: &'static str,
) -> Result<[u8; N], SnapshotError> {
    let mut buf = [0_u8; N];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => SnapshotError::Truncated(field),
        _ => SnapshotError::Io(e),
    })?;
    Ok(buf)
}

fn read_u32<R: Read>(reader: &mut R, field: &'static str) -> Result<usize, SnapshotError> {
    let value = u32::from_le_bytes(read_array(reader, field)?);
    usize::try_from(value).map_err(|_| SnapshotError::TooLarge(field))
}

fn read_string<R: Read>(reader: &mut R, field: &'static str) -> Result<String, SnapshotError> {
    let len = read_u32(reader, field)?;
    let mut bytes = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(SnapshotError::Truncated(field));
    }
    String::from_utf8(bytes).map_err(|_| SnapshotError::InvalidUtf8(field))
}
