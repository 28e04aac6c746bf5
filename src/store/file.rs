//! File-backed vector store.
//!
//! File format: records.bin
//!
//! Header (13 bytes):
//! - magic: [u8; 4] (`PICS`)
//! - version: u8 (1)
//! - dimensions: u32 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Records (appended, repeated):
//! - payload_len: u32 (little-endian)
//! - checksum: u32 (CRC32 of payload)
//! - payload:
//!   - file_name_len: u16, file_name: UTF-8
//!   - path_len: u32, path: UTF-8
//!   - ingested_at: i64 (unix millis)
//!   - embedding: [f32; dimensions] (little-endian)

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::memory::MemoryVectorStore;
use super::{RecordMetadata, SearchHit, StoreError, StoredRecord, VectorStore};

const MAGIC: [u8; 4] = *b"PICS";

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size in bytes: magic(4) + version(1) + dimensions(4) + checksum(4)
const HEADER_SIZE: usize = 13;

/// Upper bound for a single record payload, guards against garbage lengths
const MAX_PAYLOAD: u32 = 64 * 1024 * 1024;

/// Append-only store persisted to a single file.
///
/// All records are replayed into memory on open; each insert is appended
/// and synced before it becomes visible to searches.
pub struct FileVectorStore {
    path: PathBuf,
    memory: MemoryVectorStore,
}

impl FileVectorStore {
    /// Open the store at `path`, loading existing records.
    ///
    /// A missing file is not an error; it is created on first insert.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let memory = if path.exists() {
            let memory = Self::load(&path)?;
            log::info!("Loaded {} records from {}", memory.len(), path.display());
            memory
        } else {
            log::info!("No existing store at {}, starting fresh", path.display());
            MemoryVectorStore::new()
        };

        Ok(Self { path, memory })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<MemoryVectorStore, StoreError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let dimensions = match read_header(&mut reader)? {
            Some(dimensions) => dimensions,
            None => return Ok(MemoryVectorStore::new()),
        };
        let mut memory = MemoryVectorStore::with_dimensions(dimensions);
        let mut valid_len = HEADER_SIZE as u64;
        let mut torn = false;

        loop {
            let mut frame = [0u8; 8];
            match read_full(&mut reader, &mut frame)? {
                0 => break,
                8 => {}
                _ => {
                    torn = true;
                    break;
                }
            }

            let payload_len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
            let checksum = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
            if payload_len > MAX_PAYLOAD {
                return Err(StoreError::InvalidFormat(format!(
                    "record length {payload_len} exceeds limit"
                )));
            }

            let mut payload = vec![0u8; payload_len as usize];
            if read_full(&mut reader, &mut payload)? != payload.len() {
                torn = true;
                break;
            }
            if crc32fast::hash(&payload) != checksum {
                return Err(StoreError::ChecksumMismatch);
            }

            let record = decode_record(&payload, dimensions)?;
            memory.insert(record)?;
            valid_len += 8 + payload_len as u64;
        }

        // An interrupted append leaves a partial record; cut it so later appends stay aligned
        if torn {
            log::warn!(
                "Dropping torn record at end of {} (keeping {valid_len} bytes)",
                path.display()
            );
            drop(reader);
            OpenOptions::new().write(true).open(path)?.set_len(valid_len)?;
        }

        Ok(memory)
    }

    fn append(&self, record: &StoredRecord) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let is_new = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);

        if is_new {
            write_header(&mut writer, record.embedding.len())?;
        }

        let payload = encode_record(record)?;
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
        writer.write_all(&payload)?;

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(ErrorKind::Other, e))?;
        file.sync_data()?;

        Ok(())
    }
}

impl VectorStore for FileVectorStore {
    fn insert(&mut self, record: StoredRecord) -> Result<(), StoreError> {
        self.memory.check(&record.embedding)?;
        self.append(&record)?;
        self.memory.insert(record)
    }

    fn search(
        &self,
        vector: &[f32],
        candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        self.memory.search(vector, candidate_pool, limit)
    }

    fn find(&self, file_name: &str) -> Result<Option<StoredRecord>, StoreError> {
        self.memory.find(file_name)
    }

    fn len(&self) -> usize {
        self.memory.len()
    }
}

/// Returns `None` for an empty file.
fn read_header(reader: &mut impl Read) -> Result<Option<usize>, StoreError> {
    let mut header = [0u8; HEADER_SIZE];
    match read_full(reader, &mut header)? {
        0 => return Ok(None),
        HEADER_SIZE => {}
        n => {
            return Err(StoreError::InvalidFormat(format!(
                "header truncated at {n} bytes"
            )))
        }
    }

    if header[0..4] != MAGIC {
        return Err(StoreError::InvalidFormat("bad magic bytes".to_string()));
    }

    let version = header[4];
    if version != FORMAT_VERSION {
        return Err(StoreError::VersionMismatch(version, FORMAT_VERSION));
    }

    let stored_checksum = u32::from_le_bytes([header[9], header[10], header[11], header[12]]);
    if crc32fast::hash(&header[..9]) != stored_checksum {
        return Err(StoreError::ChecksumMismatch);
    }

    let dimensions = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);
    if dimensions == 0 {
        return Err(StoreError::InvalidFormat("zero dimensions".to_string()));
    }

    Ok(Some(dimensions as usize))
}

fn write_header(writer: &mut impl Write, dimensions: usize) -> Result<(), StoreError> {
    let dimensions = u32::try_from(dimensions)
        .map_err(|_| StoreError::InvalidFormat(format!("too many dimensions: {dimensions}")))?;

    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(&MAGIC);
    header.push(FORMAT_VERSION);
    header.extend_from_slice(&dimensions.to_le_bytes());
    let checksum = crc32fast::hash(&header);
    header.extend_from_slice(&checksum.to_le_bytes());

    writer.write_all(&header)?;
    Ok(())
}

fn encode_record(record: &StoredRecord) -> Result<Vec<u8>, StoreError> {
    let name = record.file_name.as_bytes();
    let path = record.metadata.path.as_bytes();
    let name_len = u16::try_from(name.len())
        .map_err(|_| StoreError::InvalidFormat("file name too long".to_string()))?;
    let path_len = u32::try_from(path.len())
        .map_err(|_| StoreError::InvalidFormat("path too long".to_string()))?;

    let mut payload =
        Vec::with_capacity(2 + name.len() + 4 + path.len() + 8 + record.embedding.len() * 4);
    payload.extend_from_slice(&name_len.to_le_bytes());
    payload.extend_from_slice(name);
    payload.extend_from_slice(&path_len.to_le_bytes());
    payload.extend_from_slice(path);
    payload.extend_from_slice(&record.metadata.ingested_at.timestamp_millis().to_le_bytes());
    for value in &record.embedding {
        payload.extend_from_slice(&value.to_le_bytes());
    }

    Ok(payload)
}

fn decode_record(payload: &[u8], dimensions: usize) -> Result<StoredRecord, StoreError> {
    let mut cursor = Cursor { data: payload, pos: 0 };

    let name_len = u16::from_le_bytes(cursor.array()?) as usize;
    let file_name = cursor.string(name_len)?;
    let path_len = u32::from_le_bytes(cursor.array()?) as usize;
    let path = cursor.string(path_len)?;
    let millis = i64::from_le_bytes(cursor.array()?);
    let ingested_at = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidFormat(format!("bad timestamp {millis}")))?;

    let mut embedding = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        embedding.push(f32::from_le_bytes(cursor.array()?));
    }

    if cursor.pos != payload.len() {
        return Err(StoreError::InvalidFormat(format!(
            "{} trailing bytes in record",
            payload.len() - cursor.pos
        )));
    }

    Ok(StoredRecord {
        file_name,
        embedding,
        metadata: RecordMetadata { path, ingested_at },
    })
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], StoreError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| StoreError::InvalidFormat("record truncated".to_string()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], StoreError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn string(&mut self, len: usize) -> Result<String, StoreError> {
        String::from_utf8(self.take(len)?.to_vec())
            .map_err(|e| StoreError::InvalidFormat(format!("invalid utf-8: {e}")))
    }
}

/// Like `read_exact`, but reports how many bytes were read before EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(name: &str, embedding: Vec<f32>) -> StoredRecord {
        StoredRecord {
            file_name: name.to_string(),
            embedding,
            metadata: RecordMetadata {
                path: format!("/pictures/{name}"),
                ingested_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            },
        }
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVectorStore::open(dir.path().join("records.bin")).unwrap();

        assert!(store.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.bin");

        {
            let mut store = FileVectorStore::open(&path).unwrap();
            store.insert(record("beach.jpg", vec![1.0, 0.0, 0.5])).unwrap();
            store.insert(record("forest.png", vec![0.0, 1.0, 0.5])).unwrap();
            store.insert(record("beach.jpg", vec![0.5, 0.5, 0.5])).unwrap();
        }

        let store = FileVectorStore::open(&path).unwrap();
        assert_eq!(store.len(), 3);

        let found = store.find("forest.png").unwrap().unwrap();
        assert_eq!(found, record("forest.png", vec![0.0, 1.0, 0.5]));

        let hits = store.search(&[1.0, 0.0, 0.5], 100, 1).unwrap();
        assert_eq!(hits[0].file_name, "beach.jpg");
    }

    #[test]
    fn test_dimension_mismatch_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.bin");

        let mut store = FileVectorStore::open(&path).unwrap();
        store.insert(record("a.jpg", vec![1.0, 0.0])).unwrap();
        let len_before = std::fs::metadata(&path).unwrap().len();

        let result = store.insert(record("b.jpg", vec![1.0, 0.0, 0.0]));
        assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len_before);
    }

    #[test]
    fn test_corrupted_record_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.bin");

        {
            let mut store = FileVectorStore::open(&path).unwrap();
            store.insert(record("a.jpg", vec![1.0, 0.0])).unwrap();
        }

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let result = FileVectorStore::open(&path);
        assert!(matches!(result, Err(StoreError::ChecksumMismatch)));
    }

    #[test]
    fn test_torn_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.bin");

        {
            let mut store = FileVectorStore::open(&path).unwrap();
            store.insert(record("a.jpg", vec![1.0, 0.0])).unwrap();
            store.insert(record("b.jpg", vec![0.0, 1.0])).unwrap();
        }

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let mut store = FileVectorStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);

        store.insert(record("c.jpg", vec![1.0, 1.0])).unwrap();
        let store = FileVectorStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.find("c.jpg").unwrap().is_some());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.bin");
        std::fs::write(&path, b"NOPE\x01\x02\x00\x00\x00\x00\x00\x00\x00").unwrap();

        let result = FileVectorStore::open(&path);
        assert!(matches!(result, Err(StoreError::InvalidFormat(_))));
    }
}
