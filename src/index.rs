//! Per-document index construction, serialization, and merging.
//!
//! Each uploaded document gets its own in-RAM tantivy index with three stored
//! fields: `document_id` and `file_name` (raw, not tokenized) and `content`
//! (tokenized for scoring). Before persistence the index's internal file set
//! is flattened into a single framed byte stream; deserialization reverses
//! the transform into a queryable index.
//!
//! Frame layout: 1-byte entry count, then per entry a 2-byte big-endian name
//! length, the name bytes, a 4-byte big-endian content length, and the
//! content bytes, in enumeration order. The single count byte caps an index
//! at 255 internal entries; exceeding it is an explicit error rather than a
//! corrupted stream.

use std::path::{Path, PathBuf};

use tantivy::collector::DocSetCollector;
use tantivy::directory::error::OpenReadError;
use tantivy::directory::{Directory, RamDirectory};
use tantivy::query::AllQuery;
use tantivy::schema::{Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexWriter, TantivyDocument};
use thiserror::Error;
use tracing::warn;

/// Stored, untokenized document identifier field.
pub const DOCUMENT_ID_FIELD: &str = "document_id";
/// Stored, untokenized file name field.
pub const FILE_NAME_FIELD: &str = "file_name";
/// Stored, tokenized content field queries run against.
pub const CONTENT_FIELD: &str = "content";

/// Maximum internal entries a serialized index can carry (single count byte).
pub const MAX_SERIALIZED_ENTRIES: usize = 255;

/// Memory budget handed to tantivy index writers.
const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// The name of the index metadata file, always serialized first.
const META_FILE: &str = "meta.json";

/// Errors from index construction and (de)serialization.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Engine(#[from] tantivy::TantivyError),

    #[error("failed to read internal entry {name}: {source}")]
    EntryRead {
        name: String,
        #[source]
        source: OpenReadError,
    },

    #[error("failed to write internal entry {name}: {source}")]
    EntryWrite {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("index has {0} internal entries, exceeding the 255 limit of the serial format")]
    TooManyEntries(usize),

    #[error("internal entry {0} is too large for the serial format")]
    OversizedEntry(String),

    #[error("serialized index is corrupt: {0}")]
    CorruptStream(&'static str),
}

/// One internal file of a per-document index.
#[derive(Debug)]
struct IndexEntry {
    name: String,
    bytes: Vec<u8>,
}

/// The schema shared by every per-document index and by merged indexes.
pub fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field(DOCUMENT_ID_FIELD, STRING | STORED);
    builder.add_text_field(FILE_NAME_FIELD, STRING | STORED);
    builder.add_text_field(CONTENT_FIELD, TEXT | STORED);
    builder.build()
}

/// Build a single-document index over the extracted text.
pub fn build_index(document_id: &str, file_name: &str, content: &str) -> Result<Index, IndexError> {
    let schema = build_schema();
    let index = Index::create_in_ram(schema.clone());

    let document_id_field = schema.get_field(DOCUMENT_ID_FIELD)?;
    let file_name_field = schema.get_field(FILE_NAME_FIELD)?;
    let content_field = schema.get_field(CONTENT_FIELD)?;

    let mut writer: IndexWriter = index.writer(WRITER_MEMORY_BUDGET)?;
    writer.add_document(doc!(
        document_id_field => document_id,
        file_name_field => file_name,
        content_field => content,
    ))?;
    writer.commit()?;

    Ok(index)
}

/// Flatten an index's internal file set into one framed byte stream.
///
/// The metadata file is emitted first, then every existing segment file in
/// sorted order.
pub fn serialize_index(index: &Index) -> Result<Vec<u8>, IndexError> {
    let directory = index.directory();
    let mut entries = Vec::new();

    let meta = directory
        .atomic_read(Path::new(META_FILE))
        .map_err(|source| IndexError::EntryRead {
            name: META_FILE.to_string(),
            source,
        })?;
    entries.push(IndexEntry {
        name: META_FILE.to_string(),
        bytes: meta,
    });

    for segment in index.searchable_segment_metas()? {
        let mut files: Vec<PathBuf> = segment.list_files().into_iter().collect();
        files.sort();
        for path in files {
            let exists = directory
                .exists(&path)
                .map_err(|source| IndexError::EntryRead {
                    name: path.display().to_string(),
                    source,
                })?;
            if !exists {
                continue;
            }
            let name = path.display().to_string();
            let bytes = directory
                .open_read(&path)
                .and_then(|slice| {
                    slice
                        .read_bytes()
                        .map_err(|e| OpenReadError::wrap_io_error(e, path.clone()))
                })
                .map_err(|source| IndexError::EntryRead {
                    name: name.clone(),
                    source,
                })?;
            entries.push(IndexEntry {
                name,
                bytes: bytes.as_slice().to_vec(),
            });
        }
    }

    frame_entries(&entries)
}

/// Rebuild a queryable index from a framed byte stream.
pub fn deserialize_index(data: &[u8]) -> Result<Index, IndexError> {
    let entries = parse_entries(data)?;
    let directory = RamDirectory::create();
    for entry in &entries {
        directory
            .atomic_write(Path::new(&entry.name), &entry.bytes)
            .map_err(|source| IndexError::EntryWrite {
                name: entry.name.clone(),
                source,
            })?;
    }
    Ok(Index::open(directory)?)
}

/// Combine per-document indexes into one ephemeral in-RAM index.
///
/// Merging is best-effort: a member index that cannot be read is skipped with
/// a logged warning rather than failing the whole merge. tantivy has no
/// directory-level index concatenation, so the merge re-adds each member's
/// stored documents; every field is stored, which makes the rebuild lossless.
pub fn merge_indexes(indexes: &[Index]) -> Result<Index, IndexError> {
    let schema = build_schema();
    let merged = Index::create_in_ram(schema.clone());
    let mut writer: IndexWriter = merged.writer(WRITER_MEMORY_BUDGET)?;

    for (position, index) in indexes.iter().enumerate() {
        if let Err(error) = append_stored_documents(&mut writer, index, &schema) {
            warn!(member = position, %error, "skipping index that failed to merge");
        }
    }

    writer.commit()?;
    Ok(merged)
}

/// Re-add every stored document of `index` through `writer`.
fn append_stored_documents(
    writer: &mut IndexWriter,
    index: &Index,
    merged_schema: &Schema,
) -> Result<(), IndexError> {
    let source_schema = index.schema();
    let src_id = source_schema.get_field(DOCUMENT_ID_FIELD)?;
    let src_name = source_schema.get_field(FILE_NAME_FIELD)?;
    let src_content = source_schema.get_field(CONTENT_FIELD)?;

    let dst_id = merged_schema.get_field(DOCUMENT_ID_FIELD)?;
    let dst_name = merged_schema.get_field(FILE_NAME_FIELD)?;
    let dst_content = merged_schema.get_field(CONTENT_FIELD)?;

    let reader = index.reader()?;
    let searcher = reader.searcher();
    let mut addresses: Vec<_> = searcher
        .search(&AllQuery, &DocSetCollector)?
        .into_iter()
        .collect();
    addresses.sort_by_key(|a| (a.segment_ord, a.doc_id));

    for address in addresses {
        let document: TantivyDocument = searcher.doc(address)?;
        let id = stored_str(&document, src_id);
        let name = stored_str(&document, src_name);
        let content = stored_str(&document, src_content);
        writer.add_document(doc!(
            dst_id => id,
            dst_name => name,
            dst_content => content,
        ))?;
    }
    Ok(())
}

/// Read a stored text field, defaulting to empty.
fn stored_str(document: &TantivyDocument, field: tantivy::schema::Field) -> String {
    document
        .get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn frame_entries(entries: &[IndexEntry]) -> Result<Vec<u8>, IndexError> {
    if entries.len() > MAX_SERIALIZED_ENTRIES {
        return Err(IndexError::TooManyEntries(entries.len()));
    }

    let mut out = Vec::new();
    out.push(entries.len() as u8);
    for entry in entries {
        let name = entry.name.as_bytes();
        if name.len() > u16::MAX as usize || entry.bytes.len() > u32::MAX as usize {
            return Err(IndexError::OversizedEntry(entry.name.clone()));
        }
        out.extend_from_slice(&(name.len() as u16).to_be_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(&(entry.bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&entry.bytes);
    }
    Ok(out)
}

fn parse_entries(data: &[u8]) -> Result<Vec<IndexEntry>, IndexError> {
    let mut offset = 0usize;
    let count = *data
        .first()
        .ok_or(IndexError::CorruptStream("missing entry count"))? as usize;
    offset += 1;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let name_len = read_be_u16(data, &mut offset)? as usize;
        let name_bytes = read_slice(data, &mut offset, name_len)?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| IndexError::CorruptStream("entry name is not UTF-8"))?
            .to_string();

        let content_len = read_be_u32(data, &mut offset)? as usize;
        let bytes = read_slice(data, &mut offset, content_len)?.to_vec();
        entries.push(IndexEntry { name, bytes });
    }

    if offset != data.len() {
        return Err(IndexError::CorruptStream("trailing bytes after last entry"));
    }
    Ok(entries)
}

fn read_be_u16(data: &[u8], offset: &mut usize) -> Result<u16, IndexError> {
    let bytes = read_slice(data, offset, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_be_u32(data: &[u8], offset: &mut usize) -> Result<u32, IndexError> {
    let bytes = read_slice(data, offset, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_slice<'a>(data: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8], IndexError> {
    let end = offset
        .checked_add(len)
        .ok_or(IndexError::CorruptStream("length overflow"))?;
    if end > data.len() {
        return Err(IndexError::CorruptStream("entry extends past end of data"));
    }
    let slice = &data[*offset..end];
    *offset = end;
    Ok(slice)
}
