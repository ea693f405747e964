//! SQLite snapshot of a [`VectorIndex`].
//!
//! The snapshot is one SQLite file, `index.sqlite`, inside the configured
//! index directory. Saves go to `index.sqlite.tmp` and are renamed into
//! place after the transaction commits, so a crash mid-save never leaves a
//! half-written `index.sqlite`. Loads check the file length against the
//! SQLite header, verify a SHA-256 checksum over every stored row, and
//! cross-check the recorded document count, dimensionality and embedder.
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{Document, IndexEntry, MetadataValue, VectorIndex};
use crate::embedder::Embedder;
use crate::error::{RagError, Result};

pub const INDEX_FILE: &str = "index.sqlite";
const TEMP_FILE: &str = "index.sqlite.tmp";
const FORMAT_VERSION: &str = "2";
const SQLITE_HEADER_LEN: usize = 100;
const METRIC: &str = "cosine";

const SCHEMA_SQL: &str = r#"
CREATE TABLE meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE documents (
    position INTEGER PRIMARY KEY,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB NOT NULL
);
"#;

/// Result of checking the index directory for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLocation {
    /// A completed snapshot exists at this path.
    Present(PathBuf),
    /// No snapshot; a save would write to this path.
    Absent(PathBuf),
}

/// Check whether a completed snapshot exists in `dir`.
///
/// Only the final file counts; a stale temp file from an interrupted save
/// is ignored.
pub fn probe(dir: &Path) -> IndexLocation {
    let path = dir.join(INDEX_FILE);
    if path.is_file() {
        IndexLocation::Present(path)
    } else {
        IndexLocation::Absent(path)
    }
}

/// Serialize a float32 vector into little-endian bytes.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        bytemuck::cast_slice(vec).to_vec()
    } else {
        vec.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// Running SHA-256 over snapshot rows, in position order.
#[derive(Default)]
struct RowChecksum(Sha256);

impl RowChecksum {
    fn add(&mut self, position: usize, content: &str, metadata: &str, embedding: &[u8]) {
        self.0.update((position as u64).to_le_bytes());
        for field in [content.as_bytes(), metadata.as_bytes(), embedding] {
            self.0.update((field.len() as u64).to_le_bytes());
            self.0.update(field);
        }
    }

    fn finish(self) -> String {
        format!("{:x}", self.0.finalize())
    }
}

/// Compare the file length with the page count recorded in its header.
///
/// SQLite reads past the end of a short file as zeros, so a snapshot cut
/// inside its last page can otherwise pass `quick_check`.
fn check_file_length(path: &Path) -> std::result::Result<(), String> {
    let mut file = File::open(path).map_err(|e| e.to_string())?;
    let len = file.metadata().map_err(|e| e.to_string())?.len();

    let mut header = [0u8; SQLITE_HEADER_LEN];
    if len < SQLITE_HEADER_LEN as u64 {
        return Err(format!("file is {len} bytes, shorter than a SQLite header"));
    }
    file.read_exact(&mut header).map_err(|e| e.to_string())?;

    let page_size = match u16::from_be_bytes([header[16], header[17]]) {
        1 => 65536,
        n => u64::from(n),
    };
    let page_count = u64::from(u32::from_be_bytes([header[28], header[29], header[30], header[31]]));
    let change_counter = &header[24..28];
    let valid_for = &header[92..96];

    if change_counter != valid_for {
        return Err("header page count is stale".to_string());
    }
    if page_count == 0 || len != page_size * page_count {
        return Err(format!(
            "file is {len} bytes but header records {page_count} pages of {page_size} bytes"
        ));
    }
    Ok(())
}

/// Inverse of [`serialize_vector`]. `None` if the blob length is not a
/// multiple of four.
pub fn deserialize_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(bytemuck::pod_read_unaligned(c)))
            .collect(),
    )
}

/// Write `index` to `dir`, replacing any previous snapshot.
pub fn save(index: &VectorIndex, dir: &Path) -> Result<PathBuf> {
    let save_err = |e: &dyn std::fmt::Display| RagError::IndexBuild(format!("save failed: {e}"));

    fs::create_dir_all(dir).map_err(|e| save_err(&e))?;

    let tmp_path = dir.join(TEMP_FILE);
    let final_path = dir.join(INDEX_FILE);

    if tmp_path.exists() {
        fs::remove_file(&tmp_path).map_err(|e| save_err(&e))?;
    }

    {
        let mut conn = Connection::open(&tmp_path).map_err(|e| save_err(&e))?;
        write_snapshot(&mut conn, index).map_err(|e| save_err(&e))?;
        conn.close().map_err(|(_, e)| save_err(&e))?;
    }

    fs::rename(&tmp_path, &final_path).map_err(|e| save_err(&e))?;

    info!(
        path = %final_path.display(),
        documents = index.len(),
        "Saved vector index"
    );
    Ok(final_path)
}

fn write_snapshot(conn: &mut Connection, index: &VectorIndex) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;

    let mut checksum = RowChecksum::default();
    {
        let mut insert =
            tx.prepare("INSERT INTO documents (position, content, metadata, embedding) VALUES (?, ?, ?, ?)")?;
        for (position, entry) in index.entries().iter().enumerate() {
            let metadata = serde_json::to_string(&entry.document.metadata)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            let embedding = serialize_vector(&entry.vector);
            checksum.add(position, &entry.document.content, &metadata, &embedding);
            insert.execute(params![
                position as i64,
                entry.document.content,
                metadata,
                embedding,
            ])?;
        }
    }

    let meta = [
        ("format_version", FORMAT_VERSION.to_string()),
        ("metric", METRIC.to_string()),
        ("dimensions", index.dimensions().to_string()),
        ("embedder", index.embedder_name().to_string()),
        ("corpus_fingerprint", index.corpus_fingerprint().to_string()),
        ("checksum", checksum.finish()),
        ("created_at", Utc::now().to_rfc3339()),
        // Written last; a snapshot without it is incomplete
        ("document_count", index.len().to_string()),
    ];
    for (key, value) in meta {
        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
    }

    tx.commit()
}

/// Load a snapshot from `dir` and validate it against `embedder`.
pub fn load(dir: &Path, embedder: &dyn Embedder) -> Result<VectorIndex> {
    let path = match probe(dir) {
        IndexLocation::Present(path) => path,
        IndexLocation::Absent(path) => {
            return Err(RagError::IndexLoad(format!(
                "no index at {}",
                path.display()
            )));
        }
    };

    let load_err = |e: &dyn std::fmt::Display| {
        RagError::IndexLoad(format!("{}: {e}", path.display()))
    };

    check_file_length(&path).map_err(|e| load_err(&e))?;

    let conn = Connection::open_with_flags(
        &path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| load_err(&e))?;

    let check: String = conn
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|e| load_err(&e))?;
    if check != "ok" {
        return Err(load_err(&format!("integrity check failed: {check}")));
    }

    let meta = |key: &str| -> Result<String> {
        conn.query_row("SELECT value FROM meta WHERE key = ?", [key], |row| row.get(0))
            .optional()
            .map_err(|e| load_err(&e))?
            .ok_or_else(|| load_err(&format!("missing meta key {key}")))
    };

    let version = meta("format_version")?;
    if version != FORMAT_VERSION {
        return Err(load_err(&format!("unsupported format version {version}")));
    }

    let dimensions = meta("dimensions")?
        .parse::<usize>()
        .map_err(|e| load_err(&e))?;
    if dimensions != embedder.dimensions() {
        return Err(load_err(&format!(
            "stored dimension {dimensions} does not match embedder dimension {}",
            embedder.dimensions()
        )));
    }

    let embedder_name = meta("embedder")?;
    if embedder_name != embedder.name() {
        return Err(load_err(&format!(
            "index was built with embedder {embedder_name}, current embedder is {}",
            embedder.name()
        )));
    }

    let expected = meta("document_count")?
        .parse::<usize>()
        .map_err(|e| load_err(&e))?;
    let recorded_checksum = meta("checksum")?;
    let fingerprint = meta("corpus_fingerprint")?;

    let mut stmt = conn
        .prepare("SELECT content, metadata, embedding FROM documents ORDER BY position")
        .map_err(|e| load_err(&e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })
        .map_err(|e| load_err(&e))?;

    let mut entries = Vec::new();
    let mut checksum = RowChecksum::default();
    for (position, row) in rows.enumerate() {
        let (content, raw_metadata, blob) = row.map_err(|e| load_err(&e))?;
        checksum.add(position, &content, &raw_metadata, &blob);
        let metadata: BTreeMap<String, MetadataValue> =
            serde_json::from_str(&raw_metadata).map_err(|e| load_err(&e))?;
        let vector = deserialize_vector(&blob)
            .filter(|v| v.len() == dimensions)
            .ok_or_else(|| {
                load_err(&format!(
                    "document {position} has a {}-byte vector, expected {}",
                    blob.len(),
                    dimensions * 4
                ))
            })?;
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(load_err(&format!(
                "document {position} has a non-finite vector component"
            )));
        }
        entries.push(IndexEntry {
            document: Document { content, metadata },
            vector,
        });
    }

    if entries.len() != expected || expected == 0 {
        return Err(load_err(&format!(
            "snapshot records {expected} documents but holds {}",
            entries.len()
        )));
    }

    if checksum.finish() != recorded_checksum {
        return Err(load_err(&"row checksum does not match"));
    }

    debug!(documents = entries.len(), dimensions, "Read index snapshot");
    info!(path = %path.display(), documents = entries.len(), "Loaded vector index");

    Ok(VectorIndex::from_entries(
        entries,
        dimensions,
        embedder_name,
        fingerprint,
    ))
}
