//! Streaming conversion of an import file into size-bounded chunks.
//!
//! [`StreamingChunker`] is a pull iterator: each `next()` reads just enough
//! of the input to fill one chunk. Records are validated structurally as
//! they are read; full validation happens when a chunk is applied.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use ledger_types::{ImportChunk, Ledger, LedgerEntry, LedgerKey, LedgerToEntries};

use crate::config::ChunkConfig;
use crate::json_stream::JsonArrayStream;

/// Accepted names of the record array.
pub const RECORD_FIELDS: &[&str] = &["ledgerToEntries", "ledger_to_entries"];

/// Record shape as it appears in the file, before structural checks.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLedgerToEntries {
    #[serde(default, alias = "ledger_key")]
    ledger_key: Option<LedgerKey>,
    #[serde(default)]
    ledger: Option<Ledger>,
    #[serde(default)]
    entries: Option<Vec<Option<LedgerEntry>>>,
}

impl RawLedgerToEntries {
    fn into_record(self) -> Result<LedgerToEntries> {
        let key = self.ledger_key.ok_or_else(|| anyhow!("ledger key is nil"))?;
        if key.nft_id.is_empty() {
            return Err(anyhow!("ledger key NftId is empty"));
        }
        if key.asset_class_id.is_empty() {
            return Err(anyhow!("ledger key AssetClassId is empty"));
        }
        let entries = self
            .entries
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.ok_or_else(|| anyhow!("entry at index {} is nil", i)))
            .collect::<Result<Vec<_>>>()?;
        Ok(LedgerToEntries::new(key, self.ledger, entries))
    }
}

/// Position in the record array: the first `records` records are fully
/// imported, as are the ledger and first `entries` entries of the next one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCursor {
    pub records: usize,
    pub entries: usize,
}

impl RecordCursor {
    pub fn new(records: usize, entries: usize) -> Self {
        Self { records, entries }
    }

    pub fn is_start(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for RecordCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {} entry {}", self.records, self.entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResumeState {
    Off,
    Seeking(String),
    Skipping(RecordCursor),
    Found,
}

pub struct StreamingChunker<R: BufRead> {
    stream: JsonArrayStream<R>,
    max_chunk_size_bytes: usize,
    resume: ResumeState,
    current: Vec<LedgerToEntries>,
    current_size: usize,
    /// Serialized size of an empty chunk.
    overhead: usize,
    records_read: usize,
    total_ledgers: usize,
    total_entries: usize,
    finished: bool,
}

impl StreamingChunker<BufReader<File>> {
    pub fn open_file(path: &Path, config: &ChunkConfig, resume_from: Option<&str>) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::new(BufReader::new(file), config, resume_from)
    }
}

impl<R: BufRead> StreamingChunker<R> {
    pub fn new(reader: R, config: &ChunkConfig, resume_from: Option<&str>) -> Result<Self> {
        let stream = JsonArrayStream::open(reader, RECORD_FIELDS)?;
        let overhead = ImportChunk::default().size_bytes()?;
        let resume = match resume_from {
            Some(id) if !id.is_empty() => ResumeState::Seeking(id.to_string()),
            _ => ResumeState::Off,
        };
        Ok(Self {
            stream,
            max_chunk_size_bytes: config.max_chunk_size_bytes,
            resume,
            current: Vec::new(),
            current_size: overhead,
            overhead,
            records_read: 0,
            total_ledgers: 0,
            total_entries: 0,
            finished: false,
        })
    }

    /// Resume at a record position instead of a correlation id. This also
    /// skips committed records that carry no entries.
    pub fn resume_at(mut self, cursor: RecordCursor) -> Self {
        self.resume = if cursor.is_start() {
            ResumeState::Off
        } else {
            ResumeState::Skipping(cursor)
        };
        self
    }

    /// Records and entries accepted so far, including those in a chunk not
    /// yet returned.
    pub fn totals(&self) -> (usize, usize) {
        (self.total_ledgers, self.total_entries)
    }

    fn decode(&self, raw: &[u8]) -> Result<LedgerToEntries> {
        let index = self.records_read;
        let parsed: RawLedgerToEntries = serde_json::from_slice(raw)
            .map_err(|e| anyhow!("failed to decode LedgerToEntries at index {}: {}", index, e))?;
        parsed
            .into_record()
            .map_err(|e| anyhow!("invalid LedgerToEntries at index {}: {}", index, e))
    }

    /// Drop everything before the resume point. `ordinal` is the record's
    /// position in the input.
    fn apply_resume(&mut self, ordinal: usize, mut record: LedgerToEntries) -> Result<Option<LedgerToEntries>> {
        let skip = match &self.resume {
            ResumeState::Off | ResumeState::Found => return Ok(Some(record)),
            ResumeState::Seeking(id) => match record.entries.iter().position(|e| &e.correlation_id == id) {
                Some(pos) => pos + 1,
                None => return Ok(None),
            },
            ResumeState::Skipping(cursor) => {
                if ordinal < cursor.records {
                    return Ok(None);
                }
                if cursor.entries > record.entries.len() {
                    return Err(anyhow!(
                        "resume point {} is past the end of LedgerToEntries at index {} ({} entries)",
                        cursor,
                        ordinal,
                        record.entries.len()
                    ));
                }
                cursor.entries
            }
        };

        info!(
            record = ordinal,
            skipped_entries = skip,
            ledger = %record.ledger_key,
            "resume point found"
        );
        self.resume = ResumeState::Found;
        if skip == 0 {
            return Ok(Some(record));
        }
        // The ledger was created with the entries already imported.
        record.ledger = None;
        record.entries.drain(..skip);
        if record.entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(record))
        }
    }

    /// Add a record; returns the sealed chunk when the record did not fit.
    fn push(&mut self, record: LedgerToEntries) -> Result<Option<ImportChunk>> {
        let size = serde_json::to_vec(&record)?.len();
        self.total_ledgers += 1;
        self.total_entries += record.entries.len();

        let separator = usize::from(!self.current.is_empty());
        if !self.current.is_empty() && self.current_size + separator + size > self.max_chunk_size_bytes {
            let sealed = self.seal();
            self.current_size += size;
            self.current.push(record);
            return Ok(sealed);
        }

        self.current_size += separator + size;
        self.current.push(record);
        Ok(None)
    }

    fn seal(&mut self) -> Option<ImportChunk> {
        if self.current.is_empty() {
            return None;
        }
        let chunk = ImportChunk::new(std::mem::take(&mut self.current));
        debug!(
            records = chunk.ledger_count(),
            entries = chunk.entry_count(),
            bytes = self.current_size,
            "chunk sealed"
        );
        self.current_size = self.overhead;
        Some(chunk)
    }

    fn next_chunk(&mut self) -> Result<Option<ImportChunk>> {
        loop {
            let Some(raw) = self.stream.next_raw()? else {
                match &self.resume {
                    ResumeState::Seeking(id) => {
                        return Err(anyhow!("resume correlation id {:?} not found in input", id));
                    }
                    // Every record was already imported.
                    ResumeState::Skipping(cursor) if cursor.records == self.records_read && cursor.entries == 0 => {}
                    ResumeState::Skipping(cursor) => {
                        return Err(anyhow!(
                            "resume point {} is past the end of input ({} records)",
                            cursor,
                            self.records_read
                        ));
                    }
                    ResumeState::Off | ResumeState::Found => {}
                }
                return Ok(self.seal());
            };

            let ordinal = self.records_read;
            let record = self.decode(&raw)?;
            self.records_read += 1;

            let Some(record) = self.apply_resume(ordinal, record)? else {
                continue;
            };
            if let Some(chunk) = self.push(record)? {
                return Ok(Some(chunk));
            }
        }
    }
}

impl<R: BufRead> Iterator for StreamingChunker<R> {
    type Item = Result<ImportChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkedResult {
    pub chunks: Vec<ImportChunk>,
    pub total_ledgers: usize,
    pub total_entries: usize,
}

impl ChunkedResult {
    pub fn from_chunks(chunks: Vec<ImportChunk>) -> Self {
        let total_ledgers = chunks.iter().map(ImportChunk::ledger_count).sum();
        let total_entries = chunks.iter().map(ImportChunk::entry_count).sum();
        Self {
            chunks,
            total_ledgers,
            total_entries,
        }
    }
}

/// Chunk a whole input. Any error discards the partial result.
pub fn process<R: BufRead>(reader: R, config: &ChunkConfig, resume_from: Option<&str>) -> Result<ChunkedResult> {
    let chunks = StreamingChunker::new(reader, config, resume_from)?.collect::<Result<Vec<_>>>()?;
    Ok(ChunkedResult::from_chunks(chunks))
}

/// Like [`process`] but stops after `max_chunks` chunks.
pub fn process_with_limit<R: BufRead>(
    reader: R,
    config: &ChunkConfig,
    resume_from: Option<&str>,
    max_chunks: usize,
) -> Result<ChunkedResult> {
    let chunks = StreamingChunker::new(reader, config, resume_from)?
        .take(max_chunks)
        .collect::<Result<Vec<_>>>()?;
    Ok(ChunkedResult::from_chunks(chunks))
}
