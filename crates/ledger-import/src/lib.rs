//! Bulk import of ledger data in bounded, resumable chunks.
//!
//! The pipeline streams an import file through [`StreamingChunker`],
//! measures a gas model with [`GasCostEstimator`], reshapes chunks with
//! [`ChunkOptimizer`] and submits them one at a time through
//! [`ImportOrchestrator`], persisting a [`BulkImportStatus`] after every
//! chunk. [`LocalChain`] provides an in-process chain to import into.

pub mod chunker;
pub mod config;
pub mod correlation;
pub mod gas;
pub mod json_stream;
pub mod optimizer;
pub mod oracle;
pub mod orchestrator;
pub mod paths;
pub mod sandbox;
pub mod status;

pub use chunker::{process, process_with_limit, ChunkedResult, RecordCursor, StreamingChunker};
pub use config::{ChunkConfig, CommitWaitConfig};
pub use correlation::{
    cursor_after_correlation_id, cursor_after_correlation_id_in_file, find_next_correlation_id_after,
    find_next_correlation_id_in_file,
};
pub use gas::{GasCostEstimator, GasCosts};
pub use optimizer::ChunkOptimizer;
pub use oracle::{BroadcastResult, Broadcaster, CommitWatcher, Simulator, TxStatus};
pub use orchestrator::{
    file_sha256, ImportOrchestrator, ImportPlan, ImportReport, ImportSession, PlannedChunk, SessionPlan,
};
pub use sandbox::{ChainState, LocalChain};
pub use status::{BulkImportStatus, ChunkAttempt, ImportState, StatusStore};
