//! idxscan core: digest registry, file registry and the concurrent scanner.
//!
//! # Architecture
//!
//! ```text
//! Walker ──► bounded queue ──► N workers ──► ScanSession (RwLock)
//! (.fidx/.didx)                (decode)       ├─ DigestRegistry
//!                                             └─ FileRegistry
//! ```
//!
//! Workers decode index files without holding any lock and take the
//! session's write lock once per file to record its digests. Reports and
//! the HTTP API only take read locks.

use std::path::PathBuf;

use thiserror::Error;

mod digest_registry;
mod file_registry;
pub mod report;
pub mod scanner;
mod session;

pub use digest_registry::{DigestOccurrence, DigestRegistry, PREFIX_BUCKETS};
pub use file_registry::{FileDedup, FileRecord, FileRegistry};
pub use idxscan_format::Digest;
pub use scanner::{FileFailure, FileOutcome, ScanOptions, ScanStats, Scanner};
pub use session::{Registries, ScanSession};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to spawn scan worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("scan worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, ScanError>;
