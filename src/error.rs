//! Zoneprof error types.
//!
//! **`ProfError`** is a typed enum for failures that callers may want to
//! pattern-match: a capture that cannot be read or that breaks the structural
//! guarantees the exporters rely on. Exporters themselves return
//! `anyhow::Result` and attach path context; a `ProfError` converts into
//! `anyhow::Error` with `?` while staying downcastable.
//!
//! ```ignore
//! if let Some(ProfError::UnknownZone { zone }) = err.downcast_ref() {
//!     eprintln!("zone {zone} is missing from the capture");
//! }
//! ```

use std::path::PathBuf;

use crate::capture::ZoneId;

#[derive(Debug, thiserror::Error)]
pub enum ProfError {
    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------
    #[error("failed to read capture {}", path.display())]
    ReadCapture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse capture: {0}")]
    ParseCapture(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Structural validation
    // -------------------------------------------------------------------------
    /// An event points at a source location the capture does not define
    #[error("event references unknown zone {zone}")]
    UnknownZone { zone: ZoneId },

    /// An indirect event list points past the end of its event pool
    #[error("{kind} event pool has no entry {index}")]
    DanglingPoolIndex { kind: &'static str, index: u32 },

    /// A CPU event points at a child list that does not exist
    #[error("child list {index} does not exist")]
    DanglingChildList { index: u32 },

    /// A child list is reachable from one of its own events
    #[error("child list {index} is nested inside itself")]
    CyclicChildList { index: u32 },

    #[error("event of zone {zone} has timestamp {timestamp} outside the supported range")]
    TimestampOutOfRange { zone: ZoneId, timestamp: i64 },

    #[error("capture has {count} CPU threads; at most 65536 are supported")]
    TooManyCpuThreads { count: usize },

    #[error("event of zone {zone} ends before it starts ({start} > {end})")]
    NegativeDuration { zone: ZoneId, start: i64, end: i64 },

    /// Sibling events must be in non-decreasing start order
    #[error("event of zone {zone} at {start} starts before its previous sibling")]
    OutOfOrder { zone: ZoneId, start: i64 },

    #[error("child event of zone {zone} [{start}, {end}) escapes its parent span")]
    ChildOutsideParent { zone: ZoneId, start: i64, end: i64 },
}
