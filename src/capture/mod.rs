//! Captured trace data, as handed over by the trace-capture library.
//!
//! A capture is fully materialized before any aggregation or export runs. It
//! is read from a JSON dump that mirrors the capture library's in-memory
//! layout, including its two encodings for event lists:
//!
//! - **inline**: events stored directly in the list
//! - **indirect**: the list holds indices into a per-kind event pool
//!
//! Nothing outside [`crate::model`] should care which encoding a list uses.
//!
//! Loading validates every reference (zones, pool slots, child lists) and the
//! ordering guarantees the exporters rely on, so downstream traversal can index
//! without re-checking.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ProfError;

#[cfg(test)]
pub(crate) mod testing;

/// Source-location identifier, stable per call-site across a capture.
pub type ZoneId = i16;

/// Largest accepted timestamp magnitude, in nanoseconds. Any span between two
/// accepted timestamps still fits in an `i64` once scaled to picoseconds.
pub const MAX_TIMESTAMP_NS: i64 = i64::MAX / 2_000;

/// CPU threads are keyed by their position as a `u16`.
pub const MAX_CPU_THREADS: usize = u16::MAX as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display)]
pub enum CpuArch {
    #[default]
    #[serde(rename = "unknown")]
    #[strum(serialize = "Unknown")]
    Unknown,
    #[serde(rename = "x86")]
    #[strum(serialize = "x86")]
    X86,
    #[serde(rename = "x86_64")]
    #[strum(serialize = "x86_64")]
    X64,
    #[serde(rename = "arm")]
    #[strum(serialize = "arm")]
    Arm32,
    #[serde(rename = "aarch64")]
    #[strum(serialize = "aarch64")]
    Arm64,
}

/// Where a zone was recorded.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceLocation {
    /// Explicit zone name; absent for zones named after their function
    #[serde(default)]
    pub name: Option<String>,
    pub function: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: u32,
}

/// One CPU zone occurrence.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneEvent {
    pub zone: ZoneId,
    pub start: i64,
    pub end: i64,
    /// Index into [`Capture::child_lists`]
    #[serde(default)]
    pub children: Option<u32>,
}

/// One GPU zone occurrence. GPU events never nest.
#[derive(Debug, Clone, Deserialize)]
pub struct GpuEvent {
    pub zone: ZoneId,
    pub start: i64,
    pub end: i64,
}

/// An ordered list of events in one of the two storage encodings.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "storage", content = "events", rename_all = "snake_case")]
pub enum EventList<E> {
    Inline(Vec<E>),
    /// Indices into the event pool of the matching kind
    Indirect(Vec<u32>),
}

impl<E> Default for EventList<E> {
    fn default() -> Self {
        EventList::Inline(Vec::new())
    }
}

impl<E> EventList<E> {
    pub fn len(&self) -> usize {
        match self {
            EventList::Inline(events) => events.len(),
            EventList::Indirect(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CpuThread {
    /// OS thread id
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub timeline: EventList<ZoneEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GpuThread {
    /// Stream id, in its own namespace separate from CPU thread ids
    pub id: u16,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub timeline: EventList<GpuEvent>,
}

/// A complete, read-only captured trace.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Capture {
    pub(crate) name: String,
    pub(crate) cpu_arch: CpuArch,
    pub(crate) source_locations: IndexMap<ZoneId, SourceLocation>,
    pub(crate) threads: Vec<CpuThread>,
    pub(crate) gpu_threads: Vec<GpuThread>,
    pub(crate) cpu_event_pool: Vec<ZoneEvent>,
    pub(crate) gpu_event_pool: Vec<GpuEvent>,
    pub(crate) child_lists: Vec<EventList<ZoneEvent>>,
}

impl Capture {
    /// Load and validate a capture dump from disk.
    pub fn load(path: &Path) -> Result<Self, ProfError> {
        let file = File::open(path).map_err(|source| ProfError::ReadCapture {
            path: path.to_path_buf(),
            source,
        })?;
        let capture = Self::from_reader(BufReader::new(file))?;
        log::debug!(
            "Loaded capture {:?}: {} CPU threads, {} GPU threads, {} zones",
            capture.name,
            capture.threads.len(),
            capture.gpu_threads.len(),
            capture.source_locations.len()
        );
        Ok(capture)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ProfError> {
        let capture: Capture = serde_json::from_reader(reader)?;
        capture.validate()?;
        Ok(capture)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ProfError> {
        let capture: Capture = serde_json::from_str(json)?;
        capture.validate()?;
        Ok(capture)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ProfError> {
        let capture: Capture = serde_json::from_value(value)?;
        capture.validate()?;
        Ok(capture)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cpu_arch(&self) -> CpuArch {
        self.cpu_arch
    }

    pub fn source_location(&self, zone: ZoneId) -> Option<&SourceLocation> {
        self.source_locations.get(&zone)
    }

    fn validate(&self) -> Result<(), ProfError> {
        // Compressed CPU thread ids are u16.
        if self.threads.len() > MAX_CPU_THREADS {
            return Err(ProfError::TooManyCpuThreads {
                count: self.threads.len(),
            });
        }

        let mut visiting = vec![false; self.child_lists.len()];
        for thread in &self.threads {
            self.validate_cpu_tree(&thread.timeline, &mut visiting)?;
        }
        for thread in &self.gpu_threads {
            self.validate_gpu_list(&thread.timeline)?;
        }
        Ok(())
    }

    /// Check a CPU timeline and every child list reachable from it.
    ///
    /// Child lists may chain arbitrarily deep, so the walk keeps its own stack.
    fn validate_cpu_tree(
        &self,
        timeline: &EventList<ZoneEvent>,
        visiting: &mut [bool],
    ) -> Result<(), ProfError> {
        let mut stack = vec![CpuFrame::new(timeline, None, None)];
        while let Some(frame) = stack.last_mut() {
            if frame.next == frame.list.len() {
                if let Some(slot) = frame.slot {
                    visiting[slot] = false;
                }
                stack.pop();
                continue;
            }

            let event = pool_event(frame.list, &self.cpu_event_pool, frame.next, "CPU")?;
            frame.next += 1;
            self.validate_span(event.zone, event.start, event.end, &mut frame.previous_start)?;
            if let Some(parent) = frame.parent
                && (event.start < parent.start || event.end > parent.end)
            {
                return Err(ProfError::ChildOutsideParent {
                    zone: event.zone,
                    start: event.start,
                    end: event.end,
                });
            }

            if let Some(child) = event.children {
                let slot = child as usize;
                let children = self
                    .child_lists
                    .get(slot)
                    .ok_or(ProfError::DanglingChildList { index: child })?;
                if visiting[slot] {
                    return Err(ProfError::CyclicChildList { index: child });
                }
                visiting[slot] = true;
                stack.push(CpuFrame::new(children, Some(event), Some(slot)));
            }
        }
        Ok(())
    }

    fn validate_gpu_list(&self, list: &EventList<GpuEvent>) -> Result<(), ProfError> {
        let mut previous_start = i64::MIN;
        for index in 0..list.len() {
            let event = pool_event(list, &self.gpu_event_pool, index, "GPU")?;
            self.validate_span(event.zone, event.start, event.end, &mut previous_start)?;
        }
        Ok(())
    }

    fn validate_span(
        &self,
        zone: ZoneId,
        start: i64,
        end: i64,
        previous_start: &mut i64,
    ) -> Result<(), ProfError> {
        if !self.source_locations.contains_key(&zone) {
            return Err(ProfError::UnknownZone { zone });
        }
        for timestamp in [start, end] {
            if !(-MAX_TIMESTAMP_NS..=MAX_TIMESTAMP_NS).contains(&timestamp) {
                return Err(ProfError::TimestampOutOfRange { zone, timestamp });
            }
        }
        if end < start {
            return Err(ProfError::NegativeDuration { zone, start, end });
        }
        if start < *previous_start {
            return Err(ProfError::OutOfOrder { zone, start });
        }
        *previous_start = start;
        Ok(())
    }
}

/// One list being checked by [`Capture::validate_cpu_tree`].
struct CpuFrame<'c> {
    list: &'c EventList<ZoneEvent>,
    parent: Option<&'c ZoneEvent>,
    /// Child-list slot to release once the list is done; `None` for timelines
    slot: Option<usize>,
    next: usize,
    previous_start: i64,
}

impl<'c> CpuFrame<'c> {
    fn new(
        list: &'c EventList<ZoneEvent>,
        parent: Option<&'c ZoneEvent>,
        slot: Option<usize>,
    ) -> Self {
        Self {
            list,
            parent,
            slot,
            next: 0,
            previous_start: i64::MIN,
        }
    }
}

/// The `index`th event of `list`, resolving indirect entries through `pool`.
fn pool_event<'c, E>(
    list: &'c EventList<E>,
    pool: &'c [E],
    index: usize,
    kind: &'static str,
) -> Result<&'c E, ProfError> {
    match list {
        EventList::Inline(events) => Ok(&events[index]),
        EventList::Indirect(indices) => {
            let slot = indices[index];
            pool.get(slot as usize)
                .ok_or(ProfError::DanglingPoolIndex { kind, index: slot })
        }
    }
}
