//! Read-only views over a [`Capture`].
//!
//! CPU and GPU events share no representation in the capture, so traversal is
//! parameterized by a [`ZoneKind`]: a small capability table that says how to
//! read timestamps, children and threads for one kind of event. Aggregation
//! and export code is written once, generic over the kind, and instantiated
//! for [`Cpu`] and [`Gpu`].
//!
//! [`Events`] hides whether a list is stored inline or through the event pool;
//! callers only ever see [`Event`]s.

use std::borrow::Cow;
use std::slice;

use crate::capture::{Capture, EventList, GpuEvent, SourceLocation, ZoneEvent, ZoneId};

/// Shown when a zone has no recorded source file.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// First output id used for GPU threads when both kinds share one integer
/// namespace. Compressed CPU ids are `u16`, so they always stay below it.
pub const GPU_THREAD_ID_BASE: i64 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ThreadKind {
    #[strum(serialize = "CPU")]
    Cpu,
    #[strum(serialize = "GPU")]
    Gpu,
}

/// Identifies a thread within its own kind's namespace.
///
/// CPU ids are compressed to their position in the capture's thread list; GPU
/// ids are stream ids. The two may coincide numerically, so the kind is part
/// of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThreadKey {
    Cpu(u16),
    Gpu(u16),
}

impl ThreadKey {
    pub fn kind(self) -> ThreadKind {
        match self {
            ThreadKey::Cpu(_) => ThreadKind::Cpu,
            ThreadKey::Gpu(_) => ThreadKind::Gpu,
        }
    }

    /// Integer id for outputs that put both kinds in one namespace.
    pub fn output_id(self) -> i64 {
        match self {
            ThreadKey::Cpu(id) => i64::from(id),
            ThreadKey::Gpu(id) => GPU_THREAD_ID_BASE + i64::from(id),
        }
    }
}

/// How to read one kind of event out of a capture.
pub trait ZoneKind: Sized {
    type Event: 'static;

    const KIND: ThreadKind;

    fn zone(event: &Self::Event) -> ZoneId;
    fn start(event: &Self::Event) -> i64;
    fn end(event: &Self::Event) -> i64;

    /// Pool backing indirect lists of this kind.
    fn pool(capture: &Capture) -> &[Self::Event];

    fn children<'a>(capture: &'a Capture, event: &'a Self::Event)
    -> Option<&'a EventList<Self::Event>>;

    fn threads(capture: &Capture) -> Vec<Thread<'_, Self>>;
}

/// CPU zones: nested, on OS threads.
pub struct Cpu;

/// GPU zones: flat, on accelerator streams.
pub struct Gpu;

impl ZoneKind for Cpu {
    type Event = ZoneEvent;

    const KIND: ThreadKind = ThreadKind::Cpu;

    fn zone(event: &ZoneEvent) -> ZoneId {
        event.zone
    }

    fn start(event: &ZoneEvent) -> i64 {
        event.start
    }

    fn end(event: &ZoneEvent) -> i64 {
        event.end
    }

    fn pool(capture: &Capture) -> &[ZoneEvent] {
        &capture.cpu_event_pool
    }

    fn children<'a>(capture: &'a Capture, event: &'a ZoneEvent) -> Option<&'a EventList<ZoneEvent>> {
        // Child indices were checked when the capture was loaded.
        event
            .children
            .map(|index| &capture.child_lists[index as usize])
    }

    fn threads(capture: &Capture) -> Vec<Thread<'_, Self>> {
        capture
            .threads
            .iter()
            .enumerate()
            .map(|(index, thread)| Thread {
                // Loading rejects captures with more threads than fit.
                key: ThreadKey::Cpu(index as u16),
                name: match &thread.name {
                    Some(name) => Cow::Borrowed(name.as_str()),
                    None => Cow::Owned(format!("Thread {}", thread.id)),
                },
                timeline: &thread.timeline,
                capture,
            })
            .collect()
    }
}

impl ZoneKind for Gpu {
    type Event = GpuEvent;

    const KIND: ThreadKind = ThreadKind::Gpu;

    fn zone(event: &GpuEvent) -> ZoneId {
        event.zone
    }

    fn start(event: &GpuEvent) -> i64 {
        event.start
    }

    fn end(event: &GpuEvent) -> i64 {
        event.end
    }

    fn pool(capture: &Capture) -> &[GpuEvent] {
        &capture.gpu_event_pool
    }

    fn children<'a>(_capture: &'a Capture, _event: &'a GpuEvent) -> Option<&'a EventList<GpuEvent>> {
        None
    }

    fn threads(capture: &Capture) -> Vec<Thread<'_, Self>> {
        capture
            .gpu_threads
            .iter()
            .map(|thread| Thread {
                key: ThreadKey::Gpu(thread.id),
                name: match &thread.name {
                    Some(name) => Cow::Borrowed(name.as_str()),
                    None => Cow::Owned(format!("GPU {}", thread.id)),
                },
                timeline: &thread.timeline,
                capture,
            })
            .collect()
    }
}

/// Entry point for all read access to a capture.
#[derive(Clone, Copy)]
pub struct TraceView<'a> {
    capture: &'a Capture,
}

impl<'a> TraceView<'a> {
    pub fn new(capture: &'a Capture) -> Self {
        Self { capture }
    }

    pub fn capture(&self) -> &'a Capture {
        self.capture
    }

    /// Threads of one kind, in capture order.
    pub fn threads_of<K: ZoneKind>(&self) -> Vec<Thread<'a, K>> {
        K::threads(self.capture)
    }

    /// All threads, CPU first, then GPU.
    pub fn threads(&self) -> Vec<ThreadInfo<'a>> {
        let cpu = self.threads_of::<Cpu>().into_iter().map(Thread::info);
        let gpu = self.threads_of::<Gpu>().into_iter().map(Thread::info);
        cpu.chain(gpu).collect()
    }

    /// All zones, in the order the capture declares them.
    pub fn zones(&self) -> impl Iterator<Item = Zone<'a>> + 'a {
        self.capture
            .source_locations
            .iter()
            .map(|(&id, location)| Zone { id, location })
    }

    pub fn zone(&self, id: ZoneId) -> Option<Zone<'a>> {
        self.capture
            .source_location(id)
            .map(|location| Zone { id, location })
    }

    /// Display name of a zone, falling back to its function name.
    pub fn zone_name(&self, id: ZoneId) -> &'a str {
        self.zone(id).map_or(UNKNOWN_SOURCE, |zone| zone.name())
    }

    /// `file:line` of a zone, or [`UNKNOWN_SOURCE`].
    pub fn zone_source(&self, id: ZoneId) -> Cow<'a, str> {
        self.zone(id)
            .map_or(Cow::Borrowed(UNKNOWN_SOURCE), |zone| zone.source())
    }

    /// Top-level events of a thread.
    pub fn events_of<K: ZoneKind>(&self, thread: &Thread<'a, K>) -> Events<'a, K> {
        thread.events()
    }
}

/// A zone declared by the capture.
#[derive(Debug, Clone, Copy)]
pub struct Zone<'a> {
    pub id: ZoneId,
    location: &'a SourceLocation,
}

impl<'a> Zone<'a> {
    pub fn name(&self) -> &'a str {
        self.location
            .name
            .as_deref()
            .unwrap_or(&self.location.function)
    }

    pub fn source(&self) -> Cow<'a, str> {
        match &self.location.file {
            Some(file) if !file.is_empty() => {
                Cow::Owned(format!("{}:{}", file, self.location.line))
            }
            _ => Cow::Borrowed(UNKNOWN_SOURCE),
        }
    }
}

/// A thread of a known kind, with access to its timeline.
pub struct Thread<'a, K: ZoneKind> {
    pub key: ThreadKey,
    pub name: Cow<'a, str>,
    timeline: &'a EventList<K::Event>,
    capture: &'a Capture,
}

impl<'a, K: ZoneKind> Thread<'a, K> {
    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn events(&self) -> Events<'a, K> {
        Events::new(self.capture, self.timeline)
    }

    fn info(self) -> ThreadInfo<'a> {
        ThreadInfo {
            key: self.key,
            event_count: self.timeline.len(),
            name: self.name,
        }
    }
}

/// Kind-erased thread summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo<'a> {
    pub key: ThreadKey,
    pub name: Cow<'a, str>,
    /// Number of top-level events
    pub event_count: usize,
}

/// One event occurrence.
pub struct Event<'a, K: ZoneKind> {
    raw: &'a K::Event,
    capture: &'a Capture,
}

impl<K: ZoneKind> Clone for Event<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: ZoneKind> Copy for Event<'_, K> {}

impl<'a, K: ZoneKind> Event<'a, K> {
    pub fn zone(&self) -> ZoneId {
        K::zone(self.raw)
    }

    pub fn start(&self) -> i64 {
        K::start(self.raw)
    }

    pub fn end(&self) -> i64 {
        K::end(self.raw)
    }

    pub fn duration(&self) -> i64 {
        self.end() - self.start()
    }

    /// Direct children, empty for leaves and GPU events.
    pub fn children(&self) -> Events<'a, K> {
        match K::children(self.capture, self.raw) {
            Some(list) => Events::new(self.capture, list),
            None => Events::empty(self.capture),
        }
    }
}

enum Storage<'a, E> {
    Inline(slice::Iter<'a, E>),
    Indirect {
        indices: slice::Iter<'a, u32>,
        pool: &'a [E],
    },
}

/// Iterator over one event list, regardless of its storage encoding.
pub struct Events<'a, K: ZoneKind> {
    storage: Storage<'a, K::Event>,
    capture: &'a Capture,
}

impl<'a, K: ZoneKind> Events<'a, K> {
    fn new(capture: &'a Capture, list: &'a EventList<K::Event>) -> Self {
        let storage = match list {
            EventList::Inline(events) => Storage::Inline(events.iter()),
            EventList::Indirect(indices) => Storage::Indirect {
                indices: indices.iter(),
                pool: K::pool(capture),
            },
        };
        Self { storage, capture }
    }

    fn empty(capture: &'a Capture) -> Self {
        let none: &'a [K::Event] = &[];
        Self {
            storage: Storage::Inline(none.iter()),
            capture,
        }
    }

    /// Visit every event in the list and all of its descendants, parents
    /// before children, passing the nesting depth (0 for this list).
    ///
    /// Nesting can be arbitrarily deep, so pending sibling lists are kept on
    /// an explicit stack.
    pub fn walk(self, visit: &mut impl FnMut(Event<'a, K>, usize)) {
        let mut stack = vec![self];
        while let Some(siblings) = stack.last_mut() {
            match siblings.next() {
                Some(event) => {
                    visit(event, stack.len() - 1);
                    stack.push(event.children());
                }
                None => {
                    stack.pop();
                }
            }
        }
    }
}

impl<'a, K: ZoneKind> Iterator for Events<'a, K> {
    type Item = Event<'a, K>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match &mut self.storage {
            Storage::Inline(events) => events.next()?,
            // Pool indices were checked when the capture was loaded.
            Storage::Indirect { indices, pool } => &pool[*indices.next()? as usize],
        };
        Some(Event {
            raw,
            capture: self.capture,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.storage {
            Storage::Inline(events) => events.size_hint(),
            Storage::Indirect { indices, .. } => indices.size_hint(),
        }
    }
}
