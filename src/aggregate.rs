//! Per-zone, per-thread duration statistics.
//!
//! Durations are always merged (see [`crate::merge`]) so a zone that nests
//! inside itself, or overlaps itself across samples, is not counted twice.
//!
//! Percentages are normalized per thread by that thread's *busiest zone*: the
//! zone with the largest merged duration on the thread, nested occurrences
//! included. Idle time therefore
//! doesn't dilute the numbers of threads that were only briefly active.

use std::collections::HashMap;

use crate::capture::ZoneId;
use crate::merge::MergedDurations;
use crate::model::{ThreadKey, ThreadKind, TraceView, ZoneKind};

/// Substring allow-lists. An empty list matches everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Filters<'f> {
    pub zones: &'f [String],
    pub threads: &'f [String],
}

impl<'f> Filters<'f> {
    pub fn new(zones: &'f [String], threads: &'f [String]) -> Self {
        Self { zones, threads }
    }
}

/// Whether `name` contains any of `substrs`, or `substrs` is empty.
pub fn matches_any(name: &str, substrs: &[String]) -> bool {
    substrs.is_empty() || substrs.iter().any(|s| name.contains(s.as_str()))
}

/// `part` as a percentage of `whole`, 0 when `whole` is 0.
pub fn percent(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// A thread that survived filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadColumn {
    pub key: ThreadKey,
    pub name: String,
    /// Merged duration of the thread's busiest zone; its percentage denominator
    pub busiest: i64,
    /// Merged duration of all top-level events
    pub busy: i64,
}

/// Aggregated statistics for one zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRow {
    pub zone: ZoneId,
    pub name: String,
    pub count: usize,
    pub total: i64,
    /// Merged duration per surviving thread, only for threads the zone ran on
    pub per_thread: Vec<(ThreadKey, i64)>,
}

impl ZoneRow {
    pub fn duration_on(&self, key: ThreadKey) -> Option<i64> {
        self.per_thread
            .iter()
            .find(|(k, _)| *k == key)
            .map(|&(_, d)| d)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSummary {
    pub kind: ThreadKind,
    /// Events of this kind in the whole capture, before filtering
    pub event_count: usize,
    /// Surviving threads, in capture order
    pub threads: Vec<ThreadColumn>,
    /// Surviving zones, by descending total
    pub zones: Vec<ZoneRow>,
    /// Merged top-level duration summed over surviving threads
    pub grand_total: i64,
}

impl ZoneSummary {
    pub fn thread(&self, key: ThreadKey) -> Option<&ThreadColumn> {
        self.threads.iter().find(|t| t.key == key)
    }
}

#[derive(Default)]
struct ZoneOnThread {
    count: usize,
    merged: MergedDurations,
}

struct ThreadStats {
    key: ThreadKey,
    name: String,
    busy: i64,
    zones: HashMap<ZoneId, ZoneOnThread>,
}

/// Aggregate all events of one kind.
pub fn aggregate<K: ZoneKind>(view: &TraceView<'_>, filters: Filters<'_>) -> ZoneSummary {
    let zone_order: Vec<ZoneId> = view.zones().map(|z| z.id).collect();

    let mut event_count = 0;
    let mut stats = Vec::new();
    for thread in view.threads_of::<K>() {
        if thread.is_empty() {
            continue;
        }

        let mut top_level = MergedDurations::new();
        let mut zones: HashMap<ZoneId, ZoneOnThread> = HashMap::new();
        view.events_of(&thread).walk(&mut |event, depth| {
            event_count += 1;
            if depth == 0 {
                top_level.insert(event.start(), event.end());
            }
            let entry = zones.entry(event.zone()).or_default();
            entry.count += 1;
            entry.merged.insert(event.start(), event.end());
        });

        stats.push(ThreadStats {
            key: thread.key,
            name: thread.name.into_owned(),
            busy: top_level.total(),
            zones,
        });
    }

    let threads: Vec<(ThreadColumn, &ThreadStats)> = stats
        .iter()
        .map(|s| (thread_column(s), s))
        .filter(|(column, _)| matches_any(&column.name, filters.threads))
        .collect();

    let mut rows = Vec::new();
    for &zone in &zone_order {
        let name = view.zone_name(zone);
        if !matches_any(name, filters.zones) {
            continue;
        }

        let mut count = 0;
        let mut total: i64 = 0;
        let mut per_thread = Vec::new();
        for (column, thread) in &threads {
            if let Some(on_thread) = thread.zones.get(&zone) {
                let duration = on_thread.merged.total();
                count += on_thread.count;
                total = total.saturating_add(duration);
                per_thread.push((column.key, duration));
            }
        }

        if count == 0 || total == 0 {
            continue;
        }
        rows.push(ZoneRow {
            zone,
            name: name.to_string(),
            count,
            total,
            per_thread,
        });
    }
    // Stable, so equal totals keep declaration order.
    rows.sort_by(|a, b| b.total.cmp(&a.total));

    let grand_total = threads
        .iter()
        .fold(0i64, |sum, (_, s)| sum.saturating_add(s.busy));
    log::debug!(
        "{} aggregation: {} events, {} of {} threads, {} zones",
        K::KIND,
        event_count,
        threads.len(),
        stats.len(),
        rows.len()
    );

    ZoneSummary {
        kind: K::KIND,
        event_count,
        threads: threads.into_iter().map(|(column, _)| column).collect(),
        zones: rows,
        grand_total,
    }
}

/// Column for a thread, with the merged duration of its busiest zone. Nested
/// occurrences count towards a zone's duration, so no cell on the thread can
/// exceed it.
fn thread_column(stats: &ThreadStats) -> ThreadColumn {
    let busiest = stats
        .zones
        .values()
        .map(|on_thread| on_thread.merged.total())
        .max()
        .unwrap_or(0);
    ThreadColumn {
        key: stats.key,
        name: stats.name.clone(),
        busiest,
        busy: stats.busy,
    }
}
