//! Timeline JSON export for Chrome tracing / Perfetto.
//!
//! The output is a JSON array of trace events. Each zone occurrence becomes a
//! begin (`B`) event, the events of its children, then an end (`E`) event, so
//! viewers can rebuild the nesting. Metadata (`M`) events name the process
//! (the capture) and every thread that has events.
//!
//! Format reference: <https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU>

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use indexmap::IndexMap;
use serde::Serialize;

use super::Exporter;
use crate::model::{Cpu, Events, Gpu, TraceView, ZoneKind};

/// Everything is reported under one process.
const PID: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    #[serde(rename = "B")]
    Begin,
    #[serde(rename = "E")]
    End,
    #[serde(rename = "M")]
    Metadata,
}

#[derive(Debug, Serialize)]
pub struct TraceEvent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<&'a str>,
    pub ph: Phase,
    /// Microseconds
    pub ts: f64,
    pub pid: u32,
    pub tid: i64,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub args: IndexMap<&'static str, Cow<'a, str>>,
}

impl<'a> TraceEvent<'a> {
    fn metadata(name: &'a str, tid: i64, value: &'a str) -> Self {
        Self {
            name: Some(name),
            cat: None,
            ph: Phase::Metadata,
            ts: 0.0,
            pid: PID,
            tid,
            args: IndexMap::from([("name", Cow::Borrowed(value))]),
        }
    }
}

fn ns_to_us(ns: i64) -> f64 {
    ns as f64 / 1000.0
}

/// Streams trace events as a JSON array, one event per line.
struct EventWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> EventWriter<W> {
    fn new(mut out: W) -> std::io::Result<Self> {
        out.write_all(b"[\n")?;
        Ok(Self { out, written: 0 })
    }

    fn push(&mut self, event: &TraceEvent<'_>) -> anyhow::Result<()> {
        if self.written > 0 {
            self.out.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.out, event)?;
        self.written += 1;
        Ok(())
    }

    fn finish(mut self) -> std::io::Result<usize> {
        self.out.write_all(b"\n]\n")?;
        self.out.flush()?;
        Ok(self.written)
    }
}

/// Write the whole capture as a timeline. Returns the number of events.
pub fn write_timeline<W: Write>(view: &TraceView<'_>, out: W) -> anyhow::Result<usize> {
    let mut writer = EventWriter::new(out)?;
    writer.push(&TraceEvent::metadata(
        "process_name",
        0,
        view.capture().name(),
    ))?;
    write_threads::<Cpu, W>(view, &mut writer)?;
    write_threads::<Gpu, W>(view, &mut writer)?;
    Ok(writer.finish()?)
}

fn write_threads<K: ZoneKind, W: Write>(
    view: &TraceView<'_>,
    writer: &mut EventWriter<W>,
) -> anyhow::Result<()> {
    let category = K::KIND.to_string().to_lowercase();
    for thread in view.threads_of::<K>() {
        if thread.is_empty() {
            continue;
        }
        let tid = thread.key.output_id();
        writer.push(&TraceEvent::metadata("thread_name", tid, &thread.name))?;
        write_events(view, view.events_of(&thread), tid, &category, writer)?;
    }
    Ok(())
}

/// Write a begin marker, the children, then an end marker for every event.
///
/// Each stack frame holds the remaining siblings and the end time of their
/// parent, which is written once they run out.
fn write_events<'a, K: ZoneKind, W: Write>(
    view: &TraceView<'a>,
    events: Events<'a, K>,
    tid: i64,
    category: &str,
    writer: &mut EventWriter<W>,
) -> anyhow::Result<()> {
    let mut stack = vec![(events, None)];
    while let Some((siblings, _)) = stack.last_mut() {
        if let Some(event) = siblings.next() {
            writer.push(&TraceEvent {
                name: Some(view.zone_name(event.zone())),
                cat: Some(category),
                ph: Phase::Begin,
                ts: ns_to_us(event.start()),
                pid: PID,
                tid,
                args: IndexMap::from([("source", view.zone_source(event.zone()))]),
            })?;
            stack.push((event.children(), Some(event.end())));
        } else if let Some((_, Some(end))) = stack.pop() {
            writer.push(&TraceEvent {
                name: None,
                cat: None,
                ph: Phase::End,
                ts: ns_to_us(end),
                pid: PID,
                tid,
                args: IndexMap::new(),
            })?;
        }
    }
    Ok(())
}

/// Writes the capture as a Chrome tracing JSON file.
pub struct TimelineExporter {
    path: PathBuf,
}

impl TimelineExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Exporter for TimelineExporter {
    fn name(&self) -> &'static str {
        "timeline"
    }

    fn export(&self, view: &TraceView<'_>) -> anyhow::Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("Could not create timeline file {}", self.path.display()))?;
        let written = write_timeline(view, BufWriter::new(file))
            .with_context(|| format!("Could not write timeline file {}", self.path.display()))?;
        log::info!("Wrote {} trace events to {}", written, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::{deep_chain, multi_thread, single_thread};
    use crate::model::GPU_THREAD_ID_BASE;
    use serde_json::Value;

    fn render(view: &TraceView<'_>) -> String {
        let mut out = Vec::new();
        write_timeline(view, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn parse(view: &TraceView<'_>) -> Vec<Value> {
        serde_json::from_str(&render(view)).unwrap()
    }

    #[test]
    fn test_single_thread_output() {
        let capture = single_thread();
        let view = TraceView::new(&capture);

        insta::assert_snapshot!(render(&view), @r#"
        [
        {"name":"process_name","ph":"M","ts":0.0,"pid":0,"tid":0,"args":{"name":"single"}},
        {"name":"thread_name","ph":"M","ts":0.0,"pid":0,"tid":0,"args":{"name":"main"}},
        {"name":"A","cat":"cpu","ph":"B","ts":0.0,"pid":0,"tid":0,"args":{"source":"a.cc:3"}},
        {"ph":"E","ts":0.01,"pid":0,"tid":0},
        {"name":"B","cat":"cpu","ph":"B","ts":0.01,"pid":0,"tid":0,"args":{"source":"b.cc:7"}},
        {"name":"A","cat":"cpu","ph":"B","ts":0.015,"pid":0,"tid":0,"args":{"source":"a.cc:3"}},
        {"ph":"E","ts":0.02,"pid":0,"tid":0},
        {"ph":"E","ts":0.03,"pid":0,"tid":0}
        ]
        "#);
    }

    #[test]
    fn test_begin_end_pairs_match_event_count() {
        let capture = multi_thread(true);
        let view = TraceView::new(&capture);
        let events = parse(&view);

        let begins = events.iter().filter(|e| e["ph"] == "B").count();
        let ends = events.iter().filter(|e| e["ph"] == "E").count();
        assert_eq!(begins, 9);
        assert_eq!(ends, 9);

        // Begin/end markers nest properly per thread
        let mut depth: i64 = 0;
        let mut max_depth = 0;
        for event in &events {
            match event["ph"].as_str() {
                Some("B") => depth += 1,
                Some("E") => depth -= 1,
                _ => assert_eq!(depth, 0, "metadata inside an open zone"),
            }
            assert!(depth >= 0);
            max_depth = max_depth.max(depth);
        }
        assert_eq!(depth, 0);
        assert_eq!(max_depth, 3);
    }

    #[test]
    fn test_threads_without_events_are_omitted() {
        let capture = multi_thread(false);
        let view = TraceView::new(&capture);
        let events = parse(&view);

        let thread_names: Vec<_> = events
            .iter()
            .filter(|e| e["name"] == "thread_name")
            .map(|e| (e["tid"].as_i64().unwrap(), e["args"]["name"].as_str().unwrap()))
            .collect();
        assert_eq!(
            thread_names,
            vec![(0, "main"), (1, "Thread 200"), (GPU_THREAD_ID_BASE, "queue")]
        );
    }

    #[test]
    fn test_gpu_events_are_flat() {
        let capture = multi_thread(false);
        let view = TraceView::new(&capture);
        let events = parse(&view);

        let gpu: Vec<_> = events
            .iter()
            .filter(|e| e["tid"] == GPU_THREAD_ID_BASE && e["ph"] != "M")
            .map(|e| e["ph"].as_str().unwrap())
            .collect();
        assert_eq!(gpu, vec!["B", "E", "B", "E"]);
        let first = events
            .iter()
            .find(|e| e["tid"] == GPU_THREAD_ID_BASE && e["ph"] == "B")
            .unwrap();
        assert_eq!(first["cat"], "gpu");
        assert_eq!(first["args"]["source"], "unknown");
    }

    #[test]
    fn test_inline_and_indirect_render_identically() {
        let inline = multi_thread(false);
        let indirect = multi_thread(true);
        assert_eq!(
            render(&TraceView::new(&inline)),
            render(&TraceView::new(&indirect))
        );
    }

    #[test]
    fn test_deep_nesting() {
        let capture = deep_chain(20_000);
        let view = TraceView::new(&capture);
        let mut out = Vec::new();

        // Two metadata events plus a begin and an end per event
        assert_eq!(write_timeline(&view, &mut out).unwrap(), 2 + 2 * 20_001);
        let rendered = String::from_utf8(out).unwrap();
        let last_begin = rendered.rfind(r#""ph":"B""#).unwrap();
        let first_end = rendered.find(r#""ph":"E""#).unwrap();
        assert!(last_begin < first_end, "every begin precedes every end");
    }

    #[test]
    fn test_empty_capture() {
        let capture = crate::capture::Capture::default();
        let view = TraceView::new(&capture);
        let events = parse(&view);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["name"], "process_name");
    }

    #[test]
    fn test_export_writes_file() {
        let capture = single_thread();
        let view = TraceView::new(&capture);
        let dir = tempfile::tempdir().unwrap();
        let exporter = TimelineExporter::new(dir.path().join("trace.json"));

        exporter.export(&view).unwrap();

        let written = std::fs::read_to_string(exporter.path()).unwrap();
        assert_eq!(written, render(&view));
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let capture = single_thread();
        let view = TraceView::new(&capture);
        let err = TimelineExporter::new("/nonexistent/dir/trace.json")
            .export(&view)
            .unwrap_err();
        assert!(err.to_string().contains("Could not create timeline file"));
    }
}
