//! Flat protobuf export.
//!
//! Each thread becomes an `XLine` holding every event it ran, at any nesting
//! depth, as `(zone, offset, duration)`. Nesting is not kept. Zone names are
//! stored once in the plane's metadata map and referenced by zone id.

use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use anyhow::Context;
use prost::Message;

use super::Exporter;
use super::xplane::{XEvent, XEventMetadata, XLine, XPlane, XSpace};
use crate::model::{Cpu, Gpu, TraceView, ZoneKind};

/// Capture timestamps are nanoseconds; XPlane wants picoseconds. Loading
/// bounds timestamps by [`crate::capture::MAX_TIMESTAMP_NS`], so scaled
/// offsets and durations cannot overflow.
const PS_PER_NS: i64 = 1000;

/// Build the flat representation of a capture.
pub fn to_xspace(view: &TraceView<'_>) -> XSpace {
    let mut plane = XPlane {
        id: 0,
        name: view.capture().name().to_string(),
        ..Default::default()
    };
    add_lines::<Cpu>(view, &mut plane);
    add_lines::<Gpu>(view, &mut plane);

    XSpace {
        planes: vec![plane],
        ..Default::default()
    }
}

fn add_lines<K: ZoneKind>(view: &TraceView<'_>, plane: &mut XPlane) {
    for thread in view.threads_of::<K>() {
        if thread.is_empty() {
            continue;
        }

        let id = thread.key.output_id();
        let mut line = XLine {
            id,
            display_id: id,
            name: thread.name.to_string(),
            display_name: thread.name.to_string(),
            ..Default::default()
        };

        view.events_of(&thread).walk(&mut |event, _depth| {
            let metadata_id = i64::from(event.zone());
            if let Entry::Vacant(entry) = plane.event_metadata.entry(metadata_id) {
                let name = view.zone_name(event.zone());
                entry.insert(XEventMetadata {
                    id: metadata_id,
                    name: name.to_string(),
                    display_name: name.to_string(),
                });
            }
            line.events.push(XEvent {
                metadata_id,
                offset_ps: event.start() * PS_PER_NS,
                duration_ps: event.duration() * PS_PER_NS,
            });
        });

        plane.lines.push(line);
    }
}

/// Writes the capture as a serialized `XSpace`.
pub struct FlatExporter {
    path: PathBuf,
}

impl FlatExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Exporter for FlatExporter {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn export(&self, view: &TraceView<'_>) -> anyhow::Result<()> {
        let space = to_xspace(view);
        let bytes = space.encode_to_vec();
        std::fs::write(&self.path, &bytes)
            .with_context(|| format!("Could not write flat file {}", self.path.display()))?;
        log::info!(
            "Wrote {} lines, {} zones to {}",
            space.planes[0].lines.len(),
            space.planes[0].event_metadata.len(),
            self.path.display()
        );
        Ok(())
    }
}
