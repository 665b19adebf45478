//! Output configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! command-line flags. Keys are kebab-case:
//!
//! ```toml
//! timeline-file = "trace.json"
//! flat-file = "trace.xplane.pb"
//! stdout = true
//! zone-filters = ["dispatch"]
//! thread-filters = ["worker"]
//! unit = "us"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Unit for durations in the console summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum DurationUnit {
    #[serde(rename = "ns")]
    #[strum(serialize = "ns")]
    #[cfg_attr(feature = "cli", value(name = "ns"))]
    Nanoseconds,
    #[serde(rename = "us")]
    #[strum(serialize = "us")]
    #[cfg_attr(feature = "cli", value(name = "us"))]
    Microseconds,
    #[default]
    #[serde(rename = "ms")]
    #[strum(serialize = "ms")]
    #[cfg_attr(feature = "cli", value(name = "ms"))]
    Milliseconds,
    #[serde(rename = "s")]
    #[strum(serialize = "s")]
    #[cfg_attr(feature = "cli", value(name = "s"))]
    Seconds,
}

impl DurationUnit {
    /// Format a nanosecond duration in this unit, e.g. `1.500ms`.
    pub fn format(self, duration_ns: i64) -> String {
        let scaled = |divisor: f64| duration_ns as f64 / divisor;
        match self {
            DurationUnit::Nanoseconds => format!("{duration_ns}{self}"),
            DurationUnit::Microseconds => format!("{:.3}{self}", scaled(1e3)),
            DurationUnit::Milliseconds => format!("{:.3}{self}", scaled(1e6)),
            DurationUnit::Seconds => format!("{:.3}{self}", scaled(1e9)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputConfig {
    /// Timeline JSON destination; disabled when unset or empty
    pub timeline_file: Option<PathBuf>,
    /// Flat protobuf destination; disabled when unset or empty
    pub flat_file: Option<PathBuf>,
    /// Print the console summary
    pub stdout: bool,
    /// Zone-name substrings to keep in the summary
    pub zone_filters: Vec<String>,
    /// Thread-name substrings to keep in the summary
    pub thread_filters: Vec<String>,
    pub unit: DurationUnit,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            timeline_file: None,
            flat_file: None,
            stdout: true,
            zone_filters: Vec::new(),
            thread_filters: Vec::new(),
            unit: DurationUnit::default(),
        }
    }
}

impl OutputConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn timeline_path(&self) -> Option<&Path> {
        non_empty(self.timeline_file.as_deref())
    }

    pub fn flat_path(&self) -> Option<&Path> {
        non_empty(self.flat_file.as_deref())
    }
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}
