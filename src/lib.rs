//! Aggregate captured zone traces and export them.
//!
//! A [`capture::Capture`] holds per-thread trees of timed zone events for CPU
//! threads and GPU streams. [`model::TraceView`] gives uniform read access to
//! it, and the exporters in [`output`] turn it into a Chrome tracing timeline,
//! a flat XPlane protobuf, or a console summary.
//!
//! ```ignore
//! use zoneprof::{capture::Capture, config::OutputConfig, model::TraceView, output};
//!
//! let capture = Capture::load(path)?;
//! let report = output::dispatch(&TraceView::new(&capture), &OutputConfig::default());
//! ```

pub mod aggregate;
pub mod capture;
pub mod config;
pub mod error;
pub mod merge;
pub mod model;
pub mod output;

pub use error::ProfError;
