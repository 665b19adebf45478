//! Exporters and the dispatcher that runs them.
//!
//! Each [`Exporter`] derives everything it needs from the read-only
//! [`TraceView`], so exporters share no state and one failing never affects
//! another. [`dispatch`] runs whichever exporters the configuration enables
//! and records each outcome; it never fails itself.

pub mod flat;
pub mod summary;
pub mod timeline;
pub mod xplane;

pub use flat::FlatExporter;
pub use summary::SummaryExporter;
pub use timeline::TimelineExporter;

use crate::config::OutputConfig;
use crate::model::TraceView;

/// One output format.
pub trait Exporter {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    fn export(&self, view: &TraceView<'_>) -> anyhow::Result<()>;
}

/// Result of one exporter run.
#[derive(Debug)]
pub struct ExportOutcome {
    pub name: &'static str,
    pub result: anyhow::Result<()>,
}

impl ExportOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of every exporter the dispatcher ran, in run order.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ExportOutcome>,
}

impl DispatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &ExportOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn all_ok(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Exporters enabled by `config`: summary, then timeline, then flat.
pub fn exporters_for(config: &OutputConfig) -> Vec<Box<dyn Exporter>> {
    let mut exporters: Vec<Box<dyn Exporter>> = Vec::new();
    if config.stdout {
        exporters.push(Box::new(SummaryExporter::new(
            config.zone_filters.clone(),
            config.thread_filters.clone(),
            config.unit,
        )));
    }
    if let Some(path) = config.timeline_path() {
        exporters.push(Box::new(TimelineExporter::new(path)));
    }
    if let Some(path) = config.flat_path() {
        exporters.push(Box::new(FlatExporter::new(path)));
    }
    exporters
}

/// Run every exporter `config` enables.
pub fn dispatch(view: &TraceView<'_>, config: &OutputConfig) -> DispatchReport {
    run_exporters(view, &exporters_for(config))
}

/// Run `exporters` in order, logging failures without stopping.
pub fn run_exporters(view: &TraceView<'_>, exporters: &[Box<dyn Exporter>]) -> DispatchReport {
    let mut report = DispatchReport::default();
    for exporter in exporters {
        log::debug!("Running {} export", exporter.name());
        let result = exporter.export(view);
        if let Err(e) = &result {
            log::error!("{} export failed: {:#}", exporter.name(), e);
        }
        report.outcomes.push(ExportOutcome {
            name: exporter.name(),
            result,
        });
    }
    report
}
