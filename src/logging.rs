use std::{fs::OpenOptions, path::Path, sync::Mutex};
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Detailed processing log.
pub const LOG_TARGET: &str = "loader";
/// Run report: stage progress, rejected records, batch outcomes.
pub const REPORT_TARGET: &str = "loader.report";

/// Console output follows `RUST_LOG`. When a report path is given, report
/// events are also appended to that file. If the file cannot be opened the
/// console layer is still installed and the open error is returned.
pub fn init_tracing(report_path: Option<&Path>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_filter(filter);

    let opened = report_path
        .map(|path| OpenOptions::new().create(true).append(true).open(path))
        .transpose();
    let (file, open_error) = match opened {
        Ok(file) => (file, None),
        Err(err) => (None, Some(err)),
    };
    let report = file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(Targets::new().with_target(REPORT_TARGET, Level::INFO))
    });

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(report)
        .try_init();

    match open_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
