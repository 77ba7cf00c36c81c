//! Component P: structured logging setup. `conf.debug` selects a verbosity
//! threshold; `stdout`/`syslog` toggle each sink independently, exactly like the
//! original collector's `DEBUG_STDOUT`/`DEBUG_SYSLOG` flags.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::CollectorConfig;

fn level_for(debug: u8) -> LevelFilter {
    match debug {
        0 => LevelFilter::ERROR,
        1..=25 => LevelFilter::WARN,
        26..=75 => LevelFilter::INFO,
        76..=150 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

pub fn init(config: &CollectorConfig) {
    let _ = tracing_log::LogTracer::init();

    let filter = EnvFilter::builder()
        .with_default_directive(level_for(config.debug).into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);

    if config.syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_DAEMON,
            hostname: None,
            process: "collectord".into(),
            pid: std::process::id(),
        };
        match syslog::unix(formatter) {
            Ok(writer) => {
                let writer = std::sync::Arc::new(std::sync::Mutex::new(writer));
                let syslog_layer = fmt::layer()
                    .with_writer(move || SyslogWriter(writer.clone()))
                    .with_ansi(false);
                if config.stdout {
                    registry.with(syslog_layer).with(fmt::layer()).init();
                } else {
                    registry.with(syslog_layer).init();
                }
                return;
            }
            Err(err) => {
                eprintln!("failed to open syslog, falling back to stdout only: {err}");
            }
        }
    }

    registry.with(fmt::layer()).init();
}

/// Adapts `syslog`'s `Logger` (a `std::io::Write` sink keyed by severity) to the
/// `tracing_subscriber::fmt` layer's `MakeWriter` contract.
struct SyslogWriter(std::sync::Arc<std::sync::Mutex<syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>>>);

impl Clone for SyslogWriter {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl std::io::Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        if let Ok(mut logger) = self.0.lock() {
            let _ = logger.info(text.into_owned());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
