//! # Logging
//!
//! `tracing` subscriber setup for the sync workspace.
//!
//! Events go to stdout in one of three [`LogFormat`]s and, when the host
//! supplies a [`LoggerSink`], are also forwarded there as [`LogEntry`]
//! values with sensitive fields masked.
//!
//! Filter precedence: [`LoggingConfig::filter`], then `RUST_LOG`, then the
//! workspace crates at [`LoggingConfig::level`] with the HTTP stack at `warn`.
//!
//! ```ignore
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug);
//! init_logging(config)?;
//! ```

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

const WORKSPACE_CRATES: &[&str] = &[
    "bridge_desktop",
    "core_runtime",
    "core_photo",
    "core_sync",
    "core_service",
    "provider_picasa",
];

const NOISY_DEPENDENCIES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls"];

/// Field name fragments whose values never leave the process.
const SECRET_FIELD_MARKERS: &[&str] = &["token", "auth", "password", "secret", "googlelogin"];

const MASK: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored. Default in debug builds.
    Pretty,
    /// One JSON object per event. Default in release builds.
    Json,
    /// One line per event.
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Full `EnvFilter` directive, e.g. `core_sync=trace,provider_picasa=debug`.
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Emit span open/close events.
    pub spans: bool,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            spans: false,
            ansi: cfg!(debug_assertions),
        }
    }
}

impl LoggingConfig {
    pub fn with_format(self, format: LogFormat) -> Self {
        LoggingConfig { format, ..self }
    }

    pub fn with_level(self, level: LogLevel) -> Self {
        LoggingConfig { level, ..self }
    }

    pub fn with_filter(self, filter: impl Into<String>) -> Self {
        LoggingConfig {
            filter: Some(filter.into()),
            ..self
        }
    }

    pub fn with_logger_sink(self, sink: Arc<dyn LoggerSink>) -> Self {
        LoggingConfig {
            logger_sink: Some(sink),
            ..self
        }
    }

    pub fn with_spans(self, spans: bool) -> Self {
        LoggingConfig { spans, ..self }
    }

    pub fn with_ansi(self, ansi: bool) -> Self {
        LoggingConfig { ansi, ..self }
    }

    /// Directive string the subscriber will be built with.
    pub fn directives(&self) -> String {
        if let Some(explicit) = &self.filter {
            return explicit.clone();
        }
        std::env::var(EnvFilter::DEFAULT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default_directives(self.level))
    }
}

/// Install the global subscriber. Only the first call in a process succeeds.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {e}")))?;

    tracing_subscriber::registry()
        .with(stdout_layer(&config))
        .with(filter)
        .with(SinkForwarder {
            sink: config.logger_sink.clone(),
        })
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

fn default_directives(level: LogLevel) -> String {
    let level = match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    };
    WORKSPACE_CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .chain(NOISY_DEPENDENCIES.iter().map(|krate| format!("{krate}=warn")))
        .collect::<Vec<_>>()
        .join(",")
}

fn stdout_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let base = tracing_subscriber::fmt::layer()
        .with_ansi(config.ansi)
        .with_span_events(if config.spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.spans)
            .boxed(),
    }
}

/// Copies filtered events into the host's [`LoggerSink`].
struct SinkForwarder {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl<S> Layer<S> for SinkForwarder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let meta = event.metadata();
        let level = sink_level(*meta.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let mut entry = LogEntry::new(
            level,
            meta.target(),
            fields.message.take().unwrap_or_else(|| meta.name().to_string()),
        );
        for (name, value) in fields.values {
            let value = redact_field(name, &value);
            entry = entry.with_field(name, value);
        }
        if let Some(span) = ctx.lookup_current() {
            entry = entry.with_field("span", span.name());
        }

        deliver(Arc::clone(sink), entry);
    }
}

fn sink_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::ERROR => LogLevel::Error,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::TRACE => LogLevel::Trace,
    }
}

/// Spawned on the ambient tokio runtime; blocking outside of one.
fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    let send = async move {
        if let Err(err) = sink.log(entry).await {
            eprintln!("log sink rejected entry: {err}");
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(send);
        }
        Err(_) => futures::executor::block_on(send),
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: Vec<(&'static str, String)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => self.values.push((name, value)),
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_owned());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.push(field, format!("{value:?}"));
    }
}

/// Value safe to hand to a log sink.
///
/// Fields named like credentials are replaced outright. Values that look like
/// an account address keep only their first character.
///
/// ```ignore
/// info!(account = %redact_field("account", account), "Starting sync");
/// ```
pub fn redact_field(name: &str, value: &str) -> String {
    let name = name.to_ascii_lowercase();
    if SECRET_FIELD_MARKERS.iter().any(|marker| name.contains(marker)) {
        return MASK.to_string();
    }
    match value.split_once('@') {
        Some((local, domain)) if domain.contains('.') => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{MASK}")
        }
        _ => value.to_string(),
    }
}

/// Final path component, for logging store and scratch files.
pub fn file_label(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
